use query_cell::{CachePolicy, QueryClient, QueryKey, QueryState};
use shared_models::envelope::Page;

use crate::models::{specialization_filter, Doctor, DoctorListQuery};
use crate::services::doctor::DoctorService;

pub const DOCTOR_LIST_POLICY: CachePolicy = CachePolicy::minutes(5, 10);
pub const ALL_DOCTORS_POLICY: CachePolicy = CachePolicy::minutes(10, 30);
pub const SPECIALIZATIONS_POLICY: CachePolicy = CachePolicy::minutes(30, 60);

pub fn doctors_family() -> QueryKey {
    QueryKey::new(["doctors"])
}

pub fn doctor_list_key(query: &DoctorListQuery) -> QueryKey {
    QueryKey::new(["doctors", "list"])
        .with_param("page", query.page.max(1))
        .with_param("limit", query.limit)
        .with_optional_param("specialization", query.specialization_filter())
}

pub fn all_doctors_key(specialization: Option<&str>) -> QueryKey {
    QueryKey::new(["doctors", "all"])
        .with_optional_param("specialization", specialization_filter(specialization))
}

pub fn specializations_key() -> QueryKey {
    QueryKey::new(["specializations"])
}

/// Cached reads over [`DoctorService`].
#[derive(Clone)]
pub struct DoctorQueries {
    service: DoctorService,
    client: QueryClient,
}

impl DoctorQueries {
    pub fn new(service: DoctorService, client: QueryClient) -> Self {
        Self { service, client }
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    pub async fn specializations(&self) -> QueryState<Vec<String>> {
        let service = self.service.clone();
        self.client
            .query(specializations_key(), SPECIALIZATIONS_POLICY, move || async move {
                service.get_specializations().await
            })
            .await
    }

    pub async fn doctors(&self, query: DoctorListQuery) -> QueryState<Page<Doctor>> {
        let service = self.service.clone();
        self.client
            .query(doctor_list_key(&query), DOCTOR_LIST_POLICY, move || async move {
                service.get_doctors(&query).await
            })
            .await
    }

    pub async fn all_doctors(&self, specialization: Option<String>) -> QueryState<Vec<Doctor>> {
        let key = all_doctors_key(specialization.as_deref());
        let service = self.service.clone();
        self.client
            .query(key, ALL_DOCTORS_POLICY, move || async move {
                service.get_all_doctors(specialization.as_deref()).await
            })
            .await
    }
}
