use query_cell::{CachePolicy, QueryClient, QueryKey, QueryState};
use shared_models::envelope::Page;

use crate::models::{Appointment, DoctorAppointmentsFilter, PatientAppointmentsFilter, DATE_FORMAT};
use crate::services::appointment::AppointmentService;

pub const APPOINTMENTS_POLICY: CachePolicy = CachePolicy::minutes(2, 5);

/// Every appointment list lives under this prefix; writes invalidate all of it.
pub fn appointments_family() -> QueryKey {
    QueryKey::new(["appointments"])
}

pub fn patient_appointments_key(filter: &PatientAppointmentsFilter) -> QueryKey {
    QueryKey::new(["appointments", "patient"])
        .with_optional_param("status", filter.status)
        .with_param("page", filter.page.max(1))
}

pub fn doctor_appointments_key(filter: &DoctorAppointmentsFilter) -> QueryKey {
    QueryKey::new(["appointments", "doctor"])
        .with_optional_param("status", filter.status)
        .with_optional_param("date", filter.date.map(|d| d.format(DATE_FORMAT)))
        .with_param("page", filter.page.max(1))
}

/// Cached appointment lists.
#[derive(Clone)]
pub struct AppointmentQueries {
    service: AppointmentService,
    client: QueryClient,
}

impl AppointmentQueries {
    pub fn new(service: AppointmentService, client: QueryClient) -> Self {
        Self { service, client }
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    pub async fn patient_appointments(&self, filter: PatientAppointmentsFilter) -> QueryState<Page<Appointment>> {
        let service = self.service.clone();
        self.client
            .query(patient_appointments_key(&filter), APPOINTMENTS_POLICY, move || async move {
                service.get_patient_appointments(&filter).await
            })
            .await
    }

    pub async fn doctor_appointments(&self, filter: DoctorAppointmentsFilter) -> QueryState<Page<Appointment>> {
        let service = self.service.clone();
        self.client
            .query(doctor_appointments_key(&filter), APPOINTMENTS_POLICY, move || async move {
                service.get_doctor_appointments(&filter).await
            })
            .await
    }
}
