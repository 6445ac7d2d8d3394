use tracing::debug;

use shared_api::{AuthMode, MedicalApiClient};
use shared_models::envelope::Page;
use shared_models::error::AppError;

use crate::models::{specialization_filter, Doctor, DoctorListQuery, ALL_DOCTORS_LIMIT};

/// Read-only access to the doctor directory endpoints.
#[derive(Clone)]
pub struct DoctorService {
    api: MedicalApiClient,
}

impl DoctorService {
    pub fn new(api: MedicalApiClient) -> Self {
        Self { api }
    }

    /// Specialization names in the order the backend returns them.
    pub async fn get_specializations(&self) -> Result<Vec<String>, AppError> {
        debug!("Fetching specializations");
        let response = self
            .api
            .get::<Vec<String>>("/specializations", &[], AuthMode::Public)
            .await?;
        Ok(response.data)
    }

    pub async fn get_doctors(&self, query: &DoctorListQuery) -> Result<Page<Doctor>, AppError> {
        debug!(
            "Fetching doctors page {} (limit {}, specialization {:?})",
            query.page,
            query.limit,
            query.specialization_filter()
        );
        let response = self
            .api
            .get::<Vec<Doctor>>("/doctors", &query.to_query_params(), AuthMode::Public)
            .await?;
        Ok(Page::from(response))
    }

    /// Every doctor in one oversized page. The backend has no name search,
    /// so callers filter this list themselves.
    pub async fn get_all_doctors(&self, specialization: Option<&str>) -> Result<Vec<Doctor>, AppError> {
        let query = DoctorListQuery {
            page: 1,
            limit: ALL_DOCTORS_LIMIT,
            specialization: specialization_filter(specialization).map(str::to_string),
        };
        Ok(self.get_doctors(&query).await?.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_config::AppConfig;
    use shared_storage::MemoryStorage;
    use shared_utils::test_utils::MockApiResponses;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service_for(server: &MockServer) -> DoctorService {
        let config = AppConfig {
            api_base_url: server.uri(),
            ..AppConfig::default()
        };
        DoctorService::new(MedicalApiClient::new(&config, MemoryStorage::shared()))
    }

    #[tokio::test]
    async fn test_specializations_need_no_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/specializations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::envelope(json!([
                "Cardiologist",
                "Dentist"
            ]))))
            .expect(1)
            .mount(&server)
            .await;

        let specializations = service_for(&server).get_specializations().await.unwrap();
        assert_eq!(specializations, vec!["Cardiologist", "Dentist"]);
    }

    #[tokio::test]
    async fn test_all_doctors_uses_large_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doctors"))
            .and(query_param("page", "1"))
            .and(query_param("limit", "1000"))
            .and(query_param_is_missing("specialization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::paginated(
                vec![MockApiResponses::doctor("d-1", "Dr. Amal", "Dentist")],
                1,
                1000,
                1,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let doctors = service_for(&server).get_all_doctors(Some("all")).await.unwrap();
        assert_eq!(doctors.len(), 1);
        assert_eq!(doctors[0].name, "Dr. Amal");
    }
}
