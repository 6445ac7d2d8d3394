use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, Session, User};
use shared_storage::{LocalStorage, MemoryStorage, SharedStorage, TOKEN_KEY, USER_KEY};

pub struct TestConfig {
    pub api_base_url: String,
    pub doctors_page_size: u32,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:4000/api/v1".to_string(),
            doctors_page_size: 6,
        }
    }
}

impl TestConfig {
    /// Config pointed at a mock backend, typically `MockServer::uri()`.
    pub fn with_base_url(url: impl Into<String>) -> Self {
        Self {
            api_base_url: url.into(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            api_base_url: self.api_base_url.clone(),
            doctors_page_size: self.doctors_page_size,
            ..AppConfig::default()
        }
    }
}

pub struct TestUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub specialization: Option<String>,
}

impl TestUser {
    pub fn new(name: &str, email: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            role,
            specialization: None,
        }
    }

    pub fn patient(email: &str) -> Self {
        Self::new("Test Patient", email, Role::Patient)
    }

    pub fn doctor(email: &str, specialization: &str) -> Self {
        Self {
            specialization: Some(specialization.to_string()),
            ..Self::new("Dr. Test", email, Role::Doctor)
        }
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            specialization: self.specialization.clone(),
            photo_url: None,
        }
    }

    pub fn to_session(&self) -> Session {
        Session::new(format!("test-token-{}", self.id), self.to_user())
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.to_user()).unwrap_or(Value::Null)
    }
}

/// In-memory storage with a persisted session already in place.
pub fn storage_with_session(session: &Session) -> SharedStorage {
    let storage = Arc::new(MemoryStorage::new());
    let user = serde_json::to_string(&session.user).unwrap_or_default();
    let _ = storage.set_items(&[(TOKEN_KEY, session.token.as_str()), (USER_KEY, user.as_str())]);
    storage
}

pub struct MockApiResponses;

impl MockApiResponses {
    pub fn envelope(data: Value) -> Value {
        json!({
            "success": true,
            "statusCode": 200,
            "message": "Request successful",
            "data": data
        })
    }

    pub fn paginated(data: Vec<Value>, page: u32, limit: u32, total: u64) -> Value {
        let total_pages = if limit == 0 {
            1
        } else {
            ((total + limit as u64 - 1) / limit as u64).max(1)
        };

        json!({
            "success": true,
            "statusCode": 200,
            "message": "Request successful",
            "data": data,
            "page": page,
            "limit": limit,
            "total": total,
            "totalPages": total_pages
        })
    }

    pub fn error(status: u16, message: &str) -> Value {
        json!({
            "success": false,
            "statusCode": status,
            "message": message
        })
    }

    pub fn login_response(user: &TestUser, token: &str) -> Value {
        Self::envelope(json!({
            "user": user.to_json(),
            "token": token
        }))
    }

    pub fn doctor(id: &str, name: &str, specialization: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "email": format!("{}@clinic.test", id),
            "specialization": specialization,
            "photo_url": null,
            "createdAt": "2024-01-01T00:00:00.000Z"
        })
    }

    pub fn appointment(id: &str, doctor_id: &str, patient_id: &str, status: &str) -> Value {
        let date = (Utc::now() + Duration::days(3)).format("%Y-%m-%dT00:00:00.000Z").to_string();
        json!({
            "id": id,
            "doctorId": doctor_id,
            "patientId": patient_id,
            "date": date,
            "status": status,
            "createdAt": "2024-01-01T00:00:00.000Z",
            "updatedAt": "2024-01-01T00:00:00.000Z",
            "doctor": {
                "id": doctor_id,
                "name": "Dr. Test",
                "email": "doctor@clinic.test",
                "specialization": "Cardiologist"
            },
            "patient": {
                "id": patient_id,
                "name": "Test Patient",
                "email": "patient@clinic.test"
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::with_base_url("http://127.0.0.1:1234").to_app_config();
        assert_eq!(config.api_base_url, "http://127.0.0.1:1234");
        assert_eq!(config.doctors_page_size, 6);
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::doctor("doc@clinic.test", "Dentist");
        let model = user.to_user();
        assert_eq!(model.role, Role::Doctor);
        assert_eq!(model.specialization.as_deref(), Some("Dentist"));
        assert_eq!(user.to_json()["role"], "DOCTOR");
    }

    #[test]
    fn test_storage_with_session() {
        let session = TestUser::patient("p@clinic.test").to_session();
        let storage = storage_with_session(&session);
        assert_eq!(storage.get_item(TOKEN_KEY).unwrap(), Some(session.token.clone()));
        assert!(storage.get_item(USER_KEY).unwrap().unwrap().contains("PATIENT"));
    }

    #[test]
    fn test_paginated_total_pages() {
        let body = MockApiResponses::paginated(vec![], 1, 6, 13);
        assert_eq!(body["totalPages"], 3);
    }
}
