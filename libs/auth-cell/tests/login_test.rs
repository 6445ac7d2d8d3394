use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;
use tokio_test::assert_ok;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::models::{LoginForm, RegisterPatientRequest, Route};
use auth_cell::{AuthService, GuardOutcome};
use query_cell::QueryClient;
use shared_api::MedicalApiClient;
use shared_models::auth::Role;
use shared_models::error::AppError;
use shared_storage::{FileStorage, LocalStorage, MemoryStorage, SharedStorage, TOKEN_KEY, USER_KEY};
use shared_utils::test_utils::{MockApiResponses, TestConfig, TestUser};

fn create_service(server: &MockServer, storage: SharedStorage) -> AuthService {
    let config = TestConfig::with_base_url(server.uri()).to_app_config();
    AuthService::new(MedicalApiClient::new(&config, storage), QueryClient::new())
}

#[tokio::test]
async fn test_login_persists_session_and_routes_to_dashboard() {
    let server = MockServer::start().await;
    let user = TestUser::patient("patient@clinic.test");

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({
            "email": "patient@clinic.test",
            "password": "secret",
            "role": "PATIENT"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::login_response(&user, "jwt-1")))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let service = create_service(&server, storage.clone());

    let outcome = service
        .login(LoginForm::new("patient@clinic.test", "secret", Role::Patient))
        .await
        .unwrap();

    assert_eq!(outcome.redirect, Route::PatientDashboard);
    assert_eq!(outcome.session.user, user.to_user());
    assert_eq!(storage.get_item(TOKEN_KEY).unwrap().as_deref(), Some("jwt-1"));
    assert_eq!(service.sessions().load().unwrap(), Some(outcome.session));
    assert!(!service.is_login_pending());
}

#[tokio::test]
async fn test_login_rejection_surfaces_backend_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(MockApiResponses::error(401, "Invalid credentials")))
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let service = create_service(&server, storage.clone());

    let result = service
        .login(LoginForm::new("patient@clinic.test", "wrong", Role::Patient))
        .await;

    assert_matches!(result, Err(AppError::Auth(msg)) if msg == "Invalid credentials");
    assert!(storage.get_item(TOKEN_KEY).unwrap().is_none());
}

#[tokio::test]
async fn test_login_rejection_without_message_uses_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let service = create_service(&server, MemoryStorage::shared());
    let result = service
        .login(LoginForm::new("doc@clinic.test", "pw", Role::Doctor))
        .await;

    assert_matches!(result, Err(AppError::Auth(msg)) if msg == "Login failed");
}

#[tokio::test]
async fn test_login_with_mismatched_role_is_refused_by_guard() {
    let server = MockServer::start().await;
    let user = TestUser::patient("patient@clinic.test");

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::login_response(&user, "jwt-2")))
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let service = create_service(&server, storage.clone());

    let outcome = service
        .login(LoginForm::new("patient@clinic.test", "secret", Role::Doctor))
        .await
        .unwrap();
    assert_eq!(outcome.redirect, Route::DoctorDashboard);

    let guard = service.guard();
    assert_eq!(guard.activate(outcome.redirect), GuardOutcome::Redirect(Route::Login));
    assert!(storage.get_item(USER_KEY).unwrap().is_none());
}

#[tokio::test]
async fn test_session_survives_restart_with_file_storage() {
    let server = MockServer::start().await;
    let user = TestUser::doctor("doc@clinic.test", "Neurologist");

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::login_response(&user, "jwt-3")))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("storage.json");

    let service = create_service(&server, FileStorage::shared(&file));
    assert_ok!(
        service
            .login(LoginForm::new("doc@clinic.test", "pw", Role::Doctor))
            .await
    );

    let restarted = create_service(&server, FileStorage::shared(&file));
    let session = restarted.guard().activate(Route::DoctorDashboard).session().unwrap();
    assert_eq!(session.user.specialization.as_deref(), Some("Neurologist"));

    assert_eq!(restarted.logout().unwrap(), Route::Home);
    assert_eq!(
        create_service(&server, FileStorage::shared(&file))
            .guard()
            .activate(Route::DoctorDashboard),
        GuardOutcome::Redirect(Route::Login)
    );
}

#[tokio::test]
async fn test_register_patient_success_and_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register/patient"))
        .and(body_json(json!({
            "name": "Ana",
            "email": "ana@clinic.test",
            "password": "secret"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "success": true,
            "statusCode": 201,
            "message": "Patient registered successfully",
            "data": null
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/register/patient"))
        .respond_with(ResponseTemplate::new(409).set_body_json(MockApiResponses::error(409, "Email already exists")))
        .mount(&server)
        .await;

    let service = create_service(&server, MemoryStorage::shared());
    let request = RegisterPatientRequest {
        name: "Ana".to_string(),
        email: "ana@clinic.test".to_string(),
        password: "secret".to_string(),
        photo_url: None,
    };

    let message = service.register_patient(request.clone()).await.unwrap();
    assert_eq!(message, "Patient registered successfully");

    let duplicate = RegisterPatientRequest {
        email: "taken@clinic.test".to_string(),
        ..request
    };
    let result = service.register_patient(duplicate).await;
    assert_matches!(result, Err(AppError::Validation(msg)) if msg == "Email already exists");
}
