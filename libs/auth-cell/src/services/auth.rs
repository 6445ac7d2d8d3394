use serde_json::{json, Value};
use tracing::{debug, info, warn};

use query_cell::{Mutation, QueryClient};
use shared_api::{AuthMode, MedicalApiClient};
use shared_models::auth::{LoginResponse, Role, Session};
use shared_models::error::AppError;

use crate::models::{
    LoginForm, LoginOutcome, LoginRequest, RegisterDoctorRequest, RegisterPatientRequest, Route,
    LOGIN_FAILED, MISSING_LOGIN_FIELDS, MISSING_REGISTRATION_FIELDS, REGISTRATION_FAILED,
};
use crate::services::guard::SessionGuard;
use crate::services::session::SessionManager;

pub struct AuthService {
    api: MedicalApiClient,
    queries: QueryClient,
    sessions: SessionManager,
    login: Mutation,
    register: Mutation,
}

impl AuthService {
    pub fn new(api: MedicalApiClient, queries: QueryClient) -> Self {
        let sessions = SessionManager::new(api.storage().clone());
        Self {
            login: Mutation::new("login", queries.clone()),
            register: Mutation::new("registration", queries.clone()),
            api,
            queries,
            sessions,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn guard(&self) -> SessionGuard {
        SessionGuard::new(self.sessions.clone())
    }

    pub fn is_login_pending(&self) -> bool {
        self.login.is_pending()
    }

    pub fn is_registration_pending(&self) -> bool {
        self.register.is_pending()
    }

    /// Sign in and persist the session. The redirect follows the role picked
    /// on the form; the guard on that dashboard rejects a backend user whose
    /// role differs.
    pub async fn login(&self, form: LoginForm) -> Result<LoginOutcome, AppError> {
        let role = match form.role {
            Some(role) if !form.email.trim().is_empty() && !form.password.is_empty() => role,
            _ => return Err(AppError::Validation(MISSING_LOGIN_FIELDS.to_string())),
        };

        let request = LoginRequest {
            email: form.email.trim().to_string(),
            password: form.password,
            role,
        };
        debug!("Logging in {} as {}", request.email, role);

        let response = self
            .login
            .try_mutate(self.send_login(&request))
            .await?;

        let session = Session::from(response);
        if session.role() != role {
            warn!(
                "Backend returned role {} for a {} login of user {}",
                session.role(),
                role,
                session.user.id
            );
        }

        self.sessions.save(&session)?;
        info!("User {} logged in", session.user.id);

        Ok(LoginOutcome {
            session,
            redirect: Route::dashboard_for(role),
        })
    }

    async fn send_login(&self, request: &LoginRequest) -> Result<LoginResponse, AppError> {
        let body = serde_json::to_value(request)?;
        match self
            .api
            .post::<LoginResponse>("/auth/login", body, AuthMode::Public)
            .await
        {
            Ok(response) => Ok(response.data),
            Err(AppError::Network(msg)) => Err(AppError::Network(msg)),
            Err(AppError::Serialization(msg)) => Err(AppError::Serialization(msg)),
            Err(err) => Err(AppError::Auth(non_generic(err.message(), LOGIN_FAILED))),
        }
    }

    pub async fn register_patient(&self, request: RegisterPatientRequest) -> Result<String, AppError> {
        if [&request.name, &request.email, &request.password]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(AppError::Validation(MISSING_REGISTRATION_FIELDS.to_string()));
        }

        let body = serde_json::to_value(&request)?;
        self.send_registration("/auth/register/patient", body).await
    }

    pub async fn register_doctor(&self, request: RegisterDoctorRequest) -> Result<String, AppError> {
        if [&request.name, &request.email, &request.password, &request.specialization]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(AppError::Validation(MISSING_REGISTRATION_FIELDS.to_string()));
        }

        let body = serde_json::to_value(&request)?;
        self.send_registration("/auth/register/doctor", body).await
    }

    async fn send_registration(&self, path: &str, body: Value) -> Result<String, AppError> {
        let response = self
            .register
            .try_mutate(async {
                self.api
                    .post::<Option<Value>>(path, body, AuthMode::Public)
                    .await
                    .map_err(|err| match err {
                        AppError::Validation(msg) | AppError::Auth(msg) | AppError::Server(msg)
                        | AppError::NotFound(msg) => {
                            AppError::Validation(non_generic(&msg, REGISTRATION_FAILED))
                        }
                        other => other,
                    })
            })
            .await?;

        info!("Registration accepted at {}", path);
        Ok(response
            .message
            .unwrap_or_else(|| "Registration successful".to_string()))
    }

    /// Drop the persisted session and everything cached for it.
    pub fn logout(&self) -> Result<Route, AppError> {
        self.sessions.clear()?;
        self.queries.clear();
        info!("Logged out");
        Ok(Route::Home)
    }

    /// Session currently persisted, if it is valid for `role`.
    pub fn current_session(&self, role: Role) -> Result<Option<Session>, AppError> {
        Ok(self.sessions.load()?.filter(|session| session.role() == role))
    }
}

fn non_generic(message: &str, fallback: &str) -> String {
    if message == shared_models::error::GENERIC_FAILURE_MESSAGE {
        fallback.to_string()
    } else {
        message.to_string()
    }
}
