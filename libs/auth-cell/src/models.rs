use std::fmt;

use serde::{Deserialize, Serialize};

use shared_models::auth::{Role, Session};

pub const MISSING_LOGIN_FIELDS: &str = "Please fill in all fields";
pub const MISSING_REGISTRATION_FIELDS: &str = "Please fill in all required fields";
pub const LOGIN_FAILED: &str = "Login failed";
pub const REGISTRATION_FAILED: &str = "Registration failed";

// ==============================================================================
// ROUTES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Home,
    Login,
    Register,
    PatientDashboard,
    PatientAppointments,
    DoctorDashboard,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::Register => "/register",
            Route::PatientDashboard => "/patient/dashboard",
            Route::PatientAppointments => "/patient/appointments",
            Route::DoctorDashboard => "/doctor/dashboard",
        }
    }

    /// Role a view demands; `None` for public views.
    pub fn required_role(&self) -> Option<Role> {
        match self {
            Route::PatientDashboard | Route::PatientAppointments => Some(Role::Patient),
            Route::DoctorDashboard => Some(Role::Doctor),
            Route::Home | Route::Login | Route::Register => None,
        }
    }

    pub fn dashboard_for(role: Role) -> Self {
        match role {
            Role::Patient => Route::PatientDashboard,
            Role::Doctor => Route::DoctorDashboard,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

// ==============================================================================
// FORMS
// ==============================================================================

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

impl LoginForm {
    pub fn new(email: impl Into<String>, password: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            role: Some(role),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterPatientRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterDoctorRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub specialization: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

// ==============================================================================
// OUTCOMES
// ==============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    pub session: Session,
    /// Dashboard for the role selected on the form.
    pub redirect: Route,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_route_roles() {
        assert_eq!(Route::DoctorDashboard.required_role(), Some(Role::Doctor));
        assert_eq!(Route::PatientAppointments.required_role(), Some(Role::Patient));
        assert_eq!(Route::Login.required_role(), None);
        assert_eq!(Route::dashboard_for(Role::Patient), Route::PatientDashboard);
        assert_eq!(Route::DoctorDashboard.to_string(), "/doctor/dashboard");
    }

    #[test]
    fn test_register_request_omits_empty_photo() {
        let body = serde_json::to_value(RegisterPatientRequest {
            name: "Ana".to_string(),
            email: "ana@clinic.test".to_string(),
            password: "secret".to_string(),
            photo_url: None,
        })
        .unwrap();

        assert_eq!(body, json!({"name": "Ana", "email": "ana@clinic.test", "password": "secret"}));
    }
}
