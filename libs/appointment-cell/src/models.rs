// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use shared_models::envelope::Pagination;
use shared_models::error::AppError;

/// Status filter value meaning "every status".
pub const ALL_STATUSES: &str = "all";

pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub doctor_id: String,
    pub patient_id: String,
    pub date: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<DoctorSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<PatientSummary>,
}

impl Appointment {
    pub fn calendar_date(&self) -> NaiveDate {
        self.date.date_naive()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub specialization: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AppointmentStatus {
    Pending,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "PENDING",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    /// Only PENDING moves, and only forward.
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        matches!(
            (self, next),
            (
                AppointmentStatus::Pending,
                AppointmentStatus::Completed | AppointmentStatus::Cancelled
            )
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(AppointmentStatus::Pending),
            "COMPLETED" => Ok(AppointmentStatus::Completed),
            "CANCELLED" => Ok(AppointmentStatus::Cancelled),
            _ => Err(AppointmentError::InvalidStatus(s.to_string())),
        }
    }
}

/// Statuses a client may request through the update endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpdateStatus {
    Completed,
    Cancelled,
}

impl From<UpdateStatus> for AppointmentStatus {
    fn from(status: UpdateStatus) -> Self {
        match status {
            UpdateStatus::Completed => AppointmentStatus::Completed,
            UpdateStatus::Cancelled => AppointmentStatus::Cancelled,
        }
    }
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        AppointmentStatus::from(*self).fmt(f)
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookAppointmentRequest {
    pub doctor_id: String,
    /// Serialised as `YYYY-MM-DD`.
    pub date: NaiveDate,
}

impl BookAppointmentRequest {
    /// Past dates are refused here, before any request is built.
    pub fn new(doctor_id: impl Into<String>, date: NaiveDate, today: NaiveDate) -> Result<Self, AppointmentError> {
        if date < today {
            return Err(AppointmentError::PastDate(date));
        }
        Ok(Self {
            doctor_id: doctor_id.into(),
            date,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateStatusRequest {
    pub appointment_id: String,
    pub status: UpdateStatus,
}

/// Filter for the patient's own appointment list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientAppointmentsFilter {
    pub status: Option<AppointmentStatus>,
    pub page: u32,
}

impl Default for PatientAppointmentsFilter {
    fn default() -> Self {
        Self { status: None, page: 1 }
    }
}

impl PatientAppointmentsFilter {
    pub fn to_query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(status) = self.status {
            params.push(("status", status.to_string()));
        }
        params.push(("page", self.page.max(1).to_string()));
        params
    }
}

/// Filter for the doctor dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorAppointmentsFilter {
    pub status: Option<AppointmentStatus>,
    pub date: Option<NaiveDate>,
    pub page: u32,
}

impl Default for DoctorAppointmentsFilter {
    fn default() -> Self {
        Self {
            status: None,
            date: None,
            page: 1,
        }
    }
}

impl DoctorAppointmentsFilter {
    /// Build from raw selector values: status may be "all" or empty, date
    /// may be empty or `YYYY-MM-DD`.
    pub fn from_selectors(status: &str, date: &str, page: u32) -> Result<Self, AppointmentError> {
        Ok(Self {
            status: parse_status_filter(status)?,
            date: parse_date_filter(date)?,
            page: page.max(1),
        })
    }

    pub fn to_query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(status) = self.status {
            params.push(("status", status.to_string()));
        }
        if let Some(date) = self.date {
            params.push(("date", date.format(DATE_FORMAT).to_string()));
        }
        params.push(("page", self.page.max(1).to_string()));
        params
    }
}

pub fn parse_status_filter(value: &str) -> Result<Option<AppointmentStatus>, AppointmentError> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case(ALL_STATUSES) {
        return Ok(None);
    }
    value.parse().map(Some)
}

pub fn parse_date_filter(value: &str) -> Result<Option<NaiveDate>, AppointmentError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(Some)
        .map_err(|_| AppointmentError::InvalidDate(value.to_string()))
}

// ==============================================================================
// RESULT MODELS
// ==============================================================================

/// Message and (when the backend sends one) the appointment affected by a
/// booking or status update.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentReceipt {
    pub message: Option<String>,
    pub appointment: Option<Appointment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    /// The backend accepted the update.
    Applied(AppointmentReceipt),
    /// The appointment already had the requested status; nothing was sent.
    AlreadyApplied {
        status: AppointmentStatus,
        appointment: Option<Appointment>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AppointmentStats {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub cancelled: usize,
}

impl AppointmentStats {
    pub fn from_appointments(appointments: &[Appointment]) -> Self {
        appointments
            .iter()
            .fold(Self::default(), |mut stats, appointment| {
                stats.total += 1;
                match appointment.status {
                    AppointmentStatus::Pending => stats.pending += 1,
                    AppointmentStatus::Completed => stats.completed += 1,
                    AppointmentStatus::Cancelled => stats.cancelled += 1,
                }
                stats
            })
    }
}

/// One page of appointments as a list view renders it.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentListView {
    pub appointments: Vec<Appointment>,
    pub pagination: Pagination,
    pub is_stale: bool,
    pub error: Option<AppError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoctorDashboardView {
    pub list: AppointmentListView,
    pub stats: AppointmentStats,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Please select a doctor")]
    NoDoctorSelected,

    #[error("Please select a date")]
    NoDateSelected,

    #[error("Cannot book an appointment in the past ({0})")]
    PastDate(NaiveDate),

    #[error("Invalid date: {0} (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("Unknown appointment status: {0}")]
    InvalidStatus(String),

    #[error("Appointment is already {from} and cannot be marked {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_transitions() {
        use AppointmentStatus::*;

        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Completed));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_booking_request_wire_format() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let request = BookAppointmentRequest::new("d-1", today, today).unwrap();

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"doctorId": "d-1", "date": "2026-03-10"})
        );
    }

    #[test]
    fn test_past_date_rejected() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let yesterday = today.pred_opt().unwrap();

        assert_eq!(
            BookAppointmentRequest::new("d-1", yesterday, today),
            Err(AppointmentError::PastDate(yesterday))
        );
    }

    #[test]
    fn test_appointment_parses_nested_parties() {
        let appointment: Appointment = serde_json::from_value(json!({
            "id": "a-1",
            "doctorId": "d-1",
            "patientId": "p-1",
            "date": "2026-03-12T00:00:00.000Z",
            "status": "PENDING",
            "createdAt": "2026-03-01T09:00:00.000Z",
            "updatedAt": "2026-03-01T09:00:00.000Z",
            "doctor": {"id": "d-1", "name": "Dr. Lee", "email": "lee@clinic.test", "specialization": "Dentist"}
        }))
        .unwrap();

        assert_eq!(appointment.status, AppointmentStatus::Pending);
        assert_eq!(appointment.calendar_date(), NaiveDate::from_ymd_opt(2026, 3, 12).unwrap());
        assert_eq!(appointment.doctor.unwrap().name, "Dr. Lee");
        assert!(appointment.patient.is_none());
    }

    #[test]
    fn test_doctor_filter_selectors() {
        let filter = DoctorAppointmentsFilter::from_selectors("all", "", 0).unwrap();
        assert_eq!(filter, DoctorAppointmentsFilter::default());
        assert_eq!(filter.to_query_params(), vec![("page", "1".to_string())]);

        let filter = DoctorAppointmentsFilter::from_selectors("completed", "2026-03-12", 2).unwrap();
        assert_eq!(
            filter.to_query_params(),
            vec![
                ("status", "COMPLETED".to_string()),
                ("date", "2026-03-12".to_string()),
                ("page", "2".to_string()),
            ]
        );

        assert_eq!(
            DoctorAppointmentsFilter::from_selectors("all", "12/03/2026", 1),
            Err(AppointmentError::InvalidDate("12/03/2026".to_string()))
        );
    }

    #[test]
    fn test_update_request_body() {
        let request = UpdateStatusRequest {
            appointment_id: "a-1".to_string(),
            status: UpdateStatus::Cancelled,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"appointment_id": "a-1", "status": "CANCELLED"})
        );
    }
}
