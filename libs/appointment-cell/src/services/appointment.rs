use serde_json::Value;
use tracing::{debug, warn};

use shared_api::{AuthMode, MedicalApiClient};
use shared_models::envelope::{ApiResponse, Page};
use shared_models::error::AppError;

use crate::models::{
    Appointment, AppointmentReceipt, BookAppointmentRequest, DoctorAppointmentsFilter,
    PatientAppointmentsFilter, UpdateStatusRequest,
};

/// Appointment endpoints. Every call needs the persisted bearer token.
#[derive(Clone)]
pub struct AppointmentService {
    api: MedicalApiClient,
}

impl AppointmentService {
    pub fn new(api: MedicalApiClient) -> Self {
        Self { api }
    }

    pub async fn book_appointment(&self, request: &BookAppointmentRequest) -> Result<AppointmentReceipt, AppError> {
        debug!("Booking doctor {} on {}", request.doctor_id, request.date);
        let body = serde_json::to_value(request)?;
        let response = self
            .api
            .post::<Option<Value>>("/appointments", body, AuthMode::Bearer)
            .await?;
        Ok(into_receipt(response))
    }

    pub async fn get_patient_appointments(
        &self,
        filter: &PatientAppointmentsFilter,
    ) -> Result<Page<Appointment>, AppError> {
        debug!("Fetching patient appointments {:?}", filter);
        let response = self
            .api
            .get::<Vec<Appointment>>("/appointments/patient", &filter.to_query_params(), AuthMode::Bearer)
            .await?;
        Ok(Page::from(response))
    }

    pub async fn get_doctor_appointments(
        &self,
        filter: &DoctorAppointmentsFilter,
    ) -> Result<Page<Appointment>, AppError> {
        debug!("Fetching doctor appointments {:?}", filter);
        let response = self
            .api
            .get::<Vec<Appointment>>("/appointments/doctor", &filter.to_query_params(), AuthMode::Bearer)
            .await?;
        Ok(Page::from(response))
    }

    pub async fn update_appointment_status(
        &self,
        request: &UpdateStatusRequest,
    ) -> Result<AppointmentReceipt, AppError> {
        debug!("Updating appointment {} to {}", request.appointment_id, request.status);
        let body = serde_json::to_value(request)?;
        let response = self
            .api
            .patch::<Option<Value>>("/appointments/update-status", body, AuthMode::Bearer)
            .await?;
        Ok(into_receipt(response))
    }
}

/// The backend's `data` for writes is loosely shaped; keep the message even
/// when the payload is not a full appointment.
fn into_receipt(response: ApiResponse<Option<Value>>) -> AppointmentReceipt {
    let appointment = response
        .data
        .and_then(|data| match serde_json::from_value::<Appointment>(data) {
            Ok(appointment) => Some(appointment),
            Err(e) => {
                warn!("Write response did not contain a full appointment: {}", e);
                None
            }
        });

    AppointmentReceipt {
        message: response.message,
        appointment,
    }
}
