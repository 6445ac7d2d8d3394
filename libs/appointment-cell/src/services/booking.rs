use std::time::Duration;

use chrono::NaiveDate;
use tokio::time::Instant;
use tracing::{debug, info};

use doctor_cell::Doctor;
use shared_models::error::AppError;

use crate::models::AppointmentError;
use crate::services::mutations::AppointmentMutations;

/// How long the confirmation stays on screen before the dialog resets.
pub const CONFIRMATION_DISPLAY: Duration = Duration::from_secs(2);

pub const BOOKING_SUCCESS_MESSAGE: &str = "Appointment booked successfully!";
pub const BOOKING_FAILED_MESSAGE: &str = "Booking failed";

#[derive(Debug, Clone, PartialEq)]
pub enum BookingResult {
    Idle,
    Success { message: String, shown_at: Instant },
    Error(String),
}

/// Transient state of the "Book Appointment" dialog.
pub struct BookingDialog {
    mutations: AppointmentMutations,
    doctor_id: Option<String>,
    doctor: Option<Doctor>,
    date: Option<NaiveDate>,
    result: BookingResult,
}

impl BookingDialog {
    pub fn new(mutations: AppointmentMutations) -> Self {
        Self {
            mutations,
            doctor_id: None,
            doctor: None,
            date: None,
            result: BookingResult::Idle,
        }
    }

    pub fn open(&mut self, doctor: Doctor) {
        self.open_for(doctor.id.clone());
        self.doctor = Some(doctor);
    }

    /// Open for a doctor known only by id, without its directory card.
    pub fn open_for(&mut self, doctor_id: impl Into<String>) {
        let doctor_id = doctor_id.into();
        debug!("Opening booking dialog for doctor {}", doctor_id);
        self.doctor_id = Some(doctor_id);
        self.doctor = None;
        self.date = None;
        self.result = BookingResult::Idle;
    }

    pub fn close(&mut self) {
        self.doctor_id = None;
        self.doctor = None;
        self.date = None;
        self.result = BookingResult::Idle;
    }

    pub fn is_open(&self) -> bool {
        self.doctor_id.is_some()
    }

    pub fn doctor_id(&self) -> Option<&str> {
        self.doctor_id.as_deref()
    }

    pub fn doctor(&self) -> Option<&Doctor> {
        self.doctor.as_ref()
    }

    pub fn selected_date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn result(&self) -> &BookingResult {
        &self.result
    }

    /// Days before `today` are not selectable.
    pub fn select_date(&mut self, date: NaiveDate, today: NaiveDate) -> Result<(), AppError> {
        if date < today {
            return Err(AppointmentError::PastDate(date).into());
        }
        self.date = Some(date);
        Ok(())
    }

    /// Whether the confirm control is enabled.
    pub fn can_confirm(&self) -> bool {
        self.doctor_id.is_some() && self.date.is_some() && !self.mutations.is_booking()
    }

    /// Submit the booking. On failure the error is kept inline and the
    /// selection stays for a retry.
    pub async fn confirm(&mut self, today: NaiveDate) -> Result<(), AppError> {
        let doctor_id = self
            .doctor_id
            .clone()
            .ok_or(AppointmentError::NoDoctorSelected)?;
        let date = self.date.ok_or(AppointmentError::NoDateSelected)?;

        match self.mutations.book(&doctor_id, date, today).await {
            Ok(receipt) => {
                let message = receipt
                    .message
                    .unwrap_or_else(|| BOOKING_SUCCESS_MESSAGE.to_string());
                info!("Booked doctor {} on {}", doctor_id, date);
                self.date = None;
                self.result = BookingResult::Success {
                    message,
                    shown_at: Instant::now(),
                };
                Ok(())
            }
            Err(err) => {
                let message = match err.message() {
                    "" => BOOKING_FAILED_MESSAGE.to_string(),
                    msg => msg.to_string(),
                };
                self.result = BookingResult::Error(message);
                Err(err)
            }
        }
    }

    /// Advance the dialog clock. Returns true when the confirmation has been
    /// shown long enough and the dialog reset.
    pub fn tick(&mut self, now: Instant) -> bool {
        match &self.result {
            BookingResult::Success { shown_at, .. }
                if now.saturating_duration_since(*shown_at) >= CONFIRMATION_DISPLAY =>
            {
                debug!("Closing booking dialog after confirmation");
                self.close();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use query_cell::QueryClient;
    use shared_api::MedicalApiClient;
    use shared_config::AppConfig;
    use shared_storage::MemoryStorage;

    use crate::services::appointment::AppointmentService;

    fn dialog() -> BookingDialog {
        let config = AppConfig {
            api_base_url: "http://127.0.0.1:9".to_string(),
            ..AppConfig::default()
        };
        let api = MedicalApiClient::new(&config, MemoryStorage::shared());
        BookingDialog::new(AppointmentMutations::new(AppointmentService::new(api), QueryClient::new()))
    }

    fn doctor() -> Doctor {
        Doctor {
            id: "d-1".to_string(),
            name: "Dr. Lee".to_string(),
            email: "lee@clinic.test".to_string(),
            specialization: "Dentist".to_string(),
            photo_url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_past_dates_not_selectable() {
        let mut dialog = dialog();
        dialog.open(doctor());
        let today = NaiveDate::from_ymd_opt(2030, 1, 15).unwrap();

        assert!(dialog.select_date(today.pred_opt().unwrap(), today).is_err());
        assert!(!dialog.can_confirm());

        dialog.select_date(today, today).unwrap();
        assert!(dialog.can_confirm());
    }

    #[tokio::test]
    async fn test_confirm_without_date_fails_locally() {
        let mut dialog = dialog();
        dialog.open(doctor());
        let today = NaiveDate::from_ymd_opt(2030, 1, 15).unwrap();

        let err = dialog.confirm(today).await.unwrap_err();
        assert_eq!(err, AppError::Validation("Please select a date".to_string()));
        assert!(dialog.is_open());
    }

    #[tokio::test]
    async fn test_confirm_without_doctor_fails_locally() {
        let mut dialog = dialog();
        let today = NaiveDate::from_ymd_opt(2030, 1, 15).unwrap();
        assert!(dialog.select_date(today, today).is_ok());

        let err = dialog.confirm(today).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(!dialog.is_open());
    }

    #[test]
    fn test_open_by_id_only() {
        let mut dialog = dialog();
        dialog.open_for("d-9");
        assert!(dialog.is_open());
        assert_eq!(dialog.doctor_id(), Some("d-9"));
        assert!(dialog.doctor().is_none());

        dialog.open(doctor());
        assert_eq!(dialog.doctor_id(), Some("d-1"));
        assert!(dialog.doctor().is_some());
    }

    #[test]
    fn test_tick_before_success_is_noop() {
        let mut dialog = dialog();
        dialog.open(doctor());
        assert!(!dialog.tick(Instant::now() + CONFIRMATION_DISPLAY));
        assert!(dialog.is_open());
    }
}
