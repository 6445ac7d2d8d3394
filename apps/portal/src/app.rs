use anyhow::{bail, Result};
use tracing::info;

use appointment_cell::{
    AppointmentMutations, AppointmentQueries, AppointmentService, BookingDialog, DoctorDashboard,
    PatientAppointments,
};
use auth_cell::{AuthService, GuardOutcome, Route};
use doctor_cell::{DoctorDirectory, DoctorQueries, DoctorService};
use query_cell::QueryClient;
use shared_api::MedicalApiClient;
use shared_config::AppConfig;
use shared_models::auth::Session;
use shared_storage::{FileStorage, SharedStorage};

/// Every cell wired to one API client, one storage and one query cache.
pub struct Portal {
    pub queries: QueryClient,
    pub auth: AuthService,
    pub directory: DoctorDirectory,
    pub appointments: AppointmentQueries,
    pub mutations: AppointmentMutations,
}

impl Portal {
    pub fn new(config: &AppConfig) -> Self {
        let storage = FileStorage::shared(&config.storage_path);
        Self::with_storage(config, storage)
    }

    pub fn with_storage(config: &AppConfig, storage: SharedStorage) -> Self {
        info!("Using backend at {}", config.api_base_url);

        let api = MedicalApiClient::new(config, storage);
        let queries = QueryClient::new();

        let doctors = DoctorQueries::new(DoctorService::new(api.clone()), queries.clone());
        let appointment_service = AppointmentService::new(api.clone());

        Self {
            auth: AuthService::new(api, queries.clone()),
            directory: DoctorDirectory::new(doctors, config.doctors_page_size),
            appointments: AppointmentQueries::new(appointment_service.clone(), queries.clone()),
            mutations: AppointmentMutations::new(appointment_service, queries.clone()),
            queries,
        }
    }

    /// Run the session guard for `route`; a refusal becomes an error telling
    /// the user where they were sent.
    pub fn enter(&self, route: Route) -> Result<Option<Session>> {
        match self.auth.guard().activate(route) {
            GuardOutcome::Granted(session) => Ok(Some(session)),
            GuardOutcome::Public => Ok(None),
            GuardOutcome::Redirect(to) => {
                bail!("Access to {} denied, please log in again ({})", route, to)
            }
        }
    }

    pub fn patient_appointments(&self) -> PatientAppointments {
        PatientAppointments::new(self.appointments.clone(), self.mutations.clone())
    }

    pub fn doctor_dashboard(&self) -> DoctorDashboard {
        DoctorDashboard::new(self.appointments.clone(), self.mutations.clone())
    }

    pub fn booking_dialog(&self) -> BookingDialog {
        BookingDialog::new(self.mutations.clone())
    }
}
