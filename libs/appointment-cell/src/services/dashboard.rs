use tracing::debug;

use query_cell::{MountedQuery, QueryState};
use shared_models::envelope::{Page, Pagination};
use shared_models::error::AppError;

use crate::models::{
    Appointment, AppointmentListView, AppointmentStats, DoctorAppointmentsFilter,
    DoctorDashboardView, PatientAppointmentsFilter, StatusChange, UpdateStatus,
};
use crate::services::mutations::AppointmentMutations;
use crate::services::queries::{
    doctor_appointments_key, patient_appointments_key, AppointmentQueries,
};

/// "My Appointments" for a signed-in patient.
#[derive(Clone)]
pub struct PatientAppointments {
    queries: AppointmentQueries,
    mutations: AppointmentMutations,
    mounted: MountedQuery,
}

impl PatientAppointments {
    pub fn new(queries: AppointmentQueries, mutations: AppointmentMutations) -> Self {
        Self {
            queries,
            mutations,
            mounted: MountedQuery::new(),
        }
    }

    pub async fn load(&self, filter: PatientAppointmentsFilter) -> AppointmentListView {
        self.mounted
            .mount(self.queries.client(), &patient_appointments_key(&filter));
        let state = self.queries.patient_appointments(filter).await;
        list_view(state, &self.mutations)
    }

    pub fn is_cancelling(&self) -> bool {
        self.mutations.is_updating()
    }

    pub async fn cancel(&self, appointment_id: &str) -> Result<StatusChange, AppError> {
        self.mutations
            .update_status(appointment_id, UpdateStatus::Cancelled)
            .await
    }
}

/// The doctor's dashboard: filtered appointment list plus per-page counts.
#[derive(Clone)]
pub struct DoctorDashboard {
    queries: AppointmentQueries,
    mutations: AppointmentMutations,
    mounted: MountedQuery,
}

impl DoctorDashboard {
    pub fn new(queries: AppointmentQueries, mutations: AppointmentMutations) -> Self {
        Self {
            queries,
            mutations,
            mounted: MountedQuery::new(),
        }
    }

    pub async fn load(&self, filter: DoctorAppointmentsFilter) -> DoctorDashboardView {
        self.mounted
            .mount(self.queries.client(), &doctor_appointments_key(&filter));
        let state = self.queries.doctor_appointments(filter).await;
        let list = list_view(state, &self.mutations);
        let stats = AppointmentStats::from_appointments(&list.appointments);
        DoctorDashboardView { list, stats }
    }

    pub fn is_updating(&self) -> bool {
        self.mutations.is_updating()
    }

    pub async fn complete(&self, appointment_id: &str) -> Result<StatusChange, AppError> {
        self.mutations
            .update_status(appointment_id, UpdateStatus::Completed)
            .await
    }

    pub async fn cancel(&self, appointment_id: &str) -> Result<StatusChange, AppError> {
        self.mutations
            .update_status(appointment_id, UpdateStatus::Cancelled)
            .await
    }
}

fn list_view(state: QueryState<Page<Appointment>>, mutations: &AppointmentMutations) -> AppointmentListView {
    let (appointments, pagination) = match state.data.as_deref() {
        Some(page) => (page.items.clone(), page.pagination),
        None => (Vec::new(), Pagination::single(0)),
    };

    debug!(
        "Rendering {} appointments (stale: {}, error: {})",
        appointments.len(),
        state.is_stale,
        state.error.is_some()
    );
    let appointments = mutations.reconcile(appointments);

    AppointmentListView {
        appointments,
        pagination,
        is_stale: state.is_stale,
        error: state.error,
    }
}
