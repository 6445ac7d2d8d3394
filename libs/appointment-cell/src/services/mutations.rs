use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use query_cell::services::MUTATION_IN_FLIGHT_MESSAGE;
use query_cell::{Mutation, QueryClient};
use shared_models::error::AppError;

use crate::models::{
    Appointment, AppointmentError, AppointmentReceipt, AppointmentStatus, BookAppointmentRequest,
    StatusChange, UpdateStatus, UpdateStatusRequest,
};
use crate::services::appointment::AppointmentService;
use crate::services::queries::appointments_family;

type SharedUpdate = Shared<BoxFuture<'static, Result<AppointmentReceipt, AppError>>>;

/// Past this many remembered appointments, only the latest list is kept.
pub const KNOWN_APPOINTMENTS_LIMIT: usize = 500;

struct InFlightUpdate {
    target: UpdateStatus,
    future: SharedUpdate,
}

#[derive(Default)]
struct UpdateRegistry {
    in_flight: HashMap<String, InFlightUpdate>,
    /// Last appointment state this client saw, by id.
    known: HashMap<String, Appointment>,
    /// Status each id was moved to by this client and not yet confirmed by a
    /// list read.
    applied: HashMap<String, AppointmentStatus>,
}

impl UpdateRegistry {
    fn status_of(&self, appointment_id: &str) -> Option<AppointmentStatus> {
        self.applied
            .get(appointment_id)
            .copied()
            .or_else(|| self.known.get(appointment_id).map(|a| a.status))
    }

    fn prune(&mut self, latest: &[Appointment]) {
        if self.known.len() <= KNOWN_APPOINTMENTS_LIMIT {
            return;
        }
        let keep: HashSet<&str> = latest.iter().map(|a| a.id.as_str()).collect();
        let before = self.known.len();
        self.known.retain(|id, _| keep.contains(id.as_str()));
        self.applied.retain(|id, _| keep.contains(id.as_str()));
        debug!("Forgot {} remembered appointments", before - self.known.len());
    }
}

/// Booking and status writes. Both invalidate every cached appointment list
/// on success.
#[derive(Clone)]
pub struct AppointmentMutations {
    service: AppointmentService,
    booking: Mutation,
    status_update: Mutation,
    registry: Arc<Mutex<UpdateRegistry>>,
}

impl AppointmentMutations {
    pub fn new(service: AppointmentService, client: QueryClient) -> Self {
        Self {
            booking: Mutation::new("book appointment", client.clone()).invalidates(appointments_family()),
            status_update: Mutation::new("update appointment status", client).invalidates(appointments_family()),
            service,
            registry: Arc::new(Mutex::new(UpdateRegistry::default())),
        }
    }

    fn registry(&self) -> MutexGuard<'_, UpdateRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_booking(&self) -> bool {
        self.booking.is_pending()
    }

    pub fn is_updating(&self) -> bool {
        self.status_update.is_pending()
    }

    /// Record appointments a list read returned and give them back with the
    /// status this client applied since. A PENDING copy of an appointment
    /// this client already closed is stale and shows the applied status; any
    /// other copy confirms the server state and clears the applied entry.
    pub fn reconcile(&self, mut appointments: Vec<Appointment>) -> Vec<Appointment> {
        let mut registry = self.registry();
        for appointment in &mut appointments {
            match registry.applied.get(&appointment.id).copied() {
                Some(applied)
                    if appointment.status == AppointmentStatus::Pending && applied.is_terminal() =>
                {
                    debug!(
                        "Showing {} over stale PENDING copy of appointment {}",
                        applied, appointment.id
                    );
                    appointment.status = applied;
                }
                Some(_) => {
                    registry.applied.remove(&appointment.id);
                }
                None => {}
            }
            registry
                .known
                .insert(appointment.id.clone(), appointment.clone());
        }
        registry.prune(&appointments);
        appointments
    }

    pub fn known(&self, appointment_id: &str) -> Option<Appointment> {
        self.registry().known.get(appointment_id).cloned()
    }

    /// Book a date for a doctor. A date before `today` fails without a
    /// request; a second booking while one is pending is refused.
    pub async fn book(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<AppointmentReceipt, AppError> {
        let request = BookAppointmentRequest::new(doctor_id, date, today)?;
        let receipt = self
            .booking
            .try_mutate(self.service.book_appointment(&request))
            .await?;

        if let Some(appointment) = &receipt.appointment {
            self.reconcile(vec![appointment.clone()]);
        }
        Ok(receipt)
    }

    /// Move an appointment to COMPLETED or CANCELLED.
    ///
    /// Concurrent calls for the same id and status share one request; a call
    /// for a different status while one is in flight is refused. When the
    /// status already recorded for the id is the one asked for, no request is
    /// sent; when it is a different terminal status the call is refused.
    pub async fn update_status(
        &self,
        appointment_id: &str,
        status: UpdateStatus,
    ) -> Result<StatusChange, AppError> {
        let target = AppointmentStatus::from(status);

        let update = {
            let mut registry = self.registry();

            if let Some(current) = registry.status_of(appointment_id) {
                if current == target {
                    debug!("Appointment {} is already {}", appointment_id, target);
                    return Ok(StatusChange::AlreadyApplied {
                        status: current,
                        appointment: registry.known.get(appointment_id).cloned(),
                    });
                }
                if !current.can_transition_to(target) {
                    warn!(
                        "Refusing to move appointment {} from {} to {}",
                        appointment_id, current, target
                    );
                    return Err(AppointmentError::InvalidStatusTransition {
                        from: current,
                        to: target,
                    }
                    .into());
                }
            }

            match registry.in_flight.get(appointment_id) {
                Some(update) if update.target == status => {
                    debug!("Joining in-flight status update for {}", appointment_id);
                    update.future.clone()
                }
                Some(update) => {
                    warn!(
                        "Refusing {} for appointment {} while {} is in flight",
                        status, appointment_id, update.target
                    );
                    return Err(AppError::Validation(MUTATION_IN_FLIGHT_MESSAGE.to_string()));
                }
                None => {
                    let future = self.start_update(appointment_id, status);
                    registry.in_flight.insert(
                        appointment_id.to_string(),
                        InFlightUpdate {
                            target: status,
                            future: future.clone(),
                        },
                    );
                    future
                }
            }
        };

        update.await.map(StatusChange::Applied)
    }

    fn start_update(&self, appointment_id: &str, status: UpdateStatus) -> SharedUpdate {
        let mutation = self.status_update.clone();
        let service = self.service.clone();
        let registry = Arc::clone(&self.registry);
        let request = UpdateStatusRequest {
            appointment_id: appointment_id.to_string(),
            status,
        };

        async move {
            let result = mutation
                .mutate(service.update_appointment_status(&request))
                .await;

            let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry.in_flight.remove(&request.appointment_id);

            if let Ok(receipt) = &result {
                let updated = match &receipt.appointment {
                    Some(appointment) => Some(appointment.clone()),
                    None => registry.known.get(&request.appointment_id).cloned().map(|mut known| {
                        known.status = status.into();
                        known
                    }),
                };
                if let Some(updated) = updated {
                    registry.known.insert(request.appointment_id.clone(), updated);
                }
                registry
                    .applied
                    .insert(request.appointment_id.clone(), status.into());
                info!("Appointment {} marked {}", request.appointment_id, status);
            }
            result
        }
        .boxed()
        .shared()
    }
}
