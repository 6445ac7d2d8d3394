pub mod appointment;
pub mod booking;
pub mod dashboard;
pub mod mutations;
pub mod queries;

pub use appointment::AppointmentService;
pub use booking::{BookingDialog, BookingResult};
pub use dashboard::{DoctorDashboard, PatientAppointments};
pub use mutations::AppointmentMutations;
pub use queries::AppointmentQueries;
