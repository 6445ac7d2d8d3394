pub mod directory;
pub mod doctor;
pub mod queries;

pub use directory::DoctorDirectory;
pub use doctor::DoctorService;
pub use queries::DoctorQueries;
