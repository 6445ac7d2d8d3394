pub mod client;

pub use client::{AuthMode, MedicalApiClient};
