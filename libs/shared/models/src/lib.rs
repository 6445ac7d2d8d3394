pub mod auth;
pub mod envelope;
pub mod error;

pub use auth::{Role, Session, User};
pub use envelope::{ApiEnvelope, ApiResponse, Page, Pagination};
pub use error::AppError;
