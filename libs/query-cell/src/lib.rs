// =====================================================================================
// QUERY CELL - CLIENT-SIDE CACHING & MUTATIONS
// =====================================================================================

pub mod models;
pub mod services;

pub use models::*;
pub use services::{MountedQuery, Mutation, QueryClient, QueryObserver};
