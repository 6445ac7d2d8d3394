pub mod cache;
pub mod mutation;

pub use cache::{MountedQuery, QueryClient, QueryObserver};
pub use mutation::{Mutation, MUTATION_IN_FLIGHT_MESSAGE};
