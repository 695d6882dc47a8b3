pub mod activity;
pub mod error;
pub mod generation;
pub mod itinerary;
pub mod llm;
pub mod plan;
pub mod store;

pub use error::ServiceError;
