pub mod analytics;
pub mod error;
pub mod handlers;
pub mod public;
pub mod routes;

pub use routes::create_api_router;
