pub mod error;
pub mod request;
pub mod response;
pub mod routes;

pub use error::ApiError;
pub use routes::{create_router, AppState};
