pub mod error;
pub mod handlers;
pub mod server;

pub use error::{ApiError, ApiErrorResponse};
pub use handlers::JoinRequest;
pub use server::{create_router, serve_until, AppState};
