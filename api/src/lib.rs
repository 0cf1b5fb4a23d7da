//! The HTTP facade (§4.9 / §6): a thin `axum` adapter translating requests
//! into `SessionManager`/`TaskRunner` calls and JSON/binary responses. No
//! business logic beyond argument marshalling and status-code mapping
//! lives here.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
