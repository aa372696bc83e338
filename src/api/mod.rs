//! JSON-over-HTTP API.
//!
//! Routes live under `/api/`. Everything except `/api/health` sits behind
//! the middleware stack Trace → Auth → Audit → Handler.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_server, ApiServer, ServerError};
pub use types::{ApiContext, UserContext};
