pub mod activity_log;
pub mod auth;
pub mod logging;
pub mod rate_limit;
pub mod request_id;

pub use activity_log::activity_log;
pub use auth::{auth, auth_admin, optional_auth};
pub use logging::log_error_responses;
pub use rate_limit::{create_public_rate_limiter, resolve_forwarded_peer};
pub use request_id::{request_id, RequestId};
