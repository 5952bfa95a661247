pub mod cookies;
pub mod csv;
pub mod email_templates;
pub mod jwt;
pub mod password;
pub mod request;
pub mod slug;
pub mod text;
pub mod time;
pub mod user_agent;

pub use jwt::*;
pub use password::*;
pub use time::*;
