pub mod activity_logs;
pub mod users;

pub use activity_logs::*;
pub use users::*;
