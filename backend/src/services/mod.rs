pub mod activity_log;
pub mod batch;
pub mod mailer;
pub mod media;
pub mod newsletter;
pub mod tip_analytics;
pub mod traffic;
