pub mod activity_log;
pub mod common;
pub mod contact;
pub mod event;
pub mod gallery;
pub mod project;
pub mod settings;
pub mod subscriber;
pub mod team;
pub mod tip;
pub mod traffic;
pub mod transaction;
pub mod user;
