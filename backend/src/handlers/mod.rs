pub mod admin;
pub mod auth;
pub mod common;
pub mod contact;
pub mod events;
pub mod gallery;
pub mod health;
pub mod home;
pub mod newsletter;
pub mod projects;
pub mod settings;
pub mod team;
pub mod tips;
pub mod traffic;
pub mod users;
