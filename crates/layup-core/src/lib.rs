//! Core Layup library (auth-flow state, storage backends, notifications, validation, config).

pub mod auth;
pub mod clock;
pub mod config;
pub mod notifications;
pub mod storage;
pub mod validation;
