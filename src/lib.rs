pub mod auth;
pub mod callback;
pub mod config;
pub mod domain;
pub mod error;
pub mod eve;
pub mod poller;
pub mod rates;
pub mod store;
pub mod tracker;

pub use error::{Result, TrackerError};
