//! Command handlers.

pub mod config;
pub mod forget;
pub mod history;
pub mod run;
