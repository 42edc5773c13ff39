//! Order service runtime wiring.

mod config;
mod worker;

pub use config::Config;
pub use worker::Worker;
