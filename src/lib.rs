//! redfish-collector library
//!
//! Polls Redfish management APIs on a fixed interval and turns configured
//! JSON properties into metric samples.
//!
//! The lifecycle is explicit:
//! 1. [`builder::load_config`] turns the directive tree into a [`model::Registry`]
//! 2. [`scheduler::Poller::initialize`] resolves query names and connects services
//! 3. [`scheduler::Poller::run_cycle`] is called by an external timer
//! 4. [`scheduler::Poller::shutdown`] releases everything

pub mod builder;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod extractor;
pub mod model;
pub mod scheduler;
pub mod sink;
pub mod stats;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging subsystem
///
/// Logs go to stderr; stdout carries metric records.
///
/// # Arguments
/// * `level` - Log level string (trace, debug, info, warn, error)
///
/// # Errors
/// Returns an error if the logging system fails to initialize
pub fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
