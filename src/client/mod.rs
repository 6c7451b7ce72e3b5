//! Service connection handles
//!
//! One [`Connection`] per configured service, created by a [`Connector`] at
//! initialization. A fetch returns a boxed future so the scheduler can hand
//! it to a spawned task and move on; the task is the completion callback.
//!
//! Implementations must tolerate concurrent `fetch` calls on one handle: the
//! scheduler does not serialize fetches per service, and a slow service may
//! have fetches from several cycles in flight at once.
//!
//! # Example
//!
//! ```ignore
//! use redfish_collector::client::{Connector, HttpConnector};
//!
//! let connector = HttpConnector::new(5000, true);
//! let conn = connector.connect(&service)?;
//! let payload = conn.fetch("/redfish/v1/Chassis/1/Thermal").await?;
//! ```

mod http;

pub use http::{HttpConnector, RedfishClient};

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::{ConnectError, FetchError};
use crate::model::Service;

/// Result of one fetch
pub type FetchResult = Result<Value, FetchError>;

/// Live, authenticated handle to one service
pub trait Connection: Send + Sync {
    /// Fetch the JSON document at `path` (relative to the service host)
    ///
    /// The returned future owns everything it needs, so it can outlive the
    /// borrow of `self`.
    fn fetch(&self, path: &str) -> BoxFuture<'static, FetchResult>;

    /// Release the handle; later fetches fail with [`FetchError::Closed`]
    fn close(&self);
}

/// Factory for connection handles
pub trait Connector: Send + Sync {
    /// Create a handle for `service`, authenticated per its [`crate::model::Auth`]
    ///
    /// # Errors
    /// A [`ConnectError`] when the handle cannot be created; the caller
    /// decides whether that is fatal.
    fn connect(&self, service: &Service) -> Result<Arc<dyn Connection>, ConnectError>;
}
