//! Backend driver dispatch.
//!
//! This module provides:
//!
//! - [`DriverRegistry`]: immutable name-keyed dispatch table for one kind of
//!   backend
//! - [`InfraDriver`]: infrastructure backends (create/update/delete/scale and
//!   their waits)
//! - [`MgmtDriver`]: management backends (lifecycle hooks and notifications)
//! - [`DriverError`]: what a backend reports when it fails
//!
//! Registries are built once from the enabled driver names in configuration.
//! Every invocation is logged, timed and counted, and backend failures are
//! wrapped into [`Error::Driver`] with the driver and operation attached.

pub mod infra;
pub mod mgmt;
pub mod noop;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::Instrument;

use crate::error::{Error, Result};
use crate::metrics::{LifecycleMetrics, TimingGuard};

pub use infra::{InfraArgs, InfraDriver};
pub use mgmt::MgmtDriver;

/// Which registry a driver belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverKind {
    /// Infrastructure drivers.
    Infra,
    /// Management drivers.
    Management,
    /// Health-monitor drivers.
    Monitor,
}

impl DriverKind {
    /// Returns a lowercase label suitable for metrics and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Infra => "infra",
            Self::Management => "mgmt",
            Self::Monitor => "monitor",
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a backend driver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    /// The backend accepted a create but the instance never became ready.
    #[error("{reason}")]
    CreateWaitFailed {
        /// Backend-reported reason.
        reason: String,
    },

    /// The backend rejected or failed an operation.
    #[error("{message}")]
    Backend {
        /// Backend-reported message.
        message: String,
    },

    /// A management driver could not configure or notify the instance.
    #[error("{message}")]
    Management {
        /// Driver-reported message.
        message: String,
    },

    /// The driver does not implement the operation.
    #[error("operation '{operation}' is not supported")]
    Unsupported {
        /// The operation name.
        operation: String,
    },
}

impl DriverError {
    /// Creates a create-wait failure.
    #[must_use]
    pub fn create_wait_failed(reason: impl Into<String>) -> Self {
        Self::CreateWaitFailed {
            reason: reason.into(),
        }
    }

    /// Creates a backend failure.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates a management failure.
    #[must_use]
    pub fn management(message: impl Into<String>) -> Self {
        Self::Management {
            message: message.into(),
        }
    }
}

/// Immutable name-keyed dispatch table for one kind of driver.
///
/// Cloning is cheap; clones share the table.
pub struct DriverRegistry<D: ?Sized> {
    kind: DriverKind,
    drivers: Arc<BTreeMap<String, Arc<D>>>,
    metrics: LifecycleMetrics,
}

impl<D: ?Sized> Clone for DriverRegistry<D> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            drivers: Arc::clone(&self.drivers),
            metrics: self.metrics.clone(),
        }
    }
}

impl<D: ?Sized> fmt::Debug for DriverRegistry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("kind", &self.kind)
            .field("drivers", &self.drivers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<D: ?Sized + Send + Sync> DriverRegistry<D> {
    /// Starts building a registry.
    #[must_use]
    pub fn builder(kind: DriverKind) -> DriverRegistryBuilder<D> {
        DriverRegistryBuilder {
            kind,
            available: BTreeMap::new(),
            metrics: LifecycleMetrics::new(),
        }
    }

    /// Returns the registry kind.
    #[must_use]
    pub const fn kind(&self) -> DriverKind {
        self.kind
    }

    /// Returns the configured driver names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.drivers.keys().cloned().collect()
    }

    /// Returns true if `name` is configured.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    /// Resolves a driver by name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownDriver` if `name` is not configured.
    pub fn get(&self, name: &str) -> Result<Arc<D>> {
        self.drivers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownDriver {
                kind: self.kind,
                driver: name.to_string(),
                available: self.names(),
            })
    }

    /// Invokes `operation` on the named driver.
    ///
    /// # Errors
    ///
    /// Returns `UnknownDriver` if `name` is not configured, or
    /// `Error::Driver` wrapping whatever the backend reported.
    pub async fn invoke<T, F, Fut>(&self, name: &str, operation: &'static str, call: F) -> Result<T>
    where
        F: FnOnce(Arc<D>) -> Fut,
        Fut: Future<Output = std::result::Result<T, DriverError>>,
    {
        let driver = self.get(name)?;
        let kind = self.kind.as_str();
        let span = vnfm_core::observability::driver_span(kind, name, operation);

        let result = {
            let _timer = TimingGuard::new(|elapsed| {
                self.metrics
                    .observe_driver_duration(kind, name, operation, elapsed);
            });
            call(driver).instrument(span).await
        };

        match result {
            Ok(value) => {
                self.metrics.record_driver_call(kind, name, operation, "success");
                tracing::debug!(kind, driver = name, operation, "driver call succeeded");
                Ok(value)
            }
            Err(source) => {
                self.metrics.record_driver_call(kind, name, operation, "failure");
                tracing::debug!(kind, driver = name, operation, error = %source, "driver call failed");
                Err(Error::Driver {
                    kind: self.kind,
                    driver: name.to_string(),
                    operation,
                    source,
                })
            }
        }
    }
}

/// Builder for [`DriverRegistry`].
pub struct DriverRegistryBuilder<D: ?Sized> {
    kind: DriverKind,
    available: BTreeMap<String, Arc<D>>,
    metrics: LifecycleMetrics,
}

impl<D: ?Sized + Send + Sync> DriverRegistryBuilder<D> {
    /// Makes an implementation available under `name`.
    #[must_use]
    pub fn register(mut self, name: impl Into<String>, driver: Arc<D>) -> Self {
        self.available.insert(name.into(), driver);
        self
    }

    /// Sets the metrics recorder.
    #[must_use]
    pub fn metrics(mut self, metrics: LifecycleMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Builds a registry containing exactly the `enabled` drivers.
    ///
    /// # Errors
    ///
    /// Returns `DriverNotAvailable` if an enabled name has no registered
    /// implementation.
    pub fn build<S: AsRef<str>>(self, enabled: &[S]) -> Result<DriverRegistry<D>> {
        let mut drivers = BTreeMap::new();
        for name in enabled {
            let name = name.as_ref();
            let driver = self
                .available
                .get(name)
                .cloned()
                .ok_or_else(|| Error::DriverNotAvailable {
                    kind: self.kind,
                    driver: name.to_string(),
                })?;
            drivers.insert(name.to_string(), driver);
        }
        tracing::info!(kind = %self.kind, drivers = ?drivers.keys().collect::<Vec<_>>(), "driver registry built");
        Ok(DriverRegistry {
            kind: self.kind,
            drivers: Arc::new(drivers),
            metrics: self.metrics,
        })
    }
}
