//! # vnfm-lifecycle
//!
//! Lifecycle orchestration engine for virtualized network function (VNF)
//! instances.
//!
//! Every lifecycle operation (create, update, delete, scale) is sequenced as
//! pre / invoke / post / wait phases. The synchronous part runs on the
//! caller's path and returns as soon as the backend has accepted the request;
//! the long-running wait, configure and monitor phases run as detached
//! continuations on a bounded [`executor::BackgroundExecutor`].
//!
//! ## Core Concepts
//!
//! - **Status state machine** ([`status::VnfStatus`]): the closed set of
//!   states a VNF moves through, with an explicit edge table
//! - **Status tracker** ([`tracker::StatusTracker`]): guarded
//!   (compare-and-swap) transitions at the persistence boundary
//! - **Driver registries** ([`driver::DriverRegistry`]): name-keyed dispatch
//!   to infrastructure, management and monitor backends
//! - **Orchestrator** ([`orchestrator::VnfmOrchestrator`]): composes the
//!   above into the lifecycle operations
//!
//! ## Guarantees
//!
//! - **Guarded**: a transition is applied only when the current status is in
//!   the caller's expected set; losers get a conflict, never a silent retry
//! - **Settled**: every pending status has exactly one continuation that
//!   resolves it to `ACTIVE`/`DEAD` or `ERROR`, even when a backend fails
//! - **Detached**: continuation failures are persisted on the record, never
//!   surfaced to the original caller
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use vnfm_lifecycle::config::VnfmConfig;
//! use vnfm_lifecycle::context::RequestContext;
//! use vnfm_lifecycle::driver::noop::{NoopInfraDriver, NoopMgmtDriver};
//! use vnfm_lifecycle::error::Result;
//! use vnfm_lifecycle::orchestrator::VnfmOrchestrator;
//! use vnfm_lifecycle::store::memory::InMemoryStore;
//! use vnfm_lifecycle::vim::StaticVimResolver;
//!
//! # async fn example() -> Result<()> {
//! let config = VnfmConfig::from_env()?;
//! config.init_logging();
//!
//! let orchestrator = VnfmOrchestrator::builder(config)
//!     .store(Arc::new(InMemoryStore::new()))
//!     .vim_resolver(Arc::new(StaticVimResolver::single("vim-1", "default-vim")))
//!     .infra_driver("noop", Arc::new(NoopInfraDriver::new()))
//!     .mgmt_driver("noop", Arc::new(NoopMgmtDriver))
//!     .build()?;
//!
//! let ctx = RequestContext::new("tenant-a");
//! let vnfds = orchestrator.list_vnfds().await?;
//! # let _ = (ctx, vnfds);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod context;
pub mod descriptor;
pub mod driver;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod mgmt;
pub mod monitor;
pub mod orchestrator;
pub mod policy;
pub mod status;
pub mod store;
pub mod tracker;
pub mod vim;
pub mod vnf;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::VnfmConfig;
    pub use crate::context::RequestContext;
    pub use crate::descriptor::{PolicyDeclaration, Vnfd};
    pub use crate::driver::{DriverError, DriverKind, DriverRegistry, InfraArgs, InfraDriver, MgmtDriver};
    pub use crate::error::{Error, Result};
    pub use crate::executor::BackgroundExecutor;
    pub use crate::metrics::LifecycleMetrics;
    pub use crate::mgmt::{MgmtAction, MgmtDispatcher, MgmtHook};
    pub use crate::monitor::{ActionCallback, HealthMonitor, MonitorDriver, VnfMonitor};
    pub use crate::orchestrator::VnfmOrchestrator;
    pub use crate::policy::{ScaleAction, ScaleRequest, ScalingPolicy};
    pub use crate::status::{TransitionReason, VnfStatus};
    pub use crate::store::{CasResult, RecordPatch, VnfStore};
    pub use crate::tracker::{StatusTracker, TransitionOutcome};
    pub use crate::vim::{StaticVimResolver, VimAuth, VimResolver};
    pub use crate::vnf::{CreateVnfRequest, UpdateVnfRequest, VnfRecord};
}
