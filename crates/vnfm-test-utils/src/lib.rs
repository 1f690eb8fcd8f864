//! Shared test utilities for vnfm integration tests.
//!
//! This crate provides:
//! - [`CallLog`]: an ordered record of every driver and monitor call
//! - Recording drivers with scriptable failures ([`RecordingInfraDriver`],
//!   [`RecordingMgmtDriver`], [`RecordingMonitor`], [`ScriptedMonitorDriver`])
//! - [`TestVnfm`]: an orchestrator wired to the recorders
//! - Custom assertion helpers
//!
//! # Example
//!
//! ```rust,ignore
//! use vnfm_test_utils::{TestVnfm, assert_status};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let env = TestVnfm::new();
//!     let vnf = env.create_active_vnf().await;
//!     assert_status(&vnf, VnfStatus::Active);
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod assertions;
pub mod drivers;
pub mod fixtures;

pub use assertions::*;
pub use drivers::*;
pub use fixtures::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("vnfm_lifecycle=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
