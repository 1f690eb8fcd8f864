//! # vnfm-core
//!
//! Core abstractions shared by the VNF lifecycle manager crates.
//!
//! This crate provides the foundational types used across all components:
//!
//! - **Identifiers**: Strongly-typed IDs for VNF instances and descriptors
//! - **Error Types**: Shared error definitions and result types
//! - **Observability**: Logging initialisation and span constructors
//!
//! ## Crate Boundary
//!
//! `vnfm-core` is the **only** crate allowed to define shared primitives.
//! Domain behaviour (state machine, drivers, orchestration) lives in
//! `vnfm-lifecycle`.
//!
//! ## Example
//!
//! ```rust
//! use vnfm_core::prelude::*;
//!
//! let vnf_id = VnfId::generate();
//! let parsed: VnfId = vnf_id.to_string().parse().unwrap();
//! assert_eq!(vnf_id, parsed);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod id;
pub mod observability;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::id::{VnfId, VnfdId};
    pub use crate::observability::{LogFormat, init_logging};
}

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use id::{VnfId, VnfdId};
pub use observability::{LogFormat, init_logging, lifecycle_span};
