//! Strongly-typed identifiers for VNF manager entities.
//!
//! Each id is a ULID wrapped in its own newtype, so a descriptor id cannot be
//! passed where a VNF id is expected. ULIDs carry their creation time and sort
//! by it, which keeps listings in creation order without a separate column.
//!
//! # Example
//!
//! ```rust
//! use vnfm_core::id::{VnfId, VnfdId};
//!
//! let vnf = VnfId::generate();
//! let vnfd = VnfdId::generate();
//!
//! // Distinct types; this is a compile error:
//! // let wrong: VnfId = vnfd;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use crate::error::{Error, Result};

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Generates a new unique identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(Ulid::new())
            }

            /// Creates an identifier from a raw ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Returns the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }

            /// Returns the creation timestamp encoded in the ID.
            #[must_use]
            pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
                let ms = i64::try_from(self.0.timestamp_ms()).unwrap_or(i64::MAX);
                chrono::DateTime::from_timestamp_millis(ms).unwrap_or_else(chrono::Utc::now)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Ulid::from_string(s)
                    .map(Self)
                    .map_err(|e| Error::InvalidId {
                        message: format!(concat!("invalid ", $label, " '{}': {}"), s, e),
                    })
            }
        }
    };
}

ulid_id!(
    /// A unique identifier for a VNF instance.
    ///
    /// Assigned when the create pre-phase persists the record; a respawned
    /// VNF always receives a fresh id.
    VnfId,
    "VNF ID"
);

ulid_id!(
    /// A unique identifier for a VNF descriptor (VNFD).
    VnfdId,
    "VNFD ID"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vnf_id_roundtrip() {
        let id = VnfId::generate();
        let parsed: VnfId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(VnfId::generate(), VnfId::generate());
    }

    #[test]
    fn invalid_id_returns_error() {
        let result: Result<VnfdId> = "not-a-valid-ulid".parse();
        let err = result.unwrap_err();
        assert!(err.to_string().contains("invalid VNFD ID"));
    }

    #[test]
    fn id_serializes_as_plain_string() {
        let id = VnfId::generate();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
