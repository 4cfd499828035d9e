//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive, so a repository name can never be passed where a run
//! identifier or an email address is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers — String-backed (GitHub names)
// ---------------------------------------------------------------------------

string_id! {
    /// The short name of a repository within the synchronised organization
    /// (e.g. `"svc-a"`).
    ///
    /// Unique within one organization listing; used as the watermark key and as
    /// the `data` field of every emitted event.
    RepositoryName
}

string_id! {
    /// A GitHub organization login (e.g. `"rust-lang"`).
    OrganizationName
}

// ---------------------------------------------------------------------------
// Identifiers — UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single synchronisation run.
///
/// Generated fresh for every process invocation and attached to the run span so
/// all log lines from a single run can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncRunId(Uuid);

impl SyncRunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for SyncRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_repository_name_is_rejected() {
        assert!(RepositoryName::new("").is_none());
        assert_eq!(RepositoryName::new("svc-a").unwrap().as_str(), "svc-a");
    }

    #[test]
    fn test_run_ids_are_distinct() {
        assert_ne!(SyncRunId::new_random(), SyncRunId::new_random());
    }
}
