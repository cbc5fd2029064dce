//! Process-stable instance identity.
//!
//! Each running instance gets a unique id at startup and keeps it for the
//! process lifetime. Session metadata records the id of the instance holding
//! the live connection, so every instance in the fleet can tell whether a
//! given session's handle is reachable locally.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

/// Unique, stable-for-the-process identifier of this service instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceId(Arc<str>);

impl InstanceId {
    /// Read `SESSIOND_INSTANCE_ID` if set (useful for tests and pinned
    /// deployments), otherwise generate a fresh id.
    pub fn from_env_or_generate() -> Self {
        match std::env::var("SESSIOND_INSTANCE_ID") {
            Ok(id) if !id.is_empty() => Self(id.into()),
            _ => Self::generate(),
        }
    }

    pub fn generate() -> Self {
        Self(format!("sessiond-{}", Uuid::new_v4()).into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(id: &str) -> Self {
        Self(id.into())
    }
}
