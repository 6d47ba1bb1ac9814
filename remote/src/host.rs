//! Host identity

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a benchmark host.
///
/// Per-host shared resources (the CPU control session, prefetch guards) are
/// keyed by this value. Two executors reporting the same `HostId` are assumed
/// to reach the same machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(String);

impl HostId {
    /// Create a host identity from a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The host name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HostId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for HostId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_host_id_display() {
        let host = HostId::new("bench-01");
        assert_eq!(host.to_string(), "bench-01");
        assert_eq!(host.as_str(), "bench-01");
    }

    #[test]
    fn test_host_id_as_map_key() {
        let mut map = HashMap::new();
        map.insert(HostId::from("a"), 1);
        map.insert(HostId::from("b"), 2);

        assert_eq!(map.get(&HostId::from("a")), Some(&1));
        assert_eq!(map.len(), 2);
    }
}
