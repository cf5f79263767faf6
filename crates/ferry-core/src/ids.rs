//! Strongly-typed identifiers for domain entities.
//!
//! Both ids are positions in append-only tables owned by the coordinator,
//! so they are plain integers assigned in arrival order and never reused.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($name:ident, $inner:ty, $prefix:expr) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            pub const fn get(&self) -> $inner {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $prefix, self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let raw = s.strip_prefix(concat!($prefix, "#")).unwrap_or(s);
                Ok(Self(raw.parse()?))
            }
        }
    };
}

define_id!(BuildId, u64, "build");
define_id!(AgentId, usize, "agent");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_id_display() {
        let id = BuildId::new(7);
        assert_eq!(id.to_string(), "build#7");
    }

    #[test]
    fn test_build_id_parse() {
        let id = BuildId::new(42);
        let parsed: BuildId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);

        let bare: BuildId = "42".parse().unwrap();
        assert_eq!(bare, id);
    }

    #[test]
    fn test_ids_order_by_arrival() {
        assert!(BuildId::new(0) < BuildId::new(1));
        assert!(AgentId::new(3) > AgentId::new(2));
    }

    #[test]
    fn test_id_serializes_as_number() {
        let json = serde_json::to_string(&BuildId::new(5)).unwrap();
        assert_eq!(json, "5");
    }
}
