//! Wire types for graph snapshots.
//!
//! These types match the JSON body served by the collector's `/graph`
//! endpoint and pushed over its WebSocket. Deserialization is lenient on
//! purpose: numeric fields that are missing, null or non-numeric become 0,
//! and entries whose identifiers cannot be coerced to a string are kept as
//! [`NodeEntry::Malformed`] / [`EdgeEntry::Malformed`] so the projector can
//! skip them one by one instead of rejecting the whole snapshot.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

/// One complete metrics sample for all known services and calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<NodeEntry>,
    #[serde(default)]
    pub edges: Vec<EdgeEntry>,
}

impl GraphSnapshot {
    /// Total number of entries (nodes and edges), including malformed ones.
    pub fn len(&self) -> usize {
        self.nodes.len() + self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// A node entry as it appears on the wire.
///
/// Older collectors sent bare service names; current ones send descriptors
/// with call and error counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeEntry {
    /// Bare identifier with no metrics attached.
    Legacy(ServiceName),
    /// Full descriptor.
    Rich(NodeDescriptor),
    /// Anything else; skipped during projection.
    Malformed(serde_json::Value),
}

impl From<NodeDescriptor> for NodeEntry {
    fn from(node: NodeDescriptor) -> Self {
        NodeEntry::Rich(node)
    }
}

/// An edge entry as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EdgeEntry {
    Edge(EdgeDescriptor),
    Malformed(serde_json::Value),
}

impl From<EdgeDescriptor> for EdgeEntry {
    fn from(edge: EdgeDescriptor) -> Self {
        EdgeEntry::Edge(edge)
    }
}

/// Per-service totals for the observation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub name: ServiceName,
    #[serde(default, deserialize_with = "lenient::count")]
    pub call_count: u64,
    #[serde(default, deserialize_with = "lenient::count")]
    pub error_count: u64,
}

impl NodeDescriptor {
    pub fn new(name: impl Into<ServiceName>, call_count: u64, error_count: u64) -> Self {
        Self {
            name: name.into(),
            call_count,
            error_count,
        }
    }
}

/// Call statistics for one caller -> callee pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDescriptor {
    pub src: ServiceName,
    pub dst: ServiceName,
    #[serde(default, deserialize_with = "lenient::count")]
    pub call_count: u64,
    #[serde(default, deserialize_with = "lenient::count")]
    pub error_count: u64,
    #[serde(default, deserialize_with = "lenient::millis")]
    pub p95_ms: f64,
}

impl EdgeDescriptor {
    pub fn new(
        src: impl Into<ServiceName>,
        dst: impl Into<ServiceName>,
        call_count: u64,
        error_count: u64,
        p95_ms: f64,
    ) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            call_count,
            error_count,
            p95_ms,
        }
    }
}

/// A service identifier coerced to a string.
///
/// Accepts JSON strings, integers, floats and booleans, stringified the same
/// way wherever they appear so that a node named `7` and an edge pointing at
/// `7` agree on the identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceName(String);

impl ServiceName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceName {
    fn from(s: &str) -> Self {
        ServiceName(s.to_string())
    }
}

impl From<String> for ServiceName {
    fn from(s: String) -> Self {
        ServiceName(s)
    }
}

impl Serialize for ServiceName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ServiceName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NameVisitor;

        impl Visitor<'_> for NameVisitor {
            type Value = ServiceName;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string, number or boolean service name")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ServiceName, E> {
                Ok(ServiceName(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<ServiceName, E> {
                Ok(ServiceName(v))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<ServiceName, E> {
                Ok(ServiceName(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ServiceName, E> {
                Ok(ServiceName(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ServiceName, E> {
                Ok(ServiceName(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<ServiceName, E> {
                if !v.is_finite() {
                    return Err(E::invalid_value(de::Unexpected::Float(v), &self));
                }
                // Integral floats print without a fractional part, so `3.0`
                // and `3` name the same service.
                if v.fract() == 0.0 && v.abs() < 1e15 {
                    Ok(ServiceName(format!("{}", v as i64)))
                } else {
                    Ok(ServiceName(v.to_string()))
                }
            }
        }

        deserializer.deserialize_any(NameVisitor)
    }
}

/// Lenient numeric field decoding.
mod lenient {
    use std::fmt;

    use serde::de::{self, Deserializer, Visitor};

    /// Non-negative integer count; anything unusable becomes 0.
    pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let value = deserializer.deserialize_any(NumberVisitor)?;
        Ok(if value.is_finite() && value > 0.0 {
            value as u64
        } else {
            0
        })
    }

    /// Non-negative, finite milliseconds; anything unusable becomes 0.
    pub fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let value = deserializer.deserialize_any(NumberVisitor)?;
        Ok(if value.is_finite() && value > 0.0 {
            value
        } else {
            0.0
        })
    }

    struct NumberVisitor;

    impl<'de> Visitor<'de> for NumberVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number, numeric string, null or any ignorable value")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<f64, E> {
            Ok(if v { 1.0 } else { 0.0 })
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            Ok(v.trim().parse::<f64>().unwrap_or(0.0))
        }

        fn visit_unit<E: de::Error>(self) -> Result<f64, E> {
            Ok(0.0)
        }

        fn visit_none<E: de::Error>(self) -> Result<f64, E> {
            Ok(0.0)
        }

        fn visit_some<D: de::Deserializer<'de>>(self, deserializer: D) -> Result<f64, D::Error> {
            deserializer.deserialize_any(self)
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<f64, A::Error> {
            while seq.next_element::<de::IgnoredAny>()?.is_some() {}
            Ok(0.0)
        }

        fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<f64, A::Error> {
            while map.next_entry::<de::IgnoredAny, de::IgnoredAny>()?.is_some() {}
            Ok(0.0)
        }
    }
}
