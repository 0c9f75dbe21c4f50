//! # sentinel-types: Shared types for `Sentinel`
//!
//! This crate contains the types every other Sentinel crate agrees on:
//! - Record identifiers ([`SessionId`], [`RequestId`], [`EventId`])
//! - ID format validation ([`is_valid_id`])
//! - Store failures ([`StoreError`])
//! - Duration serialization helpers ([`duration_secs`], [`option_duration_secs`])
//!
//! All record identifiers share one wire format: exactly 16 lowercase
//! hexadecimal characters (64 bits of CSPRNG output). The format is checked
//! before any store call keyed by an ID, so malformed input never reaches a
//! backend.

use std::fmt::{Debug, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod store;

pub use store::StoreError;


// ============================================================================
// ID Format
// ============================================================================

/// Length of every Sentinel record identifier, in characters.
pub const ID_LENGTH: usize = 16;

/// Number of random bytes behind one identifier (two hex chars per byte).
const ID_BYTES: usize = ID_LENGTH / 2;

/// Returns true iff `id` is exactly 16 characters of `[0-9a-f]`.
///
/// Uppercase hex, punctuation, whitespace and any other length are rejected.
///
/// # Examples
///
/// ```
/// # use sentinel_types::is_valid_id;
/// assert!(is_valid_id("abc123def4567890"));
/// assert!(!is_valid_id("ABC123DEF4567890"));
/// assert!(!is_valid_id("abc123"));
/// ```
pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LENGTH
        && id
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Error raised when parsing or generating an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The string is not 16 lowercase hex characters.
    #[error("invalid {kind} ID format: {value:?}")]
    InvalidFormat { kind: &'static str, value: String },

    /// The OS entropy source failed.
    #[error("failed to generate {kind} ID: {reason}")]
    Entropy { kind: &'static str, reason: String },
}

/// Encodes random bytes as a lowercase hex identifier.
fn encode_hex(bytes: &[u8; ID_BYTES]) -> String {
    use std::fmt::Write;

    bytes.iter().fold(String::with_capacity(ID_LENGTH), |mut s, b| {
        // Writing into a String cannot fail.
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// Draws a fresh identifier from the OS CSPRNG.
fn random_id(kind: &'static str) -> Result<String, IdError> {
    let mut bytes = [0u8; ID_BYTES];
    getrandom::fill(&mut bytes).map_err(|e| IdError::Entropy {
        kind,
        reason: e.to_string(),
    })?;
    Ok(encode_hex(&bytes))
}

// ============================================================================
// Identifier newtypes
// ============================================================================

macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parses and validates an identifier.
            pub fn parse(value: &str) -> Result<Self, IdError> {
                if is_valid_id(value) {
                    Ok(Self(value.to_string()))
                } else {
                    Err(IdError::InvalidFormat {
                        kind: $kind,
                        value: value.to_string(),
                    })
                }
            }

            /// Generates a new random identifier using the OS CSPRNG.
            pub fn generate() -> Result<Self, IdError> {
                random_id($kind).map(Self)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                if is_valid_id(&value) {
                    Ok(Self(value))
                } else {
                    Err(IdError::InvalidFormat {
                        kind: $kind,
                        value,
                    })
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

hex_id!(
    /// Identifier of an issued server session.
    SessionId,
    "session"
);

hex_id!(
    /// Identifier of an approval request.
    RequestId,
    "request"
);

hex_id!(
    /// Identifier of a break-glass event.
    EventId,
    "break-glass event"
);

// ============================================================================
// Duration serde helpers
// ============================================================================

/// Serializes a [`chrono::TimeDelta`] as whole seconds.
///
/// Sub-second precision is dropped; every duration Sentinel stores is
/// configured in seconds.
pub mod duration_secs {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        TimeDelta::try_seconds(secs)
            .ok_or_else(|| serde::de::Error::custom(format!("duration out of range: {secs}s")))
    }
}

/// Optional variant of [`duration_secs`]; pair with
/// `#[serde(default, skip_serializing_if = "Option::is_none")]`.
pub mod option_duration_secs {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<TimeDelta>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.num_seconds()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<TimeDelta>, D::Error> {
        let secs = Option::<i64>::deserialize(deserializer)?;
        secs.map(|s| {
            TimeDelta::try_seconds(s)
                .ok_or_else(|| serde::de::Error::custom(format!("duration out of range: {s}s")))
        })
        .transpose()
    }
}
