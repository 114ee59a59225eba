//! Payload serialization contract.
//!
//! The queue stores payloads as opaque bytes. Any type carried by a job must
//! be able to turn itself into bytes and later repopulate itself from bytes
//! produced by another instance of the same type.
//!
//! # Example
//!
//! ```
//! use prometheus_job_queue::core::payload::{json, Payload, PayloadError};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
//! struct Sample {
//!     total: u64,
//! }
//!
//! impl Payload for Sample {
//!     fn marshal(&self) -> Result<Vec<u8>, PayloadError> {
//!         json::marshal(self)
//!     }
//!
//!     fn unmarshal(&mut self, bytes: &[u8]) -> Result<(), PayloadError> {
//!         json::unmarshal_into(self, bytes)
//!     }
//! }
//!
//! let bytes = Sample { total: 7 }.marshal().unwrap();
//! let mut decoded = Sample::default();
//! decoded.unmarshal(&bytes).unwrap();
//! assert_eq!(decoded, Sample { total: 7 });
//! ```

use thiserror::Error;

/// Errors raised while converting payloads to or from bytes.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// JSON encoding or decoding failed.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// A custom codec rejected the value or the bytes.
    #[error("{0}")]
    Custom(String),
}

/// Bidirectional byte conversion required of every job payload.
///
/// Implementations must guarantee that `unmarshal(marshal(x))` yields a value
/// observably equal to `x`.
pub trait Payload: Send + Sync {
    /// Encode the value into its canonical byte form.
    ///
    /// # Errors
    ///
    /// Returns a [`PayloadError`] if the value cannot be encoded.
    fn marshal(&self) -> Result<Vec<u8>, PayloadError>;

    /// Populate `self` from bytes previously produced by [`Payload::marshal`].
    ///
    /// # Errors
    ///
    /// Returns a [`PayloadError`] if the bytes cannot be decoded.
    fn unmarshal(&mut self, bytes: &[u8]) -> Result<(), PayloadError>;
}

/// JSON helpers for serde types implementing [`Payload`].
pub mod json {
    use serde::de::DeserializeOwned;
    use serde::Serialize;

    use super::PayloadError;

    /// Encode `value` as JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Json`] if serialization fails.
    pub fn marshal<T: Serialize>(value: &T) -> Result<Vec<u8>, PayloadError> {
        Ok(serde_json::to_vec(value)?)
    }

    /// Decode JSON bytes and overwrite `target` with the result.
    ///
    /// `target` is left untouched when decoding fails.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Json`] if the bytes are not a valid encoding of `T`.
    pub fn unmarshal_into<T: DeserializeOwned>(
        target: &mut T,
        bytes: &[u8],
    ) -> Result<(), PayloadError> {
        *target = serde_json::from_slice(bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Estimate {
        #[serde(rename = "i")]
        in_circle: u64,
        #[serde(rename = "t")]
        total: u64,
    }

    impl Payload for Estimate {
        fn marshal(&self) -> Result<Vec<u8>, PayloadError> {
            json::marshal(self)
        }

        fn unmarshal(&mut self, bytes: &[u8]) -> Result<(), PayloadError> {
            json::unmarshal_into(self, bytes)
        }
    }

    #[test]
    fn test_round_trip() {
        let values = [
            (0, 0),
            (785, 1000),
            (1, u64::MAX),
            (u64::MAX, u64::MAX),
            (u64::MAX, 0),
        ];
        for (in_circle, total) in values {
            let original = Estimate { in_circle, total };
            let bytes = original.marshal().unwrap();
            let mut decoded = Estimate {
                in_circle: 7,
                total: 7,
            };
            decoded.unmarshal(&bytes).unwrap();
            assert_eq!(decoded, original);
        }
    }

    #[test]
    fn test_unmarshal_overwrites_previous_value() {
        let bytes = Estimate {
            in_circle: 0,
            total: 100,
        }
        .marshal()
        .unwrap();
        let mut target = Estimate {
            in_circle: 42,
            total: 42,
        };
        target.unmarshal(&bytes).unwrap();
        assert_eq!(target.in_circle, 0);
        assert_eq!(target.total, 100);
    }

    #[test]
    fn test_unmarshal_garbage_keeps_target() {
        let mut target = Estimate {
            in_circle: 1,
            total: 2,
        };
        let err = target.unmarshal(b"not json").unwrap_err();
        assert!(matches!(err, PayloadError::Json(_)));
        assert_eq!(
            target,
            Estimate {
                in_circle: 1,
                total: 2
            }
        );
    }
}
