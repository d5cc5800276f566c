//! Batch serialization.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;

/// A batch could not be turned into bytes or back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SerializationError {
    message: String,
}

impl SerializationError {
    /// Creates an error with a description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the description.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for SerializationError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(e.to_string())
    }
}

/// Converts a batch of telemetry items to a self-contained payload.
///
/// `deserialize(serialize(batch))` must give back an equivalent batch.
/// Payloads are stored as single records, so one call sees exactly one
/// batch.
pub trait SignalSerializer<T>: Send + Sync {
    /// Encodes a batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch cannot be encoded.
    fn serialize(&self, items: &[T]) -> Result<Vec<u8>, SerializationError>;

    /// Decodes a batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a valid batch.
    fn deserialize(&self, payload: &[u8]) -> Result<Vec<T>, SerializationError>;
}

/// Stores batches as JSON arrays.
pub struct JsonSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonSerializer<T> {
    /// Creates a JSON serializer.
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonSerializer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonSerializer")
    }
}

impl<T> SignalSerializer<T> for JsonSerializer<T>
where
    T: Serialize + DeserializeOwned,
{
    fn serialize(&self, items: &[T]) -> Result<Vec<u8>, SerializationError> {
        Ok(serde_json::to_vec(items)?)
    }

    fn deserialize(&self, payload: &[u8]) -> Result<Vec<T>, SerializationError> {
        Ok(serde_json::from_slice(payload)?)
    }
}
