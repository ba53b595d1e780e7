//! Events exchanged between lab actors.

use crate::model::EventDescriptor;
use crate::util::det_hash;
use std::sync::Arc;

/// A message: a type name plus an opaque payload.
///
/// Only the type name and a deterministic hash of the payload reach the
/// program model, so payloads need no particular encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Event {
    type_name: Arc<str>,
    payload: Vec<u8>,
}

impl Event {
    /// An event with an empty payload.
    #[must_use]
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: Arc::from(type_name),
            payload: Vec::new(),
        }
    }

    /// An event carrying `payload`.
    #[must_use]
    pub fn with_payload(type_name: &str, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            type_name: Arc::from(type_name),
            payload: payload.into(),
        }
    }

    /// An event carrying a little-endian `u64`.
    #[must_use]
    pub fn with_value(type_name: &str, value: u64) -> Self {
        Self::with_payload(type_name, value.to_le_bytes().to_vec())
    }

    /// Type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Raw payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The payload as a `u64`, if it was built by [`Event::with_value`].
    #[must_use]
    pub fn value(&self) -> Option<u64> {
        let bytes: [u8; 8] = self.payload.as_slice().try_into().ok()?;
        Some(u64::from_le_bytes(bytes))
    }

    /// Descriptor recorded in the program model.
    #[must_use]
    pub fn descriptor(&self) -> EventDescriptor {
        if self.payload.is_empty() {
            EventDescriptor::named(self.type_name.as_ref())
        } else {
            EventDescriptor::with_hash(self.type_name.as_ref(), det_hash(&self.payload))
        }
    }
}
