//! Positional call arguments.

use crate::error::{ProtocolError, ProtocolResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered argument list of a call or subscription.
///
/// Serializes as a plain JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Args(Vec<Value>);

impl Args {
    /// Creates an empty argument list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a serializable value.
    pub fn with<T: Serialize + ?Sized>(mut self, value: &T) -> ProtocolResult<Self> {
        self.0.push(serde_json::to_value(value)?);
        Ok(self)
    }

    /// Returns the number of arguments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the raw value at `index`.
    pub fn raw(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Decodes the required argument at `index`.
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> ProtocolResult<T> {
        let value = self
            .0
            .get(index)
            .ok_or(ProtocolError::MissingArgument(index))?;
        decode(index, value)
    }

    /// Decodes the argument at `index`, treating absence and `null` as `None`.
    pub fn optional<T: DeserializeOwned>(&self, index: usize) -> ProtocolResult<Option<T>> {
        match self.0.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => decode(index, value).map(Some),
        }
    }

    /// Returns the values as a JSON array.
    pub fn to_value(&self) -> Value {
        Value::Array(self.0.clone())
    }

    /// Consumes the list and returns the values.
    pub fn into_inner(self) -> Vec<Value> {
        self.0
    }
}

fn decode<T: DeserializeOwned>(index: usize, value: &Value) -> ProtocolResult<T> {
    T::deserialize(value).map_err(|e| ProtocolError::InvalidArgument {
        index,
        reason: e.to_string(),
    })
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl FromIterator<Value> for Args {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
