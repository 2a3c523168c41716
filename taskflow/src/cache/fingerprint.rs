//! Deterministic fingerprints of task inputs.
//!
//! A fingerprint namespaces the canonical JSON form of an input by the task
//! name and hashes the result with SHA-256. Object keys are sorted at every
//! level before hashing, so two semantically equal inputs always produce the
//! same fingerprint regardless of map iteration order or the process that
//! computed it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Hex-encoded SHA-256 digest identifying a task invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the fingerprint of `input` for the task named `task_name`.
    ///
    /// # Errors
    ///
    /// Returns an error if `input` cannot be represented as JSON (for
    /// example a map with non-string keys).
    pub fn compute<T>(task_name: &str, input: &T) -> Result<Self, serde_json::Error>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(input)?;
        Ok(Self::of_value(task_name, &value))
    }

    /// Computes the fingerprint of an already serialized input.
    #[must_use]
    pub fn of_value(task_name: &str, input: &Value) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((task_name.len() as u64).to_le_bytes());
        hasher.update(task_name.as_bytes());
        hasher.update(to_canonical_json(input).as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Returns the hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a shortened form for log output.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Renders a JSON value with object keys sorted recursively and no
/// insignificant whitespace.
#[must_use]
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => value.to_string(),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let sorted: BTreeMap<&String, String> = map
                .iter()
                .map(|(k, v)| (k, to_canonical_json(v)))
                .collect();
            let items: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), v))
                .collect();
            format!("{{{}}}", items.join(","))
        }
    }
}
