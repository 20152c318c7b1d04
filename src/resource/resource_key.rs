use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::MalformedKey;

const KEY_SEPARATOR: char = '/';

/// Opaque identity of a watched object: `"<namespace>/<name>"`.
///
/// The key is the work queue's deduplication identity. It is stable for the
/// whole lifetime of the object it points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    pub fn new(
        namespace: &str,
        name: &str,
    ) -> Self {
        Self(format!("{namespace}{KEY_SEPARATOR}{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits the key back into `(namespace, name)`.
    ///
    /// Exactly one separator is allowed and neither half may be empty.
    pub fn split(&self) -> std::result::Result<(&str, &str), MalformedKey> {
        let mut parts = self.0.split(KEY_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(namespace), Some(name), None) if !namespace.is_empty() && !name.is_empty() => {
                Ok((namespace, name))
            }
            _ => Err(MalformedKey(self.0.clone())),
        }
    }
}

impl From<String> for ResourceKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for ResourceKey {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}
