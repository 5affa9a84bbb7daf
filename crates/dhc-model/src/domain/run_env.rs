use serde::{Deserialize, Serialize};

use crate::KeyValue;

/// Environment variables attached to a run.
///
/// Keys are unique: writing an existing key replaces its value in place, so insertion order
/// of first appearance is preserved and the last write wins.
/// Serialized as an array of `{key, value}` objects; deserializing applies the same
/// last-write-wins rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<KeyValue>", into = "Vec<KeyValue>")]
pub struct RunEnv(Vec<KeyValue>);

impl RunEnv {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Create an environment containing a single key–value pair.
    pub fn single<K, V>(key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(vec![KeyValue::new(key, value)])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over all key–value pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.0.iter()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|kv| kv.key() == key)
            .map(|kv| kv.value())
    }

    /// Set a variable, replacing any previous value for the same key.
    pub fn push<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let kv = KeyValue::new(key, value);
        match self.0.iter_mut().find(|existing| existing.key() == kv.key()) {
            Some(existing) => *existing = kv,
            None => self.0.push(kv),
        }
    }

    /// Merge two environments; entries from `other` override entries of `self` with the same key.
    pub fn merged(&self, other: &RunEnv) -> RunEnv {
        let mut out = self.clone();
        for kv in other.iter() {
            out.push(kv.key(), kv.value());
        }
        out
    }
}

impl Default for RunEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for RunEnv
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut env = RunEnv::new();
        for (k, v) in iter {
            env.push(k, v);
        }
        env
    }
}

impl From<Vec<KeyValue>> for RunEnv {
    fn from(items: Vec<KeyValue>) -> Self {
        items
            .iter()
            .map(|kv| (kv.key(), kv.value()))
            .collect()
    }
}

impl From<RunEnv> for Vec<KeyValue> {
    fn from(env: RunEnv) -> Self {
        env.0
    }
}
