//! Static lookup tables for builders and frameworks.
//!
//! Both registries are built once at startup from a fixed list of implementations and are
//! read-only afterwards. A duplicate key aborts construction.

use std::{collections::BTreeMap, fmt, sync::Arc};

use tracing::{debug, instrument};

use crate::{builder::Builder, error::CoreError, framework::Framework};

/// Builder registration key, rendered as `"<runtime>+<task>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuilderKey {
    pub runtime: String,
    pub task: String,
}

impl BuilderKey {
    pub fn new(runtime: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            runtime: runtime.into(),
            task: task.into(),
        }
    }

    fn of(builder: &dyn Builder) -> Self {
        Self::new(builder.runtime(), builder.task())
    }
}

impl fmt::Display for BuilderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.runtime, self.task)
    }
}

pub struct BuilderRegistry {
    builders: BTreeMap<BuilderKey, Arc<dyn Builder>>,
}

impl BuilderRegistry {
    #[instrument(level = "debug", skip_all, fields(count = builders.len()))]
    pub fn new(builders: Vec<Arc<dyn Builder>>) -> Result<Self, CoreError> {
        let mut map = BTreeMap::new();
        for builder in builders {
            let key = BuilderKey::of(builder.as_ref());
            if map.contains_key(&key) {
                return Err(CoreError::Configuration(format!(
                    "duplicate builder registration: {key}"
                )));
            }
            debug!(%key, "builder registered");
            map.insert(key, builder);
        }
        Ok(Self { builders: map })
    }

    pub fn get_builder(&self, runtime: &str, task: &str) -> Result<&Arc<dyn Builder>, CoreError> {
        let key = BuilderKey::new(runtime, task);
        self.builders
            .get(&key)
            .ok_or_else(|| CoreError::Configuration(format!("no builder found for {key}")))
    }

    /// All builders registered for `runtime`, ordered by task.
    pub fn get_builders(&self, runtime: &str) -> Vec<(&BuilderKey, &Arc<dyn Builder>)> {
        self.builders
            .iter()
            .filter(|(key, _)| key.runtime == runtime)
            .collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &BuilderKey> {
        self.builders.keys()
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}

pub struct FrameworkRegistry {
    frameworks: BTreeMap<&'static str, Arc<dyn Framework>>,
}

impl FrameworkRegistry {
    #[instrument(level = "debug", skip_all, fields(count = frameworks.len()))]
    pub fn new(frameworks: Vec<Arc<dyn Framework>>) -> Result<Self, CoreError> {
        let mut map = BTreeMap::new();
        for framework in frameworks {
            let name = framework.name();
            if map.contains_key(name) {
                return Err(CoreError::Configuration(format!(
                    "duplicate framework registration: {name}"
                )));
            }
            debug!(framework = name, "framework registered");
            map.insert(name, framework);
        }
        Ok(Self { frameworks: map })
    }

    pub fn get_framework(&self, name: &str) -> Result<&Arc<dyn Framework>, CoreError> {
        self.frameworks
            .get(name)
            .ok_or_else(|| CoreError::Configuration(format!("no framework found for {name}")))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.frameworks.keys().copied()
    }
}
