use std::collections::BTreeMap;

use super::context::OperatorInfo;
use super::operator::Operator;
use crate::error::{Error, Result};

/// Builds a fresh operator instance for one run.
pub type OperatorFactory = fn() -> Box<dyn Operator>;

struct Entry {
    description: &'static str,
    factory: OperatorFactory,
}

/// Operators by name, listed in name order.
#[derive(Default)]
pub struct OperatorRegistry {
    entries: BTreeMap<&'static str, Entry>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in operator.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        crate::operators::register_all(&mut registry);
        registry
    }

    /// Register `factory` under `name`, replacing any earlier entry.
    pub fn register(
        &mut self,
        name: &'static str,
        description: &'static str,
        factory: OperatorFactory,
    ) {
        if self
            .entries
            .insert(name, Entry { description, factory })
            .is_some()
        {
            tracing::debug!("Replaced operator registration for {name}");
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn Operator>> {
        self.entries
            .get(name)
            .map(|entry| (entry.factory)())
            .ok_or_else(|| Error::OperatorNotFound {
                name: name.to_string(),
                available: self.entries.keys().map(|k| k.to_string()).collect(),
            })
    }

    pub fn list(&self) -> Vec<OperatorInfo> {
        self.entries
            .iter()
            .map(|(name, entry)| OperatorInfo {
                name,
                description: entry.description,
            })
            .collect()
    }
}

impl std::fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_operators_are_listed_in_order() {
        let registry = OperatorRegistry::builtin();
        let names: Vec<_> = registry.list().into_iter().map(|i| i.name).collect();

        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        for name in [
            "operators",
            "collections",
            "make_frames_ffmpeg",
            "answer_frames_ollama",
            "embed_frames_transformers",
        ] {
            assert!(registry.contains(name), "{name} missing");
        }
    }

    #[test]
    fn test_unknown_operator_lists_available() {
        let registry = OperatorRegistry::builtin();
        let err = registry.create("frobnicate").err().unwrap();
        match err {
            Error::OperatorNotFound { name, available } => {
                assert_eq!(name, "frobnicate");
                assert!(available.contains(&"collections".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
