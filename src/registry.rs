//! Registry of the models generated in one run
//!
//! Populated by the orchestrator as each alias is generated and read by the
//! admin assembler, so registrations never depend on what the host framework
//! happens to have loaded.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    by_alias: BTreeMap<String, Vec<String>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the models of an alias, keeping declaration order and
    /// ignoring names that are already registered for it.
    pub fn register(&mut self, alias: &str, models: impl IntoIterator<Item = String>) {
        let entry = self.by_alias.entry(alias.to_string()).or_default();
        for model in models {
            if !entry.contains(&model) {
                entry.push(model);
            }
        }
    }

    /// Registered aliases in sorted order
    pub fn aliases(&self) -> Vec<String> {
        self.by_alias.keys().cloned().collect()
    }

    pub fn models(&self, alias: &str) -> &[String] {
        self.by_alias.get(alias).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.by_alias.is_empty()
    }

    /// Every model name registered so far, across aliases.
    ///
    /// All aliases share one app, so a later alias must not reuse any of these.
    pub fn model_names(&self) -> BTreeSet<String> {
        self.by_alias.values().flatten().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_deduplicates() {
        let mut registry = ModelRegistry::new();
        registry.register("default", vec!["Customer".to_string(), "Order".to_string()]);
        registry.register("default", vec!["Order".to_string(), "Invoice".to_string()]);

        assert_eq!(registry.models("default"), ["Customer", "Order", "Invoice"]);
        assert!(registry.models("missing").is_empty());
    }

    #[test]
    fn test_aliases_are_sorted() {
        let mut registry = ModelRegistry::new();
        registry.register("warehouse", Vec::new());
        registry.register("default", vec!["Customer".to_string()]);

        assert_eq!(registry.aliases(), vec!["default", "warehouse"]);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_model_names_span_aliases() {
        let mut registry = ModelRegistry::new();
        registry.register("default", vec!["Customer".to_string(), "Order".to_string()]);
        registry.register("legacy", vec!["LegacyCustomer".to_string()]);

        let names: Vec<String> = registry.model_names().into_iter().collect();
        assert_eq!(names, vec!["Customer", "LegacyCustomer", "Order"]);
    }
}
