//! Component registry
//!
//! Maps `(Category, name)` to a factory. Registration is imperative and
//! last-write-wins: re-registering a key replaces the entry, logs a warning and
//! hands the caller a [`RegistrationConflict`] describing what was replaced.
//! The registry is an ordinary value; pass it to whatever builds models.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use pipekit_core::prelude::*;

use crate::aggregation::Aggregation;
use crate::model::PipeSpec;

/// Builds an extractor for a given raw input width
pub type ExtractorFactory = Arc<dyn Fn(usize) -> Result<Box<dyn Extractor>> + Send + Sync>;

/// Builds a head from its widths and resolved configuration
pub type HeadFactory = Arc<dyn Fn(&HeadContext<'_>) -> Result<Box<dyn Head>> + Send + Sync>;

/// Arguments handed to a [`HeadFactory`]
#[derive(Debug, Clone, Copy)]
pub struct HeadContext<'a> {
    /// Width produced by the pipe's extractor
    pub in_dim: usize,
    /// Width the head must emit
    pub out_dim: usize,
    pub config: &'a HeadConfig,
}

/// Registered model: aggregation policy plus default pipes
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDefinition {
    pub aggregation: Aggregation,
    pub pipes: Vec<PipeSpec>,
}

impl ModelDefinition {
    pub fn new(aggregation: Aggregation) -> Self {
        Self {
            aggregation,
            pipes: Vec::new(),
        }
    }

    pub fn with_pipe(mut self, pipe: PipeSpec) -> Self {
        self.pipes.push(pipe);
        self
    }
}

/// Registry entry, one variant per category
#[derive(Clone)]
pub enum Entry {
    Extractor(ExtractorFactory),
    Head(HeadFactory),
    HeadConfig(Arc<HeadConfig>),
    Model(Arc<ModelDefinition>),
}

impl Entry {
    pub fn category(&self) -> Category {
        match self {
            Entry::Extractor(_) => Category::Extractor,
            Entry::Head(_) => Category::Head,
            Entry::HeadConfig(_) => Category::HeadConfig,
            Entry::Model(_) => Category::Model,
        }
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Extractor(_) => f.write_str("Entry::Extractor(<factory>)"),
            Entry::Head(_) => f.write_str("Entry::Head(<factory>)"),
            Entry::HeadConfig(c) => f.debug_tuple("Entry::HeadConfig").field(c).finish(),
            Entry::Model(m) => f.debug_tuple("Entry::Model").field(m).finish(),
        }
    }
}

/// A registration replaced an existing key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationConflict {
    pub category: Category,
    pub name: String,
}

impl fmt::Display for RegistrationConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' was already registered and has been replaced", self.category, self.name)
    }
}

/// Composite name under which a head config is stored
pub fn head_config_key(head: &str, config: &str) -> String {
    format!("{}/{}", head, config)
}

/// Name-to-factory lookup table
#[derive(Default)]
pub struct Registry {
    entries: HashMap<Category, BTreeMap<String, Entry>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("Registry");
        for category in Category::all() {
            dbg.field(category.as_str(), &self.names(category));
        }
        dbg.finish()
    }
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in components
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtin::register_builtins(&mut registry);
        registry
    }

    /// Store `entry` under `(entry.category(), name)`
    ///
    /// Returns the replaced key when one existed.
    pub fn register(&mut self, name: impl Into<String>, entry: Entry) -> Option<RegistrationConflict> {
        let name = name.into();
        let category = entry.category();
        let previous = self
            .entries
            .entry(category)
            .or_default()
            .insert(name.clone(), entry);

        match previous {
            Some(_) => {
                tracing::warn!(%category, name = %name, "overwriting registered component");
                Some(RegistrationConflict { category, name })
            }
            None => {
                tracing::trace!(%category, name = %name, "registered component");
                None
            }
        }
    }

    pub fn register_extractor<F>(&mut self, name: impl Into<String>, factory: F) -> Option<RegistrationConflict>
    where
        F: Fn(usize) -> Result<Box<dyn Extractor>> + Send + Sync + 'static,
    {
        self.register(name, Entry::Extractor(Arc::new(factory)))
    }

    pub fn register_head<F>(&mut self, name: impl Into<String>, factory: F) -> Option<RegistrationConflict>
    where
        F: Fn(&HeadContext<'_>) -> Result<Box<dyn Head>> + Send + Sync + 'static,
    {
        self.register(name, Entry::Head(Arc::new(factory)))
    }

    /// Register a named config for `head`
    pub fn register_head_config(
        &mut self,
        head: &str,
        config_name: &str,
        config: HeadConfig,
    ) -> Option<RegistrationConflict> {
        self.register(head_config_key(head, config_name), Entry::HeadConfig(Arc::new(config)))
    }

    pub fn register_model(&mut self, name: impl Into<String>, definition: ModelDefinition) -> Option<RegistrationConflict> {
        self.register(name, Entry::Model(Arc::new(definition)))
    }

    /// Look up an entry
    pub fn resolve(&self, category: Category, name: &str) -> Result<&Entry> {
        self.entries
            .get(&category)
            .and_then(|by_name| by_name.get(name))
            .ok_or_else(|| PipeError::unresolved(category, name))
    }

    pub fn resolve_extractor(&self, name: &str) -> Result<ExtractorFactory> {
        match self.resolve(Category::Extractor, name)? {
            Entry::Extractor(f) => Ok(Arc::clone(f)),
            _ => Err(PipeError::unresolved(Category::Extractor, name)),
        }
    }

    pub fn resolve_head(&self, name: &str) -> Result<HeadFactory> {
        match self.resolve(Category::Head, name)? {
            Entry::Head(f) => Ok(Arc::clone(f)),
            _ => Err(PipeError::unresolved(Category::Head, name)),
        }
    }

    pub fn resolve_head_config(&self, head: &str, config_name: &str) -> Result<Arc<HeadConfig>> {
        let key = head_config_key(head, config_name);
        match self.resolve(Category::HeadConfig, &key)? {
            Entry::HeadConfig(c) => Ok(Arc::clone(c)),
            _ => Err(PipeError::unresolved(Category::HeadConfig, key)),
        }
    }

    pub fn resolve_model(&self, name: &str) -> Result<Arc<ModelDefinition>> {
        match self.resolve(Category::Model, name)? {
            Entry::Model(m) => Ok(Arc::clone(m)),
            _ => Err(PipeError::unresolved(Category::Model, name)),
        }
    }

    pub fn contains(&self, category: Category, name: &str) -> bool {
        self.resolve(category, name).is_ok()
    }

    /// Registered names in one category, sorted
    pub fn names(&self, category: Category) -> Vec<String> {
        self.entries
            .get(&category)
            .map(|by_name| by_name.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Total number of entries
    pub fn count(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::IdentityExtractor;
    use crate::heads::LinearHead;

    fn identity_factory(in_dim: usize) -> Result<Box<dyn Extractor>> {
        Ok(Box::new(IdentityExtractor::new(in_dim)))
    }

    fn linear_factory(ctx: &HeadContext<'_>) -> Result<Box<dyn Head>> {
        Ok(Box::new(LinearHead::new(ctx.in_dim, ctx.out_dim)))
    }

    fn biasless_linear_factory(ctx: &HeadContext<'_>) -> Result<Box<dyn Head>> {
        Ok(Box::new(LinearHead::without_bias(ctx.in_dim, ctx.out_dim)))
    }

    #[test]
    fn test_registry_new() {
        let registry = Registry::new();
        assert_eq!(registry.count(), 0);
        assert!(registry.names(Category::Head).is_empty());
    }

    #[test]
    fn test_resolve_returns_registered_factory() {
        let mut registry = Registry::new();
        let factory: ExtractorFactory = Arc::new(identity_factory);
        registry.register("identity", Entry::Extractor(Arc::clone(&factory)));

        let resolved = registry.resolve_extractor("identity").unwrap();
        assert!(Arc::ptr_eq(&factory, &resolved));
    }

    #[test]
    fn test_last_write_wins() {
        let mut registry = Registry::new();
        let first: HeadFactory = Arc::new(linear_factory);
        let second: HeadFactory = Arc::new(biasless_linear_factory);

        assert!(registry.register("linear", Entry::Head(Arc::clone(&first))).is_none());
        let conflict = registry.register("linear", Entry::Head(Arc::clone(&second)));

        assert_eq!(
            conflict,
            Some(RegistrationConflict {
                category: Category::Head,
                name: "linear".into()
            })
        );
        let resolved = registry.resolve_head("linear").unwrap();
        assert!(Arc::ptr_eq(&second, &resolved));
        assert!(!Arc::ptr_eq(&first, &resolved));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_same_name_different_category() {
        let mut registry = Registry::new();
        registry.register_extractor("linear", identity_factory);
        let conflict = registry.register_head("linear", linear_factory);
        assert!(conflict.is_none());
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn test_unresolved_names_pair() {
        let registry = Registry::new();
        let err = registry.resolve_extractor("missing").err().expect("expected unresolved error");
        assert_eq!(err, PipeError::unresolved(Category::Extractor, "missing"));
    }

    #[test]
    fn test_head_config_keyed_by_head() {
        let mut registry = Registry::new();
        registry.register_head_config("mixture", "add", HeadConfig::new().with("target_dim", 0));
        registry.register_head_config("mixture", "prod", HeadConfig::new().with("target_dim", 1));

        let prod = registry.resolve_head_config("mixture", "prod").unwrap();
        assert_eq!(prod.usize_required("target_dim").unwrap(), 1);
        assert!(registry.resolve_head_config("linear", "prod").is_err());
        assert_eq!(
            registry.names(Category::HeadConfig),
            vec!["mixture/add".to_string(), "mixture/prod".to_string()]
        );
    }

    #[test]
    fn test_with_builtins() {
        let registry = Registry::with_builtins();
        assert!(registry.contains(Category::Extractor, "identity"));
        assert!(registry.contains(Category::Extractor, "product"));
        assert!(registry.contains(Category::Head, "linear"));
        assert!(registry.contains(Category::Head, "mixture"));
        assert!(registry.contains(Category::Model, "mixture"));
    }
}
