//! Behaviour registry mapping saved type names to constructors
//!
//! Built explicitly at startup and handed to the persistence layer; there is
//! no process-wide table.

use std::sync::Arc;

use ahash::AHashMap;

use super::constant::{constant_consumer, constant_converter, constant_producer};
use super::duty_cycle::duty_cycle_converter;
use super::{BehaviourError, BoundBehaviour, ConverterBehaviour};
use crate::persistence::node::ConfigNode;

/// Builds a behaviour from its definition block
pub type BehaviourFactory = fn(&ConfigNode) -> Result<Arc<dyn ConverterBehaviour>, BehaviourError>;

/// Key holding the type name inside a `BEHAVIOUR` block
pub const TYPE_KEY: &str = "type";

#[derive(Clone, Default)]
pub struct BehaviourRegistry {
    factories: AHashMap<String, BehaviourFactory>,
}

impl std::fmt::Debug for BehaviourRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviourRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

impl BehaviourRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in behaviour
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, BehaviourFactory); 4] = [
            ("ConstantConverter", constant_converter),
            ("ConstantProducer", constant_producer),
            ("ConstantConsumer", constant_consumer),
            ("DutyCycleConverter", duty_cycle_converter),
        ];
        for (name, factory) in builtins {
            if let Err(e) = registry.register(name, factory) {
                tracing::warn!("Skipping built-in behaviour: {}", e);
            }
        }
        registry
    }

    /// Register a factory; a name can only be registered once
    pub fn register(
        &mut self,
        type_name: &str,
        factory: BehaviourFactory,
    ) -> Result<(), BehaviourError> {
        if self.factories.contains_key(type_name) {
            return Err(BehaviourError::DuplicateType(type_name.to_string()));
        }
        self.factories.insert(type_name.to_string(), factory);
        Ok(())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Registered type names, sorted
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build a behaviour of `type_name` from its definition block
    pub fn build(
        &self,
        type_name: &str,
        config: ConfigNode,
    ) -> Result<BoundBehaviour, BehaviourError> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| BehaviourError::UnknownType(type_name.to_string()))?;
        let behaviour = factory(&config)?;
        Ok(BoundBehaviour::new(type_name, config, behaviour))
    }

    /// Build from a block carrying its own `type` value
    pub fn build_from_node(&self, node: &ConfigNode) -> Result<BoundBehaviour, BehaviourError> {
        let type_name: String = node.require_value(TYPE_KEY)?;
        self.build(type_name.trim(), node.clone())
    }
}
