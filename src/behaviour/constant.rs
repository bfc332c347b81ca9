//! Behaviours with fixed nominal resources

use std::sync::Arc;

use crate::behaviour::ratios::{parse_resources, INPUT_RESOURCE, OUTPUT_RESOURCE};
use crate::behaviour::{BehaviourError, ConverterBehaviour, VesselState};
use crate::persistence::node::ConfigNode;
use crate::resource::converter::ConverterResources;

/// Consumes, produces and requires the same resources forever
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantConverter {
    resources: ConverterResources,
}

impl ConstantConverter {
    pub fn new(resources: ConverterResources) -> Self {
        Self { resources }
    }

    pub fn from_config(node: &ConfigNode) -> Result<Self, BehaviourError> {
        Ok(Self::new(parse_resources(node)?))
    }
}

impl ConverterBehaviour for ConstantConverter {
    fn resources(&self, _state: &VesselState) -> ConverterResources {
        self.resources.clone()
    }
}

pub fn constant_converter(
    node: &ConfigNode,
) -> Result<Arc<dyn ConverterBehaviour>, BehaviourError> {
    Ok(Arc::new(ConstantConverter::from_config(node)?))
}

/// A converter with outputs only (e.g. an RTG)
pub fn constant_producer(node: &ConfigNode) -> Result<Arc<dyn ConverterBehaviour>, BehaviourError> {
    let converter = ConstantConverter::from_config(node)?;
    if !converter.resources.inputs.is_empty() {
        return Err(BehaviourError::Invalid {
            field: INPUT_RESOURCE.into(),
            reason: "a producer takes no inputs".into(),
        });
    }
    Ok(Arc::new(converter))
}

/// A converter with inputs only (e.g. a probe core)
pub fn constant_consumer(node: &ConfigNode) -> Result<Arc<dyn ConverterBehaviour>, BehaviourError> {
    let converter = ConstantConverter::from_config(node)?;
    if !converter.resources.outputs.is_empty() {
        return Err(BehaviourError::Invalid {
            field: OUTPUT_RESOURCE.into(),
            reason: "a consumer has no outputs".into(),
        });
    }
    Ok(Arc::new(converter))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(name: &str, resource: &str, ratio: f64) -> ConfigNode {
        ConfigNode::new(name)
            .with_value("ResourceName", resource)
            .with_value("Ratio", ratio)
    }

    #[test]
    fn test_constant_converter_ignores_time() {
        let node = ConfigNode::new("BEHAVIOUR")
            .with_node(block(OUTPUT_RESOURCE, "ElectricCharge", 0.75));
        let behaviour = constant_converter(&node).unwrap();

        let early = behaviour.resources(&VesselState::at(0.0));
        let late = behaviour.resources(&VesselState::at(1e9));
        assert_eq!(early, late);
        assert_eq!(behaviour.next_changepoint(&VesselState::at(0.0)), f64::INFINITY);
    }

    #[test]
    fn test_producer_rejects_inputs() {
        let node = ConfigNode::new("BEHAVIOUR")
            .with_node(block(INPUT_RESOURCE, "Ore", 1.0))
            .with_node(block(OUTPUT_RESOURCE, "Metal", 1.0));
        assert!(matches!(constant_producer(&node), Err(BehaviourError::Invalid { .. })));
        assert!(constant_converter(&node).is_ok());
    }

    #[test]
    fn test_consumer_rejects_outputs() {
        let node = ConfigNode::new("BEHAVIOUR").with_node(block(OUTPUT_RESOURCE, "Metal", 1.0));
        assert!(constant_consumer(&node).is_err());
    }
}
