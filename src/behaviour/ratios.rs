//! Read and write `INPUT_RESOURCE` / `OUTPUT_RESOURCE` / `REQUIRED_RESOURCE` blocks

use crate::behaviour::BehaviourError;
use crate::core::types::{Comparison, FlowMode, ResourceName};
use crate::persistence::node::ConfigNode;
use crate::resource::converter::{ConverterResources, ResourceConstraint, ResourceRatio};

pub const INPUT_RESOURCE: &str = "INPUT_RESOURCE";
pub const OUTPUT_RESOURCE: &str = "OUTPUT_RESOURCE";
pub const REQUIRED_RESOURCE: &str = "REQUIRED_RESOURCE";

fn parse_ratio(block: &ConfigNode) -> Result<ResourceRatio, BehaviourError> {
    let resource: String = block.require_value("ResourceName")?;
    let ratio: f64 = block.require_value("Ratio")?;
    let dump_excess = block.parse_bool("DumpExcess")?.unwrap_or(false);
    let flow_mode: FlowMode = block.parse_value("FlowMode")?.unwrap_or_default();

    Ok(ResourceRatio {
        resource: ResourceName::new(resource.trim()),
        ratio,
        dump_excess,
        flow_mode,
    })
}

fn parse_constraint(block: &ConfigNode) -> Result<ResourceConstraint, BehaviourError> {
    let resource: String = block.require_value("ResourceName")?;
    let amount: f64 = block.require_value("Amount")?;
    let comparison: Comparison = block.parse_value("Constraint")?.unwrap_or_default();
    let flow_mode: FlowMode = block.parse_value("FlowMode")?.unwrap_or_default();

    Ok(ResourceConstraint {
        resource: ResourceName::new(resource.trim()),
        amount,
        comparison,
        flow_mode,
    })
}

/// Collect every resource block of `node` into validated resources
pub fn parse_resources(node: &ConfigNode) -> Result<ConverterResources, BehaviourError> {
    let mut resources = ConverterResources::new();
    for block in node.get_nodes(INPUT_RESOURCE) {
        resources = resources.with_input(parse_ratio(block)?);
    }
    for block in node.get_nodes(OUTPUT_RESOURCE) {
        resources = resources.with_output(parse_ratio(block)?);
    }
    for block in node.get_nodes(REQUIRED_RESOURCE) {
        resources = resources.with_requirement(parse_constraint(block)?);
    }
    resources.validate()?;
    Ok(resources)
}

fn write_ratio(name: &str, ratio: &ResourceRatio) -> ConfigNode {
    ConfigNode::new(name)
        .with_value("ResourceName", &ratio.resource)
        .with_value("Ratio", ratio.ratio)
        .with_value("DumpExcess", if ratio.dump_excess { "True" } else { "False" })
        .with_value("FlowMode", ratio.flow_mode)
}

/// Append resource blocks for `resources` to `node`
pub fn write_resources(resources: &ConverterResources, node: &mut ConfigNode) {
    for input in resources.inputs.values() {
        node.add_node(write_ratio(INPUT_RESOURCE, input));
    }
    for output in resources.outputs.values() {
        node.add_node(write_ratio(OUTPUT_RESOURCE, output));
    }
    for req in &resources.requirements {
        node.add_node(
            ConfigNode::new(REQUIRED_RESOURCE)
                .with_value("ResourceName", &req.resource)
                .with_value("Amount", req.amount)
                .with_value("Constraint", req.comparison)
                .with_value("FlowMode", req.flow_mode),
        );
    }
}
