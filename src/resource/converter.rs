//! Converters - weighted resource ratios plus activation requirements
//!
//! A converter runs at a single throughput fraction `rate` in `[0, 1]`.
//! Every input and output scales with that fraction, so partial service of
//! one input throttles all of the converter's other flows with it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::behaviour::BoundBehaviour;
use crate::core::error::{Result, SolverError};
use crate::core::types::{Comparison, FlowMode, PartId, ResourceName, SimTime};
use crate::resource::bitset::InventorySet;

/// Nominal flow of one resource into or out of a converter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRatio {
    pub resource: ResourceName,
    /// Units per second at full throughput
    pub ratio: f64,
    /// Output may be discarded when there is nowhere to store it
    pub dump_excess: bool,
    pub flow_mode: FlowMode,
}

impl ResourceRatio {
    pub fn new(resource: impl Into<ResourceName>, ratio: f64) -> Self {
        Self {
            resource: resource.into(),
            ratio,
            dump_excess: false,
            flow_mode: FlowMode::default(),
        }
    }

    pub fn dumping(mut self) -> Self {
        self.dump_excess = true;
        self
    }

    pub fn with_flow_mode(mut self, flow_mode: FlowMode) -> Self {
        self.flow_mode = flow_mode;
        self
    }

    fn validate(&self) -> Result<()> {
        let what = format!("ratio of {}", self.resource);
        SolverError::check_finite(&what, self.ratio)?;
        SolverError::check_non_negative(&what, self.ratio)?;
        Ok(())
    }
}

/// Threshold gating a converter on an aggregated resource amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConstraint {
    pub resource: ResourceName,
    pub amount: f64,
    pub comparison: Comparison,
    pub flow_mode: FlowMode,
}

impl ResourceConstraint {
    pub fn at_least(resource: impl Into<ResourceName>, amount: f64) -> Self {
        Self {
            resource: resource.into(),
            amount,
            comparison: Comparison::AtLeast,
            flow_mode: FlowMode::default(),
        }
    }

    pub fn at_most(resource: impl Into<ResourceName>, amount: f64) -> Self {
        Self {
            comparison: Comparison::AtMost,
            ..Self::at_least(resource, amount)
        }
    }

    pub fn with_flow_mode(mut self, flow_mode: FlowMode) -> Self {
        self.flow_mode = flow_mode;
        self
    }
}

/// Nominal resources a behaviour reports for a point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConverterResources {
    pub inputs: BTreeMap<ResourceName, ResourceRatio>,
    pub outputs: BTreeMap<ResourceName, ResourceRatio>,
    pub requirements: Vec<ResourceConstraint>,
}

impl ConverterResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input; ratios of a repeated resource are summed
    pub fn with_input(mut self, input: ResourceRatio) -> Self {
        merge_ratio(&mut self.inputs, input);
        self
    }

    /// Add an output; ratios of a repeated resource are summed
    pub fn with_output(mut self, output: ResourceRatio) -> Self {
        merge_ratio(&mut self.outputs, output);
        self
    }

    pub fn with_requirement(mut self, requirement: ResourceConstraint) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty() && self.requirements.is_empty()
    }

    /// Reject NaN, infinite or negative ratios and NaN thresholds
    pub fn validate(&self) -> Result<()> {
        for ratio in self.inputs.values().chain(self.outputs.values()) {
            ratio.validate()?;
        }
        for req in &self.requirements {
            SolverError::check_not_nan(&format!("requirement on {}", req.resource), req.amount)?;
        }
        Ok(())
    }
}

pub(crate) fn merge_ratio(map: &mut BTreeMap<ResourceName, ResourceRatio>, ratio: ResourceRatio) {
    match map.get_mut(&ratio.resource) {
        Some(existing) => {
            existing.ratio += ratio.ratio;
            existing.dump_excess |= ratio.dump_excess;
        }
        None => {
            map.insert(ratio.resource.clone(), ratio);
        }
    }
}

/// A resource transformer on a vessel
#[derive(Debug, Clone)]
pub struct Converter {
    /// Higher priority is serviced first when rationing
    pub priority: i32,
    pub inputs: BTreeMap<ResourceName, ResourceRatio>,
    pub outputs: BTreeMap<ResourceName, ResourceRatio>,
    pub requirements: Vec<ResourceConstraint>,
    /// Inventories this converter may draw from
    pub pull: InventorySet,
    /// Inventories this converter may deposit into
    pub push: InventorySet,
    /// Inventories this converter's requirements are evaluated against
    pub constraint: InventorySet,
    /// Derived from requirements on every resolve
    pub enabled: bool,
    /// Applied throughput fraction in `[0, 1]`
    pub rate: f64,
    /// Absolute time of the behaviour's next discontinuity
    pub next_changepoint: SimTime,
    pub part: Option<PartId>,
    /// Source of time-dependent nominal resources; `None` keeps them fixed
    pub behaviour: Option<BoundBehaviour>,
}

impl Default for Converter {
    fn default() -> Self {
        Self {
            priority: 0,
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            requirements: Vec::new(),
            pull: InventorySet::new(),
            push: InventorySet::new(),
            constraint: InventorySet::new(),
            enabled: true,
            rate: 0.0,
            next_changepoint: f64::INFINITY,
            part: None,
            behaviour: None,
        }
    }
}

impl Converter {
    pub fn new(priority: i32) -> Self {
        Self {
            priority,
            ..Self::default()
        }
    }

    /// Converter with fixed nominal resources
    pub fn with_resources(priority: i32, resources: ConverterResources) -> Result<Self> {
        let mut converter = Self::new(priority);
        converter.set_resources(resources)?;
        Ok(converter)
    }

    /// Converter driven by a behaviour; resources are filled on first resolve
    pub fn with_behaviour(priority: i32, behaviour: BoundBehaviour) -> Self {
        Self {
            behaviour: Some(behaviour),
            ..Self::new(priority)
        }
    }

    pub fn on_part(mut self, part: PartId) -> Self {
        self.part = Some(part);
        self
    }

    /// Replace nominal resources after validating them
    pub fn set_resources(&mut self, resources: ConverterResources) -> Result<()> {
        resources.validate()?;
        self.inputs = resources.inputs;
        self.outputs = resources.outputs;
        self.requirements = resources.requirements;
        Ok(())
    }

    /// Current nominal resources as a standalone value
    pub fn resources(&self) -> ConverterResources {
        ConverterResources {
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            requirements: self.requirements.clone(),
        }
    }

    /// Applied consumption rate of a resource (units/s)
    pub fn input_rate(&self, resource: &ResourceName) -> f64 {
        self.inputs
            .get(resource)
            .map(|r| r.ratio * self.rate)
            .unwrap_or(0.0)
    }

    /// Applied production rate of a resource (units/s)
    pub fn output_rate(&self, resource: &ResourceName) -> f64 {
        self.outputs
            .get(resource)
            .map(|r| r.ratio * self.rate)
            .unwrap_or(0.0)
    }

    /// Zero every applied rate; used when requirements fail
    pub fn disable(&mut self) {
        self.enabled = false;
        self.rate = 0.0;
    }

    pub fn clear_links(&mut self) {
        self.pull.clear();
        self.push.clear();
        self.constraint.clear();
    }
}
