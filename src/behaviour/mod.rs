//! Converter behaviours - the source of nominal resource ratios
//!
//! A behaviour is the only place application physics enters the solver. The
//! core asks it two things: what the converter nominally consumes, produces
//! and requires at a given time, and how long until that answer changes.

pub mod constant;
pub mod duty_cycle;
pub mod ratios;
pub mod registry;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::core::error::SolverError;
use crate::core::types::SimTime;
use crate::persistence::node::{ConfigNode, NodeError};
use crate::resource::converter::ConverterResources;

pub use constant::ConstantConverter;
pub use duty_cycle::DutyCycleConverter;
pub use registry::{BehaviourFactory, BehaviourRegistry};

/// Errors raised while building or registering behaviours
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BehaviourError {
    #[error("Unknown behaviour type: {0}")]
    UnknownType(String),

    #[error("Behaviour type already registered: {0}")]
    DuplicateType(String),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Solver(#[from] SolverError),
}

/// Context handed to behaviours when nominal rates are refreshed
#[derive(Debug, Clone, PartialEq)]
pub struct VesselState {
    pub current_time: SimTime,
    pub last_update: SimTime,
    /// Body the vessel is orbiting, if the host tracks it
    pub reference_body: Option<String>,
}

impl VesselState {
    pub fn at(current_time: SimTime) -> Self {
        Self {
            current_time,
            last_update: current_time,
            reference_body: None,
        }
    }
}

pub trait ConverterBehaviour: fmt::Debug {
    /// Nominal inputs, outputs and requirements at `state.current_time`
    fn resources(&self, state: &VesselState) -> ConverterResources;

    /// Duration until `resources` would answer differently
    fn next_changepoint(&self, _state: &VesselState) -> f64 {
        f64::INFINITY
    }
}

/// A behaviour together with the definition it was built from
///
/// Behaviours are immutable, so clones (e.g. inside a simulator) share the
/// same instance.
#[derive(Debug, Clone)]
pub struct BoundBehaviour {
    type_name: String,
    config: ConfigNode,
    behaviour: Arc<dyn ConverterBehaviour>,
}

impl BoundBehaviour {
    pub fn new(
        type_name: impl Into<String>,
        config: ConfigNode,
        behaviour: Arc<dyn ConverterBehaviour>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            config,
            behaviour,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Definition written back on save
    pub fn config(&self) -> &ConfigNode {
        &self.config
    }

    pub fn resources(&self, state: &VesselState) -> ConverterResources {
        self.behaviour.resources(state)
    }

    pub fn next_changepoint(&self, state: &VesselState) -> f64 {
        self.behaviour.next_changepoint(state)
    }
}
