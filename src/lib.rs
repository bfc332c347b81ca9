//! Background Resources - rate solver and changepoint scheduler for vessels
//! that are not actively simulated by their host

pub mod behaviour;
pub mod core;
pub mod persistence;
pub mod processor;
pub mod resource;
pub mod solver;

pub use crate::behaviour::{BehaviourRegistry, ConverterBehaviour, VesselState};
pub use crate::core::{Result, SolverConfig, SolverError};
pub use crate::processor::{ResourceProcessor, Simulator};
