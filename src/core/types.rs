//! Core type definitions used throughout the codebase

use std::fmt;
use std::str::FromStr;

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of a resource (e.g. "ElectricCharge", "LiquidFuel")
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From,
)]
pub struct ResourceName(pub String);

impl ResourceName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Stable identifier for an inventory
///
/// Inventories are addressed by index inside a processor, but indices shift
/// when inventories are removed. The id survives that and persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub struct InventoryId(pub Uuid);

impl InventoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InventoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for InventoryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Identifier of a vessel part, used to scope resource flow
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From,
)]
pub struct PartId(pub u32);

/// Identifier of a part module owning private storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From)]
pub struct ModuleId(pub u32);

/// Dense index of an inventory inside its processor
pub type InventoryIndex = usize;

/// Dense index of a converter inside its processor
pub type ConverterIndex = usize;

/// Simulation time in seconds
pub type SimTime = f64;

/// How a requirement threshold is compared against the aggregated amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Comparison {
    #[default]
    AtLeast,
    AtMost,
}

impl Comparison {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::AtLeast => "AT_LEAST",
            Comparison::AtMost => "AT_MOST",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Comparison {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AT_LEAST" => Ok(Comparison::AtLeast),
            "AT_MOST" => Ok(Comparison::AtMost),
            other => Err(format!("unknown comparison: {}", other)),
        }
    }
}

/// Which inventories a resource may flow from or to
///
/// Names follow the host's resource flow modes. Each mode collapses to a
/// [`FlowScope`] since the background simulation has no staging information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FlowMode {
    NoFlow,
    #[default]
    AllVessel,
    AllVesselBalance,
    StagePriorityFlow,
    StagePriorityFlowBalance,
    StackPrioritySearch,
    StageStackFlow,
    StageStackFlowBalance,
    Null,
}

/// Set of inventories a flow mode can reach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowScope {
    /// Only inventories on the converter's own part
    Part,
    /// The converter's part plus parts connected through crossfeed
    Crossfeed,
    /// Every inventory on the vessel
    Vessel,
    /// No inventories at all
    None,
}

impl FlowMode {
    pub fn scope(&self) -> FlowScope {
        use FlowMode::*;
        match self {
            NoFlow => FlowScope::Part,
            AllVessel | AllVesselBalance | StagePriorityFlow | StagePriorityFlowBalance => {
                FlowScope::Vessel
            }
            StackPrioritySearch | StageStackFlow | StageStackFlowBalance => FlowScope::Crossfeed,
            Null => FlowScope::None,
        }
    }

    pub fn is_vessel_wide(&self) -> bool {
        self.scope() == FlowScope::Vessel
    }

    pub fn as_str(&self) -> &'static str {
        use FlowMode::*;
        match self {
            NoFlow => "NO_FLOW",
            AllVessel => "ALL_VESSEL",
            AllVesselBalance => "ALL_VESSEL_BALANCE",
            StagePriorityFlow => "STAGE_PRIORITY_FLOW",
            StagePriorityFlowBalance => "STAGE_PRIORITY_FLOW_BALANCE",
            StackPrioritySearch => "STACK_PRIORITY_SEARCH",
            StageStackFlow => "STAGE_STACK_FLOW",
            StageStackFlowBalance => "STAGE_STACK_FLOW_BALANCE",
            Null => "NULL",
        }
    }
}

impl fmt::Display for FlowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use FlowMode::*;
        let mode = match s.trim().to_ascii_uppercase().as_str() {
            "NO_FLOW" => NoFlow,
            "ALL_VESSEL" => AllVessel,
            "ALL_VESSEL_BALANCE" => AllVesselBalance,
            "STAGE_PRIORITY_FLOW" => StagePriorityFlow,
            "STAGE_PRIORITY_FLOW_BALANCE" => StagePriorityFlowBalance,
            "STACK_PRIORITY_SEARCH" => StackPrioritySearch,
            "STAGE_STACK_FLOW" => StageStackFlow,
            "STAGE_STACK_FLOW_BALANCE" => StageStackFlowBalance,
            "NULL" => Null,
            other => return Err(format!("unknown flow mode: {}", other)),
        };
        Ok(mode)
    }
}
