pub mod config;
pub mod error;
pub mod types;

pub use config::SolverConfig;
pub use error::{Result, SolverError};
pub use types::{
    Comparison, ConverterIndex, FlowMode, FlowScope, InventoryId, InventoryIndex, ModuleId, PartId,
    ResourceName, SimTime,
};
