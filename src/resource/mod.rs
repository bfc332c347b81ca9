//! Resource layer - inventories, converters and the links between them

pub mod bitset;
pub mod converter;
pub mod inventory;
pub mod linking;

pub use bitset::InventorySet;
pub use converter::{Converter, ConverterResources, ResourceConstraint, ResourceRatio};
pub use inventory::Inventory;
pub use linking::{link_converter, CrossfeedTable};
