//! Vessel documents - a processor saved as a `BACKGROUND_PROCESSOR` block
//!
//! Amounts and times are written with shortest round-trip formatting, so a
//! saved vessel loads back bit for bit. Malformed entries are skipped with a
//! warning rather than failing the whole vessel.

use std::path::Path;

use crate::behaviour::ratios::{parse_resources, write_resources};
use crate::behaviour::registry::{BehaviourRegistry, TYPE_KEY};
use crate::core::config::SolverConfig;
use crate::core::types::{InventoryId, ModuleId, PartId};
use crate::persistence::node::ConfigNode;
use crate::persistence::PersistError;
use crate::processor::ResourceProcessor;
use crate::resource::converter::Converter;
use crate::resource::inventory::Inventory;
use crate::resource::linking::CrossfeedTable;

pub const PROCESSOR_NODE: &str = "BACKGROUND_PROCESSOR";
pub const INVENTORY_NODE: &str = "INVENTORY";
pub const CONVERTER_NODE: &str = "CONVERTER";
pub const CROSSFEED_NODE: &str = "CROSSFEED";
pub const BEHAVIOUR_NODE: &str = "BEHAVIOUR";

/// A loaded processor plus the entries that had to be skipped
#[derive(Debug)]
pub struct LoadedVessel {
    pub processor: ResourceProcessor,
    pub warnings: Vec<PersistError>,
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

// === SAVE ===

fn save_inventory(inventory: &Inventory) -> ConfigNode {
    let mut node = ConfigNode::new(INVENTORY_NODE)
        .with_value("id", inventory.id)
        .with_value("resourceName", &inventory.resource)
        .with_value("amount", inventory.amount)
        .with_value("maxAmount", inventory.max_amount);
    if let Some(part) = inventory.part {
        node.add_value("part", part);
    }
    if let Some(module) = inventory.module {
        node.add_value("module", module);
    }
    node
}

fn save_converter(converter: &Converter) -> ConfigNode {
    let mut node = ConfigNode::new(CONVERTER_NODE).with_value("priority", converter.priority);
    if let Some(part) = converter.part {
        node.add_value("part", part);
    }

    match &converter.behaviour {
        Some(bound) => {
            let mut behaviour = bound.config().clone();
            behaviour.name = BEHAVIOUR_NODE.to_string();
            if !behaviour.has_value(TYPE_KEY) {
                behaviour
                    .values
                    .insert(0, (TYPE_KEY.to_string(), bound.type_name().to_string()));
            }
            node.add_node(behaviour);
        }
        None => write_resources(&converter.resources(), &mut node),
    }
    node
}

/// Write a processor as a `BACKGROUND_PROCESSOR` block
pub fn save_processor(processor: &ResourceProcessor) -> ConfigNode {
    let mut node = ConfigNode::new(PROCESSOR_NODE)
        .with_value("lastUpdate", processor.last_update())
        .with_value("nextChangepoint", processor.next_changepoint())
        .with_value("disabled", bool_str(processor.is_disabled()));
    if let Some(body) = processor.reference_body() {
        node.add_value("referenceBody", body);
    }

    for (part, connected) in processor.crossfeed().entries() {
        let connected: Vec<String> = connected.iter().map(|p| p.to_string()).collect();
        node.add_node(
            ConfigNode::new(CROSSFEED_NODE)
                .with_value("part", part)
                .with_value("connected", connected.join(", ")),
        );
    }
    for inventory in processor.inventories() {
        node.add_node(save_inventory(inventory));
    }
    for converter in processor.converters() {
        node.add_node(save_converter(converter));
    }
    node
}

/// Save a processor to a file as a one-block document
pub fn save_file(processor: &ResourceProcessor, path: &Path) -> Result<(), PersistError> {
    std::fs::write(path, save_processor(processor).to_string())?;
    Ok(())
}

// === LOAD ===

fn load_crossfeed(node: &ConfigNode, table: &mut CrossfeedTable) -> Result<(), PersistError> {
    let part: u32 = node.require_value("part")?;
    let raw: String = node.parse_value("connected")?.unwrap_or_default();
    let mut connected = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let to: u32 = entry.parse().map_err(|_| PersistError::Invalid {
            field: "connected".into(),
            reason: format!("'{}' is not a part id", entry),
        })?;
        connected.push(PartId(to));
    }
    table.connect(PartId(part), connected);
    Ok(())
}

fn load_inventory(node: &ConfigNode) -> Result<Inventory, PersistError> {
    let resource: String = node.require_value("resourceName")?;
    let amount: f64 = node.require_value("amount")?;
    let max_amount: f64 = node.require_value("maxAmount")?;

    let mut inventory = Inventory::new(resource.trim(), amount, max_amount)?;
    match node.get_value("id") {
        Some(raw) => {
            let id: InventoryId = raw.parse().map_err(|e: uuid::Error| PersistError::Invalid {
                field: "id".into(),
                reason: e.to_string(),
            })?;
            inventory = inventory.with_id(id);
        }
        None => tracing::warn!("Inventory of {} has no id, assigning {}", resource, inventory.id),
    }
    if let Some(part) = node.parse_value::<u32>("part")? {
        inventory = inventory.with_part(PartId(part));
    }
    if let Some(module) = node.parse_value::<u32>("module")? {
        inventory = inventory.with_module(ModuleId(module));
    }
    Ok(inventory)
}

fn load_converter(
    node: &ConfigNode,
    registry: &BehaviourRegistry,
) -> Result<Converter, PersistError> {
    let priority: i32 = node.parse_value("priority")?.unwrap_or(0);
    let mut converter = match node.get_node(BEHAVIOUR_NODE) {
        Some(behaviour) => {
            Converter::with_behaviour(priority, registry.build_from_node(behaviour)?)
        }
        None => Converter::with_resources(priority, parse_resources(node)?)?,
    };
    if let Some(part) = node.parse_value::<u32>("part")? {
        converter = converter.on_part(PartId(part));
    }
    Ok(converter)
}

fn skipped(kind: &str, index: usize, error: PersistError) -> PersistError {
    let error = PersistError::Skipped {
        kind: kind.to_string(),
        index,
        source: Box::new(error),
    };
    tracing::warn!("{}", error);
    error
}

/// Rebuild a processor from a `BACKGROUND_PROCESSOR` block
///
/// Rates are recomputed at the saved `lastUpdate`, so the processor resumes
/// exactly where it was saved.
pub fn load_processor(
    node: &ConfigNode,
    registry: &BehaviourRegistry,
    config: SolverConfig,
) -> Result<LoadedVessel, PersistError> {
    if node.name != PROCESSOR_NODE {
        return Err(PersistError::Invalid {
            field: "node".into(),
            reason: format!("expected {}, found '{}'", PROCESSOR_NODE, node.name),
        });
    }

    let last_update: f64 = node.parse_value("lastUpdate")?.unwrap_or(0.0);
    let next_changepoint: f64 = node.parse_value("nextChangepoint")?.unwrap_or(f64::INFINITY);
    let disabled = node.parse_bool("disabled")?.unwrap_or(false);

    let mut processor = ResourceProcessor::starting_at(config, last_update)?;
    let mut warnings = Vec::new();

    let mut crossfeed = CrossfeedTable::new();
    for (index, entry) in node.get_nodes(CROSSFEED_NODE).enumerate() {
        if let Err(e) = load_crossfeed(entry, &mut crossfeed) {
            warnings.push(skipped(CROSSFEED_NODE, index, e));
        }
    }
    processor.set_crossfeed(crossfeed);

    for (index, entry) in node.get_nodes(INVENTORY_NODE).enumerate() {
        let result = load_inventory(entry)
            .and_then(|inv| processor.add_inventory(inv).map_err(PersistError::from));
        if let Err(e) = result {
            warnings.push(skipped(INVENTORY_NODE, index, e));
        }
    }

    for (index, entry) in node.get_nodes(CONVERTER_NODE).enumerate() {
        let result = load_converter(entry, registry)
            .and_then(|c| processor.add_converter(c).map_err(PersistError::from));
        if let Err(e) = result {
            warnings.push(skipped(CONVERTER_NODE, index, e));
        }
    }

    let body: Option<String> = node.parse_value("referenceBody")?;
    processor.set_reference_body(body.map(|b| b.trim().to_string()));

    if !disabled {
        processor.compute_rates(last_update)?;
    }
    processor.restore_schedule(last_update, next_changepoint, disabled);

    tracing::info!(
        "Loaded vessel with {} inventories and {} converters ({} skipped)",
        processor.inventories().len(),
        processor.converters().len(),
        warnings.len()
    );
    Ok(LoadedVessel {
        processor,
        warnings,
    })
}

/// Parse a document and load the first `BACKGROUND_PROCESSOR` block in it
pub fn load_str(
    text: &str,
    registry: &BehaviourRegistry,
    config: SolverConfig,
) -> Result<LoadedVessel, PersistError> {
    let root = ConfigNode::parse(text)?;
    let node = root.get_node(PROCESSOR_NODE).ok_or_else(|| PersistError::Invalid {
        field: "document".into(),
        reason: format!("no {} block", PROCESSOR_NODE),
    })?;
    load_processor(node, registry, config)
}

pub fn load_file(
    path: &Path,
    registry: &BehaviourRegistry,
    config: SolverConfig,
) -> Result<LoadedVessel, PersistError> {
    let text = std::fs::read_to_string(path)?;
    load_str(&text, registry, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::converter::{ConverterResources, ResourceRatio};

    const PROBE: &str = "\
BACKGROUND_PROCESSOR
{
\tlastUpdate = 100
\tnextChangepoint = 140
\tdisabled = False
\tINVENTORY
\t{
\t\tid = 0b5c7c4e-4f5a-4e43-9d9b-7f1d2f0d7a11
\t\tresourceName = ElectricCharge
\t\tamount = 40
\t\tmaxAmount = 50
\t\tpart = 1
\t}
\tCONVERTER
\t{
\t\tpriority = 0
\t\tpart = 1
\t\tBEHAVIOUR
\t\t{
\t\t\ttype = ConstantConsumer
\t\t\tINPUT_RESOURCE
\t\t\t{
\t\t\t\tResourceName = ElectricCharge
\t\t\t\tRatio = 1
\t\t\t}
\t\t}
\t}
}
";

    #[test]
    fn test_load_resumes_rates() {
        let registry = BehaviourRegistry::with_defaults();
        let loaded = load_str(PROBE, &registry, SolverConfig::default()).unwrap();
        assert!(loaded.warnings.is_empty());

        let processor = loaded.processor;
        assert_eq!(processor.last_update(), 100.0);
        assert_eq!(processor.next_changepoint(), 140.0);
        assert_eq!(processor.inventories()[0].rate, -1.0);
        assert_eq!(processor.converters()[0].rate, 1.0);
        assert!(!processor.is_dirty());
    }

    #[test]
    fn test_unknown_behaviour_is_skipped() {
        let text = PROBE.replace("ConstantConsumer", "WarpCore");
        let registry = BehaviourRegistry::with_defaults();
        let loaded = load_str(&text, &registry, SolverConfig::default()).unwrap();

        assert_eq!(loaded.warnings.len(), 1);
        assert!(matches!(
            &loaded.warnings[0],
            PersistError::Skipped { kind, index: 0, .. } if kind == CONVERTER_NODE
        ));
        assert!(loaded.processor.converters().is_empty());
        assert_eq!(loaded.processor.inventories().len(), 1);
    }

    #[test]
    fn test_plain_converter_saves_ratio_blocks() {
        let mut processor = ResourceProcessor::default();
        let resources = ConverterResources::new().with_output(ResourceRatio::new("Ore", 0.25));
        processor
            .add_converter(Converter::with_resources(3, resources).unwrap())
            .unwrap();

        let saved = save_processor(&processor);
        let converter = saved.get_node(CONVERTER_NODE).unwrap();
        assert_eq!(converter.get_value("priority"), Some("3"));
        assert!(converter.get_node("OUTPUT_RESOURCE").is_some());
        assert!(converter.get_node(BEHAVIOUR_NODE).is_none());
    }

    #[test]
    fn test_wrong_root_rejected() {
        let registry = BehaviourRegistry::with_defaults();
        let node = ConfigNode::new("VESSEL");
        assert!(matches!(
            load_processor(&node, &registry, SolverConfig::default()),
            Err(PersistError::Invalid { .. })
        ));
    }
}
