//! Link converters to the inventories their flow modes can reach

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::core::types::{FlowMode, FlowScope, PartId};
use crate::resource::converter::Converter;
use crate::resource::inventory::Inventory;

/// Parts reachable through crossfeed from each part
///
/// Supplied by the host when a vessel is recorded; missing entries mean a
/// part only reaches itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossfeedTable {
    connections: AHashMap<PartId, AHashSet<PartId>>,
}

impl CrossfeedTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `from` can draw through to every part in `to`
    pub fn connect(&mut self, from: PartId, to: impl IntoIterator<Item = PartId>) {
        self.connections.entry(from).or_default().extend(to);
    }

    pub fn reaches(&self, from: PartId, to: PartId) -> bool {
        from == to
            || self
                .connections
                .get(&from)
                .map(|set| set.contains(&to))
                .unwrap_or(false)
    }

    /// Connections sorted by part, for deterministic output
    pub fn entries(&self) -> Vec<(PartId, Vec<PartId>)> {
        let mut entries: Vec<(PartId, Vec<PartId>)> = self
            .connections
            .iter()
            .map(|(from, to)| {
                let mut to: Vec<PartId> = to.iter().copied().collect();
                to.sort();
                (*from, to)
            })
            .collect();
        entries.sort_by_key(|(from, _)| *from);
        entries
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

fn in_scope(
    mode: FlowMode,
    converter_part: Option<PartId>,
    inventory: &Inventory,
    crossfeed: &CrossfeedTable,
) -> bool {
    let same_part = matches!((converter_part, inventory.part), (Some(a), Some(b)) if a == b);

    // Module storage is private to its part regardless of flow mode
    if inventory.is_module_inventory() {
        return same_part && mode.scope() != FlowScope::None;
    }

    match mode.scope() {
        FlowScope::Vessel => true,
        FlowScope::Part => same_part,
        FlowScope::Crossfeed => match (converter_part, inventory.part) {
            (Some(from), Some(to)) => crossfeed.reaches(from, to),
            _ => false,
        },
        FlowScope::None => false,
    }
}

/// Rebuild a converter's pull, push and constraint sets
pub fn link_converter(
    converter: &mut Converter,
    inventories: &[Inventory],
    crossfeed: &CrossfeedTable,
) {
    converter.clear_links();

    for (index, inventory) in inventories.iter().enumerate() {
        if let Some(input) = converter.inputs.get(&inventory.resource) {
            if in_scope(input.flow_mode, converter.part, inventory, crossfeed) {
                converter.pull.insert(index);
            }
        }

        if let Some(output) = converter.outputs.get(&inventory.resource) {
            if in_scope(output.flow_mode, converter.part, inventory, crossfeed) {
                converter.push.insert(index);
            }
        }

        let constrained = converter
            .requirements
            .iter()
            .filter(|req| req.resource == inventory.resource)
            .any(|req| in_scope(req.flow_mode, converter.part, inventory, crossfeed));
        if constrained {
            converter.constraint.insert(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ModuleId;
    use crate::resource::converter::{ConverterResources, ResourceConstraint, ResourceRatio};

    fn inventories() -> Vec<Inventory> {
        vec![
            Inventory::new("Fuel", 10.0, 10.0).unwrap().with_part(PartId(1)),
            Inventory::new("Fuel", 10.0, 10.0).unwrap().with_part(PartId(2)),
            Inventory::new("Fuel", 10.0, 10.0).unwrap().with_part(PartId(3)),
            Inventory::new("Oxidizer", 10.0, 10.0).unwrap().with_part(PartId(1)),
            Inventory::new("Fuel", 5.0, 5.0)
                .unwrap()
                .with_part(PartId(2))
                .with_module(ModuleId(9)),
        ]
    }

    #[test]
    fn test_vessel_scope_links_every_matching_inventory() {
        let resources = ConverterResources::new().with_input(ResourceRatio::new("Fuel", 1.0));
        let mut converter = Converter::with_resources(0, resources)
            .unwrap()
            .on_part(PartId(1));

        link_converter(&mut converter, &inventories(), &CrossfeedTable::new());
        assert_eq!(converter.pull.iter().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(converter.push.is_empty());
    }

    #[test]
    fn test_part_and_crossfeed_scopes() {
        let resources = ConverterResources::new()
            .with_input(
                ResourceRatio::new("Fuel", 1.0).with_flow_mode(FlowMode::StackPrioritySearch),
            )
            .with_output(ResourceRatio::new("Oxidizer", 1.0).with_flow_mode(FlowMode::NoFlow));
        let mut converter = Converter::with_resources(0, resources)
            .unwrap()
            .on_part(PartId(2));

        let mut crossfeed = CrossfeedTable::new();
        crossfeed.connect(PartId(2), [PartId(3)]);

        link_converter(&mut converter, &inventories(), &crossfeed);
        assert_eq!(converter.pull.iter().collect::<Vec<_>>(), vec![1, 2, 4]);
        // The oxidizer tank is on part 1, out of reach for NO_FLOW
        assert!(converter.push.is_empty());
    }

    #[test]
    fn test_requirements_fill_constraint_set() {
        let resources = ConverterResources::new().with_requirement(
            ResourceConstraint::at_least("Oxidizer", 1.0).with_flow_mode(FlowMode::NoFlow),
        );
        let mut converter = Converter::with_resources(0, resources)
            .unwrap()
            .on_part(PartId(1));

        link_converter(&mut converter, &inventories(), &CrossfeedTable::new());
        assert_eq!(converter.constraint.iter().collect::<Vec<_>>(), vec![3]);
    }
}
