//! Resource pools - inventories that converters treat as one tank
//!
//! Any enabled converter that may pull from (or push into) several
//! inventories of a resource joins them into a pool. Inside a pool, the
//! inventories linked by exactly the same converters form a reach class;
//! every converter sees a class as a single tank, and flow only ever moves
//! through classes a converter is linked to. Per-inventory rates are a
//! proportional split of each class's net rate.

use ahash::AHashMap;

use crate::core::config::SolverConfig;
use crate::core::types::{ConverterIndex, InventoryIndex, ResourceName};
use crate::resource::bitset::InventorySet;
use crate::resource::converter::Converter;
use crate::resource::inventory::Inventory;

/// Aggregate storage of a set of same-resource inventories
#[derive(Debug, Clone, PartialEq)]
pub struct Pool {
    pub resource: ResourceName,
    pub members: Vec<InventoryIndex>,
    pub amount: f64,
    pub capacity: f64,
    /// Sum of member free space; infinite if any member is unbounded
    pub free: f64,
    pub empty: bool,
    pub full: bool,
}

impl Pool {
    fn new(resource: &ResourceName) -> Self {
        Self {
            resource: resource.clone(),
            members: Vec::new(),
            amount: 0.0,
            capacity: 0.0,
            free: 0.0,
            empty: false,
            full: false,
        }
    }

    fn push(&mut self, index: InventoryIndex, inventory: &Inventory) {
        self.members.push(index);
        self.amount += inventory.amount;
        self.capacity += inventory.max_amount;
        self.free += inventory.free_space();
    }

    fn settle(&mut self, config: &SolverConfig) {
        let tol = config.tolerance(self.capacity);
        self.empty = self.amount <= tol;
        self.full = self.capacity.is_finite() && self.amount >= self.capacity - tol;
    }

    /// Whether stored amount or capacity is NaN
    pub fn is_corrupt(&self) -> bool {
        self.amount.is_nan() || self.capacity.is_nan()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PoolMap {
    pub pools: Vec<Pool>,
    /// Reach classes; each lies entirely inside one pool
    pub classes: Vec<Pool>,
    /// Pool index for every inventory
    pub pool_of: Vec<usize>,
    /// Reach class index for every inventory
    pub class_of: Vec<usize>,
    /// Pool index for every reach class
    pub class_pool: Vec<usize>,
}

impl PoolMap {
    /// Reach classes holding the inventories of `resource` within `links`
    pub fn classes_for(
        &self,
        links: &InventorySet,
        resource: &ResourceName,
        inventories: &[Inventory],
    ) -> Vec<usize> {
        let mut classes: Vec<usize> = links
            .iter()
            .filter(|&i| inventories.get(i).map(|inv| &inv.resource) == Some(resource))
            .map(|i| self.class_of[i])
            .collect();
        classes.sort_unstable();
        classes.dedup();
        classes
    }
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Lower index becomes root so pool order follows inventory order
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }
}

/// Which side of a converter links an inventory
type Link = (ConverterIndex, bool);

fn union_links<'a>(
    sets: &mut DisjointSet,
    reach: &mut [Vec<Link>],
    link: Link,
    links: &InventorySet,
    resources: impl Iterator<Item = &'a ResourceName>,
    inventories: &[Inventory],
) {
    for resource in resources {
        let mut first = None;
        for index in links.iter().filter(|&i| i < inventories.len()) {
            if &inventories[index].resource != resource {
                continue;
            }
            reach[index].push(link);
            match first {
                None => first = Some(index),
                Some(root) => sets.union(root, index),
            }
        }
    }
}

/// Partition inventories into pools and reach classes
///
/// Only enabled converters link inventories together; a converter held off
/// by its requirements neither merges pools nor splits classes.
pub fn build_pools(
    inventories: &[Inventory],
    converters: &[Converter],
    config: &SolverConfig,
) -> PoolMap {
    let mut sets = DisjointSet::new(inventories.len());
    let mut reach: Vec<Vec<Link>> = vec![Vec::new(); inventories.len()];
    for (index, converter) in converters.iter().enumerate() {
        if !converter.enabled {
            continue;
        }
        union_links(
            &mut sets,
            &mut reach,
            (index, false),
            &converter.pull,
            converter.inputs.keys(),
            inventories,
        );
        union_links(
            &mut sets,
            &mut reach,
            (index, true),
            &converter.push,
            converter.outputs.keys(),
            inventories,
        );
    }

    let mut map = PoolMap {
        pool_of: vec![usize::MAX; inventories.len()],
        class_of: vec![usize::MAX; inventories.len()],
        ..PoolMap::default()
    };
    let mut root_pool = vec![usize::MAX; inventories.len()];
    let mut class_ids: AHashMap<(usize, &[Link]), usize> = AHashMap::new();

    for (index, inventory) in inventories.iter().enumerate() {
        let root = sets.find(index);
        if root_pool[root] == usize::MAX {
            root_pool[root] = map.pools.len();
            map.pools.push(Pool::new(&inventory.resource));
        }
        let pool = root_pool[root];
        map.pools[pool].push(index, inventory);
        map.pool_of[index] = pool;

        // Classes are numbered in order of first member, independent of hashing
        let class = *class_ids
            .entry((pool, reach[index].as_slice()))
            .or_insert_with(|| {
                map.classes.push(Pool::new(&inventory.resource));
                map.class_pool.push(pool);
                map.classes.len() - 1
            });
        map.classes[class].push(index, inventory);
        map.class_of[index] = class;
    }

    for pool in map.pools.iter_mut().chain(map.classes.iter_mut()) {
        pool.settle(config);
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{FlowMode, PartId};
    use crate::resource::converter::{ConverterResources, ResourceConstraint, ResourceRatio};
    use crate::resource::linking::{link_converter, CrossfeedTable};

    fn engine(flow_mode: FlowMode, part: u32, inventories: &[Inventory]) -> Converter {
        let input = ResourceRatio::new("Fuel", 1.0).with_flow_mode(flow_mode);
        let resources = ConverterResources::new().with_input(input);
        let mut engine = Converter::with_resources(0, resources).unwrap().on_part(PartId(part));
        link_converter(&mut engine, inventories, &CrossfeedTable::new());
        engine
    }

    #[test]
    fn test_linked_inventories_share_a_pool() {
        let config = SolverConfig::default();
        let inventories = vec![
            Inventory::new("Fuel", 0.0, 10.0).unwrap(),
            Inventory::new("Oxidizer", 5.0, 10.0).unwrap(),
            Inventory::new("Fuel", 0.0, 20.0).unwrap(),
        ];
        let engine = engine(FlowMode::AllVessel, 0, &inventories);

        let map = build_pools(&inventories, &[engine], &config);
        assert_eq!(map.pools.len(), 2);
        assert_eq!(map.pool_of[0], map.pool_of[2]);
        assert_ne!(map.pool_of[0], map.pool_of[1]);
        assert_eq!(map.class_of[0], map.class_of[2]);

        let fuel = &map.pools[map.pool_of[0]];
        assert_eq!(fuel.members, vec![0, 2]);
        assert_eq!(fuel.capacity, 30.0);
        assert_eq!(fuel.free, 30.0);
        assert!(fuel.empty);
        assert!(!fuel.full);
    }

    #[test]
    fn test_unlinked_inventories_stay_separate() {
        let config = SolverConfig::default();
        let inventories = vec![
            Inventory::new("Fuel", 10.0, 10.0).unwrap(),
            Inventory::new("Fuel", 0.0, f64::INFINITY).unwrap(),
        ];
        let map = build_pools(&inventories, &[], &config);
        assert_eq!(map.pools.len(), 2);
        assert!(map.pools[0].full);
        assert!(!map.pools[1].full);
        assert_eq!(map.classes.len(), 2);
    }

    #[test]
    fn test_different_reach_splits_classes() {
        let config = SolverConfig::default();
        let inventories = vec![
            Inventory::new("Fuel", 10.0, 10.0).unwrap().with_part(PartId(1)),
            Inventory::new("Fuel", 0.0, 10.0).unwrap().with_part(PartId(2)),
        ];
        let converters = vec![
            engine(FlowMode::AllVessel, 1, &inventories),
            engine(FlowMode::NoFlow, 2, &inventories),
        ];

        let map = build_pools(&inventories, &converters, &config);
        assert_eq!(map.pools.len(), 1);
        assert_eq!(map.classes.len(), 2);
        assert!(map.classes[map.class_of[0]].full);
        assert!(map.classes[map.class_of[1]].empty);
        assert_eq!(map.class_pool, vec![0, 0]);

        let local = map.classes_for(&converters[1].pull, &"Fuel".into(), &inventories);
        assert_eq!(local, vec![map.class_of[1]]);
        let wide = map.classes_for(&converters[0].pull, &"Fuel".into(), &inventories);
        assert_eq!(wide.len(), 2);
    }

    #[test]
    fn test_disabled_converter_does_not_merge() {
        let config = SolverConfig::default();
        let inventories = vec![
            Inventory::new("Fuel", 10.0, 10.0).unwrap(),
            Inventory::new("Fuel", 0.0, 10.0).unwrap(),
        ];
        let resources = ConverterResources::new()
            .with_input(ResourceRatio::new("Fuel", 1.0))
            .with_requirement(ResourceConstraint::at_least("Fuel", 100.0));
        let mut gated = Converter::with_resources(0, resources).unwrap();
        link_converter(&mut gated, &inventories, &CrossfeedTable::new());
        gated.enabled = false;

        let map = build_pools(&inventories, &[gated], &config);
        assert_eq!(map.pools.len(), 2);
    }
}
