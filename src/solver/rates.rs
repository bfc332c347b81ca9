//! Rate resolver - priority-tiered rationing of converter throughput
//!
//! Each converter gets one throughput fraction. Every reach class rations
//! its consumers against producer flow (plus stored stock) and its producers
//! against consumer draw (plus free space).
//!
//! Resolution runs in two phases. Grants are first iterated to a fixed
//! point: each class re-rations from nominal demand, with converters held
//! lower by another class only taking what they can use, so supply released
//! by a blocked tier reaches the tiers below it. A settling phase then only
//! ever lowers fractions, which leaves every class consistent even when the
//! grants did not settle within the pass budget.

use crate::core::config::SolverConfig;
use crate::core::error::SolverError;
use crate::core::types::ConverterIndex;
use crate::resource::converter::Converter;
use crate::resource::inventory::Inventory;
use crate::solver::constraint;
use crate::solver::pool::{build_pools, Pool, PoolMap};

/// Result of one resolve
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateSolution {
    /// Applied throughput fraction per converter
    pub converter_rates: Vec<f64>,
    /// Net rate (units/s) per inventory
    pub inventory_rates: Vec<f64>,
    /// Classes that could not be resolved; their converters run at zero
    pub failures: Vec<SolverError>,
    /// Rationing passes taken over both phases
    pub passes: usize,
}

impl RateSolution {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One converter's connection to a reach class
#[derive(Debug, Clone, Copy)]
struct Port {
    converter: ConverterIndex,
    priority: i32,
    /// Share of the nominal ratio routed through this class
    ratio: f64,
    dump_excess: bool,
}

/// Ports attached to one reach class, by index into `Network::ports`
#[derive(Debug, Default)]
struct ClassPorts {
    consumers: Vec<usize>,
    producers: Vec<usize>,
    consumer_tiers: Vec<Vec<usize>>,
    /// Dumping producers are never derated and sit in no tier
    producer_tiers: Vec<Vec<usize>>,
}

#[derive(Debug, Default)]
struct Network {
    ports: Vec<Port>,
    classes: Vec<ClassPorts>,
    by_converter: Vec<Vec<usize>>,
}

impl Network {
    fn flow(&self, ids: &[usize], fractions: &[f64]) -> f64 {
        ids.iter()
            .map(|&p| fractions[self.ports[p].converter] * self.ports[p].ratio)
            .sum()
    }

    fn dumped(&self, class: &ClassPorts, fractions: &[f64]) -> f64 {
        class
            .producers
            .iter()
            .filter(|&&p| self.ports[p].dump_excess)
            .map(|&p| fractions[self.ports[p].converter] * self.ports[p].ratio)
            .sum()
    }

    /// Highest fraction each converter can run at under `grants`
    fn throughput(&self, grants: &[f64], active: &[bool]) -> Vec<f64> {
        active
            .iter()
            .zip(&self.by_converter)
            .map(|(&on, ports)| {
                if on {
                    ports.iter().map(|&p| grants[p]).fold(1.0, f64::min)
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Per port, the limit set by the converter's other ports
    fn limits(&self, grants: &[f64]) -> Vec<f64> {
        let mut limits = vec![1.0; self.ports.len()];
        for ports in &self.by_converter {
            for &p in ports {
                limits[p] = ports
                    .iter()
                    .filter(|&&q| q != p)
                    .map(|&q| grants[q])
                    .fold(1.0, f64::min);
            }
        }
        limits
    }

    fn touches(&self, class: &ClassPorts, converter: ConverterIndex) -> bool {
        class
            .consumers
            .iter()
            .chain(&class.producers)
            .any(|&p| self.ports[p].converter == converter)
    }
}

/// Split port indices into priority tiers, highest first
fn tiers(ports: &[Port], ids: &[usize]) -> Vec<Vec<usize>> {
    let mut sorted: Vec<usize> = ids.to_vec();
    sorted.sort_by(|&a, &b| ports[b].priority.cmp(&ports[a].priority));

    let mut tiers: Vec<Vec<usize>> = Vec::new();
    for id in sorted {
        match tiers.last_mut() {
            Some(tier) if ports[tier[0]].priority == ports[id].priority => tier.push(id),
            _ => tiers.push(vec![id]),
        }
    }
    tiers
}

/// How a converter's nominal ratio divides across the classes it reaches
///
/// Consumers draw from stocked classes in proportion to amount and producers
/// fill open classes in proportion to free space. With nothing stocked (or
/// nothing open) the split follows the nominal flow of the opposite side.
fn split(classes: &[usize], map: &PoolMap, consumer: bool, opposite: &[f64]) -> Vec<f64> {
    let mut weights: Vec<f64> = classes
        .iter()
        .map(|&k| {
            let class = &map.classes[k];
            match consumer {
                true if !class.empty => class.amount,
                false if !class.full => class.free,
                _ => 0.0,
            }
        })
        .collect();

    if weights.iter().any(|w| w.is_infinite()) {
        for w in &mut weights {
            *w = if w.is_infinite() { 1.0 } else { 0.0 };
        }
    }
    if weights.iter().sum::<f64>() <= 0.0 {
        weights = classes.iter().map(|&k| opposite[k]).collect();
    }

    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return vec![1.0 / classes.len() as f64; classes.len()];
    }
    weights.iter().map(|w| w / total).collect()
}

/// Attach every runnable converter to the reach classes it draws from and feeds
///
/// A converter missing storage for an input, or for an output it may not
/// dump, cannot run at all; neither can one linked to a corrupt class.
fn attach(
    converters: &[Converter],
    inventories: &[Inventory],
    map: &PoolMap,
    failed: &[bool],
    fractions: &mut [f64],
) -> Network {
    // (converter, consumer, nominal ratio, dump_excess, classes reached)
    let mut reaches: Vec<(ConverterIndex, bool, f64, bool, Vec<usize>)> = Vec::new();

    for (index, converter) in converters.iter().enumerate() {
        if fractions[index] <= 0.0 {
            continue;
        }

        let mut own = Vec::new();
        let mut runnable = true;
        for (resource, input) in &converter.inputs {
            let classes = map.classes_for(&converter.pull, resource, inventories);
            runnable &= !classes.is_empty();
            own.push((index, true, input.ratio, false, classes));
        }
        for (resource, output) in &converter.outputs {
            let classes = map.classes_for(&converter.push, resource, inventories);
            runnable &= output.dump_excess || !classes.is_empty();
            own.push((index, false, output.ratio, output.dump_excess, classes));
        }
        runnable &= !own
            .iter()
            .any(|(.., classes)| classes.iter().any(|&k| failed[k]));

        if !runnable {
            tracing::trace!("Converter {} has an unlinked resource, idling", index);
            fractions[index] = 0.0;
            continue;
        }
        reaches.extend(own);
    }

    let mut supplied = vec![0.0; map.classes.len()];
    let mut drawn = vec![0.0; map.classes.len()];
    for (_, consumer, ratio, _, classes) in &reaches {
        let side = if *consumer { &mut drawn } else { &mut supplied };
        for &k in classes {
            side[k] += ratio;
        }
    }

    let mut network = Network {
        ports: Vec::new(),
        classes: (0..map.classes.len()).map(|_| ClassPorts::default()).collect(),
        by_converter: vec![Vec::new(); converters.len()],
    };
    for (converter, consumer, ratio, dump_excess, classes) in reaches {
        if classes.is_empty() {
            continue;
        }
        let opposite = if consumer { &supplied } else { &drawn };
        let weights = split(&classes, map, consumer, opposite);

        for (&class, weight) in classes.iter().zip(weights) {
            if weight <= 0.0 {
                continue;
            }
            let id = network.ports.len();
            network.ports.push(Port {
                converter,
                priority: converters[converter].priority,
                ratio: ratio * weight,
                dump_excess,
            });
            network.by_converter[converter].push(id);
            let side = &mut network.classes[class];
            if consumer {
                side.consumers.push(id);
            } else {
                side.producers.push(id);
            }
        }
    }

    for class in &mut network.classes {
        class.consumer_tiers = tiers(&network.ports, &class.consumers);
        let rationed: Vec<usize> = class
            .producers
            .iter()
            .copied()
            .filter(|&p| !network.ports[p].dump_excess)
            .collect();
        class.producer_tiers = tiers(&network.ports, &rationed);
    }

    network
}

/// Common level `f` at which `Σ ratio × min(f, limit)` uses up `supply`
fn water_level(tier: &[usize], ports: &[Port], limits: &[f64], supply: f64) -> f64 {
    let mut members: Vec<(f64, f64)> = tier
        .iter()
        .map(|&p| (limits[p], ports[p].ratio))
        .collect();
    members.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut remaining = supply.max(0.0);
    let mut open: f64 = members.iter().map(|&(_, ratio)| ratio).sum();
    for (limit, ratio) in members {
        if open <= 0.0 {
            break;
        }
        let level = remaining / open;
        if limit > level {
            return level.clamp(0.0, 1.0);
        }
        remaining -= ratio * limit;
        open -= ratio;
    }
    1.0
}

/// Grant levels for one side of a class
///
/// Tiers are served from `supply` in order, each member asking for what its
/// other ports allow. The first tier that does not fit is granted the
/// reserve if there is one; otherwise it shares the remainder at one common
/// level and lower tiers get nothing.
fn grant_tiers(
    tiers: &[Vec<usize>],
    ports: &[Port],
    limits: &[f64],
    supply: f64,
    mut reserve: bool,
    grants: &mut [f64],
    config: &SolverConfig,
) {
    let mut remaining = supply.max(0.0);

    for tier in tiers {
        let demand: f64 = tier.iter().map(|&p| ports[p].ratio * limits[p]).sum();
        let level = if demand <= remaining + config.tolerance(demand) {
            remaining = (remaining - demand).max(0.0);
            1.0
        } else if reserve {
            reserve = false;
            remaining = 0.0;
            1.0
        } else {
            let level = water_level(tier, ports, limits, remaining);
            remaining = 0.0;
            level
        };
        for &p in tier {
            grants[p] = level;
        }
    }
}

/// Ration one side of a class, returns whether any fraction dropped noticeably
///
/// Same tier order as `grant_tiers`, but fractions are only ever scaled
/// down, so repeated passes settle.
fn ration(
    tiers: &[Vec<usize>],
    network: &Network,
    fractions: &mut [f64],
    supply: f64,
    mut reserve: bool,
    config: &SolverConfig,
) -> bool {
    let mut remaining = supply.max(0.0);
    let mut changed = false;

    for tier in tiers {
        let demand = network.flow(tier, fractions);
        if demand <= 0.0 {
            continue;
        }
        if demand <= remaining + config.tolerance(demand) {
            remaining = (remaining - demand).max(0.0);
            continue;
        }
        if reserve {
            reserve = false;
            remaining = 0.0;
            continue;
        }

        let scale = (remaining / demand).clamp(0.0, 1.0);
        for &p in tier {
            let converter = network.ports[p].converter;
            let current = fractions[converter];
            let next = current * scale;
            if current - next > config.epsilon {
                changed = true;
            }
            fractions[converter] = next;
        }
        remaining = 0.0;
    }

    changed
}

fn fail_class(class: &Pool, reason: String) -> SolverError {
    tracing::error!("Rate resolution failed for {}: {}", class.resource, reason);
    SolverError::RateResolution {
        resource: class.resource.clone(),
        reason,
    }
}

/// Split a class's net rate across its members
///
/// Draining goes in proportion to stored amount and filling in proportion
/// to free space, so all members hit the boundary together. Unbounded
/// members absorb the whole flow between them.
fn distribute(class: &Pool, net: f64, inventories: &[Inventory], rates: &mut [f64]) {
    if net == 0.0 {
        return;
    }

    let weight = |inventory: &Inventory| {
        if net < 0.0 {
            inventory.amount
        } else {
            inventory.free_space()
        }
    };

    let unbounded: Vec<usize> = class
        .members
        .iter()
        .copied()
        .filter(|&i| weight(&inventories[i]).is_infinite())
        .collect();
    if !unbounded.is_empty() {
        let share = net / unbounded.len() as f64;
        for i in unbounded {
            rates[i] = share;
        }
        return;
    }

    let total: f64 = class.members.iter().map(|&i| weight(&inventories[i])).sum();
    if total <= 0.0 {
        let share = net / class.members.len() as f64;
        for &i in &class.members {
            rates[i] = share;
        }
        return;
    }
    for &i in &class.members {
        rates[i] = net * weight(&inventories[i]) / total;
    }
}

/// Iterate per-port grants towards a fixed point, returns passes taken
fn grant(
    network: &Network,
    map: &PoolMap,
    fractions: &mut [f64],
    config: &SolverConfig,
) -> usize {
    let active: Vec<bool> = fractions.iter().map(|&f| f > 0.0).collect();
    let mut grants = vec![1.0; network.ports.len()];
    let mut passes = 0;

    while passes < config.max_rationing_passes {
        passes += 1;
        let throughput = network.throughput(&grants, &active);
        let limits = network.limits(&grants);
        let mut next = grants.clone();

        for (class, ports) in map.classes.iter().zip(&network.classes) {
            let supply = network.flow(&ports.producers, &throughput);
            grant_tiers(
                &ports.consumer_tiers,
                &network.ports,
                &limits,
                supply,
                !class.empty,
                &mut next,
                config,
            );

            let sink = network.flow(&ports.consumers, &throughput)
                - network.dumped(ports, &throughput);
            grant_tiers(
                &ports.producer_tiers,
                &network.ports,
                &limits,
                sink,
                !class.full,
                &mut next,
                config,
            );
        }

        let changed = grants
            .iter()
            .zip(&next)
            .any(|(a, b)| (a - b).abs() > config.epsilon);
        grants = next;
        tracing::trace!("Grant pass {} changed: {}", passes, changed);
        if !changed {
            break;
        }
    }

    let throughput = network.throughput(&grants, &active);
    fractions.copy_from_slice(&throughput);
    passes
}

/// Resolve applied rates for every converter and inventory
///
/// Converters must already be linked. Requirements are evaluated here, so
/// `enabled` reflects the inventory state passed in. Writes `rate` on
/// converters and inventories; stored amounts are never touched.
pub fn resolve(
    converters: &mut [Converter],
    inventories: &mut [Inventory],
    config: &SolverConfig,
) -> RateSolution {
    for converter in converters.iter_mut() {
        converter.enabled = constraint::evaluate(converter, inventories, config);
    }

    let mut fractions: Vec<f64> = converters
        .iter()
        .map(|c| if c.enabled { 1.0 } else { 0.0 })
        .collect();

    let map = build_pools(inventories, converters, config);
    let mut failures = Vec::new();
    let mut failed: Vec<bool> = map.classes.iter().map(Pool::is_corrupt).collect();
    for class in map.classes.iter().filter(|c| c.is_corrupt()) {
        let reason = format!("stored amount {} of capacity {}", class.amount, class.capacity);
        failures.push(fail_class(class, reason));
    }

    let network = attach(converters, inventories, &map, &failed, &mut fractions);
    let mut passes = grant(&network, &map, &mut fractions, config);

    for _ in 0..config.max_rationing_passes {
        passes += 1;
        let mut changed = false;

        for (index, (class, ports)) in map.classes.iter().zip(&network.classes).enumerate() {
            if failed[index] {
                continue;
            }

            let supply = network.flow(&ports.producers, &fractions);
            let demand = network.flow(&ports.consumers, &fractions);
            if supply.is_nan() || demand.is_nan() {
                let reason = format!("supply {} against demand {}", supply, demand);
                failures.push(fail_class(class, reason));
                for (converter, fraction) in fractions.iter_mut().enumerate() {
                    if network.touches(ports, converter) {
                        *fraction = 0.0;
                    }
                }
                failed[index] = true;
                changed = true;
                continue;
            }

            let tiers = &ports.consumer_tiers;
            changed |= ration(tiers, &network, &mut fractions, supply, !class.empty, config);

            let dumped = network.dumped(ports, &fractions);
            let sink = network.flow(&ports.consumers, &fractions) - dumped;
            let tiers = &ports.producer_tiers;
            changed |= ration(tiers, &network, &mut fractions, sink, !class.full, config);
        }

        tracing::trace!("Rationing pass {} changed: {}", passes, changed);
        if !changed {
            break;
        }
    }

    let mut inventory_rates = vec![0.0; inventories.len()];
    for (index, (class, ports)) in map.classes.iter().zip(&network.classes).enumerate() {
        if failed[index] {
            continue;
        }
        let inflow = network.flow(&ports.producers, &fractions);
        let outflow = network.flow(&ports.consumers, &fractions);
        let mut net = inflow - outflow;

        if net.abs() <= config.tolerance(inflow.max(outflow)) {
            net = 0.0;
        }
        if (net > 0.0 && class.full) || (net < 0.0 && class.empty) {
            net = 0.0;
        }
        distribute(class, net, inventories, &mut inventory_rates);
    }

    for (converter, &fraction) in converters.iter_mut().zip(&fractions) {
        converter.rate = fraction;
    }
    for (inventory, &rate) in inventories.iter_mut().zip(&inventory_rates) {
        inventory.rate = rate;
    }

    tracing::debug!(
        "Resolved {} converters over {} pools ({} reach classes) in {} passes ({} failures)",
        converters.len(),
        map.pools.len(),
        map.classes.len(),
        passes,
        failures.len()
    );

    RateSolution {
        converter_rates: fractions,
        inventory_rates,
        failures,
        passes,
    }
}
