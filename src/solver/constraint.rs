//! Constraint evaluator - decides whether a converter's requirements hold
//!
//! Pure functions of current inventory state. The same aggregation feeds the
//! changepoint predictor, which needs the threshold crossing times.

use crate::core::config::SolverConfig;
use crate::core::types::Comparison;
use crate::resource::converter::{Converter, ResourceConstraint};
use crate::resource::inventory::Inventory;

/// Aggregated amount and net rate of the inventories a requirement watches
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate {
    pub amount: f64,
    pub rate: f64,
}

/// Sum the requirement's resource over the inventories its flow mode selects
///
/// Vessel-wide modes pool every inventory of the resource; other modes only
/// look at the converter's own constraint set.
pub fn aggregate(
    requirement: &ResourceConstraint,
    converter: &Converter,
    inventories: &[Inventory],
) -> Aggregate {
    let mut total = Aggregate {
        amount: 0.0,
        rate: 0.0,
    };

    let mut add = |inventory: &Inventory| {
        total.amount += inventory.amount;
        total.rate += inventory.rate;
    };

    if requirement.flow_mode.is_vessel_wide() {
        inventories
            .iter()
            .filter(|inv| inv.resource == requirement.resource)
            .for_each(&mut add);
    } else {
        converter
            .constraint
            .iter()
            .filter_map(|index| inventories.get(index))
            .filter(|inv| inv.resource == requirement.resource)
            .for_each(&mut add);
    }

    total
}

/// Whether `amount` satisfies the requirement, within tolerance
pub fn holds(requirement: &ResourceConstraint, amount: f64, config: &SolverConfig) -> bool {
    let tol = config.tolerance(requirement.amount);
    match requirement.comparison {
        Comparison::AtLeast => amount >= requirement.amount - tol,
        Comparison::AtMost => amount <= requirement.amount + tol,
    }
}

/// A converter is enabled iff every requirement holds
pub fn evaluate(converter: &Converter, inventories: &[Inventory], config: &SolverConfig) -> bool {
    converter.requirements.iter().all(|req| {
        let total = aggregate(req, converter, inventories);
        holds(req, total.amount, config)
    })
}

/// Duration until the requirement flips given the aggregate's trend
///
/// Crossings that leave the satisfied region aim past the tolerance band,
/// so the evaluator sees the new state once time reaches the changepoint.
pub fn crossing_time(
    requirement: &ResourceConstraint,
    total: Aggregate,
    config: &SolverConfig,
) -> f64 {
    if !total.amount.is_finite() || total.rate == 0.0 {
        return f64::INFINITY;
    }

    let tol = config.tolerance(requirement.amount);
    let satisfied = holds(requirement, total.amount, config);
    let threshold = requirement.amount;

    let target = match (requirement.comparison, satisfied) {
        (Comparison::AtLeast, true) if total.rate < 0.0 => threshold - 2.0 * tol,
        (Comparison::AtLeast, false) if total.rate > 0.0 => threshold,
        (Comparison::AtMost, true) if total.rate > 0.0 => threshold + 2.0 * tol,
        (Comparison::AtMost, false) if total.rate < 0.0 => threshold,
        _ => return f64::INFINITY,
    };

    let dt = (target - total.amount) / total.rate;
    dt.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{FlowMode, PartId};
    use crate::resource::converter::ConverterResources;
    use crate::resource::linking::{link_converter, CrossfeedTable};

    fn tanks() -> Vec<Inventory> {
        vec![
            Inventory::new("Water", 8.0, 100.0).unwrap().with_part(PartId(1)),
            Inventory::new("Water", 5.0, 100.0).unwrap().with_part(PartId(2)),
        ]
    }

    fn converter_with(req: ResourceConstraint, inventories: &[Inventory]) -> Converter {
        let resources = ConverterResources::new().with_requirement(req);
        let mut converter = Converter::with_resources(0, resources)
            .unwrap()
            .on_part(PartId(1));
        link_converter(&mut converter, inventories, &CrossfeedTable::new());
        converter
    }

    #[test]
    fn test_vessel_wide_pools_all_inventories() {
        let config = SolverConfig::default();
        let inventories = tanks();
        let converter = converter_with(ResourceConstraint::at_least("Water", 10.0), &inventories);

        assert_eq!(aggregate(&converter.requirements[0], &converter, &inventories).amount, 13.0);
        assert!(evaluate(&converter, &inventories, &config));
    }

    #[test]
    fn test_part_scope_uses_constraint_set() {
        let config = SolverConfig::default();
        let inventories = tanks();
        let req = ResourceConstraint::at_least("Water", 10.0).with_flow_mode(FlowMode::NoFlow);
        let converter = converter_with(req, &inventories);

        assert_eq!(aggregate(&converter.requirements[0], &converter, &inventories).amount, 8.0);
        assert!(!evaluate(&converter, &inventories, &config));
    }

    #[test]
    fn test_all_requirements_must_hold() {
        let config = SolverConfig::default();
        let inventories = tanks();
        let resources = ConverterResources::new()
            .with_requirement(ResourceConstraint::at_least("Water", 1.0))
            .with_requirement(ResourceConstraint::at_most("Water", 12.0));
        let mut converter = Converter::with_resources(0, resources).unwrap();
        link_converter(&mut converter, &inventories, &CrossfeedTable::new());

        assert!(!evaluate(&converter, &inventories, &config));
    }

    #[test]
    fn test_no_requirements_means_enabled() {
        let config = SolverConfig::default();
        let converter = Converter::new(0);
        assert!(evaluate(&converter, &tanks(), &config));
    }

    #[test]
    fn test_crossing_time_entering() {
        let config = SolverConfig::default();
        let req = ResourceConstraint::at_least("Water", 10.0);
        let total = Aggregate {
            amount: 8.0,
            rate: 1.0,
        };
        assert_eq!(crossing_time(&req, total, &config), 2.0);

        let falling = Aggregate {
            amount: 8.0,
            rate: -1.0,
        };
        assert_eq!(crossing_time(&req, falling, &config), f64::INFINITY);
    }

    #[test]
    fn test_crossing_time_leaving_passes_tolerance() {
        let config = SolverConfig::default();
        let req = ResourceConstraint::at_most("Water", 10.0);
        let total = Aggregate {
            amount: 6.0,
            rate: 2.0,
        };
        let dt = crossing_time(&req, total, &config);
        assert!(dt > 2.0 && dt < 2.0 + 1e-6);
        assert!(!holds(&req, 6.0 + 2.0 * dt, &config));
    }
}
