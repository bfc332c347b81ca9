//! Property tests for the rate solver and the simulator harness
//!
//! Vessels are generated across several parts with part-scoped flow modes,
//! crossfeed between parts and two-resource converters, so reach classes
//! that only partly overlap get exercised.

use background_resources::core::config::SolverConfig;
use background_resources::core::types::{FlowMode, PartId, ResourceName};
use background_resources::processor::{ResourceProcessor, Simulator};
use background_resources::resource::converter::{Converter, ConverterResources, ResourceRatio};
use background_resources::resource::inventory::Inventory;
use background_resources::resource::linking::CrossfeedTable;
use background_resources::solver::resolve;
use proptest::prelude::*;

const RESOURCES: [&str; 3] = ["ElectricCharge", "Water", "Ore"];
const PARTS: u32 = 3;
const FLOW_MODES: [FlowMode; 3] = [
    FlowMode::AllVessel,
    FlowMode::NoFlow,
    FlowMode::StackPrioritySearch,
];

#[derive(Debug, Clone)]
struct TankParams {
    resource: usize,
    part: u32,
    fill: f64,
    capacity: f64,
}

#[derive(Debug, Clone)]
struct PortParams {
    resource: usize,
    ratio: f64,
    flow_mode: usize,
}

#[derive(Debug, Clone)]
struct ConverterParams {
    priority: i32,
    part: u32,
    input: Option<PortParams>,
    output: Option<PortParams>,
    dump_excess: bool,
}

fn tank_strategy() -> impl Strategy<Value = TankParams> {
    (0..RESOURCES.len(), 0..PARTS, 0.0..=1.0f64, 1.0..500.0f64).prop_map(
        |(resource, part, fill, capacity)| TankParams {
            resource,
            part,
            fill,
            capacity,
        },
    )
}

fn port_strategy() -> impl Strategy<Value = PortParams> {
    (0..RESOURCES.len(), 0.1..5.0f64, 0..FLOW_MODES.len()).prop_map(
        |(resource, ratio, flow_mode)| PortParams {
            resource,
            ratio,
            flow_mode,
        },
    )
}

fn converter_strategy() -> impl Strategy<Value = ConverterParams> {
    (
        -2..3i32,
        0..PARTS,
        prop::option::of(port_strategy()),
        prop::option::of(port_strategy()),
        any::<bool>(),
    )
        .prop_map(|(priority, part, mut input, mut output, dump_excess)| {
            // Inputs always use a lower resource index than outputs, which keeps
            // conversion chains acyclic
            if let (Some(i), Some(o)) = (&mut input, &mut output) {
                if i.resource > o.resource {
                    std::mem::swap(&mut i.resource, &mut o.resource);
                }
            }
            if let (Some(i), Some(o)) = (&input, &output) {
                if i.resource == o.resource {
                    input = None;
                }
            }
            ConverterParams {
                priority,
                part,
                input,
                output,
                dump_excess,
            }
        })
}

fn crossfeed_strategy() -> impl Strategy<Value = Vec<(u32, u32)>> {
    prop::collection::vec((0..PARTS, 0..PARTS), 0..4)
}

fn ratio(port: &PortParams) -> ResourceRatio {
    ResourceRatio::new(RESOURCES[port.resource], port.ratio)
        .with_flow_mode(FLOW_MODES[port.flow_mode])
}

/// Vessel of tanks and converters spread over a few parts
///
/// With `dumping` off every output is stored or held back, so stored
/// amounts account for every unit converted.
fn build(
    tanks: &[TankParams],
    converters: &[ConverterParams],
    crossfeed: &[(u32, u32)],
    dumping: bool,
) -> ResourceProcessor {
    let mut processor = ResourceProcessor::new(SolverConfig::default().with_iteration_limit(50));
    for tank in tanks {
        let amount = tank.fill * tank.capacity;
        let inventory = Inventory::new(RESOURCES[tank.resource], amount, tank.capacity)
            .unwrap()
            .with_part(PartId(tank.part));
        processor.add_inventory(inventory).unwrap();
    }
    for params in converters {
        let mut resources = ConverterResources::new();
        if let Some(input) = &params.input {
            resources = resources.with_input(ratio(input));
        }
        if let Some(output) = &params.output {
            let output = if dumping && params.dump_excess {
                ratio(output).dumping()
            } else {
                ratio(output)
            };
            resources = resources.with_output(output);
        }
        let converter = Converter::with_resources(params.priority, resources)
            .unwrap()
            .on_part(PartId(params.part));
        processor.add_converter(converter).unwrap();
    }

    let mut table = CrossfeedTable::new();
    for &(from, to) in crossfeed {
        table.connect(PartId(from), [PartId(to)]);
    }
    processor.set_crossfeed(table);
    processor
}

type VesselParams = (Vec<TankParams>, Vec<ConverterParams>, Vec<(u32, u32)>);

fn vessel_strategy() -> impl Strategy<Value = VesselParams> {
    (
        prop::collection::vec(tank_strategy(), 1..8),
        prop::collection::vec(converter_strategy(), 0..8),
        crossfeed_strategy(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_amounts_stay_within_capacity(
        (tanks, converters, crossfeed) in vessel_strategy(),
    ) {
        let processor = build(&tanks, &converters, &crossfeed, true);
        let mut simulator = Simulator::new(&processor);
        while simulator.step().unwrap() {
            for inventory in simulator.processor().inventories() {
                prop_assert!(inventory.amount >= 0.0);
                prop_assert!(inventory.amount <= inventory.max_amount);
            }
        }
    }

    #[test]
    fn prop_time_is_monotonic_and_steps_bounded(
        (tanks, converters, crossfeed) in vessel_strategy(),
    ) {
        let processor = build(&tanks, &converters, &crossfeed, true);
        let mut simulator = Simulator::new(&processor);

        let mut last = simulator.current_time();
        let mut count = 0;
        for time in simulator.steps() {
            let time = time.unwrap();
            prop_assert!(time >= last);
            last = time;
            count += 1;
        }
        prop_assert!(count <= processor.config().iteration_limit);
    }

    #[test]
    fn prop_flow_stays_within_linked_inventories(
        (tanks, converters, crossfeed) in vessel_strategy(),
    ) {
        let mut processor = build(&tanks, &converters, &crossfeed, true);
        processor.refresh(0.0).unwrap();

        for (index, inventory) in processor.inventories().iter().enumerate() {
            let resource = &inventory.resource;
            if inventory.rate < 0.0 {
                let drawn = processor.converters().iter().any(|c| {
                    c.rate > 0.0 && c.inputs.contains_key(resource) && c.pull.contains(index)
                });
                prop_assert!(drawn, "inventory {} drains with no linked consumer", index);
            }
            if inventory.rate > 0.0 {
                let fed = processor.converters().iter().any(|c| {
                    c.rate > 0.0 && c.outputs.contains_key(resource) && c.push.contains(index)
                });
                prop_assert!(fed, "inventory {} fills with no linked producer", index);
            }
        }
    }

    #[test]
    fn prop_flow_is_conserved(
        (tanks, converters, crossfeed) in vessel_strategy(),
    ) {
        let mut processor = build(&tanks, &converters, &crossfeed, false);
        let cp = processor.refresh(0.0).unwrap();

        for resource in RESOURCES {
            let name: ResourceName = resource.into();
            let stored: f64 = processor
                .inventories()
                .iter()
                .filter(|inv| inv.resource == name)
                .map(|inv| inv.rate)
                .sum();
            let converted: f64 = processor
                .converters()
                .iter()
                .map(|c| c.output_rate(&name) - c.input_rate(&name))
                .sum();
            prop_assert!(
                (stored - converted).abs() < 1e-6,
                "{}: inventories {} vs converters {}", resource, stored, converted
            );
        }

        // Stored amounts move by exactly what the converters moved over the segment
        let elapsed = if cp.time.is_finite() { cp.time } else { 10.0 };
        prop_assume!(elapsed > 0.0);
        let before: Vec<f64> = processor.inventories().iter().map(|inv| inv.amount).collect();
        let flows: Vec<(ResourceName, f64)> = RESOURCES
            .iter()
            .map(|&resource| {
                let name: ResourceName = resource.into();
                let converted: f64 = processor
                    .converters()
                    .iter()
                    .map(|c| c.output_rate(&name) - c.input_rate(&name))
                    .sum();
                (name, converted)
            })
            .collect();
        processor.update_state(elapsed).unwrap();

        for (name, converted) in flows {
            let (moved, scale) = processor
                .inventories()
                .iter()
                .zip(&before)
                .filter(|(inv, _)| inv.resource == name)
                .fold((0.0, 1.0), |(moved, scale), (inv, start)| {
                    (moved + inv.amount - start, scale + inv.max_amount)
                });
            let expected = converted * elapsed;
            prop_assert!(
                (moved - expected).abs() <= 1e-6 * scale.max(expected.abs()),
                "{}: stored {} vs converted {}", name, moved, expected
            );
        }
    }

    #[test]
    fn prop_resolve_is_idempotent(
        (tanks, converters, crossfeed) in vessel_strategy(),
    ) {
        let mut processor = build(&tanks, &converters, &crossfeed, true);
        processor.refresh(0.0).unwrap();
        let config = processor.config().clone();
        let mut converters = processor.converters().to_vec();
        let mut inventories = processor.inventories().to_vec();

        let first = resolve(&mut converters, &mut inventories, &config);
        let second = resolve(&mut converters, &mut inventories, &config);
        prop_assert_eq!(first.converter_rates, second.converter_rates);
        prop_assert_eq!(first.inventory_rates, second.inventory_rates);
    }

    #[test]
    fn prop_higher_priority_served_first(
        amount in 0.0..100.0f64,
        supply in 0.0..10.0f64,
        consumers in prop::collection::vec((-2..3i32, 0.1..5.0f64), 1..6),
    ) {
        let mut processor = ResourceProcessor::default();
        processor.add_inventory(Inventory::new("Water", amount, 100.0).unwrap()).unwrap();
        if supply > 0.0 {
            let resources =
                ConverterResources::new().with_output(ResourceRatio::new("Water", supply));
            processor.add_converter(Converter::with_resources(10, resources).unwrap()).unwrap();
        }
        for (priority, ratio) in &consumers {
            let resources =
                ConverterResources::new().with_input(ResourceRatio::new("Water", *ratio));
            processor
                .add_converter(Converter::with_resources(*priority, resources).unwrap())
                .unwrap();
        }
        processor.refresh(0.0).unwrap();

        let consumers: Vec<&Converter> = processor
            .converters()
            .iter()
            .filter(|c| !c.inputs.is_empty())
            .collect();
        for low in &consumers {
            if low.rate <= 0.0 {
                continue;
            }
            for high in consumers.iter().filter(|c| c.priority > low.priority) {
                prop_assert_eq!(high.rate, 1.0);
            }
        }
    }
}
