//! Benchmarks for the rate solver and changepoint predictor

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use background_resources::core::config::SolverConfig;
use background_resources::core::types::PartId;
use background_resources::processor::{ResourceProcessor, Simulator};
use background_resources::resource::converter::{Converter, ConverterResources, ResourceRatio};
use background_resources::resource::inventory::Inventory;
use background_resources::solver::{next_changepoint, resolve};

/// A vessel with `parts` parts, each holding a tank, a battery and a fuel cell
fn vessel(parts: u32) -> ResourceProcessor {
    let mut processor = ResourceProcessor::new(SolverConfig::default());
    for part in 0..parts {
        let fuel = Inventory::new("LiquidFuel", 400.0, 400.0).unwrap().with_part(PartId(part));
        let charge = Inventory::new("ElectricCharge", 50.0, 200.0).unwrap().with_part(PartId(part));
        processor.add_inventory(fuel).unwrap();
        processor.add_inventory(charge).unwrap();

        let cell = ConverterResources::new()
            .with_input(ResourceRatio::new("LiquidFuel", 0.02))
            .with_output(ResourceRatio::new("ElectricCharge", 1.5).dumping());
        let avionics =
            ConverterResources::new().with_input(ResourceRatio::new("ElectricCharge", 0.5));
        let priority = (part % 3) as i32;
        processor
            .add_converter(Converter::with_resources(priority, cell).unwrap().on_part(PartId(part)))
            .unwrap();
        processor
            .add_converter(
                Converter::with_resources(priority, avionics)
                    .unwrap()
                    .on_part(PartId(part)),
            )
            .unwrap();
    }
    processor
}

fn bench_resolve(c: &mut Criterion) {
    let config = SolverConfig::default();
    let mut group = c.benchmark_group("resolve");
    for parts in [4u32, 32, 128] {
        let processor = vessel(parts);
        group.bench_with_input(BenchmarkId::from_parameter(parts), &processor, |b, p| {
            b.iter(|| {
                let mut converters = p.converters().to_vec();
                let mut inventories = p.inventories().to_vec();
                black_box(resolve(&mut converters, &mut inventories, &config))
            })
        });
    }
    group.finish();
}

fn bench_resolve_and_predict(c: &mut Criterion) {
    let config = SolverConfig::default();
    let processor = vessel(32);

    c.bench_function("resolve_and_predict_32", |b| {
        b.iter(|| {
            let mut converters = processor.converters().to_vec();
            let mut inventories = processor.inventories().to_vec();
            resolve(&mut converters, &mut inventories, &config);
            black_box(next_changepoint(0.0, &inventories, &converters, &config))
        })
    });
}

fn bench_simulate_to_horizon(c: &mut Criterion) {
    let processor = vessel(16);

    c.bench_function("simulate_to_horizon_16", |b| {
        b.iter(|| {
            let mut simulator = Simulator::new(&processor);
            while let Ok(true) = simulator.step() {}
            black_box(simulator.current_time())
        })
    });
}

criterion_group!(
    benches,
    bench_resolve,
    bench_resolve_and_predict,
    bench_simulate_to_horizon
);
criterion_main!(benches);
