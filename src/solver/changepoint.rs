//! Changepoint predictor - when the current rate solution goes stale

use ordered_float::OrderedFloat;

use crate::core::config::SolverConfig;
use crate::core::error::{Result, SolverError};
use crate::core::types::{ConverterIndex, InventoryIndex, SimTime};
use crate::resource::converter::Converter;
use crate::resource::inventory::Inventory;
use crate::solver::constraint::{aggregate, crossing_time};

/// What triggers a changepoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangepointSource {
    /// An inventory empties or fills
    Inventory(InventoryIndex),
    /// A behaviour declared a discontinuity
    Behaviour(ConverterIndex),
    /// A requirement of this converter flips
    Requirement(ConverterIndex),
    /// Nothing ever changes
    None,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Changepoint {
    /// Absolute time, `+∞` when nothing changes
    pub time: SimTime,
    pub source: ChangepointSource,
}

impl Changepoint {
    pub fn never() -> Self {
        Self {
            time: f64::INFINITY,
            source: ChangepointSource::None,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.time.is_finite()
    }
}

/// Earliest time after `current_time` at which rates must be recomputed
///
/// Inventories and converters must carry the rates of the latest resolve.
pub fn next_changepoint(
    current_time: SimTime,
    inventories: &[Inventory],
    converters: &[Converter],
    config: &SolverConfig,
) -> Result<Changepoint> {
    let inventory_candidates = inventories
        .iter()
        .enumerate()
        .filter(|(_, inv)| inv.rate != 0.0)
        .map(|(i, inv)| (current_time + inv.time_to_boundary(), ChangepointSource::Inventory(i)));

    let behaviour_candidates = converters
        .iter()
        .enumerate()
        .filter(|(_, c)| c.behaviour.is_some())
        .map(|(i, c)| (c.next_changepoint, ChangepointSource::Behaviour(i)));

    let requirement_candidates = converters.iter().enumerate().flat_map(|(i, converter)| {
        converter.requirements.iter().map(move |req| {
            let total = aggregate(req, converter, inventories);
            (
                current_time + crossing_time(req, total, config),
                ChangepointSource::Requirement(i),
            )
        })
    });

    let candidates = inventory_candidates
        .chain(behaviour_candidates)
        .chain(requirement_candidates);

    let mut earliest = Changepoint::never();
    for (time, source) in candidates {
        if time.is_nan() || time < current_time {
            tracing::error!(
                "Changepoint candidate {:?} at {} precedes current time {}",
                source,
                time,
                current_time
            );
            return Err(SolverError::TemporalRegression {
                current: current_time,
                predicted: time,
            });
        }
        if OrderedFloat(time) < OrderedFloat(earliest.time) {
            earliest = Changepoint { time, source };
        }
    }

    tracing::debug!("Next changepoint at {} ({:?})", earliest.time, earliest.source);
    Ok(earliest)
}
