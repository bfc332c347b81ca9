//! Periodic on/off behaviour
//!
//! Runs its resources for `active_fraction` of every `period`, then idles.
//! Stands in for day/night cycles once a collaborator has reduced orbit
//! geometry to a period and a lit fraction.

use std::sync::Arc;

use crate::behaviour::ratios::parse_resources;
use crate::behaviour::{BehaviourError, ConverterBehaviour, VesselState};
use crate::persistence::node::ConfigNode;
use crate::resource::converter::ConverterResources;

#[derive(Debug, Clone, PartialEq)]
pub struct DutyCycleConverter {
    resources: ConverterResources,
    period: f64,
    active_fraction: f64,
    phase: f64,
}

impl DutyCycleConverter {
    pub fn new(
        resources: ConverterResources,
        period: f64,
        active_fraction: f64,
        phase: f64,
    ) -> Result<Self, BehaviourError> {
        if !(period.is_finite() && period > 0.0) {
            return Err(BehaviourError::Invalid {
                field: "Period".into(),
                reason: format!("must be positive and finite, got {}", period),
            });
        }
        if !(0.0..=1.0).contains(&active_fraction) {
            return Err(BehaviourError::Invalid {
                field: "ActiveFraction".into(),
                reason: format!("must be within [0, 1], got {}", active_fraction),
            });
        }
        if !phase.is_finite() {
            return Err(BehaviourError::Invalid {
                field: "Phase".into(),
                reason: format!("must be finite, got {}", phase),
            });
        }

        Ok(Self {
            resources,
            period,
            active_fraction,
            phase,
        })
    }

    pub fn from_config(node: &ConfigNode) -> Result<Self, BehaviourError> {
        let period: f64 = node.require_value("Period")?;
        let active_fraction: f64 = node.parse_value("ActiveFraction")?.unwrap_or(0.5);
        let phase: f64 = node.parse_value("Phase")?.unwrap_or(0.0);
        Self::new(parse_resources(node)?, period, active_fraction, phase)
    }

    /// Start of cycle `k`
    fn edge(&self, k: f64) -> f64 {
        k * self.period - self.phase
    }

    /// Index of the cycle holding `time`, so that `edge(k) <= time < edge(k + 1)`
    fn cycle(&self, time: f64) -> f64 {
        let mut k = ((time + self.phase) / self.period).floor();
        if self.edge(k) > time {
            k -= 1.0;
        } else if self.edge(k + 1.0) <= time {
            k += 1.0;
        }
        k
    }

    fn active_span(&self) -> f64 {
        self.active_fraction * self.period
    }

    pub fn is_active(&self, time: f64) -> bool {
        time < self.edge(self.cycle(time)) + self.active_span()
    }
}

impl ConverterBehaviour for DutyCycleConverter {
    fn resources(&self, state: &VesselState) -> ConverterResources {
        if self.is_active(state.current_time) {
            self.resources.clone()
        } else {
            ConverterResources::default()
        }
    }

    fn next_changepoint(&self, state: &VesselState) -> f64 {
        if self.active_fraction <= 0.0 || self.active_fraction >= 1.0 {
            return f64::INFINITY;
        }
        let time = state.current_time;
        let k = self.cycle(time);
        let span = self.active_span();

        // Edges are taken from absolute cycle starts so long runs do not drift
        [
            self.edge(k) + span,
            self.edge(k + 1.0),
            self.edge(k + 1.0) + span,
            self.edge(k + 2.0),
        ]
        .into_iter()
        .find(|&edge| edge > time)
        .map_or(f64::INFINITY, |edge| edge - time)
    }
}

pub fn duty_cycle_converter(
    node: &ConfigNode,
) -> Result<Arc<dyn ConverterBehaviour>, BehaviourError> {
    Ok(Arc::new(DutyCycleConverter::from_config(node)?))
}
