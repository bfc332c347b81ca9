//! Resource processor - one vessel's inventories, converters and schedule
//!
//! The host drives it with `refresh(time)` whenever the clock reaches the
//! predicted changepoint, and mutates it through the add/remove API between
//! refreshes. Any mutation marks the cached solution dirty; `flush_dirty`
//! re-solves at the end of the host frame.

pub mod simulator;
pub mod transfer;

use std::collections::BTreeMap;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::behaviour::VesselState;
use crate::core::config::SolverConfig;
use crate::core::error::{Result, SolverError};
use crate::core::types::{ConverterIndex, InventoryId, InventoryIndex, ResourceName, SimTime};
use crate::resource::converter::Converter;
use crate::resource::inventory::Inventory;
use crate::resource::linking::{link_converter, CrossfeedTable};
use crate::solver::changepoint::{next_changepoint, Changepoint};
use crate::solver::rates::{resolve, RateSolution};

pub use simulator::{Simulator, Steps};

/// Totals of one resource across a vessel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub resource: ResourceName,
    pub amount: f64,
    pub max_amount: f64,
    /// Net rate (units/s)
    pub rate: f64,
}

#[derive(Debug, Clone)]
pub struct ResourceProcessor {
    inventories: Vec<Inventory>,
    inventory_ids: AHashMap<InventoryId, InventoryIndex>,
    converters: Vec<Converter>,
    crossfeed: CrossfeedTable,
    config: SolverConfig,
    last_update: SimTime,
    next_changepoint: SimTime,
    /// Failures reported by the latest resolve
    rate_failures: Vec<SolverError>,
    dirty: bool,
    disabled: bool,
    stalled_updates: u32,
    last_fault: Option<SolverError>,
    reference_body: Option<String>,
}

impl Default for ResourceProcessor {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl ResourceProcessor {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            inventories: Vec::new(),
            inventory_ids: AHashMap::new(),
            converters: Vec::new(),
            crossfeed: CrossfeedTable::new(),
            config,
            last_update: 0.0,
            next_changepoint: f64::INFINITY,
            rate_failures: Vec::new(),
            dirty: false,
            disabled: false,
            stalled_updates: 0,
            last_fault: None,
            reference_body: None,
        }
    }

    /// Processor whose clock starts at `time`
    pub fn starting_at(config: SolverConfig, time: SimTime) -> Result<Self> {
        let mut processor = Self::new(config);
        processor.last_update = SolverError::check_finite("start time", time)?;
        Ok(processor)
    }

    // === ACCESSORS ===

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn inventories(&self) -> &[Inventory] {
        &self.inventories
    }

    pub fn inventory(&self, index: InventoryIndex) -> Option<&Inventory> {
        self.inventories.get(index)
    }

    pub fn inventory_by_id(&self, id: InventoryId) -> Option<&Inventory> {
        self.index_of(id).and_then(|i| self.inventories.get(i))
    }

    pub fn index_of(&self, id: InventoryId) -> Option<InventoryIndex> {
        self.inventory_ids.get(&id).copied()
    }

    pub fn converters(&self) -> &[Converter] {
        &self.converters
    }

    pub fn converter(&self, index: ConverterIndex) -> Option<&Converter> {
        self.converters.get(index)
    }

    pub fn crossfeed(&self) -> &CrossfeedTable {
        &self.crossfeed
    }

    pub fn last_update(&self) -> SimTime {
        self.last_update
    }

    /// Absolute time at which the current rates go stale
    pub fn next_changepoint(&self) -> SimTime {
        self.next_changepoint
    }

    pub fn rate_failures(&self) -> &[SolverError] {
        &self.rate_failures
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Set after a solver defect; the vessel is frozen until `reset_fault`
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn last_fault(&self) -> Option<&SolverError> {
        self.last_fault.as_ref()
    }

    pub fn reference_body(&self) -> Option<&str> {
        self.reference_body.as_deref()
    }

    /// Whether the host should call `refresh` at `time`
    pub fn needs_update(&self, time: SimTime) -> bool {
        !self.disabled && (self.dirty || time >= self.next_changepoint)
    }

    // === TOPOLOGY ===

    /// Add an inventory, returns its index
    pub fn add_inventory(&mut self, inventory: Inventory) -> Result<InventoryIndex> {
        SolverError::check_non_negative("inventory amount", inventory.amount)?;
        SolverError::check_non_negative("inventory max_amount", inventory.max_amount)?;
        if self.inventory_ids.contains_key(&inventory.id) {
            tracing::warn!("Rejecting duplicate inventory {}", inventory.id);
            return Err(SolverError::DuplicateInventory(inventory.id));
        }

        let index = self.inventories.len();
        self.inventory_ids.insert(inventory.id, index);
        self.inventories.push(inventory);
        self.relink();
        self.mark_dirty();
        Ok(index)
    }

    /// Remove an inventory; later inventories shift down by one
    pub fn remove_inventory(&mut self, index: InventoryIndex) -> Result<Inventory> {
        if index >= self.inventories.len() {
            return Err(SolverError::InventoryNotFound(index));
        }

        let removed = self.inventories.remove(index);
        self.inventory_ids = self
            .inventories
            .iter()
            .enumerate()
            .map(|(i, inv)| (inv.id, i))
            .collect();
        self.relink();
        self.mark_dirty();
        Ok(removed)
    }

    /// Add a converter, returns its index
    pub fn add_converter(&mut self, mut converter: Converter) -> Result<ConverterIndex> {
        converter.resources().validate()?;
        link_converter(&mut converter, &self.inventories, &self.crossfeed);

        let index = self.converters.len();
        self.converters.push(converter);
        self.mark_dirty();
        Ok(index)
    }

    pub fn remove_converter(&mut self, index: ConverterIndex) -> Result<Converter> {
        if index >= self.converters.len() {
            return Err(SolverError::ConverterNotFound(index));
        }
        let removed = self.converters.remove(index);
        self.mark_dirty();
        Ok(removed)
    }

    /// Replace the crossfeed table supplied by the host
    pub fn set_crossfeed(&mut self, crossfeed: CrossfeedTable) {
        self.crossfeed = crossfeed;
        self.relink();
        self.mark_dirty();
    }

    fn relink(&mut self) {
        for converter in &mut self.converters {
            link_converter(converter, &self.inventories, &self.crossfeed);
        }
    }

    // === SOLVER ===

    fn vessel_state(&self, time: SimTime) -> VesselState {
        VesselState {
            current_time: time,
            last_update: self.last_update,
            reference_body: self.reference_body.clone(),
        }
    }

    /// Refresh behaviour resources and resolve rates at `time`
    ///
    /// Inventory amounts are taken as they are; call `update_state` first.
    pub fn compute_rates(&mut self, time: SimTime) -> Result<RateSolution> {
        SolverError::check_not_nan("time", time)?;
        let state = self.vessel_state(time);

        for (index, converter) in self.converters.iter_mut().enumerate() {
            let (resources, duration) = match &converter.behaviour {
                Some(behaviour) => (
                    behaviour.resources(&state),
                    behaviour.next_changepoint(&state),
                ),
                None => continue,
            };

            if let Err(e) = converter.set_resources(resources) {
                tracing::warn!("Converter {} reported invalid resources: {}", index, e);
                // Idle rather than run on stale ratios
                converter.inputs.clear();
                converter.outputs.clear();
                converter.requirements.clear();
            }
            converter.next_changepoint = time + duration;
        }

        self.relink();
        let solution = resolve(&mut self.converters, &mut self.inventories, &self.config);
        for failure in &solution.failures {
            tracing::warn!("Vessel resolve at {}: {}", time, failure);
        }
        self.rate_failures = solution.failures.clone();
        self.dirty = false;
        Ok(solution)
    }

    /// Integrate every inventory from the last update to `time`
    pub fn update_state(&mut self, time: SimTime) -> Result<()> {
        SolverError::check_finite("time", time)?;
        if time < self.last_update {
            return Err(SolverError::TimeReversal {
                requested: time,
                last_update: self.last_update,
            });
        }

        let dt = time - self.last_update;
        if dt > 0.0 {
            for inventory in &mut self.inventories {
                inventory.integrate(dt, &self.config);
            }
        }
        self.last_update = time;
        Ok(())
    }

    /// Predict the next changepoint from the current rates
    ///
    /// A prediction in the past, or too many zero-length steps in a row,
    /// disables the processor and leaves it scheduled at `+∞`.
    pub fn update_next_changepoint(&mut self, time: SimTime) -> Result<Changepoint> {
        if self.disabled {
            return Ok(Changepoint::never());
        }

        let predicted = next_changepoint(time, &self.inventories, &self.converters, &self.config);
        let changepoint = match predicted {
            Ok(cp) => cp,
            Err(e) => {
                self.fault(e.clone());
                return Err(e);
            }
        };

        if changepoint.time <= time {
            self.stalled_updates += 1;
            if self.stalled_updates > self.config.max_stalled_updates {
                let e = SolverError::NoProgress {
                    time,
                    updates: self.stalled_updates,
                };
                self.fault(e.clone());
                return Err(e);
            }
        } else {
            self.stalled_updates = 0;
        }

        self.next_changepoint = changepoint.time;
        Ok(changepoint)
    }

    fn fault(&mut self, error: SolverError) {
        tracing::error!("Disabling background processing: {}", error);
        self.disabled = true;
        self.next_changepoint = f64::INFINITY;
        self.last_fault = Some(error);
    }

    /// Re-enable a processor after a fault
    pub fn reset_fault(&mut self) {
        self.disabled = false;
        self.stalled_updates = 0;
        self.last_fault = None;
        self.mark_dirty();
    }

    /// Integrate to `time`, re-solve and reschedule
    pub fn refresh(&mut self, time: SimTime) -> Result<Changepoint> {
        if self.disabled {
            return Ok(Changepoint::never());
        }
        self.update_state(time)?;
        self.compute_rates(time)?;
        self.update_next_changepoint(time)
    }

    // === HOST EVENTS ===

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Re-solve if anything changed this frame
    pub fn flush_dirty(&mut self, time: SimTime) -> Result<Option<Changepoint>> {
        if !self.dirty || self.disabled {
            return Ok(None);
        }
        self.refresh(time).map(Some)
    }

    /// Record the reference body without re-solving
    pub fn set_reference_body(&mut self, body: Option<String>) {
        self.reference_body = body;
        self.mark_dirty();
    }

    pub fn on_reference_body_changed(
        &mut self,
        body: Option<String>,
        time: SimTime,
    ) -> Result<Changepoint> {
        tracing::debug!("Reference body changed to {:?}", body);
        self.reference_body = body;
        self.refresh(time)
    }

    /// The host stopped ticking this vessel; solve from its final state
    pub fn on_vessel_unloaded(&mut self, time: SimTime) -> Result<Changepoint> {
        self.last_update = SolverError::check_finite("time", time)?;
        tracing::info!(
            "Vessel unloaded at {} with {} inventories and {} converters",
            time,
            self.inventories.len(),
            self.converters.len()
        );
        self.refresh(time)
    }

    /// Drop all state; the vessel is back under host control
    pub fn clear(&mut self) {
        let config = self.config.clone();
        *self = Self::new(config);
    }

    pub(crate) fn restore_schedule(
        &mut self,
        last_update: SimTime,
        next_changepoint: SimTime,
        disabled: bool,
    ) {
        self.last_update = last_update;
        self.next_changepoint = next_changepoint.max(last_update);
        self.disabled = disabled;
        self.dirty = false;
    }

    /// Per-resource totals, sorted by resource name
    pub fn resource_states(&self) -> Vec<ResourceState> {
        let mut totals: BTreeMap<&ResourceName, ResourceState> = BTreeMap::new();
        for inventory in &self.inventories {
            let state = totals
                .entry(&inventory.resource)
                .or_insert_with(|| ResourceState {
                    resource: inventory.resource.clone(),
                    amount: 0.0,
                    max_amount: 0.0,
                    rate: 0.0,
                });
            state.amount += inventory.amount;
            state.max_amount += inventory.max_amount;
            state.rate += inventory.rate;
        }
        totals.into_values().collect()
    }
}
