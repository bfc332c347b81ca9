//! Vessel-wide deposit and withdrawal
//!
//! A delta is spread over every non-module inventory of the resource so that
//! the tanks fill or drain together. Module storage is never touched.

use crate::core::error::{Result, SolverError};
use crate::core::types::{InventoryIndex, ResourceName};
use crate::processor::ResourceProcessor;
use crate::resource::inventory::Inventory;

fn shared_inventories(inventories: &[Inventory], resource: &ResourceName) -> Vec<InventoryIndex> {
    inventories
        .iter()
        .enumerate()
        .filter(|(_, inv)| &inv.resource == resource && !inv.is_module_inventory())
        .map(|(i, _)| i)
        .collect()
}

/// Amount each target receives when `amount` is spread by `weight`
///
/// Members with infinite weight take everything between them.
fn shares(weights: &[f64], amount: f64) -> Vec<f64> {
    let unbounded = weights.iter().filter(|w| w.is_infinite()).count();
    if unbounded > 0 {
        let share = amount / unbounded as f64;
        return weights
            .iter()
            .map(|w| if w.is_infinite() { share } else { 0.0 })
            .collect();
    }

    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return vec![0.0; weights.len()];
    }
    let moved = amount.min(total);
    weights.iter().map(|w| moved * w / total).collect()
}

impl ResourceProcessor {
    /// Deposit `amount` of `resource` across the vessel
    ///
    /// Returns the amount actually stored. `+∞` fills every tank and reports
    /// the free capacity it used.
    pub fn add_resource(&mut self, resource: &ResourceName, amount: f64) -> Result<f64> {
        SolverError::check_non_negative("deposit", amount)?;
        let targets = shared_inventories(&self.inventories, resource);

        let added = if amount.is_infinite() {
            let mut added = 0.0;
            for &i in &targets {
                let moved = self.inventories[i].deposit(f64::INFINITY);
                if moved.is_finite() {
                    added += moved;
                }
            }
            added
        } else {
            let weights: Vec<f64> = targets
                .iter()
                .map(|&i| self.inventories[i].free_space())
                .collect();
            let mut added = 0.0;
            for (&i, share) in targets.iter().zip(shares(&weights, amount)) {
                added += self.inventories[i].deposit(share);
            }
            added
        };

        tracing::debug!("Deposited {} of {} requested {}", added, amount, resource);
        self.mark_dirty();
        Ok(added)
    }

    /// Withdraw `amount` of `resource` across the vessel
    ///
    /// Returns the amount actually removed. `+∞` drains every finite tank;
    /// infinite sources give without limit and are left out of the total.
    pub fn remove_resource(&mut self, resource: &ResourceName, amount: f64) -> Result<f64> {
        SolverError::check_non_negative("withdrawal", amount)?;
        let targets = shared_inventories(&self.inventories, resource);

        let removed = if amount.is_infinite() {
            let mut removed = 0.0;
            for &i in &targets {
                if self.inventories[i].amount.is_finite() {
                    removed += self.inventories[i].withdraw(f64::INFINITY);
                }
            }
            removed
        } else {
            let weights: Vec<f64> = targets.iter().map(|&i| self.inventories[i].amount).collect();
            let mut removed = 0.0;
            for (&i, share) in targets.iter().zip(shares(&weights, amount)) {
                removed += self.inventories[i].withdraw(share);
            }
            removed
        };

        tracing::debug!("Withdrew {} of {} requested {}", removed, amount, resource);
        self.mark_dirty();
        Ok(removed)
    }
}
