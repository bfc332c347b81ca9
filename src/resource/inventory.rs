//! Inventory - a single-resource container with bounded capacity

use serde::{Deserialize, Serialize};

use crate::core::config::SolverConfig;
use crate::core::error::{Result, SolverError};
use crate::core::types::{InventoryId, ModuleId, PartId, ResourceName};

/// A container holding one resource on a vessel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    /// Stable id, survives index churn and persistence
    pub id: InventoryId,
    pub resource: ResourceName,
    pub amount: f64,
    /// May be `f64::INFINITY`
    pub max_amount: f64,
    /// Net rate (units/s) written by the last rate resolution
    pub rate: f64,
    /// Part this inventory sits on, if the host tracks parts
    pub part: Option<PartId>,
    /// Set for storage private to a part module
    pub module: Option<ModuleId>,
}

impl Inventory {
    /// Create an inventory, rejecting NaN and out-of-range amounts
    pub fn new(resource: impl Into<ResourceName>, amount: f64, max_amount: f64) -> Result<Self> {
        let max_amount = SolverError::check_non_negative("max_amount", max_amount)?;
        let amount = SolverError::check_non_negative("amount", amount)?;
        if amount > max_amount {
            return Err(SolverError::InvalidConfig(format!(
                "amount {} exceeds max_amount {}",
                amount, max_amount
            )));
        }

        Ok(Self {
            id: InventoryId::new(),
            resource: resource.into(),
            amount,
            max_amount,
            rate: 0.0,
            part: None,
            module: None,
        })
    }

    pub fn with_id(mut self, id: InventoryId) -> Self {
        self.id = id;
        self
    }

    pub fn with_part(mut self, part: PartId) -> Self {
        self.part = Some(part);
        self
    }

    pub fn with_module(mut self, module: ModuleId) -> Self {
        self.module = Some(module);
        self
    }

    pub fn is_module_inventory(&self) -> bool {
        self.module.is_some()
    }

    /// Remaining capacity; infinite for unbounded inventories
    pub fn free_space(&self) -> f64 {
        if self.max_amount.is_infinite() {
            f64::INFINITY
        } else {
            (self.max_amount - self.amount).max(0.0)
        }
    }

    pub fn is_empty(&self, config: &SolverConfig) -> bool {
        self.amount <= config.tolerance(self.max_amount)
    }

    pub fn is_full(&self, config: &SolverConfig) -> bool {
        self.max_amount.is_finite()
            && self.amount >= self.max_amount - config.tolerance(self.max_amount)
    }

    /// Deposit up to `amount`, returns amount actually added
    pub fn deposit(&mut self, amount: f64) -> f64 {
        let added = amount.min(self.free_space()).max(0.0);
        if added.is_infinite() {
            self.amount = f64::INFINITY;
        } else {
            self.amount = (self.amount + added).min(self.max_amount);
        }
        added
    }

    /// Withdraw up to `amount`, returns amount actually removed
    pub fn withdraw(&mut self, amount: f64) -> f64 {
        if self.amount.is_infinite() {
            // An infinite source stays infinite
            return amount.max(0.0);
        }
        let removed = amount.min(self.amount).max(0.0);
        self.amount = (self.amount - removed).max(0.0);
        removed
    }

    /// Advance the stored amount by `rate × dt` and clamp to capacity
    ///
    /// Amounts within tolerance of a boundary the rate is heading toward are
    /// snapped onto it, so a changepoint computed for "empty" lands on 0.
    pub fn integrate(&mut self, dt: f64, config: &SolverConfig) {
        if self.rate == 0.0 || dt <= 0.0 || self.amount.is_infinite() {
            return;
        }

        let mut amount = self.amount + self.rate * dt;
        let tol = config.tolerance(self.max_amount);
        if self.rate < 0.0 && amount <= tol {
            amount = 0.0;
        }
        if self.rate > 0.0 && self.max_amount.is_finite() && amount >= self.max_amount - tol {
            amount = self.max_amount;
        }
        self.amount = amount.clamp(0.0, self.max_amount);
    }

    /// Time (from now) at which the current rate empties or fills this inventory
    pub fn time_to_boundary(&self) -> f64 {
        if self.rate < 0.0 {
            self.amount / -self.rate
        } else if self.rate > 0.0 {
            self.free_space() / self.rate
        } else {
            f64::INFINITY
        }
    }

    /// Fraction of capacity in use, 0 for unbounded inventories
    pub fn fill_fraction(&self) -> f64 {
        if self.max_amount.is_finite() && self.max_amount > 0.0 {
            self.amount / self.max_amount
        } else {
            0.0
        }
    }
}
