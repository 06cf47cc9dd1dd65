//! Global mass balance check.
//!
//! Residuals never abort a run. When a residual exceeds the configured
//! tolerance an [`ImbalanceWarning`] is collected and returned with the
//! report for the caller to act on.

use crate::types::approx_eq;
use crate::{Ledger, Result, StepRecord};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default relative tolerance on mass balance residuals
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Whole-run mass totals (kg/hr)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub total_input: f64,
    pub total_output: f64,
    pub total_waste: f64,
    pub residual: f64,
}

impl BalanceSummary {
    /// Summarize a completed ledger
    ///
    /// `total_input` is the feed plus every externally added mass;
    /// `total_output` covers only the terminal product streams.
    pub fn compute(
        ledger: &Ledger,
        initial_feed: f64,
        added_mass: f64,
        products: &[String],
    ) -> Result<Self> {
        let total_input = initial_feed + added_mass;
        let total_output = products
            .iter()
            .map(|name| ledger.total(name))
            .sum::<Result<f64>>()?;
        let total_waste = ledger.total_waste();

        Ok(Self {
            total_input,
            total_output,
            total_waste,
            residual: total_input - (total_output + total_waste),
        })
    }

    pub fn is_balanced(&self, tolerance: f64) -> bool {
        approx_eq(self.total_input, self.total_output + self.total_waste, tolerance)
    }
}

/// Where an imbalance was detected
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "step", rename_all = "snake_case")]
pub enum BalanceScope {
    Step(String),
    Global,
}

/// Non-fatal report of a residual above tolerance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImbalanceWarning {
    pub scope: BalanceScope,
    pub mass_input: f64,
    pub residual: f64,
}

impl ImbalanceWarning {
    /// Warning for a stage, if its residual exceeds `tolerance`
    pub fn for_step(step: &StepRecord, tolerance: f64) -> Option<Self> {
        if step.is_balanced(tolerance) {
            return None;
        }
        Some(Self {
            scope: BalanceScope::Step(step.name.clone()),
            mass_input: step.mass_input,
            residual: step.residual(),
        })
    }

    /// Warning for the whole run, if its residual exceeds `tolerance`
    pub fn for_summary(summary: &BalanceSummary, tolerance: f64) -> Option<Self> {
        if summary.is_balanced(tolerance) {
            return None;
        }
        Some(Self {
            scope: BalanceScope::Global,
            mass_input: summary.total_input,
            residual: summary.residual,
        })
    }
}

impl fmt::Display for ImbalanceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            BalanceScope::Step(name) => write!(f, "step {:?}", name)?,
            BalanceScope::Global => f.write_str("global balance")?,
        }
        write!(
            f,
            " is off by {:.6} kg/hr (input {:.6} kg/hr)",
            self.residual, self.mass_input
        )
    }
}
