//! Append-only log of executed stages.

use crate::types::approx_eq;
use serde::{Deserialize, Serialize};

/// Mass flows of one executed stage (kg/hr)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    #[serde(rename = "Step")]
    pub name: String,
    #[serde(rename = "Mass Input")]
    pub mass_input: f64,
    #[serde(rename = "Mass Output")]
    pub mass_output: f64,
    #[serde(rename = "Waste Output")]
    pub waste_output: f64,
}

impl StepRecord {
    /// `mass_input - (mass_output + waste_output)`
    pub fn residual(&self) -> f64 {
        self.mass_input - (self.mass_output + self.waste_output)
    }

    /// Whether the stage conserves mass within `tolerance` (relative)
    pub fn is_balanced(&self, tolerance: f64) -> bool {
        approx_eq(self.mass_input, self.mass_output + self.waste_output, tolerance)
    }
}

/// Ordered step records; entries cannot be changed once appended
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepLog {
    entries: Vec<StepRecord>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one step
    pub fn record(
        &mut self,
        step_name: &str,
        mass_input: f64,
        mass_output: f64,
        waste_output: f64,
    ) -> &StepRecord {
        tracing::info!(
            "Step: {} | in {:.2} kg/hr | out {:.2} kg/hr | waste {:.2} kg/hr",
            step_name,
            mass_input,
            mass_output,
            waste_output
        );
        self.entries.push(StepRecord {
            name: step_name.to_string(),
            mass_input,
            mass_output,
            waste_output,
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[StepRecord] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_appends_in_order() {
        let mut log = StepLog::new();
        log.record("Harvesting Biomass", 100.0, 70.0, 30.0);
        log.record("Retting", 19.8, 18.8, 1.0);

        let names: Vec<_> = log.entries().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Harvesting Biomass", "Retting"]);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_step_balance() {
        let mut log = StepLog::new();
        let step = log.record("Harvesting Biomass", 100.0, 70.0, 30.0);
        assert_eq!(step.residual(), 0.0);
        assert!(step.is_balanced(1e-6));

        let step = log.record("Leaky", 100.0, 70.0, 29.0);
        assert!(!step.is_balanced(1e-6));
    }
}
