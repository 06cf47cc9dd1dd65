//! Simulation context: runs a pipeline over a ledger and summarizes it.
//!
//! A run is a pure function of its configuration. Stages execute in order
//! against the ledger; the first fatal error aborts the run and no partial
//! report is produced.

use crate::balance::{BalanceSummary, ImbalanceWarning};
use crate::ledger::LedgerEntry;
use crate::pipeline::Pipeline;
use crate::process::{feed_record, hemp_pipeline, FEED};
use crate::{Config, Error, Ledger, MassRecord, Result, StepLog, StepRecord};
use serde::Serialize;

/// A named record as exposed to reports
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NamedRecord {
    pub name: String,
    #[serde(flatten)]
    pub record: MassRecord,
}

impl From<&LedgerEntry> for NamedRecord {
    fn from(entry: &LedgerEntry) -> Self {
        NamedRecord {
            name: entry.name.clone(),
            record: entry.record.clone(),
        }
    }
}

/// Final, read-only tables of a completed run
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunReport {
    streams: Vec<NamedRecord>,
    losses: Vec<NamedRecord>,
    steps: Vec<StepRecord>,
    products: Vec<String>,
    balance: BalanceSummary,
    warnings: Vec<ImbalanceWarning>,
}

impl RunReport {
    /// Active streams, in creation order
    pub fn streams(&self) -> &[NamedRecord] {
        &self.streams
    }

    /// Loss records, in creation order
    pub fn losses(&self) -> &[NamedRecord] {
        &self.losses
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Names of the terminal product streams
    pub fn products(&self) -> &[String] {
        &self.products
    }

    pub fn balance(&self) -> &BalanceSummary {
        &self.balance
    }

    pub fn warnings(&self) -> &[ImbalanceWarning] {
        &self.warnings
    }

    pub fn stream(&self, name: &str) -> Result<&MassRecord> {
        find(&self.streams, name)
    }

    pub fn loss(&self, name: &str) -> Result<&MassRecord> {
        find(&self.losses, name)
    }
}

fn find<'a>(records: &'a [NamedRecord], name: &str) -> Result<&'a MassRecord> {
    records
        .iter()
        .find(|r| r.name == name)
        .map(|r| &r.record)
        .ok_or_else(|| Error::UnknownStream(name.to_string()))
}

/// Explicit simulation state threaded through stage evaluation
#[derive(Clone, Debug)]
pub struct Simulation {
    ledger: Ledger,
    pipeline: Pipeline,
    steps: StepLog,
    initial_feed: f64,
    added: MassRecord,
    tolerance: f64,
    warnings: Vec<ImbalanceWarning>,
}

impl Simulation {
    /// Set up the hemp fractionation process described by `config`
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let feed = vec![(FEED.to_string(), feed_record(config))];
        Self::with_pipeline(hemp_pipeline(config), feed, config.balance.tolerance)
    }

    /// Set up an arbitrary pipeline over the given feed streams
    ///
    /// Wiring and parameters are validated here, before any stage runs.
    pub fn with_pipeline(
        pipeline: Pipeline,
        feed: Vec<(String, MassRecord)>,
        tolerance: f64,
    ) -> Result<Self> {
        let names: Vec<String> = feed.iter().map(|(name, _)| name.clone()).collect();
        pipeline.validate(&names)?;

        let mut ledger = Ledger::new();
        let mut initial_feed = 0.0;
        for (name, record) in feed {
            if ledger.contains(&name) {
                return Err(Error::Pipeline(format!("feed stream {:?} is seeded twice", name)));
            }
            initial_feed += record.total();
            ledger.put(&name, record)?;
        }

        Ok(Self {
            ledger,
            pipeline,
            steps: StepLog::new(),
            initial_feed,
            added: MassRecord::zero(),
            tolerance,
            warnings: Vec::new(),
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Execute every stage and summarize the run
    pub fn run(mut self) -> Result<RunReport> {
        tracing::info!(
            "Running {} stages on {:.2} kg/hr of feed",
            self.pipeline.stages().len(),
            self.initial_feed
        );

        for stage in self.pipeline.stages() {
            let outcome = stage.apply(&self.ledger).map_err(|e| {
                tracing::error!("Stage {:?} failed: {}", stage.name, e);
                e
            })?;

            self.ledger = outcome.ledger;
            self.added += &outcome.added;
            let step = self.steps.record(
                &outcome.step.name,
                outcome.step.mass_input,
                outcome.step.mass_output,
                outcome.step.waste_output,
            );
            if let Some(warning) = ImbalanceWarning::for_step(step, self.tolerance) {
                tracing::warn!("Imbalance: {}", warning);
                self.warnings.push(warning);
            }
        }

        let products = self.pipeline.terminal_streams();
        let balance =
            BalanceSummary::compute(&self.ledger, self.initial_feed, self.added.total(), &products)?;
        tracing::info!(
            "Mass balance: input {:.4}, output {:.4}, waste {:.4}, residual {:.3e} kg/hr",
            balance.total_input,
            balance.total_output,
            balance.total_waste,
            balance.residual
        );
        if let Some(warning) = ImbalanceWarning::for_summary(&balance, self.tolerance) {
            tracing::warn!("Imbalance: {}", warning);
            self.warnings.push(warning);
        }

        Ok(RunReport {
            streams: self.ledger.streams().iter().map(NamedRecord::from).collect(),
            losses: self.ledger.losses().iter().map(NamedRecord::from).collect(),
            steps: self.steps.entries().to_vec(),
            products,
            balance,
            warnings: self.warnings,
        })
    }
}

/// Validate `config`, run the hemp process and return its report
pub fn run(config: &Config) -> Result<RunReport> {
    Simulation::new(config)?.run()
}
