//! Stage pipeline.
//!
//! A pipeline is plain data: an ordered list of stages, each a list of
//! operations wiring rules to ledger keys. Stages execute strictly in
//! order; stage *i* may only read the feed, products of earlier stages and
//! records it wrote itself.

use crate::rules::Rule;
use crate::{Error, Ledger, MassRecord, Result, StepRecord};
use std::collections::HashSet;

/// Destination of a rule's residue
#[derive(Clone, Debug, PartialEq)]
pub enum Target {
    /// An active stream (e.g. the other half of a separation)
    Stream(String),
    /// A loss record leaving the process
    Loss(String),
}

/// One step of a stage
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    /// Apply `rule` to `input`, writing the product to `output`
    Apply {
        input: String,
        output: String,
        rule: Rule,
        residue: Option<Target>,
    },
    /// Move an exhausted stream into the loss table
    Retire { stream: String, loss: String },
}

impl Operation {
    /// Rule with a residue sent to a loss record
    pub fn to_loss(input: &str, output: &str, rule: Rule, loss: &str) -> Self {
        Operation::Apply {
            input: input.into(),
            output: output.into(),
            rule,
            residue: Some(Target::Loss(loss.into())),
        }
    }

    /// Rule with a residue kept as another stream
    pub fn to_stream(input: &str, output: &str, rule: Rule, remainder: &str) -> Self {
        Operation::Apply {
            input: input.into(),
            output: output.into(),
            rule,
            residue: Some(Target::Stream(remainder.into())),
        }
    }

    /// Rule without a residue (compose, additive)
    pub fn apply(input: &str, output: &str, rule: Rule) -> Self {
        Operation::Apply {
            input: input.into(),
            output: output.into(),
            rule,
            residue: None,
        }
    }

    pub fn retire(stream: &str, loss: &str) -> Self {
        Operation::Retire {
            stream: stream.into(),
            loss: loss.into(),
        }
    }
}

/// A named unit operation and its boundary streams
#[derive(Clone, Debug, PartialEq)]
pub struct Stage {
    pub name: String,
    /// Streams whose mass enters this stage
    pub consumes: Vec<String>,
    /// Streams this stage hands on
    pub produces: Vec<String>,
    pub operations: Vec<Operation>,
}

/// Everything a stage hands back to the simulation
#[derive(Clone, Debug)]
pub struct StageOutcome {
    pub ledger: Ledger,
    pub step: StepRecord,
    /// Mass that entered from outside the process during this stage
    pub added: MassRecord,
}

impl Stage {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            consumes: Vec::new(),
            produces: Vec::new(),
            operations: Vec::new(),
        }
    }

    pub fn consumes(mut self, streams: &[&str]) -> Self {
        self.consumes = streams.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn produces(mut self, streams: &[&str]) -> Self {
        self.produces = streams.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn then(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Execute the stage against a snapshot of the ledger
    ///
    /// The input ledger is never modified: on failure the caller keeps the
    /// state from before the stage, on success it adopts `outcome.ledger`.
    pub fn apply(&self, ledger: &Ledger) -> Result<StageOutcome> {
        let mut working = ledger.clone();
        let stage = working.advance_stage();

        let consumed = self
            .consumes
            .iter()
            .map(|name| ledger.total(name))
            .sum::<Result<f64>>()?;
        let mut added = MassRecord::zero();

        for operation in &self.operations {
            match operation {
                Operation::Apply {
                    input,
                    output,
                    rule,
                    residue,
                } => {
                    let source = working.get(input)?.clone();
                    let out = rule.apply(input, &source)?;
                    tracing::debug!(
                        "{}: {} {:?} -> {:?} ({:.4} kg/hr)",
                        self.name,
                        rule.kind(),
                        input,
                        output,
                        out.product.total()
                    );

                    added += &out.added;
                    working.put(output, out.product)?;
                    match (residue, out.residue) {
                        (Some(Target::Stream(name)), Some(record)) => working.put(name, record)?,
                        (Some(Target::Loss(name)), Some(record)) => {
                            working.add_loss(name, record)?
                        }
                        (None, None) => {}
                        _ => {
                            return Err(Error::Pipeline(format!(
                                "{}: {} rule on {:?} has mismatched residue wiring",
                                self.name,
                                rule.kind(),
                                input
                            )))
                        }
                    }
                }
                Operation::Retire { stream, loss } => working.retire(stream, loss)?,
            }
        }

        let produced = self
            .produces
            .iter()
            .map(|name| working.total(name))
            .sum::<Result<f64>>()?;
        let waste = working.stage_waste(stage);

        let step = StepRecord {
            name: self.name.clone(),
            mass_input: consumed + added.total(),
            mass_output: produced,
            waste_output: waste,
        };

        Ok(StageOutcome {
            ledger: working,
            step,
            added,
        })
    }
}

/// Ordered list of stages
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Products that no stage consumes
    pub fn terminal_streams(&self) -> Vec<String> {
        let consumed: HashSet<&str> = self
            .stages
            .iter()
            .flat_map(|s| s.consumes.iter().map(String::as_str))
            .collect();
        self.stages
            .iter()
            .flat_map(|s| s.produces.iter())
            .filter(|name| !consumed.contains(name.as_str()))
            .cloned()
            .collect()
    }

    /// Check wiring and parameters before anything executes
    ///
    /// `feed` names the streams seeded into the ledger before stage 1.
    pub fn validate(&self, feed: &[String]) -> Result<()> {
        let mut available: HashSet<String> = feed.iter().cloned().collect();
        let mut stage_names = HashSet::new();
        let mut consumed_once = HashSet::new();
        let mut loss_owner: HashSet<String> = HashSet::new();

        for stage in &self.stages {
            if !stage_names.insert(stage.name.as_str()) {
                return Err(Error::Pipeline(format!("duplicate stage name {:?}", stage.name)));
            }

            for name in &stage.consumes {
                if !available.contains(name) {
                    return Err(Error::UnknownStream(format!(
                        "{} (consumed by {:?} before it is produced)",
                        name, stage.name
                    )));
                }
                if !consumed_once.insert(name.clone()) {
                    return Err(Error::Pipeline(format!(
                        "{:?} is consumed by more than one stage",
                        name
                    )));
                }
            }

            let mut written: Vec<String> = Vec::new();
            let mut retired: HashSet<String> = HashSet::new();
            let mut local_losses: HashSet<String> = HashSet::new();

            for operation in &stage.operations {
                let loss = match operation {
                    Operation::Apply {
                        input,
                        output,
                        rule,
                        residue,
                    } => {
                        if !written.contains(input) && !stage.consumes.contains(input) {
                            return Err(Error::Pipeline(format!(
                                "{}: reads {:?} without consuming it",
                                stage.name, input
                            )));
                        }
                        rule.validate(input)?;
                        if rule.has_residue() != residue.is_some() {
                            return Err(Error::Pipeline(format!(
                                "{}: {} rule on {:?} {} a residue target",
                                stage.name,
                                rule.kind(),
                                input,
                                if rule.has_residue() { "needs" } else { "cannot take" }
                            )));
                        }
                        mark_written(&mut written, output);
                        match residue {
                            Some(Target::Stream(name)) => {
                                mark_written(&mut written, name);
                                None
                            }
                            Some(Target::Loss(name)) => Some(name),
                            None => None,
                        }
                    }
                    Operation::Retire { stream, loss } => {
                        if !written.contains(stream) && !stage.consumes.contains(stream) {
                            return Err(Error::Pipeline(format!(
                                "{}: cannot retire {:?}, it is neither consumed nor created here",
                                stage.name, stream
                            )));
                        }
                        retired.insert(stream.clone());
                        Some(loss)
                    }
                };

                if let Some(loss) = loss {
                    if loss_owner.contains(loss) {
                        return Err(Error::SealedRecord(loss.clone()));
                    }
                    local_losses.insert(loss.clone());
                }
            }

            for product in &stage.produces {
                if !written.contains(product) || retired.contains(product) {
                    return Err(Error::Pipeline(format!(
                        "{}: declared product {:?} is not written by the stage",
                        stage.name, product
                    )));
                }
            }
            for name in &written {
                if !stage.produces.contains(name) && !retired.contains(name) {
                    return Err(Error::Pipeline(format!(
                        "{}: intermediate stream {:?} is neither produced nor retired",
                        stage.name, name
                    )));
                }
                if available.contains(name) {
                    return Err(Error::SealedRecord(name.clone()));
                }
            }

            for name in &stage.consumes {
                if retired.contains(name) {
                    available.remove(name);
                }
            }
            available.extend(stage.produces.iter().cloned());
            loss_owner.extend(local_losses);
        }

        Ok(())
    }
}

fn mark_written(written: &mut Vec<String>, name: &str) {
    if !written.iter().any(|w| w == name) {
        written.push(name.to_string());
    }
}
