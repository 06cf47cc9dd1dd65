//! Unit-operation rules.
//!
//! A rule is a pure function of one input record. Four shapes cover every
//! stage of the process:
//! - **Split**: keep a fraction of each component, the remainder becomes residue
//! - **Compose**: convert one aggregate component into derived components
//! - **Additive**: add external mass proportional to a reference quantity
//! - **MoistureAdjust**: dry a record down to a target moisture content
//!
//! Rules never touch the ledger; wiring them to stream names is the job of
//! [`crate::pipeline::Operation`].

use crate::types::approx_eq;
use crate::{Component, Error, MassRecord, Result, NEGATIVE_TOLERANCE};

/// Tolerance on weight sums
pub const COMPOSITION_TOLERANCE: f64 = 1e-6;

// ============================================================================
// Parameter Types
// ============================================================================

/// Retained fraction per component: a default plus per-component overrides
#[derive(Clone, Debug, PartialEq)]
pub struct FractionMap {
    pub default: f64,
    pub overrides: Vec<(Component, f64)>,
}

impl FractionMap {
    /// Same fraction for every component
    pub fn uniform(fraction: f64) -> Self {
        Self {
            default: fraction,
            overrides: Vec::new(),
        }
    }

    /// Override the fraction for one component
    pub fn with(mut self, component: Component, fraction: f64) -> Self {
        self.overrides.retain(|(c, _)| *c != component);
        self.overrides.push((component, fraction));
        self
    }

    pub fn fraction(&self, component: Component) -> f64 {
        self.overrides
            .iter()
            .find(|(c, _)| *c == component)
            .map(|&(_, f)| f)
            .unwrap_or(self.default)
    }

    fn validate(&self) -> Result<()> {
        check_fraction("split default", self.default)?;
        for (component, fraction) in &self.overrides {
            check_fraction(&format!("split fraction for {}", component), *fraction)?;
        }
        Ok(())
    }
}

/// Keep `retained` of each component; the rest becomes residue
#[derive(Clone, Debug, PartialEq)]
pub struct SplitParams {
    pub retained: FractionMap,
}

/// Replace `source` with `source * weight` of each weighted component
#[derive(Clone, Debug, PartialEq)]
pub struct ComposeParams {
    pub source: Component,
    pub weights: Vec<(Component, f64)>,
}

/// Quantity an additive ratio is measured against
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Reference {
    /// Total mass of the input record
    Total,
    /// One component of the input record
    Component(Component),
    /// One component as it stood before an upstream split kept only
    /// `retained` of it
    Gross { component: Component, retained: f64 },
}

impl Reference {
    pub fn quantity(self, record: &MassRecord) -> f64 {
        match self {
            Reference::Total => record.total(),
            Reference::Component(c) => record.get(c),
            Reference::Gross { component, retained } => record.get(component) / retained,
        }
    }
}

/// Add `reference * ratio` of each listed component
#[derive(Clone, Debug, PartialEq)]
pub struct AdditiveParams {
    pub reference: Reference,
    pub ratios: Vec<(Component, f64)>,
}

/// Dry down to `target` moisture content (wet basis)
#[derive(Clone, Debug, PartialEq)]
pub struct MoistureParams {
    pub target: f64,
}

/// The four rule shapes
#[derive(Clone, Debug, PartialEq)]
pub enum Rule {
    Split(SplitParams),
    Compose(ComposeParams),
    Additive(AdditiveParams),
    MoistureAdjust(MoistureParams),
}

/// Result of applying a rule to one record
#[derive(Clone, Debug, PartialEq)]
pub struct RuleOutput {
    /// Record written to the operation's output key
    pub product: MassRecord,
    /// Split remainder or removed moisture
    pub residue: Option<MassRecord>,
    /// Mass that entered from outside the process
    pub added: MassRecord,
}

// ============================================================================
// Rule Evaluation
// ============================================================================

impl Rule {
    pub fn split(retained: FractionMap) -> Self {
        Rule::Split(SplitParams { retained })
    }

    pub fn compose(source: Component, weights: &[(Component, f64)]) -> Self {
        Rule::Compose(ComposeParams {
            source,
            weights: weights.to_vec(),
        })
    }

    pub fn additive(reference: Reference, ratios: &[(Component, f64)]) -> Self {
        Rule::Additive(AdditiveParams {
            reference,
            ratios: ratios.to_vec(),
        })
    }

    pub fn moisture_adjust(target: f64) -> Self {
        Rule::MoistureAdjust(MoistureParams { target })
    }

    /// Short name used in logs and pipeline listings
    pub fn kind(&self) -> &'static str {
        match self {
            Rule::Split(_) => "split",
            Rule::Compose(_) => "compose",
            Rule::Additive(_) => "additive",
            Rule::MoistureAdjust(_) => "moisture_adjust",
        }
    }

    /// Whether the rule produces a residue that must be routed somewhere
    pub fn has_residue(&self) -> bool {
        matches!(self, Rule::Split(_) | Rule::MoistureAdjust(_))
    }

    /// Check parameters against their domains without touching any record
    ///
    /// `name` is the stream the rule will read, used in errors.
    pub fn validate(&self, name: &str) -> Result<()> {
        match self {
            Rule::Split(p) => p.retained.validate(),
            Rule::Compose(p) => validate_weights(p),
            Rule::Additive(p) => {
                if let Reference::Gross { component, retained } = p.reference {
                    if !(retained > 0.0 && retained <= 1.0) {
                        return Err(Error::InvalidParameter(format!(
                            "retained share of {} must be in (0, 1], got {}",
                            component, retained
                        )));
                    }
                }
                for (component, ratio) in &p.ratios {
                    if !ratio.is_finite() || *ratio < 0.0 {
                        return Err(Error::InvalidParameter(format!(
                            "additive ratio for {} must be finite and >= 0, got {}",
                            component, ratio
                        )));
                    }
                }
                Ok(())
            }
            Rule::MoistureAdjust(p) => {
                if p.target.is_nan() || p.target < 0.0 {
                    return Err(Error::InvalidParameter(format!(
                        "moisture target must be in [0, 1), got {}",
                        p.target
                    )));
                }
                if p.target >= 1.0 {
                    // No record can be dried to all-moisture; current is not known yet
                    return Err(Error::MoistureTargetUnreachable {
                        stream: name.to_string(),
                        target: p.target,
                        current: f64::NAN,
                    });
                }
                Ok(())
            }
        }
    }

    /// Apply the rule to `input`; `name` identifies the input in errors
    pub fn apply(&self, name: &str, input: &MassRecord) -> Result<RuleOutput> {
        self.validate(name)?;
        let output = match self {
            Rule::Split(p) => apply_split(p, input),
            Rule::Compose(p) => apply_compose(p, input),
            Rule::Additive(p) => apply_additive(p, input),
            Rule::MoistureAdjust(p) => apply_moisture(p, name, input)?,
        };

        output.product.ensure_non_negative(name)?;
        if let Some(ref residue) = output.residue {
            residue.ensure_non_negative(name)?;
        }
        Ok(output)
    }
}

fn apply_split(p: &SplitParams, input: &MassRecord) -> RuleOutput {
    let product = input.map(|c, mass| mass * p.retained.fraction(c));
    let residue = input - &product;
    RuleOutput {
        product,
        residue: Some(residue),
        added: MassRecord::zero(),
    }
}

fn apply_compose(p: &ComposeParams, input: &MassRecord) -> RuleOutput {
    let quantity = input.get(p.source);
    let mut product = input.clone();
    product.set(p.source, 0.0);
    for &(component, weight) in &p.weights {
        product.add_mass(component, quantity * weight);
    }
    RuleOutput {
        product,
        residue: None,
        added: MassRecord::zero(),
    }
}

fn apply_additive(p: &AdditiveParams, input: &MassRecord) -> RuleOutput {
    let quantity = p.reference.quantity(input);
    let mut added = MassRecord::zero();
    for &(component, ratio) in &p.ratios {
        added.add_mass(component, quantity * ratio);
    }
    RuleOutput {
        product: input + &added,
        residue: None,
        added,
    }
}

fn apply_moisture(p: &MoistureParams, name: &str, input: &MassRecord) -> Result<RuleOutput> {
    let current_moisture = input.moisture;
    let total = input.total();
    let current = if total > 0.0 {
        current_moisture / total
    } else {
        0.0
    };

    let dry = input.dry_mass();
    let target_moisture = dry * p.target / (1.0 - p.target);
    let mut removed = current_moisture - target_moisture;

    if removed < -NEGATIVE_TOLERANCE {
        return Err(Error::MoistureTargetUnreachable {
            stream: name.to_string(),
            target: p.target,
            current,
        });
    }
    removed = removed.max(0.0);

    let mut product = input.clone();
    product.moisture = current_moisture - removed;

    Ok(RuleOutput {
        product,
        residue: Some(MassRecord::from_pairs(&[(Component::Moisture, removed)])),
        added: MassRecord::zero(),
    })
}

fn validate_weights(p: &ComposeParams) -> Result<()> {
    for (component, weight) in &p.weights {
        if !weight.is_finite() || *weight < 0.0 {
            return Err(Error::InvalidComposition(format!(
                "weight for {} must be finite and >= 0, got {}",
                component, weight
            )));
        }
    }

    let sum: f64 = p.weights.iter().map(|(_, w)| w).sum();
    if !approx_eq(sum, 1.0, COMPOSITION_TOLERANCE) {
        return Err(Error::InvalidComposition(format!(
            "weights for {} sum to {}, expected 1",
            p.source, sum
        )));
    }
    Ok(())
}

/// Check that `value` is a fraction in [0, 1]
pub fn check_fraction(label: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::InvalidParameter(format!(
            "{} must be in [0, 1], got {}",
            label, value
        )));
    }
    Ok(())
}
