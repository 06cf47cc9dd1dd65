//! Core domain types for the mass-balance engine.
//!
//! This module defines the fixed component schema shared by every stream
//! and loss record:
//! - `Component`: the 16 tracked mass kinds, in report order
//! - `MassRecord`: one mass per component (kg/hr)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

/// Values this far below zero are still treated as zero (float noise).
pub const NEGATIVE_TOLERANCE: f64 = 1e-9;

// ============================================================================
// Component Schema
// ============================================================================

/// A tracked mass kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Component {
    Seeds,
    Stems,
    Leaves,
    Moisture,
    #[serde(rename = "CBD")]
    Cbd,
    Oil,
    Cellulose,
    Hemicellulose,
    Lignin,
    Extractives,
    Waste,
    Biopolymer,
    Binder,
    Additives,
    Water,
    Glycerol,
}

impl Component {
    /// Number of components in the schema
    pub const COUNT: usize = 16;

    /// All components in schema (column) order
    pub const ALL: [Component; Component::COUNT] = [
        Component::Seeds,
        Component::Stems,
        Component::Leaves,
        Component::Moisture,
        Component::Cbd,
        Component::Oil,
        Component::Cellulose,
        Component::Hemicellulose,
        Component::Lignin,
        Component::Extractives,
        Component::Waste,
        Component::Biopolymer,
        Component::Binder,
        Component::Additives,
        Component::Water,
        Component::Glycerol,
    ];

    /// Display name, as used for report columns
    pub fn name(self) -> &'static str {
        match self {
            Component::Seeds => "Seeds",
            Component::Stems => "Stems",
            Component::Leaves => "Leaves",
            Component::Moisture => "Moisture",
            Component::Cbd => "CBD",
            Component::Oil => "Oil",
            Component::Cellulose => "Cellulose",
            Component::Hemicellulose => "Hemicellulose",
            Component::Lignin => "Lignin",
            Component::Extractives => "Extractives",
            Component::Waste => "Waste",
            Component::Biopolymer => "Biopolymer",
            Component::Binder => "Binder",
            Component::Additives => "Additives",
            Component::Water => "Water",
            Component::Glycerol => "Glycerol",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Component {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Component::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::UnknownComponent(s.to_string()))
    }
}

// ============================================================================
// Mass Record
// ============================================================================

/// Masses per component for one stream or loss
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MassRecord {
    pub seeds: f64,
    pub stems: f64,
    pub leaves: f64,
    pub moisture: f64,
    #[serde(rename = "CBD")]
    pub cbd: f64,
    pub oil: f64,
    pub cellulose: f64,
    pub hemicellulose: f64,
    pub lignin: f64,
    pub extractives: f64,
    pub waste: f64,
    pub biopolymer: f64,
    pub binder: f64,
    pub additives: f64,
    pub water: f64,
    pub glycerol: f64,
}

impl MassRecord {
    /// An all-zero record
    pub fn zero() -> Self {
        Self::default()
    }

    /// Build a record from (component, mass) pairs; unnamed components are zero
    pub fn from_pairs(pairs: &[(Component, f64)]) -> Self {
        let mut record = Self::zero();
        for &(component, mass) in pairs {
            record.add_mass(component, mass);
        }
        record
    }

    pub fn get(&self, component: Component) -> f64 {
        *self.slot(component)
    }

    pub fn set(&mut self, component: Component, mass: f64) {
        *self.slot_mut(component) = mass;
    }

    /// Add `mass` to one component
    pub fn add_mass(&mut self, component: Component, mass: f64) {
        *self.slot_mut(component) += mass;
    }

    /// Sum over all components
    pub fn total(&self) -> f64 {
        Component::ALL.iter().map(|&c| self.get(c)).sum()
    }

    /// Total of everything except moisture
    pub fn dry_mass(&self) -> f64 {
        self.total() - self.moisture
    }

    /// Elementwise multiplication by a scalar
    pub fn scaled(&self, factor: f64) -> Self {
        self.map(|_, mass| mass * factor)
    }

    /// Apply `f` to every component
    pub fn map(&self, mut f: impl FnMut(Component, f64) -> f64) -> Self {
        let mut out = Self::zero();
        for c in Component::ALL {
            out.set(c, f(c, self.get(c)));
        }
        out
    }

    /// Masses in schema order
    pub fn values(&self) -> [f64; Component::COUNT] {
        Component::ALL.map(|c| self.get(c))
    }

    /// Fail with `NegativeQuantity` if any component is below -1e-9
    pub fn ensure_non_negative(&self, record: &str) -> Result<()> {
        match Component::ALL
            .iter()
            .find(|&&c| self.get(c) < -NEGATIVE_TOLERANCE || self.get(c).is_nan())
        {
            Some(&c) => Err(Error::NegativeQuantity {
                record: record.to_string(),
                component: c.name().to_string(),
                value: self.get(c),
            }),
            None => Ok(()),
        }
    }

    fn slot(&self, component: Component) -> &f64 {
        match component {
            Component::Seeds => &self.seeds,
            Component::Stems => &self.stems,
            Component::Leaves => &self.leaves,
            Component::Moisture => &self.moisture,
            Component::Cbd => &self.cbd,
            Component::Oil => &self.oil,
            Component::Cellulose => &self.cellulose,
            Component::Hemicellulose => &self.hemicellulose,
            Component::Lignin => &self.lignin,
            Component::Extractives => &self.extractives,
            Component::Waste => &self.waste,
            Component::Biopolymer => &self.biopolymer,
            Component::Binder => &self.binder,
            Component::Additives => &self.additives,
            Component::Water => &self.water,
            Component::Glycerol => &self.glycerol,
        }
    }

    fn slot_mut(&mut self, component: Component) -> &mut f64 {
        match component {
            Component::Seeds => &mut self.seeds,
            Component::Stems => &mut self.stems,
            Component::Leaves => &mut self.leaves,
            Component::Moisture => &mut self.moisture,
            Component::Cbd => &mut self.cbd,
            Component::Oil => &mut self.oil,
            Component::Cellulose => &mut self.cellulose,
            Component::Hemicellulose => &mut self.hemicellulose,
            Component::Lignin => &mut self.lignin,
            Component::Extractives => &mut self.extractives,
            Component::Waste => &mut self.waste,
            Component::Biopolymer => &mut self.biopolymer,
            Component::Binder => &mut self.binder,
            Component::Additives => &mut self.additives,
            Component::Water => &mut self.water,
            Component::Glycerol => &mut self.glycerol,
        }
    }
}

impl Add for &MassRecord {
    type Output = MassRecord;

    fn add(self, rhs: &MassRecord) -> MassRecord {
        self.map(|c, mass| mass + rhs.get(c))
    }
}

impl AddAssign<&MassRecord> for MassRecord {
    fn add_assign(&mut self, rhs: &MassRecord) {
        for c in Component::ALL {
            self.add_mass(c, rhs.get(c));
        }
    }
}

impl Sub for &MassRecord {
    type Output = MassRecord;

    fn sub(self, rhs: &MassRecord) -> MassRecord {
        self.map(|c, mass| mass - rhs.get(c))
    }
}

/// Relative closeness check used by the balance and composition checks
pub fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= tolerance * scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_order_and_names() {
        assert_eq!(Component::ALL.len(), 16);
        assert_eq!(Component::ALL[0], Component::Seeds);
        assert_eq!(Component::ALL[15], Component::Glycerol);
        assert_eq!(Component::Cbd.name(), "CBD");
    }

    #[test]
    fn test_component_from_str() {
        assert_eq!("cbd".parse::<Component>().unwrap(), Component::Cbd);
        assert_eq!(" Moisture ".parse::<Component>().unwrap(), Component::Moisture);

        let err = "Hemp".parse::<Component>().unwrap_err();
        assert!(matches!(err, Error::UnknownComponent(name) if name == "Hemp"));
    }

    #[test]
    fn test_record_arithmetic() {
        let a = MassRecord::from_pairs(&[(Component::Seeds, 10.0), (Component::Moisture, 2.0)]);
        let b = MassRecord::from_pairs(&[(Component::Seeds, 4.0), (Component::Oil, 1.0)]);

        let sum = &a + &b;
        assert_eq!(sum.seeds, 14.0);
        assert_eq!(sum.oil, 1.0);
        assert_eq!(sum.total(), 17.0);

        let diff = &a - &b;
        assert_eq!(diff.seeds, 6.0);
        assert_eq!(diff.oil, -1.0);

        assert_eq!(a.dry_mass(), 10.0);
        assert_eq!(a.scaled(0.5).total(), 6.0);
    }

    #[test]
    fn test_add_mass_on_owned_record() {
        let mut record = MassRecord::zero();
        record.add_mass(Component::Water, 1.5);
        record.add_mass(Component::Water, 0.5);
        assert_eq!(record.water, 2.0);

        record += &MassRecord::from_pairs(&[(Component::Water, 1.0)]);
        assert_eq!(record.water, 3.0);
    }

    #[test]
    fn test_ensure_non_negative() {
        let mut record = MassRecord::from_pairs(&[(Component::Lignin, 1.0)]);
        assert!(record.ensure_non_negative("ok").is_ok());

        record.set(Component::Water, -1e-12);
        assert!(record.ensure_non_negative("noise").is_ok());

        record.set(Component::Water, -0.5);
        let err = record.ensure_non_negative("bad").unwrap_err();
        assert!(matches!(
            err,
            Error::NegativeQuantity { ref record, ref component, .. }
                if record == "bad" && component == "Water"
        ));
    }

    #[test]
    fn test_record_serializes_with_column_names() {
        let record = MassRecord::from_pairs(&[(Component::Cbd, 0.5)]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["CBD"], 0.5);
        assert_eq!(json["Seeds"], 0.0);
    }
}
