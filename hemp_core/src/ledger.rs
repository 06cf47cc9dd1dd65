//! Stream and loss ledger.
//!
//! The ledger owns every record of a run in two ordered tables. Each entry
//! remembers the stage that created it: streams may be refined in place
//! only by that stage, and loss keys may accumulate only within it.

use crate::{Component, Error, MassRecord, Result};

/// A named record plus the stage that created it
#[derive(Clone, Debug, PartialEq)]
pub struct LedgerEntry {
    pub name: String,
    pub record: MassRecord,
    pub stage: usize,
}

/// Ordered table of named records
#[derive(Clone, Debug, Default, PartialEq)]
struct Table {
    entries: Vec<LedgerEntry>,
}

impl Table {
    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    fn find(&self, name: &str) -> Option<&LedgerEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

/// Storage for all stream and loss records of one simulation run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ledger {
    streams: Table,
    losses: Table,
    stage: usize,
}

impl Ledger {
    /// Create an empty ledger positioned at stage 0 (feed seeding)
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the stage currently writing
    pub fn stage(&self) -> usize {
        self.stage
    }

    /// Move to the next stage; records written so far become sealed
    pub fn advance_stage(&mut self) -> usize {
        self.stage += 1;
        self.stage
    }

    /// Insert a stream, or overwrite one created by the current stage
    pub fn put(&mut self, name: &str, record: MassRecord) -> Result<()> {
        record.ensure_non_negative(name)?;
        match self.streams.position(name) {
            Some(idx) => {
                let entry = &mut self.streams.entries[idx];
                if entry.stage != self.stage {
                    return Err(Error::SealedRecord(name.to_string()));
                }
                entry.record = record;
            }
            None => self.streams.entries.push(LedgerEntry {
                name: name.to_string(),
                record,
                stage: self.stage,
            }),
        }
        Ok(())
    }

    /// Look up an active stream
    pub fn get(&self, name: &str) -> Result<&MassRecord> {
        self.streams
            .find(name)
            .map(|e| &e.record)
            .ok_or_else(|| Error::UnknownStream(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.streams.position(name).is_some()
    }

    /// Mass of a single component of a stream, with the component given by name
    pub fn component(&self, name: &str, component: &str) -> Result<f64> {
        let record = self.get(name)?;
        let component: Component = component.parse()?;
        Ok(record.get(component))
    }

    /// Sum of all components of a stream
    pub fn total(&self, name: &str) -> Result<f64> {
        Ok(self.get(name)?.total())
    }

    /// Record a loss; repeated writes within one stage accumulate
    pub fn add_loss(&mut self, name: &str, record: MassRecord) -> Result<()> {
        record.ensure_non_negative(name)?;
        match self.losses.position(name) {
            Some(idx) => {
                let entry = &mut self.losses.entries[idx];
                if entry.stage != self.stage {
                    return Err(Error::SealedRecord(name.to_string()));
                }
                entry.record += &record;
            }
            None => self.losses.entries.push(LedgerEntry {
                name: name.to_string(),
                record,
                stage: self.stage,
            }),
        }
        Ok(())
    }

    /// Look up a loss record
    pub fn loss(&self, name: &str) -> Result<&MassRecord> {
        self.losses
            .find(name)
            .map(|e| &e.record)
            .ok_or_else(|| Error::UnknownStream(name.to_string()))
    }

    /// Move a stream out of the active table and record it as a loss
    pub fn retire(&mut self, stream: &str, loss: &str) -> Result<()> {
        let idx = self
            .streams
            .position(stream)
            .ok_or_else(|| Error::UnknownStream(stream.to_string()))?;
        let record = self.streams.entries[idx].record.clone();
        self.add_loss(loss, record)?;
        self.streams.entries.remove(idx);
        tracing::debug!("Retired stream {:?} into loss {:?}", stream, loss);
        Ok(())
    }

    /// Active streams in creation order
    pub fn streams(&self) -> &[LedgerEntry] {
        &self.streams.entries
    }

    /// Loss records in creation order
    pub fn losses(&self) -> &[LedgerEntry] {
        &self.losses.entries
    }

    /// Total of losses written by the given stage
    pub fn stage_waste(&self, stage: usize) -> f64 {
        self.losses
            .entries
            .iter()
            .filter(|e| e.stage == stage)
            .map(|e| e.record.total())
            .sum()
    }

    /// Total of every loss record
    pub fn total_waste(&self) -> f64 {
        self.losses.entries.iter().map(|e| e.record.total()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds(mass: f64) -> MassRecord {
        MassRecord::from_pairs(&[(Component::Seeds, mass), (Component::Moisture, 1.0)])
    }

    #[test]
    fn test_put_and_get() {
        let mut ledger = Ledger::new();
        ledger.put("Seeds In", seeds(10.0)).unwrap();

        assert_eq!(ledger.get("Seeds In").unwrap().seeds, 10.0);
        assert_eq!(ledger.total("Seeds In").unwrap(), 11.0);
        assert_eq!(ledger.component("Seeds In", "moisture").unwrap(), 1.0);
    }

    #[test]
    fn test_unknown_stream_and_component() {
        let mut ledger = Ledger::new();
        ledger.put("Seeds In", seeds(10.0)).unwrap();

        assert!(matches!(ledger.get("Nope"), Err(Error::UnknownStream(_))));
        assert!(matches!(ledger.total("Nope"), Err(Error::UnknownStream(_))));
        assert!(matches!(
            ledger.component("Seeds In", "Hops"),
            Err(Error::UnknownComponent(_))
        ));
    }

    #[test]
    fn test_overwrite_within_stage_only() {
        let mut ledger = Ledger::new();
        ledger.advance_stage();
        ledger.put("Dried", seeds(10.0)).unwrap();
        ledger.put("Dried", seeds(9.0)).unwrap();
        assert_eq!(ledger.get("Dried").unwrap().seeds, 9.0);

        ledger.advance_stage();
        let err = ledger.put("Dried", seeds(1.0)).unwrap_err();
        assert!(matches!(err, Error::SealedRecord(name) if name == "Dried"));
        assert_eq!(ledger.get("Dried").unwrap().seeds, 9.0);
    }

    #[test]
    fn test_put_rejects_negative() {
        let mut ledger = Ledger::new();
        let bad = MassRecord::from_pairs(&[(Component::Oil, -2.0)]);
        assert!(matches!(
            ledger.put("Bad", bad),
            Err(Error::NegativeQuantity { .. })
        ));
        assert!(!ledger.contains("Bad"));
    }

    #[test]
    fn test_losses_accumulate_within_stage() {
        let mut ledger = Ledger::new();
        ledger.advance_stage();
        ledger.add_loss("Fiber Loss", seeds(1.0)).unwrap();
        ledger.add_loss("Fiber Loss", seeds(2.0)).unwrap();
        assert_eq!(ledger.loss("Fiber Loss").unwrap().seeds, 3.0);
        assert_eq!(ledger.stage_waste(1), 5.0);

        ledger.advance_stage();
        assert!(matches!(
            ledger.add_loss("Fiber Loss", seeds(1.0)),
            Err(Error::SealedRecord(_))
        ));
    }

    #[test]
    fn test_retire_moves_stream_to_losses() {
        let mut ledger = Ledger::new();
        ledger.put("Processed Seeds", seeds(4.0)).unwrap();
        ledger.advance_stage();
        ledger.retire("Processed Seeds", "Processed Seeds Waste").unwrap();

        assert!(!ledger.contains("Processed Seeds"));
        assert_eq!(ledger.loss("Processed Seeds Waste").unwrap().seeds, 4.0);
        assert_eq!(ledger.total_waste(), 5.0);

        assert!(matches!(
            ledger.retire("Processed Seeds", "Again"),
            Err(Error::UnknownStream(_))
        ));
    }

    #[test]
    fn test_tables_keep_insertion_order() {
        let mut ledger = Ledger::new();
        for name in ["b", "a", "c"] {
            ledger.put(name, seeds(1.0)).unwrap();
        }
        let names: Vec<_> = ledger.streams().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["b", "a", "c"]);
    }
}
