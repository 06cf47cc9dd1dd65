//! Report export to CSV tables and JSON.
//!
//! Streams and losses are written one row per record with a column per
//! component; steps are written through their serde field names.

use crate::simulation::NamedRecord;
use crate::{Component, Result, RunReport};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const STREAMS_FILE: &str = "streams.csv";
pub const LOSSES_FILE: &str = "losses.csv";
pub const STEPS_FILE: &str = "steps.csv";
pub const REPORT_FILE: &str = "report.json";

fn write_records(path: &Path, records: &[NamedRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = Vec::with_capacity(Component::COUNT + 1);
    header.push("Name");
    header.extend(Component::ALL.iter().map(|c| c.name()));
    writer.write_record(&header)?;

    for named in records {
        let mut row = Vec::with_capacity(Component::COUNT + 1);
        row.push(named.name.clone());
        row.extend(named.record.values().iter().map(|v| v.to_string()));
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

/// Write the stream, loss and step tables of `report` into `dir`
///
/// The directory is created if needed. Returns the paths written.
pub fn write_csv_tables(report: &RunReport, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let streams = dir.join(STREAMS_FILE);
    write_records(&streams, report.streams())?;

    let losses = dir.join(LOSSES_FILE);
    write_records(&losses, report.losses())?;

    let steps = dir.join(STEPS_FILE);
    let mut writer = csv::Writer::from_path(&steps)?;
    for step in report.steps() {
        writer.serialize(step)?;
    }
    writer.flush()?;

    tracing::info!("Wrote CSV tables to {:?}", dir);
    Ok(vec![streams, losses, steps])
}

/// Write the whole report as pretty-printed JSON
pub fn write_json_report(report: &RunReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(report)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    file.write_all(b"\n")?;

    tracing::info!("Wrote report to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use tempfile::TempDir;

    fn report() -> RunReport {
        crate::run(&Config::default()).unwrap()
    }

    #[test]
    fn test_csv_tables_written() {
        let temp_dir = TempDir::new().unwrap();
        let report = report();

        let paths = write_csv_tables(&report, temp_dir.path()).unwrap();
        assert_eq!(paths.len(), 3);
        for path in &paths {
            assert!(path.exists());
        }

        let mut reader = csv::Reader::from_path(temp_dir.path().join(STREAMS_FILE)).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), Component::COUNT + 1);
        assert_eq!(&headers[0], "Name");
        assert_eq!(&headers[1], "Seeds");
        assert_eq!(&headers[4], "Moisture");
        assert_eq!(&headers[5], "CBD");

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), report.streams().len());
        assert_eq!(&rows[0][0], "Hemp Biomass");
    }

    #[test]
    fn test_steps_csv_columns() {
        let temp_dir = TempDir::new().unwrap();
        let report = report();
        write_csv_tables(&report, temp_dir.path()).unwrap();

        let mut reader = csv::Reader::from_path(temp_dir.path().join(STEPS_FILE)).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["Step", "Mass Input", "Mass Output", "Waste Output"]
        );
        assert_eq!(reader.records().count(), 11);
    }

    #[test]
    fn test_losses_csv_values() {
        let temp_dir = TempDir::new().unwrap();
        let report = report();
        write_csv_tables(&report, temp_dir.path()).unwrap();

        let mut reader = csv::Reader::from_path(temp_dir.path().join(LOSSES_FILE)).unwrap();
        let first = reader.records().next().unwrap().unwrap();
        assert_eq!(&first[0], "Leaf Waste");
        let total: f64 = first.iter().skip(1).map(|v| v.parse::<f64>().unwrap()).sum();
        assert!((total - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_json_report() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join(REPORT_FILE);
        let report = report();

        write_json_report(&report, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["steps"].as_array().unwrap().len(), 11);
        assert_eq!(value["streams"][0]["name"], "Hemp Biomass");
        assert!(value["streams"][0]["Seeds"].as_f64().is_some());
        assert_eq!(value["products"][0], "Cream Product");
    }
}
