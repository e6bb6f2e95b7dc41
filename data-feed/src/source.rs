use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use fleet_core::{Metric, ReferencePoint, Row};

use crate::decode::{decode_reference_points, decode_rows};
use crate::FeedError;

/// File name of the cost reference line (no drive transition).
pub const REFERENCE_FILE: &str = "KeineAntriebswende.json";

/// Collaborator supplying parsed rows per metric. Each call returns a complete
/// snapshot; callers never see partial data.
pub trait RowSource {
    type Error: fmt::Display;

    fn load_rows(&self, metric: Metric) -> Result<Vec<Row>, Self::Error>;

    /// Optional reference line for the metric.
    fn load_reference(
        &self,
        _metric: Metric,
    ) -> Result<Option<Vec<ReferencePoint>>, Self::Error> {
        Ok(None)
    }
}

/// Rows held in memory, e.g. preloaded or built in tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    rows: HashMap<Metric, Vec<Row>>,
    references: HashMap<Metric, Vec<ReferencePoint>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, metric: Metric, rows: Vec<Row>) -> Self {
        self.rows.insert(metric, rows);
        self
    }

    pub fn with_json(self, metric: Metric, json: &str) -> Result<Self, FeedError> {
        let rows = decode_rows(json, metric)?;
        Ok(self.with_rows(metric, rows))
    }

    pub fn with_reference(mut self, metric: Metric, points: Vec<ReferencePoint>) -> Self {
        self.references.insert(metric, points);
        self
    }

    pub fn set_rows(&mut self, metric: Metric, rows: Vec<Row>) {
        self.rows.insert(metric, rows);
    }
}

impl RowSource for MemorySource {
    type Error = FeedError;

    fn load_rows(&self, metric: Metric) -> Result<Vec<Row>, FeedError> {
        self.rows
            .get(&metric)
            .cloned()
            .ok_or_else(|| FeedError::UnknownSource(metric.file_name()))
    }

    fn load_reference(&self, metric: Metric) -> Result<Option<Vec<ReferencePoint>>, FeedError> {
        Ok(self.references.get(&metric).cloned())
    }
}

/// Reads `<root>/<Metric>.json`; the cost chart also reads [`REFERENCE_FILE`]
/// when present.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, name: &str) -> Result<String, FeedError> {
        let path = self.root.join(name);
        fs::read_to_string(&path).map_err(|source| FeedError::Io { path, source })
    }
}

impl RowSource for DirSource {
    type Error = FeedError;

    fn load_rows(&self, metric: Metric) -> Result<Vec<Row>, FeedError> {
        decode_rows(&self.read(&metric.file_name())?, metric)
    }

    fn load_reference(&self, metric: Metric) -> Result<Option<Vec<ReferencePoint>>, FeedError> {
        if metric != Metric::Kosten || !self.root.join(REFERENCE_FILE).is_file() {
            return Ok(None);
        }
        decode_reference_points(&self.read(REFERENCE_FILE)?, metric).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("data-feed-{tag}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn memory_source_reports_missing_metric() {
        let src = MemorySource::new().with_rows(Metric::Bestand, vec![]);
        assert!(src.load_rows(Metric::Bestand).unwrap().is_empty());
        assert!(matches!(
            src.load_rows(Metric::Thg),
            Err(FeedError::UnknownSource(name)) if name == "THG-Emissionen.json"
        ));
        assert_eq!(src.load_reference(Metric::Kosten).unwrap(), None);
    }

    #[test]
    fn dir_source_reads_metric_files() {
        let dir = mk_dir("rows");
        fs::write(
            dir.join("Kosten.json"),
            r#"[{"Szenario": "1", "Groessenklasse": "A", "Technologie": "BEV", "Jahr": "2025", "Kosten": "5"}]"#,
        )
        .unwrap();
        fs::write(dir.join(REFERENCE_FILE), r#"[{"Jahr": "2025", "Kosten": 9}]"#).unwrap();

        let src = DirSource::new(&dir);
        assert_eq!(src.load_rows(Metric::Kosten).unwrap().len(), 1);
        assert_eq!(src.load_reference(Metric::Kosten).unwrap().unwrap().len(), 1);
        assert_eq!(src.load_reference(Metric::Bestand).unwrap(), None);
        assert!(matches!(
            src.load_rows(Metric::Bestand),
            Err(FeedError::Io { .. })
        ));
        fs::remove_dir_all(&dir).unwrap();
    }
}
