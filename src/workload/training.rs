//! Training participation: which workload statements may update Bao's model.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use super::statement::Statement;
use crate::error::{Result, WorkloadError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingAnnotation {
    pub statement: Statement,
    pub participates: bool,
}

impl TrainingAnnotation {
    pub fn new(statement: Statement, participates: bool) -> Self {
        Self {
            statement,
            participates,
        }
    }
}

/// How participation is decided for a run. Exactly one mode applies.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingSelection {
    /// Every statement participates.
    All,
    /// A uniformly sampled fraction of the statements participates.
    Fraction(f64),
    /// Participation is read back from a manifest written by an earlier run.
    Manifest(PathBuf),
}

/// Result of joining a workload against a manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub annotations: Vec<TrainingAnnotation>,
    /// Statements absent from the manifest, marked as non-participating
    pub missing: usize,
}

pub fn annotate_all(statements: Vec<Statement>) -> Vec<TrainingAnnotation> {
    statements
        .into_iter()
        .map(|s| TrainingAnnotation::new(s, true))
        .collect()
}

/// Mark exactly `ceil(fraction * n)` of the `n` statements as participating,
/// chosen uniformly at random over statement positions.
pub fn select_fraction<R: Rng + ?Sized>(
    statements: Vec<Statement>,
    fraction: f64,
    rng: &mut R,
) -> Result<Vec<TrainingAnnotation>> {
    if !(0.0..=1.0).contains(&fraction) {
        return Err(WorkloadError::Config(format!(
            "training fraction must lie within [0, 1], got {}",
            fraction
        )));
    }

    let n = statements.len();
    let count = ((fraction * n as f64).ceil() as usize).min(n);
    let mut chosen = vec![false; n];
    for idx in rand::seq::index::sample(rng, n, count).into_iter() {
        chosen[idx] = true;
    }

    Ok(statements
        .into_iter()
        .zip(chosen)
        .map(|(s, participates)| TrainingAnnotation::new(s, participates))
        .collect())
}

/// Left-join the workload against `manifest` on exact statement text.
pub fn reconcile(statements: Vec<Statement>, manifest: &TrainingManifest) -> Reconciliation {
    let mut missing = 0;
    let annotations = statements
        .into_iter()
        .map(|s| {
            let participates = match manifest.get(s.text()) {
                Some(flag) => flag,
                None => {
                    missing += 1;
                    false
                }
            };
            TrainingAnnotation::new(s, participates)
        })
        .collect();

    if missing > 0 {
        tracing::warn!(
            "Could not completely reconstruct training information. Excluding missing queries from training. {} queries affected.",
            missing
        );
    }

    Reconciliation {
        annotations,
        missing,
    }
}

pub fn select<R: Rng + ?Sized>(
    statements: Vec<Statement>,
    selection: &TrainingSelection,
    rng: &mut R,
) -> Result<Vec<TrainingAnnotation>> {
    match selection {
        TrainingSelection::All => Ok(annotate_all(statements)),
        TrainingSelection::Fraction(fraction) => select_fraction(statements, *fraction, rng),
        TrainingSelection::Manifest(path) => {
            let manifest = TrainingManifest::read(path)?;
            Ok(reconcile(statements, &manifest).annotations)
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestRow {
    query: String,
    training: String,
}

/// Statement text → "used for training", stored as a `query,training` CSV.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingManifest {
    entries: HashMap<String, bool>,
}

impl TrainingManifest {
    pub fn get(&self, statement: &str) -> Option<bool> {
        self.entries.get(statement).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut entries = HashMap::new();
        for row in csv_reader.deserialize() {
            let row: ManifestRow = row?;
            let training = parse_flag(&row.training).ok_or_else(|| {
                WorkloadError::Config(format!(
                    "invalid training flag {:?} for query {:?}",
                    row.training, row.query
                ))
            })?;
            // Manifests written by older tooling kept the line terminator.
            let query = row.query.trim_end_matches(['\r', '\n']).to_string();
            entries.insert(query, training);
        }
        Ok(Self { entries })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Record the participation actually used, one row per statement in order.
    pub fn write_to<W: io::Write>(writer: W, annotations: &[TrainingAnnotation]) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for annotation in annotations {
            csv_writer.serialize(ManifestRow {
                query: annotation.statement.text().to_string(),
                training: format_flag(annotation.participates).to_string(),
            })?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn write(path: &Path, annotations: &[TrainingAnnotation]) -> Result<()> {
        let file = std::fs::File::create(path)?;
        Self::write_to(file, annotations)
    }
}

impl FromIterator<(String, bool)> for TrainingManifest {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn format_flag(flag: bool) -> &'static str {
    if flag {
        "True"
    } else {
        "False"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::statement::parse_statements;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn workload() -> Vec<Statement> {
        parse_statements("SET x=1\nSELECT 1\nSELECT 2\nEXPLAIN SELECT 3\nSELECT 4\n")
    }

    #[test]
    fn test_annotate_all() {
        let annotations = annotate_all(workload());
        assert_eq!(annotations.len(), 5);
        assert!(annotations.iter().all(|a| a.participates));
    }

    #[test]
    fn test_fraction_count_uses_ceiling() {
        let mut rng = StdRng::seed_from_u64(7);
        let annotations = select_fraction(workload(), 0.5, &mut rng).unwrap();
        assert_eq!(annotations.iter().filter(|a| a.participates).count(), 3);

        let annotations = select_fraction(workload(), 0.01, &mut rng).unwrap();
        assert_eq!(annotations.iter().filter(|a| a.participates).count(), 1);
    }

    #[test]
    fn test_fraction_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let none = select_fraction(workload(), 0.0, &mut rng).unwrap();
        assert!(none.iter().all(|a| !a.participates));
        let all = select_fraction(workload(), 1.0, &mut rng).unwrap();
        assert!(all.iter().all(|a| a.participates));
        assert!(select_fraction(workload(), 1.5, &mut rng).is_err());
        assert!(select_fraction(workload(), -0.1, &mut rng).is_err());
    }

    #[test]
    fn test_fraction_preserves_order() {
        let mut rng = StdRng::seed_from_u64(42);
        let annotations = select_fraction(workload(), 0.4, &mut rng).unwrap();
        let texts: Vec<&str> = annotations.iter().map(|a| a.statement.text()).collect();
        assert_eq!(texts, vec!["SET x=1", "SELECT 1", "SELECT 2", "EXPLAIN SELECT 3", "SELECT 4"]);
    }

    #[test]
    fn test_fraction_on_empty_workload() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(select_fraction(Vec::new(), 0.5, &mut rng).unwrap().is_empty());
    }

    #[test]
    fn test_reconcile_marks_missing_as_excluded() {
        let manifest: TrainingManifest = vec![
            ("SET x=1".to_string(), false),
            ("SELECT 1".to_string(), true),
            ("EXPLAIN SELECT 3".to_string(), true),
        ]
        .into_iter()
        .collect();

        let rec = reconcile(workload(), &manifest);
        assert_eq!(rec.missing, 2);
        let flags: Vec<bool> = rec.annotations.iter().map(|a| a.participates).collect();
        assert_eq!(flags, vec![false, true, false, true, false]);
    }

    #[test]
    fn test_reconcile_complete_manifest() {
        let manifest: TrainingManifest = workload()
            .into_iter()
            .map(|s| (s.text().to_string(), true))
            .collect();
        let rec = reconcile(workload(), &manifest);
        assert_eq!(rec.missing, 0);
        assert!(rec.annotations.iter().all(|a| a.participates));
    }

    #[test]
    fn test_manifest_reads_legacy_format() {
        let csv = "query,training\n\"SELECT 1\n\",True\nSET x=1,False\n\"SELECT a, b FROM t\",true\n";
        let manifest = TrainingManifest::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest.get("SELECT 1"), Some(true));
        assert_eq!(manifest.get("SET x=1"), Some(false));
        assert_eq!(manifest.get("SELECT a, b FROM t"), Some(true));
        assert_eq!(manifest.get("SELECT 2"), None);
    }

    #[test]
    fn test_manifest_rejects_bad_flag() {
        let csv = "query,training\nSELECT 1,maybe\n";
        assert!(matches!(
            TrainingManifest::from_reader(csv.as_bytes()),
            Err(WorkloadError::Config(_))
        ));
    }

    #[test]
    fn test_manifest_write_then_reconcile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("training.csv");
        let mut rng = StdRng::seed_from_u64(3);
        let written = select_fraction(workload(), 0.6, &mut rng).unwrap();
        TrainingManifest::write(&path, &written).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("query,training\n"));

        let selected = select(workload(), &TrainingSelection::Manifest(path), &mut rng).unwrap();
        assert_eq!(selected, written);
    }

    #[test]
    fn test_select_missing_manifest_file() {
        let mut rng = StdRng::seed_from_u64(3);
        let selection = TrainingSelection::Manifest(PathBuf::from("/nonexistent/training.csv"));
        assert!(matches!(
            select(workload(), &selection, &mut rng),
            Err(WorkloadError::Io(_))
        ));
    }
}
