use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::explain::PlanRecord;

/// One compact JSON document per line, in run order.
pub fn to_json_lines(results: &[PlanRecord]) -> Result<String> {
    let mut output = String::new();
    for record in results {
        output.push_str(&serde_json::to_string(record)?);
        output.push('\n');
    }
    Ok(output)
}

pub fn write_results<W: Write>(mut writer: W, results: &[PlanRecord]) -> Result<()> {
    writer.write_all(to_json_lines(results)?.as_bytes())?;
    writer.flush()?;
    Ok(())
}

pub fn write_results_file(path: &Path, results: &[PlanRecord]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_results(std::io::BufWriter::new(file), results)
}

/// The top-level operation a timing entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunAction {
    Workload,
    Retrain,
    Reset,
}

#[derive(Serialize)]
struct TimingRow {
    action: RunAction,
    runtime: u64,
}

/// Write `action,runtime` (milliseconds) as a single-row CSV.
pub fn write_runtime_to<W: Write>(writer: W, action: RunAction, runtime_ms: u64) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.serialize(TimingRow {
        action,
        runtime: runtime_ms,
    })?;
    csv_writer.flush()?;
    Ok(())
}

pub fn write_runtime(path: &Path, action: RunAction, runtime_ms: u64) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_runtime_to(file, action, runtime_ms)
}
