//! Scope table export and terminal rendering.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use simlogue_core::Scope;

/// Write one CSV file per scope into `dir` (created if missing).
///
/// Layout: a `t,<unit>` header, then one `time,value` row per sample.
pub fn export_tables(dir: &Path, scopes: &[Scope]) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create tables directory {}", dir.display()))?;

    for scope in scopes {
        let path = dir.join(format!("{}.csv", scope.name()));
        let file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut out = BufWriter::new(file);
        writeln!(out, "t,{}", scope.unit())?;
        for &(t, value) in scope.samples() {
            writeln!(out, "{t},{value}")?;
        }
        out.flush()?;
    }
    Ok(())
}

const CHART_WIDTH: usize = 72;
const CHART_HEIGHT: usize = 12;

/// Render every scope as a small ASCII chart on stdout.
pub fn show_graphs(scopes: &[Scope]) {
    for scope in scopes {
        println!();
        println!("{} [{}]", scope.name(), scope.unit());
        print_chart(scope);
    }
}

fn print_chart(scope: &Scope) {
    let samples = scope.samples();
    if samples.is_empty() {
        println!("  (no samples)");
        return;
    }

    // Bucket samples into columns, then scale rows to the value range.
    let mut columns = vec![f64::NAN; CHART_WIDTH];
    let per_column = samples.len().div_ceil(CHART_WIDTH);
    for (i, chunk) in samples.chunks(per_column).enumerate() {
        columns[i] = chunk.iter().map(|&(_, v)| v).sum::<f64>() / chunk.len() as f64;
    }

    let lo = columns.iter().copied().filter(|v| v.is_finite()).fold(f64::INFINITY, f64::min);
    let hi = columns
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    let span = if hi > lo { hi - lo } else { 1.0 };

    for row in (0..CHART_HEIGHT).rev() {
        let threshold = lo + span * row as f64 / (CHART_HEIGHT - 1) as f64;
        let mut line = String::with_capacity(CHART_WIDTH);
        for &v in &columns {
            if !v.is_finite() {
                line.push(' ');
            } else if v >= threshold {
                line.push('#');
            } else {
                line.push(' ');
            }
        }
        let label = match row {
            r if r == CHART_HEIGHT - 1 => format!("{hi:>10.3e}"),
            0 => format!("{lo:>10.3e}"),
            _ => " ".repeat(10),
        };
        println!("{label} |{line}");
    }

    let t0 = samples[0].0;
    let t1 = samples[samples.len() - 1].0;
    println!("{} +{}", " ".repeat(10), "-".repeat(CHART_WIDTH));
    println!("{} {t0:<10.3e}{:>width$.3e}", " ".repeat(10), t1, width = CHART_WIDTH - 10);
}

#[cfg(test)]
mod tests {
    use super::*;
    use simlogue_core::{Circuit, PinRef};
    use simlogue_devices::{Device, Resistor};

    fn recorded_scope() -> Scope {
        let mut circuit: Circuit<Device> = Circuit::new();
        let r = circuit.add_device(Resistor::new("R1", 1.0).into()).unwrap();
        let n1 = circuit.create_node();
        circuit.attach(PinRef::new(r, 0), n1);
        circuit.attach(PinRef::new(r, 1), circuit.ground());

        let mut scope = Scope::voltage("voltage_of_R1", PinRef::new(r, 0), PinRef::new(r, 1));
        let (nodes, devices) = circuit.split_mut();
        nodes[n1.index()].voltage = 1.5;
        scope.record(nodes, devices, 0.0);
        nodes[n1.index()].voltage = 2.5;
        scope.record(nodes, devices, 0.001);
        scope
    }

    #[test]
    fn test_export_writes_one_file_per_scope() {
        let dir = tempfile::tempdir().unwrap();
        let scope = recorded_scope();
        export_tables(dir.path(), std::slice::from_ref(&scope)).unwrap();

        let content = fs::read_to_string(dir.path().join("voltage_of_R1.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "t,V");
        assert_eq!(lines[1], "0,1.5");
        assert_eq!(lines[2], "0.001,2.5");
    }

    #[test]
    fn test_export_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("tables").join("run");
        export_tables(&nested, &[recorded_scope()]).unwrap();
        assert!(nested.join("voltage_of_R1.csv").exists());
    }
}
