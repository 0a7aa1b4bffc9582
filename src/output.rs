use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::info;
use nalgebra::Point3;
use serde::Serialize;

use crate::field::FieldVector;
use crate::result::{Results, Summary};
use crate::sweep::SweepResults;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldReconstructor, Sampling};
    use crate::problem::Problem;
    use crate::stack::{LayerSpec, Stack};
    use crate::sweep::{Sweep, SweepConfig, SweepParameter};
    use crate::wave::IncidentWave;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("strata-{}-{}", name, std::process::id()))
    }

    fn problem() -> Problem {
        let stack = Stack::new(vec![
            LayerSpec::semi_infinite("air", 1.0, 1.0),
            LayerSpec::slab("film", 2.0, 1.0, 0.3),
            LayerSpec::semi_infinite("glass", 2.25, 1.0),
        ])
        .unwrap();
        Problem::new(stack, IncidentWave::new(1.0, 0.2, 0.0, 0.0).unwrap())
    }

    #[test]
    fn writes_result_json() {
        let dir = scratch_dir("result");
        let results = problem().solve().unwrap();
        let path = write_result(&results, &dir).unwrap();
        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        approx::assert_relative_eq!(
            json["results"]["reflectance"].as_f64().unwrap(),
            results.powers.reflectance,
            max_relative = 1e-12
        );
        assert!(json["generated_at"].is_string());
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn writes_tables() {
        let dir = scratch_dir("tables");
        let config = SweepConfig {
            parameter: SweepParameter::Theta,
            start: 0.0,
            stop: 90.0,
            count: 3,
        };
        let sweep = Sweep::new(problem(), config).unwrap().run();
        let path = write_sweep(&sweep, &dir).unwrap();
        let text = fs::read_to_string(path).unwrap();
        let rows: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].split_whitespace().nth(1), Some("NaN"));

        let results = problem().solve().unwrap();
        let stack = problem().stack;
        let fields = FieldReconstructor::new(&results.solution, &stack).unwrap();
        let path = write_profile(fields.sample(&Sampling::along_z(-1.0, 1.0, 5).unwrap()), &dir).unwrap();
        let text = fs::read_to_string(path).unwrap();
        let rows: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].split_whitespace().count(), 17);
        fs::remove_dir_all(dir).unwrap();
    }
}

#[derive(Serialize)]
struct Report<'a> {
    generated_at: String,
    version: &'static str,
    results: &'a Summary,
}

fn output_file(directory: &Path, name: &str) -> Result<PathBuf> {
    fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create output directory {}", directory.display()))?;
    Ok(directory.join(name))
}

fn header(writer: &mut impl Write, columns: &[&str]) -> Result<()> {
    writeln!(
        writer,
        "# strata {} {}",
        env!("CARGO_PKG_VERSION"),
        chrono::Utc::now().to_rfc3339()
    )?;
    writeln!(writer, "# {}", columns.iter().join(" "))?;
    Ok(())
}

/// Write the summary of a solve to `results.json`.
pub fn write_result(results: &Results, directory: &Path) -> Result<PathBuf> {
    let path = output_file(directory, "results.json")?;
    let summary = results.summary();
    let report = Report {
        generated_at: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
        results: &summary,
    };
    let json = serde_json::to_string_pretty(&report)?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(path)
}

/// Write a sweep table with columns parameter, R, T, A and residual to `sweep.dat`.
pub fn write_sweep(sweep: &SweepResults, directory: &Path) -> Result<PathBuf> {
    let path = output_file(directory, "sweep.dat")?;
    let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let parameter = sweep.parameter.to_string();
    header(&mut writer, &[parameter.as_str(), "R", "T", "A", "residual"])?;
    for row in sweep.to_array().outer_iter() {
        writeln!(writer, "{}", row.iter().map(|v| format!("{:.12e}", v)).join(" "))?;
    }
    writer.flush()?;

    info!("Wrote {}", path.display());
    Ok(path)
}

/// Write sampled fields to `profile.dat`: the point, the real and imaginary
/// parts of E and H̃, then |E|² and the z component of the Poynting vector.
pub fn write_profile(
    samples: impl Iterator<Item = (Point3<f64>, FieldVector)>,
    directory: &Path,
) -> Result<PathBuf> {
    let path = output_file(directory, "profile.dat")?;
    let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    header(
        &mut writer,
        &[
            "x", "y", "z", "Re(Ex)", "Im(Ex)", "Re(Ey)", "Im(Ey)", "Re(Ez)", "Im(Ez)", "Re(Hx)",
            "Im(Hx)", "Re(Hy)", "Im(Hy)", "Re(Hz)", "Im(Hz)", "|E|^2", "Sz",
        ],
    )?;
    for (point, field) in samples {
        let values = point
            .iter()
            .copied()
            .chain(field.e.iter().chain(field.h.iter()).flat_map(|z| [z.re, z.im]))
            .chain([field.intensity(), field.poynting().z]);
        writeln!(writer, "{}", values.map(|v| format!("{:.12e}", v)).join(" "))?;
    }
    writer.flush()?;

    info!("Wrote {}", path.display());
    Ok(path)
}
