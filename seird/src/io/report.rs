use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::forecast::Trajectory;
use crate::model::seird::{Compartment, SeirdParams};

/// Write run parameters as `key=value` lines, a blank line, then one CSV row per sample.
pub fn write_forecast_report<W: Write>(
    mut w: W,
    run_id: &str,
    params: &SeirdParams,
    traj: &Trajectory,
) -> anyhow::Result<()> {
    writeln!(w, "run_id={}", run_id)?;
    writeln!(w, "population={:.0}", params.population)?;
    writeln!(w, "initial_infected={:.0}", params.infected)?;
    writeln!(w, "initial_recovered={:.0}", params.recovered)?;
    writeln!(w, "initial_deceased={:.0}", params.deceased)?;
    writeln!(w, "reproduction_number={:.6}", params.reproduction_number)?;
    writeln!(w, "incubation_period_days={:.6}", params.incubation_period)?;
    writeln!(w, "infectious_period_days={:.6}", params.infectious_period)?;
    writeln!(w, "case_fatality_rate={:.6}", params.case_fatality_rate)?;
    writeln!(w, "inflow_rate={:.6}", params.inflow_rate)?;
    writeln!(w, "forecast_days={}", params.forecast_days)?;
    writeln!(w)?;

    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(&mut w);

    let mut header = vec!["day".to_string(), "t".to_string()];
    header.extend(Compartment::ALL.iter().map(|c| c.label().to_string()));
    wtr.write_record(&header)?;

    for day in 0..traj.len() {
        let mut record = vec![day.to_string(), format!("{:.6}", traj.times[day])];
        for c in Compartment::ALL {
            record.push(traj.series(c)[day].to_string());
        }
        wtr.write_record(&record)
            .with_context(|| format!("write report row failed at day={}", day))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the report to `<out_dir>/seird_<run_id>.csv`, creating the directory if needed.
pub fn write_forecast_report_file(
    out_dir: impl AsRef<Path>,
    run_id: &str,
    params: &SeirdParams,
    traj: &Trajectory,
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(out_dir.as_ref()).context("create report dir failed")?;
    let path = out_dir.as_ref().join(format!("seird_{}.csv", run_id));
    let f = std::fs::File::create(&path)
        .with_context(|| format!("create report file failed (path={:?})", path))?;
    write_forecast_report(std::io::BufWriter::new(f), run_id, params, traj)?;
    Ok(path)
}
