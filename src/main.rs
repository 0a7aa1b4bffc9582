use anyhow::Result;
use strata::field::{FieldReconstructor, Sampling};
use strata::output;
use strata::settings;
use strata::sweep::Sweep;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = settings::load_config()?;
    println!("{}", settings);

    let problem = settings.problem()?;
    let results = problem.solve()?;
    println!("{}", results);
    output::write_result(&results, &settings.directory)?;

    if let Some(profile) = settings.profile {
        let fields = FieldReconstructor::new(&results.solution, &problem.stack)?;
        let path = Sampling::along_z(profile.start, profile.end, profile.count)?;
        output::write_profile(fields.sample(&path), &settings.directory)?;
    }

    if let Some(config) = settings.sweep {
        let sweep = Sweep::new(problem, config)?.run();
        output::write_sweep(&sweep, &settings.directory)?;
    }

    Ok(())
}
