use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use shot_run::config::to_yaml_string;
use shot_run::{ClassifierConfig, RunConfig};
use shot_store::SynthSpec;

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Directory receiving the shot files.
    #[arg(long)]
    pub out: PathBuf,
    #[arg(long, default_value_t = 2)]
    pub files: usize,
    #[arg(long, default_value_t = 100)]
    pub shots: usize,
    #[arg(long, default_value_t = 7)]
    pub seed: u64,
    #[arg(long, default_value_t = 2)]
    pub source_period: i64,
    #[arg(long, default_value_t = 2)]
    pub modulator_period: i64,
    #[arg(long, default_value_t = 1)]
    pub modulator_offset: i64,
    /// Also write a run configuration pointing at the generated files.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: &GenerateArgs) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(&args.out)?;
    let spec = SynthSpec {
        files: args.files,
        shots: args.shots,
        seed: args.seed,
        source_period: args.source_period,
        modulator_period: args.modulator_period,
        modulator_offset: args.modulator_offset,
        ..SynthSpec::default()
    };
    let written = spec.write_run(&args.out)?;
    log::info!("wrote {} shot files to {}", written.len(), args.out.display());

    if let Some(path) = &args.config {
        let mut config = RunConfig::new("synthetic", args.out.clone());
        config.aliases = SynthSpec::aliases();
        config.classifier = ClassifierConfig {
            source_offset: spec.source_offset,
            modulator_period: spec.modulator_period,
            ..ClassifierConfig::default()
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, to_yaml_string(&config)?)?;
        log::info!("wrote run configuration {}", path.display());
    }
    Ok(())
}
