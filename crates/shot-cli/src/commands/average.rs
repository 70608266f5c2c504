use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use shot_run::{
    to_canonical_json_pretty, AverageOpts, AverageReport, Query, Run, RunConfig, RunSet,
    RunSetConfig, SliceSpec, Splits,
};

#[derive(Args, Debug)]
pub struct AverageArgs {
    /// YAML run or run-set configuration.
    #[arg(long)]
    pub config: PathBuf,
    /// Keyword of the quantity to average.
    #[arg(long)]
    pub quantity: String,
    /// Selection rule; repeatable. Every shot is selected when none is given.
    #[arg(long = "rule")]
    pub rules: Vec<String>,
    /// Adds a select-all rule in front of the given rules.
    #[arg(long)]
    pub include_all: bool,
    /// Separate source-off shots into their own conditions.
    #[arg(long)]
    pub source_split: bool,
    /// Separate modulator-off shots into their own conditions.
    #[arg(long)]
    pub modulator_split: bool,
    /// Slice `start:stop:step` over a trailing axis; repeatable, in axis order.
    #[arg(long = "slice")]
    pub slices: Vec<String>,
    /// Files per cache block; one block of all files when absent.
    #[arg(long)]
    pub block_size: Option<usize>,
    /// Ignore cached results.
    #[arg(long)]
    pub no_cache: bool,
    /// Do not write cache artifacts.
    #[arg(long)]
    pub no_make_cache: bool,
    /// Also cache blocks holding fewer than `--block-size` files.
    #[arg(long)]
    pub save_incomplete: bool,
    /// Worker threads; all available cores when absent.
    #[arg(long)]
    pub workers: Option<usize>,
    /// Fold all runs into one combined average.
    #[arg(long)]
    pub combine: bool,
    /// Write the JSON report here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

fn load_run_set(path: &Path) -> Result<RunSet, Box<dyn Error>> {
    let raw = fs::read_to_string(path)?;
    let value: serde_yaml::Value = serde_yaml::from_str(&raw)?;
    if value.get("runs").is_some() {
        let config: RunSetConfig = serde_yaml::from_value(value)?;
        Ok(RunSet::from_config(&config)?)
    } else {
        let config: RunConfig = serde_yaml::from_value(value)?;
        let mut set = RunSet::new();
        set.add(Arc::new(Run::from_config(&config)?));
        Ok(set)
    }
}

pub fn run(args: &AverageArgs) -> Result<(), Box<dyn Error>> {
    let set = load_run_set(&args.config)?;

    let mut rules: Vec<Option<String>> = args.rules.iter().cloned().map(Some).collect();
    if args.include_all {
        rules.insert(0, None);
    }
    let query = Query::new(args.quantity.clone())
        .with_rules(rules)
        .with_splits(Splits {
            source: args.source_split,
            modulator: args.modulator_split,
        })
        .with_slice(SliceSpec::parse(&args.slices)?);

    let mut opts = AverageOpts {
        use_cache: !args.no_cache,
        make_cache: !args.no_make_cache,
        block_size: args.block_size,
        save_incomplete: args.save_incomplete,
        ..AverageOpts::default()
    };
    if let Some(workers) = args.workers {
        opts.workers = workers;
    }

    let result = set.average(&query, &opts)?;
    let report = AverageReport::build(&query, &result, args.combine)?;
    let json = to_canonical_json_pretty(&report)?;
    match &args.out {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, json)?;
            log::info!("wrote report {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
