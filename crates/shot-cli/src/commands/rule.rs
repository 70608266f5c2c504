use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use shot_rule::CompiledPredicate;
use shot_store::{AliasMap, FileAccessor, ShotFile};

use super::parse_alias;

#[derive(Args, Debug)]
pub struct RuleArgs {
    /// Rule expression, e.g. `vmi:(0|1) & i0m>5`.
    #[arg(long)]
    pub expr: String,
    /// Shot file to evaluate the rule against.
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Keyword alias as `keyword=dataset/path`; repeatable.
    #[arg(long = "alias", value_parser = parse_alias)]
    pub aliases: Vec<(String, String)>,
    #[arg(long, default_value = "bunches")]
    pub shot_index_dataset: String,
}

pub fn run(args: &RuleArgs) -> Result<(), Box<dyn Error>> {
    let compiled = CompiledPredicate::compile(Some(args.expr.as_str()))?;
    println!("postfix: {compiled}");
    println!("keywords: {}", compiled.keywords().join(", "));

    let Some(path) = &args.file else {
        return Ok(());
    };
    let aliases: AliasMap = args.aliases.iter().cloned().collect();
    let file = ShotFile::read(path)?;
    let shots = file.shot_indices(&args.shot_index_dataset)?.len();
    let accessor = FileAccessor::new(&file, &aliases, shots);
    let mask = compiled.mask(&accessor, shots)?;
    let selected = mask.iter().filter(|hit| **hit).count();
    println!("selected: {selected}/{shots}");
    Ok(())
}
