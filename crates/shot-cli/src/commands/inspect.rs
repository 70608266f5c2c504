use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use shot_store::ShotFile;

#[derive(Args, Debug)]
pub struct InspectArgs {
    #[arg(long)]
    pub file: PathBuf,
}

pub fn run(args: &InspectArgs) -> Result<(), Box<dyn Error>> {
    let file = ShotFile::read(&args.file)?;
    println!("{} (schema {})", args.file.display(), file.schema());
    for (name, dataset) in file.datasets() {
        println!("  {name:<32} {:<8} {:?}", dataset.kind(), dataset.shape());
    }
    Ok(())
}
