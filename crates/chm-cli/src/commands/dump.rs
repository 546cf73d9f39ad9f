//! dump command implementation

use anyhow::Result;
use chm_runner::write_dump;

use crate::cli::{DumpArgs, GlobalArgs};
use crate::commands::common::{connect, load_config};

/// Execute the dump command
pub async fn execute(args: &DumpArgs, global: &GlobalArgs) -> Result<()> {
    let config = load_config()?;
    let db = connect(&config)?;
    let out = global.project_dir.join(&args.out);

    let count = write_dump(db.as_ref(), &out).await?;
    println!("Schema dumped to {} ({} object(s))", out.display(), count);
    Ok(())
}

#[cfg(test)]
#[path = "dump_test.rs"]
mod tests;
