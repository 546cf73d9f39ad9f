//! migration:down command implementation

use anyhow::Result;
use chm_core::MigrationLoader;
use chm_runner::{locate, RollbackCommand};

use crate::cli::{DownArgs, GlobalArgs};
use crate::commands::common::{connect, load_config, migrations_dir};

/// Execute the migration:down command
pub async fn execute(args: &DownArgs, global: &GlobalArgs) -> Result<()> {
    let config = load_config()?;
    let loader = MigrationLoader::new(migrations_dir(global, args.path.as_deref())?, &config);

    // Not-found and missing rollback SQL are reported before connecting
    let file = locate(&loader, &args.file)?;
    let db = connect(&config)?;

    RollbackCommand::new(db.as_ref(), &loader, &config)
        .rollback_file(&file)
        .await?;

    println!("Rolled back {}", file.filename);
    Ok(())
}

#[cfg(test)]
#[path = "down_test.rs"]
mod tests;
