use anyhow::{Context, Result};
use taskflow_core::configs::taskfile_schema;

pub fn execute() -> Result<()> {
    let schema = serde_json::to_string_pretty(&taskfile_schema())
        .context("Failed to serialize the task file schema")?;
    println!("{schema}");
    Ok(())
}
