use std::path::Path;

use anyhow::{Context, Result};
use taskflow_core::{load_taskfile, Status};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Load the task file and run the flow with `args`. Ctrl-C cancels the run.
pub async fn execute(taskfile: &Path, args: Vec<String>) -> Result<Status> {
    let mut flow = load_taskfile(taskfile)
        .with_context(|| format!("Failed to load task file '{}'", taskfile.display()))?;
    debug!(taskfile = %taskfile.display(), ?args, "starting run");

    let token = CancellationToken::new();
    let watcher = {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling run");
                token.cancel();
            }
        })
    };

    // Task bodies block, so the flow runs off the async workers.
    let status = tokio::task::spawn_blocking(move || flow.run(&token, &args))
        .await
        .context("Task runner stopped unexpectedly")?;
    watcher.abort();

    Ok(status)
}
