//! `arborist run`: drive a previously-built spec's task tree through the
//! control loop until it completes, stalls, or is interrupted, per §4.9/§6.

use super::{load_tree_snapshot, TRUNK};
use crate::error::{ArboristError, ArboristResult};
use arborist_core::config::{ArboristConfig, ConfigOverlay};
use arborist_gardener::Controller;
use arborist_runner::{ProcessRunner, RunnerRegistry};
use arborist_vcs::GitBackend;
use std::path::Path;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    target_repo: &Path,
    namespace: &str,
    spec_id: &str,
    runner: Option<String>,
    model: Option<String>,
    max_retries: Option<u32>,
    test_command: Option<String>,
) -> ArboristResult<()> {
    let tree = load_tree_snapshot(target_repo, namespace, spec_id)?;

    let file_config = ArboristConfig::load(target_repo)?;
    let env_overlay = ConfigOverlay::from_env();
    let cli_overlay = ConfigOverlay {
        runner,
        model,
        max_retries,
        test_command,
        ..Default::default()
    };
    let config = ArboristConfig::resolve(file_config, env_overlay, cli_overlay);

    let registry = RunnerRegistry::with_defaults();
    let template = registry.get(&config.runner.runner).cloned().ok_or_else(|| {
        ArboristError::Config(format!(
            "unknown runner id \"{}\"; known ids are claude, opencode, gemini, mock, or one \
             added via configuration",
            config.runner.runner
        ))
    })?;

    let vcs = GitBackend::new();
    let runner = ProcessRunner::new(template);
    let controller = Controller::new(&vcs, &runner, target_repo, &config, &tree, TRUNK);

    let cancel = controller.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received interrupt, finishing the current step then stopping");
            cancel.trigger();
        }
    });

    controller.run().await?;
    println!("spec {namespace}/{spec_id} complete");
    Ok(())
}
