use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde_json::json;
use watched_sync_config::{Config, PathManager, SyncMode};

pub async fn run_sync(
    mut config: Config,
    paths: &PathManager,
    dry_run: bool,
    mode: Option<SyncMode>,
    output: &Output,
) -> Result<()> {
    tracing::debug!("Sync command started");

    if dry_run {
        config.sync.dryrun = true;
    }
    if let Some(mode) = mode {
        config.sync.mode = mode;
    }

    let mut orchestrator = super::build_orchestrator(&config, paths)?;
    let result = orchestrator
        .run_cycle()
        .await
        .map_err(|e| eyre!("Sync cycle failed: {:#}", e))?;

    if output.is_human() {
        if result.dry_run {
            output.info(format!(
                "Dry run: {} actions planned, none applied",
                result.actions_planned
            ));
            for action in &result.actions {
                output.detail(action.to_string());
            }
        }
        for error in &result.errors {
            output.warn(error);
        }
        output.success(format!(
            "Sync completed: {} pairs, {} applied, {} failed in {:?}",
            result.pairs_processed, result.actions_applied, result.actions_failed, result.duration
        ));
    } else {
        output.json(&json!({
            "success": result.actions_failed == 0 && result.errors.is_empty(),
            "dry_run": result.dry_run,
            "servers_fetched": result.servers_fetched,
            "pairs_processed": result.pairs_processed,
            "actions_planned": result.actions_planned,
            "actions_applied": result.actions_applied,
            "actions_failed": result.actions_failed,
            "actions": serde_json::to_value(&result.actions)?,
            "errors": result.errors,
            "duration_seconds": result.duration.as_secs_f64(),
        }));
    }

    Ok(())
}
