use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use watched_sync_config::{default_scheduler_config, Config, PathManager, SchedulerConfig};
use watched_sync_core::SyncOrchestrator;

/// Cron-driven sync cycles over one long-lived orchestrator
///
/// The orchestrator sits behind a mutex, so a cycle that overruns its slot delays the
/// next one instead of racing it on the viewed-date cache.
pub struct Scheduler {
    scheduler: JobScheduler,
    orchestrator: Arc<Mutex<SyncOrchestrator>>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub async fn new(orchestrator: SyncOrchestrator, config: SchedulerConfig) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler,
            orchestrator: Arc::new(Mutex::new(orchestrator)),
            config,
        })
    }

    /// Run until ctrl-c
    pub async fn start(&mut self) -> Result<()> {
        if self.config.run_on_startup {
            info!(operation = "scheduler_startup", "Running initial sync on startup");
            run_cycle(&self.orchestrator, "startup").await;
        }

        let orchestrator = self.orchestrator.clone();
        let job = Job::new_async(self.config.schedule.as_str(), move |_uuid, _scheduler| {
            let orchestrator = orchestrator.clone();
            Box::pin(async move {
                run_cycle(&orchestrator, "scheduled").await;
            })
        })
        .map_err(|e| eyre!("Invalid schedule '{}': {}", self.config.schedule, e))?;

        self.scheduler.add(job).await?;
        self.scheduler.start().await?;
        info!(
            operation = "scheduler_started",
            schedule = %self.config.schedule,
            "Scheduler started"
        );

        tokio::signal::ctrl_c().await?;
        info!(operation = "scheduler_shutdown", "Shutting down scheduler");
        self.scheduler.shutdown().await?;
        Ok(())
    }
}

async fn run_cycle(orchestrator: &Mutex<SyncOrchestrator>, trigger: &str) {
    let mut orchestrator = orchestrator.lock().await;
    match orchestrator.run_cycle().await {
        Ok(result) => {
            info!(
                operation = "scheduled_sync_complete",
                trigger = trigger,
                applied = result.actions_applied,
                failed = result.actions_failed,
                duration_ms = result.duration.as_millis() as u64,
                "Sync cycle completed"
            );
        }
        Err(e) => {
            error!(
                operation = "scheduled_sync_error",
                trigger = trigger,
                error = %format!("{:#}", e),
                "Sync cycle failed"
            );
        }
    }
}

pub async fn run_daemon(
    config: Config,
    paths: &PathManager,
    schedule_override: Option<String>,
    no_startup_sync: bool,
    output: &Output,
) -> Result<()> {
    let from_file = config.scheduler.clone().unwrap_or_else(default_scheduler_config);
    let scheduler_config = SchedulerConfig {
        schedule: schedule_override.unwrap_or(from_file.schedule),
        run_on_startup: from_file.run_on_startup && !no_startup_sync,
    };

    let orchestrator = super::build_orchestrator(&config, paths)?;
    output.info(format!(
        "Watching {} servers on schedule '{}'{}",
        orchestrator.server_names().len(),
        scheduler_config.schedule,
        if config.sync.dryrun { " (dry run)" } else { "" }
    ));

    let mut scheduler = Scheduler::new(orchestrator, scheduler_config)
        .await
        .map_err(|e| eyre!("Failed to create scheduler: {}", e))?;
    scheduler.start().await
}
