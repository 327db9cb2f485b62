use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lyra_db::repositories::CheckpointRepo;
use lyra_events::EventBus;
use lyra_recovery::{RecoveryConfig, RecoveryCoordinator, RecoveryOutcome};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lyra_recovery=debug,lyra_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = RecoveryConfig::from_env();
    tracing::info!(
        database = %config.database_path.display(),
        stale_max_age_hours = config.stale_max_age_hours,
        max_failures = config.max_failures,
        enabled = config.enabled,
        "Loaded recovery configuration"
    );

    // --- Database ---
    let pool = lyra_db::create_pool(&config.database_path)
        .await
        .context("Failed to open journal database")?;
    tracing::info!("Database connection pool created");

    lyra_db::health_check(&pool)
        .await
        .context("Database health check failed")?;

    lyra_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let mut events = event_bus.subscribe();

    // --- Recovery ---
    let coordinator = RecoveryCoordinator::new(pool.clone(), Arc::clone(&event_bus), config);
    let outcome = coordinator
        .spawn()
        .await
        .context("Recovery supervisor task failed")?;

    match &outcome {
        RecoveryOutcome::Completed(summary) => {
            tracing::info!(
                recovered = summary.recovered(),
                failed = summary.failed,
                dead_lettered = summary.dead_lettered,
                stale_cleared = summary.stale_cleared,
                "Startup recovery completed"
            );
        }
        RecoveryOutcome::Disabled => tracing::info!("Startup recovery skipped"),
        RecoveryOutcome::Aborted { reason } => {
            tracing::warn!(%reason, "Startup recovery aborted, continuing without it");
        }
    }

    while let Ok(event) = events.try_recv() {
        tracing::info!(
            event_type = %event.event_type,
            payload = %event.payload,
            "Recovery event"
        );
    }

    let health = CheckpointRepo::health_summary(&pool)
        .await
        .context("Failed to read journal health")?;
    tracing::info!(
        recovered = health.recovered,
        dead_letter = health.dead_letter,
        pending = health.pending,
        last_run_at = ?health.last_run_at,
        "Checkpoint journal health"
    );

    Ok(())
}
