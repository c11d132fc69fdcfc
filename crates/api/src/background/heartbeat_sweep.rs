//! Periodic offline sweep.
//!
//! Every heartbeat period, nodes silent for longer than the offline timeout
//! are marked `offline` and the issues they were processing are terminated
//! with "node unresponsive".

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use issuefleet_db::repositories::NodeRepo;

/// Run the sweep loop until `cancel` is triggered.
pub async fn run(
    pool: PgPool,
    period: Duration,
    offline_timeout: chrono::Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_secs = period.as_secs(),
        offline_timeout_secs = offline_timeout.num_seconds(),
        "Heartbeat sweep started"
    );

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Heartbeat sweep stopping");
                break;
            }
            _ = interval.tick() => {
                match NodeRepo::sweep_stale(&pool, offline_timeout).await {
                    Ok(outcome) => {
                        for node_id in &outcome.offline_node_ids {
                            tracing::warn!(node_id, "Node marked offline after missed heartbeats");
                        }
                        for issue_id in &outcome.terminated_issue_ids {
                            tracing::warn!(issue_id, "Issue terminated: node unresponsive");
                        }
                        if outcome.offline_node_ids.is_empty() {
                            tracing::debug!("Heartbeat sweep: all nodes live");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Heartbeat sweep failed");
                    }
                }
            }
        }
    }
}
