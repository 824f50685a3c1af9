//! Periodic sweep task.

use crate::core::service::SuggestionService;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Spawns the background loop calling [`SuggestionService::tick`] every
/// `every`. Missed ticks are skipped rather than bunched up.
pub fn spawn_scheduler(service: Arc<SuggestionService>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Sweep scheduler started (every {:?})", every);
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let report = service.tick().await;
            if report.escalated + report.retired + report.resolved + report.failed > 0 {
                info!(
                    "Sweep: {} checked, {} escalated, {} retired, {} resolved, {} failed",
                    report.checked,
                    report.escalated,
                    report.retired,
                    report.resolved,
                    report.failed
                );
            } else {
                debug!("Sweep checked {} suggestions", report.checked);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::suggestion::Stage;
    use crate::errors::Result;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_scheduler_escalates_without_reaction_events() -> Result<()> {
        let harness = TestHarness::new(&[10]).await?;
        let id = harness.submit().await?;
        harness.upvote(id, &[100, 101]);

        let handle = spawn_scheduler(Arc::clone(&harness.service), Duration::from_millis(10));
        for _ in 0..50 {
            if harness.registry.get(id).await.unwrap().stage == Stage::StaffReview {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert_eq!(
            harness.registry.get(id).await.unwrap().stage,
            Stage::StaffReview
        );
        assert_eq!(harness.platform.posts_in(STAFF_CHANNEL).len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_scheduler_survives_failing_sweeps() -> Result<()> {
        let harness = TestHarness::new(&[10]).await?;
        let id = harness.submit().await?;
        harness.upvote(id, &[100, 101]);
        harness.platform.fail_next_posts(3);

        let handle = spawn_scheduler(Arc::clone(&harness.service), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_finished());
        handle.abort();

        // The first failure halted the suggestion; later sweeps leave it alone
        let suggestion = harness.registry.get(id).await.unwrap();
        assert!(suggestion.halted);
        assert!(harness.platform.posts_in(STAFF_CHANNEL).is_empty());
        Ok(())
    }
}
