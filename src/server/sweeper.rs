// src/server/sweeper.rs

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::RetentionPolicy;
use crate::server::Supervisor;

/// Start the background retention sweeper, if the policy evicts anything.
pub fn spawn_sweeper(
    supervisor: Arc<Supervisor>,
    policy: RetentionPolicy,
    stop: CancellationToken,
) -> Option<JoinHandle<()>> {
    let ttl = policy.completed_ttl?;
    debug!(?ttl, interval = ?policy.sweep_interval, "retention sweeper enabled");

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(policy.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {
                    supervisor.sweep_expired(&policy).await;
                }
            }
        }
        debug!("retention sweeper stopped");
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::BrokerConfig;

    #[tokio::test]
    async fn no_ttl_means_no_sweeper() {
        let dir = tempfile::tempdir().unwrap();
        let sup = Arc::new(Supervisor::new(&BrokerConfig::in_dir(dir.path())));
        assert!(spawn_sweeper(sup, RetentionPolicy::default(), CancellationToken::new()).is_none());
    }

    #[tokio::test]
    async fn sweeper_evicts_and_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let sup = Arc::new(Supervisor::new(&BrokerConfig::in_dir(dir.path())));
        let created = sup.create_process("true", &[]).unwrap();

        let policy = RetentionPolicy {
            completed_ttl: Some(Duration::ZERO),
            sweep_interval: Duration::from_millis(10),
            remove_scratch_files: true,
        };
        let stop = CancellationToken::new();
        let handle = spawn_sweeper(Arc::clone(&sup), policy, stop.clone()).unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while sup.get_process(created.pid).is_ok() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        stop.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
