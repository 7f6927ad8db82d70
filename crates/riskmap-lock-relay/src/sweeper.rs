//! Periodic reclaim of expired locks.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::hub::RelayHandle;

/// Cancellable repeating timer that asks the relay to sweep expired locks.
///
/// Started at boot and stopped at shutdown. A lock can outlive its nominal
/// expiry by up to one interval.
pub struct Sweeper {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Sweeper {
    pub fn start(relay: RelayHandle, interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; the first sweep is one interval in
            ticker.tick().await;

            info!("Sweeper running every {:?}", interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = relay.sweep() {
                            warn!("Sweeper stopping: {}", e);
                            break;
                        }
                    }
                    _ = stop_rx.wait_for(|&stop| stop) => {
                        debug!("Sweeper received stop");
                        break;
                    }
                }
            }
        });

        Self { stop_tx, task }
    }

    /// Stop the timer and wait for its task to finish.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            warn!("Sweeper task ended abnormally: {}", e);
        }
        info!("Sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use riskmap_lock_core::{ClientEvent, ServerEvent};

    use super::*;
    use crate::hub::{spawn_relay, RelayOptions};

    #[tokio::test]
    async fn test_sweeper_reclaims_expired_lock() {
        let (relay, _task) = spawn_relay(RelayOptions {
            lock_duration: Duration::ZERO,
            replay_locks_on_connect: false,
        });
        let (a, mut a_rx) = relay.connect().unwrap();
        relay
            .dispatch(
                a,
                ClientEvent::StartEditing {
                    item_id: "r".to_string(),
                    user_id: "alice".to_string(),
                },
            )
            .unwrap();

        let sweeper = Sweeper::start(relay.clone(), Duration::from_millis(20));

        let event = tokio::time::timeout(Duration::from_secs(2), a_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, ServerEvent::unlocked("r"));

        sweeper.stop().await;

        // Exactly one unlock: later ticks found nothing
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(a_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sweeper_exits_when_relay_stops() {
        let (relay, task) = spawn_relay(RelayOptions {
            lock_duration: Duration::from_secs(30),
            replay_locks_on_connect: false,
        });
        let sweeper = Sweeper::start(relay.clone(), Duration::from_millis(10));

        relay.shutdown().unwrap();
        task.await.unwrap();

        // The next tick fails to reach the relay and ends the loop on its own
        tokio::time::timeout(Duration::from_secs(2), sweeper.stop())
            .await
            .unwrap();
    }
}
