//! Cancellable interval loops for in-memory housekeeping.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Run `tick` every `period` until `cancel` fires or `tick` returns `false`.
///
/// The first run happens one full period after spawning.
pub fn spawn<F>(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> bool + Send + 'static,
{
    tokio::spawn(async move {
        tracing::info!(task = name, interval_secs = period.as_secs(), "Periodic task started");

        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(task = name, "Periodic task stopping");
                    break;
                }
                _ = interval.tick() => {
                    if !tick() {
                        tracing::debug!(task = name, "Periodic task owner gone, stopping");
                        break;
                    }
                }
            }
        }
    })
}
