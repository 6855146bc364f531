//! Background tasks for the Canvass server.

use canvass_flow::SurveyController;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Starts the idle session eviction task.
///
/// Runs indefinitely, periodically removing call sessions with no webhook
/// activity for the configured idle timeout. Abandoned calls (callee hung up
/// mid-survey, vendor stopped delivering events) would otherwise accumulate
/// in the session table forever.
pub async fn start_session_eviction_task(controller: Arc<SurveyController>, idle_timeout_secs: u64) {
    if idle_timeout_secs == 0 {
        tracing::warn!("session eviction disabled (idle_timeout=0)");
        return;
    }

    // Sweep at half the timeout, bounded to a sane range.
    let interval_secs = (idle_timeout_secs / 2).clamp(1, 60);
    let interval = Duration::from_secs(interval_secs);

    tracing::info!(
        idle_timeout_secs,
        interval_secs,
        "starting idle session eviction task"
    );

    loop {
        sleep(interval).await;

        let evicted = controller.evict_idle(Duration::from_secs(idle_timeout_secs));
        if evicted > 0 {
            tracing::info!(
                count = evicted,
                active = controller.active_calls(),
                "evicted idle call sessions"
            );
        }
    }
}
