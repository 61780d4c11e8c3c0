//! Fixed-cadence background refresh loop.

// crates.io
use tokio::{
	task::JoinHandle,
	time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	http::RefreshTransport,
	obs::RefreshTrigger,
	refresh::RefreshCoordinator,
};

/// Spawns [`run_refresh_loop`] on the current tokio runtime.
pub fn spawn_refresh_loop<C>(
	coordinator: Arc<RefreshCoordinator<C>>,
	shutdown: CancellationToken,
) -> JoinHandle<()>
where
	C: ?Sized + RefreshTransport,
{
	tokio::spawn(run_refresh_loop(coordinator, shutdown))
}

/// Refreshes immediately, then once per `refresh_interval`, until `shutdown` is cancelled.
///
/// Ticks use the same path as manual triggers, so a tick landing on an in-flight refresh is
/// skipped. Failures are logged by the coordinator and never stop the loop. Cancellation is only
/// observed between ticks; a refresh already running completes first.
pub async fn run_refresh_loop<C>(coordinator: Arc<RefreshCoordinator<C>>, shutdown: CancellationToken)
where
	C: ?Sized + RefreshTransport,
{
	let period = coordinator.config.refresh_interval.unsigned_abs();
	let mut ticker = time::interval(period);

	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
	tracing::info!(interval_secs = period.as_secs(), "Scheduled token refresh started.");

	loop {
		tokio::select! {
			_ = shutdown.cancelled() => break,
			_ = ticker.tick() => {},
		}

		let _ = coordinator.refresh_as(RefreshTrigger::Schedule).await;
	}

	tracing::info!("Scheduled token refresh stopped.");
}
