//! Observability helpers for refresh attempts.
//!
//! # Feature Flags
//!
//! - Every attempt runs inside a `token_relay.refresh` span carrying the `trigger` field.
//! - Enable `metrics` to increment the `token_relay_refresh_total` counter for every
//!   attempt/success/failure/skip, labeled by `trigger` + `outcome`.

mod tracing;

pub use tracing::*;

// self
use crate::_prelude::*;

/// What caused a refresh attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshTrigger {
	/// Periodic scheduler tick, including the bootstrap tick at startup.
	Schedule,
	/// Explicit request from a caller.
	Manual,
}
impl RefreshTrigger {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshTrigger::Schedule => "schedule",
			RefreshTrigger::Manual => "manual",
		}
	}
}
impl Display for RefreshTrigger {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// A refresh protocol execution started.
	Attempt,
	/// A new token was persisted.
	Success,
	/// The attempt failed and the error was returned to the caller.
	Failure,
	/// Another refresh was already in flight, so this trigger did nothing.
	Skipped,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
			FlowOutcome::Skipped => "skipped",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Name of the refresh counter emitted with the `metrics` feature.
pub const REFRESH_COUNTER: &str = "token_relay_refresh_total";

/// Bumps [`REFRESH_COUNTER`] for `trigger` + `outcome`; a no-op without the `metrics` feature or
/// an installed recorder.
#[cfg(feature = "metrics")]
pub fn record_refresh_outcome(trigger: RefreshTrigger, outcome: FlowOutcome) {
	metrics::counter!(REFRESH_COUNTER, "trigger" => trigger.as_str(), "outcome" => outcome.as_str())
		.increment(1);
}

/// Bumps [`REFRESH_COUNTER`] for `trigger` + `outcome`; a no-op without the `metrics` feature or
/// an installed recorder.
#[cfg(not(feature = "metrics"))]
pub fn record_refresh_outcome(_trigger: RefreshTrigger, _outcome: FlowOutcome) {}
