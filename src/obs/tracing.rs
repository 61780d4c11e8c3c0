// crates.io
use tracing::instrument::Instrumented;
// self
use crate::{_prelude::*, obs::RefreshTrigger};

/// A span builder used by refresh attempts.
#[derive(Clone, Debug)]
pub struct RefreshSpan {
	span: tracing::Span,
}
impl RefreshSpan {
	/// Creates a new span tagged with the provided trigger.
	pub fn new(trigger: RefreshTrigger) -> Self {
		let span = tracing::info_span!("token_relay.refresh", trigger = trigger.as_str());

		Self { span }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	///
	/// Calls the trait method by path so this inherent method stays reachable even where
	/// [`tracing::Instrument`] is imported.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		tracing::Instrument::instrument(fut, self.span.clone())
	}
}
