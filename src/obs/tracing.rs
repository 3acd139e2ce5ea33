// self
use crate::{
	_prelude::*,
	obs::{self, OpKind, OpOutcome},
};

/// Span around one token, limiter, handshake, or collector operation.
///
/// Without the `tracing` feature only the operation kind is kept, so outcomes still reach the
/// metrics recorder.
#[derive(Clone, Debug)]
pub struct OpSpan {
	kind: OpKind,
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Opens a span for `kind` at call site `stage`; its `outcome` field starts empty.
	pub fn new(kind: OpKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::debug_span!(
				"authgate.op",
				op = kind.as_str(),
				stage,
				outcome = tracing::field::Empty
			);

			Self { kind, span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = stage;

			Self { kind }
		}
	}

	/// Enters the span for a synchronous section.
	pub fn entered(self) -> OpSpanGuard {
		OpSpanGuard {
			kind: self.kind,
			#[cfg(feature = "tracing")]
			guard: self.span.entered(),
		}
	}

	/// Runs `fut` inside the span without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> impl Future<Output = Fut::Output> + use<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			tracing::Instrument::instrument(fut, self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// RAII guard returned by [`OpSpan::entered`]; the span closes when it drops.
pub struct OpSpanGuard {
	kind: OpKind,
	#[cfg(feature = "tracing")]
	guard: tracing::span::EnteredSpan,
}
impl OpSpanGuard {
	/// Stamps `outcome` on the span and counts it.
	///
	/// [`OpOutcome::Attempt`] is only counted; the span field keeps the final outcome.
	pub fn record(&self, outcome: OpOutcome) {
		#[cfg(feature = "tracing")]
		if outcome != OpOutcome::Attempt {
			self.guard.record("outcome", outcome.as_str());
		}

		obs::record_outcome(self.kind, outcome);
	}
}
impl Debug for OpSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("OpSpanGuard").field(&self.kind).finish()
	}
}
