//! Event sinks for pipeline and group lifecycle reporting.
//!
//! Composers never hold a sink of their own. A concurrent group reports to
//! whichever sink is current for the invocation it runs in: the one scoped by
//! the pipeline driver with [`scoped`], or else the global default.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;

static GLOBAL_EVENT_SINK: RwLock<Option<Arc<dyn EventSink>>> = RwLock::new(None);

tokio::task_local! {
    static INVOCATION_SINK: Arc<dyn EventSink>;
}

/// Sets the global default event sink.
pub fn set_event_sink(sink: Arc<dyn EventSink>) {
    *GLOBAL_EVENT_SINK.write() = Some(sink);
}

/// Clears the global default event sink.
pub fn clear_event_sink() {
    *GLOBAL_EVENT_SINK.write() = None;
}

/// Gets the global default event sink.
///
/// Returns a `NoOpEventSink` if no sink is set.
pub fn get_event_sink() -> Arc<dyn EventSink> {
    GLOBAL_EVENT_SINK
        .read()
        .clone()
        .unwrap_or_else(|| Arc::new(NoOpEventSink))
}

/// Runs `fut` with `sink` as the current sink.
pub async fn scoped<F: Future>(sink: Arc<dyn EventSink>, fut: F) -> F::Output {
    INVOCATION_SINK.scope(sink, fut).await
}

/// Returns the sink scoped for the running invocation, falling back to the
/// global default.
pub fn current_event_sink() -> Arc<dyn EventSink> {
    INVOCATION_SINK
        .try_with(Arc::clone)
        .unwrap_or_else(|_| get_event_sink())
}
