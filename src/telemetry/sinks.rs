use super::events::GovernorEvent;
use futures::future::BoxFuture;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// A telemetry sink that consumes governor events.
pub trait TelemetrySink:
    tower::Service<GovernorEvent, Response = (), Error = Self::SinkError> + Clone + Send + Sync + 'static
{
    /// The error type for this sink.
    type SinkError: std::error::Error + Send + 'static;
}

/// Best-effort emit helper that honors `poll_ready` and swallows errors.
///
/// Telemetry never blocks or fails a governed request: an unready or failing sink loses the event.
pub async fn emit_best_effort<S>(sink: S, event: GovernorEvent)
where
    S: tower::Service<GovernorEvent, Response = ()> + Send + Clone + 'static,
    S::Error: std::error::Error + Send + 'static,
    S::Future: Send + 'static,
{
    use tower::ServiceExt;

    if let Ok(mut ready_sink) = sink.ready_oneshot().await {
        let _ = ready_sink.call(event).await;
    }
}

type EmitFn = dyn Fn(GovernorEvent) -> BoxFuture<'static, ()> + Send + Sync;

/// Type-erased handle to a sink, so policies don't carry the sink type as a parameter.
#[derive(Clone)]
pub struct Emitter {
    emit: Option<Arc<EmitFn>>,
}

impl Emitter {
    pub fn new<S>(sink: S) -> Self
    where
        S: TelemetrySink,
        S::Future: Send + 'static,
    {
        let emit = move |event: GovernorEvent| -> BoxFuture<'static, ()> {
            Box::pin(emit_best_effort(sink.clone(), event))
        };
        Self { emit: Some(Arc::new(emit)) }
    }

    /// An emitter that drops everything without allocating.
    pub fn disabled() -> Self {
        Self { emit: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.emit.is_some()
    }

    pub async fn emit(&self, event: GovernorEvent) {
        if let Some(emit) = &self.emit {
            emit(event).await;
        }
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::disabled()
    }
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter").field("enabled", &self.is_enabled()).finish()
    }
}

/// A no-op telemetry sink that discards all events.
#[derive(Clone, Debug, Default)]
pub struct NullSink;

impl Service<GovernorEvent> for NullSink {
    type Response = ();
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<(), Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _event: GovernorEvent) -> Self::Future {
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for NullSink {
    type SinkError = Infallible;
}

/// A telemetry sink that logs events using the `tracing` crate.
#[derive(Clone, Debug, Default)]
pub struct LogSink;

impl Service<GovernorEvent> for LogSink {
    type Response = ();
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<(), Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: GovernorEvent) -> Self::Future {
        match event.category() {
            Some(category) => tracing::info!(event = %event, category = %category, "governor_event"),
            None => tracing::info!(event = %event, "governor_event"),
        }
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for LogSink {
    type SinkError = Infallible;
}

/// A bounded in-memory sink; oldest events are evicted first.
#[derive(Clone, Debug)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<GovernorEvent>>>,
    capacity: usize,
    evicted: Arc<AtomicU64>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            capacity: capacity.max(1),
            evicted: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn events(&self) -> Vec<GovernorEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<GovernorEvent> for MemorySink {
    type Response = ();
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<(), Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: GovernorEvent) -> Self::Future {
        let mut guard = self.events.lock().unwrap_or_else(|e| e.into_inner());
        if guard.len() >= self.capacity {
            guard.remove(0);
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        guard.push(event);
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for MemorySink {
    type SinkError = Infallible;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use std::time::Duration;

    fn admitted(name: &str) -> GovernorEvent {
        GovernorEvent::Admitted { category: Category::new(name) }
    }

    #[tokio::test]
    async fn memory_sink_evicts_oldest() {
        let sink = MemorySink::with_capacity(2);
        for name in ["a", "b", "c"] {
            emit_best_effort(sink.clone(), admitted(name)).await;
        }
        assert_eq!(sink.events(), vec![admitted("b"), admitted("c")]);
        assert_eq!(sink.evicted(), 1);
    }

    #[tokio::test]
    async fn emitter_forwards_to_sink() {
        let sink = MemorySink::new();
        let emitter = Emitter::new(sink.clone());
        assert!(emitter.is_enabled());
        emitter.emit(GovernorEvent::RetryScheduled { attempt: 1, delay: Duration::from_secs(1) }).await;
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn disabled_emitter_is_silent() {
        let emitter = Emitter::default();
        assert!(!emitter.is_enabled());
        emitter.emit(admitted("x")).await;
    }

    #[tokio::test]
    async fn emit_best_effort_swallows_errors() {
        #[derive(Clone)]
        struct Fails;
        impl tower::Service<GovernorEvent> for Fails {
            type Response = ();
            type Error = std::io::Error;
            type Future = Pin<Box<dyn Future<Output = Result<(), Self::Error>> + Send>>;
            fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
                Poll::Ready(Err(std::io::Error::new(std::io::ErrorKind::Other, "not ready")))
            }
            fn call(&mut self, _req: GovernorEvent) -> Self::Future {
                Box::pin(async { Ok(()) })
            }
        }

        emit_best_effort(Fails, admitted("x")).await;
    }

    #[tokio::test]
    async fn log_sink_accepts_events() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        emit_best_effort(LogSink, admitted("auth")).await;
        emit_best_effort(NullSink, admitted("auth")).await;
    }
}
