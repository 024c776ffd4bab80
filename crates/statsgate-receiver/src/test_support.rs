//! Shared fakes for unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use statsgate_core::domain::{Event, LexError, Metric};
use statsgate_core::ports::{DispatchError, IDispatchGateway, ILineLexer, Parsed};
use tokio_util::sync::CancellationToken;

/// Wraps a lexer and counts how often it is invoked
pub(crate) struct CountingLexer<L> {
    inner: L,
    pub calls: AtomicUsize,
}

impl<L> CountingLexer<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }
}

impl<L: ILineLexer> ILineLexer for CountingLexer<L> {
    fn lex(&self, line: &[u8], namespace: &str) -> Result<Option<Parsed>, LexError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.lex(line, namespace)
    }
}

type ErrorFactory = Box<dyn Fn() -> DispatchError + Send + Sync>;

/// Records every dispatched unit, optionally failing on the n-th call
pub(crate) struct RecordingGateway {
    records: Mutex<Vec<Parsed>>,
    calls: AtomicUsize,
    fail_at: Option<(usize, ErrorFactory)>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail_at: None,
        }
    }

    /// Fails the `n`-th dispatch call (1-based) with the error from `make_err`
    pub fn failing_at(
        n: usize,
        make_err: impl Fn() -> DispatchError + Send + Sync + 'static,
    ) -> Self {
        Self {
            fail_at: Some((n, Box::new(make_err))),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn metrics(&self) -> Vec<Metric> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter_map(|p| match p {
                Parsed::Metric(m) => Some(m.clone()),
                Parsed::Event(_) => None,
            })
            .collect()
    }

    pub fn events(&self) -> Vec<Event> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter_map(|p| match p {
                Parsed::Event(e) => Some(e.clone()),
                Parsed::Metric(_) => None,
            })
            .collect()
    }

    /// Metric names and `event:<title>` entries in dispatch order
    pub fn order(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|p| match p {
                Parsed::Metric(m) => m.name.clone(),
                Parsed::Event(e) => format!("event:{}", e.title),
            })
            .collect()
    }

    fn record(&self, cancel: &CancellationToken, parsed: Parsed) -> Result<(), DispatchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if cancel.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }
        self.records.lock().unwrap().push(parsed);
        match &self.fail_at {
            Some((at, make_err)) if *at == n => Err(make_err()),
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl IDispatchGateway for RecordingGateway {
    async fn dispatch_metric(
        &self,
        cancel: &CancellationToken,
        metric: Metric,
    ) -> Result<(), DispatchError> {
        self.record(cancel, Parsed::Metric(metric))
    }

    async fn dispatch_event(
        &self,
        cancel: &CancellationToken,
        event: Event,
    ) -> Result<(), DispatchError> {
        self.record(cancel, Parsed::Event(event))
    }
}
