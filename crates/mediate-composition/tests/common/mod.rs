//! Shared fixtures for the dispatch integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mediate_composition::prelude::*;

/// Install a test subscriber once per binary; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Ordered log shared by handlers and behaviors under test
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// Shared invocation counter
#[derive(Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Add {
    pub value: i32,
}
impl Request<i32> for Add {}

/// Fire-and-forget request
pub struct Audit {
    pub entry: &'static str,
}
impl Request for Audit {}

#[derive(Debug, thiserror::Error)]
#[error("attempted to divide by zero")]
pub struct DivideByZero;

/// `value + 1`, logging "handler" and counting calls
#[derive(Clone, Default)]
pub struct AddOne {
    pub trace: Trace,
    pub calls: Calls,
}

#[async_trait]
impl RequestHandler<Add, i32> for AddOne {
    async fn handle(&self, request: &Add, _token: &CancelHandle) -> MediateResult<i32> {
        self.calls.bump();
        self.trace.push("handler");
        Ok(request.value + 1)
    }
}

/// Always fails with [`DivideByZero`]
#[derive(Clone, Default)]
pub struct Divide {
    pub calls: Calls,
}

#[async_trait]
impl RequestHandler<Add, i32> for Divide {
    async fn handle(&self, _request: &Add, _token: &CancelHandle) -> MediateResult<i32> {
        self.calls.bump();
        Err(MediateError::handler(DivideByZero))
    }
}

pub struct AuditHandler {
    pub trace: Trace,
}

#[async_trait]
impl RequestHandler<Audit> for AuditHandler {
    async fn handle(&self, request: &Audit, _token: &CancelHandle) -> MediateResult<()> {
        self.trace.push(request.entry);
        Ok(())
    }
}

/// Logs `<label>:enter` and `<label>:exit` around the rest of the pipeline
pub struct Recorder {
    pub label: String,
    pub trace: Trace,
}

impl Recorder {
    pub fn new(label: impl Into<String>, trace: &Trace) -> Self {
        Self {
            label: label.into(),
            trace: trace.clone(),
        }
    }
}

#[async_trait]
impl<R, T> PipelineBehavior<R, T> for Recorder
where
    R: Request<T>,
    T: Send + 'static,
{
    async fn handle(&self, _request: &R, next: Next<'_, T>, _token: &CancelHandle) -> MediateResult<T> {
        self.trace.push(format!("{}:enter", self.label));
        let result = next.run().await;
        self.trace.push(format!("{}:exit", self.label));
        result
    }
}

/// Logs "before" and "after" around the rest of the pipeline
pub struct BeforeAfter {
    pub trace: Trace,
}

#[async_trait]
impl PipelineBehavior<Add, i32> for BeforeAfter {
    async fn handle(&self, _request: &Add, next: Next<'_, i32>, _token: &CancelHandle) -> MediateResult<i32> {
        self.trace.push("before");
        let response = next.run().await?;
        self.trace.push("after");
        Ok(response)
    }
}

pub fn add(value: i32) -> Option<SharedRequest<i32>> {
    Some(share(Add { value }))
}

/// Mediator rooted at `registry`
pub fn mediator_for(registry: &ServiceRegistry) -> Mediator {
    Mediator::new(Arc::new(registry.clone()))
}
