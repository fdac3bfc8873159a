//! Mock processor for testing.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use crate::processor::{
    MatchRule, OutputSink, ProcessOutput, ProcessRequest, Processor, ProcessorError,
};

/// Mock implementation of the Processor trait.
///
/// By default it routes every `mock_` operation to itself and copies the
/// input to `<base>_mock.out` in the output container. Behaviour can be
/// scripted:
/// - `returning_empty()` succeeds without any output
/// - `failing_with(err)` fails the next call with `err`
/// - `with_delay(d)` sleeps before processing
///
/// # Example
///
/// ```rust,ignore
/// use transmute_core::testing::MockProcessor;
///
/// let processor = Arc::new(MockProcessor::new("mock"));
/// let registry = ProcessorRegistry::new().with(processor.clone());
/// // ... run a job for "mock_op" ...
/// assert_eq!(processor.calls(), vec!["mock_op".to_string()]);
/// ```
pub struct MockProcessor {
    name: String,
    routes: Vec<MatchRule>,
    operations: Vec<&'static str>,
    empty: bool,
    delay: Option<Duration>,
    next_error: Mutex<Option<ProcessorError>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockProcessor {
    /// Create a new mock processor routed on the `mock_` prefix.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            routes: vec![MatchRule::prefix("mock_")],
            operations: Vec::new(),
            empty: false,
            delay: None,
            next_error: Mutex::new(None),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Replace the routing rules.
    pub fn with_routes(mut self, routes: Vec<MatchRule>) -> Self {
        self.routes = routes;
        self
    }

    /// Declare the exact operations this processor implements.
    pub fn with_operations(mut self, operations: Vec<&'static str>) -> Self {
        self.operations = operations;
        self
    }

    /// Succeed without producing any output.
    pub fn returning_empty(mut self) -> Self {
        self.empty = true;
        self
    }

    /// Fail the next call with `error`.
    pub fn failing_with(self, error: ProcessorError) -> Self {
        *self.next_error.lock().unwrap() = Some(error);
        self
    }

    /// Sleep before processing.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Operations received so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl Processor for MockProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn routes(&self) -> Vec<MatchRule> {
        self.routes.clone()
    }

    fn operations(&self) -> &[&'static str] {
        &self.operations
    }

    async fn process(
        &self,
        mut request: ProcessRequest,
        sink: &OutputSink,
    ) -> Result<ProcessOutput, ProcessorError> {
        self.calls.write().unwrap().push(request.operation.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Err(error);
        }
        if self.empty {
            return Ok(ProcessOutput { outputs: Vec::new() });
        }

        let data = request.read_input().await?;
        let locator = sink
            .put_bytes(&format!("{}_mock.out", request.base_name), data)
            .await?;
        Ok(ProcessOutput::single(locator))
    }
}
