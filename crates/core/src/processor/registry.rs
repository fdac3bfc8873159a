//! Operation routing.

use std::sync::Arc;
use tracing::{debug, warn};

use super::config::ToolsConfig;
use super::error::ProcessorError;
use super::image::ImageProcessor;
use super::pdf::PdfProcessor;
use super::sink::OutputSink;
use super::slideshow::SlideshowProcessor;
use super::traits::Processor;
use super::types::{MatchRule, ProcessOutput, ProcessRequest};
use super::video::VideoProcessor;

/// A registered rule and the processor it routes to.
#[derive(Clone)]
struct Route {
    rule: MatchRule,
    processor: Arc<dyn Processor>,
}

/// Summary of a route, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RouteInfo {
    pub rule: String,
    pub processor: String,
}

/// Maps operation names to processors.
///
/// An exact rule wins over any prefix; among prefixes the longest wins.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    routes: Vec<Route>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the image, video, PDF and slideshow processors.
    pub fn with_defaults(tools: &ToolsConfig) -> Self {
        Self::new()
            .with(Arc::new(ImageProcessor::new()))
            .with(Arc::new(VideoProcessor::new(tools.clone())))
            .with(Arc::new(PdfProcessor::new(tools.clone())))
            .with(Arc::new(SlideshowProcessor::new(tools.clone())))
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, processor: Arc<dyn Processor>) -> Self {
        self.register(processor);
        self
    }

    /// Registers every rule the processor declares.
    pub fn register(&mut self, processor: Arc<dyn Processor>) {
        for rule in processor.routes() {
            self.register_rule(rule, Arc::clone(&processor));
        }
    }

    /// Registers a single rule. A later registration of the same rule
    /// replaces the earlier one.
    pub fn register_rule(&mut self, rule: MatchRule, processor: Arc<dyn Processor>) {
        if let Some(existing) = self.routes.iter_mut().find(|r| r.rule == rule) {
            warn!(
                rule = %rule,
                previous = %existing.processor.name(),
                processor = %processor.name(),
                "Replacing processor route"
            );
            existing.processor = processor;
            return;
        }
        debug!(rule = %rule, processor = %processor.name(), "Registered processor route");
        self.routes.push(Route { rule, processor });
    }

    /// Finds the processor for an operation.
    pub fn resolve(&self, operation: &str) -> Result<Arc<dyn Processor>, ProcessorError> {
        self.routes
            .iter()
            .filter_map(|route| route.rule.score(operation).map(|score| (score, route)))
            .max_by_key(|(score, _)| *score)
            .map(|(_, route)| Arc::clone(&route.processor))
            .ok_or_else(|| ProcessorError::unknown_operation(operation))
    }

    /// Whether `operation` routes to a processor that implements it by name.
    pub fn is_known_operation(&self, operation: &str) -> bool {
        self.resolve(operation)
            .map(|processor| processor.operations().iter().any(|op| *op == operation))
            .unwrap_or(false)
    }

    /// Resolves the request's operation and runs it.
    pub async fn handle(
        &self,
        request: ProcessRequest,
        sink: &OutputSink,
    ) -> Result<ProcessOutput, ProcessorError> {
        let processor = self.resolve(&request.operation)?;
        debug!(
            operation = %request.operation,
            processor = %processor.name(),
            "Dispatching to processor"
        );
        processor.process(request, sink).await
    }

    /// Lists registered routes in registration order.
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.routes
            .iter()
            .map(|r| RouteInfo {
                rule: r.rule.to_string(),
                processor: r.processor.name().to_string(),
            })
            .collect()
    }

    /// Validates every distinct processor concurrently, returning the failures.
    pub async fn validate_all(&self) -> Vec<(String, ProcessorError)> {
        let mut distinct: Vec<&Arc<dyn Processor>> = Vec::new();
        for route in &self.routes {
            if !distinct.iter().any(|p| p.name() == route.processor.name()) {
                distinct.push(&route.processor);
            }
        }

        let checks = distinct.into_iter().map(|processor| async move {
            processor
                .validate()
                .await
                .err()
                .map(|e| (processor.name().to_string(), e))
        });

        futures::future::join_all(checks)
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
