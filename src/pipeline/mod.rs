//! Pipeline composition.
//!
//! This module provides a builder that chains a publisher through transform
//! stages and attaches a terminal subscriber, applying one configuration to
//! every stage it creates.

pub mod stream;

use crate::core::{Demand, Error, Publisher, Result, Subscriber};
use crate::processors::{Transform, TransformConfig};
use crate::sinks::CollectSink;

pub use stream::SubscriberStream;

/// Configuration for pipeline construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineConfig {
    /// Demand requested by [`Pipeline::collect`] on subscribe
    pub initial_demand: Demand,
    /// Upstream policy applied to every transform stage added by the builder
    pub transform: TransformConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            initial_demand: Demand::unlimited(),
            transform: TransformConfig::default(),
        }
    }
}

/// A publisher plus the configuration used to extend it.
pub struct Pipeline<P> {
    publisher: P,
    config: PipelineConfig,
}

impl<P: Publisher> Pipeline<P> {
    /// Create a new pipeline rooted at `publisher`
    pub fn new(publisher: P) -> Self {
        Self {
            publisher,
            config: PipelineConfig::default(),
        }
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the demand [`Pipeline::collect`] requests up front
    pub fn initial_demand(mut self, demand: Demand) -> Self {
        self.config.initial_demand = demand;
        self
    }

    /// Set the upstream batch size for subsequent transform stages
    pub fn upstream_batch(mut self, size: usize) -> Self {
        self.config.transform = self.config.transform.upstream_batch(size);
        self
    }

    /// Set the buffered-output high-water mark for subsequent transform stages
    pub fn max_buffered(mut self, limit: usize) -> Self {
        self.config.transform = self.config.transform.max_buffered(limit);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Append a transform stage
    pub fn transform<U, F>(self, mapping: F) -> Pipeline<Transform<P, U>>
    where
        F: Fn(P::Item) -> Vec<U> + 'static,
        U: 'static,
    {
        let config = self.config;
        Pipeline {
            publisher: Transform::new(self.publisher, mapping).with_config(config.transform),
            config,
        }
    }

    /// Append a one-to-one mapping stage
    pub fn map<U, F>(self, f: F) -> Pipeline<Transform<P, U>>
    where
        F: Fn(P::Item) -> U + 'static,
        U: 'static,
    {
        self.transform(move |item| vec![f(item)])
    }

    /// Run the pipeline with a sink
    pub fn sink<S>(self, sink: S)
    where
        S: Subscriber<Item = P::Item> + 'static,
    {
        self.publisher.subscribe(sink);
    }

    /// Run the pipeline and gather every item.
    ///
    /// Fails with the session's error, or with [`Error::Custom`] when the
    /// initial demand ran out before the pipeline completed.
    pub fn collect(self) -> Result<Vec<P::Item>>
    where
        P::Item: Clone,
    {
        let sink = CollectSink::with_demand(self.config.initial_demand);
        self.publisher.subscribe(sink.clone());

        match sink.completion() {
            Some(completion) => completion.into_result().map(|()| sink.items()),
            None => {
                if let Some(subscription) = sink.subscription() {
                    subscription.cancel();
                }
                Err(Error::custom(format!(
                    "pipeline stalled after {} items with demand {}",
                    sink.delivered(),
                    self.config.initial_demand
                )))
            }
        }
    }

    /// Consume the pipeline as an async stream
    pub fn into_stream(self) -> SubscriberStream<P::Item> {
        SubscriberStream::new(&self.publisher)
    }

    pub fn into_inner(self) -> P {
        self.publisher
    }
}

impl<P: Publisher> Publisher for Pipeline<P> {
    type Item = P::Item;

    fn subscribe<S>(&self, subscriber: S)
    where
        S: Subscriber<Item = Self::Item> + 'static,
    {
        self.publisher.subscribe(subscriber);
    }
}
