//! # Demand-accounted streaming for Rust
//!
//! This crate implements a pull/push hybrid protocol: a subscriber declares
//! how many items it can accept, a session drains at most that many buffered
//! items in response, and completion, failure and cancellation propagate
//! deterministically through chained stages.
//!
//! ## Core Concepts
//!
//! - **Demand**: a finite count or unbounded; additive across requests
//! - **Source**: a publisher over a fixed sequence; each subscription drains
//!   a private copy
//! - **Transform**: a stage that subscribes upstream, maps each item into
//!   zero or more outputs and republishes them under its own demand loop
//! - **Sink**: a terminal subscriber
//!
//! Delivery is synchronous and single-threaded. A subscriber may request more
//! demand from inside `on_next`; the drain loop on the stack absorbs it
//! instead of recursing.
//!
//! ## Example
//!
//! ```rust
//! use demandweld::prelude::*;
//!
//! let sink = CollectSink::new();
//! BufferedSource::from("ab")
//!     .transform(|c: char| {
//!         let upper = c.to_ascii_uppercase();
//!         vec![upper, upper]
//!     })
//!     .subscribe(sink.clone());
//!
//! assert_eq!(sink.items(), vec!['A', 'A', 'B', 'B']);
//! assert!(sink.completion().unwrap().is_finished());
//! ```

pub mod core;
pub mod pipeline;
pub mod processors;
pub mod sinks;
pub mod sources;

// Re-export commonly used items
pub mod prelude {
    pub use crate::core::{
        Completion, Demand, Error, Publisher, Result, Subscriber, Subscription, SubscriptionRef,
    };
    pub use crate::pipeline::{Pipeline, PipelineConfig, SubscriberStream};
    pub use crate::processors::combinators::PublisherExt;
    pub use crate::processors::{Transform, TransformConfig};
    pub use crate::sinks::{CollectSink, CountSink, FnSink, StepSink, TracingSink};
    pub use crate::sources::BufferedSource;
}

// Re-export main error type
pub use crate::core::{Error, Result};

#[cfg(feature = "metrics")]
pub mod metrics;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
