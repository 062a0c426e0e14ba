//! Transform stages.
//!
//! A [`Transform`] is a publisher built on top of another publisher. Each
//! subscription creates a [`TransformSession`] that plays two roles over one
//! shared state:
//!
//! - towards its upstream it is a subscriber, receiving items, mapping each
//!   into zero or more outputs and buffering them;
//! - towards its downstream it is the subscription, draining that buffer
//!   under the same demand discipline as a source and forwarding its own
//!   appetite upstream.

pub mod combinators;

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::core::outlet::Outlet;
use crate::core::{
    Completion, Demand, Error, Publisher, Subscriber, Subscription, SubscriptionRef,
};

/// A per-item mapping producing zero or more outputs.
pub type Mapping<T, U> = Rc<dyn Fn(T) -> Vec<U>>;

/// Upstream demand policy of a transform stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransformConfig {
    /// Items asked for by each upstream request
    pub upstream_batch: usize,
    /// Stop asking upstream while this many outputs are buffered
    pub max_buffered: Option<usize>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            upstream_batch: 1,
            max_buffered: None,
        }
    }
}

impl TransformConfig {
    /// Set the upstream batch size. Zero is treated as one.
    pub fn upstream_batch(mut self, size: usize) -> Self {
        self.upstream_batch = size.max(1);
        self
    }

    /// Set the buffered-output high-water mark
    pub fn max_buffered(mut self, limit: usize) -> Self {
        self.max_buffered = Some(limit);
        self
    }
}

/// A publisher that maps every item of `upstream` through a mapping.
pub struct Transform<P: Publisher, U> {
    upstream: P,
    mapping: Mapping<P::Item, U>,
    config: TransformConfig,
}

impl<P: Publisher, U: 'static> Transform<P, U> {
    /// Create a new transform over `upstream`
    pub fn new<F>(upstream: P, mapping: F) -> Self
    where
        F: Fn(P::Item) -> Vec<U> + 'static,
    {
        Self {
            upstream,
            mapping: Rc::new(mapping),
            config: TransformConfig::default(),
        }
    }

    /// Replace the demand policy
    pub fn with_config(mut self, config: TransformConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the upstream batch size
    pub fn upstream_batch(mut self, size: usize) -> Self {
        self.config = self.config.upstream_batch(size);
        self
    }

    /// Set the buffered-output high-water mark
    pub fn max_buffered(mut self, limit: usize) -> Self {
        self.config = self.config.max_buffered(limit);
        self
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }
}

impl<P: Publisher + Clone, U> Clone for Transform<P, U> {
    fn clone(&self) -> Self {
        Self {
            upstream: self.upstream.clone(),
            mapping: self.mapping.clone(),
            config: self.config,
        }
    }
}

impl<P: Publisher, U: 'static> Publisher for Transform<P, U> {
    type Item = U;

    fn subscribe<S>(&self, subscriber: S)
    where
        S: Subscriber<Item = U> + 'static,
    {
        let session = Rc::new(TransformSession::new(
            self.mapping.clone(),
            self.config,
            Box::new(subscriber),
        ));
        self.upstream.subscribe(UpstreamLink { session });
    }
}

struct Link {
    upstream: Option<SubscriptionRef>,
    outstanding: usize,
    upstream_done: bool,
}

/// The live state of one subscription to a [`Transform`].
pub struct TransformSession<T, U> {
    outlet: Outlet<U>,
    mapping: Mapping<T, U>,
    config: TransformConfig,
    link: RefCell<Link>,
    // Held until upstream hands us its subscription.
    pending: RefCell<Option<Box<dyn Subscriber<Item = U>>>>,
}

impl<T: 'static, U: 'static> TransformSession<T, U> {
    fn new(
        mapping: Mapping<T, U>,
        config: TransformConfig,
        downstream: Box<dyn Subscriber<Item = U>>,
    ) -> Self {
        Self {
            outlet: Outlet::new("transform", Default::default()),
            mapping,
            config,
            link: RefCell::new(Link {
                upstream: None,
                outstanding: 0,
                upstream_done: false,
            }),
            pending: RefCell::new(Some(downstream)),
        }
    }

    /// Output items buffered but not yet delivered
    pub fn buffered(&self) -> usize {
        self.outlet.buffered()
    }

    pub fn is_terminal(&self) -> bool {
        self.outlet.is_terminal()
    }

    fn connect(self: &Rc<Self>, upstream: SubscriptionRef) {
        if self.outlet.is_terminal() {
            upstream.cancel();
            return;
        }
        // Stored before the downstream sees us, so a cancel issued from its
        // on_subscribe still reaches upstream.
        self.link.borrow_mut().upstream = Some(upstream);

        let downstream = self.pending.borrow_mut().take();
        if let Some(downstream) = downstream {
            debug!("transform session connected");
            self.outlet.attach(downstream, self.clone());
        }
        self.prime_upstream();
    }

    fn receive(&self, chunk: Vec<T>) {
        if self.outlet.is_terminal() {
            return;
        }
        {
            let mut link = self.link.borrow_mut();
            link.outstanding = link.outstanding.saturating_sub(chunk.len());
        }
        let produced: Vec<U> = chunk
            .into_iter()
            .flat_map(|item| (self.mapping)(item))
            .collect();
        trace!(produced = produced.len(), "transform buffered output");
        self.outlet.push(produced);

        self.prime_upstream();
        self.outlet.drain();
        // The drain may have emptied the buffer below the high-water mark.
        self.prime_upstream();
    }

    fn upstream_finished(&self) {
        {
            let mut link = self.link.borrow_mut();
            link.upstream_done = true;
            link.upstream = None;
        }
        debug!(buffered = self.outlet.buffered(), "transform upstream finished");
        self.outlet.finish();
    }

    fn upstream_failed(&self, error: Error) {
        {
            let mut link = self.link.borrow_mut();
            link.upstream_done = true;
            link.upstream = None;
        }
        warn!(%error, "transform upstream failed");
        self.outlet.fail(error);
    }

    // Ask upstream for another batch once the previous one has arrived,
    // unless the buffer is at its high-water mark. Every drain entry point
    // is followed by a call here.
    fn prime_upstream(&self) {
        let (upstream, batch) = {
            let mut link = self.link.borrow_mut();
            if link.upstream_done || link.outstanding > 0 || self.outlet.is_terminal() {
                return;
            }
            if let Some(limit) = self.config.max_buffered {
                if self.outlet.buffered() >= limit {
                    return;
                }
            }
            let Some(upstream) = link.upstream.clone() else {
                return;
            };
            let batch = self.config.upstream_batch.max(1);
            link.outstanding = batch;
            (upstream, batch)
        };
        trace!(batch, "transform requesting upstream");
        upstream.request(Demand::max(batch));
    }
}

impl<T: 'static, U: 'static> Subscription for TransformSession<T, U> {
    fn request(&self, demand: Demand) {
        if self.outlet.is_terminal() || !self.outlet.is_attached() {
            return;
        }
        self.outlet.request(demand);
        self.prime_upstream();
    }

    fn cancel(&self) {
        if !self.outlet.cancel() {
            return;
        }
        let upstream = {
            let mut link = self.link.borrow_mut();
            link.upstream_done = true;
            link.upstream.take()
        };
        if let Some(upstream) = upstream {
            upstream.cancel();
        }
    }
}

// The upstream-facing half of a transform session.
struct UpstreamLink<T, U> {
    session: Rc<TransformSession<T, U>>,
}

impl<T: 'static, U: 'static> Subscriber for UpstreamLink<T, U> {
    type Item = T;

    fn on_subscribe(&mut self, subscription: SubscriptionRef) {
        self.session.connect(subscription);
    }

    fn on_next(&mut self, chunk: Vec<T>) -> Demand {
        self.session.receive(chunk);
        Demand::NONE
    }

    fn on_complete(&mut self, completion: Completion) {
        match completion {
            Completion::Finished => self.session.upstream_finished(),
            Completion::Failed(error) => self.session.upstream_failed(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::{from_fn, CollectSink};
    use crate::sources::BufferedSource;
    use std::cell::Cell;

    fn doubled_upper(c: char) -> Vec<char> {
        let upper = c.to_ascii_uppercase();
        vec![upper, upper]
    }

    #[test]
    fn test_expands_and_completes() {
        let sink = CollectSink::new();
        Transform::new(BufferedSource::from("ab"), doubled_upper).subscribe(sink.clone());

        assert_eq!(sink.items(), vec!['A', 'A', 'B', 'B']);
        assert!(sink.completion().unwrap().is_finished());
    }

    #[test]
    fn test_mapping_to_nothing_still_completes() {
        let sink = CollectSink::new();
        Transform::new(BufferedSource::from("abc"), |_c: char| Vec::<char>::new())
            .subscribe(sink.clone());

        assert!(sink.items().is_empty());
        assert!(sink.completion().unwrap().is_finished());
    }

    #[test]
    fn test_buffers_until_downstream_asks() {
        let sink = CollectSink::with_demand(Demand::NONE);
        Transform::new(BufferedSource::from("ab"), doubled_upper).subscribe(sink.clone());
        assert!(sink.items().is_empty());
        assert!(sink.completion().is_none());

        let handle = sink.subscription().unwrap();
        handle.request(Demand::max(3));
        assert_eq!(sink.chunks(), vec![vec!['A', 'A', 'B']]);
        assert!(sink.completion().is_none());

        handle.request(Demand::max(1));
        assert_eq!(sink.items(), vec!['A', 'A', 'B', 'B']);
        assert!(sink.completion().unwrap().is_finished());
    }

    #[test]
    fn test_empty_upstream_error_passes_through() {
        let sink = CollectSink::new();
        Transform::new(BufferedSource::<char>::new(vec![]), doubled_upper)
            .subscribe(sink.clone());

        assert!(sink.items().is_empty());
        let completion = sink.completion().unwrap();
        assert!(completion.error().unwrap().is_empty_source());
    }

    #[test]
    fn test_high_water_mark_limits_upstream_pulls() {
        let pulled = Rc::new(Cell::new(0usize));
        let counter = pulled.clone();
        let sink = CollectSink::with_demand(Demand::NONE);
        Transform::new(BufferedSource::from("abcdef"), move |c: char| {
            counter.set(counter.get() + 1);
            vec![c]
        })
        .max_buffered(2)
        .subscribe(sink.clone());

        assert_eq!(pulled.get(), 2);

        sink.subscription().unwrap().request(Demand::max(1));
        assert_eq!(sink.items(), vec!['a']);
        assert_eq!(pulled.get(), 3);

        sink.subscription().unwrap().request(Demand::unlimited());
        assert_eq!(sink.items(), vec!['a', 'b', 'c', 'd', 'e', 'f']);
        assert!(sink.completion().unwrap().is_finished());
    }

    #[test]
    fn test_high_water_mark_with_returned_demand() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let done = Rc::new(Cell::new(None));
        let (record, flag) = (seen.clone(), done.clone());

        let sink = from_fn(Demand::max(1), move |chunk: Vec<char>| {
            record.borrow_mut().extend(chunk);
            Demand::max(1)
        })
        .with_completion(move |completion| flag.set(Some(completion.is_finished())));
        Transform::new(BufferedSource::from("ab"), |c: char| vec![c, c])
            .max_buffered(2)
            .subscribe(sink);

        assert_eq!(*seen.borrow(), vec!['a', 'a', 'b', 'b']);
        assert_eq!(done.get(), Some(true));
    }

    #[test]
    fn test_high_water_mark_with_upfront_demand() {
        let sink = CollectSink::new();
        Transform::new(BufferedSource::from("abc"), |c: char| vec![c.to_ascii_uppercase()])
            .max_buffered(1)
            .subscribe(sink.clone());

        assert_eq!(sink.items(), vec!['A', 'B', 'C']);
        assert_eq!(sink.completion_count(), 1);
        assert!(sink.completion().unwrap().is_finished());
    }

    #[test]
    fn test_larger_upstream_batches_preserve_order() {
        let sink = CollectSink::new();
        Transform::new(BufferedSource::new((1..=10).collect::<Vec<u32>>()), |n: u32| vec![n * 10])
            .upstream_batch(4)
            .subscribe(sink.clone());

        assert_eq!(sink.items(), (1..=10).map(|n| n * 10).collect::<Vec<_>>());
        assert!(sink.completion().unwrap().is_finished());
    }

    #[test]
    fn test_cancel_reaches_upstream_once() {
        struct CountingCancel {
            inner: SubscriptionRef,
            cancels: Rc<Cell<usize>>,
        }
        impl Subscription for CountingCancel {
            fn request(&self, demand: Demand) {
                self.inner.request(demand);
            }
            fn cancel(&self) {
                self.cancels.set(self.cancels.get() + 1);
                self.inner.cancel();
            }
        }

        struct Spy<S> {
            inner: S,
            cancels: Rc<Cell<usize>>,
        }
        impl<S: Subscriber> Subscriber for Spy<S> {
            type Item = S::Item;
            fn on_subscribe(&mut self, subscription: SubscriptionRef) {
                self.inner.on_subscribe(Rc::new(CountingCancel {
                    inner: subscription,
                    cancels: self.cancels.clone(),
                }));
            }
            fn on_next(&mut self, chunk: Vec<S::Item>) -> Demand {
                self.inner.on_next(chunk)
            }
            fn on_complete(&mut self, completion: Completion) {
                self.inner.on_complete(completion)
            }
        }

        struct SpiedSource {
            source: BufferedSource<char>,
            cancels: Rc<Cell<usize>>,
        }
        impl Publisher for SpiedSource {
            type Item = char;
            fn subscribe<S>(&self, subscriber: S)
            where
                S: Subscriber<Item = char> + 'static,
            {
                self.source.subscribe(Spy {
                    inner: subscriber,
                    cancels: self.cancels.clone(),
                });
            }
        }

        let cancels = Rc::new(Cell::new(0));
        let upstream = SpiedSource {
            source: BufferedSource::from("abcd"),
            cancels: cancels.clone(),
        };
        let sink = CollectSink::with_demand(Demand::NONE);
        Transform::new(upstream, doubled_upper)
            .max_buffered(2)
            .subscribe(sink.clone());

        let handle = sink.subscription().unwrap();
        handle.request(Demand::max(1));
        assert_eq!(sink.items(), vec!['A']);

        handle.cancel();
        handle.cancel();
        handle.request(Demand::unlimited());

        assert_eq!(sink.items(), vec!['A']);
        assert!(sink.completion().is_none());
        assert_eq!(cancels.get(), 1);
    }
}
