//! Sink implementations.
//!
//! Sinks are terminal subscribers. Most keep their observations in shared
//! state, so a clone kept by the caller can inspect what the session
//! delivered after the original has been handed to a publisher.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::marker::PhantomData;
use std::rc::Rc;

use tracing::info;

use crate::core::{Completion, Demand, Subscriber, SubscriptionRef};

struct CollectState<T> {
    chunks: Vec<Vec<T>>,
    completions: Vec<Completion>,
    subscription: Option<SubscriptionRef>,
    delivered: usize,
}

/// A sink that records every chunk and the completion.
///
/// The shared state holds the subscription until the session ends, and the
/// session holds this sink. Cancel a pipeline you stop driving before it
/// completes, or both stay allocated.
pub struct CollectSink<T> {
    state: Rc<RefCell<CollectState<T>>>,
    initial: Demand,
    cancel_after: Option<usize>,
}

impl<T> CollectSink<T> {
    /// Create a sink that requests unbounded demand on subscribe
    pub fn new() -> Self {
        Self::with_demand(Demand::unlimited())
    }

    /// Create a sink that requests `initial` on subscribe and nothing more
    pub fn with_demand(initial: Demand) -> Self {
        Self {
            state: Rc::new(RefCell::new(CollectState {
                chunks: Vec::new(),
                completions: Vec::new(),
                subscription: None,
                delivered: 0,
            })),
            initial,
            cancel_after: None,
        }
    }

    /// Cancel the subscription once `count` items have arrived
    pub fn cancel_after(mut self, count: usize) -> Self {
        self.cancel_after = Some(count);
        self
    }

    /// The subscription handle, until the session completes
    pub fn subscription(&self) -> Option<SubscriptionRef> {
        self.state.borrow().subscription.clone()
    }

    /// Number of items delivered so far
    pub fn delivered(&self) -> usize {
        self.state.borrow().delivered
    }

    /// The first completion received, if any
    pub fn completion(&self) -> Option<Completion> {
        self.state.borrow().completions.first().cloned()
    }

    /// How many completions were received; never more than one
    pub fn completion_count(&self) -> usize {
        self.state.borrow().completions.len()
    }
}

impl<T: Clone> CollectSink<T> {
    /// All delivered items, in order
    pub fn items(&self) -> Vec<T> {
        self.state.borrow().chunks.iter().flatten().cloned().collect()
    }

    /// Delivered chunks as they arrived
    pub fn chunks(&self) -> Vec<Vec<T>> {
        self.state.borrow().chunks.clone()
    }
}

impl<T> Default for CollectSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CollectSink<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            initial: self.initial,
            cancel_after: self.cancel_after,
        }
    }
}

impl<T> Subscriber for CollectSink<T> {
    type Item = T;

    fn on_subscribe(&mut self, subscription: SubscriptionRef) {
        self.state.borrow_mut().subscription = Some(subscription.clone());
        subscription.request(self.initial);
    }

    fn on_next(&mut self, chunk: Vec<T>) -> Demand {
        let cancel = {
            let mut state = self.state.borrow_mut();
            state.delivered += chunk.len();
            state.chunks.push(chunk);
            match self.cancel_after {
                Some(limit) if state.delivered >= limit => state.subscription.clone(),
                _ => None,
            }
        };
        if let Some(subscription) = cancel {
            subscription.cancel();
        }
        Demand::NONE
    }

    fn on_complete(&mut self, completion: Completion) {
        let mut state = self.state.borrow_mut();
        state.completions.push(completion);
        state.subscription = None;
    }
}

/// A sink that counts items and chunks.
pub struct CountSink<T> {
    items: Rc<Cell<usize>>,
    chunks: Rc<Cell<usize>>,
    finished: Rc<Cell<Option<bool>>>,
    _phantom: PhantomData<T>,
}

impl<T> CountSink<T> {
    /// Create a new count sink
    pub fn new() -> Self {
        Self {
            items: Rc::new(Cell::new(0)),
            chunks: Rc::new(Cell::new(0)),
            finished: Rc::new(Cell::new(None)),
            _phantom: PhantomData,
        }
    }

    pub fn count(&self) -> usize {
        self.items.get()
    }

    pub fn chunks(&self) -> usize {
        self.chunks.get()
    }

    /// `Some(true)` once finished, `Some(false)` once failed
    pub fn finished(&self) -> Option<bool> {
        self.finished.get()
    }
}

impl<T> Default for CountSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CountSink<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            chunks: self.chunks.clone(),
            finished: self.finished.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T> Subscriber for CountSink<T> {
    type Item = T;

    fn on_subscribe(&mut self, subscription: SubscriptionRef) {
        subscription.request(Demand::unlimited());
    }

    fn on_next(&mut self, chunk: Vec<T>) -> Demand {
        self.items.set(self.items.get() + chunk.len());
        self.chunks.set(self.chunks.get() + 1);
        Demand::NONE
    }

    fn on_complete(&mut self, completion: Completion) {
        self.finished.set(Some(completion.is_finished()));
    }
}

/// A sink created from closures.
pub struct FnSink<T, F> {
    initial: Demand,
    on_next: F,
    on_complete: Option<Box<dyn FnOnce(Completion)>>,
    _phantom: PhantomData<T>,
}

/// Create a sink that requests `initial` on subscribe and hands each chunk
/// to `on_next`, whose return value is the additional demand.
pub fn from_fn<T, F>(initial: Demand, on_next: F) -> FnSink<T, F>
where
    F: FnMut(Vec<T>) -> Demand,
{
    FnSink {
        initial,
        on_next,
        on_complete: None,
        _phantom: PhantomData,
    }
}

impl<T, F> FnSink<T, F> {
    /// Run `f` with the completion
    pub fn with_completion<G>(mut self, f: G) -> Self
    where
        G: FnOnce(Completion) + 'static,
    {
        self.on_complete = Some(Box::new(f));
        self
    }
}

impl<T, F> Subscriber for FnSink<T, F>
where
    F: FnMut(Vec<T>) -> Demand,
{
    type Item = T;

    fn on_subscribe(&mut self, subscription: SubscriptionRef) {
        subscription.request(self.initial);
    }

    fn on_next(&mut self, chunk: Vec<T>) -> Demand {
        (self.on_next)(chunk)
    }

    fn on_complete(&mut self, completion: Completion) {
        if let Some(f) = self.on_complete.take() {
            f(completion);
        }
    }
}

/// A sink that asks for one item at a time.
///
/// It requests a single item on subscribe, then calls `request(1)` on its
/// subscription from inside every `on_next`, relying on the session's
/// re-entry guard to turn the nested call into a demand update.
///
/// Like [`CollectSink`], it keeps its session alive until that session
/// completes or is cancelled.
pub struct StepSink<T> {
    collector: CollectSink<T>,
    subscription: Option<SubscriptionRef>,
}

impl<T> StepSink<T> {
    /// Create a new step sink
    pub fn new() -> Self {
        Self {
            collector: CollectSink::with_demand(Demand::max(1)),
            subscription: None,
        }
    }

    /// A handle onto what this sink has received
    pub fn collector(&self) -> CollectSink<T> {
        self.collector.clone()
    }
}

impl<T> Default for StepSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Subscriber for StepSink<T> {
    type Item = T;

    fn on_subscribe(&mut self, subscription: SubscriptionRef) {
        self.subscription = Some(subscription.clone());
        self.collector.on_subscribe(subscription);
    }

    fn on_next(&mut self, chunk: Vec<T>) -> Demand {
        let more = self.collector.on_next(chunk);
        if let Some(subscription) = &self.subscription {
            subscription.request(Demand::max(1));
        }
        more
    }

    fn on_complete(&mut self, completion: Completion) {
        self.subscription = None;
        self.collector.on_complete(completion);
    }
}

/// A sink that logs every chunk through `tracing`.
pub struct TracingSink<T> {
    name: String,
    demand: Demand,
    _phantom: PhantomData<T>,
}

impl<T> TracingSink<T> {
    /// Create a tracing sink with unbounded demand
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            demand: Demand::unlimited(),
            _phantom: PhantomData,
        }
    }

    /// Request `demand` on subscribe instead of unbounded demand
    pub fn with_demand(mut self, demand: Demand) -> Self {
        self.demand = demand;
        self
    }
}

impl<T: Debug> Subscriber for TracingSink<T> {
    type Item = T;

    fn on_subscribe(&mut self, subscription: SubscriptionRef) {
        info!(sink = %self.name, demand = %self.demand, "subscribed");
        subscription.request(self.demand);
    }

    fn on_next(&mut self, chunk: Vec<T>) -> Demand {
        info!(sink = %self.name, len = chunk.len(), items = ?chunk, "received");
        Demand::NONE
    }

    fn on_complete(&mut self, completion: Completion) {
        match completion {
            Completion::Finished => info!(sink = %self.name, "finished"),
            Completion::Failed(error) => info!(sink = %self.name, %error, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Publisher;
    use crate::sources::BufferedSource;

    #[test]
    fn test_collect_sink_cancel_after() {
        let sink = CollectSink::with_demand(Demand::max(1)).cancel_after(2);
        BufferedSource::new(vec![1, 2, 3, 4]).subscribe(sink.clone());
        assert_eq!(sink.items(), vec![1]);

        sink.subscription().unwrap().request(Demand::max(2));
        assert_eq!(sink.items(), vec![1, 2, 3]);
        assert!(sink.completion().is_none());

        sink.subscription().unwrap().request(Demand::max(1));
        assert_eq!(sink.items(), vec![1, 2, 3]);
    }

    #[test]
    fn test_count_sink() {
        let sink = CountSink::new();
        BufferedSource::new((0..10).collect::<Vec<u8>>()).subscribe(sink.clone());

        assert_eq!(sink.count(), 10);
        assert_eq!(sink.chunks(), 1);
        assert_eq!(sink.finished(), Some(true));
    }

    #[test]
    fn test_fn_sink_returned_demand() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let done = Rc::new(Cell::new(false));
        let record = seen.clone();
        let flag = done.clone();

        let sink = from_fn(Demand::max(2), move |chunk: Vec<u32>| {
            record.borrow_mut().push(chunk.len());
            Demand::max(2)
        })
        .with_completion(move |completion| flag.set(completion.is_finished()));
        BufferedSource::new(vec![1, 2, 3, 4, 5]).subscribe(sink);

        assert_eq!(*seen.borrow(), vec![2, 2, 1]);
        assert!(done.get());
    }

    #[test]
    fn test_step_sink_reenters_one_at_a_time() {
        let sink = StepSink::new();
        let collector = sink.collector();
        BufferedSource::from("Hello").subscribe(sink);

        assert_eq!(
            collector.chunks(),
            vec![vec!['H'], vec!['e'], vec!['l'], vec!['l'], vec!['o']]
        );
        assert_eq!(collector.completion_count(), 1);
        assert!(collector.completion().unwrap().is_finished());
    }

    #[test]
    fn test_tracing_sink_accepts_partial_demand() {
        struct Tap<S> {
            inner: S,
            collector: CollectSink<char>,
        }

        impl<S: Subscriber<Item = char>> Subscriber for Tap<S> {
            type Item = char;

            fn on_subscribe(&mut self, subscription: SubscriptionRef) {
                self.collector.state.borrow_mut().subscription = Some(subscription.clone());
                self.inner.on_subscribe(subscription);
            }

            fn on_next(&mut self, chunk: Vec<char>) -> Demand {
                self.collector.on_next(chunk.clone());
                self.inner.on_next(chunk)
            }

            fn on_complete(&mut self, completion: Completion) {
                self.collector.on_complete(completion.clone());
                self.inner.on_complete(completion)
            }
        }

        let collector = CollectSink::with_demand(Demand::NONE);
        BufferedSource::from("log me").subscribe(Tap {
            inner: TracingSink::new("test").with_demand(Demand::max(2)),
            collector: collector.clone(),
        });

        assert_eq!(collector.chunks(), vec![vec!['l', 'o']]);
        assert!(collector.completion().is_none());

        let subscription = collector.subscription().unwrap();
        subscription.request(Demand::unlimited());
        assert_eq!(collector.items(), "log me".chars().collect::<Vec<_>>());
        assert!(collector.completion().unwrap().is_finished());
    }
}
