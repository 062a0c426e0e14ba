//! An async bridge over any publisher.
//!
//! [`SubscriberStream`] subscribes to a publisher and requests exactly one
//! item per poll, so an async consumer exerts the same backpressure a
//! synchronous subscriber would. It stays on one thread.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use futures_core::Stream;

use crate::core::{Completion, Demand, Publisher, Result, Subscriber, SubscriptionRef};

struct Shared<T> {
    queue: VecDeque<T>,
    subscription: Option<SubscriptionRef>,
    completion: Option<Completion>,
    outstanding: bool,
    done: bool,
    waker: Option<Waker>,
}

impl<T> Shared<T> {
    fn wake(&mut self) {
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }
}

/// A `Stream` of items pulled from a publisher one at a time.
///
/// A failure is yielded once as `Err`, after which the stream ends. Dropping
/// the stream cancels the underlying session.
pub struct SubscriberStream<T> {
    shared: Rc<RefCell<Shared<T>>>,
}

impl<T: 'static> SubscriberStream<T> {
    /// Subscribe to `publisher`
    pub fn new<P>(publisher: &P) -> Self
    where
        P: Publisher<Item = T>,
    {
        let shared = Rc::new(RefCell::new(Shared {
            queue: VecDeque::new(),
            subscription: None,
            completion: None,
            outstanding: false,
            done: false,
            waker: None,
        }));
        publisher.subscribe(StreamSubscriber {
            shared: shared.clone(),
        });
        Self { shared }
    }
}

impl<T> Stream for SubscriberStream<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let subscription = {
                let mut shared = self.shared.borrow_mut();
                if let Some(item) = shared.queue.pop_front() {
                    return Poll::Ready(Some(Ok(item)));
                }
                if let Some(completion) = shared.completion.take() {
                    shared.done = true;
                    return match completion {
                        Completion::Finished => Poll::Ready(None),
                        Completion::Failed(error) => Poll::Ready(Some(Err(error))),
                    };
                }
                if shared.done {
                    return Poll::Ready(None);
                }
                match shared.subscription.clone() {
                    Some(subscription) if !shared.outstanding => {
                        shared.outstanding = true;
                        subscription
                    }
                    _ => {
                        shared.waker = Some(cx.waker().clone());
                        return Poll::Pending;
                    }
                }
            };
            // Synchronous publishers deliver before this returns.
            subscription.request(Demand::max(1));
        }
    }
}

impl<T> Drop for SubscriberStream<T> {
    fn drop(&mut self) {
        let subscription = {
            let mut shared = self.shared.borrow_mut();
            shared.done = true;
            shared.subscription.take()
        };
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
    }
}

struct StreamSubscriber<T> {
    shared: Rc<RefCell<Shared<T>>>,
}

impl<T> Subscriber for StreamSubscriber<T> {
    type Item = T;

    fn on_subscribe(&mut self, subscription: SubscriptionRef) {
        let mut shared = self.shared.borrow_mut();
        shared.subscription = Some(subscription);
        shared.wake();
    }

    fn on_next(&mut self, chunk: Vec<T>) -> Demand {
        let mut shared = self.shared.borrow_mut();
        shared.queue.extend(chunk);
        shared.outstanding = false;
        shared.wake();
        Demand::NONE
    }

    fn on_complete(&mut self, completion: Completion) {
        let mut shared = self.shared.borrow_mut();
        if !shared.done {
            shared.completion = Some(completion);
        }
        shared.subscription = None;
        shared.wake();
    }
}
