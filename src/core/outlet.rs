//! The drain loop shared by every session.
//!
//! An [`Outlet`] binds one exclusively owned buffer to one subscriber. It
//! delivers chunks while running demand and buffered items remain, signals
//! completion once the buffer is observably empty after its producer has
//! closed it, and becomes terminal exactly once.
//!
//! The `draining` flag guards against re-entry. A subscriber that calls
//! `request` from inside `on_next` only bumps the running demand; the loop
//! already on the stack sees the new value on its next iteration. The same
//! flag makes `cancel` defer releasing the subscriber until the loop unwinds,
//! because the subscriber is still borrowed while it runs.

use std::cell::RefCell;
use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::core::demand::Demand;
use crate::core::error::{Completion, Error};
use crate::core::traits::{Subscriber, SubscriptionRef};

struct OutletState<T> {
    buffer: VecDeque<T>,
    demand: Demand,
    draining: bool,
    terminal: bool,
    attached: bool,
    closed: bool,
    failure: Option<Error>,
}

enum Step<T> {
    Deliver(Vec<T>),
    Complete(Completion),
}

pub(crate) struct Outlet<T> {
    stage: &'static str,
    state: RefCell<OutletState<T>>,
    subscriber: RefCell<Option<Box<dyn Subscriber<Item = T>>>>,
}

impl<T> Outlet<T> {
    pub(crate) fn new(stage: &'static str, buffer: VecDeque<T>) -> Self {
        Self {
            stage,
            state: RefCell::new(OutletState {
                buffer,
                demand: Demand::NONE,
                draining: false,
                terminal: false,
                attached: false,
                closed: false,
                failure: None,
            }),
            subscriber: RefCell::new(None),
        }
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.state.borrow().terminal
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.state.borrow().attached
    }

    pub(crate) fn buffered(&self) -> usize {
        self.state.borrow().buffer.len()
    }

    #[cfg(test)]
    pub(crate) fn demand(&self) -> Demand {
        self.state.borrow().demand
    }

    /// Register `subscriber` and hand it `subscription`.
    ///
    /// The drain guard is held across `on_subscribe`, so requests issued
    /// from inside it accumulate and are served once it returns.
    pub(crate) fn attach(&self, subscriber: Box<dyn Subscriber<Item = T>>, subscription: SubscriptionRef) {
        {
            let mut state = self.state.borrow_mut();
            if state.attached || state.terminal {
                return;
            }
            state.attached = true;
            state.draining = true;
        }
        *self.subscriber.borrow_mut() = Some(subscriber);
        debug!(stage = self.stage, "subscriber attached");

        if let Some(subscriber) = self.subscriber.borrow_mut().as_mut() {
            subscriber.on_subscribe(subscription);
        }
        self.drain_loop();
    }

    /// Fold `demand` into the running demand and drain.
    pub(crate) fn request(&self, demand: Demand) {
        {
            let mut state = self.state.borrow_mut();
            if state.terminal || !state.attached {
                return;
            }
            state.demand += demand;
            trace!(stage = self.stage, added = %demand, running = %state.demand, "demand updated");
        }
        self.drain();
    }

    /// Append produced items without draining.
    pub(crate) fn push<I: IntoIterator<Item = T>>(&self, items: I) {
        let mut state = self.state.borrow_mut();
        if state.terminal || state.closed {
            return;
        }
        state.buffer.extend(items);
    }

    /// Mark that no more items will be pushed, without draining.
    pub(crate) fn close(&self) {
        self.state.borrow_mut().closed = true;
    }

    /// Close the buffer and drain; completion follows once it is empty.
    pub(crate) fn finish(&self) {
        self.close();
        self.drain();
    }

    /// Discard buffered items and fail at the next drain step.
    pub(crate) fn fail(&self, error: Error) {
        {
            let mut state = self.state.borrow_mut();
            if state.terminal || state.failure.is_some() {
                return;
            }
            state.buffer.clear();
            state.closed = true;
            state.failure = Some(error);
        }
        self.drain();
    }

    /// Mark terminal. Returns true only for the call that did so.
    pub(crate) fn cancel(&self) -> bool {
        let release_now = {
            let mut state = self.state.borrow_mut();
            if state.terminal {
                return false;
            }
            state.terminal = true;
            state.buffer.clear();
            state.failure = None;
            !state.draining
        };
        debug!(stage = self.stage, "session cancelled");
        #[cfg(feature = "metrics")]
        crate::metrics::record_outcome(self.stage, "cancelled");
        if release_now {
            self.release();
        }
        true
    }

    pub(crate) fn drain(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.draining {
                return;
            }
            state.draining = true;
        }
        self.drain_loop();
    }

    // Runs with the drain guard held and releases it on exit.
    fn drain_loop(&self) {
        loop {
            let step = {
                let mut state = self.state.borrow_mut();
                if state.terminal {
                    break;
                }
                if let Some(error) = state.failure.take() {
                    state.terminal = true;
                    Step::Complete(Completion::Failed(error))
                } else {
                    let n = state.demand.min_len(state.buffer.len());
                    if n > 0 {
                        state.demand -= n;
                        Step::Deliver(state.buffer.drain(..n).collect())
                    } else if state.buffer.is_empty() && state.closed {
                        state.terminal = true;
                        Step::Complete(Completion::Finished)
                    } else {
                        break;
                    }
                }
            };

            match step {
                Step::Deliver(chunk) => {
                    let len = chunk.len();
                    trace!(stage = self.stage, len, "delivering chunk");
                    #[cfg(feature = "metrics")]
                    crate::metrics::record_chunk(self.stage, len);

                    let more = match self.subscriber.borrow_mut().as_mut() {
                        Some(subscriber) => subscriber.on_next(chunk),
                        None => Demand::NONE,
                    };
                    self.state.borrow_mut().demand += more;
                }
                Step::Complete(completion) => {
                    self.complete(completion);
                    break;
                }
            }
        }

        let terminal = {
            let mut state = self.state.borrow_mut();
            state.draining = false;
            state.terminal
        };
        if terminal {
            self.release();
        }
    }

    fn complete(&self, completion: Completion) {
        let subscriber = self.subscriber.borrow_mut().take();
        self.state.borrow_mut().attached = false;

        match &completion {
            Completion::Finished => debug!(stage = self.stage, "session finished"),
            Completion::Failed(error) => debug!(stage = self.stage, %error, "session failed"),
        }
        #[cfg(feature = "metrics")]
        crate::metrics::record_outcome(
            self.stage,
            if completion.is_finished() { "finished" } else { "failed" },
        );

        if let Some(mut subscriber) = subscriber {
            subscriber.on_complete(completion);
        }
    }

    // Drop the subscriber, breaking the session <-> subscriber cycle.
    fn release(&self) {
        let subscriber = self.subscriber.borrow_mut().take();
        self.state.borrow_mut().attached = false;
        drop(subscriber);
    }
}
