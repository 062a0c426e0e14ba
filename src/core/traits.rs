//! Core traits for the demand protocol.
//!
//! This module defines the three roles every pipeline is built from:
//!
//! - a [`Publisher`] creates a fresh session for each subscriber,
//! - a [`Subscription`] is the session handle a subscriber uses to signal
//!   demand or cancel,
//! - a [`Subscriber`] receives the handle, chunks of items and exactly one
//!   completion.
//!
//! Delivery is synchronous and single-threaded. A subscriber may call back
//! into its subscription from inside any callback; the session records the
//! new demand and the drain loop already in progress picks it up.

use std::rc::Rc;

use crate::core::demand::Demand;
use crate::core::error::Completion;

/// Shared handle to a live session.
pub type SubscriptionRef = Rc<dyn Subscription>;

/// Consumer-facing control surface of a session.
///
/// Both methods are no-ops once the session is terminal.
pub trait Subscription {
    /// Add `demand` to the running demand. Demand is additive.
    fn request(&self, demand: Demand);

    /// Stop delivery. Idempotent.
    fn cancel(&self);
}

/// A consumer of chunks.
///
/// # Examples
///
/// ```rust
/// use demandweld::core::{Completion, Demand, Subscriber, SubscriptionRef};
///
/// struct Printer;
///
/// impl Subscriber for Printer {
///     type Item = char;
///
///     fn on_subscribe(&mut self, subscription: SubscriptionRef) {
///         subscription.request(Demand::unlimited());
///     }
///
///     fn on_next(&mut self, chunk: Vec<char>) -> Demand {
///         let _ = chunk;
///         Demand::NONE
///     }
///
///     fn on_complete(&mut self, _completion: Completion) {}
/// }
/// ```
pub trait Subscriber {
    /// The type of items this subscriber accepts
    type Item;

    /// Called once when attached. Typically issues the initial request.
    fn on_subscribe(&mut self, subscription: SubscriptionRef);

    /// Called with each delivered chunk. The returned demand is added to the
    /// session's running demand (it may be zero).
    fn on_next(&mut self, chunk: Vec<Self::Item>) -> Demand;

    /// Called exactly once when the session ends.
    fn on_complete(&mut self, completion: Completion);
}

impl<S: Subscriber + ?Sized> Subscriber for Box<S> {
    type Item = S::Item;

    fn on_subscribe(&mut self, subscription: SubscriptionRef) {
        (**self).on_subscribe(subscription)
    }

    fn on_next(&mut self, chunk: Vec<Self::Item>) -> Demand {
        (**self).on_next(chunk)
    }

    fn on_complete(&mut self, completion: Completion) {
        (**self).on_complete(completion)
    }
}

/// A producer of sessions.
///
/// Every call to [`Publisher::subscribe`] builds an entirely fresh session
/// graph; nothing is shared between subscriptions.
pub trait Publisher {
    /// The type of items this publisher emits
    type Item: 'static;

    /// Attach `subscriber` to a new session.
    fn subscribe<S>(&self, subscriber: S)
    where
        S: Subscriber<Item = Self::Item> + 'static;
}

impl<P: Publisher + ?Sized> Publisher for Rc<P> {
    type Item = P::Item;

    fn subscribe<S>(&self, subscriber: S)
    where
        S: Subscriber<Item = Self::Item> + 'static,
    {
        (**self).subscribe(subscriber)
    }
}
