//! Source implementations.
//!
//! A [`BufferedSource`] holds an immutable sequence of items. Each
//! subscription gets a fresh [`SourceSession`] owning a private copy of that
//! sequence, drained to the subscriber under demand control.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::core::outlet::Outlet;
use crate::core::{Demand, Error, Publisher, Subscriber, Subscription};

/// A publisher over a fixed, ordered sequence of items.
///
/// An empty sequence is a legal construction, but every session over it
/// fails with [`Error::EmptySource`] on its first request.
#[derive(Debug, Clone)]
pub struct BufferedSource<T> {
    items: Rc<[T]>,
}

impl<T> BufferedSource<T> {
    /// Create a new source over `items`
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> FromIterator<T> for BufferedSource<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<T> From<Vec<T>> for BufferedSource<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl From<&str> for BufferedSource<char> {
    fn from(text: &str) -> Self {
        text.chars().collect()
    }
}

/// Create a source from any iterable
pub fn from_iter<I: IntoIterator>(items: I) -> BufferedSource<I::Item> {
    items.into_iter().collect()
}

/// Create a source that emits a single item
pub fn just<T>(item: T) -> BufferedSource<T> {
    BufferedSource::new(vec![item])
}

impl<T: Clone + 'static> Publisher for BufferedSource<T> {
    type Item = T;

    fn subscribe<S>(&self, subscriber: S)
    where
        S: Subscriber<Item = T> + 'static,
    {
        let session = Rc::new(SourceSession::new(self.items.iter().cloned().collect()));
        debug!(items = session.outlet.buffered(), "source session created");
        session.outlet.attach(Box::new(subscriber), session.clone());
    }
}

/// One subscriber's view of a [`BufferedSource`].
pub struct SourceSession<T> {
    outlet: Outlet<T>,
    requested: Cell<bool>,
}

impl<T> SourceSession<T> {
    fn new(items: VecDeque<T>) -> Self {
        Self {
            outlet: Outlet::new("source", items),
            requested: Cell::new(false),
        }
    }

    /// Items not yet delivered
    pub fn remaining(&self) -> usize {
        self.outlet.buffered()
    }

    pub fn is_terminal(&self) -> bool {
        self.outlet.is_terminal()
    }
}

impl<T> Subscription for SourceSession<T> {
    fn request(&self, demand: Demand) {
        if self.outlet.is_terminal() || !self.outlet.is_attached() {
            return;
        }
        if !self.requested.replace(true) {
            if self.outlet.buffered() == 0 {
                warn!("source requested while empty");
                self.outlet.fail(Error::EmptySource);
                return;
            }
            // The sequence is fixed, so the buffer is closed from the start.
            self.outlet.close();
        }
        self.outlet.request(demand);
    }

    fn cancel(&self) {
        self.outlet.cancel();
    }
}
