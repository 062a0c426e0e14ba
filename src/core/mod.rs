//! Core traits and types for the demandweld library.
//!
//! This module contains the demand value type, the error types and the
//! publisher/subscriber/subscription contracts that define the protocol.

pub mod demand;
pub mod error;
pub(crate) mod outlet;
pub mod traits;

// Re-export core items
pub use demand::Demand;
pub use error::{Completion, Error, Result};
pub use traits::{Publisher, Subscriber, Subscription, SubscriptionRef};
