//! Subscriber domain entities.

pub mod model;

pub use model::{Subscriber, SubscriberWithPlan};
