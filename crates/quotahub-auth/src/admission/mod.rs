//! Device admission control.
//!
//! Decides whether a freshly authenticated connection may bind its device
//! given the plan's device limit, and records the binding when it may.

pub mod controller;
pub mod decision;

pub use controller::DeviceAdmissionController;
pub use decision::AdmissionDecision;

/// Message sent to a client whose device would exceed the limit.
pub const DEVICE_LIMIT_MESSAGE: &str = "Device limit reached. Please disconnect other devices.";
