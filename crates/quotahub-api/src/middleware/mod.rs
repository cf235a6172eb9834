//! Tower middleware shared by every route.

pub mod cors;
pub mod logging;
