//! Serve loop, unit runner and shutdown handling.

mod builder;
mod core;
mod report;
mod runner;
mod shutdown;
mod units;

#[cfg(test)]
mod tests;

pub use builder::DispatcherBuilder;
pub use self::core::Dispatcher;
pub use report::{ServeReport, StopReason};
