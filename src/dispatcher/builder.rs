use std::sync::Arc;

use super::core::Dispatcher;
use crate::{
    config::DispatcherConfig, error::DispatchError, gate::AdmissionGate, subscribers::Subscribe,
};

/// Builder for constructing a [`Dispatcher`] with optional subscribers.
pub struct DispatcherBuilder {
    cfg: DispatcherConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl DispatcherBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: DispatcherConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (unit lifecycle, failures, etc.)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Validates the configuration and builds the dispatcher.
    ///
    /// Fails with [`DispatchError::InvalidCapacity`] if `max_outstanding` is 0.
    pub fn build(self) -> Result<Dispatcher, DispatchError> {
        self.cfg.validate()?;
        let gate = AdmissionGate::new(self.cfg.max_outstanding)?;
        Ok(Dispatcher::new_internal(self.cfg, gate, self.subscribers))
    }
}
