//! Outbound side of the message bus as seen by the dispatcher.

use super::error::TransportError;

/// Publish/subscribe capabilities of the underlying bus client.
///
/// Both calls only queue a request: they must not block waiting for the
/// broker, success or failure of the delivery itself is reported by the
/// transport through its own channel.
pub trait Transport: Send + Sync {
    fn subscribe(&self, topic: &str) -> Result<(), TransportError>;

    /// Subscribes a set of topics as a single request.
    ///
    /// Implementations with a bounded request queue must override this so a
    /// large topic set takes one slot instead of one per topic.
    fn subscribe_many(&self, topics: &[String]) -> Result<(), TransportError> {
        topics.iter().try_for_each(|topic| self.subscribe(topic))
    }

    /// Publishes `payload` with the transport's default QoS.
    fn publish(&self, topic: &str, payload: String, retained: bool) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        (**self).subscribe(topic)
    }

    fn subscribe_many(&self, topics: &[String]) -> Result<(), TransportError> {
        (**self).subscribe_many(topics)
    }

    fn publish(&self, topic: &str, payload: String, retained: bool) -> Result<(), TransportError> {
        (**self).publish(topic, payload, retained)
    }
}
