//! Broker session: connection lifecycle, event loop and the transport
//! handed to the dispatcher.
//!
//! # State Machine
//!
//! ```text
//! Configured ──connect()──► Connected ──run()──► (loop until cancelled)
//! ```
//!
//! `rumqttc` reconnects on the next poll after an error; every `ConnAck`
//! seen by the running loop triggers a fresh `subscribe_all` on the
//! dispatcher, so subscriptions survive broker restarts even with
//! `clean_start = true`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, SubscribeFilter,
};
use statum::{machine, state};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::{MqttConfig, MqttConfigError};
use super::message_manager::MqttMessage;
use crate::dispatch::{Dispatcher, Transport, TransportError};
use crate::host::ParamStore;

/// Keeps the status from growing without bound on a flapping link
const MAX_ERROR_MESSAGES: usize = 16;

#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

#[derive(Clone, Debug, Default)]
pub struct LinkStatus {
    pub connection_state: ConnectionState,
    pub error_messages: Vec<String>,
    pub messages_received: usize,
    pub messages_sent: usize,
    pub last_activity: Option<DateTime<Local>>,
}

impl LinkStatus {
    fn record_error(&mut self, message: String) {
        if self.error_messages.len() == MAX_ERROR_MESSAGES {
            self.error_messages.remove(0);
        }
        self.error_messages.push(message);
    }

    fn touch(&mut self) {
        self.last_activity = Some(Local::now());
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid MQTT configuration: {0}")]
    Config(#[from] MqttConfigError),

    #[error("no connection to the broker within {0:?}")]
    ConnectTimeout(Duration),
}

/// [`Transport`] over a `rumqttc` client.
///
/// Requests go into the client's bounded queue without awaiting, a full
/// queue surfaces as [`TransportError::Rejected`].
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    qos: QoS,
}

impl Transport for MqttTransport {
    fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.client
            .try_subscribe(topic, self.qos)
            .map_err(|e| TransportError::Rejected {
                operation: "subscribe",
                topic: topic.to_string(),
                details: e.to_string(),
            })
    }

    fn subscribe_many(&self, topics: &[String]) -> Result<(), TransportError> {
        let filters = topics
            .iter()
            .map(|topic| SubscribeFilter::new(topic.clone(), self.qos));
        self.client
            .try_subscribe_many(filters)
            .map_err(|e| TransportError::Rejected {
                operation: "subscribe",
                topic: topics.join(", "),
                details: e.to_string(),
            })
    }

    fn publish(&self, topic: &str, payload: String, retained: bool) -> Result<(), TransportError> {
        self.client
            .try_publish(topic, self.qos, retained, payload)
            .map_err(|e| TransportError::Rejected {
                operation: "publish",
                topic: topic.to_string(),
                details: e.to_string(),
            })
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum SessionState {
    Configured,
    Connected,
}

#[machine]
pub struct MqttSession<S: SessionState> {
    config: MqttConfig,
    qos: QoS,
    client: AsyncClient,
    eventloop: EventLoop,
    status: LinkStatus,
}

impl<S: SessionState> MqttSession<S> {
    /// A transport sharing this session's client.
    pub fn transport(&self) -> MqttTransport {
        MqttTransport {
            client: self.client.clone(),
            qos: self.qos,
        }
    }

    pub fn status(&self) -> &LinkStatus {
        &self.status
    }
}

impl MqttSession<Configured> {
    pub fn create(config: MqttConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let qos = config.qos()?;
        let (host, port) = config.broker_address()?;
        info!("Configuring MQTT session for {}:{} as '{}'", host, port, config.client_id);

        let mut mqtt_options = MqttOptions::new(config.client_id.clone(), host, port);
        mqtt_options
            .set_keep_alive(Duration::from_secs(config.keep_alive_secs))
            .set_clean_session(config.clean_start);
        if let (Some(user), Some(password)) = (&config.username, &config.password) {
            mqtt_options.set_credentials(user.clone(), password.clone());
        }

        let (client, eventloop) = AsyncClient::new(mqtt_options, config.request_capacity);

        Ok(Self::new(config, qos, client, eventloop, LinkStatus::default()))
    }

    /// Polls until the broker acknowledges the connection.
    ///
    /// Connection errors are retried after `reconnect_delay_ms` until
    /// `connect_timeout_secs` has elapsed.
    pub async fn connect(mut self) -> Result<MqttSession<Connected>, SessionError> {
        let limit = Duration::from_secs(self.config.connect_timeout_secs);
        let delay = Duration::from_millis(self.config.reconnect_delay_ms);
        self.status.connection_state = ConnectionState::Connecting;

        let outcome = tokio::time::timeout(limit, async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        info!("Connected to broker: {:?}", ack.code);
                        break;
                    }
                    Ok(event) => debug!("Ignoring event before ConnAck: {:?}", event),
                    Err(e) => {
                        warn!("Connection attempt failed: {}", e);
                        self.status.record_error(e.to_string());
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        })
        .await;

        match outcome {
            Ok(()) => {
                self.status.connection_state = ConnectionState::Connected;
                self.status.touch();
                Ok(self.transition())
            }
            Err(_) => {
                self.status.connection_state = ConnectionState::Failed;
                error!("Giving up on broker after {:?}", limit);
                Err(SessionError::ConnectTimeout(limit))
            }
        }
    }
}

impl MqttSession<Connected> {
    /// Drives the event loop until `cancel` fires, feeding every inbound
    /// publish to `dispatcher`. Returns the final link status.
    pub async fn run<T, H>(
        mut self,
        dispatcher: Arc<Dispatcher<T, H>>,
        cancel: CancellationToken,
    ) -> LinkStatus
    where
        T: Transport,
        H: ParamStore,
    {
        let delay = Duration::from_millis(self.config.reconnect_delay_ms);
        info!(driver = %dispatcher.name(), "MQTT event loop running");

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Shutdown requested, disconnecting");
                    if let Err(e) = self.client.try_disconnect() {
                        warn!("Disconnect request failed: {}", e);
                    }
                    self.status.connection_state = ConnectionState::Disconnected;
                    break;
                }
                event = self.eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let message = MqttMessage::from_publish(&publish);
                        debug!("Received {}", message);
                        self.status.messages_received += 1;
                        self.status.touch();

                        let report = dispatcher.on_message(message.topic(), message.content()).await;
                        if !report.failures.is_empty() {
                            self.status.record_error(format!(
                                "{} variable(s) rejected payload on '{}'",
                                report.failures.len(),
                                message.topic()
                            ));
                        }
                    }
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        info!("Reconnected to broker: {:?}", ack.code);
                        self.status.connection_state = ConnectionState::Connected;
                        self.status.touch();
                        dispatcher.subscribe_all().await;
                    }
                    Ok(Event::Incoming(Packet::SubAck(ack))) => {
                        debug!("Subscription acknowledged: {:?}", ack.return_codes);
                    }
                    Ok(Event::Outgoing(Outgoing::Publish(_))) => {
                        self.status.messages_sent += 1;
                        self.status.touch();
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if self.status.connection_state != ConnectionState::Reconnecting {
                            error!("Connection to broker lost: {}", e);
                        }
                        self.status.connection_state = ConnectionState::Reconnecting;
                        self.status.record_error(e.to_string());
                        backoff(delay, &cancel).await;
                    }
                }
            }
        }

        self.status
    }
}

/// Waits `delay` before the next reconnect attempt, returning early on cancel.
async fn backoff(delay: Duration, cancel: &CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(delay) => {}
    }
}
