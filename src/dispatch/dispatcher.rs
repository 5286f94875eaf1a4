//! The bridge between wire messages and typed variable state.
//!
//! # Inbound
//!
//! ```text
//! (topic, payload) ──► registry.variables_for_topic ──► decode per kind
//!                                                          │
//!                        notify_changed (once) ◄── store.write (on success)
//! ```
//!
//! # Outbound
//!
//! ```text
//! write(id, value) ──► [masked read-modify-write] ──► encode ──► transport.publish
//!                                                                     │
//!                                              store.write (on success) ◄┘
//! ```
//!
//! Registry, storage cells and the subscription flag sit behind one
//! `tokio::sync::Mutex`. A whole inbound message and a whole outbound
//! read-modify-write each run under a single acquisition, so a masked write
//! never interleaves with an update of the same bit-field.

use super::error::{ApplyError, BindingError, TransportError, WriteError};
use super::transport::Transport;
use crate::address::{TopicFormat, FULL_MASK};
use crate::codec::{self, Value, VariableKind};
use crate::host::ParamStore;
use crate::registry::{Variable, VariableId, VariableRegistry};
use std::collections::BTreeSet;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Settings passed to a dispatcher at construction
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Tags every log line of this dispatcher
    pub name: String,
    /// Retain flag used for every outbound publish
    pub retain_writes: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            name: "MqttDriver".to_string(),
            retain_writes: false,
        }
    }
}

/// What happened to one inbound message
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Variables whose storage cell received a new value
    pub updated: Vec<VariableId>,
    /// Variables left untouched, with the reason
    pub failures: Vec<(VariableId, ApplyError)>,
}

impl DispatchReport {
    /// `true` when no bound variable matched the topic.
    pub fn is_unmatched(&self) -> bool {
        self.updated.is_empty() && self.failures.is_empty()
    }
}

struct Core<H> {
    registry: VariableRegistry,
    store: H,
    subscribed: bool,
}

pub struct Dispatcher<T, H> {
    config: DispatcherConfig,
    transport: T,
    core: Mutex<Core<H>>,
}

impl<T: Transport, H: ParamStore> Dispatcher<T, H> {
    pub fn new(config: DispatcherConfig, transport: T, store: H) -> Self {
        info!(driver = %config.name, "Creating dispatcher");
        Self {
            config,
            transport,
            core: Mutex::new(Core {
                registry: VariableRegistry::new(),
                store,
                subscribed: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Registers a variable.
    ///
    /// Once [`subscribe_all`](Self::subscribe_all) has run, the first
    /// variable on a new topic subscribes that topic right away. A failing
    /// subscription is logged and does not undo the registration.
    pub async fn bind(&self, variable: Variable) -> Result<VariableId, BindingError> {
        let mut core = self.core.lock().await;
        let topic = variable.address().topic().to_string();
        let registration = core.registry.register(variable)?;

        if core.subscribed && registration.new_topic {
            if let Err(e) = self.transport.subscribe(&topic) {
                error!(driver = %self.config.name, %topic, "Subscription failed: {}", e);
            }
        }
        Ok(registration.id)
    }

    /// Parses a `PREFIX:TYPE` selector with its arguments and registers the
    /// resulting variable, applying an optional bit-field write mask.
    pub async fn bind_directive(
        &self,
        name: &str,
        selector: &str,
        arguments: &str,
        mask: Option<u32>,
    ) -> Result<VariableId, BindingError> {
        let mut variable = Variable::from_directive(name, selector, arguments)?;
        if let Some(mask) = mask {
            let address = variable.address().clone().with_write_mask(mask);
            variable = Variable::new(name, variable.kind(), address);
        }
        self.bind(variable).await
    }

    /// Subscribes every distinct bound topic in one transport request.
    ///
    /// Called at startup and after each reconnection of the transport.
    /// Returns the topics whose subscription request was refused.
    pub async fn subscribe_all(&self) -> Vec<(String, TransportError)> {
        let mut core = self.core.lock().await;
        core.subscribed = true;

        let topics: Vec<String> = core.registry.all_topics().into_iter().collect();
        if topics.is_empty() {
            debug!(driver = %self.config.name, "No topics to subscribe");
            return Vec::new();
        }

        match self.transport.subscribe_many(&topics) {
            Ok(()) => {
                debug!(
                    driver = %self.config.name,
                    "Subscription requested for {} topic(s)", topics.len()
                );
                Vec::new()
            }
            Err(e) => {
                error!(
                    driver = %self.config.name,
                    "Subscription of {} topic(s) failed: {}", topics.len(), e
                );
                topics.into_iter().map(|topic| (topic, e.clone())).collect()
            }
        }
    }

    /// Routes one inbound message to every variable bound to `topic`.
    ///
    /// A variable whose decode fails keeps its stored value; its siblings are
    /// still processed. Listeners are notified once for the whole message.
    pub async fn on_message(&self, topic: &str, payload: &str) -> DispatchReport {
        let mut core = self.core.lock().await;
        let Core {
            registry, store, ..
        } = &mut *core;

        let mut report = DispatchReport::default();
        let ids = registry.variables_for_topic(topic);
        if ids.is_empty() {
            debug!(driver = %self.config.name, %topic, "No variable bound, message dropped");
            return report;
        }

        for &id in ids {
            let Some(variable) = registry.get(id) else {
                continue;
            };
            match apply(variable, id, payload, store) {
                Ok(()) => report.updated.push(id),
                Err(e) => {
                    warn!(
                        driver = %self.config.name,
                        %topic,
                        %payload,
                        variable = %variable.name(),
                        "Unexpected value received: {}", e
                    );
                    report.failures.push((id, e));
                }
            }
        }

        if !report.updated.is_empty() {
            store.notify_changed(&report.updated);
        }
        report
    }

    /// Publishes a new value for a variable and stores it once the publish
    /// was accepted.
    ///
    /// Bit-field values go through the address write mask: with anything
    /// other than all-ones the published word is merged into the currently
    /// stored one.
    pub async fn write(&self, id: VariableId, value: Value) -> Result<(), WriteError> {
        let mut core = self.core.lock().await;
        let Core {
            registry, store, ..
        } = &mut *core;
        let variable = self.writable(registry, id, value.kind())?;

        let outgoing = match value {
            Value::Digital(word) => Value::Digital(merge_masked(
                store,
                id,
                variable,
                word,
                variable.address().write_mask(),
            )?),
            other => other,
        };
        self.publish(variable, &outgoing)?;
        self.commit(store, id, variable, outgoing);
        Ok(())
    }

    /// Publishes a bit-field word using `mask` instead of the address mask.
    pub async fn write_masked(&self, id: VariableId, word: u32, mask: u32) -> Result<(), WriteError> {
        let mut core = self.core.lock().await;
        let Core {
            registry, store, ..
        } = &mut *core;
        let variable = self.writable(registry, id, VariableKind::BitField32)?;

        let merged = Value::Digital(merge_masked(store, id, variable, word, mask)?);
        self.publish(variable, &merged)?;
        self.commit(store, id, variable, merged);
        Ok(())
    }

    /// Current stored value of a variable.
    pub async fn read(&self, id: VariableId) -> Option<Value> {
        self.core.lock().await.store.read(id)
    }

    /// Id and kind of the variable called `name`.
    pub async fn lookup(&self, name: &str) -> Option<(VariableId, VariableKind)> {
        let core = self.core.lock().await;
        core.registry
            .find_by_name(name)
            .map(|(id, variable)| (id, variable.kind()))
    }

    pub async fn topics(&self) -> BTreeSet<String> {
        self.core.lock().await.registry.all_topics()
    }

    pub async fn binding_count(&self) -> usize {
        self.core.lock().await.registry.len()
    }

    fn writable<'r>(
        &self,
        registry: &'r VariableRegistry,
        id: VariableId,
        kind: VariableKind,
    ) -> Result<&'r Variable, WriteError> {
        let variable = registry.get(id).ok_or(WriteError::UnknownVariable(id))?;
        if variable.address().format() == TopicFormat::Structured {
            warn!(
                driver = %self.config.name,
                variable = %variable.name(),
                "Write refused: structured topics are not supported"
            );
            return Err(WriteError::UnsupportedFormat(variable.name().to_string()));
        }
        if variable.kind() != kind {
            return Err(WriteError::KindMismatch {
                name: variable.name().to_string(),
                expected: variable.kind(),
                actual: kind,
            });
        }
        Ok(variable)
    }

    /// Stores an accepted publish; later masked writes merge into it.
    fn commit(&self, store: &mut H, id: VariableId, variable: &Variable, value: Value) {
        match store.write(id, value) {
            Ok(()) => store.notify_changed(&[id]),
            Err(e) => warn!(
                driver = %self.config.name,
                variable = %variable.name(),
                "Published value not stored: {}", e
            ),
        }
    }

    fn publish(&self, variable: &Variable, value: &Value) -> Result<(), WriteError> {
        let topic = variable.address().topic();
        let payload = codec::encode(value);
        match self
            .transport
            .publish(topic, payload.clone(), self.config.retain_writes)
        {
            Ok(()) => {
                debug!(driver = %self.config.name, %topic, %payload, "Publish requested");
                Ok(())
            }
            Err(e) => {
                error!(
                    driver = %self.config.name,
                    %topic,
                    "Failed to set value for topic: {}", e
                );
                Err(e.into())
            }
        }
    }
}

fn apply<H: ParamStore>(
    variable: &Variable,
    id: VariableId,
    payload: &str,
    store: &mut H,
) -> Result<(), ApplyError> {
    if variable.address().format() == TopicFormat::Structured {
        return Err(ApplyError::UnsupportedFormat);
    }
    let value = codec::decode(variable.kind(), payload)?;
    store.write(id, value)?;
    Ok(())
}

/// `(current & !mask) | (word & mask)`; all-ones masks skip the read.
fn merge_masked<H: ParamStore>(
    store: &H,
    id: VariableId,
    variable: &Variable,
    word: u32,
    mask: u32,
) -> Result<u32, WriteError> {
    if mask == FULL_MASK {
        return Ok(word);
    }
    match store.read(id) {
        Some(Value::Digital(current)) => Ok((current & !mask) | (word & mask)),
        _ => Err(WriteError::UndefinedBaseline(variable.name().to_string())),
    }
}
