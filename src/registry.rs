//! Variable registry: the set of bound variables and a topic index over it.

use crate::address::{parse_address, split_selector, ParseError, TopicAddress};
use crate::codec::VariableKind;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Handle of a registered variable; also names its storage cell in the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(usize);

impl VariableId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("binding '{name}' duplicates '{existing}' ({kind} on {address})")]
    DuplicateBinding {
        name: String,
        existing: String,
        kind: VariableKind,
        address: String,
    },
}

/// A typed binding between one topic address and one host storage cell.
///
/// Kind and address are fixed for the variable's lifetime; the name is only
/// used for logging and for looking a variable up from the console.
#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    kind: VariableKind,
    address: TopicAddress,
}

impl Variable {
    pub fn new(name: impl Into<String>, kind: VariableKind, address: TopicAddress) -> Self {
        Self {
            name: name.into(),
            kind,
            address,
        }
    }

    /// Builds a variable from a `PREFIX:TYPE` selector and its argument string.
    pub fn from_directive(
        name: impl Into<String>,
        selector: &str,
        arguments: &str,
    ) -> Result<Self, ParseError> {
        let address = parse_address(selector, arguments)?;
        let kind = match split_selector(selector) {
            (_, Some(token)) => VariableKind::from_type_token(token)
                .ok_or_else(|| ParseError::UnknownType(token.to_string()))?,
            (_, None) => return Err(ParseError::MissingType(selector.to_string())),
        };
        Ok(Self::new(name, kind, address))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    pub fn address(&self) -> &TopicAddress {
        &self.address
    }
}

/// Outcome of a successful registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub id: VariableId,
    /// `true` when this is the first variable on its topic, i.e. the topic
    /// just became eligible for subscription.
    pub new_topic: bool,
}

/// Owns the configured variables and answers "which variables are bound to T".
#[derive(Debug, Default)]
pub struct VariableRegistry {
    variables: Vec<Variable>,
    by_topic: HashMap<String, Vec<VariableId>>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a variable unless one with the same address and kind exists.
    pub fn register(&mut self, variable: Variable) -> Result<Registration, RegistryError> {
        let topic = variable.address.topic().to_string();
        let siblings = self.by_topic.get(&topic).map(Vec::as_slice).unwrap_or(&[]);

        if let Some(existing) = siblings
            .iter()
            .map(|id| &self.variables[id.0])
            .find(|other| other.kind == variable.kind && other.address == variable.address)
        {
            return Err(RegistryError::DuplicateBinding {
                name: variable.name.clone(),
                existing: existing.name.clone(),
                kind: variable.kind,
                address: variable.address.to_string(),
            });
        }

        let id = VariableId(self.variables.len());
        let new_topic = siblings.is_empty();
        debug!(
            variable = %variable.name,
            kind = %variable.kind,
            %topic,
            new_topic,
            "Registered variable {}", id
        );
        self.variables.push(variable);
        self.by_topic.entry(topic).or_default().push(id);

        Ok(Registration { id, new_topic })
    }

    /// Every variable bound to `topic`, in registration order.
    pub fn variables_for_topic(&self, topic: &str) -> &[VariableId] {
        self.by_topic.get(topic).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct topics with at least one bound variable, sorted.
    pub fn all_topics(&self) -> BTreeSet<String> {
        self.by_topic.keys().cloned().collect()
    }

    pub fn get(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get(id.0)
    }

    pub fn find_by_name(&self, name: &str) -> Option<(VariableId, &Variable)> {
        self.iter().find(|(_, variable)| variable.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (VariableId, &Variable)> {
        self.variables
            .iter()
            .enumerate()
            .map(|(index, variable)| (VariableId(index), variable))
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
