// src/schema.rs

//! Destination platform configuration schema
//!
//! Data structures for the destination's JSON-based command configuration,
//! plus the validation the emitter relies on to fail closed. Field order in
//! these structs is the serialization order, so it is part of the
//! byte-stability contract.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SchemaError {
    #[error("duplicate destination name: {0}")]
    DuplicateName(String),

    #[error("empty destination name (from {0})")]
    EmptyName(String),
}

/// A destination command definition
#[derive(Debug, Clone, Serialize)]
pub struct DestinationCommand {
    pub name: String,
    pub description: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Source file this command was converted from (not serialized)
    #[serde(skip)]
    pub source_file: String,
    /// Whether the conversion changed the name or rewrote the body
    #[serde(skip)]
    pub transformed: bool,
}

/// A destination agent definition
#[derive(Debug, Clone, Serialize)]
pub struct DestinationAgent {
    pub name: String,
    pub description: String,
    pub instructions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip)]
    pub source_file: String,
    #[serde(skip)]
    pub transformed: bool,
}

/// Destination-wide settings, emitted as a single `settings.json`
///
/// Model units fold into `model_aliases` here: the destination platform
/// configures models centrally rather than per file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DestinationSettings {
    pub model_aliases: BTreeMap<String, String>,
}

impl DestinationSettings {
    pub fn is_empty(&self) -> bool {
        self.model_aliases.is_empty()
    }
}

/// The complete destination configuration produced by one transform
#[derive(Debug, Clone, Default)]
pub struct DestinationConfig {
    pub commands: Vec<DestinationCommand>,
    pub agents: Vec<DestinationAgent>,
    pub settings: DestinationSettings,
}

impl DestinationConfig {
    /// Validate invariants the emitter depends on
    ///
    /// The transformer already resolves name collisions (newest definition
    /// wins), so a violation here means a pipeline bug; the emitter still
    /// checks and fails closed rather than writing a broken tree.
    pub fn validate(&self) -> Result<(), Vec<SchemaError>> {
        let mut errors = Vec::new();

        let mut seen = HashSet::new();
        for cmd in &self.commands {
            if cmd.name.is_empty() {
                errors.push(SchemaError::EmptyName(cmd.source_file.clone()));
            } else if !seen.insert(&cmd.name) {
                errors.push(SchemaError::DuplicateName(cmd.name.clone()));
            }
        }

        let mut seen = HashSet::new();
        for agent in &self.agents {
            if agent.name.is_empty() {
                errors.push(SchemaError::EmptyName(agent.source_file.clone()));
            } else if !seen.insert(&agent.name) {
                errors.push(SchemaError::DuplicateName(agent.name.clone()));
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}
