// src/emit.rs

//! Destination file emission
//!
//! Serializes a validated [`DestinationConfig`] into named file contents
//! without touching the filesystem; the engine owns all writes. Output is
//! byte-deterministic for identical input (sorted map keys, fixed field
//! order, 2-space indentation, trailing newline) because the idempotency
//! gate and backup diffing both depend on stable bytes.

use crate::manifest::ManifestMapping;
use crate::schema::DestinationConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmitError {
    #[error("invalid destination config: {0}")]
    Invalid(String),

    #[error("serialization failed for {file}: {reason}")]
    Serialize { file: String, reason: String },

    #[error("duplicate output file: {0}")]
    DuplicateFile(String),
}

/// The in-memory result of emission
#[derive(Debug, Default)]
pub struct Emission {
    /// Relative filename to serialized text, sorted by filename
    pub files: BTreeMap<String, String>,
    /// One mapping per emitted file, in filename order
    pub mappings: Vec<ManifestMapping>,
}

impl Emission {
    pub fn file_names(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }
}

/// Serializes destination configs into file contents
#[derive(Debug, Default)]
pub struct Emitter;

impl Emitter {
    pub fn new() -> Self {
        Self
    }

    /// Emit all destination files, or fail closed producing none
    pub fn emit(&self, config: &DestinationConfig) -> Result<Emission, Vec<EmitError>> {
        if let Err(schema_errors) = config.validate() {
            return Err(schema_errors
                .into_iter()
                .map(|e| EmitError::Invalid(e.to_string()))
                .collect());
        }

        let mut emission = Emission::default();
        let mut errors = Vec::new();

        for cmd in &config.commands {
            let target = format!("commands/{}.json", cmd.name);
            add_file(&mut emission, &mut errors, &target, cmd, &cmd.source_file, cmd.transformed);
        }

        for agent in &config.agents {
            let target = format!("agents/{}.json", agent.name);
            add_file(
                &mut emission,
                &mut errors,
                &target,
                agent,
                &agent.source_file,
                agent.transformed,
            );
        }

        if !config.settings.is_empty() {
            add_file(
                &mut emission,
                &mut errors,
                "settings.json",
                &config.settings,
                "models",
                true,
            );
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        // Mappings follow filename order so the manifest is as deterministic
        // as the files themselves.
        emission.mappings.sort_by(|a, b| a.target.cmp(&b.target));
        Ok(emission)
    }
}

fn add_file<T: Serialize>(
    emission: &mut Emission,
    errors: &mut Vec<EmitError>,
    target: &str,
    value: &T,
    source: &str,
    transformed: bool,
) {
    let text = match to_stable_json(value) {
        Ok(text) => text,
        Err(e) => {
            errors.push(EmitError::Serialize {
                file: target.to_string(),
                reason: e.to_string(),
            });
            return;
        }
    };

    if emission.files.insert(target.to_string(), text).is_some() {
        errors.push(EmitError::DuplicateFile(target.to_string()));
        return;
    }

    emission.mappings.push(ManifestMapping {
        source: source.to_string(),
        target: target.to_string(),
        transformed,
    });
}

/// 2-space-indented JSON with a trailing newline
fn to_stable_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    Ok(text)
}
