// src/transform/mod.rs

//! IR to destination-schema transformation
//!
//! Maps parsed source units into the destination configuration, recording
//! every lossy or impossible mapping in the gap ledger. The policy is
//! record-instead-of-fail: a lossy-but-usable conversion beats blocking the
//! run, so only structurally invalid input is a terminal error here.

mod gaps;

pub use gaps::{Approximation, GapCategory, GapLedger, UnmappedField};

use crate::context::RunContext;
use crate::parser::{SourceIr, SourceUnit};
use crate::schema::{DestinationAgent, DestinationCommand, DestinationConfig};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;

/// Destination placeholder for command arguments
const DEST_ARGS_PLACEHOLDER: &str = "{{args}}";

/// A terminal transformation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformError {
    pub unit: String,
    pub message: String,
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.unit, self.message)
    }
}

/// Result of a successful transformation
#[derive(Debug)]
pub struct TransformOutput {
    pub config: DestinationConfig,
    pub gaps: GapLedger,
}

/// Apply the deterministic naming rule to a source identifier
///
/// `/namespace:leaf` becomes `namespace-leaf`: strip the leading marker,
/// replace the first namespace separator with a hyphen. Further separators
/// are left alone.
pub fn destination_name(source: &str) -> String {
    let stripped = source.strip_prefix('/').unwrap_or(source);
    stripped.replacen(':', "-", 1)
}

/// Transforms a [`SourceIr`] into a [`DestinationConfig`] plus gap ledger
pub struct Transformer {
    args_re: Regex,
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer {
    pub fn new() -> Self {
        Self {
            // \$ARGUMENTS not followed by an identifier character
            args_re: Regex::new(r"\$ARGUMENTS\b").expect("static regex"),
        }
    }

    /// Transform the IR, or return the structural errors that make it
    /// untransformable
    pub fn transform(
        &self,
        ir: &SourceIr,
        ctx: &mut RunContext,
    ) -> Result<TransformOutput, Vec<TransformError>> {
        let errors = self.structural_errors(ir);
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut gaps = GapLedger::new();
        let mut config = DestinationConfig::default();

        for unit in &ir.commands {
            let command = self.transform_command(unit, &mut gaps);
            merge_by_name(
                &mut config.commands,
                command,
                |c| c.name.clone(),
                |c| c.source_file.clone(),
                ctx,
            );
        }

        for unit in &ir.agents {
            let agent = self.transform_agent(unit, &mut gaps);
            merge_by_name(
                &mut config.agents,
                agent,
                |a| a.name.clone(),
                |a| a.source_file.clone(),
                ctx,
            );
        }

        for unit in &ir.models {
            self.transform_model(unit, &mut config, &mut gaps, ctx);
        }

        ctx.info(format!(
            "transformed {} unit(s); {}",
            ir.unit_count(),
            gaps.summary()
        ));

        Ok(TransformOutput { config, gaps })
    }

    fn structural_errors(&self, ir: &SourceIr) -> Vec<TransformError> {
        let mut errors = Vec::new();
        for unit in ir
            .commands
            .iter()
            .chain(ir.agents.iter())
            .chain(ir.models.iter())
        {
            if destination_name(&unit.name).is_empty() {
                errors.push(TransformError {
                    unit: unit.relative.clone(),
                    message: "derived name is empty".to_string(),
                });
            }
        }
        errors
    }

    fn transform_command(&self, unit: &SourceUnit, gaps: &mut GapLedger) -> DestinationCommand {
        let name = destination_name(&unit.name);
        let description = self.map_description(unit);
        let (prompt, body_rewritten) = self.map_body(unit, gaps);
        let model = self.map_model(unit, gaps);
        self.record_unmapped_extras(unit, gaps);

        let name_changed = name != unit.name.strip_prefix('/').unwrap_or(&unit.name);
        DestinationCommand {
            name,
            description,
            prompt,
            model,
            source_file: unit.relative.clone(),
            transformed: name_changed || body_rewritten,
        }
    }

    fn transform_agent(&self, unit: &SourceUnit, gaps: &mut GapLedger) -> DestinationAgent {
        let name = destination_name(&unit.name);
        let description = self.map_description(unit);
        let (instructions, body_rewritten) = self.map_body(unit, gaps);
        let model = self.map_model(unit, gaps);
        self.record_unmapped_extras(unit, gaps);

        let name_changed = name != unit.name.strip_prefix('/').unwrap_or(&unit.name);
        DestinationAgent {
            name,
            description,
            instructions,
            model,
            source_file: unit.relative.clone(),
            transformed: name_changed || body_rewritten,
        }
    }

    /// Model units configure destination model aliases centrally; a unit
    /// without a declared target produces a gap entry instead of an alias.
    fn transform_model(
        &self,
        unit: &SourceUnit,
        config: &mut DestinationConfig,
        gaps: &mut GapLedger,
        ctx: &mut RunContext,
    ) {
        let alias = destination_name(&unit.name);
        match &unit.frontmatter.model {
            Some(model) => match map_model_tier(model) {
                Some(tier) => {
                    gaps.add_approximation(
                        format!("model: {}", model),
                        tier,
                        "destination model tiers are coarser than source model names",
                        unit.relative.clone(),
                        GapCategory::Platform,
                    );
                    if config
                        .settings
                        .model_aliases
                        .insert(alias.clone(), tier.to_string())
                        .is_some()
                    {
                        ctx.warn(format!(
                            "duplicate model alias '{}' from {}; newest definition wins",
                            alias, unit.relative
                        ));
                    }
                }
                None => {
                    gaps.add_unmapped(
                        "model",
                        format!("no destination model equivalent for '{}'", model),
                        Some("configure a custom model alias on the destination platform".to_string()),
                        unit.relative.clone(),
                        GapCategory::MissingDependency,
                    );
                }
            },
            None => {
                gaps.add_unmapped(
                    "model",
                    "model unit declares no destination target",
                    Some("add a `model:` field naming the source model to map".to_string()),
                    unit.relative.clone(),
                    GapCategory::MissingDependency,
                );
            }
        }
        self.record_unmapped_extras(unit, gaps);
    }

    fn map_description(&self, unit: &SourceUnit) -> String {
        match &unit.description {
            Some(description) => description.clone(),
            None => {
                let file_name = std::path::Path::new(&unit.relative)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| unit.relative.clone());
                format!("Converted from {}", file_name)
            }
        }
    }

    /// Rewrite source placeholders into destination syntax
    ///
    /// One approximation is recorded per unit regardless of occurrence count:
    /// the lossy field is the body, not each occurrence.
    fn map_body(&self, unit: &SourceUnit, gaps: &mut GapLedger) -> (String, bool) {
        if !self.args_re.is_match(&unit.body) {
            return (unit.body.clone(), false);
        }

        let rewritten = self
            .args_re
            .replace_all(&unit.body, DEST_ARGS_PLACEHOLDER)
            .into_owned();
        gaps.add_approximation(
            "$ARGUMENTS",
            DEST_ARGS_PLACEHOLDER,
            "destination uses a different argument placeholder syntax",
            unit.relative.clone(),
            GapCategory::Platform,
        );
        (rewritten, true)
    }

    fn map_model(&self, unit: &SourceUnit, gaps: &mut GapLedger) -> Option<String> {
        let model = unit.frontmatter.model.as_deref()?;
        match map_model_tier(model) {
            Some(tier) => {
                gaps.add_approximation(
                    format!("model: {}", model),
                    tier,
                    "destination model tiers are coarser than source model names",
                    unit.relative.clone(),
                    GapCategory::Platform,
                );
                Some(tier.to_string())
            }
            None => {
                gaps.add_unmapped(
                    "model",
                    format!("no destination model equivalent for '{}'", model),
                    Some("configure a custom model alias on the destination platform".to_string()),
                    unit.relative.clone(),
                    GapCategory::MissingDependency,
                );
                None
            }
        }
    }

    /// Report fields the destination has no equivalent for, one entry each
    fn record_unmapped_extras(&self, unit: &SourceUnit, gaps: &mut GapLedger) {
        let fm = &unit.frontmatter;

        if let Some(tools) = &fm.allowed_tools {
            gaps.add_unmapped(
                "allowed-tools",
                format!(
                    "destination has no per-command tool allowlist (was: {})",
                    value_summary(tools)
                ),
                Some("grant the tools globally in destination settings".to_string()),
                unit.relative.clone(),
                GapCategory::Platform,
            );
        }

        if fm.argument_hint.is_some() {
            gaps.add_unmapped(
                "argument-hint",
                "destination does not surface argument hints",
                None,
                unit.relative.clone(),
                GapCategory::Unsupported,
            );
        }

        if fm.hooks.is_some() {
            gaps.add_unmapped(
                "hooks",
                "destination has no command hook mechanism",
                None,
                unit.relative.clone(),
                GapCategory::Unsupported,
            );
        }

        for key in fm.extra.keys() {
            gaps.add_unmapped(
                key.clone(),
                "unrecognized source field",
                None,
                unit.relative.clone(),
                GapCategory::Unsupported,
            );
        }
    }
}

/// Compact single-line rendering of a frontmatter value for gap reasons
fn value_summary(value: &serde_yaml::Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim().replace('\n', ", "))
        .unwrap_or_else(|_| "<unrepresentable>".to_string())
}

/// Map a source model name onto a destination tier, if one fits
fn map_model_tier(model: &str) -> Option<&'static str> {
    let lowered = model.to_lowercase();
    if lowered.contains("haiku") {
        Some("fast")
    } else if lowered.contains("sonnet") {
        Some("standard")
    } else if lowered.contains("opus") {
        Some("advanced")
    } else {
        None
    }
}

/// Insert a definition, letting the newest win on a name collision
fn merge_by_name<T>(
    items: &mut Vec<T>,
    item: T,
    name_of: impl Fn(&T) -> String,
    source_of: impl Fn(&T) -> String,
    ctx: &mut RunContext,
) {
    let mut index: HashMap<String, usize> = HashMap::new();
    for (i, existing) in items.iter().enumerate() {
        index.insert(name_of(existing), i);
    }

    let name = name_of(&item);
    if let Some(&i) = index.get(&name) {
        ctx.warn(format!(
            "destination name collision on '{}': {} replaces {}",
            name,
            source_of(&item),
            source_of(&items[i])
        ));
        items[i] = item;
    } else {
        items.push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Frontmatter;
    use std::path::PathBuf;

    fn unit(name: &str, relative: &str, body: &str) -> SourceUnit {
        SourceUnit {
            file: PathBuf::from(format!("/src/{}", relative)),
            relative: relative.to_string(),
            name: name.to_string(),
            description: Some("A description".to_string()),
            body: body.to_string(),
            frontmatter: Frontmatter::default(),
        }
    }

    #[test]
    fn test_destination_name_rule() {
        assert_eq!(destination_name("/gsd:plan-phase"), "gsd-plan-phase");
        assert_eq!(destination_name("/gsd:execute"), "gsd-execute");
        assert_eq!(destination_name("/execute"), "execute");
        // No marker is tolerated; only the first separator is replaced
        assert_eq!(destination_name("a:b:c"), "a-b:c");
    }

    #[test]
    fn test_transform_rewrites_arguments_placeholder() {
        let mut ir = SourceIr::default();
        ir.commands.push(unit(
            "/gsd:plan-phase",
            "commands/gsd/plan-phase.md",
            "Plan for $ARGUMENTS and again $ARGUMENTS\n",
        ));

        let mut ctx = RunContext::new();
        let out = Transformer::new().transform(&ir, &mut ctx).unwrap();

        let cmd = &out.config.commands[0];
        assert_eq!(cmd.name, "gsd-plan-phase");
        assert_eq!(cmd.prompt, "Plan for {{args}} and again {{args}}\n");
        assert!(cmd.transformed);
        // One approximation per unit, not per occurrence
        assert_eq!(out.gaps.approximations.len(), 1);
        assert_eq!(out.gaps.approximations[0].original, "$ARGUMENTS");
    }

    #[test]
    fn test_transform_fallback_description() {
        let mut ir = SourceIr::default();
        let mut u = unit("/bare", "commands/bare.md", "body\n");
        u.description = None;
        ir.commands.push(u);

        let mut ctx = RunContext::new();
        let out = Transformer::new().transform(&ir, &mut ctx).unwrap();
        assert_eq!(out.config.commands[0].description, "Converted from bare.md");
    }

    #[test]
    fn test_unmapped_fields_exactly_once_each() {
        let mut ir = SourceIr::default();
        let mut u = unit("/tooled", "commands/tooled.md", "body\n");
        u.frontmatter.allowed_tools = Some(serde_yaml::Value::String("Bash, Read".to_string()));
        u.frontmatter.argument_hint = Some("[phase]".to_string());
        u.frontmatter.hooks = Some(serde_yaml::Value::String("pre".to_string()));
        u.frontmatter
            .extra
            .insert("custom-flag".to_string(), serde_yaml::Value::Bool(true));
        ir.commands.push(u);

        let mut ctx = RunContext::new();
        let out = Transformer::new().transform(&ir, &mut ctx).unwrap();

        let fields: Vec<&str> = out
            .gaps
            .unmapped_fields
            .iter()
            .map(|f| f.field.as_str())
            .collect();
        assert_eq!(fields, ["allowed-tools", "argument-hint", "hooks", "custom-flag"]);
        assert_eq!(out.gaps.approximations.len(), 0);
    }

    #[test]
    fn test_model_tier_approximation() {
        let mut ir = SourceIr::default();
        let mut u = unit("/planner", "commands/planner.md", "body\n");
        u.frontmatter.model = Some("claude-sonnet-4".to_string());
        ir.commands.push(u);

        let mut ctx = RunContext::new();
        let out = Transformer::new().transform(&ir, &mut ctx).unwrap();
        assert_eq!(out.config.commands[0].model.as_deref(), Some("standard"));
        assert_eq!(out.gaps.approximations.len(), 1);
        assert_eq!(out.gaps.approximations[0].category, GapCategory::Platform);
    }

    #[test]
    fn test_unknown_model_is_unmapped() {
        let mut ir = SourceIr::default();
        let mut u = unit("/odd", "commands/odd.md", "body\n");
        u.frontmatter.model = Some("mystery-9000".to_string());
        ir.commands.push(u);

        let mut ctx = RunContext::new();
        let out = Transformer::new().transform(&ir, &mut ctx).unwrap();
        assert!(out.config.commands[0].model.is_none());
        assert_eq!(out.gaps.unmapped_fields.len(), 1);
        assert_eq!(
            out.gaps.unmapped_fields[0].category,
            GapCategory::MissingDependency
        );
    }

    #[test]
    fn test_collision_newest_wins() {
        let mut ir = SourceIr::default();
        // Distinct source names that collapse to one destination name
        ir.commands.push(unit("/gsd:run", "commands/gsd/run.md", "old\n"));
        ir.commands.push(unit("/gsd-run", "commands/gsd-run.md", "new\n"));

        let mut ctx = RunContext::new();
        let out = Transformer::new().transform(&ir, &mut ctx).unwrap();
        assert_eq!(out.config.commands.len(), 1);
        assert_eq!(out.config.commands[0].prompt, "new\n");
        assert!(ctx.warnings().iter().any(|w| w.contains("collision")));
    }

    #[test]
    fn test_model_units_fold_into_settings() {
        let mut ir = SourceIr::default();
        let mut u = unit("/default", "models/default.md", "");
        u.frontmatter.model = Some("claude-opus-4".to_string());
        ir.models.push(u);

        let mut ctx = RunContext::new();
        let out = Transformer::new().transform(&ir, &mut ctx).unwrap();
        assert_eq!(
            out.config.settings.model_aliases.get("default").map(String::as_str),
            Some("advanced")
        );
    }

    #[test]
    fn test_empty_derived_name_is_terminal() {
        let mut ir = SourceIr::default();
        ir.commands.push(unit("/", "commands/???.md", "body\n"));

        let mut ctx = RunContext::new();
        let errors = Transformer::new().transform(&ir, &mut ctx).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("empty"));
    }
}
