// src/parser/mod.rs

//! Source corpus scanner
//!
//! Reads a tree of markdown command specifications into the intermediate
//! representation consumed by the transformer. The layout mirrors the source
//! platform's conventions: one markdown file per unit, grouped under
//! `commands/`, `agents/`, and `models/` with optional one-level namespace
//! directories (`commands/gsd/plan-phase.md` is invoked as
//! `/gsd:plan-phase`).
//!
//! The scan is tolerant by policy: a missing kind directory yields an empty
//! collection, an unreadable or malformed file is skipped with a warning,
//! and only a missing source root fails the parse outright.

use crate::context::RunContext;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// The kinds of convertible units recognized in a source tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Commands,
    Agents,
    Models,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [Self::Commands, Self::Agents, Self::Models];

    /// Directory name under the source root holding this kind
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Commands => "commands",
            Self::Agents => "agents",
            Self::Models => "models",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// Frontmatter block recognized at the top of a source unit
///
/// Keys the source platform defines are typed; anything else lands in
/// `extra` so the transformer can report it instead of dropping it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Frontmatter {
    pub description: Option<String>,

    pub model: Option<String>,

    #[serde(rename = "allowed-tools")]
    pub allowed_tools: Option<serde_yaml::Value>,

    #[serde(rename = "argument-hint")]
    pub argument_hint: Option<String>,

    pub hooks: Option<serde_yaml::Value>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// One convertible entity from the source tree
#[derive(Debug, Clone)]
pub struct SourceUnit {
    /// Absolute path of the source file
    pub file: PathBuf,
    /// Path relative to the source root, forward-slash separated
    pub relative: String,
    /// Derived invocation name, e.g. `/gsd:plan-phase`
    pub name: String,
    /// Description from frontmatter or the first `#` heading
    pub description: Option<String>,
    /// Markdown body with any frontmatter block removed
    pub body: String,
    pub frontmatter: Frontmatter,
}

/// Intermediate representation of one source scan
///
/// Created fresh each run and never persisted.
#[derive(Debug, Default)]
pub struct SourceIr {
    pub commands: Vec<SourceUnit>,
    pub agents: Vec<SourceUnit>,
    pub models: Vec<SourceUnit>,
}

impl SourceIr {
    pub fn unit_count(&self) -> usize {
        self.commands.len() + self.agents.len() + self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unit_count() == 0
    }

    pub fn units_of(&self, kind: SourceKind) -> &[SourceUnit] {
        match kind {
            SourceKind::Commands => &self.commands,
            SourceKind::Agents => &self.agents,
            SourceKind::Models => &self.models,
        }
    }

    fn units_of_mut(&mut self, kind: SourceKind) -> &mut Vec<SourceUnit> {
        match kind {
            SourceKind::Commands => &mut self.commands,
            SourceKind::Agents => &mut self.agents,
            SourceKind::Models => &mut self.models,
        }
    }
}

/// A parse failure tied to a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub file: String,
    pub line: Option<usize>,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: {}", self.file, line, self.message),
            None => write!(f, "{}: {}", self.file, self.message),
        }
    }
}

/// Scan a source root into the intermediate representation
///
/// Fails only when the root itself is unusable; individual files degrade to
/// warnings on the context.
pub fn parse_source_tree(root: &Path, ctx: &mut RunContext) -> Result<SourceIr, Vec<ParseError>> {
    if !root.is_dir() {
        return Err(vec![ParseError {
            file: root.display().to_string(),
            line: None,
            message: "source root not found or not a directory".to_string(),
        }]);
    }

    let mut ir = SourceIr::default();
    for kind in SourceKind::ALL {
        scan_kind(root, kind, &mut ir, ctx);
    }

    ctx.info(format!(
        "parsed {} source units ({} commands, {} agents, {} models)",
        ir.unit_count(),
        ir.commands.len(),
        ir.agents.len(),
        ir.models.len()
    ));

    Ok(ir)
}

fn scan_kind(root: &Path, kind: SourceKind, ir: &mut SourceIr, ctx: &mut RunContext) {
    let dir = root.join(kind.dir_name());
    if !dir.is_dir() {
        // Absent kind directory is an empty collection, not an error
        return;
    }

    let mut files: Vec<PathBuf> = WalkDir::new(&dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !file_name_hidden(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "md"))
        .map(|e| e.into_path())
        .collect();
    // Stable scan order: lexicographic by path
    files.sort();

    for file in files {
        let rel_in_kind = match file.strip_prefix(&dir) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => continue,
        };
        let relative = format!("{}/{}", kind.dir_name(), normalize(&rel_in_kind));

        let text = match std::fs::read_to_string(&file) {
            Ok(text) => text,
            Err(e) => {
                ctx.warn(format!("skipping unreadable file {}: {}", relative, e));
                continue;
            }
        };

        let unit = build_unit(file, relative, &rel_in_kind, &text, ctx);

        let units = ir.units_of_mut(kind);
        if let Some(existing) = units.iter_mut().find(|u| u.name == unit.name) {
            ctx.warn(format!(
                "duplicate name {} in {} replaces definition from {}",
                unit.name, unit.relative, existing.relative
            ));
            *existing = unit;
        } else {
            units.push(unit);
        }
    }
}

fn build_unit(
    file: PathBuf,
    relative: String,
    rel_in_kind: &Path,
    text: &str,
    ctx: &mut RunContext,
) -> SourceUnit {
    let (frontmatter_text, body) = split_frontmatter(text);

    let frontmatter = match frontmatter_text {
        Some(raw) => match serde_yaml::from_str::<Frontmatter>(raw) {
            Ok(fm) => fm,
            Err(e) => {
                ctx.warn(format!(
                    "malformed frontmatter in {}: {}; using body only",
                    relative, e
                ));
                Frontmatter::default()
            }
        },
        None => Frontmatter::default(),
    };

    let description = frontmatter
        .description
        .clone()
        .or_else(|| first_heading(&body));
    if description.is_none() {
        ctx.warn(format!(
            "no description found in {}; a fallback will be generated",
            relative
        ));
    }

    SourceUnit {
        file,
        name: derive_name(rel_in_kind),
        relative,
        description,
        body,
        frontmatter,
    }
}

/// Derive the platform invocation name from a path within a kind directory
///
/// `gsd/plan-phase.md` becomes `/gsd:plan-phase`; a file directly under the
/// kind directory has no namespace part.
fn derive_name(rel_in_kind: &Path) -> String {
    let mut parts: Vec<String> = rel_in_kind
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if let Some(last) = parts.last_mut() {
        if let Some(stem) = Path::new(last.as_str()).file_stem() {
            *last = stem.to_string_lossy().into_owned();
        }
    }
    format!("/{}", parts.join(":"))
}

/// Split a leading `---` delimited frontmatter block from the body
///
/// Returns the raw frontmatter text (without delimiters) and the remaining
/// body. Input without a leading delimiter is all body.
fn split_frontmatter(text: &str) -> (Option<&str>, String) {
    let mut lines = text.lines();
    if lines.next().map(str::trim_end) != Some("---") {
        return (None, text.to_string());
    }

    let after_open = &text[text.find('\n').map(|i| i + 1).unwrap_or(text.len())..];
    for (offset, line) in after_open.lines().scan(0usize, |pos, line| {
        let start = *pos;
        *pos += line.len() + 1;
        Some((start, line))
    }) {
        if line.trim_end() == "---" {
            let frontmatter = &after_open[..offset];
            let body_start = offset + line.len() + 1;
            let body = after_open.get(body_start..).unwrap_or("");
            return (Some(frontmatter), body.trim_start_matches('\n').to_string());
        }
    }

    // Unterminated block: treat the whole input as body
    (None, text.to_string())
}

/// Extract the text of the first `# ` heading, if any
fn first_heading(body: &str) -> Option<String> {
    body.lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn file_name_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn normalize(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_derive_name_with_namespace() {
        assert_eq!(derive_name(Path::new("gsd/plan-phase.md")), "/gsd:plan-phase");
        assert_eq!(derive_name(Path::new("execute.md")), "/execute");
        assert_eq!(derive_name(Path::new("a/b/c.md")), "/a:b:c");
    }

    #[test]
    fn test_split_frontmatter() {
        let (fm, body) = split_frontmatter("---\ndescription: Hi\n---\n\nBody text\n");
        assert_eq!(fm, Some("description: Hi\n"));
        assert_eq!(body, "Body text\n");
    }

    #[test]
    fn test_split_frontmatter_absent() {
        let (fm, body) = split_frontmatter("# Title\n\nBody\n");
        assert!(fm.is_none());
        assert_eq!(body, "# Title\n\nBody\n");
    }

    #[test]
    fn test_split_frontmatter_unterminated() {
        let (fm, body) = split_frontmatter("---\ndescription: Hi\nno closer\n");
        assert!(fm.is_none());
        assert!(body.contains("no closer"));
    }

    #[test]
    fn test_first_heading() {
        assert_eq!(first_heading("# Plan a phase\n\ntext"), Some("Plan a phase".to_string()));
        assert_eq!(first_heading("## sub only\ntext"), None);
        assert_eq!(first_heading("body\n# Late heading\n"), Some("Late heading".to_string()));
    }

    #[test]
    fn test_missing_subdirectories_yield_empty_ir() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = RunContext::new();
        let ir = parse_source_tree(dir.path(), &mut ctx).unwrap();
        assert!(ir.is_empty());
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let mut ctx = RunContext::new();
        let errors = parse_source_tree(Path::new("/nonexistent/cmdport-src"), &mut ctx).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("source root"));
    }

    #[test]
    fn test_scan_extracts_description_and_frontmatter() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "commands/gsd/plan-phase.md",
            "---\ndescription: Plan the next phase\nmodel: sonnet\n---\n\nDo the planning for $ARGUMENTS\n",
        );
        write(dir.path(), "commands/execute.md", "# Execute a phase\n\nRun it.\n");

        let mut ctx = RunContext::new();
        let ir = parse_source_tree(dir.path(), &mut ctx).unwrap();
        assert_eq!(ir.commands.len(), 2);

        // Sorted scan: execute.md before gsd/plan-phase.md
        let execute = &ir.commands[0];
        assert_eq!(execute.name, "/execute");
        assert_eq!(execute.description.as_deref(), Some("Execute a phase"));

        let plan = &ir.commands[1];
        assert_eq!(plan.name, "/gsd:plan-phase");
        assert_eq!(plan.description.as_deref(), Some("Plan the next phase"));
        assert_eq!(plan.frontmatter.model.as_deref(), Some("sonnet"));
        assert!(plan.body.contains("$ARGUMENTS"));
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn test_missing_description_warns_but_parses() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "commands/bare.md", "Just a body with no heading.\n");

        let mut ctx = RunContext::new();
        let ir = parse_source_tree(dir.path(), &mut ctx).unwrap();
        assert_eq!(ir.commands.len(), 1);
        assert!(ir.commands[0].description.is_none());
        assert!(ctx.warnings().iter().any(|w| w.contains("no description found")));
    }

    #[test]
    fn test_malformed_frontmatter_degrades_to_warning() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "commands/broken.md",
            "---\ndescription: [unclosed\n---\n# Broken\n\nBody\n",
        );

        let mut ctx = RunContext::new();
        let ir = parse_source_tree(dir.path(), &mut ctx).unwrap();
        assert_eq!(ir.commands.len(), 1);
        // Heading still provides the description
        assert_eq!(ir.commands[0].description.as_deref(), Some("Broken"));
        assert!(ctx.warnings().iter().any(|w| w.contains("malformed frontmatter")));
    }

    #[test]
    fn test_duplicate_name_newest_wins() {
        let dir = tempfile::tempdir().unwrap();
        // A flat file with a ':' in its stem derives the same name as a
        // namespaced file: both of these are /ns:dup.
        write(dir.path(), "commands/ns:dup.md", "# Flat form\n\nold\n");
        write(dir.path(), "commands/ns/dup.md", "# Nested form\n\nnew\n");

        let mut ctx = RunContext::new();
        let ir = parse_source_tree(dir.path(), &mut ctx).unwrap();
        assert_eq!(ir.commands.len(), 1);
        assert_eq!(ir.commands[0].name, "/ns:dup");
        // Sorted scan visits "ns/dup.md" before "ns:dup.md" ('/' < ':'), so
        // the flat definition is the newest and wins.
        assert_eq!(ir.commands[0].description.as_deref(), Some("Flat form"));
        assert!(ctx.warnings().iter().any(|w| w.contains("duplicate name")));
    }

    #[test]
    fn test_extra_frontmatter_keys_preserved() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "agents/helper.md",
            "---\ndescription: Helper agent\ncustom-flag: true\n---\n\nYou are a helper.\n",
        );

        let mut ctx = RunContext::new();
        let ir = parse_source_tree(dir.path(), &mut ctx).unwrap();
        assert_eq!(ir.agents.len(), 1);
        assert!(ir.agents[0].frontmatter.extra.contains_key("custom-flag"));
    }
}
