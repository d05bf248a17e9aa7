// tests/common/mod.rs

//! Shared fixtures and helpers for integration tests.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::fs;
use std::path::Path;

/// Write one source file, creating parent directories
pub fn write_unit(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A source tree with two commands: one with a derivable description, one
/// without any description.
pub fn two_unit_source(root: &Path) {
    write_unit(
        root,
        "commands/gsd/plan-phase.md",
        "---\ndescription: Plan the next phase\n---\n\nPlan the phase for $ARGUMENTS.\n",
    );
    write_unit(
        root,
        "commands/gsd/execute.md",
        "Run the current phase without further questions.\n",
    );
}

/// A richer tree exercising agents, models, and gap-producing frontmatter
pub fn full_source(root: &Path) {
    two_unit_source(root);
    write_unit(
        root,
        "commands/review.md",
        "---\ndescription: Review changes\nallowed-tools: Bash, Read\nargument-hint: \"[pr-number]\"\nmodel: claude-3-5-haiku\n---\n\n# Review\n\nReview $ARGUMENTS carefully.\n",
    );
    write_unit(
        root,
        "agents/helper.md",
        "---\ndescription: General helper agent\nmodel: sonnet\n---\n\nYou are a helpful assistant.\n",
    );
    write_unit(
        root,
        "models/default.md",
        "---\nmodel: claude-opus-4\n---\n",
    );
}
