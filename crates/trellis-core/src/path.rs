//! Structural path expressions and the DOM-free algebra over them.
//!
//! A path is a `/tag[i]/tag/…` chain where `i` is the 1-based rank of a
//! node among preceding siblings of the same tag. Canonical paths (as
//! produced by the page model) are anchored at the document root and
//! carry an index on every step; generalized paths may drop indices
//! (wildcard over siblings) or the root anchor (`//` prefix, match
//! anywhere). Several paths joined by `" | "` form a union.

use std::collections::BTreeSet;
use std::fmt;

use anyhow::{bail, Result};

/// One step of a path: a tag name plus an optional same-tag sibling rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub tag: String,
    pub index: Option<usize>,
}

/// A single parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    /// True when the path starts at the document root (`/html[1]/…`);
    /// false for `//…` expressions that may match at any depth.
    pub anchored: bool,
    pub steps: Vec<Step>,
}

/// A top-level union of path expressions (`a | b | c`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSet(pub Vec<PathExpr>);

impl PathExpr {
    /// Parse a single path expression (no union).
    pub fn parse(input: &str) -> Result<PathExpr> {
        let input = input.trim();
        if input.is_empty() {
            bail!("empty path expression");
        }
        let (anchored, rest) = if let Some(r) = input.strip_prefix("//") {
            (false, r)
        } else if let Some(r) = input.strip_prefix('/') {
            (true, r)
        } else {
            bail!("path must start with / or //: {input:?}");
        };
        let mut steps = Vec::new();
        for seg in rest.split('/') {
            if seg.is_empty() {
                bail!("empty step in path: {input:?}");
            }
            steps.push(parse_step(seg)?);
        }
        Ok(PathExpr { anchored, steps })
    }
}

fn parse_step(seg: &str) -> Result<Step> {
    match seg.find('[') {
        None => {
            if !is_tag(seg) {
                bail!("invalid tag name in step: {seg:?}");
            }
            Ok(Step {
                tag: seg.to_string(),
                index: None,
            })
        }
        Some(open) => {
            let tag = &seg[..open];
            let rest = &seg[open + 1..];
            let close = rest
                .find(']')
                .ok_or_else(|| anyhow::anyhow!("unclosed index in step: {seg:?}"))?;
            if close != rest.len() - 1 {
                bail!("trailing characters after index in step: {seg:?}");
            }
            let index: usize = rest[..close]
                .parse()
                .map_err(|_| anyhow::anyhow!("non-numeric index in step: {seg:?}"))?;
            if !is_tag(tag) || index == 0 {
                bail!("invalid step: {seg:?}");
            }
            Ok(Step {
                tag: tag.to_string(),
                index: Some(index),
            })
        }
    }
}

fn is_tag(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "{}[{i}]", self.tag),
            None => write!(f, "{}", self.tag),
        }
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.anchored {
            write!(f, "/")?;
        }
        for step in &self.steps {
            write!(f, "/{step}")?;
        }
        Ok(())
    }
}

impl PathSet {
    /// Parse a `" | "`-joined union of path expressions.
    pub fn parse(input: &str) -> Result<PathSet> {
        let mut exprs = Vec::new();
        for part in input.split('|') {
            exprs.push(PathExpr::parse(part)?);
        }
        Ok(PathSet(exprs))
    }
}

impl fmt::Display for PathSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, expr) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{expr}")?;
        }
        Ok(())
    }
}

// ── Generalization ──

/// Merge a set of concrete paths into their shared pattern.
///
/// Segments equal on both sides are kept as-is; segments whose tags match
/// but whose ranks differ lose the rank (wildcard); diverging tags are
/// dropped. Paths are first truncated to a common depth. When the merge
/// loses its root anchor the result is prefixed `//`.
pub fn common_path(paths: &[String]) -> Result<String> {
    if paths.is_empty() {
        bail!("no paths to generalize");
    }
    let mut working: Vec<String> = paths.to_vec();
    while working.len() > 1 {
        let pivot = working[0].clone();
        let mut merged = BTreeSet::new();
        for other in &working[1..] {
            merged.insert(common_path_of_pair(&pivot, other));
        }
        working = merged.into_iter().collect();
    }
    let head = &working[0];
    if head.starts_with('/') {
        Ok(head.clone())
    } else {
        Ok(format!("//{head}"))
    }
}

fn common_path_of_pair(a: &str, b: &str) -> String {
    let mut left: Vec<&str> = a.split('/').collect();
    let mut right: Vec<&str> = b.split('/').collect();
    let depth = left.len().min(right.len());
    left.truncate(depth);
    right.truncate(depth);

    let mut out: Vec<String> = Vec::new();
    for i in 0..depth {
        if left[i] == right[i] {
            out.push(left[i].to_string());
        } else {
            let ltag = left[i].split('[').next().unwrap_or("");
            let rtag = right[i].split('[').next().unwrap_or("");
            if ltag == rtag {
                out.push(ltag.to_string());
            }
        }
    }
    out.join("/")
}

/// Join several paths into one union expression.
pub fn join_union(paths: &[String]) -> Result<String> {
    if paths.is_empty() {
        bail!("no paths to join");
    }
    Ok(paths.join(" | "))
}
