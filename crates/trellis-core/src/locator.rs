//! Persisted locator model: how to find a label's elements again on a
//! structurally similar page.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::labels::{Label, PageType};

/// One of the three selector strategies. Closed sum type; the resolver
/// and synthesizer match exhaustively on it.
///
/// The wire shape is externally tagged and reproduces what the agent and
/// the persistence layer already speak:
/// `{"XPath": "…"}`, `{"HTMLClass": ["…"]}`,
/// `{"XPathExcept": {"x_path_use": "…", "x_path_remove": "…"}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Strategy {
    /// Match every element carrying any of these class names.
    #[serde(rename = "HTMLClass")]
    ByClassNames(Vec<String>),
    /// Match the node set of one structural path pattern.
    #[serde(rename = "XPath")]
    ByPath(String),
    /// Nodes matching `x_path_use` minus nodes matching `x_path_remove`.
    #[serde(rename = "XPathExcept")]
    ByPathExcept {
        x_path_use: String,
        x_path_remove: String,
    },
}

/// A strategy plus the per-label extras that travel with it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathLocator {
    #[serde(rename = "identifier")]
    pub strategy: Strategy,
    /// Date format for date-bearing labels, operator-supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
    /// The locator this one replaced, kept as a resolution fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior: Option<Box<PathLocator>>,
    /// Set when synthesis could not cleanly separate accepted from
    /// rejected elements; the operator should re-review this label.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub needs_review: bool,
}

impl PathLocator {
    pub fn new(strategy: Strategy) -> Self {
        PathLocator {
            strategy,
            date_format: None,
            prior: None,
            needs_review: false,
        }
    }
}

/// Complete Label → locator mapping for one page type of one platform.
///
/// Invariant: `entries` is total over `page_type.labels()`; a label that
/// could not be trained maps to `None` (explicit absent marker) rather
/// than being omitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Structure {
    pub page_type: PageType,
    #[serde(rename = "structural_elements")]
    pub entries: BTreeMap<Label, Option<PathLocator>>,
    /// Operator-authored one-shot script to run before the page is used.
    #[serde(default)]
    pub script: String,
}

impl Structure {
    /// An all-absent structure for `page_type`, total over its label list.
    pub fn empty(page_type: PageType) -> Self {
        let entries = page_type
            .labels()
            .iter()
            .map(|&label| (label, None))
            .collect();
        Structure {
            page_type,
            entries,
            script: String::new(),
        }
    }

    /// Labels outside the page type's list are ignored: `entries` stays
    /// keyed by exactly `page_type.labels()`.
    pub fn set(&mut self, label: Label, locator: Option<PathLocator>) {
        if !self.page_type.labels().contains(&label) {
            return;
        }
        self.entries.insert(label, locator);
    }

    pub fn get(&self, label: Label) -> Option<&PathLocator> {
        self.entries.get(&label).and_then(|e| e.as_ref())
    }

    /// True when no label has a locator.
    pub fn is_all_absent(&self) -> bool {
        self.entries.values().all(|e| e.is_none())
    }

    /// Labels flagged for operator re-review.
    pub fn flagged(&self) -> Vec<Label> {
        self.entries
            .iter()
            .filter(|(_, e)| e.as_ref().is_some_and(|l| l.needs_review))
            .map(|(&label, _)| label)
            .collect()
    }
}
