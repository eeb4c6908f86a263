//! The double-check pass: re-resolve an agent-confirmed structure
//! against the materialized page so the operator can visually verify it.
//!
//! Read-only by construction — the pass cannot mutate labeling state;
//! its only outcomes are confirm and adjust.

use std::collections::BTreeMap;

use trellis_core::{Label, Structure};
use trellis_dom::{ElementRef, PageModel};

use crate::resolve::resolve_locator;
use crate::session::UiEffect;

/// Operator verdict on a double-check pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Confirm,
    Adjust,
}

/// A structure resolved against a fresh page for visual confirmation.
#[derive(Debug)]
pub struct DoubleCheckPass {
    structure: Structure,
    resolved: BTreeMap<Label, Vec<ElementRef>>,
    /// Labels whose locator matched nothing on this page. Not an error:
    /// forums evolve, the operator just gets to re-label them.
    missing: Vec<Label>,
}

impl DoubleCheckPass {
    pub fn resolve(structure: Structure, page: &PageModel) -> Self {
        let mut resolved = BTreeMap::new();
        let mut missing = Vec::new();
        for (&label, entry) in &structure.entries {
            let Some(locator) = entry else { continue };
            let found = resolve_locator(locator, page);
            if found.is_empty() {
                missing.push(label);
            } else {
                resolved.insert(label, found);
            }
        }
        DoubleCheckPass {
            structure,
            resolved,
            missing,
        }
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    pub fn resolved(&self, label: Label) -> &[ElementRef] {
        self.resolved.get(&label).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn missing(&self) -> &[Label] {
        &self.missing
    }

    /// Highlighting and notices for the viewer: every resolved element
    /// in its label color, one notice per missing label.
    pub fn effects(&self) -> Vec<UiEffect> {
        let mut effects = Vec::new();
        for (&label, els) in &self.resolved {
            for &element in els {
                effects.push(UiEffect::Highlight {
                    element,
                    color: label.display_color(),
                });
            }
        }
        for &label in &self.missing {
            effects.push(UiEffect::Notice(format!(
                "{} not found on this page",
                label.display_text()
            )));
        }
        effects
    }
}
