//! Identifier resolution: re-apply a stored locator to a rendered page.
//!
//! Resolution is pure with respect to the page and total: a locator that
//! matches nothing yields an empty set, never an error. Highlighting is
//! the caller's concern.

use std::collections::BTreeSet;

use tracing::debug;

use trellis_core::{PathLocator, Strategy};
use trellis_dom::{ElementRef, PageModel};

/// Resolve one strategy against a page.
pub fn resolve(strategy: &Strategy, page: &PageModel) -> Vec<ElementRef> {
    let found = match strategy {
        Strategy::ByClassNames(names) => page.elements_by_classes(names),
        Strategy::ByPath(path) => page.resolve_path_str(path),
        Strategy::ByPathExcept {
            x_path_use,
            x_path_remove,
        } => {
            let removed: BTreeSet<ElementRef> =
                page.resolve_path_str(x_path_remove).into_iter().collect();
            page.resolve_path_str(x_path_use)
                .into_iter()
                .filter(|el| !removed.contains(el))
                .collect()
        }
    };
    if found.is_empty() {
        debug!(?strategy, url = page.url(), "strategy matched no elements");
    }
    found
}

/// Resolve a full locator, falling back through its `prior` chain when
/// the leading strategy matches nothing on this page.
pub fn resolve_locator(locator: &PathLocator, page: &PageModel) -> Vec<ElementRef> {
    let found = resolve(&locator.strategy, page);
    if !found.is_empty() {
        return found;
    }
    match &locator.prior {
        Some(prior) => resolve_locator(prior, page),
        None => found,
    }
}
