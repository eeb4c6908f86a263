//! Identifier synthesis: turn the operator's accepted/rejected element
//! sets for one label into a generalizable locator.
//!
//! Strategy order (most to least robust across re-renders): carry the
//! prior forward when the label was untouched; a shared class list; the
//! shared structural path; the shared path minus the rejected nodes it
//! also covers; and finally the shared path flagged for re-review.
//! Synthesis never hard-fails for a label — training must not block on
//! one unresolved label.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use trellis_core::path::{common_path, join_union};
use trellis_core::{PathLocator, Strategy};
use trellis_dom::{ElementRef, PageModel};

use crate::resolve::resolve;

/// Everything the synthesizer knows about one label at submit time.
#[derive(Debug, Clone, Copy)]
pub struct LabelObservation<'a> {
    /// Elements the operator highlighted under this label.
    pub accepted: &'a [ElementRef],
    /// Elements the operator explicitly ignored for this label.
    pub rejected: &'a [ElementRef],
    /// Locator trained for this label on an earlier pass, if any.
    pub prior: Option<&'a PathLocator>,
    /// True while the operator has not touched this label this session.
    pub unchanged: bool,
    /// Operator-supplied date format for date-bearing labels.
    pub date_format: Option<&'a str>,
}

/// Synthesize a locator for one label. `None` is the explicit absent
/// marker: nothing accepted and no prior to fall back on.
pub fn synthesize(page: &PageModel, obs: &LabelObservation<'_>) -> Option<PathLocator> {
    // Stale references from an earlier page generation cannot contribute.
    let accepted: Vec<ElementRef> = obs
        .accepted
        .iter()
        .copied()
        .filter(|&el| page.tag(el).is_some())
        .collect();

    if accepted.is_empty() {
        // Untouched label: the prior locator is reproduced verbatim so a
        // no-op session round-trips the platform's structure unchanged.
        if obs.unchanged {
            return obs.prior.cloned();
        }
        // The operator cleared this label on purpose.
        return None;
    }

    let strategy = pick_strategy(page, &accepted, obs.rejected);
    let needs_review = matches!(strategy, Picked::Approximate(_));
    let (Picked::Exact(strategy) | Picked::Approximate(strategy)) = strategy;

    let mut locator = PathLocator::new(strategy);
    locator.needs_review = needs_review;
    locator.date_format = obs.date_format.map(str::to_string);
    locator.prior = obs.prior.cloned().map(Box::new);
    Some(locator)
}

enum Picked {
    Exact(Strategy),
    Approximate(Strategy),
}

fn pick_strategy(page: &PageModel, accepted: &[ElementRef], rejected: &[ElementRef]) -> Picked {
    let want = id_set(accepted);

    // Shared classes, provided no rejected element carries them and the
    // class lookup reproduces exactly the accepted set.
    if let Some(names) = common_classes(page, accepted, rejected) {
        let candidate = Strategy::ByClassNames(names);
        if id_set(&resolve(&candidate, page)) == want {
            return Picked::Exact(candidate);
        }
    }

    // Shared structural path.
    let paths: Vec<String> = accepted
        .iter()
        .filter_map(|&el| page.canonical_path(el))
        .collect();
    let pattern = match common_path(&paths) {
        Ok(p) => p,
        Err(err) => {
            // Unreachable with a non-empty accepted set; degrade anyway.
            warn!(%err, "path generalization failed");
            return Picked::Approximate(Strategy::ByPath(String::new()));
        }
    };
    let by_path = Strategy::ByPath(pattern.clone());
    let matched = resolve(&by_path, page);
    let got = id_set(&matched);
    if got == want {
        return Picked::Exact(by_path);
    }

    // Pattern over-matches: if everything extra was explicitly rejected,
    // express "this pattern, except those".
    let rejected_set = id_set(rejected);
    let extra: Vec<ElementRef> = matched
        .iter()
        .copied()
        .filter(|el| !want.contains(el))
        .collect();
    if !extra.is_empty() && extra.iter().all(|el| rejected_set.contains(el)) {
        let remove_paths: Vec<String> = extra
            .iter()
            .filter_map(|&el| page.canonical_path(el))
            .collect();
        if let Ok(remove) = join_union(&remove_paths) {
            return Picked::Exact(Strategy::ByPathExcept {
                x_path_use: pattern,
                x_path_remove: remove,
            });
        }
    }

    // No clean separation; hand back the pattern flagged for the
    // operator instead of guessing one.
    debug!(%pattern, "synthesis could not separate accepted from rejected");
    Picked::Approximate(by_path)
}

fn id_set(els: &[ElementRef]) -> BTreeSet<ElementRef> {
    els.iter().copied().collect()
}

/// Classes shared by every accepted element, minus any class carried by
/// a rejected element. `None` when the intersection comes up empty.
fn common_classes(
    page: &PageModel,
    accepted: &[ElementRef],
    rejected: &[ElementRef],
) -> Option<Vec<String>> {
    let mut shared: Option<BTreeSet<String>> = None;
    for &el in accepted {
        let classes: BTreeSet<String> = page.classes(el).iter().cloned().collect();
        if classes.is_empty() {
            return None;
        }
        shared = Some(match shared {
            None => classes,
            Some(prev) => prev.intersection(&classes).cloned().collect(),
        });
    }
    let mut shared = shared?;
    for &el in rejected {
        for class in page.classes(el) {
            shared.remove(class);
        }
    }
    if shared.is_empty() {
        None
    } else {
        Some(shared.into_iter().collect())
    }
}
