//! The per-page training session state machine.
//!
//! The session owns the labeling state for one captured page and is the
//! single writer of its highlighted/ignored maps; the coordinator holds
//! the one authoritative instance and feeds operator interactions
//! through the methods here. Methods return [`UiEffect`]s for the
//! viewer to apply — the session never touches the rendering itself.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use trellis_core::{Label, PageType, Structure};
use trellis_dom::{ElementRef, PageModel};

use crate::resolve::resolve_locator;
use crate::synth::{synthesize, LabelObservation};

/// Neutral style for ignored elements, distinct from every label color.
pub const IGNORED_COLOR: &str = "#9e9e9e";

/// What a click does while a label is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UtilityMode {
    #[default]
    Add,
    Remove,
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Page materialization is still in flight; clicks are refused.
    Loading,
    Ready,
    Submitted,
}

/// Instruction to the viewer, produced by session operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEffect {
    Highlight {
        element: ElementRef,
        color: &'static str,
    },
    ClearHighlight {
        element: ElementRef,
    },
    /// Transient operator notice ("select a label first", …).
    Notice(String),
    /// Restore the date-format input when a label is (de)selected.
    SetDateFormatInput(String),
    /// Execute the operator's one-shot script against the live page.
    RunScript(String),
}

/// Operator-input errors. All leave the session resumable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("select a page type first")]
    PageTypeNotSelected,
    #[error("page is still loading")]
    PageNotReady,
    #[error("no elements selected")]
    NothingSelected,
    #[error("session already submitted")]
    AlreadySubmitted,
}

/// Mutable labeling state for one page-type training pass.
#[derive(Debug)]
pub struct TrainingSession {
    page: PageModel,
    /// Last-known structures per page type for this platform, used to
    /// seed priors and re-highlight when the operator switches types.
    priors: BTreeMap<PageType, Structure>,
    phase: SessionPhase,
    page_type: Option<PageType>,
    selected_label: Option<Label>,
    utility: UtilityMode,
    highlighted: BTreeMap<Label, Vec<ElementRef>>,
    ignored: BTreeMap<Label, Vec<ElementRef>>,
    date_formats: BTreeMap<Label, String>,
    /// Labels the operator touched this session. Untouched labels carry
    /// their prior locator forward verbatim at submit.
    touched: BTreeMap<Label, bool>,
    custom_script: String,
}

impl TrainingSession {
    pub fn new(
        page: PageModel,
        priors: BTreeMap<PageType, Structure>,
        page_type: Option<PageType>,
    ) -> Self {
        let mut session = TrainingSession {
            page,
            priors,
            phase: SessionPhase::Loading,
            page_type,
            selected_label: None,
            utility: UtilityMode::Add,
            highlighted: BTreeMap::new(),
            ignored: BTreeMap::new(),
            date_formats: BTreeMap::new(),
            touched: BTreeMap::new(),
            custom_script: String::new(),
        };
        session.custom_script = session.prior_script();
        session
    }

    /// The script persisted with the current page type's last-known
    /// structure. Seeds `custom_script` so an untouched session submits
    /// the prior structure unchanged, script included.
    fn prior_script(&self) -> String {
        self.page_type
            .and_then(|pt| self.priors.get(&pt))
            .map(|s| s.script.clone())
            .unwrap_or_default()
    }

    pub fn page(&self) -> &PageModel {
        &self.page
    }

    /// Hand the page over for a double-check pass; ends the session.
    pub fn into_page(self) -> PageModel {
        self.page
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn page_type(&self) -> Option<PageType> {
        self.page_type
    }

    pub fn selected_label(&self) -> Option<Label> {
        self.selected_label
    }

    pub fn utility(&self) -> UtilityMode {
        self.utility
    }

    pub fn highlighted(&self, label: Label) -> &[ElementRef] {
        self.highlighted.get(&label).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn ignored(&self, label: Label) -> &[ElementRef] {
        self.ignored.get(&label).map(Vec::as_slice).unwrap_or(&[])
    }

    // ── Lifecycle ──

    /// The page model signalled loaded: the session becomes interactable
    /// and last-known identifiers are re-highlighted for review.
    pub fn page_loaded(&mut self) -> Vec<UiEffect> {
        self.phase = SessionPhase::Ready;
        match self.page_type {
            Some(pt) => self.prior_highlights(pt),
            None => Vec::new(),
        }
    }

    fn prior_highlights(&self, page_type: PageType) -> Vec<UiEffect> {
        let Some(structure) = self.priors.get(&page_type) else {
            return Vec::new();
        };
        let mut effects = Vec::new();
        for (&label, entry) in &structure.entries {
            let Some(locator) = entry else { continue };
            let found = resolve_locator(locator, &self.page);
            if found.is_empty() {
                effects.push(UiEffect::Notice(format!(
                    "{} not found on this page",
                    label.display_text()
                )));
                continue;
            }
            for element in found {
                effects.push(UiEffect::Highlight {
                    element,
                    color: label.display_color(),
                });
            }
        }
        effects
    }

    // ── Operator interactions ──

    /// Toggle the selected label; re-clicking the current one deselects.
    pub fn select_label(&mut self, label: Label) -> Vec<UiEffect> {
        if self.selected_label == Some(label) {
            self.selected_label = None;
            return vec![UiEffect::SetDateFormatInput(String::new())];
        }
        self.selected_label = Some(label);
        let restored = self.date_formats.get(&label).cloned().unwrap_or_default();
        vec![UiEffect::SetDateFormatInput(restored)]
    }

    /// Toggle the utility mode; re-clicking the current mode resets to
    /// the default (add).
    pub fn select_utility(&mut self, mode: UtilityMode) {
        self.utility = if self.utility == mode {
            UtilityMode::Add
        } else {
            mode
        };
    }

    /// Dispatch a click on a page element according to the utility mode.
    pub fn element_clicked(&mut self, element: ElementRef) -> Vec<UiEffect> {
        match self.phase {
            SessionPhase::Loading => {
                return vec![UiEffect::Notice(SessionError::PageNotReady.to_string())]
            }
            SessionPhase::Submitted => {
                return vec![UiEffect::Notice(SessionError::AlreadySubmitted.to_string())]
            }
            SessionPhase::Ready => {}
        }
        if self.page.tag(element).is_none() {
            // Stale reference from a previous page generation.
            return Vec::new();
        }
        match self.utility {
            UtilityMode::Add => {
                let Some(label) = self.selected_label else {
                    return vec![UiEffect::Notice("select a label first".into())];
                };
                self.strip_everywhere(element);
                self.highlighted.entry(label).or_default().push(element);
                self.touched.insert(label, true);
                vec![UiEffect::Highlight {
                    element,
                    color: label.display_color(),
                }]
            }
            UtilityMode::Remove => {
                self.strip_everywhere(element);
                vec![UiEffect::ClearHighlight { element }]
            }
            UtilityMode::Ignore => {
                let Some(label) = self.selected_label else {
                    return vec![UiEffect::Notice("select a label first".into())];
                };
                self.strip_everywhere(element);
                self.ignored.entry(label).or_default().push(element);
                self.touched.insert(label, true);
                vec![UiEffect::Highlight {
                    element,
                    color: IGNORED_COLOR,
                }]
            }
        }
    }

    /// Remove an element from every label's sets — an element carries at
    /// most one label. Labels it is stripped from count as touched.
    fn strip_everywhere(&mut self, element: ElementRef) {
        for (label, els) in self.highlighted.iter_mut().chain(self.ignored.iter_mut()) {
            let before = els.len();
            els.retain(|&e| e != element);
            if els.len() != before {
                self.touched.insert(*label, true);
            }
        }
    }

    /// Store a date format for the selected label. No-op without one.
    pub fn set_date_format(&mut self, text: &str) {
        let Some(label) = self.selected_label else {
            return;
        };
        self.date_formats.insert(label, text.to_string());
        self.touched.insert(label, true);
    }

    pub fn set_custom_script(&mut self, script: &str) {
        self.custom_script = script.to_string();
    }

    pub fn custom_script(&self) -> &str {
        &self.custom_script
    }

    /// Ask the viewer to execute the stored script against the live
    /// page (escape hatch for consent dialogs and the like).
    pub fn run_custom_script(&self) -> Vec<UiEffect> {
        if self.custom_script.is_empty() {
            return vec![UiEffect::Notice("no script to run".into())];
        }
        vec![UiEffect::RunScript(self.custom_script.clone())]
    }

    /// Switch the page type: fresh labeling state, then re-highlight the
    /// last-known identifiers for the new type so the operator reviews
    /// them instead of starting blank.
    pub fn change_page_type(&mut self, page_type: PageType) -> Vec<UiEffect> {
        let mut effects = self.clear_marks();
        self.page_type = Some(page_type);
        // The script belongs to a page type; it never travels to another.
        self.custom_script = self.prior_script();
        if self.phase == SessionPhase::Ready {
            effects.extend(self.prior_highlights(page_type));
        }
        effects
    }

    /// Discard unsaved labeling for the current page type.
    pub fn reset(&mut self) -> Vec<UiEffect> {
        debug!("session reset");
        let effects = self.clear_marks();
        self.custom_script = self.prior_script();
        effects
    }

    fn clear_marks(&mut self) -> Vec<UiEffect> {
        let mut effects: Vec<UiEffect> = self
            .highlighted
            .values()
            .chain(self.ignored.values())
            .flatten()
            .map(|&element| UiEffect::ClearHighlight { element })
            .collect();
        effects.dedup();
        self.highlighted.clear();
        self.ignored.clear();
        self.date_formats.clear();
        self.touched.clear();
        self.selected_label = None;
        self.utility = UtilityMode::Add;
        effects
    }

    // ── Submission ──

    /// Synthesize a locator for every label of the page type and end the
    /// session with the assembled structure.
    pub fn submit(&mut self) -> Result<Structure, SessionError> {
        match self.phase {
            SessionPhase::Loading => return Err(SessionError::PageNotReady),
            SessionPhase::Submitted => return Err(SessionError::AlreadySubmitted),
            SessionPhase::Ready => {}
        }
        let page_type = self.page_type.ok_or(SessionError::PageTypeNotSelected)?;

        let mut structure = Structure::empty(page_type);
        for &label in page_type.labels() {
            let observation = LabelObservation {
                accepted: self.highlighted(label),
                rejected: self.ignored(label),
                prior: self
                    .priors
                    .get(&page_type)
                    .and_then(|s| s.get(label)),
                unchanged: !self.touched.get(&label).copied().unwrap_or(false),
                date_format: self.date_formats.get(&label).map(String::as_str),
            };
            structure.set(label, synthesize(&self.page, &observation));
        }
        if structure.is_all_absent() {
            return Err(SessionError::NothingSelected);
        }
        structure.script = self.custom_script.clone();
        self.phase = SessionPhase::Submitted;
        Ok(structure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{PathLocator, Strategy};
    use trellis_dom::Page;

    const THREAD_PAGE: &str = r#"
        <html><body>
          <h1 class="title">Interesting thread</h1>
          <ul>
            <li class="post">first</li>
            <li class="post">second</li>
            <li class="post">third</li>
          </ul>
          <a class="next">next page</a>
        </body></html>"#;

    fn ready_session(page_type: Option<PageType>) -> TrainingSession {
        let page = PageModel::parse(&Page::new(THREAD_PAGE, "http://forum.example/t/1"));
        let mut session = TrainingSession::new(page, BTreeMap::new(), page_type);
        session.page_loaded();
        session
    }

    #[test]
    fn clicks_refused_while_loading() {
        let page = PageModel::parse(&Page::new(THREAD_PAGE, "http://forum.example/t/1"));
        let el = page.all_refs()[0];
        let mut session = TrainingSession::new(page, BTreeMap::new(), None);
        let effects = session.element_clicked(el);
        assert_eq!(
            effects,
            vec![UiEffect::Notice("page is still loading".into())]
        );
    }

    #[test]
    fn add_requires_selected_label() {
        let mut session = ready_session(Some(PageType::ThreadPage));
        let el = session.page().elements_by_class("post")[0];
        let effects = session.element_clicked(el);
        assert_eq!(effects, vec![UiEffect::Notice("select a label first".into())]);
        assert!(session.highlighted(Label::PostContent).is_empty());
    }

    #[test]
    fn label_toggle_and_date_format_restore() {
        let mut session = ready_session(Some(PageType::ThreadPage));
        session.select_label(Label::PostDate);
        session.set_date_format("%d-%m-%Y");
        // Deselect, then reselect: the stored format comes back.
        session.select_label(Label::PostDate);
        assert_eq!(session.selected_label(), None);
        let effects = session.select_label(Label::PostDate);
        assert_eq!(effects, vec![UiEffect::SetDateFormatInput("%d-%m-%Y".into())]);
    }

    #[test]
    fn utility_toggle_resets_to_add() {
        let mut session = ready_session(Some(PageType::ThreadPage));
        session.select_utility(UtilityMode::Ignore);
        assert_eq!(session.utility(), UtilityMode::Ignore);
        session.select_utility(UtilityMode::Ignore);
        assert_eq!(session.utility(), UtilityMode::Add);
    }

    #[test]
    fn add_then_remove_leaves_sets_empty() {
        let mut session = ready_session(Some(PageType::ThreadPage));
        session.select_label(Label::PostContent);
        let el = session.page().elements_by_class("post")[0];
        let effects = session.element_clicked(el);
        assert_eq!(
            effects,
            vec![UiEffect::Highlight {
                element: el,
                color: Label::PostContent.display_color(),
            }]
        );
        session.select_utility(UtilityMode::Remove);
        let effects = session.element_clicked(el);
        assert_eq!(effects, vec![UiEffect::ClearHighlight { element: el }]);
        assert!(session.highlighted(Label::PostContent).is_empty());
        assert!(session.ignored(Label::PostContent).is_empty());
    }

    #[test]
    fn element_carries_at_most_one_label() {
        let mut session = ready_session(Some(PageType::ThreadPage));
        let el = session.page().elements_by_class("title")[0];
        session.select_label(Label::ThreadTitle);
        session.element_clicked(el);
        session.select_label(Label::ThreadTitle); // deselect
        session.select_label(Label::PostContent);
        session.element_clicked(el);
        assert!(session.highlighted(Label::ThreadTitle).is_empty());
        assert_eq!(session.highlighted(Label::PostContent), &[el]);
    }

    #[test]
    fn ignore_moves_element_to_ignored_set() {
        let mut session = ready_session(Some(PageType::ThreadPage));
        let el = session.page().elements_by_class("post")[1];
        session.select_label(Label::PostContent);
        session.element_clicked(el);
        session.select_utility(UtilityMode::Ignore);
        let effects = session.element_clicked(el);
        assert_eq!(
            effects,
            vec![UiEffect::Highlight {
                element: el,
                color: IGNORED_COLOR,
            }]
        );
        assert!(session.highlighted(Label::PostContent).is_empty());
        assert_eq!(session.ignored(Label::PostContent), &[el]);
    }

    #[test]
    fn submit_without_page_type_is_refused() {
        let mut session = ready_session(None);
        let el = session.page().elements_by_class("post")[0];
        session.select_label(Label::PostContent);
        session.element_clicked(el);
        assert_eq!(session.submit(), Err(SessionError::PageTypeNotSelected));
        // Still resumable.
        assert_eq!(session.phase(), SessionPhase::Ready);
    }

    #[test]
    fn submit_with_nothing_selected_is_refused() {
        let mut session = ready_session(Some(PageType::ThreadPage));
        assert_eq!(session.submit(), Err(SessionError::NothingSelected));
    }

    #[test]
    fn submit_builds_total_structure() {
        let mut session = ready_session(Some(PageType::ThreadPage));
        session.select_label(Label::PostContent);
        for el in session.page().elements_by_class("post") {
            session.element_clicked(el);
        }
        session.select_label(Label::PostContent); // deselect
        session.select_label(Label::NextPageButton);
        let next = session.page().elements_by_class("next")[0];
        session.element_clicked(next);

        let structure = session.submit().unwrap();
        assert_eq!(structure.page_type, PageType::ThreadPage);
        assert_eq!(
            structure.entries.len(),
            PageType::ThreadPage.labels().len()
        );
        assert_eq!(
            structure.get(Label::PostContent).unwrap().strategy,
            Strategy::ByClassNames(vec!["post".into()])
        );
        assert_eq!(
            structure.get(Label::NextPageButton).unwrap().strategy,
            Strategy::ByClassNames(vec!["next".into()])
        );
        // Labels never touched on a first pass stay absent, not omitted.
        assert!(structure.entries.contains_key(&Label::AuthorUsername));
        assert!(structure.get(Label::AuthorUsername).is_none());
        assert_eq!(session.phase(), SessionPhase::Submitted);
    }

    #[test]
    fn untouched_session_reproduces_prior_structure() {
        let page = PageModel::parse(&Page::new(THREAD_PAGE, "http://forum.example/t/1"));
        let mut prior = Structure::empty(PageType::ThreadPage);
        prior.set(
            Label::PostContent,
            Some(PathLocator::new(Strategy::ByClassNames(vec!["post".into()]))),
        );
        prior.set(
            Label::ThreadTitle,
            Some(PathLocator::new(Strategy::ByClassNames(vec![
                "title".into()
            ]))),
        );
        let mut priors = BTreeMap::new();
        priors.insert(PageType::ThreadPage, prior.clone());

        let mut session = TrainingSession::new(page, priors, Some(PageType::ThreadPage));
        session.page_loaded();
        let structure = session.submit().unwrap();
        assert_eq!(
            serde_json::to_string(&structure).unwrap(),
            serde_json::to_string(&prior).unwrap()
        );
    }

    #[test]
    fn untouched_session_carries_prior_script() {
        let page = PageModel::parse(&Page::new(THREAD_PAGE, "http://forum.example/t/1"));
        let mut prior = Structure::empty(PageType::ThreadPage);
        prior.set(
            Label::PostContent,
            Some(PathLocator::new(Strategy::ByClassNames(vec!["post".into()]))),
        );
        prior.script = "document.querySelector('.consent').click()".into();
        let mut priors = BTreeMap::new();
        priors.insert(PageType::ThreadPage, prior.clone());

        let mut session = TrainingSession::new(page, priors, Some(PageType::ThreadPage));
        session.page_loaded();
        let structure = session.submit().unwrap();
        assert_eq!(structure.script, prior.script);
        assert_eq!(
            serde_json::to_string(&structure).unwrap(),
            serde_json::to_string(&prior).unwrap()
        );
    }

    #[test]
    fn script_does_not_travel_across_page_types() {
        let page = PageModel::parse(&Page::new(THREAD_PAGE, "http://forum.example/t/1"));
        let mut prior = Structure::empty(PageType::ThreadPage);
        prior.script = "expand_spoilers()".into();
        let mut priors = BTreeMap::new();
        priors.insert(PageType::ThreadPage, prior);

        let mut session = TrainingSession::new(page, priors, Some(PageType::ThreadPage));
        session.page_loaded();
        assert_eq!(session.custom_script(), "expand_spoilers()");

        // Another type has no stored script; the thread-page one must not
        // leak into its structure.
        session.change_page_type(PageType::LoginPage);
        assert_eq!(session.custom_script(), "");

        // Coming back re-seeds from the stored structure.
        session.change_page_type(PageType::ThreadPage);
        assert_eq!(session.custom_script(), "expand_spoilers()");
    }

    #[test]
    fn reset_restores_prior_script() {
        let page = PageModel::parse(&Page::new(THREAD_PAGE, "http://forum.example/t/1"));
        let mut prior = Structure::empty(PageType::ThreadPage);
        prior.script = "expand_spoilers()".into();
        let mut priors = BTreeMap::new();
        priors.insert(PageType::ThreadPage, prior);

        let mut session = TrainingSession::new(page, priors, Some(PageType::ThreadPage));
        session.page_loaded();
        session.set_custom_script("something_else()");
        session.reset();
        assert_eq!(session.custom_script(), "expand_spoilers()");
    }

    #[test]
    fn change_page_type_rehighlights_priors() {
        let page = PageModel::parse(&Page::new(THREAD_PAGE, "http://forum.example/t/1"));
        let mut prior = Structure::empty(PageType::ThreadPage);
        prior.set(
            Label::PostContent,
            Some(PathLocator::new(Strategy::ByClassNames(vec!["post".into()]))),
        );
        let mut priors = BTreeMap::new();
        priors.insert(PageType::ThreadPage, prior);

        let mut session = TrainingSession::new(page, priors, None);
        session.page_loaded();
        let effects = session.change_page_type(PageType::ThreadPage);
        let highlights = effects
            .iter()
            .filter(|e| matches!(e, UiEffect::Highlight { .. }))
            .count();
        assert_eq!(highlights, 3);
    }

    #[test]
    fn prior_highlight_miss_becomes_notice() {
        let page = PageModel::parse(&Page::new(THREAD_PAGE, "http://forum.example/t/1"));
        let mut prior = Structure::empty(PageType::ThreadPage);
        prior.set(
            Label::AuthorUsername,
            Some(PathLocator::new(Strategy::ByClassNames(vec![
                "username".into()
            ]))),
        );
        let mut priors = BTreeMap::new();
        priors.insert(PageType::ThreadPage, prior);

        let mut session = TrainingSession::new(page, priors, Some(PageType::ThreadPage));
        let effects = session.page_loaded();
        assert!(effects
            .iter()
            .any(|e| matches!(e, UiEffect::Notice(n) if n.contains("not found"))));
    }

    #[test]
    fn reset_clears_marks_and_emits_clear_effects() {
        let mut session = ready_session(Some(PageType::ThreadPage));
        session.select_label(Label::PostContent);
        let el = session.page().elements_by_class("post")[0];
        session.element_clicked(el);
        let effects = session.reset();
        assert!(effects.contains(&UiEffect::ClearHighlight { element: el }));
        assert!(session.highlighted(Label::PostContent).is_empty());
        assert_eq!(session.selected_label(), None);
    }

    #[test]
    fn custom_script_round_trip() {
        let mut session = ready_session(Some(PageType::ThreadPage));
        assert_eq!(
            session.run_custom_script(),
            vec![UiEffect::Notice("no script to run".into())]
        );
        session.set_custom_script("document.querySelector('.consent').click()");
        assert_eq!(
            session.run_custom_script(),
            vec![UiEffect::RunScript(
                "document.querySelector('.consent').click()".into()
            )]
        );
    }
}
