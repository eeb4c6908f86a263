//! The session coordinator: bridges the training UI and the external
//! crawling agent.
//!
//! At most one session (training or double-check) is active per channel.
//! A new `open_training_screen` tears the current one down; replies that
//! name a session other than the current one are stale and dropped.
//! Nothing here terminates the process — channel-level failures are
//! logged and the coordinator keeps serving subsequent messages.

use tracing::{debug, warn};
use ulid::Ulid;

use trellis_dom::PageModel;
use trellis_train::{CheckOutcome, DoubleCheckPass, TrainingSession, UiEffect, UtilityMode};

use trellis_core::{Label, PageType};

use crate::protocol::{decode_agent, AgentMessage, GuiMessage};
use crate::store::{IdentifierStore, PageFetcher};
use crate::transport::Transport;

/// Operator interactions forwarded from the viewer surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorEvent {
    SelectLabel(Label),
    SelectUtility(UtilityMode),
    ElementClicked(trellis_dom::ElementRef),
    SetDateFormat(String),
    SetCustomScript(String),
    RunCustomScript,
    ChangePageType(PageType),
    Reset,
    Submit,
    /// Double-check verdicts.
    Verdict(CheckOutcome),
}

enum Active {
    Idle,
    Training {
        id: String,
        session: TrainingSession,
    },
    Check {
        id: String,
        // Keeps the page generation alive for the pass's element refs.
        #[allow(dead_code)]
        page: PageModel,
        pass: DoubleCheckPass,
    },
}

pub struct Coordinator<T: Transport> {
    store: Box<dyn IdentifierStore>,
    fetcher: Box<dyn PageFetcher>,
    transport: T,
    active: Active,
    terminated: bool,
}

impl<T: Transport> Coordinator<T> {
    pub fn new(
        store: Box<dyn IdentifierStore>,
        fetcher: Box<dyn PageFetcher>,
        transport: T,
    ) -> Self {
        Coordinator {
            store,
            fetcher,
            transport,
            active: Active::Idle,
            terminated: false,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn has_active_session(&self) -> bool {
        !matches!(self.active, Active::Idle)
    }

    pub fn active_session_id(&self) -> Option<&str> {
        match &self.active {
            Active::Idle => None,
            Active::Training { id, .. } | Active::Check { id, .. } => Some(id),
        }
    }

    /// Labeling state of the active training session, if any.
    pub fn session(&self) -> Option<&TrainingSession> {
        match &self.active {
            Active::Training { session, .. } => Some(session),
            _ => None,
        }
    }

    /// The replay state of an active double-check pass, if any.
    pub fn double_check(&self) -> Option<&DoubleCheckPass> {
        match &self.active {
            Active::Check { pass, .. } => Some(pass),
            _ => None,
        }
    }

    // ── Inbound: agent channel ──

    /// Handle one raw inbound message. Returns viewer effects.
    pub fn handle_agent_json(&mut self, raw: &str) -> Vec<UiEffect> {
        let Some(message) = decode_agent(raw) else {
            return Vec::new();
        };
        self.handle_agent(message)
    }

    pub fn handle_agent(&mut self, message: AgentMessage) -> Vec<UiEffect> {
        match message {
            AgentMessage::OpenTrainingScreen {
                page_ref,
                platform_url,
                page_type,
            } => self.open_training(&page_ref, &platform_url, page_type),
            AgentMessage::DoubleCheck { session, structure } => {
                self.open_double_check(&session, structure)
            }
            AgentMessage::Terminate => {
                debug!("terminate received");
                self.active = Active::Idle;
                self.terminated = true;
                Vec::new()
            }
        }
    }

    fn open_training(
        &mut self,
        page_ref: &str,
        platform_url: &str,
        page_type: Option<PageType>,
    ) -> Vec<UiEffect> {
        if self.has_active_session() {
            warn!(
                session = ?self.active_session_id(),
                "new training request discards the active session"
            );
            self.active = Active::Idle;
        }
        let page = match self.fetcher.fetch(page_ref) {
            Ok(page) => page,
            Err(err) => {
                warn!(%page_ref, %err, "cannot materialize page; request dropped");
                return Vec::new();
            }
        };
        let priors = match self.store.load_identifiers(platform_url) {
            Ok(priors) => priors,
            Err(err) => {
                warn!(%platform_url, %err, "prior identifiers unavailable; training from scratch");
                Default::default()
            }
        };
        let model = PageModel::parse(&page);
        let mut session = TrainingSession::new(model, priors, page_type);
        // The page is materialized synchronously here, so the session
        // becomes interactable right away.
        let effects = session.page_loaded();
        self.active = Active::Training {
            id: Ulid::new().to_string(),
            session,
        };
        effects
    }

    fn open_double_check(
        &mut self,
        session_id: &str,
        structure: trellis_core::Structure,
    ) -> Vec<UiEffect> {
        match std::mem::replace(&mut self.active, Active::Idle) {
            Active::Training { id, session } if id == session_id => {
                let page = session.into_page();
                let pass = DoubleCheckPass::resolve(structure, &page);
                let effects = pass.effects();
                self.active = Active::Check { id, page, pass };
                effects
            }
            other => {
                warn!(%session_id, "double-check for a stale or unknown session dropped");
                self.active = other;
                Vec::new()
            }
        }
    }

    // ── Inbound: operator surface ──

    pub fn handle_operator(&mut self, event: OperatorEvent) -> Vec<UiEffect> {
        match &mut self.active {
            Active::Idle => {
                debug!(?event, "operator event without an active session");
                vec![UiEffect::Notice("no active training session".into())]
            }
            Active::Training { id, session } => match event {
                OperatorEvent::SelectLabel(label) => session.select_label(label),
                OperatorEvent::SelectUtility(mode) => {
                    session.select_utility(mode);
                    Vec::new()
                }
                OperatorEvent::ElementClicked(element) => session.element_clicked(element),
                OperatorEvent::SetDateFormat(text) => {
                    session.set_date_format(&text);
                    Vec::new()
                }
                OperatorEvent::SetCustomScript(script) => {
                    session.set_custom_script(&script);
                    Vec::new()
                }
                OperatorEvent::RunCustomScript => session.run_custom_script(),
                OperatorEvent::ChangePageType(page_type) => session.change_page_type(page_type),
                OperatorEvent::Reset => {
                    // Also invalidates whatever the agent side holds for
                    // this pass: the session id changes.
                    let effects = session.reset();
                    *id = Ulid::new().to_string();
                    effects
                }
                OperatorEvent::Submit => {
                    let structure = match session.submit() {
                        Ok(structure) => structure,
                        Err(err) => return vec![UiEffect::Notice(err.to_string())],
                    };
                    let message = GuiMessage::Structure {
                        session: id.clone(),
                        structure,
                    };
                    self.send(message);
                    Vec::new()
                }
                OperatorEvent::Verdict(_) => {
                    vec![UiEffect::Notice("no double-check in progress".into())]
                }
            },
            Active::Check { id, .. } => match event {
                OperatorEvent::Verdict(outcome) => {
                    let accepted = outcome == CheckOutcome::Confirm;
                    let message = GuiMessage::Confirmation {
                        session: id.clone(),
                        accepted,
                    };
                    self.send(message);
                    // Either way this pass is over: on adjust the agent
                    // re-issues open_training_screen.
                    self.active = Active::Idle;
                    Vec::new()
                }
                _ => vec![UiEffect::Notice(
                    "double-check in progress; confirm or adjust first".into(),
                )],
            },
        }
    }

    /// Fire-and-forget towards the agent; a send failure is logged and
    /// the coordinator stays up.
    fn send(&self, message: GuiMessage) {
        if let Err(err) = self.transport.send(message) {
            warn!(%err, "agent channel send failed");
        }
    }
}
