//! Trigger controller
//!
//! Owns the page and the activation flag, gates every trigger and runs the
//! pipeline one trigger at a time.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{Config, HostConfig};
use crate::core::pipeline::Pipeline;
use crate::core::session::SessionFlag;
use crate::dom::{HostDocument, Selector};
use crate::types::{
    Ack, Action, CycleOutput, EventTarget, FieldReading, HostEventKind, ReasonCode, Trigger,
    UserEdit,
};

/// Controller shared between the HTTP handlers and the trigger consumer
pub type SharedController<D> = Arc<Mutex<Controller<D>>>;

/// What `/status` reports
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub active: bool,
    pub runs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_output: Option<CycleOutput>,
}

/// How a reported user edit should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditRoute {
    /// Not a field that feeds the score
    Ignore,
    /// Input event: wait for the debounce
    Debounce,
    /// Change event: run now
    Immediate,
}

pub struct Controller<D> {
    doc: D,
    pipeline: Pipeline,
    session: SessionFlag,
    hosts: HostConfig,
    issue_markers: Option<Selector>,
    /// Reading of the last committed run, for poll change detection
    last_seen: Option<FieldReading>,
    runs: u64,
    last_output: Option<CycleOutput>,
}

impl<D: HostDocument + Send> Controller<D> {
    pub fn new(doc: D, config: &Config, session: SessionFlag) -> Self {
        Self {
            doc,
            pipeline: Pipeline::new(config),
            session,
            hosts: config.host.clone(),
            issue_markers: Selector::parse(&config.host.issue_markers).ok(),
            last_seen: None,
            runs: 0,
            last_output: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_active()
    }

    pub fn document(&self) -> &D {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.doc
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            active: self.is_active(),
            runs: self.runs,
            last_output: self.last_output.clone(),
        }
    }

    pub fn activate(&mut self) -> Ack {
        if !self.is_active() {
            self.set_active(true);
            info!("story point calculator activated");
        }
        Ack::ok("Extension activated", true)
    }

    pub fn deactivate(&mut self) -> Ack {
        if self.is_active() {
            self.set_active(false);
            self.last_seen = None;
            info!("story point calculator deactivated");
        }
        Ack::ok("Extension deactivated", false)
    }

    fn set_active(&mut self, active: bool) {
        if let Err(e) = self.session.set(active) {
            warn!(error = %e, "session flag not persisted");
        }
    }

    /// Answer one messaging action
    pub async fn handle_message(&mut self, action: Action) -> Ack {
        debug!(?action, "message received");
        match action {
            Action::Activate => self.activate(),
            Action::Deactivate => self.deactivate(),
            Action::GetStatus => Ack::status(self.is_active()),
            Action::Calculate => {
                let output = self.handle(Trigger::Manual).await;
                Ack::ok("Calculation triggered", self.is_active()).with_output(output)
            }
        }
    }

    /// Gate and run one trigger
    pub async fn handle(&mut self, trigger: Trigger) -> CycleOutput {
        let output = self.cycle(trigger).await;
        if output.committed() {
            self.last_seen = Some(output.reading.clone());
        }
        if output.reason != ReasonCode::R302_UNCHANGED {
            self.runs += 1;
            self.last_output = Some(output.clone());
        }
        output
    }

    async fn cycle(&mut self, trigger: Trigger) -> CycleOutput {
        if !self.is_active() {
            debug!(%trigger, "inactive, trigger ignored");
            return CycleOutput::gated(trigger, ReasonCode::R300_INACTIVE);
        }
        self.doc.refresh();
        if self.pipeline.modal_open(&self.doc) {
            debug!(%trigger, "modal open, trigger ignored");
            return CycleOutput::gated(trigger, ReasonCode::R301_MODAL_OPEN);
        }
        let reading = self.pipeline.read(&self.doc);
        if trigger == Trigger::Poll && self.last_seen.as_ref() == Some(&reading) {
            return CycleOutput::new(trigger, reading, ReasonCode::R302_UNCHANGED);
        }
        self.pipeline.complete(&mut self.doc, trigger, reading).await
    }

    /// Tracker issue page: tracker host, plus an issue path or issue markup
    pub fn is_issue_page(&self) -> bool {
        let Some(url) = self.doc.location() else {
            return false;
        };
        let on_tracker = self.hosts.tracker_hosts.iter().any(|h| url.contains(h.as_str()));
        let issue_path = self.hosts.issue_paths.iter().any(|p| url.contains(p.as_str()));
        let issue_markup = self
            .issue_markers
            .as_ref()
            .map_or(false, |markers| self.doc.query(markers).is_some());
        on_tracker && (issue_path || issue_markup)
    }

    /// Page load: auto-activate on issue pages, resume a stored session
    /// flag, and run once when active
    pub async fn on_load(&mut self) -> Option<CycleOutput> {
        if self.is_issue_page() {
            if !self.is_active() {
                self.set_active(true);
            }
            info!(url = self.doc.location().unwrap_or_default(), "auto-activated on issue page");
        }
        if !self.is_active() {
            return None;
        }
        Some(self.handle(Trigger::Load).await)
    }

    /// Drain triggers until every sender is gone
    pub async fn run<F>(&mut self, mut rx: mpsc::Receiver<Trigger>, mut on_output: F)
    where
        F: FnMut(&CycleOutput),
    {
        while let Some(trigger) = rx.recv().await {
            let output = self.handle(trigger).await;
            log_output(&output);
            on_output(&output);
        }
        debug!("trigger channel closed");
    }
}

/// Consumer task for a shared controller; the lock is held for one trigger
/// at a time
pub fn spawn_consumer<D>(
    controller: SharedController<D>,
    mut rx: mpsc::Receiver<Trigger>,
) -> JoinHandle<()>
where
    D: HostDocument + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(trigger) = rx.recv().await {
            let output = controller.lock().await.handle(trigger).await;
            log_output(&output);
        }
        debug!("trigger channel closed");
    })
}

fn log_output(output: &CycleOutput) {
    match output.reason {
        ReasonCode::R300_INACTIVE | ReasonCode::R302_UNCHANGED => {
            debug!(trigger = %output.trigger, reason = %output.reason.code(), "cycle skipped")
        }
        reason if reason.is_success() => {
            info!(trigger = %output.trigger, reason = %reason.code(), "cycle finished")
        }
        reason => warn!(trigger = %output.trigger, reason = %reason.code(), "cycle incomplete"),
    }
}

const EDITABLE_TAGS: [&str; 3] = ["input", "select", "textarea"];
const MODAL_TEST_IDS: [&str; 3] = ["timelog-textfield", "time-spent", "time-remaining"];
const MODAL_NAMES: [&str; 2] = ["time-spent", "time-remaining"];
const FIELD_WORDS: [&str; 3] = ["time", "complexity", "story"];

/// Does an edit on `target` feed the score?
///
/// Inside a modal only the time-log fields count.
pub fn is_relevant(target: &EventTarget) -> bool {
    let tag = target.tag.to_ascii_lowercase();
    if !EDITABLE_TAGS.contains(&tag.as_str()) {
        return false;
    }
    if target.in_modal {
        return MODAL_TEST_IDS.iter().any(|w| target.test_id.contains(w))
            || MODAL_NAMES.iter().any(|w| target.name.contains(w));
    }
    [&target.name, &target.id, &target.class, &target.test_id]
        .iter()
        .any(|attr| FIELD_WORDS.iter().any(|w| attr.contains(w)))
}

/// Route a user edit to the debouncer, an immediate run, or nowhere
pub fn route_edit(edit: &UserEdit) -> EditRoute {
    if !is_relevant(&edit.target) {
        return EditRoute::Ignore;
    }
    match edit.kind {
        HostEventKind::Input => EditRoute::Debounce,
        HostEventKind::Change => EditRoute::Immediate,
        HostEventKind::Blur => EditRoute::Ignore,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::PageDocument;

    const PAGE: &str = r#"
        <span data-testid="issue.issue-view.common.logged-time.value">2h</span>
        <span data-testid="issue-field-number-readview-full.ui.number.span">0.2</span>
        <div data-testid="issue-field-number.ui.issue-field-story-point-estimate--container">
          <input type="number">
        </div>
    "#;

    fn controller(page: &str) -> Controller<PageDocument> {
        Controller::new(PageDocument::parse(page), &Config::default(), SessionFlag::in_memory())
    }

    fn target(tag: &str, name: &str) -> EventTarget {
        EventTarget {
            tag: tag.to_string(),
            name: name.to_string(),
            ..EventTarget::default()
        }
    }

    #[tokio::test]
    async fn test_inactive_is_noop() {
        let mut ctl = controller(PAGE);
        let output = ctl.handle(Trigger::Manual).await;
        assert_eq!(output.reason, ReasonCode::R300_INACTIVE);
        assert!(ctl.document().events().is_empty());
    }

    #[tokio::test]
    async fn test_messages() {
        let mut ctl = controller(PAGE);
        let ack = ctl.handle_message(Action::Activate).await;
        assert!(ack.success && ack.active);
        assert!(ctl.handle_message(Action::GetStatus).await.active);

        let ack = ctl.handle_message(Action::Calculate).await;
        assert_eq!(ack.message.as_deref(), Some("Calculation triggered"));
        assert!(ack.output.unwrap().committed());

        let ack = ctl.handle_message(Action::Deactivate).await;
        assert!(!ack.active);
        assert!(!ctl.is_active());
    }

    #[tokio::test]
    async fn test_poll_runs_only_on_change() {
        let mut ctl = controller(PAGE);
        ctl.activate();
        assert!(ctl.handle(Trigger::Poll).await.committed());
        let output = ctl.handle(Trigger::Poll).await;
        assert_eq!(output.reason, ReasonCode::R302_UNCHANGED);
        assert_eq!(ctl.document().events().len(), 3);

        ctl.document_mut().replace_markup(&PAGE.replace(">2h<", ">4h<"));
        let output = ctl.handle(Trigger::Poll).await;
        assert!(output.committed());
        assert_eq!(output.score.map(|s| s.value()), Some(0.89));
        assert_eq!(ctl.status().runs, 2);
    }

    #[tokio::test]
    async fn test_non_poll_triggers_always_run() {
        let mut ctl = controller(PAGE);
        ctl.activate();
        for trigger in [Trigger::Input, Trigger::Change, Trigger::Manual] {
            assert!(ctl.handle(trigger).await.committed(), "{}", trigger);
        }
        assert_eq!(ctl.document().events().len(), 9);
    }

    #[tokio::test]
    async fn test_failed_run_is_retried_by_poll() {
        let page = PAGE.replace(">0.2<", ">0.5<");
        let mut ctl = controller(&page);
        ctl.activate();
        let first = ctl.handle(Trigger::Poll).await;
        assert_eq!(first.reason, ReasonCode::R202_COMPLEXITY_UNAVAILABLE);
        let second = ctl.handle(Trigger::Poll).await;
        assert_eq!(second.reason, ReasonCode::R202_COMPLEXITY_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_auto_activation_on_issue_page() {
        let doc = PageDocument::parse(PAGE).with_url("https://acme.atlassian.net/browse/SP-12");
        let mut ctl = Controller::new(doc, &Config::default(), SessionFlag::in_memory());
        let output = ctl.on_load().await.unwrap();
        assert_eq!(output.trigger, Trigger::Load);
        assert!(output.committed());
        assert!(ctl.is_active());
    }

    #[tokio::test]
    async fn test_no_auto_activation_elsewhere() {
        let doc = PageDocument::parse(PAGE).with_url("https://example.com/browse/SP-12");
        let mut ctl = Controller::new(doc, &Config::default(), SessionFlag::in_memory());
        assert!(ctl.on_load().await.is_none());
        assert!(!ctl.is_active());
    }

    #[test]
    fn test_issue_markup_counts_without_issue_path() {
        let doc = PageDocument::parse(r#"<div class="issue-view"></div>"#)
            .with_url("https://x.jira.com/projects");
        let ctl = Controller::new(doc, &Config::default(), SessionFlag::in_memory());
        assert!(ctl.is_issue_page());
    }

    #[test]
    fn test_relevance_outside_modal() {
        assert!(is_relevant(&target("input", "timeSpent-time")));
        assert!(is_relevant(&target("SELECT", "complexity")));
        assert!(!is_relevant(&target("input", "summary")));
        assert!(!is_relevant(&target("div", "time")));
    }

    #[test]
    fn test_relevance_inside_modal() {
        let mut field = target("input", "time-spent");
        field.in_modal = true;
        assert!(is_relevant(&field));
        let mut comment = target("textarea", "comment-time");
        comment.in_modal = true;
        assert!(!is_relevant(&comment));
        let mut by_test_id = target("input", "");
        by_test_id.in_modal = true;
        by_test_id.test_id = "log-time.timelog-textfield".to_string();
        assert!(is_relevant(&by_test_id));
    }

    #[test]
    fn test_route_edit() {
        let edit = |kind| UserEdit {
            kind,
            target: target("input", "story-points"),
        };
        assert_eq!(route_edit(&edit(HostEventKind::Input)), EditRoute::Debounce);
        assert_eq!(route_edit(&edit(HostEventKind::Change)), EditRoute::Immediate);
        assert_eq!(route_edit(&edit(HostEventKind::Blur)), EditRoute::Ignore);
    }

    #[tokio::test]
    async fn test_run_drains_channel() {
        let mut ctl = controller(PAGE);
        ctl.activate();
        let (tx, rx) = mpsc::channel(4);
        tx.send(Trigger::Load).await.unwrap();
        tx.send(Trigger::Poll).await.unwrap();
        drop(tx);
        let mut seen = Vec::new();
        ctl.run(rx, |output| seen.push(output.reason)).await;
        assert_eq!(seen, vec![ReasonCode::R100_SCORE_COMMITTED, ReasonCode::R302_UNCHANGED]);
    }
}
