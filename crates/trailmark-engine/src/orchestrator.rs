//! Recording session state machine.
//!
//! One [`Orchestrator`] owns the current [`RecordingSession`] and the tracked-tab set.
//! Messages are handled one at a time, each to completion, so steps land in the
//! session in exactly the order their records arrived.

use crate::host::BrowserHost;
use crate::tabs::TrackedTabs;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};
use trailmark_common::clock::Clock;
use trailmark_common::error::RecorderError;
use trailmark_common::model::{
    Annotation, ElementInfo, RecordingSession, RecordingStep, StepKind, TabId, new_id,
};
use trailmark_common::protocol::{
    ClickEvent, ContentCommand, ContentReply, EnableRecordingRequest, HighlightRequest, InputEvent,
    RuntimeMessage, RuntimeResponse, TabEvent, TabStatus,
};

/// Pause between outlining the target and capturing the screenshot.
pub const HIGHLIGHT_SETTLE_DELAY: Duration = Duration::from_millis(100);

const EVENT_CAPACITY: usize = 64;

/// Notifications for observers of the current session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Started(RecordingSession),
    StepAdded(RecordingStep),
    AnnotationsChanged(Vec<Annotation>),
    Stopped(RecordingSession),
}

/// Why an interaction record did not become a step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepRejected {
    #[error("not recording")]
    NotRecording,
    #[error("record has no originating tab")]
    UnknownSender,
    #[error("tab {0} is not tracked")]
    UntrackedTab(TabId),
}

/// Work item for [`Orchestrator::run`].
#[derive(Debug)]
pub enum Inbound {
    Message {
        /// Originating tab, for records sent by a page.
        sender: Option<TabId>,
        message: RuntimeMessage,
        reply: Option<oneshot::Sender<RuntimeResponse>>,
    },
    Tab(TabEvent),
}

pub struct Orchestrator<H: BrowserHost + ?Sized> {
    host: Arc<H>,
    clock: Arc<dyn Clock>,
    session: Option<RecordingSession>,
    tabs: TrackedTabs,
    events: broadcast::Sender<SessionEvent>,
}

impl<H: BrowserHost + ?Sized> Orchestrator<H> {
    pub fn new(host: Arc<H>, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            host,
            clock,
            session: None,
            tabs: TrackedTabs::new(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// The current session, or the last one after it stopped.
    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    pub fn is_recording(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_active)
    }

    pub fn tracked_tabs(&self) -> &TrackedTabs {
        &self.tabs
    }

    pub async fn start_recording(
        &mut self,
        title: &str,
        audio_enabled: bool,
    ) -> Result<RecordingSession, RecorderError> {
        let active = match self.host.query_active_tab().await {
            Ok(Some(tab)) => tab,
            Ok(None) => return Err(RecorderError::NoActiveTab),
            Err(e) => {
                warn!(error = %e, "active tab query failed");
                return Err(RecorderError::NoActiveTab);
            }
        };

        if self.is_recording() {
            warn!("recording already in progress, stopping it first");
            self.stop_recording().await;
        }

        let mut session = RecordingSession::new(title, self.clock.now_ms(), audio_enabled);
        self.tabs.clear();
        self.tabs.track(active.id);
        session.tracked_tabs = self.tabs.snapshot();
        let start_epoch = session.start_time;
        info!(session_id = %session.id, tab_id = active.id, title, "recording started");

        self.activate_detectors(active.id, start_epoch, true).await;

        let screenshot = self.capture(active.id).await;
        session.push_step(RecordingStep {
            id: new_id(),
            timestamp: 0,
            kind: StepKind::Navigation,
            tab_id: active.id,
            tab_title: active.title.clone(),
            url: active.url.clone(),
            screenshot,
            element: None,
            input_value: None,
            is_sensitive: None,
        });

        self.session = Some(session.clone());
        self.publish(SessionEvent::Started(session.clone()));
        Ok(session)
    }

    /// Stop the active session. `None` when nothing was recording.
    pub async fn stop_recording(&mut self) -> Option<RecordingSession> {
        if !self.is_recording() {
            warn!("stop requested while idle");
            return None;
        }

        for tab_id in self.tabs.iter().collect::<Vec<_>>() {
            if let Err(e) = self
                .host
                .send_to_tab(tab_id, ContentCommand::DisableRecording)
                .await
            {
                warn!(tab_id, error = %e, "detector deactivation failed");
            }
        }

        let now = self.clock.now_ms();
        let session = self.session.as_mut()?;
        session.finalize(now);
        let finalized = session.clone();
        self.tabs.clear();

        info!(
            session_id = %finalized.id,
            steps = finalized.steps.len(),
            "recording stopped"
        );
        self.publish(SessionEvent::Stopped(finalized.clone()));
        Some(finalized)
    }

    pub async fn record_click(
        &mut self,
        sender: Option<TabId>,
        event: ClickEvent,
    ) -> Result<RecordingStep, StepRejected> {
        let tab_id = self.accepting_tab(sender)?;
        self.record_interaction(
            tab_id,
            StepKind::Click,
            event.element,
            event.url,
            event.timestamp,
            None,
        )
        .await
    }

    pub async fn record_input(
        &mut self,
        sender: Option<TabId>,
        event: InputEvent,
    ) -> Result<RecordingStep, StepRejected> {
        let tab_id = self.accepting_tab(sender)?;
        self.record_interaction(
            tab_id,
            StepKind::Input,
            event.element,
            event.url,
            event.timestamp,
            Some((event.value, event.is_sensitive)),
        )
        .await
    }

    fn accepting_tab(&self, sender: Option<TabId>) -> Result<TabId, StepRejected> {
        if !self.is_recording() {
            return Err(StepRejected::NotRecording);
        }
        let tab_id = sender.ok_or(StepRejected::UnknownSender)?;
        if !self.tabs.is_tracked(tab_id) {
            debug!(tab_id, "record from untracked tab dropped");
            return Err(StepRejected::UntrackedTab(tab_id));
        }
        Ok(tab_id)
    }

    async fn record_interaction(
        &mut self,
        tab_id: TabId,
        kind: StepKind,
        element: ElementInfo,
        url: String,
        timestamp: i64,
        input: Option<(String, bool)>,
    ) -> Result<RecordingStep, StepRejected> {
        let (tab_url, tab_title) = match self.host.get_tab(tab_id).await {
            Ok(tab) => (tab.url, tab.title),
            Err(e) => {
                debug!(tab_id, error = %e, "tab lookup failed");
                (String::new(), String::new())
            }
        };

        let screenshot = self.capture_highlighted(tab_id, &element.selector).await;

        let (input_value, is_sensitive) = match input {
            Some((value, sensitive)) => (Some(value), Some(sensitive)),
            None => (None, None),
        };
        let step = RecordingStep {
            id: new_id(),
            timestamp,
            kind,
            tab_id,
            tab_title,
            url: if url.is_empty() { tab_url } else { url },
            screenshot,
            element: Some(element),
            input_value,
            is_sensitive,
        };
        self.append(step.clone());
        Ok(step)
    }

    /// Add an annotation to the current or just-stopped session.
    pub fn add_annotation(&mut self, text: &str, timestamp: Option<i64>) -> Option<Annotation> {
        let now = self.clock.now_ms();
        let session = self.session.as_mut()?;
        let at = timestamp.unwrap_or_else(|| {
            session.elapsed(session.end_time.map_or(now, |end| end.min(now)))
        });
        let annotation = session.add_annotation(text, at);
        let annotations = session.annotations.clone();
        self.publish(SessionEvent::AnnotationsChanged(annotations));
        Some(annotation)
    }

    pub fn update_annotation(&mut self, id: &str, text: &str) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !session.update_annotation(id, text) {
            debug!(annotation_id = id, "unknown annotation");
            return false;
        }
        let annotations = session.annotations.clone();
        self.publish(SessionEvent::AnnotationsChanged(annotations));
        true
    }

    pub fn delete_annotation(&mut self, id: &str) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !session.delete_annotation(id) {
            debug!(annotation_id = id, "unknown annotation");
            return false;
        }
        let annotations = session.annotations.clone();
        self.publish(SessionEvent::AnnotationsChanged(annotations));
        true
    }

    /// A page in `sender` loaded the recorder runtime.
    ///
    /// Tracked tabs get their detectors re-enabled. An untracked tab joins the
    /// tracked set once its detectors are successfully enabled.
    pub async fn content_script_ready(&mut self, sender: Option<TabId>, url: &str) {
        let Some(tab_id) = sender else {
            return;
        };
        if !self.is_recording() || self.tabs.is_deferred(tab_id) {
            return;
        }
        let Some(start_epoch) = self.session.as_ref().map(|s| s.start_time) else {
            return;
        };

        if self.tabs.is_tracked(tab_id) {
            debug!(tab_id, url, "recorder runtime ready, re-enabling detectors");
            self.activate_detectors(tab_id, start_epoch, false).await;
            return;
        }

        debug!(tab_id, url, "recorder runtime ready in untracked tab, enabling detectors");
        if self.activate_detectors(tab_id, start_epoch, false).await {
            self.tabs.track(tab_id);
            self.sync_tabs();
            info!(tab_id, "tab joined recording");
        }
    }

    pub async fn handle_tab_event(&mut self, event: TabEvent) {
        if !self.is_recording() {
            return;
        }
        match event {
            TabEvent::Created {
                tab_id,
                opener_tab_id: Some(opener),
            } if self.tabs.is_tracked(opener) => {
                info!(tab_id, opener, "tracking tab opened from recorded tab");
                self.tabs.track_deferred(tab_id);
                self.sync_tabs();
            }
            TabEvent::Created { .. } => {}
            TabEvent::Updated {
                tab_id,
                status: TabStatus::Complete,
                url,
                title,
            } if self.tabs.is_tracked(tab_id) => {
                self.navigation_completed(tab_id, url, title).await;
            }
            TabEvent::Updated { .. } => {}
            TabEvent::Removed { tab_id } => {
                if !self.tabs.is_tracked(tab_id) {
                    return;
                }
                let emptied = self.tabs.untrack(tab_id);
                self.sync_tabs();
                info!(tab_id, "tracked tab closed");
                if emptied {
                    info!("last tracked tab closed, stopping recording");
                    self.stop_recording().await;
                }
            }
        }
    }

    async fn navigation_completed(&mut self, tab_id: TabId, url: String, title: String) {
        let Some(start_epoch) = self.session.as_ref().map(|s| s.start_time) else {
            return;
        };
        if self.tabs.take_deferred(tab_id) {
            self.activate_detectors(tab_id, start_epoch, true).await;
        }

        let (current_url, current_title) = if url.is_empty() {
            match self.host.get_tab(tab_id).await {
                Ok(tab) => (tab.url, tab.title),
                Err(e) => {
                    debug!(tab_id, error = %e, "tab lookup failed");
                    (url, title)
                }
            }
        } else {
            (url, title)
        };

        let duplicate = self.session.as_ref().is_some_and(|s| {
            s.last_step_for_tab(tab_id)
                .is_some_and(|last| last.kind == StepKind::Navigation && last.url == current_url)
        });
        if duplicate {
            debug!(tab_id, url = %current_url, "navigation already recorded");
            return;
        }

        let screenshot = self.capture(tab_id).await;
        let timestamp = self
            .session
            .as_ref()
            .map_or(0, |s| s.elapsed(self.clock.now_ms()));
        self.append(RecordingStep {
            id: new_id(),
            timestamp,
            kind: StepKind::Navigation,
            tab_id,
            tab_title: current_title,
            url: current_url,
            screenshot,
            element: None,
            input_value: None,
            is_sensitive: None,
        });
    }

    /// Enable detectors in a tab, injecting the runtime and retrying once when
    /// `inject` is set. Failures are logged and recording carries on without the tab.
    async fn activate_detectors(&self, tab_id: TabId, start_epoch: i64, inject: bool) -> bool {
        let enable = ContentCommand::EnableRecording(EnableRecordingRequest { start_epoch });
        let first = match self.host.send_to_tab(tab_id, enable.clone()).await {
            Ok(_) => return true,
            Err(e) => e,
        };
        if !inject {
            warn!(tab_id, error = %first, "detector activation failed");
            return false;
        }

        debug!(tab_id, error = %first, "detectors not loaded, injecting");
        if let Err(e) = self.host.inject_content_script(tab_id).await {
            warn!(tab_id, error = %e, "detector activation failed");
            return false;
        }
        match self.host.send_to_tab(tab_id, enable).await {
            Ok(_) => true,
            Err(e) => {
                warn!(tab_id, error = %e, "detector activation failed");
                false
            }
        }
    }

    async fn capture(&self, tab_id: TabId) -> Option<String> {
        match self.host.capture_visible_area(tab_id).await {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(tab_id, error = %e, "capture failed");
                None
            }
        }
    }

    /// Outline the element, let the page settle, capture, then clear the outline.
    async fn capture_highlighted(&self, tab_id: TabId, selector: &str) -> Option<String> {
        if selector.is_empty() {
            return self.capture(tab_id).await;
        }

        let highlight = ContentCommand::HighlightElement(HighlightRequest {
            selector: selector.to_string(),
        });
        match self.host.send_to_tab(tab_id, highlight).await {
            Ok(ContentReply::Ack) => tokio::time::sleep(HIGHLIGHT_SETTLE_DELAY).await,
            Ok(reply) => debug!(tab_id, selector, ?reply, "highlight not shown"),
            Err(e) => warn!(tab_id, error = %e, "highlight failed"),
        }

        let screenshot = self.capture(tab_id).await;

        if let Err(e) = self.host.send_to_tab(tab_id, ContentCommand::HideHighlight).await {
            warn!(tab_id, error = %e, "highlight removal failed");
        }
        screenshot
    }

    fn append(&mut self, step: RecordingStep) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        debug!(session_id = %session.id, kind = ?step.kind, tab_id = step.tab_id, "step added");
        session.push_step(step.clone());
        self.publish(SessionEvent::StepAdded(step));
    }

    fn sync_tabs(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.tracked_tabs = self.tabs.snapshot();
        }
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Dispatch one runtime message and build its response.
    pub async fn handle_message(
        &mut self,
        sender: Option<TabId>,
        message: RuntimeMessage,
    ) -> RuntimeResponse {
        match message {
            RuntimeMessage::StartRecording(request) => {
                match self
                    .start_recording(&request.title, request.audio_enabled)
                    .await
                {
                    Ok(session) => RuntimeResponse::Session {
                        session: Some(session),
                    },
                    Err(e) => RuntimeResponse::Error {
                        code: e.code().to_string(),
                        message: e.to_string(),
                    },
                }
            }
            RuntimeMessage::StopRecording => RuntimeResponse::Session {
                session: self.stop_recording().await,
            },
            RuntimeMessage::ClickEvent(event) => {
                step_response(self.record_click(sender, event).await)
            }
            RuntimeMessage::InputEvent(event) => {
                step_response(self.record_input(sender, event).await)
            }
            RuntimeMessage::AddAnnotation(request) => {
                let annotation = self.add_annotation(&request.text, request.timestamp);
                RuntimeResponse::Annotation {
                    success: annotation.is_some(),
                    annotation,
                }
            }
            RuntimeMessage::UpdateAnnotation(request) => RuntimeResponse::Annotation {
                success: self.update_annotation(&request.id, &request.text),
                annotation: None,
            },
            RuntimeMessage::DeleteAnnotation(request) => RuntimeResponse::Annotation {
                success: self.delete_annotation(&request.id),
                annotation: None,
            },
            RuntimeMessage::GetRecordingState => RuntimeResponse::State {
                is_recording: self.is_recording(),
                session: self.session.clone(),
            },
            RuntimeMessage::ContentScriptReady(ready) => {
                self.content_script_ready(sender, &ready.url).await;
                RuntimeResponse::Ack
            }
        }
    }

    /// Serve the inbox until every [`OrchestratorHandle`] is dropped.
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Inbound>) -> Self {
        while let Some(inbound) = inbox.recv().await {
            match inbound {
                Inbound::Message {
                    sender,
                    message,
                    reply,
                } => {
                    let response = self.handle_message(sender, message).await;
                    if let Some(reply) = reply {
                        let _ = reply.send(response);
                    }
                }
                Inbound::Tab(event) => self.handle_tab_event(event).await,
            }
        }
        debug!("orchestrator inbox closed");
        self
    }
}

fn step_response(result: Result<RecordingStep, StepRejected>) -> RuntimeResponse {
    match result {
        Ok(step) => RuntimeResponse::Step {
            step: Box::new(step),
        },
        Err(rejected) => RuntimeResponse::Rejected {
            reason: rejected.to_string(),
        },
    }
}

/// Cloneable sender side of an orchestrator's inbox.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl OrchestratorHandle {
    /// A handle plus the inbox to pass to [`Orchestrator::run`].
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Inbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Send a message and wait for its response.
    pub async fn request(
        &self,
        sender: Option<TabId>,
        message: RuntimeMessage,
    ) -> Result<RuntimeResponse, RecorderError> {
        let response = self.submit(sender, message)?;
        response.await.map_err(|_| RecorderError::OrchestratorClosed)
    }

    /// Enqueue a message now; its response arrives on the returned receiver.
    pub fn submit(
        &self,
        sender: Option<TabId>,
        message: RuntimeMessage,
    ) -> Result<oneshot::Receiver<RuntimeResponse>, RecorderError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Inbound::Message {
                sender,
                message,
                reply: Some(reply),
            })
            .map_err(|_| RecorderError::OrchestratorClosed)?;
        Ok(response)
    }

    /// Send a message without waiting for its response.
    pub fn notify(&self, sender: Option<TabId>, message: RuntimeMessage) -> Result<(), RecorderError> {
        self.tx
            .send(Inbound::Message {
                sender,
                message,
                reply: None,
            })
            .map_err(|_| RecorderError::OrchestratorClosed)
    }

    pub fn tab_event(&self, event: TabEvent) -> Result<(), RecorderError> {
        self.tx
            .send(Inbound::Tab(event))
            .map_err(|_| RecorderError::OrchestratorClosed)
    }
}
