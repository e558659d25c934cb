//! Per-page recorder runtime.
//!
//! A [`ContentScript`] owns one page document together with its detectors and
//! highlight overlay. The orchestrator drives it with [`ContentCommand`]s; the page
//! feeds it raw [`DomEvent`]s; records leave through the emitter channel.

use crate::detector::{ClickDetector, DomEvent, DomEventKind, Emitter, InputDetector};
use crate::dom::DocumentMut;
use crate::highlight::HighlightOverlay;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use trailmark_common::Clock;
use trailmark_common::protocol::{
    ContentCommand, ContentReply, ContentScriptReady, InputEvent, RuntimeMessage,
};
use trailmark_common::sensitivity::SensitivityClassifier;

/// A command for the page plus the slot its reply goes to.
pub type CommandEnvelope = (ContentCommand, Option<oneshot::Sender<ContentReply>>);

pub struct ContentScript<D: DocumentMut> {
    doc: D,
    clock: Arc<dyn Clock>,
    emit: Emitter,
    click: ClickDetector,
    input: InputDetector,
    highlight: HighlightOverlay,
}

impl<D: DocumentMut> ContentScript<D> {
    pub fn new(
        doc: D,
        clock: Arc<dyn Clock>,
        classifier: Arc<dyn SensitivityClassifier>,
        emit: Emitter,
    ) -> Self {
        Self {
            doc,
            clock,
            emit,
            click: ClickDetector::new(),
            input: InputDetector::new(classifier),
            highlight: HighlightOverlay::new(),
        }
    }

    pub fn document(&self) -> &D {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.doc
    }

    pub fn is_recording(&self) -> bool {
        self.click.is_active() && self.input.is_active()
    }

    pub fn highlight(&self) -> &HighlightOverlay {
        &self.highlight
    }

    /// Tell the orchestrator this page is ready to be enabled.
    pub fn announce(&self) {
        let ready = RuntimeMessage::ContentScriptReady(ContentScriptReady {
            url: self.doc.url(),
        });
        if self.emit.send(ready).is_err() {
            warn!("ready notification dropped: orchestrator channel closed");
        }
    }

    pub fn handle_command(&mut self, command: ContentCommand) -> ContentReply {
        match command {
            ContentCommand::EnableRecording(request) => {
                self.stop_detectors();
                self.click.start(request.start_epoch, self.emit.clone());
                self.input.start(request.start_epoch, self.emit.clone());
                info!(url = %self.doc.url(), start_epoch = request.start_epoch, "recording enabled");
                ContentReply::Ack
            }
            ContentCommand::DisableRecording => {
                self.stop_detectors();
                self.highlight.hide(&mut self.doc);
                info!(url = %self.doc.url(), "recording disabled");
                ContentReply::Ack
            }
            ContentCommand::HighlightElement(request) => {
                let target = match self.doc.query_selector_all(&request.selector) {
                    Ok(found) => found.first().copied(),
                    Err(e) => {
                        debug!("highlight selector rejected: {}", e);
                        None
                    }
                };
                match target {
                    Some(node) => {
                        self.highlight.show(&mut self.doc, node);
                        ContentReply::Ack
                    }
                    None => ContentReply::ElementNotFound {
                        selector: request.selector,
                    },
                }
            }
            ContentCommand::HideHighlight => {
                self.highlight.hide(&mut self.doc);
                ContentReply::Ack
            }
            ContentCommand::Ping => ContentReply::Pong {
                recording: self.is_recording(),
            },
        }
    }

    /// Route a raw page event to the detector that handles it.
    pub fn dispatch(&mut self, event: DomEvent) {
        if !self.doc.contains(event.target) {
            debug!(node = event.target.0, "event for unknown node dropped");
            return;
        }
        let now = self.clock.now_ms();
        match event.kind {
            DomEventKind::Click => {
                self.click.on_click(&self.doc, event.target, now);
            }
            DomEventKind::Input | DomEventKind::Change | DomEventKind::Blur => {
                self.input.on_event(&self.doc, event, now);
            }
        }
    }

    /// Earliest debounce deadline, in epoch milliseconds.
    pub fn next_deadline(&self) -> Option<i64> {
        self.input.next_deadline()
    }

    /// Fire every debounce deadline that has passed.
    pub fn tick(&mut self) -> Vec<InputEvent> {
        let now = self.clock.now_ms();
        self.input.flush_due(&self.doc, now)
    }

    fn stop_detectors(&mut self) {
        let now = self.clock.now_ms();
        self.input.stop(&self.doc, now);
        self.click.stop();
    }

    /// Serve commands and page events until both channels close.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<CommandEnvelope>,
        mut events: mpsc::UnboundedReceiver<DomEvent>,
    ) -> Self {
        self.announce();
        let mut commands_open = true;
        let mut events_open = true;

        while commands_open || events_open {
            let wait = self.next_deadline().map(|deadline| {
                let remaining = (deadline - self.clock.now_ms()).max(0) as u64;
                Duration::from_millis(remaining)
            });

            tokio::select! {
                command = commands.recv(), if commands_open => match command {
                    Some((command, reply)) => {
                        let response = self.handle_command(command);
                        if let Some(reply) = reply {
                            let _ = reply.send(response);
                        }
                    }
                    None => commands_open = false,
                },
                event = events.recv(), if events_open => match event {
                    Some(event) => self.dispatch(event),
                    None => events_open = false,
                },
                _ = tokio::time::sleep(wait.unwrap_or_default()), if wait.is_some() => {
                    self.tick();
                }
            }
        }

        self.stop_detectors();
        self.highlight.remove(&mut self.doc);
        self
    }
}
