//! Per-utterance conversation session: the state machine tying the
//! normalizer, classifier, matcher, and orchestrator together.
//!
//! States: `Idle → Listening → Analyzing → {Responding | Interpreting →
//! Responding} → Listening`, with any state returning to `Idle` on
//! explicit stop. The controller runs as a single task consuming
//! commands from a [`SessionHandle`]; at most one utterance is processed
//! at a time, and a new utterance arriving mid-flight cancels and
//! supersedes the pending one through a single-slot [`RequestSlot`]
//! rather than racing it. Cancellation drops the in-flight future before
//! any side effect: no memory write, no device execution, no
//! notification.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::collaborators::{DeviceController, SceneAnalyzer};
use crate::config::{AutoConfirmOutcome, ConfirmPolicyConfig};
use crate::devices::{Device, DeviceInventory};
use crate::error::Result;
use crate::intent::{self, ActionCandidate, ActionType, PointingCue};
use crate::interpret::orchestrator::{
    InterpretOutcome, InterpretationOrchestrator, PendingInterpretation, REPROMPT,
};
use crate::normalize;
use crate::pattern;
use crate::synthesis::SynthesisRouter;
use crate::types::{
    ConversationTurn, Interpretation, UrgencyLevel, UserProfile, Utterance, VisualContext,
};

/// Conversation session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Listening,
    Analyzing,
    Interpreting,
    Responding,
}

/// Commands sent from the host into the session task.
#[derive(Debug)]
pub enum SessionCommand {
    /// Begin listening (idle → listening).
    Start,
    /// A finalized transcript, optionally with the scene context current
    /// at the time of speech.
    Utterance {
        text: String,
        visual: Option<VisualContext>,
    },
    /// A camera frame for the vision collaborator; the resulting context
    /// is cached for the next utterance.
    Frame(Vec<u8>),
    /// Return to idle, aborting any in-flight work.
    Stop,
}

/// User decision on a confirmation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmDecision {
    Confirm,
    Reject,
}

/// Events emitted to the host UI.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// Text handed to synthesis (spoken on behalf of the user or as
    /// feedback).
    Spoken { text: String },
    /// A low-stakes device action awaiting confirm/reject (subject to
    /// the auto-confirm countdown).
    ConfirmAction {
        action: ActionType,
        device: Option<Device>,
    },
    /// An interpretation awaiting confirm/reject (unbounded wait).
    ConfirmInterpretation { interpretation: Interpretation },
    /// A finalized interpretation.
    InterpretationReady(Interpretation),
    ActionExecuted {
        action: ActionType,
        device: Option<Device>,
        success: bool,
        message: String,
    },
    /// Emergency notification dispatched.
    EmergencyNotified { urgency: UrgencyLevel },
    /// CRITICAL escalation failed: the host must show a loud,
    /// non-dismissible alert.
    EscalationAlert { message: String },
}

/// Single-slot request supervisor.
///
/// Makes the "one orchestration in flight" invariant explicit: beginning
/// a new request cancels the previous token, so a superseded utterance
/// can never race the one replacing it.
#[derive(Debug, Default)]
pub struct RequestSlot {
    current: Option<CancellationToken>,
}

impl RequestSlot {
    /// Cancel any active request and open a slot for a new one.
    pub fn begin(&mut self) -> CancellationToken {
        self.cancel_active();
        let token = CancellationToken::new();
        self.current = Some(token.clone());
        token
    }

    /// Cancel the active request, if any.
    pub fn cancel_active(&mut self) {
        if let Some(token) = self.current.take() {
            token.cancel();
        }
    }

    /// Mark the active request complete without cancelling.
    pub fn finish(&mut self) {
        self.current = None;
    }

    pub fn is_busy(&self) -> bool {
        self.current.is_some()
    }
}

/// Cloneable handle for driving a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    decision_tx: mpsc::UnboundedSender<ConfirmDecision>,
    state_rx: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub fn start(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Start);
    }

    pub fn utterance(&self, text: impl Into<String>) {
        let _ = self.cmd_tx.send(SessionCommand::Utterance {
            text: text.into(),
            visual: None,
        });
    }

    pub fn utterance_with_context(&self, text: impl Into<String>, visual: VisualContext) {
        let _ = self.cmd_tx.send(SessionCommand::Utterance {
            text: text.into(),
            visual: Some(visual),
        });
    }

    pub fn frame(&self, frame: Vec<u8>) {
        let _ = self.cmd_tx.send(SessionCommand::Frame(frame));
    }

    pub fn stop(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Stop);
    }

    pub fn confirm(&self) {
        let _ = self.decision_tx.send(ConfirmDecision::Confirm);
    }

    pub fn reject(&self) {
        let _ = self.decision_tx.send(ConfirmDecision::Reject);
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Watch receiver for state transitions.
    pub fn state_watch(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }
}

/// The per-utterance conversation state machine.
pub struct ConversationSessionController {
    orchestrator: Arc<InterpretationOrchestrator>,
    inventory: Arc<dyn DeviceInventory>,
    device_controller: Arc<dyn DeviceController>,
    synthesis: Arc<SynthesisRouter>,
    scene: Option<Arc<dyn SceneAnalyzer>>,
    profile: UserProfile,
    confirm_policy: ConfirmPolicyConfig,

    state_tx: watch::Sender<SessionState>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    slot: RequestSlot,
    history: Vec<ConversationTurn>,
    cached_visual: Option<VisualContext>,

    cmd_rx: Option<mpsc::UnboundedReceiver<SessionCommand>>,
    decision_rx: Option<mpsc::UnboundedReceiver<ConfirmDecision>>,
}

impl ConversationSessionController {
    /// Build a controller with its handle and event stream.
    pub fn new(
        orchestrator: Arc<InterpretationOrchestrator>,
        inventory: Arc<dyn DeviceInventory>,
        device_controller: Arc<dyn DeviceController>,
        synthesis: Arc<SynthesisRouter>,
        profile: UserProfile,
        confirm_policy: ConfirmPolicyConfig,
    ) -> (
        Self,
        SessionHandle,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (decision_tx, decision_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        let controller = Self {
            orchestrator,
            inventory,
            device_controller,
            synthesis,
            scene: None,
            profile,
            confirm_policy,
            state_tx,
            events_tx,
            slot: RequestSlot::default(),
            history: Vec::new(),
            cached_visual: None,
            cmd_rx: Some(cmd_rx),
            decision_rx: Some(decision_rx),
        };
        let handle = SessionHandle {
            cmd_tx,
            decision_tx,
            state_rx,
        };
        (controller, handle, events_rx)
    }

    /// Attach a vision collaborator for frame analysis.
    #[must_use]
    pub fn with_scene_analyzer(mut self, scene: Arc<dyn SceneAnalyzer>) -> Self {
        self.scene = Some(scene);
        self
    }

    /// Run the session until every handle is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error only on internal channel breakage; collaborator
    /// failures are absorbed per the degradation policy.
    pub async fn run(mut self) -> Result<()> {
        let mut cmd_rx = self
            .cmd_rx
            .take()
            .ok_or_else(|| crate::error::EngineError::Session("already running".into()))?;
        let mut decision_rx = self
            .decision_rx
            .take()
            .ok_or_else(|| crate::error::EngineError::Session("already running".into()))?;

        // Utterance queued for processing (most recent supersedes).
        let mut queued: Option<(Utterance, Option<VisualContext>)> = None;

        // Outcome of one processing round; handlers that need `&mut self`
        // run after the in-flight future has been dropped. Cancellation is
        // drop-based: breaking out of the inner select drops the pinned
        // future before any pending side effect completes.
        enum Step {
            Finished,
            Closed,
            /// New utterance or stop: the one thing allowed to abort an
            /// in-flight interpretation.
            Superseded(SessionCommand),
        }

        loop {
            if let Some((utterance, visual)) = queued.take() {
                self.slot.begin();
                // Frames arriving mid-utterance are analyzed afterwards;
                // they must never abort the interpretation.
                let mut deferred_frames: Vec<Vec<u8>> = Vec::new();

                let step = {
                    let process =
                        self.process_utterance(&utterance, visual, &mut decision_rx);
                    tokio::pin!(process);
                    loop {
                        tokio::select! {
                            _ = &mut process => break Step::Finished,
                            cmd = cmd_rx.recv() => match cmd {
                                None => break Step::Closed,
                                Some(SessionCommand::Frame(frame)) => {
                                    deferred_frames.push(frame);
                                }
                                Some(SessionCommand::Start) => {
                                    debug!("start ignored, session already active");
                                }
                                Some(cmd) => break Step::Superseded(cmd),
                            },
                        }
                    }
                };

                match step {
                    Step::Finished => {
                        self.slot.finish();
                        self.set_state(SessionState::Listening);
                    }
                    Step::Closed => {
                        self.slot.cancel_active();
                        self.set_state(SessionState::Idle);
                        return Ok(());
                    }
                    Step::Superseded(cmd) => {
                        self.slot.cancel_active();
                        info!(id = %utterance.id, "utterance superseded");
                        self.handle_command(cmd, &mut queued).await;
                    }
                }
                for frame in deferred_frames {
                    self.analyze_frame(&frame).await;
                }
                continue;
            }

            match cmd_rx.recv().await {
                None => {
                    self.set_state(SessionState::Idle);
                    return Ok(());
                }
                Some(cmd) => self.handle_command(cmd, &mut queued).await,
            }
        }
    }

    async fn handle_command(
        &mut self,
        cmd: SessionCommand,
        queued: &mut Option<(Utterance, Option<VisualContext>)>,
    ) {
        match cmd {
            SessionCommand::Start => {
                if self.state() == SessionState::Idle {
                    self.set_state(SessionState::Listening);
                }
            }
            SessionCommand::Stop => {
                self.slot.cancel_active();
                *queued = None;
                self.set_state(SessionState::Idle);
            }
            SessionCommand::Frame(frame) => self.analyze_frame(&frame).await,
            SessionCommand::Utterance { text, visual } => {
                if self.state() == SessionState::Idle {
                    debug!("utterance ignored while idle");
                    return;
                }
                let visual = visual.or_else(|| self.cached_visual.take());
                *queued = Some((Utterance::new(text), visual));
            }
        }
    }

    /// Feed a frame to the vision collaborator and cache the context for
    /// the next utterance. Vision failures are absorbed.
    async fn analyze_frame(&mut self, frame: &[u8]) {
        let Some(scene) = self.scene.clone() else {
            return;
        };
        match scene.analyze_frame(frame).await {
            Ok(context) => self.cached_visual = context,
            Err(err) => warn!(error = %err, "frame analysis failed"),
        }
    }

    /// Drive one utterance through the pipeline.
    async fn process_utterance(
        &mut self,
        utterance: &Utterance,
        visual: Option<VisualContext>,
        decision_rx: &mut mpsc::UnboundedReceiver<ConfirmDecision>,
    ) {
        let raw = utterance.text.trim().to_owned();
        if raw.is_empty() {
            debug!("empty utterance, no state change");
            return;
        }

        self.set_state(SessionState::Analyzing);
        drain_stale_decisions(decision_rx);

        let normalized = normalize::normalize_detailed(&raw);
        let speech = pattern::classify(&raw, &normalized, &self.profile);

        // Direct emergency: no interpreter, no confirmation.
        if speech.urgency.is_some_and(UrgencyLevel::is_emergency) {
            self.respond_urgent(utterance, visual.as_ref()).await;
            return;
        }

        // Directly matched device action: no interpreter needed.
        let pointing = visual.as_ref().filter(|v| v.has_pointing()).map(PointingCue::from);
        let candidate = intent::resolve_action(
            &raw,
            &normalized.text,
            pointing.as_ref(),
            self.inventory.availability(),
        );
        if let Some(candidate) = candidate {
            self.respond_action(&raw, candidate, decision_rx).await;
            return;
        }

        // Ambiguous speech: hand off to the orchestrator.
        self.set_state(SessionState::Interpreting);
        let outcome = self
            .orchestrator
            .run(utterance, &self.profile, visual.as_ref(), &self.history)
            .await;

        match outcome {
            Ok(InterpretOutcome::Resolved(interpretation)) => {
                self.respond_interpretation(interpretation).await;
            }
            Ok(InterpretOutcome::NeedsConfirmation(pending)) => {
                self.confirm_interpretation(pending, decision_rx).await;
            }
            Ok(InterpretOutcome::Urgent { .. }) => {
                // Emergencies are short-circuited above; an important-tier
                // urgency never arrives here as Urgent.
                warn!("unexpected urgent outcome from orchestrator");
            }
            Err(err) if matches!(err, crate::error::EngineError::EmptyInput) => {}
            Err(err) => {
                error!(error = %err, "interpretation failed");
                self.speak(REPROMPT).await;
            }
        }
    }

    /// Emergency path: orchestrator notifies, session speaks a short
    /// acknowledgment and surfaces escalation failures loudly.
    async fn respond_urgent(&mut self, utterance: &Utterance, visual: Option<&VisualContext>) {
        self.set_state(SessionState::Responding);

        let outcome = self
            .orchestrator
            .run(utterance, &self.profile, visual, &self.history)
            .await;

        let Ok(InterpretOutcome::Urgent {
            interpretation,
            notified,
            escalation_failed,
        }) = outcome
        else {
            error!("urgency path produced a non-urgent outcome");
            return;
        };

        let urgency = interpretation.urgency.unwrap_or(UrgencyLevel::Urgent);
        if notified {
            self.emit(SessionEvent::EmergencyNotified { urgency });
        }
        if escalation_failed {
            self.emit(SessionEvent::EscalationAlert {
                message: format!(
                    "Emergency call failed. Please get help another way. They said: \"{}\"",
                    interpretation.original_text
                ),
            });
        }

        let ack = match urgency {
            UrgencyLevel::Critical => "Calling your emergency contact now.",
            _ => "Letting your caregiver know right away.",
        };
        self.emit(SessionEvent::InterpretationReady(interpretation.clone()));
        self.speak(ack).await;
        self.push_turn(&interpretation.original_text, ack);
    }

    /// Device-action path, with the bounded auto-confirm countdown.
    async fn respond_action(
        &mut self,
        raw: &str,
        candidate: ActionCandidate,
        decision_rx: &mut mpsc::UnboundedReceiver<ConfirmDecision>,
    ) {
        let device = self
            .inventory
            .resolve(candidate.category, candidate.room.as_deref());

        self.emit(SessionEvent::ConfirmAction {
            action: candidate.action,
            device: device.clone(),
        });

        let decision = self.await_decision(decision_rx, true).await;
        if decision != ConfirmDecision::Confirm {
            self.set_state(SessionState::Responding);
            self.speak(REPROMPT).await;
            return;
        }

        self.set_state(SessionState::Responding);
        let result = self
            .device_controller
            .execute(
                candidate.action,
                candidate.room.as_deref(),
                device.as_ref().map(|d| d.id.as_str()),
            )
            .await;

        let (success, message) = match result {
            Ok(outcome) => (outcome.success, outcome.message),
            Err(err) => {
                warn!(error = %err, "device execution failed");
                (false, "I couldn't reach that device.".to_owned())
            }
        };

        self.emit(SessionEvent::ActionExecuted {
            action: candidate.action,
            device,
            success,
            message: message.clone(),
        });
        let spoken = if success { message } else { "I couldn't do that.".to_owned() };
        self.speak(&spoken).await;
        self.push_turn(raw, &spoken);
    }

    /// Confirmation protocol for an ambiguous interpretation: unbounded
    /// wait, resumed only by user action.
    async fn confirm_interpretation(
        &mut self,
        pending: PendingInterpretation,
        decision_rx: &mut mpsc::UnboundedReceiver<ConfirmDecision>,
    ) {
        self.emit(SessionEvent::ConfirmInterpretation {
            interpretation: pending.interpretation.clone(),
        });

        match self.await_decision(decision_rx, false).await {
            ConfirmDecision::Confirm => match self.orchestrator.confirm(pending) {
                Ok(interpretation) => self.respond_interpretation(interpretation).await,
                Err(err) => {
                    error!(error = %err, "confirmation write failed");
                    self.set_state(SessionState::Responding);
                    self.speak(REPROMPT).await;
                }
            },
            ConfirmDecision::Reject => {
                let reprompt = self.orchestrator.reject(pending);
                self.set_state(SessionState::Responding);
                self.speak(reprompt).await;
            }
        }
    }

    /// Speak a finalized interpretation on the user's behalf.
    async fn respond_interpretation(&mut self, interpretation: Interpretation) {
        self.set_state(SessionState::Responding);
        self.emit(SessionEvent::InterpretationReady(interpretation.clone()));
        self.speak(&interpretation.interpreted_text).await;
        self.push_turn(
            &interpretation.original_text,
            &interpretation.interpreted_text,
        );
    }

    /// Wait for a confirm/reject decision. Device actions use the
    /// bounded auto-confirm countdown when enabled; interpretation
    /// confirmations wait unbounded.
    async fn await_decision(
        &self,
        decision_rx: &mut mpsc::UnboundedReceiver<ConfirmDecision>,
        low_stakes: bool,
    ) -> ConfirmDecision {
        if low_stakes && self.confirm_policy.auto_confirm {
            let timeout = Duration::from_secs(self.confirm_policy.timeout_secs);
            match tokio::time::timeout(timeout, decision_rx.recv()).await {
                Ok(Some(decision)) => decision,
                Ok(None) => ConfirmDecision::Reject,
                Err(_) => match self.confirm_policy.default_outcome {
                    AutoConfirmOutcome::Accept => ConfirmDecision::Confirm,
                    AutoConfirmOutcome::Reject => ConfirmDecision::Reject,
                },
            }
        } else {
            decision_rx.recv().await.unwrap_or(ConfirmDecision::Reject)
        }
    }

    /// Hand text to the synthesis router. Failures are logged and
    /// absorbed; synthesis problems never surface as user-facing errors.
    async fn speak(&mut self, text: &str) {
        self.emit(SessionEvent::Spoken {
            text: text.to_owned(),
        });
        if let Err(err) = self.synthesis.speak(text).await {
            error!(error = %err, "all synthesizers failed");
        }
    }

    fn push_turn(&mut self, user_text: &str, assistant_text: &str) {
        self.history.push(ConversationTurn {
            user_text: user_text.to_owned(),
            assistant_text: assistant_text.to_owned(),
        });
    }

    fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state() != state {
            let _ = self.state_tx.send(state);
            self.emit(SessionEvent::StateChanged(state));
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events_tx.send(event);
    }
}

/// Discard decisions left over from a superseded confirmation.
fn drain_stale_decisions(decision_rx: &mut mpsc::UnboundedReceiver<ConfirmDecision>) {
    while decision_rx.try_recv().is_ok() {}
}
