//! Session state-machine behavior over the full stack: direct device
//! actions, emergency short-circuits, confirmation flows, supersession,
//! and clean stops, with every collaborator mocked.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use speechbridge::collaborators::{
    EmergencyNotifier, ExecutionOutcome, InterpretRequest, InterpreterResponse, NotifyOutcome,
    SemanticInterpreter, SpeechSynthesizer, SynthesizedSpeech,
};
use speechbridge::config::{AutoConfirmOutcome, ConfirmPolicyConfig, InterpretationConfig};
use speechbridge::correction::MemoryCorrectionStore;
use speechbridge::devices::{Device, StaticDeviceInventory};
use speechbridge::intent::{ActionType, DeviceCategory};
use speechbridge::session::{ConversationSessionController, SessionEvent, SessionState};
use speechbridge::synthesis::SynthesisRouter;
use speechbridge::types::{ContactMethod, EmergencyContact, UserProfile};
use speechbridge::{InterpretationOrchestrator, Result};

const WAIT: Duration = Duration::from_secs(5);

struct StubInterpreter {
    response: InterpreterResponse,
    calls: AtomicUsize,
}

#[async_trait]
impl SemanticInterpreter for StubInterpreter {
    async fn interpret(&self, _request: InterpretRequest) -> Result<InterpreterResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// Never completes: stands in for a slow collaborator so supersession
/// can be exercised.
struct BlockingInterpreter {
    calls: AtomicUsize,
}

#[async_trait]
impl SemanticInterpreter for BlockingInterpreter {
    async fn interpret(&self, _request: InterpretRequest) -> Result<InterpreterResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

struct SilentSynth;

#[async_trait]
impl SpeechSynthesizer for SilentSynth {
    fn id(&self) -> &'static str {
        "silent"
    }

    async fn speak(&self, _text: &str) -> Result<SynthesizedSpeech> {
        Ok(SynthesizedSpeech {
            samples: vec![0.0; 160],
            sample_rate: 16_000,
        })
    }
}

#[derive(Default)]
struct StubController {
    executed: Mutex<Vec<(ActionType, Option<String>)>>,
}

#[async_trait]
impl speechbridge::collaborators::DeviceController for StubController {
    async fn execute(
        &self,
        action: ActionType,
        _room: Option<&str>,
        device_id: Option<&str>,
    ) -> Result<ExecutionOutcome> {
        self.executed
            .lock()
            .unwrap()
            .push((action, device_id.map(str::to_owned)));
        Ok(ExecutionOutcome {
            success: true,
            message: "Done.".to_owned(),
        })
    }
}

#[derive(Default)]
struct StubNotifier {
    messages: Mutex<Vec<String>>,
}

#[async_trait]
impl EmergencyNotifier for StubNotifier {
    async fn notify(&self, _phone: &str, message: &str, _user: &str) -> Result<NotifyOutcome> {
        self.messages.lock().unwrap().push(message.to_owned());
        Ok(NotifyOutcome {
            success: true,
            call_id: Some("call-1".into()),
        })
    }
}

fn bedroom_lamp() -> Device {
    Device {
        id: "lamp-1".into(),
        name: "bedroom lamp".into(),
        category: DeviceCategory::Lights,
        room: Some("bedroom".into()),
    }
}

/// Auto-confirm that resolves instantly, keeping tests deterministic.
fn instant_accept() -> ConfirmPolicyConfig {
    ConfirmPolicyConfig {
        auto_confirm: true,
        timeout_secs: 0,
        default_outcome: AutoConfirmOutcome::Accept,
    }
}

struct Harness {
    handle: speechbridge::SessionHandle,
    events: tokio::sync::mpsc::UnboundedReceiver<SessionEvent>,
    task: tokio::task::JoinHandle<Result<()>>,
    controller: Arc<StubController>,
    notifier: Arc<StubNotifier>,
}

fn spawn_session(
    interpreter: Arc<dyn SemanticInterpreter>,
    profile: UserProfile,
    policy: ConfirmPolicyConfig,
) -> Harness {
    let notifier = Arc::new(StubNotifier::default());
    let orchestrator = Arc::new(InterpretationOrchestrator::new(
        interpreter,
        Arc::new(MemoryCorrectionStore::default()),
        notifier.clone(),
        InterpretationConfig::default(),
    ));
    let controller = Arc::new(StubController::default());
    let inventory = Arc::new(StaticDeviceInventory::new(vec![bedroom_lamp()]));
    let synthesis = Arc::new(SynthesisRouter::new(vec![Arc::new(SilentSynth)]));

    let (session, handle, events) = ConversationSessionController::new(
        orchestrator,
        inventory,
        controller.clone(),
        synthesis,
        profile,
        policy,
    );
    let task = tokio::spawn(session.run());
    Harness {
        handle,
        events,
        task,
        controller,
        notifier,
    }
}

async fn next_event(
    events: &mut tokio::sync::mpsc::UnboundedReceiver<SessionEvent>,
) -> SessionEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event stream closed")
}

/// Wait for a specific event, skipping everything before it.
async fn wait_for<F>(
    events: &mut tokio::sync::mpsc::UnboundedReceiver<SessionEvent>,
    mut pred: F,
) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    loop {
        let event = next_event(events).await;
        if pred(&event) {
            return event;
        }
    }
}

fn confident(text: &str) -> InterpreterResponse {
    InterpreterResponse {
        interpretation: text.to_owned(),
        confidence: Some(92),
        reasoning: "test".into(),
        ..InterpreterResponse::default()
    }
}

#[tokio::test]
async fn start_transitions_idle_to_listening() {
    let mut h = spawn_session(
        Arc::new(StubInterpreter {
            response: confident("x"),
            calls: AtomicUsize::new(0),
        }),
        UserProfile::default(),
        instant_accept(),
    );

    assert_eq!(h.handle.state(), SessionState::Idle);
    h.handle.start();
    let event = next_event(&mut h.events).await;
    assert!(matches!(
        event,
        SessionEvent::StateChanged(SessionState::Listening)
    ));

    drop(h.handle);
    h.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn clipped_light_phrase_executes_directly() {
    let interpreter = Arc::new(StubInterpreter {
        response: confident("x"),
        calls: AtomicUsize::new(0),
    });
    let mut h = spawn_session(interpreter.clone(), UserProfile::default(), instant_accept());

    h.handle.start();
    h.handle.utterance("li on");

    let event = wait_for(&mut h.events, |e| {
        matches!(e, SessionEvent::ActionExecuted { .. })
    })
    .await;
    let SessionEvent::ActionExecuted {
        action,
        device,
        success,
        ..
    } = event
    else {
        unreachable!();
    };
    assert_eq!(action, ActionType::LightsOn);
    assert_eq!(device.unwrap().id, "lamp-1");
    assert!(success);

    // Executed against the controller, without consulting the interpreter.
    assert_eq!(h.controller.executed.lock().unwrap().len(), 1);
    assert_eq!(interpreter.calls.load(Ordering::SeqCst), 0);

    drop(h.handle);
    h.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn emergency_utterance_notifies_and_speaks_ack() {
    let profile = UserProfile {
        name: "Alex".into(),
        emergency_contact: Some(EmergencyContact {
            phone: "+15550100".into(),
            method: ContactMethod::Call,
        }),
        ..UserProfile::default()
    };
    let mut h = spawn_session(
        Arc::new(StubInterpreter {
            response: confident("x"),
            calls: AtomicUsize::new(0),
        }),
        profile,
        instant_accept(),
    );

    h.handle.start();
    h.handle.utterance("hel pai bad");

    wait_for(&mut h.events, |e| {
        matches!(e, SessionEvent::EmergencyNotified { .. })
    })
    .await;
    let spoken = wait_for(&mut h.events, |e| matches!(e, SessionEvent::Spoken { .. })).await;
    let SessionEvent::Spoken { text } = spoken else {
        unreachable!();
    };
    assert!(text.contains("caregiver") || text.contains("emergency contact"));

    let messages = h.notifier.messages.lock().unwrap();
    assert!(messages[0].contains("hel pai bad"));
    assert!(messages[0].contains("Alex"));
}

#[tokio::test]
async fn ambiguous_utterance_confirmed_by_user() {
    let mut h = spawn_session(
        Arc::new(StubInterpreter {
            response: InterpreterResponse {
                interpretation: "I want water".into(),
                confidence: Some(40),
                ..InterpreterResponse::default()
            },
            calls: AtomicUsize::new(0),
        }),
        UserProfile::default(),
        instant_accept(),
    );

    h.handle.start();
    h.handle.utterance("wan wa-water now");

    wait_for(&mut h.events, |e| {
        matches!(e, SessionEvent::ConfirmInterpretation { .. })
    })
    .await;
    h.handle.confirm();

    let event = wait_for(&mut h.events, |e| {
        matches!(e, SessionEvent::InterpretationReady(_))
    })
    .await;
    let SessionEvent::InterpretationReady(interpretation) = event else {
        unreachable!();
    };
    assert_eq!(interpretation.interpreted_text, "I want water");
    assert!(!interpretation.requires_confirmation);

    // The confirmed text is spoken on the user's behalf.
    let spoken = wait_for(&mut h.events, |e| matches!(e, SessionEvent::Spoken { .. })).await;
    let SessionEvent::Spoken { text } = spoken else {
        unreachable!();
    };
    assert_eq!(text, "I want water");
}

#[tokio::test]
async fn rejection_reprompts_and_returns_to_listening() {
    let mut h = spawn_session(
        Arc::new(StubInterpreter {
            response: InterpreterResponse {
                interpretation: "I want water".into(),
                confidence: Some(40),
                ..InterpreterResponse::default()
            },
            calls: AtomicUsize::new(0),
        }),
        UserProfile::default(),
        instant_accept(),
    );

    h.handle.start();
    h.handle.utterance("wan wa-water now");

    wait_for(&mut h.events, |e| {
        matches!(e, SessionEvent::ConfirmInterpretation { .. })
    })
    .await;
    h.handle.reject();

    let spoken = wait_for(&mut h.events, |e| matches!(e, SessionEvent::Spoken { .. })).await;
    let SessionEvent::Spoken { text } = spoken else {
        unreachable!();
    };
    assert!(text.contains("try again"));

    wait_for(&mut h.events, |e| {
        matches!(e, SessionEvent::StateChanged(SessionState::Listening))
    })
    .await;
}

#[tokio::test]
async fn new_utterance_supersedes_inflight_interpretation() {
    let blocking = Arc::new(BlockingInterpreter {
        calls: AtomicUsize::new(0),
    });
    let mut h = spawn_session(blocking.clone(), UserProfile::default(), instant_accept());

    h.handle.start();
    // First utterance hangs inside the interpreter.
    h.handle.utterance("something unclear entirely");
    wait_for(&mut h.events, |e| {
        matches!(e, SessionEvent::StateChanged(SessionState::Interpreting))
    })
    .await;

    // Second utterance takes the direct-action path and must win.
    h.handle.utterance("li on");
    let event = wait_for(&mut h.events, |e| {
        matches!(e, SessionEvent::ActionExecuted { .. })
    })
    .await;
    let SessionEvent::ActionExecuted { action, .. } = event else {
        unreachable!();
    };
    assert_eq!(action, ActionType::LightsOn);

    // The hung interpreter was consulted exactly once and never again.
    assert_eq!(blocking.calls.load(Ordering::SeqCst), 1);
}

/// Completes only when released, so commands can be injected while the
/// interpreter is still thinking.
struct GatedInterpreter {
    gate: tokio::sync::Notify,
    calls: AtomicUsize,
    response: InterpreterResponse,
}

#[async_trait]
impl SemanticInterpreter for GatedInterpreter {
    async fn interpret(&self, _request: InterpretRequest) -> Result<InterpreterResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(self.response.clone())
    }
}

#[tokio::test]
async fn frames_and_redundant_starts_do_not_abort_inflight_utterance() {
    let gated = Arc::new(GatedInterpreter {
        gate: tokio::sync::Notify::new(),
        calls: AtomicUsize::new(0),
        response: InterpreterResponse {
            interpretation: "I want water".into(),
            confidence: Some(40),
            ..InterpreterResponse::default()
        },
    });
    let mut h = spawn_session(gated.clone(), UserProfile::default(), instant_accept());

    h.handle.start();
    h.handle.utterance("something unclear entirely");
    wait_for(&mut h.events, |e| {
        matches!(e, SessionEvent::StateChanged(SessionState::Interpreting))
    })
    .await;

    // A camera frame and a redundant start arrive mid-interpretation.
    // Only a new utterance or a stop may supersede; these must not.
    h.handle.frame(vec![0u8; 32]);
    h.handle.start();
    gated.gate.notify_one();

    wait_for(&mut h.events, |e| {
        matches!(e, SessionEvent::ConfirmInterpretation { .. })
    })
    .await;
    assert_eq!(gated.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stop_returns_to_idle_and_drops_pending_work() {
    let blocking = Arc::new(BlockingInterpreter {
        calls: AtomicUsize::new(0),
    });
    let mut h = spawn_session(blocking, UserProfile::default(), instant_accept());

    h.handle.start();
    h.handle.utterance("something unclear entirely");
    wait_for(&mut h.events, |e| {
        matches!(e, SessionEvent::StateChanged(SessionState::Interpreting))
    })
    .await;

    h.handle.stop();
    wait_for(&mut h.events, |e| {
        matches!(e, SessionEvent::StateChanged(SessionState::Idle))
    })
    .await;

    // No side effects leaked from the abandoned utterance.
    assert!(h.controller.executed.lock().unwrap().is_empty());
    assert!(h.notifier.messages.lock().unwrap().is_empty());

    drop(h.handle);
    h.task.await.unwrap().unwrap();
}

struct PointingScene;

#[async_trait]
impl speechbridge::collaborators::SceneAnalyzer for PointingScene {
    async fn analyze_frame(
        &self,
        _frame: &[u8],
    ) -> Result<Option<speechbridge::types::VisualContext>> {
        Ok(Some(speechbridge::types::VisualContext {
            objects: vec!["lamp".into(), "tv".into()],
            pointing_target: Some("lamp".into()),
            ..Default::default()
        }))
    }
}

#[tokio::test]
async fn pointing_cue_from_frame_redirects_spoken_action() {
    let orchestrator = Arc::new(InterpretationOrchestrator::new(
        Arc::new(StubInterpreter {
            response: confident("x"),
            calls: AtomicUsize::new(0),
        }),
        Arc::new(MemoryCorrectionStore::default()),
        Arc::new(StubNotifier::default()),
        InterpretationConfig::default(),
    ));
    let controller = Arc::new(StubController::default());
    let inventory = Arc::new(StaticDeviceInventory::new(vec![bedroom_lamp()]));
    let synthesis = Arc::new(SynthesisRouter::new(vec![Arc::new(SilentSynth)]));

    let (session, handle, mut events) = ConversationSessionController::new(
        orchestrator,
        inventory,
        controller.clone(),
        synthesis,
        UserProfile::default(),
        instant_accept(),
    );
    let session = session.with_scene_analyzer(Arc::new(PointingScene));
    tokio::spawn(session.run());

    handle.start();
    handle.frame(vec![0u8; 64]);
    // The user says "tv" while pointing at the lamp: the pointed object
    // wins, the phrase only supplies the verb.
    handle.utterance("turn on tv");

    let event = wait_for(&mut events, |e| {
        matches!(e, SessionEvent::ActionExecuted { .. })
    })
    .await;
    let SessionEvent::ActionExecuted { action, device, .. } = event else {
        unreachable!();
    };
    assert_eq!(action, ActionType::LightsOn);
    assert_eq!(device.unwrap().id, "lamp-1");
}

#[tokio::test]
async fn utterances_while_idle_are_ignored() {
    let interpreter = Arc::new(StubInterpreter {
        response: confident("x"),
        calls: AtomicUsize::new(0),
    });
    let mut h = spawn_session(interpreter.clone(), UserProfile::default(), instant_accept());

    // No start: the session is idle and must ignore input.
    h.handle.utterance("li on");
    h.handle.start();
    h.handle.stop();

    drop(h.handle);
    h.task.await.unwrap().unwrap();

    let mut saw_action = false;
    while let Ok(event) = h.events.try_recv() {
        if matches!(event, SessionEvent::ActionExecuted { .. }) {
            saw_action = true;
        }
    }
    assert!(!saw_action);
    assert!(h.controller.executed.lock().unwrap().is_empty());
}
