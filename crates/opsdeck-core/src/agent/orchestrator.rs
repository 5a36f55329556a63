//! Agent orchestration state machine.
//!
//! ```text
//!            submit (non-empty, Idle)
//!   Idle ───────────────────────────────→ Sending
//!    ↑                                       │
//!    │   /clear │ directive ack │ unknown    │
//!    │   missing credential │ stream end     │
//!    └──────── stream error │ cancel ────────┘
//! ```
//!
//! History and presets are written through to the store on every mutation and
//! every history change is published on a watch channel, including each
//! streamed chunk.

use super::command::{Directive, KNOWN_DIRECTIVES};
use super::dispatch::CommandDispatch;
use super::remote::ConversationService;
use crate::error::{Error, Result};
use crate::store::{HISTORY_KEY, KeyValueStore, PRESETS_KEY, PersistentStore};
use crate::telemetry::TelemetryHub;
use crate::types::{AgentMessage, MessageSnapshot, Preset, Role};
use futures::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Persona embedded in every system instruction.
pub const PERSONA: &str = "You are the operations assistant of a local AI workstation. \
Answer like a calm systems engineer: short, concrete, and grounded in the live telemetry \
you are given. Flag thermal or memory pressure when you see it.";

pub const CREDENTIAL_ERROR: &str = "Configuration error: no API credential is configured \
for the conversation service. Add an API key and try again.";

pub const CONNECTION_ERROR: &str = "Connection error: the conversation service could not \
be reached or the stream was interrupted.";

/// Build the system instruction for a message sent under `snapshot`.
pub fn system_instruction(snapshot: &MessageSnapshot) -> String {
    format!(
        "{}\n\nLive telemetry: VRAM usage {} GB, GPU temperature {} °C.",
        PERSONA, snapshot.vram, snapshot.temp
    )
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Simulated latency before a local directive is handled.
    pub command_delay: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command_delay: Duration::from_millis(600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPhase {
    Idle,
    Sending,
}

/// How a submission resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Cleared,
    Acknowledged(Directive),
    UnknownDirective,
    MissingCredential,
    Replied,
    Failed,
    Cancelled,
}

struct Conversation {
    phase: AgentPhase,
    history: Vec<AgentMessage>,
    presets: Vec<Preset>,
    last_id: i64,
    cancel: CancellationToken,
}

impl Conversation {
    fn next_id(&mut self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        self.last_id = now.max(self.last_id + 1);
        self.last_id
    }

    fn message(
        &mut self,
        role: Role,
        text: String,
        snapshot: Option<MessageSnapshot>,
    ) -> AgentMessage {
        AgentMessage {
            id: self.next_id(),
            role,
            text,
            timestamp: chrono::Utc::now().timestamp_millis(),
            snapshot,
        }
    }
}

/// Routes operator input to local directives or the conversation service.
pub struct AgentOrchestrator {
    store: Arc<dyn KeyValueStore>,
    telemetry: Arc<TelemetryHub>,
    service: Arc<dyn ConversationService>,
    dispatcher: Arc<dyn CommandDispatch>,
    config: AgentConfig,
    inner: Mutex<Conversation>,
    history_tx: watch::Sender<Vec<AgentMessage>>,
}

/// Returns the orchestrator to Idle even if the submit future is dropped.
struct SendingGuard<'a>(&'a AgentOrchestrator);

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().phase = AgentPhase::Idle;
    }
}

impl AgentOrchestrator {
    /// Create an orchestrator, restoring history and presets from `store`.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        telemetry: Arc<TelemetryHub>,
        service: Arc<dyn ConversationService>,
        dispatcher: Arc<dyn CommandDispatch>,
        config: AgentConfig,
    ) -> Self {
        let history: Vec<AgentMessage> = store.get(HISTORY_KEY, Vec::new());
        let presets: Vec<Preset> = store.get(PRESETS_KEY, Vec::new());
        let last_id = history.iter().map(|m| m.id).max().unwrap_or(0);
        debug!(
            messages = history.len(),
            presets = presets.len(),
            "Restored agent state"
        );

        let (history_tx, _) = watch::channel(history.clone());
        Self {
            store,
            telemetry,
            service,
            dispatcher,
            config,
            inner: Mutex::new(Conversation {
                phase: AgentPhase::Idle,
                history,
                presets,
                last_id,
                cancel: CancellationToken::new(),
            }),
            history_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Conversation> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> AgentPhase {
        self.lock().phase
    }

    pub fn history(&self) -> Vec<AgentMessage> {
        self.lock().history.clone()
    }

    pub fn presets(&self) -> Vec<Preset> {
        self.lock().presets.clone()
    }

    /// Receive every published history, including each streamed chunk.
    pub fn subscribe(&self) -> watch::Receiver<Vec<AgentMessage>> {
        self.history_tx.subscribe()
    }

    /// Cancel the in-flight submission, if any.
    ///
    /// A directive still waiting out its command delay is dropped without
    /// running. A streamed reply stops and keeps the text received so far.
    pub fn cancel(&self) -> bool {
        let conv = self.lock();
        if conv.phase != AgentPhase::Sending {
            return false;
        }
        conv.cancel.cancel();
        true
    }

    /// Submit operator input.
    ///
    /// Returns [`Error::EmptyInput`] for blank input and [`Error::Busy`] while a
    /// previous submission is still being handled. Every other failure is
    /// reported as an assistant message and a [`SubmitOutcome`].
    pub async fn submit(&self, input: &str) -> Result<SubmitOutcome> {
        let text = input.trim();
        if text.is_empty() {
            return Err(Error::EmptyInput);
        }

        let snapshot = self.telemetry.snapshot();
        let token = {
            let mut conv = self.lock();
            if conv.phase == AgentPhase::Sending {
                return Err(Error::Busy);
            }
            conv.phase = AgentPhase::Sending;
            conv.cancel = CancellationToken::new();
            let message = conv.message(Role::User, text.to_string(), Some(snapshot.clone()));
            conv.history.push(message);
            self.commit_history(&conv);
            conv.cancel.clone()
        };
        let _sending = SendingGuard(self);

        let outcome = if text.starts_with('/') {
            self.run_directive(text, token).await
        } else {
            self.run_conversation(text, &snapshot, token).await
        };

        info!(outcome = ?outcome, "Submission handled");
        Ok(outcome)
    }

    async fn run_directive(&self, text: &str, token: CancellationToken) -> SubmitOutcome {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!(raw = text, "Directive cancelled before it ran");
                return SubmitOutcome::Cancelled;
            }
            _ = tokio::time::sleep(self.config.command_delay) => {}
        }

        let directive =
            Directive::parse(text).unwrap_or_else(|| Directive::Unrecognized(text.to_string()));

        match directive {
            Directive::Clear => {
                let mut conv = self.lock();
                conv.history = Vec::new();
                self.commit_history(&conv);
                info!("Conversation history cleared");
                SubmitOutcome::Cleared
            }
            Directive::Unrecognized(_) => {
                warn!(raw = text, "Unrecognized directive");
                self.push_assistant(format!(
                    "Unknown directive `{}`. Known directives: {}",
                    text,
                    KNOWN_DIRECTIVES.join(", ")
                ));
                SubmitOutcome::UnknownDirective
            }
            directive => {
                self.push_assistant(format!("Directive acknowledged: `{}`", text));
                self.dispatcher.dispatch(&directive, text);
                SubmitOutcome::Acknowledged(directive)
            }
        }
    }

    async fn run_conversation(
        &self,
        text: &str,
        snapshot: &MessageSnapshot,
        token: CancellationToken,
    ) -> SubmitOutcome {
        if !self.service.has_credential() {
            warn!("No credential configured for conversation service");
            self.push_assistant(CREDENTIAL_ERROR.to_string());
            return SubmitOutcome::MissingCredential;
        }

        let instruction = system_instruction(snapshot);
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => return SubmitOutcome::Cancelled,
            opened = self.service.stream_reply(&instruction, text) => opened,
        };

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, "Failed to open conversation stream");
                self.push_assistant(CONNECTION_ERROR.to_string());
                return SubmitOutcome::Failed;
            }
        };

        let reply_id = self.push_assistant(String::new());
        let mut chunks = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    info!(chunks, "Conversation stream cancelled");
                    return SubmitOutcome::Cancelled;
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    chunks += 1;
                    self.append_chunk(reply_id, &chunk);
                }
                Some(Err(e)) => {
                    error!(error = %e, chunks, "Conversation stream failed");
                    self.push_assistant(CONNECTION_ERROR.to_string());
                    return SubmitOutcome::Failed;
                }
                None => break,
            }
        }

        debug!(chunks, "Conversation stream complete");
        SubmitOutcome::Replied
    }

    fn push_assistant(&self, text: String) -> i64 {
        let mut conv = self.lock();
        let message = conv.message(Role::Assistant, text, None);
        let id = message.id;
        conv.history.push(message);
        self.commit_history(&conv);
        id
    }

    fn append_chunk(&self, id: i64, chunk: &str) {
        let mut conv = self.lock();
        match conv.history.iter_mut().rev().find(|m| m.id == id) {
            Some(message) => message.text.push_str(chunk),
            None => {
                debug!(id, "Reply message no longer in history, dropping chunk");
                return;
            }
        }
        self.commit_history(&conv);
    }

    /// Persist and publish the history. Write failures are logged, not raised.
    fn commit_history(&self, conv: &Conversation) {
        if let Err(e) = self.store.set(HISTORY_KEY, &conv.history) {
            error!(error = %e, "Failed to persist conversation history");
        }
        self.history_tx.send_replace(conv.history.clone());
    }

    fn commit_presets(&self, conv: &Conversation) {
        if let Err(e) = self.store.set(PRESETS_KEY, &conv.presets) {
            error!(error = %e, "Failed to persist presets");
        }
    }

    /// Wipe the history outside of the `/clear` directive.
    pub fn clear_history(&self) -> Result<()> {
        let mut conv = self.lock();
        if conv.phase == AgentPhase::Sending {
            return Err(Error::Busy);
        }
        conv.history = Vec::new();
        self.commit_history(&conv);
        Ok(())
    }

    /// Save `input` as a preset. Blank input is ignored.
    pub fn save_preset(&self, input: &str) -> Option<Preset> {
        let command = input.trim();
        if command.is_empty() {
            return None;
        }

        let preset = Preset::new(command);
        let mut conv = self.lock();
        conv.presets.push(preset.clone());
        self.commit_presets(&conv);
        info!(id = %preset.id, label = %preset.label, "Preset saved");
        Some(preset)
    }

    /// Remove a preset by id. Returns false if no preset had that id.
    pub fn delete_preset(&self, id: &str) -> bool {
        let mut conv = self.lock();
        let before = conv.presets.len();
        conv.presets.retain(|p| p.id != id);
        if conv.presets.len() == before {
            return false;
        }
        self.commit_presets(&conv);
        info!(id, "Preset deleted");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::remote::ChunkStream;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    type ChunkSender = mpsc::Sender<Result<String>>;

    struct ScriptedService {
        credential: bool,
        fail_open: bool,
        calls: AtomicUsize,
        chunks: Mutex<Option<mpsc::Receiver<Result<String>>>>,
        instruction: Mutex<Option<String>>,
    }

    impl ScriptedService {
        fn live() -> (ChunkSender, Arc<Self>) {
            let (tx, rx) = mpsc::channel(16);
            let service = Self {
                credential: true,
                fail_open: false,
                calls: AtomicUsize::new(0),
                chunks: Mutex::new(Some(rx)),
                instruction: Mutex::new(None),
            };
            (tx, Arc::new(service))
        }

        fn scripted(chunks: Vec<Result<String>>) -> Arc<Self> {
            let (tx, service) = Self::live();
            for chunk in chunks {
                tx.try_send(chunk).unwrap();
            }
            service
        }

        fn without_credential() -> Arc<Self> {
            let (_, service) = Self::live();
            Arc::new(Self {
                credential: false,
                ..Arc::into_inner(service).unwrap()
            })
        }

        fn failing() -> Arc<Self> {
            let (_, service) = Self::live();
            Arc::new(Self {
                fail_open: true,
                ..Arc::into_inner(service).unwrap()
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ConversationService for ScriptedService {
        fn has_credential(&self) -> bool {
            self.credential
        }

        async fn stream_reply(
            &self,
            system_instruction: &str,
            _message: &str,
        ) -> Result<ChunkStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.instruction.lock().unwrap() = Some(system_instruction.to_string());
            if self.fail_open {
                return Err(Error::Remote("connection refused".into()));
            }
            let rx = self.chunks.lock().unwrap().take().expect("stream opened twice");
            Ok(Box::pin(ReceiverStream::new(rx)))
        }
    }

    #[derive(Default)]
    struct RecordingDispatch {
        seen: Mutex<Vec<(Directive, String)>>,
    }

    impl CommandDispatch for RecordingDispatch {
        fn dispatch(&self, directive: &Directive, raw: &str) {
            self.seen
                .lock()
                .unwrap()
                .push((directive.clone(), raw.to_string()));
        }
    }

    struct Harness {
        agent: Arc<AgentOrchestrator>,
        store: Arc<MemoryStore>,
        dispatch: Arc<RecordingDispatch>,
    }

    fn harness_with(service: Arc<ScriptedService>, store: Arc<MemoryStore>) -> Harness {
        let dispatch = Arc::new(RecordingDispatch::default());
        let agent = AgentOrchestrator::new(
            store.clone(),
            Arc::new(TelemetryHub::default()),
            service,
            dispatch.clone(),
            AgentConfig::default(),
        );
        Harness {
            agent: Arc::new(agent),
            store,
            dispatch,
        }
    }

    /// Store whose writes always fail.
    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn load(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn save(&self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::Other("disk is read-only".into()))
        }
    }

    fn harness(service: Arc<ScriptedService>) -> Harness {
        harness_with(service, Arc::new(MemoryStore::new()))
    }

    fn stored_history(store: &MemoryStore) -> Vec<AgentMessage> {
        store.get(HISTORY_KEY, Vec::new())
    }

    #[test]
    fn test_rejects_blank_input() {
        let h = harness(ScriptedService::scripted(vec![]));
        let submit = |text: &str| tokio_test::block_on(h.agent.submit(text));
        assert!(matches!(submit(""), Err(Error::EmptyInput)));
        assert!(matches!(submit("   \n\t"), Err(Error::EmptyInput)));
        assert!(h.agent.history().is_empty());
        assert_eq!(h.agent.phase(), AgentPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_empties_history() {
        let store = Arc::new(MemoryStore::new());
        let old = AgentMessage {
            id: 1,
            role: Role::User,
            text: "earlier".into(),
            timestamp: 0,
            snapshot: None,
        };
        store.set(HISTORY_KEY, &vec![old]).unwrap();

        let h = harness_with(ScriptedService::scripted(vec![]), store);
        assert_eq!(h.agent.history().len(), 1);

        let outcome = h.agent.submit("/clear").await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Cleared);
        assert!(h.agent.history().is_empty());
        assert!(stored_history(&h.store).is_empty());
        assert_eq!(h.agent.phase(), AgentPhase::Idle);
        assert!(h.dispatch.seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_directive_is_acknowledged_and_dispatched() {
        let service = ScriptedService::scripted(vec![]);
        let h = harness(service.clone());

        let outcome = h.agent.submit("  /purge ").await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Acknowledged(Directive::Purge));
        let history = h.agent.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].text, "/purge");
        assert!(history[0].snapshot.is_some());
        assert_eq!(history[1].role, Role::Assistant);
        assert!(history[1].text.contains("/purge"));
        assert!(history[1].snapshot.is_none());

        let seen = h.dispatch.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[(Directive::Purge, "/purge".to_string())]);
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_directive_waits_for_command_delay() {
        let h = harness(ScriptedService::scripted(vec![]));
        let agent = h.agent.clone();
        let task = tokio::spawn(async move { agent.submit("/status").await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.agent.phase(), AgentPhase::Sending);
        assert_eq!(h.agent.history().len(), 1);

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, SubmitOutcome::Acknowledged(Directive::Status));
        assert_eq!(h.agent.phase(), AgentPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_command_delay_skips_directive() {
        let store = Arc::new(MemoryStore::new());
        let old = AgentMessage {
            id: 1,
            role: Role::User,
            text: "keep me".into(),
            timestamp: 0,
            snapshot: None,
        };
        store.set(HISTORY_KEY, &vec![old]).unwrap();
        let h = harness_with(ScriptedService::scripted(vec![]), store);

        let agent = h.agent.clone();
        let task = tokio::spawn(async move { agent.submit("/clear").await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(h.agent.cancel());
        assert_eq!(task.await.unwrap().unwrap(), SubmitOutcome::Cancelled);

        let history = h.agent.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].text, "keep me");
        assert_eq!(history[1].text, "/clear");
        assert_eq!(h.agent.phase(), AgentPhase::Idle);
        assert!(h.dispatch.seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_directive_is_reported_not_dispatched() {
        let h = harness(ScriptedService::scripted(vec![]));

        let outcome = h.agent.submit("/warp 9").await.unwrap();

        assert_eq!(outcome, SubmitOutcome::UnknownDirective);
        let history = h.agent.history();
        assert_eq!(history.len(), 2);
        assert!(history[1].text.contains("Unknown directive"));
        assert!(history[1].text.contains("/clear"));
        assert!(h.dispatch.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_credential_short_circuits() {
        let service = ScriptedService::without_credential();
        let h = harness(service.clone());

        let outcome = h.agent.submit("how hot is it?").await.unwrap();

        assert_eq!(outcome, SubmitOutcome::MissingCredential);
        let history = h.agent.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, Role::Assistant);
        assert!(history[1].text.contains("Configuration error"));
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test]
    async fn test_streamed_reply_is_assembled() {
        let service = ScriptedService::scripted(vec![
            Ok("Hel".into()),
            Ok("lo, ".into()),
            Ok("world".into()),
        ]);
        let h = harness(service.clone());

        let outcome = h.agent.submit("greet me").await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Replied);
        let history = h.agent.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].text, "Hello, world");
        assert_eq!(stored_history(&h.store), history);
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn test_stream_is_observable_after_each_chunk() {
        let (tx, service) = ScriptedService::live();
        let h = harness(service);
        let mut rx = h.agent.subscribe();

        let agent = h.agent.clone();
        let task = tokio::spawn(async move { agent.submit("greet me").await });

        rx.wait_for(|h| h.len() == 2 && h[1].role == Role::Assistant)
            .await
            .unwrap();

        for (chunk, expected) in [("Hel", "Hel"), ("lo, ", "Hello, "), ("world", "Hello, world")] {
            tx.send(Ok(chunk.to_string())).await.unwrap();
            rx.wait_for(|h| h[1].text == expected).await.unwrap();
            assert_eq!(h.agent.phase(), AgentPhase::Sending);
        }

        drop(tx);
        assert_eq!(task.await.unwrap().unwrap(), SubmitOutcome::Replied);
        assert_eq!(h.agent.phase(), AgentPhase::Idle);
    }

    #[tokio::test]
    async fn test_system_instruction_embeds_persona_and_snapshot() {
        let service = ScriptedService::scripted(vec![Ok("ok".into())]);
        let h = harness(service.clone());

        h.agent.submit("status?").await.unwrap();

        let instruction = service.instruction.lock().unwrap().clone().unwrap();
        let snapshot = h.agent.history()[0].snapshot.clone().unwrap();
        assert!(instruction.starts_with(PERSONA));
        assert!(instruction.contains(&format!("VRAM usage {} GB", snapshot.vram)));
        assert!(instruction.contains(&format!("GPU temperature {} °C", snapshot.temp)));
    }

    #[tokio::test]
    async fn test_stream_failure_keeps_partial_text() {
        let service = ScriptedService::scripted(vec![
            Ok("Par".into()),
            Err(Error::Remote("reset by peer".into())),
        ]);
        let h = harness(service);

        let outcome = h.agent.submit("long answer please").await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Failed);
        let history = h.agent.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].text, "Par");
        assert_eq!(history[2].text, CONNECTION_ERROR);
        assert_eq!(h.agent.phase(), AgentPhase::Idle);
    }

    #[tokio::test]
    async fn test_open_failure_reports_single_message() {
        let h = harness(ScriptedService::failing());

        let outcome = h.agent.submit("hello").await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Failed);
        let history = h.agent.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].text, CONNECTION_ERROR);
    }

    #[tokio::test]
    async fn test_rejects_submit_while_sending() {
        let (tx, service) = ScriptedService::live();
        let h = harness(service);
        let mut rx = h.agent.subscribe();

        let agent = h.agent.clone();
        let task = tokio::spawn(async move { agent.submit("first").await });
        rx.wait_for(|h| h.len() == 2).await.unwrap();

        assert!(matches!(h.agent.submit("second").await, Err(Error::Busy)));
        assert!(matches!(h.agent.clear_history(), Err(Error::Busy)));

        drop(tx);
        assert_eq!(task.await.unwrap().unwrap(), SubmitOutcome::Replied);
        assert_eq!(h.agent.history().len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_keeps_partial_text() {
        let (tx, service) = ScriptedService::live();
        let h = harness(service);
        let mut rx = h.agent.subscribe();

        let agent = h.agent.clone();
        let task = tokio::spawn(async move { agent.submit("tell me a story").await });

        tx.send(Ok("Once".into())).await.unwrap();
        rx.wait_for(|h| h.len() == 2 && h[1].text == "Once").await.unwrap();

        assert!(h.agent.cancel());
        assert_eq!(task.await.unwrap().unwrap(), SubmitOutcome::Cancelled);
        assert_eq!(h.agent.history()[1].text, "Once");
        assert_eq!(h.agent.phase(), AgentPhase::Idle);
        assert!(!h.agent.cancel());
    }

    #[tokio::test]
    async fn test_write_failures_do_not_change_the_state_machine() {
        let service = ScriptedService::scripted(vec![Ok("still ".into()), Ok("here".into())]);
        let agent = AgentOrchestrator::new(
            Arc::new(ReadOnlyStore),
            Arc::new(TelemetryHub::default()),
            service,
            Arc::new(RecordingDispatch::default()),
            AgentConfig::default(),
        );
        let rx = agent.subscribe();

        let outcome = agent.submit("are you there?").await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Replied);
        assert_eq!(agent.phase(), AgentPhase::Idle);
        let history = agent.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].text, "still here");
        assert_eq!(*rx.borrow(), history);

        assert!(agent.save_preset("/status").is_some());
        assert_eq!(agent.presets().len(), 1);
        assert!(agent.clear_history().is_ok());
        assert!(agent.history().is_empty());
    }

    #[tokio::test]
    async fn test_preset_round_trip() {
        let h = harness(ScriptedService::scripted(vec![]));

        let preset = h.agent.save_preset("status check").unwrap();
        assert_eq!(preset.command, "status check");
        assert_eq!(preset.label, "status check...");

        let presets = h.agent.presets();
        assert_eq!(presets, vec![preset.clone()]);
        let stored: Vec<Preset> = h.store.get(PRESETS_KEY, Vec::new());
        assert_eq!(stored, presets);

        assert!(h.agent.delete_preset(&preset.id));
        assert!(h.agent.presets().is_empty());
        let stored: Vec<Preset> = h.store.get(PRESETS_KEY, Vec::new());
        assert!(stored.is_empty());

        assert!(!h.agent.delete_preset(&preset.id));
    }

    #[tokio::test]
    async fn test_blank_preset_is_ignored() {
        let h = harness(ScriptedService::scripted(vec![]));
        assert!(h.agent.save_preset("   ").is_none());
        assert!(h.agent.presets().is_empty());
    }

    #[tokio::test]
    async fn test_restores_state_and_keeps_ids_increasing() {
        let store = Arc::new(MemoryStore::new());
        let future_id = chrono::Utc::now().timestamp_millis() + 60_000;
        let old = AgentMessage {
            id: future_id,
            role: Role::Assistant,
            text: "from last session".into(),
            timestamp: 0,
            snapshot: None,
        };
        store.set(HISTORY_KEY, &vec![old]).unwrap();
        store.set(PRESETS_KEY, &vec![Preset::new("/purge")]).unwrap();

        let h = harness_with(ScriptedService::without_credential(), store);
        assert_eq!(h.agent.presets().len(), 1);

        h.agent.submit("a").await.unwrap();
        let ids: Vec<i64> = h.agent.history().iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}
