//! Script lifecycle: one worker thread per run, cooperative pause and stop.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use clientlink_queue::CancelToken;

use crate::driver::{DebuggerAction, DebuggerCaps, ScriptFault, SourceLocation, StepDriver};
use crate::events::{SessionEvent, SessionEventPayload, SessionId};
use crate::host::{self, HostBindings, RunOutcome, ScriptRun};
use crate::watch::{VariableSnapshot, WatchItem, WatchScope};

/// How long `stop` waits for the worker to wind down.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(2);

const FINISH_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebuggerStatus {
    Idle,
    Running,
    Paused,
    Stopped,
}

impl fmt::Display for DebuggerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DebuggerStatus::Idle => "idle",
            DebuggerStatus::Running => "running",
            DebuggerStatus::Paused => "paused",
            DebuggerStatus::Stopped => "stopped",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to spawn script worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Controls exposed to the UI.
pub trait SessionControl {
    /// Start a run from Idle or Stopped, resume from Paused. Ignored while
    /// Running.
    fn play(&self, script: &str, base_path: &Path) -> Result<(), SessionError>;

    /// Hold the script at its next line. Only applies while Running.
    fn pause(&self);

    /// Paused -> Running.
    fn resume(&self);

    /// Stop from any state. Idempotent.
    fn stop(&self);

    fn status(&self) -> DebuggerStatus;
}

// =============================================================================
// Shared state (controller <-> worker)
// =============================================================================

struct SessionState {
    id: SessionId,
    name: String,
    status: Mutex<DebuggerStatus>,
    variables: VariableSnapshot,
    events: mpsc::Sender<SessionEvent>,
}

impl SessionState {
    fn status(&self) -> DebuggerStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `to` if the current state satisfies `allowed`. Emits
    /// `StatusChanged` on a real change.
    fn transition(&self, allowed: impl Fn(DebuggerStatus) -> bool, to: DebuggerStatus) -> bool {
        let changed = {
            let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
            if !allowed(*status) || *status == to {
                false
            } else {
                *status = to;
                true
            }
        };
        if changed {
            log::info!("session '{}' is now {}", self.name, to);
            self.emit(SessionEventPayload::StatusChanged(to));
        }
        changed
    }

    /// Worker teardown: always lands in Stopped and tells the UI.
    fn finish(&self) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = DebuggerStatus::Stopped;
        self.emit(SessionEventPayload::StatusChanged(DebuggerStatus::Stopped));
    }

    fn emit(&self, payload: SessionEventPayload) {
        // The UI may have gone away; nothing to do then.
        let _ = self.events.send(SessionEvent { session_id: self.id, payload });
    }
}

impl StepDriver for SessionState {
    fn capabilities(&self) -> DebuggerCaps {
        DebuggerCaps::CAN_DEBUG_SOURCE_CODE | DebuggerCaps::HAS_LINE_BASED_BREAKPOINTS
    }

    fn get_action(&self, _ip: u64, _location: &SourceLocation) -> DebuggerAction {
        match self.status() {
            DebuggerStatus::Running => DebuggerAction::Run,
            DebuggerStatus::Idle | DebuggerStatus::Paused | DebuggerStatus::Stopped => {
                DebuggerAction::None
            }
        }
    }

    fn update(&self, scope: WatchScope, items: &[WatchItem]) {
        self.variables.update(scope, items);
    }

    fn signal_runtime_fault(&self, fault: ScriptFault) -> ScriptFault {
        log::warn!("session '{}' faulted: {}", self.name, fault);
        self.emit(SessionEventPayload::Fault(fault.clone()));
        fault
    }
}

/// Runs [`SessionState::finish`] however the worker exits, panics included.
struct FinishGuard(Arc<SessionState>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}

struct Worker {
    handle: JoinHandle<()>,
    cancel: CancelToken,
}

impl Worker {
    /// Cancel and join. Harmless on a finished worker.
    fn retire(self) {
        self.cancel.cancel();
        if self.handle.join().is_err() {
            log::error!("script worker panicked");
        }
    }
}

// =============================================================================
// ScriptSession
// =============================================================================

/// One script slot. Each `play` from Idle or Stopped starts a fresh worker
/// with its own Lua VM.
pub struct ScriptSession {
    state: Arc<SessionState>,
    bindings: HostBindings,
    stop_grace: Duration,
    worker: Mutex<Option<Worker>>,
}

impl ScriptSession {
    pub fn new(
        name: impl Into<String>,
        bindings: HostBindings,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Self {
            state: Arc::new(SessionState {
                id: SessionId::new(),
                name: name.into(),
                status: Mutex::new(DebuggerStatus::Idle),
                variables: VariableSnapshot::new(),
                events,
            }),
            bindings,
            stop_grace: DEFAULT_STOP_GRACE,
            worker: Mutex::new(None),
        }
    }

    pub fn with_stop_grace(mut self, stop_grace: Duration) -> Self {
        self.stop_grace = stop_grace;
        self
    }

    pub fn id(&self) -> SessionId {
        self.state.id
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// The locals captured at the most recent line.
    pub fn variables(&self) -> BTreeMap<String, String> {
        self.state.variables.to_map()
    }

    pub fn variable(&self, name: &str) -> Option<String> {
        self.state.variables.get(name)
    }

    /// The step driver this session installs into its VM.
    pub fn driver(&self) -> Arc<dyn StepDriver> {
        self.state.clone()
    }

    pub fn is_worker_alive(&self) -> bool {
        self.lock_worker().as_ref().is_some_and(|w| !w.handle.is_finished())
    }

    /// Block until the current worker, if any, has exited.
    pub fn wait(&self) {
        let worker = self.lock_worker().take();
        if let Some(worker) = worker {
            if worker.handle.join().is_err() {
                log::error!("script worker panicked");
            }
        }
    }

    fn lock_worker(&self) -> std::sync::MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_worker(&self, script: &str, base_path: &Path) -> Result<Worker, SessionError> {
        let cancel = CancelToken::new();
        let state = self.state.clone();
        let bindings = self.bindings.clone();
        let script = script.to_string();
        let base_path = base_path.to_path_buf();
        let worker_cancel = cancel.clone();

        let handle = std::thread::Builder::new()
            .name(format!("script-{}", self.state.name))
            .spawn(move || run_worker(state, bindings, script, base_path, worker_cancel))
            .map_err(SessionError::Spawn)?;
        Ok(Worker { handle, cancel })
    }
}

impl SessionControl for ScriptSession {
    fn play(&self, script: &str, base_path: &Path) -> Result<(), SessionError> {
        let mut worker = self.lock_worker();
        match self.state.status() {
            DebuggerStatus::Paused => {
                self.resume();
                return Ok(());
            }
            DebuggerStatus::Running => {
                log::warn!("play ignored: session '{}' is already running", self.state.name);
                return Ok(());
            }
            DebuggerStatus::Idle | DebuggerStatus::Stopped => {}
        }

        if let Some(old) = worker.take() {
            old.retire();
        }
        self.state.variables.clear();
        self.state.transition(|_| true, DebuggerStatus::Running);

        match self.spawn_worker(script, base_path) {
            Ok(spawned) => {
                *worker = Some(spawned);
                Ok(())
            }
            Err(e) => {
                self.state.finish();
                Err(e)
            }
        }
    }

    fn pause(&self) {
        self.state.transition(|s| s == DebuggerStatus::Running, DebuggerStatus::Paused);
    }

    fn resume(&self) {
        self.state.transition(|s| s == DebuggerStatus::Paused, DebuggerStatus::Running);
    }

    fn stop(&self) {
        let mut worker = self.lock_worker();
        self.state.transition(|_| true, DebuggerStatus::Stopped);

        let Some(current) = worker.as_ref() else { return };
        current.cancel.cancel();

        let deadline = Instant::now() + self.stop_grace;
        while !current.handle.is_finished() && Instant::now() < deadline {
            std::thread::sleep(FINISH_POLL_INTERVAL);
        }
        if current.handle.is_finished() {
            if let Some(finished) = worker.take() {
                finished.retire();
            }
        } else {
            log::warn!(
                "session '{}' worker still running after {}ms; it will be joined on the next play",
                self.state.name,
                self.stop_grace.as_millis()
            );
        }
    }

    fn status(&self) -> DebuggerStatus {
        self.state.status()
    }
}

impl Drop for ScriptSession {
    fn drop(&mut self) {
        let worker = self.worker.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(worker) = worker {
            worker.retire();
        }
    }
}

impl fmt::Debug for ScriptSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptSession")
            .field("id", &self.state.id)
            .field("name", &self.state.name)
            .field("status", &self.state.status())
            .finish_non_exhaustive()
    }
}

fn run_worker(
    state: Arc<SessionState>,
    bindings: HostBindings,
    script: String,
    base_path: PathBuf,
    cancel: CancelToken,
) {
    let _finish = FinishGuard(state.clone());
    let run = ScriptRun { name: &state.name, source: &script, base_path: &base_path };
    let printer = state.clone();
    let outcome = host::run_script(&bindings, &run, state.clone(), &cancel, move |line| {
        printer.emit(SessionEventPayload::Output(line));
    });

    match outcome {
        RunOutcome::Completed => log::info!("script '{}' completed", state.name),
        RunOutcome::Cancelled => log::info!("script '{}' stopped", state.name),
        RunOutcome::Faulted { fault, reported } => {
            if !reported {
                log::warn!("script '{}' failed: {}", state.name, fault);
                state.emit(SessionEventPayload::Fault(fault));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clientlink_protocol::{Command, CommandKind, CommandParams, QueueSnapshot};
    use clientlink_queue::{
        AttachedClient, CommandDispatcher, CommandQueueStore, DispatchConfig, MemoryQueueStore,
    };
    use clientlink_state::{BucketKind, ClientStatus, ProcessStateView};

    const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

    struct Harness {
        session: ScriptSession,
        events: mpsc::Receiver<SessionEvent>,
        store: Arc<MemoryQueueStore>,
        status: ClientStatus,
    }

    fn harness(attached: bool) -> Harness {
        harness_with_store(attached, MemoryQueueStore::new())
    }

    fn harness_with_store(attached: bool, store: MemoryQueueStore) -> Harness {
        let store = Arc::new(store);
        let target = AttachedClient::detached();
        if attached {
            target.attach(1);
        }
        let config = DispatchConfig {
            timeout: Duration::from_millis(20),
            poll_interval: Duration::from_millis(5),
            ..DispatchConfig::default()
        };
        let dispatcher = CommandDispatcher::new(store.clone(), Arc::new(target), config);
        let status = ClientStatus::new();
        let bindings = HostBindings::new(dispatcher, ProcessStateView::from_status(&status));
        let (tx, rx) = mpsc::channel();
        let session = ScriptSession::new("test", bindings, tx);
        Harness { session, events: rx, store, status }
    }

    /// Collect events up to and including the first `StatusChanged(Stopped)`.
    fn run_to_stop(events: &mpsc::Receiver<SessionEvent>) -> Vec<SessionEventPayload> {
        let mut seen = Vec::new();
        loop {
            let event = events.recv_timeout(EVENT_TIMEOUT).expect("session did not stop");
            let done = event.payload == SessionEventPayload::StatusChanged(DebuggerStatus::Stopped);
            seen.push(event.payload);
            if done {
                return seen;
            }
        }
    }

    fn outputs(events: &[SessionEventPayload]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEventPayload::Output(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }

    fn faults(events: &[SessionEventPayload]) -> Vec<ScriptFault> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEventPayload::Fault(fault) => Some(fault.clone()),
                _ => None,
            })
            .collect()
    }

    fn wait_for_output(events: &mpsc::Receiver<SessionEvent>) -> String {
        loop {
            let event = events.recv_timeout(EVENT_TIMEOUT).expect("no output");
            if let SessionEventPayload::Output(line) = event.payload {
                return line;
            }
        }
    }

    #[test]
    fn test_print_reaches_ui_and_run_ends_stopped() {
        let h = harness(false);
        h.session.play("print('hello', 42, 1.5, nil)", Path::new(".")).unwrap();
        let events = run_to_stop(&h.events);

        assert_eq!(events[0], SessionEventPayload::StatusChanged(DebuggerStatus::Running));
        assert_eq!(outputs(&events), vec!["hello\t42\t1.5\tnil"]);
        assert!(faults(&events).is_empty());
        h.session.wait();
        assert_eq!(h.session.status(), DebuggerStatus::Stopped);
    }

    #[test]
    fn test_stop_from_every_state() {
        let h = harness(false);

        // Idle
        h.session.stop();
        assert_eq!(h.session.status(), DebuggerStatus::Stopped);
        // Stopped again
        h.session.stop();
        assert_eq!(h.session.status(), DebuggerStatus::Stopped);

        // Running
        h.session.play("while true do end", Path::new(".")).unwrap();
        assert_eq!(h.session.status(), DebuggerStatus::Running);
        h.session.stop();
        assert_eq!(h.session.status(), DebuggerStatus::Stopped);
        assert!(!h.session.is_worker_alive());

        // Paused
        h.session.play("while true do end", Path::new(".")).unwrap();
        h.session.pause();
        assert_eq!(h.session.status(), DebuggerStatus::Paused);
        h.session.stop();
        assert_eq!(h.session.status(), DebuggerStatus::Stopped);
        assert!(!h.session.is_worker_alive());
    }

    #[test]
    fn test_pause_only_from_running() {
        let h = harness(false);
        h.session.pause();
        assert_eq!(h.session.status(), DebuggerStatus::Idle);
        h.session.resume();
        assert_eq!(h.session.status(), DebuggerStatus::Idle);

        h.session.stop();
        h.session.pause();
        assert_eq!(h.session.status(), DebuggerStatus::Stopped);
    }

    #[test]
    fn test_pause_holds_script_until_resumed() {
        let h = harness(false);
        let script = "local n = 0\nwhile true do\n  n = n + 1\n  print(n)\n  sleep(5)\nend\n";
        h.session.play(script, Path::new(".")).unwrap();
        wait_for_output(&h.events);

        h.session.pause();
        std::thread::sleep(Duration::from_millis(60));
        let _in_flight: Vec<_> = h.events.try_iter().collect();
        std::thread::sleep(Duration::from_millis(150));
        let held: Vec<_> = h.events.try_iter().map(|e| e.payload).collect();
        assert!(outputs(&held).is_empty(), "script advanced while paused: {held:?}");

        h.session.resume();
        assert_eq!(h.session.status(), DebuggerStatus::Running);
        wait_for_output(&h.events);
        h.session.stop();
        assert_eq!(h.session.status(), DebuggerStatus::Stopped);
    }

    #[test]
    fn test_play_while_paused_resumes() {
        let h = harness(false);
        h.session.play("while true do sleep(1) end", Path::new(".")).unwrap();
        h.session.pause();
        h.session.play("print('other')", Path::new(".")).unwrap();
        assert_eq!(h.session.status(), DebuggerStatus::Running);
        h.session.stop();
    }

    #[test]
    fn test_play_while_running_is_ignored() {
        let h = harness(false);
        h.session.play("while true do sleep(1) end", Path::new(".")).unwrap();
        h.session.play("print('second')", Path::new(".")).unwrap();
        assert_eq!(h.session.status(), DebuggerStatus::Running);
        h.session.stop();

        let events: Vec<_> = h.events.try_iter().map(|e| e.payload).collect();
        assert!(outputs(&events).is_empty());
    }

    #[test]
    fn test_replay_after_stop() {
        let h = harness(false);
        h.session.play("sleep(60000)", Path::new(".")).unwrap();
        h.session.stop();
        // The worker has been joined, so every event of the first run is queued.
        let first: Vec<_> = h.events.try_iter().collect();
        assert!(!first.is_empty());

        h.session.play("print('again')", Path::new(".")).unwrap();
        let events = run_to_stop(&h.events);
        assert_eq!(outputs(&events), vec!["again"]);
    }

    #[test]
    fn test_stop_interrupts_sleep_quickly() {
        let h = harness(false);
        h.session.play("sleep(60000)", Path::new(".")).unwrap();
        std::thread::sleep(Duration::from_millis(30));

        let start = Instant::now();
        h.session.stop();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!h.session.is_worker_alive());

        let events: Vec<_> = h.events.try_iter().map(|e| e.payload).collect();
        assert!(events.contains(&SessionEventPayload::StatusChanged(DebuggerStatus::Stopped)));
        assert!(faults(&events).is_empty(), "stop must not surface a fault: {events:?}");
    }

    #[test]
    fn test_runtime_fault_is_reported_once() {
        let h = harness(false);
        h.session.play("print('before')\nerror('boom')\nprint('after')", Path::new(".")).unwrap();
        let mut events = run_to_stop(&h.events);
        h.session.wait();
        events.extend(h.events.try_iter().map(|e| e.payload));

        let faults = faults(&events);
        assert_eq!(faults.len(), 1, "{events:?}");
        assert_eq!(faults[0].kind, crate::FaultKind::Runtime);
        assert!(faults[0].message.contains("boom"));
        assert_eq!(outputs(&events), vec!["before"]);
        assert_eq!(h.session.status(), DebuggerStatus::Stopped);
    }

    #[test]
    fn test_syntax_fault() {
        let h = harness(false);
        h.session.play("if then", Path::new(".")).unwrap();
        let events = run_to_stop(&h.events);
        let faults = faults(&events);
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].kind, crate::FaultKind::Syntax);
        assert!(faults[0].message.contains("test:1:"), "{}", faults[0].message);
    }

    #[test]
    fn test_commands_are_queued_in_order() {
        let h = harness(true);
        h.session.play("Move(10, 20.5)\nSay('hi there')\nToggleWarPeace()", Path::new(".")).unwrap();
        let events = run_to_stop(&h.events);
        assert!(faults(&events).is_empty(), "{events:?}");

        let snapshot = h.store.read_snapshot().unwrap();
        assert_eq!(snapshot.last_processed_id, 0);
        assert_eq!(
            snapshot.pending,
            vec![
                Command::new(CommandKind::Move, ["10", "20.5"].into_iter().collect::<CommandParams>()),
                Command::new(CommandKind::Say, ["hi there"].into_iter().collect::<CommandParams>()),
                Command::bare(CommandKind::ToggleWarPeace),
            ]
        );
    }

    #[test]
    fn test_untargeted_commands_are_dropped() {
        let h = harness(false);
        h.session.play("Say('nobody listens')\nprint('done')", Path::new(".")).unwrap();
        let events = run_to_stop(&h.events);
        assert_eq!(outputs(&events), vec!["done"]);
        assert_eq!(h.store.read_snapshot().unwrap(), QueueSnapshot::default());
    }

    #[test]
    fn test_queue_full_terminates_script() {
        let full = QueueSnapshot::new(0, vec![Command::bare(CommandKind::Macro); 100]);
        let h = harness_with_store(true, MemoryQueueStore::with_snapshot(full.clone()));
        h.session.play("Say('one more')\nprint('after')", Path::new(".")).unwrap();
        let events = run_to_stop(&h.events);

        let faults = faults(&events);
        assert_eq!(faults.len(), 1);
        assert!(faults[0].message.contains("too many commands"), "{}", faults[0].message);
        assert!(outputs(&events).is_empty());
        assert_eq!(h.store.read_snapshot().unwrap(), full);
    }

    #[test]
    fn test_queue_full_cannot_be_caught_by_pcall() {
        let full = QueueSnapshot::new(0, vec![Command::bare(CommandKind::Macro); 100]);
        let h = harness_with_store(true, MemoryQueueStore::with_snapshot(full.clone()));
        let script = "local ok, err = pcall(Say, 'x')\nprint('after', ok, err)\n";
        h.session.play(script, Path::new(".")).unwrap();
        let events = run_to_stop(&h.events);

        let faults = faults(&events);
        assert_eq!(faults.len(), 1, "{events:?}");
        assert_eq!(faults[0].kind, crate::FaultKind::Runtime);
        assert!(faults[0].message.contains("too many commands"), "{}", faults[0].message);
        assert!(outputs(&events).is_empty(), "{events:?}");
        assert_eq!(h.store.read_snapshot().unwrap(), full);
    }

    #[test]
    fn test_queue_full_faults_when_pcall_is_last_statement() {
        let full = QueueSnapshot::new(0, vec![Command::bare(CommandKind::Macro); 100]);
        let h = harness_with_store(true, MemoryQueueStore::with_snapshot(full));
        h.session.play("pcall(Say, 'x')", Path::new(".")).unwrap();
        let events = run_to_stop(&h.events);

        let faults = faults(&events);
        assert_eq!(faults.len(), 1, "{events:?}");
        assert!(faults[0].message.contains("too many commands"), "{}", faults[0].message);
    }

    #[test]
    fn test_unknown_globals_read_process_state() {
        let h = harness(false);
        h.status.bucket(BucketKind::CharacterInfo).set("CHARNAME", "Bob");
        h.status.bucket(BucketKind::Miscellaneous).set("CHARNAME", "Shadowed");
        h.status.bucket(BucketKind::StatusBar).set("HITS", "25");
        h.session.play("print(CHARNAME, HITS, NOT_A_KEY)", Path::new(".")).unwrap();
        let events = run_to_stop(&h.events);
        assert_eq!(outputs(&events), vec!["Bob\t25\tnil"]);
    }

    #[test]
    fn test_locals_are_captured() {
        let h = harness(false);
        let script = "local hp = 25\nlocal name = 'Bob'\nlocal pos = { x = 1 }\nlocal f = print\nprint('done')\n";
        h.session.play(script, Path::new(".")).unwrap();
        run_to_stop(&h.events);

        let vars = h.session.variables();
        assert_eq!(vars.get("hp").map(String::as_str), Some("25"));
        assert_eq!(vars.get("name").map(String::as_str), Some("\"Bob\""));
        assert_eq!(vars.get("pos[\"x\"]").map(String::as_str), Some("1"));
        assert!(!vars.contains_key("f"));
        assert!(vars.keys().all(|k| !k.starts_with('(')), "{vars:?}");
    }

    #[test]
    fn test_require_uses_base_path() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("helper.lua"),
            "return { greet = function() return 'hi from helper' end }",
        )
        .unwrap();

        let h = harness(false);
        h.session.play("local helper = require('helper')\nprint(helper.greet())", dir.path()).unwrap();
        let events = run_to_stop(&h.events);
        assert!(faults(&events).is_empty(), "{events:?}");
        assert_eq!(outputs(&events), vec!["hi from helper"]);
    }

    #[test]
    fn test_scripts_cannot_reach_debug_library() {
        let h = harness(false);
        h.session.play("print(debug, package.loaded.debug)", Path::new(".")).unwrap();
        let events = run_to_stop(&h.events);
        assert_eq!(outputs(&events), vec!["nil\tnil"]);
    }

    #[test]
    fn test_driver_surface() {
        let h = harness(false);
        let driver = h.session.driver();
        let at = SourceLocation { chunk: "test".to_string(), line: Some(1) };

        assert_eq!(
            driver.capabilities(),
            DebuggerCaps::CAN_DEBUG_SOURCE_CODE | DebuggerCaps::HAS_LINE_BASED_BREAKPOINTS
        );
        assert_eq!(driver.get_action(1, &at), DebuggerAction::None);
        assert!(driver.refresh_breakpoints(&[at.clone()]).is_err());

        let fault = driver.signal_runtime_fault(ScriptFault::runtime("bad"));
        assert_eq!(fault, ScriptFault::runtime("bad"));
        let event = h.events.recv_timeout(EVENT_TIMEOUT).unwrap();
        assert_eq!(event.session_id, h.session.id());
        assert_eq!(event.payload, SessionEventPayload::Fault(ScriptFault::runtime("bad")));
    }
}
