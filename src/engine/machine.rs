//! Display engine
//!
//! Single-threaded actor owning the configuration snapshot, the
//! combination state and the display text. Everything that touches that
//! state — key events, fired hide timers, configuration hot-reloads,
//! status queries — arrives as an `EngineMsg` on one channel, so a key
//! event observes either the fully old or fully new configuration,
//! never a mix.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::capture::keys::{KeyEvent, KeyIdentity};
use crate::capture::ListenerControl;
use crate::config::Config;
use crate::display::DisplaySink;
use crate::focus::ForegroundResolver;

use super::combo::ComboState;
use super::hide::HideScheduler;

/// The two states of the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// Nothing shown
    #[default]
    Idle,
    /// Text shown; a hide timer may be pending
    Showing,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Idle => write!(f, "Idle"),
            EngineState::Showing => write!(f, "Showing"),
        }
    }
}

/// Messages consumed by the engine actor
#[derive(Debug)]
pub enum EngineMsg {
    /// A raw key event from the global listener
    Key(KeyEvent),
    /// A hide timer elapsed; stale generations are ignored
    HideElapsed { generation: u64 },
    /// Replace the configuration snapshot and restart the listener
    ApplyConfig {
        config: Config,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    /// Status query from the IPC surface
    Snapshot { reply: oneshot::Sender<EngineStatus> },
}

/// Point-in-time view of the engine for status reporting
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub showing: bool,
    pub listener_running: bool,
    pub targets: usize,
}

/// Fatal engine failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The listener could not be re-installed after a hot-reload; the
    /// daemon must not keep running with dead capture
    #[error("failed to restart key listener: {0}")]
    ListenerRestart(String),
}

/// Orchestrator wiring resolver, reducer and hide scheduler to the
/// display sink
pub struct DisplayEngine<R: ForegroundResolver, S: DisplaySink> {
    config: Config,
    /// Normalized from `config.executables`, recomputed on reload
    targets: Vec<String>,
    state: EngineState,
    combo: ComboState,
    hide: HideScheduler,
    resolver: R,
    sink: S,
    listener: Box<dyn ListenerControl>,
}

impl<R: ForegroundResolver, S: DisplaySink> DisplayEngine<R, S> {
    /// Create a new engine. `msg_tx` must be the sender side of the
    /// channel later passed to [`run`](Self::run); fired hide timers
    /// post back through it.
    pub fn new(
        config: Config,
        resolver: R,
        sink: S,
        listener: Box<dyn ListenerControl>,
        msg_tx: mpsc::Sender<EngineMsg>,
    ) -> Self {
        let targets = config.normalized_targets();
        Self {
            config,
            targets,
            state: EngineState::Idle,
            combo: ComboState::new(),
            hide: HideScheduler::new(msg_tx),
            resolver,
            sink,
            listener,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Run the engine, processing messages until the channel closes or
    /// a fatal error occurs
    pub async fn run(&mut self, mut msg_rx: mpsc::Receiver<EngineMsg>) -> Result<(), EngineError> {
        info!("display engine started in Idle state");

        while let Some(msg) = msg_rx.recv().await {
            self.handle(msg)?;
        }

        info!("display engine stopped");
        Ok(())
    }

    /// Process a single message. Errors are fatal to the engine.
    fn handle(&mut self, msg: EngineMsg) -> Result<(), EngineError> {
        match msg {
            EngineMsg::Key(KeyEvent::Press(key)) => self.on_press(key),
            EngineMsg::Key(KeyEvent::Release(_)) => self.on_release(),
            EngineMsg::HideElapsed { generation } => self.on_hide_elapsed(generation),
            EngineMsg::ApplyConfig { config, reply } => {
                let result = self.apply_config(config);
                let _ = reply.send(result.clone());
                return result;
            }
            EngineMsg::Snapshot { reply } => {
                let _ = reply.send(EngineStatus {
                    showing: self.state == EngineState::Showing,
                    listener_running: self.listener.is_running(),
                    targets: self.targets.len(),
                });
            }
        }
        Ok(())
    }

    /// Press: gated by the foreground resolver. An inactive target is a
    /// silent no-op; otherwise pending hides are cancelled before the
    /// reducer runs, so no stale timer can clear the new text.
    fn on_press(&mut self, key: KeyIdentity) {
        if !crate::focus::is_target_active(&mut self.resolver, &self.targets) {
            return;
        }

        self.hide.cancel_all();
        let text = self.combo.reduce_press(&key);
        debug!(%text, "combination updated");
        self.sink.set_text(&text);
        self.state = EngineState::Showing;
    }

    /// Release: intentionally NOT gated by the resolver. A release
    /// always collapses the combination and re-arms the hide timer,
    /// even if the target window lost focus in the interim; otherwise a
    /// focus change mid-combination would leave a stuck "key held"
    /// visual.
    fn on_release(&mut self) {
        self.combo.reduce_release();
        self.hide.cancel_all();
        self.hide.schedule(self.config.hide_delay());
    }

    fn on_hide_elapsed(&mut self, generation: u64) {
        if !self.hide.is_current(generation) {
            debug!("ignoring stale hide timer");
            return;
        }
        self.hide.cancel_all();
        self.sink.clear();
        self.state = EngineState::Idle;
    }

    /// Swap the configuration snapshot, push geometry/font to the sink
    /// and re-install the listener.
    ///
    /// A listener that never started (missing permissions, unsupported
    /// platform) is left alone; the new snapshot still applies.
    fn apply_config(&mut self, config: Config) -> Result<(), EngineError> {
        info!(targets = config.executables.len(), "applying new configuration");

        self.config = config;
        self.targets = self.config.normalized_targets();
        self.sink.reconfigure(&self.config);

        if self.listener.is_running() {
            self.listener
                .restart()
                .map_err(|e| EngineError::ListenerRestart(e.to_string()))?;
            info!("key listener restarted");
        } else {
            warn!("key listener not running, skipping restart");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::capture::keys::Modifier;
    use crate::capture::ListenerError;

    /// Resolver whose answer tests flip at will
    #[derive(Clone)]
    struct ScriptedResolver {
        exe: Arc<Mutex<Option<PathBuf>>>,
    }

    impl ScriptedResolver {
        fn new(exe: Option<&str>) -> Self {
            Self {
                exe: Arc::new(Mutex::new(exe.map(PathBuf::from))),
            }
        }

        fn set(&self, exe: Option<&str>) {
            *self.exe.lock().unwrap() = exe.map(PathBuf::from);
        }
    }

    impl ForegroundResolver for ScriptedResolver {
        fn foreground_exe(&mut self) -> Option<PathBuf> {
            self.exe.lock().unwrap().clone()
        }
    }

    /// Sink recording every call for later inspection
    #[derive(Debug, Clone, PartialEq)]
    enum SinkCall {
        Text(String),
        Clear,
        Reconfigure,
    }

    #[derive(Clone)]
    struct RecordingSink {
        calls: Arc<Mutex<Vec<SinkCall>>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn calls(&self) -> Vec<SinkCall> {
            self.calls.lock().unwrap().clone()
        }

        fn last_text(&self) -> Option<String> {
            self.calls().into_iter().rev().find_map(|call| match call {
                SinkCall::Text(text) => Some(text),
                _ => None,
            })
        }
    }

    impl DisplaySink for RecordingSink {
        fn set_text(&mut self, text: &str) {
            self.calls
                .lock()
                .unwrap()
                .push(SinkCall::Text(text.to_string()));
        }

        fn clear(&mut self) {
            self.calls.lock().unwrap().push(SinkCall::Clear);
        }

        fn reconfigure(&mut self, _config: &Config) {
            self.calls.lock().unwrap().push(SinkCall::Reconfigure);
        }
    }

    /// Listener whose restart outcome tests script
    struct ScriptedListener {
        running: bool,
        fail_restart: bool,
        restarts: Arc<Mutex<usize>>,
    }

    impl ListenerControl for ScriptedListener {
        fn start(&mut self) -> Result<(), ListenerError> {
            if self.fail_restart {
                return Err(ListenerError::HookInstall("scripted failure".to_string()));
            }
            *self.restarts.lock().unwrap() += 1;
            self.running = true;
            Ok(())
        }

        fn stop(&mut self) {
            self.running = false;
        }

        fn is_running(&self) -> bool {
            self.running
        }
    }

    const TARGET: &str = "c:\\tools\\editor.exe";

    struct Harness {
        engine: DisplayEngine<ScriptedResolver, RecordingSink>,
        resolver: ScriptedResolver,
        sink: RecordingSink,
        msg_rx: mpsc::Receiver<EngineMsg>,
        restarts: Arc<Mutex<usize>>,
    }

    fn harness(hide_secs: u64, listener_running: bool, fail_restart: bool) -> Harness {
        let config = Config {
            executables: vec![TARGET.to_string()],
            hide: Some(hide_secs),
            ..Config::default()
        };
        let resolver = ScriptedResolver::new(Some(TARGET));
        let sink = RecordingSink::new();
        let restarts = Arc::new(Mutex::new(0));
        let listener = ScriptedListener {
            running: listener_running,
            fail_restart,
            restarts: Arc::clone(&restarts),
        };
        let (msg_tx, msg_rx) = mpsc::channel(32);
        let engine = DisplayEngine::new(
            config,
            resolver.clone(),
            sink.clone(),
            Box::new(listener),
            msg_tx,
        );
        Harness {
            engine,
            resolver,
            sink,
            msg_rx,
            restarts,
        }
    }

    fn press(key: KeyIdentity) -> EngineMsg {
        EngineMsg::Key(KeyEvent::Press(key))
    }

    fn release(key: KeyIdentity) -> EngineMsg {
        EngineMsg::Key(KeyEvent::Release(key))
    }

    fn ctrl() -> KeyIdentity {
        KeyIdentity::Modifier(Modifier::Ctrl)
    }

    fn shift() -> KeyIdentity {
        KeyIdentity::Modifier(Modifier::Shift)
    }

    async fn drain_spawned_tasks() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_state() {
        let h = harness(1, true, false);
        assert_eq!(h.engine.state(), EngineState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactive_target_is_a_silent_noop() {
        let mut h = harness(1, true, false);
        h.resolver.set(Some("c:\\windows\\notepad.exe"));

        h.engine.handle(press(ctrl())).unwrap();
        h.engine.handle(press(KeyIdentity::Character('a'))).unwrap();

        assert_eq!(h.engine.state(), EngineState::Idle);
        assert!(h.sink.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolver_failure_fails_closed() {
        let mut h = harness(1, true, false);
        h.resolver.set(None);

        h.engine.handle(press(KeyIdentity::Character('x'))).unwrap();

        assert!(h.sink.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_combination_progression() {
        let mut h = harness(1, true, false);

        h.engine.handle(press(ctrl())).unwrap();
        h.engine.handle(press(shift())).unwrap();
        h.engine.handle(press(KeyIdentity::Character('k'))).unwrap();

        let texts: Vec<_> = h
            .sink
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                SinkCall::Text(text) => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(texts, ["CTRL", "CTRL+SHIFT", "CTRL+SHIFT+K"]);
        assert_eq!(h.engine.state(), EngineState::Showing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_text_clears_after_release_and_delay() {
        let mut h = harness(1, true, false);

        h.engine.handle(press(KeyIdentity::Character('k'))).unwrap();
        h.engine.handle(release(KeyIdentity::Character('k'))).unwrap();

        drain_spawned_tasks().await;
        tokio::time::advance(Duration::from_secs(1)).await;
        drain_spawned_tasks().await;
        let msg = h.msg_rx.try_recv().unwrap();
        h.engine.handle(msg).unwrap();

        assert_eq!(h.engine.state(), EngineState::Idle);
        assert_eq!(h.sink.calls().last(), Some(&SinkCall::Clear));
    }

    #[tokio::test(start_paused = true)]
    async fn test_press_cancels_pending_hide() {
        let mut h = harness(1, true, false);

        h.engine.handle(press(KeyIdentity::Character('k'))).unwrap();
        h.engine.handle(release(KeyIdentity::Character('k'))).unwrap();

        // New press at t=0.5s must suppress the clear armed at t=0
        tokio::time::advance(Duration::from_millis(500)).await;
        h.engine.handle(press(KeyIdentity::Character('j'))).unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        drain_spawned_tasks().await;
        while let Ok(msg) = h.msg_rx.try_recv() {
            h.engine.handle(msg).unwrap();
        }

        // The cancelled timer never cleared the newer text
        assert_eq!(h.engine.state(), EngineState::Showing);
        assert_eq!(h.sink.last_text(), Some("J".to_string()));
        assert!(!h.sink.calls().contains(&SinkCall::Clear));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_fired_timer_is_ignored() {
        let mut h = harness(1, true, false);

        h.engine.handle(press(KeyIdentity::Character('k'))).unwrap();
        h.engine.handle(release(KeyIdentity::Character('k'))).unwrap();

        // The timer fires and its message is queued...
        drain_spawned_tasks().await;
        tokio::time::advance(Duration::from_secs(1)).await;
        drain_spawned_tasks().await;
        let fired = h.msg_rx.try_recv().unwrap();

        // ...but a press lands before the engine processes it
        h.engine.handle(press(KeyIdentity::Character('j'))).unwrap();
        h.engine.handle(fired).unwrap();

        assert_eq!(h.engine.state(), EngineState::Showing);
        assert!(!h.sink.calls().contains(&SinkCall::Clear));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_not_gated_by_resolver() {
        let mut h = harness(1, true, false);

        h.engine.handle(press(ctrl())).unwrap();
        // Focus moves away before the release arrives
        h.resolver.set(Some("c:\\windows\\notepad.exe"));
        h.engine.handle(release(ctrl())).unwrap();

        drain_spawned_tasks().await;
        tokio::time::advance(Duration::from_secs(1)).await;
        drain_spawned_tasks().await;
        let msg = h.msg_rx.try_recv().unwrap();
        h.engine.handle(msg).unwrap();

        // The hide still ran; no stuck "key held" visual
        assert_eq!(h.engine.state(), EngineState::Idle);
        assert_eq!(h.sink.calls().last(), Some(&SinkCall::Clear));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_resets_stack_across_combinations() {
        let mut h = harness(1, true, false);

        h.engine.handle(press(ctrl())).unwrap();
        h.engine.handle(release(ctrl())).unwrap();
        h.engine.handle(press(shift())).unwrap();
        h.engine.handle(press(KeyIdentity::Character('b'))).unwrap();

        assert_eq!(h.sink.last_text(), Some("SHIFT+B".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_config_swaps_snapshot_and_restarts_listener() {
        let mut h = harness(1, true, false);

        // New snapshot retargets the overlay and lengthens the delay
        let new_config = Config {
            executables: vec!["d:\\games\\game.exe".to_string()],
            hide: Some(5),
            ..Config::default()
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        h.engine
            .handle(EngineMsg::ApplyConfig {
                config: new_config,
                reply: reply_tx,
            })
            .unwrap();
        assert!(reply_rx.await.unwrap().is_ok());
        assert_eq!(*h.restarts.lock().unwrap(), 1);
        assert_eq!(h.sink.calls().last(), Some(&SinkCall::Reconfigure));

        // The old target no longer activates the display
        h.engine.handle(press(ctrl())).unwrap();
        assert!(h.sink.last_text().is_none());

        // The new one does
        h.resolver.set(Some("D:\\Games\\GAME.EXE"));
        h.engine.handle(press(ctrl())).unwrap();
        assert_eq!(h.sink.last_text(), Some("CTRL".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_restart_failure_is_fatal() {
        let mut h = harness(1, true, true);

        let (reply_tx, reply_rx) = oneshot::channel();
        let result = h.engine.handle(EngineMsg::ApplyConfig {
            config: Config::default(),
            reply: reply_tx,
        });

        assert!(matches!(result, Err(EngineError::ListenerRestart(_))));
        assert!(reply_rx.await.unwrap().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_config_skips_stopped_listener() {
        let mut h = harness(1, false, false);

        let (reply_tx, reply_rx) = oneshot::channel();
        h.engine
            .handle(EngineMsg::ApplyConfig {
                config: Config::default(),
                reply: reply_tx,
            })
            .unwrap();

        assert!(reply_rx.await.unwrap().is_ok());
        assert_eq!(*h.restarts.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_reports_engine_view() {
        let mut h = harness(1, true, false);
        h.engine.handle(press(KeyIdentity::Character('a'))).unwrap();

        let (reply_tx, reply_rx) = oneshot::channel();
        h.engine
            .handle(EngineMsg::Snapshot { reply: reply_tx })
            .unwrap();

        let status = reply_rx.await.unwrap();
        assert!(status.showing);
        assert!(status.listener_running);
        assert_eq!(status.targets, 1);
    }
}
