//! Global keyboard listener
//!
//! On Windows a `WH_KEYBOARD_LL` hook is installed on a dedicated
//! message-pump thread; mapped key events are bridged into the engine's
//! async channel. Other platforms report the capture as unsupported and
//! the daemon runs without it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use super::keys::KeyEvent;

/// Errors that can occur in the key listener
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("key listener is already running")]
    AlreadyRunning,

    #[error("global keyboard capture is not supported on this platform")]
    Unsupported,

    #[error("failed to install keyboard hook: {0}")]
    HookInstall(String),

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),
}

/// Start/stop control over the key listener, as seen by the engine.
///
/// Configuration hot-reload restarts the listener through this trait;
/// tests substitute a scripted implementation.
pub trait ListenerControl: Send {
    fn start(&mut self) -> Result<(), ListenerError>;

    /// Stop capturing. Idempotent; stopping a stopped listener is a
    /// no-op.
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    /// Stop the current hook and install a fresh one bound to the same
    /// channel
    fn restart(&mut self) -> Result<(), ListenerError> {
        self.stop();
        self.start()
    }
}

/// Global key listener emitting press/release events into a channel
pub struct KeyListener {
    event_tx: mpsc::Sender<KeyEvent>,
    running: Arc<AtomicBool>,
    #[cfg(windows)]
    backend: platform::HookBackend,
}

impl KeyListener {
    pub fn new(event_tx: mpsc::Sender<KeyEvent>) -> Self {
        Self {
            event_tx,
            running: Arc::new(AtomicBool::new(false)),
            #[cfg(windows)]
            backend: platform::HookBackend::default(),
        }
    }
}

impl ListenerControl for KeyListener {
    #[cfg(windows)]
    fn start(&mut self) -> Result<(), ListenerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ListenerError::AlreadyRunning);
        }

        if let Err(e) = self.backend.install(self.event_tx.clone()) {
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        info!("keyboard hook installed");
        Ok(())
    }

    #[cfg(not(windows))]
    fn start(&mut self) -> Result<(), ListenerError> {
        let _ = &self.event_tx;
        Err(ListenerError::Unsupported)
    }

    fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        #[cfg(windows)]
        self.backend.uninstall();

        info!("key listener stopped");
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for KeyListener {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(windows)]
mod platform {
    //! `WH_KEYBOARD_LL` hook on a dedicated message-pump thread.
    //!
    //! The hook procedure must return quickly, so it only maps the
    //! virtual-key code and pushes the event onto a std channel; a pump
    //! thread forwards into the engine's tokio channel.

    use std::sync::mpsc::{channel, Sender};
    use std::sync::Mutex;
    use std::thread::JoinHandle;
    use std::time::Duration;

    use once_cell::sync::Lazy;
    use tracing::warn;
    use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::WindowsAndMessaging::{
        CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
        SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, KBDLLHOOKSTRUCT, MSG,
        PM_NOREMOVE, WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP,
    };

    use crate::capture::keys::{identity_from_vk, KeyEvent};

    use super::ListenerError;

    static KEY_EVENT_SENDER: Lazy<Mutex<Option<Sender<KeyEvent>>>> =
        Lazy::new(|| Mutex::new(None));

    #[derive(Debug)]
    struct HookThread {
        thread_id: u32,
        join: JoinHandle<()>,
    }

    #[derive(Debug, Default)]
    pub struct HookBackend {
        hook_thread: Option<HookThread>,
        pump_thread: Option<JoinHandle<()>>,
    }

    impl HookBackend {
        pub fn install(
            &mut self,
            event_tx: tokio::sync::mpsc::Sender<KeyEvent>,
        ) -> Result<(), ListenerError> {
            if self.hook_thread.is_some() {
                return Ok(());
            }

            let (raw_tx, raw_rx) = channel::<KeyEvent>();
            if let Ok(mut guard) = KEY_EVENT_SENDER.lock() {
                *guard = Some(raw_tx);
            }

            let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<Result<u32, String>>(1);

            let join = std::thread::Builder::new()
                .name("keyshow-hook".to_string())
                .spawn(move || {
                    let mut msg = MSG::default();
                    // Force creation of the thread's message queue before
                    // reporting readiness
                    unsafe {
                        let _ = PeekMessageW(&mut msg, None, 0, 0, PM_NOREMOVE);
                    }

                    let thread_id = unsafe { GetCurrentThreadId() };
                    let hmodule = match unsafe { GetModuleHandleW(None) } {
                        Ok(h) => h,
                        Err(err) => {
                            let _ = ready_tx.send(Err(err.to_string()));
                            return;
                        }
                    };

                    let hook = match unsafe {
                        SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), hmodule, 0)
                    } {
                        Ok(h) if !h.0.is_null() => h,
                        Ok(_) => {
                            let err = windows::core::Error::from_win32();
                            let _ = ready_tx.send(Err(err.to_string()));
                            return;
                        }
                        Err(err) => {
                            let _ = ready_tx.send(Err(err.to_string()));
                            return;
                        }
                    };

                    let _ = ready_tx.send(Ok(thread_id));

                    loop {
                        let r = unsafe { GetMessageW(&mut msg, None, 0, 0) };
                        if r.0 <= 0 {
                            break;
                        }
                        unsafe {
                            let _ = TranslateMessage(&msg);
                            DispatchMessageW(&msg);
                        }
                    }

                    unsafe {
                        let _ = UnhookWindowsHookEx(hook);
                    }
                })
                .map_err(|e| ListenerError::ThreadSpawn(e.to_string()))?;

            let thread_id = ready_rx
                .recv_timeout(Duration::from_secs(2))
                .map_err(|_| {
                    ListenerError::HookInstall("hook thread did not signal readiness".to_string())
                })?
                .map_err(ListenerError::HookInstall)?;

            // Bridge hook events into the engine's async channel
            let pump = std::thread::Builder::new()
                .name("keyshow-pump".to_string())
                .spawn(move || {
                    while let Ok(event) = raw_rx.recv() {
                        if event_tx.blocking_send(event).is_err() {
                            warn!("engine channel closed, stopping key pump");
                            break;
                        }
                    }
                })
                .map_err(|e| ListenerError::ThreadSpawn(e.to_string()))?;

            self.hook_thread = Some(HookThread { thread_id, join });
            self.pump_thread = Some(pump);
            Ok(())
        }

        pub fn uninstall(&mut self) {
            // Dropping the sender ends the pump thread's recv loop
            if let Ok(mut guard) = KEY_EVENT_SENDER.lock() {
                *guard = None;
            }

            if let Some(th) = self.hook_thread.take() {
                unsafe {
                    let _ = PostThreadMessageW(th.thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
                }
                let _ = th.join.join();
            }

            if let Some(pump) = self.pump_thread.take() {
                let _ = pump.join();
            }
        }
    }

    unsafe extern "system" fn keyboard_hook_proc(
        code: i32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> LRESULT {
        if code >= 0 {
            let info = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
            let event = match wparam.0 as u32 {
                WM_KEYDOWN | WM_SYSKEYDOWN => identity_from_vk(info.vkCode).map(KeyEvent::Press),
                WM_KEYUP | WM_SYSKEYUP => identity_from_vk(info.vkCode).map(KeyEvent::Release),
                _ => None,
            };
            if let Some(event) = event {
                if let Ok(guard) = KEY_EVENT_SENDER.lock() {
                    if let Some(tx) = guard.as_ref() {
                        let _ = tx.send(event);
                    }
                }
            }
        }
        CallNextHookEx(None, code, wparam, lparam)
    }
}
