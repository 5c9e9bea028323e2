//! Foreground target resolution
//!
//! Decides whether the process owning the current foreground window is
//! one of the configured target applications. Every OS-level failure
//! (window gone, process exited, access denied) resolves to "no target
//! active" so the overlay fails closed instead of crashing or showing
//! text over the wrong window.

use std::path::{Path, PathBuf};

/// Source of the current foreground process executable path.
///
/// Implementations must fail closed: any error resolves to `None`.
pub trait ForegroundResolver: Send {
    fn foreground_exe(&mut self) -> Option<PathBuf>;
}

/// Normalize an executable path for case-insensitive,
/// separator-consistent comparison
pub fn normalize_exe_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

/// Whether the foreground process is one of the (already normalized)
/// targets. Called synchronously on every key press, so it stays a
/// single OS query chain.
pub fn is_target_active(resolver: &mut dyn ForegroundResolver, targets: &[String]) -> bool {
    if targets.is_empty() {
        return false;
    }
    match resolver.foreground_exe() {
        Some(exe) => {
            let exe = normalize_exe_path(&exe);
            targets.iter().any(|target| *target == exe)
        }
        None => false,
    }
}

/// Resolver for platforms without a foreground-window query; always
/// reports no target active
pub struct NullResolver;

impl ForegroundResolver for NullResolver {
    fn foreground_exe(&mut self) -> Option<PathBuf> {
        None
    }
}

#[cfg(windows)]
pub use windows_impl::WindowsResolver;

#[cfg(windows)]
mod windows_impl {
    use std::path::{Path, PathBuf};

    use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
    use windows::Win32::UI::WindowsAndMessaging::{
        GetForegroundWindow, GetWindowThreadProcessId,
    };

    use super::ForegroundResolver;

    /// Resolves the foreground window's owning process executable via
    /// `GetForegroundWindow` -> pid -> process table lookup
    pub struct WindowsResolver {
        system: System,
    }

    impl WindowsResolver {
        pub fn new() -> Self {
            Self {
                system: System::new(),
            }
        }
    }

    impl Default for WindowsResolver {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ForegroundResolver for WindowsResolver {
        fn foreground_exe(&mut self) -> Option<PathBuf> {
            let pid = unsafe {
                let hwnd = GetForegroundWindow();
                if hwnd.0.is_null() {
                    return None;
                }
                let mut pid: u32 = 0;
                GetWindowThreadProcessId(hwnd, Some(&mut pid));
                pid
            };
            if pid == 0 {
                return None;
            }

            let pid = Pid::from_u32(pid);
            self.system.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[pid]),
                true,
                ProcessRefreshKind::nothing().with_exe(sysinfo::UpdateKind::Always),
            );
            self.system
                .process(pid)
                .and_then(|process| process.exe())
                .map(Path::to_path_buf)
        }
    }
}
