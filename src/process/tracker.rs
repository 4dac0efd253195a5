//! Ownership of spawned helper processes
//!
//! A [`ProcessTracker`] remembers the pids its runner spawned so the owner of
//! a download can stop exactly those before deleting the directory they work
//! in. [`kill_leaked_by_name`] is the best-effort fallback for helpers left
//! behind by a previous process that crashed before it could clean up.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Set of live pids spawned on behalf of one owner
#[derive(Debug, Clone, Default)]
pub struct ProcessTracker {
    pids: Arc<Mutex<BTreeSet<u32>>>,
}

impl ProcessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, pid: u32) {
        self.pids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pid);
    }

    pub fn unregister(&self, pid: u32) {
        self.pids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&pid);
    }

    pub fn pids(&self) -> Vec<u32> {
        self.pids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }

    /// Stop every tracked process: graceful signal, `grace_period`, then kill.
    /// Returns how many pids were still tracked.
    pub fn kill_all(&self, grace_period: Duration) -> usize {
        let pids: Vec<u32> = {
            let mut guard = self.pids.lock().unwrap_or_else(PoisonError::into_inner);
            let pids = guard.iter().copied().collect();
            guard.clear();
            pids
        };
        if pids.is_empty() {
            return 0;
        }
        debug!(count = pids.len(), "Stopping tracked helper processes");
        stop_pids(&pids, grace_period);
        pids.len()
    }
}

/// Ask a process to stop gracefully. Returns false when the platform has no
/// graceful signal and the caller should kill it outright.
#[cfg(unix)]
pub(super) fn request_stop(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    // SAFETY: kill(2) with a pid we spawned and a plain termination signal
    unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
pub(super) fn request_stop(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
fn is_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    // SAFETY: signal 0 only checks for existence
    unsafe { libc::kill(pid, 0) == 0 }
}

#[cfg(unix)]
fn force_kill(pid: u32) {
    if let Ok(pid) = i32::try_from(pid) {
        // SAFETY: see request_stop
        unsafe {
            libc::kill(pid, libc::SIGKILL);
        }
    }
}

#[cfg(unix)]
fn stop_pids(pids: &[u32], grace_period: Duration) {
    for &pid in pids {
        request_stop(pid);
    }
    let deadline = Instant::now() + grace_period;
    while Instant::now() < deadline && pids.iter().any(|&pid| is_alive(pid)) {
        thread::sleep(Duration::from_millis(20));
    }
    for &pid in pids {
        if is_alive(pid) {
            warn!(pid, "Force killing helper process");
            force_kill(pid);
        }
    }
}

#[cfg(not(unix))]
fn stop_pids(_pids: &[u32], _grace_period: Duration) {}

/// Kill orphaned processes whose executable name is `name` and, when
/// `within` is given, whose arguments mention a path under `within`.
///
/// Only processes re-parented to init are considered, so helpers owned by a
/// live runner (in this or another process) are left alone. Best-effort
/// only: it scans `/proc` on Linux and does nothing elsewhere.
/// Prefer [`ProcessTracker::kill_all`], which only touches owned processes.
pub fn kill_leaked_by_name(name: &str, within: Option<&Path>, grace_period: Duration) -> usize {
    let pids = find_by_name(name, within);
    if pids.is_empty() {
        return 0;
    }
    warn!(name, count = pids.len(), "Killing leaked helper processes");
    stop_pids(&pids, grace_period);
    pids.len()
}

#[cfg(target_os = "linux")]
fn find_by_name(name: &str, within: Option<&Path>) -> Vec<u32> {
    let own_pid = std::process::id();
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return Vec::new();
    };
    let within = within.map(|p| p.to_string_lossy().into_owned());

    entries
        .filter_map(std::result::Result::ok)
        .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
        .filter(|&pid| pid != own_pid)
        .filter(|&pid| {
            let Ok(raw) = std::fs::read(format!("/proc/{pid}/cmdline")) else {
                return false;
            };
            let args: Vec<String> = raw
                .split(|b| *b == 0)
                .filter(|part| !part.is_empty())
                .map(|part| String::from_utf8_lossy(part).into_owned())
                .collect();
            cmdline_matches(&args, name, within.as_deref())
        })
        .filter(|&pid| {
            std::fs::read_to_string(format!("/proc/{pid}/stat"))
                .ok()
                .and_then(|stat| parent_pid(&stat))
                == Some(1)
        })
        .collect()
}

/// Parent pid from `/proc/<pid>/stat` (`pid (comm) state ppid ...`)
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parent_pid(stat: &str) -> Option<u32> {
    let after_comm = &stat[stat.rfind(')')? + 1..];
    after_comm.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(not(target_os = "linux"))]
fn find_by_name(_name: &str, _within: Option<&Path>) -> Vec<u32> {
    Vec::new()
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn cmdline_matches(args: &[String], name: &str, within: Option<&str>) -> bool {
    let Some(program) = args.first() else {
        return false;
    };
    let program_name = Path::new(program)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if program_name != name {
        return false;
    }
    match within {
        Some(prefix) => args.iter().skip(1).any(|arg| arg.contains(prefix)),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_register_and_unregister() {
        let tracker = ProcessTracker::new();
        tracker.register(10);
        tracker.register(11);
        tracker.unregister(10);
        assert_eq!(tracker.pids(), vec![11]);
    }

    #[test]
    fn test_clones_share_state() {
        let tracker = ProcessTracker::new();
        let other = tracker.clone();
        other.register(42);
        assert_eq!(tracker.pids(), vec![42]);
    }

    #[test]
    fn test_kill_all_on_empty_tracker() {
        assert_eq!(ProcessTracker::new().kill_all(Duration::from_millis(10)), 0);
    }

    #[test]
    fn test_cmdline_matches_by_file_name() {
        assert!(cmdline_matches(
            &args(&["/usr/local/bin/crane", "export", "x"]),
            "crane",
            None
        ));
        assert!(!cmdline_matches(
            &args(&["/usr/bin/cranes", "export"]),
            "crane",
            None
        ));
        assert!(!cmdline_matches(&[], "crane", None));
    }

    #[test]
    fn test_cmdline_matches_within_prefix() {
        let cmd = args(&["tar", "-xf", "/tmp/bundlegate-abc/image.tar"]);
        assert!(cmdline_matches(&cmd, "tar", Some("/tmp/bundlegate-")));
        assert!(!cmdline_matches(&cmd, "tar", Some("/var/lib/other")));
    }

    #[test]
    fn test_parent_pid_from_stat() {
        assert_eq!(parent_pid("4242 (crane) S 1 4242 4242 0 -1"), Some(1));
        assert_eq!(parent_pid("77 (tar (x)) R 512 77 77"), Some(512));
        assert_eq!(parent_pid("garbage"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_kill_all_stops_tracked_process() {
        let mut child = std::process::Command::new("sleep").arg("10").spawn().unwrap();
        let tracker = ProcessTracker::new();
        tracker.register(child.id());

        assert_eq!(tracker.kill_all(Duration::from_millis(500)), 1);
        let status = child.wait().unwrap();
        assert!(!status.success());
        assert!(tracker.pids().is_empty());
    }
}
