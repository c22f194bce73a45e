//! Best-effort process memory sampling, logged at debug level.
//!
//! Nothing here feeds back into an analysis.

use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};

use crate::error::SeqError;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
pub struct MemoryStats {
    pub vm_size_kb: u64,
    pub vm_rss_kb: u64,
    pub vm_hwm_kb: u64,
}

/// Pull the interesting lines out of `/proc/<pid>/status`.
pub fn parse_status(text: &str) -> Option<MemoryStats> {
    let mut stats = MemoryStats::default();
    let mut found = false;
    for line in text.lines() {
        let (key, rest) = match line.split_once(':') {
            Some(kv) => kv,
            None => continue,
        };
        let slot = match key {
            "VmSize" => &mut stats.vm_size_kb,
            "VmRSS" => &mut stats.vm_rss_kb,
            "VmHWM" => &mut stats.vm_hwm_kb,
            _ => continue,
        };
        if let Some(kb) = rest.split_whitespace().next().and_then(|v| v.parse().ok()) {
            *slot = kb;
            found = true;
        }
    }
    if found {
        Some(stats)
    } else {
        None
    }
}

pub fn sample() -> Option<MemoryStats> {
    std::fs::read_to_string("/proc/self/status").ok().and_then(|s| parse_status(&s))
}

/// Background sampler. Stops after `max_samples`, or earlier on `stop()`.
/// Dropping it without `stop()` lets it run out its samples on its own.
pub struct MemorySampler {
    stop: Sender<()>,
    handle: thread::JoinHandle<usize>,
}

impl MemorySampler {
    pub fn start(interval: Duration, max_samples: usize) -> Result<MemorySampler, SeqError> {
        let (stop, stop_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("seqgap-memstats".into())
            .spawn(move || {
                let mut detached = false;
                let mut count = 0;
                while count < max_samples {
                    if detached {
                        thread::sleep(interval);
                    } else {
                        match stop_rx.recv_timeout(interval) {
                            Ok(()) => break,
                            Err(RecvTimeoutError::Timeout) => {}
                            // Owner dropped us: keep sampling until the budget runs out.
                            Err(RecvTimeoutError::Disconnected) => {
                                detached = true;
                                continue;
                            }
                        }
                    }
                    if let Some(m) = sample() {
                        log::debug!(
                            "VmSize = {} MiB\tVmRSS = {} MiB\tVmHWM = {} MiB",
                            m.vm_size_kb / 1024,
                            m.vm_rss_kb / 1024,
                            m.vm_hwm_kb / 1024
                        );
                    }
                    count += 1;
                }
                count
            })
            .map_err(|e| SeqError::Fatal(format!("spawn memory sampler: {e}")))?;
        Ok(MemorySampler { stop, handle })
    }

    /// Stop sampling and return how many samples were taken.
    pub fn stop(self) -> usize {
        let _ = self.stop.try_send(());
        self.handle.join().unwrap_or(0)
    }
}
