//! SSDP transport threads.
//!
//! Two plain threads own the blocking UDP sockets: one listens for
//! unsolicited NOTIFY traffic, one runs periodic M-SEARCH bursts. Both hand
//! advertisements to the worker through the bounded queue and stop when the
//! shared running flag drops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use upnp_discovery::{AdvertisementQueue, NotifyListener, SsdpSocket};

use crate::config::EngineConfig;

/// Sleep in short slices so a stop request is honored promptly.
fn sleep_while_running(total: Duration, running: &AtomicBool) {
    let slice = Duration::from_millis(100);
    let mut remaining = total;
    while running.load(Ordering::Relaxed) && !remaining.is_zero() {
        let nap = remaining.min(slice);
        std::thread::sleep(nap);
        remaining = remaining.saturating_sub(nap);
    }
}

/// Spawn the NOTIFY listener thread.
///
/// Socket errors are retried with exponential backoff; once the failure
/// ceiling is reached the thread reports a fault (surfaced by the facade as
/// `DiscoveryFailed`) and exits. Timeouts and malformed datagrams are not
/// failures.
pub(crate) fn spawn_notify_listener(
    listener: NotifyListener,
    queue: Arc<AdvertisementQueue>,
    fault_tx: mpsc::Sender<String>,
    running: Arc<AtomicBool>,
    config: &EngineConfig,
) -> JoinHandle<()> {
    let base = config.listen_backoff_base;
    let max = config.listen_backoff_max;
    let ceiling = config.listen_failure_ceiling;

    std::thread::spawn(move || {
        let mut failures = 0u32;
        let mut backoff = base;

        while running.load(Ordering::Relaxed) {
            match listener.recv() {
                Ok(Some(ad)) => {
                    failures = 0;
                    backoff = base;
                    queue.push(ad);
                }
                Ok(None) => {
                    failures = 0;
                    backoff = base;
                }
                Err(e) => {
                    failures += 1;
                    if failures >= ceiling {
                        tracing::error!("SSDP listener giving up after {failures} failures: {e}");
                        let _ = fault_tx
                            .send(format!("listener failed after {failures} attempts: {e}"));
                        return;
                    }
                    tracing::warn!("SSDP listener error (attempt {failures}): {e}");
                    sleep_while_running(backoff, &running);
                    backoff = (backoff * 2).min(max);
                }
            }
        }
        tracing::debug!("SSDP listener stopped");
    })
}

/// Spawn the M-SEARCH thread.
///
/// Each cycle sends one burst per configured search target, spaced by the
/// configured gap, and collects responses for the response window. Repeated
/// socket failures hit the same ceiling as the listener.
pub(crate) fn spawn_search_loop(
    config: EngineConfig,
    queue: Arc<AdvertisementQueue>,
    fault_tx: mpsc::Sender<String>,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut failures = 0u32;
        let mut backoff = config.listen_backoff_base;

        while running.load(Ordering::Relaxed) {
            let socket = match SsdpSocket::new(config.search_response_window) {
                Ok(socket) => {
                    failures = 0;
                    backoff = config.listen_backoff_base;
                    socket
                }
                Err(e) => {
                    failures += 1;
                    if failures >= config.listen_failure_ceiling {
                        tracing::error!("M-SEARCH giving up after {failures} failures: {e}");
                        let _ =
                            fault_tx.send(format!("search failed after {failures} attempts: {e}"));
                        return;
                    }
                    tracing::warn!("M-SEARCH socket error (attempt {failures}): {e}");
                    sleep_while_running(backoff, &running);
                    backoff = (backoff * 2).min(config.listen_backoff_max);
                    continue;
                }
            };

            for target in &config.search_targets {
                if !running.load(Ordering::Relaxed) {
                    return;
                }
                if let Err(e) = socket.search(target, config.search_mx) {
                    tracing::warn!(%target, "M-SEARCH send failed: {e}");
                    continue;
                }
                tracing::trace!(%target, "M-SEARCH burst sent");
                for ad in socket.responses() {
                    queue.push(ad);
                }
                sleep_while_running(config.search_target_gap, &running);
            }

            sleep_while_running(config.search_interval, &running);
        }
        tracing::debug!("M-SEARCH loop stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sleep_while_running_stops_early() {
        let running = AtomicBool::new(true);
        let start = std::time::Instant::now();
        // Flag already false: returns immediately despite the long total.
        running.store(false, Ordering::Relaxed);
        sleep_while_running(Duration::from_secs(10), &running);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_sleep_while_running_sleeps_full_duration() {
        let running = AtomicBool::new(true);
        let start = std::time::Instant::now();
        sleep_while_running(Duration::from_millis(150), &running);
        assert!(start.elapsed() >= Duration::from_millis(140));
    }
}
