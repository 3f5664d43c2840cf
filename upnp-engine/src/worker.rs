//! Background engine worker.
//!
//! One thread with its own current-thread tokio runtime owns the async side
//! of the engine: the callback server, subscription renewals, registry
//! sweeps, and the delivery of every event to the caller-facing channel.
//! The facade talks to it through channels only, so the public API stays
//! fully synchronous.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use callback_server::{CallbackServer, EventRouter};
use upnp_discovery::{AdvertisementQueue, DescriptionFetcher, FetchOutcome};
use upnp_eventing::SubscriptionManager;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::event::ControlPointEvent;
use crate::registry::{DeviceRegistry, RegistryAction};

/// Commands from the facade to the worker.
#[derive(Debug)]
pub(crate) enum Command {
    /// Release all subscriptions, stop the callback server, and exit.
    Shutdown,
}

/// Handles the facade needs once the worker is up.
pub(crate) struct WorkerShared {
    /// Callback base URL handed to services on SUBSCRIBE
    pub callback_url: String,
    /// Router gating NOTIFY delivery by SID
    pub router: Arc<EventRouter>,
    /// Subscription manager shared between facade and worker
    pub manager: Arc<SubscriptionManager>,
}

/// Everything the worker thread needs to run.
pub(crate) struct WorkerContext {
    pub config: EngineConfig,
    pub registry: Arc<RwLock<DeviceRegistry>>,
    pub queue: Arc<AdvertisementQueue>,
    pub running: Arc<AtomicBool>,
    pub command_rx: mpsc::Receiver<Command>,
    pub fault_rx: mpsc::Receiver<String>,
    pub event_tx: mpsc::Sender<ControlPointEvent>,
    pub ready_tx: mpsc::Sender<Result<WorkerShared, EngineError>>,
}

/// Spawn the engine worker thread.
///
/// The worker builds the callback server and subscription manager inside its
/// runtime, then reports success or failure through the ready channel before
/// entering its event loop.
pub(crate) fn spawn_engine_worker(ctx: WorkerContext) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("upnp-engine-worker".to_string())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = ctx
                        .ready_tx
                        .send(Err(EngineError::Worker(format!("runtime: {e}"))));
                    return;
                }
            };

            rt.block_on(run_worker(ctx));
        })
        .expect("failed to spawn engine worker thread")
}

async fn run_worker(ctx: WorkerContext) {
    let WorkerContext {
        config,
        registry,
        queue,
        running,
        command_rx,
        fault_rx,
        event_tx,
        ready_tx,
    } = ctx;

    let (notify_tx, mut notify_rx) = tokio::sync::mpsc::unbounded_channel();

    let server = match CallbackServer::new(config.callback_port_range, notify_tx).await {
        Ok(server) => server,
        Err(e) => {
            let _ = ready_tx.send(Err(EngineError::CallbackServer(e.to_string())));
            return;
        }
    };

    let manager = match SubscriptionManager::new(
        server.base_url().to_string(),
        config.subscription_timeout_secs,
    ) {
        Ok(manager) => Arc::new(manager),
        Err(e) => {
            let _ = ready_tx.send(Err(e.into()));
            server.shutdown().await;
            return;
        }
    };

    let fetcher = match DescriptionFetcher::new(config.fetch_timeout) {
        Ok(fetcher) => Arc::new(fetcher),
        Err(e) => {
            let _ = ready_tx.send(Err(EngineError::Worker(e.to_string())));
            server.shutdown().await;
            return;
        }
    };

    let router = Arc::clone(server.router());
    if ready_tx
        .send(Ok(WorkerShared {
            callback_url: server.base_url().to_string(),
            router: Arc::clone(&router),
            manager: Arc::clone(&manager),
        }))
        .is_err()
    {
        // Facade gave up waiting; nothing to run for.
        server.shutdown().await;
        return;
    }

    tracing::info!("engine worker started");

    // Fetch results come back from plain threads over a std channel, drained
    // on the tick alongside commands and advertisements.
    let (fetch_tx, fetch_rx) = mpsc::channel::<(String, FetchOutcome)>();
    let mut pending_fetches: VecDeque<String> = VecDeque::new();
    let mut fetches_in_flight = 0usize;

    let mut sweep = tokio::time::interval(config.sweep_interval);
    let mut renewals = tokio::time::interval(config.renewal_check_interval);
    let mut tick = tokio::time::interval(Duration::from_millis(10));

    'main: loop {
        tokio::select! {
            payload = notify_rx.recv() => {
                if let Some(payload) = payload {
                    if let Some(event) =
                        manager.handle_notify(&payload.sid, payload.seq, &payload.body)
                    {
                        deliver(&event_tx, ControlPointEvent::ServiceEvent(event));
                    }
                }
            }

            _ = sweep.tick() => {
                let events = match registry.write() {
                    Ok(mut registry) => registry.sweep(SystemTime::now()),
                    Err(_) => Vec::new(),
                };
                for event in events {
                    deliver(&event_tx, event);
                }
            }

            _ = renewals.tick() => {
                // Renewals are blocking HTTP; keep them off the event loop.
                let lost = {
                    let manager = Arc::clone(&manager);
                    tokio::task::spawn_blocking(move || manager.check_renewals())
                        .await
                        .unwrap_or_default()
                };
                for subscription in lost {
                    router.unregister(&subscription.sid);
                    deliver(&event_tx, ControlPointEvent::SubscriptionLost {
                        sid: subscription.sid,
                        service: subscription.service,
                    });
                }
            }

            _ = tick.tick() => {
                while let Ok(command) = command_rx.try_recv() {
                    match command {
                        Command::Shutdown => break 'main,
                    }
                }
                if !running.load(Ordering::Relaxed) {
                    break 'main;
                }

                while let Ok(reason) = fault_rx.try_recv() {
                    deliver(&event_tx, ControlPointEvent::DiscoveryFailed { reason });
                }

                while let Ok((location, outcome)) = fetch_rx.try_recv() {
                    fetches_in_flight = fetches_in_flight.saturating_sub(1);
                    let events = match registry.write() {
                        Ok(mut registry) => match outcome {
                            Ok(device) => {
                                registry.on_fetch_success(&location, device, SystemTime::now())
                            }
                            Err(e) => {
                                tracing::debug!(%location, "description fetch failed: {e}");
                                registry.on_fetch_failure(&location);
                                Vec::new()
                            }
                        },
                        Err(_) => Vec::new(),
                    };
                    for event in events {
                        deliver(&event_tx, event);
                    }
                }

                for ad in queue.drain() {
                    let (action, events) = match registry.write() {
                        Ok(mut registry) => registry.on_advertisement(&ad, SystemTime::now()),
                        Err(_) => continue,
                    };
                    if let RegistryAction::Fetch(location) = action {
                        pending_fetches.push_back(location);
                    }
                    for event in events {
                        deliver(&event_tx, event);
                    }
                }

                while fetches_in_flight < config.max_concurrent_fetches {
                    let Some(location) = pending_fetches.pop_front() else { break };
                    fetches_in_flight += 1;
                    let fetcher = Arc::clone(&fetcher);
                    let fetch_tx = fetch_tx.clone();
                    std::thread::spawn(move || {
                        let outcome = fetcher.fetch(&location);
                        let _ = fetch_tx.send((location, outcome));
                    });
                }
            }
        }
    }

    tracing::info!("engine worker shutting down");

    // Release every subscription before the callback server goes away.
    {
        let manager = Arc::clone(&manager);
        let _ = tokio::task::spawn_blocking(move || manager.shutdown()).await;
    }
    server.shutdown().await;

    tracing::info!("engine worker stopped");
}

fn deliver(event_tx: &mpsc::Sender<ControlPointEvent>, event: ControlPointEvent) {
    // A send failure means every iterator and the facade are gone; events
    // are simply discarded at that point.
    let _ = event_tx.send(event);
}
