//! The control point facade.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use callback_server::EventRouter;
use upnp_discovery::{AdvertisementQueue, Device, NotifyListener, Service};
use upnp_eventing::{EventingStats, Subscription, SubscriptionManager};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::event::ControlPointEvent;
use crate::iter::EventIterator;
use crate::registry::DeviceRegistry;
use crate::transport;
use crate::worker::{spawn_engine_worker, Command, WorkerContext};

/// How long `start()` waits for the worker to come up.
const WORKER_READY_TIMEOUT: Duration = Duration::from_secs(15);

/// A UPnP control point.
///
/// An explicit engine instance owning all transport, registry, and
/// subscription state: construct as many as needed, no globals involved.
/// The public API is fully synchronous; background threads do the work.
///
/// # Example
///
/// ```no_run
/// use upnp_engine::{ControlPoint, ControlPointEvent, EngineConfig};
///
/// let config = EngineConfig::default()
///     .with_search_targets(["urn:schemas-upnp-org:device:MediaRenderer:1"]);
/// let engine = ControlPoint::new(config).unwrap();
/// engine.start().unwrap();
///
/// for event in engine.events() {
///     match event {
///         ControlPointEvent::DeviceAdded(device) => {
///             println!("found {}", device.friendly_name);
///         }
///         ControlPointEvent::ServiceEvent(event) => {
///             println!("{}: {:?}", event.sid, event.payload);
///         }
///         _ => {}
///     }
/// }
/// ```
pub struct ControlPoint {
    config: EngineConfig,
    registry: Arc<RwLock<DeviceRegistry>>,
    event_tx: mpsc::Sender<ControlPointEvent>,
    event_rx: Arc<Mutex<mpsc::Receiver<ControlPointEvent>>>,
    running: Mutex<Option<RunningState>>,
}

/// Live handles of a started engine.
struct RunningState {
    command_tx: mpsc::Sender<Command>,
    running_flag: Arc<AtomicBool>,
    manager: Arc<SubscriptionManager>,
    router: Arc<EventRouter>,
    callback_url: String,
    worker: JoinHandle<()>,
    listener: JoinHandle<()>,
    searcher: JoinHandle<()>,
}

impl ControlPoint {
    /// Create a control point with the given configuration.
    ///
    /// Validates the configuration; nothing touches the network until
    /// [`start`](ControlPoint::start).
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let (event_tx, event_rx) = mpsc::channel();
        Ok(Self {
            config,
            registry: Arc::new(RwLock::new(DeviceRegistry::new())),
            event_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
            running: Mutex::new(None),
        })
    }

    /// Start discovery and eventing.
    ///
    /// Binds the SSDP listen socket (the one fatal, synchronously surfaced
    /// failure), starts the callback server and worker, then spawns the
    /// transport threads. Idempotent while already running. The registry is
    /// cleared on each fresh start.
    pub fn start(&self) -> Result<()> {
        let mut running = self.running.lock().map_err(|_| EngineError::LockPoisoned)?;
        if running.is_some() {
            tracing::debug!("start() while already running, ignoring");
            return Ok(());
        }

        self.registry
            .write()
            .map_err(|_| EngineError::LockPoisoned)?
            .clear();

        let listener = NotifyListener::bind(self.config.listen_read_timeout)
            .map_err(|e| EngineError::Bind(e.to_string()))?;

        let queue = Arc::new(AdvertisementQueue::new(
            self.config.advertisement_queue_capacity,
        ));
        let running_flag = Arc::new(AtomicBool::new(true));
        let (command_tx, command_rx) = mpsc::channel();
        let (fault_tx, fault_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        let worker = spawn_engine_worker(WorkerContext {
            config: self.config.clone(),
            registry: Arc::clone(&self.registry),
            queue: Arc::clone(&queue),
            running: Arc::clone(&running_flag),
            command_rx,
            fault_rx,
            event_tx: self.event_tx.clone(),
            ready_tx,
        });

        let shared = match ready_rx.recv_timeout(WORKER_READY_TIMEOUT) {
            Ok(Ok(shared)) => shared,
            Ok(Err(e)) => {
                running_flag.store(false, Ordering::Relaxed);
                let _ = worker.join();
                return Err(e);
            }
            Err(_) => {
                running_flag.store(false, Ordering::Relaxed);
                return Err(EngineError::Worker(
                    "worker did not become ready in time".to_string(),
                ));
            }
        };

        let listener_handle = transport::spawn_notify_listener(
            listener,
            Arc::clone(&queue),
            fault_tx.clone(),
            Arc::clone(&running_flag),
            &self.config,
        );
        let searcher_handle = transport::spawn_search_loop(
            self.config.clone(),
            queue,
            fault_tx,
            Arc::clone(&running_flag),
        );

        tracing::info!(callback_url = %shared.callback_url, "control point started");

        *running = Some(RunningState {
            command_tx,
            running_flag,
            manager: shared.manager,
            router: shared.router,
            callback_url: shared.callback_url,
            worker,
            listener: listener_handle,
            searcher: searcher_handle,
        });

        Ok(())
    }

    /// Stop discovery and eventing.
    ///
    /// Releases every subscription (best-effort UNSUBSCRIBE), stops the
    /// callback server, and joins all background threads before returning.
    /// Safe to call from any thread; a stopped engine ignores the call.
    pub fn stop(&self) {
        let state = match self.running.lock() {
            Ok(mut running) => running.take(),
            Err(_) => return,
        };
        let Some(state) = state else {
            return;
        };

        tracing::info!("stopping control point");
        state.running_flag.store(false, Ordering::Relaxed);
        let _ = state.command_tx.send(Command::Shutdown);

        // The worker unsubscribes everything and stops the callback server
        // before exiting; joining it guarantees resources are released when
        // stop() returns.
        let _ = state.worker.join();
        let _ = state.listener.join();
        let _ = state.searcher.join();
        tracing::info!("control point stopped");
    }

    /// Whether the engine is currently running.
    pub fn is_running(&self) -> bool {
        self.running.lock().map(|r| r.is_some()).unwrap_or(false)
    }

    /// Snapshot of every visible device.
    ///
    /// A device is visible only after its description resolved. After
    /// `stop()` the last known snapshot remains readable.
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.registry
            .read()
            .map(|r| r.devices())
            .unwrap_or_default()
    }

    /// Snapshot of every visible service.
    pub fn services(&self) -> Vec<Service> {
        self.registry
            .read()
            .map(|r| r.services())
            .unwrap_or_default()
    }

    /// Look up a visible root device by UDN.
    pub fn device(&self, udn: &str) -> Option<Arc<Device>> {
        self.registry.read().ok()?.device(udn)
    }

    /// Subscribe to a service's eventing.
    ///
    /// The service is addressed by its owning device's UDN and its service
    /// ID, as found in a [`devices`](ControlPoint::devices) snapshot or a
    /// `ServiceAdded` event. Returns a handle; dropping it (or calling
    /// [`SubscriptionHandle::unsubscribe`]) stops event delivery for its SID
    /// immediately and sends UNSUBSCRIBE best-effort.
    pub fn subscribe(&self, udn: &str, service_id: &str) -> Result<SubscriptionHandle> {
        let (manager, router) = {
            let running = self.running.lock().map_err(|_| EngineError::LockPoisoned)?;
            let state = running.as_ref().ok_or(EngineError::NotRunning)?;
            (Arc::clone(&state.manager), Arc::clone(&state.router))
        };

        let service = self
            .registry
            .read()
            .map_err(|_| EngineError::LockPoisoned)?
            .find_service(udn, service_id)
            .ok_or_else(|| EngineError::UnknownService {
                udn: udn.to_string(),
                service_id: service_id.to_string(),
            })?;

        // Network I/O happens outside the running lock so subscribe can
        // never block stop() or other callers.
        let subscription = manager.subscribe(&service)?;
        router.register(&subscription.sid);

        Ok(SubscriptionHandle {
            subscription,
            manager,
            router,
            released: false,
        })
    }

    /// The callback URL the engine hands to services, when running.
    pub fn callback_url(&self) -> Option<String> {
        self.running
            .lock()
            .ok()?
            .as_ref()
            .map(|s| s.callback_url.clone())
    }

    /// Eventing diagnostics, when running.
    pub fn eventing_stats(&self) -> Option<EventingStats> {
        self.running
            .lock()
            .ok()?
            .as_ref()
            .map(|s| s.manager.stats())
    }

    /// A blocking iterator over the engine's event feed.
    ///
    /// Iterators survive stop/start cycles; clones share one channel, so
    /// each event reaches exactly one consumer.
    pub fn events(&self) -> EventIterator {
        EventIterator::new(Arc::clone(&self.event_rx))
    }
}

impl Drop for ControlPoint {
    fn drop(&mut self) {
        // Signal shutdown without joining: a graceful, blocking release is
        // what stop() is for.
        if let Ok(mut running) = self.running.lock() {
            if let Some(state) = running.take() {
                state.running_flag.store(false, Ordering::Relaxed);
                let _ = state.command_tx.send(Command::Shutdown);
            }
        }
    }
}

/// A live subscription held by a caller.
///
/// Dropping the handle unsubscribes: the SID is unregistered from the
/// callback router first, stopping delivery immediately (even for events
/// already in flight), and UNSUBSCRIBE is then sent best-effort.
pub struct SubscriptionHandle {
    subscription: Subscription,
    manager: Arc<SubscriptionManager>,
    router: Arc<EventRouter>,
    released: bool,
}

impl SubscriptionHandle {
    /// The subscription ID assigned by the service.
    pub fn sid(&self) -> &str {
        &self.subscription.sid
    }

    /// The subscribed service.
    pub fn service(&self) -> &Service {
        &self.subscription.service
    }

    /// A snapshot of the subscription's state at creation.
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Explicitly unsubscribe. Equivalent to dropping the handle.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        // Delivery stops before any network I/O happens.
        self.router.unregister(&self.subscription.sid);
        self.manager.unsubscribe(&self.subscription.sid);
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("sid", &self.subscription.sid)
            .field("service_id", &self.subscription.service.service_id)
            .finish()
    }
}
