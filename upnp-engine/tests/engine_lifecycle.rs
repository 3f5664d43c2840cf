//! Facade lifecycle tests.
//!
//! The live test exercises real sockets (SSDP port 1900 plus a callback
//! port) and tolerates hosts where those are unavailable; the synchronous
//! failure from `start()` is itself part of the contract.

use std::time::Duration;

use upnp_engine::{ControlPoint, EngineConfig, EngineError};

#[test]
fn test_start_stop_cycle() {
    let config = EngineConfig::fast_discovery()
        .with_callback_ports(48600, 48650)
        .with_search_interval(Duration::from_secs(5));
    let engine = ControlPoint::new(config).unwrap();

    match engine.start() {
        Ok(()) => {
            assert!(engine.is_running());
            assert!(engine.callback_url().is_some());

            // start() is idempotent while running.
            assert!(engine.start().is_ok());
            assert!(engine.is_running());

            // stop() releases everything before returning, and is idempotent.
            engine.stop();
            assert!(!engine.is_running());
            assert!(engine.callback_url().is_none());
            engine.stop();

            // The engine is restartable after a stop.
            if engine.start().is_ok() {
                assert!(engine.is_running());
                engine.stop();
            }
        }
        Err(EngineError::Bind(_)) | Err(EngineError::CallbackServer(_)) => {
            // Another process owns port 1900 or the callback range, or the
            // host has no usable interface; the error arrived synchronously,
            // which is exactly what start() promises for fatal failures.
            assert!(!engine.is_running());
        }
        Err(e) => panic!("unexpected start failure: {e}"),
    }
}

#[test]
fn test_snapshots_and_errors_without_start() {
    let engine = ControlPoint::new(EngineConfig::default()).unwrap();

    assert!(engine.devices().is_empty());
    assert!(engine.services().is_empty());
    assert!(engine.device("uuid:anything").is_none());
    assert!(matches!(
        engine.subscribe("uuid:x", "urn:upnp-org:serviceId:AVTransport"),
        Err(EngineError::NotRunning)
    ));
}

#[test]
fn test_event_iterators_share_one_feed() {
    let engine = ControlPoint::new(EngineConfig::default()).unwrap();
    let iter_a = engine.events();
    let iter_b = iter_a.clone();

    assert!(iter_a.try_recv().is_none());
    assert!(iter_b.try_recv().is_none());
    assert!(iter_a
        .recv_timeout(Duration::from_millis(20))
        .is_none());
}
