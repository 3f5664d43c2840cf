//! Generic HTTP callback server for GENA event reception.
//!
//! This crate is the inbound half of UPnP eventing: a lightweight HTTP
//! server that receives NOTIFY requests from subscribed services and routes
//! them, by subscription ID, into a channel for the engine to consume. It
//! has no knowledge of any particular device or service protocol.
//!
//! # Overview
//!
//! - [`CallbackServer`]: binds a port from a configured range, accepts
//!   NOTIFY on any path, validates GENA headers.
//! - [`EventRouter`]: gate-keeps by registered subscription ID; unknown SIDs
//!   are answered 404 and their payloads discarded.
//! - [`NotificationPayload`]: the unparsed SID/SEQ/body triple handed to the
//!   consumer.
//!
//! Parsing the XML body, enforcing sequence ordering, and matching events to
//! services all happen upstream in the eventing crate; this layer only
//! moves bytes off the wire.

mod error;
pub mod router;
mod server;

pub use error::CallbackError;
pub use router::{EventRouter, NotificationPayload};
pub use server::CallbackServer;
