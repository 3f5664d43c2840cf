//! Multicast listener for unsolicited SSDP NOTIFY datagrams.

use std::net::{Ipv4Addr, UdpSocket};
use std::time::Duration;

use crate::error::{DiscoveryError, Result};
use crate::ssdp::{parse_datagram, Advertisement, SSDP_MULTICAST_ADDR, SSDP_PORT};

/// Listener joined to the SSDP multicast group on port 1900.
///
/// Receives the alive/byebye announcements devices send without being asked.
/// Binding can fail if another process owns the port; that failure is the
/// engine's fatal startup error and is surfaced synchronously from `start()`.
pub struct NotifyListener {
    socket: UdpSocket,
}

impl NotifyListener {
    /// Bind to 0.0.0.0:1900 and join the SSDP multicast group.
    ///
    /// The read timeout keeps `recv` from blocking forever so a hosting
    /// thread can check its shutdown flag between datagrams.
    pub fn bind(read_timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", SSDP_PORT))
            .map_err(|e| DiscoveryError::Bind(format!("failed to bind port {SSDP_PORT}: {e}")))?;

        socket
            .join_multicast_v4(&SSDP_MULTICAST_ADDR, &Ipv4Addr::UNSPECIFIED)
            .map_err(|e| DiscoveryError::Bind(format!("failed to join multicast group: {e}")))?;

        socket
            .set_read_timeout(Some(read_timeout))
            .map_err(|e| DiscoveryError::Bind(format!("failed to set read timeout: {e}")))?;

        Ok(Self { socket })
    }

    /// Receive and parse one datagram.
    ///
    /// Returns `Ok(None)` when the read timed out or the datagram was not a
    /// usable advertisement (malformed traffic is logged and dropped, never
    /// surfaced as an error). `Err` means a real socket failure the caller
    /// should back off on.
    pub fn recv(&self) -> Result<Option<Advertisement>> {
        let mut buffer = [0u8; 2048];
        match self.socket.recv_from(&mut buffer) {
            Ok((size, from)) => {
                let Ok(text) = std::str::from_utf8(&buffer[..size]) else {
                    tracing::debug!("dropping non-UTF-8 datagram from {from}");
                    return Ok(None);
                };
                match parse_datagram(text) {
                    Some(ad) => Ok(Some(ad)),
                    None => {
                        tracing::trace!("ignoring datagram from {from}");
                        Ok(None)
                    }
                }
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(DiscoveryError::Network(format!("listen socket error: {e}"))),
        }
    }
}
