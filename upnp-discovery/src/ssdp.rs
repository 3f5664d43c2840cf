//! SSDP (Simple Service Discovery Protocol) primitives.
//!
//! This module provides the datagram model and socket plumbing for SSDP:
//! parsing NOTIFY announcements and M-SEARCH responses into [`Advertisement`]
//! records, and sending M-SEARCH requests over multicast.

use std::net::{Ipv4Addr, UdpSocket};
use std::time::Duration;

use crate::error::{DiscoveryError, Result};

/// The SSDP multicast group address.
pub const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// The SSDP well-known port.
pub const SSDP_PORT: u16 = 1900;

/// Default advertisement lifetime when a datagram omits CACHE-CONTROL.
pub const DEFAULT_MAX_AGE: u64 = 1800;

/// How an advertisement arrived and what it announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertisementKind {
    /// An unsolicited NOTIFY with NTS `ssdp:alive`
    Alive,
    /// An unsolicited NOTIFY with NTS `ssdp:byebye`
    ByeBye,
    /// A unicast response to one of our M-SEARCH requests
    SearchResponse,
}

/// A raw advertisement record parsed from an SSDP datagram.
///
/// Advertisements are the transport's only output: the registry resolves them
/// into devices and services. A `ByeBye` advertisement carries no location.
#[derive(Debug, Clone, PartialEq)]
pub struct Advertisement {
    /// Unique Service Name identifying the advertised device or service
    pub usn: String,
    /// Notification type (NT header) or search target (ST header)
    pub notification_type: String,
    /// Description document URL; absent for byebye notifications
    pub location: Option<String>,
    /// Advertisement lifetime in seconds, from CACHE-CONTROL max-age
    pub max_age: u64,
    /// Whether this was an alive/byebye NOTIFY or a search response
    pub kind: AdvertisementKind,
}

impl Advertisement {
    /// Whether this advertisement announces presence (alive or search response).
    pub fn is_alive(&self) -> bool {
        !matches!(self.kind, AdvertisementKind::ByeBye)
    }
}

/// Parse one SSDP datagram into an advertisement.
///
/// Handles both NOTIFY announcements and `HTTP/1.1 200 OK` M-SEARCH
/// responses. Returns `None` for anything else (including M-SEARCH requests
/// from other control points, which share the multicast group).
pub fn parse_datagram(text: &str) -> Option<Advertisement> {
    let mut lines = text.lines();
    let start_line = lines.next()?.trim();

    let is_notify = start_line.starts_with("NOTIFY");
    let is_response = start_line.starts_with("HTTP/1.1 200");
    if !is_notify && !is_response {
        return None;
    }

    let mut usn = None;
    let mut nt = None;
    let mut st = None;
    let mut nts = None;
    let mut location = None;
    let mut cache_control = None;

    for line in lines {
        let line = line.trim();
        if let Some(value) = header_value(line, "USN") {
            usn = Some(value);
        } else if let Some(value) = header_value(line, "NT") {
            nt = Some(value);
        } else if let Some(value) = header_value(line, "ST") {
            st = Some(value);
        } else if let Some(value) = header_value(line, "NTS") {
            nts = Some(value);
        } else if let Some(value) = header_value(line, "LOCATION") {
            location = Some(value);
        } else if let Some(value) = header_value(line, "CACHE-CONTROL") {
            cache_control = Some(value);
        }
    }

    let usn = usn?;
    let max_age = cache_control
        .as_deref()
        .and_then(parse_max_age)
        .unwrap_or(DEFAULT_MAX_AGE);

    if is_response {
        return Some(Advertisement {
            usn,
            notification_type: st?,
            location: Some(location?),
            max_age,
            kind: AdvertisementKind::SearchResponse,
        });
    }

    let notification_type = nt?;
    match nts.as_deref() {
        Some("ssdp:alive") => Some(Advertisement {
            usn,
            notification_type,
            location: Some(location?),
            max_age,
            kind: AdvertisementKind::Alive,
        }),
        Some("ssdp:byebye") => Some(Advertisement {
            usn,
            notification_type,
            location: None,
            max_age,
            kind: AdvertisementKind::ByeBye,
        }),
        _ => None,
    }
}

/// Extract a header value from a line like `NAME: value`, case-insensitively.
fn header_value(line: &str, name: &str) -> Option<String> {
    if line.len() <= name.len() || !line.is_char_boundary(name.len()) {
        return None;
    }
    let (prefix, rest) = line.split_at(name.len());
    if !prefix.eq_ignore_ascii_case(name) {
        return None;
    }
    let value = rest.strip_prefix(':')?.trim();
    if value.is_empty() {
        return None;
    }
    Some(value.to_string())
}

/// Parse the max-age directive out of a CACHE-CONTROL header value.
fn parse_max_age(value: &str) -> Option<u64> {
    for directive in value.split(',') {
        let directive = directive.trim();
        if let Some(seconds) = directive.strip_prefix("max-age") {
            let seconds = seconds.trim_start().strip_prefix('=')?;
            return seconds.trim().parse().ok();
        }
    }
    None
}

/// Socket for issuing M-SEARCH requests and draining their responses.
pub struct SsdpSocket {
    socket: UdpSocket,
}

impl SsdpSocket {
    /// Bind an ephemeral UDP socket configured for SSDP searching.
    ///
    /// The read timeout bounds how long [`SsdpSocket::responses`] waits for
    /// further replies after a search.
    pub fn new(timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|e| DiscoveryError::Bind(format!("failed to bind search socket: {e}")))?;

        socket
            .set_read_timeout(Some(timeout))
            .map_err(|e| DiscoveryError::Bind(format!("failed to set read timeout: {e}")))?;

        socket
            .set_multicast_loop_v4(true)
            .map_err(|e| DiscoveryError::Bind(format!("failed to set multicast loop: {e}")))?;

        Ok(Self { socket })
    }

    /// Send one M-SEARCH request for the given search target.
    pub fn search(&self, search_target: &str, mx: u8) -> Result<()> {
        let request = format!(
            "M-SEARCH * HTTP/1.1\r\n\
             HOST: {SSDP_MULTICAST_ADDR}:{SSDP_PORT}\r\n\
             MAN: \"ssdp:discover\"\r\n\
             MX: {mx}\r\n\
             ST: {search_target}\r\n\
             USER-AGENT: upnp-cp/0.1 UPnP/1.1\r\n\
             \r\n"
        );

        self.socket
            .send_to(request.as_bytes(), (SSDP_MULTICAST_ADDR, SSDP_PORT))
            .map_err(|e| DiscoveryError::Network(format!("failed to send M-SEARCH: {e}")))?;

        Ok(())
    }

    /// Iterate over search responses until the read timeout elapses.
    pub fn responses(&self) -> SearchResponses<'_> {
        SearchResponses {
            socket: &self.socket,
            buffer: [0; 2048],
            finished: false,
        }
    }
}

/// Iterator over parsed M-SEARCH responses.
///
/// Malformed datagrams are skipped, not surfaced; the iterator ends when the
/// socket's read timeout expires without further traffic.
pub struct SearchResponses<'a> {
    socket: &'a UdpSocket,
    buffer: [u8; 2048],
    finished: bool,
}

impl<'a> Iterator for SearchResponses<'a> {
    type Item = Advertisement;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            match self.socket.recv_from(&mut self.buffer) {
                Ok((size, from)) => {
                    let Ok(text) = std::str::from_utf8(&self.buffer[..size]) else {
                        tracing::debug!("dropping non-UTF-8 datagram from {from}");
                        continue;
                    };
                    match parse_datagram(text) {
                        Some(ad) if ad.kind == AdvertisementKind::SearchResponse => {
                            return Some(ad);
                        }
                        Some(_) => continue,
                        None => {
                            tracing::debug!("dropping malformed SSDP datagram from {from}");
                            continue;
                        }
                    }
                }
                Err(e) => {
                    if e.kind() != std::io::ErrorKind::WouldBlock
                        && e.kind() != std::io::ErrorKind::TimedOut
                    {
                        tracing::debug!("search socket error: {e}");
                    }
                    self.finished = true;
                }
            }
        }
        None
    }
}
