//! HTTP server for receiving GENA event notifications.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::sync::Arc;

use tokio::sync::mpsc;
use warp::Filter;

use crate::error::CallbackError;
use crate::router::{EventRouter, NotificationPayload};

/// HTTP callback server for GENA NOTIFY requests.
///
/// Binds to the first free port in a configured range, accepts NOTIFY on any
/// path, validates the GENA headers, and routes payloads for registered
/// subscription IDs through an [`EventRouter`] into a channel. One server
/// handles the callbacks for every subscription the engine holds.
///
/// # Example
///
/// ```no_run
/// use tokio::sync::mpsc;
/// use callback_server::{CallbackServer, NotificationPayload};
///
/// #[tokio::main]
/// async fn main() {
///     let (tx, mut rx) = mpsc::unbounded_channel::<NotificationPayload>();
///
///     let server = CallbackServer::new((3400, 3500), tx)
///         .await
///         .expect("failed to start callback server");
///     println!("callback URL: {}", server.base_url());
///
///     while let Some(notification) = rx.recv().await {
///         println!("event for {}", notification.sid);
///     }
/// }
/// ```
pub struct CallbackServer {
    /// The port the server is bound to
    port: u16,
    /// The base URL to hand out in CALLBACK headers
    base_url: String,
    /// Router deciding which SIDs may deliver
    router: Arc<EventRouter>,
    /// Shutdown signal sender
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Server task handle
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl CallbackServer {
    /// Create and start a callback server.
    ///
    /// Scans `port_range` for a free port, detects the local IP address used
    /// for outbound traffic, starts the HTTP listener, and waits for it to be
    /// ready before returning.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackError::NoAvailablePort`] when every port in the
    /// range is taken, [`CallbackError::NoLocalIp`] when the local address
    /// cannot be determined, and [`CallbackError::Startup`] when the listener
    /// fails to come up.
    pub async fn new(
        port_range: (u16, u16),
        event_sender: mpsc::UnboundedSender<NotificationPayload>,
    ) -> Result<Self, CallbackError> {
        let port = Self::find_available_port(port_range.0, port_range.1).ok_or(
            CallbackError::NoAvailablePort {
                start: port_range.0,
                end: port_range.1,
            },
        )?;

        let local_ip = Self::detect_local_ip().ok_or(CallbackError::NoLocalIp)?;
        let base_url = format!("http://{local_ip}:{port}");

        let router = Arc::new(EventRouter::new(event_sender));

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let (ready_tx, mut ready_rx) = mpsc::channel::<()>(1);

        let server_handle = Self::start_server(port, Arc::clone(&router), shutdown_rx, ready_tx);

        ready_rx
            .recv()
            .await
            .ok_or_else(|| CallbackError::Startup("server failed to start".to_string()))?;

        tracing::info!(%base_url, "callback server listening");

        Ok(Self {
            port,
            base_url,
            router,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// The base URL to use in SUBSCRIBE CALLBACK headers.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The port the server is bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The router controlling which subscription IDs may deliver.
    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    /// Shut the server down gracefully, completing in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }
        tracing::debug!("callback server stopped");
    }

    /// Find a free port in the given inclusive range.
    fn find_available_port(start: u16, end: u16) -> Option<u16> {
        (start..=end).find(|&port| Self::is_port_available(port))
    }

    /// Check whether a port can currently be bound.
    fn is_port_available(port: u16) -> bool {
        TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)).is_ok()
    }

    /// Detect the local IP address used for outbound traffic.
    ///
    /// Connects a UDP socket toward a public address to learn which local
    /// interface routing would pick; no packet is actually sent.
    fn detect_local_ip() -> Option<IpAddr> {
        let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect("8.8.8.8:80").ok()?;
        Some(socket.local_addr().ok()?.ip())
    }

    /// Start the HTTP listener task.
    fn start_server(
        port: u16,
        router: Arc<EventRouter>,
        mut shutdown_rx: mpsc::Receiver<()>,
        ready_tx: mpsc::Sender<()>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            // NOTIFY arrives on whatever path we put in the CALLBACK header;
            // accept any path and dispatch on method + headers.
            let notify_route = warp::method()
                .and(warp::header::optional::<String>("sid"))
                .and(warp::header::optional::<String>("seq"))
                .and(warp::header::optional::<String>("nt"))
                .and(warp::header::optional::<String>("nts"))
                .and(warp::body::bytes())
                .and_then({
                    move |method: warp::http::Method,
                          sid: Option<String>,
                          seq: Option<String>,
                          nt: Option<String>,
                          nts: Option<String>,
                          body: bytes::Bytes| {
                        let router = Arc::clone(&router);
                        async move {
                            if method != warp::http::Method::from_bytes(b"NOTIFY").unwrap() {
                                return Err(warp::reject::not_found());
                            }

                            if !validate_gena_headers(&nt, &nts) {
                                tracing::debug!("rejecting NOTIFY with bad NT/NTS headers");
                                return Err(warp::reject::custom(InvalidGenaHeaders));
                            }

                            let sid = sid.ok_or_else(|| {
                                tracing::debug!("rejecting NOTIFY without SID header");
                                warp::reject::custom(InvalidGenaHeaders)
                            })?;

                            let payload = NotificationPayload {
                                sid,
                                seq: seq.and_then(|s| s.trim().parse().ok()),
                                body: String::from_utf8_lossy(&body).to_string(),
                            };

                            tracing::trace!(
                                sid = %payload.sid,
                                seq = ?payload.seq,
                                bytes = payload.body.len(),
                                "received NOTIFY"
                            );

                            if router.route(payload) {
                                Ok::<_, warp::Rejection>(warp::reply::with_status(
                                    "",
                                    warp::http::StatusCode::OK,
                                ))
                            } else {
                                Err(warp::reject::not_found())
                            }
                        }
                    }
                });

            let routes = notify_route.recover(handle_rejection);

            let (addr, server) = warp::serve(routes).bind_with_graceful_shutdown(
                SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
                async move {
                    shutdown_rx.recv().await;
                },
            );

            tracing::debug!(%addr, "callback listener bound");
            let _ = ready_tx.send(()).await;
            server.await;
        })
    }
}

/// Validate the GENA NT/NTS headers when present.
///
/// Event notifications carry `NT: upnp:event` and `NTS: upnp:propchange`;
/// anything else that claims to be an event is rejected. Absent headers are
/// tolerated for devices that omit them.
fn validate_gena_headers(nt: &Option<String>, nts: &Option<String>) -> bool {
    if let Some(nt) = nt {
        if nt != "upnp:event" {
            return false;
        }
    }
    if let Some(nts) = nts {
        if nts != "upnp:propchange" {
            return false;
        }
    }
    true
}

/// Custom rejection for invalid GENA headers.
#[derive(Debug)]
struct InvalidGenaHeaders;

impl warp::reject::Reject for InvalidGenaHeaders {}

/// Convert rejections into plain HTTP responses.
async fn handle_rejection(
    err: warp::Rejection,
) -> Result<impl warp::Reply, std::convert::Infallible> {
    let (code, message) = if err.is_not_found() {
        (warp::http::StatusCode::NOT_FOUND, "subscription not found")
    } else if err.find::<InvalidGenaHeaders>().is_some() {
        (warp::http::StatusCode::BAD_REQUEST, "invalid GENA headers")
    } else {
        (
            warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            "internal server error",
        )
    };

    Ok(warp::reply::with_status(message, code))
}
