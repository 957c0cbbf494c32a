//! WebSocket connection to the relay.
//!
//! The socket is owned by a worker thread. Outbound frames are queued on a
//! channel; inbound frames are polled with a short read timeout so the
//! worker notices queued frames and shutdown requests promptly.

use std::io::ErrorKind;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use smol_str::SmolStr;
use tracing::{debug, info, warn};
use tungstenite::client::IntoClientRequest;
use tungstenite::{Message, WebSocket};

use super::protocol::{
    Adapter, ClientMessage, Endpoint, EndpointProtocol, EndpointStatus, RelayMessage,
};
use crate::error::BridgeError;
use crate::store::{RegisterType, RegisterValue};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Shared view of the connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeSession {
    pub connected: bool,
    pub url: SmolStr,
    pub adapters: Vec<Adapter>,
    pub selected_adapter: Option<SmolStr>,
    /// Frames received from the relay.
    pub rx_count: u64,
    /// Frames sent to the relay.
    pub tx_count: u64,
}

impl BridgeSession {
    fn reset(&mut self) {
        self.connected = false;
        self.adapters.clear();
        self.selected_adapter = None;
    }
}

/// Something the relay told us, to be applied by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    Adapters(Vec<Adapter>),
    RegisterWrite {
        kind: RegisterType,
        address: u16,
        value: RegisterValue,
    },
    RelayError(SmolStr),
    /// The socket closed; carries the reason when it was not a clean close.
    Disconnected(Option<SmolStr>),
}

pub struct BridgeClient {
    session: Arc<Mutex<BridgeSession>>,
    outbound: Sender<ClientMessage>,
    events: Receiver<BridgeEvent>,
    acks: Receiver<Vec<EndpointStatus>>,
    /// Endpoint ids of the last `SET_PROTOCOL_ENDPOINTS`.
    requested: Mutex<Vec<SmolStr>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for BridgeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeClient")
            .field("session", &*self.session.lock())
            .finish_non_exhaustive()
    }
}

impl BridgeClient {
    /// Connects and completes the WebSocket handshake, then starts the worker.
    pub fn connect(url: &str, timeout: Duration) -> Result<Self, BridgeError> {
        let invalid = |reason: &str| BridgeError::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        };
        let request = url
            .into_client_request()
            .map_err(|err| invalid(&err.to_string()))?;
        let uri = request.uri();
        if uri.scheme_str() != Some("ws") {
            return Err(invalid("only ws:// relays are supported"));
        }
        let host = uri.host().ok_or_else(|| invalid("missing host"))?;
        let port = uri.port_u16().unwrap_or(80);

        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|err| BridgeError::Connect(err.to_string().into()))?;
        let mut last_error = None;
        let mut stream = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(connected) => {
                    stream = Some(connected);
                    break;
                }
                Err(err) => last_error = Some(err),
            }
        }
        let stream = stream.ok_or_else(|| {
            BridgeError::Connect(
                last_error
                    .map_or_else(|| format!("no address for {host}"), |err| err.to_string())
                    .into(),
            )
        })?;
        let io_error = |err: std::io::Error| BridgeError::Connect(err.to_string().into());
        stream.set_read_timeout(Some(timeout)).map_err(io_error)?;
        stream.set_nodelay(true).map_err(io_error)?;

        let (socket, _response) = tungstenite::client(request, stream)
            .map_err(|err| BridgeError::Handshake(err.to_string().into()))?;
        socket
            .get_ref()
            .set_read_timeout(Some(POLL_INTERVAL))
            .map_err(io_error)?;

        let session = Arc::new(Mutex::new(BridgeSession {
            connected: true,
            url: url.into(),
            ..BridgeSession::default()
        }));
        let (outbound, outbound_rx) = unbounded();
        let (events_tx, events) = unbounded();
        let (acks_tx, acks) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            socket,
            session: Arc::clone(&session),
            outbound: outbound_rx,
            events: events_tx,
            acks: acks_tx,
            stop: Arc::clone(&stop),
        };
        let handle = thread::Builder::new()
            .name("subsim-bridge".into())
            .spawn(move || worker.run())
            .map_err(|err| BridgeError::ThreadSpawn(err.to_string().into()))?;
        info!(url, "bridge connected");

        Ok(Self {
            session,
            outbound,
            events,
            acks,
            requested: Mutex::new(Vec::new()),
            stop,
            worker: Some(handle),
        })
    }

    #[must_use]
    pub fn session(&self) -> BridgeSession {
        self.session.lock().clone()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.lock().connected
    }

    /// Queues a frame for the relay.
    pub fn send(&self, message: ClientMessage) -> Result<(), BridgeError> {
        if !self.is_connected() {
            return Err(BridgeError::NotConnected);
        }
        self.outbound
            .send(message)
            .map_err(|_| BridgeError::NotConnected)
    }

    pub fn list_adapters(&self) -> Result<(), BridgeError> {
        self.send(ClientMessage::ListAdapters)
    }

    pub fn select_adapter(&self, ip: &str) -> Result<(), BridgeError> {
        self.send(ClientMessage::SelectAdapter { ip: ip.into() })?;
        self.session.lock().selected_adapter = Some(ip.into());
        Ok(())
    }

    /// Sends a new endpoint list. Acknowledgments still queued from earlier
    /// requests are discarded.
    pub fn set_endpoints(
        &self,
        protocol: EndpointProtocol,
        endpoints: Vec<Endpoint>,
    ) -> Result<(), BridgeError> {
        let stale = self.acks.try_iter().count();
        if stale > 0 {
            debug!(stale, "discarding late endpoint acknowledgments");
        }
        *self.requested.lock() = endpoints.iter().map(|endpoint| endpoint.id.clone()).collect();
        self.send(ClientMessage::SetProtocolEndpoints {
            protocol,
            endpoints,
        })
    }

    /// Mirrors a local register write to the relay.
    pub fn mirror_register(
        &self,
        kind: RegisterType,
        address: u16,
        value: RegisterValue,
    ) -> Result<(), BridgeError> {
        self.send(ClientMessage::RegisterUpdate {
            register_type: kind,
            address,
            value,
        })
    }

    /// Waits for the relay to acknowledge the last endpoint list.
    ///
    /// An acknowledgment naming endpoints that were not in the last request
    /// answers an older one and is skipped.
    pub fn wait_for_endpoint_status(
        &self,
        timeout: Duration,
    ) -> Result<Vec<EndpointStatus>, BridgeError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.acks.recv_deadline(deadline) {
                Ok(statuses) if self.answers_last_request(&statuses) => return Ok(statuses),
                Ok(statuses) => {
                    debug!(endpoints = statuses.len(), "skipping acknowledgment of an older request");
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(BridgeError::AckTimeout(
                        u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    ))
                }
                Err(RecvTimeoutError::Disconnected) => return Err(BridgeError::NotConnected),
            }
        }
    }

    fn answers_last_request(&self, statuses: &[EndpointStatus]) -> bool {
        let requested = self.requested.lock();
        if requested.is_empty() {
            return statuses.is_empty();
        }
        !statuses.is_empty() && statuses.iter().all(|status| requested.contains(&status.id))
    }

    /// Drains events received since the last call.
    #[must_use]
    pub fn poll_events(&self) -> Vec<BridgeEvent> {
        self.events.try_iter().collect()
    }

    /// Closes the socket and waits for the worker to exit.
    pub fn disconnect(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("bridge worker panicked");
            }
        }
        self.session.lock().reset();
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

struct Worker {
    socket: WebSocket<TcpStream>,
    session: Arc<Mutex<BridgeSession>>,
    outbound: Receiver<ClientMessage>,
    events: Sender<BridgeEvent>,
    acks: Sender<Vec<EndpointStatus>>,
    stop: Arc<AtomicBool>,
}

impl Worker {
    fn run(mut self) {
        let reason = self.pump();
        match &reason {
            Some(reason) => warn!(%reason, "bridge connection lost"),
            None => info!("bridge closed"),
        }
        self.session.lock().reset();
        let _ = self.events.send(BridgeEvent::Disconnected(reason));
    }

    /// Moves frames until the socket closes; `Some` carries an error reason.
    fn pump(&mut self) -> Option<SmolStr> {
        loop {
            // Frames queued before the stop request still go out.
            let stopping = self.stop.load(Ordering::SeqCst);
            while let Ok(message) = self.outbound.try_recv() {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!(%err, "dropping unserializable bridge frame");
                        continue;
                    }
                };
                if let Err(err) = self.socket.send(Message::text(text)) {
                    return Some(err.to_string().into());
                }
                self.session.lock().tx_count += 1;
            }
            if stopping {
                let _ = self.socket.close(None);
                let _ = self.socket.flush();
                return None;
            }
            match self.socket.read() {
                Ok(Message::Text(text)) => {
                    self.session.lock().rx_count += 1;
                    self.handle(text.as_str());
                }
                Ok(Message::Close(_)) => return None,
                Ok(_) => {}
                Err(tungstenite::Error::Io(err))
                    if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {}
                Err(tungstenite::Error::ConnectionClosed) => return None,
                Err(err) => return Some(err.to_string().into()),
            }
        }
    }

    fn handle(&self, text: &str) {
        let message = match serde_json::from_str::<RelayMessage>(text) {
            Ok(message) => message,
            Err(err) => {
                debug!(%err, "ignoring unrecognized relay frame");
                return;
            }
        };
        match message {
            RelayMessage::AdapterList { adapters } => {
                self.session.lock().adapters.clone_from(&adapters);
                let _ = self.events.send(BridgeEvent::Adapters(adapters));
            }
            RelayMessage::EndpointStatusList { endpoints } => {
                let _ = self.acks.send(endpoints);
            }
            RelayMessage::RegisterWrite {
                register_type,
                address,
                value,
            } => {
                let _ = self.events.send(BridgeEvent::RegisterWrite {
                    kind: register_type,
                    address,
                    value,
                });
            }
            RelayMessage::Error { message } => {
                let _ = self.events.send(BridgeEvent::RelayError(message));
            }
        }
    }
}
