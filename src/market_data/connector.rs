//! One long-lived websocket session per venue.
//!
//! The read task connects, subscribes, and feeds every frame through the
//! venue adapter into the venue book, notifying the listener after each
//! mutation. Any transport failure ends the session; the task then waits
//! the configured delay and starts over, for as long as it is running.
//! Venues that need application-level keepalives get a second task that
//! queues a ping for the read task at a fixed interval.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, sleep_until, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{client_async_tls, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, instrument, trace, warn};

use crate::config::ConnectorSettings;
use crate::error::ConnectorError;
use crate::market_data::adapters::{BookMutation, Endpoint, VenueAdapter};
use crate::market_data::aggregator::BookListener;
use crate::market_data::venue_book::SharedVenueBook;
use crate::telemetry;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Handshaking,
    Subscribed,
    Streaming,
    Closing,
}

impl ConnectionState {
    /// Heartbeats only make sense once the venue has our subscription.
    fn accepts_heartbeat(self) -> bool {
        matches!(self, ConnectionState::Subscribed | ConnectionState::Streaming)
    }
}

struct Shared {
    adapter: Arc<dyn VenueAdapter>,
    book: SharedVenueBook,
    listener: Arc<dyn BookListener>,
    settings: ConnectorSettings,
    state: watch::Sender<ConnectionState>,
    shutdown: watch::Sender<bool>,
    attempts: AtomicU64,
}

pub struct VenueConnector {
    shared: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl VenueConnector {
    pub fn new(
        adapter: Arc<dyn VenueAdapter>,
        book: SharedVenueBook,
        listener: Arc<dyn BookListener>,
        settings: ConnectorSettings,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                adapter,
                book,
                listener,
                settings,
                state,
                shutdown,
                attempts: AtomicU64::new(0),
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn venue(&self) -> &'static str {
        self.shared.adapter.venue()
    }

    /// Spawn the read task (and heartbeat task, if the venue pings).
    /// Calling it while already running is a no-op.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return;
        }
        self.shared.shutdown.send_replace(false);

        // capacity 1: a ping that cannot be queued is simply skipped
        let (ping_tx, ping_rx) = mpsc::channel::<String>(1);
        if let Some(payload) = self.shared.adapter.heartbeat() {
            let shared = Arc::clone(&self.shared);
            tasks.push(tokio::spawn(heartbeat_loop(shared, payload, ping_tx)));
        }
        let shared = Arc::clone(&self.shared);
        tasks.push(tokio::spawn(read_loop(shared, ping_rx)));
        info!(venue = self.venue(), "connector started");
    }

    /// Signal shutdown and wait for both tasks to finish. Interrupts any
    /// pending connect, read, or reconnect delay.
    pub async fn stop(&self) {
        let handles: Vec<_> = std::mem::take(&mut *self.tasks.lock());
        if handles.is_empty() {
            return;
        }
        self.shared.shutdown.send_replace(true);
        self.shared.state.send_replace(ConnectionState::Closing);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(venue = self.venue(), error = %e, "connector task ended abnormally");
            }
        }
        self.shared.state.send_replace(ConnectionState::Disconnected);
        info!(venue = self.venue(), "connector stopped");
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Connection attempts since construction, successful or not.
    pub fn attempts(&self) -> u64 {
        self.shared.attempts.load(Ordering::Relaxed)
    }
}

/// Resolves once shutdown is requested.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn read_loop(shared: Arc<Shared>, mut ping_rx: mpsc::Receiver<String>) {
    let venue = shared.adapter.venue();
    let mut shutdown = shared.shutdown.subscribe();
    loop {
        if *shutdown.borrow() {
            break;
        }
        let attempt = shared.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        match run_session(&shared, &mut shutdown, &mut ping_rx, attempt).await {
            Ok(()) => info!(venue, "session ended"),
            Err(e) => warn!(venue, error = %e, "session failed"),
        }
        if *shutdown.borrow() {
            break;
        }
        shared.state.send_replace(ConnectionState::Disconnected);
        metrics::counter!(telemetry::RECONNECTS_TOTAL, "venue" => venue).increment(1);

        let delay = shared.settings.reconnect_delay();
        info!(venue, delay_ms = delay.as_millis() as u64, "reconnecting after delay");
        tokio::select! {
            _ = sleep(delay) => {}
            _ = cancelled(&mut shutdown) => break,
        }
    }
    debug!(venue, "read loop exited");
}

async fn heartbeat_loop(shared: Arc<Shared>, payload: String, ping_tx: mpsc::Sender<String>) {
    let venue = shared.adapter.venue();
    let period = shared.settings.heartbeat_interval();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut shutdown = shared.shutdown.subscribe();
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancelled(&mut shutdown) => break,
        }
        if !shared.state.borrow().accepts_heartbeat() {
            continue;
        }
        if ping_tx.try_send(payload.clone()).is_err() {
            trace!(venue, "previous heartbeat still queued");
        }
    }
    debug!(venue, "heartbeat loop exited");
}

/// Connect, subscribe, and stream until the peer closes, the transport
/// fails, or shutdown is requested. `Ok` means an orderly end.
#[instrument(skip_all, fields(venue = shared.adapter.venue(), attempt = attempt))]
async fn run_session(
    shared: &Shared,
    shutdown: &mut watch::Receiver<bool>,
    ping_rx: &mut mpsc::Receiver<String>,
    attempt: u64,
) -> Result<(), ConnectorError> {
    let venue = shared.adapter.venue();
    let endpoint = shared.adapter.endpoint();

    // pings queued during a previous session are stale
    while ping_rx.try_recv().is_ok() {}

    shared.state.send_replace(ConnectionState::Connecting);
    let mut ws = tokio::select! {
        opened = open(shared, &endpoint) => opened?,
        _ = cancelled(shutdown) => return Ok(()),
    };

    let payload = shared.adapter.subscribe_payload();
    ws.send(Message::Text(payload)).await?;
    shared.state.send_replace(ConnectionState::Subscribed);
    info!(url = %endpoint.url(), "subscribed");

    // only inbound frames push the deadline out; our own pings do not
    let idle = shared.settings.idle_timeout();
    let mut deadline = Instant::now() + idle;
    loop {
        tokio::select! {
            _ = cancelled(shutdown) => {
                let _ = ws.close(None).await;
                return Ok(());
            }
            _ = sleep_until(deadline) => return Err(ConnectorError::Idle { after: idle }),
            Some(ping) = ping_rx.recv() => {
                send_heartbeat(&mut ws, venue, ping).await;
            }
            next = ws.next() => {
                deadline = Instant::now() + idle;
                let Some(msg) = next else { return Ok(()) };
                match msg? {
                    Message::Text(text) => handle_frame(shared, &text),
                    Message::Binary(bytes) => match String::from_utf8(bytes) {
                        Ok(text) => handle_frame(shared, &text),
                        Err(_) => debug!(venue, "dropping non-utf8 binary frame"),
                    },
                    Message::Close(frame) => {
                        info!(venue, ?frame, "venue closed the connection");
                        return Ok(());
                    }
                    // protocol pings are answered by tungstenite on the next read
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                }
            }
        }
    }
}

/// A failed heartbeat is logged, not fatal: a dead transport surfaces on
/// the read side or as an idle timeout. Returns whether the send went out.
async fn send_heartbeat<S>(sink: &mut S, venue: &'static str, payload: String) -> bool
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    trace!(venue, "sending heartbeat");
    match sink.send(Message::Text(payload)).await {
        Ok(()) => true,
        Err(e) => {
            warn!(venue, error = %e, "heartbeat send failed");
            false
        }
    }
}

async fn open(shared: &Shared, endpoint: &Endpoint) -> Result<WsStream, ConnectorError> {
    let limit = shared.settings.connect_timeout();

    let addr = tokio::net::lookup_host((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(|source| ConnectorError::Resolve { host: endpoint.host.clone(), port: endpoint.port, source })?
        .next()
        .ok_or_else(|| ConnectorError::NoAddress { host: endpoint.host.clone(), port: endpoint.port })?;

    let tcp = with_timeout("tcp connect", limit, TcpStream::connect(addr))
        .await?
        .map_err(ConnectorError::Connect)?;
    tcp.set_nodelay(true).map_err(ConnectorError::Connect)?;

    shared.state.send_replace(ConnectionState::Handshaking);
    let (ws, response) = with_timeout("websocket handshake", limit, client_async_tls(endpoint.url(), tcp))
        .await?
        .map_err(ConnectorError::Handshake)?;
    debug!(%addr, status = %response.status(), "websocket handshake complete");
    Ok(ws)
}

async fn with_timeout<F: std::future::Future>(
    stage: &'static str,
    after: Duration,
    fut: F,
) -> Result<F::Output, ConnectorError> {
    timeout(after, fut).await.map_err(|_| ConnectorError::Timeout { stage, after })
}

/// Parse errors drop the frame and keep the session alive.
fn handle_frame(shared: &Shared, text: &str) {
    let venue = shared.adapter.venue();
    metrics::counter!(telemetry::FRAMES_TOTAL, "venue" => venue).increment(1);
    match shared.adapter.parse(text) {
        Ok(BookMutation::Heartbeat) => trace!(venue, "heartbeat reply"),
        Ok(BookMutation::Acknowledged(msg)) => info!(venue, %msg, "subscription acknowledged"),
        Ok(BookMutation::Ignored) => trace!(venue, "frame ignored"),
        Ok(mutation) => {
            // book lock released before the listener reads every venue
            let changed = shared.book.lock().apply(&mutation);
            if changed {
                shared.state.send_if_modified(|s| {
                    let first = *s != ConnectionState::Streaming;
                    *s = ConnectionState::Streaming;
                    first
                });
                shared.listener.on_venue_book_changed(venue);
            }
        }
        Err(e) => {
            metrics::counter!(telemetry::PARSE_ERRORS_TOTAL, "venue" => venue).increment(1);
            warn!(venue, error = %e, "dropping unparseable frame");
        }
    }
}
