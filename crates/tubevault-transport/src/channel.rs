//! Self-healing activity channel.
//!
//! One background task owns the connection. It connects, forwards decoded
//! events to a handler, sends a keepalive `ping` on a fixed interval, and on
//! any disconnect waits a fixed delay before connecting again. Only
//! [`ActivityChannel::close`] stops it.
//!
//! ```text
//!  open ─▶ Connecting ─ok─▶ Connected ─close/error─▶ Disconnected
//!              ▲   └─fail─────────────────────────────────┘ │
//!              └──────────────── reconnect delay ───────────┘
//!  close() from any state ─▶ Closed
//! ```

use crate::traits::{Connection, Connector};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use tubevault_protocol::{codec, ActivityEvent, Inbound, PING};

/// Default keepalive interval.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(25);

/// Default delay before reconnecting.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Activity channel configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Interval between keepalive pings while connected. Zero disables
    /// the keepalive.
    pub ping_interval: Duration,
    /// Fixed delay between a disconnect and the next attempt.
    pub reconnect_delay: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Connection state of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    Connecting,
    Connected,
    Disconnected,
    /// Terminal; reached only through [`ActivityChannel::close`].
    Closed,
}

impl ChannelState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::Connecting => "connecting",
            ChannelState::Connected => "connected",
            ChannelState::Disconnected => "disconnected",
            ChannelState::Closed => "closed",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a running activity channel.
///
/// Dropping the handle stops the channel as if [`close`](Self::close) had
/// been called.
pub struct ActivityChannel {
    url: String,
    state_rx: watch::Receiver<ChannelState>,
    shutdown_tx: watch::Sender<bool>,
    reconnects: Arc<AtomicU64>,
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl ActivityChannel {
    /// Open a channel to `url` and start connecting immediately.
    ///
    /// `handler` is called on the channel task for every event.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn open<C, H>(url: impl Into<String>, connector: C, config: ChannelConfig, handler: H) -> Self
    where
        C: Connector + 'static,
        H: Fn(ActivityEvent) + Send + Sync + 'static,
    {
        let url = url.into();
        let (state_tx, state_rx) = watch::channel(ChannelState::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reconnects = Arc::new(AtomicU64::new(0));

        info!(url = %url, connector = connector.name(), "Opening activity channel");

        let task = tokio::spawn(run(Worker {
            url: url.clone(),
            connector,
            config,
            handler,
            state_tx,
            shutdown_rx,
            reconnects: Arc::clone(&reconnects),
        }));

        Self {
            url,
            state_rx,
            shutdown_tx,
            reconnects,
            task: parking_lot::Mutex::new(Some(task)),
        }
    }

    /// Endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    /// Current state.
    #[must_use]
    pub fn current_state(&self) -> ChannelState {
        *self.state_rx.borrow()
    }

    /// Number of reconnect attempts made so far.
    #[must_use]
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Stop the channel. Calling it again has no effect.
    pub fn close(&self) {
        let first = self.shutdown_tx.send_if_modified(|closed| !std::mem::replace(closed, true));
        if first {
            info!(url = %self.url, "Closing activity channel");
        }
    }

    /// Close and wait for the channel task to finish.
    pub async fn shutdown(&self) {
        self.close();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Activity channel task failed");
            }
        }
    }
}

impl Drop for ActivityChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for ActivityChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityChannel")
            .field("url", &self.url)
            .field("state", &self.current_state())
            .field("reconnects", &self.reconnects())
            .finish()
    }
}

struct Worker<C, H> {
    url: String,
    connector: C,
    config: ChannelConfig,
    handler: H,
    state_tx: watch::Sender<ChannelState>,
    shutdown_rx: watch::Receiver<bool>,
    reconnects: Arc<AtomicU64>,
}

/// Why a live connection ended.
enum Ended {
    Shutdown,
    Lost,
}

async fn run<C, H>(mut worker: Worker<C, H>)
where
    C: Connector,
    H: Fn(ActivityEvent) + Send + Sync,
{
    loop {
        worker.state_tx.send_replace(ChannelState::Connecting);

        let attempt = tokio::select! {
            biased;
            () = closed(&mut worker.shutdown_rx) => break,
            result = worker.connector.connect(&worker.url) => result,
        };

        match attempt {
            Ok(conn) => {
                worker.state_tx.send_replace(ChannelState::Connected);
                info!(url = %worker.url, "Activity channel connected");
                if let Ended::Shutdown = serve(&mut worker, conn).await {
                    break;
                }
            }
            Err(e) => warn!(url = %worker.url, error = %e, "Activity channel connect failed"),
        }

        worker.state_tx.send_replace(ChannelState::Disconnected);
        debug!(delay = ?worker.config.reconnect_delay, "Scheduling reconnect");

        tokio::select! {
            biased;
            () = closed(&mut worker.shutdown_rx) => break,
            () = time::sleep(worker.config.reconnect_delay) => {}
        }
        worker.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    worker.state_tx.send_replace(ChannelState::Closed);
    debug!(url = %worker.url, "Activity channel closed");
}

async fn serve<C, H>(worker: &mut Worker<C, H>, mut conn: Box<dyn Connection>) -> Ended
where
    H: Fn(ActivityEvent),
{
    let mut ticker = keepalive(worker.config.ping_interval);

    let ended = loop {
        tokio::select! {
            biased;
            () = closed(&mut worker.shutdown_rx) => break Ended::Shutdown,
            () = tick(ticker.as_mut()) => {
                if let Err(e) = conn.send_text(PING).await {
                    debug!(error = %e, "Keepalive failed");
                    break Ended::Lost;
                }
                trace!("Sent keepalive");
            }
            message = conn.recv() => match message {
                Ok(Some(text)) => dispatch(&text, &worker.handler),
                Ok(None) => {
                    info!(url = %worker.url, "Activity channel closed by server");
                    break Ended::Lost;
                }
                Err(e) => {
                    warn!(url = %worker.url, error = %e, "Activity channel error");
                    break Ended::Lost;
                }
            },
        }
    };

    if let Err(e) = conn.close().await {
        debug!(error = %e, "Close failed");
    }
    ended
}

fn keepalive(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        debug!("Keepalive disabled");
        return None;
    }
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(interval)
}

/// Next keepalive tick; never resolves when the keepalive is disabled.
async fn tick(keepalive: Option<&mut Interval>) {
    match keepalive {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn dispatch<H: Fn(ActivityEvent)>(text: &str, handler: &H) {
    match codec::decode(text) {
        Ok(Inbound::Pong) => trace!("Received keepalive reply"),
        Ok(Inbound::Event(event)) => {
            trace!(kind = event.kind_str().unwrap_or("-"), "Received activity event");
            handler(event);
        }
        Err(e) => trace!(error = %e, "Dropping malformed activity payload"),
    }
}

/// Resolve once shutdown was requested or the handle was dropped.
async fn closed(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::TransportError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    enum Script {
        Text(String),
        HangUp,
        Fail,
    }

    /// Test-side end of a scripted connection.
    struct Remote {
        inbound: mpsc::UnboundedSender<Script>,
        sent: Arc<Mutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
        refuse_sends: Arc<AtomicBool>,
    }

    impl Remote {
        fn push(&self, text: &str) {
            let _ = self.inbound.send(Script::Text(text.to_string()));
        }

        fn hang_up(&self) {
            let _ = self.inbound.send(Script::HangUp);
        }

        /// Make the next read fail with a transport error.
        fn fail(&self) {
            let _ = self.inbound.send(Script::Fail);
        }

        /// Make every later write fail.
        fn refuse_sends(&self) {
            self.refuse_sends.store(true, Ordering::SeqCst);
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    struct ScriptedConnection {
        inbound: mpsc::UnboundedReceiver<Script>,
        sent: Arc<Mutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
        refuse_sends: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Connection for ScriptedConnection {
        async fn recv(&mut self) -> Result<Option<String>, TransportError> {
            match self.inbound.recv().await {
                Some(Script::Text(text)) => Ok(Some(text)),
                Some(Script::Fail) => Err(TransportError::ReceiveFailed("reset by peer".into())),
                Some(Script::HangUp) | None => Ok(None),
            }
        }

        async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
            if self.refuse_sends.load(Ordering::SeqCst) {
                return Err(TransportError::SendFailed("broken pipe".into()));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn is_open(&self) -> bool {
            !self.closed.load(Ordering::SeqCst)
        }
    }

    #[derive(Clone)]
    struct ScriptedConnector {
        attempts: Arc<AtomicUsize>,
        failures_left: Arc<AtomicUsize>,
        remotes: mpsc::UnboundedSender<Remote>,
    }

    impl ScriptedConnector {
        fn new(failures: usize) -> (Self, mpsc::UnboundedReceiver<Remote>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let connector = Self {
                attempts: Arc::new(AtomicUsize::new(0)),
                failures_left: Arc::new(AtomicUsize::new(failures)),
                remotes: tx,
            };
            (connector, rx)
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self, _url: &str) -> Result<Box<dyn Connection>, TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(TransportError::ConnectFailed("refused".into()));
            }

            let (tx, rx) = mpsc::unbounded_channel();
            let sent = Arc::new(Mutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let refuse_sends = Arc::new(AtomicBool::new(false));
            let _ = self.remotes.send(Remote {
                inbound: tx,
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
                refuse_sends: Arc::clone(&refuse_sends),
            });
            Ok(Box::new(ScriptedConnection {
                inbound: rx,
                sent,
                closed,
                refuse_sends,
            }))
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn open(connector: ScriptedConnector) -> (ActivityChannel, mpsc::UnboundedReceiver<ActivityEvent>) {
        open_with(connector, ChannelConfig::default())
    }

    fn open_with(
        connector: ScriptedConnector,
        config: ChannelConfig,
    ) -> (ActivityChannel, mpsc::UnboundedReceiver<ActivityEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = ActivityChannel::open(
            "ws://vault.test/api/jobs/ws",
            connector,
            config,
            move |event| {
                let _ = tx.send(event);
            },
        );
        (channel, rx)
    }

    async fn wait_for_state(channel: &ActivityChannel, state: ChannelState) {
        let mut rx = channel.state();
        rx.wait_for(|s| *s == state).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_are_forwarded() {
        let (connector, mut remotes) = ScriptedConnector::new(0);
        let (channel, mut events) = open(connector);

        let remote = remotes.recv().await.unwrap();
        wait_for_state(&channel, ChannelState::Connected).await;

        remote.push("pong");
        remote.push("{not json");
        remote.push(r#"{"type":"job_update","job":{"id":3,"status":"running"}}"#);

        let event = events.recv().await.unwrap();
        assert_eq!(event.kind_str(), Some("job_update"));
        assert_eq!(event.job().unwrap()["id"], 3);
        assert!(events.try_recv().is_err());

        channel.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_ping() {
        let (connector, mut remotes) = ScriptedConnector::new(0);
        let (channel, _events) = open(connector);
        let remote = remotes.recv().await.unwrap();

        time::sleep(Duration::from_secs(24)).await;
        assert!(remote.sent().is_empty());

        time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(remote.sent(), vec!["ping"]);

        time::sleep(Duration::from_secs(25)).await;
        assert_eq!(remote.sent(), vec!["ping", "ping"]);

        channel.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_exactly_one_reconnect_after_delay() {
        let (connector, mut remotes) = ScriptedConnector::new(0);
        let (channel, _events) = open(connector.clone());

        let first = remotes.recv().await.unwrap();
        wait_for_state(&channel, ChannelState::Connected).await;
        first.hang_up();
        wait_for_state(&channel, ChannelState::Disconnected).await;
        assert!(first.closed.load(Ordering::SeqCst));
        assert_eq!(connector.attempts(), 1);

        time::sleep(Duration::from_millis(2_900)).await;
        assert_eq!(connector.attempts(), 1);

        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(connector.attempts(), 2);
        assert_eq!(channel.reconnects(), 1);
        let _second = remotes.recv().await.unwrap();
        assert_eq!(channel.current_state(), ChannelState::Connected);

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(connector.attempts(), 2);

        channel.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_connect_retries() {
        let (connector, mut remotes) = ScriptedConnector::new(2);
        let start = Instant::now();
        let (channel, _events) = open(connector.clone());

        let _remote = remotes.recv().await.unwrap();
        assert_eq!(connector.attempts(), 3);
        assert_eq!(channel.reconnects(), 2);
        assert!(start.elapsed() >= Duration::from_secs(6));

        channel.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_pending_reconnect() {
        let (connector, mut remotes) = ScriptedConnector::new(0);
        let (channel, _events) = open(connector.clone());

        remotes.recv().await.unwrap().hang_up();
        wait_for_state(&channel, ChannelState::Disconnected).await;

        time::sleep(Duration::from_secs(1)).await;
        channel.shutdown().await;
        assert_eq!(channel.current_state(), ChannelState::Closed);

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(connector.attempts(), 1);
        assert_eq!(channel.reconnects(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_is_idempotent_and_closes_connection() {
        let (connector, mut remotes) = ScriptedConnector::new(0);
        let (channel, _events) = open(connector.clone());
        let remote = remotes.recv().await.unwrap();
        wait_for_state(&channel, ChannelState::Connected).await;

        channel.close();
        channel.close();
        channel.shutdown().await;

        assert!(remote.closed.load(Ordering::SeqCst));
        assert_eq!(channel.current_state(), ChannelState::Closed);

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(connector.attempts(), 1);
    }

    async fn assert_single_reconnect(channel: &ActivityChannel, connector: &ScriptedConnector) {
        assert_eq!(connector.attempts(), 1);
        time::sleep(Duration::from_millis(2_900)).await;
        assert_eq!(connector.attempts(), 1);
        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(connector.attempts(), 2);
        assert_eq!(channel.reconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_error_closes_and_reconnects() {
        let (connector, mut remotes) = ScriptedConnector::new(0);
        let (channel, _events) = open(connector.clone());

        let first = remotes.recv().await.unwrap();
        wait_for_state(&channel, ChannelState::Connected).await;
        first.fail();
        wait_for_state(&channel, ChannelState::Disconnected).await;
        assert!(first.closed.load(Ordering::SeqCst));

        assert_single_reconnect(&channel, &connector).await;
        let _second = remotes.recv().await.unwrap();
        assert_eq!(channel.current_state(), ChannelState::Connected);

        channel.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_send_error_closes_and_reconnects() {
        let (connector, mut remotes) = ScriptedConnector::new(0);
        let (channel, _events) = open(connector.clone());

        let first = remotes.recv().await.unwrap();
        wait_for_state(&channel, ChannelState::Connected).await;
        first.refuse_sends();
        time::sleep(Duration::from_millis(25_100)).await;
        assert_eq!(channel.current_state(), ChannelState::Disconnected);
        assert!(first.closed.load(Ordering::SeqCst));
        assert!(first.sent().is_empty());

        assert_single_reconnect(&channel, &connector).await;
        let _second = remotes.recv().await.unwrap();

        channel.shutdown().await;
        assert_eq!(channel.current_state(), ChannelState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ping_interval_disables_keepalive() {
        let (connector, mut remotes) = ScriptedConnector::new(0);
        let config = ChannelConfig {
            ping_interval: Duration::ZERO,
            ..ChannelConfig::default()
        };
        let (channel, mut events) = open_with(connector.clone(), config);

        let first = remotes.recv().await.unwrap();
        wait_for_state(&channel, ChannelState::Connected).await;
        time::sleep(Duration::from_secs(120)).await;
        assert!(first.sent().is_empty());
        assert_eq!(channel.current_state(), ChannelState::Connected);

        first.push(r#"{"type":"cleanup"}"#);
        assert_eq!(events.recv().await.unwrap().kind_str(), Some("cleanup"));

        first.hang_up();
        wait_for_state(&channel, ChannelState::Disconnected).await;
        assert_single_reconnect(&channel, &connector).await;
        let _second = remotes.recv().await.unwrap();

        channel.shutdown().await;
        assert_eq!(channel.current_state(), ChannelState::Closed);
    }
}
