//! Persistent hub stream supervision.
//!
//! Picks an enrolled hub, keeps one WebSocket open to its event stream and
//! reconnects after every failure with a flat delay, until cancelled.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hyperion_node_config::{CredentialStore, PREFERRED_HUB_KEY, ServerRecord};

use crate::handler::{LoggingHandler, MessageHandler};
use crate::target::ConnectionTarget;
use crate::types::{ConnectionEvent, ConnectionState, HubSelection, ReconnectConfig};
use crate::ws_client::{Connector, WsClient, WsConnector, WsError};

/// Errors that keep the supervisor from starting.
///
/// Once a hub is selected nothing is fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SupervisorError {
    #[error("no hub configured; enroll with a hub first")]
    NoHubConfigured,

    #[error("hub '{0}' is not enrolled")]
    UnknownHub(String),
}

/// How a connected session ended.
enum SessionEnd {
    Cancelled,
    Lost,
}

/// Outcome of a single connection attempt.
enum Attempt {
    Connected(WsClient),
    Failed(WsError),
    Cancelled,
}

/// Keeps a single hub stream connection alive.
pub struct ConnectionSupervisor<C = WsConnector> {
    store: Arc<CredentialStore>,
    connector: C,
    handler: Arc<dyn MessageHandler>,
    reconnect_config: ReconnectConfig,
    state: Arc<RwLock<ConnectionState>>,
    events_tx: mpsc::Sender<ConnectionEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<ConnectionEvent>>>,
}

impl ConnectionSupervisor<WsConnector> {
    /// Creates a supervisor using real WebSocket connections and the
    /// logging message handler.
    pub fn new(store: Arc<CredentialStore>) -> Self {
        Self::with_connector(store, WsConnector, Arc::new(LoggingHandler))
    }
}

impl<C: Connector> ConnectionSupervisor<C> {
    /// Creates a supervisor with a custom connector and message handler.
    pub fn with_connector(
        store: Arc<CredentialStore>,
        connector: C,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        Self {
            store,
            connector,
            handler,
            reconnect_config: ReconnectConfig::default(),
            state: Arc::new(RwLock::new(ConnectionState::Idle)),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Replaces the message handler.
    pub fn with_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Overrides the retry timing.
    pub fn with_reconnect_config(mut self, config: ReconnectConfig) -> Self {
        self.reconnect_config = config;
        self
    }

    /// Takes the event receiver. Can only be called once.
    ///
    /// Events are dropped rather than delaying the loop when the receiver
    /// falls behind.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<ConnectionEvent>> {
        self.events_rx.lock().await.take()
    }

    /// Returns the current connection state.
    pub async fn state(&self) -> ConnectionState {
        self.state.read().await.clone()
    }

    /// Picks the hub to connect to.
    ///
    /// `Named` requires that hub to be enrolled. `Auto` uses the node's
    /// preferred hub setting when it names an enrolled hub, otherwise the
    /// most recently enrolled hub (ties go to the smallest name).
    pub fn select_target(&self, selection: &HubSelection) -> Result<ServerRecord, SupervisorError> {
        let records = self.store.get_all_servers();
        if records.is_empty() {
            return Err(SupervisorError::NoHubConfigured);
        }

        match selection {
            HubSelection::Named(name) => records
                .into_iter()
                .find(|r| &r.name == name)
                .ok_or_else(|| SupervisorError::UnknownHub(name.clone())),
            HubSelection::Auto => {
                let preferred: String = self.store.get_setting(PREFERRED_HUB_KEY, String::new());
                if !preferred.is_empty() {
                    if let Some(record) = records.iter().find(|r| r.name == preferred) {
                        return Ok(record.clone());
                    }
                    warn!(hub = %preferred, "preferred hub is not enrolled, picking latest enrollment");
                }
                records
                    .into_iter()
                    .max_by(|a, b| {
                        a.enrolled_at
                            .cmp(&b.enrolled_at)
                            .then_with(|| b.name.cmp(&a.name))
                    })
                    .ok_or(SupervisorError::NoHubConfigured)
            }
        }
    }

    /// Runs the connect / read / back off loop until `cancel` fires.
    ///
    /// Only target selection can fail; every connection error is logged
    /// and retried after the configured delay. Cancellation is honoured
    /// during the handshake, while waiting for messages, and during the
    /// delay, and always releases an open connection.
    pub async fn run(
        &self,
        selection: &HubSelection,
        cancel: CancellationToken,
    ) -> Result<(), SupervisorError> {
        let mut record = self.select_target(selection)?;
        let hub = record.name.clone();
        info!(hub = %hub, url = %record.url, "starting hub supervisor");

        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            let mut was_connected = false;
            record = self.refresh_record(record);
            self.set_state(&hub, ConnectionState::Connecting { attempt }).await;

            match self.connect_once(&record, attempt, &cancel).await {
                Attempt::Cancelled => break,
                Attempt::Failed(e) => {
                    warn!(hub = %hub, attempt, error = %e, "connection attempt failed");
                }
                Attempt::Connected(client) => {
                    was_connected = true;
                    self.set_state(&hub, ConnectionState::Connected).await;
                    info!(hub = %hub, "connected to hub stream");
                    match self.read_session(&hub, client, &cancel).await {
                        SessionEnd::Cancelled => break,
                        SessionEnd::Lost => warn!(hub = %hub, "hub stream closed"),
                    }
                }
            }

            let delay = self.reconnect_config.delay;
            let delay_secs = delay.as_secs_f64();
            self.set_state(&hub, ConnectionState::Backoff { attempt }).await;
            self.emit(ConnectionEvent::Reconnecting {
                hub: hub.clone(),
                attempt,
                next_retry_secs: delay_secs,
            });
            info!(hub = %hub, attempt, delay_secs, "reconnecting");

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(hub = %hub, "cancelled during backoff");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            // A session that got through the handshake starts a fresh count.
            if was_connected {
                attempt = 0;
            }
        }

        self.set_state(&hub, ConnectionState::Stopped).await;
        info!(hub = %hub, "hub supervisor stopped");
        Ok(())
    }

    /// Re-reads the selected record so a rotated credential is used.
    ///
    /// Keeps the previous record if the hub has disappeared from the store.
    fn refresh_record(&self, current: ServerRecord) -> ServerRecord {
        self.store.load();
        match self.store.get_server(&current.name) {
            Some(latest) => {
                if latest.credential != current.credential {
                    info!(hub = %latest.name, "using updated hub credential");
                }
                latest
            }
            None => {
                warn!(hub = %current.name, "hub no longer in store, keeping last known record");
                current
            }
        }
    }

    /// Derives the stream endpoint and performs one handshake.
    async fn connect_once(
        &self,
        record: &ServerRecord,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> Attempt {
        let target = match ConnectionTarget::from_record(record) {
            Ok(t) => t,
            Err(e) => return Attempt::Failed(e.into()),
        };
        if record.is_expired(Utc::now()) {
            warn!(hub = %record.name, expiry = ?record.expiry, "hub credential has expired");
        }
        debug!(hub = %record.name, url = %target, attempt, "connecting to hub stream");

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(hub = %record.name, "cancelled during handshake");
                Attempt::Cancelled
            }
            result = self.connector.connect(target.as_str()) => match result {
                Ok(client) => Attempt::Connected(client),
                Err(e) => Attempt::Failed(e),
            },
        }
    }

    /// Hands messages to the handler until the stream ends or `cancel` fires.
    async fn read_session(
        &self,
        hub: &str,
        mut client: WsClient,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(hub, "cancelled while connected, closing stream");
                    client.close().await;
                    return SessionEnd::Cancelled;
                }
                message = client.next_message() => message,
            };

            match message {
                Some(message) => self.handler.on_message(hub, message).await,
                None => return SessionEnd::Lost,
            }
        }
    }

    async fn set_state(&self, hub: &str, new_state: ConnectionState) {
        *self.state.write().await = new_state.clone();
        self.emit(ConnectionEvent::StateChanged {
            hub: hub.to_string(),
            state: new_state,
        });
    }

    fn emit(&self, event: ConnectionEvent) {
        if let Err(mpsc::error::TrySendError::Full(event)) = self.events_tx.try_send(event) {
            debug!(event = ?event, "event channel full, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use tokio::time::Instant;
    use tokio_tungstenite::tungstenite;

    use crate::handler::HandlerFuture;
    use crate::types::HubMessage;
    use crate::ws_client::ConnectFuture;
    use crate::ws_client::tests::{FrameTx, fake_client};

    /// Scripted outcome for one fake connection attempt.
    enum Script {
        Refuse,
        Hang,
        Accept(Vec<&'static str>),
    }

    /// Connector that replays a script and records each attempt.
    #[derive(Default)]
    struct FakeConnector {
        script: StdMutex<VecDeque<Script>>,
        attempts: StdMutex<Vec<(Instant, String)>>,
        open: StdMutex<Vec<FrameTx>>,
    }

    impl FakeConnector {
        fn new(script: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                script: StdMutex::new(script.into()),
                ..Self::default()
            })
        }

        fn attempts(&self) -> Vec<(Instant, String)> {
            self.attempts.lock().unwrap().clone()
        }

        fn all_released(&self) -> bool {
            self.open.lock().unwrap().iter().all(|tx| tx.is_closed())
        }
    }

    impl Connector for Arc<FakeConnector> {
        fn connect<'a>(&'a self, uri: &'a str) -> ConnectFuture<'a> {
            Box::pin(async move {
                self.attempts
                    .lock()
                    .unwrap()
                    .push((Instant::now(), uri.to_string()));
                // An exhausted script keeps the last connection open forever.
                let step = self
                    .script
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or(Script::Accept(Vec::new()));
                match step {
                    Script::Refuse => Err(WsError::Ws(tungstenite::Error::Io(
                        std::io::ErrorKind::ConnectionRefused.into(),
                    ))),
                    Script::Hang => std::future::pending().await,
                    Script::Accept(messages) => {
                        let (client, frames) = fake_client();
                        for m in messages {
                            let frame = match m {
                                "<close>" => tungstenite::Message::Close(None),
                                text => tungstenite::Message::Text(text.into()),
                            };
                            frames.send(Ok(frame)).await.unwrap();
                        }
                        self.open.lock().unwrap().push(frames);
                        Ok(client)
                    }
                }
            })
        }
    }

    /// Handler that records every message it sees.
    #[derive(Default)]
    struct RecordingHandler {
        seen: StdMutex<Vec<(String, HubMessage)>>,
    }

    impl MessageHandler for RecordingHandler {
        fn on_message<'a>(&'a self, hub: &'a str, message: HubMessage) -> HandlerFuture<'a> {
            Box::pin(async move {
                self.seen.lock().unwrap().push((hub.to_string(), message));
            })
        }
    }

    fn test_store() -> (tempfile::TempDir, Arc<CredentialStore>) {
        let tmp = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(tmp.path().join("config.toml")).unwrap();
        (tmp, Arc::new(store))
    }

    fn enroll(store: &CredentialStore, name: &str, url: &str, credential: &str) {
        store
            .add_server(ServerRecord::new(name, url, credential, None))
            .unwrap();
    }

    fn supervisor(
        store: Arc<CredentialStore>,
        connector: Arc<FakeConnector>,
    ) -> (Arc<ConnectionSupervisor<Arc<FakeConnector>>>, Arc<RecordingHandler>) {
        let handler = Arc::new(RecordingHandler::default());
        let sup = ConnectionSupervisor::with_connector(store, connector, handler.clone());
        (Arc::new(sup), handler)
    }

    /// Waits until the supervisor emits `state`.
    async fn wait_for_state(
        events: &mut mpsc::Receiver<ConnectionEvent>,
        state: ConnectionState,
    ) -> Vec<ConnectionState> {
        let mut seen = Vec::new();
        while let Some(event) = events.recv().await {
            if let ConnectionEvent::StateChanged { state: s, .. } = event {
                seen.push(s.clone());
                if s == state {
                    break;
                }
            }
        }
        seen
    }

    #[tokio::test]
    async fn no_hub_configured() {
        let (_tmp, store) = test_store();
        let (sup, _) = supervisor(store, FakeConnector::new(Vec::new()));

        let result = sup.run(&HubSelection::Auto, CancellationToken::new()).await;
        assert_eq!(result, Err(SupervisorError::NoHubConfigured));
        assert_eq!(sup.state().await, ConnectionState::Idle);
    }

    #[tokio::test]
    async fn unknown_named_hub() {
        let (_tmp, store) = test_store();
        enroll(&store, "alpha", "http://a.example", "tok");
        let (sup, _) = supervisor(store, FakeConnector::new(Vec::new()));

        let result = sup.select_target(&HubSelection::Named("beta".into()));
        assert_eq!(result, Err(SupervisorError::UnknownHub("beta".into())));
    }

    #[tokio::test]
    async fn auto_selection_prefers_setting_then_latest() {
        let (_tmp, store) = test_store();
        enroll(&store, "zeta", "http://z.example", "tok");
        std::thread::sleep(Duration::from_millis(5));
        enroll(&store, "alpha", "http://a.example", "tok");
        let (sup, _) = supervisor(store.clone(), FakeConnector::new(Vec::new()));

        let picked = sup.select_target(&HubSelection::Auto).unwrap();
        assert_eq!(picked.name, "alpha");

        store.set_setting(PREFERRED_HUB_KEY, "zeta").unwrap();
        let picked = sup.select_target(&HubSelection::Auto).unwrap();
        assert_eq!(picked.name, "zeta");

        store.set_setting(PREFERRED_HUB_KEY, "gone").unwrap();
        let picked = sup.select_target(&HubSelection::Auto).unwrap();
        assert_eq!(picked.name, "alpha");

        let picked = sup.select_target(&HubSelection::Named("zeta".into())).unwrap();
        assert_eq!(picked.name, "zeta");
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_connected_with_fixed_delay() {
        let (_tmp, store) = test_store();
        enroll(&store, "hub", "https://hub.example:443", "tok");
        let connector = FakeConnector::new(vec![
            Script::Refuse,
            Script::Refuse,
            Script::Refuse,
            Script::Accept(Vec::new()),
        ]);
        let (sup, _) = supervisor(store, connector.clone());
        let mut events = sup.take_events().await.unwrap();

        let cancel = CancellationToken::new();
        let run = tokio::spawn({
            let sup = sup.clone();
            let cancel = cancel.clone();
            async move { sup.run(&HubSelection::Auto, cancel).await }
        });

        let states = wait_for_state(&mut events, ConnectionState::Connected).await;
        assert_eq!(
            states,
            vec![
                ConnectionState::Connecting { attempt: 1 },
                ConnectionState::Backoff { attempt: 1 },
                ConnectionState::Connecting { attempt: 2 },
                ConnectionState::Backoff { attempt: 2 },
                ConnectionState::Connecting { attempt: 3 },
                ConnectionState::Backoff { attempt: 3 },
                ConnectionState::Connecting { attempt: 4 },
                ConnectionState::Connected,
            ]
        );

        let attempts = connector.attempts();
        assert_eq!(attempts.len(), 4);
        for pair in attempts.windows(2) {
            let gap = pair[1].0 - pair[0].0;
            assert!(gap >= Duration::from_secs(10) && gap < Duration::from_secs(11), "gap {gap:?}");
        }
        for (_, uri) in &attempts {
            assert!(uri.starts_with("wss://hub.example/"));
            assert!(uri.ends_with("token=tok"));
        }

        cancel.cancel();
        assert_eq!(run.await.unwrap(), Ok(()));
        assert_eq!(sup.state().await, ConnectionState::Stopped);
        assert!(connector.all_released());
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_stream_closes() {
        let (_tmp, store) = test_store();
        enroll(&store, "hub", "http://hub.example:2468", "tok");
        let connector = FakeConnector::new(vec![
            Script::Accept(vec!["one", "two", "<close>"]),
            Script::Accept(vec!["three"]),
        ]);
        let (sup, handler) = supervisor(store, connector.clone());
        let mut events = sup.take_events().await.unwrap();

        let cancel = CancellationToken::new();
        let run = tokio::spawn({
            let sup = sup.clone();
            let cancel = cancel.clone();
            async move { sup.run(&HubSelection::Auto, cancel).await }
        });

        wait_for_state(&mut events, ConnectionState::Connected).await;
        wait_for_state(&mut events, ConnectionState::Connected).await;
        while handler.seen.lock().unwrap().len() < 3 {
            tokio::task::yield_now().await;
        }

        let seen: Vec<_> = handler.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                ("hub".to_string(), HubMessage::Text("one".into())),
                ("hub".to_string(), HubMessage::Text("two".into())),
                ("hub".to_string(), HubMessage::Text("three".into())),
            ]
        );
        let attempts = connector.attempts();
        assert_eq!(attempts.len(), 2);
        let gap = attempts[1].0 - attempts[0].0;
        assert!(gap >= Duration::from_secs(10) && gap < Duration::from_secs(11), "gap {gap:?}");

        cancel.cancel();
        assert_eq!(run.await.unwrap(), Ok(()));
        assert!(connector.all_released());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_backoff_returns_promptly() {
        let (_tmp, store) = test_store();
        enroll(&store, "hub", "http://hub.example", "tok");
        let connector = FakeConnector::new(vec![Script::Accept(vec!["<close>"])]);
        let (sup, _) = supervisor(store, connector.clone());
        let mut events = sup.take_events().await.unwrap();

        let cancel = CancellationToken::new();
        let run = tokio::spawn({
            let sup = sup.clone();
            let cancel = cancel.clone();
            async move { sup.run(&HubSelection::Auto, cancel).await }
        });

        wait_for_state(&mut events, ConnectionState::Backoff { attempt: 1 }).await;
        let started = Instant::now();
        cancel.cancel();

        assert_eq!(run.await.unwrap(), Ok(()));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(connector.attempts().len(), 1);
        assert!(connector.all_released());
        assert_eq!(sup.state().await, ConnectionState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_handshake_returns_promptly() {
        let (_tmp, store) = test_store();
        enroll(&store, "hub", "http://hub.example", "tok");
        let connector = FakeConnector::new(vec![Script::Hang]);
        let (sup, _) = supervisor(store, connector.clone());
        let mut events = sup.take_events().await.unwrap();

        let cancel = CancellationToken::new();
        let run = tokio::spawn({
            let sup = sup.clone();
            let cancel = cancel.clone();
            async move { sup.run(&HubSelection::Auto, cancel).await }
        });

        wait_for_state(&mut events, ConnectionState::Connecting { attempt: 1 }).await;
        while connector.attempts().is_empty() {
            tokio::task::yield_now().await;
        }
        let started = Instant::now();
        cancel.cancel();

        assert_eq!(run.await.unwrap(), Ok(()));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(connector.attempts().len(), 1);
        assert_eq!(sup.state().await, ConnectionState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_while_connected_closes_stream() {
        let (_tmp, store) = test_store();
        enroll(&store, "hub", "http://hub.example", "tok");
        let connector = FakeConnector::new(vec![Script::Accept(Vec::new())]);
        let (sup, _) = supervisor(store, connector.clone());
        let mut events = sup.take_events().await.unwrap();

        let cancel = CancellationToken::new();
        let run = tokio::spawn({
            let sup = sup.clone();
            let cancel = cancel.clone();
            async move { sup.run(&HubSelection::Auto, cancel).await }
        });

        wait_for_state(&mut events, ConnectionState::Connected).await;
        assert!(!connector.all_released());

        cancel.cancel();
        assert_eq!(run.await.unwrap(), Ok(()));
        assert!(connector.all_released());
    }

    #[tokio::test(start_paused = true)]
    async fn picks_up_rotated_credential() {
        let (_tmp, store) = test_store();
        enroll(&store, "hub", "http://hub.example", "old");
        let connector = FakeConnector::new(vec![Script::Refuse, Script::Accept(Vec::new())]);
        let (sup, _) = supervisor(store.clone(), connector.clone());
        let mut events = sup.take_events().await.unwrap();

        let cancel = CancellationToken::new();
        let run = tokio::spawn({
            let sup = sup.clone();
            let cancel = cancel.clone();
            async move { sup.run(&HubSelection::Auto, cancel).await }
        });

        wait_for_state(&mut events, ConnectionState::Backoff { attempt: 1 }).await;
        assert!(store.remove_server("hub").unwrap());
        enroll(&store, "hub", "http://hub.example", "new");

        wait_for_state(&mut events, ConnectionState::Connected).await;
        let attempts = connector.attempts();
        assert!(attempts[0].1.ends_with("token=old"));
        assert!(attempts[1].1.ends_with("token=new"));

        cancel.cancel();
        assert_eq!(run.await.unwrap(), Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_stored_url_is_retried_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        let doc = r#"
version = 1

[servers.hub]
name = "hub"
url = "ftp://hub.example"
credential = "tok"
enrolled_at = "2026-01-01T00:00:00Z"
"#;
        std::fs::write(&path, doc).unwrap();
        let store = Arc::new(CredentialStore::open(&path).unwrap());
        let connector = FakeConnector::new(Vec::new());
        let (sup, _) = supervisor(store, connector.clone());
        let mut events = sup.take_events().await.unwrap();

        let cancel = CancellationToken::new();
        let run = tokio::spawn({
            let sup = sup.clone();
            let cancel = cancel.clone();
            async move { sup.run(&HubSelection::Auto, cancel).await }
        });

        wait_for_state(&mut events, ConnectionState::Backoff { attempt: 2 }).await;
        cancel.cancel();
        assert_eq!(run.await.unwrap(), Ok(()));
        assert!(connector.attempts().is_empty());
    }

    #[tokio::test]
    async fn real_stream_retries_after_rejected_handshake() {
        use futures_util::{SinkExt, StreamExt};
        use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
        use tokio_tungstenite::tungstenite::http;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let _ = tokio_tungstenite::accept_hdr_async(stream, |_: &Request, _: Response| {
                Err(http::Response::builder().status(401).body(None).unwrap())
            })
            .await;

            let (stream, _) = listener.accept().await.unwrap();
            let mut seen_uri = String::new();
            let mut ws = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
                seen_uri = req.uri().to_string();
                Ok(resp)
            })
            .await
            .unwrap();
            ws.send(tungstenite::Message::Text("hello".into())).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_close() {
                    break;
                }
            }
            seen_uri
        });

        let (_tmp, store) = test_store();
        enroll(&store, "hub", &format!("http://{addr}/"), "tok");
        let handler = Arc::new(RecordingHandler::default());
        let sup = Arc::new(
            ConnectionSupervisor::new(store)
                .with_handler(handler.clone())
                .with_reconnect_config(ReconnectConfig {
                    delay: Duration::from_millis(50),
                }),
        );

        let cancel = CancellationToken::new();
        let run = tokio::spawn({
            let sup = sup.clone();
            let cancel = cancel.clone();
            async move { sup.run(&HubSelection::Auto, cancel).await }
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            while handler.seen.lock().unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("message delivered");
        assert_eq!(
            handler.seen.lock().unwrap()[0],
            ("hub".to_string(), HubMessage::Text("hello".into()))
        );

        cancel.cancel();
        assert_eq!(run.await.unwrap(), Ok(()));
        let seen_uri = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server saw close")
            .unwrap();
        assert_eq!(seen_uri, "/api/v1/node/stream?token=tok");
    }
}
