//! obs-websocket 4.x over a plain websocket.
//!
//! Requests carry a `message-id`; a background reader routes replies back to
//! the waiting caller and queues `update-type` events for
//! [`ObsLink::poll_event`].

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use config::ObsConfig;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use keypad_engine::{Connector, Error, Result};
use parking_lot::Mutex;
use serde_json::{Map, Value as Json, json};
use tokio::{
    net::TcpStream,
    sync::{self, mpsc, oneshot},
    task::JoinHandle,
    time::timeout,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};

use crate::{
    auth::auth_response,
    link::{ObsEvent, ObsLink},
    session::ObsSession,
};

/// Underlying websocket stream type.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Replies awaited by callers, keyed by message id.
type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<Json>>>>;

/// A live obs-websocket connection.
pub struct WsLink {
    /// Next message id.
    next_id: AtomicU64,
    /// Callers waiting for replies.
    pending: Pending,
    /// Write half. An async mutex because sends are awaited.
    writer: sync::Mutex<SplitSink<WsStream, Message>>,
    /// Raw update messages from the reader.
    events: Mutex<mpsc::UnboundedReceiver<Json>>,
    /// Cleared by the reader when the socket ends.
    open: Arc<AtomicBool>,
    /// Per-request reply timeout.
    timeout: Duration,
    /// Background reader.
    reader: JoinHandle<()>,
}

impl WsLink {
    /// Connect to `ws://host:port` and authenticate if OBS asks for it.
    pub async fn connect(
        host: &str,
        port: u16,
        password: Option<&str>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let url = format!("ws://{host}:{port}");
        let (stream, _) = timeout(request_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| {
                Error::Connectivity(format!("{url}: connect timed out after {request_timeout:?}"))
            })?
            .map_err(|e| Error::Connectivity(format!("{url}: {e}")))?;
        let (writer, reader) = stream.split();

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let open = Arc::new(AtomicBool::new(true));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_loop(reader, pending.clone(), event_tx, open.clone()));

        let link = Self {
            next_id: AtomicU64::new(1),
            pending,
            writer: sync::Mutex::new(writer),
            events: Mutex::new(event_rx),
            open,
            timeout: request_timeout,
            reader,
        };
        link.authenticate(password).await?;
        info!(url = %url, "obs_connected");
        Ok(link)
    }

    /// Run the `GetAuthRequired` / `Authenticate` handshake when required.
    async fn authenticate(&self, password: Option<&str>) -> Result<()> {
        let reply = self.request("GetAuthRequired", json!({})).await?;
        if reply.get("authRequired").and_then(Json::as_bool) != Some(true) {
            return Ok(());
        }
        let password = password.ok_or_else(|| {
            Error::Connectivity("OBS requires a password but none is configured".to_string())
        })?;
        let field = |key: &str| {
            reply
                .get(key)
                .and_then(Json::as_str)
                .ok_or_else(|| Error::Connectivity(format!("auth reply is missing '{key}'")))
        };
        let auth = auth_response(password, field("salt")?, field("challenge")?);
        self.request("Authenticate", json!({ "auth": auth }))
            .await
            .map_err(|e| Error::Connectivity(format!("authentication failed: {e}")))?;
        debug!("obs_authenticated");
        Ok(())
    }

    /// Mark the link dead.
    fn mark_closed(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObsLink for WsLink {
    async fn request(&self, request_type: &str, fields: Json) -> Result<Json> {
        if !self.is_open() {
            return Err(Error::Connectivity("connection closed".to_string()));
        }
        let mut msg = match fields {
            Json::Object(m) => m,
            Json::Null => Map::new(),
            other => {
                return Err(Error::Execution(format!(
                    "request fields must be an object, got {other}"
                )));
            }
        };
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        msg.insert("request-type".to_string(), json!(request_type));
        msg.insert("message-id".to_string(), json!(id));

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id.clone(), tx);
        trace!(id = %id, request = %request_type, "obs_request");

        let sent = {
            let mut writer = self.writer.lock().await;
            writer
                .send(Message::Text(Json::Object(msg).to_string().into()))
                .await
        };
        if let Err(e) = sent {
            self.pending.lock().remove(&id);
            self.mark_closed();
            return Err(Error::Connectivity(format!("send {request_type}: {e}")));
        }

        let reply = match timeout(self.timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => {
                return Err(Error::Connectivity("connection closed".to_string()));
            }
            Err(_) => {
                self.pending.lock().remove(&id);
                self.mark_closed();
                return Err(Error::Connectivity(format!(
                    "{request_type} timed out after {:?}",
                    self.timeout
                )));
            }
        };

        match reply.get("status").and_then(Json::as_str) {
            Some("ok") => Ok(reply),
            _ => {
                let reason = reply
                    .get("error")
                    .and_then(Json::as_str)
                    .unwrap_or("request failed");
                Err(Error::Execution(format!("{request_type}: {reason}")))
            }
        }
    }

    fn poll_event(&self) -> Option<ObsEvent> {
        let mut events = self.events.lock();
        while let Ok(raw) = events.try_recv() {
            if let Some(ev) = ObsEvent::parse(&raw) {
                return Some(ev);
            }
        }
        None
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.mark_closed();
        if let Err(e) = self.writer.lock().await.close().await {
            debug!(error = %e, "obs_close_failed");
        }
        self.reader.abort();
    }
}

impl Drop for WsLink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Route replies to waiting callers and queue events until the socket ends.
async fn read_loop(
    mut reader: SplitStream<WsStream>,
    pending: Pending,
    events: mpsc::UnboundedSender<Json>,
    open: Arc<AtomicBool>,
) {
    while let Some(frame) = reader.next().await {
        let text = match frame {
            Ok(Message::Text(t)) => t.to_string(),
            Ok(Message::Close(_)) => {
                info!("obs_closed_by_remote");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "obs_read_failed");
                break;
            }
        };
        let msg: Json = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "obs_bad_json");
                continue;
            }
        };
        let id = msg
            .get("message-id")
            .and_then(Json::as_str)
            .map(str::to_string);
        if let Some(id) = id {
            let waiter = pending.lock().remove(&id);
            match waiter {
                Some(tx) => {
                    if tx.send(msg).is_err() {
                        trace!(id = %id, "obs_reply_unclaimed");
                    }
                }
                None => debug!(id = %id, "obs_reply_unknown_id"),
            }
        } else if msg.get("update-type").is_some() && events.send(msg).is_err() {
            break;
        }
    }
    open.store(false, Ordering::SeqCst);
    // Dropping the senders fails every caller still waiting.
    pending.lock().clear();
}

/// Opens [`WsLink`] sessions from configuration.
#[derive(Debug, Clone)]
pub struct WsConnector {
    /// Host running OBS.
    host: String,
    /// obs-websocket port.
    port: u16,
    /// Optional password.
    password: Option<String>,
    /// Per-request timeout.
    request_timeout: Duration,
}

impl WsConnector {
    /// Connector for the given settings.
    pub fn new(cfg: &ObsConfig) -> Self {
        Self {
            host: cfg.host.clone(),
            port: cfg.port,
            password: cfg.password.clone(),
            request_timeout: Duration::from_millis(cfg.request_timeout_ms),
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    type Session = ObsSession<WsLink>;

    async fn connect(&mut self) -> Result<Self::Session> {
        let link = WsLink::connect(
            &self.host,
            self.port,
            self.password.as_deref(),
            self.request_timeout,
        )
        .await?;
        Ok(ObsSession::new(link))
    }
}

#[cfg(test)]
mod tests {
    use tokio::{net::TcpListener, time::sleep};
    use tokio_tungstenite::accept_async;

    use super::*;

    const SALT: &str = "PZVbYpvAnZut2SS6JNJytDm9";
    const CHALLENGE: &str = "ztTBnnuqrqaKDzRM3xcVdbYm";

    /// Reply fields for a request, or `None` to leave it unanswered.
    type Responder = fn(&str, &Json) -> Option<Json>;

    /// Serve one obs-websocket client on a local port. Messages sent on the
    /// returned channel are pushed to the client as is.
    async fn fake_obs(respond: Responder) -> (u16, mpsc::UnboundedSender<Json>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (push_tx, mut push_rx) = mpsc::unbounded_channel::<Json>();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let (mut tx, mut rx) = accept_async(tcp).await.unwrap().split();
            loop {
                tokio::select! {
                    frame = rx.next() => {
                        let Some(Ok(Message::Text(text))) = frame else {
                            break;
                        };
                        let msg: Json = serde_json::from_str(text.as_str()).unwrap();
                        let kind = msg["request-type"].as_str().unwrap_or_default().to_string();
                        if let Some(mut reply) = respond(&kind, &msg) {
                            reply["message-id"] = msg["message-id"].clone();
                            let frame = Message::Text(reply.to_string().into());
                            if tx.send(frame).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(ev) = push_rx.recv() => {
                        if tx.send(Message::Text(ev.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
        (port, push_tx)
    }

    fn open_server(kind: &str, _msg: &Json) -> Option<Json> {
        match kind {
            "GetAuthRequired" => Some(json!({"status": "ok", "authRequired": false})),
            "GetVersion" => Some(json!({"status": "ok", "obs-websocket-version": "4.9.1"})),
            "Bad" => Some(json!({"status": "error", "error": "nope"})),
            _ => None,
        }
    }

    fn locked_server(kind: &str, msg: &Json) -> Option<Json> {
        match kind {
            "GetAuthRequired" => Some(json!({
                "status": "ok",
                "authRequired": true,
                "salt": SALT,
                "challenge": CHALLENGE,
            })),
            "Authenticate" => {
                let expected = auth_response("secret", SALT, CHALLENGE);
                if msg["auth"].as_str() == Some(expected.as_str()) {
                    Some(json!({"status": "ok"}))
                } else {
                    Some(json!({"status": "error", "error": "Authentication Failed."}))
                }
            }
            _ => Some(json!({"status": "ok"})),
        }
    }

    async fn connect(port: u16, password: Option<&str>) -> Result<WsLink> {
        WsLink::connect("127.0.0.1", port, password, Duration::from_millis(300)).await
    }

    #[tokio::test]
    async fn replies_are_matched_by_message_id() {
        let (port, _push) = fake_obs(open_server).await;
        let link = connect(port, None).await.unwrap();

        let reply = link.request("GetVersion", json!({})).await.unwrap();
        assert_eq!(reply["obs-websocket-version"], "4.9.1");
        assert_eq!(reply["message-id"], "2");

        match link.request("Bad", Json::Null).await {
            Err(Error::Execution(msg)) => assert_eq!(msg, "Bad: nope"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(link.is_open());
        link.close().await;
        assert!(!link.is_open());
    }

    #[tokio::test]
    async fn unanswered_request_times_out_and_closes_link() {
        let (port, _push) = fake_obs(open_server).await;
        let link = connect(port, None).await.unwrap();

        let err = link.request("Slow", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Connectivity(_)), "{err}");
        assert!(err.to_string().contains("timed out"), "{err}");
        assert!(!link.is_open());
        assert!(matches!(
            link.request("GetVersion", json!({})).await,
            Err(Error::Connectivity(_))
        ));
    }

    #[tokio::test]
    async fn pushed_updates_reach_poll_event() {
        let (port, push) = fake_obs(open_server).await;
        let link = connect(port, None).await.unwrap();
        assert_eq!(link.poll_event(), None);

        push.send(json!({"update-type": "Heartbeat"})).unwrap();
        push.send(json!({"update-type": "SwitchScenes", "scene-name": "Live"}))
            .unwrap();

        let mut got = None;
        for _ in 0..200 {
            got = link.poll_event();
            if got.is_some() {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(got, Some(ObsEvent::SceneSwitched("Live".into())));
    }

    #[tokio::test]
    async fn authenticates_with_challenge() {
        let (port, _push) = fake_obs(locked_server).await;
        let link = connect(port, Some("secret")).await.unwrap();
        link.request("GetVersion", json!({})).await.unwrap();
    }

    #[tokio::test]
    async fn wrong_or_missing_password_is_rejected() {
        let (port, _push) = fake_obs(locked_server).await;
        let err = connect(port, Some("wrong")).await.err().unwrap();
        assert!(err.to_string().contains("authentication failed"), "{err}");

        let (port, _push) = fake_obs(locked_server).await;
        let err = connect(port, None).await.err().unwrap();
        assert!(matches!(err, Error::Connectivity(_)), "{err}");
    }

    #[tokio::test]
    async fn stalled_handshake_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let hold = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            sleep(Duration::from_secs(30)).await;
            drop(tcp);
        });

        let err = connect(port, None).await.err().unwrap();
        assert!(matches!(err, Error::Connectivity(_)), "{err}");
        assert!(err.to_string().contains("connect timed out"), "{err}");
        hold.abort();
    }
}
