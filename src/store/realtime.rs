use anyhow::{Context, Result, anyhow};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::StoreConfig;

/// One backend-originated table change. The payload is never inspected
/// downstream; any variant triggers the same full re-fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteChange {
    Inserted,
    Updated,
    Deleted,
}

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Push-notification channel to the hosted store. Speaks the Phoenix
/// channel protocol: one `phx_join` for the table topic, periodic
/// heartbeats, `postgres_changes` frames in.
///
/// The connection is established once at startup; reconnection is the
/// caller's concern.
pub struct RealtimeClient {
    socket_url: Url,
    topic: String,
    table: String,
    schema: String,
}

impl RealtimeClient {
    pub fn new(store: &StoreConfig) -> Result<Self> {
        let mut socket_url = Url::parse(&store.url).context("invalid store url")?;
        let scheme = match socket_url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => return Err(anyhow!("unsupported store url scheme {other}")),
        };
        socket_url
            .set_scheme(scheme)
            .map_err(|_| anyhow!("cannot derive websocket scheme for {}", store.url))?;
        socket_url.set_path("/realtime/v1/websocket");
        socket_url.set_query(Some(&format!("apikey={}&vsn=1.0.0", store.key)));

        Ok(Self {
            socket_url,
            topic: format!("realtime:{}:{}", store.schema, store.table),
            table: store.table.clone(),
            schema: store.schema.clone(),
        })
    }

    /// Opens the channel and spawns the long-lived listening task; every
    /// received table change invokes `on_change`. When the connection drops
    /// the task logs and ends.
    pub async fn subscribe<F>(&self, on_change: F) -> Result<RealtimeHandle>
    where
        F: Fn(RemoteChange) + Send + 'static,
    {
        let (mut socket, _) = tokio_tungstenite::connect_async(self.socket_url.as_str())
            .await
            .context("realtime connection failed")?;

        socket
            .send(Message::text(self.join_message()))
            .await
            .context("realtime channel join failed")?;

        info!(topic = %self.topic, "subscribed to remote catalog changes");

        let task = tokio::spawn(async move {
            let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
            heartbeat.tick().await;
            let mut heartbeat_ref: u64 = 1;

            loop {
                tokio::select! {
                    _ = heartbeat.tick() => {
                        heartbeat_ref += 1;
                        if let Err(err) = socket.send(Message::text(heartbeat_message(heartbeat_ref))).await {
                            warn!("realtime heartbeat failed: {err}");
                            break;
                        }
                    }
                    incoming = socket.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                if let Some(change) = classify_message(text.as_str()) {
                                    debug!(?change, "remote catalog change");
                                    on_change(change);
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                info!("realtime channel closed");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(err)) => {
                                warn!("realtime channel error: {err}");
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(RealtimeHandle { task })
    }

    fn join_message(&self) -> String {
        json!({
            "topic": self.topic,
            "event": "phx_join",
            "ref": "1",
            "payload": {
                "config": {
                    "postgres_changes": [
                        { "event": "*", "schema": self.schema, "table": self.table }
                    ]
                }
            }
        })
        .to_string()
    }
}

fn heartbeat_message(reference: u64) -> String {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "ref": reference.to_string(),
        "payload": {}
    })
    .to_string()
}

/// Classifies one frame from the realtime socket. Heartbeat replies and
/// channel bookkeeping yield `None`.
fn classify_message(raw: &str) -> Option<RemoteChange> {
    let message: Value = serde_json::from_str(raw).ok()?;
    if message.get("event")?.as_str()? != "postgres_changes" {
        return None;
    }

    let kind = message.get("payload")?.get("data")?.get("type")?.as_str()?;
    match kind {
        "INSERT" => Some(RemoteChange::Inserted),
        "UPDATE" => Some(RemoteChange::Updated),
        "DELETE" => Some(RemoteChange::Deleted),
        other => {
            warn!(change = other, "unrecognized remote change type");
            None
        }
    }
}

/// Handle to the listening task.
pub struct RealtimeHandle {
    task: JoinHandle<()>,
}

impl RealtimeHandle {
    pub fn shutdown(self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;

    fn change_frame(kind: &str) -> String {
        json!({
            "topic": "realtime:public:items",
            "event": "postgres_changes",
            "ref": null,
            "payload": {
                "ids": [1],
                "data": {
                    "type": kind,
                    "schema": "public",
                    "table": "items",
                    "commit_timestamp": "2024-01-01T00:00:00Z"
                }
            }
        })
        .to_string()
    }

    #[test]
    fn classifies_table_change_frames() {
        assert_eq!(
            classify_message(&change_frame("INSERT")),
            Some(RemoteChange::Inserted)
        );
        assert_eq!(
            classify_message(&change_frame("UPDATE")),
            Some(RemoteChange::Updated)
        );
        assert_eq!(
            classify_message(&change_frame("DELETE")),
            Some(RemoteChange::Deleted)
        );
    }

    #[test]
    fn ignores_channel_bookkeeping() {
        let reply = json!({
            "topic": "realtime:public:items",
            "event": "phx_reply",
            "ref": "1",
            "payload": { "status": "ok", "response": {} }
        })
        .to_string();
        assert_eq!(classify_message(&reply), None);

        let heartbeat_reply = json!({
            "topic": "phoenix",
            "event": "phx_reply",
            "ref": "2",
            "payload": { "status": "ok", "response": {} }
        })
        .to_string();
        assert_eq!(classify_message(&heartbeat_reply), None);
    }

    #[test]
    fn ignores_malformed_frames() {
        assert_eq!(classify_message("not json"), None);
        assert_eq!(classify_message("{}"), None);
        assert_eq!(classify_message(&change_frame("TRUNCATE")), None);
    }

    #[test]
    fn socket_url_derives_from_store_url() {
        let store = StoreConfig {
            url: "https://example.supabase.co".to_string(),
            key: "anon".to_string(),
            table: "items".to_string(),
            schema: "public".to_string(),
        };

        let client = RealtimeClient::new(&store).unwrap();
        assert_eq!(
            client.socket_url.as_str(),
            "wss://example.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
        assert_eq!(client.topic, "realtime:public:items");
    }

    #[test]
    fn rejects_non_http_store_urls() {
        let store = StoreConfig {
            url: "ftp://example.com".to_string(),
            key: "anon".to_string(),
            table: "items".to_string(),
            schema: "public".to_string(),
        };

        assert!(RealtimeClient::new(&store).is_err());
    }
}
