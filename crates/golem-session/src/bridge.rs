//! TCP bridge connector: newline-delimited JSON to an external game
//! protocol adapter.
//!
//! The adapter owns the actual game connection (login, physics,
//! pathfinding) and relays lifecycle/chat events and world-view
//! updates inbound, actions outbound. One JSON object per line, tagged
//! with `type`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};

use crate::{
    Identity, PlayerSighting, SessionAction, SessionConnector, SessionError, SessionEvent,
    SessionHandle, WorldView,
};

/// Connects to a protocol adapter listening on `addr`.
#[derive(Debug, Clone)]
pub struct BridgeConnector {
    addr: String,
    connect_timeout: Duration,
}

impl BridgeConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

impl SessionConnector for BridgeConnector {
    async fn connect(&self, identity: &Identity) -> Result<SessionHandle, SessionError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| SessionError::Timeout)??;

        let (reader, mut writer) = stream.into_split();

        let hello = WireAction::Hello {
            username: identity.username.clone(),
        };
        writer.write_all(encode_line(&hello)?.as_bytes()).await?;

        let (action_tx, mut action_rx) = mpsc::unbounded_channel::<SessionAction>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<SessionEvent>();
        let (view_tx, view_rx) = watch::channel(WorldView::default());

        // Reader: wire lines -> events + view updates.
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<WireInbound>(line) {
                            Ok(WireInbound::View {
                                world_time,
                                health,
                                players,
                            }) => {
                                let _ = view_tx.send(WorldView {
                                    world_time,
                                    health,
                                    players,
                                });
                            }
                            Ok(msg) => {
                                // into_event is total for non-View messages
                                if let Some(event) = msg.into_event()
                                    && event_tx.send(event).is_err()
                                {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::debug!("bridge: undecodable line: {e}");
                            }
                        }
                    }
                    Ok(None) => {
                        let _ = event_tx.send(SessionEvent::End);
                        break;
                    }
                    Err(e) => {
                        let _ = event_tx.send(SessionEvent::Error {
                            message: e.to_string(),
                        });
                        break;
                    }
                }
            }
        });

        // Writer: actions -> wire lines. Disconnect flushes and closes.
        tokio::spawn(async move {
            while let Some(action) = action_rx.recv().await {
                let disconnect = action == SessionAction::Disconnect;
                let line = match encode_line(&WireAction::from(action)) {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::debug!("bridge: encode failed: {e}");
                        continue;
                    }
                };
                if writer.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                if disconnect {
                    let _ = writer.shutdown().await;
                    break;
                }
            }
        });

        Ok(SessionHandle {
            actions: action_tx,
            events: event_rx,
            view: view_rx,
        })
    }
}

fn encode_line<T: Serialize>(value: &T) -> Result<String, SessionError> {
    let mut line = serde_json::to_string(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    line.push('\n');
    Ok(line)
}

// ─── Wire format ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireInbound {
    Login,
    Spawn,
    Death,
    Kicked {
        reason: String,
    },
    Error {
        message: String,
    },
    End,
    Chat {
        sender: String,
        text: String,
    },
    View {
        world_time: u32,
        health: f64,
        #[serde(default)]
        players: Vec<PlayerSighting>,
    },
}

impl WireInbound {
    fn into_event(self) -> Option<SessionEvent> {
        match self {
            Self::Login => Some(SessionEvent::Login),
            Self::Spawn => Some(SessionEvent::Spawn),
            Self::Death => Some(SessionEvent::Death),
            Self::Kicked { reason } => Some(SessionEvent::Kicked { reason }),
            Self::Error { message } => Some(SessionEvent::Error { message }),
            Self::End => Some(SessionEvent::End),
            Self::Chat { sender, text } => Some(SessionEvent::Chat { sender, text }),
            Self::View { .. } => None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireAction {
    Hello { username: String },
    Chat { text: String },
    LookAt { x: f64, y: f64, z: f64 },
    Look { yaw: f64, pitch: f64 },
    Disconnect,
}

impl From<SessionAction> for WireAction {
    fn from(action: SessionAction) -> Self {
        match action {
            SessionAction::Chat(text) => Self::Chat { text },
            SessionAction::LookAt(p) => Self::LookAt {
                x: p.x,
                y: p.y,
                z: p.z,
            },
            SessionAction::Look { yaw, pitch } => Self::Look { yaw, pitch },
            SessionAction::Disconnect => Self::Disconnect,
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn adapter() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        (listener, addr)
    }

    #[tokio::test]
    async fn hello_line_carries_identity() {
        let (listener, addr) = adapter().await;
        let connector = BridgeConnector::new(addr);

        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut lines = BufReader::new(stream).lines();
            lines.next_line().await.expect("read").expect("line")
        });

        let _handle = connector
            .connect(&Identity::new("Bastion"))
            .await
            .expect("connect");

        let hello = accept.await.expect("join");
        let parsed: serde_json::Value = serde_json::from_str(&hello).expect("json");
        assert_eq!(parsed["type"], "hello");
        assert_eq!(parsed["username"], "Bastion");
    }

    #[tokio::test]
    async fn inbound_lines_become_events_and_view_updates() {
        let (listener, addr) = adapter().await;
        let connector = BridgeConnector::new(addr);

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let payload = concat!(
                r#"{"type":"login"}"#,
                "\n",
                r#"{"type":"spawn"}"#,
                "\n",
                r#"{"type":"view","world_time":14000,"health":18.5}"#,
                "\n",
                r#"{"type":"chat","sender":"ada","text":"hi"}"#,
                "\n",
                r#"{"type":"kicked","reason":"too fast"}"#,
                "\n",
            );
            stream.write_all(payload.as_bytes()).await.expect("write");
            // keep the socket open so EOF does not race the assertions
            std::future::pending::<()>().await;
        });

        let mut handle = connector
            .connect(&Identity::new("Bastion"))
            .await
            .expect("connect");

        assert_eq!(handle.events.recv().await, Some(SessionEvent::Login));
        assert_eq!(handle.events.recv().await, Some(SessionEvent::Spawn));
        assert_eq!(
            handle.events.recv().await,
            Some(SessionEvent::Chat {
                sender: "ada".into(),
                text: "hi".into(),
            })
        );
        assert_eq!(
            handle.events.recv().await,
            Some(SessionEvent::Kicked {
                reason: "too fast".into(),
            })
        );

        let view = handle.view.borrow().clone();
        assert_eq!(view.world_time, 14_000);
        assert!((view.health - 18.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn undecodable_lines_are_skipped() {
        let (listener, addr) = adapter().await;
        let connector = BridgeConnector::new(addr);

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            stream
                .write_all(b"not json at all\n{\"type\":\"spawn\"}\n")
                .await
                .expect("write");
            std::future::pending::<()>().await;
        });

        let mut handle = connector
            .connect(&Identity::new("Bastion"))
            .await
            .expect("connect");

        assert_eq!(handle.events.recv().await, Some(SessionEvent::Spawn));
    }

    #[tokio::test]
    async fn actions_serialize_one_per_line() {
        let (listener, addr) = adapter().await;
        let connector = BridgeConnector::new(addr);

        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut lines = BufReader::new(stream).lines();
            let _hello = lines.next_line().await.expect("read");
            let mut out = Vec::new();
            for _ in 0..3 {
                out.push(lines.next_line().await.expect("read").expect("line"));
            }
            out
        });

        let handle = connector
            .connect(&Identity::new("Wraith"))
            .await
            .expect("connect");

        handle
            .actions
            .send(SessionAction::Chat("boo".into()))
            .expect("send");
        handle
            .actions
            .send(SessionAction::Look {
                yaw: 1.5,
                pitch: 0.0,
            })
            .expect("send");
        handle
            .actions
            .send(SessionAction::LookAt(crate::Vec3::new(1.0, 64.0, 2.0)))
            .expect("send");

        let out = accept.await.expect("join");
        let chat: serde_json::Value = serde_json::from_str(&out[0]).expect("json");
        assert_eq!(chat["type"], "chat");
        assert_eq!(chat["text"], "boo");
        let look: serde_json::Value = serde_json::from_str(&out[1]).expect("json");
        assert_eq!(look["type"], "look");
        let look_at: serde_json::Value = serde_json::from_str(&out[2]).expect("json");
        assert_eq!(look_at["type"], "look_at");
        assert_eq!(look_at["y"], 64.0);
    }

    #[tokio::test]
    async fn adapter_close_yields_end_event() {
        let (listener, addr) = adapter().await;
        let connector = BridgeConnector::new(addr);

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            drop(stream);
        });

        let mut handle = connector
            .connect(&Identity::new("Bastion"))
            .await
            .expect("connect");

        assert_eq!(handle.events.recv().await, Some(SessionEvent::End));
    }

    #[tokio::test]
    async fn connect_to_dead_adapter_fails_recoverably() {
        let (listener, addr) = adapter().await;
        drop(listener);

        let connector =
            BridgeConnector::new(addr).with_timeout(Duration::from_millis(500));
        let result = connector.connect(&Identity::new("Bastion")).await;
        assert!(matches!(
            result,
            Err(SessionError::Io(_) | SessionError::Timeout)
        ));
    }
}
