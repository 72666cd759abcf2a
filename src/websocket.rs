use crate::error::{AppError, AppResult};
use crate::models::{DealStatus, Notification, Profile};
use crate::services::{DealService, ProfileService};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::RwLock;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A subscribable feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Notifications addressed to one profile
    User(Uuid),
    /// Status changes of one deal
    Deal(Uuid),
}

impl Channel {
    /// Parse `user:{uuid}` or `deal:{uuid}`
    pub fn parse(raw: &str) -> Option<Self> {
        let (kind, id) = raw.split_once(':')?;
        let id = Uuid::parse_str(id.trim()).ok()?;
        match kind.trim() {
            "user" => Some(Channel::User(id)),
            "deal" => Some(Channel::Deal(id)),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::User(id) => write!(f, "user:{}", id),
            Channel::Deal(id) => write!(f, "deal:{}", id),
        }
    }
}

/// WebSocket message types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    #[serde(rename = "authenticate")]
    Authenticate { token: String },
    #[serde(rename = "subscribe")]
    Subscribe {
        channel: String, // "user:{profile_id}", "deal:{deal_id}"
    },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { channel: String },
    #[serde(rename = "notification")]
    Notification { notification: Notification },
    #[serde(rename = "deal_status_changed")]
    DealStatusChanged {
        deal_id: Uuid,
        from: DealStatus,
        to: DealStatus,
        timestamp: i64,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

/// A message addressed to one channel
#[derive(Debug, Clone)]
pub struct Envelope {
    pub channel: Channel,
    pub message: WsMessage,
}

/// WebSocket server for real-time updates
pub struct WebSocketServer {
    tx: broadcast::Sender<Envelope>,
    /// channel -> client IDs
    subscriptions: Arc<RwLock<HashMap<Channel, Vec<Uuid>>>>,
    /// client ID -> channels
    client_channels: Arc<RwLock<HashMap<Uuid, Vec<Channel>>>>,
}

impl WebSocketServer {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1000);

        Self {
            tx,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            client_channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Raw feed of every envelope, before per-client filtering
    pub fn feed(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    /// Publish to a channel. Dropped when nobody is subscribed to it.
    pub async fn publish(&self, channel: Channel, message: WsMessage) -> usize {
        let subscribers = {
            let subscriptions = self.subscriptions.read().await;
            subscriptions.get(&channel).map(Vec::len).unwrap_or(0)
        };

        if subscribers == 0 {
            return 0;
        }

        debug!("Publishing to {} subscribers on {}", subscribers, channel);
        if let Err(e) = self.tx.send(Envelope { channel, message }) {
            warn!("Failed to broadcast message: {}", e);
            return 0;
        }
        subscribers
    }

    pub async fn publish_notification(&self, notification: &Notification) -> usize {
        self.publish(
            Channel::User(notification.recipient_id),
            WsMessage::Notification {
                notification: notification.clone(),
            },
        )
        .await
    }

    pub async fn publish_deal_status(
        &self,
        deal_id: Uuid,
        from: DealStatus,
        to: DealStatus,
    ) -> usize {
        self.publish(
            Channel::Deal(deal_id),
            WsMessage::DealStatusChanged {
                deal_id,
                from,
                to,
                timestamp: chrono::Utc::now().timestamp(),
            },
        )
        .await
    }

    pub async fn subscribe(&self, client_id: Uuid, channel: Channel) {
        let mut subscriptions = self.subscriptions.write().await;
        let mut client_channels = self.client_channels.write().await;

        let subscribers = subscriptions.entry(channel).or_default();
        if !subscribers.contains(&client_id) {
            subscribers.push(client_id);
        }

        let channels = client_channels.entry(client_id).or_default();
        if !channels.contains(&channel) {
            channels.push(channel);
        }

        debug!("Client {} subscribed to {}", client_id, channel);
    }

    pub async fn unsubscribe(&self, client_id: Uuid, channel: Channel) {
        let mut subscriptions = self.subscriptions.write().await;
        let mut client_channels = self.client_channels.write().await;

        if let Some(subscribers) = subscriptions.get_mut(&channel) {
            subscribers.retain(|&id| id != client_id);
            if subscribers.is_empty() {
                subscriptions.remove(&channel);
            }
        }

        if let Some(channels) = client_channels.get_mut(&client_id) {
            channels.retain(|c| *c != channel);
        }

        debug!("Client {} unsubscribed from {}", client_id, channel);
    }

    /// Drop every subscription a client holds
    pub async fn disconnect(&self, client_id: Uuid) {
        let channels = {
            let mut client_channels = self.client_channels.write().await;
            client_channels.remove(&client_id).unwrap_or_default()
        };
        for channel in channels {
            self.unsubscribe(client_id, channel).await;
        }
    }

    pub async fn is_client_subscribed(&self, client_id: Uuid, channel: Channel) -> bool {
        let subscriptions = self.subscriptions.read().await;
        subscriptions
            .get(&channel)
            .map(|subscribers| subscribers.contains(&client_id))
            .unwrap_or(false)
    }

    pub async fn subscriber_count(&self, channel: Channel) -> usize {
        let subscriptions = self.subscriptions.read().await;
        subscriptions.get(&channel).map(Vec::len).unwrap_or(0)
    }

    /// Broadcast receivers currently open, one per live connection plus any feeds
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Handle a new WebSocket connection.
    ///
    /// The client must send `authenticate` first; afterwards it may subscribe to
    /// its own `user:` channel and to `deal:` channels for deals it can see.
    pub async fn handle_connection(
        &self,
        stream: tokio::net::TcpStream,
        profiles: Arc<ProfileService>,
        deals: Arc<DealService>,
    ) -> AppResult<()> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| AppError::Message(format!("WebSocket handshake failed: {}", e)))?;

        let (ws_sender, mut ws_receiver) = ws_stream.split();
        let mut rx = self.tx.subscribe();
        let client_id = Uuid::new_v4();

        info!("New WebSocket connection: {}", client_id);

        let ws_sender = Arc::new(tokio::sync::Mutex::new(ws_sender));
        send_json(
            &ws_sender,
            serde_json::json!({
                "type": "connected",
                "client_id": client_id.to_string(),
            }),
        )
        .await;

        let server = self.clone();
        let sender = ws_sender.clone();
        let forwarder = tokio::spawn(async move {
            loop {
                let envelope = match rx.recv().await {
                    Ok(envelope) => envelope,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Client {} lagged, skipped {} messages", client_id, skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if !server.is_client_subscribed(client_id, envelope.channel).await {
                    continue;
                }

                let json = match serde_json::to_string(&envelope.message) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        continue;
                    }
                };

                let mut sender = sender.lock().await;
                if let Err(e) = sender.send(Message::Text(json)).await {
                    debug!("Client {} gone: {}", client_id, e);
                    break;
                }
            }
        });

        let server = self.clone();
        tokio::spawn(async move {
            let mut viewer: Option<Profile> = None;

            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let reply = match serde_json::from_str::<WsMessage>(&text) {
                            Ok(WsMessage::Authenticate { token }) => {
                                match profiles.authenticate(&token).await {
                                    Ok(profile) => {
                                        let reply = serde_json::json!({
                                            "type": "authenticated",
                                            "profile_id": profile.id.to_string(),
                                        });
                                        viewer = Some(profile);
                                        reply
                                    }
                                    Err(_) => error_reply("Invalid access token"),
                                }
                            }
                            Ok(WsMessage::Subscribe { channel }) => {
                                match authorize_subscription(viewer.as_ref(), &channel, &deals).await
                                {
                                    Ok(parsed) => {
                                        server.subscribe(client_id, parsed).await;
                                        serde_json::json!({ "type": "subscribed", "channel": channel })
                                    }
                                    Err(message) => error_reply(message),
                                }
                            }
                            Ok(WsMessage::Unsubscribe { channel }) => match Channel::parse(&channel) {
                                Some(parsed) => {
                                    server.unsubscribe(client_id, parsed).await;
                                    serde_json::json!({ "type": "unsubscribed", "channel": channel })
                                }
                                None => error_reply("Unknown channel"),
                            },
                            Ok(_) => {
                                warn!("Unexpected message type from client {}", client_id);
                                error_reply("Unsupported message type")
                            }
                            Err(_) => {
                                warn!("Failed to parse message from client {}: {}", client_id, text);
                                error_reply("Invalid message format")
                            }
                        };
                        send_json(&ws_sender, reply).await;
                    }
                    Ok(Message::Close(_)) => {
                        info!("WebSocket connection closed: {}", client_id);
                        break;
                    }
                    Err(e) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            server.disconnect(client_id).await;
            // the forwarder holds a broadcast receiver until it is stopped
            forwarder.abort();
        });

        Ok(())
    }
}

type WsSink = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    Message,
>;

async fn send_json(sender: &Arc<tokio::sync::Mutex<WsSink>>, value: serde_json::Value) {
    let mut sender = sender.lock().await;
    if let Err(e) = sender.send(Message::Text(value.to_string())).await {
        warn!("Failed to send reply: {}", e);
    }
}

fn error_reply(message: &str) -> serde_json::Value {
    serde_json::json!({ "type": "error", "message": message })
}

/// Channel check plus, for deal channels, the same visibility rule as the REST API
async fn authorize_subscription(
    viewer: Option<&Profile>,
    raw: &str,
    deals: &DealService,
) -> Result<Channel, &'static str> {
    let channel = authorize_channel(viewer.map(|p| p.id), raw)?;
    if let (Channel::Deal(deal_id), Some(profile)) = (channel, viewer) {
        if deals.find_visible(profile, deal_id).await.is_err() {
            return Err("Deal not found");
        }
    }
    Ok(channel)
}

/// Decide whether a connection may subscribe to a channel
fn authorize_channel(profile_id: Option<Uuid>, raw: &str) -> Result<Channel, &'static str> {
    let profile_id = profile_id.ok_or("Authenticate before subscribing")?;
    match Channel::parse(raw).ok_or("Unknown channel")? {
        Channel::User(id) if id != profile_id => Err("Cannot subscribe to another user's channel"),
        channel => Ok(channel),
    }
}

impl Clone for WebSocketServer {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            subscriptions: Arc::clone(&self.subscriptions),
            client_channels: Arc::clone(&self.client_channels),
        }
    }
}

impl Default for WebSocketServer {
    fn default() -> Self {
        Self::new()
    }
}
