use std::{collections::HashMap, sync::Arc};

use arbor_api::{CommentNode, FeedMessage, Uuid};
use axum::extract::ws::Message;
use futures::{channel::mpsc, select, SinkExt, StreamExt};
use tokio::sync::RwLock;

/// One shared broadcast channel over every connected viewer. Publish is
/// fire-and-forget: there is no backlog, and a subscriber that connects
/// after a publish never sees it.
#[derive(Clone, Debug)]
pub struct CommentFeeds(Arc<RwLock<HashMap<Uuid, mpsc::UnboundedSender<FeedMessage>>>>);

impl CommentFeeds {
    pub fn new() -> CommentFeeds {
        CommentFeeds(Arc::new(RwLock::new(HashMap::new())))
    }

    pub async fn subscribe(&self) -> (Uuid, mpsc::UnboundedReceiver<FeedMessage>) {
        // Note: if this were bounded, there would be a deadlock between the
        // write-lock to remove a channel and the read-lock to send an event
        // to all live sockets
        let (sender, receiver) = mpsc::unbounded();
        let subscriber_id = Uuid::new_v4();
        self.0.write().await.insert(subscriber_id, sender);
        (subscriber_id, receiver)
    }

    pub async fn unsubscribe(&self, subscriber_id: Uuid) {
        self.0.write().await.remove(&subscriber_id);
    }

    #[cfg(test)]
    pub async fn subscriber_count(&self) -> usize {
        self.0.read().await.len()
    }

    /// Deliver a freshly persisted comment to every live subscriber, in
    /// publish order per subscriber. Failures never propagate to the
    /// submitting request; a closed endpoint is simply skipped.
    pub async fn publish(&self, comment: CommentNode) {
        let feeds = self.0.read().await;
        if feeds.is_empty() {
            tracing::debug!("new comment published with no live subscribers");
            return;
        }
        for sender in feeds.values() {
            if let Err(err) = sender.unbounded_send(FeedMessage::NewComment(comment.clone())) {
                tracing::warn!(?err, "skipping broadcast to closed feed");
            }
        }
    }

    /// Relay the shared feed over one websocket until either end goes
    /// away. Client `"ping"` text frames are answered with `Pong`.
    pub async fn add_socket<W, R>(self, mut write: W, read: R)
    where
        W: 'static + Send + Unpin + futures::Sink<Message>,
        <W as futures::Sink<Message>>::Error: Send,
        R: 'static + Send + Unpin + futures::Stream<Item = Result<Message, axum::Error>>,
    {
        let (subscriber_id, mut receiver) = self.subscribe().await;

        let this = self.clone();
        let mut read = read.fuse();
        tokio::spawn(async move {
            macro_rules! remove_self {
                () => {{
                    this.unsubscribe(subscriber_id).await;
                    return;
                }};
            }
            macro_rules! send_message {
                ( $msg:expr ) => {{
                    let msg: FeedMessage = $msg;
                    let json = match serde_json::to_vec(&msg) {
                        Ok(json) => json,
                        Err(err) => {
                            tracing::error!(?err, "failed serializing feed message to json");
                            continue;
                        }
                    };
                    if let Err(_) = write.send(Message::Binary(json)).await {
                        remove_self!();
                    }
                }};
            }
            loop {
                select! {
                    msg = receiver.next() => match msg {
                        None => remove_self!(),
                        Some(msg) => send_message!(msg),
                    },
                    msg = read.next() => match msg {
                        None => remove_self!(),
                        Some(Ok(Message::Close(_))) => remove_self!(),
                        Some(Ok(Message::Text(msg))) => {
                            if msg != "ping" {
                                tracing::warn!("received unexpected message from client: {msg:?}");
                                remove_self!();
                            }
                            send_message!(FeedMessage::Pong);
                        }
                        Some(msg) => {
                            tracing::warn!("received unexpected message from client: {msg:?}");
                            remove_self!();
                        }
                    },
                }
            }
        });
    }
}
