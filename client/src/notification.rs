//! Outbound intents and the task that puts them on the wire
//!
//! Game and input code push [`ClientNotification`]s into a [`NotificationQueue`]
//! without blocking. A single [`NotificationDispatcher`] task pops them one at
//! a time and sends the matching command through the shared socket channel.

use log::{debug, error, info};
use shared::commands::{CREATURE_DROP, CREATURE_PICK_UP, MARK_TILE};
use shared::{ChatMessage, ChatSink, Command, SocketChannel, TileCoord, SERVER_INFORMATION};
use tokio::sync::mpsc;

/// An intent to tell the server about. Entities are named by the identifiers
/// the protocol carries.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientNotification {
    CreaturePickUp { player: String, creature: String },
    CreatureDrop { player: String, tile: TileCoord },
    MarkTile { tile: TileCoord, marked: bool },
    /// Stops the dispatcher after everything queued before it was sent.
    Exit,
    /// An intent that could not be built; reported and skipped.
    Invalid { reason: String },
}

impl ClientNotification {
    /// The single command this notification becomes, or `None` for the
    /// variants that never reach the wire.
    pub fn to_command(&self) -> Option<Command> {
        match self {
            Self::CreaturePickUp { player, creature } => Some(Command::new(
                CREATURE_PICK_UP,
                format!("{}:{}", player, creature),
            )),
            Self::CreatureDrop { player, tile } => Some(Command::new(
                CREATURE_DROP,
                format!("{}:{}:{}", player, tile.x, tile.y),
            )),
            Self::MarkTile { tile, marked } => Some(Command::new(
                MARK_TILE,
                format!("{}:{}:{}", tile.x, tile.y, marked),
            )),
            Self::Exit | Self::Invalid { .. } => None,
        }
    }
}

/// Producer side. Cloneable; pushing never blocks.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    sender: mpsc::UnboundedSender<ClientNotification>,
}

/// Consumer side, owned by the dispatcher.
#[derive(Debug)]
pub struct NotificationReceiver {
    receiver: mpsc::UnboundedReceiver<ClientNotification>,
}

pub fn notification_queue() -> (NotificationQueue, NotificationReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        NotificationQueue { sender },
        NotificationReceiver { receiver },
    )
}

impl NotificationQueue {
    /// Returns false once the dispatcher has stopped.
    pub fn push(&self, notification: ClientNotification) -> bool {
        self.sender.send(notification).is_ok()
    }
}

impl NotificationReceiver {
    /// Waits for the next notification. `None` once every producer is gone.
    pub async fn pop(&mut self) -> Option<ClientNotification> {
        self.receiver.recv().await
    }
}

pub struct NotificationDispatcher {
    receiver: NotificationReceiver,
    channel: SocketChannel,
    chat: ChatSink,
}

impl NotificationDispatcher {
    pub fn new(receiver: NotificationReceiver, channel: SocketChannel, chat: ChatSink) -> Self {
        Self {
            receiver,
            channel,
            chat,
        }
    }

    pub async fn run(mut self) {
        while let Some(notification) = self.receiver.pop().await {
            match notification {
                ClientNotification::Exit => {
                    info!("Notification dispatcher exiting");
                    return;
                }
                ClientNotification::Invalid { reason } => {
                    error!("Invalid notification: {}", reason);
                    let notice = ChatMessage::new(
                        SERVER_INFORMATION,
                        format!("Could not send request: {}", reason),
                    );
                    if self.chat.send(notice).is_err() {
                        debug!("Chat display gone, invalid request not shown");
                    }
                }
                other => {
                    let Some(command) = other.to_command() else {
                        continue;
                    };
                    if let Err(e) = self.channel.send(&command).await {
                        error!("Failed to send {}: {}", command, e);
                    }
                }
            }
        }
        debug!("Notification queue closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{chat_channel, WireFormat};
    use tokio::io::AsyncReadExt;
    use tokio_test::io::Builder;

    #[test]
    fn test_notifications_use_identifiers() {
        let pick_up = ClientNotification::CreaturePickUp {
            player: "Keeper".to_string(),
            creature: "Imp_3".to_string(),
        };
        assert_eq!(
            pick_up.to_command(),
            Some(Command::new("creaturePickUp", "Keeper:Imp_3"))
        );

        let drop = ClientNotification::CreatureDrop {
            player: "Keeper".to_string(),
            tile: TileCoord::new(4, -1),
        };
        assert_eq!(
            drop.to_command(),
            Some(Command::new("creatureDrop", "Keeper:4:-1"))
        );

        let mark = ClientNotification::MarkTile {
            tile: TileCoord::new(2, 3),
            marked: false,
        };
        assert_eq!(mark.to_command(), Some(Command::new("markTile", "2:3:false")));
        assert_eq!(ClientNotification::Exit.to_command(), None);
    }

    #[tokio::test]
    async fn test_queue_is_fifo() {
        let (queue, mut receiver) = notification_queue();
        for x in 0..3 {
            assert!(queue.push(ClientNotification::MarkTile {
                tile: TileCoord::new(x, 0),
                marked: true,
            }));
        }
        for x in 0..3 {
            assert_eq!(
                receiver.pop().await,
                Some(ClientNotification::MarkTile {
                    tile: TileCoord::new(x, 0),
                    marked: true,
                })
            );
        }
        drop(queue);
        assert_eq!(receiver.pop().await, None);
    }

    #[tokio::test]
    async fn test_push_after_dispatcher_stopped() {
        let (queue, receiver) = notification_queue();
        drop(receiver);
        assert!(!queue.push(ClientNotification::Exit));
    }

    #[tokio::test]
    async fn test_dispatcher_sends_until_exit() {
        let (local, mut remote) = tokio::io::duplex(4096);
        let (channel, _reader) = SocketChannel::from_stream(local, WireFormat::default());
        let (chat, mut chat_receiver) = chat_channel();
        let (queue, receiver) = notification_queue();

        queue.push(ClientNotification::CreaturePickUp {
            player: "Keeper".to_string(),
            creature: "Imp_1".to_string(),
        });
        queue.push(ClientNotification::Invalid {
            reason: "no such creature".to_string(),
        });
        queue.push(ClientNotification::MarkTile {
            tile: TileCoord::new(1, 2),
            marked: true,
        });
        queue.push(ClientNotification::Exit);
        queue.push(ClientNotification::MarkTile {
            tile: TileCoord::new(9, 9),
            marked: true,
        });

        NotificationDispatcher::new(receiver, channel.clone(), chat)
            .run()
            .await;
        channel.close().await.unwrap();

        let mut sent = String::new();
        remote.read_to_string(&mut sent).await.unwrap();
        assert_eq!(sent, "<creaturePickUp:Keeper:Imp_1><markTile:1:2:true>");

        let report = chat_receiver.try_recv().unwrap();
        assert_eq!(report.sender, SERVER_INFORMATION);
        assert!(report.message.contains("no such creature"));
        assert!(chat_receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatcher_survives_closed_chat() {
        let mock = Builder::new().write(b"<creatureDrop:Keeper:4:-1>").build();
        let (channel, _reader) = SocketChannel::from_stream(mock, WireFormat::default());
        let (chat, chat_receiver) = chat_channel();
        drop(chat_receiver);
        let (queue, receiver) = notification_queue();

        queue.push(ClientNotification::Invalid {
            reason: "nothing held".to_string(),
        });
        queue.push(ClientNotification::CreatureDrop {
            player: "Keeper".to_string(),
            tile: TileCoord::new(4, -1),
        });
        queue.push(ClientNotification::Exit);

        NotificationDispatcher::new(receiver, channel, chat).run().await;
    }
}
