//! One connection to a server and the tasks serving it

use crate::notification::{notification_queue, ClientNotification, NotificationDispatcher, NotificationQueue};
use crate::processor::ClientCommandProcessor;
use log::{debug, info, warn};
use shared::world::shared_world;
use shared::{
    chat_channel, ChatMessage, ChatReceiver, GameMap, RenderQueue, RenderReceiver, SessionClock,
    SharedWorld, SocketChannel, WireFormat, APP_NAME, DEFAULT_PORT,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: String,
    pub nick: String,
    pub frame_interval: Duration,
    pub format: WireFormat,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            nick: APP_NAME.to_string(),
            frame_interval: Duration::from_millis(16),
            format: WireFormat::default(),
        }
    }
}

/// Session-scoped state plus the receive loop and dispatcher tasks.
pub struct ClientSession {
    world: SharedWorld,
    clock: Arc<SessionClock>,
    channel: SocketChannel,
    notifications: NotificationQueue,
    render_requests: RenderReceiver,
    chat: ChatReceiver,
    processor: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

impl ClientSession {
    pub async fn connect(config: &ClientConfig) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Connecting to {}...", config.server_addr);
        let stream = TcpStream::connect(&config.server_addr).await?;
        stream.set_nodelay(true)?;
        info!("Connected to {}", config.server_addr);
        Ok(Self::start(stream, config))
    }

    /// Starts a session over an already connected stream.
    pub fn start<S>(stream: S, config: &ClientConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (channel, reader) = SocketChannel::from_stream(stream, config.format);
        let world = shared_world(GameMap::new(config.nick.clone()));
        let clock = Arc::new(SessionClock::default());
        let (render, render_requests) = RenderQueue::channel();
        let (chat_sink, chat) = chat_channel();
        let (notifications, receiver) = notification_queue();

        let processor = ClientCommandProcessor::new(
            channel.clone(),
            reader,
            world.clone(),
            clock.clone(),
            render,
            chat_sink.clone(),
        );
        let dispatcher = NotificationDispatcher::new(receiver, channel.clone(), chat_sink);

        Self {
            world,
            clock,
            channel,
            notifications,
            render_requests,
            chat,
            processor: tokio::spawn(processor.run()),
            dispatcher: tokio::spawn(dispatcher.run()),
        }
    }

    pub fn world(&self) -> &SharedWorld {
        &self.world
    }

    pub fn clock(&self) -> &Arc<SessionClock> {
        &self.clock
    }

    pub fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    pub fn render_requests(&mut self) -> &mut RenderReceiver {
        &mut self.render_requests
    }

    /// Chat messages received since the last call.
    pub fn drain_chat(&mut self) -> Vec<ChatMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.chat.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// Waits for the next chat message.
    pub async fn next_chat(&mut self) -> Option<ChatMessage> {
        self.chat.recv().await
    }

    /// False once the receive loop reached its terminal state.
    pub fn is_connected(&self) -> bool {
        !self.processor.is_finished()
    }

    /// Flushes pending notifications, closes the connection and resets the
    /// session state.
    pub async fn shutdown(self) {
        self.notifications.push(ClientNotification::Exit);
        if let Err(e) = self.dispatcher.await {
            warn!("Notification dispatcher failed: {}", e);
        }
        if let Err(e) = self.channel.close().await {
            debug!("Error closing connection: {}", e);
        }
        self.processor.abort();

        self.clock.reset();
        self.world.write().await.clear_all();
        info!("Session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::world::TileCoord;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_session_round_trip() {
        let (local, mut remote) = tokio::io::duplex(64 * 1024);
        let config = ClientConfig {
            nick: "Tester".to_string(),
            ..ClientConfig::default()
        };
        let mut session = ClientSession::start(local, &config);

        remote.write_all(b"<picknick:><newturn:5>").await.unwrap();
        session.notifications().push(ClientNotification::MarkTile {
            tile: TileCoord::new(2, 2),
            marked: true,
        });

        let expected = [
            format!("<hello:{}>", shared::greeting()),
            "<setnick:Tester>".to_string(),
            "<markTile:2:2:true>".to_string(),
        ];
        let mut received = String::new();
        let mut buffer = [0u8; 1024];
        while received.matches('>').count() < expected.len() {
            let len = remote.read(&mut buffer).await.unwrap();
            received.push_str(std::str::from_utf8(&buffer[..len]).unwrap());
        }
        for frame in &expected {
            assert!(received.contains(frame.as_str()), "{} missing from {}", frame, received);
        }

        drop(remote);
        let notice = session.next_chat().await.unwrap();
        assert_eq!(notice.message, crate::processor::DISCONNECT_MESSAGE);
        assert_eq!(session.clock().turn_number(), 5);

        let clock = session.clock().clone();
        session.shutdown().await;
        assert_eq!(clock.turn_number(), 0);
    }
}
