//! Server network layer: TCP connections and the turn loop

use crate::client_manager::ClientManager;
use crate::game::{ServerGame, SERVER_NICK};
use log::{debug, error, info, warn};
use shared::commands::*;
use shared::{
    ChatMessage, Command, FrameBuffer, SocketChannel, TileCoord, WireFormat, ACK_COMMAND,
    DEFAULT_PORT,
};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Turns per second.
    pub tick_rate: f64,
    pub max_clients: usize,
    pub width: i32,
    pub height: i32,
    pub seed: u64,
    pub snapshot: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            tick_rate: shared::DEFAULT_TURNS_PER_SECOND,
            max_clients: 8,
            width: 32,
            height: 32,
            seed: 1,
            snapshot: None,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    ClientConnected { stream: TcpStream, addr: SocketAddr },
    CommandReceived { client_id: u32, command: Command },
    ClientDisconnected { client_id: u32 },
    Shutdown,
}

/// Main server coordinating connections and the turn loop
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    game: ServerGame,
    clients: ClientManager,
    tick_duration: Duration,
    format: WireFormat,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn bind(config: &ServerConfig, game: ServerGame) -> io::Result<Self> {
        let listener = TcpListener::bind(config.address()).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let tick_rate = if config.tick_rate > 0.0 {
            config.tick_rate
        } else {
            shared::DEFAULT_TURNS_PER_SECOND
        };

        Ok(Server {
            listener: Some(listener),
            local_addr,
            game,
            clients: ClientManager::new(config.max_clients),
            tick_duration: Duration::from_secs_f64(1.0 / tick_rate),
            format: WireFormat::default(),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn game(&self) -> &ServerGame {
        &self.game
    }

    /// Sender for injecting messages into the main loop, e.g. `Shutdown`.
    pub fn handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that accepts incoming connections
    fn spawn_acceptor(&self, listener: TcpListener) {
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!("Could not disable Nagle for {}: {}", addr, e);
                        }
                        if server_tx
                            .send(ServerMessage::ClientConnected { stream, addr })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the reader and writer tasks of one connection
    fn spawn_connection(
        &self,
        client_id: u32,
        stream: TcpStream,
        mut outbound: mpsc::UnboundedReceiver<Command>,
    ) {
        let (channel, mut reader) = SocketChannel::from_stream(stream, self.format);
        let server_tx = self.server_tx.clone();
        let format = self.format;

        tokio::spawn(async move {
            let mut frames = FrameBuffer::new(format);
            while let Some(data) = reader.receive().await {
                frames.push(&data);
                while let Some(command) = frames.next_command() {
                    if server_tx
                        .send(ServerMessage::CommandReceived { client_id, command })
                        .is_err()
                    {
                        return;
                    }
                }
            }
            if server_tx
                .send(ServerMessage::ClientDisconnected { client_id })
                .is_err()
            {
                debug!("Main loop gone before client {} disconnected", client_id);
            }
        });

        tokio::spawn(async move {
            while let Some(command) = outbound.recv().await {
                if let Err(e) = channel.send(&command).await {
                    warn!("Failed to send to client {}: {}", client_id, e);
                    break;
                }
            }
            if let Err(e) = channel.close().await {
                debug!("Error closing client {}: {}", client_id, e);
            }
        });
    }

    fn handle_connect(&mut self, stream: TcpStream, addr: SocketAddr) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        match self.clients.add_client(addr, outbound_tx) {
            Some(client_id) => self.spawn_connection(client_id, stream, outbound_rx),
            None => {
                warn!("Rejecting {}: server full", addr);
                let (channel, _reader) = SocketChannel::from_stream(stream, self.format);
                tokio::spawn(async move {
                    let full = server_chat("Server full");
                    if let Err(e) = channel.send(&full).await {
                        debug!("Could not tell {} the server is full: {}", addr, e);
                    }
                    if let Err(e) = channel.close().await {
                        debug!("Error closing {}: {}", addr, e);
                    }
                });
            }
        }
    }

    fn handle_disconnect(&mut self, client_id: u32) {
        let Some(client) = self.clients.remove_client(&client_id) else {
            return;
        };
        if let Some(nick) = client.nick {
            self.game.leave(&nick);
            self.clients
                .broadcast(&server_chat(&format!("{} left the game", nick)), None);
        }
    }

    /// Processes one command from a client
    fn handle_command(&mut self, client_id: u32, command: Command) {
        debug!("Client {} sent {}", client_id, command);
        let nick = self.clients.nick(client_id).map(str::to_string);

        match (command.name.as_str(), nick) {
            (HELLO, _) => {
                if command.arguments != shared::greeting() {
                    warn!(
                        "Client {} greets with `{}`, expected `{}`",
                        client_id,
                        command.arguments,
                        shared::greeting()
                    );
                }
                self.clients.send_to(client_id, Command::new(PICK_NICK, ""));
            }

            (SET_NICK, Some(current)) => {
                warn!("Client {} already joined as {}", client_id, current);
            }
            (SET_NICK, None) => self.handle_join(client_id, &command.arguments),

            (ACK_COMMAND, _) => {}

            (CREATURE_PICK_UP, Some(nick)) => {
                let fields = command.split_fields(2);
                let (Some(player), Some(creature)) = (fields.first(), fields.get(1)) else {
                    warn!("Malformed pick up from {}: {}", nick, command.arguments);
                    return;
                };
                if *player != nick {
                    warn!("{} tried to pick up for {}", nick, player);
                    return;
                }
                match self.game.pick_up(&nick, creature) {
                    Some(update) => {
                        self.clients.broadcast(&update, None);
                    }
                    None => debug!("{} cannot pick up {}", nick, creature),
                }
            }

            (CREATURE_DROP, Some(nick)) => {
                let fields = command.split_fields(3);
                let Some(tile) = parse_coord(fields.get(1).copied(), fields.get(2).copied())
                else {
                    warn!("Malformed drop from {}: {}", nick, command.arguments);
                    return;
                };
                if fields.first().copied() != Some(nick.as_str()) {
                    warn!("{} tried to drop for another player", nick);
                    return;
                }
                match self.game.drop_creature(&nick, tile) {
                    Some(update) => {
                        self.clients.broadcast(&update, None);
                    }
                    None => debug!("{} has nothing to drop", nick),
                }
            }

            (MARK_TILE, Some(nick)) => {
                let fields = command.split_fields(3);
                let tile = parse_coord(fields.first().copied(), fields.get(1).copied());
                let marked = fields.get(2).and_then(|value| value.parse::<bool>().ok());
                match (tile, marked) {
                    (Some(tile), Some(marked)) => {
                        if self.game.mark_tile(&nick, tile, marked) {
                            debug!("{} marked ({}, {}): {}", nick, tile.x, tile.y, marked);
                        }
                    }
                    _ => warn!("Malformed mark from {}: {}", nick, command.arguments),
                }
            }

            (CREATURE_PICK_UP | CREATURE_DROP | MARK_TILE, None) => {
                warn!("Client {} sent {} before joining", client_id, command.name);
            }

            (other, _) => warn!("Unknown command from client {}: {}", client_id, other),
        }
    }

    fn handle_join(&mut self, client_id: u32, nick: &str) {
        match self.game.join(nick) {
            Ok(stream) => {
                for command in stream {
                    self.clients.send_to(client_id, command);
                }
                self.clients.set_nick(client_id, nick);
                self.clients
                    .broadcast(&Command::new(ADD_PLAYER, nick), Some(client_id));
                self.clients
                    .broadcast(&server_chat(&format!("{} joined the game", nick)), None);
            }
            Err(e) => {
                // The client cannot choose another nick, so asking again would loop.
                info!("Client {} cannot join: {}", client_id, e);
                self.clients.send_to(client_id, server_chat(&e.to_string()));
                self.clients.remove_client(&client_id);
            }
        }
    }

    fn handle_tick(&mut self) {
        let updates = self.game.advance_turn();
        if self.clients.is_empty() {
            return;
        }
        for update in &updates {
            self.clients.broadcast(update, None);
        }

        let turn = self.game.clock().turn_number();
        if turn % 60 == 0 {
            debug!("Turn {}: {} clients", turn, self.clients.len());
        }
    }

    /// Main server loop
    pub async fn run(&mut self) -> io::Result<()> {
        let listener = self.listener.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::AddrInUse, "server is already running")
        })?;
        self.spawn_acceptor(listener);

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Skip the first tick since it fires immediately
        tick_interval.tick().await;

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::ClientConnected { stream, addr }) => {
                            self.handle_connect(stream, addr);
                        }
                        Some(ServerMessage::CommandReceived { client_id, command }) => {
                            self.handle_command(client_id, command);
                        }
                        Some(ServerMessage::ClientDisconnected { client_id }) => {
                            self.handle_disconnect(client_id);
                        }
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => self.handle_tick(),
            }
        }

        Ok(())
    }
}

fn server_chat(message: &str) -> Command {
    Command::new(CHAT, ChatMessage::new(SERVER_NICK, message).to_arguments())
}

fn parse_coord(x: Option<&str>, y: Option<&str>) -> Option<TileCoord> {
    Some(TileCoord::new(x?.parse().ok()?, y?.parse().ok()?))
}
