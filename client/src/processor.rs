//! Client Command Processor: the receive loop
//!
//! One task per connection reads from the socket, buffers partial frames and
//! dispatches every complete command to its handler. Handlers mutate the
//! shared World Model under its write guard, drop the guard, and only then
//! acknowledge through the socket channel.
//!
//! ```text
//! AwaitingFrame -> HaveFrame -> Dispatching -> HaveFrame -> ... -> AwaitingFrame
//!       |
//!       +-> Disconnected (end of stream or read error, terminal)
//! ```
//!
//! Nothing received from the network stops the loop. Failures are reported
//! once through `log` and the next command is processed.

use log::{debug, error, info, warn};
use shared::codec::{parse_field, FrameBuffer};
use shared::commands::*;
use shared::world::{Creature, CreatureDefinition, MapLight, Player, Room, Seat, Tile};
use shared::{
    ChatMessage, ChatSink, Command, FrameReader, ParseError, RenderQueue, SessionClock,
    SharedWorld, SocketChannel, TileCoord, WorldError, SERVER_INFORMATION,
};
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Shown to the user when the server goes away.
pub const DISCONNECT_MESSAGE: &str = "Server disconnect.";

#[derive(Debug, Clone, PartialEq)]
pub enum ReceiveState {
    AwaitingFrame,
    HaveFrame,
    Dispatching(Command),
    Disconnected,
}

/// Commands the server sends to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerCommand {
    PickNick,
    AddSeat,
    AddPlayer,
    Chat,
    NewMap,
    TurnsPerSecond,
    AddTile,
    AddMapLight,
    RemoveMapLight,
    AddRoom,
    AddClass,
    AddCreature,
    NewTurn,
    AnimatedObjectAddDestination,
    AnimatedObjectClearDestinations,
    CreaturePickUp,
    CreatureDrop,
    SetObjectAnimationState,
    TileFullnessChange,
}

const SERVER_COMMANDS: &[(&str, ServerCommand)] = &[
    (PICK_NICK, ServerCommand::PickNick),
    (ADD_SEAT, ServerCommand::AddSeat),
    (ADD_PLAYER, ServerCommand::AddPlayer),
    (CHAT, ServerCommand::Chat),
    (NEW_MAP, ServerCommand::NewMap),
    (TURNS_PER_SECOND, ServerCommand::TurnsPerSecond),
    (ADD_TILE, ServerCommand::AddTile),
    (ADD_MAP_LIGHT, ServerCommand::AddMapLight),
    (REMOVE_MAP_LIGHT, ServerCommand::RemoveMapLight),
    (ADD_ROOM, ServerCommand::AddRoom),
    (ADD_CLASS, ServerCommand::AddClass),
    (ADD_CREATURE, ServerCommand::AddCreature),
    (NEW_TURN, ServerCommand::NewTurn),
    (
        ANIMATED_OBJECT_ADD_DESTINATION,
        ServerCommand::AnimatedObjectAddDestination,
    ),
    (
        ANIMATED_OBJECT_CLEAR_DESTINATIONS,
        ServerCommand::AnimatedObjectClearDestinations,
    ),
    (CREATURE_PICK_UP, ServerCommand::CreaturePickUp),
    (CREATURE_DROP, ServerCommand::CreatureDrop),
    (
        SET_OBJECT_ANIMATION_STATE,
        ServerCommand::SetObjectAnimationState,
    ),
    (TILE_FULLNESS_CHANGE, ServerCommand::TileFullnessChange),
];

impl ServerCommand {
    /// Exact, case-sensitive name match.
    pub fn lookup(name: &str) -> Option<Self> {
        SERVER_COMMANDS
            .iter()
            .find(|(command, _)| *command == name)
            .map(|(_, kind)| *kind)
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown command `{name}` with arguments `{arguments}`")]
    UnknownCommand { name: String, arguments: String },
    #[error("malformed `{command}`: {source}")]
    Malformed {
        command: String,
        #[source]
        source: ParseError,
    },
    #[error("`{command}` refers to unknown {kind} `{id}`")]
    Unresolved {
        command: String,
        kind: &'static str,
        id: String,
    },
    #[error("`{command}` failed: {source}")]
    World {
        command: String,
        #[source]
        source: WorldError,
    },
    #[error("failed to send reply: {0}")]
    Send(#[from] io::Error),
}

impl ProtocolError {
    fn malformed(command: &Command, source: ParseError) -> Self {
        Self::Malformed {
            command: command.name.clone(),
            source,
        }
    }

    fn unresolved(command: &Command, kind: &'static str, id: impl Into<String>) -> Self {
        Self::Unresolved {
            command: command.name.clone(),
            kind,
            id: id.into(),
        }
    }

    /// Logs the failure once, at the level its kind calls for.
    pub fn report(&self) {
        match self {
            Self::UnknownCommand { .. } | Self::World { .. } | Self::Send(_) => {
                error!("{}", self)
            }
            Self::Malformed { .. } => warn!("{}", self),
            Self::Unresolved { .. } => debug!("{}", self),
        }
    }
}

pub struct ClientCommandProcessor {
    channel: SocketChannel,
    reader: FrameReader,
    frames: FrameBuffer,
    world: SharedWorld,
    clock: Arc<SessionClock>,
    render: RenderQueue,
    chat: ChatSink,
    state: ReceiveState,
}

impl ClientCommandProcessor {
    pub fn new(
        channel: SocketChannel,
        reader: FrameReader,
        world: SharedWorld,
        clock: Arc<SessionClock>,
        render: RenderQueue,
        chat: ChatSink,
    ) -> Self {
        let frames = FrameBuffer::new(channel.format());
        Self {
            channel,
            reader,
            frames,
            world,
            clock,
            render,
            chat,
            state: ReceiveState::AwaitingFrame,
        }
    }

    pub fn state(&self) -> &ReceiveState {
        &self.state
    }

    /// Greets the server, then processes commands until the connection ends.
    pub async fn run(mut self) {
        let hello = Command::new(HELLO, shared::greeting());
        match self.channel.send(&hello).await {
            Ok(()) => info!("Sent greeting: {}", hello.arguments),
            Err(e) => error!("Failed to send greeting: {}", e),
        }

        while self.state != ReceiveState::Disconnected {
            self.step().await;
        }
    }

    /// Performs one state transition.
    pub async fn step(&mut self) {
        let state = std::mem::replace(&mut self.state, ReceiveState::AwaitingFrame);
        self.state = match state {
            ReceiveState::AwaitingFrame => match self.reader.receive().await {
                Some(data) => {
                    self.frames.push(&data);
                    if self.frames.is_complete() {
                        ReceiveState::HaveFrame
                    } else {
                        ReceiveState::AwaitingFrame
                    }
                }
                None => {
                    self.on_disconnect();
                    ReceiveState::Disconnected
                }
            },
            ReceiveState::HaveFrame => match self.frames.next_command() {
                Some(command) => ReceiveState::Dispatching(command),
                None => ReceiveState::AwaitingFrame,
            },
            ReceiveState::Dispatching(command) => {
                if let Err(e) = self.dispatch(&command).await {
                    e.report();
                }
                ReceiveState::HaveFrame
            }
            ReceiveState::Disconnected => ReceiveState::Disconnected,
        };
    }

    fn on_disconnect(&self) {
        info!("Disconnected from server");
        if self
            .chat
            .send(ChatMessage::new(SERVER_INFORMATION, DISCONNECT_MESSAGE))
            .is_err()
        {
            debug!("Chat display gone, disconnect not shown");
        }
    }

    async fn acknowledge(&mut self, command: &Command) -> Result<(), ProtocolError> {
        self.channel.send(&Command::ack(&command.name)).await?;
        Ok(())
    }

    /// Runs the handler for one command.
    pub async fn dispatch(&mut self, command: &Command) -> Result<(), ProtocolError> {
        let Some(kind) = ServerCommand::lookup(&command.name) else {
            return Err(ProtocolError::UnknownCommand {
                name: command.name.clone(),
                arguments: command.arguments.clone(),
            });
        };
        debug!("Received {}", command);
        let arguments = command.arguments.as_str();

        match kind {
            ServerCommand::PickNick => {
                let nick = self.world.read().await.me().nick.clone();
                self.channel.send(&Command::new(SET_NICK, nick)).await?;
            }

            ServerCommand::AddSeat => {
                let seat: Seat = arguments
                    .parse()
                    .map_err(|e| ProtocolError::malformed(command, e))?;
                {
                    let mut world = self.world.write().await;
                    world.add_empty_seat(seat);
                    if world.me().seat.is_none() {
                        let claimed = world.pop_empty_seat();
                        world.me_mut().seat = claimed;
                    }
                }
                self.acknowledge(command).await?;
            }

            ServerCommand::AddPlayer => {
                let added = self.world.write().await.add_player(Player::new(arguments));
                if !added {
                    debug!("Player {} already known", arguments);
                }
                self.acknowledge(command).await?;
            }

            ServerCommand::Chat => {
                if self.chat.send(ChatMessage::from_arguments(arguments)).is_err() {
                    debug!("Chat display gone, message dropped");
                }
            }

            ServerCommand::NewMap => {
                self.world.write().await.clear_all();
            }

            ServerCommand::TurnsPerSecond => {
                let rate: f64 = parse_field(Some(arguments), "turns per second")
                    .map_err(|e| ProtocolError::malformed(command, e))?;
                self.clock.set_turns_per_second(rate);
            }

            ServerCommand::AddTile => {
                let tile: Tile = arguments
                    .parse()
                    .map_err(|e| ProtocolError::malformed(command, e))?;
                self.world.write().await.add_tile(tile, &self.render);
                self.acknowledge(command).await?;
            }

            ServerCommand::AddMapLight => {
                let light: MapLight = arguments
                    .parse()
                    .map_err(|e| ProtocolError::malformed(command, e))?;
                self.world.write().await.add_map_light(light, &self.render);
            }

            ServerCommand::RemoveMapLight => {
                let removed = self
                    .world
                    .write()
                    .await
                    .remove_map_light(arguments, &self.render);
                if !removed {
                    return Err(ProtocolError::unresolved(command, "map light", arguments));
                }
            }

            ServerCommand::AddRoom => {
                let room =
                    Room::from_arguments(arguments).map_err(|e| ProtocolError::malformed(command, e))?;
                self.world.write().await.add_room(room, &self.render);
                self.acknowledge(command).await?;
            }

            ServerCommand::AddClass => {
                let definition: CreatureDefinition = arguments
                    .parse()
                    .map_err(|e| ProtocolError::malformed(command, e))?;
                self.world.write().await.add_class_description(definition);
                self.acknowledge(command).await?;
            }

            ServerCommand::AddCreature => {
                let creature: Creature = arguments
                    .parse()
                    .map_err(|e| ProtocolError::malformed(command, e))?;
                self.world.write().await.add_creature(creature, &self.render);
                self.acknowledge(command).await?;
            }

            ServerCommand::NewTurn => {
                let turn: i64 = parse_field(Some(arguments), "turn number")
                    .map_err(|e| ProtocolError::malformed(command, e))?;
                self.clock.set_turn_number(turn);
            }

            ServerCommand::AnimatedObjectAddDestination => {
                let fields = command.split_fields(4);
                let name = fields[0];
                let (x, y, _z) =
                    read_point(&fields[1..]).map_err(|e| ProtocolError::malformed(command, e))?;

                let mut world = self.world.write().await;
                let object = world
                    .animated_object_mut(name)
                    .ok_or_else(|| ProtocolError::unresolved(command, "object", name))?;
                object.add_destination(x, y);
            }

            ServerCommand::AnimatedObjectClearDestinations => {
                let mut world = self.world.write().await;
                let object = world
                    .animated_object_mut(arguments)
                    .ok_or_else(|| ProtocolError::unresolved(command, "object", arguments))?;
                object.clear_destinations();
            }

            ServerCommand::CreaturePickUp => {
                let fields = command.split_fields(2);
                let nick = fields[0];
                let creature = fields.get(1).copied().unwrap_or_default();
                let picked = self.world.write().await.pick_up_creature(nick, creature);
                if !picked {
                    return Err(ProtocolError::unresolved(
                        command,
                        "player or creature",
                        arguments,
                    ));
                }
            }

            ServerCommand::CreatureDrop => {
                let fields = command.split_fields(3);
                let nick = fields[0];
                let tile = read_coord(&fields[1..]).map_err(|e| ProtocolError::malformed(command, e))?;
                let dropped = self.world.write().await.drop_creature(nick, tile);
                match dropped {
                    Some(name) => debug!("{} dropped {}", nick, name),
                    None => {
                        return Err(ProtocolError::unresolved(
                            command,
                            "player or tile",
                            arguments,
                        ))
                    }
                }
            }

            ServerCommand::SetObjectAnimationState => {
                let fields = command.split_fields(3);
                let name = fields[0];
                let state = fields
                    .get(1)
                    .copied()
                    .ok_or_else(|| ProtocolError::malformed(command, ParseError::MissingField("state")))?;
                let looping: bool = parse_field(fields.get(2).copied(), "loop")
                    .map_err(|e| ProtocolError::malformed(command, e))?;

                let mut world = self.world.write().await;
                let creature = world
                    .creature_mut(name)
                    .ok_or_else(|| ProtocolError::unresolved(command, "creature", name))?;
                creature.set_animation_state(state, looping);
            }

            ServerCommand::TileFullnessChange => {
                let fields = command.split_fields(3);
                let fullness: f64 = parse_field(fields.first().copied(), "fullness")
                    .map_err(|e| ProtocolError::malformed(command, e))?;
                let tile = read_coord(&fields[1..]).map_err(|e| ProtocolError::malformed(command, e))?;

                self.world
                    .write()
                    .await
                    .set_tile_fullness(tile, fullness, &self.render)
                    .map_err(|source| ProtocolError::World {
                        command: command.name.clone(),
                        source,
                    })?;
            }
        }

        Ok(())
    }
}

fn read_point(fields: &[&str]) -> Result<(f64, f64, f64), ParseError> {
    Ok((
        parse_field(fields.first().copied(), "x")?,
        parse_field(fields.get(1).copied(), "y")?,
        parse_field(fields.get(2).copied(), "z")?,
    ))
}

/// Reads `x` and `y` from the leading `:`-separated fields.
fn read_coord(fields: &[&str]) -> Result<TileCoord, ParseError> {
    let x = parse_field(fields.first().copied(), "x")?;
    let y = parse_field(fields.get(1).copied(), "y")?;
    Ok(TileCoord::new(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::world::{shared_world, GameMap, TileType};
    use shared::{chat_channel, ChatReceiver, WireFormat};
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    /// Records log output per test thread.
    mod captured_log {
        use log::{Level, LevelFilter, Log, Metadata, Record};
        use std::cell::RefCell;
        use std::sync::Once;

        thread_local! {
            static RECORDS: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
        }

        struct CaptureLogger;

        impl Log for CaptureLogger {
            fn enabled(&self, _metadata: &Metadata) -> bool {
                true
            }

            fn log(&self, record: &Record) {
                RECORDS.with(|records| {
                    records
                        .borrow_mut()
                        .push((record.level(), record.args().to_string()))
                });
            }

            fn flush(&self) {}
        }

        static LOGGER: CaptureLogger = CaptureLogger;
        static INIT: Once = Once::new();

        /// Installs the logger once and forgets anything this thread logged so far.
        pub fn start() {
            INIT.call_once(|| {
                log::set_logger(&LOGGER).unwrap();
                log::set_max_level(LevelFilter::Trace);
            });
            RECORDS.with(|records| records.borrow_mut().clear());
        }

        pub fn take() -> Vec<(Level, String)> {
            RECORDS.with(|records| records.borrow_mut().drain(..).collect())
        }
    }

    struct Harness {
        processor: ClientCommandProcessor,
        remote: DuplexStream,
        world: SharedWorld,
        clock: Arc<SessionClock>,
        chat: ChatReceiver,
    }

    fn harness(format: WireFormat) -> Harness {
        let (local, remote) = tokio::io::duplex(64 * 1024);
        let (channel, reader) = SocketChannel::from_stream(local, format);
        let world = shared_world(GameMap::new("Keeper"));
        let clock = Arc::new(SessionClock::default());
        let (chat_sink, chat) = chat_channel();
        let processor = ClientCommandProcessor::new(
            channel,
            reader,
            world.clone(),
            clock.clone(),
            RenderQueue::disabled(),
            chat_sink,
        );
        Harness {
            processor,
            remote,
            world,
            clock,
            chat,
        }
    }

    /// Reads from the remote end until `count` terminators have arrived.
    async fn read_frames(remote: &mut DuplexStream, terminator: char, count: usize) -> String {
        let mut received = String::new();
        let mut buffer = [0u8; 1024];
        while received.matches(terminator).count() < count {
            let len = remote.read(&mut buffer).await.unwrap();
            assert!(len > 0, "stream closed after {:?}", received);
            received.push_str(std::str::from_utf8(&buffer[..len]).unwrap());
        }
        received
    }

    #[test]
    fn test_command_table_lookup() {
        assert_eq!(ServerCommand::lookup("addtile"), Some(ServerCommand::AddTile));
        assert_eq!(
            ServerCommand::lookup("tileFullnessChange"),
            Some(ServerCommand::TileFullnessChange)
        );
        assert_eq!(ServerCommand::lookup("AddTile"), None);
        assert_eq!(ServerCommand::lookup("ok"), None);
        assert_eq!(SERVER_COMMANDS.len(), 19);
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn test_run_can_be_spawned() {
        let Harness { processor, .. } = harness(WireFormat::default());
        let run = processor.run();
        assert_send(&run);
    }

    #[tokio::test]
    async fn test_add_player_with_pipe_format() {
        let format = WireFormat::new(None, '|', '>');
        let Harness {
            processor,
            mut remote,
            world,
            mut chat,
            ..
        } = harness(format);

        remote.write_all(b"addplayer|Alice>").await.unwrap();
        let task = tokio::spawn(processor.run());

        let sent = read_frames(&mut remote, '>', 2).await;
        assert_eq!(sent, format!("hello|{}>ok|addplayer>", shared::greeting()));

        drop(remote);
        task.await.unwrap();

        let world = world.read().await;
        assert_eq!(world.num_players(), 1);
        assert_eq!(world.player("Alice").unwrap().nick, "Alice");
        assert_eq!(chat.try_recv().unwrap().message, DISCONNECT_MESSAGE);
    }

    #[tokio::test]
    async fn test_disconnect_is_terminal() {
        let Harness {
            mut processor,
            remote,
            mut chat,
            ..
        } = harness(WireFormat::default());
        drop(remote);

        processor.step().await;
        assert_eq!(processor.state(), &ReceiveState::Disconnected);
        processor.step().await;
        assert_eq!(processor.state(), &ReceiveState::Disconnected);

        let notice = chat.try_recv().unwrap();
        assert_eq!(notice.sender, SERVER_INFORMATION);
        assert_eq!(notice.message, DISCONNECT_MESSAGE);
        assert!(chat.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_mid_loop_sends_nothing_more() {
        let Harness {
            processor,
            mut remote,
            mut chat,
            ..
        } = harness(WireFormat::default());

        remote.write_all(b"<newturn:7>").await.unwrap();
        let task = tokio::spawn(processor.run());
        read_frames(&mut remote, '>', 1).await;
        remote.shutdown().await.unwrap();
        task.await.unwrap();

        let mut rest = String::new();
        remote.read_to_string(&mut rest).await.unwrap();
        assert_eq!(rest, "");
        assert_eq!(chat.try_recv().unwrap().message, DISCONNECT_MESSAGE);
        assert!(chat.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_states_follow_frames() {
        let Harness {
            mut processor,
            mut remote,
            clock,
            ..
        } = harness(WireFormat::default());

        remote.write_all(b"<newturn:3><newt").await.unwrap();
        processor.step().await;
        assert_eq!(processor.state(), &ReceiveState::AwaitingFrame);

        remote.write_all(b"urn:4>").await.unwrap();
        processor.step().await;
        assert_eq!(processor.state(), &ReceiveState::HaveFrame);
        processor.step().await;
        assert_eq!(
            processor.state(),
            &ReceiveState::Dispatching(Command::new("newturn", "3"))
        );
        processor.step().await;
        assert_eq!(clock.turn_number(), 3);
        processor.step().await;
        processor.step().await;
        assert_eq!(clock.turn_number(), 4);
        processor.step().await;
        assert_eq!(processor.state(), &ReceiveState::AwaitingFrame);
    }

    #[tokio::test]
    async fn test_missing_tile_does_not_stop_loop() {
        let Harness {
            processor,
            mut remote,
            world,
            ..
        } = harness(WireFormat::default());

        remote
            .write_all(b"<tileFullnessChange:50:9:9><addplayer:Bob>")
            .await
            .unwrap();
        let task = tokio::spawn(processor.run());

        let sent = read_frames(&mut remote, '>', 2).await;
        assert!(sent.ends_with("<ok:addplayer>"));
        drop(remote);
        task.await.unwrap();

        let world = world.read().await;
        assert_eq!(world.num_tiles(), 0);
        assert!(world.player("Bob").is_some());
    }

    #[tokio::test]
    async fn test_unknown_command_logs_once() {
        let Harness {
            mut processor,
            mut remote,
            world,
            ..
        } = harness(WireFormat::default());

        remote.write_all(b"<explode:everything>").await.unwrap();
        processor.step().await;
        processor.step().await;
        assert!(matches!(processor.state(), ReceiveState::Dispatching(_)));

        captured_log::start();
        processor.step().await;
        let records = captured_log::take();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, log::Level::Error);
        assert!(records[0].1.contains("explode"));
        assert!(records[0].1.contains("everything"));
        assert_eq!(processor.state(), &ReceiveState::HaveFrame);
        assert!(world.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_tile_logs_one_error() {
        let Harness {
            mut processor,
            mut remote,
            world,
            ..
        } = harness(WireFormat::default());

        remote
            .write_all(b"<tileFullnessChange:50:9:9>")
            .await
            .unwrap();
        processor.step().await;
        processor.step().await;

        captured_log::start();
        processor.step().await;
        let errors: Vec<_> = captured_log::take()
            .into_iter()
            .filter(|(level, _)| *level == log::Level::Error)
            .collect();

        assert_eq!(errors.len(), 1);
        assert!(errors[0].1.contains("tileFullnessChange"));
        assert!(errors[0].1.contains("(9, 9)"));
        assert_eq!(processor.state(), &ReceiveState::HaveFrame);
        assert_eq!(world.read().await.num_tiles(), 0);
    }

    #[tokio::test]
    async fn test_unknown_command_leaves_world_alone() {
        let Harness {
            mut processor,
            remote: _remote,
            world,
            ..
        } = harness(WireFormat::default());

        let result = processor.dispatch(&Command::new("explode", "everything")).await;
        assert!(matches!(result, Err(ProtocolError::UnknownCommand { .. })));
        assert!(world.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_tile_fullness_change() {
        let Harness {
            mut processor,
            remote: _remote,
            world,
            ..
        } = harness(WireFormat::default());

        processor
            .dispatch(&Command::new("addtile", "2\t3\tDirt\t100"))
            .await
            .unwrap();
        processor
            .dispatch(&Command::new("tileFullnessChange", "25.5:2:3"))
            .await
            .unwrap();
        let fullness = world.read().await.tile(TileCoord::new(2, 3)).unwrap().fullness;
        assert_approx_eq!(fullness, 25.5);

        let missing = processor
            .dispatch(&Command::new("tileFullnessChange", "0:8:8"))
            .await;
        assert!(matches!(
            missing,
            Err(ProtocolError::World {
                source: WorldError::NoSuchTile(8, 8),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_seat_is_claimed_once() {
        let Harness {
            mut processor,
            remote: _remote,
            world,
            ..
        } = harness(WireFormat::default());

        processor
            .dispatch(&Command::new("addseat", "1\tKeepers\t2\t2\t1000\t0"))
            .await
            .unwrap();
        processor
            .dispatch(&Command::new("addseat", "2\tKeepers\t9\t9\t1000\t0"))
            .await
            .unwrap();

        let world = world.read().await;
        assert_eq!(world.me().color(), Some(1));
        assert_eq!(world.empty_seats().len(), 1);
        assert_eq!(world.filled_seats().len(), 1);
    }

    #[tokio::test]
    async fn test_clock_commands() {
        let Harness {
            mut processor,
            remote: _remote,
            clock,
            ..
        } = harness(WireFormat::default());

        processor
            .dispatch(&Command::new("turnsPerSecond", "2.5"))
            .await
            .unwrap();
        processor.dispatch(&Command::new("newturn", "42")).await.unwrap();
        assert_approx_eq!(clock.turns_per_second(), 2.5);
        assert_eq!(clock.turn_number(), 42);

        let bad = processor.dispatch(&Command::new("newturn", "soon")).await;
        assert!(matches!(bad, Err(ProtocolError::Malformed { .. })));
        assert_eq!(clock.turn_number(), 42);
    }

    #[tokio::test]
    async fn test_creature_commands() {
        let Harness {
            mut processor,
            remote: _remote,
            world,
            ..
        } = harness(WireFormat::default());
        {
            let mut world = world.write().await;
            world.add_tile(
                Tile::new(1, 1, TileType::Claimed, 0.0),
                &RenderQueue::disabled(),
            );
        }

        processor
            .dispatch(&Command::new(
                "addcreature",
                "Imp\tImp_1\t0\t0\t0\t1\tnone\t0\t0\t0\tnone\t0\t0\t0\t30\t0",
            ))
            .await
            .unwrap();
        processor
            .dispatch(&Command::new("animatedObjectAddDestination", "Imp_1:3.5:4:0"))
            .await
            .unwrap();
        processor
            .dispatch(&Command::new("setObjectAnimationState", "Imp_1:Walk:true"))
            .await
            .unwrap();
        {
            let world = world.read().await;
            let imp = world.creature("Imp_1").unwrap();
            assert_eq!(imp.destinations.len(), 1);
            assert_eq!(imp.animation_state, "Walk");
        }

        processor
            .dispatch(&Command::new("animatedObjectClearDestinations", "Imp_1"))
            .await
            .unwrap();
        processor
            .dispatch(&Command::new("creaturePickUp", "Keeper:Imp_1"))
            .await
            .unwrap();
        processor
            .dispatch(&Command::new("creatureDrop", "Keeper:1:1"))
            .await
            .unwrap();
        {
            let world = world.read().await;
            let imp = world.creature("Imp_1").unwrap();
            assert!(imp.destinations.is_empty());
            assert!(imp.held_by.is_none());
            assert_eq!(imp.position, (1.0, 1.0, 0.0));
        }

        let ghost = processor
            .dispatch(&Command::new("animatedObjectClearDestinations", "Ghost_1"))
            .await;
        assert!(matches!(ghost, Err(ProtocolError::Unresolved { .. })));
        let nobody = processor
            .dispatch(&Command::new("creaturePickUp", "Nobody:Imp_1"))
            .await;
        assert!(matches!(nobody, Err(ProtocolError::Unresolved { .. })));
    }

    #[tokio::test]
    async fn test_new_map_clears_world() {
        let Harness {
            mut processor,
            remote: _remote,
            world,
            ..
        } = harness(WireFormat::default());

        processor
            .dispatch(&Command::new("addtile", "0\t0\tRock\t100"))
            .await
            .unwrap();
        processor
            .dispatch(&Command::new("addroom", "Dojo\tDojo_1\t1\t1\t0\t0"))
            .await
            .unwrap();
        assert_eq!(world.read().await.num_rooms(), 1);

        processor.dispatch(&Command::new("newmap", "")).await.unwrap();
        assert!(world.read().await.is_empty());
    }
}
