pub mod chat;
pub mod clock;
pub mod codec;
pub mod connection;
pub mod error;
pub mod render;
pub mod world;

pub use chat::{chat_channel, ChatMessage, ChatReceiver, ChatSink, SERVER_INFORMATION};
pub use clock::{SessionClock, DEFAULT_TURNS_PER_SECOND};
pub use codec::{Command, FrameBuffer, WireFormat, ACK_COMMAND};
pub use connection::{FrameReader, SocketChannel};
pub use error::{ParseError, WorldError};
pub use render::{RenderQueue, RenderReceiver, RenderRequest};
pub use world::{GameMap, SharedWorld, TileCoord};

pub const APP_NAME: &str = "Keeper";
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DEFAULT_PORT: u16 = 31222;

/// Argument of the `hello` greeting, e.g. `Keeper V 0.1.0`.
pub fn greeting() -> String {
    format!("{} V {}", APP_NAME, PROTOCOL_VERSION)
}

/// Names of the commands both peers put on the wire.
pub mod commands {
    pub const HELLO: &str = "hello";
    pub const SET_NICK: &str = "setnick";
    pub const PICK_NICK: &str = "picknick";
    pub const ADD_SEAT: &str = "addseat";
    pub const ADD_PLAYER: &str = "addplayer";
    pub const CHAT: &str = "chat";
    pub const NEW_MAP: &str = "newmap";
    pub const TURNS_PER_SECOND: &str = "turnsPerSecond";
    pub const ADD_TILE: &str = "addtile";
    pub const ADD_MAP_LIGHT: &str = "addmaplight";
    pub const REMOVE_MAP_LIGHT: &str = "removeMapLight";
    pub const ADD_ROOM: &str = "addroom";
    pub const ADD_CLASS: &str = "addclass";
    pub const ADD_CREATURE: &str = "addcreature";
    pub const NEW_TURN: &str = "newturn";
    pub const ANIMATED_OBJECT_ADD_DESTINATION: &str = "animatedObjectAddDestination";
    pub const ANIMATED_OBJECT_CLEAR_DESTINATIONS: &str = "animatedObjectClearDestinations";
    pub const CREATURE_PICK_UP: &str = "creaturePickUp";
    pub const CREATURE_DROP: &str = "creatureDrop";
    pub const SET_OBJECT_ANIMATION_STATE: &str = "setObjectAnimationState";
    pub const TILE_FULLNESS_CHANGE: &str = "tileFullnessChange";
    pub const MARK_TILE: &str = "markTile";
}
