//! # Game Client Library
//!
//! Client side of the dungeon game protocol. A session owns one connection to
//! a server and runs two tasks against it, while the caller's frame loop reads
//! the shared World Model and applies render requests.
//!
//! ## Data Flow
//!
//! ```text
//! console/game logic --push--> NotificationQueue --> NotificationDispatcher --+
//!                                                                              |
//!                                                        SocketChannel (send token)
//!                                                                              |
//! server --bytes--> ClientCommandProcessor --write guard--> SharedWorld <--read-- frame loop
//!                          |                                   |
//!                          +--> ChatSink                       +--> RenderQueue --> Renderer
//! ```
//!
//! ## Module Organization
//!
//! ### Processor Module (`processor`)
//! The receive loop state machine:
//! - Frame buffering across reads
//! - Command lookup by exact name and per-command handlers
//! - Acknowledgements sent after the World Model guard is released
//! - Disconnect detection and the user-visible disconnect notice
//!
//! ### Notification Module (`notification`)
//! Outbound intents and their single consumer task.
//!
//! ### Session Module (`session`)
//! Connection setup, session-scoped state, and orderly shutdown.
//!
//! ### Input Module (`input`)
//! Console line parsing into notifications.
//!
//! ### Rendering Module (`rendering`)
//! A headless renderer that tracks live meshes.
//!
//! ## Error Policy
//!
//! Nothing the server sends can stop the client. Unknown commands, malformed
//! bodies and references to entities that do not exist are logged and
//! skipped; only end-of-stream ends the receive loop.

pub mod input;
pub mod notification;
pub mod processor;
pub mod rendering;
pub mod session;

pub use notification::{ClientNotification, NotificationQueue};
pub use processor::{ClientCommandProcessor, ProtocolError, ReceiveState};
pub use session::{ClientConfig, ClientSession};
