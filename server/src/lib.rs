//! # Keeper Server Library
//!
//! The authoritative side of a Keeper session. The server owns the canonical
//! dungeon, streams it to every client that joins, and broadcasts each change
//! as a text command in the same `<name:arguments>` framing the clients use.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The world lives only here. Clients send requests (pick up a creature, drop
//! it, mark a tile for digging) and only see the effect once the server
//! broadcasts it back.
//!
//! ### Client Management
//! Handles the lifecycle of client connections:
//! - `hello` / `picknick` / `setnick` handshake and seat assignment
//! - Full world stream for the joining player
//! - Disconnection cleanup, giving the seat back
//!
//! ### Turn Loop
//! At a fixed number of turns per second the server advances the turn
//! counter, digs marked tiles, fills treasuries with mined gold, and sends
//! idle creatures wandering.
//!
//! ## Architecture Design
//!
//! ### Single Owner Event Loop
//! Network tasks never touch game state. The acceptor and per-connection
//! reader tasks forward everything to one `select!` loop as
//! [`network::ServerMessage`]s; the loop owns the [`game::ServerGame`] and
//! the [`client_manager::ClientManager`]. Per-connection writer tasks drain
//! an outbound queue so a slow client never stalls the loop.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Connected clients, their nicks, and their outbound queues.
//!
//! ### Game Module (`game`)
//! Map generation, joins, creature handling, digging, and snapshots. Returns
//! commands instead of sending them.
//!
//! ### Network Module (`network`)
//! TCP accept loop, framing, routing of client commands, and the turn timer.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::game::ServerGame;
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let game = ServerGame::generate(config.width, config.height, config.seed, config.tick_rate);
//!
//!     let mut server = Server::bind(&config, game).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod network;
