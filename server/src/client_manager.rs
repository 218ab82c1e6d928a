//! Connected clients and per-client outbound queues
//!
//! Every connection gets an id and an outbound queue drained by its writer
//! task. A client only receives world broadcasts once it has joined with a
//! nick; before that it is only spoken to directly.

use log::{debug, info};
use shared::Command;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// A connected client and the queue its writer task drains
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Remote address, for logging
    pub addr: SocketAddr,
    /// Set once the client picked a nick that the game accepted
    pub nick: Option<String>,
    outbound: mpsc::UnboundedSender<Command>,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr, outbound: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            id,
            addr,
            nick: None,
            outbound,
        }
    }

    pub fn has_joined(&self) -> bool {
        self.nick.is_some()
    }

    /// Queues a command. Returns false when the writer task has gone away.
    pub fn send(&self, command: Command) -> bool {
        self.outbound.send(command).is_ok()
    }
}

/// Manages all connected clients
///
/// Enforces the capacity limit and routes commands either to one client or
/// to every joined client.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<u32, Client>,
    /// Next available client ID for new connections
    next_client_id: u32,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    /// Client IDs start from 1 and increment for each new connection.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Returns Some(client_id) if successful, None if server is at capacity.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        outbound: mpsc::UnboundedSender<Command>,
    ) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, outbound));

        Some(client_id)
    }

    /// Removes a client. Returns it so the caller can release its player.
    pub fn remove_client(&mut self, client_id: &u32) -> Option<Client> {
        let client = self.clients.remove(client_id)?;
        info!("Client {} disconnected", client.id);
        Some(client)
    }

    pub fn client(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    pub fn set_nick(&mut self, client_id: u32, nick: impl Into<String>) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.nick = Some(nick.into());
                true
            }
            None => false,
        }
    }

    pub fn nick(&self, client_id: u32) -> Option<&str> {
        self.clients.get(&client_id)?.nick.as_deref()
    }

    pub fn find_by_nick(&self, nick: &str) -> Option<u32> {
        self.clients
            .values()
            .find(|client| client.nick.as_deref() == Some(nick))
            .map(|client| client.id)
    }

    pub fn send_to(&self, client_id: u32, command: Command) -> bool {
        match self.clients.get(&client_id) {
            Some(client) => client.send(command),
            None => false,
        }
    }

    /// Sends a command to every joined client except `exclude`. Returns how
    /// many queues accepted it.
    pub fn broadcast(&self, command: &Command, exclude: Option<u32>) -> usize {
        let mut sent = 0;
        for client in self.clients.values() {
            if !client.has_joined() || Some(client.id) == exclude {
                continue;
            }
            if client.send(command.clone()) {
                sent += 1;
            } else {
                debug!("Client {} outbound queue closed", client.id);
            }
        }
        sent
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_client_creation() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let client = Client::new(1, test_addr(), tx);

        assert_eq!(client.id, 1);
        assert_eq!(client.addr, test_addr());
        assert!(!client.has_joined());
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new(5);
        assert_eq!(manager.max_clients, 5);
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = ClientManager::new(3);
        let (tx, _rx) = mpsc::unbounded_channel();

        let client_id1 = manager.add_client(test_addr(), tx.clone()).unwrap();
        let client_id2 = manager.add_client(test_addr2(), tx).unwrap();

        assert_eq!(client_id1, 1);
        assert_eq!(client_id2, 2);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);
        let (tx, _rx) = mpsc::unbounded_channel();

        assert!(manager.add_client(test_addr(), tx.clone()).is_some());
        assert!(manager.add_client(test_addr2(), tx).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = mpsc::unbounded_channel();

        let client_id = manager.add_client(test_addr(), tx).unwrap();
        manager.set_nick(client_id, "Alice");

        let removed = manager.remove_client(&client_id).unwrap();
        assert_eq!(removed.nick.as_deref(), Some("Alice"));
        assert!(manager.is_empty());
        assert!(manager.remove_client(&client_id).is_none());
    }

    #[test]
    fn test_find_by_nick() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = mpsc::unbounded_channel();

        let alice = manager.add_client(test_addr(), tx.clone()).unwrap();
        let _bob = manager.add_client(test_addr2(), tx).unwrap();
        assert!(manager.set_nick(alice, "Alice"));
        assert!(!manager.set_nick(999, "Ghost"));

        assert_eq!(manager.find_by_nick("Alice"), Some(alice));
        assert_eq!(manager.find_by_nick("Bob"), None);
        assert_eq!(manager.nick(alice), Some("Alice"));
    }

    #[test]
    fn test_broadcast_skips_unjoined_and_excluded() {
        let mut manager = ClientManager::new(3);
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let (tx3, mut rx3) = mpsc::unbounded_channel();

        let alice = manager.add_client(test_addr(), tx1).unwrap();
        let bob = manager.add_client(test_addr2(), tx2).unwrap();
        let _lurker = manager.add_client(test_addr2(), tx3).unwrap();
        manager.set_nick(alice, "Alice");
        manager.set_nick(bob, "Bob");

        let command = Command::new("newturn", "4");
        assert_eq!(manager.broadcast(&command, Some(bob)), 1);

        assert_eq!(rx1.try_recv().unwrap(), command);
        assert!(rx2.try_recv().is_err());
        assert!(rx3.try_recv().is_err());
    }

    #[test]
    fn test_send_to_closed_queue() {
        let mut manager = ClientManager::new(1);
        let (tx, rx) = mpsc::unbounded_channel();
        let client_id = manager.add_client(test_addr(), tx).unwrap();

        assert!(manager.send_to(client_id, Command::new("picknick", "")));
        drop(rx);
        assert!(!manager.send_to(client_id, Command::new("picknick", "")));
        assert!(!manager.send_to(999, Command::new("picknick", "")));
    }

    #[test]
    fn test_removed_client_queue_drains_then_ends() {
        let mut manager = ClientManager::new(1);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client_id = manager.add_client(test_addr(), tx).unwrap();

        let mut writer = task::spawn(rx.recv());
        assert_pending!(writer.poll());
        assert!(manager.send_to(client_id, Command::new("chat", "bye")));
        assert!(writer.is_woken());
        assert_ready_eq!(writer.poll(), Some(Command::new("chat", "bye")));
        drop(writer);

        assert!(manager.send_to(client_id, Command::new("chat", "last")));
        manager.remove_client(&client_id);
        let mut writer = task::spawn(rx.recv());
        assert_ready_eq!(writer.poll(), Some(Command::new("chat", "last")));
        drop(writer);
        let mut writer = task::spawn(rx.recv());
        assert_ready_eq!(writer.poll(), None);
    }
}
