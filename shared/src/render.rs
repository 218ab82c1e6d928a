//! Render requests handed to the rendering collaborator
//!
//! World Model code never touches meshes directly. It queues a typed request
//! which the render loop applies before drawing the next frame.

use crate::world::TileCoord;
use log::debug;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum RenderRequest {
    /// A tile's mesh must be rebuilt for its current fullness and neighbours.
    RefreshTile { tile: TileCoord, mesh: String },
    CreateRoom { room: String },
    DestroyRoom { room: String },
    CreateTreasuryIndicator { room: String, tile: TileCoord, mesh: String },
    DestroyTreasuryIndicator { room: String, tile: TileCoord, mesh: String },
    CreateBed {
        room: String,
        tile: TileCoord,
        mesh: String,
        position: (f64, f64),
        rotation: f64,
    },
    DestroyBed { room: String, tile: TileCoord },
    CreateCreature { creature: String, mesh: String },
    DestroyCreature { creature: String },
    CreateWeapon { creature: String, weapon: String, hand: Hand },
    DestroyWeapon { creature: String, hand: Hand },
    CreateMapLight { light: String },
    DestroyMapLight { light: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hand {
    Left,
    Right,
}

/// Producer side of the render-request queue.
///
/// A disabled queue has no consumer and drops every request; the server uses
/// one since it never renders.
#[derive(Debug, Clone)]
pub struct RenderQueue {
    sender: Option<mpsc::UnboundedSender<RenderRequest>>,
}

pub type RenderReceiver = mpsc::UnboundedReceiver<RenderRequest>;

impl RenderQueue {
    pub fn channel() -> (Self, RenderReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn queue(&self, request: RenderRequest) {
        if let Some(sender) = &self.sender {
            if sender.send(request).is_err() {
                debug!("Render loop gone, dropping render request");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_delivers_in_order() {
        let (queue, mut receiver) = RenderQueue::channel();
        queue.queue(RenderRequest::CreateRoom {
            room: "Treasury_1".to_string(),
        });
        queue.queue(RenderRequest::DestroyRoom {
            room: "Treasury_1".to_string(),
        });

        assert!(matches!(
            receiver.try_recv(),
            Ok(RenderRequest::CreateRoom { .. })
        ));
        assert!(matches!(
            receiver.try_recv(),
            Ok(RenderRequest::DestroyRoom { .. })
        ));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_disabled_queue_drops_requests() {
        let queue = RenderQueue::disabled();
        queue.queue(RenderRequest::CreateMapLight {
            light: "Light_1".to_string(),
        });
    }
}
