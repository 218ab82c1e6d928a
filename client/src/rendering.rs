//! Headless render loop
//!
//! Applies the render requests queued by the World Model and keeps track of
//! which meshes are alive. It draws nothing; it is the rendering collaborator
//! for the console client and for tests.

use log::{debug, trace};
use shared::render::Hand;
use shared::{RenderReceiver, RenderRequest, TileCoord};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    pub frame: u64,
    pub applied: usize,
    pub live_meshes: usize,
}

#[derive(Debug, Default)]
pub struct Renderer {
    tiles: HashMap<TileCoord, String>,
    rooms: HashSet<String>,
    indicators: HashMap<(String, TileCoord), String>,
    beds: HashMap<(String, TileCoord), String>,
    creatures: HashMap<String, String>,
    weapons: HashMap<(String, Hand), String>,
    lights: HashSet<String>,
    frame: u64,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, request: RenderRequest) {
        trace!("Render request {:?}", request);
        let existed = match request {
            RenderRequest::RefreshTile { tile, mesh } => {
                self.tiles.insert(tile, mesh);
                true
            }
            RenderRequest::CreateRoom { room } => {
                self.rooms.insert(room);
                true
            }
            RenderRequest::DestroyRoom { room } => self.rooms.remove(&room),
            RenderRequest::CreateTreasuryIndicator { room, tile, mesh } => {
                self.indicators.insert((room, tile), mesh);
                true
            }
            RenderRequest::DestroyTreasuryIndicator { room, tile, .. } => {
                self.indicators.remove(&(room, tile)).is_some()
            }
            RenderRequest::CreateBed {
                room, tile, mesh, ..
            } => {
                self.beds.insert((room, tile), mesh);
                true
            }
            RenderRequest::DestroyBed { room, tile } => self.beds.remove(&(room, tile)).is_some(),
            RenderRequest::CreateCreature { creature, mesh } => {
                self.creatures.insert(creature, mesh);
                true
            }
            RenderRequest::DestroyCreature { creature } => {
                self.creatures.remove(&creature).is_some()
            }
            RenderRequest::CreateWeapon {
                creature,
                weapon,
                hand,
            } => {
                self.weapons.insert((creature, hand), weapon);
                true
            }
            RenderRequest::DestroyWeapon { creature, hand } => {
                self.weapons.remove(&(creature, hand)).is_some()
            }
            RenderRequest::CreateMapLight { light } => {
                self.lights.insert(light);
                true
            }
            RenderRequest::DestroyMapLight { light } => self.lights.remove(&light),
        };

        if !existed {
            debug!("Destroy request for a mesh that was never created");
        }
    }

    /// Applies every queued request, then counts one frame.
    pub fn render(&mut self, requests: &mut RenderReceiver) -> FrameStats {
        let mut applied = 0;
        while let Ok(request) = requests.try_recv() {
            self.apply(request);
            applied += 1;
        }
        self.frame += 1;

        FrameStats {
            frame: self.frame,
            applied,
            live_meshes: self.live_meshes(),
        }
    }

    pub fn live_meshes(&self) -> usize {
        self.tiles.len()
            + self.rooms.len()
            + self.indicators.len()
            + self.beds.len()
            + self.creatures.len()
            + self.weapons.len()
            + self.lights.len()
    }

    pub fn tile_mesh(&self, tile: TileCoord) -> Option<&str> {
        self.tiles.get(&tile).map(String::as_str)
    }

    pub fn has_room(&self, room: &str) -> bool {
        self.rooms.contains(room)
    }

    pub fn indicator(&self, room: &str, tile: TileCoord) -> Option<&str> {
        self.indicators
            .get(&(room.to_string(), tile))
            .map(String::as_str)
    }

    pub fn has_creature(&self, creature: &str) -> bool {
        self.creatures.contains_key(creature)
    }

    pub fn num_weapons(&self) -> usize {
        self.weapons.len()
    }
}
