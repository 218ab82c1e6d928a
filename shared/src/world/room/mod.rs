//! Rooms: groups of covered tiles with optional per-tile subtype state

mod quarters;
mod treasury;

pub use quarters::{Bed, Quarters};
pub use treasury::{Treasury, TreasuryTileFullness, MAX_GOLD_IN_BAG, MAX_GOLD_IN_CHEST};

use crate::codec::Fields;
use crate::error::ParseError;
use crate::render::{RenderQueue, RenderRequest};
use crate::world::TileCoord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Hit points a freshly covered tile starts with.
pub const DEFAULT_TILE_HP: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomType {
    DungeonTemple,
    Quarters,
    Treasury,
    Portal,
    Forge,
    Dojo,
}

const ROOM_TYPES: &[(&str, RoomType)] = &[
    ("DungeonTemple", RoomType::DungeonTemple),
    ("Quarters", RoomType::Quarters),
    ("Treasury", RoomType::Treasury),
    ("Portal", RoomType::Portal),
    ("Forge", RoomType::Forge),
    ("Dojo", RoomType::Dojo),
];

impl RoomType {
    pub fn as_str(self) -> &'static str {
        ROOM_TYPES
            .iter()
            .find(|(_, room_type)| *room_type == self)
            .map(|(name, _)| *name)
            .unwrap_or("Room")
    }
}

impl FromStr for RoomType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ROOM_TYPES
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, room_type)| *room_type)
            .ok_or_else(|| ParseError::UnknownRoomType(s.to_string()))
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-tile bookkeeping of a room subtype.
///
/// Every covered tile has exactly one entry. Entries for tiles arriving through
/// [`CoveredTileState::absorb`] must survive the `tile_added` that follows.
pub trait CoveredTileState {
    fn tile_added(&mut self, tile: TileCoord);
    /// Returns the creatures that lost their place in the room.
    fn tile_removed(&mut self, room: &str, tile: TileCoord, render: &RenderQueue) -> Vec<String>;
    fn absorb(&mut self, donor: &Self, donor_tiles: &[TileCoord])
    where
        Self: Sized;
    fn clear(&mut self);
    fn create_meshes(&self, room: &str, render: &RenderQueue);
    fn destroy_meshes(&self, room: &str, render: &RenderQueue);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RoomState {
    Plain,
    Treasury(Treasury),
    Quarters(Quarters),
}

impl RoomState {
    fn for_type(room_type: RoomType) -> Self {
        match room_type {
            RoomType::Treasury => Self::Treasury(Treasury::default()),
            RoomType::Quarters => Self::Quarters(Quarters::default()),
            _ => Self::Plain,
        }
    }

    fn tiles(&mut self) -> Option<&mut dyn CoveredTileState> {
        match self {
            Self::Plain => None,
            Self::Treasury(treasury) => Some(treasury),
            Self::Quarters(quarters) => Some(quarters),
        }
    }

    fn create_meshes(&self, room: &str, render: &RenderQueue) {
        match self {
            Self::Plain => {}
            Self::Treasury(treasury) => treasury.create_meshes(room, render),
            Self::Quarters(quarters) => quarters.create_meshes(room, render),
        }
    }

    fn destroy_meshes(&self, room: &str, render: &RenderQueue) {
        match self {
            Self::Plain => {}
            Self::Treasury(treasury) => treasury.destroy_meshes(room, render),
            Self::Quarters(quarters) => quarters.destroy_meshes(room, render),
        }
    }
}

/// What a room's upkeep changed.
#[derive(Debug, Default, PartialEq)]
pub struct UpkeepReport {
    pub removed_tiles: Vec<TileCoord>,
    pub evicted: Vec<String>,
    /// False once the room covers no tile and should be destroyed.
    pub alive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    name: String,
    room_type: RoomType,
    color: u32,
    covered_tiles: Vec<TileCoord>,
    tile_hp: BTreeMap<TileCoord, f64>,
    state: RoomState,
}

impl Room {
    pub fn new(room_type: RoomType, name: impl Into<String>, color: u32) -> Self {
        Self {
            name: name.into(),
            room_type,
            color,
            covered_tiles: Vec::new(),
            tile_hp: BTreeMap::new(),
            state: RoomState::for_type(room_type),
        }
    }

    /// Builds a room from `addroom` arguments: type tag followed by the body.
    pub fn from_arguments(arguments: &str) -> Result<Self, ParseError> {
        let mut fields = Fields::new(arguments);
        let room_type: RoomType = fields.text("room type")?.parse()?;
        let name = fields.text("name")?;
        let color = fields.parse("color")?;
        let count: usize = fields.parse("tile count")?;

        let mut room = Room::new(room_type, name, color);
        for _ in 0..count {
            let x = fields.parse("tile x")?;
            let y = fields.parse("tile y")?;
            room.add_covered_tile(TileCoord::new(x, y), DEFAULT_TILE_HP);
        }
        Ok(room)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn room_type(&self) -> RoomType {
        self.room_type
    }

    pub fn color(&self) -> u32 {
        self.color
    }

    pub fn covered_tiles(&self) -> &[TileCoord] {
        &self.covered_tiles
    }

    pub fn num_covered_tiles(&self) -> usize {
        self.covered_tiles.len()
    }

    pub fn covers(&self, tile: TileCoord) -> bool {
        self.tile_hp.contains_key(&tile)
    }

    pub fn tile_hp(&self, tile: TileCoord) -> Option<f64> {
        self.tile_hp.get(&tile).copied()
    }

    pub fn treasury(&self) -> Option<&Treasury> {
        match &self.state {
            RoomState::Treasury(treasury) => Some(treasury),
            _ => None,
        }
    }

    pub fn treasury_mut(&mut self) -> Option<&mut Treasury> {
        match &mut self.state {
            RoomState::Treasury(treasury) => Some(treasury),
            _ => None,
        }
    }

    pub fn quarters(&self) -> Option<&Quarters> {
        match &self.state {
            RoomState::Quarters(quarters) => Some(quarters),
            _ => None,
        }
    }

    pub fn quarters_mut(&mut self) -> Option<&mut Quarters> {
        match &mut self.state {
            RoomState::Quarters(quarters) => Some(quarters),
            _ => None,
        }
    }

    pub fn add_covered_tile(&mut self, tile: TileCoord, hp: f64) {
        if !self.covers(tile) {
            self.covered_tiles.push(tile);
        }
        self.tile_hp.insert(tile, hp);
        if let Some(state) = self.state.tiles() {
            state.tile_added(tile);
        }
    }

    /// Returns the creatures that lost their bed with this tile.
    pub fn remove_covered_tile(&mut self, tile: TileCoord, render: &RenderQueue) -> Vec<String> {
        if !self.covers(tile) {
            return Vec::new();
        }
        self.covered_tiles.retain(|covered| *covered != tile);
        self.tile_hp.remove(&tile);

        let name = self.name.clone();
        match self.state.tiles() {
            Some(state) => state.tile_removed(&name, tile, render),
            None => Vec::new(),
        }
    }

    pub fn clear_covered_tiles(&mut self) {
        self.covered_tiles.clear();
        self.tile_hp.clear();
        if let Some(state) = self.state.tiles() {
            state.clear();
        }
    }

    pub fn damage_tile(&mut self, tile: TileCoord, damage: f64) {
        if let Some(hp) = self.tile_hp.get_mut(&tile) {
            *hp -= damage;
        }
    }

    /// Takes over every tile of `donor`, keeping its per-tile state.
    ///
    /// The donor's gold and sleeping assignments are copied before its tiles
    /// are re-added here. Returns the tiles that changed owner.
    pub fn absorb_room(&mut self, donor: Room, render: &RenderQueue) -> Vec<TileCoord> {
        self.destroy_mesh(render);
        donor.destroy_mesh(render);

        match (&mut self.state, &donor.state) {
            (RoomState::Treasury(own), RoomState::Treasury(theirs)) => {
                own.absorb(theirs, &donor.covered_tiles)
            }
            (RoomState::Quarters(own), RoomState::Quarters(theirs)) => {
                own.absorb(theirs, &donor.covered_tiles)
            }
            _ => {}
        }

        for tile in &donor.covered_tiles {
            let hp = donor.tile_hp(*tile).unwrap_or(DEFAULT_TILE_HP);
            self.add_covered_tile(*tile, hp);
        }

        self.create_mesh(render);
        donor.covered_tiles
    }

    /// Drops covered tiles whose hit points ran out.
    pub fn do_upkeep(&mut self, render: &RenderQueue) -> UpkeepReport {
        let dead: Vec<TileCoord> = self
            .tile_hp
            .iter()
            .filter(|(_, hp)| **hp <= 0.0)
            .map(|(tile, _)| *tile)
            .collect();

        let mut report = UpkeepReport::default();
        for tile in dead {
            report.evicted.extend(self.remove_covered_tile(tile, render));
            report.removed_tiles.push(tile);
        }
        report.alive = !self.covered_tiles.is_empty();
        report
    }

    pub fn create_mesh(&self, render: &RenderQueue) {
        render.queue(RenderRequest::CreateRoom {
            room: self.name.clone(),
        });
        self.state.create_meshes(&self.name, render);
    }

    pub fn destroy_mesh(&self, render: &RenderQueue) {
        self.state.destroy_meshes(&self.name, render);
        render.queue(RenderRequest::DestroyRoom {
            room: self.name.clone(),
        });
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.room_type,
            self.name,
            self.color,
            self.covered_tiles.len()
        )?;
        for tile in &self.covered_tiles {
            write!(f, "\t{}\t{}", tile.x, tile.y)?;
        }
        Ok(())
    }
}
