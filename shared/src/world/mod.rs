//! The World Model: game map, entities and rooms
//!
//! Entities are stored in maps keyed by the identifier the protocol carries
//! (tile coordinates, nicknames, creature/room/light names). Operations that
//! resolve an identifier return `Option`/`bool`/`Result` so a stale or unknown
//! reference from the network is a no-op for the caller to report.
//!
//! Both peers wrap the map in a [`SharedWorld`]; the write guard is the single
//! exclusive token for mutation.

mod creature;
mod light;
mod player;
pub mod room;
mod tile;

pub use creature::{Creature, CreatureDefinition, Weapon, NO_WEAPON};
pub use light::MapLight;
pub use player::{Player, Seat};
pub use room::{Room, RoomType};
pub use tile::{Tile, TileType, TILE_FULL};

use crate::error::WorldError;
use crate::render::{RenderQueue, RenderRequest};
use log::debug;
use room::DEFAULT_TILE_HP;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub type SharedWorld = Arc<RwLock<GameMap>>;

pub fn shared_world(map: GameMap) -> SharedWorld {
    Arc::new(RwLock::new(map))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// North, east, south, west.
    pub fn neighbors(self) -> [TileCoord; 4] {
        [
            TileCoord::new(self.x, self.y + 1),
            TileCoord::new(self.x + 1, self.y),
            TileCoord::new(self.x, self.y - 1),
            TileCoord::new(self.x - 1, self.y),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMap {
    me: Player,
    tiles: BTreeMap<TileCoord, Tile>,
    players: BTreeMap<String, Player>,
    empty_seats: Vec<Seat>,
    filled_seats: Vec<Seat>,
    class_descriptions: BTreeMap<String, CreatureDefinition>,
    creatures: BTreeMap<String, Creature>,
    rooms: BTreeMap<String, Room>,
    map_lights: BTreeMap<String, MapLight>,
    next_room_id: u32,
}

impl GameMap {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            me: Player::new(nick),
            tiles: BTreeMap::new(),
            players: BTreeMap::new(),
            empty_seats: Vec::new(),
            filled_seats: Vec::new(),
            class_descriptions: BTreeMap::new(),
            creatures: BTreeMap::new(),
            rooms: BTreeMap::new(),
            map_lights: BTreeMap::new(),
            next_room_id: 1,
        }
    }

    pub fn me(&self) -> &Player {
        &self.me
    }

    pub fn me_mut(&mut self) -> &mut Player {
        &mut self.me
    }

    /// Forgets every entity. The local player keeps their nick only.
    pub fn clear_all(&mut self) {
        self.tiles.clear();
        self.players.clear();
        self.empty_seats.clear();
        self.filled_seats.clear();
        self.class_descriptions.clear();
        self.creatures.clear();
        self.rooms.clear();
        self.map_lights.clear();
        self.next_room_id = 1;
        self.me.seat = None;
        self.me.held_creatures.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
            && self.players.is_empty()
            && self.creatures.is_empty()
            && self.rooms.is_empty()
            && self.map_lights.is_empty()
    }

    // Tiles

    /// Adds or replaces a tile and refreshes the meshes of its neighbourhood.
    pub fn add_tile(&mut self, tile: Tile, render: &RenderQueue) {
        let coord = tile.coord();
        self.tiles.insert(coord, tile);
        self.refresh_tile_mesh(coord, true, render);
        for neighbor in coord.neighbors() {
            self.refresh_tile_mesh(neighbor, false, render);
        }
    }

    pub fn tile(&self, coord: TileCoord) -> Option<&Tile> {
        self.tiles.get(&coord)
    }

    pub fn tile_mut(&mut self, coord: TileCoord) -> Option<&mut Tile> {
        self.tiles.get_mut(&coord)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    pub fn num_tiles(&self) -> usize {
        self.tiles.len()
    }

    pub fn set_tile_fullness(
        &mut self,
        coord: TileCoord,
        fullness: f64,
        render: &RenderQueue,
    ) -> Result<(), WorldError> {
        let tile = self
            .tiles
            .get_mut(&coord)
            .ok_or(WorldError::NoSuchTile(coord.x, coord.y))?;
        tile.fullness = fullness.max(0.0);
        if !tile.is_solid() {
            tile.marked_by.clear();
        }

        self.refresh_tile_mesh(coord, true, render);
        for neighbor in coord.neighbors() {
            self.refresh_tile_mesh(neighbor, false, render);
        }
        Ok(())
    }

    /// Solid-neighbour bits: N=1, E=2, S=4, W=8. Off-map counts as solid.
    fn neighbor_mask(&self, coord: TileCoord) -> u8 {
        coord
            .neighbors()
            .iter()
            .enumerate()
            .filter(|(_, neighbor)| self.tiles.get(*neighbor).map_or(true, Tile::is_solid))
            .fold(0, |mask, (bit, _)| mask | (1 << bit))
    }

    /// Requests a new mesh when the neighbour mask changed, or always if `force`.
    pub fn refresh_tile_mesh(&mut self, coord: TileCoord, force: bool, render: &RenderQueue) {
        let mask = self.neighbor_mask(coord);
        let Some(tile) = self.tiles.get_mut(&coord) else {
            return;
        };
        if !force && tile.neighbor_mask == Some(mask) {
            return;
        }
        tile.neighbor_mask = Some(mask);
        render.queue(RenderRequest::RefreshTile {
            tile: coord,
            mesh: tile.mesh_name(mask),
        });
    }

    /// Returns whether the mark changed.
    pub fn mark_tile(&mut self, coord: TileCoord, nick: &str, marked: bool) -> Result<bool, WorldError> {
        let tile = self
            .tiles
            .get_mut(&coord)
            .ok_or(WorldError::NoSuchTile(coord.x, coord.y))?;
        if marked && !tile.is_diggable() {
            return Ok(false);
        }
        Ok(tile.set_marked(nick, marked))
    }

    pub fn marked_tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values().filter(|tile| !tile.marked_by.is_empty())
    }

    // Seats and players

    pub fn add_empty_seat(&mut self, seat: Seat) {
        self.empty_seats.push(seat);
    }

    /// Moves the first empty seat to the filled list.
    pub fn pop_empty_seat(&mut self) -> Option<Seat> {
        if self.empty_seats.is_empty() {
            return None;
        }
        let seat = self.empty_seats.remove(0);
        self.filled_seats.push(seat.clone());
        Some(seat)
    }

    /// Gives a seat back, e.g. when its player leaves.
    pub fn release_seat(&mut self, color: u32) {
        if let Some(index) = self.filled_seats.iter().position(|seat| seat.color == color) {
            let seat = self.filled_seats.remove(index);
            self.empty_seats.push(seat);
        }
    }

    pub fn empty_seats(&self) -> &[Seat] {
        &self.empty_seats
    }

    pub fn filled_seats(&self) -> &[Seat] {
        &self.filled_seats
    }

    /// Fails when the nick is already taken.
    pub fn add_player(&mut self, player: Player) -> bool {
        if player.nick == self.me.nick || self.players.contains_key(&player.nick) {
            return false;
        }
        self.players.insert(player.nick.clone(), player);
        true
    }

    /// Looks up any player, the local one included.
    pub fn player(&self, nick: &str) -> Option<&Player> {
        if nick == self.me.nick {
            Some(&self.me)
        } else {
            self.players.get(nick)
        }
    }

    pub fn player_mut(&mut self, nick: &str) -> Option<&mut Player> {
        if nick == self.me.nick {
            Some(&mut self.me)
        } else {
            self.players.get_mut(nick)
        }
    }

    /// Removes a remote player, dropping whatever they held where it was.
    pub fn remove_player(&mut self, nick: &str) -> Option<Player> {
        let player = self.players.remove(nick)?;
        for name in &player.held_creatures {
            if let Some(creature) = self.creatures.get_mut(name) {
                creature.held_by = None;
            }
        }
        if let Some(color) = player.color() {
            self.release_seat(color);
        }
        Some(player)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn num_players(&self) -> usize {
        self.players.len()
    }

    // Creature classes and creatures

    pub fn add_class_description(&mut self, definition: CreatureDefinition) {
        self.class_descriptions
            .insert(definition.class_name.clone(), definition);
    }

    pub fn class_description(&self, class_name: &str) -> Option<&CreatureDefinition> {
        self.class_descriptions.get(class_name)
    }

    pub fn class_descriptions(&self) -> impl Iterator<Item = &CreatureDefinition> {
        self.class_descriptions.values()
    }

    /// Adds a creature and requests its meshes. An unknown class falls back
    /// to a mesh named after the class.
    pub fn add_creature(&mut self, creature: Creature, render: &RenderQueue) {
        let mesh = self
            .class_descriptions
            .get(&creature.class_name)
            .map(|definition| definition.mesh_name.clone())
            .unwrap_or_else(|| format!("{}.mesh", creature.class_name));
        if let Some(old) = self.creatures.remove(&creature.name) {
            debug!("Replacing creature {}", old.name);
            old.destroy_meshes(render);
        }
        creature.create_meshes(&mesh, render);
        self.creatures.insert(creature.name.clone(), creature);
    }

    pub fn creature(&self, name: &str) -> Option<&Creature> {
        self.creatures.get(name)
    }

    pub fn creature_mut(&mut self, name: &str) -> Option<&mut Creature> {
        self.creatures.get_mut(name)
    }

    /// Creatures are the only movable, animated objects on the map.
    pub fn animated_object_mut(&mut self, name: &str) -> Option<&mut Creature> {
        self.creatures.get_mut(name)
    }

    pub fn creatures(&self) -> impl Iterator<Item = &Creature> {
        self.creatures.values()
    }

    pub fn num_creatures(&self) -> usize {
        self.creatures.len()
    }

    /// Puts a creature into a player's hand. Both must exist and the
    /// creature must not already be held.
    pub fn pick_up_creature(&mut self, nick: &str, creature_name: &str) -> bool {
        let Some(creature) = self.creatures.get_mut(creature_name) else {
            return false;
        };
        if creature.held_by.is_some() {
            return false;
        }
        let player = if nick == self.me.nick {
            Some(&mut self.me)
        } else {
            self.players.get_mut(nick)
        };
        let Some(player) = player else {
            return false;
        };

        creature.held_by = Some(nick.to_string());
        player.held_creatures.push(creature_name.to_string());
        true
    }

    /// Drops the creature most recently picked up by `nick` onto `coord`.
    /// Returns its name.
    pub fn drop_creature(&mut self, nick: &str, coord: TileCoord) -> Option<String> {
        if !self.tiles.contains_key(&coord) {
            return None;
        }
        let player = if nick == self.me.nick {
            &mut self.me
        } else {
            self.players.get_mut(nick)?
        };
        let name = player.held_creatures.pop()?;

        if let Some(creature) = self.creatures.get_mut(&name) {
            creature.held_by = None;
            creature.position = (coord.x as f64, coord.y as f64, 0.0);
            creature.clear_destinations();
        }
        Some(name)
    }

    // Map lights

    pub fn add_map_light(&mut self, light: MapLight, render: &RenderQueue) {
        if let Some(old) = self.map_lights.remove(&light.name) {
            debug!("Replacing map light {}", old.name);
            old.destroy_mesh(render);
        }
        light.create_mesh(render);
        self.map_lights.insert(light.name.clone(), light);
    }

    pub fn map_light(&self, name: &str) -> Option<&MapLight> {
        self.map_lights.get(name)
    }

    pub fn remove_map_light(&mut self, name: &str, render: &RenderQueue) -> bool {
        match self.map_lights.remove(name) {
            Some(light) => {
                light.destroy_mesh(render);
                true
            }
            None => false,
        }
    }

    pub fn map_lights(&self) -> impl Iterator<Item = &MapLight> {
        self.map_lights.values()
    }

    // Rooms

    /// Adds a room received as a whole. Tiles that are missing from the map
    /// or covered by another room are dropped from it.
    pub fn add_room(&mut self, mut room: Room, render: &RenderQueue) {
        if let Some(old) = self.rooms.remove(room.name()) {
            debug!("Replacing room {}", old.name());
            for coord in old.covered_tiles() {
                if let Some(tile) = self.tiles.get_mut(coord) {
                    tile.covering_room = None;
                }
            }
            old.destroy_mesh(render);
        }

        let rejected: Vec<TileCoord> = room
            .covered_tiles()
            .iter()
            .copied()
            .filter(|coord| match self.tiles.get(coord) {
                Some(tile) => tile
                    .covering_room
                    .as_deref()
                    .is_some_and(|owner| owner != room.name()),
                None => true,
            })
            .collect();
        for coord in rejected {
            debug!("Room {} dropped tile ({}, {})", room.name(), coord.x, coord.y);
            room.remove_covered_tile(coord, render);
        }

        for coord in room.covered_tiles() {
            if let Some(tile) = self.tiles.get_mut(coord) {
                tile.covering_room = Some(room.name().to_string());
            }
        }
        room.create_mesh(render);
        self.rooms.insert(room.name().to_string(), room);
    }

    pub fn room(&self, name: &str) -> Option<&Room> {
        self.rooms.get(name)
    }

    pub fn room_mut(&mut self, name: &str) -> Option<&mut Room> {
        self.rooms.get_mut(name)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn num_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn next_room_name(&mut self, room_type: RoomType) -> String {
        loop {
            let name = format!("{}_{}", room_type, self.next_room_id);
            self.next_room_id += 1;
            if !self.rooms.contains_key(&name) {
                return name;
            }
        }
    }

    /// Builds a new room over `coords` and absorbs every adjacent room of
    /// the same type and colour into it. Returns the surviving room's name.
    pub fn build_room(
        &mut self,
        room_type: RoomType,
        coords: &[TileCoord],
        color: u32,
        render: &RenderQueue,
    ) -> Result<String, WorldError> {
        for coord in coords {
            let tile = self
                .tiles
                .get(coord)
                .ok_or(WorldError::NoSuchTile(coord.x, coord.y))?;
            if let Some(owner) = &tile.covering_room {
                return Err(WorldError::TileAlreadyCovered(coord.x, coord.y, owner.clone()));
            }
        }

        let name = self.next_room_name(room_type);
        let mut room = Room::new(room_type, name.clone(), color);
        for coord in coords {
            room.add_covered_tile(*coord, DEFAULT_TILE_HP);
        }

        let mut neighbors: Vec<String> = Vec::new();
        for coord in coords {
            for neighbor in coord.neighbors() {
                let owner = self
                    .tiles
                    .get(&neighbor)
                    .and_then(|tile| tile.covering_room.clone());
                if let Some(owner) = owner {
                    let matches = self
                        .rooms
                        .get(&owner)
                        .is_some_and(|other| other.room_type() == room_type && other.color() == color);
                    if matches && !neighbors.contains(&owner) {
                        neighbors.push(owner);
                    }
                }
            }
        }

        for donor_name in neighbors {
            if let Some(donor) = self.rooms.remove(&donor_name) {
                debug!("Room {} absorbs {}", name, donor_name);
                room.absorb_room(donor, render);
            }
        }

        for coord in room.covered_tiles() {
            if let Some(tile) = self.tiles.get_mut(coord) {
                tile.covering_room = Some(name.clone());
            }
        }
        room.create_mesh(render);
        self.rooms.insert(name.clone(), room);
        Ok(name)
    }

    /// Uncovers one tile. Returns the creatures that lost their bed.
    pub fn remove_covered_tile(&mut self, coord: TileCoord, render: &RenderQueue) -> Vec<String> {
        let Some(owner) = self
            .tiles
            .get_mut(&coord)
            .and_then(|tile| tile.covering_room.take())
        else {
            return Vec::new();
        };
        let Some(room) = self.rooms.get_mut(&owner) else {
            return Vec::new();
        };

        let evicted = room.remove_covered_tile(coord, render);
        if room.num_covered_tiles() == 0 {
            if let Some(room) = self.rooms.remove(&owner) {
                room.destroy_mesh(render);
            }
        }
        self.clear_home_tiles(&evicted);
        evicted
    }

    /// Runs upkeep on every room and destroys the ones left without tiles.
    /// Returns the names of the destroyed rooms.
    pub fn do_room_upkeep(&mut self, render: &RenderQueue) -> Vec<String> {
        let mut destroyed = Vec::new();
        let mut evicted = Vec::new();

        for (name, room) in self.rooms.iter_mut() {
            let report = room.do_upkeep(render);
            for coord in &report.removed_tiles {
                if let Some(tile) = self.tiles.get_mut(coord) {
                    tile.covering_room = None;
                }
            }
            evicted.extend(report.evicted);
            if !report.alive {
                destroyed.push(name.clone());
            }
        }

        for name in &destroyed {
            if let Some(room) = self.rooms.remove(name) {
                room.destroy_mesh(render);
            }
        }
        self.clear_home_tiles(&evicted);
        destroyed
    }

    fn clear_home_tiles(&mut self, creatures: &[String]) {
        for name in creatures {
            if let Some(creature) = self.creatures.get_mut(name) {
                creature.home_tile = None;
            }
        }
    }

    // Treasuries and quarters

    /// Gold stored across all treasuries of one colour.
    pub fn total_gold(&self, color: u32) -> i32 {
        self.rooms
            .values()
            .filter(|room| room.color() == color)
            .filter_map(Room::treasury)
            .map(|treasury| treasury.total_gold())
            .sum()
    }

    /// Spreads `gold` over the treasuries of one colour. Returns how much fit.
    pub fn deposit_gold(&mut self, color: u32, gold: i32, render: &RenderQueue) -> i32 {
        let mut deposited = 0;
        for room in self.rooms.values_mut().filter(|room| room.color() == color) {
            if deposited >= gold {
                break;
            }
            let name = room.name().to_string();
            let Some(first) = room.covered_tiles().first().copied() else {
                continue;
            };
            if let Some(treasury) = room.treasury_mut() {
                deposited += treasury.deposit_gold(&name, gold - deposited, first, render);
            }
        }
        deposited
    }

    /// Takes up to `gold` from the treasuries of one colour.
    pub fn withdraw_gold(&mut self, color: u32, gold: i32, render: &RenderQueue) -> i32 {
        let mut withdrawn = 0;
        for room in self.rooms.values_mut().filter(|room| room.color() == color) {
            if withdrawn >= gold {
                break;
            }
            let name = room.name().to_string();
            if let Some(treasury) = room.treasury_mut() {
                withdrawn += treasury.withdraw_gold(&name, gold - withdrawn, render);
            }
        }
        withdrawn
    }

    /// Finds a bed for a creature in any quarters of its colour.
    pub fn assign_bed(&mut self, creature_name: &str, render: &RenderQueue) -> Option<TileCoord> {
        let creature = self.creatures.get(creature_name)?;
        if let Some(home) = creature.home_tile {
            return Some(home);
        }
        let color = creature.color;
        let definition = self.class_descriptions.get(&creature.class_name)?;
        let bed_mesh = definition.bed_mesh_name.clone();
        let dims = (definition.bed_dim1, definition.bed_dim2);

        for room in self.rooms.values_mut().filter(|room| room.color() == color) {
            let name = room.name().to_string();
            let Some(quarters) = room.quarters_mut() else {
                continue;
            };
            let Some(anchor) = quarters
                .location_for_bed(dims.0, dims.1)
                .or_else(|| quarters.location_for_bed(dims.1, dims.0))
            else {
                continue;
            };
            if quarters.claim_tile_for_sleeping(&name, anchor, creature_name, &bed_mesh, dims, render) {
                if let Some(creature) = self.creatures.get_mut(creature_name) {
                    creature.home_tile = Some(anchor);
                }
                return Some(anchor);
            }
        }
        None
    }

    pub fn release_bed(&mut self, creature_name: &str, render: &RenderQueue) -> bool {
        let Some(home) = self
            .creatures
            .get_mut(creature_name)
            .and_then(|creature| creature.home_tile.take())
        else {
            return false;
        };
        let Some(owner) = self.tiles.get(&home).and_then(|tile| tile.covering_room.clone()) else {
            return false;
        };

        self.rooms
            .get_mut(&owner)
            .and_then(Room::quarters_mut)
            .is_some_and(|quarters| {
                quarters.release_tile_for_sleeping(&owner, home, creature_name, render)
            })
    }
}
