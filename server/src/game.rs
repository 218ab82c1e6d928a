//! Authoritative game state and turn simulation
//!
//! `ServerGame` never touches sockets. Every operation returns the commands
//! that describe its effect and the network layer decides who receives them.

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use shared::commands::*;
use shared::world::{
    Creature, CreatureDefinition, MapLight, Player, RoomType, Seat, Tile, TileType, Weapon,
    TILE_FULL,
};
use shared::{Command, GameMap, RenderQueue, SessionClock, TileCoord};
use std::path::Path;
use thiserror::Error;

/// Nick of the server's own placeholder player; no client may take it.
pub const SERVER_NICK: &str = "Server";
/// Fullness removed from a marked tile each turn.
pub const DIG_RATE: f64 = 25.0;
/// Gold mined per point of fullness dug out of a gold tile.
pub const GOLD_PER_FULLNESS: f64 = 10.0;
/// A wandering creature gets new orders every this many turns.
pub const WANDER_INTERVAL: i64 = 3;
pub const MIN_MAP_SIZE: i32 = 16;
pub const STARTING_GOLD: i32 = 1000;

const GOLD_VEIN_CHANCE: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("nick `{0}` is already in use")]
    NickTaken(String),
    #[error("nick `{0}` is not allowed")]
    InvalidNick(String),
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    world: GameMap,
    turn_number: i64,
    turns_per_second: f64,
}

pub struct ServerGame {
    world: GameMap,
    clock: SessionClock,
    rng: StdRng,
    render: RenderQueue,
}

impl ServerGame {
    pub fn new(world: GameMap, turns_per_second: f64, seed: u64) -> Self {
        Self {
            world,
            clock: SessionClock::new(turns_per_second),
            rng: StdRng::seed_from_u64(seed),
            render: RenderQueue::disabled(),
        }
    }

    pub fn generate(width: i32, height: i32, seed: u64, turns_per_second: f64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let world = generate_map(width, height, &mut rng);
        Self {
            world,
            clock: SessionClock::new(turns_per_second),
            rng,
            render: RenderQueue::disabled(),
        }
    }

    pub fn world(&self) -> &GameMap {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut GameMap {
        &mut self.world
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    /// Registers a player, gives them a seat if one is free, and returns the
    /// commands that bring their client up to date.
    pub fn join(&mut self, nick: &str) -> Result<Vec<Command>, JoinError> {
        let valid = !nick.is_empty()
            && !nick.contains(':')
            && !nick.chars().any(char::is_whitespace);
        if !valid {
            return Err(JoinError::InvalidNick(nick.to_string()));
        }
        if self.world.player(nick).is_some() {
            return Err(JoinError::NickTaken(nick.to_string()));
        }

        let mut player = Player::new(nick);
        player.seat = self.world.pop_empty_seat();
        match &player.seat {
            Some(seat) => info!("Player {} takes seat {}", nick, seat.color),
            None => info!("Player {} joins without a seat", nick),
        }
        self.world.add_player(player);

        Ok(self.world_stream(nick))
    }

    pub fn leave(&mut self, nick: &str) {
        if self.world.remove_player(nick).is_some() {
            info!("Player {} left", nick);
        }
    }

    /// The whole map as seen by `nick`. Their own seat comes first so the
    /// client claims it.
    pub fn world_stream(&self, nick: &str) -> Vec<Command> {
        let mut commands = vec![
            Command::new(NEW_MAP, ""),
            Command::new(TURNS_PER_SECOND, self.clock.turns_per_second().to_string()),
        ];

        let own_seat = self.world.player(nick).and_then(|player| player.seat.clone());
        let own_color = own_seat.as_ref().map(|seat| seat.color);
        if let Some(seat) = own_seat {
            commands.push(Command::new(ADD_SEAT, seat.to_string()));
        }
        for seat in self
            .world
            .filled_seats()
            .iter()
            .chain(self.world.empty_seats())
            .filter(|seat| Some(seat.color) != own_color)
        {
            commands.push(Command::new(ADD_SEAT, seat.to_string()));
        }

        for player in self.world.players().filter(|player| player.nick != nick) {
            commands.push(Command::new(ADD_PLAYER, player.nick.clone()));
        }
        for definition in self.world.class_descriptions() {
            commands.push(Command::new(ADD_CLASS, definition.to_string()));
        }
        for tile in self.world.tiles() {
            commands.push(Command::new(ADD_TILE, tile.to_string()));
        }
        for room in self.world.rooms() {
            commands.push(Command::new(ADD_ROOM, room.to_string()));
        }
        for creature in self.world.creatures() {
            commands.push(Command::new(ADD_CREATURE, creature.to_string()));
        }
        for light in self.world.map_lights() {
            commands.push(Command::new(ADD_MAP_LIGHT, light.to_string()));
        }

        commands.push(Command::new(NEW_TURN, self.clock.turn_number().to_string()));
        commands
    }

    pub fn pick_up(&mut self, nick: &str, creature: &str) -> Option<Command> {
        if !self.world.pick_up_creature(nick, creature) {
            return None;
        }
        Some(Command::new(
            CREATURE_PICK_UP,
            format!("{}:{}", nick, creature),
        ))
    }

    pub fn drop_creature(&mut self, nick: &str, tile: TileCoord) -> Option<Command> {
        let name = self.world.drop_creature(nick, tile)?;
        debug!("{} dropped {} at ({}, {})", nick, name, tile.x, tile.y);
        Some(Command::new(
            CREATURE_DROP,
            format!("{}:{}:{}", nick, tile.x, tile.y),
        ))
    }

    pub fn mark_tile(&mut self, nick: &str, tile: TileCoord, marked: bool) -> bool {
        match self.world.mark_tile(tile, nick, marked) {
            Ok(changed) => changed,
            Err(e) => {
                warn!("{} cannot mark: {}", nick, e);
                false
            }
        }
    }

    /// Advances one turn and returns the commands to broadcast.
    pub fn advance_turn(&mut self) -> Vec<Command> {
        let turn = self.clock.advance();
        let mut commands = vec![Command::new(NEW_TURN, turn.to_string())];

        commands.extend(self.dig());
        if turn % WANDER_INTERVAL == 0 {
            commands.extend(self.wander());
        }

        let destroyed = self.world.do_room_upkeep(&self.render);
        for room in destroyed {
            info!("Room {} destroyed", room);
        }

        commands
    }

    fn dig(&mut self) -> Vec<Command> {
        let marked: Vec<(TileCoord, TileType, f64, String)> = self
            .world
            .marked_tiles()
            .filter_map(|tile| {
                let digger = tile.marked_by.iter().next()?.clone();
                Some((tile.coord(), tile.tile_type, tile.fullness, digger))
            })
            .collect();

        let mut commands = Vec::new();
        for (coord, tile_type, fullness, digger) in marked {
            let remaining = (fullness - DIG_RATE).max(0.0);
            if let Err(e) = self.world.set_tile_fullness(coord, remaining, &self.render) {
                warn!("Digging failed: {}", e);
                continue;
            }
            commands.push(Command::new(
                TILE_FULLNESS_CHANGE,
                format!("{}:{}:{}", remaining, coord.x, coord.y),
            ));

            if tile_type == TileType::Gold {
                let gold = ((fullness - remaining) * GOLD_PER_FULLNESS) as i32;
                let color = self.world.player(&digger).and_then(Player::color);
                if let Some(color) = color {
                    let stored = self.world.deposit_gold(color, gold, &self.render);
                    debug!("{} mined {} gold, {} stored", digger, gold, stored);
                }
            }
        }
        commands
    }

    /// Sends one idle creature walking to a random floor tile.
    fn wander(&mut self) -> Vec<Command> {
        let idle: Vec<String> = self
            .world
            .creatures()
            .filter(|creature| creature.held_by.is_none())
            .map(|creature| creature.name.clone())
            .collect();
        let floor: Vec<TileCoord> = self
            .world
            .tiles()
            .filter(|tile| !tile.is_solid())
            .map(Tile::coord)
            .collect();

        let (Some(name), Some(target)) = (
            idle.choose(&mut self.rng).cloned(),
            floor.choose(&mut self.rng).copied(),
        ) else {
            return Vec::new();
        };

        if let Some(creature) = self.world.animated_object_mut(&name) {
            creature.clear_destinations();
            creature.add_destination(target.x as f64, target.y as f64);
            creature.set_animation_state("Walk", true);
        }

        vec![
            Command::new(ANIMATED_OBJECT_CLEAR_DESTINATIONS, name.clone()),
            Command::new(
                ANIMATED_OBJECT_ADD_DESTINATION,
                format!("{}:{}:{}:0", name, target.x, target.y),
            ),
            Command::new(SET_OBJECT_ANIMATION_STATE, format!("{}:Walk:true", name)),
        ]
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let snapshot = Snapshot {
            world: self.world.clone(),
            turn_number: self.clock.turn_number(),
            turns_per_second: self.clock.turns_per_second(),
        };
        let data = bincode::serialize(&snapshot)?;
        std::fs::write(path, data)?;
        info!("Saved snapshot to {}", path.display());
        Ok(())
    }

    /// Restores a saved world. Players from the saved session are dropped.
    pub fn load_snapshot(path: &Path, seed: u64) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read(path)?;
        let snapshot: Snapshot = bincode::deserialize(&data)?;

        let mut game = Self::new(snapshot.world, snapshot.turns_per_second, seed);
        game.clock.set_turn_number(snapshot.turn_number);

        let stale: Vec<String> = game.world.players().map(|p| p.nick.clone()).collect();
        for nick in stale {
            game.world.remove_player(&nick);
        }
        info!(
            "Loaded snapshot from {} at turn {}",
            path.display(),
            snapshot.turn_number
        );
        Ok(game)
    }
}

fn class_descriptions() -> Vec<CreatureDefinition> {
    vec![
        CreatureDefinition {
            class_name: "Imp".to_string(),
            mesh_name: "Imp.mesh".to_string(),
            bed_mesh_name: "Bed".to_string(),
            bed_dim1: 1,
            bed_dim2: 1,
            max_hp: 30.0,
        },
        CreatureDefinition {
            class_name: "Troll".to_string(),
            mesh_name: "Troll.mesh".to_string(),
            bed_mesh_name: "TrollBed".to_string(),
            bed_dim1: 2,
            bed_dim2: 1,
            max_hp: 80.0,
        },
    ]
}

/// Rock border, dirt interior with gold veins, and one claimed base per seat.
pub fn generate_map(width: i32, height: i32, rng: &mut StdRng) -> GameMap {
    let width = width.max(MIN_MAP_SIZE);
    let height = height.max(MIN_MAP_SIZE);
    let render = RenderQueue::disabled();
    let mut world = GameMap::new(SERVER_NICK);

    let starts = [(4, 4, 1u32), (width - 5, height - 5, 2u32)];
    let claimed = |x: i32, y: i32| {
        starts
            .iter()
            .any(|(sx, sy, _)| (x - sx).abs() <= 2 && (y - sy).abs() <= 2)
    };

    for x in 0..width {
        for y in 0..height {
            let tile = if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
                Tile::new(x, y, TileType::Rock, TILE_FULL)
            } else if claimed(x, y) {
                Tile::new(x, y, TileType::Claimed, 0.0)
            } else if rng.gen_bool(GOLD_VEIN_CHANCE) {
                Tile::new(x, y, TileType::Gold, TILE_FULL)
            } else {
                Tile::new(x, y, TileType::Dirt, TILE_FULL)
            };
            world.add_tile(tile, &render);
        }
    }

    for definition in class_descriptions() {
        world.add_class_description(definition);
    }

    for (sx, sy, color) in starts {
        world.add_empty_seat(Seat {
            color,
            faction: "Keepers".to_string(),
            starting_x: sx,
            starting_y: sy,
            gold: STARTING_GOLD,
            mana: 0.0,
        });
        build_base(&mut world, sx, sy, color, &render);
    }

    world
}

fn build_base(world: &mut GameMap, sx: i32, sy: i32, color: u32, render: &RenderQueue) {
    let c = TileCoord::new;
    let layout: [(RoomType, Vec<TileCoord>); 4] = [
        (RoomType::DungeonTemple, vec![c(sx, sy)]),
        (
            RoomType::Quarters,
            vec![c(sx - 2, sy + 1), c(sx - 1, sy + 1), c(sx - 2, sy + 2), c(sx - 1, sy + 2)],
        ),
        // Built in two steps so the second half absorbs the first.
        (RoomType::Treasury, vec![c(sx + 1, sy + 1)]),
        (RoomType::Treasury, vec![c(sx + 2, sy + 1)]),
    ];
    for (room_type, tiles) in layout {
        if let Err(e) = world.build_room(room_type, &tiles, color, render) {
            warn!("Could not build {} for seat {}: {}", room_type, color, e);
        }
    }
    world.deposit_gold(color, STARTING_GOLD, render);

    for definition in class_descriptions() {
        let name = format!("{}_{}", definition.class_name, color);
        let mut creature = Creature::new(name.clone(), definition.class_name.clone(), color);
        creature.position = (sx as f64, sy as f64, 0.0);
        creature.hp = definition.max_hp;
        if definition.class_name == "Troll" {
            creature.weapon_r = Weapon {
                name: "Club".to_string(),
                damage: 6.0,
                range: 1.0,
                defense: 0.0,
            };
        }
        world.add_creature(creature, render);
        if world.assign_bed(&name, render).is_none() {
            debug!("No bed for {}", name);
        }
    }

    world.add_map_light(
        MapLight {
            name: format!("Light_{}", color),
            position: (sx as f64, sy as f64, 3.0),
            diffuse: (0.8, 0.6, 0.4),
            attenuation_range: 12.0,
        },
        render,
    );
}
