use crate::codec::Fields;
use crate::error::ParseError;
use crate::world::TileCoord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Fullness of an undug tile.
pub const TILE_FULL: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileType {
    Nullground,
    Dirt,
    Gold,
    Rock,
    Water,
    Lava,
    Claimed,
}

const TILE_TYPES: &[(&str, TileType)] = &[
    ("Nullground", TileType::Nullground),
    ("Dirt", TileType::Dirt),
    ("Gold", TileType::Gold),
    ("Rock", TileType::Rock),
    ("Water", TileType::Water),
    ("Lava", TileType::Lava),
    ("Claimed", TileType::Claimed),
];

impl TileType {
    pub fn as_str(self) -> &'static str {
        TILE_TYPES
            .iter()
            .find(|(_, tile_type)| *tile_type == self)
            .map(|(name, _)| *name)
            .unwrap_or("Nullground")
    }
}

impl FromStr for TileType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TILE_TYPES
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, tile_type)| *tile_type)
            .ok_or_else(|| ParseError::UnknownTileType(s.to_string()))
    }
}

impl fmt::Display for TileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
    pub tile_type: TileType,
    pub fullness: f64,
    /// Name of the room covering this tile.
    pub covering_room: Option<String>,
    /// Solid-neighbour bits (N, E, S, W) the current mesh was built for.
    /// `None` until the first mesh refresh.
    pub neighbor_mask: Option<u8>,
    /// Players that marked this tile for digging.
    pub marked_by: BTreeSet<String>,
}

impl Tile {
    pub fn new(x: i32, y: i32, tile_type: TileType, fullness: f64) -> Self {
        Self {
            x,
            y,
            tile_type,
            fullness,
            covering_room: None,
            neighbor_mask: None,
            marked_by: BTreeSet::new(),
        }
    }

    pub fn coord(&self) -> TileCoord {
        TileCoord::new(self.x, self.y)
    }

    pub fn is_solid(&self) -> bool {
        self.fullness > 0.0
    }

    pub fn is_diggable(&self) -> bool {
        self.is_solid() && matches!(self.tile_type, TileType::Dirt | TileType::Gold)
    }

    /// Mesh for this tile given the solid-neighbour mask. Fully surrounded
    /// walls share one optimized mesh.
    pub fn mesh_name(&self, mask: u8) -> String {
        if !self.is_solid() {
            format!("{}_floor", self.tile_type)
        } else if mask == 0b1111 {
            format!("{}_inner", self.tile_type)
        } else {
            format!("{}_{:02}", self.tile_type, mask)
        }
    }

    /// Returns true when the mark changed.
    pub fn set_marked(&mut self, nick: &str, marked: bool) -> bool {
        if marked {
            self.marked_by.insert(nick.to_string())
        } else {
            self.marked_by.remove(nick)
        }
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.x, self.y, self.tile_type, self.fullness
        )
    }
}

impl FromStr for Tile {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = Fields::new(s);
        let x = fields.parse("x")?;
        let y = fields.parse("y")?;
        let tile_type = fields.text("type")?.parse()?;
        let fullness = fields.parse("fullness")?;
        Ok(Tile::new(x, y, tile_type, fullness))
    }
}
