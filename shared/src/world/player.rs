use crate::codec::Fields;
use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A starting position on the map that a player can occupy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    pub color: u32,
    pub faction: String,
    pub starting_x: i32,
    pub starting_y: i32,
    pub gold: i32,
    pub mana: f64,
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.color, self.faction, self.starting_x, self.starting_y, self.gold, self.mana
        )
    }
}

impl FromStr for Seat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = Fields::new(s);
        Ok(Seat {
            color: fields.parse("color")?,
            faction: fields.text("faction")?.to_string(),
            starting_x: fields.parse("starting x")?,
            starting_y: fields.parse("starting y")?,
            gold: fields.parse("gold")?,
            mana: fields.parse("mana")?,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Player {
    pub nick: String,
    pub seat: Option<Seat>,
    /// Creatures in this player's hand, most recently picked up last.
    pub held_creatures: Vec<String>,
}

impl Player {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            seat: None,
            held_creatures: Vec::new(),
        }
    }

    pub fn color(&self) -> Option<u32> {
        self.seat.as_ref().map(|seat| seat.color)
    }
}
