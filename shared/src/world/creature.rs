use crate::codec::Fields;
use crate::error::ParseError;
use crate::render::{Hand, RenderQueue, RenderRequest};
use crate::world::TileCoord;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// Placeholder weapon name meaning "nothing in this hand".
pub const NO_WEAPON: &str = "none";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub name: String,
    pub damage: f64,
    pub range: f64,
    pub defense: f64,
}

impl Weapon {
    pub fn none() -> Self {
        Self {
            name: NO_WEAPON.to_string(),
            damage: 0.0,
            range: 0.0,
            defense: 0.0,
        }
    }

    pub fn is_none(&self) -> bool {
        self.name == NO_WEAPON
    }

    pub fn mesh_name(&self) -> String {
        format!("{}.mesh", self.name)
    }

    fn read(fields: &mut Fields<'_>) -> Result<Self, ParseError> {
        Ok(Weapon {
            name: fields.text("weapon name")?.to_string(),
            damage: fields.parse("weapon damage")?,
            range: fields.parse("weapon range")?,
            defense: fields.parse("weapon defense")?,
        })
    }
}

impl fmt::Display for Weapon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.name, self.damage, self.range, self.defense
        )
    }
}

/// A creature class ("Imp", "Troll") shared by every creature of that class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatureDefinition {
    pub class_name: String,
    pub mesh_name: String,
    pub bed_mesh_name: String,
    pub bed_dim1: i32,
    pub bed_dim2: i32,
    pub max_hp: f64,
}

impl fmt::Display for CreatureDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.class_name,
            self.mesh_name,
            self.bed_mesh_name,
            self.bed_dim1,
            self.bed_dim2,
            self.max_hp
        )
    }
}

impl FromStr for CreatureDefinition {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = Fields::new(s);
        Ok(CreatureDefinition {
            class_name: fields.text("class name")?.to_string(),
            mesh_name: fields.text("mesh name")?.to_string(),
            bed_mesh_name: fields.text("bed mesh name")?.to_string(),
            bed_dim1: fields.parse("bed dim 1")?,
            bed_dim2: fields.parse("bed dim 2")?,
            max_hp: fields.parse("max hp")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Creature {
    pub name: String,
    pub class_name: String,
    pub position: (f64, f64, f64),
    pub color: u32,
    pub weapon_l: Weapon,
    pub weapon_r: Weapon,
    pub hp: f64,
    pub mana: f64,
    pub destinations: VecDeque<(f64, f64)>,
    pub animation_state: String,
    pub animation_loop: bool,
    pub home_tile: Option<TileCoord>,
    /// Nick of the player holding this creature in their hand.
    pub held_by: Option<String>,
}

impl Creature {
    pub fn new(name: impl Into<String>, class_name: impl Into<String>, color: u32) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            position: (0.0, 0.0, 0.0),
            color,
            weapon_l: Weapon::none(),
            weapon_r: Weapon::none(),
            hp: 1.0,
            mana: 0.0,
            destinations: VecDeque::new(),
            animation_state: "Idle".to_string(),
            animation_loop: true,
            home_tile: None,
            held_by: None,
        }
    }

    pub fn add_destination(&mut self, x: f64, y: f64) {
        self.destinations.push_back((x, y));
    }

    pub fn clear_destinations(&mut self) {
        self.destinations.clear();
    }

    pub fn set_animation_state(&mut self, state: &str, looping: bool) {
        self.animation_state = state.to_string();
        self.animation_loop = looping;
    }

    /// Queues the creature mesh and a mesh for each hand that holds a weapon.
    pub fn create_meshes(&self, mesh: &str, render: &RenderQueue) {
        render.queue(RenderRequest::CreateCreature {
            creature: self.name.clone(),
            mesh: mesh.to_string(),
        });
        for (weapon, hand) in [(&self.weapon_l, Hand::Left), (&self.weapon_r, Hand::Right)] {
            if !weapon.is_none() {
                render.queue(RenderRequest::CreateWeapon {
                    creature: self.name.clone(),
                    weapon: weapon.mesh_name(),
                    hand,
                });
            }
        }
    }

    pub fn destroy_meshes(&self, render: &RenderQueue) {
        for (weapon, hand) in [(&self.weapon_l, Hand::Left), (&self.weapon_r, Hand::Right)] {
            if !weapon.is_none() {
                render.queue(RenderRequest::DestroyWeapon {
                    creature: self.name.clone(),
                    hand,
                });
            }
        }
        render.queue(RenderRequest::DestroyCreature {
            creature: self.name.clone(),
        });
    }
}

impl fmt::Display for Creature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y, z) = self.position;
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.class_name,
            self.name,
            x,
            y,
            z,
            self.color,
            self.weapon_l,
            self.weapon_r,
            self.hp,
            self.mana
        )
    }
}

impl FromStr for Creature {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = Fields::new(s);
        let class_name = fields.text("class name")?;
        let name = fields.text("name")?;
        let position = (fields.parse("x")?, fields.parse("y")?, fields.parse("z")?);
        let color = fields.parse("color")?;

        let mut creature = Creature::new(name, class_name, color);
        creature.position = position;
        creature.weapon_l = Weapon::read(&mut fields)?;
        creature.weapon_r = Weapon::read(&mut fields)?;
        creature.hp = fields.parse("hp")?;
        creature.mana = fields.parse("mana")?;
        Ok(creature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imp() -> Creature {
        let mut creature = Creature::new("Imp_1", "Imp", 1);
        creature.position = (4.0, 6.5, 0.0);
        creature.weapon_l = Weapon {
            name: "Pickaxe".to_string(),
            damage: 2.0,
            range: 1.0,
            defense: 0.0,
        };
        creature.hp = 25.0;
        creature
    }

    #[test]
    fn test_creature_wire_format() {
        let creature = imp();
        let parsed: Creature = creature.to_string().parse().unwrap();
        assert_eq!(parsed.name, "Imp_1");
        assert_eq!(parsed.class_name, "Imp");
        assert_eq!(parsed.position, (4.0, 6.5, 0.0));
        assert_eq!(parsed.weapon_l, creature.weapon_l);
        assert!(parsed.weapon_r.is_none());
        assert_eq!(parsed.hp, 25.0);
    }

    #[test]
    fn test_creature_truncated_body() {
        let result = "Imp Imp_1 1 2 0 1 Pickaxe 2 1".parse::<Creature>();
        assert_eq!(result.unwrap_err(), ParseError::MissingField("weapon defense"));
    }

    #[test]
    fn test_no_mesh_for_empty_hand() {
        let (render, mut receiver) = RenderQueue::channel();
        imp().create_meshes("Imp.mesh", &render);

        assert!(matches!(
            receiver.try_recv(),
            Ok(RenderRequest::CreateCreature { .. })
        ));
        match receiver.try_recv() {
            Ok(RenderRequest::CreateWeapon { weapon, hand, .. }) => {
                assert_eq!(weapon, "Pickaxe.mesh");
                assert_eq!(hand, Hand::Left);
            }
            other => panic!("Unexpected request {:?}", other),
        }
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_destinations_and_animation() {
        let mut creature = imp();
        creature.add_destination(1.0, 2.0);
        creature.add_destination(3.0, 4.0);
        assert_eq!(creature.destinations.len(), 2);
        creature.clear_destinations();
        assert!(creature.destinations.is_empty());

        creature.set_animation_state("Walk", false);
        assert_eq!(creature.animation_state, "Walk");
        assert!(!creature.animation_loop);
    }

    #[test]
    fn test_definition_wire_format() {
        let definition = CreatureDefinition {
            class_name: "Troll".to_string(),
            mesh_name: "Troll.mesh".to_string(),
            bed_mesh_name: "Bed".to_string(),
            bed_dim1: 2,
            bed_dim2: 1,
            max_hp: 80.0,
        };
        let parsed: CreatureDefinition = definition.to_string().parse().unwrap();
        assert_eq!(parsed, definition);
    }
}
