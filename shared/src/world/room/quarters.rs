//! Sleeping room: creatures claim a bed footprint of open tiles

use super::CoveredTileState;
use crate::render::{RenderQueue, RenderRequest};
use crate::world::TileCoord;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A bed anchored at one tile, spanning `x_dim` by `y_dim` tiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bed {
    pub creature: String,
    pub mesh: String,
    pub x_dim: i32,
    pub y_dim: i32,
    /// False when the bed was rotated by 90 degrees to fit.
    pub normal_direction: bool,
}

impl Bed {
    fn position(&self, anchor: TileCoord) -> (f64, f64) {
        (
            anchor.x as f64 + self.x_dim as f64 / 2.0 - 0.5,
            anchor.y as f64 + self.y_dim as f64 / 2.0 - 0.5,
        )
    }

    fn rotation(&self) -> f64 {
        if self.normal_direction {
            0.0
        } else {
            90.0
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Quarters {
    sleeping_in_tile: BTreeMap<TileCoord, Option<String>>,
    beds: BTreeMap<TileCoord, Bed>,
}

impl Quarters {
    pub fn creature_sleeping_in(&self, tile: TileCoord) -> Option<&str> {
        self.sleeping_in_tile.get(&tile).and_then(|c| c.as_deref())
    }

    pub fn bed_at(&self, tile: TileCoord) -> Option<&Bed> {
        self.beds.get(&tile)
    }

    /// Covered tiles nobody sleeps in, in tile order.
    pub fn open_tiles(&self) -> Vec<TileCoord> {
        self.sleeping_in_tile
            .iter()
            .filter(|(_, creature)| creature.is_none())
            .map(|(tile, _)| *tile)
            .collect()
    }

    /// Whether an `x_dim` by `y_dim` bed anchored at `tile` lies entirely on
    /// open tiles of this room. A zero dimension takes no space and always fits.
    pub fn tile_can_accept_bed(&self, tile: TileCoord, x_dim: i32, y_dim: i32) -> bool {
        let (x_dim, y_dim) = (x_dim.abs(), y_dim.abs());
        if x_dim == 0 || y_dim == 0 {
            return true;
        }
        if !self.sleeping_in_tile.contains_key(&tile) {
            return false;
        }

        (0..x_dim).all(|i| {
            (0..y_dim).all(|j| {
                matches!(
                    self.sleeping_in_tile.get(&TileCoord::new(tile.x + i, tile.y + j)),
                    Some(None)
                )
            })
        })
    }

    /// A random open tile where an `x_dim` by `y_dim` bed fits.
    pub fn location_for_bed(&self, x_dim: i32, y_dim: i32) -> Option<TileCoord> {
        let (x_dim, y_dim) = (x_dim.abs(), y_dim.abs());
        let mut open = self.open_tiles();
        if (open.len() as i32) < x_dim * y_dim {
            return None;
        }

        open.shuffle(&mut rand::thread_rng());
        open.into_iter()
            .find(|tile| self.tile_can_accept_bed(*tile, x_dim, y_dim))
    }

    /// Reserves a bed for `creature` anchored at `tile`, trying the footprint
    /// both ways round. Fails when the tile is taken or the bed cannot fit.
    pub fn claim_tile_for_sleeping(
        &mut self,
        room: &str,
        tile: TileCoord,
        creature: &str,
        bed_mesh: &str,
        bed_dims: (i32, i32),
        render: &RenderQueue,
    ) -> bool {
        if !matches!(self.sleeping_in_tile.get(&tile), Some(None)) {
            return false;
        }

        let (dim1, dim2) = (bed_dims.0.abs().max(1), bed_dims.1.abs().max(1));
        let (x_dim, y_dim, normal_direction) = if self.tile_can_accept_bed(tile, dim1, dim2) {
            (dim1, dim2, true)
        } else if self.tile_can_accept_bed(tile, dim2, dim1) {
            (dim2, dim1, false)
        } else {
            return false;
        };

        for i in 0..x_dim {
            for j in 0..y_dim {
                self.sleeping_in_tile
                    .insert(TileCoord::new(tile.x + i, tile.y + j), Some(creature.to_string()));
            }
        }

        let bed = Bed {
            creature: creature.to_string(),
            mesh: bed_mesh.to_string(),
            x_dim,
            y_dim,
            normal_direction,
        };
        Self::create_bed_mesh(room, tile, &bed, render);
        self.beds.insert(tile, bed);
        true
    }

    /// Frees every tile `creature` sleeps on. Fails when `tile` is unclaimed.
    pub fn release_tile_for_sleeping(
        &mut self,
        room: &str,
        tile: TileCoord,
        creature: &str,
        render: &RenderQueue,
    ) -> bool {
        if !matches!(self.sleeping_in_tile.get(&tile), Some(Some(_))) {
            return false;
        }
        self.release_creature(room, creature, render);
        true
    }

    fn release_creature(&mut self, room: &str, creature: &str, render: &RenderQueue) {
        for sleeper in self.sleeping_in_tile.values_mut() {
            if sleeper.as_deref() == Some(creature) {
                *sleeper = None;
            }
        }

        let anchors: Vec<TileCoord> = self
            .beds
            .iter()
            .filter(|(_, bed)| bed.creature == creature)
            .map(|(tile, _)| *tile)
            .collect();
        for anchor in anchors {
            self.beds.remove(&anchor);
            render.queue(RenderRequest::DestroyBed {
                room: room.to_string(),
                tile: anchor,
            });
        }
    }

    fn create_bed_mesh(room: &str, anchor: TileCoord, bed: &Bed, render: &RenderQueue) {
        render.queue(RenderRequest::CreateBed {
            room: room.to_string(),
            tile: anchor,
            mesh: bed.mesh.clone(),
            position: bed.position(anchor),
            rotation: bed.rotation(),
        });
    }
}

impl CoveredTileState for Quarters {
    fn tile_added(&mut self, tile: TileCoord) {
        // Absorbed tiles keep the sleeper transplanted from the donor room.
        self.sleeping_in_tile.entry(tile).or_insert(None);
    }

    fn tile_removed(&mut self, room: &str, tile: TileCoord, render: &RenderQueue) -> Vec<String> {
        let mut evicted = Vec::new();
        if let Some(Some(creature)) = self.sleeping_in_tile.get(&tile).cloned() {
            self.release_creature(room, &creature, render);
            evicted.push(creature);
        }
        self.sleeping_in_tile.remove(&tile);
        self.beds.remove(&tile);
        evicted
    }

    fn absorb(&mut self, donor: &Self, donor_tiles: &[TileCoord]) {
        for tile in donor_tiles {
            if let Some(sleeper) = donor.sleeping_in_tile.get(tile) {
                self.sleeping_in_tile.insert(*tile, sleeper.clone());
            }
            if let Some(bed) = donor.beds.get(tile) {
                self.beds.insert(*tile, bed.clone());
            }
        }
    }

    fn clear(&mut self) {
        self.sleeping_in_tile.clear();
        self.beds.clear();
    }

    fn create_meshes(&self, room: &str, render: &RenderQueue) {
        for (anchor, bed) in &self.beds {
            Self::create_bed_mesh(room, *anchor, bed, render);
        }
    }

    fn destroy_meshes(&self, room: &str, render: &RenderQueue) {
        for anchor in self.beds.keys() {
            render.queue(RenderRequest::DestroyBed {
                room: room.to_string(),
                tile: *anchor,
            });
        }
    }
}
