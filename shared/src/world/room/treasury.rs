//! Gold storage room

use super::CoveredTileState;
use crate::render::{RenderQueue, RenderRequest};
use crate::world::TileCoord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MAX_GOLD_IN_BAG: i32 = 3000;
pub const MAX_GOLD_IN_CHEST: i32 = 5000;

/// Visual tier of the gold pile on one treasury tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreasuryTileFullness {
    Empty,
    Bag,
    Chest,
    Overfull,
}

impl TreasuryTileFullness {
    pub fn for_gold(gold: i32) -> Self {
        if gold <= 0 {
            Self::Empty
        } else if gold <= MAX_GOLD_IN_BAG {
            Self::Bag
        } else if gold <= MAX_GOLD_IN_CHEST {
            Self::Chest
        } else {
            Self::Overfull
        }
    }

    /// An empty tile has no indicator mesh.
    pub fn mesh_name(self) -> Option<&'static str> {
        match self {
            Self::Empty => None,
            Self::Bag => Some("GoldBag"),
            Self::Chest => Some("GoldChest"),
            Self::Overfull => Some("TreasuryTileOverfull"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Treasury {
    gold_in_tile: BTreeMap<TileCoord, i32>,
    fullness_of_tile: BTreeMap<TileCoord, TreasuryTileFullness>,
}

impl Treasury {
    pub fn total_gold(&self) -> i32 {
        self.gold_in_tile.values().sum()
    }

    pub fn gold_in_tile(&self, tile: TileCoord) -> Option<i32> {
        self.gold_in_tile.get(&tile).copied()
    }

    pub fn fullness_of_tile(&self, tile: TileCoord) -> Option<TreasuryTileFullness> {
        self.fullness_of_tile.get(&tile).copied()
    }

    pub fn empty_storage_space(&self) -> i32 {
        self.gold_in_tile.len() as i32 * MAX_GOLD_IN_CHEST - self.total_gold()
    }

    /// Stores up to `gold` coins, preferring `tile`, then spilling over every
    /// covered tile in order. Returns how much was actually stored.
    pub fn deposit_gold(
        &mut self,
        room: &str,
        gold: i32,
        tile: TileCoord,
        render: &RenderQueue,
    ) -> i32 {
        if gold <= 0 {
            return 0;
        }
        let mut remaining = gold;

        if let Some(stored) = self.gold_in_tile.get_mut(&tile) {
            let deposited = (MAX_GOLD_IN_CHEST - *stored).clamp(0, remaining);
            *stored += deposited;
            remaining -= deposited;
            self.update_meshes_for_tile(room, tile, render);
        }

        let tiles: Vec<TileCoord> = self.gold_in_tile.keys().copied().collect();
        for coord in tiles {
            if remaining <= 0 {
                break;
            }
            if let Some(stored) = self.gold_in_tile.get_mut(&coord) {
                let deposited = (MAX_GOLD_IN_CHEST - *stored).clamp(0, remaining);
                if deposited == 0 {
                    continue;
                }
                *stored += deposited;
                remaining -= deposited;
            }
            self.update_meshes_for_tile(room, coord, render);
        }

        gold - remaining
    }

    /// Takes up to `gold` coins, draining tiles in order. Never returns more
    /// than was stored.
    pub fn withdraw_gold(&mut self, room: &str, gold: i32, render: &RenderQueue) -> i32 {
        let mut withdrawn = 0;
        let tiles: Vec<TileCoord> = self.gold_in_tile.keys().copied().collect();

        for coord in tiles {
            let still_needed = gold - withdrawn;
            if still_needed <= 0 {
                break;
            }
            if let Some(stored) = self.gold_in_tile.get_mut(&coord) {
                if *stored == 0 {
                    continue;
                }
                let taken = (*stored).min(still_needed);
                *stored -= taken;
                withdrawn += taken;
            }
            self.update_meshes_for_tile(room, coord, render);
        }

        withdrawn
    }

    /// Swaps the indicator mesh when the tile changed tier.
    fn update_meshes_for_tile(&mut self, room: &str, tile: TileCoord, render: &RenderQueue) {
        let Some(gold) = self.gold_in_tile.get(&tile).copied() else {
            return;
        };
        let new_fullness = TreasuryTileFullness::for_gold(gold);
        if self.fullness_of_tile.get(&tile) == Some(&new_fullness) {
            return;
        }

        self.destroy_meshes_for_tile(room, tile, render);
        self.fullness_of_tile.insert(tile, new_fullness);
        self.create_meshes_for_tile(room, tile, render);
    }

    fn create_meshes_for_tile(&self, room: &str, tile: TileCoord, render: &RenderQueue) {
        let mesh = self
            .fullness_of_tile
            .get(&tile)
            .and_then(|fullness| fullness.mesh_name());
        if let Some(mesh) = mesh {
            render.queue(RenderRequest::CreateTreasuryIndicator {
                room: room.to_string(),
                tile,
                mesh: mesh.to_string(),
            });
        }
    }

    fn destroy_meshes_for_tile(&self, room: &str, tile: TileCoord, render: &RenderQueue) {
        let mesh = self
            .fullness_of_tile
            .get(&tile)
            .and_then(|fullness| fullness.mesh_name());
        if let Some(mesh) = mesh {
            render.queue(RenderRequest::DestroyTreasuryIndicator {
                room: room.to_string(),
                tile,
                mesh: mesh.to_string(),
            });
        }
    }
}

impl CoveredTileState for Treasury {
    fn tile_added(&mut self, tile: TileCoord) {
        // Absorbed tiles arrive with their gold already transplanted.
        if !self.gold_in_tile.contains_key(&tile) {
            self.gold_in_tile.insert(tile, 0);
            self.fullness_of_tile.insert(tile, TreasuryTileFullness::Empty);
        }
    }

    fn tile_removed(&mut self, room: &str, tile: TileCoord, render: &RenderQueue) -> Vec<String> {
        self.destroy_meshes_for_tile(room, tile, render);
        self.gold_in_tile.remove(&tile);
        self.fullness_of_tile.remove(&tile);
        Vec::new()
    }

    fn absorb(&mut self, donor: &Self, donor_tiles: &[TileCoord]) {
        for tile in donor_tiles {
            if let Some(gold) = donor.gold_in_tile.get(tile) {
                self.gold_in_tile.insert(*tile, *gold);
            }
            if let Some(fullness) = donor.fullness_of_tile.get(tile) {
                self.fullness_of_tile.insert(*tile, *fullness);
            }
        }
    }

    fn clear(&mut self) {
        self.gold_in_tile.clear();
        self.fullness_of_tile.clear();
    }

    fn create_meshes(&self, room: &str, render: &RenderQueue) {
        for tile in self.gold_in_tile.keys() {
            self.create_meshes_for_tile(room, *tile, render);
        }
    }

    fn destroy_meshes(&self, room: &str, render: &RenderQueue) {
        for tile in self.gold_in_tile.keys() {
            self.destroy_meshes_for_tile(room, *tile, render);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderReceiver;

    fn treasury_with(tiles: &[(i32, i32)]) -> Treasury {
        let mut treasury = Treasury::default();
        for (x, y) in tiles {
            treasury.tile_added(TileCoord::new(*x, *y));
        }
        treasury
    }

    fn drain(receiver: &mut RenderReceiver) -> Vec<RenderRequest> {
        let mut requests = Vec::new();
        while let Ok(request) = receiver.try_recv() {
            requests.push(request);
        }
        requests
    }

    #[test]
    fn test_fullness_tiers() {
        assert_eq!(TreasuryTileFullness::for_gold(0), TreasuryTileFullness::Empty);
        assert_eq!(TreasuryTileFullness::for_gold(1), TreasuryTileFullness::Bag);
        assert_eq!(TreasuryTileFullness::for_gold(MAX_GOLD_IN_BAG), TreasuryTileFullness::Bag);
        assert_eq!(TreasuryTileFullness::for_gold(MAX_GOLD_IN_BAG + 1), TreasuryTileFullness::Chest);
        assert_eq!(TreasuryTileFullness::for_gold(MAX_GOLD_IN_CHEST + 1), TreasuryTileFullness::Overfull);
    }

    #[test]
    fn test_deposit_then_withdraw_single_tile() {
        let render = RenderQueue::disabled();
        let tile = TileCoord::new(0, 0);

        for amount in [0, 1, 2500, MAX_GOLD_IN_CHEST, MAX_GOLD_IN_CHEST + 1234] {
            let mut treasury = treasury_with(&[(0, 0)]);
            let deposited = treasury.deposit_gold("Treasury_1", amount, tile, &render);
            assert_eq!(deposited, amount.min(MAX_GOLD_IN_CHEST));

            let withdrawn = treasury.withdraw_gold("Treasury_1", amount, &render);
            assert_eq!(withdrawn, amount.min(MAX_GOLD_IN_CHEST));
            assert_eq!(treasury.total_gold(), deposited - withdrawn);
        }
    }

    #[test]
    fn test_deposit_spills_to_other_tiles() {
        let render = RenderQueue::disabled();
        let mut treasury = treasury_with(&[(0, 0), (1, 0), (2, 0)]);

        let deposited = treasury.deposit_gold("T", 12000, TileCoord::new(2, 0), &render);

        assert_eq!(deposited, 12000);
        assert_eq!(treasury.gold_in_tile(TileCoord::new(2, 0)), Some(MAX_GOLD_IN_CHEST));
        assert_eq!(treasury.gold_in_tile(TileCoord::new(0, 0)), Some(MAX_GOLD_IN_CHEST));
        assert_eq!(treasury.gold_in_tile(TileCoord::new(1, 0)), Some(2000));
        assert_eq!(treasury.empty_storage_space(), 3000);

        let overflow = treasury.deposit_gold("T", 10000, TileCoord::new(0, 0), &render);
        assert_eq!(overflow, 3000);
        assert_eq!(treasury.empty_storage_space(), 0);
    }

    #[test]
    fn test_deposit_to_uncovered_tile_still_spills() {
        let render = RenderQueue::disabled();
        let mut treasury = treasury_with(&[(0, 0)]);
        let deposited = treasury.deposit_gold("T", 100, TileCoord::new(9, 9), &render);
        assert_eq!(deposited, 100);
        assert_eq!(treasury.gold_in_tile(TileCoord::new(9, 9)), None);
    }

    #[test]
    fn test_withdraw_never_exceeds_stored_gold() {
        let render = RenderQueue::disabled();
        let mut treasury = treasury_with(&[(0, 0), (0, 1)]);
        treasury.deposit_gold("T", 700, TileCoord::new(0, 1), &render);

        assert_eq!(treasury.withdraw_gold("T", 5000, &render), 700);
        assert_eq!(treasury.total_gold(), 0);
        assert_eq!(treasury.withdraw_gold("T", 5000, &render), 0);
        assert_eq!(treasury.withdraw_gold("T", -3, &render), 0);
    }

    #[test]
    fn test_meshes_only_change_with_tier() {
        let (render, mut receiver) = RenderQueue::channel();
        let tile = TileCoord::new(0, 0);
        let mut treasury = treasury_with(&[(0, 0)]);

        treasury.deposit_gold("T", 100, tile, &render);
        let requests = drain(&mut receiver);
        assert_eq!(requests.len(), 1);
        assert!(matches!(
            &requests[0],
            RenderRequest::CreateTreasuryIndicator { mesh, .. } if mesh == "GoldBag"
        ));

        treasury.deposit_gold("T", 100, tile, &render);
        assert!(drain(&mut receiver).is_empty());

        treasury.deposit_gold("T", MAX_GOLD_IN_BAG, tile, &render);
        let requests = drain(&mut receiver);
        assert_eq!(requests.len(), 2);
        assert!(matches!(&requests[0], RenderRequest::DestroyTreasuryIndicator { mesh, .. } if mesh == "GoldBag"));
        assert!(matches!(&requests[1], RenderRequest::CreateTreasuryIndicator { mesh, .. } if mesh == "GoldChest"));

        treasury.withdraw_gold("T", MAX_GOLD_IN_CHEST, &render);
        let requests = drain(&mut receiver);
        assert_eq!(requests.len(), 1);
        assert!(matches!(&requests[0], RenderRequest::DestroyTreasuryIndicator { .. }));
    }

    #[test]
    fn test_absorb_transplants_gold() {
        let render = RenderQueue::disabled();
        let mut donor = treasury_with(&[(5, 5)]);
        donor.deposit_gold("D", 4000, TileCoord::new(5, 5), &render);

        let mut treasury = treasury_with(&[(4, 5)]);
        treasury.absorb(&donor, &[TileCoord::new(5, 5)]);
        treasury.tile_added(TileCoord::new(5, 5));

        assert_eq!(treasury.gold_in_tile(TileCoord::new(5, 5)), Some(4000));
        assert_eq!(
            treasury.fullness_of_tile(TileCoord::new(5, 5)),
            Some(TreasuryTileFullness::Chest)
        );
        assert_eq!(treasury.total_gold(), 4000);
    }

    #[test]
    fn test_removed_tile_loses_its_entries() {
        let render = RenderQueue::disabled();
        let mut treasury = treasury_with(&[(0, 0), (1, 0)]);
        treasury.deposit_gold("T", 200, TileCoord::new(1, 0), &render);

        treasury.tile_removed("T", TileCoord::new(1, 0), &render);

        assert_eq!(treasury.gold_in_tile(TileCoord::new(1, 0)), None);
        assert_eq!(treasury.fullness_of_tile(TileCoord::new(1, 0)), None);
        assert_eq!(treasury.total_gold(), 0);
    }
}
