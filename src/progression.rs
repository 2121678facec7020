//! Persistent progression: coins, skins, battle pass and best height
//!
//! Invariants kept by every mutator:
//! - `active_skin` is always one of `owned_skins`
//! - `claimed_rewards` only holds levels in `1..=pass_level`
//! - `pass_xp < XP_PER_LEVEL`

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::persistence::{KeyValueStore, keys, load_or, save_logged};

/// XP needed to advance one battle-pass level
pub const XP_PER_LEVEL: u32 = 1000;
/// Levels that carry a reward
pub const PASS_REWARD_LEVELS: u32 = 10;
/// Coins granted by even pass levels
pub const PASS_COIN_REWARD: u64 = 100;
/// Skin granted by odd pass levels
pub const PASS_SKIN_REWARD: &str = "xmas";
/// Skin everybody owns
pub const DEFAULT_SKIN: &str = "default";

/// A cosmetic skin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Skin {
    pub id: &'static str,
    pub name: &'static str,
    /// Display color (#rrggbb)
    pub color: &'static str,
    /// Shop price; `None` means battle-pass only
    pub price: Option<u64>,
}

/// All skins in shop order
pub const SKINS: &[Skin] = &[
    Skin { id: DEFAULT_SKIN, name: "Shadow", color: "#9d00ff", price: Some(0) },
    Skin { id: "crimson", name: "Crimson", color: "#ff0044", price: Some(50) },
    Skin { id: "toxic", name: "Toxic", color: "#00ff44", price: Some(100) },
    Skin { id: "frost", name: "Frost", color: "#00ccff", price: Some(200) },
    Skin { id: "gold", name: "Gilded", color: "#ffcc00", price: Some(500) },
    Skin { id: PASS_SKIN_REWARD, name: "Festive", color: "#ff3355", price: None },
];

pub fn find_skin(id: &str) -> Option<&'static Skin> {
    SKINS.iter().find(|s| s.id == id)
}

/// Battle-pass reward at a level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReward {
    Coins(u64),
    Skin(&'static str),
}

/// Reward for `level`, if that level carries one
pub fn pass_reward(level: u32) -> Option<PassReward> {
    if level == 0 || level > PASS_REWARD_LEVELS {
        return None;
    }
    if level.is_multiple_of(2) {
        Some(PassReward::Coins(PASS_COIN_REWARD))
    } else {
        Some(PassReward::Skin(PASS_SKIN_REWARD))
    }
}

/// Result of a shop click
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShopOutcome {
    Equipped,
    Purchased,
    InsufficientCoins { needed: u64 },
    NotForSale,
    UnknownSkin,
}

/// Result of claiming a pass reward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Granted(PassReward),
    AlreadyClaimed,
    Locked,
    NoReward,
}

/// Player progression (persisted across sessions)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
    pub coins: u64,
    pub best_height: u32,
    owned_skins: BTreeSet<String>,
    active_skin: String,
    pass_level: u32,
    pass_xp: u32,
    claimed_rewards: BTreeSet<u32>,
}

impl Default for Progression {
    fn default() -> Self {
        Self {
            coins: 0,
            best_height: 0,
            owned_skins: BTreeSet::from([DEFAULT_SKIN.to_string()]),
            active_skin: DEFAULT_SKIN.to_string(),
            pass_level: 1,
            pass_xp: 0,
            claimed_rewards: BTreeSet::new(),
        }
    }
}

impl Progression {
    /// Load from a store, defaulting missing keys and repairing invariants
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let defaults = Self::default();
        let mut progression = Self {
            coins: load_or(store, keys::COINS, defaults.coins),
            best_height: load_or(store, keys::BEST_HEIGHT, defaults.best_height),
            owned_skins: load_or(store, keys::OWNED_SKINS, defaults.owned_skins.clone()),
            active_skin: load_active_skin(store),
            pass_level: load_or(store, keys::PASS_LEVEL, defaults.pass_level),
            pass_xp: load_or(store, keys::PASS_XP, defaults.pass_xp),
            claimed_rewards: load_or(store, keys::CLAIMED_REWARDS, BTreeSet::new()),
        };
        progression.repair();
        log::info!(
            "Loaded progression: {} coins, pass level {}, best height {}",
            progression.coins,
            progression.pass_level,
            progression.best_height
        );
        progression
    }

    /// Persist every key (failures are logged, never propagated)
    pub fn save(&self, store: &mut dyn KeyValueStore) {
        save_logged(store, keys::COINS, &self.coins);
        save_logged(store, keys::BEST_HEIGHT, &self.best_height);
        save_logged(store, keys::OWNED_SKINS, &self.owned_skins);
        // activeSkin is stored as a bare string
        if let Err(e) = store.set(keys::ACTIVE_SKIN, &self.active_skin) {
            log::warn!("Failed to persist `{}`: {e}", keys::ACTIVE_SKIN);
        }
        save_logged(store, keys::PASS_LEVEL, &self.pass_level);
        save_logged(store, keys::PASS_XP, &self.pass_xp);
        save_logged(store, keys::CLAIMED_REWARDS, &self.claimed_rewards);
    }

    fn repair(&mut self) {
        self.owned_skins.insert(DEFAULT_SKIN.to_string());
        if !self.owned_skins.contains(&self.active_skin) {
            log::warn!("Active skin `{}` is not owned, resetting", self.active_skin);
            self.active_skin = DEFAULT_SKIN.to_string();
        }
        self.pass_level = self.pass_level.max(1);
        if self.pass_xp >= XP_PER_LEVEL {
            self.pass_level += self.pass_xp / XP_PER_LEVEL;
            self.pass_xp %= XP_PER_LEVEL;
        }
        let level = self.pass_level;
        self.claimed_rewards.retain(|l| (1..=level).contains(l));
    }

    pub fn active_skin(&self) -> &str {
        &self.active_skin
    }

    pub fn owned_skins(&self) -> impl Iterator<Item = &str> {
        self.owned_skins.iter().map(String::as_str)
    }

    pub fn owns(&self, skin: &str) -> bool {
        self.owned_skins.contains(skin)
    }

    pub fn pass_level(&self) -> u32 {
        self.pass_level
    }

    pub fn pass_xp(&self) -> u32 {
        self.pass_xp
    }

    /// Fraction of the current level completed (0-1)
    pub fn pass_progress(&self) -> f32 {
        self.pass_xp as f32 / XP_PER_LEVEL as f32
    }

    pub fn is_claimed(&self, level: u32) -> bool {
        self.claimed_rewards.contains(&level)
    }

    pub fn add_coins(&mut self, amount: u64) {
        self.coins = self.coins.saturating_add(amount);
    }

    /// Add XP; returns the number of levels gained
    pub fn add_xp(&mut self, amount: u32) -> u32 {
        let total = self.pass_xp.saturating_add(amount);
        let gained = total / XP_PER_LEVEL;
        self.pass_xp = total % XP_PER_LEVEL;
        self.pass_level = self.pass_level.saturating_add(gained);
        if gained > 0 {
            log::info!("Battle pass level up -> {}", self.pass_level);
        }
        gained
    }

    /// Record a finished run; returns true on a new best
    pub fn record_height(&mut self, height: u32) -> bool {
        if height > self.best_height {
            self.best_height = height;
            true
        } else {
            false
        }
    }

    /// Equip an owned skin or buy it when affordable
    pub fn select_skin(&mut self, id: &str) -> ShopOutcome {
        let Some(skin) = find_skin(id) else {
            return ShopOutcome::UnknownSkin;
        };
        if self.owns(id) {
            self.active_skin = id.to_string();
            return ShopOutcome::Equipped;
        }
        let Some(price) = skin.price else {
            return ShopOutcome::NotForSale;
        };
        if self.coins < price {
            return ShopOutcome::InsufficientCoins {
                needed: price - self.coins,
            };
        }
        self.coins -= price;
        self.owned_skins.insert(id.to_string());
        self.active_skin = id.to_string();
        log::info!("Purchased skin `{id}` for {price} coins");
        ShopOutcome::Purchased
    }

    /// Claim the reward for an unlocked level, once
    pub fn claim_reward(&mut self, level: u32) -> ClaimOutcome {
        let Some(reward) = pass_reward(level) else {
            return ClaimOutcome::NoReward;
        };
        if level > self.pass_level {
            return ClaimOutcome::Locked;
        }
        if !self.claimed_rewards.insert(level) {
            return ClaimOutcome::AlreadyClaimed;
        }
        match reward {
            PassReward::Coins(amount) => self.add_coins(amount),
            PassReward::Skin(id) => {
                self.owned_skins.insert(id.to_string());
            }
        }
        ClaimOutcome::Granted(reward)
    }
}

fn load_active_skin(store: &dyn KeyValueStore) -> String {
    match store.get(keys::ACTIVE_SKIN) {
        Ok(Some(raw)) => {
            // Older saves JSON-encoded the id
            serde_json::from_str::<String>(&raw).unwrap_or(raw)
        }
        Ok(None) => DEFAULT_SKIN.to_string(),
        Err(e) => {
            log::warn!("Ignoring stored `{}`: {e}", keys::ACTIVE_SKIN);
            DEFAULT_SKIN.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    #[test]
    fn test_defaults_from_empty_store() {
        let store = MemoryStore::new();
        let p = Progression::load(&store);
        assert_eq!(p, Progression::default());
        assert_eq!(p.active_skin(), "default");
        assert_eq!(p.pass_level(), 1);
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut store = MemoryStore::new();
        let mut p = Progression::default();
        p.add_coins(120);
        assert_eq!(p.select_skin("crimson"), ShopOutcome::Purchased);
        p.add_xp(1500);
        assert_eq!(p.claim_reward(1), ClaimOutcome::Granted(PassReward::Skin("xmas")));
        p.record_height(321);
        p.save(&mut store);

        let loaded = Progression::load(&store);
        assert_eq!(loaded, p);
        assert_eq!(store.get(keys::ACTIVE_SKIN).unwrap().as_deref(), Some("crimson"));
    }

    #[test]
    fn test_unowned_active_skin_is_repaired() {
        let mut store = MemoryStore::new();
        store.set(keys::ACTIVE_SKIN, "gold").unwrap();
        let p = Progression::load(&store);
        assert_eq!(p.active_skin(), DEFAULT_SKIN);
    }

    #[test]
    fn test_claimed_rewards_above_level_are_dropped() {
        let mut store = MemoryStore::new();
        store.set(keys::PASS_LEVEL, "2").unwrap();
        store.set(keys::CLAIMED_REWARDS, "[1, 2, 5]").unwrap();
        let p = Progression::load(&store);
        assert!(p.is_claimed(1) && p.is_claimed(2));
        assert!(!p.is_claimed(5));
    }

    #[test]
    fn test_xp_levels_up_and_wraps() {
        let mut p = Progression::default();
        assert_eq!(p.add_xp(999), 0);
        assert_eq!(p.add_xp(1), 1);
        assert_eq!(p.pass_level(), 2);
        assert_eq!(p.pass_xp(), 0);
        assert_eq!(p.add_xp(2500), 2);
        assert_eq!(p.pass_level(), 4);
        assert_eq!(p.pass_xp(), 500);
    }

    #[test]
    fn test_shop_rules() {
        let mut p = Progression::default();
        assert_eq!(
            p.select_skin("gold"),
            ShopOutcome::InsufficientCoins { needed: 500 }
        );
        assert_eq!(p.select_skin("xmas"), ShopOutcome::NotForSale);
        assert_eq!(p.select_skin("rainbow"), ShopOutcome::UnknownSkin);
        p.add_coins(60);
        assert_eq!(p.select_skin("crimson"), ShopOutcome::Purchased);
        assert_eq!(p.coins, 10);
        assert_eq!(p.select_skin("default"), ShopOutcome::Equipped);
        assert_eq!(p.active_skin(), "default");
    }

    #[test]
    fn test_claims_are_gated_and_single_use() {
        let mut p = Progression::default();
        assert_eq!(p.claim_reward(2), ClaimOutcome::Locked);
        p.add_xp(XP_PER_LEVEL);
        assert_eq!(p.claim_reward(2), ClaimOutcome::Granted(PassReward::Coins(100)));
        assert_eq!(p.claim_reward(2), ClaimOutcome::AlreadyClaimed);
        assert_eq!(p.coins, 100);
        assert_eq!(p.claim_reward(11), ClaimOutcome::NoReward);
    }
}
