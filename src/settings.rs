//! Player preferences
//!
//! Persisted separately from progression under the `settings` key.

use serde::{Deserialize, Serialize};

use crate::persistence::{KeyValueStore, keys, load_or, save_logged};

/// Quality preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::High => "High",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(QualityPreset::Low),
            "medium" | "med" => Some(QualityPreset::Medium),
            "high" => Some(QualityPreset::High),
            _ => None,
        }
    }

    /// Maximum particles for this preset
    pub fn max_particles(&self) -> usize {
        match self {
            QualityPreset::Low => 64,
            QualityPreset::Medium => 256,
            QualityPreset::High => 1024,
        }
    }
}

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Graphics quality preset
    pub quality: QualityPreset,

    // === Visual Effects ===
    /// Screen shake on death/revive
    pub screen_shake: bool,
    /// Particle bursts (coins, dash, revive)
    pub particles: bool,

    // === Controls ===
    /// Steer with device tilt when no direction button is held
    pub tilt_controls: bool,
    /// Tilt angle (degrees) ignored around level
    pub tilt_deadzone: f32,
    /// Show on-screen touch buttons
    pub touch_buttons: bool,

    // === Accessibility ===
    /// Reduced motion (no shake)
    pub reduced_motion: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality: QualityPreset::Medium,

            screen_shake: true,
            particles: true,

            tilt_controls: true,
            tilt_deadzone: 5.0,
            touch_buttons: true,

            reduced_motion: false,
        }
    }
}

impl Settings {
    /// Create settings from a quality preset (applies preset defaults)
    pub fn from_preset(preset: QualityPreset) -> Self {
        let mut settings = Self::default();
        settings.apply_preset(preset);
        settings
    }

    /// Apply a quality preset (updates quality-dependent settings)
    pub fn apply_preset(&mut self, preset: QualityPreset) {
        self.quality = preset;

        // Low preset disables particles for performance
        if preset == QualityPreset::Low {
            self.particles = false;
        }
    }

    /// Effective screen shake (respects reduced_motion)
    pub fn effective_screen_shake(&self) -> bool {
        self.screen_shake && !self.reduced_motion
    }

    /// Effective particle count cap
    pub fn max_particles(&self) -> usize {
        if !self.particles {
            0
        } else {
            self.quality.max_particles()
        }
    }

    pub fn load(store: &dyn KeyValueStore) -> Self {
        load_or(store, keys::SETTINGS, Self::default())
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) {
        save_logged(store, keys::SETTINGS, self);
        log::info!("Settings saved");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    #[test]
    fn test_low_preset_disables_particles() {
        let settings = Settings::from_preset(QualityPreset::Low);
        assert_eq!(settings.max_particles(), 0);
        assert_eq!(Settings::default().max_particles(), 256);
    }

    #[test]
    fn test_reduced_motion_disables_shake() {
        let settings = Settings {
            reduced_motion: true,
            ..Default::default()
        };
        assert!(!settings.effective_screen_shake());
    }

    #[test]
    fn test_partial_settings_json_keeps_defaults() {
        let mut store = MemoryStore::new();
        store.set(keys::SETTINGS, r#"{ "tilt_controls": false }"#).unwrap();
        let settings = Settings::load(&store);
        assert!(!settings.tilt_controls);
        assert!(settings.particles);
        assert_eq!(settings.quality, QualityPreset::Medium);
    }
}
