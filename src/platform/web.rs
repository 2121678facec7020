//! Browser shell
//!
//! `WebGame` is the only object JavaScript talks to. The page owns the
//! canvas, the DOM screens and the ad SDK; it forwards input events, calls
//! `frame` from `requestAnimationFrame`, draws from `snapshot_json` and reacts
//! to `drain_events_json`.

use wasm_bindgen::prelude::*;

use super::input::{Action, InputSource, InputTracker};
use crate::persistence::LocalStorageStore;
use crate::progression::{ClaimOutcome, ShopOutcome};
use crate::settings::Settings;
use crate::sim::{AdOutcome, Session};
use crate::tuning::{Difficulty, Tuning};

/// LocalStorage key prefix
const STORAGE_PREFIX: &str = "";

/// Panic hook and console logger (safe to call more than once)
pub fn init_logging() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

fn parse_action(name: &str) -> Option<Action> {
    match name {
        "left" => Some(Action::Left),
        "right" => Some(Action::Right),
        "jump" => Some(Action::Jump),
        "climb" => Some(Action::Climb),
        "dash" => Some(Action::Dash),
        _ => None,
    }
}

#[wasm_bindgen]
pub struct WebGame {
    session: Session,
    input: InputTracker,
    last_time: Option<f64>,
}

#[wasm_bindgen]
impl WebGame {
    /// `tuning_json` may override any balance value
    #[wasm_bindgen(constructor)]
    pub fn new(width: f32, height: f32, tuning_json: Option<String>) -> WebGame {
        init_logging();

        let tuning = match tuning_json.as_deref().map(Tuning::from_json) {
            Some(Ok(tuning)) => tuning,
            Some(Err(e)) => {
                log::warn!("Ignoring tuning override: {e}");
                Tuning::default()
            }
            None => Tuning::default(),
        }
        .with_viewport(width, height);

        let seed = js_sys::Date::now() as u64;
        let session = Session::new(tuning, Box::new(LocalStorageStore::new(STORAGE_PREFIX)), seed);

        let mut input = InputTracker::new();
        input.apply_settings(session.settings());
        input.tilt_full_angle = session.tuning().player.tilt_full_angle;

        log::info!("Lava Climb starting ({width}x{height})");
        WebGame {
            session,
            input,
            last_time: None,
        }
    }

    pub fn start(&mut self, difficulty: &str) {
        let difficulty = Difficulty::from_str(difficulty).unwrap_or_default();
        self.input.release_all();
        self.last_time = None;
        self.session.start(difficulty);
    }

    /// Call from `requestAnimationFrame` with its timestamp
    pub fn frame(&mut self, time_ms: f64) -> u32 {
        let elapsed = match self.last_time {
            Some(last) => (time_ms - last) as f32,
            None => 0.0,
        };
        self.last_time = Some(time_ms);
        let input = self.input.resolve();
        self.session.frame(elapsed, &input)
    }

    pub fn key_down(&mut self, code: &str) -> bool {
        self.input.key_down(code)
    }

    pub fn key_up(&mut self, code: &str) -> bool {
        self.input.key_up(code)
    }

    /// On-screen button press/release (`left`, `right`, `jump`, `climb`, `dash`)
    pub fn touch(&mut self, action: &str, pressed: bool) {
        let Some(action) = parse_action(action) else {
            log::debug!("Unknown touch action `{action}`");
            return;
        };
        if pressed {
            self.input.press(action, InputSource::TOUCH);
        } else {
            self.input.release(action, InputSource::TOUCH);
        }
    }

    /// `DeviceOrientationEvent.gamma` in degrees
    pub fn tilt(&mut self, gamma: f32) {
        self.input.set_tilt(gamma);
    }

    /// Window lost focus or page hidden
    pub fn blur(&mut self) {
        self.input.release_all();
        self.input.clear_tilt();
        self.last_time = None;
        self.session.flush_progression();
    }

    pub fn settings_json(&self) -> String {
        serde_json::to_string(self.session.settings()).unwrap_or_else(|e| {
            log::error!("Settings encoding failed: {e}");
            String::from("{}")
        })
    }

    /// Settings screen save; missing fields keep their defaults.
    /// Returns false if the JSON is rejected.
    pub fn apply_settings(&mut self, settings_json: &str) -> bool {
        match serde_json::from_str::<Settings>(settings_json) {
            Ok(settings) => {
                self.session.set_settings(settings);
                self.input.apply_settings(self.session.settings());
                true
            }
            Err(e) => {
                log::warn!("Ignoring settings update: {e}");
                false
            }
        }
    }

    pub fn request_revive(&mut self) -> bool {
        self.session.request_revive()
    }

    /// Ad SDK callback
    pub fn complete_revive(&mut self, watched: bool) -> bool {
        let outcome = if watched {
            AdOutcome::Watched
        } else {
            AdOutcome::Failed
        };
        self.session.complete_revive(outcome)
    }

    pub fn end_session(&mut self) -> bool {
        self.session.end_session()
    }

    /// Skin card click; returns a short status for the UI
    pub fn select_skin(&mut self, id: &str) -> String {
        let outcome = self.session.progression_mut().select_skin(id);
        if matches!(outcome, ShopOutcome::Equipped | ShopOutcome::Purchased) {
            self.session.save_progression();
        }
        match outcome {
            ShopOutcome::Equipped => "equipped".into(),
            ShopOutcome::Purchased => "purchased".into(),
            ShopOutcome::InsufficientCoins { needed } => format!("need {needed} more coins"),
            ShopOutcome::NotForSale => "not for sale".into(),
            ShopOutcome::UnknownSkin => "unknown skin".into(),
        }
    }

    pub fn claim_reward(&mut self, level: u32) -> bool {
        let granted = matches!(
            self.session.progression_mut().claim_reward(level),
            ClaimOutcome::Granted(_)
        );
        if granted {
            self.session.save_progression();
        }
        granted
    }

    pub fn snapshot_json(&self) -> String {
        self.session.snapshot().to_json().unwrap_or_else(|e| {
            log::error!("Snapshot encoding failed: {e}");
            String::from("{}")
        })
    }

    pub fn drain_events_json(&mut self) -> String {
        let events = self.session.drain_events();
        serde_json::to_string(&events).unwrap_or_else(|e| {
            log::error!("Event encoding failed: {e}");
            String::from("[]")
        })
    }
}
