//! Logical input tracking
//!
//! Keyboard and touch buttons feed the same logical actions. Each action
//! remembers which sources hold it, so releasing a key does not cancel a
//! finger still on the button. Left/right keep a press-order stack: the most
//! recently pressed direction that is still held wins.

use bitflags::bitflags;

use crate::settings::Settings;
use crate::sim::TickInput;

/// Logical player actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Left,
    Right,
    Jump,
    Climb,
    Dash,
}

impl Action {
    const ALL: [Action; 5] = [
        Action::Left,
        Action::Right,
        Action::Jump,
        Action::Climb,
        Action::Dash,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn is_direction(self) -> bool {
        matches!(self, Action::Left | Action::Right)
    }
}

bitflags! {
    /// Input devices currently holding an action
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InputSource: u8 {
        const KEYBOARD = 1 << 0;
        const TOUCH = 1 << 1;
    }
}

/// Actions bound to a `KeyboardEvent.code`
pub fn actions_for_key(code: &str) -> &'static [Action] {
    match code {
        "ArrowLeft" | "KeyA" => &[Action::Left],
        "ArrowRight" | "KeyD" => &[Action::Right],
        "ArrowUp" | "KeyW" => &[Action::Jump, Action::Climb],
        "Space" => &[Action::Jump],
        "ShiftLeft" | "ShiftRight" => &[Action::Dash],
        _ => &[],
    }
}

/// Multi-source input state, resolved once per tick
#[derive(Debug, Clone)]
pub struct InputTracker {
    held: [InputSource; 5],
    /// Held directions in press order (last = most recent)
    direction_stack: Vec<Action>,
    /// Device tilt (degrees, + = right), if a sensor is reporting
    tilt: Option<f32>,
    pub tilt_enabled: bool,
    pub tilt_deadzone: f32,
    /// On-screen buttons accepted
    pub touch_enabled: bool,
    /// Tilt that maps to full speed
    pub tilt_full_angle: f32,
}

impl Default for InputTracker {
    fn default() -> Self {
        Self {
            held: [InputSource::empty(); 5],
            direction_stack: Vec::with_capacity(2),
            tilt: None,
            tilt_enabled: true,
            tilt_deadzone: 5.0,
            touch_enabled: true,
            tilt_full_angle: 30.0,
        }
    }
}

impl InputTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt the player's control preferences. Disabling a device drops
    /// whatever it was holding.
    pub fn apply_settings(&mut self, settings: &Settings) {
        self.tilt_enabled = settings.tilt_controls;
        self.tilt_deadzone = settings.tilt_deadzone;
        if !self.tilt_enabled {
            self.tilt = None;
        }
        self.touch_enabled = settings.touch_buttons;
        if !self.touch_enabled {
            for action in Action::ALL {
                self.release(action, InputSource::TOUCH);
            }
        }
    }

    pub fn press(&mut self, action: Action, source: InputSource) {
        if source.contains(InputSource::TOUCH) && !self.touch_enabled {
            return;
        }
        let slot = &mut self.held[action.index()];
        let was_held = !slot.is_empty();
        *slot |= source;
        if action.is_direction() && !was_held {
            self.direction_stack.retain(|&a| a != action);
            self.direction_stack.push(action);
        }
    }

    pub fn release(&mut self, action: Action, source: InputSource) {
        let slot = &mut self.held[action.index()];
        slot.remove(source);
        if action.is_direction() && slot.is_empty() {
            self.direction_stack.retain(|&a| a != action);
        }
    }

    pub fn is_held(&self, action: Action) -> bool {
        !self.held[action.index()].is_empty()
    }

    /// Returns false for unbound keys
    pub fn key_down(&mut self, code: &str) -> bool {
        let actions = actions_for_key(code);
        for &action in actions {
            self.press(action, InputSource::KEYBOARD);
        }
        !actions.is_empty()
    }

    pub fn key_up(&mut self, code: &str) -> bool {
        let actions = actions_for_key(code);
        for &action in actions {
            self.release(action, InputSource::KEYBOARD);
        }
        !actions.is_empty()
    }

    pub fn set_tilt(&mut self, degrees: f32) {
        self.tilt = degrees.is_finite().then_some(degrees);
    }

    pub fn clear_tilt(&mut self) {
        self.tilt = None;
    }

    /// Drop everything (window blur, session restart)
    pub fn release_all(&mut self) {
        for action in Action::ALL {
            self.held[action.index()] = InputSource::empty();
        }
        self.direction_stack.clear();
    }

    /// Most recently pressed direction still held
    pub fn direction(&self) -> Option<Action> {
        self.direction_stack.last().copied()
    }

    /// Analog steering from tilt, outside the dead-zone, in [-1, 1]
    fn tilt_axis(&self) -> f32 {
        match self.tilt {
            Some(t) if self.tilt_enabled && t.abs() > self.tilt_deadzone => {
                let full = self.tilt_full_angle.max(f32::EPSILON);
                (t / full).clamp(-1.0, 1.0)
            }
            _ => 0.0,
        }
    }

    /// Snapshot the logical input for one simulation tick
    pub fn resolve(&self) -> TickInput {
        let direction = match self.direction() {
            Some(Action::Left) => -1.0,
            Some(Action::Right) => 1.0,
            _ => self.tilt_axis(),
        };
        TickInput {
            direction,
            jump: self.is_held(Action::Jump),
            climb: self.is_held(Action::Climb),
            dash: self.is_held(Action::Dash),
        }
    }
}
