//! Lava Climb entry point
//!
//! On the web the page drives `platform::web::WebGame`. Natively this runs a
//! headless session with a simple autopilot, useful for smoke runs and for
//! checking balance changes:
//!
//! ```text
//! lava-climb [easy|medium|hard] [ticks] [save.json]
//! ```

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    lava_climb::platform::web::init_logging();
    log::info!("Lava Climb module loaded");
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    headless::run();
}

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use lava_climb::Tuning;
    use lava_climb::consts::SIM_DT_MS;
    use lava_climb::persistence::{JsonFileStore, KeyValueStore, MemoryStore};
    use lava_climb::sim::{AdOutcome, EntityKind, GameEvent, GamePhase, Session, TickInput};
    use lava_climb::tuning::Difficulty;

    /// Steer toward the nearest piece above, keep jumping and climbing
    fn autopilot(session: &Session) -> TickInput {
        let Some(player) = session.player() else {
            return TickInput::default();
        };
        let pos = player.position;
        let target = session
            .entities()
            .iter()
            .filter(|e| matches!(e.kind, EntityKind::Platform | EntityKind::Pillar))
            .filter(|e| e.top() < pos.y - player.radius)
            .max_by(|a, b| a.top().total_cmp(&b.top()));

        let direction = match target {
            Some(e) if (e.center.x - pos.x).abs() > e.half_extents().x * 0.5 => {
                (e.center.x - pos.x).signum()
            }
            _ => 0.0,
        };
        TickInput {
            direction,
            jump: true,
            climb: true,
            dash: false,
        }
    }

    pub fn run() {
        let mut args = std::env::args().skip(1);
        let difficulty = args
            .next()
            .and_then(|s| Difficulty::from_str(&s))
            .unwrap_or_default();
        let max_ticks: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(60 * 60);

        let store: Box<dyn KeyValueStore> = match args.next() {
            Some(path) => match JsonFileStore::open(&path) {
                Ok(store) => Box::new(store),
                Err(e) => {
                    log::warn!("Cannot open save file {path}: {e}; using memory store");
                    Box::new(MemoryStore::new())
                }
            },
            None => Box::new(MemoryStore::new()),
        };

        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        log::info!("Lava Climb (native, headless) starting...");
        let mut session = Session::new(Tuning::default(), store, seed);
        session.start(difficulty);

        let mut ticks = 0u64;
        while ticks < max_ticks && session.phase() != GamePhase::Ended {
            match session.phase() {
                GamePhase::GameOver => {
                    if !session.request_revive() {
                        session.end_session();
                    }
                }
                GamePhase::Reviving => {
                    session.complete_revive(AdOutcome::Watched);
                }
                _ => {}
            }

            let input = autopilot(&session);
            ticks += session.frame(SIM_DT_MS, &input) as u64;

            for event in session.drain_events() {
                match event {
                    GameEvent::Died { cause, height } => {
                        log::info!("tick {ticks}: {} (height {height})", cause.message())
                    }
                    GameEvent::PassLevelUp { level } => log::info!("tick {ticks}: pass level {level}"),
                    GameEvent::Ended { height, coins, rank } => {
                        log::info!("tick {ticks}: run ended at {height} with {coins} coins (rank {rank:?})")
                    }
                    _ => {}
                }
            }
        }

        let progression = session.progression();
        println!(
            "{}: {} ticks, max height {}, run coins {}, best {}, pass level {}",
            difficulty.as_str(),
            ticks,
            session.max_height(),
            session.run_coins(),
            progression.best_height,
            progression.pass_level()
        );
    }
}
