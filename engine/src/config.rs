use std::{env, str::FromStr, time::Duration};

use tracing::warn;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_SOLVER_DELAY: Duration = Duration::from_millis(100);

/// Runtime knobs that are not part of a board's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub tick_interval: Duration,
    /// Pause after each chord the solver makes so a viewer can follow it.
    pub solver_delay: Duration,
    pub question_mode: bool,
    /// Fixed seed for mine placement, random when unset.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            solver_delay: DEFAULT_SOLVER_DELAY,
            question_mode: false,
            seed: None,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring unparsable {}={:?}", name, value);
            default
        }),
        Err(_) => default,
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let tick_ms: u64 = env_or(
            "MINESWEEPER_TICK_INTERVAL_MS",
            defaults.tick_interval.as_millis() as u64,
        );
        let solver_delay_ms: u64 = env_or(
            "MINESWEEPER_SOLVER_DELAY_MS",
            defaults.solver_delay.as_millis() as u64,
        );
        let question_mode = env_or("MINESWEEPER_QUESTION_MODE", defaults.question_mode);
        let seed = env::var("MINESWEEPER_SEED")
            .ok()
            .and_then(|value| value.trim().parse().ok());

        Self {
            // a zero period would make tokio's interval panic
            tick_interval: Duration::from_millis(tick_ms.max(1)),
            solver_delay: Duration::from_millis(solver_delay_ms),
            question_mode,
            seed,
        }
    }
}
