//! Arena configuration.
//!
//! A plain struct with a `Default` impl and a hand-rolled `from_env`, in
//! the teacher's style (`ServerConfig::default()` in `network/server.rs`,
//! `AuthConfig::from_env` in the dropped `network/auth.rs`) rather than
//! pulling in a config crate the teacher never used.

use std::time::Duration;

/// Every tunable named in spec.md §6, collected in one place and read
/// once at process start.
#[derive(Clone, Debug)]
pub struct ArenaConfig {
    /// Simulation tick rate (Hz).
    pub tick_hz: u32,
    /// Maximum players per match.
    pub max_players: usize,
    /// Minimum players required to start a match.
    pub min_players: usize,
    /// Maximum spectators per match.
    pub max_spectators: usize,
    /// Empty-match reap delay.
    pub match_timeout: Duration,
    /// Matchmaking queue timeout before `queue_expired`.
    pub queue_timeout: Duration,
    /// Interval between matchmaker pairing passes.
    pub matchmaker_tick: Duration,
    /// Base skill tolerance (Elo points).
    pub base_skill_tol: f64,
    /// Maximum (wait-widened) skill tolerance.
    pub max_skill_tol: f64,
    /// Hard latency-gap gate (ms).
    pub latency_tol_ms: u32,
    /// Interval between full-state keyframes.
    pub full_state_interval: Duration,
    /// Minimum spacing between recorded replay snapshots.
    pub snapshot_interval: Duration,
    /// Replay ring capacity.
    pub max_snapshots: usize,
    /// Replay retention window.
    pub retention: Duration,
    /// Resource regen delay after taking damage.
    pub regen_delay: Duration,
    /// Arena width.
    pub world_width: f64,
    /// Arena height.
    pub world_height: f64,
    /// Per-tick velocity decay factor.
    pub friction: f64,
    /// Maximum player speed.
    pub max_velocity: f64,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            tick_hz: 60,
            max_players: 16,
            min_players: 2,
            max_spectators: 100,
            match_timeout: Duration::from_secs(30),
            queue_timeout: Duration::from_secs(30),
            matchmaker_tick: Duration::from_millis(1_000),
            base_skill_tol: 100.0,
            max_skill_tol: 300.0,
            latency_tol_ms: 150,
            full_state_interval: Duration::from_millis(5_000),
            snapshot_interval: Duration::from_millis(100),
            max_snapshots: 10_000,
            retention: Duration::from_secs(30 * 60),
            regen_delay: Duration::from_millis(3_000),
            world_width: 2000.0,
            world_height: 2000.0,
            friction: 0.92,
            max_velocity: 300.0,
        }
    }
}

impl ArenaConfig {
    /// Build configuration from `Default`, overriding any field whose
    /// environment variable is set. A malformed override is a fatal
    /// configuration error (spec.md §6: exit code 1).
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Some(v) = env_u32("TICK_HZ")? {
            cfg.tick_hz = v;
        }
        if let Some(v) = env_usize("MAX_PLAYERS")? {
            cfg.max_players = v;
        }
        if let Some(v) = env_usize("MIN_PLAYERS")? {
            cfg.min_players = v;
        }
        if let Some(v) = env_usize("MAX_SPECTATORS")? {
            cfg.max_spectators = v;
        }
        if let Some(v) = env_millis("MATCH_TIMEOUT_MS")? {
            cfg.match_timeout = v;
        }
        if let Some(v) = env_millis("QUEUE_TIMEOUT_MS")? {
            cfg.queue_timeout = v;
        }
        if let Some(v) = env_millis("MATCHMAKER_TICK_MS")? {
            cfg.matchmaker_tick = v;
        }
        if let Some(v) = env_f64("BASE_SKILL_TOL")? {
            cfg.base_skill_tol = v;
        }
        if let Some(v) = env_f64("MAX_SKILL_TOL")? {
            cfg.max_skill_tol = v;
        }
        if let Some(v) = env_u32("LATENCY_TOL_MS")? {
            cfg.latency_tol_ms = v;
        }
        if let Some(v) = env_millis("FULL_STATE_INTERVAL_MS")? {
            cfg.full_state_interval = v;
        }
        if let Some(v) = env_millis("SNAPSHOT_INTERVAL_MS")? {
            cfg.snapshot_interval = v;
        }
        if let Some(v) = env_usize("MAX_SNAPSHOTS")? {
            cfg.max_snapshots = v;
        }
        if let Some(v) = env_millis("RETENTION_MS")? {
            cfg.retention = v;
        }
        if let Some(v) = env_millis("REGEN_DELAY_MS")? {
            cfg.regen_delay = v;
        }
        if let Some(v) = env_f64("W")? {
            cfg.world_width = v;
        }
        if let Some(v) = env_f64("H")? {
            cfg.world_height = v;
        }
        if let Some(v) = env_f64("FRICTION")? {
            cfg.friction = v;
        }
        if let Some(v) = env_f64("MAX_VEL")? {
            cfg.max_velocity = v;
        }

        Ok(cfg)
    }

    /// Tick duration as a `Duration`, derived from `tick_hz`.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_hz as f64)
    }
}

/// A configuration value failed to parse.
#[derive(Debug, thiserror::Error)]
#[error("invalid configuration value for {var}: {value:?}")]
pub struct ConfigError {
    var: &'static str,
    value: String,
}

fn env_raw(var: &'static str) -> Option<String> {
    std::env::var(var).ok()
}

fn env_u32(var: &'static str) -> Result<Option<u32>, ConfigError> {
    match env_raw(var) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError { var, value }),
    }
}

fn env_usize(var: &'static str) -> Result<Option<usize>, ConfigError> {
    match env_raw(var) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError { var, value }),
    }
}

fn env_f64(var: &'static str) -> Result<Option<f64>, ConfigError> {
    match env_raw(var) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError { var, value }),
    }
}

fn env_millis(var: &'static str) -> Result<Option<Duration>, ConfigError> {
    match env_u32(var)? {
        None => Ok(None),
        Some(ms) => Ok(Some(Duration::from_millis(ms as u64))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_defaults() {
        let cfg = ArenaConfig::default();
        assert_eq!(cfg.tick_hz, 60);
        assert_eq!(cfg.max_spectators, 100);
        assert_eq!(cfg.max_snapshots, 10_000);
        assert_eq!(cfg.snapshot_interval, Duration::from_millis(100));
    }

    #[test]
    fn tick_duration_derives_from_tick_hz() {
        let mut cfg = ArenaConfig::default();
        cfg.tick_hz = 60;
        let dt = cfg.tick_duration();
        assert!((dt.as_secs_f64() - 1.0 / 60.0).abs() < 1e-9);
    }
}
