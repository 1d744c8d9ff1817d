// Data-driven game configuration.
//
// Every tunable duration, capacity, and map dimension the map core reads
// lives in `GameConfig`, loaded from JSON at session start. The lifecycle
// code never hard-codes a delay. In a lockstep session all peers must run
// with identical configs; a differing decompose delay is a desync.
//
// Durations are in seconds (`f32`), as the lifecycle rules are phrased in
// seconds; the scheduler converts them to logical milliseconds. Parameters
// are grouped per object kind: `TreeParams`, `CornParams`, `StoneParams`,
// `ArrowParams`, `ResourceSignParams`.
//
// See also: `objects_manager.rs`, which reads these when creating objects
// and enqueueing their events, and `sim.rs`, which owns the config as part of
// `SimState`.
//
// **Critical constraint: determinism.** Config values feed directly into
// scheduled fire times. All peers must use identical configs.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Growth and decay timings for planted trees.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Seconds from planting until the tree is adult and cuttable.
    pub growth_duration_secs: f32,
    /// Seconds a cut tree lies on the ground before it disappears.
    pub decompose_duration_secs: f32,
}

/// Timings for the corn field cycle. The three events enqueued at planting
/// fire at `growth`, `growth + decompose`, and `growth + decompose + remove`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CornParams {
    pub growth_duration_secs: f32,
    /// How long adult corn stands before it starts decomposing.
    pub decompose_duration_secs: f32,
    /// How long harvested or decomposed corn remains before removal.
    pub remove_duration_secs: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoneParams {
    /// Lifetime of the cut-off remains left behind by a depleted stone.
    pub decompose_delay_secs: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArrowParams {
    /// A landed arrow stays for `min * (1 + jitter)` seconds, `jitter` in [0, 1).
    pub min_decompose_delay_secs: f32,
    /// Flight speed used to derive the landing time from shooter distance.
    pub flight_tiles_per_sec: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceSignParams {
    pub lifetime_secs: f32,
}

/// All tunable parameters of the map core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Map width and height in tiles.
    pub world_size: (u16, u16),
    /// Cadence of the periodic timer that drains the event queue.
    pub timer_period_ms: u64,
    /// Maximum units per pile, and per tile across its whole pile chain.
    pub stack_size: u8,
    /// Largest capacity a stone deposit can be created with.
    pub max_stone_size: u8,
    /// Lifetime of ghost objects (dead settlers).
    pub ghost_duration_secs: f32,
    pub tree: TreeParams,
    pub corn: CornParams,
    pub stone: StoneParams,
    pub arrow: ArrowParams,
    pub resource_sign: ResourceSignParams,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            world_size: (400, 700),
            timer_period_ms: 100,
            stack_size: 8,
            max_stone_size: 14,
            ghost_duration_secs: 1.0,
            tree: TreeParams {
                growth_duration_secs: 420.0,
                decompose_duration_secs: 30.0,
            },
            corn: CornParams {
                growth_duration_secs: 360.0,
                decompose_duration_secs: 120.0,
                remove_duration_secs: 20.0,
            },
            stone: StoneParams {
                decompose_delay_secs: 60.0,
            },
            arrow: ArrowParams {
                min_decompose_delay_secs: 50.0,
                flight_tiles_per_sec: 20.0,
            },
            resource_sign: ResourceSignParams {
                lifetime_secs: 120.0,
            },
        }
    }
}

impl GameConfig {
    /// Parse and validate a config from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the simulation cannot run with. Called by `from_json`
    /// and by `SimState::with_config`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world_size.0 == 0 || self.world_size.1 == 0 {
            return Err(invalid("world_size", "both dimensions must be non-zero"));
        }
        if self.timer_period_ms == 0 {
            return Err(invalid("timer_period_ms", "must be at least 1"));
        }
        if self.stack_size == 0 || self.stack_size > i8::MAX as u8 {
            return Err(invalid(
                "stack_size",
                format!("{} is outside 1..=127", self.stack_size),
            ));
        }
        if self.max_stone_size == 0 {
            return Err(invalid("max_stone_size", "must be at least 1"));
        }
        if self.arrow.flight_tiles_per_sec <= 0.0 || !self.arrow.flight_tiles_per_sec.is_finite() {
            return Err(invalid("arrow.flight_tiles_per_sec", "must be positive and finite"));
        }
        let durations = [
            ("ghost_duration_secs", self.ghost_duration_secs),
            ("tree.growth_duration_secs", self.tree.growth_duration_secs),
            ("tree.decompose_duration_secs", self.tree.decompose_duration_secs),
            ("corn.growth_duration_secs", self.corn.growth_duration_secs),
            ("corn.decompose_duration_secs", self.corn.decompose_duration_secs),
            ("corn.remove_duration_secs", self.corn.remove_duration_secs),
            ("stone.decompose_delay_secs", self.stone.decompose_delay_secs),
            ("arrow.min_decompose_delay_secs", self.arrow.min_decompose_delay_secs),
            ("resource_sign.lifetime_secs", self.resource_sign.lifetime_secs),
        ];
        for (field, secs) in durations {
            if !(secs >= 0.0 && secs.is_finite()) {
                return Err(invalid(field, format!("{secs} is not a non-negative duration")));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        GameConfig::default().validate().unwrap();
    }

    #[test]
    fn default_stack_size_is_eight() {
        assert_eq!(GameConfig::default().stack_size, 8);
    }

    #[test]
    fn json_roundtrip() {
        let config = GameConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored = GameConfig::from_json(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn from_json_rejects_malformed_input() {
        let err = GameConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn from_json_rejects_zero_stack_size() {
        let mut config = GameConfig::default();
        config.stack_size = 0;
        let json = serde_json::to_string(&config).unwrap();
        let err = GameConfig::from_json(&json).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "stack_size", .. }));
    }

    #[test]
    fn validate_rejects_negative_duration() {
        let mut config = GameConfig::default();
        config.corn.remove_duration_secs = -1.0;
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::Invalid { field: "corn.remove_duration_secs", .. }),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn validate_rejects_zero_timer_period() {
        let mut config = GameConfig::default();
        config.timer_period_ms = 0;
        assert!(config.validate().is_err());
    }
}
