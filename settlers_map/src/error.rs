// Error types for startup and snapshot handling.
//
// Gameplay operations never return these: a rejected placement or an empty
// pile is an ordinary outcome reported through `bool`/`Option`. Errors here
// are the fatal-at-startup kind (malformed config) and snapshot decoding.

/// Problems with a `GameConfig`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config JSON did not parse into a `GameConfig`.
    #[error("malformed game config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field parsed but holds a value the simulation cannot run with.
    #[error("invalid game config field `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Errors surfaced by `SimState` construction and save/load.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A snapshot could not be encoded or decoded.
    #[error("snapshot (de)serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),
}
