use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {reason}")]
    ConfigInvalid { reason: String },

    // ── Dependency graph ──
    #[error("dependency sort failed, unresolved nodes: {}", nodes.join(", "))]
    CyclicDependency { nodes: Vec<String> },

    #[error("only one image may sort last, found '{first}' and '{second}'")]
    MultipleDeferred { first: String, second: String },

    // ── Rings ──
    #[error("unknown ring '{ring}'; configured rings: {}", rings.join(", "))]
    UnknownRing { ring: String, rings: Vec<String> },

    #[error("can't move ring '{ring}' {offset:+} past the ring boundary")]
    RingBoundary { ring: String, offset: isize },

    // ── Versions ──
    #[error("invalid version '{value}', expected MAJOR.MINOR.PATCH")]
    InvalidVersion { value: String },

    #[error("version {version} cannot be bumped further")]
    VersionOverflow { version: String },
}
