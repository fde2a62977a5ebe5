#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{program} not found on PATH")]
    NotFound {
        program: &'static str,
        source: std::io::Error,
    },

    #[error("{program} command failed: {args:?}\n{stderr}")]
    CommandFailed {
        program: &'static str,
        args: Vec<String>,
        stderr: String,
    },

    #[error("{program} output was not valid UTF-8")]
    InvalidUtf8 {
        program: &'static str,
        source: std::string::FromUtf8Error,
    },

    #[error("failed to write to {program} stdin")]
    StdinWrite {
        program: &'static str,
        source: std::io::Error,
    },
}

/// stderr fragments that registries and the cluster API return for absent
/// manifests, repositories and pods.
const NOT_FOUND_MARKERS: &[&str] = &["manifest unknown", "not found", "name unknown"];

impl ToolError {
    /// Whether the command failed because the addressed object does not
    /// exist, as opposed to an auth, network or usage failure.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::CommandFailed { stderr, .. } => {
                let stderr = stderr.to_ascii_lowercase();
                NOT_FOUND_MARKERS.iter().any(|m| stderr.contains(m))
            }
            _ => false,
        }
    }
}
