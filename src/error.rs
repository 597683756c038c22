//! Error types for the viewer.

use std::fmt;

/// Result type for viewer operations.
pub type Result<T> = std::result::Result<T, ViewerError>;

/// Errors that can occur while loading or drawing a scene.
#[derive(Debug)]
pub enum ViewerError {
    /// The scene document is not valid JSON of the expected shape.
    Parse(serde_json::Error),
    /// The scene document contains no layer the viewer knows how to draw.
    EmptyScene,
    /// A layer's arrays are inconsistent.
    InvalidLayer {
        /// Layer name.
        name: String,
        /// Description of what was invalid.
        detail: String,
    },
    /// A shader failed to compile.
    ShaderCompile {
        /// Which shader stage or program.
        stage: &'static str,
        /// Driver info log.
        log: String,
    },
    /// A program failed to link.
    ProgramLink {
        /// Program name.
        program: &'static str,
        /// Driver info log.
        log: String,
    },
    /// A GL object could not be created.
    Gl {
        /// The operation that failed.
        operation: &'static str,
        /// The error message.
        message: String,
    },
    /// Fetching or reading a scene file failed.
    Load {
        /// URL, path or file name.
        source: String,
        /// The error message.
        message: String,
    },
}

impl fmt::Display for ViewerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerError::Parse(e) => write!(f, "failed to parse scene: {e}"),
            ViewerError::EmptyScene => {
                write!(f, "scene has no buildings, water, parks or surface layer")
            }
            ViewerError::InvalidLayer { name, detail } => {
                write!(f, "invalid layer '{name}': {detail}")
            }
            ViewerError::ShaderCompile { stage, log } => {
                write!(f, "failed to compile {stage} shader: {log}")
            }
            ViewerError::ProgramLink { program, log } => {
                write!(f, "failed to link {program} program: {log}")
            }
            ViewerError::Gl { operation, message } => {
                write!(f, "{operation} failed: {message}")
            }
            ViewerError::Load { source, message } => {
                write!(f, "failed to load {source}: {message}")
            }
        }
    }
}

impl std::error::Error for ViewerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ViewerError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ViewerError {
    fn from(err: serde_json::Error) -> Self {
        ViewerError::Parse(err)
    }
}

impl ViewerError {
    pub(crate) fn invalid_layer(name: &str, detail: impl Into<String>) -> Self {
        ViewerError::InvalidLayer {
            name: name.to_string(),
            detail: detail.into(),
        }
    }
}
