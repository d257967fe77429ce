use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by loaders, caches and passes.
///
/// Whether an error is fatal depends on the caller: a missing background or
/// pattern file aborts the run, a missing icon or font is logged and skipped.
/// Classification and localization misses are not errors at all; passes count
/// them in their stats.
#[derive(Debug, Error)]
pub enum MapGenError {
    #[error("{what} not found: {}", path.display())]
    MissingResource { what: &'static str, path: PathBuf },

    #[error("malformed config entry '{entry}': {message}")]
    MalformedConfig { entry: String, message: String },

    #[error("could not determine a pattern id from {}", .0.display())]
    PatternId(PathBuf),

    #[error("pattern '{0}' not found in summary")]
    PatternNotInSummary(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode image {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot allocate a {width}x{height} layer")]
    Layer { width: u32, height: u32 },
}

impl MapGenError {
    pub fn missing(what: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::MissingResource {
            what,
            path: path.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::missing("file", path);
        }
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MapGenError>;
