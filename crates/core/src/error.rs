/// Result alias that carries the custom [`CutinError`] type.
pub type Result<T> = std::result::Result<T, CutinError>;

/// Common error type for the playback engine.
#[derive(Debug, thiserror::Error)]
pub enum CutinError {
    /// Metadata for a dataset could not be fetched or parsed. Fatal to the
    /// selection that triggered it.
    #[error("failed to load dataset `{dataset}`: {reason}")]
    AssetLoad { dataset: String, reason: String },
    /// A single frame failed to decode. The loader substitutes a placeholder
    /// and never surfaces this to callers.
    #[error("failed to decode frame {index}: {reason}")]
    FrameDecode { index: usize, reason: String },
    /// A zero-sized surface, area or frame made a fit calculation impossible.
    #[error("degenerate {what} geometry {width}x{height}")]
    DegenerateGeometry {
        what: &'static str,
        width: f64,
        height: f64,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid dataset selector `{0}`")]
    InvalidSelector(String),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Image(#[from] image::ImageError),
}

impl CutinError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn asset_load(dataset: impl Into<String>, reason: impl ToString) -> Self {
        Self::AssetLoad {
            dataset: dataset.into(),
            reason: reason.to_string(),
        }
    }

    pub fn degenerate(what: &'static str, width: f64, height: f64) -> Self {
        Self::DegenerateGeometry {
            what,
            width,
            height,
        }
    }
}

impl From<&str> for CutinError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for CutinError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
