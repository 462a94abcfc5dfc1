use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong between receiving an upload and answering it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not decode request body as base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("request body does not start with a multipart boundary line")]
    MissingBoundary,

    #[error("malformed multipart body: {0}")]
    Multipart(#[from] multer::Error),

    #[error("multipart body contains no parts")]
    EmptyMultipart,

    #[error("could not read image: {0}")]
    Image(#[from] image::ImageError),

    #[error("could not archive image to {bucket}/{key}: {reason}")]
    Storage {
        bucket: String,
        key: String,
        reason: String,
    },

    #[error("could not load class index {}: {reason}", .path.display())]
    LabelIndex { path: PathBuf, reason: String },

    #[error("class index has no entry for class {0}")]
    UnknownClass(usize),

    #[error("model returned {found} predictions, {required} are required")]
    NotEnoughPredictions { found: usize, required: usize },

    #[error("model error: {0}")]
    Model(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "tensorflow")]
    #[error("tensorflow: {0}")]
    Tensorflow(String),
}

#[cfg(feature = "tensorflow")]
impl From<tensorflow::Status> for Error {
    fn from(status: tensorflow::Status) -> Self {
        Error::Tensorflow(status.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
