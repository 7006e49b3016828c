use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open video source {uri:?}")]
    SourceOpen { uri: String },
    #[error("video source gave up after {attempts} reopen attempts")]
    ReopenExhausted { attempts: u32 },
    #[error("Detector Error: {0}")]
    Detector(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image Error: {0}")]
    Image(#[from] image::ImageError),
    #[cfg(feature = "opencv")]
    #[error("OpenCV Error: {0}")]
    OpenCv(#[from] opencv::Error),
}
