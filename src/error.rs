//! Crate-wide error type.

use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    /// 證交所、櫃買中心回應非 2xx 或內容無法解析
    #[error("Remote error from {url}: {reason}")]
    Remote { url: String, reason: String },

    /// 供應商回傳空資料或缺少資料
    #[error("Download failed for {day}: {reason}")]
    Download { day: String, reason: String },

    #[error("Cache file not found: {} and download failed: {source}", .path.display())]
    CacheMiss {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("{0} session is not initialized")]
    NotInitialized(&'static str),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("match_time {0} does not fit 12 digits")]
    MatchTime(i64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn remote(url: &str, reason: impl ToString) -> Self {
        Error::Remote {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn download(day: &str, reason: impl ToString) -> Self {
        Error::Download {
            day: day.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}
