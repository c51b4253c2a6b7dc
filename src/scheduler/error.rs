use thiserror::Error;

use super::job::JobId;
use crate::archive::ArchiveError;
use crate::http::FetchError;
use crate::plugins::{PluginError, RegistryError};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no plugin registered for site \"{0}\"")]
    UnknownPlugin(String),

    #[error("download {0} not found")]
    NotFound(JobId),

    #[error("could not allocate a unique id for {target} after {attempts} attempts")]
    IdExhausted { target: String, attempts: u32 },

    #[error("invalid request: {0}")]
    InvalidInput(String),

    #[error("worker pool is shut down")]
    PoolClosed,
}

impl From<RegistryError> for SchedulerError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownSite(site) => Self::UnknownPlugin(site),
            RegistryError::UnsupportedUrl(url) => Self::UnknownPlugin(url),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Why a job ended in `FAILED`
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("archive commit interrupted: {0}")]
    Interrupted(String),
}
