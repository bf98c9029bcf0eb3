use thiserror::Error;

pub mod artifact_store;
pub mod catalog;
pub mod container_runtime;
pub mod dependency_builder;
pub mod event_pump;
pub mod port_pool;
pub mod queue_client;
pub mod runnable;
pub mod supervisor;
pub mod test_utils;

pub use faas_common as common;
pub use bollard;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Container creation failed: {0}")]
    CreationFailed(#[source] bollard::errors::Error),
    #[error("Container start failed: {0}")]
    StartFailed(#[source] bollard::errors::Error),
    #[error("Container wait failed: {0}")]
    WaitFailed(#[source] bollard::errors::Error),
    #[error("Container log retrieval failed: {0}")]
    LogRetrievalFailed(#[source] bollard::errors::Error),
    #[error("Container removal failed: {0}")]
    RemovalFailed(#[source] bollard::errors::Error),
    #[error("Image pull failed for {image}: {source}")]
    ImagePullFailed {
        image: String,
        #[source]
        source: bollard::errors::Error,
    },
    #[error("Timed out waiting for {0}")]
    Timeout(String),
    #[error("Unable to extract archive: {0}")]
    ExtractError(String),
    #[error("Found {found} queues matching prefix {prefix}, expected exactly one")]
    AmbiguousQueue { prefix: String, found: usize },
    #[error("Docker API error: {0}")]
    DockerApi(#[from] bollard::errors::Error),
    #[error("Internal executor error: {0}")]
    Internal(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ExecutorError> for faas_common::FaasError {
    fn from(err: ExecutorError) -> Self {
        faas_common::FaasError::Executor(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
