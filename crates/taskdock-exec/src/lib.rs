mod error;
pub use error::{RuntimeError, StageError};

pub mod runtime;
pub use runtime::{CliRuntime, ContainerInfo, ContainerRuntime, ContainerState, RunSpec};

pub mod deploy;
pub use deploy::{DeploymentPipeline, LaunchLocks, PipelineConfig, read_manifest};
