mod domain;
pub use domain::*;

mod error;
pub use error::{ModelError, ModelResult};

mod task;
pub use task::{DescriptorPatch, ParamSpec, TaskDescriptor, decode_params, encode_params};

mod deploy;
pub use deploy::{
    DeploymentRequest, DeploymentResult, FileBlob, FileKind, Liveness, Manifest, PathLayout,
    Stage,
};

mod dispatch;
pub use dispatch::{Completed, Dispatched, ResultState, TaskHandle};

mod strategy;
pub use strategy::{ProbePolicy, RestartPolicy};

mod config;
pub use config::RedisConfig;
