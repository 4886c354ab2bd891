mod blob;
pub use blob::{FileBlob, FileKind, Manifest};

mod request;
pub use request::{DeploymentRequest, PathLayout};

mod result;
pub use result::{DeploymentResult, Liveness, Stage};
