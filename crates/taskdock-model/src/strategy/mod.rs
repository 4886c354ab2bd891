mod probe;
pub use probe::ProbePolicy;

mod restart;
pub use restart::RestartPolicy;
