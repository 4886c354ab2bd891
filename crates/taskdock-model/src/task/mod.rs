mod descriptor;
pub use descriptor::TaskDescriptor;

mod param;
pub use param::{ParamSpec, decode_params, encode_params};

mod patch;
pub use patch::DescriptorPatch;

pub(crate) use descriptor::{check_key_part, check_resource_name};
