//! Classification tree and the on-disk type index mapping.

mod config;
mod node;
mod registry;
mod visitor;

pub use node::{ClassifNode, NodeId, ALL_SCALES_VISIBLE, SCALES_COUNT};
pub use registry::{ClassifierRegistry, TypeIndex, STUB_NODE_NAME};
pub use visitor::{visibility_table, write_config, ClassifVisitor};
