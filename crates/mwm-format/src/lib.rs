//! Feature format of MWM map archives
//!
//! Hierarchical type paths, the classifier registry, per-container shared
//! metadata and the lazy feature decoder that rendering, search and routing
//! pull fields and geometry out of.

pub mod classifier;
pub mod error;
pub mod feature;
pub mod load_info;
pub mod metadata;
pub mod type_path;
pub mod writer;

pub use classifier::{ClassifNode, ClassifVisitor, ClassifierRegistry, TypeIndex};
pub use error::{FormatError, Result};
pub use feature::decoder::FeatureDecoder;
pub use feature::geometry::ScaleRequest;
pub use feature::{FeatureId, GeomType, TypesHolder};
pub use load_info::{ContainerMetadata, FeaturesVector};
pub use metadata::{MetaKind, Metadata, MetadataDeserializer};
pub use type_path::{PackedType, TypePathError};
pub use writer::ArchiveWriter;
