//! Byte-level services for MWM containers
//!
//! Varints, bit-packed sub-headers, delta-coded points and the tagged
//! section container the feature format is stored in. Everything here reads
//! from immutable byte slices and never allocates whole sections.

pub mod bits;
pub mod container;
pub mod error;
pub mod geometry;
pub mod header;
pub mod point_coding;
pub mod serial;
pub mod source;
pub mod varint;

pub use bits::{BitReader, BitWriter};
pub use container::{FilesContainer, FilesContainerWriter, Section};
pub use error::{CodingError, Result};
pub use geometry::{PointD, PointU, RectD};
pub use header::{DatSectionHeader, DatVersion};
pub use point_coding::CodingParams;
pub use source::ArraySource;
