#![deny(missing_docs)]
#![doc = "Core error surface, array type and schema descriptors for the shot aggregation engine."]

pub mod array;
pub mod errors;
pub mod provenance;
pub mod rng;

pub use array::NdArray;
pub use errors::{ErrorInfo, ShotError};
pub use provenance::{ArtifactProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle};
