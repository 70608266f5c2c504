#![deny(missing_docs)]
#![doc = "Shot file format, keyword aliasing, file stores and synthetic run generation."]

/// Rule accessor over a single shot file.
pub mod accessor;
/// Keyword to dataset path aliasing.
pub mod alias;
/// Dataset payloads.
pub mod dataset;
/// Binary shot file container.
pub mod shot_file;
/// Directory and in-memory stores.
pub mod store;
pub mod synth;

pub use accessor::FileAccessor;
pub use alias::AliasMap;
pub use dataset::Dataset;
pub use shot_file::{ShotFile, SHOT_FILE_SCHEMA};
pub use store::{DirStore, MemoryStore, ShotStore, SHOT_EXTENSION};
pub use synth::SynthSpec;
