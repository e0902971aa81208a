//! Assembly of cut cores into multiscale containers

mod assembler;
mod pyramid;
mod store;

pub use assembler::{CoreAssembler, CoreAssembly};
pub use pyramid::{build_levels, downsample};
pub use store::{
    ChunkedPyramidStore, LayerEntry, LevelEntry, PyramidManifest, PyramidSettings, PyramidWriter, MANIFEST_FILE,
};
