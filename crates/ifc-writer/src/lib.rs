//! ISO-10303-21 text stream writer and model creator/federator.

pub mod creator;
pub mod export;
pub mod format;
pub mod ids;

pub use creator::{Creator, CreatorOptions, SlabProfile};
pub use export::{export_model, federate, ExportOptions, ProjectStrategy};
pub use ids::{new_global_id, new_unique_global_id, IdAllocator};
