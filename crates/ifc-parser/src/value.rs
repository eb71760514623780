//! Re-export of the shared attribute tokenizer (moved to `ifc-core` so
//! `ifc-edit` and `ifc-writer` can decode byte-offset slices the same way
//! without depending on this crate).

pub use ifc_core::{parse_args, Value};
