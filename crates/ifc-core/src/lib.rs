//! Columnar entity store, relationship graph, spatial hierarchy, and
//! property/quantity tables for parsed IFC models.
//!
//! This crate holds no parsing, editing, or writing logic — it is the
//! shared kernel `ifc-parser`, `ifc-edit`, and `ifc-writer` all build on.

pub mod attrs;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod interner;
pub mod model;
pub mod properties;
pub mod spatial;
pub mod store;
pub mod types;

pub use attrs::{parse_args, Value};
pub use error::{CoreError, CoreResult, Diagnostic};
pub use geometry::{GeometryStore, MeshData, Rgba};
pub use graph::{Direction, RelKind, RelationshipGraph};
pub use interner::Interner;
pub use model::{Model, ProductSlots};
pub use properties::{Property, PropertySet, PropertyTable, PropertyValue, Quantity, QuantitySet, QuantityTable, QuantityKind};
pub use spatial::{SpatialHierarchy, Storey};
pub use store::{EntityStore, NewEntity};
pub use types::{flags, SchemaVersion, TypeTag};
