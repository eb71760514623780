//! Parametric edit layer and indexed-mesh editor for products that lack one.

pub mod mesh;
pub mod params;

pub use mesh::{extrude_face, move_selection, scale_selection, Axis, EditResult, Selection};
pub use params::{navigate, Constraint, EditTarget, GeometryMutation, GeometryParameter, MutationView, ParamValue, ParameterRoster, MIN_EDGE_LENGTH};
