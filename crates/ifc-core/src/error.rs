//! Error taxonomy shared by parser, edit layer, and writer (spec §7).

use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Fatal error kinds — kinds 1 and 6/7 of spec §7's taxonomy that abort the
/// operation that raised them. Non-fatal kinds (2, 3) are accumulated as
/// [`Diagnostic`]s instead and never surface as an `Err`.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("malformed header at byte {offset}: {reason}")]
    MalformedHeader { offset: usize, reason: String },

    #[error("unterminated DATA section at byte {offset}")]
    UnterminatedData { offset: usize },

    #[error("constraint violation on {parameter}: {reason}")]
    ConstraintViolation { parameter: String, reason: String },

    #[error("mesh edit invalid: {reason}")]
    MeshEditInvalid { reason: String },

    #[error("writer precondition failed: {reason}")]
    WriterPrecondition { reason: String },

    #[error("serialization overflow: {reason}")]
    SerializationOverflow { reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Non-fatal per-entity diagnostics accumulated during parsing (spec §7
/// kinds 2–3): malformed entities and dangling references never abort the
/// parse, but are never silently lost either.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Diagnostic {
    MalformedEntity {
        express_id: u32,
        byte_offset: usize,
        reason: String,
    },
    DanglingReference {
        source_express_id: u32,
        target_express_id: u32,
    },
}
