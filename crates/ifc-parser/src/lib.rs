//! STEP (ISO-10303-21) tokenizer and phased IFC parser (spec §4.3).
//!
//! Drives Phases A-E over a contiguous byte buffer, producing a fully
//! populated [`Model`]. Parsing is pure CPU and single-threaded; the
//! federation front-end may run several `parse` calls concurrently, each
//! over its own buffer (spec §5).

mod header;
mod phase_b;
mod phase_c;
mod phase_d;
mod phase_e;
mod scan;
mod value;

pub use header::HeaderInfo;
pub use value::Value;

use ifc_core::{CoreError, Diagnostic, Model, TypeTag};

/// Parse-time knobs. A plain `Default`-able options struct, not a
/// file/env-backed config layer — mirrors the teacher's builder-style
/// parameter structs (spec.md §6 places CLI/environment out of scope).
#[derive(Debug, Clone, Copy)]
pub struct ParserConfig {
    /// Yield to the caller every `K` entities during Phase B, or `None` to
    /// never yield (spec §5 "Suspension points": a surface policy, not a
    /// contract). The parser itself has no async runtime; this only calls
    /// the supplied callback.
    pub yield_every: Option<usize>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { yield_every: None }
    }
}

pub struct ParseOutcome {
    pub model: Model,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse a complete ISO-10303-21 byte buffer into a [`Model`].
///
/// `on_yield` is invoked every `config.yield_every` entities during Phase B
/// if configured; it carries no obligations beyond "was called".
pub fn parse(
    model_id: impl Into<String>,
    source: Vec<u8>,
    config: ParserConfig,
    mut on_yield: impl FnMut(),
) -> Result<ParseOutcome, CoreError> {
    let model_id = model_id.into();
    tracing::info!(model_id = %model_id, bytes = source.len(), "parsing IFC source");

    let (header, data_section) = header::parse_header(&source)?;
    tracing::info!(schema = header.schema.as_token(), "header parsed");

    // EntityRecord byte offsets are relative to the DATA section, not the
    // whole file (the header is irrelevant to lazy attribute decoding), so
    // the Model's retained source buffer is that slice alone.
    let data = source[data_section.start..data_section.end].to_vec();

    let mut model = Model::new(model_id, header.file_name.clone().unwrap_or_default(), header.schema, data);
    let data: &[u8] = &model.source.clone();

    let discovery = phase_b::discover_entities(data, &mut model.entities);
    let mut diagnostics = discovery.diagnostics;
    model.product_slots = discovery.product_slots;
    tracing::info!(
        entity_count = model.entities.len(),
        max_express_id = discovery.max_express_id,
        "phase B: entity discovery complete"
    );

    if let Some(k) = config.yield_every {
        for i in 0..model.entities.len() {
            if i % k == 0 {
                on_yield();
            }
        }
    }

    for express_id in model.entities.express_ids().collect::<Vec<_>>() {
        let type_tag = model.entities.type_tag(express_id);
        if type_tag.is_relationship() {
            phase_c::wire_relationship(data, express_id, type_tag, &mut model.entities, &mut model.relationships, &mut diagnostics);
        }
    }
    tracing::info!(edge_count = model.relationships.edge_count(), "phase C: relationship wiring complete");

    model.spatial = phase_d::build_spatial_hierarchy(data, &model.entities, &model.relationships);
    tracing::info!(site_count = model.spatial.sites().len(), "phase D: spatial hierarchy built");

    let (properties, quantities) = phase_e::materialize_properties(data, &model.entities, &model.relationships);
    tracing::info!(
        pset_count = properties.len(),
        qset_count = quantities.len(),
        "phase E: property materialization complete"
    );
    model.properties = properties;
    model.quantities = quantities;

    for diagnostic in &diagnostics {
        if let Diagnostic::DanglingReference { source_express_id, target_express_id } = diagnostic {
            tracing::warn!(source_express_id, target_express_id, "dangling reference");
        }
    }

    model.finalize();

    Ok(ParseOutcome { model, diagnostics })
}

/// Convenience wrapper for callers that don't need cooperative yielding.
pub fn parse_simple(model_id: impl Into<String>, source: Vec<u8>) -> Result<ParseOutcome, CoreError> {
    parse(model_id, source, ParserConfig::default(), || {})
}

/// Parses several independent STEP buffers across a Rayon thread pool (spec
/// §5 "MAY parse multiple models in parallel"). Each buffer is parsed
/// single-threaded exactly as [`parse_simple`] would, with no data shared
/// across models; this only farms the otherwise-sequential per-model work
/// out to Rayon's global pool. Intended for the federation front-end, which
/// needs every input model parsed before it can rebase and merge them.
///
/// Results are returned in the same order as `sources`.
pub fn parse_many(sources: Vec<(String, Vec<u8>)>) -> Vec<Result<ParseOutcome, CoreError>> {
    use rayon::prelude::*;

    tracing::info!(model_count = sources.len(), "parsing models in parallel");
    sources.into_par_iter().map(|(model_id, source)| parse_simple(model_id, source)).collect()
}

pub fn type_name(tag: TypeTag) -> &'static str {
    ifc_core::store::type_tag_name(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALL_FILE: &[u8] = b"ISO-10303-21;\nHEADER;\nFILE_DESCRIPTION((''),'2;1');\nFILE_NAME('a.ifc','2024-01-01T00:00:00',('A'),('O'),'','','');\nFILE_SCHEMA(('IFC4'));\nENDSEC;\nDATA;\n#1=IFCPROJECT('0$WU4A9R19$vKWO$AdOnA1',$,'Project',$,$,$,$,$,$);\n#2=IFCSITE('0$WU4A9R19$vKWO$AdOnA2',$,'Site',$,$,$,$,$,$,$,$,$,$);\n#3=IFCBUILDING('0$WU4A9R19$vKWO$AdOnA3',$,'Building',$,$,$,$,$,$,$,$,$);\n#4=IFCBUILDINGSTOREY('0$WU4A9R19$vKWO$AdOnA4',$,'Storey',$,$,$,$,$,$,0.);\n#5=IFCWALL('0$WU4A9R19$vKWO$AdOnA5',$,'Wall-01',$,$,$,$,$);\n#6=IFCRELAGGREGATES('0$WU4A9R19$vKWO$AdOnA6',$,$,$,#1,(#2));\n#7=IFCRELAGGREGATES('0$WU4A9R19$vKWO$AdOnA7',$,$,$,#2,(#3));\n#8=IFCRELAGGREGATES('0$WU4A9R19$vKWO$AdOnA8',$,$,$,#3,(#4));\n#9=IFCRELCONTAINEDINSPATIALSTRUCTURE('0$WU4A9R19$vKWO$AdOnA9',$,$,$,(#5),#4);\nENDSEC;\nEND-ISO-10303-21;\n";

    #[test]
    fn parses_minimal_wall_file_end_to_end() {
        let outcome = parse_simple("m1", WALL_FILE.to_vec()).unwrap();
        let model = outcome.model;

        assert!(outcome.diagnostics.is_empty());
        assert_eq!(model.entities.len(), 9);
        assert_eq!(model.spatial.sites(), &[2]);
        assert_eq!(model.spatial.buildings_of(2), &[3]);
        assert_eq!(model.spatial.storeys_of(3)[0].express_id, 4);
        assert_eq!(model.entities.contained_in_storey(5), Some(4));
        assert_eq!(model.entities.get_name(5), "Wall-01");
    }

    #[test]
    fn empty_data_section_parses_with_no_diagnostics() {
        let empty = b"ISO-10303-21;\nHEADER;\nFILE_DESCRIPTION((''),'2;1');\nFILE_NAME('e.ifc','t',('A'),('O'),'','','');\nFILE_SCHEMA(('IFC4'));\nENDSEC;\nDATA;\nENDSEC;\nEND-ISO-10303-21;\n";
        let outcome = parse_simple("m2", empty.to_vec()).unwrap();
        assert_eq!(outcome.model.entities.len(), 0);
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn yield_callback_is_invoked() {
        let mut calls = 0;
        let config = ParserConfig { yield_every: Some(2) };
        parse("m3", WALL_FILE.to_vec(), config, || calls += 1).unwrap();
        assert!(calls > 0);
    }

    #[test]
    fn parse_many_parses_every_model_independently_and_preserves_order() {
        let sources = vec![
            ("a".to_string(), WALL_FILE.to_vec()),
            ("b".to_string(), WALL_FILE.to_vec()),
            ("c".to_string(), WALL_FILE.to_vec()),
        ];
        let outcomes = parse_many(sources);
        assert_eq!(outcomes.len(), 3);
        for (i, outcome) in outcomes.into_iter().enumerate() {
            let outcome = outcome.unwrap();
            assert_eq!(outcome.model.id, ["a", "b", "c"][i]);
            assert_eq!(outcome.model.entities.len(), 9);
        }
    }
}
