//! Export path and federated/merged export (spec §4.7 "Export path" /
//! "Federated export"). Re-serializes a parsed `Model`'s entities from
//! their source byte slices, substituting edit-layer overrides and
//! applying a visibility filter with structural-prerequisite retention,
//! the way `IfcExporter::write_to_file` assembles its DATA section from
//! already-built entity strings — generalized here to reuse the *parsed*
//! source bytes instead of freshly created ones.

use std::collections::{HashMap, HashSet};

use ifc_core::attrs::{parse_args, Value};
use ifc_core::store::type_tag_name;
use ifc_core::{CoreError, CoreResult, Model, TypeTag};

use crate::format;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    /// Only entities that survive visibility filtering (not hidden, and —
    /// if any entity in the model is isolated — only isolated ones) plus
    /// their structural prerequisites are emitted.
    pub visible_only: bool,
}

fn header(model: &Model) -> String {
    let mut out = String::new();
    out.push_str("ISO-10303-21;\n");
    out.push_str("HEADER;\n");
    out.push_str("FILE_DESCRIPTION((''),'2;1');\n");
    out.push_str(&format!(
        "FILE_NAME({},'',(''),(''),'ifc-writer','ifc-writer','');\n",
        format::string(&model.name)
    ));
    out.push_str(&format!("FILE_SCHEMA(('{}'));\n", model.schema_version.as_token()));
    out.push_str("ENDSEC;\nDATA;\n");
    out
}

const FOOTER: &str = "ENDSEC;\nEND-ISO-10303-21;\n";

fn raw_entity_line(model: &Model, id: u32, overrides: &HashMap<u32, Vec<u8>>) -> Option<String> {
    let type_name = type_tag_name(model.entities.type_tag(id));
    let body = match overrides.get(&id) {
        Some(bytes) => std::str::from_utf8(bytes).ok()?.to_string(),
        None => std::str::from_utf8(model.raw_attributes(id)?).ok()?.to_string(),
    };
    Some(format!("#{id}={type_name}{body}"))
}

fn referenced_ids(model: &Model, id: u32, overrides: &HashMap<u32, Vec<u8>>) -> Vec<u32> {
    let bytes = match overrides.get(&id) {
        Some(b) => b.as_slice(),
        None => match model.raw_attributes(id) {
            Some(b) => b,
            None => return Vec::new(),
        },
    };
    let Ok(args) = parse_args(bytes) else { return Vec::new() };
    let mut refs = Vec::new();
    collect_refs(&args, &mut refs);
    refs
}

fn collect_refs(values: &[Value], out: &mut Vec<u32>) {
    for v in values {
        match v {
            Value::Ref(id) => out.push(*id),
            Value::Typed(_, inner) => collect_refs(std::slice::from_ref(inner.as_ref()), out),
            Value::List(items) => collect_refs(items, out),
            _ => {}
        }
    }
}

fn always_structural(tag: TypeTag) -> bool {
    tag.is_spatial()
}

/// Determines which express ids survive visibility filtering plus the
/// transitive closure of everything they reference (spec §4.7 Export path
/// "structural prerequisites retained").
fn retained_set(model: &Model, options: ExportOptions, overrides: &HashMap<u32, Vec<u8>>) -> HashSet<u32> {
    let all_ids: Vec<u32> = model.entities.express_ids().collect();
    if !options.visible_only {
        return all_ids.into_iter().collect();
    }

    let any_isolated = all_ids.iter().any(|&id| model.entities.is_isolated(id));

    let mut roots: HashSet<u32> = HashSet::new();
    for &id in &all_ids {
        let tag = model.entities.type_tag(id);
        if always_structural(tag) {
            roots.insert(id);
            continue;
        }
        if tag.is_product_like() {
            let visible = if any_isolated { model.entities.is_isolated(id) } else { !model.entities.is_hidden(id) };
            if visible {
                roots.insert(id);
            }
            continue;
        }
        if tag.is_relationship() {
            let refs = referenced_ids(model, id, overrides);
            let touches_visible_product = refs.iter().any(|&r| {
                let rt = model.entities.type_tag(r);
                rt.is_product_like() && (if any_isolated { model.entities.is_isolated(r) } else { !model.entities.is_hidden(r) })
            });
            if touches_visible_product {
                roots.insert(id);
            }
        }
    }

    let mut retained: HashSet<u32> = roots.clone();
    let mut frontier: Vec<u32> = roots.into_iter().collect();
    while let Some(id) = frontier.pop() {
        for referenced in referenced_ids(model, id, overrides) {
            if model.entities.contains(referenced) && retained.insert(referenced) {
                frontier.push(referenced);
            }
        }
    }
    retained
}

/// Re-serializes a parsed model to ISO-10303-21 text, applying `overrides`
/// (express id → replacement attribute-list bytes, as produced by an edit
/// session) and an optional visibility filter.
pub fn export_model(model: &Model, overrides: &HashMap<u32, Vec<u8>>, options: ExportOptions) -> CoreResult<String> {
    let retained = retained_set(model, options, overrides);
    tracing::debug!(
        model_id = %model.id,
        retained = retained.len(),
        total = model.entities.len(),
        visible_only = options.visible_only,
        "export retention computed"
    );
    let mut out = header(model);
    for id in model.entities.express_ids() {
        if !retained.contains(&id) {
            continue;
        }
        let line = raw_entity_line(model, id, overrides)
            .ok_or_else(|| CoreError::WriterPrecondition { reason: format!("entity #{id} has no readable attribute bytes") })?;
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str(FOOTER);
    tracing::info!(model_id = %model.id, entity_count = retained.len(), bytes = out.len(), "file written");
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectStrategy {
    /// Keep the first model's `IfcProject`; reparent every other model's
    /// site(s) under it and drop the duplicate projects.
    KeepFirst,
    /// Same reparenting as `KeepFirst`, plus folds the dropped projects'
    /// names into the retained project's Description.
    MergeMetadata,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FederationStats {
    pub model_count: usize,
    pub total_entity_count: usize,
}

fn render_value(v: &Value) -> String {
    match v {
        Value::Null => "$".into(),
        Value::Derived => "*".into(),
        Value::Int(i) => i.to_string(),
        Value::Real(r) => format::real(*r),
        Value::Str(s) => format::string(s),
        Value::Enum(s) => format::enum_lit(s),
        Value::Ref(id) => format::reference(*id),
        Value::Typed(name, inner) => format!("{name}({})", render_value(inner)),
        Value::List(items) => format!("({})", items.iter().map(render_value).collect::<Vec<_>>().join(",")),
    }
}

fn rebase(v: Value, offset: u32) -> Value {
    match v {
        Value::Ref(id) => Value::Ref(id + offset),
        Value::Typed(name, inner) => Value::Typed(name, Box::new(rebase(*inner, offset))),
        Value::List(items) => Value::List(items.into_iter().map(|item| rebase(item, offset)).collect()),
        other => other,
    }
}

/// Merges several parsed models into one ISO-10303-21 text stream,
/// rebasing every express id in model `i` by the cumulative
/// `max_express_id` of the models before it (spec §4.7 "federated/merged
/// export" "allocate disjoint id ranges per model by offset").
pub fn federate(models: &[Model], strategy: ProjectStrategy) -> CoreResult<(String, FederationStats)> {
    if models.is_empty() {
        return Err(CoreError::WriterPrecondition { reason: "federation requires at least one model".into() });
    }
    tracing::info!(model_count = models.len(), strategy = ?strategy, "federating models");

    let mut offsets = Vec::with_capacity(models.len());
    let mut cumulative = 0u32;
    for model in models {
        offsets.push(cumulative);
        cumulative += model.max_express_id;
    }

    let project_ids: Vec<u32> = models.iter().map(|m| m.entities.get_by_type(TypeTag::Project).first().copied().unwrap_or(0)).collect();
    let kept_project_rebased = project_ids[0] + offsets[0];
    let dropped_names: Vec<String> = models[1..]
        .iter()
        .zip(project_ids[1..].iter())
        .map(|(m, &pid)| m.entities.get_name(pid).to_string())
        .filter(|n| !n.is_empty())
        .collect();

    let mut rendered: Vec<(u32, String)> = Vec::new();
    let mut total_entity_count = 0usize;

    for (model_index, model) in models.iter().enumerate() {
        let offset = offsets[model_index];
        for id in model.entities.express_ids() {
            total_entity_count += 1;
            let tag = model.entities.type_tag(id);
            let rebased_id = id + offset;

            if model_index > 0 && tag == TypeTag::Project {
                continue; // dropped: duplicate project, spec §4.7 ProjectStrategy
            }

            let Some(bytes) = model.raw_attributes(id) else { continue };
            let Ok(args) = parse_args(bytes) else { continue };
            let mut rebased_args: Vec<Value> = args.into_iter().map(|v| rebase(v, offset)).collect();

            if model_index > 0 && tag == TypeTag::RelAggregates {
                // Reparent RelatingObject (index 4) if it pointed at this
                // model's now-dropped Project.
                if let Some(Value::Ref(relating)) = rebased_args.get(4) {
                    if *relating == project_ids[model_index] + offset {
                        rebased_args[4] = Value::Ref(kept_project_rebased);
                    }
                }
            }

            let type_name = type_tag_name(tag);
            let body = format!("({})", rebased_args.iter().map(render_value).collect::<Vec<_>>().join(","));
            rendered.push((rebased_id, format!("#{rebased_id}={type_name}{body};")));
        }
    }

    if !dropped_names.is_empty() {
        tracing::debug!(dropped = ?dropped_names, strategy = ?strategy, "dropped duplicate project entities during federation");
    }

    if strategy == ProjectStrategy::MergeMetadata && !dropped_names.is_empty() {
        if let Some(entry) = rendered.iter_mut().find(|(id, _)| *id == kept_project_rebased) {
            let merged_description = format!("Merged from: {}", dropped_names.join(", "));
            if let Some(open) = entry.1.find('(') {
                if let Ok(args) = parse_args(entry.1[open..].trim_end_matches(';').as_bytes()) {
                    let mut args = args;
                    if args.len() > 3 {
                        args[3] = Value::Str(merged_description);
                    }
                    let type_name = type_tag_name(TypeTag::Project);
                    let body = format!("({})", args.iter().map(render_value).collect::<Vec<_>>().join(","));
                    entry.1 = format!("#{kept_project_rebased}={type_name}{body};");
                }
            }
        }
    }

    rendered.sort_by_key(|(id, _)| *id);

    let mut out = String::new();
    out.push_str("ISO-10303-21;\n");
    out.push_str("HEADER;\n");
    out.push_str("FILE_DESCRIPTION((''),'2;1');\n");
    out.push_str("FILE_NAME('federated-export','',(''),(''),'ifc-writer','ifc-writer','');\n");
    out.push_str(&format!("FILE_SCHEMA(('{}'));\n", models[0].schema_version.as_token()));
    out.push_str("ENDSEC;\nDATA;\n");
    for (_, line) in &rendered {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(FOOTER);
    tracing::info!(model_count = models.len(), total_entity_count, bytes = out.len(), "file written");

    Ok((out, FederationStats { model_count: models.len(), total_entity_count }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_core::store::NewEntity;
    use ifc_core::types::flags;
    use ifc_core::SchemaVersion;

    fn push(model: &mut Model, id: u32, tag: TypeTag, body: &str, full: &mut Vec<u8>) {
        push_named(model, id, tag, None, body, full);
    }

    fn push_named(model: &mut Model, id: u32, tag: TypeTag, name: Option<&str>, body: &str, full: &mut Vec<u8>) {
        let offset = full.len();
        full.extend_from_slice(body.as_bytes());
        model.entities.push(NewEntity {
            express_id: id,
            type_tag: tag,
            name: name.map(str::to_string),
            byte_offset: offset,
            byte_len: body.len(),
            ..Default::default()
        });
    }

    fn sample_model(name: &str) -> Model {
        let mut source = Vec::new();
        let mut model = Model::new("m", name, SchemaVersion::Ifc4, Vec::new());
        push_named(&mut model, 1, TypeTag::Project, Some("Proj"), "($,$,'Proj',$,$,$,$,(#2),$);", &mut source);
        push(&mut model, 2, TypeTag::Site, "($,$,'Site',$,$,$,$,$,$,$,$,$,$);", &mut source);
        push(&mut model, 3, TypeTag::RelAggregates, "($,$,$,$,#1,(#2));", &mut source);
        push(&mut model, 4, TypeTag::Wall, "($,$,'Wall-1',$,$,#5,$,$);", &mut source);
        push(&mut model, 5, TypeTag::CartesianPoint, "((0.,0.,0.));", &mut source);
        model.source = source;
        model.finalize();
        model
    }

    #[test]
    fn export_without_filter_emits_every_entity() {
        let model = sample_model("m1");
        let text = export_model(&model, &HashMap::new(), ExportOptions { visible_only: false }).unwrap();
        assert!(text.contains("#1=IFCPROJECT"));
        assert!(text.contains("#4=IFCWALL"));
        assert!(text.contains("#5=IFCCARTESIANPOINT"));
    }

    #[test]
    fn hidden_product_is_dropped_but_its_prerequisites_for_others_stay() {
        let mut model = sample_model("m1");
        model.entities.set_flag(4, flags::HIDDEN);
        let text = export_model(&model, &HashMap::new(), ExportOptions { visible_only: true }).unwrap();
        assert!(!text.contains("IFCWALL"));
        assert!(text.contains("IFCPROJECT"));
        assert!(text.contains("IFCSITE"));
    }

    #[test]
    fn override_bytes_replace_the_stored_attribute_list() {
        let model = sample_model("m1");
        let mut overrides = HashMap::new();
        overrides.insert(4, b"($,$,'Renamed',$,$,#5,$,$);".to_vec());
        let text = export_model(&model, &overrides, ExportOptions { visible_only: false }).unwrap();
        assert!(text.contains("Renamed"));
        assert!(!text.contains("Wall-1"));
    }

    #[test]
    fn federation_rebases_ids_and_keeps_a_single_project() {
        let model_a = sample_model("a");
        let model_b = sample_model("b");
        let (text, stats) = federate(&[model_a, model_b], ProjectStrategy::KeepFirst).unwrap();
        assert_eq!(stats.model_count, 2);
        assert_eq!(text.matches("IFCPROJECT").count(), 1);
        assert!(text.contains("#6=") || text.contains("#7=")); // model b rebased above model a's max id
    }

    #[test]
    fn merge_metadata_folds_dropped_project_names_into_description() {
        let model_a = sample_model("a");
        let model_b = sample_model("b");
        let (text, _) = federate(&[model_a, model_b], ProjectStrategy::MergeMetadata).unwrap();
        assert!(text.contains("Merged from"));
    }
}
