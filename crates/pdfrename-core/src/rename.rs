//! Rename Engine
//!
//! Applies a batch of `old name -> new name` entries to the terminal fields
//! of a [`FieldIndex`]. The whole batch is validated before the graph is
//! touched: either every entry is committed or none is.
//!
//! Only the `/T` entry of each target field dictionary changes. `/Kids`,
//! `/Parent`, widget annotations, values and appearance streams are left
//! as they were.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use lopdf::{Object, ObjectId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{FieldNotFound, PdfRenameError};
use crate::fields::{qualify, FieldIndex, FormField};
use crate::graph::PdfGraph;
use crate::text::encode_text_string;

/// Separator between partial names in a fully-qualified name
pub const NAME_SEPARATOR: char = '.';

/// Original fully-qualified name -> new fully-qualified or partial name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenameMapping(BTreeMap<String, String>);

impl RenameMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.0.insert(from.into(), to.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RenameMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameOptions {
    /// Set `/NeedAppearances true` on the AcroForm after a non-empty commit
    pub need_appearances: bool,
}

/// One mapping entry that was found and applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedRename {
    pub from: String,
    pub to: String,
    #[serde(skip)]
    pub fields: Vec<ObjectId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenameReport {
    /// Mapping entries actually found and changed
    pub renamed_count: usize,
    pub renamed: Vec<AppliedRename>,
    pub unmatched: Vec<FieldNotFound>,
    /// Entries whose new name equals the current one
    pub unchanged: Vec<String>,
}

struct PlannedRename<'a> {
    from: &'a str,
    to: String,
    partial: String,
    targets: &'a [usize],
}

/// Apply `mapping` to the terminal fields of `index`, mutating `graph` in place.
///
/// `index` must have been built from `graph`. On any error the graph is
/// left untouched.
pub fn rename(
    graph: &mut PdfGraph,
    index: &FieldIndex,
    mapping: &RenameMapping,
    options: &RenameOptions,
) -> Result<RenameReport, PdfRenameError> {
    let mut report = RenameReport::default();
    let mut plan = Vec::new();

    for (from, to) in mapping.iter() {
        let targets = index.positions(from);
        if targets.is_empty() {
            debug!(name = from, "mapping entry matches no terminal field");
            report.unmatched.push(FieldNotFound {
                name: from.to_string(),
            });
            continue;
        }

        let mut partial = None;
        for &pos in targets {
            let resolved = new_partial_name(&index.nodes()[pos], to)?;
            match &partial {
                Some(existing) if existing != &resolved => {
                    return Err(PdfRenameError::InvalidName {
                        name: to.to_string(),
                        reason: format!("fields sharing the name '{}' resolve differently", from),
                    });
                }
                _ => partial = Some(resolved),
            }
        }
        let Some(partial) = partial else { continue };

        let field = &index.nodes()[targets[0]];
        if field.partial_name.as_deref() == Some(partial.as_str()) {
            report.unchanged.push(from.to_string());
            continue;
        }

        plan.push(PlannedRename {
            from,
            to: qualify(&field.prefix, Some(&partial)),
            partial,
            targets,
        });
    }

    check_collisions(index, &plan)?;

    for planned in &plan {
        for &pos in planned.targets {
            let id = index.nodes()[pos].id;
            if graph.dictionary(id).is_none() {
                return Err(PdfRenameError::MalformedDocument(format!(
                    "field object {} {} R is not a dictionary",
                    id.0, id.1
                )));
            }
        }
    }

    // Validation done; from here on nothing can fail.
    for planned in plan {
        let mut fields = Vec::with_capacity(planned.targets.len());
        for &pos in planned.targets {
            let id = index.nodes()[pos].id;
            if let Some(dict) = graph.dictionary_mut(id) {
                dict.set("T", encode_text_string(&planned.partial));
                fields.push(id);
            }
        }
        debug!(from = planned.from, to = %planned.to, "renamed field");
        report.renamed.push(AppliedRename {
            from: planned.from.to_string(),
            to: planned.to,
            fields,
        });
    }
    report.renamed_count = report.renamed.len();

    if options.need_appearances && report.renamed_count > 0 {
        set_need_appearances(graph, index);
    }

    info!(
        renamed = report.renamed_count,
        unmatched = report.unmatched.len(),
        unchanged = report.unchanged.len(),
        "rename batch committed"
    );

    Ok(report)
}

/// Work out the partial name `field` should carry for the requested `new_name`.
///
/// A name without a separator is the new partial name. A dotted name must
/// repeat the field's current ancestor path, except under unnamed parents
/// where there is no path to repeat; only its trailing component is used.
fn new_partial_name(field: &FormField, new_name: &str) -> Result<String, PdfRenameError> {
    let invalid = |reason: String| PdfRenameError::InvalidName {
        name: new_name.to_string(),
        reason,
    };

    if new_name.trim().is_empty() {
        return Err(invalid("name is empty".into()));
    }
    if new_name.split(NAME_SEPARATOR).any(str::is_empty) {
        return Err(invalid(format!(
            "'{}' separates partial names and cannot start, end or repeat",
            NAME_SEPARATOR
        )));
    }
    if field.partial_name.is_none() {
        return Err(invalid(format!(
            "field '{}' has no partial name of its own",
            field.full_name
        )));
    }

    match new_name.rsplit_once(NAME_SEPARATOR) {
        None => Ok(new_name.to_string()),
        Some(_) if field.parent.is_none() => Err(invalid(format!(
            "'{}' is the hierarchy separator and '{}' has no parent field",
            NAME_SEPARATOR, field.full_name
        ))),
        // Unnamed ancestors contribute no path, so only the leaf can apply.
        Some((_, leaf)) if field.prefix.is_empty() => Ok(leaf.to_string()),
        Some((path, leaf)) if path == field.prefix => Ok(leaf.to_string()),
        Some((path, _)) => Err(invalid(format!(
            "would move the field from '{}' to '{}'",
            field.prefix, path
        ))),
    }
}

/// Two terminal fields with different original names may not end up with
/// the same name, and no terminal field may take the name of a group.
fn check_collisions(index: &FieldIndex, plan: &[PlannedRename<'_>]) -> Result<(), PdfRenameError> {
    let planned: HashMap<usize, &str> = plan
        .iter()
        .flat_map(|p| p.targets.iter().map(move |&pos| (pos, p.to.as_str())))
        .collect();

    let mut final_names: HashMap<&str, &str> = HashMap::new();
    for &pos in index.terminal_positions() {
        let original = index.nodes()[pos].full_name.as_str();
        let final_name = planned.get(&pos).copied().unwrap_or(original);
        match final_names.entry(final_name) {
            Entry::Occupied(entry) if *entry.get() != original => {
                return Err(PdfRenameError::NameCollision {
                    name: final_name.to_string(),
                    first: entry.get().to_string(),
                    second: original.to_string(),
                });
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(entry) => {
                entry.insert(original);
            }
        }
    }

    let groups: HashSet<&str> = index
        .nodes()
        .iter()
        .filter(|node| !node.terminal)
        .map(|node| node.full_name.as_str())
        .collect();
    for p in plan {
        if groups.contains(p.to.as_str()) {
            return Err(PdfRenameError::NameCollision {
                name: p.to.clone(),
                first: p.from.to_string(),
                second: p.to.clone(),
            });
        }
    }

    Ok(())
}

fn set_need_appearances(graph: &mut PdfGraph, index: &FieldIndex) {
    let owner = match index.acroform_id().or_else(|| graph.catalog_id()) {
        Some(id) => id,
        None => return,
    };
    let Some(dict) = graph.dictionary_mut(owner) else {
        return;
    };
    let acroform = if index.acroform_id().is_some() {
        dict
    } else {
        match dict.get_mut(b"AcroForm") {
            Ok(Object::Dictionary(acroform)) => acroform,
            _ => return,
        }
    };
    acroform.set("NeedAppearances", Object::Boolean(true));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldKind;
    use crate::reader::parse;
    use crate::test_support::{form_pdf, FieldSpec};
    use crate::writer::serialize;
    use pretty_assertions::assert_eq;

    fn setup(fields: &[FieldSpec]) -> (PdfGraph, FieldIndex) {
        let graph = parse(&form_pdf(fields)).unwrap();
        let index = FieldIndex::build(&graph).unwrap();
        (graph, index)
    }

    fn reindex(graph: &mut PdfGraph) -> FieldIndex {
        let bytes = serialize(graph).unwrap();
        FieldIndex::build(&parse(&bytes).unwrap()).unwrap()
    }

    fn mapping(entries: &[(&str, &str)]) -> RenameMapping {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_rename_single_text_field() {
        let (mut graph, index) = setup(&[FieldSpec::text("name")]);
        let report = rename(
            &mut graph,
            &index,
            &mapping(&[("name", "fullname")]),
            &RenameOptions::default(),
        )
        .unwrap();
        assert_eq!(report.renamed_count, 1);
        assert_eq!(report.renamed[0].to, "fullname");

        let after = reindex(&mut graph);
        let field = after.get("fullname").unwrap();
        assert_eq!(field.kind, FieldKind::Text);
        assert!(after.get("name").is_none());
    }

    #[test]
    fn test_collision_aborts_whole_batch() {
        let (mut graph, index) = setup(&[
            FieldSpec::text("a"),
            FieldSpec::text("b"),
            FieldSpec::text("c"),
        ]);
        let err = rename(
            &mut graph,
            &index,
            &mapping(&[("a", "b"), ("c", "renamed")]),
            &RenameOptions::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            PdfRenameError::NameCollision {
                name: "b".into(),
                first: "a".into(),
                second: "b".into(),
            }
        );

        let after = reindex(&mut graph);
        assert_eq!(after.field_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_swap_is_not_a_collision() {
        let (mut graph, index) = setup(&[FieldSpec::text("a"), FieldSpec::text("b")]);
        let report = rename(
            &mut graph,
            &index,
            &mapping(&[("a", "b"), ("b", "a")]),
            &RenameOptions::default(),
        )
        .unwrap();
        assert_eq!(report.renamed_count, 2);
        assert_eq!(reindex(&mut graph).field_names(), vec!["b", "a"]);
    }

    #[test]
    fn test_unmatched_entries_reported_others_applied() {
        let (mut graph, index) = setup(&[FieldSpec::text("a"), FieldSpec::checkbox("b")]);
        let report = rename(
            &mut graph,
            &index,
            &mapping(&[("a", "alpha"), ("ghost", "x"), ("b", "beta")]),
            &RenameOptions::default(),
        )
        .unwrap();
        assert_eq!(report.renamed_count, 2);
        assert_eq!(
            report.unmatched,
            vec![FieldNotFound {
                name: "ghost".into()
            }]
        );
        assert_eq!(reindex(&mut graph).field_names(), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_same_name_is_unchanged_not_counted() {
        let (mut graph, index) = setup(&[FieldSpec::text("a")]);
        let report = rename(
            &mut graph,
            &index,
            &mapping(&[("a", "a")]),
            &RenameOptions::default(),
        )
        .unwrap();
        assert_eq!(report.renamed_count, 0);
        assert_eq!(report.unchanged, vec!["a".to_string()]);
    }

    #[test]
    fn test_hierarchical_rename_accepts_partial_or_full_name() {
        let (mut graph, index) = setup(&[FieldSpec::group(
            "person",
            vec![FieldSpec::text("first"), FieldSpec::text("last")],
        )]);
        let report = rename(
            &mut graph,
            &index,
            &mapping(&[("person.first", "given"), ("person.last", "person.family")]),
            &RenameOptions::default(),
        )
        .unwrap();
        assert_eq!(report.renamed_count, 2);
        assert_eq!(
            reindex(&mut graph).field_names(),
            vec!["person.given", "person.family"]
        );
    }

    #[test]
    fn test_moving_to_other_parent_is_invalid() {
        let (mut graph, index) = setup(&[FieldSpec::group(
            "person",
            vec![FieldSpec::text("first")],
        )]);
        let err = rename(
            &mut graph,
            &index,
            &mapping(&[("person.first", "company.first")]),
            &RenameOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PdfRenameError::InvalidName { .. }));
    }

    #[test]
    fn test_dotted_name_on_top_level_field_is_invalid() {
        let (mut graph, index) = setup(&[FieldSpec::text("a")]);
        let err = rename(
            &mut graph,
            &index,
            &mapping(&[("a", "x.y")]),
            &RenameOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PdfRenameError::InvalidName { name, .. } if name == "x.y"));
    }

    #[test]
    fn test_dotted_name_under_unnamed_parent_uses_leaf() {
        let (mut graph, index) = setup(&[FieldSpec::unnamed_group(vec![
            FieldSpec::text("a"),
            FieldSpec::text("b"),
        ])]);
        let report = rename(
            &mut graph,
            &index,
            &mapping(&[("a", "x.renamed")]),
            &RenameOptions::default(),
        )
        .unwrap();
        assert_eq!(report.renamed_count, 1);
        assert_eq!(report.renamed[0].to, "renamed");
        assert_eq!(reindex(&mut graph).field_names(), vec!["renamed", "b"]);
    }

    #[test]
    fn test_dotted_leaf_under_unnamed_parent_still_checked_for_collisions() {
        let (mut graph, index) = setup(&[FieldSpec::unnamed_group(vec![
            FieldSpec::text("a"),
            FieldSpec::text("b"),
        ])]);
        let err = rename(
            &mut graph,
            &index,
            &mapping(&[("a", "x.b")]),
            &RenameOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PdfRenameError::NameCollision { name, .. } if name == "b"));
        assert_eq!(reindex(&mut graph).field_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_and_malformed_names_are_invalid() {
        for bad in ["", "   ", ".a", "a.", "a..b"] {
            let (mut graph, index) = setup(&[FieldSpec::text("a"), FieldSpec::text("b")]);
            let result = rename(
                &mut graph,
                &index,
                &mapping(&[("a", bad), ("b", "fine")]),
                &RenameOptions::default(),
            );
            assert!(
                matches!(result, Err(PdfRenameError::InvalidName { .. })),
                "'{}' should be rejected",
                bad
            );
            assert_eq!(reindex(&mut graph).field_names(), vec!["a", "b"]);
        }
    }

    #[test]
    fn test_terminal_cannot_take_group_name() {
        let (mut graph, index) = setup(&[
            FieldSpec::group("grp", vec![FieldSpec::text("x")]),
            FieldSpec::text("loose"),
        ]);
        let err = rename(
            &mut graph,
            &index,
            &mapping(&[("loose", "grp")]),
            &RenameOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PdfRenameError::NameCollision { name, .. } if name == "grp"));
    }

    #[test]
    fn test_rename_keeps_structure_untouched() {
        let (mut graph, index) = setup(&[
            FieldSpec::radio("choice", 2),
            FieldSpec::group("g", vec![FieldSpec::text("inner")]),
        ]);
        let before: Vec<_> = index
            .nodes()
            .iter()
            .map(|n| (n.id, n.parent, n.kids.clone(), n.widgets.clone()))
            .collect();

        rename(
            &mut graph,
            &index,
            &mapping(&[("choice", "pick"), ("g.inner", "deep")]),
            &RenameOptions::default(),
        )
        .unwrap();

        let after = FieldIndex::build(&graph).unwrap();
        let after: Vec<_> = after
            .nodes()
            .iter()
            .map(|n| (n.id, n.parent, n.kids.clone(), n.widgets.clone()))
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_need_appearances_set_on_request() {
        let (mut graph, index) = setup(&[FieldSpec::text("a")]);
        rename(
            &mut graph,
            &index,
            &mapping(&[("a", "b")]),
            &RenameOptions {
                need_appearances: true,
            },
        )
        .unwrap();
        let acroform = graph.dictionary(index.acroform_id().unwrap()).unwrap();
        assert!(matches!(
            acroform.get(b"NeedAppearances"),
            Ok(Object::Boolean(true))
        ));
    }

    #[test]
    fn test_non_ascii_name_round_trips() {
        let (mut graph, index) = setup(&[FieldSpec::text("a")]);
        rename(
            &mut graph,
            &index,
            &mapping(&[("a", "prénom")]),
            &RenameOptions::default(),
        )
        .unwrap();
        assert_eq!(reindex(&mut graph).field_names(), vec!["prénom"]);
    }

    #[test]
    fn test_mapping_deserializes_from_json_object() {
        let mapping: RenameMapping =
            serde_json::from_str(r#"{"name":"fullname","date":"signed_on"}"#).unwrap();
        assert_eq!(mapping.len(), 2);
        let entries: Vec<_> = mapping.iter().collect();
        assert_eq!(entries, vec![("date", "signed_on"), ("name", "fullname")]);
    }
}
