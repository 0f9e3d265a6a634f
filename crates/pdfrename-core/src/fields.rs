//! Form Field Index
//!
//! Walks the AcroForm field tree depth-first in `/Fields` then `/Kids` array
//! order and records every node with its fully-qualified name, its closed
//! [`FieldKind`] classification and its widget annotations.

use std::collections::{HashMap, HashSet};
use std::fmt;

use lopdf::{Dictionary, Object, ObjectId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::PdfRenameError;
use crate::graph::PdfGraph;
use crate::text::decode_text_string;

/// Field trees deeper than this are cut off.
pub const MAX_FIELD_DEPTH: usize = 64;

// Field flag bits, ISO 32000-1 Tables 226 and 230 (bit n is `1 << (n - 1)`)
const FF_RADIO: i64 = 1 << 15;
const FF_PUSHBUTTON: i64 = 1 << 16;
const FF_COMBO: i64 = 1 << 17;

/// Closed classification of a field, computed from `/FT` and `/Ff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Text,
    Checkbox,
    Dropdown,
    #[serde(rename = "Radio")]
    RadioGroup,
    Button,
    Unknown,
}

impl FieldKind {
    /// Classify from the (possibly inherited) `/FT` name and `/Ff` flags.
    ///
    /// List boxes and signature fields fall into `Unknown`.
    pub fn classify(field_type: Option<&[u8]>, flags: i64) -> Self {
        match field_type {
            Some(b"Tx") => FieldKind::Text,
            Some(b"Btn") if flags & FF_PUSHBUTTON != 0 => FieldKind::Button,
            Some(b"Btn") if flags & FF_RADIO != 0 => FieldKind::RadioGroup,
            Some(b"Btn") => FieldKind::Checkbox,
            Some(b"Ch") if flags & FF_COMBO != 0 => FieldKind::Dropdown,
            _ => FieldKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "Text",
            FieldKind::Checkbox => "Checkbox",
            FieldKind::Dropdown => "Dropdown",
            FieldKind::RadioGroup => "Radio",
            FieldKind::Button => "Button",
            FieldKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Page-level representation of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetAnnotation {
    pub id: ObjectId,
    /// `/Parent` back-reference, a key into the graph
    pub parent: Option<ObjectId>,
    /// Indirect appearance (`/AP`, or its `/N` entry when `/AP` is direct)
    pub appearance: Option<ObjectId>,
    /// Owning page (`/P`)
    pub page: Option<ObjectId>,
    /// Widget and field share one dictionary
    pub merged: bool,
}

/// One node of the AcroForm field hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub id: ObjectId,
    /// `/T`, absent on some intermediate nodes
    pub partial_name: Option<String>,
    /// Fully-qualified name contributed by ancestors, empty at top level
    pub prefix: String,
    pub full_name: String,
    pub kind: FieldKind,
    pub parent: Option<ObjectId>,
    /// Child fields (widget kids are in `widgets`)
    pub kids: Vec<ObjectId>,
    pub widgets: Vec<WidgetAnnotation>,
    pub terminal: bool,
    pub depth: usize,
}

/// Row of the analyze listing: `{ name, type, original_name }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldKind,
    pub original_name: String,
}

/// Ordered, addressable collection of every field node in a document.
#[derive(Debug, Clone)]
pub struct FieldIndex {
    /// `None` when the AcroForm dictionary is direct inside the catalog
    acroform: Option<ObjectId>,
    nodes: Vec<FormField>,
    terminals: Vec<usize>,
    by_name: HashMap<String, Vec<usize>>,
}

impl FieldIndex {
    /// Build the index from the catalog's `/AcroForm`.
    ///
    /// Fails with `NoForm` if there is no AcroForm or its `/Fields` array is
    /// missing or empty.
    pub fn build(graph: &PdfGraph) -> Result<Self, PdfRenameError> {
        let catalog = graph.catalog().ok_or_else(|| {
            PdfRenameError::MalformedDocument("trailer has no resolvable /Root catalog".into())
        })?;

        let acroform_ref = catalog
            .get(b"AcroForm")
            .map_err(|_| PdfRenameError::NoForm("document catalog has no /AcroForm".into()))?;
        let acroform = match acroform_ref {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        let acroform_dict = graph
            .lookup_dict(catalog, b"AcroForm")
            .ok_or_else(|| PdfRenameError::NoForm("/AcroForm is not a dictionary".into()))?;

        let fields = graph
            .lookup_array(acroform_dict, b"Fields")
            .filter(|fields| !fields.is_empty())
            .ok_or_else(|| PdfRenameError::NoForm("/AcroForm has no fields".into()))?;

        let mut walker = Walker {
            graph,
            nodes: Vec::new(),
            seen: HashSet::new(),
        };
        for entry in fields {
            match entry {
                Object::Reference(id) => walker.visit(*id, None, "", Inherited::default(), 0),
                _ => warn!("skipping direct object in /Fields"),
            }
        }

        let nodes = walker.nodes;
        let terminals: Vec<usize> = nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.terminal)
            .map(|(pos, _)| pos)
            .collect();
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for &pos in &terminals {
            by_name
                .entry(nodes[pos].full_name.clone())
                .or_default()
                .push(pos);
        }

        debug!(
            nodes = nodes.len(),
            terminals = terminals.len(),
            "built form field index"
        );

        Ok(Self {
            acroform,
            nodes,
            terminals,
            by_name,
        })
    }

    pub(crate) fn acroform_id(&self) -> Option<ObjectId> {
        self.acroform
    }

    /// Every node, intermediate and terminal, in traversal order
    pub fn nodes(&self) -> &[FormField] {
        &self.nodes
    }

    /// Terminal fields in declaration order
    pub fn terminals(&self) -> impl Iterator<Item = &FormField> + '_ {
        self.terminals.iter().map(|&pos| &self.nodes[pos])
    }

    pub(crate) fn terminal_positions(&self) -> &[usize] {
        &self.terminals
    }

    /// Number of terminal fields
    pub fn len(&self) -> usize {
        self.terminals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terminals.is_empty()
    }

    /// First terminal field with this fully-qualified name
    pub fn get(&self, full_name: &str) -> Option<&FormField> {
        self.positions(full_name).first().map(|&pos| &self.nodes[pos])
    }

    /// Positions in [`nodes`](Self::nodes) of every terminal field carrying
    /// `full_name` (more than one only in malformed documents).
    pub(crate) fn positions(&self, full_name: &str) -> &[usize] {
        self.by_name
            .get(full_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.terminals().map(|f| f.full_name.as_str()).collect()
    }

    pub fn summaries(&self) -> Vec<FieldSummary> {
        self.terminals()
            .map(|field| FieldSummary {
                name: field.full_name.clone(),
                field_type: field.kind,
                original_name: field.full_name.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
struct Inherited {
    field_type: Option<Vec<u8>>,
    flags: Option<i64>,
}

struct Walker<'a> {
    graph: &'a PdfGraph,
    nodes: Vec<FormField>,
    seen: HashSet<ObjectId>,
}

impl Walker<'_> {
    fn visit(
        &mut self,
        id: ObjectId,
        parent: Option<ObjectId>,
        prefix: &str,
        inherited: Inherited,
        depth: usize,
    ) {
        if depth >= MAX_FIELD_DEPTH {
            warn!(?id, "field tree exceeds maximum depth; subtree skipped");
            return;
        }
        if !self.seen.insert(id) {
            warn!(?id, "field reached twice (cycle or shared kid); skipped");
            return;
        }
        let graph = self.graph;
        let Some(dict) = graph.dictionary(id) else {
            warn!(?id, "field reference does not resolve to a dictionary");
            return;
        };

        let partial_name = partial_name(graph, dict);
        let full_name = qualify(prefix, partial_name.as_deref());
        let inherited = Inherited {
            field_type: match graph.lookup(dict, b"FT") {
                Some(Object::Name(name)) => Some(name.clone()),
                _ => inherited.field_type,
            },
            flags: match graph.lookup(dict, b"Ff") {
                Some(Object::Integer(flags)) => Some(*flags),
                _ => inherited.flags,
            },
        };

        let mut child_fields = Vec::new();
        let mut widgets = Vec::new();
        for kid in graph.lookup_array(dict, b"Kids").unwrap_or_default() {
            let Object::Reference(kid_id) = kid else {
                warn!(?id, "skipping direct object in /Kids");
                continue;
            };
            match graph.dictionary(*kid_id) {
                Some(kid_dict) if is_field_node(kid_dict) => child_fields.push(*kid_id),
                Some(kid_dict) => widgets.push(widget(graph, *kid_id, kid_dict, false)),
                None => warn!(?kid_id, "kid does not resolve to a dictionary"),
            }
        }

        let terminal = child_fields.is_empty();
        if terminal && is_merged_widget(dict) {
            widgets.insert(0, widget(graph, id, dict, true));
        }

        let kind = FieldKind::classify(
            inherited.field_type.as_deref(),
            inherited.flags.unwrap_or(0),
        );

        self.nodes.push(FormField {
            id,
            partial_name,
            prefix: prefix.to_string(),
            full_name: full_name.clone(),
            kind,
            parent,
            kids: child_fields.clone(),
            widgets,
            terminal,
            depth,
        });

        for kid_id in child_fields {
            self.visit(kid_id, Some(id), &full_name, inherited.clone(), depth + 1);
        }
    }
}

/// Join an ancestor path and a partial name; unnamed nodes add nothing.
pub(crate) fn qualify(prefix: &str, partial: Option<&str>) -> String {
    match (prefix.is_empty(), partial) {
        (_, None) => prefix.to_string(),
        (true, Some(name)) => name.to_string(),
        (false, Some(name)) => format!("{}.{}", prefix, name),
    }
}

fn partial_name(graph: &PdfGraph, dict: &Dictionary) -> Option<String> {
    match graph.lookup(dict, b"T")? {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        Object::Name(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

/// Kids that carry a name or kids of their own are fields; the rest are widgets.
fn is_field_node(dict: &Dictionary) -> bool {
    dict.has(b"T") || dict.has(b"Kids")
}

fn is_merged_widget(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(name)) if name.as_slice() == b"Widget")
        || dict.has(b"Rect")
}

fn widget(graph: &PdfGraph, id: ObjectId, dict: &Dictionary, merged: bool) -> WidgetAnnotation {
    let appearance = match dict.get(b"AP") {
        Ok(Object::Reference(ap)) => Some(*ap),
        Ok(Object::Dictionary(ap)) => match ap.get(b"N") {
            Ok(Object::Reference(normal)) => Some(*normal),
            _ => None,
        },
        _ => None,
    };
    let reference = |key: &[u8]| match dict.get(key) {
        Ok(Object::Reference(target)) if graph.contains(*target) => Some(*target),
        _ => None,
    };
    WidgetAnnotation {
        id,
        parent: reference(b"Parent"),
        appearance,
        page: reference(b"P"),
        merged,
    }
}
