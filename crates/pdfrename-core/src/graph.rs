//! In-memory PDF object graph
//!
//! Every indirect object lives in one arena keyed by `(object number,
//! generation)`. Links between objects (parent/kids, field/widget) are keys
//! into the arena, never owning pointers, so reference cycles are harmless.

use std::collections::BTreeSet;

use lopdf::{Dictionary, Document, Object, ObjectId};

/// Reference chains longer than this are treated as unresolvable.
const MAX_REFERENCE_HOPS: usize = 32;

/// Arena of indirect objects plus the trailer, backed by `lopdf::Document`.
#[derive(Debug, Clone)]
pub struct PdfGraph {
    doc: Document,
}

impl PdfGraph {
    pub(crate) fn from_document(doc: Document) -> Self {
        Self { doc }
    }

    /// Read-only access to the underlying document
    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub(crate) fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// PDF header version, e.g. "1.7"
    pub fn version(&self) -> &str {
        &self.doc.version
    }

    pub fn object_count(&self) -> usize {
        self.doc.objects.len()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.doc.objects.contains_key(&id)
    }

    /// All object ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.doc.objects.keys().copied()
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.doc.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.doc.objects.get_mut(&id)
    }

    pub fn trailer(&self) -> &Dictionary {
        &self.doc.trailer
    }

    /// Follow references until a direct object is reached.
    ///
    /// Returns `None` for dangling references and for chains that loop.
    pub fn resolve<'a>(&'a self, mut obj: &'a Object) -> Option<&'a Object> {
        for _ in 0..MAX_REFERENCE_HOPS {
            match obj {
                Object::Reference(id) => obj = self.get(*id)?,
                direct => return Some(direct),
            }
        }
        None
    }

    /// Dictionary of an indirect object; streams yield their stream dictionary.
    pub fn dictionary(&self, id: ObjectId) -> Option<&Dictionary> {
        match self.get(id)? {
            Object::Dictionary(dict) => Some(dict),
            Object::Stream(stream) => Some(&stream.dict),
            _ => None,
        }
    }

    pub fn dictionary_mut(&mut self, id: ObjectId) -> Option<&mut Dictionary> {
        match self.get_mut(id)? {
            Object::Dictionary(dict) => Some(dict),
            Object::Stream(stream) => Some(&mut stream.dict),
            _ => None,
        }
    }

    /// Look up `key` in `dict` and resolve any reference it holds.
    pub fn lookup<'a>(&'a self, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
        self.resolve(dict.get(key).ok()?)
    }

    pub fn lookup_dict<'a>(&'a self, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
        match self.lookup(dict, key)? {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn lookup_array<'a>(&'a self, dict: &'a Dictionary, key: &[u8]) -> Option<&'a [Object]> {
        match self.lookup(dict, key)? {
            Object::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Object id of the document catalog (`/Root`), when it is indirect
    pub fn catalog_id(&self) -> Option<ObjectId> {
        match self.doc.trailer.get(b"Root").ok()? {
            Object::Reference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn catalog(&self) -> Option<&Dictionary> {
        self.lookup_dict(&self.doc.trailer, b"Root")
    }

    /// Every reference appearing anywhere in the graph that has no object.
    pub fn dangling_references(&self) -> BTreeSet<ObjectId> {
        let mut dangling = BTreeSet::new();
        let mut check = |id: ObjectId| {
            if !self.contains(id) {
                dangling.insert(id);
            }
        };
        for obj in self.doc.objects.values() {
            visit_references(obj, &mut check);
        }
        for (_, value) in self.doc.trailer.iter() {
            visit_references(value, &mut check);
        }
        dangling
    }

    /// Replace every reference to one of `ids` with `null`.
    pub(crate) fn nullify_references(&mut self, ids: &BTreeSet<ObjectId>) -> usize {
        let mut replaced = 0;
        for obj in self.doc.objects.values_mut() {
            replaced += nullify_in(obj, ids);
        }
        for (_, value) in self.doc.trailer.iter_mut() {
            replaced += nullify_in(value, ids);
        }
        replaced
    }
}

/// Call `f` for every reference contained in `obj`, recursing into
/// arrays, dictionaries and stream dictionaries.
pub(crate) fn visit_references(obj: &Object, f: &mut impl FnMut(ObjectId)) {
    match obj {
        Object::Reference(id) => f(*id),
        Object::Array(items) => items.iter().for_each(|item| visit_references(item, f)),
        Object::Dictionary(dict) => dict.iter().for_each(|(_, v)| visit_references(v, f)),
        Object::Stream(stream) => stream.dict.iter().for_each(|(_, v)| visit_references(v, f)),
        _ => {}
    }
}

fn nullify_in(obj: &mut Object, ids: &BTreeSet<ObjectId>) -> usize {
    match obj {
        Object::Reference(id) if ids.contains(id) => {
            *obj = Object::Null;
            1
        }
        Object::Array(items) => items.iter_mut().map(|item| nullify_in(item, ids)).sum(),
        Object::Dictionary(dict) => dict.iter_mut().map(|(_, v)| nullify_in(v, ids)).sum(),
        Object::Stream(stream) => stream
            .dict
            .iter_mut()
            .map(|(_, v)| nullify_in(v, ids))
            .sum(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn graph_with_dangling() -> PdfGraph {
        let mut doc = Document::with_version("1.7");
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Missing" => Object::Reference((99, 0)),
            "Nested" => vec![Object::Reference((98, 0)), Object::Integer(1)],
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        PdfGraph::from_document(doc)
    }

    #[test]
    fn test_resolve_follows_reference() {
        let graph = graph_with_dangling();
        let root = graph.trailer().get(b"Root").unwrap();
        let catalog = graph.resolve(root).unwrap();
        assert!(catalog.as_dict().is_ok());
        assert_eq!(graph.catalog_id(), graph.ids().next());
    }

    #[test]
    fn test_resolve_dangling_is_none() {
        let graph = graph_with_dangling();
        assert!(graph.resolve(&Object::Reference((99, 0))).is_none());
    }

    #[test]
    fn test_dangling_references_found_in_nested_values() {
        let graph = graph_with_dangling();
        let dangling: Vec<ObjectId> = graph.dangling_references().into_iter().collect();
        assert_eq!(dangling, vec![(98, 0), (99, 0)]);
    }

    #[test]
    fn test_nullify_replaces_every_occurrence() {
        let mut graph = graph_with_dangling();
        let dangling = graph.dangling_references();
        assert_eq!(graph.nullify_references(&dangling), 2);
        assert!(graph.dangling_references().is_empty());
        let catalog = graph.catalog().unwrap();
        assert!(matches!(catalog.get(b"Missing"), Ok(Object::Null)));
    }
}
