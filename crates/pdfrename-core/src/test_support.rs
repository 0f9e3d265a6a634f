//! Fixture PDFs built with lopdf
//!
//! Shared by unit tests, the integration tests under `tests/` and the HTTP
//! tests of the API crate (through the `test-support` feature).

use std::collections::BTreeMap;

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

/// Shape of a field node in a generated fixture
#[derive(Debug, Clone)]
pub enum FieldSpec {
    Terminal {
        name: String,
        field_type: &'static str,
        flags: i64,
        /// 0 = widget merged into the field dictionary
        widgets: usize,
    },
    Group {
        name: Option<String>,
        kids: Vec<FieldSpec>,
    },
}

impl FieldSpec {
    pub fn text(name: &str) -> Self {
        Self::terminal(name, "Tx", 0, 0)
    }

    pub fn checkbox(name: &str) -> Self {
        Self::terminal(name, "Btn", 0, 0)
    }

    pub fn radio(name: &str, options: usize) -> Self {
        Self::terminal(name, "Btn", 1 << 15, options)
    }

    pub fn button(name: &str) -> Self {
        Self::terminal(name, "Btn", 1 << 16, 0)
    }

    pub fn dropdown(name: &str) -> Self {
        Self::terminal(name, "Ch", 1 << 17, 0)
    }

    pub fn list_box(name: &str) -> Self {
        Self::terminal(name, "Ch", 0, 0)
    }

    pub fn signature(name: &str) -> Self {
        Self::terminal(name, "Sig", 0, 0)
    }

    pub fn group(name: &str, kids: Vec<FieldSpec>) -> Self {
        Self::Group {
            name: Some(name.to_string()),
            kids,
        }
    }

    pub fn unnamed_group(kids: Vec<FieldSpec>) -> Self {
        Self::Group { name: None, kids }
    }

    fn terminal(name: &str, field_type: &'static str, flags: i64, widgets: usize) -> Self {
        Self::Terminal {
            name: name.to_string(),
            field_type,
            flags,
            widgets,
        }
    }
}

/// Saved fixture plus the object ids tests need to refer back to
#[derive(Debug, Clone)]
pub struct FormFixture {
    pub bytes: Vec<u8>,
    pub page: ObjectId,
    pub catalog: ObjectId,
    /// Top-level fields in `/Fields` order
    pub fields: Vec<ObjectId>,
}

/// Document with one page and the given AcroForm field tree
pub fn form_document(fields: &[FieldSpec]) -> Document {
    build(fields).0
}

pub fn form_fixture(fields: &[FieldSpec]) -> FormFixture {
    let (doc, page, catalog, fields) = build(fields);
    FormFixture {
        bytes: save(doc),
        page,
        catalog,
        fields,
    }
}

pub fn form_pdf(fields: &[FieldSpec]) -> Vec<u8> {
    save(form_document(fields))
}

/// A valid one-page PDF with no /AcroForm entry
pub fn plain_pdf() -> Vec<u8> {
    let (mut doc, _, catalog_id, _) = build(&[]);
    doc.get_object_mut(catalog_id)
        .unwrap()
        .as_dict_mut()
        .unwrap()
        .remove(b"AcroForm");
    save(doc)
}

pub fn save(mut doc: Document) -> Vec<u8> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn build(fields: &[FieldSpec]) -> (Document, ObjectId, ObjectId, Vec<ObjectId>) {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );

    let mut annots = Vec::new();
    let top_level: Vec<ObjectId> = fields
        .iter()
        .map(|spec| add_field(&mut doc, spec, None, page_id, &mut annots))
        .collect();

    if let Ok(Object::Dictionary(page)) = doc.get_object_mut(page_id) {
        page.set("Annots", Object::Array(annots));
    }

    let acroform_id = doc.add_object(dictionary! {
        "Fields" => top_level.iter().map(|&id| Object::Reference(id)).collect::<Vec<_>>(),
        "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
        "AcroForm" => Object::Reference(acroform_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    (doc, page_id, catalog_id, top_level)
}

fn add_field(
    doc: &mut Document,
    spec: &FieldSpec,
    parent: Option<ObjectId>,
    page_id: ObjectId,
    annots: &mut Vec<Object>,
) -> ObjectId {
    let id = doc.new_object_id();
    let mut dict = Dictionary::new();
    if let Some(parent) = parent {
        dict.set("Parent", Object::Reference(parent));
    }

    match spec {
        FieldSpec::Terminal {
            name,
            field_type,
            flags,
            widgets,
        } => {
            dict.set("T", Object::string_literal(name.as_str()));
            dict.set("FT", Object::Name(field_type.as_bytes().to_vec()));
            if *flags != 0 {
                dict.set("Ff", Object::Integer(*flags));
            }
            dict.set("V", Object::string_literal("value"));
            if *widgets == 0 {
                add_widget_entries(doc, &mut dict, page_id);
                annots.push(Object::Reference(id));
            } else {
                let mut kids = Vec::new();
                for _ in 0..*widgets {
                    let mut widget = dictionary! {
                        "Parent" => Object::Reference(id),
                    };
                    add_widget_entries(doc, &mut widget, page_id);
                    let widget_id = doc.add_object(widget);
                    annots.push(Object::Reference(widget_id));
                    kids.push(Object::Reference(widget_id));
                }
                dict.set("Kids", Object::Array(kids));
            }
        }
        FieldSpec::Group { name, kids } => {
            if let Some(name) = name {
                dict.set("T", Object::string_literal(name.as_str()));
            }
            let kid_ids: Vec<Object> = kids
                .iter()
                .map(|kid| Object::Reference(add_field(doc, kid, Some(id), page_id, annots)))
                .collect();
            dict.set("Kids", Object::Array(kid_ids));
        }
    }

    doc.objects.insert(id, Object::Dictionary(dict));
    id
}

fn add_widget_entries(doc: &mut Document, dict: &mut Dictionary, page_id: ObjectId) {
    let appearance = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), 100.into(), 20.into()],
        },
        b"0 0 1 rg 0 0 100 20 re f".to_vec(),
    ));
    dict.set("Type", Object::Name(b"Annot".to_vec()));
    dict.set("Subtype", Object::Name(b"Widget".to_vec()));
    dict.set(
        "Rect",
        vec![100.into(), 100.into(), 200.into(), 120.into()],
    );
    dict.set("P", Object::Reference(page_id));
    dict.set(
        "AP",
        dictionary! {
            "N" => Object::Reference(appearance),
        },
    );
}

/// Append an incremental update that redefines `field` as a text field
/// named `new_name`, chained to the previous revision through `/Prev`.
pub fn append_update(fixture: &FormFixture, field: ObjectId, new_name: &str) -> Vec<u8> {
    let size = match Document::load_mem(&fixture.bytes).unwrap().trailer.get(b"Size") {
        Ok(Object::Integer(size)) => *size,
        other => panic!("fixture trailer has no /Size: {:?}", other),
    };
    let mut bytes = fixture.bytes.clone();
    let prev = last_startxref(&bytes);

    bytes.push(b'\n');
    let object_offset = bytes.len();
    bytes.extend_from_slice(
        format!(
            "{} {} obj\n<< /FT /Tx /T ({}) /Type /Annot /Subtype /Widget /Rect [100 100 200 120] /P {} {} R >>\nendobj\n",
            field.0, field.1, new_name, fixture.page.0, fixture.page.1
        )
        .as_bytes(),
    );

    let xref_offset = bytes.len();
    bytes.extend_from_slice(
        format!(
            "xref\n{} 1\n{:010} {:05} n \ntrailer\n<< /Size {} /Root {} {} R /Prev {} >>\nstartxref\n{}\n%%EOF\n",
            field.0,
            object_offset,
            field.1,
            size,
            fixture.catalog.0,
            fixture.catalog.1,
            prev,
            xref_offset
        )
        .as_bytes(),
    );
    bytes
}

fn last_startxref(bytes: &[u8]) -> usize {
    let marker = b"startxref";
    let pos = bytes
        .windows(marker.len())
        .rposition(|w| w == marker)
        .unwrap();
    String::from_utf8_lossy(&bytes[pos + marker.len()..])
        .split_whitespace()
        .next()
        .unwrap()
        .parse()
        .unwrap()
}

/// Catalog, pages and page bodies shared by the hand-written fixtures.
/// The page lists field `5 0 R` as its only annotation.
fn hand_written_page_objects() -> Vec<(u32, String)> {
    vec![
        (1, "<< /Type /Catalog /Pages 2 0 R /AcroForm 4 0 R >>".to_string()),
        (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string()),
        (
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Annots [5 0 R] >>".to_string(),
        ),
    ]
}

fn hand_written_form_objects(field_name: &str) -> Vec<(u32, String)> {
    vec![
        (4, "<< /Fields [5 0 R] >>".to_string()),
        (
            5,
            format!(
                "<< /FT /Tx /T ({}) /Type /Annot /Subtype /Widget /Rect [0 0 100 20] /P 3 0 R >>",
                field_name
            ),
        ),
    ]
}

/// A PDF 1.5 file indexed by an uncompressed cross-reference stream, with
/// the one-field form (objects 4 and 5) stored as ordinary objects.
pub fn xref_stream_form(field_name: &str) -> Vec<u8> {
    let mut objects = hand_written_page_objects();
    objects.extend(hand_written_form_objects(field_name));
    xref_stream_pdf(&objects, &[])
}

/// Like [`xref_stream_form`], but the AcroForm (4) and field (5) are
/// compressed objects inside an object stream (6); the cross-reference
/// stream (7) addresses them with type 2 entries.
pub fn object_stream_form(field_name: &str) -> Vec<u8> {
    xref_stream_pdf(
        &hand_written_page_objects(),
        &hand_written_form_objects(field_name),
    )
}

/// Write `direct` objects at top level and `packed` objects into one object
/// stream numbered after them, then index everything with a cross-reference
/// stream using `/W [1 4 2]`.
fn xref_stream_pdf(direct: &[(u32, String)], packed: &[(u32, String)]) -> Vec<u8> {
    // object number -> (entry type, field 2, field 3)
    let mut rows: BTreeMap<u32, (u8, u32, u16)> = BTreeMap::new();
    let mut out = b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\n".to_vec();

    for (num, body) in direct {
        rows.insert(*num, (1, out.len() as u32, 0));
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", num, body).as_bytes());
    }

    let mut next = direct
        .iter()
        .chain(packed)
        .map(|(num, _)| *num)
        .max()
        .unwrap_or(0)
        + 1;

    if !packed.is_empty() {
        let container = next;
        next += 1;

        let mut header = String::new();
        let mut data = String::new();
        for (index, (num, body)) in packed.iter().enumerate() {
            header.push_str(&format!("{} {} ", num, data.len()));
            data.push_str(body);
            data.push('\n');
            rows.insert(*num, (2, container, index as u16));
        }
        let content = format!("{}{}", header, data);

        rows.insert(container, (1, out.len() as u32, 0));
        out.extend_from_slice(
            format!(
                "{} 0 obj\n<< /Type /ObjStm /N {} /First {} /Length {} >>\nstream\n{}\nendstream\nendobj\n",
                container,
                packed.len(),
                header.len(),
                content.len(),
                content
            )
            .as_bytes(),
        );
    }

    let xref = next;
    let xref_offset = out.len();
    rows.insert(xref, (1, xref_offset as u32, 0));
    let size = xref + 1;

    let mut table = vec![0u8, 0, 0, 0, 0, 0xFF, 0xFF];
    for num in 1..size {
        let (kind, second, third) = rows.get(&num).copied().unwrap_or((0, 0, 0));
        table.push(kind);
        table.extend_from_slice(&second.to_be_bytes());
        table.extend_from_slice(&third.to_be_bytes());
    }

    out.extend_from_slice(
        format!(
            "{} 0 obj\n<< /Type /XRef /Size {} /W [1 4 2] /Root 1 0 R /Length {} >>\nstream\n",
            xref,
            size,
            table.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&table);
    out.extend_from_slice(
        format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes(),
    );
    out
}
