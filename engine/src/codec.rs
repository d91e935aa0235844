//! Snapshot codec - converts live sessions to portable snapshots and back.
//!
//! Serialization is total: any session becomes a snapshot, with
//! unserializable fragments replaced by a sentinel rather than failing the
//! save. Deserialization is partial: it fails only when the required
//! fields (`id`, `name`, `documentState`) are missing, and degrades
//! per-field everywhere else so one corrupt value never aborts a restore.
//!
//! Each non-portable container is handled by a pair of pure conversion
//! functions, independently testable, rather than inline conversions at
//! call sites.

use crate::error::Result;
use crate::session::{
    DocumentState, EditorSession, EditorState, ElementCollections, FinalLayoutSettings,
    LayerState, ViewState, WorkflowStep,
};
use crate::snapshot::{PortableDocumentState, PortableEditorState, ProjectSnapshot};
use crate::{Error, ProjectId, Timestamp, SNAPSHOT_SCHEMA_VERSION};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Placeholder written in place of fragments that cannot be represented as
/// plain JSON (over-deep nesting being the Rust-visible case).
pub const UNSERIALIZABLE_SENTINEL: &str = "[Unserializable]";

/// Recursion bound for element payloads. Plain editor data is a few levels
/// deep; anything past this is treated as a runaway structure.
const MAX_PAYLOAD_DEPTH: usize = 64;

/// The result of restoring a snapshot: a ready-to-install session state
/// with all transient fields forced to safe defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPatch {
    pub id: ProjectId,
    pub name: String,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
    pub document: DocumentState,
    pub view: ViewState,
    pub elements: ElementCollections,
    pub layers: LayerState,
    pub editor: EditorState,
    pub source_language: String,
    pub desired_language: String,
    pub final_layout_settings: Option<FinalLayoutSettings>,
}

/// Convert a live session into a portable snapshot.
///
/// Total function: never fails. `now` stamps `updated_at` and, for sessions
/// that were never persisted, `created_at`.
pub fn serialize(session: &EditorSession, now: Timestamp) -> ProjectSnapshot {
    let name = if session.name.trim().is_empty() {
        format!("Project {now}")
    } else {
        session.name.clone()
    };

    // Final-layout settings only travel with sessions in that stage.
    let final_layout_settings = if session.view.current_workflow_step == WorkflowStep::FinalLayout
    {
        session.final_layout_settings.clone()
    } else {
        None
    };

    ProjectSnapshot {
        id: session.id.clone().filter(|id| !id.is_empty()),
        name,
        created_at: session.created_at.unwrap_or(now),
        updated_at: now,
        schema_version: SNAPSHOT_SCHEMA_VERSION.to_string(),
        document_state: document_to_portable(&session.document),
        view_state: session.view.clone(),
        element_collections: sanitize_elements(&session.elements),
        layer_state: session.layers.clone(),
        editor_state: PortableEditorState {
            show_deletion_rectangles: session.editor.show_deletion_rectangles,
        },
        source_language: session.source_language.clone(),
        desired_language: session.desired_language.clone(),
        final_layout_settings,
    }
}

/// Restore a session patch from stored snapshot data.
///
/// Fails with [`Error::MalformedSnapshot`] when `id`, `name` or
/// `documentState` is absent. Everything else degrades field by field.
pub fn deserialize(value: &Value) -> Result<SessionPatch> {
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::MalformedSnapshot("id".into()))?
        .to_string();

    let name = value
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MalformedSnapshot("name".into()))?
        .to_string();

    let doc = value
        .get("documentState")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::MalformedSnapshot("documentState".into()))?;

    let show_deletion_rectangles = value
        .pointer("/editorState/showDeletionRectangles")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(SessionPatch {
        id,
        name,
        created_at: value.get("createdAt").and_then(Value::as_u64),
        updated_at: value.get("updatedAt").and_then(Value::as_u64),
        document: document_from_object(doc),
        view: section_or_default(value.get("viewState"), "viewState"),
        elements: section_or_default(value.get("elementCollections"), "elementCollections"),
        layers: section_or_default(value.get("layerState"), "layerState"),
        // Selection cleared, edit modes off, loaded/not-loading/no-error.
        editor: EditorState::restored(show_deletion_rectangles),
        source_language: str_field(value, "sourceLanguage"),
        desired_language: str_field(value, "desiredLanguage"),
        final_layout_settings: value
            .get("finalLayoutSettings")
            .filter(|v| v.is_object())
            .and_then(|v| serde_json::from_value(v.clone()).ok()),
    })
}

/// Live background map to portable form: stringified integer keys.
pub fn backgrounds_to_portable(backgrounds: &BTreeMap<u32, String>) -> BTreeMap<String, String> {
    backgrounds
        .iter()
        .map(|(page, color)| (page.to_string(), color.clone()))
        .collect()
}

/// Portable background map back to the live integer-keyed form.
///
/// Unparsable keys and non-string values are dropped with a warning, never
/// fatal.
pub fn backgrounds_from_portable(value: Option<&Value>) -> BTreeMap<u32, String> {
    let Some(map) = value.and_then(Value::as_object) else {
        return BTreeMap::new();
    };

    let mut backgrounds = BTreeMap::new();
    for (key, color) in map {
        let Ok(page) = key.parse::<u32>() else {
            tracing::warn!(key, "dropping background entry with unparsable page key");
            continue;
        };
        let Some(color) = color.as_str() else {
            tracing::warn!(page, "dropping background entry with non-string color");
            continue;
        };
        backgrounds.insert(page, color.to_string());
    }
    backgrounds
}

/// Live page set to portable form: a plain array. Order carries no meaning.
pub fn pages_to_portable(pages: &BTreeSet<u32>) -> Vec<u32> {
    pages.iter().copied().collect()
}

/// Coerce a stored deleted-pages value back into a set.
///
/// Accepts a proper array, a set-like object (`{"values": [...]}`), or a
/// plain object with all-numeric keys whose values are the page numbers.
/// Anything else degrades to an empty set rather than failing the restore.
pub fn pages_from_value(value: Option<&Value>) -> BTreeSet<u32> {
    match value {
        None | Some(Value::Null) => BTreeSet::new(),
        Some(Value::Array(items)) => collect_page_numbers(items),
        Some(Value::Object(map)) => {
            if let Some(Value::Array(items)) = map.get("values") {
                return collect_page_numbers(items);
            }
            if !map.is_empty() && map.keys().all(|k| k.parse::<u32>().is_ok()) {
                return collect_page_numbers(map.values());
            }
            tracing::warn!("deleted-pages value is not set-like; restoring empty set");
            BTreeSet::new()
        }
        Some(other) => {
            tracing::warn!(
                kind = value_kind(other),
                "deleted-pages value has unexpected type; restoring empty set"
            );
            BTreeSet::new()
        }
    }
}

fn collect_page_numbers<'a, I>(items: I) -> BTreeSet<u32>
where
    I: IntoIterator<Item = &'a Value>,
{
    items
        .into_iter()
        .filter_map(|v| v.as_u64())
        .filter_map(|n| u32::try_from(n).ok())
        .collect()
}

/// Defensively sanitize an element payload.
///
/// Element payloads come from the editing surface and are opaque to the
/// engine. The depth bound plays the role of the cycle guard: a runaway
/// structure is cut off and replaced with [`UNSERIALIZABLE_SENTINEL`]
/// instead of aborting the save.
pub fn sanitize_value(value: &Value) -> Value {
    sanitize_at_depth(value, 0)
}

fn sanitize_at_depth(value: &Value, depth: usize) -> Value {
    if depth >= MAX_PAYLOAD_DEPTH {
        tracing::warn!(depth, "payload exceeds depth bound; replacing with sentinel");
        return Value::String(UNSERIALIZABLE_SENTINEL.to_string());
    }

    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| sanitize_at_depth(item, depth + 1))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), sanitize_at_depth(v, depth + 1)))
                .collect(),
        ),
        plain => plain.clone(),
    }
}

fn sanitize_elements(elements: &ElementCollections) -> ElementCollections {
    let sanitize_all = |items: &[Value]| items.iter().map(sanitize_value).collect();
    ElementCollections {
        original_text_boxes: sanitize_all(&elements.original_text_boxes),
        translated_text_boxes: sanitize_all(&elements.translated_text_boxes),
        original_images: sanitize_all(&elements.original_images),
        translated_images: sanitize_all(&elements.translated_images),
        final_layout_text_boxes: sanitize_all(&elements.final_layout_text_boxes),
    }
}

fn document_to_portable(document: &DocumentState) -> PortableDocumentState {
    PortableDocumentState {
        num_pages: document.num_pages,
        current_page: document.current_page,
        page_width: document.page_width,
        page_height: document.page_height,
        zoom: document.zoom,
        translated_pages: pages_to_portable(&document.translated_pages),
        detected_page_backgrounds: backgrounds_to_portable(&document.detected_page_backgrounds),
        deleted_pages: pages_to_portable(&document.deleted_pages),
        final_layout_deleted_pages: pages_to_portable(&document.final_layout_deleted_pages),
        url: document.url.clone(),
        file_type: document.file_type.clone(),
    }
}

fn document_from_object(doc: &serde_json::Map<String, Value>) -> DocumentState {
    DocumentState {
        num_pages: u32_field(doc, "numPages", 0),
        current_page: u32_field(doc, "currentPage", 1),
        page_width: f64_field(doc, "pageWidth", 0.0),
        page_height: f64_field(doc, "pageHeight", 0.0),
        zoom: f64_field(doc, "zoom", 1.0),
        translated_pages: pages_from_value(doc.get("translatedPages")),
        detected_page_backgrounds: backgrounds_from_portable(doc.get("detectedPageBackgrounds")),
        deleted_pages: pages_from_value(doc.get("deletedPages")),
        final_layout_deleted_pages: pages_from_value(doc.get("finalLayoutDeletedPages")),
        url: doc.get("url").and_then(Value::as_str).map(str::to_string),
        file_type: doc
            .get("fileType")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

fn section_or_default<T>(value: Option<&Value>, section: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match value {
        None | Some(Value::Null) => T::default(),
        Some(v) => serde_json::from_value(v.clone()).unwrap_or_else(|e| {
            tracing::warn!(section, error = %e, "section failed to parse; using defaults");
            T::default()
        }),
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn u32_field(obj: &serde_json::Map<String, Value>, key: &str, default: u32) -> u32 {
    obj.get(key)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(default)
}

fn f64_field(obj: &serde_json::Map<String, Value>, key: &str, default: f64) -> f64 {
    obj.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
