//! Live editing-session state.
//!
//! These are the in-memory types the editing surface mutates directly. They
//! favor ergonomic containers (integer-keyed ordered maps, sets) and carry
//! transient UI flags that are deliberately never persisted. The codec
//! converts between this shape and the portable [`crate::ProjectSnapshot`].

use crate::{ProjectId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The workflow stage a session is currently in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStep {
    #[default]
    #[serde(rename = "translate")]
    Translate,
    #[serde(rename = "layout")]
    Layout,
    #[serde(rename = "final-layout")]
    FinalLayout,
}

/// A complete live editing session.
///
/// `id` stays `None` until the first successful remote create, after which
/// it is immutable for the lifetime of the project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditorSession {
    pub id: Option<ProjectId>,
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

impl EditorSession {
    /// Whether this session has ever been created remotely.
    pub fn has_remote_id(&self) -> bool {
        self.id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// Page geometry and per-page bookkeeping for the open document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentState {
    pub num_pages: u32,
    pub current_page: u32,
    pub page_width: f64,
    pub page_height: f64,
    pub zoom: f64,
    /// Pages that have been run through translation.
    pub translated_pages: BTreeSet<u32>,
    /// Detected background color per page number.
    pub detected_page_backgrounds: BTreeMap<u32, String>,
    /// Pages removed from the working document. Set semantics.
    pub deleted_pages: BTreeSet<u32>,
    /// Pages removed from the final-layout output. Set semantics.
    pub final_layout_deleted_pages: BTreeSet<u32>,
    pub url: Option<String>,
    pub file_type: Option<String>,
}

impl Default for DocumentState {
    fn default() -> Self {
        Self {
            num_pages: 0,
            current_page: 1,
            page_width: 0.0,
            page_height: 0.0,
            zoom: 1.0,
            translated_pages: BTreeSet::new(),
            detected_page_backgrounds: BTreeMap::new(),
            deleted_pages: BTreeSet::new(),
            final_layout_deleted_pages: BTreeSet::new(),
            url: None,
            file_type: None,
        }
    }
}

/// Viewport and workflow-navigation state. Already plain; persisted as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewState {
    pub current_workflow_step: WorkflowStep,
    pub active_sidebar_tab: String,
    pub is_sidebar_collapsed: bool,
}

/// Elements placed on the editing surface, grouped by layer.
///
/// Element payloads are opaque to the engine: the editing surface owns their
/// shape and the codec only guarantees they are JSON-safe when persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementCollections {
    pub original_text_boxes: Vec<serde_json::Value>,
    pub translated_text_boxes: Vec<serde_json::Value>,
    pub original_images: Vec<serde_json::Value>,
    pub translated_images: Vec<serde_json::Value>,
    pub final_layout_text_boxes: Vec<serde_json::Value>,
}

/// Z-ordering of element ids per workflow layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayerState {
    pub original_layer_order: Vec<String>,
    pub translated_layer_order: Vec<String>,
    pub final_layout_layer_order: Vec<String>,
}

/// Editing-surface state. Most of it is transient and excluded from
/// persistence; see [`crate::PortableEditorState`] for the persisted subset.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    /// Transient: current selection, cleared on restore.
    pub selected_element_ids: Vec<String>,
    /// Transient: element being dragged, cleared on restore.
    pub dragging_element_id: Option<String>,
    /// Transient edit-mode flags, reset to off on restore.
    pub is_editing_text: bool,
    pub is_adding_text_box: bool,
    pub is_image_upload_mode: bool,
    /// Persisted preference.
    pub show_deletion_rectangles: bool,
    /// Normalized to "loaded, not loading, no error" on restore.
    pub is_document_loaded: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl Default for EditorState {
    fn default() -> Self {
        Self {
            selected_element_ids: Vec::new(),
            dragging_element_id: None,
            is_editing_text: false,
            is_adding_text_box: false,
            is_image_upload_mode: false,
            show_deletion_rectangles: false,
            is_document_loaded: true,
            is_loading: false,
            error: None,
        }
    }
}

impl EditorState {
    /// The state a freshly restored session starts from: persisted
    /// preferences kept, everything transient reset.
    pub fn restored(show_deletion_rectangles: bool) -> Self {
        Self {
            show_deletion_rectangles,
            ..Self::default()
        }
    }
}

/// Export settings for the final-layout stage. Only persisted while the
/// session is in [`WorkflowStep::FinalLayout`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FinalLayoutSettings {
    pub export_format: String,
    pub include_original_pages: bool,
    pub page_margin: f64,
}
