//! Portable snapshot types.
//!
//! A [`ProjectSnapshot`] is the durable representation of one editing
//! session: a plain, cycle-free, JSON-safe tree. It contains no function
//! values and no non-plain container types, so it can be handed to any
//! storage backend as-is. The snapshot wire shape is versioned through
//! [`crate::SNAPSHOT_SCHEMA_VERSION`].

use crate::session::{
    ElementCollections, FinalLayoutSettings, LayerState, ViewState,
};
use crate::{ProjectId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The portable, durable representation of one editing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    /// Absent until the first successful remote creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ProjectId>,
    pub name: String,
    /// Milliseconds since epoch. On update this is taken from the durable
    /// copy, never invented locally.
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Semantic version of the snapshot shape.
    #[serde(rename = "version")]
    pub schema_version: String,
    pub document_state: PortableDocumentState,
    pub view_state: ViewState,
    pub element_collections: ElementCollections,
    pub layer_state: LayerState,
    pub editor_state: PortableEditorState,
    pub source_language: String,
    pub desired_language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_layout_settings: Option<FinalLayoutSettings>,
}

impl ProjectSnapshot {
    /// Serialize to a JSON value. Snapshots are plain data, so this cannot
    /// fail for any value the codec produces.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Portable form of [`crate::DocumentState`].
///
/// The live integer-keyed background map becomes an object with stringified
/// integer keys, and the live page sets become arrays. Array order is not
/// meaningful and duplicates must not be relied upon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortableDocumentState {
    pub num_pages: u32,
    pub current_page: u32,
    pub page_width: f64,
    pub page_height: f64,
    pub zoom: f64,
    pub translated_pages: Vec<u32>,
    pub detected_page_backgrounds: BTreeMap<String, String>,
    pub deleted_pages: Vec<u32>,
    pub final_layout_deleted_pages: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
}

impl Default for PortableDocumentState {
    fn default() -> Self {
        Self {
            num_pages: 0,
            current_page: 1,
            page_width: 0.0,
            page_height: 0.0,
            zoom: 1.0,
            translated_pages: Vec::new(),
            detected_page_backgrounds: BTreeMap::new(),
            deleted_pages: Vec::new(),
            final_layout_deleted_pages: Vec::new(),
            url: None,
            file_type: None,
        }
    }
}

/// The persisted subset of [`crate::EditorState`].
///
/// Selection, drag and edit-mode flags are transient by design and never
/// appear here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortableEditorState {
    pub show_deletion_rectangles: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SNAPSHOT_SCHEMA_VERSION;

    fn sample_snapshot() -> ProjectSnapshot {
        ProjectSnapshot {
            id: Some("p1".into()),
            name: "Doc A".into(),
            created_at: 1_000,
            updated_at: 2_000,
            schema_version: SNAPSHOT_SCHEMA_VERSION.into(),
            document_state: PortableDocumentState {
                num_pages: 4,
                deleted_pages: vec![2],
                detected_page_backgrounds: BTreeMap::from([(
                    "1".to_string(),
                    "rgb(255,255,255)".to_string(),
                )]),
                ..Default::default()
            },
            view_state: ViewState::default(),
            element_collections: ElementCollections::default(),
            layer_state: LayerState::default(),
            editor_state: PortableEditorState::default(),
            source_language: "ja".into(),
            desired_language: "en".into(),
            final_layout_settings: None,
        }
    }

    #[test]
    fn wire_shape() {
        let value = sample_snapshot().to_value();

        assert_eq!(value["id"], "p1");
        assert_eq!(value["version"], SNAPSHOT_SCHEMA_VERSION);
        assert_eq!(
            value["documentState"]["detectedPageBackgrounds"]["1"],
            "rgb(255,255,255)"
        );
        assert_eq!(value["documentState"]["deletedPages"][0], 2);
        // Optional fields are omitted, not null
        assert!(value.get("finalLayoutSettings").is_none());
    }

    #[test]
    fn json_roundtrip() {
        let snapshot = sample_snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: ProjectSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, parsed);
    }

    #[test]
    fn id_omitted_until_created() {
        let mut snapshot = sample_snapshot();
        snapshot.id = None;
        let value = snapshot.to_value();
        assert!(value.get("id").is_none());
    }
}
