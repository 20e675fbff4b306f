//! Text encodings for documents
//!
//! JSON is the interchange form; RON is the project-file form. Both go
//! through a version probe first so a newer file reports its version instead
//! of a confusing field error.

use std::path::Path;

use serde::Deserialize;

use super::{Document, SchemaError, check_version};
use crate::error::{HistoryError, HistoryResult};

/// Text format of a document file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Ron,
}

impl DocumentFormat {
    /// `.json` files are JSON, everything else is RON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Ron,
        }
    }
}

#[derive(Deserialize)]
struct VersionProbe {
    schema_version: u32,
}

impl Document {
    pub fn to_json(&self) -> HistoryResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| HistoryError::Serialize(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        let probe: VersionProbe =
            serde_json::from_str(text).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        check_version(probe.schema_version)?;
        serde_json::from_str(text).map_err(|e| SchemaError::Malformed(e.to_string()))
    }

    pub fn to_ron(&self) -> HistoryResult<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| HistoryError::Serialize(e.to_string()))
    }

    pub fn from_ron(text: &str) -> Result<Self, SchemaError> {
        let probe: VersionProbe =
            ron::from_str(text).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        check_version(probe.schema_version)?;
        ron::from_str(text).map_err(|e| SchemaError::Malformed(e.to_string()))
    }

    pub fn encode(&self, format: DocumentFormat) -> HistoryResult<String> {
        match format {
            DocumentFormat::Json => self.to_json(),
            DocumentFormat::Ron => self.to_ron(),
        }
    }

    pub fn decode(text: &str, format: DocumentFormat) -> Result<Self, SchemaError> {
        match format {
            DocumentFormat::Json => Self::from_json(text),
            DocumentFormat::Ron => Self::from_ron(text),
        }
    }
}

/// Write a document, picking the format from the file extension
pub fn save(document: &Document, path: impl AsRef<Path>) -> HistoryResult<()> {
    let path = path.as_ref();
    let content = document.encode(DocumentFormat::from_path(path))?;
    std::fs::write(path, content).map_err(|e| HistoryError::Io(e.to_string()))?;
    Ok(())
}

/// Read a document, picking the format from the file extension
pub fn load(path: impl AsRef<Path>) -> HistoryResult<Document> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| HistoryError::Io(e.to_string()))?;
    Ok(Document::decode(&content, DocumentFormat::from_path(path))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::Branch;
    use crate::document::{export, import};
    use crate::feature::{ExtrudeDirection, Feature, FeatureId, SketchParams};

    fn sample() -> Document {
        let mut branch = Branch::new("main", "alice");
        let store = branch.store_mut();
        store
            .insert(
                Feature::sketch("Base", SketchParams::rectangle(2.0, 3.0)).with_id("S1"),
                vec![],
            )
            .unwrap();
        store
            .insert(
                Feature::extrude("Boss", 1.5, ExtrudeDirection::Negative).with_id("E1"),
                vec![FeatureId::from("S1")],
            )
            .unwrap();
        export(&branch).unwrap()
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("part.JSON")),
            DocumentFormat::Json
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("part.rkh")),
            DocumentFormat::Ron
        );
        assert_eq!(DocumentFormat::from_path(Path::new("part")), DocumentFormat::Ron);
    }

    #[test]
    fn test_json_and_ron_agree() {
        let doc = sample();
        let from_json = Document::from_json(&doc.to_json().unwrap()).unwrap();
        let from_ron = Document::from_ron(&doc.to_ron().unwrap()).unwrap();

        let a = import(from_json).unwrap();
        let b = import(from_ron).unwrap();
        for (x, y) in a.store().iter().zip(b.store().iter()) {
            assert_eq!(x.feature, y.feature);
        }
        assert_eq!(a.store().len(), 2);
    }

    #[test]
    fn test_json_uses_type_tag() {
        let text = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["nodes"][1]["type"], "extrude");
        assert_eq!(value["nodes"][1]["parent_ids"][0], "S1");
        assert_eq!(value["schema_version"], 1);
    }

    #[test]
    fn test_version_checked_before_shape() {
        let text = r#"{ "schema_version": 99, "whatever": true }"#;
        assert_eq!(
            Document::from_json(text).unwrap_err(),
            SchemaError::UnsupportedVersion {
                found: 99,
                expected: 1
            }
        );
        assert!(matches!(
            Document::from_json("{ not json"),
            Err(SchemaError::Malformed(_))
        ));
        assert!(matches!(
            Document::from_ron("(schema_version: 1)"),
            Err(SchemaError::Malformed(_))
        ));
    }
}
