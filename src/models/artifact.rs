use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Files an install was observed to create, stored as lowercased names.
///
/// Library, settings and config names are relative to the tooling folders;
/// package names are relative to the game's `Data`/`DataEP1` folders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArtifactRecord {
    pub created_dlls: Vec<String>,
    pub created_settings: Vec<String>,
    pub created_configs: Vec<String>,
    pub created_data_packages: Vec<String>,
    pub created_data_ep1_packages: Vec<String>,
    /// Unix milliseconds of the install that produced this record
    pub updated_at: u64,
}

impl ArtifactRecord {
    pub fn is_empty(&self) -> bool {
        self.created_dlls.is_empty()
            && self.created_settings.is_empty()
            && self.created_configs.is_empty()
            && self.created_data_packages.is_empty()
            && self.created_data_ep1_packages.is_empty()
    }

    pub fn total(&self) -> usize {
        self.created_dlls.len()
            + self.created_settings.len()
            + self.created_configs.len()
            + self.created_data_packages.len()
            + self.created_data_ep1_packages.len()
    }
}

/// On-disk form of `modapi-artifacts.json`: `{ "<modKey>": record, ... }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactStoreDocument {
    pub mods: IndexMap<String, ArtifactRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_shape() {
        let record = ArtifactRecord {
            created_dlls: vec!["colorfulclouds.dll".to_string()],
            created_data_ep1_packages: vec!["colorfulclouds.package".to_string()],
            updated_at: 42,
            ..ArtifactRecord::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["createdDlls"][0], "colorfulclouds.dll");
        assert_eq!(json["createdDataEp1Packages"][0], "colorfulclouds.package");
        assert_eq!(json["updatedAt"], 42);
        assert_eq!(record.total(), 2);
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let doc: ArtifactStoreDocument =
            serde_json::from_str(r#"{"a":{"createdDlls":["a.dll"]}}"#).unwrap();
        let record = &doc.mods["a"];
        assert_eq!(record.created_dlls, vec!["a.dll"]);
        assert!(record.created_settings.is_empty());
        assert!(!record.is_empty());
        assert!(ArtifactRecord::default().is_empty());
    }
}
