//! Vulkan loader layer manifest (the JSON file that makes the layer discoverable).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::identity;

pub const FILE_FORMAT_VERSION: &str = "1.2.0";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayerManifest {
    pub file_format_version: String,
    pub layer: LayerEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayerEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub layer_type: LayerType,
    pub library_path: String,
    pub api_version: String,
    pub implementation_version: String,
    pub description: String,
    /// Exported entry points the loader should use instead of the default names.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub functions: BTreeMap<String, String>,
    /// Required for implicit layers: setting any of these disables the layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_environment: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum LayerType {
    #[default]
    #[serde(rename = "GLOBAL")]
    Global,
    #[serde(rename = "INSTANCE")]
    Instance,
}

impl LayerManifest {
    /// Manifest for this layer, loaded from `library_path`.
    ///
    /// Implicit layers are loaded into every Vulkan application, so they carry
    /// the disable switch the loader requires.
    pub fn for_library(library_path: &str, implicit: bool) -> Self {
        let mut functions = BTreeMap::new();
        functions.insert(
            "vkNegotiateLoaderLayerInterfaceVersion".to_string(),
            "vkNegotiateLoaderLayerInterfaceVersion".to_string(),
        );

        let disable_environment = implicit.then(|| {
            let mut env = BTreeMap::new();
            env.insert(identity::DISABLE_ENV.to_string(), "1".to_string());
            env
        });

        Self {
            file_format_version: FILE_FORMAT_VERSION.to_string(),
            layer: LayerEntry {
                name: identity::LAYER_NAME.to_string(),
                layer_type: LayerType::Global,
                library_path: library_path.to_string(),
                api_version: identity::spec_version_string(),
                implementation_version: identity::IMPLEMENTATION_VERSION.to_string(),
                description: identity::LAYER_DESCRIPTION.to_string(),
                functions,
                disable_environment,
            },
        }
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<(), CoreError> {
        let mut json = self.to_json()?;
        json.push('\n');
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
