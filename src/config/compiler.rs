use super::traits::{ConfigManifest, ConfigSection, FieldManifest};
use crate::error::GamlError;
use serde::{Deserialize, Serialize};

/// Options of the expression builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Replace constant operator applications by their value at construction.
    pub constant_optimization: bool,
    /// Check the content type of the first argument against the operator's
    /// expected content types.
    pub check_expected_types: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            constant_optimization: true,
            check_expected_types: true,
        }
    }
}

impl ConfigSection for CompilerConfig {
    fn section_name() -> &'static str {
        "compiler"
    }

    fn validate(&self) -> Result<(), GamlError> {
        Ok(())
    }

    fn to_manifest(&self) -> ConfigManifest {
        ConfigManifest {
            section: "Compiler".to_string(),
            fields: vec![
                FieldManifest::new(
                    "constant_optimization",
                    "boolean",
                    serde_json::json!(true),
                    "Fold constant expressions when they are built",
                ),
                FieldManifest::new(
                    "check_expected_types",
                    "boolean",
                    serde_json::json!(true),
                    "Report arguments whose content type the operator does not expect",
                ),
            ],
        }
    }
}
