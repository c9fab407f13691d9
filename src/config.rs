use serde::Deserialize;

/// File name of the model artifact the engine writes into the images folder.
pub const ARTIFACT_FILE_NAME: &str = "out.usdz";

/// Sub-folder of the images folder that receives the exported model.
pub const EXPORT_DIR_NAME: &str = "model";

/// File name of the exported model inside [`EXPORT_DIR_NAME`].
pub const EXPORT_FILE_NAME: &str = "out.obj";

/// Exit code used when the C boundary has to give up on a broken session.
pub const FATAL_EXIT_CODE: i32 = 1;

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// ETA value published when the engine cannot estimate the remaining time.
pub const ETA_UNKNOWN: f64 = -1.0;

/// Order in which the engine should consider the input samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleOrdering {
    Unordered,
    Sequential,
}

/// How hard the engine should look for features in low-contrast samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSensitivity {
    Normal,
    High,
}

/// Level of detail requested for the produced model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detail {
    Preview,
    Reduced,
    Medium,
    Full,
    Raw,
}

/// Configuration for a single reconstruction session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sample ordering handed to the engine.
    pub sample_ordering: SampleOrdering,
    /// Feature sensitivity handed to the engine.
    pub feature_sensitivity: FeatureSensitivity,
    /// Detail level of the model request.
    pub detail: Detail,
    /// Artifact written by the engine, relative to the images folder.
    pub artifact_name: String,
    /// Export folder, relative to the images folder.
    pub export_dir: String,
    /// Exported file name inside `export_dir`.
    pub export_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_ordering: SampleOrdering::Sequential,
            feature_sensitivity: FeatureSensitivity::Normal,
            detail: Detail::Medium,
            artifact_name: ARTIFACT_FILE_NAME.to_string(),
            export_dir: EXPORT_DIR_NAME.to_string(),
            export_name: EXPORT_FILE_NAME.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let config = SessionConfig::default();
        assert_eq!(config.sample_ordering, SampleOrdering::Sequential);
        assert_eq!(config.feature_sensitivity, FeatureSensitivity::Normal);
        assert_eq!(config.detail, Detail::Medium);
        assert_eq!(config.artifact_name, "out.usdz");
    }

    #[test]
    fn test_partial_override() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"detail": "full", "export_name": "mesh.obj"}"#).unwrap();
        assert_eq!(config.detail, Detail::Full);
        assert_eq!(config.export_name, "mesh.obj");
        assert_eq!(config.export_dir, "model");
        assert_eq!(config.sample_ordering, SampleOrdering::Sequential);
    }
}
