//! Knowledge base type definitions.

use serde::{Deserialize, Serialize};

/// Metadata attached to a stored setting.
///
/// Each document has exactly one metadata record at the same position;
/// the position in the ordered store is the setting's identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingMetadata {
    /// Setting category tag, e.g. "character" or "plot-outline".
    #[serde(rename = "type")]
    pub kind: String,
}

impl SettingMetadata {
    /// Create metadata with an arbitrary category tag.
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }

    /// A character fact.
    pub fn character() -> Self {
        Self::new("character")
    }

    /// A rule of the story world.
    pub fn world_rule() -> Self {
        Self::new("world-rule")
    }

    /// A plot outline or constraint.
    pub fn plot_outline() -> Self {
        Self::new("plot-outline")
    }

    /// A chunk imported from an external article.
    pub fn imported_chunk() -> Self {
        Self::new("imported-article-chunk")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_uses_type_field() {
        let metadata = SettingMetadata::character();
        let json = serde_json::to_string(&metadata).unwrap();
        assert_eq!(json, r#"{"type":"character"}"#);

        let parsed: SettingMetadata = serde_json::from_str(r#"{"type":"world-rule"}"#).unwrap();
        assert_eq!(parsed, SettingMetadata::world_rule());
    }
}
