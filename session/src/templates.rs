use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;

/// One template: unrendered `text`, the `source/` path it expands into, and
/// the data namespace passed to the template engine. Stored as a single JSON
/// file per template in `templates/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub target: String,
    pub text: String,
    pub data: Value,
}

/// Deterministic, collision-resistant filename for a template keyed by its
/// target path (the original used an MD5 hex digest; this substitutes SHA-256
/// from the same dependency already used elsewhere in this lineage).
pub fn template_file_name(target: &str) -> String {
    let digest = Sha256::digest(target.as_bytes());
    format!("{digest:x}.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_deterministic_per_target() {
        assert_eq!(template_file_name("a.tex"), template_file_name("a.tex"));
        assert_ne!(template_file_name("a.tex"), template_file_name("b.tex"));
    }
}
