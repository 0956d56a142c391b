//! Content hashing used to detect whether a row needs re-embedding.

use sha2::{Digest, Sha256};
use std::fmt::Write;

use crate::analysis::{AnalysisElements, MoveType};

/// Lowercase hex SHA-256 of `content`.
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}

/// Text embedded for a concept owner.
pub fn concept_content(name: &str, description: Option<&str>) -> String {
    let mut content = format!("Concept: {name}");
    if let Some(desc) = description.filter(|d| !d.is_empty()) {
        content.push_str("\nDescription: ");
        content.push_str(desc);
    }
    content
}

/// Text embedded for an analysis owner.
pub fn analysis_content(move_type: MoveType, reasoning: &str, elements: Option<&AnalysisElements>) -> String {
    let mut content = format!("DSRP Analysis ({move_type}):\n{reasoning}");
    if let Some(elements) = elements {
        content.push_str("\nElements: ");
        content.push_str(&elements.render());
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_sha256_hex() {
        assert_eq!(
            content_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(content_hash("same"), content_hash("same"));
        assert_ne!(content_hash("same"), content_hash("same "));
    }

    #[test]
    fn concept_content_includes_description_only_when_present() {
        assert_eq!(concept_content("Systems", None), "Concept: Systems");
        assert_eq!(concept_content("Systems", Some("")), "Concept: Systems");
        assert_eq!(
            concept_content("Systems", Some("Parts and wholes")),
            "Concept: Systems\nDescription: Parts and wholes"
        );
    }

    #[test]
    fn analysis_content_appends_elements_when_present() {
        assert_eq!(
            analysis_content(MoveType::ZoomOut, "Part of thermodynamics.", None),
            "DSRP Analysis (zoom-out):\nPart of thermodynamics."
        );
        let elements = AnalysisElements::Perspectives { point: "engineer".into(), view: "loss".into() };
        assert_eq!(
            analysis_content(MoveType::PCircle, "Seen as waste.", Some(&elements)),
            "DSRP Analysis (p-circle):\nSeen as waste.\nElements: point: engineer; view: loss"
        );
    }
}
