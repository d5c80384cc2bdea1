//! Data transfer types exchanged with the discovery collaborator.

use serde::{Deserialize, Serialize};

/// One candidate posting as emitted by a discovery scraper.
///
/// `source` plus `external_id` define posting identity; the remaining fields
/// are the listing-level view available before detail extraction runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidatePosting {
    pub source: String,
    pub external_id: String,
    #[serde(default)]
    pub url: Option<String>,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub listing_text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_deserializes_without_optional_fields() {
        let json = r#"{"source":"dou","external_id":"123","title":"Backend Dev","company":"Acme"}"#;
        let candidate: CandidatePosting = serde_json::from_str(json).expect("valid candidate");
        assert_eq!(candidate.source, "dou");
        assert_eq!(candidate.external_id, "123");
        assert!(candidate.url.is_none());
        assert!(candidate.listing_text.is_none());
    }
}
