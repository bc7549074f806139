use crate::domain::models::{Document, DocumentStatus};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceBadge {
    Green,
    Yellow,
    Red,
}

impl ComplianceBadge {
    pub fn for_score(score: u8) -> Self {
        match score {
            81.. => ComplianceBadge::Green,
            51..=80 => ComplianceBadge::Yellow,
            _ => ComplianceBadge::Red,
        }
    }
}

/// Percentage of required document types covered by at least one ACTIVE document.
///
/// Each required type counts once no matter how many active documents it has.
/// Empty inputs score 0.
pub fn compliance_score(document_types: &[String], documents: &[Document]) -> u8 {
    if document_types.is_empty() || documents.is_empty() {
        return 0;
    }

    let active: HashSet<&str> = documents
        .iter()
        .filter(|d| d.status == DocumentStatus::Active)
        .map(|d| d.document_type.as_str())
        .collect();

    let required: HashSet<&str> = document_types.iter().map(String::as_str).collect();
    let covered = required.iter().filter(|t| active.contains(*t)).count();

    ((covered as f64 / required.len() as f64) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(doc_type: &str, status: DocumentStatus) -> Document {
        Document {
            id: format!("{doc_type}-{status:?}"),
            driver_id: Some("d1".to_string()),
            document_type: doc_type.to_string(),
            status,
            expiry_date: None,
            uploaded_at: Utc::now(),
            file_name: "file.pdf".to_string(),
        }
    }

    fn types(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_empty_inputs_score_zero() {
        assert_eq!(compliance_score(&[], &[doc("License", DocumentStatus::Active)]), 0);
        assert_eq!(compliance_score(&types(&["License"]), &[]), 0);
    }

    #[test]
    fn test_only_active_documents_count() {
        let required = types(&["License", "Insurance", "Medical Card"]);
        let docs = vec![
            doc("License", DocumentStatus::Active),
            doc("Insurance", DocumentStatus::Expired),
            doc("Medical Card", DocumentStatus::Pending),
        ];
        assert_eq!(compliance_score(&required, &docs), 33);
    }

    #[test]
    fn test_duplicate_active_documents_count_once() {
        let required = types(&["License", "Insurance"]);
        let docs = vec![
            doc("License", DocumentStatus::Active),
            doc("License", DocumentStatus::Active),
        ];
        assert_eq!(compliance_score(&required, &docs), 50);
    }

    #[test]
    fn test_unrequired_types_ignored() {
        let required = types(&["License"]);
        let docs = vec![doc("Passport", DocumentStatus::Active)];
        assert_eq!(compliance_score(&required, &docs), 0);
    }

    #[test]
    fn test_score_is_monotonic_in_coverage() {
        let required = types(&["License", "Insurance", "Medical Card"]);
        let mut docs = vec![doc("License", DocumentStatus::Expired)];
        let mut last = compliance_score(&required, &docs);
        for t in ["License", "Insurance", "Medical Card"] {
            docs.push(doc(t, DocumentStatus::Active));
            let score = compliance_score(&required, &docs);
            assert!(score >= last);
            last = score;
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn test_badges() {
        assert_eq!(ComplianceBadge::for_score(100), ComplianceBadge::Green);
        assert_eq!(ComplianceBadge::for_score(81), ComplianceBadge::Green);
        assert_eq!(ComplianceBadge::for_score(80), ComplianceBadge::Yellow);
        assert_eq!(ComplianceBadge::for_score(51), ComplianceBadge::Yellow);
        assert_eq!(ComplianceBadge::for_score(50), ComplianceBadge::Red);
        assert_eq!(ComplianceBadge::for_score(0), ComplianceBadge::Red);
    }
}
