use serde::{Deserialize, Serialize};

use crate::filter::FilterDocument;

use super::edits::Edit;
use super::types::{ReplayReport, ReplayWarning};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub sequence: u64,
    pub operation: String,
    pub target: String,
    pub edit: Edit,
}

/// Latest desired value per (operation, target), ordered by when each
/// target was last changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLog {
    entries: Vec<ChangeLogEntry>,
    next_sequence: u64,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ChangeLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store `edit`, replacing any entry for the same operation and target.
    /// The entry moves to the end so replay applies it last.
    pub fn record(&mut self, edit: Edit) -> u64 {
        let operation = edit.operation_name().to_string();
        let target = edit.target_key();
        self.entries
            .retain(|e| !(e.operation == operation && e.target == target));

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.push(ChangeLogEntry {
            sequence,
            operation,
            target,
            edit,
        });
        sequence
    }

    pub fn find(&self, operation: &str, target: &str) -> Option<&ChangeLogEntry> {
        self.entries
            .iter()
            .find(|e| e.operation == operation && e.target == target)
    }

    pub fn has_target(&self, target: &str) -> bool {
        self.entries.iter().any(|e| e.target == target)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Apply every entry in order. Entries that no longer resolve are
    /// skipped and reported; replay itself never fails.
    pub fn replay(&self, doc: &mut FilterDocument) -> ReplayReport {
        let mut report = ReplayReport::default();
        for entry in &self.entries {
            match entry.edit.apply(doc) {
                Ok(true) => report.applied += 1,
                Ok(false) => report.unchanged += 1,
                Err(e) => {
                    tracing::warn!(
                        sequence = entry.sequence,
                        operation = %entry.operation,
                        target = %entry.target,
                        error = %e,
                        "skipping change log entry"
                    );
                    report.warnings.push(ReplayWarning {
                        sequence: entry.sequence,
                        operation: entry.operation.clone(),
                        target: entry.target.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visibility::Visibility;

    fn visibility(tier: &str, visibility: Visibility) -> Edit {
        Edit::SetRuleVisibility {
            type_tag: "divination".to_string(),
            tier_tag: tier.to_string(),
            visibility,
        }
    }

    #[test]
    fn record_keeps_latest_per_target_and_moves_it_last() {
        let mut log = ChangeLog::new();
        log.record(visibility("t1", Visibility::Hide));
        log.record(visibility("t2", Visibility::Hide));
        log.record(visibility("t1", Visibility::Show));

        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[0].target, "rule:divination/t2");
        assert_eq!(log.entries()[1].edit, visibility("t1", Visibility::Show));
        assert_eq!(log.entries()[1].sequence, 2);
        assert!(log.find("set_rule_visibility", "rule:divination/t1").is_some());
    }

    #[test]
    fn replay_skips_unresolved_targets() {
        let mut log = ChangeLog::new();
        log.record(visibility("t9", Visibility::Hide));
        log.record(visibility("t1", Visibility::Hide));

        let mut doc = FilterDocument::parse("Show # $type->divination $tier->t1\n\tClass \"Divination\"\n")
            .expect("failed to parse");
        let report = log.replay(&mut doc);
        assert_eq!(report.applied, 1);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].target, "rule:divination/t9");
        assert!(doc.to_text_modified().starts_with("Hide # $type->divination"));
    }

    #[test]
    fn log_survives_json() {
        let mut log = ChangeLog::new();
        log.record(Edit::SetGemMinQuality { quality: 12 });
        let json = serde_json::to_string(&log).expect("failed to serialize");
        let back: ChangeLog = serde_json::from_str(&json).expect("failed to deserialize");
        assert_eq!(back, log);
    }
}
