use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::ReferenceRecord;

/// Characters that cannot appear in an output file name. The long-form
/// separator `/` is the only one a recognized token can carry.
const PATH_UNSAFE: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Which recognition pattern produced a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenShape {
    /// `00407/0054316`: 5 digits, separator, 7 digits.
    Long,
    /// `29031933`: bare 8 digits.
    Short,
}

/// Policy identifier as it was found on a page. Opaque after extraction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyToken(String);

impl PolicyToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Token with path-unsafe characters replaced by `_`.
    pub fn file_stem(&self) -> String {
        self.0
            .chars()
            .map(|c| if PATH_UNSAFE.contains(&c) { '_' } else { c })
            .collect()
    }

    /// Artifact name, e.g. `00407/0054316` -> `00407_0054316.pdf`.
    pub fn file_name(&self) -> String {
        format!("{}.pdf", self.file_stem())
    }
}

impl fmt::Display for PolicyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingOutcome {
    WithEmail,
    WithoutEmail,
}

impl RoutingOutcome {
    /// Output folder name under the run's output root.
    pub fn folder_name(self) -> &'static str {
        match self {
            RoutingOutcome::WithEmail => "policies_with_email",
            RoutingOutcome::WithoutEmail => "policies_without_email",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RoutingOutcome::WithEmail => "with email",
            RoutingOutcome::WithoutEmail => "without email",
        }
    }
}

/// Which equivalence rule resolved a token to a spreadsheet row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    Exact,
    SeparatorInsensitive,
    LeadingZeroInsensitive,
}

/// What the assembler asks the writer to do about encryption.
#[derive(Clone, PartialEq, Eq)]
pub enum EncryptionDirective {
    /// Print-bound documents are never encrypted.
    NotApplicable,
    Encrypt { password: String },
    /// Email-bound but the record carries no secret key.
    MissingKey,
}

impl fmt::Debug for EncryptionDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionDirective::NotApplicable => f.write_str("NotApplicable"),
            EncryptionDirective::Encrypt { .. } => f.write_str("Encrypt { password: <redacted> }"),
            EncryptionDirective::MissingKey => f.write_str("MissingKey"),
        }
    }
}

/// One per-policy document to be emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyGroup {
    pub token: PolicyToken,
    /// Zero-based source page indices in discovery order.
    pub pages: Vec<usize>,
    pub record: Option<ReferenceRecord>,
    pub matched_by: Option<MatchRule>,
    pub routing: RoutingOutcome,
    pub encryption: EncryptionDirective,
}

impl PolicyGroup {
    pub fn file_name(&self) -> String {
        self.token.file_name()
    }

    pub fn is_matched(&self) -> bool {
        self.record.is_some()
    }
}

/// Encryption result recorded for an emitted artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EncryptionStatus {
    NotApplicable,
    Encrypted,
    /// Encryption switched off in configuration.
    Disabled,
    MissingKey,
    Failed { reason: String },
}

impl EncryptionStatus {
    /// Plaintext document headed for email transport.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            EncryptionStatus::Disabled | EncryptionStatus::MissingKey | EncryptionStatus::Failed { .. }
        )
    }

    pub fn label(&self) -> String {
        match self {
            EncryptionStatus::NotApplicable => "not applicable".to_string(),
            EncryptionStatus::Encrypted => "encrypted".to_string(),
            EncryptionStatus::Disabled => "warning: unencrypted (encryption disabled)".to_string(),
            EncryptionStatus::MissingKey => "warning: unencrypted".to_string(),
            EncryptionStatus::Failed { reason } => format!("warning: encryption failed ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GroupStatus {
    Written { path: String },
    Failed { reason: String },
}

/// Per-group outcome of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupReport {
    pub policy: PolicyToken,
    pub file_name: String,
    pub pages: Vec<usize>,
    pub routing: RoutingOutcome,
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_by: Option<MatchRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub encryption: EncryptionStatus,
    pub status: GroupStatus,
}

impl GroupReport {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, GroupStatus::Failed { .. })
    }
}

/// Summary handed to whatever front end started the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub source: String,
    pub dataset: String,
    pub finished_at: String,
    pub total_pages: usize,
    pub total_groups: usize,
    pub with_email: usize,
    pub without_email: usize,
    pub unmatched: usize,
    pub degraded: usize,
    pub failed: usize,
    /// Pages that carried no recognizable token (including pages whose text
    /// could not be extracted). They belong to no group.
    pub unclassified_pages: Vec<usize>,
    pub groups: Vec<GroupReport>,
}

impl RunSummary {
    pub fn from_reports(
        source: String,
        dataset: String,
        total_pages: usize,
        unclassified_pages: Vec<usize>,
        groups: Vec<GroupReport>,
    ) -> Self {
        let with_email = groups
            .iter()
            .filter(|g| g.routing == RoutingOutcome::WithEmail)
            .count();
        let without_email = groups.len() - with_email;
        let unmatched = groups.iter().filter(|g| !g.matched).count();
        let degraded = groups.iter().filter(|g| g.encryption.is_degraded()).count();
        let failed = groups.iter().filter(|g| g.is_failed()).count();
        Self {
            source,
            dataset,
            finished_at: chrono::Local::now().to_rfc3339(),
            total_pages,
            total_groups: groups.len(),
            with_email,
            without_email,
            unmatched,
            degraded,
            failed,
            unclassified_pages,
            groups,
        }
    }
}

/// One line of the dispatch manifest consumed by the email sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailManifestEntry {
    pub policy: PolicyToken,
    pub recipient: String,
    pub file_name: String,
    pub encrypted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_replaces_long_form_separator() {
        assert_eq!(PolicyToken::new("00407/0054316").file_name(), "00407_0054316.pdf");
        assert_eq!(PolicyToken::new("29031933").file_name(), "29031933.pdf");
    }

    #[test]
    fn hyphenated_token_keeps_its_separator() {
        assert_eq!(PolicyToken::new("00407-0054316").file_name(), "00407-0054316.pdf");
    }

    #[test]
    fn directive_debug_hides_password() {
        let directive = EncryptionDirective::Encrypt {
            password: "X1".to_string(),
        };
        assert!(!format!("{:?}", directive).contains("X1"));
    }

    #[test]
    fn degraded_statuses() {
        assert!(EncryptionStatus::MissingKey.is_degraded());
        assert!(EncryptionStatus::Failed {
            reason: "boom".to_string()
        }
        .is_degraded());
        assert!(EncryptionStatus::Disabled.is_degraded());
        assert!(!EncryptionStatus::Encrypted.is_degraded());
        assert!(!EncryptionStatus::NotApplicable.is_degraded());
    }
}
