use std::fmt;

/// Default label of the policy-number column. When absent the first column is used.
pub const DEFAULT_ID_COLUMN: &str = "Policy No";

/// Recognized email column labels, in preference order.
pub const DEFAULT_EMAIL_COLUMNS: &[&str] = &["Owner 1 Email", "Email", "Owner Email", "email"];

/// Column holding the per-record document password.
pub const DEFAULT_KEY_COLUMN: &str = "NIC";

/// Which spreadsheet columns carry the identifier, email and secret key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    pub id_column: String,
    pub email_columns: Vec<String>,
    pub key_column: String,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            id_column: DEFAULT_ID_COLUMN.to_string(),
            email_columns: DEFAULT_EMAIL_COLUMNS.iter().map(|s| s.to_string()).collect(),
            key_column: DEFAULT_KEY_COLUMN.to_string(),
        }
    }
}

/// One row of the reference spreadsheet.
#[derive(Clone, PartialEq, Eq)]
pub struct ReferenceRecord {
    /// Identifier exactly as authored (trimmed).
    pub policy_id: String,
    pub email: Option<String>,
    pub secret_key: Option<String>,
}

impl ReferenceRecord {
    /// Plausible address: contains `@`.
    pub fn deliverable_email(&self) -> Option<&str> {
        self.email.as_deref().filter(|e| e.contains('@'))
    }
}

impl fmt::Debug for ReferenceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceRecord")
            .field("policy_id", &self.policy_id)
            .field("email", &self.email)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Fully loaded reference dataset. Immutable for the duration of a run.
#[derive(Debug, Clone, Default)]
pub struct ReferenceDataset {
    records: Vec<ReferenceRecord>,
    skipped_rows: usize,
}

impl ReferenceDataset {
    pub fn new(records: Vec<ReferenceRecord>) -> Self {
        Self {
            records,
            skipped_rows: 0,
        }
    }

    /// Build records from a header row and data rows (cell text, column order).
    /// Rows without an identifier are skipped and can never match.
    pub fn from_rows(headers: &[String], rows: &[Vec<String>], layout: &ColumnLayout) -> Self {
        let position = |label: &str| headers.iter().position(|h| h.trim() == label.trim());
        let id_idx = position(&layout.id_column).unwrap_or(0);
        let email_idx: Vec<usize> = layout
            .email_columns
            .iter()
            .filter_map(|label| position(label))
            .collect();
        let key_idx = position(&layout.key_column);

        let cell = |row: &[String], idx: usize| -> Option<String> {
            row.get(idx)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let mut records = Vec::with_capacity(rows.len());
        let mut skipped_rows = 0usize;
        for row in rows {
            let Some(policy_id) = cell(row, id_idx) else {
                skipped_rows += 1;
                continue;
            };
            let email = email_idx.iter().find_map(|&i| cell(row, i));
            let secret_key = key_idx.and_then(|i| cell(row, i));
            records.push(ReferenceRecord {
                policy_id,
                email,
                secret_key,
            });
        }
        Self {
            records,
            skipped_rows,
        }
    }

    pub fn records(&self) -> &[ReferenceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }
}
