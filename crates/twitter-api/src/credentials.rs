//! Credential records for OAuth 1.0a user-context access
//!
//! The credential file holds one JSON object per line:
//!
//! ```text
//! {"consumer_key":"..","consumer_secret":"..","access_token":"..","access_token_secret":".."}
//! ```
//!
//! An optional `label` names the credential in logs; without one the record
//! is labelled by its line number. Secrets never appear in logs or Debug
//! output. A malformed line is skipped with a warning so one bad entry does
//! not take the rest of the pool down with it.

use std::path::Path;

use common::Secret;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::CredentialError;

/// One set of OAuth 1.0a keys.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialRecord {
    #[serde(default)]
    label: Option<String>,
    pub consumer_key: Secret<String>,
    pub consumer_secret: Secret<String>,
    pub access_token: Secret<String>,
    pub access_token_secret: Secret<String>,
}

impl CredentialRecord {
    pub fn new(
        label: impl Into<String>,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        access_token: impl Into<String>,
        access_token_secret: impl Into<String>,
    ) -> Self {
        Self {
            label: Some(label.into()),
            consumer_key: Secret::new(consumer_key.into()),
            consumer_secret: Secret::new(consumer_secret.into()),
            access_token: Secret::new(access_token.into()),
            access_token_secret: Secret::new(access_token_secret.into()),
        }
    }

    /// Non-secret name used in logs.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("unlabelled")
    }

    /// Check that every secret can be used to sign a request.
    ///
    /// All four values must be non-empty and free of whitespace and control
    /// characters; anything else is a copy/paste accident that would only
    /// surface later as a 401.
    pub fn validate(&self) -> Result<(), CredentialError> {
        let fields = [
            ("consumer_key", &self.consumer_key),
            ("consumer_secret", &self.consumer_secret),
            ("access_token", &self.access_token),
            ("access_token_secret", &self.access_token_secret),
        ];
        for (name, value) in fields {
            if value.is_blank() {
                return Err(CredentialError::Invalid {
                    label: self.label().to_string(),
                    reason: format!("{name} is empty"),
                });
            }
            if value
                .expose()
                .chars()
                .any(|c| c.is_whitespace() || c.is_control())
            {
                return Err(CredentialError::Invalid {
                    label: self.label().to_string(),
                    reason: format!("{name} contains whitespace or control characters"),
                });
            }
        }
        Ok(())
    }
}

/// Parse JSON-lines credential text.
///
/// Blank lines are ignored, malformed lines are logged and skipped. Records
/// without a label get `line-N`. Validation of the secrets themselves happens
/// when a client is built from the record.
pub fn parse_records(text: &str) -> Vec<CredentialRecord> {
    let mut records = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<CredentialRecord>(line) {
            Ok(mut record) => {
                if record.label.is_none() {
                    record.label = Some(format!("line-{line_number}"));
                }
                records.push(record);
            }
            Err(e) => {
                let err = CredentialError::Parse {
                    line: line_number,
                    message: e.to_string(),
                };
                warn!(error = %err, "skipping malformed credential record");
            }
        }
    }
    records
}

/// Read and parse a JSON-lines credential file.
///
/// A missing or unreadable file is an error: without it there is nothing to
/// build a pool from.
pub async fn load_records(path: &Path) -> Result<Vec<CredentialRecord>, CredentialError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CredentialError::Io(format!("reading credential file {}: {e}", path.display())))?;
    let records = parse_records(&contents);
    info!(path = %path.display(), records = records.len(), "loaded credential records");
    Ok(records)
}
