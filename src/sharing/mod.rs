//! Share lifecycle rules: building new share records, expiry policy and the access gate.

pub mod access;
mod token;

pub use access::Access;
pub use token::generate_share_token;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::storage::models::FileRecord;

#[derive(Debug, Error)]
pub enum ShareError {
    #[error("{0}")]
    Validation(String),
    #[error("Failed to generate share token")]
    TokenGeneration,
}

/// How long a share stays downloadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiry {
    #[default]
    Never,
    Hours(u32),
}

impl Expiry {
    /// Parse the upload form's `expiresIn` value: missing, empty or `never`
    /// mean no expiry, otherwise a whole number of hours.
    pub fn parse(raw: Option<&str>) -> Result<Self, ShareError> {
        let value = match raw.map(str::trim) {
            None | Some("") => return Ok(Expiry::Never),
            Some(v) if v.eq_ignore_ascii_case("never") => return Ok(Expiry::Never),
            Some(v) => v,
        };

        value.parse::<u32>().map(Expiry::Hours).map_err(|_| {
            ShareError::Validation(format!(
                "expiresIn must be a non-negative number of hours or \"never\", got '{value}'"
            ))
        })
    }

    /// Absolute expiry instant for a share created at `now`.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, ShareError> {
        match self {
            Expiry::Never => Ok(None),
            Expiry::Hours(hours) => now
                .checked_add_signed(Duration::hours(i64::from(*hours)))
                .map(Some)
                .ok_or_else(|| ShareError::Validation("expiresIn is too far in the future".into())),
        }
    }
}

/// Everything needed to register an uploaded blob as a share.
#[derive(Debug, Clone)]
pub struct NewShare {
    pub owner_id: String,
    pub original_name: String,
    pub byte_size: u64,
    pub mime_type: String,
    pub internal_name: String,
    pub password: Option<String>,
    pub expires_in: Expiry,
}

impl NewShare {
    /// Validate and turn into a fresh record with a new id and share token.
    pub fn into_record(self, now: DateTime<Utc>) -> Result<FileRecord, ShareError> {
        for (field, value) in [
            ("owner", &self.owner_id),
            ("original name", &self.original_name),
            ("mime type", &self.mime_type),
            ("internal name", &self.internal_name),
        ] {
            if value.trim().is_empty() {
                return Err(ShareError::Validation(format!("{field} is required")));
            }
        }

        let expires_at = self.expires_in.expires_at(now)?;
        let share_token = generate_share_token().map_err(|_| ShareError::TokenGeneration)?;

        Ok(FileRecord {
            id: uuid::Uuid::new_v4().to_string(),
            internal_name: self.internal_name,
            share_token,
            owner_id: self.owner_id,
            created_at: now,
            original_name: self.original_name,
            mime_type: self.mime_type,
            byte_size: self.byte_size,
            password: self.password.filter(|p| !p.is_empty()),
            expires_at,
            is_active: true,
            download_count: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_share() -> NewShare {
        NewShare {
            owner_id: "user-1".to_string(),
            original_name: "report.pdf".to_string(),
            byte_size: 1000,
            mime_type: "application/pdf".to_string(),
            internal_name: "abc.pdf".to_string(),
            password: Some("secret".to_string()),
            expires_in: Expiry::Hours(24),
        }
    }

    #[test]
    fn test_expiry_parse() {
        assert_eq!(Expiry::parse(None).unwrap(), Expiry::Never);
        assert_eq!(Expiry::parse(Some("")).unwrap(), Expiry::Never);
        assert_eq!(Expiry::parse(Some("never")).unwrap(), Expiry::Never);
        assert_eq!(Expiry::parse(Some("Never")).unwrap(), Expiry::Never);
        assert_eq!(Expiry::parse(Some("24")).unwrap(), Expiry::Hours(24));
        assert_eq!(Expiry::parse(Some(" 0 ")).unwrap(), Expiry::Hours(0));
        assert!(Expiry::parse(Some("-1")).is_err());
        assert!(Expiry::parse(Some("1.5")).is_err());
        assert!(Expiry::parse(Some("tomorrow")).is_err());
    }

    #[test]
    fn test_expires_at() {
        let now = Utc::now();
        assert_eq!(Expiry::Never.expires_at(now).unwrap(), None);
        assert_eq!(
            Expiry::Hours(24).expires_at(now).unwrap(),
            Some(now + Duration::seconds(24 * 3600))
        );
        assert_eq!(Expiry::Hours(0).expires_at(now).unwrap(), Some(now));
    }

    #[test]
    fn test_into_record() {
        let now = Utc::now();
        let record = new_share().into_record(now).unwrap();

        assert!(!record.id.is_empty());
        assert!(!record.share_token.is_empty());
        assert_ne!(record.share_token, record.internal_name);
        assert_eq!(record.owner_id, "user-1");
        assert_eq!(record.download_count, 0);
        assert!(record.is_active);
        assert_eq!(record.created_at, now);
        assert_eq!(record.expires_at, Some(now + Duration::hours(24)));
        assert_eq!(record.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_into_record_empty_password_means_none() {
        let mut share = new_share();
        share.password = Some(String::new());
        let record = share.into_record(Utc::now()).unwrap();
        assert!(!record.has_password());
    }

    #[test]
    fn test_into_record_requires_fields() {
        let mut share = new_share();
        share.owner_id = String::new();
        assert!(matches!(
            share.into_record(Utc::now()),
            Err(ShareError::Validation(_))
        ));

        let mut share = new_share();
        share.original_name = "  ".to_string();
        assert!(matches!(
            share.into_record(Utc::now()),
            Err(ShareError::Validation(_))
        ));
    }

    #[test]
    fn test_into_record_generates_distinct_tokens() {
        let now = Utc::now();
        let a = new_share().into_record(now).unwrap();
        let b = new_share().into_record(now).unwrap();
        assert_ne!(a.share_token, b.share_token);
        assert_ne!(a.id, b.id);
    }
}
