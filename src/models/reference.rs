//! Structured pointer from a video record to its published object.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("stored reference is malformed: {0}")]
pub struct MalformedReference(pub &'static str);

/// A `(bucket, key)` pair addressing one object in the remote store.
///
/// Both halves are non-empty; there is no way to build a half-written pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredReference {
    bucket: String,
    key: String,
}

impl StoredReference {
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Result<Self, MalformedReference> {
        let bucket = bucket.into();
        let key = key.into();
        if bucket.trim().is_empty() {
            return Err(MalformedReference("bucket is empty"));
        }
        if key.trim().is_empty() {
            return Err(MalformedReference("key is empty"));
        }
        Ok(Self { bucket, key })
    }

    /// Rebuild a reference from its two persisted columns.
    ///
    /// Both absent means "no upload yet". Exactly one present, or a blank
    /// value, is a malformed row.
    pub fn from_columns(
        bucket: Option<&str>,
        key: Option<&str>,
    ) -> Result<Option<Self>, MalformedReference> {
        match (bucket, key) {
            (None, None) => Ok(None),
            (Some(bucket), Some(key)) => Self::new(bucket, key).map(Some),
            (Some(_), None) => Err(MalformedReference("key is missing")),
            (None, Some(_)) => Err(MalformedReference("bucket is missing")),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_columns_mean_no_reference() {
        assert_eq!(StoredReference::from_columns(None, None), Ok(None));
    }

    #[test]
    fn half_written_pairs_are_rejected() {
        assert!(StoredReference::from_columns(Some("bucket"), None).is_err());
        assert!(StoredReference::from_columns(None, Some("wide/a.mp4")).is_err());
        assert!(StoredReference::from_columns(Some("  "), Some("wide/a.mp4")).is_err());
        assert!(StoredReference::from_columns(Some("bucket"), Some("")).is_err());
    }

    #[test]
    fn commas_survive_in_either_half() {
        let reference = StoredReference::from_columns(Some("media,eu"), Some("wide/a,b.mp4"))
            .unwrap()
            .unwrap();
        assert_eq!(reference.bucket(), "media,eu");
        assert_eq!(reference.key(), "wide/a,b.mp4");
    }
}
