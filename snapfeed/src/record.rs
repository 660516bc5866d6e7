//! Explicit schema between domain records and flat store documents.
//!
//! Every record crosses the store boundary through [`Record`]; a missing or
//! mistyped required field becomes [`FeedError::MalformedRecord`] here rather
//! than a silently defaulted value at a call site.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::errors::FeedError;

/// A stored document: field name to string value (a Redis hash).
pub type Document = BTreeMap<String, String>;

/// Conversion between a typed record and its stored document.
pub trait Record: Sized {
    /// Collection name used in keys and error messages.
    const COLLECTION: &'static str;

    fn to_document(&self) -> Document;

    fn from_document(document: &Document) -> Result<Self, FeedError>;
}

/// Typed, validating accessor over a [`Document`].
pub struct FieldReader<'a> {
    collection: &'static str,
    document: &'a Document,
}

impl<'a> FieldReader<'a> {
    pub fn new(collection: &'static str, document: &'a Document) -> Self {
        Self { collection, document }
    }

    fn missing(&self, field: &str) -> FeedError {
        FeedError::malformed(self.collection, field, "is missing")
    }

    pub fn string(&self, field: &str) -> Result<String, FeedError> {
        self.document.get(field).cloned().ok_or_else(|| self.missing(field))
    }

    /// Like [`string`](Self::string) but rejects empty values.
    pub fn non_empty(&self, field: &str) -> Result<String, FeedError> {
        let value = self.string(field)?;
        if value.is_empty() {
            return Err(FeedError::malformed(self.collection, field, "is empty"));
        }
        Ok(value)
    }

    /// Absent and empty both decode to `None`.
    pub fn optional_string(&self, field: &str) -> Option<String> {
        self.document.get(field).filter(|value| !value.is_empty()).cloned()
    }

    pub fn i64(&self, field: &str) -> Result<i64, FeedError> {
        let raw = self.document.get(field).ok_or_else(|| self.missing(field))?;
        raw.parse::<i64>()
            .map_err(|err| FeedError::malformed(self.collection, field, format!("is not an integer: {err}")))
    }

    pub fn timestamp(&self, field: &str) -> Result<DateTime<Utc>, FeedError> {
        let raw = self.document.get(field).ok_or_else(|| self.missing(field))?;
        DateTime::parse_from_rfc3339(raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(|err| FeedError::malformed(self.collection, field, format!("is not an RFC 3339 timestamp: {err}")))
    }
}

/// Builder for documents, mirroring [`FieldReader`].
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    fields: Document,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn string(mut self, field: &str, value: impl Into<String>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn optional_string(mut self, field: &str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.fields.insert(field.to_string(), value.to_string());
        }
        self
    }

    pub fn i64(mut self, field: &str, value: i64) -> Self {
        self.fields.insert(field.to_string(), value.to_string());
        self
    }

    pub fn timestamp(mut self, field: &str, value: &DateTime<Utc>) -> Self {
        self.fields.insert(field.to_string(), encode_timestamp(value));
        self
    }

    pub fn build(self) -> Document {
        self.fields
    }
}

pub fn encode_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Index score for a timestamp: milliseconds since the epoch.
pub fn score_for(value: &DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

/// Decodes a batch of optional documents, dropping absent ones.
pub fn decode_present<T: Record>(documents: Vec<Option<Document>>) -> Result<Vec<T>, FeedError> {
    documents
        .into_iter()
        .flatten()
        .map(|document| T::from_document(&document))
        .collect()
}
