use std::{borrow::Cow, fmt};

use thiserror::Error;

/// Top-level error type returned by snapfeed services.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Referenced entity is absent.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// The request is well-formed but not allowed (self-follow, duplicate username, ...).
    #[error("invalid operation: {message}")]
    InvalidOperation { message: Cow<'static, str> },

    /// No current principal for an operation that needs one.
    #[error("not authenticated")]
    Unauthenticated,

    /// Backing store failed transiently. Safe to retry.
    #[error("store unavailable: {message}")]
    StoreUnavailable { message: String },

    /// A stored document could not be decoded into its record type.
    #[error("malformed {collection} record: field '{field}' {reason}")]
    MalformedRecord {
        collection: &'static str,
        field: String,
        reason: String,
    },

    /// Validation failed for one or more input fields.
    #[error("validation failed")]
    Validation(#[from] ValidationError),

    /// A step of a multi-step pipeline failed; later steps did not run.
    #[error("{step} failed: {source}")]
    Pipeline {
        step: PipelineStep,
        #[source]
        source: Box<FeedError>,
    },
}

impl FeedError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    pub fn invalid(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidOperation { message: message.into() }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable { message: message.into() }
    }

    pub fn malformed(collection: &'static str, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            collection,
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Wraps this error with the pipeline step that produced it.
    pub fn at_step(self, step: PipelineStep) -> Self {
        Self::Pipeline {
            step,
            source: Box::new(self),
        }
    }

    /// Innermost error, looking through pipeline attribution.
    pub fn root(&self) -> &FeedError {
        match self {
            Self::Pipeline { source, .. } => source.root(),
            other => other,
        }
    }

    /// Only transient store failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self.root(), Self::StoreUnavailable { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound { .. })
    }
}

impl From<redis::RedisError> for FeedError {
    fn from(err: redis::RedisError) -> Self {
        Self::StoreUnavailable {
            message: err.to_string(),
        }
    }
}

/// Named steps of the multi-step write pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    UploadImage,
    SignUp,
    CreateProfile,
    CreatePost,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::UploadImage => "image upload",
            Self::SignUp => "sign up",
            Self::CreateProfile => "profile creation",
            Self::CreatePost => "post creation",
        };
        f.write_str(label)
    }
}

/// Collection of validation issues encountered while checking input.
#[derive(Debug, Error)]
#[error("validation errors: {issues:?}")]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new<I>(issues: I) -> Self
    where
        I: IntoIterator<Item = ValidationIssue>,
    {
        Self {
            issues: issues.into_iter().collect(),
        }
    }

    /// Convenience helper for constructing a single-field validation error.
    pub fn single(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new([ValidationIssue::new(field, code, message)])
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Returns `Ok(())` when no issues were collected.
    pub fn into_result(self) -> Result<(), FeedError> {
        if self.is_empty() { Ok(()) } else { Err(FeedError::Validation(self)) }
    }
}

/// Detailed validation failure for a single field.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

pub type FeedResult<T> = Result<T, FeedError>;
