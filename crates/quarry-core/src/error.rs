//! Error types for quarry operations.
//!
//! This module provides a structured error hierarchy with machine-readable
//! error codes for programmatic handling at the CLI boundary.

use thiserror::Error;

/// Result type alias for quarry operations.
pub type QuarryResult<T> = Result<T, QuarryError>;

/// Main error type for all quarry operations.
#[derive(Error, Debug)]
pub enum QuarryError {
    /// Chunking precondition violated.
    #[error("Chunking error: {message}")]
    Chunking {
        message: String,
        code: ErrorCode,
    },

    /// LLM operation failed.
    #[error("LLM error: {message}")]
    Llm {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Graph store operation failed.
    #[error("Graph store error: {message}")]
    GraphStore {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Structured output from the model could not be parsed.
    #[error("Parse error: {message}")]
    Parse {
        message: String,
        code: ErrorCode,
    },

    /// Resolution plan is unusable (unparseable, empty, or inconsistent).
    #[error("Plan error: {message}")]
    Plan {
        message: String,
        code: ErrorCode,
    },

    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Provider not supported.
    #[error("Provider not supported: {provider}")]
    UnsupportedProvider { provider: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Chunking (CHUNK_xxx)
    ChunkSizeZero,
    ChunkOverlapTooLarge,

    // LLM (LLM_xxx)
    LlmConnectionFailed,
    LlmGenerationFailed,
    LlmInvalidResponse,
    LlmNoUsableModel,

    // Graph (GRP_xxx)
    GrpConnectionFailed,
    GrpOperationFailed,

    // Parse (PARSE_xxx)
    ParseInvalidJson,
    ParseMissingField,

    // Plan (PLAN_xxx)
    PlanUnparseable,
    PlanEmpty,
    PlanDanglingGroup,

    // Validation (VAL_xxx)
    ValInvalidInput,
    ValMissingField,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ChunkSizeZero => "CHUNK_001",
            ErrorCode::ChunkOverlapTooLarge => "CHUNK_002",
            ErrorCode::LlmConnectionFailed => "LLM_001",
            ErrorCode::LlmGenerationFailed => "LLM_002",
            ErrorCode::LlmInvalidResponse => "LLM_003",
            ErrorCode::LlmNoUsableModel => "LLM_004",
            ErrorCode::GrpConnectionFailed => "GRP_001",
            ErrorCode::GrpOperationFailed => "GRP_002",
            ErrorCode::ParseInvalidJson => "PARSE_001",
            ErrorCode::ParseMissingField => "PARSE_002",
            ErrorCode::PlanUnparseable => "PLAN_001",
            ErrorCode::PlanEmpty => "PLAN_002",
            ErrorCode::PlanDanglingGroup => "PLAN_003",
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValMissingField => "VAL_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl QuarryError {
    /// Create a chunking precondition error.
    pub fn chunking(message: impl Into<String>, code: ErrorCode) -> Self {
        Self::Chunking {
            message: message.into(),
            code,
        }
    }

    /// Create an LLM error.
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            code: ErrorCode::LlmGenerationFailed,
            source: None,
        }
    }

    /// Create an LLM connection error (fatal at setup time).
    pub fn llm_connection(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            code: ErrorCode::LlmConnectionFailed,
            source: None,
        }
    }

    /// Create a graph store error.
    pub fn graph_store(message: impl Into<String>) -> Self {
        Self::GraphStore {
            message: message.into(),
            code: ErrorCode::GrpOperationFailed,
            source: None,
        }
    }

    /// Create a graph store connection error (fatal at setup time).
    pub fn graph_connection(message: impl Into<String>) -> Self {
        Self::GraphStore {
            message: message.into(),
            code: ErrorCode::GrpConnectionFailed,
            source: None,
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidJson,
        }
    }

    /// Create a plan error.
    pub fn plan(message: impl Into<String>, code: ErrorCode) -> Self {
        Self::Plan {
            message: message.into(),
            code,
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
        }
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Chunking { code, .. } => *code,
            Self::Llm { code, .. } => *code,
            Self::GraphStore { code, .. } => *code,
            Self::Parse { code, .. } => *code,
            Self::Plan { code, .. } => *code,
            Self::Validation { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether this error is fatal at setup time (connectivity, config).
    ///
    /// Fatal setup errors abort the run; everything else is recovered close
    /// to its origin (chunk-level, group-level).
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::LlmConnectionFailed
                | ErrorCode::LlmNoUsableModel
                | ErrorCode::GrpConnectionFailed
        ) || matches!(self, Self::Configuration(_) | Self::UnsupportedProvider { .. })
    }
}
