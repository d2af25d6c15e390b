use thiserror::Error;

/// Result type alias using SylvaError
pub type Result<T> = std::result::Result<T, SylvaError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// This taxonomy provides a stable, structured classification of all errors
/// raised by the engine. Each kind maps to a stable error code that can be
/// used for programmatic error handling, testing, and exception sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Structural
    InvalidOperation,
    CycleDetected,
    ForeignModel,

    // Capability
    Unsupported,

    // Path
    PathSyntax,
    NotInvertible,

    // Transaction protocol
    ProtocolViolation,

    // Notification
    ListenerFailed,
    ListenerPanicked,

    // Collaborators
    SyncFailed,
    DispatchFailed,
    Serialization,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidOperation => "ERR_INVALID_OPERATION",
            ExErrorKind::CycleDetected => "ERR_CYCLE_DETECTED",
            ExErrorKind::ForeignModel => "ERR_FOREIGN_MODEL",
            ExErrorKind::Unsupported => "ERR_UNSUPPORTED",
            ExErrorKind::PathSyntax => "ERR_PATH_SYNTAX",
            ExErrorKind::NotInvertible => "ERR_NOT_INVERTIBLE",
            ExErrorKind::ProtocolViolation => "ERR_PROTOCOL_VIOLATION",
            ExErrorKind::ListenerFailed => "ERR_LISTENER_FAILED",
            ExErrorKind::ListenerPanicked => "ERR_LISTENER_PANICKED",
            ExErrorKind::SyncFailed => "ERR_SYNC_FAILED",
            ExErrorKind::DispatchFailed => "ERR_DISPATCH_FAILED",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// This error type provides a structured representation of errors with
/// classification fields for programmatic handling and rich context for debugging.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    node_type: Option<String>,
    update_id: Option<u64>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            node_type: None,
            update_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add node type context
    pub fn with_node_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    /// Add the id of the update that was open when the error surfaced
    pub fn with_update_id(mut self, update_id: u64) -> Self {
        self.update_id = Some(update_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation name, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the node type, if any
    pub fn node_type(&self) -> Option<&str> {
        self.node_type.as_deref()
    }

    /// Get the update id, if any
    pub fn update_id(&self) -> Option<u64> {
        self.update_id
    }

    /// Get the message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(node_type) = &self.node_type {
            write!(f, " (node_type: {})", node_type)?;
        }
        if let Some(update_id) = self.update_id {
            write!(f, " (update_id: {})", update_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

// ========== End Error Facility ==========

/// Malformed location-path text
///
/// Kept separate from evaluation-time errors so callers compiling
/// user-supplied paths can handle syntax problems on their own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Path syntax error at {position} in '{path}': {message}")]
pub struct PathSyntaxError {
    pub path: String,
    pub position: usize,
    pub message: String,
}

/// Error taxonomy for node, update and path operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SylvaError {
    // ===== Structural Errors =====
    /// Operation is structurally meaningless (e.g. adding a node to itself)
    #[error("Invalid operation: {reason}")]
    InvalidOperation { reason: String },

    /// Adding the child would make a node its own ancestor
    #[error("Cycle detected: {node_type} is an ancestor of the target parent")]
    CycleDetected { node_type: String },

    /// Nodes from two different models cannot be linked
    #[error("Node of type {node_type} belongs to a different model")]
    ForeignModel { node_type: String },

    // ===== Capability Errors =====
    /// Operation is only meaningful for other node kinds
    #[error("Unsupported operation '{op}' on node of type {node_type}")]
    Unsupported { op: String, node_type: String },

    // ===== Path Errors =====
    /// Location path text could not be compiled
    #[error(transparent)]
    PathSyntax(#[from] PathSyntaxError),

    /// The path contains a step whose axis has no inverse
    #[error("Path cannot be inverted: {path}")]
    NotInvertible { path: String },

    // ===== Transaction Errors =====
    /// The update protocol was used out of order
    #[error("Update protocol violation: {reason}")]
    ProtocolViolation { reason: String },

    // ===== Notification Errors =====
    /// A listener reported a failure
    #[error("Listener failed: {message}")]
    ListenerFailed { message: String },

    /// A listener panicked while being notified
    #[error("Listener panicked: {message}")]
    ListenerPanicked { message: String },

    // ===== Collaborator Errors =====
    /// An external node failed to synchronize
    #[error("Sync failed for node of type {node_type}: {message}")]
    SyncFailed { node_type: String, message: String },

    /// A task could not be handed to the dispatcher
    #[error("Dispatch failed: {message}")]
    DispatchFailed { message: String },

    /// Options or attribute payloads could not be (de)serialized
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    // ===== Generic Errors =====
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SylvaError {
    /// Shorthand for a listener failure carrying a message
    pub fn listener(message: impl Into<String>) -> Self {
        SylvaError::ListenerFailed {
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(op: &str, node_type: &str) -> Self {
        SylvaError::Unsupported {
            op: op.to_string(),
            node_type: node_type.to_string(),
        }
    }
}

impl From<serde_json::Error> for SylvaError {
    fn from(err: serde_json::Error) -> Self {
        SylvaError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<SylvaError> for ExError {
    fn from(err: SylvaError) -> Self {
        match err {
            SylvaError::InvalidOperation { reason } => {
                ExError::new(ExErrorKind::InvalidOperation).with_message(reason)
            }

            SylvaError::CycleDetected { node_type } => ExError::new(ExErrorKind::CycleDetected)
                .with_node_type(node_type)
                .with_op("add_child")
                .with_message("Adding the child would create a cycle"),

            SylvaError::ForeignModel { node_type } => ExError::new(ExErrorKind::ForeignModel)
                .with_node_type(node_type)
                .with_message("Node belongs to a different model"),

            SylvaError::Unsupported { op, node_type } => ExError::new(ExErrorKind::Unsupported)
                .with_op(op)
                .with_node_type(node_type)
                .with_message("Operation not supported by this node kind"),

            SylvaError::PathSyntax(e) => ExError::new(ExErrorKind::PathSyntax)
                .with_op("compile_path")
                .with_message(e.to_string()),

            SylvaError::NotInvertible { path } => ExError::new(ExErrorKind::NotInvertible)
                .with_op("invert_path")
                .with_message(format!("Path cannot be inverted: {}", path)),

            SylvaError::ProtocolViolation { reason } => {
                ExError::new(ExErrorKind::ProtocolViolation).with_message(reason)
            }

            SylvaError::ListenerFailed { message } => {
                ExError::new(ExErrorKind::ListenerFailed).with_message(message)
            }

            SylvaError::ListenerPanicked { message } => {
                ExError::new(ExErrorKind::ListenerPanicked).with_message(message)
            }

            SylvaError::SyncFailed { node_type, message } => {
                ExError::new(ExErrorKind::SyncFailed)
                    .with_op("sync")
                    .with_node_type(node_type)
                    .with_message(message)
            }

            SylvaError::DispatchFailed { message } => ExError::new(ExErrorKind::DispatchFailed)
                .with_op("dispatch")
                .with_message(message),

            SylvaError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            SylvaError::Internal { message } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}
