//! Unified error handling for chatterd.
//!
//! Each directory has its own error enum. The `Display` text is exactly what
//! the originating session receives as its reply line, and `error_code()`
//! gives a stable label for log fields.
//!
//! Delivery failures (recipient sink broken) and transport failures (a
//! session's own connection dying) deliberately have no variants here: both
//! are teardown paths, never replies. A broken recipient is unregistered
//! behind the sender's back, and a dead connection has no one left to tell.

use thiserror::Error;

/// Registration and user-lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Username cannot be empty.")]
    EmptyName,

    #[error("Username '{0}' is already taken.")]
    NameTaken(String),

    #[error("Username '{0}' is not allowed.")]
    NameRejected(String),

    #[error("User '{0}' is not online.")]
    NoSuchUser(String),
}

impl RegistryError {
    /// Get a static error code string for log labeling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyName => "empty_name",
            Self::NameTaken(_) => "name_taken",
            Self::NameRejected(_) => "name_rejected",
            Self::NoSuchUser(_) => "no_such_user",
        }
    }
}

/// Group directory failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupError {
    #[error("Group name cannot be empty.")]
    EmptyName,

    #[error("Group '{0}' already exists.")]
    AlreadyExists(String),

    #[error("Group '{0}' does not exist.")]
    NotFound(String),

    #[error("You are already in group '{0}'.")]
    AlreadyMember(String),

    #[error("You are not in group '{0}'.")]
    NotAMember(String),
}

impl GroupError {
    /// Get a static error code string for log labeling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyName => "empty_name",
            Self::AlreadyExists(_) => "already_exists",
            Self::NotFound(_) => "not_found",
            Self::AlreadyMember(_) => "already_member",
            Self::NotAMember(_) => "not_a_member",
        }
    }
}

/// Topic directory failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    #[error("Topic '{0}' already exists.")]
    AlreadyExists(String),

    #[error("Topic '{0}' does not exist.")]
    NotFound(String),
}

impl TopicError {
    /// Get a static error code string for log labeling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyExists(_) => "already_exists",
            Self::NotFound(_) => "not_found",
        }
    }
}

/// Input line classification failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unknown command '/{0}'.")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

impl CommandError {
    /// Get a static error code string for log labeling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unknown(_) => "unknown_command",
            Self::Usage(_) => "bad_usage",
        }
    }
}
