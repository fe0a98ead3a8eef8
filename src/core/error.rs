//! Per-document failure taxonomy.

use std::path::PathBuf;

use crate::core::profile::ProfileError;
use crate::fiscal::date::DateError;
use crate::fiscal::key::KeyError;
use crate::markup::codec::MarkupError;

#[derive(Debug, thiserror::Error)]
pub enum FiscalError {
    #[error("malformed markup: {0}")]
    MalformedMarkup(#[from] MarkupError),

    #[error("invalid key: {0}")]
    InvalidKey(#[from] KeyError),

    #[error("invalid amount in <{field}>: {value:?}")]
    InvalidAmount { field: String, value: String },

    #[error(transparent)]
    Date(#[from] DateError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FiscalError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Short kind label used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedMarkup(_) => "malformed-markup",
            Self::InvalidKey(_) => "invalid-key",
            Self::InvalidAmount { .. } => "invalid-amount",
            Self::Date(_) => "invalid-date",
            Self::Profile(_) => "profile",
            Self::Io { .. } => "io",
        }
    }
}
