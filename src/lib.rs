//! **nfkit** - Batch rewriting of Brazilian electronic fiscal documents
//!
//! Classifies a directory of NFe / CTe / cancellation / inutilização XML,
//! derives fresh check-digit keys consistent across cross-references, applies
//! a configuration profile and renames files by their business role.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Order-preserving XML tree and the fixed-rewrite codec
pub mod markup {
    /// Element tree with local-name path lookups
    pub mod node;
    pub use node::{Document, Element, Node};

    /// quick-xml parser, serializer and namespace cleanup
    pub mod codec;
    pub use codec::{MarkupError, XmlCodec};
}

/// Fiscal primitives: access keys, movement codes, target dates
pub mod fiscal {
    /// Modulo-11 check digit and fixed-width identifier layouts
    pub mod key;
    pub use key::{AccessKey, KeyError, compute_check_digit, verify};

    /// CFOP families (sale, devolution, return, shipment)
    pub mod cfop;
    pub use cfop::MovementTables;

    /// Target emission date and fiscal timestamps
    pub mod date;
    pub use date::{DateError, DateStamp};
}

/// Document pipeline: classify, rename, map, edit, save
pub mod core {
    /// Per-document error taxonomy
    pub mod error;
    pub use error::FiscalError;

    /// Configuration profiles and the file-backed store
    pub mod profile;
    pub use profile::{ConfigurationProfile, ProfileError, ProfileStore, TomlProfileStore};

    /// Document type recognition and field extraction
    pub mod classify;
    pub use classify::{ClassifiedDocument, DocumentKind, classify};

    /// Business-role file names
    pub mod rename;
    pub use rename::{rename_batch, suggest_name};

    /// Old → new key mapping and cross-document references
    pub mod mapping;
    pub use mapping::{KeyMapping, MappingOutcome, ReferenceMap};

    /// Per-type field editors
    pub mod edit;
    pub use edit::{ChangeLog, EditContext, edit_document};

    /// Typestate batch orchestrator with rayon fan-out
    pub mod batch;
    pub use batch::{Batch, BatchReport, Pipeline, run as process_run};

    /// Read-only classification report
    pub mod inspect;
    pub use inspect::run as inspect_run;
}

/// Small command handlers that sit outside the pipeline
pub mod cli_ext {
    /// Check-digit calculator
    pub mod key_cmd;
    pub use key_cmd::run as key_run;
}

/// Infrastructure - Configuration, I/O, discovery and logging
pub mod infra {
    /// Configuration management with TOML support
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Atomic writes and output staging
    pub mod io;

    /// Flat XML batch discovery
    pub mod walk;
    pub use walk::FileWalker;

    /// tracing-subscriber setup
    pub mod logging;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use core::{inspect_run, process_run};
pub use infra::{Config, FileWalker, load_config};
