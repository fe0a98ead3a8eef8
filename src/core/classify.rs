//! Recognize the document type and pull out the fields the rest of the
//! pipeline keys on.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::markup::node::{Document, Element};

/// Event type code for a cancellation.
pub const CANCELLATION_EVENT: &str = "110111";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    Invoice,
    Cancellation,
    TransportManifest,
    NumberDenial,
}

impl DocumentKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Invoice => "NFe",
            Self::Cancellation => "cancellation",
            Self::TransportManifest => "CTe",
            Self::NumberDenial => "inutilização",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A recognized document. Only `path` (after renaming) and `tree` (while
/// editing) change after classification.
#[derive(Debug, Clone)]
pub struct ClassifiedDocument {
    pub kind: DocumentKind,
    pub path: PathBuf,
    pub tree: Document,
    pub invoice_number: Option<String>,
    pub movement_code: Option<String>,
    pub operation_nature: Option<String>,
    pub referenced_key: Option<String>,
    pub annotation: Option<String>,
    pub access_key: Option<String>,
    pub issuer_tax_id: Option<String>,
    pub canceled_key: Option<String>,
}

impl ClassifiedDocument {
    fn bare(kind: DocumentKind, path: &Path, tree: Document) -> Self {
        Self {
            kind,
            path: path.to_path_buf(),
            tree,
            invoice_number: None,
            movement_code: None,
            operation_nature: None,
            referenced_key: None,
            annotation: None,
            access_key: None,
            issuer_tax_id: None,
            canceled_key: None,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

fn text(el: &Element, path: &str) -> Option<String> {
    el.text_at(path)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Classify a parsed tree. Unknown document types yield `None`.
pub fn classify(tree: Document, path: &Path) -> Option<ClassifiedDocument> {
    if let Some(event) = tree.find("infEvento")
        && text(event, "tpEvento").as_deref() == Some(CANCELLATION_EVENT)
    {
        let canceled_key = text(event, "chNFe");
        let mut doc = ClassifiedDocument::bare(DocumentKind::Cancellation, path, tree);
        doc.canceled_key = canceled_key;
        return Some(doc);
    }

    if let Some(inf) = tree.find("infNFe") {
        let ide = inf.find("ide");
        let field = |p: &str| ide.and_then(|i| text(i, p));
        let invoice_number = field("nNF");
        let operation_nature = field("natOp");
        let referenced_key = field("NFref/refNFe");
        let movement_code = text(inf, "det/prod/CFOP");
        let annotation = text(inf, "infAdic/obsCont/xTexto");
        let access_key = inf
            .attr("Id")
            .and_then(|id| id.get(3..))
            .map(str::to_string)
            .filter(|k| !k.is_empty());
        let issuer_tax_id = inf
            .find("emit")
            .and_then(|e| text(e, "CNPJ"));

        let mut doc = ClassifiedDocument::bare(DocumentKind::Invoice, path, tree);
        doc.invoice_number = invoice_number;
        doc.operation_nature = operation_nature;
        doc.referenced_key = referenced_key;
        doc.movement_code = movement_code;
        doc.annotation = annotation;
        doc.access_key = access_key;
        doc.issuer_tax_id = issuer_tax_id;
        return Some(doc);
    }

    if tree.find("infCte").is_some() {
        return Some(ClassifiedDocument::bare(DocumentKind::TransportManifest, path, tree));
    }

    if tree.find("infInut").is_some() {
        return Some(ClassifiedDocument::bare(DocumentKind::NumberDenial, path, tree));
    }

    debug!(path = %path.display(), "unrecognized document, skipping");
    None
}
