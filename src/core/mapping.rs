//! First pass over the batch: old key → new key, own key → referenced key,
//! and the primary sale key manifests point at.

use std::collections::HashMap;
use std::path::PathBuf;

use indexmap::IndexMap;
use tracing::{debug, instrument, warn};

use crate::core::classify::{ClassifiedDocument, DocumentKind};
use crate::core::profile::ConfigurationProfile;
use crate::core::rename::SALE_SUFFIX;
use crate::fiscal::date::DateStamp;
use crate::fiscal::key::{AccessKey, KeyError, reference_number};

/// Old access key → rebuilt access key, in batch order.
pub type KeyMapping = IndexMap<String, String>;

/// Own access key → access key of the in-batch invoice it references.
pub type ReferenceMap = IndexMap<String, String>;

/// A document whose key could not be rebuilt; it is left unedited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFailure {
    pub path: PathBuf,
    pub key: String,
    pub error: KeyError,
}

#[derive(Debug, Clone, Default)]
pub struct MappingOutcome {
    pub keys: KeyMapping,
    pub references: ReferenceMap,
    pub primary_sale_key: Option<String>,
    pub failures: Vec<KeyFailure>,
}

impl MappingOutcome {
    pub fn failed(&self, path: &std::path::Path) -> Option<&KeyFailure> {
        self.failures
            .iter()
            .find(|f| f.path == path)
    }
}

/// Build the batch mapping. Runs after renaming so the primary sale can be
/// recognized by its file name.
#[instrument(skip_all, fields(docs = docs.len()))]
pub fn build(docs: &[ClassifiedDocument], profile: &ConfigurationProfile, date: Option<&DateStamp>) -> MappingOutcome {
    let invoices: Vec<&ClassifiedDocument> = docs
        .iter()
        .filter(|d| d.kind == DocumentKind::Invoice)
        .collect();

    let mut by_number: HashMap<&str, &str> = HashMap::new();
    for inv in &invoices {
        if let (Some(n), Some(k)) = (inv.invoice_number.as_deref(), inv.access_key.as_deref()) {
            by_number.insert(n, k);
        }
    }

    let new_tax_id = profile.issuer_override();
    let new_year_month = date.map(DateStamp::year_month);
    let rewrite = profile.flags.issuer || date.is_some();

    let mut out = MappingOutcome::default();
    for inv in invoices {
        let Some(own) = inv.access_key.as_deref() else { continue };

        if let Some(reference) = inv.referenced_key.as_deref() {
            match reference_number(reference)
                .as_deref()
                .and_then(|n| by_number.get(n))
            {
                Some(target) => {
                    out.references
                        .insert(own.to_string(), (*target).to_string());
                }
                None => warn!(
                    file = %inv.file_name(),
                    reference,
                    "referenced invoice is not part of the batch"
                ),
            }
        }

        if !rewrite {
            continue;
        }

        let rebuilt = AccessKey::parse(own)
            .and_then(|k| k.rebuild(new_year_month.as_deref(), new_tax_id.as_deref()));
        match rebuilt {
            Ok(new) => {
                debug!(old = own, new = %new, "key remapped");
                if inv.file_name().ends_with(SALE_SUFFIX) {
                    out.primary_sale_key = Some(new.to_string());
                }
                out.keys
                    .insert(own.to_string(), new.to_string());
            }
            Err(error) => {
                warn!(file = %inv.file_name(), key = own, %error, "cannot derive new key");
                out.failures.push(KeyFailure {
                    path: inv.path.clone(),
                    key: own.to_string(),
                    error,
                });
            }
        }
    }
    out
}
