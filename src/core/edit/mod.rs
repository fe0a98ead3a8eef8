//! Second pass: per-type field editors.
//!
//! Editors mutate the tree in place and report what they changed. A value
//! that is already correct is not a change, so a document whose log comes
//! back empty is left on disk untouched.

pub mod cancel;
pub mod cte;
pub mod inut;
pub mod nfe;

use indexmap::IndexSet;
use serde::Serialize;

use crate::core::classify::{ClassifiedDocument, DocumentKind};
use crate::core::error::FiscalError;
use crate::core::mapping::{KeyMapping, MappingOutcome, ReferenceMap};
use crate::core::profile::{ConfigurationProfile, is_address_tag};
use crate::fiscal::cfop::MovementTables;
use crate::fiscal::date::DateStamp;
use crate::markup::node::Element;

/// Everything an editor may consult. Read-only for the whole edit phase.
#[derive(Debug, Clone, Copy)]
pub struct EditContext<'a> {
    pub profile: &'a ConfigurationProfile,
    /// Set only when the date override is active.
    pub date_stamp: Option<DateStamp>,
    pub keys: &'a KeyMapping,
    pub references: &'a ReferenceMap,
    pub primary_sale_key: Option<&'a str>,
    pub tables: &'a MovementTables,
}

impl<'a> EditContext<'a> {
    pub fn new(
        profile: &'a ConfigurationProfile,
        date_stamp: Option<DateStamp>,
        mapping: &'a MappingOutcome,
        tables: &'a MovementTables,
    ) -> Self {
        Self {
            profile,
            date_stamp,
            keys: &mapping.keys,
            references: &mapping.references,
            primary_sale_key: mapping.primary_sale_key.as_deref(),
            tables,
        }
    }

    pub fn timestamp(&self) -> Option<String> {
        self.date_stamp
            .as_ref()
            .map(DateStamp::timestamp)
    }
}

/// Ordered, de-duplicated change descriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChangeLog(IndexSet<String>);

impl ChangeLog {
    pub fn record(&mut self, change: impl Into<String>) {
        self.0
            .insert(change.into());
    }

    /// Set `el`'s text and record `change` if the value differs.
    pub fn set_text(&mut self, el: &mut Element, value: &str, change: impl Into<String>) -> bool {
        if el.text().as_deref() == Some(value) {
            return false;
        }
        el.set_text(value);
        self.record(change);
        true
    }

    /// Set attribute `name` and record `change` if the value differs.
    pub fn set_attr(&mut self, el: &mut Element, name: &str, value: &str, change: impl Into<String>) -> bool {
        if el.attr(name) == Some(value) {
            return false;
        }
        el.set_attr(name, value);
        self.record(change);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .map(String::as_str)
    }
}

/// Write profile issuer fields under `party`; address fields go to its
/// `address` child. Used for the invoice issuer and the manifest sender.
pub(crate) fn apply_issuer(party: &mut Element, address: &str, ctx: &EditContext<'_>, label: &str, log: &mut ChangeLog) {
    for (tag, value) in ctx
        .profile
        .issuer
        .entries()
    {
        let scope = if is_address_tag(tag) { party.find_mut(address) } else { Some(&mut *party) };
        if let Some(node) = scope.and_then(|s| s.find_mut(tag)) {
            log.set_text(node, &value, format!("{label}: <{tag}> changed"));
        }
    }
}

/// Run the editor for `doc`'s kind. The tree is only replaced when the
/// editor succeeds; on error the document keeps its pre-edit state.
pub fn edit_document(doc: &mut ClassifiedDocument, ctx: &EditContext<'_>) -> Result<ChangeLog, FiscalError> {
    let mut tree = doc.tree.clone();
    let log = match doc.kind {
        DocumentKind::Invoice => nfe::edit(&mut tree, ctx)?,
        DocumentKind::Cancellation => cancel::edit(&mut tree, ctx)?,
        DocumentKind::TransportManifest => cte::edit(&mut tree, ctx)?,
        DocumentKind::NumberDenial => inut::edit(&mut tree, ctx)?,
    };
    if !log.is_empty() {
        doc.tree = tree;
    }
    Ok(log)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::markup::codec::XmlCodec;
    use crate::markup::node::Document;
    use chrono::{NaiveDate, NaiveTime};

    pub const SALE: &str = "35240112345678000195550010000000011123456789";
    pub const SALE_NEW: &str = "35240398765432000110550010000000011123456784";

    pub fn parse(xml: &str) -> Document {
        XmlCodec::new()
            .parse(xml.as_bytes())
            .unwrap()
    }

    pub fn stamp() -> DateStamp {
        DateStamp::new(
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            NaiveTime::from_hms_opt(10, 20, 30).unwrap(),
        )
    }

    pub const STAMP: &str = "2024-03-15T10:20:30-03:00";

    pub fn mapping() -> MappingOutcome {
        let mut m = MappingOutcome::default();
        m.keys
            .insert(SALE.to_string(), SALE_NEW.to_string());
        m.primary_sale_key = Some(SALE_NEW.to_string());
        m
    }
}
