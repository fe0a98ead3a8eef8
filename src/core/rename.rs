//! Business-role file names for invoices and cancellations.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::core::classify::{ClassifiedDocument, DocumentKind};
use crate::fiscal::cfop::MovementTables;
use crate::fiscal::key::reference_number;

pub const UNDELIVERED_RETURN: &str = "Retorno de mercadoria nao entregue";
pub const GOODS_DEVOLUTION: &str = "Devolucao de mercadorias";
pub const SYMBOLIC_DEPOSIT_RETURN: &str = "Outras Entradas - Retorno Simbolico de Deposito Temporario";
pub const DEPOSIT_RETURN: &str = "Outras Entradas - Retorno de Deposito Temporario";

const MARKETPLACE_MARKERS: [&str; 2] = ["DEVOLUTION_PLACES", "SALE_DEVOLUTION"];
const GENERIC_DEVOLUTION_MARKER: &str = "DEVOLUTION_devolution";

/// Suffix that marks a renamed sale; the mapping step keys on it.
pub const SALE_SUFFIX: &str = "Venda.xml";

/// Proposed file name for an invoice, or `None` to leave it alone.
pub fn suggest_name(doc: &ClassifiedDocument, tables: &MovementTables) -> Option<String> {
    if doc.kind != DocumentKind::Invoice {
        return None;
    }
    let n = doc.invoice_number.as_deref()?;
    let code = doc.movement_code.as_deref()?;
    let nat = doc.operation_nature.as_deref();
    let reference = doc
        .referenced_key
        .as_deref()
        .and_then(reference_number);
    let annotated = |markers: &[&str]| {
        doc.annotation
            .as_deref()
            .is_some_and(|a| markers.iter().any(|m| a.contains(m)))
    };

    if tables.is_devolution(code)
        && let Some(r) = &reference
    {
        return match nat {
            Some(UNDELIVERED_RETURN) => Some(format!("{n} - Insucesso de entrega da venda {r}.xml")),
            Some(GOODS_DEVOLUTION) if annotated(&MARKETPLACE_MARKERS) => {
                Some(format!("{n} - Devoluçao pro Mercado Livre da venda - {r}.xml"))
            }
            Some(GOODS_DEVOLUTION) if annotated(&[GENERIC_DEVOLUTION_MARKER]) => {
                Some(format!("{n} - Devolucao da venda {r}.xml"))
            }
            _ => None,
        };
    }

    if tables.is_sale(code) {
        return Some(format!("{n} - {SALE_SUFFIX}"));
    }

    if tables.is_return(code)
        && let Some(r) = &reference
    {
        return match nat {
            Some(SYMBOLIC_DEPOSIT_RETURN) => Some(format!("{n} - Retorno da remessa {r}.xml")),
            Some(DEPOSIT_RETURN) => Some(format!("{n} - Retorno Efetivo da remessa {r}.xml")),
            _ => None,
        };
    }

    if tables.is_shipment(code) {
        return Some(match reference {
            Some(r) => format!("{n} - Remessa simbólica da venda {r}.xml"),
            None => format!("{n} - Remessa.xml"),
        });
    }

    None
}

/// `CAN-{number}.xml` when the canceled key belongs to an invoice in the batch.
pub fn cancellation_name(doc: &ClassifiedDocument, numbers_by_key: &HashMap<String, String>) -> Option<String> {
    if doc.kind != DocumentKind::Cancellation {
        return None;
    }
    let key = doc.canceled_key.as_deref()?;
    numbers_by_key
        .get(key)
        .map(|n| format!("CAN-{n}.xml"))
}

/// Own key → invoice number over every invoice that has both.
pub fn invoice_numbers_by_key<'a>(docs: impl IntoIterator<Item = &'a ClassifiedDocument>) -> HashMap<String, String> {
    docs.into_iter()
        .filter(|d| d.kind == DocumentKind::Invoice)
        .filter_map(|d| Some((d.access_key.clone()?, d.invoice_number.clone()?)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameRecord {
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameSkip {
    pub path: PathBuf,
    pub target: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct RenameOutcome {
    pub renamed: Vec<RenameRecord>,
    pub skipped: Vec<RenameSkip>,
}

/// Apply suggested names: invoices first, then cancellations (which need the
/// invoice numbers). Collisions and I/O failures keep the original path.
/// With `dry_run` the planned path is recorded and nothing is touched.
#[instrument(skip_all, fields(docs = docs.len(), dry_run))]
pub fn rename_batch(docs: &mut [ClassifiedDocument], tables: &MovementTables, dry_run: bool) -> RenameOutcome {
    let numbers = invoice_numbers_by_key(docs.iter());
    let mut plan: Vec<(usize, String)> = docs
        .iter()
        .enumerate()
        .filter_map(|(i, d)| suggest_name(d, tables).map(|n| (i, n)))
        .collect();
    plan.extend(
        docs.iter()
            .enumerate()
            .filter_map(|(i, d)| cancellation_name(d, &numbers).map(|n| (i, n))),
    );

    let mut outcome = RenameOutcome::default();
    let mut claimed: HashSet<PathBuf> = HashSet::new();

    for (idx, name) in plan {
        let doc = &mut docs[idx];
        let from = doc.path.clone();
        let target = from
            .parent()
            .unwrap_or(Path::new(""))
            .join(&name);
        if target == from {
            claimed.insert(target);
            continue;
        }

        if claimed.contains(&target) || target.exists() {
            warn!(from = %from.display(), to = %target.display(), "rename target already exists, keeping original name");
            outcome.skipped.push(RenameSkip { path: from, target, reason: "target exists".to_string() });
            continue;
        }

        if !dry_run && let Err(e) = std::fs::rename(&from, &target) {
            warn!(from = %from.display(), error = %e, "rename failed, keeping original name");
            outcome.skipped.push(RenameSkip { path: from, target, reason: e.to_string() });
            continue;
        }

        info!(from = %from.display(), to = %target.display(), "renamed");
        claimed.insert(target.clone());
        doc.path = target.clone();
        outcome.renamed.push(RenameRecord { from, to: target });
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::node::{Document, Element};
    use tempfile::TempDir;

    const SALE_KEY: &str = "35240112345678000195550010000000011123456789";

    fn invoice(n: &str, cfop: &str, nat: Option<&str>, reference: Option<&str>, note: Option<&str>) -> ClassifiedDocument {
        ClassifiedDocument {
            kind: DocumentKind::Invoice,
            path: PathBuf::from(format!("{n}.xml")),
            tree: Document { declaration: None, root: Element::new("nfeProc") },
            invoice_number: Some(n.to_string()),
            movement_code: Some(cfop.to_string()),
            operation_nature: nat.map(str::to_string),
            referenced_key: reference.map(str::to_string),
            annotation: note.map(str::to_string),
            access_key: None,
            issuer_tax_id: None,
            canceled_key: None,
        }
    }

    #[test]
    fn name_table() {
        let t = MovementTables::default();
        let r = Some(SALE_KEY);
        let cases = [
            (invoice("10", "1202", Some(UNDELIVERED_RETURN), r, None), Some("10 - Insucesso de entrega da venda 1.xml")),
            (
                invoice("11", "1202", Some(GOODS_DEVOLUTION), r, Some("tag SALE_DEVOLUTION")),
                Some("11 - Devoluçao pro Mercado Livre da venda - 1.xml"),
            ),
            (
                invoice("12", "1202", Some(GOODS_DEVOLUTION), r, Some("DEVOLUTION_devolution")),
                Some("12 - Devolucao da venda 1.xml"),
            ),
            (invoice("13", "1202", Some(GOODS_DEVOLUTION), r, None), None),
            (invoice("14", "5102", None, None, None), Some("14 - Venda.xml")),
            (invoice("15", "1949", Some(SYMBOLIC_DEPOSIT_RETURN), r, None), Some("15 - Retorno da remessa 1.xml")),
            (invoice("16", "1949", Some(DEPOSIT_RETURN), r, None), Some("16 - Retorno Efetivo da remessa 1.xml")),
            (invoice("17", "5949", None, r, None), Some("17 - Remessa simbólica da venda 1.xml")),
            (invoice("18", "5949", None, None, None), Some("18 - Remessa.xml")),
            (invoice("19", "9999", None, None, None), None),
            (invoice("20", "1949", Some(DEPOSIT_RETURN), None, None), None),
        ];
        for (doc, expected) in cases {
            assert_eq!(suggest_name(&doc, &t).as_deref(), expected, "invoice {:?}", doc.invoice_number);
        }
    }

    #[test]
    fn devolution_with_unknown_nature_does_not_fall_to_sale() {
        let mut t = MovementTables::default();
        t.sales.push("1202".to_string());
        let doc = invoice("7", "1202", Some("Outra coisa"), Some(SALE_KEY), None);
        assert_eq!(suggest_name(&doc, &t), None);
        // without a reference the sale rule applies
        let doc = invoice("7", "1202", Some("Outra coisa"), None, None);
        assert_eq!(suggest_name(&doc, &t).as_deref(), Some("7 - Venda.xml"));
    }

    #[test]
    fn batch_renames_and_keeps_colliding_names() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        let mut sale = invoice("1", "5102", None, None, None);
        sale.path = dir.join("a.xml");
        sale.access_key = Some(SALE_KEY.to_string());
        let mut dup = invoice("1", "5102", None, None, None);
        dup.path = dir.join("b.xml");
        let mut cancel = invoice("x", "0", None, None, None);
        cancel.kind = DocumentKind::Cancellation;
        cancel.path = dir.join("c.xml");
        cancel.canceled_key = Some(SALE_KEY.to_string());
        for p in ["a.xml", "b.xml", "c.xml"] {
            std::fs::write(dir.join(p), "<x/>").unwrap();
        }

        let mut docs = vec![sale, dup, cancel];
        let out = rename_batch(&mut docs, &MovementTables::default(), false);

        assert_eq!(docs[0].path, dir.join("1 - Venda.xml"));
        assert_eq!(docs[1].path, dir.join("b.xml"));
        assert_eq!(docs[2].path, dir.join("CAN-1.xml"));
        assert_eq!(out.renamed.len(), 2);
        assert_eq!(out.skipped.len(), 1);
        assert!(dir.join("1 - Venda.xml").exists());
        assert!(dir.join("b.xml").exists());
        assert!(!dir.join("a.xml").exists());
    }

    #[test]
    fn dry_run_plans_without_touching_disk() {
        let tmp = TempDir::new().unwrap();
        let mut sale = invoice("3", "5102", None, None, None);
        sale.path = tmp.path().join("orig.xml");
        std::fs::write(&sale.path, "<x/>").unwrap();
        let mut docs = vec![sale];
        let out = rename_batch(&mut docs, &MovementTables::default(), true);
        assert_eq!(out.renamed.len(), 1);
        assert_eq!(docs[0].path, tmp.path().join("3 - Venda.xml"));
        assert!(tmp.path().join("orig.xml").exists());
        assert!(!tmp.path().join("3 - Venda.xml").exists());
    }
}
