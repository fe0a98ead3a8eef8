//! Cancellation event editor.

use super::{ChangeLog, EditContext};
use crate::core::error::FiscalError;
use crate::fiscal::key::nfe_key;
use crate::markup::node::Document;

pub fn edit(tree: &mut Document, ctx: &EditContext<'_>) -> Result<ChangeLog, FiscalError> {
    let mut log = ChangeLog::default();
    if tree.find("infEvento").is_none() {
        return Ok(log);
    }

    tree.for_each_mut("chNFe", |el| {
        let new = el
            .text()
            .and_then(|old| ctx.keys.get(old.trim()));
        if let Some(new) = new {
            log.set_text(el, new, "cancellation: <chNFe> changed");
        }
    });

    if let Some(ts) = ctx.timestamp() {
        if let Some(node) = tree.find_mut("infEvento/dhEvento") {
            log.set_text(node, &ts, "cancellation: <dhEvento> changed");
        }
        for tag in ["dhRecbto", "dhRegEvento"] {
            if let Some(node) = tree.find_mut(&format!("retEvento/infEvento/{tag}")) {
                log.set_text(node, &ts, format!("protocol: <{tag}> changed"));
            }
        }
    }

    // Keys that were never mapped still follow the invoice number.
    tree.for_each_mut("chNFe", |el| {
        let Some(number) = el
            .text()
            .and_then(|k| k.trim().get(nfe_key::NUMBER).map(str::to_string))
        else {
            return;
        };
        let synced = ctx
            .keys
            .values()
            .find(|k| k.get(nfe_key::NUMBER) == Some(number.as_str()));
        if let Some(key) = synced {
            log.set_text(el, key, "cancellation: <chNFe> synced by invoice number");
        }
    });

    Ok(log)
}
