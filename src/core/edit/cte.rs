//! Transport manifest (CTe) editor.

use tracing::warn;

use super::{ChangeLog, EditContext, apply_issuer};
use crate::core::error::FiscalError;
use crate::fiscal::key::{cte_id, rebuild_cte_id};
use crate::markup::node::Document;

pub fn edit(tree: &mut Document, ctx: &EditContext<'_>) -> Result<ChangeLog, FiscalError> {
    let mut log = ChangeLog::default();
    let stamp = ctx.timestamp();
    let Some(inf) = tree.find_mut("infCte") else {
        return Ok(log);
    };

    if let Some(date) = &ctx.date_stamp
        && let Some(id) = inf
            .attr("Id")
            .filter(|id| id.starts_with(cte_id::PREFIX))
            .map(str::to_string)
    {
        let new_id = rebuild_cte_id(&id, &date.two_digit_year(), &date.month())?;
        log.set_attr(inf, "Id", &new_id, "manifest access key changed");
    }

    if let Some(ts) = &stamp
        && let Some(node) = inf.find_mut("ide/dhEmi")
    {
        log.set_text(node, ts, "manifest: <dhEmi> changed");
    }

    if let Some(node) = inf.find_mut("infCTeNorm/infDoc/infNFe/chave") {
        match ctx.primary_sale_key {
            Some(key) => {
                log.set_text(node, key, "manifest: <chave> forced to the sale key");
            }
            None => warn!("no primary sale key in batch, manifest <chave> left as is"),
        }
    }

    if ctx.profile.flags.issuer
        && let Some(rem) = inf.find_mut("rem")
    {
        apply_issuer(rem, "enderReme", ctx, "sender", &mut log);
    }

    let own_key = inf
        .attr("Id")
        .and_then(|id| id.strip_prefix(cte_id::PREFIX))
        .map(str::to_string);

    if let Some(prot) = tree.find_mut("protCTe/infProt") {
        if let Some(key) = &own_key
            && let Some(node) = prot.find_mut("chCTe")
        {
            log.set_text(node, key, "protocol: <chCTe> synced");
        }
        if let Some(ts) = &stamp
            && let Some(node) = prot.find_mut("dhRecbto")
        {
            log.set_text(node, ts, "protocol: <dhRecbto> changed");
        }
    }

    Ok(log)
}
