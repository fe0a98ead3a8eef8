//! Invoice (NFe) editor.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use super::{ChangeLog, EditContext, apply_issuer};
use crate::core::error::FiscalError;
use crate::markup::node::{Document, Element};

const ZERO_AMOUNT: &str = "0.00";
const ZERO_RATE: &str = "0.0000";

/// Per-line amounts summed into `ICMSTot`.
const LINE_AMOUNTS: [&str; 5] = ["vProd", "vDesc", "vFrete", "vSeg", "vOutro"];

pub fn edit(tree: &mut Document, ctx: &EditContext<'_>) -> Result<ChangeLog, FiscalError> {
    let mut log = ChangeLog::default();
    let Some(own_key) = tree
        .find("infNFe")
        .and_then(|inf| inf.attr("Id"))
        .and_then(|id| id.get(3..))
        .map(str::to_string)
    else {
        return Ok(log);
    };
    let flags = ctx.profile.flags;
    let stamp = ctx.timestamp();

    if let Some(inf) = tree.find_mut("infNFe") {
        if flags.issuer
            && let Some(emit) = inf.find_mut("emit")
        {
            apply_issuer(emit, "enderEmit", ctx, "issuer", &mut log);
        }

        inf.for_each_mut("det", |det| edit_line(det, ctx, &mut log));

        if flags.zero_ipi_on_return || flags.zero_ipi_on_sale {
            recompute_totals(inf, &mut log)?;
        }

        if let Some(ts) = &stamp
            && let Some(ide) = inf.find_mut("ide")
        {
            for tag in ["dhEmi", "dhSaiEnt"] {
                if let Some(node) = ide.find_mut(tag) {
                    log.set_text(node, ts, format!("date: <{tag}> changed"));
                }
            }
        }
    }

    if let Some(ts) = &stamp
        && let Some(node) = tree.find_mut("protNFe/infProt/dhRecbto")
    {
        log.set_text(node, ts, "protocol: <dhRecbto> changed");
    }

    if let Some(new_key) = ctx.keys.get(&own_key) {
        if let Some(inf) = tree.find_mut("infNFe") {
            log.set_attr(inf, "Id", &format!("NFe{new_key}"), "access key Id changed");
        }
        if let Some(node) = tree.find_mut("protNFe/infProt/chNFe") {
            log.set_text(node, new_key, "protocol: <chNFe> changed");
        }
    }

    if flags.reference_rewrite
        && let Some(target) = ctx.references.get(&own_key)
        && let Some(new_ref) = ctx.keys.get(target)
        && let Some(node) = tree.find_mut("infNFe/ide/NFref/refNFe")
    {
        log.set_text(node, new_ref, "reference key changed");
    }

    Ok(log)
}

/// Product, tax rate, CST and zero-IPI rules for one `det`.
fn edit_line(det: &mut Element, ctx: &EditContext<'_>, log: &mut ChangeLog) {
    if det.find("prod").is_none() || det.find("imposto").is_none() {
        return;
    }
    let profile = ctx.profile;
    let flags = profile.flags;

    if flags.products
        && let Some(prod) = det.find_mut("prod")
    {
        for (tag, value) in profile.products.entries() {
            if let Some(node) = prod.find_mut(tag) {
                log.set_text(node, &value, format!("product: <{tag}> changed"));
            }
        }
    }

    let Some(imposto) = det.find_mut("imposto") else { return };

    if flags.taxes {
        for (tag, value) in profile.taxes.entries() {
            if let Some(node) = imposto.find_mut(tag) {
                log.set_text(node, &value, format!("tax: <{tag}> changed"));
            }
        }
    }

    let Some(cfop) = det
        .text_at("prod/CFOP")
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
    else {
        return;
    };
    let Some(imposto) = det.find_mut("imposto") else { return };

    if flags.cst
        && let Some(rule) = profile.cst_rule(&cfop)
    {
        for (group, cst) in rule.entries() {
            if let Some(node) = imposto
                .find_mut(group)
                .and_then(|g| g.find_mut("CST"))
            {
                log.set_text(node, &cst, format!("{group} CST changed"));
            }
        }
    }

    let Some(ipi) = imposto.find_mut("IPI") else { return };
    if flags.zero_ipi_on_return && ctx.tables.is_return_or_shipment(&cfop) {
        zero_ipi(ipi, log, "IPI zeroed for return/shipment");
    }
    if flags.zero_ipi_on_sale && ctx.tables.is_sale(&cfop) {
        zero_ipi(ipi, log, "IPI zeroed for sale");
    }
}

fn zero_ipi(ipi: &mut Element, log: &mut ChangeLog, change: &str) {
    for (tag, value) in [("vIPI", ZERO_AMOUNT), ("vBC", ZERO_AMOUNT), ("pIPI", ZERO_RATE)] {
        if let Some(node) = ipi.find_mut(tag) {
            log.set_text(node, value, change);
        }
    }
}

fn amount(scope: Option<&Element>, tag: &str) -> Result<Decimal, FiscalError> {
    let Some(raw) = scope.and_then(|s| s.text_at(tag)) else {
        return Ok(Decimal::ZERO);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(raw).map_err(|_| FiscalError::InvalidAmount { field: tag.to_string(), value: raw.to_string() })
}

/// Two decimals, half away from zero.
pub fn format_amount(value: Decimal) -> String {
    let mut v = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    v.rescale(2);
    v.to_string()
}

/// Invoice totals after line-level IPI changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Totals {
    pub ipi: Decimal,
    pub invoice: Decimal,
}

/// Sum line amounts: `vNF = vProd + vIPI + vFrete + vSeg + vOutro - vDesc`.
pub fn sum_totals(inf: &Element) -> Result<Totals, FiscalError> {
    let mut sums = [Decimal::ZERO; LINE_AMOUNTS.len()];
    let mut ipi = Decimal::ZERO;
    for det in inf.find_all("det") {
        let prod = det.find("prod");
        for (slot, tag) in sums
            .iter_mut()
            .zip(LINE_AMOUNTS)
        {
            *slot += amount(prod, tag)?;
        }
        let ipi_group = det
            .find("imposto")
            .and_then(|i| i.find("IPI"));
        ipi += amount(ipi_group, "vIPI")?;
    }
    let [prod, desc, freight, insurance, other] = sums;
    Ok(Totals { ipi, invoice: prod + ipi + freight + insurance + other - desc })
}

fn recompute_totals(inf: &mut Element, log: &mut ChangeLog) -> Result<(), FiscalError> {
    if inf.find("total/ICMSTot").is_none() {
        return Ok(());
    }
    let totals = sum_totals(inf)?;
    let Some(tot) = inf.find_mut("total/ICMSTot") else { return Ok(()) };
    if let Some(node) = tot.find_mut("vIPI") {
        log.set_text(node, &format_amount(totals.ipi), "total vIPI recomputed");
    }
    if let Some(node) = tot.find_mut("vNF") {
        log.set_text(node, &format_amount(totals.invoice), "total vNF recomputed");
    }
    Ok(())
}
