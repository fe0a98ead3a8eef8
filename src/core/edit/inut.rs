//! Number-denial (inutilização) editor.

use super::{ChangeLog, EditContext};
use crate::core::error::FiscalError;
use crate::fiscal::key::rebuild_inut_id;
use crate::markup::node::Document;

pub fn edit(tree: &mut Document, ctx: &EditContext<'_>) -> Result<ChangeLog, FiscalError> {
    let mut log = ChangeLog::default();
    let Some(inf) = tree.find_mut("infInut") else {
        return Ok(log);
    };

    let mut new_tax_id = None;
    if let Some(tax_id) = ctx.profile.issuer_override()
        && let Some(node) = inf.find_mut("CNPJ")
    {
        log.set_text(node, &tax_id, "denial: <CNPJ> changed");
        new_tax_id = Some(tax_id);
    }

    let mut new_year = None;
    if let Some(date) = &ctx.date_stamp
        && let Some(node) = inf.find_mut("ano")
    {
        let year = date.two_digit_year();
        log.set_text(node, &year, "denial: <ano> changed");
        new_year = Some(year);
    }

    if (new_year.is_some() || new_tax_id.is_some())
        && let Some(id) = inf.attr("Id").map(str::to_string)
    {
        let new_id = rebuild_inut_id(&id, new_year.as_deref(), new_tax_id.as_deref())?;
        log.set_attr(inf, "Id", &new_id, "denial: Id changed");
    }

    if let Some(ts) = ctx.timestamp()
        && let Some(node) = tree.find_mut("retInutNFe/infInut/dhRecbto")
    {
        log.set_text(node, &ts, "denial: <dhRecbto> changed");
    }

    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::core::mapping::MappingOutcome;
    use crate::core::profile::{ConfigurationProfile, SectionFlags};
    use crate::fiscal::cfop::MovementTables;

    const DENIAL: &str = r#"<ProcInutNFe><inutNFe><infInut Id="ID35241234567800019555001000000010000000020">
<ano>24</ano><CNPJ>12345678000195</CNPJ><mod>55</mod><serie>1</serie></infInut></inutNFe>
<retInutNFe><infInut><dhRecbto>2024-01-12T10:00:00-03:00</dhRecbto></infInut></retInutNFe></ProcInutNFe>"#;

    fn run(flags: SectionFlags, date: bool) -> (Document, ChangeLog) {
        let mut profile = ConfigurationProfile::example();
        profile.flags = flags;
        profile.date.target = Some("01/02/2025".to_string());
        let mapping = MappingOutcome::default();
        let tables = MovementTables::default();
        let mut when = stamp();
        when.date = chrono::NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        let ctx = EditContext::new(&profile, date.then_some(when), &mapping, &tables);
        let mut tree = parse(DENIAL);
        let log = edit(&mut tree, &ctx).unwrap();
        (tree, log)
    }

    #[test]
    fn year_and_tax_id_rebuild_the_id() {
        let (tree, log) = run(SectionFlags { issuer: true, date: true, ..SectionFlags::default() }, true);
        assert_eq!(tree.text_at("inutNFe/infInut/ano").as_deref(), Some("25"));
        assert_eq!(tree.text_at("inutNFe/infInut/CNPJ").as_deref(), Some("98765432000110"));
        assert_eq!(
            tree.find("infInut").and_then(|i| i.attr("Id")),
            Some("ID35259876543200011055001000000010000000020")
        );
        assert_eq!(tree.text_at("retInutNFe/dhRecbto").as_deref(), Some("2025-02-01T10:20:30-03:00"));
        assert_eq!(log.len(), 4);
    }

    #[test]
    fn issuer_only_keeps_the_year() {
        let (tree, _) = run(SectionFlags { issuer: true, ..SectionFlags::default() }, false);
        assert_eq!(tree.text_at("ano").as_deref(), Some("24"));
        assert_eq!(
            tree.find("infInut").and_then(|i| i.attr("Id")),
            Some("ID35249876543200011055001000000010000000020")
        );
    }

    #[test]
    fn inactive_profile_changes_nothing() {
        let (tree, log) = run(SectionFlags::default(), false);
        assert!(log.is_empty());
        assert_eq!(tree, parse(DENIAL));
    }
}
