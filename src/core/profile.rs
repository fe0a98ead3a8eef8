//! Configuration profiles: which fields to overwrite and with what.
//!
//! Field names inside `[issuer]`, `[products]` and `[taxes]` are the NFe tag
//! names themselves, so a profile reads like the XML it edits:
//!
//! ```toml
//! name = "ATLAS"
//!
//! [issuer]
//! CNPJ = "98.765.432/0001-10"
//! xNome = "ATLAS COMERCIO LTDA"
//!
//! [date]
//! target = "15/03/2024"
//!
//! [flags]
//! issuer = true
//! date = true
//!
//! [[cst_rules]]
//! cfop = "5102"
//! ICMS = "00"
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::fiscal::date::{DateError, parse_target_date};
use crate::fiscal::key::digits_only;

/// Issuer sub-fields that live under the address element
/// (`enderEmit` on invoices, `enderReme` on manifests).
pub const ADDRESS_TAGS: [&str; 8] = ["xLgr", "nro", "xCpl", "xBairro", "xMun", "UF", "fone", "CEP"];

/// Fields written digits-only; profiles usually keep them masked.
const NUMERIC_TAGS: [&str; 3] = ["CNPJ", "CEP", "fone"];

pub fn is_address_tag(tag: &str) -> bool {
    ADDRESS_TAGS.contains(&tag)
}

fn push(out: &mut Vec<(&'static str, String)>, tag: &'static str, value: &Option<String>) {
    let Some(v) = value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    else {
        return;
    };
    let v = if NUMERIC_TAGS.contains(&tag) { digits_only(v) } else { v.to_string() };
    out.push((tag, v));
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerFields {
    #[serde(rename = "CNPJ", skip_serializing_if = "Option::is_none")]
    pub cnpj: Option<String>,
    #[serde(rename = "xNome", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "xLgr", skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(rename = "nro", skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(rename = "xCpl", skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    #[serde(rename = "xBairro", skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(rename = "xMun", skip_serializing_if = "Option::is_none")]
    pub municipality: Option<String>,
    #[serde(rename = "UF", skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(rename = "fone", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "CEP", skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

impl IssuerFields {
    /// Configured `(tag, value)` pairs, empty values skipped.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        push(&mut out, "CNPJ", &self.cnpj);
        push(&mut out, "xNome", &self.name);
        push(&mut out, "xLgr", &self.street);
        push(&mut out, "nro", &self.number);
        push(&mut out, "xCpl", &self.complement);
        push(&mut out, "xBairro", &self.district);
        push(&mut out, "xMun", &self.municipality);
        push(&mut out, "UF", &self.state);
        push(&mut out, "fone", &self.phone);
        push(&mut out, "CEP", &self.postal_code);
        out
    }

    /// Issuer tax id, digits only, when configured.
    pub fn tax_id(&self) -> Option<String> {
        self.cnpj
            .as_deref()
            .map(digits_only)
            .filter(|d| !d.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductFields {
    #[serde(rename = "xProd", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "cEAN", skip_serializing_if = "Option::is_none")]
    pub ean: Option<String>,
    #[serde(rename = "cProd", skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ProductFields {
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        push(&mut out, "xProd", &self.description);
        push(&mut out, "cEAN", &self.ean);
        push(&mut out, "cProd", &self.code);
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxRateFields {
    #[serde(rename = "pFCP", skip_serializing_if = "Option::is_none")]
    pub fcp: Option<String>,
    #[serde(rename = "pICMS", skip_serializing_if = "Option::is_none")]
    pub icms: Option<String>,
    #[serde(rename = "pICMSUFDest", skip_serializing_if = "Option::is_none")]
    pub icms_uf_dest: Option<String>,
    #[serde(rename = "pICMSInter", skip_serializing_if = "Option::is_none")]
    pub icms_inter: Option<String>,
    #[serde(rename = "pPIS", skip_serializing_if = "Option::is_none")]
    pub pis: Option<String>,
    #[serde(rename = "pCOFINS", skip_serializing_if = "Option::is_none")]
    pub cofins: Option<String>,
    #[serde(rename = "pIPI", skip_serializing_if = "Option::is_none")]
    pub ipi: Option<String>,
}

impl TaxRateFields {
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        push(&mut out, "pFCP", &self.fcp);
        push(&mut out, "pICMS", &self.icms);
        push(&mut out, "pICMSUFDest", &self.icms_uf_dest);
        push(&mut out, "pICMSInter", &self.icms_inter);
        push(&mut out, "pPIS", &self.pis);
        push(&mut out, "pCOFINS", &self.cofins);
        push(&mut out, "pIPI", &self.ipi);
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateSection {
    /// `DD/MM/YYYY` or `YYYY-MM-DD`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Per-section "apply this" switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionFlags {
    pub issuer: bool,
    pub products: bool,
    pub taxes: bool,
    pub date: bool,
    pub reference_rewrite: bool,
    pub cst: bool,
    pub zero_ipi_on_return: bool,
    pub zero_ipi_on_sale: bool,
}

/// Tax-regime codes to force on line items carrying `cfop`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CstRule {
    pub cfop: String,
    #[serde(rename = "ICMS", skip_serializing_if = "Option::is_none")]
    pub icms: Option<String>,
    #[serde(rename = "IPI", skip_serializing_if = "Option::is_none")]
    pub ipi: Option<String>,
    #[serde(rename = "PIS", skip_serializing_if = "Option::is_none")]
    pub pis: Option<String>,
    #[serde(rename = "COFINS", skip_serializing_if = "Option::is_none")]
    pub cofins: Option<String>,
}

impl CstRule {
    /// `(tax group tag, CST)` pairs that are set.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        push(&mut out, "ICMS", &self.icms);
        push(&mut out, "IPI", &self.ipi);
        push(&mut out, "PIS", &self.pis);
        push(&mut out, "COFINS", &self.cofins);
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurationProfile {
    pub name: String,
    pub issuer: IssuerFields,
    pub products: ProductFields,
    pub taxes: TaxRateFields,
    pub date: DateSection,
    pub flags: SectionFlags,
    pub cst_rules: Vec<CstRule>,
}

impl ConfigurationProfile {
    /// Target date when the date override is active and a date is set.
    pub fn date_override(&self) -> Result<Option<NaiveDate>, DateError> {
        if !self.flags.date {
            return Ok(None);
        }
        match self
            .date
            .target
            .as_deref()
            .map(str::trim)
        {
            Some(raw) if !raw.is_empty() => parse_target_date(raw).map(Some),
            _ => Ok(None),
        }
    }

    /// New issuer tax id when the issuer override is active and a CNPJ is set.
    pub fn issuer_override(&self) -> Option<String> {
        if self.flags.issuer { self.issuer.tax_id() } else { None }
    }

    pub fn cst_rule(&self, cfop: &str) -> Option<&CstRule> {
        let cfop = cfop.trim();
        self.cst_rules
            .iter()
            .find(|r| r.cfop.trim() == cfop)
    }

    /// A filled-in sample written by `nfk init`.
    pub fn example() -> Self {
        Self {
            name: "example".to_string(),
            issuer: IssuerFields {
                cnpj: Some("98.765.432/0001-10".to_string()),
                name: Some("EMPRESA EXEMPLO LTDA".to_string()),
                street: Some("RUA DAS FLORES".to_string()),
                number: Some("100".to_string()),
                district: Some("CENTRO".to_string()),
                municipality: Some("SAO PAULO".to_string()),
                state: Some("SP".to_string()),
                postal_code: Some("01001-000".to_string()),
                ..IssuerFields::default()
            },
            products: ProductFields {
                description: Some("PRODUTO EXEMPLO".to_string()),
                ..ProductFields::default()
            },
            taxes: TaxRateFields { icms: Some("18.00".to_string()), ..TaxRateFields::default() },
            date: DateSection { target: Some("01/03/2024".to_string()) },
            flags: SectionFlags { issuer: true, date: true, reference_rewrite: true, ..SectionFlags::default() },
            cst_rules: vec![CstRule {
                cfop: "5102".to_string(),
                icms: Some("00".to_string()),
                ..CstRule::default()
            }],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("profile {id:?} not found in {}", dir.display())]
    NotFound { id: String, dir: PathBuf },

    #[error("invalid profile id {0:?}")]
    InvalidId(String),

    #[error("failed to read profile {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse profile {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Date(#[from] DateError),
}

/// Where profiles come from. The batch only ever asks for one by id.
pub trait ProfileStore {
    fn get_profile(&self, id: &str) -> Result<ConfigurationProfile, ProfileError>;
}

/// Profiles stored as `<dir>/<id>.toml`.
#[derive(Debug, Clone)]
pub struct TomlProfileStore {
    dir: PathBuf,
}

impl TomlProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir
            .join(format!("{id}.toml"))
    }
}

impl ProfileStore for TomlProfileStore {
    fn get_profile(&self, id: &str) -> Result<ConfigurationProfile, ProfileError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !id.starts_with('.');
        if !valid {
            return Err(ProfileError::InvalidId(id.to_string()));
        }

        let path = self.path_for(id);
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProfileError::NotFound { id: id.to_string(), dir: self.dir.clone() });
            }
            Err(source) => return Err(ProfileError::Read { path, source }),
        };

        let mut profile: ConfigurationProfile =
            toml::from_str(&text).map_err(|source| ProfileError::Parse { path, source })?;
        if profile.name.is_empty() {
            profile.name = id.to_string();
        }
        Ok(profile)
    }
}
