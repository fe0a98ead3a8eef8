//! Access-key check digit and fixed-width identifier layouts.
//!
//! Three identifier formats travel through a batch and each has its own
//! layout table below: the 44-digit NFe access key, the `CTe`-prefixed
//! manifest id, and the `ID`-prefixed inutilização id. Field boundaries are
//! never inferred at runtime.

use std::fmt;

/// Length of an access-key body (everything but the check digit).
pub const BODY_LEN: usize = 43;
/// Length of a full access key.
pub const KEY_LEN: usize = 44;

/// NFe access key: `cUF AAMM CNPJ mod serie nNF tpEmis+cNF DV`.
pub mod nfe_key {
    use std::ops::Range;

    pub const STATE: Range<usize> = 0..2;
    pub const YEAR_MONTH: Range<usize> = 2..6;
    pub const TAX_ID: Range<usize> = 6..20;
    pub const MODEL: Range<usize> = 20..22;
    pub const SERIES: Range<usize> = 22..25;
    pub const NUMBER: Range<usize> = 25..34;
    pub const EMISSION: Range<usize> = 34..43;
    pub const CHECK: Range<usize> = 43..44;
}

/// CTe `Id` attribute: `"CTe"` followed by a 44-digit key whose year and
/// month are rewritten independently.
pub mod cte_id {
    use std::ops::Range;

    pub const PREFIX: &str = "CTe";
    pub const STATE: Range<usize> = 3..5;
    pub const YEAR: Range<usize> = 5..7;
    pub const MONTH: Range<usize> = 7..9;
    pub const TAX_ID: Range<usize> = 9..23;
    pub const REST: Range<usize> = 23..46;
    pub const LEN: usize = 47;
}

/// Inutilização `Id`: `"ID" UF ano CNPJ mod serie nNFIni nNFFin`, no DV.
pub mod inut_id {
    use std::ops::Range;

    pub const PREFIX: &str = "ID";
    pub const STATE: Range<usize> = 2..4;
    pub const YEAR: Range<usize> = 4..6;
    pub const TAX_ID: Range<usize> = 6..20;
    pub const MODEL: Range<usize> = 20..22;
    pub const SERIES: Range<usize> = 22..25;
    pub const RANGE_START: Range<usize> = 25..34;
    pub const RANGE_END: Range<usize> = 34..43;
    pub const LEN: usize = 43;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("key body must have {expected} digits, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("non-digit {found:?} at position {position}")]
    NonDigit { position: usize, found: char },

    #[error("identifier {0:?} does not match its fixed-width layout")]
    Layout(String),
}

/// Weighted modulo-11 check digit over a 43-digit body.
///
/// Weights run 2..=9 from the rightmost digit and wrap back to 2. A result
/// of 0, 1, 10 or 11 maps to `'0'`.
pub fn compute_check_digit(body: &str) -> Result<char, KeyError> {
    let len = body.chars().count();
    if len != BODY_LEN {
        return Err(KeyError::InvalidLength { expected: BODY_LEN, actual: len });
    }

    let mut sum: u32 = 0;
    let mut weight: u32 = 2;
    for (rev_pos, ch) in body.chars().rev().enumerate() {
        let digit = ch
            .to_digit(10)
            .ok_or(KeyError::NonDigit { position: BODY_LEN - 1 - rev_pos, found: ch })?;
        sum += digit * weight;
        weight += 1;
        if weight > 9 {
            weight = 2;
        }
    }

    let dv = 11 - (sum % 11);
    Ok(match dv {
        0 | 1 | 10 | 11 => '0',
        d => char::from(b'0' + d as u8),
    })
}

/// `true` when `key` is 44 digits and its last digit matches the body.
pub fn verify(key: &str) -> bool {
    key.len() == KEY_LEN
        && key.is_char_boundary(BODY_LEN)
        && compute_check_digit(&key[..BODY_LEN])
            .is_ok_and(|dv| key[BODY_LEN..].starts_with(dv))
}

/// Invoice number carried in a raw key (characters 26–34, leading zeros
/// stripped). `None` when the string is too short to hold the field.
pub fn reference_number(key: &str) -> Option<String> {
    let field = key.get(nfe_key::NUMBER)?;
    Some(strip_leading_zeros(field))
}

fn strip_leading_zeros(s: &str) -> String {
    s.trim_start_matches('0')
        .to_string()
}

/// Keep digits only (`"12.345.678/0001-95"` → `"12345678000195"`).
pub fn digits_only(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_digit)
        .collect()
}

/// Left-pad a tax id to the 14-digit field width. Longer inputs are kept
/// as-is so the resulting body fails its length check instead of being
/// silently truncated.
pub fn pad_tax_id(tax_id: &str) -> String {
    format!("{tax_id:0>14}")
}

/// A validated 44-digit NFe access key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessKey(String);

impl AccessKey {
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let raw = raw.trim();
        if raw.len() != KEY_LEN {
            return Err(KeyError::InvalidLength { expected: KEY_LEN, actual: raw.chars().count() });
        }
        if let Some((position, found)) = raw
            .chars()
            .enumerate()
            .find(|(_, c)| !c.is_ascii_digit())
        {
            return Err(KeyError::NonDigit { position, found });
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn year_month(&self) -> &str {
        &self.0[nfe_key::YEAR_MONTH]
    }

    pub fn tax_id(&self) -> &str {
        &self.0[nfe_key::TAX_ID]
    }

    /// Raw 9-digit number field, zeros kept.
    pub fn number_field(&self) -> &str {
        &self.0[nfe_key::NUMBER]
    }

    /// Invoice number with leading zeros stripped.
    pub fn number(&self) -> String {
        strip_leading_zeros(self.number_field())
    }

    /// Rebuild with a new year-month and/or tax id. Every other field is
    /// carried over and a fresh check digit is computed over the new body.
    pub fn rebuild(&self, year_month: Option<&str>, tax_id: Option<&str>) -> Result<Self, KeyError> {
        let k = &self.0;
        let year_month = year_month.unwrap_or(self.year_month());
        let tax_id = pad_tax_id(tax_id.unwrap_or(self.tax_id()));

        let mut body = String::with_capacity(BODY_LEN);
        body.push_str(&k[nfe_key::STATE]);
        body.push_str(year_month);
        body.push_str(&tax_id);
        body.push_str(&k[nfe_key::MODEL]);
        body.push_str(&k[nfe_key::SERIES]);
        body.push_str(&k[nfe_key::NUMBER]);
        body.push_str(&k[nfe_key::EMISSION]);

        let dv = compute_check_digit(&body)?;
        body.push(dv);
        Ok(Self(body))
    }
}

impl fmt::Display for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rebuild a CTe `Id` with a new two-digit year and month. The embedded key
/// gets a fresh check digit.
pub fn rebuild_cte_id(id: &str, year: &str, month: &str) -> Result<String, KeyError> {
    if !id.starts_with(cte_id::PREFIX) || id.len() != cte_id::LEN || !id.is_ascii() {
        return Err(KeyError::Layout(id.to_string()));
    }
    let mut body = String::with_capacity(BODY_LEN);
    body.push_str(&id[cte_id::STATE]);
    body.push_str(year);
    body.push_str(month);
    body.push_str(&id[cte_id::TAX_ID]);
    body.push_str(&id[cte_id::REST]);
    let dv = compute_check_digit(&body)?;
    Ok(format!("{}{body}{dv}", cte_id::PREFIX))
}

/// Rebuild an inutilização `Id` with a new year and/or tax id.
pub fn rebuild_inut_id(id: &str, year: Option<&str>, tax_id: Option<&str>) -> Result<String, KeyError> {
    if !id.starts_with(inut_id::PREFIX) || id.len() != inut_id::LEN || !id.is_ascii() {
        return Err(KeyError::Layout(id.to_string()));
    }
    let year = year.unwrap_or(&id[inut_id::YEAR]);
    let tax_id = pad_tax_id(tax_id.unwrap_or(&id[inut_id::TAX_ID]));
    Ok(format!(
        "{}{}{}{}{}{}{}{}",
        inut_id::PREFIX,
        &id[inut_id::STATE],
        year,
        tax_id,
        &id[inut_id::MODEL],
        &id[inut_id::SERIES],
        &id[inut_id::RANGE_START],
        &id[inut_id::RANGE_END],
    ))
}
