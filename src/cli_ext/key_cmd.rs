//! `nfk key`: compute or verify an access-key check digit.

use anyhow::Result;
use owo_colors::OwoColorize;
use tracing::instrument;

use crate::cli::{AppContext, KeyArgs};
use crate::fiscal::key::{BODY_LEN, KEY_LEN, KeyError, compute_check_digit, digits_only};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyCheck
{
    /// 43-digit body in, full key out
    Computed
    {
        key: String,
        digit: char,
    },
    Valid,
    Invalid
    {
        expected: char,
        found: char,
    },
}

/// Masks and spaces are dropped before counting digits.
pub fn check(input: &str) -> Result<KeyCheck, KeyError>
{
    let digits = digits_only(input);
    match digits.len()
    {
        BODY_LEN =>
        {
            let digit = compute_check_digit(&digits)?;
            Ok(KeyCheck::Computed { key: format!("{digits}{digit}"), digit })
        }
        KEY_LEN =>
        {
            let (body, tail) = digits.split_at(BODY_LEN);
            let expected = compute_check_digit(body)?;
            let found = tail
                .chars()
                .next()
                .unwrap_or('?');
            if expected == found
            {
                Ok(KeyCheck::Valid)
            }
            else
            {
                Ok(KeyCheck::Invalid { expected, found })
            }
        }
        actual => Err(KeyError::InvalidLength { expected: BODY_LEN, actual }),
    }
}

#[instrument(skip(ctx))]
pub fn run(
    args: KeyArgs,
    ctx: &AppContext,
) -> Result<()>
{
    match check(&args.digits)?
    {
        KeyCheck::Computed { key, digit } =>
        {
            if ctx.quiet
            {
                println!("{digit}");
            }
            else
            {
                println!("{} check digit {digit}", ctx.paint("✓", |s| s.green().to_string()));
                println!("{key}");
            }
            Ok(())
        }
        KeyCheck::Valid =>
        {
            if !ctx.quiet
            {
                println!("{} valid key", ctx.paint("✓", |s| s.green().to_string()));
            }
            Ok(())
        }
        KeyCheck::Invalid { expected, found } =>
        {
            anyhow::bail!("check digit mismatch: expected {expected}, found {found}")
        }
    }
}
