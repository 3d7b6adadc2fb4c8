use std::{fmt, str::FromStr, sync::OnceLock};

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ReconError;

/// A single typed cell of a [`crate::document::Sheet`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(Decimal),
    Date(NaiveDate),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.normalize().to_string(),
            Cell::Date(d) => d.format("%d-%m-%Y").to_string(),
        }
    }

    /// Reads the cell as an amount. Blank and non-numeric cells count as zero.
    pub fn as_decimal(&self) -> Decimal {
        match self {
            Cell::Number(n) => *n,
            Cell::Text(s) => parse_decimal(s).unwrap_or(Decimal::ZERO),
            _ => Decimal::ZERO,
        }
    }

    /// Text cells holding plain digits (with at most one `.`) become numbers.
    pub fn from_numeric_text(value: &str) -> Self {
        if value.is_empty() {
            return Cell::Empty;
        }
        if is_plain_number(value)
            && let Ok(parsed) = Decimal::from_str(value)
        {
            return Cell::Number(parsed);
        }
        Cell::Text(value.to_string())
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<Decimal> for Cell {
    fn from(value: Decimal) -> Self {
        Cell::Number(value)
    }
}

fn is_plain_number(value: &str) -> bool {
    let mut dots = 0usize;
    let mut digits = 0usize;
    for ch in value.chars() {
        match ch {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}

/// Parses an amount, tolerating thousands separators and surrounding spaces.
pub fn parse_decimal(value: &str) -> Option<Decimal> {
    let cleaned = value.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

fn overflow(total: &str) -> ReconError {
    ReconError::AmountOverflow {
        total: total.to_string(),
    }
}

/// `left + right`, failing instead of panicking past the decimal range.
pub fn add_amounts(left: Decimal, right: Decimal, total: &str) -> Result<Decimal, ReconError> {
    left.checked_add(right).ok_or_else(|| overflow(total))
}

pub fn sub_amounts(left: Decimal, right: Decimal, total: &str) -> Result<Decimal, ReconError> {
    left.checked_sub(right).ok_or_else(|| overflow(total))
}

pub fn mul_amounts(left: Decimal, right: Decimal, total: &str) -> Result<Decimal, ReconError> {
    left.checked_mul(right).ok_or_else(|| overflow(total))
}

fn abbreviated_date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d{1,2})-([A-Za-z]{3})-(\d{2})").expect("static date pattern compiles")
    })
}

/// Parses `DD-Mon-YY` exports such as `05-Apr-24`.
pub fn parse_abbreviated_date(value: &str) -> Option<NaiveDate> {
    let captures = abbreviated_date_pattern().captures(value)?;
    let candidate = format!("{}-{}-{}", &captures[1], &captures[2], &captures[3]);
    NaiveDate::parse_from_str(&candidate, "%d-%b-%y").ok()
}

/// Case- and whitespace-insensitive form of a column name.
pub fn normalize_column_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
