//! Counterparty identifier validation on the business sheet.
//!
//! Rows whose identifier fails the registration grammar leave `b2b` and are
//! folded into consumer rows on `b2cs`, one per (place of supply, rate). The
//! taxable value moved at each rate is recorded in a [`ShiftLedger`] so the
//! classification-code sheet can be rebalanced afterwards.

use std::{collections::BTreeMap, sync::OnceLock};

use log::{debug, info, warn};
use regex::Regex;
use rust_decimal::Decimal;

use crate::{
    aggregate::normalize_place,
    data::{Cell, add_amounts},
    document::{Document, Sheet},
    error::ReconError,
    registry::{CONSUMER_FALLBACK_HEADERS, CategoryTag, ColumnIndex, ENGINE_RULES, Role},
};

pub const INVALID_IDENTIFIER: &str = "Invalid/Unregistered GSTIN";
pub const MOVED_TO_CONSUMER: &str = "Moved to B2C";
const OTHER_THAN_ECOMMERCE: &str = "OE";

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[0-9]{2}[A-Z]{5}[0-9]{4}[A-Z][1-9A-Z]Z[0-9A-Z]$")
            .expect("static identifier pattern compiles")
    })
}

/// Checks a registration number against the 15-character grammar after
/// trimming and upper-casing.
pub fn is_valid_identifier(value: &str) -> bool {
    identifier_pattern().is_match(&value.trim().to_uppercase())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReclassificationRecord {
    pub identifier: String,
    pub party_name: String,
    pub moved_from: CategoryTag,
    pub taxable_value: Decimal,
    pub rate: Decimal,
    pub place_of_supply: String,
    pub cess: Decimal,
}

impl ReclassificationRecord {
    pub fn error_type(&self) -> &'static str {
        INVALID_IDENTIFIER
    }

    pub fn action(&self) -> &'static str {
        MOVED_TO_CONSUMER
    }
}

/// Taxable value moved out of the business category, per rate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShiftLedger {
    shifts: BTreeMap<Decimal, Decimal>,
}

impl ShiftLedger {
    pub fn add(&mut self, rate: Decimal, amount: Decimal) -> Result<(), ReconError> {
        let entry = self.shifts.entry(rate.normalize()).or_default();
        *entry = add_amounts(*entry, amount, "Shifted taxable value")?;
        Ok(())
    }

    /// Builds a ledger from `(rate, amount)` pairs, merging repeated rates.
    pub fn from_shifts<I>(shifts: I) -> Result<Self, ReconError>
    where
        I: IntoIterator<Item = (Decimal, Decimal)>,
    {
        let mut ledger = ShiftLedger::default();
        for (rate, amount) in shifts {
            ledger.add(rate, amount)?;
        }
        Ok(ledger)
    }

    pub fn get(&self, rate: Decimal) -> Decimal {
        self.shifts.get(&rate).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Decimal, Decimal)> + '_ {
        self.shifts.iter().map(|(rate, amount)| (*rate, *amount))
    }

    pub fn total(&self) -> Result<Decimal, ReconError> {
        self.shifts
            .values()
            .try_fold(Decimal::ZERO, |sum, amount| add_amounts(sum, *amount, "Shifted taxable value"))
    }

    pub fn is_empty(&self) -> bool {
        self.shifts.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerBucket {
    pub place: String,
    pub rate: Decimal,
    pub taxable_value: Decimal,
    pub cess: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct ReclassifyOutcome {
    pub checked: usize,
    pub records: Vec<ReclassificationRecord>,
    /// In first-seen order.
    pub buckets: Vec<ConsumerBucket>,
    pub ledger: ShiftLedger,
}

impl ReclassifyOutcome {
    pub fn invalid(&self) -> usize {
        self.records.len()
    }

    pub fn moved(&self) -> usize {
        self.records.len()
    }

    fn add_to_bucket(
        &mut self,
        place: &str,
        rate: Decimal,
        taxable: Decimal,
        cess: Decimal,
    ) -> Result<(), ReconError> {
        match self
            .buckets
            .iter_mut()
            .find(|bucket| bucket.place == place && bucket.rate == rate)
        {
            Some(bucket) => {
                bucket.taxable_value = add_amounts(bucket.taxable_value, taxable, "Consumer taxable value")?;
                bucket.cess = add_amounts(bucket.cess, cess, "Consumer cess")?;
            }
            None => self.buckets.push(ConsumerBucket {
                place: place.to_string(),
                rate,
                taxable_value: taxable,
                cess,
            }),
        }
        Ok(())
    }
}

/// Validates every `b2b` identifier and moves failing rows to `b2cs`.
///
/// Totals are summed before any row moves, so an overflow leaves the
/// document untouched.
pub fn reclassify(document: &mut Document) -> Result<ReclassifyOutcome, ReconError> {
    let mut outcome = ReclassifyOutcome::default();
    let business = CategoryTag::B2b.sheet_name();
    let Some(sheet) = document.sheet_mut(business) else {
        warn!("No '{business}' sheet; identifier validation skipped");
        return Ok(outcome);
    };
    let index = ColumnIndex::resolve(&sheet.headers, ENGINE_RULES);
    let (Some(id_col), Some(taxable_col), Some(rate_col)) = (
        index.get(Role::Identifier),
        index.get(Role::TaxableValue),
        index.get(Role::Rate),
    ) else {
        warn!("Sheet '{business}' lacks identifier, taxable value or rate columns; validation skipped");
        return Ok(outcome);
    };
    let party_col = index.get(Role::PartyName);
    let place_col = index.get(Role::PlaceOfSupply);
    let cess_col = index.get(Role::Cess);

    let mut failing = Vec::new();
    for row in 0..sheet.rows.len() {
        let raw = sheet.cell(row, id_col);
        if raw.is_blank() {
            continue;
        }
        outcome.checked += 1;
        let identifier = raw.as_display().trim().to_uppercase();
        if is_valid_identifier(&identifier) {
            continue;
        }

        let party_name = party_col
            .map(|col| sheet.cell(row, col))
            .filter(|cell| !cell.is_blank())
            .map_or_else(|| identifier.clone(), Cell::as_display);
        let taxable_value = sheet.cell(row, taxable_col).as_decimal();
        let rate = sheet.cell(row, rate_col).as_decimal().normalize();
        let place = normalize_place(place_col.map(|col| sheet.cell(row, col)));
        let cess = cess_col.map_or(Decimal::ZERO, |col| sheet.cell(row, col).as_decimal());

        debug!("Identifier '{identifier}' on row {} is invalid; moving to consumer", row + 1);
        outcome.add_to_bucket(&place, rate, taxable_value, cess)?;
        outcome.ledger.add(rate, taxable_value)?;
        outcome.records.push(ReclassificationRecord {
            identifier,
            party_name,
            moved_from: CategoryTag::B2b,
            taxable_value,
            rate,
            place_of_supply: place,
            cess,
        });
        failing.push(row);
    }
    sheet.remove_rows(&failing);

    if !outcome.buckets.is_empty() {
        write_consumer_rows(document, &outcome.buckets);
    }
    info!(
        "✓ Checked {} identifier(s); {} moved to consumer",
        outcome.checked,
        outcome.moved()
    );
    Ok(outcome)
}

fn write_consumer_rows(document: &mut Document, buckets: &[ConsumerBucket]) {
    let consumer = CategoryTag::B2cs.sheet_name();
    let (sheet, created) = document.ensure_sheet(consumer);
    if created {
        warn!(
            "{}; created it for reclassified rows",
            ReconError::Schema {
                sheet: consumer.to_string()
            }
        );
    }
    if sheet.is_header_less() {
        sheet.headers = CONSUMER_FALLBACK_HEADERS.iter().map(|h| h.to_string()).collect();
    }
    let columns = ConsumerColumns::resolve(sheet);
    for bucket in buckets {
        let row = sheet.append_position();
        sheet.set_cell(row, columns.kind, Cell::text(OTHER_THAN_ECOMMERCE));
        sheet.set_cell(row, columns.place, Cell::text(bucket.place.clone()));
        sheet.set_cell(row, columns.rate, Cell::Number(bucket.rate));
        sheet.set_cell(row, columns.taxable, Cell::Number(bucket.taxable_value));
        sheet.set_cell(row, columns.cess, Cell::Number(bucket.cess));
    }
}

struct ConsumerColumns {
    kind: usize,
    place: usize,
    rate: usize,
    taxable: usize,
    cess: usize,
}

impl ConsumerColumns {
    /// Falls back to the standard consumer layout for any column not found.
    fn resolve(sheet: &Sheet) -> Self {
        let index = ColumnIndex::resolve(&sheet.headers, ENGINE_RULES);
        Self {
            kind: index.get(Role::SupplyType).unwrap_or(0),
            place: index.get(Role::PlaceOfSupply).unwrap_or(1),
            rate: index.get(Role::Rate).unwrap_or(2),
            taxable: index.get(Role::TaxableValue).unwrap_or(3),
            cess: index.get(Role::Cess).unwrap_or(4),
        }
    }
}
