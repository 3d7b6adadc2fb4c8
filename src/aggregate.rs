//! Dashboard totals per category group.
//!
//! Sheets that carry explicit tax columns are summed as they are. Sheets
//! without them contribute an implicit tax of `taxable * rate / 100`, which
//! is split into local or cross-jurisdiction components once the home
//! jurisdiction has been inferred from the classification sheet.

use std::sync::OnceLock;

use log::{debug, info};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    data::{Cell, add_amounts, mul_amounts},
    document::{Document, Sheet},
    error::ReconError,
    registry::{ColumnIndex, ENGINE_RULES, Role},
};

pub const UNKNOWN_PLACE: &str = "UNKNOWN";
const CONSUMER_PRECISION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    B2b,
    B2c,
    Hsn,
    Cdnr,
}

impl Group {
    pub const ALL: [Group; 4] = [Group::B2b, Group::B2c, Group::Hsn, Group::Cdnr];

    pub fn label(&self) -> &'static str {
        match self {
            Group::B2b => "b2b",
            Group::B2c => "b2c",
            Group::Hsn => "hsn",
            Group::Cdnr => "cdnr",
        }
    }
}

/// Sheets feeding each group, in summation order.
const GROUP_SOURCES: &[(&str, Group)] = &[
    ("b2b", Group::B2b),
    ("b2cs", Group::B2c),
    ("b2cl", Group::B2c),
    ("hsn", Group::Hsn),
    ("cdnr", Group::Cdnr),
    ("cdnur", Group::Cdnr),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTotals {
    #[serde(with = "rust_decimal::serde::float")]
    pub taxable: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub igst: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub cgst: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub sgst: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub cess: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_tax: Decimal,
}

impl GroupTotals {
    fn rounded(self, dp: u32) -> Self {
        Self {
            taxable: self.taxable.round_dp(dp),
            igst: self.igst.round_dp(dp),
            cgst: self.cgst.round_dp(dp),
            sgst: self.sgst.round_dp(dp),
            cess: self.cess.round_dp(dp),
            total_tax: self.total_tax.round_dp(dp),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
    pub b2b: GroupTotals,
    pub b2c: GroupTotals,
    pub hsn: GroupTotals,
    pub cdnr: GroupTotals,
    /// Inferred home jurisdiction, when any implicit tax was apportioned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_place: Option<String>,
}

impl Dashboard {
    pub fn group(&self, group: Group) -> &GroupTotals {
        match group {
            Group::B2b => &self.b2b,
            Group::B2c => &self.b2c,
            Group::Hsn => &self.hsn,
            Group::Cdnr => &self.cdnr,
        }
    }

    fn group_mut(&mut self, group: Group) -> &mut GroupTotals {
        match group {
            Group::B2b => &mut self.b2b,
            Group::B2c => &mut self.b2c,
            Group::Hsn => &mut self.hsn,
            Group::Cdnr => &mut self.cdnr,
        }
    }
}

/// Implicit tax gathered for one place of supply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceBucket {
    pub place: String,
    pub total: Decimal,
    pub by_group: Vec<(Group, Decimal)>,
}

impl PlaceBucket {
    fn add(&mut self, group: Group, tax: Decimal) -> Result<(), ReconError> {
        self.total = add_amounts(self.total, tax, "Implicit tax")?;
        match self.by_group.iter_mut().find(|(g, _)| *g == group) {
            Some((_, amount)) => *amount = add_amounts(*amount, tax, "Implicit tax")?,
            None => self.by_group.push((group, tax)),
        }
        Ok(())
    }
}

fn place_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+[-\s]+").expect("static place pattern compiles"))
}

/// `29-Karnataka` -> `KARNATAKA`; blank or missing -> `UNKNOWN`.
pub fn normalize_place(cell: Option<&Cell>) -> String {
    let Some(cell) = cell.filter(|cell| !cell.is_blank()) else {
        return UNKNOWN_PLACE.to_string();
    };
    let text = cell.as_display();
    place_prefix().replace(&text, "").trim().to_uppercase()
}

/// Sums every group and apportions implicit tax.
pub fn aggregate(document: &Document) -> Result<Dashboard, ReconError> {
    let mut dashboard = Dashboard::default();
    let mut buckets: Vec<PlaceBucket> = Vec::new();
    for (name, group) in GROUP_SOURCES {
        if let Some(sheet) = document.sheet(name) {
            sum_sheet(sheet, *group, &mut dashboard, &mut buckets)?;
        }
    }

    if let Some(home) = infer_home(&buckets, dashboard.hsn.cgst) {
        debug!("Home jurisdiction inferred as '{home}'");
        for bucket in &buckets {
            let local = bucket.place == home;
            for (group, tax) in &bucket.by_group {
                let totals = dashboard.group_mut(*group);
                if local {
                    let half = *tax / Decimal::TWO;
                    totals.cgst = add_amounts(totals.cgst, half, "CGST")?;
                    totals.sgst = add_amounts(totals.sgst, half, "SGST")?;
                } else {
                    totals.igst = add_amounts(totals.igst, *tax, "IGST")?;
                }
            }
        }
        dashboard.home_place = Some(home);
    }

    for group in Group::ALL {
        let totals = dashboard.group_mut(group);
        let local = add_amounts(totals.cgst, totals.sgst, "Total tax")?;
        totals.total_tax = add_amounts(totals.igst, local, "Total tax")?;
    }
    dashboard.b2c = dashboard.b2c.rounded(CONSUMER_PRECISION);
    info!(
        "✓ Aggregated {} group(s); {} implicit place bucket(s)",
        Group::ALL.len(),
        buckets.len()
    );
    Ok(dashboard)
}

fn sum_sheet(
    sheet: &Sheet,
    group: Group,
    dashboard: &mut Dashboard,
    buckets: &mut Vec<PlaceBucket>,
) -> Result<(), ReconError> {
    let index = ColumnIndex::resolve(&sheet.headers, ENGINE_RULES);
    let explicit = index.has(Role::Central) || index.has(Role::Integrated);
    let value = |row: usize, role: Role| {
        index
            .get(role)
            .map_or(Decimal::ZERO, |col| sheet.cell(row, col).as_decimal())
    };

    for row in 0..sheet.rows.len() {
        if sheet.row_is_blank(row) {
            continue;
        }
        let taxable = value(row, Role::TaxableValue);
        let totals = dashboard.group_mut(group);
        totals.taxable = add_amounts(totals.taxable, taxable, "Taxable value")?;
        totals.cess = add_amounts(totals.cess, value(row, Role::Cess), "Cess")?;

        if explicit {
            totals.igst = add_amounts(totals.igst, value(row, Role::Integrated), "IGST")?;
            totals.cgst = add_amounts(totals.cgst, value(row, Role::Central), "CGST")?;
            totals.sgst = add_amounts(totals.sgst, value(row, Role::State), "SGST")?;
        } else {
            let tax = mul_amounts(taxable, value(row, Role::Rate), "Implicit tax")? / Decimal::ONE_HUNDRED;
            let place = normalize_place(index.get(Role::PlaceOfSupply).map(|col| sheet.cell(row, col)));
            match buckets.iter_mut().find(|bucket| bucket.place == place) {
                Some(bucket) => bucket.add(group, tax)?,
                None => {
                    let mut bucket = PlaceBucket {
                        place,
                        total: Decimal::ZERO,
                        by_group: Vec::new(),
                    };
                    bucket.add(group, tax)?;
                    buckets.push(bucket);
                }
            }
        }
    }
    Ok(())
}

/// The place whose half-tax is closest to the classification sheet's
/// central tax. The first place wins ties; a place whose distance is out of
/// the decimal range is never the closest.
pub fn infer_home(buckets: &[PlaceBucket], reference_cgst: Decimal) -> Option<String> {
    let mut best: Option<(&PlaceBucket, Decimal)> = None;
    for bucket in buckets {
        let Some(diff) = (bucket.total / Decimal::TWO).checked_sub(reference_cgst) else {
            continue;
        };
        let diff = diff.abs();
        if best.is_none_or(|(_, smallest)| diff < smallest) {
            best = Some((bucket, diff));
        }
    }
    best.map(|(bucket, _)| bucket.place.clone())
}
