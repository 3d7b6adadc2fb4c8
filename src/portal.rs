//! Read-only projection of a filing document into the portal's nested JSON
//! return format (version `V1.0`).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    data::{Cell, add_amounts},
    document::{Document, Sheet},
    error::ReconError,
    registry::{CategoryTag, ColumnIndex, PORTAL_RULES, Role},
};

pub const PORTAL_VERSION: &str = "V1.0";
const DEFAULT_SUPPLY_KIND: &str = "OE";
const DEFAULT_DESCRIPTION: &str = "Goods";
const DEFAULT_UNIT: &str = "OTH";
const DESCRIPTION_LIMIT: usize = 30;

/// Jurisdiction codes keyed by state name. Assembly strips the code prefix
/// from place-of-supply values, so the portal maps names back to codes.
const STATE_CODES: [(&str, &str); 38] = [
    ("JAMMU AND KASHMIR", "01"),
    ("HIMACHAL PRADESH", "02"),
    ("PUNJAB", "03"),
    ("CHANDIGARH", "04"),
    ("UTTARAKHAND", "05"),
    ("HARYANA", "06"),
    ("DELHI", "07"),
    ("RAJASTHAN", "08"),
    ("UTTAR PRADESH", "09"),
    ("BIHAR", "10"),
    ("SIKKIM", "11"),
    ("ARUNACHAL PRADESH", "12"),
    ("NAGALAND", "13"),
    ("MANIPUR", "14"),
    ("MIZORAM", "15"),
    ("TRIPURA", "16"),
    ("MEGHALAYA", "17"),
    ("ASSAM", "18"),
    ("WEST BENGAL", "19"),
    ("JHARKHAND", "20"),
    ("ODISHA", "21"),
    ("CHHATTISGARH", "22"),
    ("MADHYA PRADESH", "23"),
    ("GUJARAT", "24"),
    ("DAMAN AND DIU", "25"),
    ("DADRA AND NAGAR HAVELI AND DAMAN AND DIU", "26"),
    ("MAHARASHTRA", "27"),
    ("ANDHRA PRADESH (OLD)", "28"),
    ("KARNATAKA", "29"),
    ("GOA", "30"),
    ("LAKSHADWEEP", "31"),
    ("KERALA", "32"),
    ("TAMIL NADU", "33"),
    ("PUDUCHERRY", "34"),
    ("ANDAMAN AND NICOBAR ISLANDS", "35"),
    ("TELANGANA", "36"),
    ("ANDHRA PRADESH", "37"),
    ("LADAKH", "38"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalReturn {
    pub gstin: String,
    pub fp: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub gt: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub cur_gt: Decimal,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b2b: Option<Vec<PortalCounterparty>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b2cs: Option<Vec<PortalConsumerSupply>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hsn: Option<PortalHsn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalCounterparty {
    pub ctin: String,
    pub inv: Vec<PortalInvoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalInvoice {
    pub inum: String,
    pub idt: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub val: Decimal,
    pub pos: String,
    pub rchrg: String,
    pub inv_typ: String,
    pub itms: Vec<PortalItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalItem {
    pub num: usize,
    pub itm_det: PortalItemDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalItemDetail {
    #[serde(with = "rust_decimal::serde::float")]
    pub rt: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub txval: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub iamt: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub camt: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub samt: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub csamt: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalConsumerSupply {
    pub sply_ty: String,
    pub pos: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub rt: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub txval: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub csamt: Decimal,
    pub typ: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalHsn {
    pub data: Vec<PortalHsnLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalHsnLine {
    pub num: usize,
    pub hsn_sc: String,
    pub desc: String,
    pub uqc: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub qty: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub val: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub txval: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub iamt: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub camt: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub samt: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub csamt: Decimal,
}

/// Builds the portal return for `gstin` and filing period `period` (`MMYYYY`).
pub fn project(document: &Document, gstin: &str, period: &str) -> Result<PortalReturn, ReconError> {
    let sheet = |category: CategoryTag| document.sheet(category.sheet_name());
    let b2cs = match sheet(CategoryTag::B2cs) {
        Some(consumer) => project_consumer(consumer, gstin)?,
        None => None,
    };
    Ok(PortalReturn {
        gstin: gstin.to_string(),
        fp: period.to_string(),
        gt: Decimal::ZERO,
        cur_gt: Decimal::ZERO,
        version: PORTAL_VERSION.to_string(),
        b2b: sheet(CategoryTag::B2b).and_then(project_business),
        b2cs,
        hsn: sheet(CategoryTag::Hsn).and_then(project_codes),
    })
}

/// Column lookups for one sheet under the portal rules.
struct Columns<'a> {
    sheet: &'a Sheet,
    index: ColumnIndex,
}

impl<'a> Columns<'a> {
    fn new(sheet: &'a Sheet) -> Self {
        Self {
            sheet,
            index: ColumnIndex::resolve(&sheet.headers, PORTAL_RULES),
        }
    }

    fn cell(&self, row: usize, role: Role) -> Option<&'a Cell> {
        self.index.get(role).map(|col| self.sheet.cell(row, col))
    }

    fn text(&self, row: usize, role: Role) -> String {
        self.cell(row, role).map(Cell::as_display).unwrap_or_default()
    }

    fn amount(&self, row: usize, role: Role) -> Decimal {
        self.cell(row, role).map_or(Decimal::ZERO, Cell::as_decimal)
    }

    fn rows(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.sheet.rows.len()).filter(|&row| !self.sheet.row_is_blank(row))
    }
}

fn before_dash(text: &str) -> String {
    text.split('-').next().unwrap_or_default().trim().to_string()
}

fn squash(text: &str) -> String {
    text.to_uppercase()
        .replace('&', "AND")
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// `29-Karnataka` and `Karnataka` both become `29`. Unknown names pass
/// through unchanged.
pub fn place_code(text: &str) -> String {
    let head = before_dash(text);
    if head.is_empty() || head.chars().all(|c| c.is_ascii_digit()) {
        return head;
    }
    let key = squash(&head);
    STATE_CODES
        .iter()
        .find(|(name, _)| squash(name) == key)
        .map_or(head, |(_, code)| (*code).to_string())
}

/// `Regular` -> `R`, SEZ with/without payment -> `SEWP`/`SEWOP`,
/// deemed exports -> `DE`.
pub fn invoice_type_code(text: &str) -> &'static str {
    let upper = text.to_uppercase();
    if upper.contains("SEZ") {
        if upper.contains("WITHOUT") || upper.contains("WOP") {
            "SEWOP"
        } else {
            "SEWP"
        }
    } else if upper.contains("DEEMED") {
        "DE"
    } else {
        "R"
    }
}

fn project_business(sheet: &Sheet) -> Option<Vec<PortalCounterparty>> {
    let columns = Columns::new(sheet);
    columns.index.get(Role::Identifier)?;

    let mut parties: Vec<PortalCounterparty> = Vec::new();
    for row in columns.rows() {
        let ctin = columns.text(row, Role::Identifier).trim().to_uppercase();
        if ctin.is_empty() {
            continue;
        }
        let inum = match columns.cell(row, Role::InvoiceNumber) {
            Some(cell) => cell.as_display().trim().to_string(),
            None => "UNK".to_string(),
        };

        let party = match parties.iter().position(|p| p.ctin == ctin) {
            Some(idx) => &mut parties[idx],
            None => {
                parties.push(PortalCounterparty {
                    ctin: ctin.clone(),
                    inv: Vec::new(),
                });
                let last = parties.len() - 1;
                &mut parties[last]
            }
        };
        let invoice = match party.inv.iter().position(|inv| inv.inum == inum) {
            Some(idx) => &mut party.inv[idx],
            None => {
                party.inv.push(PortalInvoice {
                    idt: columns.text(row, Role::InvoiceDate),
                    val: columns.amount(row, Role::InvoiceValue),
                    pos: place_code(&columns.text(row, Role::PlaceOfSupply)),
                    rchrg: if columns.text(row, Role::ReverseCharge).to_uppercase().starts_with('Y') {
                        "Y".to_string()
                    } else {
                        "N".to_string()
                    },
                    inv_typ: invoice_type_code(&columns.text(row, Role::InvoiceType)).to_string(),
                    inum,
                    itms: Vec::new(),
                });
                let last = party.inv.len() - 1;
                &mut party.inv[last]
            }
        };
        invoice.itms.push(PortalItem {
            num: invoice.itms.len() + 1,
            itm_det: PortalItemDetail {
                rt: columns.amount(row, Role::Rate),
                txval: columns.amount(row, Role::TaxableValue),
                iamt: columns.amount(row, Role::Integrated),
                camt: columns.amount(row, Role::Central),
                samt: columns.amount(row, Role::State),
                csamt: columns.amount(row, Role::Cess),
            },
        });
    }
    Some(parties)
}

fn project_consumer(sheet: &Sheet, gstin: &str) -> Result<Option<Vec<PortalConsumerSupply>>, ReconError> {
    let columns = Columns::new(sheet);
    if !columns.index.has(Role::PlaceOfSupply) {
        return Ok(None);
    }
    let home_code = gstin.get(..2).unwrap_or_default();

    let mut supplies: Vec<PortalConsumerSupply> = Vec::new();
    for row in columns.rows() {
        let pos = place_code(&columns.text(row, Role::PlaceOfSupply));
        let typ = match columns.cell(row, Role::SupplyType) {
            Some(cell) if !cell.is_blank() => cell.as_display().to_uppercase(),
            _ => DEFAULT_SUPPLY_KIND.to_string(),
        };
        let rt = columns.amount(row, Role::Rate);
        let txval = columns.amount(row, Role::TaxableValue);
        let csamt = columns.amount(row, Role::Cess);

        match supplies
            .iter_mut()
            .find(|s| s.pos == pos && s.typ == typ && s.rt == rt)
        {
            Some(supply) => {
                supply.txval = add_amounts(supply.txval, txval, "b2cs txval")?;
                supply.csamt = add_amounts(supply.csamt, csamt, "b2cs csamt")?;
            }
            None => supplies.push(PortalConsumerSupply {
                sply_ty: if !gstin.is_empty() && pos != home_code {
                    "INTER".to_string()
                } else {
                    "INTRA".to_string()
                },
                pos,
                rt,
                txval,
                csamt,
                typ,
            }),
        }
    }
    for supply in &mut supplies {
        supply.txval = supply.txval.round_dp(2);
        supply.csamt = supply.csamt.round_dp(2);
    }
    Ok(Some(supplies))
}

fn project_codes(sheet: &Sheet) -> Option<PortalHsn> {
    let columns = Columns::new(sheet);
    columns.index.get(Role::Code)?;

    let data = columns
        .rows()
        .filter_map(|row| {
            let code = columns.text(row, Role::Code).trim().to_string();
            if code.is_empty() {
                return None;
            }
            let desc = match columns.cell(row, Role::Description) {
                Some(cell) if !cell.is_blank() => {
                    cell.as_display().chars().take(DESCRIPTION_LIMIT).collect()
                }
                _ => DEFAULT_DESCRIPTION.to_string(),
            };
            let uqc = match columns.cell(row, Role::Unit) {
                Some(cell) if !cell.is_blank() => before_dash(&cell.as_display()),
                _ => DEFAULT_UNIT.to_string(),
            };
            Some(PortalHsnLine {
                num: row + 1,
                hsn_sc: code,
                desc,
                uqc,
                qty: columns.amount(row, Role::Quantity),
                val: columns.amount(row, Role::TotalValue),
                txval: columns.amount(row, Role::TaxableValue),
                iamt: columns.amount(row, Role::Integrated),
                camt: columns.amount(row, Role::Central),
                samt: columns.amount(row, Role::State),
                csamt: columns.amount(row, Role::Cess),
            })
        })
        .collect();
    Some(PortalHsn { data })
}
