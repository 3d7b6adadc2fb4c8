//! Static category, field and column registry.
//!
//! Everything here is read-only for the lifetime of the process:
//!
//! - [`CategoryTag`] is the closed set of filing categories, each tied to a
//!   sheet name and a [`WriteMode`].
//! - [`ColumnMapping`] translates between export column names (the headers
//!   of an ingested CSV), canonical [`Field`]s, and document column names.
//! - [`ColumnRule`] sets resolve a sheet header row once into a typed
//!   [`ColumnIndex`], used by the verification passes and the portal
//!   projection.

use std::{collections::HashMap, fmt};

use crate::data::normalize_column_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CategoryTag {
    B2b,
    B2cl,
    B2cs,
    Export,
    NilExempt,
    Cdnr,
    Cdnur,
    AdvanceTax,
    AdvanceAdjusted,
    DocsIssued,
    Hsn,
}

/// How the assembler merges a category into its sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Append,
    /// Overwrite existing template rows matched on their description.
    Match,
}

impl CategoryTag {
    pub const ALL: [CategoryTag; 11] = [
        CategoryTag::B2b,
        CategoryTag::B2cl,
        CategoryTag::B2cs,
        CategoryTag::Export,
        CategoryTag::NilExempt,
        CategoryTag::Cdnr,
        CategoryTag::Cdnur,
        CategoryTag::AdvanceTax,
        CategoryTag::AdvanceAdjusted,
        CategoryTag::DocsIssued,
        CategoryTag::Hsn,
    ];

    pub fn sheet_name(&self) -> &'static str {
        match self {
            CategoryTag::B2b => "b2b",
            CategoryTag::B2cl => "b2cl",
            CategoryTag::B2cs => "b2cs",
            CategoryTag::Export => "export",
            CategoryTag::NilExempt => "Nil_exempt_NonGST",
            CategoryTag::Cdnr => "cdnr",
            CategoryTag::Cdnur => "cdnur",
            CategoryTag::AdvanceTax => "adv_tax",
            CategoryTag::AdvanceAdjusted => "adv_tax_adjusted",
            CategoryTag::DocsIssued => "Docs_issued",
            CategoryTag::Hsn => "hsn",
        }
    }

    pub fn write_mode(&self) -> WriteMode {
        match self {
            CategoryTag::NilExempt => WriteMode::Match,
            _ => WriteMode::Append,
        }
    }

    pub fn from_sheet_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.sheet_name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for CategoryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sheet_name())
    }
}

/// Canonical record fields shared across categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    CounterpartyId,
    ReceiverName,
    InvoiceNumber,
    InvoiceDate,
    InvoiceValue,
    Rate,
    TaxableValue,
    Cess,
    PlaceOfSupply,
    ReverseCharge,
    InvoiceType,
    EcommerceId,
    SupplyType,
    ExportType,
    PortCode,
    ShippingBillNumber,
    ShippingBillDate,
    Description,
    NilRated,
    Exempted,
    NonGst,
    NoteNumber,
    NoteDate,
    NoteType,
    NoteSupplyType,
    NoteValue,
    UnregisteredType,
    AdvanceReceived,
    AdvanceAdjusted,
    DocumentNature,
    SeriesFrom,
    SeriesTo,
    TotalNumber,
    Cancelled,
    NetIssued,
    CodeType,
    Code,
    UnitCode,
    TotalQuantity,
    TotalValue,
    IntegratedTax,
    CentralTax,
    StateTax,
}

/// Value rewrite applied when a field is written into a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    None,
    /// `27-Maharashtra` -> `Maharashtra`
    PlaceOfSupply,
    /// `Regular B2B` -> `Regular`
    InvoiceType,
    /// `Y`/`N` -> `Yes`/`No`
    YesNo,
    /// `05-Apr-24` -> date cell
    Date,
}

impl Field {
    pub fn transform(&self) -> Transform {
        match self {
            Field::PlaceOfSupply => Transform::PlaceOfSupply,
            Field::InvoiceType | Field::NoteSupplyType => Transform::InvoiceType,
            Field::ReverseCharge => Transform::YesNo,
            Field::InvoiceDate | Field::ShippingBillDate | Field::NoteDate => Transform::Date,
            _ => Transform::None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    pub field: Field,
    /// Accepted export header names, preferred spelling first.
    pub sources: &'static [&'static str],
    /// Column name in the filing document.
    pub column: &'static str,
}

const fn map(field: Field, sources: &'static [&'static str], column: &'static str) -> FieldMapping {
    FieldMapping {
        field,
        sources,
        column,
    }
}

const B2B: &[FieldMapping] = &[
    map(Field::CounterpartyId, &["GSTIN/UIN of Recipient"], "GSTIN/UIN"),
    map(Field::ReceiverName, &["Receiver Name"], "Receiver Name"),
    map(Field::InvoiceNumber, &["Invoice Number"], "Invoice No"),
    map(Field::InvoiceDate, &["Invoice date"], "Date of Invoice"),
    map(Field::InvoiceValue, &["Invoice Value"], "Invoice Value"),
    map(Field::Rate, &["Rate"], "GST%"),
    map(Field::TaxableValue, &["Taxable Value"], "Taxable Value"),
    map(Field::Cess, &["Cess Amount"], "CESS"),
    map(Field::PlaceOfSupply, &["Place Of Supply"], "Place Of Supply"),
    map(Field::ReverseCharge, &["Reverse Charge"], "RCM Applicable"),
    map(Field::InvoiceType, &["Invoice Type"], "Invoice Type"),
    map(Field::EcommerceId, &["E-Commerce GSTIN"], "E-Commerce GSTIN"),
];

const B2CL: &[FieldMapping] = &[
    map(Field::InvoiceNumber, &["Invoice Number"], "Invoice No"),
    map(Field::InvoiceDate, &["Invoice date"], "Date of Invoice"),
    map(Field::InvoiceValue, &["Invoice Value"], "Invoice Value"),
    map(Field::PlaceOfSupply, &["Place Of Supply"], "Place Of Supply"),
    map(Field::Rate, &["Rate"], "GST%"),
    map(Field::TaxableValue, &["Taxable Value"], "Taxable Value"),
    map(Field::Cess, &["Cess Amount"], "CESS"),
    map(Field::EcommerceId, &["E-Commerce GSTIN"], "E-Commerce GSTIN"),
];

const B2CS: &[FieldMapping] = &[
    map(Field::SupplyType, &["Type"], "Type"),
    map(Field::PlaceOfSupply, &["Place Of Supply"], "Place Of Supply"),
    map(Field::Rate, &["Rate"], "GST%"),
    map(Field::TaxableValue, &["Taxable Value"], "Taxable Value"),
    map(Field::Cess, &["Cess Amount"], "CESS"),
    map(Field::EcommerceId, &["E-Commerce GSTIN"], "E-Commerce GSTIN"),
];

const EXPORT: &[FieldMapping] = &[
    map(Field::ExportType, &["Export Type"], "Export Type"),
    map(Field::InvoiceNumber, &["Invoice Number"], "Invoice No"),
    map(Field::InvoiceDate, &["Invoice date"], "Date of Invoice"),
    map(Field::InvoiceValue, &["Invoice Value"], "Invoice Value"),
    map(Field::PortCode, &["Port Code"], "Port Code"),
    map(Field::ShippingBillNumber, &["Shipping Bill Number"], "Shipping Bill No"),
    map(Field::ShippingBillDate, &["Shipping Bill Date"], "Shipping Bill Date"),
    map(Field::Rate, &["Rate"], "GST%"),
    map(Field::TaxableValue, &["Taxable Value"], "Taxable Value"),
];

const NIL_EXEMPT: &[FieldMapping] = &[
    map(Field::Description, &["Description"], "Description"),
    map(Field::NilRated, &["Nil Rated Supplies"], "Nil Rated Supplies"),
    map(
        Field::Exempted,
        &["Exempted (other than nil rated/non GST supply)"],
        "Exempted(other than nil rated/non GST supply)",
    ),
    map(Field::NonGst, &["Non-GST supplies"], "Non-GST Supplies"),
];

const CDNR: &[FieldMapping] = &[
    map(Field::CounterpartyId, &["GSTIN/UIN of Recipient"], "GSTIN/UIN"),
    map(Field::NoteNumber, &["Note Number"], "Dr./ Cr. No."),
    map(Field::NoteDate, &["Note Date"], "Dr./Cr. Date"),
    map(Field::NoteType, &["Note Type"], "Type of note                (Dr/ Cr)"),
    map(Field::PlaceOfSupply, &["Place Of Supply"], "Place of supply"),
    map(Field::ReverseCharge, &["Reverse Charge"], "RCM"),
    map(Field::NoteSupplyType, &["Note Supply Type"], "Invoice Type"),
    map(Field::NoteValue, &["Note Value"], "Dr./Cr. Value"),
    map(Field::Rate, &["Rate"], "GST%"),
    map(Field::TaxableValue, &["Taxable Value"], "Taxable Value"),
    map(Field::Cess, &["Cess Amount"], "CESS"),
];

const CDNUR: &[FieldMapping] = &[
    map(Field::UnregisteredType, &["UR Type"], "Supply Type"),
    map(Field::NoteNumber, &["Note/Refund Voucher Number"], "Dr./ Cr. Note No."),
    map(Field::NoteDate, &["Note/Refund Voucher date"], "Dr./ Cr. Note Date"),
    map(Field::NoteType, &["Document Type"], "Type of note (Dr./ Cr.)"),
    map(Field::PlaceOfSupply, &["Place Of Supply"], "Place of supply"),
    map(Field::NoteValue, &["Note/Refund Voucher Value"], "Dr./Cr. Note Value"),
    map(Field::Rate, &["Rate"], "GST%"),
    map(Field::TaxableValue, &["Taxable Value"], "Taxable Value"),
    map(Field::Cess, &["Cess Amount"], "CESS"),
];

const ADVANCE_TAX: &[FieldMapping] = &[
    map(Field::PlaceOfSupply, &["Place Of Supply"], "Place Of Supply"),
    map(Field::Rate, &["Rate"], "GST%"),
    map(Field::AdvanceReceived, &["Gross Advance Received"], "Gross Advance Received"),
    map(Field::Cess, &["Cess Amount"], "CESS"),
];

const ADVANCE_ADJUSTED: &[FieldMapping] = &[
    map(Field::PlaceOfSupply, &["Place Of Supply"], "Place Of Supply"),
    map(Field::Rate, &["Rate"], "GST%"),
    map(Field::AdvanceAdjusted, &["Gross Advance Adjusted"], "Gross Advance Adjusted"),
    map(Field::Cess, &["Cess Amount"], "CESS"),
];

const DOCS_ISSUED: &[FieldMapping] = &[
    map(
        Field::DocumentNature,
        &["Nature of Document", "Type of Document"],
        "Nature of Document",
    ),
    map(
        Field::SeriesFrom,
        &["Sr.No.From", "Sr. No. From", "Series From"],
        "Sr. No. From",
    ),
    map(Field::SeriesTo, &["Sr.No.To", "Sr. No. To", "Series To"], "Sr. No. To"),
    map(Field::TotalNumber, &["Total Number"], "Total Number"),
    map(Field::Cancelled, &["Cancelled"], "Cancelled"),
    map(Field::NetIssued, &["Net Issued"], "Net Issued"),
];

const HSN: &[FieldMapping] = &[
    map(Field::CodeType, &["Type"], "Type"),
    map(Field::Code, &["HSN"], "HSN"),
    map(Field::Description, &["Description"], "Description"),
    map(Field::UnitCode, &["UQC"], "UQC"),
    map(Field::TotalQuantity, &["Total Quantity"], "Total Quantity"),
    map(Field::TotalValue, &["Total Value"], "Total Value"),
    map(Field::Rate, &["Rate"], "Rate"),
    map(Field::TaxableValue, &["Taxable Value"], "Total Taxable Value"),
    map(Field::IntegratedTax, &["Integrated Tax Amount"], "IGST"),
    map(Field::CentralTax, &["Central Tax Amount"], "CGST"),
    map(Field::StateTax, &["State/UT Tax Amount"], "SGST"),
    map(Field::Cess, &["Cess Amount"], "CESS"),
];

/// Pre-filled descriptions of the nil/exempt template sheet.
pub const NIL_EXEMPT_DESCRIPTIONS: &[&str] = &[
    "Inter-State supplies to registered persons",
    "Intra-State supplies to registered persons",
    "Inter-State supplies to unregistered persons",
    "Intra-State supplies to unregistered persons",
];

/// Consumer sheet header used when reclassified rows land on an empty sheet.
pub const CONSUMER_FALLBACK_HEADERS: &[&str] = &[
    "Type",
    "Place Of Supply",
    "Rate",
    "Taxable Value",
    "Cess Amount",
    "E-Commerce GSTIN",
];

#[derive(Debug, Clone, Copy)]
pub struct ColumnMapping {
    pub category: CategoryTag,
    entries: &'static [FieldMapping],
}

impl ColumnMapping {
    pub fn entries(&self) -> &'static [FieldMapping] {
        self.entries
    }

    pub fn column_for(&self, field: Field) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|entry| entry.field == field)
            .map(|entry| entry.column)
    }

    pub fn field_for_source(&self, name: &str) -> Option<Field> {
        let wanted = normalize_column_name(name);
        self.entries
            .iter()
            .find(|entry| {
                entry
                    .sources
                    .iter()
                    .any(|source| normalize_column_name(source) == wanted)
            })
            .map(|entry| entry.field)
    }

    pub fn field_for_column(&self, name: &str) -> Option<Field> {
        let wanted = normalize_column_name(name);
        self.entries
            .iter()
            .find(|entry| normalize_column_name(entry.column) == wanted)
            .map(|entry| entry.field)
    }

    /// Document columns in template order.
    pub fn template_headers(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.column).collect()
    }
}

pub fn mapping_for(category: CategoryTag) -> ColumnMapping {
    let entries = match category {
        CategoryTag::B2b => B2B,
        CategoryTag::B2cl => B2CL,
        CategoryTag::B2cs => B2CS,
        CategoryTag::Export => EXPORT,
        CategoryTag::NilExempt => NIL_EXEMPT,
        CategoryTag::Cdnr => CDNR,
        CategoryTag::Cdnur => CDNUR,
        CategoryTag::AdvanceTax => ADVANCE_TAX,
        CategoryTag::AdvanceAdjusted => ADVANCE_ADJUSTED,
        CategoryTag::DocsIssued => DOCS_ISSUED,
        CategoryTag::Hsn => HSN,
    };
    ColumnMapping { category, entries }
}

/// Maps an export filename to its category.
///
/// Tokens are tried in a fixed order so that `B2CL` is never read as `B2C`,
/// `CDNUR` never as `CDNR`, and `ATADJ` never as `AT`.
pub fn detect_category(filename_hint: &str) -> Option<CategoryTag> {
    let upper = filename_hint.to_uppercase();
    let has = |token: &str| upper.contains(token);
    if has("HSN") {
        Some(CategoryTag::Hsn)
    } else if has("B2B") {
        Some(CategoryTag::B2b)
    } else if has("B2CL") {
        Some(CategoryTag::B2cl)
    } else if has("B2CS") {
        Some(CategoryTag::B2cs)
    } else if has("EXP") {
        Some(CategoryTag::Export)
    } else if has("EXEMP") {
        Some(CategoryTag::NilExempt)
    } else if has("CDNR") && !has("CDNUR") {
        Some(CategoryTag::Cdnr)
    } else if has("CDNUR") {
        Some(CategoryTag::Cdnur)
    } else if has("ATADJ") {
        Some(CategoryTag::AdvanceAdjusted)
    } else if has("AT") {
        Some(CategoryTag::AdvanceTax)
    } else if has("DOC") {
        Some(CategoryTag::DocsIssued)
    } else {
        None
    }
}

/// Semantic role of a sheet column, independent of its exact header text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Identifier,
    PartyName,
    InvoiceNumber,
    InvoiceDate,
    InvoiceValue,
    PlaceOfSupply,
    ReverseCharge,
    InvoiceType,
    Rate,
    TaxableValue,
    TotalValue,
    Integrated,
    Central,
    State,
    Cess,
    SupplyType,
    Code,
    Description,
    Unit,
    Quantity,
}

/// A header matches when it contains any `any_of` token and no `none_of`
/// token (upper-cased substring comparison).
#[derive(Debug, Clone, Copy)]
pub struct ColumnRule {
    pub role: Role,
    pub any_of: &'static [&'static str],
    pub none_of: &'static [&'static str],
}

impl ColumnRule {
    fn matches(&self, upper_header: &str) -> bool {
        self.any_of.iter().any(|token| upper_header.contains(token))
            && !self.none_of.iter().any(|token| upper_header.contains(token))
    }
}

const fn rule(role: Role, any_of: &'static [&'static str]) -> ColumnRule {
    ColumnRule {
        role,
        any_of,
        none_of: &[],
    }
}

/// Rules used by the verification and aggregation passes. Later rules for
/// the same role act as fallbacks.
pub const ENGINE_RULES: &[ColumnRule] = &[
    rule(Role::Identifier, &["GSTIN"]),
    rule(Role::PartyName, &["NAME", "RECEIVER"]),
    rule(Role::Rate, &["RATE", "GST%"]),
    rule(Role::TaxableValue, &["TAXABLE"]),
    rule(Role::TaxableValue, &["TOTAL VALUE"]),
    rule(Role::PlaceOfSupply, &["PLACE OF SUPPLY"]),
    rule(Role::Integrated, &["IGST", "INTEGRATED"]),
    rule(Role::Central, &["CGST", "CENTRAL"]),
    ColumnRule {
        role: Role::State,
        any_of: &["SGST", "STATE"],
        none_of: &["CESS"],
    },
    rule(Role::Cess, &["CESS"]),
    rule(Role::SupplyType, &["TYPE"]),
    rule(Role::Code, &["HSN"]),
];

/// Looser rules used by the portal projection.
pub const PORTAL_RULES: &[ColumnRule] = &[
    rule(Role::Identifier, &["GSTIN"]),
    rule(Role::InvoiceNumber, &["INVOICE NUMBER", "INVOICE NO"]),
    rule(Role::InvoiceDate, &["INVOICE DATE", "DATE"]),
    rule(Role::InvoiceValue, &["INVOICE VALUE"]),
    rule(Role::PlaceOfSupply, &["PLACE OF SUPPLY"]),
    rule(Role::ReverseCharge, &["REVERSE CHARGE", "RCM"]),
    rule(Role::InvoiceType, &["INVOICE TYPE"]),
    rule(Role::Rate, &["RATE", "GST%"]),
    rule(Role::TaxableValue, &["TAXABLE VALUE"]),
    rule(Role::TotalValue, &["TOTAL VALUE"]),
    rule(Role::Integrated, &["IGST"]),
    rule(Role::Central, &["CGST"]),
    rule(Role::State, &["SGST"]),
    rule(Role::Cess, &["CESS"]),
    rule(Role::SupplyType, &["TYPE"]),
    rule(Role::Code, &["HSN"]),
    rule(Role::Description, &["DESCRIPTION"]),
    rule(Role::Unit, &["UQC"]),
    rule(Role::Quantity, &["QUANTITY"]),
];

/// A sheet header resolved once into role -> column position.
#[derive(Debug, Clone, Default)]
pub struct ColumnIndex {
    columns: HashMap<Role, usize>,
}

impl ColumnIndex {
    pub fn resolve(headers: &[String], rules: &[ColumnRule]) -> Self {
        let upper = headers
            .iter()
            .map(|header| header.trim().to_uppercase())
            .collect::<Vec<_>>();
        let mut columns = HashMap::new();
        for rule in rules {
            if columns.contains_key(&rule.role) {
                continue;
            }
            if let Some(position) = upper.iter().position(|header| rule.matches(header)) {
                columns.insert(rule.role, position);
            }
        }
        Self { columns }
    }

    pub fn get(&self, role: Role) -> Option<usize> {
        self.columns.get(&role).copied()
    }

    pub fn has(&self, role: Role) -> bool {
        self.columns.contains_key(&role)
    }
}
