use anyhow::{Context, Result};

use crate::{document::Document, io_utils, reclassify::ReclassificationRecord};

pub const ERROR_REPORT_HEADER: [&str; 6] = [
    "GSTIN",
    "Party Name",
    "Error Type",
    "Taxable Value",
    "Rate",
    "Action",
];

/// CSV listing every reclassified record. Header only when there are none.
pub fn error_report(records: &[ReclassificationRecord]) -> Result<Vec<u8>> {
    let mut writer = io_utils::open_buffer_writer();
    writer
        .write_record(ERROR_REPORT_HEADER)
        .context("Writing error report header")?;
    for record in records {
        let taxable = record.taxable_value.normalize().to_string();
        let rate = record.rate.normalize().to_string();
        writer
            .write_record([
                record.identifier.as_str(),
                record.party_name.as_str(),
                record.error_type(),
                taxable.as_str(),
                rate.as_str(),
                record.action(),
            ])
            .with_context(|| format!("Writing error report row for '{}'", record.identifier))?;
    }
    io_utils::finish_buffer(writer)
}

pub fn document_bytes(document: &Document) -> Result<Vec<u8>> {
    document.to_bytes().context("Encoding corrected document")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CategoryTag;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[test]
    fn empty_report_is_header_only() {
        let bytes = error_report(&[]).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "GSTIN,Party Name,Error Type,Taxable Value,Rate,Action\n"
        );
    }

    #[test]
    fn report_rows_quote_embedded_commas() {
        let record = ReclassificationRecord {
            identifier: "1234".into(),
            party_name: "Rao, Sons".into(),
            moved_from: CategoryTag::B2b,
            taxable_value: dec!(500.00),
            rate: dec!(18),
            place_of_supply: "MAHARASHTRA".into(),
            cess: Decimal::ZERO,
        };
        let text = String::from_utf8(error_report(&[record]).unwrap()).unwrap();
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(
            lines[1],
            "1234,\"Rao, Sons\",Invalid/Unregistered GSTIN,500,18,Moved to B2C"
        );
    }
}
