//! CSV reader/writer construction and text decoding.
//!
//! Ingested exports arrive as in-memory text and outputs are produced as byte
//! buffers for the storage layer, so the helpers here work over slices and
//! `Vec<u8>` rather than file handles. Inputs may carry a leading byte-order
//! marker and may be in a non-UTF-8 encoding; both are handled before the
//! text reaches the CSV reader.

use std::io::Read;

use anyhow::{Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_DELIMITER: u8 = b',';
const BYTE_ORDER_MARK: char = '\u{feff}';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text)
}

pub fn open_csv_reader<R>(reader: R, has_headers: bool) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(has_headers)
        .delimiter(DEFAULT_DELIMITER)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

/// Writer over an in-memory buffer, quoting only where needed so the
/// report header stays a plain comma-joined line.
pub fn open_buffer_writer() -> csv::Writer<Vec<u8>> {
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(DEFAULT_DELIMITER)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    builder.from_writer(Vec::new())
}

pub fn finish_buffer(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|err| anyhow!("Flushing CSV buffer: {}", err.error()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_bom_only_removes_leading_marker() {
        assert_eq!(strip_bom("\u{feff}a,b"), "a,b");
        assert_eq!(strip_bom("a,\u{feff}b"), "a,\u{feff}b");
    }

    #[test]
    fn decode_bytes_handles_latin1() {
        let encoding = resolve_encoding(Some("latin1")).unwrap();
        let decoded = decode_bytes(&[0x63, 0x61, 0x66, 0xE9], encoding).unwrap();
        assert_eq!(decoded, "café");
        assert!(resolve_encoding(Some("klingon")).is_err());
    }

    #[test]
    fn buffer_writer_quotes_only_when_needed() {
        let mut writer = open_buffer_writer();
        writer.write_record(["a", "b,c"]).unwrap();
        let bytes = finish_buffer(writer).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "a,\"b,c\"\n");
    }
}
