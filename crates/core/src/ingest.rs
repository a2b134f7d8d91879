use csv::ReaderBuilder;

use crate::domain::customer::{CustomerId, CustomerProfile, CustomerRecord};
use crate::errors::DomainError;

pub const FIRST_NAME_HEADER: &str = "First Name";
pub const PREVIEW_CHARS: usize = 100;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedCustomers {
    /// Whether the header row carries a `First Name` column. When it does not,
    /// no rows are read and nothing is written to the store.
    pub header_present: bool,
    pub records: Vec<CustomerRecord>,
}

/// Reads customer rows from CSV text.
///
/// The first line is the header. Data rows map positionally onto
/// [`CustomerProfile`] and take their 1-based line number below the header
/// as identifier. Quoted fields may contain commas and newlines; ragged rows
/// are accepted as-is. Blank lines produce no record but still count toward
/// the numbering of later rows.
pub fn parse_customers(content: &str) -> Result<ParsedCustomers, DomainError> {
    let mut reader =
        ReaderBuilder::new().has_headers(true).flexible(true).from_reader(content.as_bytes());

    let header_present = reader
        .headers()
        .map_err(|error| DomainError::MalformedCsv(error.to_string()))?
        .iter()
        .any(|header| header == FIRST_NAME_HEADER);

    if !header_present {
        return Ok(ParsedCustomers::default());
    }

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.map_err(|error| DomainError::MalformedCsv(error.to_string()))?;
        // The header sits on line 1, so a record starting on line N is row N - 1.
        let row_number = row
            .position()
            .and_then(|position| usize::try_from(position.line().saturating_sub(1)).ok())
            .unwrap_or(index + 1);
        records.push(CustomerRecord {
            id: CustomerId::from_row_number(row_number),
            profile: CustomerProfile::from_positional(row.iter()),
        });
    }

    Ok(ParsedCustomers { header_present, records })
}

/// Object bodies are decoded as UTF-8, replacing invalid sequences.
pub fn decode_content(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// First `max_chars` characters of `content`, cut on a character boundary.
pub fn content_preview(content: &str, max_chars: usize) -> &str {
    content.char_indices().nth(max_chars).map(|(offset, _)| &content[..offset]).unwrap_or(content)
}
