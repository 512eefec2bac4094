//! Parsing and rendering of the transactions CSV formats.
//!
//! Per-user schema, header literal `type,amount,date,category,subcategory,note`;
//! the admin schema adds a leading `username` column. `type` is an exact
//! `INCOME`/`EXPENSE` match, `amount` is plain decimal text, `date` is
//! `YYYY-MM-DD`, and an empty string means an absent optional field.

use csv::StringRecord;
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    Error,
    import_export::rows::{AdminTransactionRow, CsvRow},
    money::Amount,
    transaction::TransactionKind,
};

const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

const TRANSACTIONS_HEADER: [&str; 6] = ["type", "amount", "date", "category", "subcategory", "note"];
const ADMIN_HEADER: [&str; 7] = [
    "username",
    "type",
    "amount",
    "date",
    "category",
    "subcategory",
    "note",
];

/// Parse a per-user transactions CSV. The header row is skipped.
///
/// # Errors
/// This function will return an [Error::MissingCsvField] if a required column
/// is empty, or an [Error::InvalidCsv] if the document or a value cannot be
/// parsed.
pub fn parse_transactions_csv(text: &str) -> Result<Vec<CsvRow>, Error> {
    records(text)?
        .iter()
        .map(|record| {
            Ok(CsvRow {
                kind: parse_kind(required_field(record, 0, "type")?)?,
                amount: parse_amount(required_field(record, 1, "amount")?)?,
                date: parse_date(required_field(record, 2, "date")?)?,
                category: required_field(record, 3, "category")?.to_string(),
                subcategory: field(record, 4).map(str::to_string),
                note: field(record, 5).map(str::to_string),
            })
        })
        .collect()
}

/// Parse an admin (all users) transactions CSV. The header row is skipped.
///
/// # Errors
/// Same as [parse_transactions_csv], with `username` as an additional
/// required column.
pub fn parse_admin_transactions_csv(text: &str) -> Result<Vec<AdminTransactionRow>, Error> {
    records(text)?
        .iter()
        .map(|record| {
            Ok(AdminTransactionRow {
                username: required_field(record, 0, "username")?.to_string(),
                kind: parse_kind(required_field(record, 1, "type")?)?,
                amount: parse_amount(required_field(record, 2, "amount")?)?,
                date: parse_date(required_field(record, 3, "date")?)?,
                category: required_field(record, 4, "category")?.to_string(),
                subcategory: field(record, 5).map(str::to_string),
                note: field(record, 6).map(str::to_string),
            })
        })
        .collect()
}

/// Render per-user CSV rows, header included. Absent optional fields render
/// as empty strings and amounts as plain decimal text.
///
/// # Errors
/// This function will return an [Error::InvalidCsv] if a row cannot be
/// written.
pub fn write_transactions_csv(rows: &[CsvRow]) -> Result<String, Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    write_record(&mut writer, &TRANSACTIONS_HEADER)?;

    for row in rows {
        write_record(
            &mut writer,
            &[
                row.kind.as_str(),
                &row.amount.to_string(),
                &format_date(row.date)?,
                &row.category,
                row.subcategory.as_deref().unwrap_or(""),
                row.note.as_deref().unwrap_or(""),
            ],
        )?;
    }

    finish(writer)
}

/// Render admin CSV rows, header included.
///
/// # Errors
/// This function will return an [Error::InvalidCsv] if a row cannot be
/// written.
pub fn write_admin_transactions_csv(rows: &[AdminTransactionRow]) -> Result<String, Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    write_record(&mut writer, &ADMIN_HEADER)?;

    for row in rows {
        write_record(
            &mut writer,
            &[
                &row.username,
                row.kind.as_str(),
                &row.amount.to_string(),
                &format_date(row.date)?,
                &row.category,
                row.subcategory.as_deref().unwrap_or(""),
                row.note.as_deref().unwrap_or(""),
            ],
        )?;
    }

    finish(writer)
}

fn records(text: &str) -> Result<Vec<StringRecord>, Error> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes())
        .records()
        .map(|record| record.map_err(|error| Error::InvalidCsv(error.to_string())))
        .collect()
}

/// A trimmed field value, `None` when the column is missing or empty.
fn field<'r>(record: &'r StringRecord, index: usize) -> Option<&'r str> {
    record
        .get(index)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn required_field<'r>(
    record: &'r StringRecord,
    index: usize,
    name: &'static str,
) -> Result<&'r str, Error> {
    field(record, index).ok_or(Error::MissingCsvField(name))
}

fn parse_kind(text: &str) -> Result<TransactionKind, Error> {
    text.parse()
        .map_err(|error: Error| Error::InvalidCsv(error.to_string()))
}

fn parse_amount(text: &str) -> Result<Amount, Error> {
    text.parse()
        .map_err(|error: Error| Error::InvalidCsv(error.to_string()))
}

fn parse_date(text: &str) -> Result<Date, Error> {
    Date::parse(text, &DATE_FORMAT).map_err(|error| {
        Error::InvalidCsv(format!("could not parse \"{text}\" as a date: {error}"))
    })
}

fn format_date(date: Date) -> Result<String, Error> {
    date.format(&DATE_FORMAT)
        .map_err(|error| Error::InvalidCsv(format!("could not format date: {error}")))
}

fn write_record(writer: &mut csv::Writer<Vec<u8>>, fields: &[&str]) -> Result<(), Error> {
    writer
        .write_record(fields)
        .map_err(|error| Error::InvalidCsv(error.to_string()))
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, Error> {
    let bytes = writer
        .into_inner()
        .map_err(|error| Error::InvalidCsv(error.to_string()))?;

    String::from_utf8(bytes).map_err(|error| Error::InvalidCsv(error.to_string()))
}
