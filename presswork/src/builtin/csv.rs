//! CSV data loader.

use serde_json::Value;

use crate::adapter::{AdapterError, AdapterFuture, DataLoader, DataPayload, DataSourceConfig, Row};
use crate::scope::Scope;

/// Loads row data from a CSV file.
///
/// Configuration: `path`, the file to read. The first record is the header;
/// every following record becomes one row keyed by header name. Values are
/// kept as strings. Quoted fields (RFC 4180 double quotes) are supported;
/// records shorter than the header are padded by pairing, longer ones are
/// truncated.
pub struct CsvLoader;

impl DataLoader for CsvLoader {
    fn load<'a>(
        &'a self,
        _scope: &'a Scope,
        cfg: &'a DataSourceConfig,
    ) -> AdapterFuture<'a, DataPayload> {
        Box::pin(async move {
            let path = cfg
                .get("path")
                .filter(|p| !p.is_empty())
                .ok_or_else(|| AdapterError::new("csv loader requires a path"))?;

            let contents = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| AdapterError::new(format!("failed to read {path}: {e}")))?;

            parse_csv(&contents)
        })
    }
}

fn parse_csv(contents: &str) -> Result<DataPayload, AdapterError> {
    let mut lines = contents.lines().filter(|line| !line.trim().is_empty());
    let Some(header_line) = lines.next() else {
        return Err(AdapterError::new("csv input is empty"));
    };
    let headers = split_record(header_line);

    let mut rows = Vec::new();
    for line in lines {
        let fields = split_record(line);
        let mut row = Row::with_capacity(headers.len());
        for (header, field) in headers.iter().zip(fields) {
            row.insert(header.clone(), Value::String(field));
        }
        rows.push(row);
    }
    Ok(DataPayload::from_rows(rows))
}

/// Splits one CSV record, honoring double-quoted fields and `""` escapes.
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}
