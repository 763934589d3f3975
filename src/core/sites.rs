use crate::config::SiteColumns;
use crate::domain::model::{Site, SiteRow};
use crate::utils::error::{CommonsError, Result};
use csv::{ReaderBuilder, Trim};
use std::collections::HashSet;

/// Splits an attribute dump into site rows. The first line is the header and
/// is dropped; the remaining rows keep their order.
pub fn parse_site_rows(dump: &str, separator: char) -> Result<Vec<SiteRow>> {
    let mut buf = [0u8; 4];
    let delimiter = separator.encode_utf8(&mut buf).as_bytes();
    if delimiter.len() != 1 {
        return Err(CommonsError::InvalidConfigValueError {
            field: "separator".to_string(),
            value: separator.to_string(),
            reason: "Separator must be a single-byte character".to_string(),
        });
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter[0])
        .trim(Trim::All)
        .from_reader(dump.trim().as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let fields: Vec<String> = record.iter().map(str::to_string).collect();
        let row: SiteRow = fields.try_into().map_err(|fields: Vec<String>| {
            CommonsError::SiteParseError {
                row: rows.len() + 1,
                column: "*".to_string(),
                message: format!("expected 4 fields, found {}", fields.len()),
            }
        })?;
        rows.push(row);
    }

    Ok(rows)
}

/// Converts rows to typed sites. `index` is the 1-based row position.
pub fn sites_from_rows(rows: &[SiteRow], columns: &SiteColumns) -> Result<Vec<Site>> {
    let mut names = HashSet::new();
    let mut sites = Vec::with_capacity(rows.len());

    for (position, row) in rows.iter().enumerate() {
        let index = position + 1;
        let [x, y, importance, name] = row;

        let x = parse_number(index, &columns.x, x)?;
        let y = parse_number(index, &columns.y, y)?;
        let importance = parse_number(index, &columns.importance, importance)?;
        if importance < 0.0 {
            return Err(CommonsError::SiteParseError {
                row: index,
                column: columns.importance.clone(),
                message: format!("importance cannot be negative ({})", importance),
            });
        }

        if name.is_empty() {
            return Err(CommonsError::SiteParseError {
                row: index,
                column: columns.name.clone(),
                message: "empty site name".to_string(),
            });
        }
        if !names.insert(name.as_str()) {
            return Err(CommonsError::DuplicateSiteError { name: name.clone() });
        }

        sites.push(Site {
            index,
            name: name.clone(),
            x,
            y,
            importance,
        });
    }

    Ok(sites)
}

fn parse_number(row: usize, column: &str, raw: &str) -> Result<f64> {
    let value = raw
        .parse::<f64>()
        .map_err(|_| CommonsError::SiteParseError {
            row,
            column: column.to_string(),
            message: if raw.is_empty() {
                "missing value".to_string()
            } else {
                format!("'{}' is not a number", raw)
            },
        })?;

    if !value.is_finite() {
        return Err(CommonsError::SiteParseError {
            row,
            column: column.to_string(),
            message: format!("'{}' is not a finite number", raw),
        });
    }
    Ok(value)
}
