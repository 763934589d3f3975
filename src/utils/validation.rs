use crate::utils::error::{CommonsError, Result};
use std::collections::HashSet;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

const ILLEGAL_MAP_CHARS: &[char] = &['/', '"', '\'', '@', ',', '=', '*', '~'];

/// Checks a raster or vector name the host will accept as a new map.
pub fn validate_map_name(field_name: &str, name: &str) -> Result<()> {
    validate_non_empty_string(field_name, name)?;

    if name.starts_with('.') {
        return Err(CommonsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: name.to_string(),
            reason: "Map names cannot start with '.'".to_string(),
        });
    }

    if let Some(bad) = name
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || ILLEGAL_MAP_CHARS.contains(c))
    {
        return Err(CommonsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: name.to_string(),
            reason: format!("Character '{}' is not allowed in map names", bad.escape_default()),
        });
    }

    Ok(())
}

/// Like [`validate_map_name`] but accepts a `name@mapset` reference to an existing map.
pub fn validate_map_reference(field_name: &str, reference: &str) -> Result<()> {
    match reference.split_once('@') {
        Some((name, mapset)) => {
            validate_map_name(field_name, name)?;
            validate_map_name(field_name, mapset)
        }
        None => validate_map_name(field_name, reference),
    }
}

pub fn validate_column_name(field_name: &str, column: &str) -> Result<()> {
    validate_non_empty_string(field_name, column)?;

    if !column
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(CommonsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: column.to_string(),
            reason: "Column names may only contain letters, digits and '_'".to_string(),
        });
    }

    Ok(())
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(CommonsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(CommonsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(CommonsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_positive_finite(field_name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CommonsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value must be a positive number".to_string(),
        });
    }
    Ok(())
}

pub fn validate_distinct(field_name: &str, values: &[&str]) -> Result<()> {
    let mut seen = HashSet::new();
    for value in values {
        if !seen.insert(*value) {
            return Err(CommonsError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: value.to_string(),
                reason: "Each column can only be used once".to_string(),
            });
        }
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| CommonsError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CommonsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}
