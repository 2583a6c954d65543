//! Positional parsing of `--format=csv,noheader,nounits` rows.
//!
//! A row is addressed through the same field list that was used to build the
//! query, so a field is always read from the position it was requested at.

use crate::error::{ExporterError, Result};
use std::str::FromStr;
use tracing::debug;

/// Separator between fields in tool output.
pub const FIELD_SEPARATOR: &str = ", ";

/// Literal the tool prints for an asserted boolean state.
pub const ACTIVE_SENTINEL: &str = "Active";

/// Non-blank lines of raw tool output.
pub fn data_lines(output: &str) -> impl Iterator<Item = &str> {
    output.lines().filter(|line| !line.trim().is_empty())
}

/// Parse a numeric reading; anything unparsable becomes `NaN`.
pub fn to_float(field: &str) -> f64 {
    field.trim().parse::<f64>().unwrap_or(f64::NAN)
}

/// `true` iff the field is exactly the active sentinel.
pub fn is_active(field: &str) -> bool {
    field == ACTIVE_SENTINEL
}

/// One row split against a fixed schema.
#[derive(Debug, Clone)]
pub struct CsvRecord<'a> {
    schema: &'static [&'static str],
    fields: Vec<&'a str>,
}

impl<'a> CsvRecord<'a> {
    /// Split `line` and check it carries at least one value per schema field.
    /// Extra trailing fields are ignored.
    pub fn parse(line: &'a str, schema: &'static [&'static str]) -> Result<Self> {
        let fields: Vec<&'a str> = line.split(FIELD_SEPARATOR).map(str::trim).collect();

        if fields.len() < schema.len() {
            return Err(too_few_fields(line, schema));
        }
        if fields.len() > schema.len() {
            debug!(
                expected = schema.len(),
                found = fields.len(),
                line,
                "ignoring trailing fields"
            );
        }

        Ok(Self { schema, fields })
    }

    /// Split `line` where one free-text field may itself contain the
    /// separator. Fields before `free_field` are taken from the left, fields
    /// after it from the right, and whatever remains is `free_field`.
    pub fn parse_with_free_field(
        line: &'a str,
        schema: &'static [&'static str],
        free_field: &str,
    ) -> Result<Self> {
        let position = schema
            .iter()
            .position(|name| *name == free_field)
            .ok_or_else(|| ExporterError::record_parse(format!("field {free_field:?} is not in the query schema")))?;

        let mut left = line.splitn(position + 1, FIELD_SEPARATOR);
        let mut fields: Vec<&'a str> = Vec::with_capacity(schema.len());
        for _ in 0..position {
            match left.next() {
                Some(field) => fields.push(field.trim()),
                None => return Err(too_few_fields(line, schema)),
            }
        }
        let rest = left.next().ok_or_else(|| too_few_fields(line, schema))?;

        let trailing = schema.len() - position - 1;
        let mut right: Vec<&'a str> = rest.rsplitn(trailing + 1, FIELD_SEPARATOR).collect();
        if right.len() < trailing + 1 {
            return Err(too_few_fields(line, schema));
        }
        right.reverse();
        fields.extend(right.into_iter().map(str::trim));

        Ok(Self { schema, fields })
    }

    /// Raw fields in positional order.
    pub fn fields(&self) -> &[&'a str] {
        &self.fields
    }

    fn position(&self, field: &str) -> Result<usize> {
        self.schema
            .iter()
            .position(|name| *name == field)
            .ok_or_else(|| ExporterError::record_parse(format!("field {field:?} is not in the query schema")))
    }

    /// Field as text.
    pub fn text(&self, field: &str) -> Result<&'a str> {
        Ok(self.fields[self.position(field)?])
    }

    /// Field as a float, `NaN` when unparsable.
    pub fn float(&self, field: &str) -> Result<f64> {
        self.text(field).map(to_float)
    }

    /// Field as a boolean derived from the active sentinel.
    pub fn flag(&self, field: &str) -> Result<bool> {
        self.text(field).map(is_active)
    }

    /// Field as a strictly parsed value; failure rejects the row.
    pub fn parsed<T: FromStr>(&self, field: &str) -> Result<T> {
        let raw = self.text(field)?;
        raw.parse::<T>()
            .map_err(|_| ExporterError::record_parse(format!("field {field:?} has invalid value {raw:?}")))
    }
}

fn too_few_fields(line: &str, schema: &[&str]) -> ExporterError {
    ExporterError::record_parse(format!(
        "expected {} fields, found {} in {:?}",
        schema.len(),
        line.split(FIELD_SEPARATOR).count(),
        line
    ))
}
