use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use tracing::debug;

pub const DEFAULT_ID_COLUMN: &str = "Prolific ID";
pub const DEFAULT_TARGET_COLUMN: &str = "HRV (ms)";

/// Target values per recording id, read from a participant lookup CSV.
#[derive(Debug, Clone)]
pub struct Lookup {
    pub target_column: String,
    /// `None` when the row exists but its target cell is blank or `NaN`.
    targets: HashMap<String, Option<f64>>,
}

impl Lookup {
    pub fn from_csv(path: &Path, id_column: &str, target_column: &str) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read lookup table {:?}", path))?;
        Self::parse(&text, id_column, target_column)
            .with_context(|| format!("malformed lookup table {:?}", path))
    }

    pub fn parse(text: &str, id_column: &str, target_column: &str) -> Result<Self> {
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());
        let header = lines.next().ok_or_else(|| anyhow!("lookup table is empty"))?;
        let header = split_record(header);
        let column = |name: &str| {
            header
                .iter()
                .position(|cell| cell == name)
                .ok_or_else(|| anyhow!("column {name:?} not found in {header:?}"))
        };
        let id_idx = column(id_column)?;
        let target_idx = column(target_column)?;

        let mut targets = HashMap::new();
        for (line_no, line) in lines.enumerate() {
            let record = split_record(line);
            let Some(id) = record.get(id_idx).map(|id| id.trim()) else {
                bail!("row {} has no {id_column:?} cell", line_no + 2);
            };
            if id.is_empty() {
                continue;
            }
            let target = record
                .get(target_idx)
                .map(|cell| cell.trim())
                .filter(|cell| !cell.is_empty())
                .map(|cell| {
                    cell.parse::<f64>().with_context(|| {
                        format!("row {}: {target_column:?} is not a number: {cell:?}", line_no + 2)
                    })
                })
                .transpose()?
                .filter(|value| value.is_finite());
            targets.insert(id.to_string(), target);
        }
        debug!(rows = targets.len(), "loaded lookup table");
        Ok(Self {
            target_column: target_column.to_string(),
            targets,
        })
    }

    pub fn target(&self, id: &str) -> Option<f64> {
        self.targets.get(id).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Split one CSV record, honouring double-quoted fields and `""` escapes.
pub(crate) fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();
    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => quoted = false,
            ('"', false) if field.is_empty() => quoted = true,
            (',', false) => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Quote a field when it would otherwise break the record.
pub(crate) fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
