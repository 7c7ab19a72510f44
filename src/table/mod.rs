//! Turns stored feature directories into delimited training tables.
//!
//! Every directory of the store that holds feature files becomes one table
//! with a row per recording id. Vector features are flattened into columns and
//! shorter rows are zero-padded to the widest one. The lookup table supplies
//! the target (HRV) column that leads every written row.

pub mod lookup;

use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::store::{load_feature, FEATURE_EXTENSION};

pub use lookup::{Lookup, DEFAULT_ID_COLUMN, DEFAULT_TARGET_COLUMN};
use lookup::escape_field;

/// Flattened features of one directory, one row per recording id.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub name: String,
    pub columns: Vec<String>,
    /// `(id, values)` sorted by id; every row is `columns.len()` wide.
    pub rows: Vec<(String, Vec<f64>)>,
}

impl FeatureTable {
    pub fn from_directory(dir: &Path, name: impl Into<String>) -> Result<Self> {
        let mut rows = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("failed to list {:?}", dir))? {
            let path = entry
                .with_context(|| format!("failed to list {:?}", dir))?
                .path();
            if !is_feature_file(&path) {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                warn!(path = %path.display(), "skipping feature with a non UTF-8 name");
                continue;
            };
            let feature = load_feature(&path)?;
            rows.push((id.to_string(), feature.flatten()));
        }
        Ok(Self::from_rows(name, rows))
    }

    /// Build a table from ragged rows, zero-padding to the widest.
    pub fn from_rows(name: impl Into<String>, mut rows: Vec<(String, Vec<f64>)>) -> Self {
        let width = rows.iter().map(|(_, values)| values.len()).max().unwrap_or(0);
        for (_, values) in rows.iter_mut() {
            values.resize(width, 0.0);
        }
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        Self {
            name: name.into(),
            columns: (0..width).map(|i| i.to_string()).collect(),
            rows,
        }
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Inner join on id; `other`'s columns follow ours.
    ///
    /// Clashing column names get `_x` / `_y` suffixes.
    pub fn join(&self, other: &FeatureTable) -> FeatureTable {
        let theirs: HashMap<&str, &Vec<f64>> = other
            .rows
            .iter()
            .map(|(id, values)| (id.as_str(), values))
            .collect();

        let rows = self
            .rows
            .iter()
            .filter_map(|(id, values)| {
                theirs.get(id.as_str()).map(|extra| {
                    let mut joined = values.clone();
                    joined.extend(extra.iter().copied());
                    (id.clone(), joined)
                })
            })
            .collect();

        let clashes = |name: &String, others: &[String]| others.contains(name);
        let left = self.columns.iter().map(|c| {
            if clashes(c, &other.columns[..]) {
                format!("{c}_x")
            } else {
                c.clone()
            }
        });
        let right = other.columns.iter().map(|c| {
            if clashes(c, &self.columns[..]) {
                format!("{c}_y")
            } else {
                c.clone()
            }
        });

        FeatureTable {
            name: format!("{}+{}", self.name, other.name),
            columns: left.chain(right).collect(),
            rows,
        }
    }

    /// Put the lookup target in front of each row, drop rows without one and drop the id.
    pub fn attach_target(&self, lookup: &Lookup) -> CompiledTable {
        let mut header = Vec::with_capacity(self.width() + 1);
        header.push(lookup.target_column.clone());
        header.extend(self.columns.iter().cloned());

        let rows = self
            .rows
            .iter()
            .filter_map(|(id, values)| {
                lookup.target(id).map(|target| {
                    let mut row = Vec::with_capacity(values.len() + 1);
                    row.push(target);
                    row.extend(values.iter().copied());
                    row
                })
            })
            .collect();
        CompiledTable {
            name: self.name.clone(),
            header,
            rows,
        }
    }
}

/// Target-first table ready to be written out.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTable {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl CompiledTable {
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {:?}", parent))?;
        }
        let file =
            fs::File::create(path).with_context(|| format!("failed to create {:?}", path))?;
        let mut writer = BufWriter::new(file);
        let header: Vec<String> = self.header.iter().map(|h| escape_field(h)).collect();
        writeln!(writer, "{}", header.join(","))?;
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writeln!(writer, "{}", cells.join(","))?;
        }
        writer
            .flush()
            .with_context(|| format!("failed to write {:?}", path))?;
        Ok(())
    }
}

/// Directories under `root` that directly contain feature files, sorted.
pub fn feature_directories(root: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .filter(|entry| {
            fs::read_dir(entry.path())
                .map(|mut children| {
                    children.any(|child| child.map(|c| is_feature_file(&c.path())).unwrap_or(false))
                })
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();
    dirs.sort();
    dirs
}

/// `hfd/kmax=5/norm=true` under `root` becomes `hfd_kmax=5_norm=true`.
pub fn table_name(root: &Path, dir: &Path) -> String {
    let relative = dir.strip_prefix(root).unwrap_or(dir);
    let name = relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("_");
    if name.is_empty() {
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "features".to_string())
    } else {
        name
    }
}

/// Compile every feature directory under `root` into `<out_dir>/<name>.csv`.
///
/// With `pair_with`, every directory of `root` is joined with every directory
/// of the second store instead and written as `<a>+<b>.csv`.
pub fn compile_features(
    root: &Path,
    lookup: &Lookup,
    out_dir: &Path,
    pair_with: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    let load = |base: &Path| -> Result<Vec<FeatureTable>> {
        feature_directories(base)
            .iter()
            .map(|dir| FeatureTable::from_directory(dir, table_name(base, dir)))
            .collect()
    };

    let tables = load(root)?;
    let combined: Vec<FeatureTable> = match pair_with {
        None => tables,
        Some(other_root) => {
            let others = load(other_root)?;
            tables
                .iter()
                .flat_map(|a| others.iter().map(move |b| a.join(b)))
                .collect()
        }
    };

    let total = combined.len();
    let mut written = Vec::with_capacity(total);
    for (index, table) in combined.iter().enumerate() {
        let compiled = table.attach_target(lookup);
        if compiled.rows.is_empty() {
            warn!(table = %table.name, "no recording matched a lookup target");
        }
        let path = out_dir.join(format!("{}.csv", table.name));
        compiled.write_csv(&path)?;
        info!(
            table = %table.name,
            rows = compiled.rows.len(),
            columns = compiled.header.len(),
            progress = %format!("{}/{}", index + 1, total),
            "compiled feature table"
        );
        written.push(path);
    }
    Ok(written)
}

fn is_feature_file(path: &Path) -> bool {
    path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(FEATURE_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, rows: &[(&str, &[f64])]) -> FeatureTable {
        FeatureTable::from_rows(
            name,
            rows.iter()
                .map(|(id, values)| (id.to_string(), values.to_vec()))
                .collect(),
        )
    }

    #[test]
    fn pads_short_rows_with_zeros() {
        let t = table("stft", &[("b", &[1.0]), ("a", &[1.0, 2.0, 3.0])]);
        assert_eq!(t.columns, vec!["0", "1", "2"]);
        assert_eq!(t.rows[0], ("a".to_string(), vec![1.0, 2.0, 3.0]));
        assert_eq!(t.rows[1], ("b".to_string(), vec![1.0, 0.0, 0.0]));
    }

    #[test]
    fn join_keeps_shared_ids_and_suffixes_columns() {
        let a = table("hfd", &[("p1", &[1.0]), ("p2", &[2.0])]);
        let b = table("dfa", &[("p2", &[0.5]), ("p3", &[0.7])]);
        let joined = a.join(&b);
        assert_eq!(joined.name, "hfd+dfa");
        assert_eq!(joined.columns, vec!["0_x", "0_y"]);
        assert_eq!(joined.rows, vec![("p2".to_string(), vec![2.0, 0.5])]);
    }

    #[test]
    fn target_leads_and_missing_targets_drop() {
        let lookup = Lookup::parse(
            "Prolific ID,HRV (ms)\np1,40\np2,\n",
            DEFAULT_ID_COLUMN,
            DEFAULT_TARGET_COLUMN,
        )
        .unwrap();
        let t = table("hfd", &[("p1", &[1.1]), ("p2", &[1.2]), ("p9", &[1.3])]);
        let compiled = t.attach_target(&lookup);
        assert_eq!(compiled.header, vec!["HRV (ms)", "0"]);
        assert_eq!(compiled.rows, vec![vec![40.0, 1.1]]);
    }

    #[test]
    fn names_follow_relative_path() {
        let root = Path::new("/store");
        assert_eq!(
            table_name(root, Path::new("/store/hfd/kmax=5/norm=true")),
            "hfd_kmax=5_norm=true"
        );
    }
}
