use crate::cell::{RawCell, RawTable};
use crate::error::Result;
use csv::ReaderBuilder;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;

/// Hands out raw tables by name. Fetching them is the caller's business.
pub trait TableSource {
    fn table(&self, name: &str) -> Option<&RawTable>;
}

impl TableSource for BTreeMap<String, RawTable> {
    fn table(&self, name: &str) -> Option<&RawTable> {
        self.get(name)
    }
}

impl TableSource for HashMap<String, RawTable> {
    fn table(&self, name: &str) -> Option<&RawTable> {
        self.get(name)
    }
}

/// Reads a headerless CSV export into a ragged table. Every cell stays
/// text; normalization happens during extraction.
pub fn read_csv_table<R: Read>(reader: R) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let mut row: Vec<RawCell> = record
            .iter()
            .map(|field| RawCell::Text(field.to_string()))
            .collect();
        while matches!(row.last(), Some(RawCell::Text(s)) if s.is_empty()) {
            row.pop();
        }
        rows.push(row);
    }

    Ok(RawTable::new(rows))
}

/// Loads `<dir>/<name>.csv` for every name. A missing file becomes an empty
/// table so the pipeline treats it as "no data".
pub fn load_csv_tables<I, S>(dir: impl AsRef<Path>, names: I) -> Result<BTreeMap<String, RawTable>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let dir = dir.as_ref();
    let mut tables = BTreeMap::new();

    for name in names {
        let name = name.as_ref();
        let path = dir.join(format!("{}.csv", name));

        let table = if path.exists() {
            let file = std::fs::File::open(&path)?;
            let table = read_csv_table(file)?;
            debug!("Loaded '{}' from {} ({} rows)", name, path.display(), table.len());
            table
        } else {
            warn!("No CSV export for table '{}' at {}", name, path.display());
            RawTable::default()
        };

        tables.insert(name.to_string(), table);
    }

    Ok(tables)
}
