//! The canonical output table: a header plus rows of text values.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VptsCsvError};
use crate::schema::{Column, ColumnData, SortType};

/// What to do with rows sharing the same measurement key across files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep every row; the source reference tells them apart.
    #[default]
    KeepAll,
    /// Keep the first row per key in concatenation order.
    KeepFirst,
}

/// Rows of the output schema, every value already rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VptsTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
enum SortValue<'a> {
    Str(&'a str),
    Int(i64),
    Float(f64),
}

impl SortValue<'_> {
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Str(a), SortValue::Str(b)) => a.cmp(b),
            (SortValue::Int(a), SortValue::Int(b)) => a.cmp(b),
            (SortValue::Float(a), SortValue::Float(b)) => a.total_cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl VptsTable {
    /// An empty table with the given header.
    pub fn new<S: Into<String>>(header: impl IntoIterator<Item = S>) -> Self {
        Self {
            header: header.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build rows from mapped columns, repeating scalars on every row.
    ///
    /// All series must have the same length; with no series at all the
    /// table has a single row.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let mut len = None;
        for column in &columns {
            if let ColumnData::Series(values) = &column.data {
                match len {
                    None => len = Some(values.len()),
                    Some(expected) if expected != values.len() => {
                        return Err(VptsCsvError::ColumnLength {
                            column: column.name.to_string(),
                            expected,
                            found: values.len(),
                        })
                    }
                    _ => {}
                }
            }
        }
        let len = len.unwrap_or(1);

        let header = columns.iter().map(|c| c.name.to_string()).collect();
        let rows = (0..len)
            .map(|i| {
                columns
                    .iter()
                    .map(|c| match &c.data {
                        ColumnData::Series(values) => values[i].clone(),
                        ColumnData::Scalar(value) => value.clone(),
                    })
                    .collect()
            })
            .collect();

        Ok(Self { header, rows })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Values of one column.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[index].as_str()).collect())
    }

    /// Append tables sharing one header. Tables without a header are skipped.
    pub fn concat(tables: impl IntoIterator<Item = VptsTable>) -> Result<Self> {
        let mut combined = VptsTable::default();
        for table in tables {
            if table.header.is_empty() {
                continue;
            }
            if combined.header.is_empty() {
                combined.header = table.header;
            } else if combined.header != table.header {
                return Err(VptsCsvError::HeaderMismatch(format!(
                    "[{}] vs [{}]",
                    combined.header.join(","),
                    table.header.join(",")
                )));
            }
            combined.rows.extend(table.rows);
        }
        Ok(combined)
    }

    /// Stable sort by typed key columns, in tie-break order.
    ///
    /// Every key value is cast to its declared type first; a value that
    /// does not cast is an error and leaves the table untouched.
    pub fn sort_by_keys(&mut self, keys: &[(&str, SortType)]) -> Result<()> {
        let mut indices = Vec::with_capacity(keys.len());
        for (name, ty) in keys {
            let index = self.column_index(name).ok_or_else(|| VptsCsvError::InvalidValue {
                column: name.to_string(),
                message: "sort column missing from table".to_string(),
            })?;
            indices.push((index, *ty));
        }

        let mut keyed = Vec::with_capacity(self.rows.len());
        for (position, row) in self.rows.iter().enumerate() {
            let mut key = Vec::with_capacity(indices.len());
            for (index, ty) in &indices {
                key.push(cast(&self.header[*index], &row[*index], *ty)?);
            }
            keyed.push((key, position));
        }
        keyed.sort_by(|(a, _), (b, _)| {
            a.iter()
                .zip(b.iter())
                .map(|(x, y)| x.compare(y))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        let order: Vec<usize> = keyed.into_iter().map(|(_, position)| position).collect();
        let mut rows: Vec<Option<Vec<String>>> = self.rows.drain(..).map(Some).collect();
        self.rows = order
            .into_iter()
            .filter_map(|position| rows[position].take())
            .collect();
        Ok(())
    }

    /// Apply a duplicate policy over the given key columns.
    pub fn dedupe(&mut self, policy: DuplicatePolicy, keys: &[&str]) {
        if policy == DuplicatePolicy::KeepAll {
            return;
        }
        let indices: Vec<usize> = keys.iter().filter_map(|k| self.column_index(k)).collect();
        let mut seen = HashSet::new();
        self.rows.retain(|row| {
            let key: Vec<String> = indices.iter().map(|i| row[*i].clone()).collect();
            seen.insert(key)
        });
    }

    /// Write as comma-delimited UTF-8 with a header row.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().from_writer(writer);
        writer.write_record(&self.header)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        Ok(buffer)
    }

    /// Write to a file, creating parent directories as needed.
    pub fn write_csv_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        self.write_csv(std::io::BufWriter::new(file))
    }

    /// Read a table written by [`VptsTable::write_csv`].
    pub fn read_csv<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let header = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }
        Ok(Self { header, rows })
    }
}

fn cast<'a>(column: &str, value: &'a str, ty: SortType) -> Result<SortValue<'a>> {
    let err = || VptsCsvError::SortCast {
        column: column.to_string(),
        value: value.to_string(),
        expected: ty.name(),
    };
    match ty {
        SortType::Str => Ok(SortValue::Str(value)),
        SortType::Int => value.trim().parse().map(SortValue::Int).map_err(|_| err()),
        SortType::Float => value.trim().parse().map(SortValue::Float).map_err(|_| err()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: [(&str, SortType); 4] = [
        ("radar", SortType::Str),
        ("datetime", SortType::Str),
        ("height", SortType::Int),
        ("source_file", SortType::Str),
    ];

    fn table(rows: &[[&str; 4]]) -> VptsTable {
        let mut table = VptsTable::new(["radar", "datetime", "height", "source_file"]);
        table.rows = rows
            .iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect();
        table
    }

    #[test]
    fn test_height_sorts_numerically() {
        let mut t = table(&[
            ["nosta", "2023-03-11T00:05:00Z", "1000", "a.h5"],
            ["nosta", "2023-03-11T00:05:00Z", "200", "a.h5"],
            ["nosta", "2023-03-11T00:00:00Z", "4000", "b.h5"],
        ]);
        t.sort_by_keys(&KEYS).unwrap();
        assert_eq!(t.column("height").unwrap(), vec!["4000", "200", "1000"]);
    }

    #[test]
    fn test_source_breaks_ties() {
        let mut t = table(&[
            ["nosta", "2023-03-11T00:05:00Z", "200", "b.h5"],
            ["nosta", "2023-03-11T00:05:00Z", "200", "a.h5"],
        ]);
        t.sort_by_keys(&KEYS).unwrap();
        assert_eq!(t.column("source_file").unwrap(), vec!["a.h5", "b.h5"]);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_sort_is_idempotent() {
        let mut t = table(&[
            ["nosta", "2023-03-11T00:05:00Z", "200", "b.h5"],
            ["bejab", "2023-03-11T00:05:00Z", "0", "c.h5"],
            ["nosta", "2023-03-11T00:00:00Z", "200", "a.h5"],
        ]);
        t.sort_by_keys(&KEYS).unwrap();
        let once = t.clone();
        t.sort_by_keys(&KEYS).unwrap();
        assert_eq!(t, once);
    }

    #[test]
    fn test_sort_cast_failure() {
        let mut t = table(&[["nosta", "2023-03-11T00:05:00Z", "high", "a.h5"]]);
        let err = t.sort_by_keys(&KEYS).unwrap_err();
        assert!(matches!(err, VptsCsvError::SortCast { ref column, .. } if column == "height"));
    }

    #[test]
    fn test_dedupe_policies() {
        let rows = [
            ["nosta", "2023-03-11T00:05:00Z", "200", "a.h5"],
            ["nosta", "2023-03-11T00:05:00Z", "200", "b.h5"],
        ];
        let mut keep_all = table(&rows);
        keep_all.dedupe(DuplicatePolicy::KeepAll, &["radar", "datetime", "height"]);
        assert_eq!(keep_all.len(), 2);

        let mut keep_first = table(&rows);
        keep_first.dedupe(DuplicatePolicy::KeepFirst, &["radar", "datetime", "height"]);
        assert_eq!(keep_first.column("source_file").unwrap(), vec!["a.h5"]);
    }

    #[test]
    fn test_concat_header_mismatch() {
        let a = table(&[["nosta", "2023-03-11T00:05:00Z", "200", "a.h5"]]);
        let b = VptsTable::new(["radar"]);
        assert!(VptsTable::concat([a.clone(), VptsTable::default()]).is_ok());
        assert!(matches!(
            VptsTable::concat([a, b]),
            Err(VptsCsvError::HeaderMismatch(_))
        ));
    }

    #[test]
    fn test_csv_roundtrip_keeps_empty_values() {
        let t = table(&[["nosta", "", "200", "s3://aloft/a.h5"]]);
        let bytes = t.to_csv_bytes().unwrap();
        assert_eq!(
            String::from_utf8(bytes.clone()).unwrap(),
            "radar,datetime,height,source_file\nnosta,,200,s3://aloft/a.h5\n"
        );
        assert_eq!(VptsTable::read_csv(bytes.as_slice()).unwrap(), t);
    }

    #[test]
    fn test_from_columns_broadcasts_scalars() {
        let t = VptsTable::from_columns(vec![
            Column::scalar("radar", "nosta"),
            Column::series("height", vec!["0".into(), "200".into()]),
        ])
        .unwrap();
        assert_eq!(t.rows(), &[vec!["nosta", "0"], vec!["nosta", "200"]]);

        let err = VptsTable::from_columns(vec![
            Column::series("height", vec!["0".into()]),
            Column::series("u", vec![]),
        ])
        .unwrap_err();
        assert!(matches!(err, VptsCsvError::ColumnLength { .. }));
    }
}
