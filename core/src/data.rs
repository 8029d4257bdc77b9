//! Data artifacts: tables for CSV output and arbitrary serde values for the JSON blob.

use std::{
    fmt,
    fs::File,
    io::{self, Write},
    path::Path,
    str::FromStr,
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Default format for [`ConfigStore::save_data`](crate::ConfigStore::save_data).
pub const DEFAULT_DATA_FORMAT: &str = "json";

/// On-disk encodings understood by the data operations.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DataFormat {
    /// Any [`Data`] value as a JSON document.
    Json,
    /// A [`Table`] as comma separated values with a header row.
    Csv,
}

impl DataFormat {
    pub const EXPECTED: &'static str = "json, csv";

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

impl FromStr for DataFormat {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(StoreError::UnsupportedFormat {
                format: other.to_string(),
                expected: Self::EXPECTED,
            }),
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One table cell.
///
/// CSV carries no types, so cells read back from CSV are inferred in the order
/// empty, boolean, integer, float, text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    fn parse(field: &str) -> Self {
        if field.is_empty() {
            return Self::Empty;
        }
        match field {
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => {}
        }
        if let Ok(value) = field.parse::<i64>() {
            return Self::Int(value);
        }
        if let Ok(value) = field.parse::<f64>() {
            return Self::Float(value);
        }
        Self::Text(field.to_string())
    }

    fn to_field(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Bool(value) => value.to_string(),
            Self::Int(value) => value.to_string(),
            // Debug keeps the fractional part so 1.0 does not read back as an integer.
            Self::Float(value) => format!("{value:?}"),
            Self::Text(value) => value.clone(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A rectangular table with named columns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TableShape")]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TableShape {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl TryFrom<TableShape> for Table {
    type Error = String;

    fn try_from(shape: TableShape) -> std::result::Result<Self, Self::Error> {
        let width = shape.columns.len();
        if let Some(index) = shape.rows.iter().position(|row| row.len() != width) {
            return Err(format!(
                "row {index} has {} cells but the table has {width} columns",
                shape.rows[index].len()
            ));
        }
        Ok(Self {
            columns: shape.columns,
            rows: shape.rows,
        })
    }
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row, rejecting it if its width differs from the header.
    pub fn push_row<I, C>(&mut self, row: I) -> Result<()>
    where
        I: IntoIterator<Item = C>,
        C: Into<Cell>,
    {
        let row: Vec<Cell> = row.into_iter().map(Into::into).collect();
        if row.len() != self.columns.len() {
            return Err(StoreError::InvalidTable(format!(
                "row {} has {} cells but the table has {} columns",
                self.rows.len(),
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cells of the named column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let index = self.columns.iter().position(|column| column == name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    pub(crate) fn write_csv(&self, path: &Path, delimiter: u8) -> Result<()> {
        let file = File::create(path).map_err(|err| StoreError::io(path, err))?;
        self.write_csv_to(file, delimiter)
    }

    fn write_csv_to<W: io::Write>(&self, writer: W, delimiter: u8) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(writer);
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(Cell::to_field))?;
        }
        writer
            .flush()
            .map_err(|err| StoreError::Csv(csv::Error::from(err)))?;
        Ok(())
    }

    pub(crate) fn read_csv(path: &Path, delimiter: u8) -> Result<Self> {
        let file = File::open(path).map_err(|err| StoreError::io(path, err))?;
        Self::read_csv_from(file, delimiter)
    }

    fn read_csv_from<R: io::Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_reader(reader);
        let mut table = Self::new(reader.headers()?.iter());
        for record in reader.records() {
            let record = record?;
            table.push_row(record.iter().map(Cell::parse))?;
        }
        Ok(table)
    }
}

/// A value that can be stored as a data artifact.
///
/// The JSON form carries no wrapper. A table is written as
/// `{"columns": [...], "rows": [[...], ...]}` and any other document is kept as a
/// plain value, so JSON produced by other tools loads as [`Data::Value`]. A document
/// with exactly the `columns` and `rows` keys of a rectangular table loads as
/// [`Data::Table`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Data {
    Table(Table),
    Value(serde_json::Value),
}

impl Data {
    /// Capture any serializable value.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::Value(serde_json::to_value(value)?))
    }

    /// Convert back into a typed value. Tables deserialize from their
    /// `{ columns, rows }` representation.
    pub fn deserialize_into<T: DeserializeOwned>(self) -> Result<T> {
        let value = match self {
            Self::Table(table) => serde_json::to_value(table)?,
            Self::Value(value) => value,
        };
        Ok(serde_json::from_value(value)?)
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(table) => Some(table),
            Self::Value(_) => None,
        }
    }

    pub fn into_table(self) -> Option<Table> {
        match self {
            Self::Table(table) => Some(table),
            Self::Value(_) => None,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Table(_) => "a table",
            Self::Value(serde_json::Value::Array(_)) => "a list",
            Self::Value(serde_json::Value::Object(_)) => "a mapping",
            Self::Value(_) => "a scalar",
        }
    }

    pub(crate) fn write_json(&self, path: &Path, pretty: bool) -> Result<()> {
        let file = File::create(path).map_err(|err| StoreError::io(path, err))?;
        let mut writer = io::BufWriter::new(file);
        if pretty {
            serde_json::to_writer_pretty(&mut writer, self)?;
        } else {
            serde_json::to_writer(&mut writer, self)?;
        }
        writer.flush().map_err(|err| StoreError::io(path, err))
    }

    pub(crate) fn read_json(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|err| StoreError::io(path, err))?;
        Ok(serde_json::from_reader(io::BufReader::new(file))?)
    }
}

impl From<Table> for Data {
    fn from(table: Table) -> Self {
        Self::Table(table)
    }
}

impl From<serde_json::Value> for Data {
    fn from(value: serde_json::Value) -> Self {
        Self::Value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("json".parse::<DataFormat>().unwrap(), DataFormat::Json);
        assert_eq!("csv".parse::<DataFormat>().unwrap(), DataFormat::Csv);
        let err = "pkl".parse::<DataFormat>().unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedFormat { ref format, .. } if format == "pkl"));
    }

    #[test]
    fn test_push_row_rejects_ragged_rows() {
        let mut table = Table::new(["a", "b"]);
        table.push_row([1i64, 2]).unwrap();
        assert!(matches!(
            table.push_row([3i64]),
            Err(StoreError::InvalidTable(_))
        ));
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_cell_inference() {
        assert_eq!(Cell::parse(""), Cell::Empty);
        assert_eq!(Cell::parse("true"), Cell::Bool(true));
        assert_eq!(Cell::parse("-4"), Cell::Int(-4));
        assert_eq!(Cell::parse("1.0"), Cell::Float(1.0));
        assert_eq!(Cell::parse("2.5e-3"), Cell::Float(2.5e-3));
        assert_eq!(Cell::parse("prey"), Cell::Text("prey".to_string()));
    }

    #[test]
    fn test_csv_keeps_column_order_and_values() {
        let mut table = Table::new(["time", "prey", "label", "flag", "note"]);
        table
            .push_row([
                Cell::Float(0.0),
                Cell::Float(10.0),
                Cell::Int(3),
                Cell::Bool(false),
                Cell::Empty,
            ])
            .unwrap();
        table
            .push_row([
                Cell::Float(0.5),
                Cell::Float(1.0e-7),
                Cell::Int(-1),
                Cell::Bool(true),
                Cell::Text("quoted, text".to_string()),
            ])
            .unwrap();

        let mut buffer = Vec::new();
        table.write_csv_to(&mut buffer, b',').unwrap();
        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.starts_with("time,prey,label,flag,note\n"));

        let restored = Table::read_csv_from(buffer.as_slice(), b',').unwrap();
        assert_eq!(restored, table);
    }

    #[test]
    fn test_column_lookup() {
        let mut table = Table::new(["x", "y"]);
        table.push_row([1.0, 2.0]).unwrap();
        table.push_row([3.0, 4.0]).unwrap();
        let ys: Vec<f64> = table
            .column("y")
            .unwrap()
            .into_iter()
            .filter_map(Cell::as_f64)
            .collect();
        assert_eq!(ys, vec![2.0, 4.0]);
        assert!(table.column("z").is_none());
    }

    #[test]
    fn test_typed_value_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Summary {
            peak: f64,
            steps: usize,
        }

        let summary = Summary {
            peak: 12.5,
            steps: 100,
        };
        let data = Data::from_serialize(&summary).unwrap();
        assert_eq!(data.kind(), "a mapping");
        let restored: Summary = data.deserialize_into().unwrap();
        assert_eq!(restored, summary);
    }

    #[test]
    fn test_plain_json_documents_load_as_values() {
        let object: Data = serde_json::from_str(r#"{"alpha": 1, "beta": [2, 3]}"#).unwrap();
        assert_eq!(object.kind(), "a mapping");
        let list: Data = serde_json::from_str("[1, 2, 3]").unwrap();
        assert_eq!(list, Data::Value(serde_json::json!([1, 2, 3])));

        let ragged: Data =
            serde_json::from_str(r#"{"columns": ["a", "b"], "rows": [[1]]}"#).unwrap();
        assert!(ragged.as_table().is_none());
    }

    #[test]
    fn test_table_json_has_no_wrapper() {
        let mut table = Table::new(["x", "label"]);
        table.push_row([Cell::Float(1.5), Cell::from("a")]).unwrap();
        let text = serde_json::to_string(&Data::Table(table.clone())).unwrap();
        assert_eq!(text, r#"{"columns":["x","label"],"rows":[[1.5,"a"]]}"#);

        let restored: Data = serde_json::from_str(&text).unwrap();
        assert_eq!(restored.into_table(), Some(table));
    }

    #[test]
    fn test_write_json_flushes_to_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("v1_summary.json");
        let data = Data::from(serde_json::json!({ "peak": 4.0 }));
        data.write_json(&path, false).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"{"peak":4.0}"#);
        assert_eq!(Data::read_json(&path).unwrap(), data);
    }
}
