use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Dataset, GroupDefinition, Label, Record, Value};
use crate::config::{AuditConfig, ColumnMapping};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load an audit dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – one scalar column per field (recommended)
/// * `.json`    – `[{ "race": 0, "two_year_recid": 1, ... }, ...]`
/// * `.csv`     – header row with column names
///
/// The config's column mapping picks out the group, label and the optional
/// prediction and weight columns; every other column becomes a feature.
pub fn load_file(path: &Path, config: &AuditConfig) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "parquet" | "pq" => read_parquet(path)?,
        "json" => read_json(path)?,
        "csv" => read_csv(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };
    log::debug!(
        "Read {} rows with columns {:?} from {}",
        table.rows.len(),
        table.columns,
        path.display()
    );

    build_dataset(
        table,
        &config.columns,
        config.favorable_label,
        config.group_definition()?,
    )
}

// ---------------------------------------------------------------------------
// Table → Dataset
// ---------------------------------------------------------------------------

/// Rows of cells under a shared header, as read from any format.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    fn position(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .with_context(|| format!("missing '{name}' column"))
    }
}

/// Turn a table into a dataset using the column mapping.
pub fn build_dataset(
    table: Table,
    mapping: &ColumnMapping,
    favorable_label: Label,
    groups: GroupDefinition,
) -> Result<Dataset> {
    let group_idx = table.position(&mapping.group)?;
    let label_idx = table.position(&mapping.label)?;
    let pred_idx = mapping
        .prediction
        .as_deref()
        .map(|c| table.position(c))
        .transpose()?;
    let weight_idx = mapping
        .weight
        .as_deref()
        .map(|c| table.position(c))
        .transpose()?;

    let mapped = |i: usize| {
        i == group_idx || i == label_idx || Some(i) == pred_idx || Some(i) == weight_idx
    };
    let feature_names: Vec<String> = table
        .columns
        .iter()
        .enumerate()
        .filter(|(i, _)| !mapped(*i))
        .map(|(_, c)| c.clone())
        .collect();

    let mut records = Vec::with_capacity(table.rows.len());

    for (row_no, row) in table.rows.into_iter().enumerate() {
        if row.len() != table.columns.len() {
            bail!(
                "Row {row_no}: expected {} cells, got {}",
                table.columns.len(),
                row.len()
            );
        }

        let true_label = Label::from_value(&row[label_idx])
            .with_context(|| format!("Row {row_no}, column '{}'", mapping.label))?;

        let mut record = Record::new(row[group_idx].clone(), true_label);

        if let Some(i) = pred_idx {
            let pred = Label::from_value(&row[i])
                .with_context(|| format!("Row {row_no}: invalid prediction"))?;
            record = record.with_prediction(pred);
        }

        if let Some(i) = weight_idx {
            let w = row[i]
                .as_f64()
                .with_context(|| format!("Row {row_no}: weight {} is not a number", row[i]))?;
            record = record
                .with_weight(w)
                .with_context(|| format!("Row {row_no}"))?;
        }

        let features = row
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !mapped(*i))
            .map(|(_, v)| v)
            .collect();

        records.push(record.with_features(features));
    }

    Ok(Dataset::new(records, favorable_label, groups).with_feature_names(feature_names))
}

// ---------------------------------------------------------------------------
// JSON reader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "race": 0, "priors_count": 3, "two_year_recid": 1 },
///   ...
/// ]
/// ```
///
/// The header is the union of keys in first-seen order; a key missing from
/// a row reads as null.
fn read_json(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut columns: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(|rec| rec.as_object())
        .map(|obj| {
            columns
                .iter()
                .map(|c| obj.get(c).map_or(Value::Null, json_to_value))
                .collect()
        })
        .collect();

    Ok(Table { columns, rows })
}

fn json_to_value(val: &JsonValue) -> Value {
    match val {
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Null => Value::Null,
        other => Value::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV reader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one record per line.
/// Cell types are guessed per cell.
fn read_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let columns: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        rows.push(record.iter().map(guess_value_type).collect());
    }

    Ok(Table { columns, rows })
}

fn guess_value_type(s: &str) -> Value {
    if s.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Value::Float(f);
    }
    if s == "true" || s == "false" {
        return Value::Bool(s == "true");
    }
    Value::String(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet reader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one scalar column per field.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn read_parquet(path: &Path) -> Result<Table> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        append_batch(&batch, &columns, &mut rows)?;
    }

    Ok(Table { columns, rows })
}

// -- Parquet / Arrow helpers --

/// Append one record batch to `rows`. Row numbers in errors count from the
/// start of the file, not the batch.
fn append_batch(batch: &RecordBatch, columns: &[String], rows: &mut Vec<Vec<Value>>) -> Result<()> {
    for row in 0..batch.num_rows() {
        let row_no = rows.len();
        let cells = batch
            .columns()
            .iter()
            .zip(columns)
            .map(|(col, name)| {
                extract_value(col, row)
                    .with_context(|| format!("Row {row_no}, column '{name}'"))
            })
            .collect::<Result<Vec<_>>>()?;
        rows.push(cells);
    }
    Ok(())
}

fn downcast<'a, T: 'static>(col: &'a Arc<dyn Array>) -> Result<&'a T> {
    col.as_any()
        .downcast_ref::<T>()
        .with_context(|| format!("unexpected array type for {:?}", col.data_type()))
}

/// Extract a single value from an Arrow column at a given row.
fn extract_value(col: &Arc<dyn Array>, row: usize) -> Result<Value> {
    if col.is_null(row) {
        return Ok(Value::Null);
    }
    let value = match col.data_type() {
        DataType::Utf8 => Value::String(downcast::<StringArray>(col)?.value(row).to_string()),
        DataType::LargeUtf8 => Value::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => Value::Integer(downcast::<Int32Array>(col)?.value(row) as i64),
        DataType::Int64 => Value::Integer(downcast::<Int64Array>(col)?.value(row)),
        DataType::Float32 => Value::Float(downcast::<Float32Array>(col)?.value(row) as f64),
        DataType::Float64 => Value::Float(downcast::<Float64Array>(col)?.value(row)),
        DataType::Boolean => Value::Bool(downcast::<BooleanArray>(col)?.value(row)),
        other => bail!("unsupported column type {other:?}"),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> ColumnMapping {
        ColumnMapping {
            group: "race".into(),
            label: "recid".into(),
            prediction: None,
            weight: Some("w".into()),
        }
    }

    fn groups() -> GroupDefinition {
        GroupDefinition::from_roles([Value::Integer(1)], [Value::Integer(0)]).unwrap()
    }

    #[test]
    fn mapped_columns_are_not_features() {
        let table = Table {
            columns: vec!["age".into(), "race".into(), "recid".into(), "w".into()],
            rows: vec![
                vec![Value::Integer(30), Value::Integer(1), Value::Integer(0), Value::Float(1.0)],
                vec![Value::Integer(22), Value::Integer(0), Value::Integer(1), Value::Float(2.0)],
            ],
        };
        let ds = build_dataset(table, &mapping(), Label::Zero, groups()).unwrap();
        assert_eq!(ds.feature_names(), &["age".to_string()]);
        assert_eq!(ds.records()[1].features, vec![Value::Integer(22)]);
        assert_eq!(ds.records()[1].true_label, Label::One);
        assert_eq!(ds.weights(), vec![1.0, 2.0]);
    }

    #[test]
    fn missing_column_is_reported() {
        let table = Table {
            columns: vec!["race".into(), "recid".into()],
            rows: vec![],
        };
        let err = build_dataset(table, &mapping(), Label::Zero, groups()).unwrap_err();
        assert!(format!("{err:#}").contains("missing 'w' column"));
    }

    #[test]
    fn bad_label_names_row_and_column() {
        let table = Table {
            columns: vec!["race".into(), "recid".into(), "w".into()],
            rows: vec![vec![Value::Integer(1), Value::from("yes"), Value::Float(1.0)]],
        };
        let err = build_dataset(table, &mapping(), Label::Zero, groups()).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("Row 0, column 'recid'"), "{msg}");
    }

    #[test]
    fn parquet_row_numbers_run_across_batches() {
        use arrow::array::UInt8Array;
        use arrow::datatypes::{Field, Schema};

        let columns = vec!["race".to_string()];
        let batch = |field: Field, array: Arc<dyn Array>| {
            RecordBatch::try_new(Arc::new(Schema::new(vec![field])), vec![array]).unwrap()
        };
        let first = batch(
            Field::new("race", DataType::Int64, false),
            Arc::new(Int64Array::from(vec![0, 1])),
        );
        let second = batch(
            Field::new("race", DataType::UInt8, false),
            Arc::new(UInt8Array::from(vec![1u8])),
        );

        let mut rows = Vec::new();
        append_batch(&first, &columns, &mut rows).unwrap();
        assert_eq!(rows.len(), 2);
        let err = append_batch(&second, &columns, &mut rows).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("Row 2, column 'race'"), "{msg}");
    }

    #[test]
    fn csv_cells_are_typed() {
        assert_eq!(guess_value_type(""), Value::Null);
        assert_eq!(guess_value_type("3"), Value::Integer(3));
        assert_eq!(guess_value_type("0.5"), Value::Float(0.5));
        assert_eq!(guess_value_type("true"), Value::Bool(true));
        assert_eq!(guess_value_type("Caucasian"), Value::from("Caucasian"));
    }
}
