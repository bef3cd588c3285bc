use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use chrono::NaiveDateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use super::model::{TagKey, TaggedTable, TimeSeriesDataset};
use crate::calendar::YearHour;

/// Timestamp layout used when writing, and the first one tried when reading.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TIMESTAMP_FALLBACKS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"];

/// Schema metadata key holding the comma separated tag names.
const TAGS_METADATA_KEY: &str = "tags";

// ---------------------------------------------------------------------------
// Row index rendering
// ---------------------------------------------------------------------------

/// How a table's row index is written out as leading columns.
pub trait RowIndex {
    fn headers() -> &'static [&'static str];
    fn cells(&self) -> Vec<String>;
}

impl RowIndex for NaiveDateTime {
    fn headers() -> &'static [&'static str] {
        &["timestamp"]
    }

    fn cells(&self) -> Vec<String> {
        vec![self.format(TIMESTAMP_FORMAT).to_string()]
    }
}

impl RowIndex for YearHour {
    fn headers() -> &'static [&'static str] {
        &["year", "hour_of_year"]
    }

    fn cells(&self) -> Vec<String> {
        vec![self.year.to_string(), self.hour_of_year.to_string()]
    }
}

impl RowIndex for u32 {
    fn headers() -> &'static [&'static str] {
        &["hour_of_year"]
    }

    fn cells(&self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl RowIndex for f64 {
    fn headers() -> &'static [&'static str] {
        &["percentile"]
    }

    fn cells(&self) -> Vec<String> {
        vec![self.to_string()]
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Load an hourly dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – one header row per tag, then a `timestamp` header row
/// * `.parquet` – `timestamp` column plus one Float64 column per channel
pub fn load_file(path: &Path) -> Result<TimeSeriesDataset> {
    let dataset = match extension(path).as_str() {
        "csv" => load_csv(path),
        "parquet" | "pq" => load_parquet(path),
        other => bail!("Unsupported file extension: .{other}"),
    }?;
    log::info!(
        "Loaded {} channels × {} rows from {}",
        dataset.n_columns(),
        dataset.len(),
        path.display()
    );
    Ok(dataset)
}

/// Write any tagged table.  Dispatch by extension.
pub fn save_file<I: RowIndex>(path: &Path, table: &TaggedTable<I>) -> Result<()> {
    match extension(path).as_str() {
        "csv" => save_csv(path, table),
        "parquet" | "pq" => save_parquet(path, table),
        other => bail!("Unsupported file extension: .{other}"),
    }?;
    log::info!("Wrote {} columns to {}", table.n_columns(), path.display());
    Ok(())
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    std::iter::once(TIMESTAMP_FORMAT)
        .chain(TIMESTAMP_FALLBACKS)
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .with_context(|| format!("'{s}' is not a timestamp"))
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// CSV layout (the wide layout pandas writes for multi-level columns):
///
/// ```text
/// region,DE,DE,FR
/// variable,load,pv,pv
/// timestamp,,,
/// 2018-01-01 00:00:00,51.2,0.0,0.0
/// ```
fn load_csv(path: &Path) -> Result<TimeSeriesDataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context("opening CSV")?;

    let mut tag_names = Vec::new();
    let mut tag_values: Vec<Vec<String>> = Vec::new();
    let mut index = Vec::new();
    let mut columns: Vec<Vec<f64>> = Vec::new();
    let mut in_body = false;

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let first = record.get(0).unwrap_or("").trim();

        if !in_body {
            if first == "timestamp" {
                if tag_names.is_empty() {
                    bail!("CSV has no tag header rows before 'timestamp'");
                }
                columns = vec![Vec::new(); tag_values[0].len()];
                in_body = true;
            } else {
                let values: Vec<String> = record.iter().skip(1).map(|v| v.trim().to_string()).collect();
                if let Some(expected) = tag_values.first().map(Vec::len) {
                    if values.len() != expected {
                        bail!("CSV tag row '{first}' has {} values, expected {expected}", values.len());
                    }
                }
                tag_names.push(first.to_string());
                tag_values.push(values);
            }
            continue;
        }

        index.push(parse_timestamp(first).with_context(|| format!("CSV row {row_no}"))?);
        if record.len() != columns.len() + 1 {
            bail!(
                "CSV row {row_no}: {} values, expected {}",
                record.len().saturating_sub(1),
                columns.len()
            );
        }
        for (col, cell) in columns.iter_mut().zip(record.iter().skip(1)) {
            let cell = cell.trim();
            let value = if cell.is_empty() {
                f64::NAN
            } else {
                cell.parse::<f64>()
                    .with_context(|| format!("CSV row {row_no}: '{cell}' is not a number"))?
            };
            col.push(value);
        }
    }

    if !in_body {
        bail!("CSV missing 'timestamp' header row");
    }

    let keys = (0..columns.len()).map(|c| TagKey::new(tag_values.iter().map(|row| row[c].clone())));
    Ok(TaggedTable::from_columns(index, tag_names, keys.zip(columns))?)
}

fn save_csv<I: RowIndex>(path: &Path, table: &TaggedTable<I>) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .context("creating CSV")?;
    let leading = I::headers().len();

    for (pos, tag) in table.tag_names().iter().enumerate() {
        let mut row = vec![String::new(); leading];
        row[0] = tag.clone();
        row.extend(table.keys().map(|k| k.get(pos).unwrap_or("").to_string()));
        writer.write_record(&row).context("writing CSV tag row")?;
    }

    let mut header: Vec<String> = I::headers().iter().map(|h| h.to_string()).collect();
    header.extend(std::iter::repeat(String::new()).take(table.n_columns()));
    writer.write_record(&header).context("writing CSV index header")?;

    let columns: Vec<&[f64]> = table.columns().map(|(_, v)| v).collect();
    for (row, idx) in table.index().iter().enumerate() {
        let mut record = idx.cells();
        record.extend(columns.iter().map(|col| col[row].to_string()));
        writer.write_record(&record).context("writing CSV row")?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// Load a Parquet file containing an hourly dataset.
///
/// Expected schema:
/// - `timestamp`: Utf8
/// - one Float64 column per channel; its tag values come from the field
///   metadata, falling back to splitting the column name on `/`
/// - schema metadata `tags`: comma separated tag names
fn load_parquet(path: &Path) -> Result<TimeSeriesDataset> {
    let file = File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let schema = builder.schema().clone();
    let reader = builder.build().context("building parquet reader")?;

    let tag_names: Vec<String> = schema
        .metadata()
        .get(TAGS_METADATA_KEY)
        .context("Parquet file missing 'tags' schema metadata")?
        .split(',')
        .map(str::to_string)
        .collect();
    let ts_idx = schema
        .index_of("timestamp")
        .map_err(|_| anyhow::anyhow!("Parquet file missing 'timestamp' column"))?;

    let mut keys = Vec::new();
    let mut channel_fields = Vec::new();
    for (i, field) in schema.fields().iter().enumerate() {
        if i == ts_idx {
            continue;
        }
        if field.data_type() != &DataType::Float64 {
            bail!("column '{}' is {:?}, expected Float64", field.name(), field.data_type());
        }
        let meta = field.metadata();
        let key = if tag_names.iter().all(|t| meta.contains_key(t)) {
            TagKey::new(tag_names.iter().map(|t| meta[t].clone()))
        } else {
            TagKey::new(field.name().split('/'))
        };
        keys.push(key);
        channel_fields.push(i);
    }

    let mut index = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); channel_fields.len()];
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let ts = batch
            .column(ts_idx)
            .as_any()
            .downcast_ref::<StringArray>()
            .context("'timestamp' column is not Utf8")?;
        for row in 0..batch.num_rows() {
            if ts.is_null(row) {
                bail!("Row {row}: null timestamp");
            }
            index.push(parse_timestamp(ts.value(row)).with_context(|| format!("Row {row}"))?);
        }
        for (col, &field_idx) in columns.iter_mut().zip(&channel_fields) {
            let arr = batch
                .column(field_idx)
                .as_any()
                .downcast_ref::<Float64Array>()
                .context("expected Float64Array")?;
            col.extend(arr.iter().map(|v| v.unwrap_or(f64::NAN)));
        }
    }

    Ok(TaggedTable::from_columns(index, tag_names, keys.into_iter().zip(columns))?)
}

/// Arrow view of a tagged table: index columns as Utf8, then one Float64
/// column per key carrying its tag values as field metadata.
fn to_record_batch<I: RowIndex>(table: &TaggedTable<I>) -> Result<RecordBatch> {
    let headers = I::headers();
    let mut fields: Vec<Field> = headers.iter().map(|h| Field::new(*h, DataType::Utf8, false)).collect();
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(headers.len() + table.n_columns());

    let cells: Vec<Vec<String>> = table.index().iter().map(I::cells).collect();
    for pos in 0..headers.len() {
        let values: Vec<&str> = cells.iter().map(|c| c[pos].as_str()).collect();
        arrays.push(Arc::new(StringArray::from(values)));
    }

    for (key, values) in table.columns() {
        let meta: HashMap<String, String> = table
            .tag_names()
            .iter()
            .cloned()
            .zip(key.values().iter().cloned())
            .collect();
        fields.push(Field::new(key.to_string(), DataType::Float64, true).with_metadata(meta));
        arrays.push(Arc::new(Float64Array::from(values.to_vec())));
    }

    let schema = Arc::new(Schema::new(fields).with_metadata(HashMap::from([(
        TAGS_METADATA_KEY.to_string(),
        table.tag_names().join(","),
    )])));
    RecordBatch::try_new(schema, arrays).context("building record batch")
}

fn save_parquet<I: RowIndex>(path: &Path, table: &TaggedTable<I>) -> Result<()> {
    let batch = to_record_batch(table)?;
    let file = File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

/// Render a table as an ASCII grid for terminal output.
pub fn pretty_format<I: RowIndex>(table: &TaggedTable<I>) -> Result<String> {
    let batch = to_record_batch(table)?;
    Ok(pretty_format_batches(&[batch]).context("formatting table")?.to_string())
}
