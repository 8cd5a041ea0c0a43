use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use tc_types::{DataError, SeriesDataset, TcResult};

/// Loads long-format CSV (`series_id,timestamp,value[,feature...]`) into
/// one [`SeriesDataset`] per series.
///
/// Rows may arrive in any order; each series is sorted by timestamp and the
/// last `holdout` observations become its test segment. Every column other
/// than the three key columns is read as a numeric feature.
#[derive(Debug, Clone)]
pub struct CsvSeriesLoader {
    holdout: usize,
    delimiter: u8,
}

#[derive(Debug)]
struct Columns {
    series: usize,
    timestamp: usize,
    value: usize,
    features: Vec<(usize, String)>,
}

#[derive(Debug)]
struct Row {
    timestamp: DateTime<Utc>,
    value: f64,
    features: Vec<f64>,
}

impl CsvSeriesLoader {
    pub fn new(holdout: usize) -> Self {
        Self {
            holdout,
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn holdout(&self) -> usize {
        self.holdout
    }

    /// Load all series from a CSV file
    pub fn load_csv_file<P: AsRef<Path>>(&self, file_path: P) -> TcResult<Vec<SeriesDataset>> {
        let path = file_path.as_ref();
        tracing::info!("Loading series CSV from: {}", path.display());

        let file = fs::File::open(path).map_err(|e| DataError::LoadingFailed {
            message: format!("Failed to open CSV file {}: {}", path.display(), e),
        })?;
        self.load_reader(file)
    }

    /// Load all series from any CSV source with a header row
    pub fn load_reader<R: Read>(&self, reader: R) -> TcResult<Vec<SeriesDataset>> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .trim(Trim::All)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| DataError::LoadingFailed {
                message: format!("Failed to read CSV headers: {}", e),
            })?
            .clone();
        let columns = detect_columns(&headers)?;
        tracing::debug!("CSV columns: {:?}", columns);

        // series ids in first-appearance order
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<Row>> = HashMap::new();
        let mut skipped = 0usize;

        for (index, result) in rdr.records().enumerate() {
            let line = index + 2;
            let record = result.map_err(|e| DataError::LoadingFailed {
                message: format!("Failed to read CSV record at line {}: {}", line, e),
            })?;

            match parse_record(&record, &columns) {
                Ok((id, row)) => {
                    if !groups.contains_key(&id) {
                        order.push(id.clone());
                    }
                    groups.entry(id).or_default().push(row);
                }
                Err(e) => {
                    tracing::warn!("Skipping invalid record at line {}: {}", line, e);
                    skipped += 1;
                }
            }
        }

        let feature_names: Vec<&str> = columns.features.iter().map(|(_, name)| name.as_str()).collect();
        let mut datasets = Vec::with_capacity(order.len());
        for id in order {
            let Some(mut rows) = groups.remove(&id) else {
                continue;
            };
            rows.sort_by_key(|r| r.timestamp);
            match build_dataset(&id, rows, &feature_names, self.holdout) {
                Ok(dataset) => datasets.push(dataset),
                Err(e) => tracing::warn!("Skipping series {}: {}", id, e),
            }
        }

        tracing::info!("Loaded {} series from CSV ({} records skipped)", datasets.len(), skipped);
        Ok(datasets)
    }
}

/// Locate the key columns by header name; everything else is a feature.
fn detect_columns(headers: &StringRecord) -> Result<Columns, DataError> {
    let mut series = None;
    let mut timestamp = None;
    let mut value = None;
    let mut features = Vec::new();

    for (i, header) in headers.iter().enumerate() {
        match header.to_lowercase().as_str() {
            "series_id" | "series" | "id" | "sku" | "unique_id" if series.is_none() => series = Some(i),
            "timestamp" | "date" | "datetime" | "time" | "ds" if timestamp.is_none() => timestamp = Some(i),
            "value" | "y" | "demand" | "sales" | "target" if value.is_none() => value = Some(i),
            _ => features.push((i, header.to_string())),
        }
    }

    let missing = |name: &str| DataError::ParseError {
        message: format!("Could not find {} column in CSV headers", name),
    };
    Ok(Columns {
        series: series.ok_or_else(|| missing("series id"))?,
        timestamp: timestamp.ok_or_else(|| missing("timestamp"))?,
        value: value.ok_or_else(|| missing("value"))?,
        features,
    })
}

fn parse_record(record: &StringRecord, columns: &Columns) -> Result<(String, Row), DataError> {
    let field = |i: usize| record.get(i).unwrap_or("");

    let id = field(columns.series);
    if id.is_empty() {
        return Err(DataError::ParseError {
            message: "Empty series id".to_string(),
        });
    }
    let timestamp = parse_timestamp(field(columns.timestamp))?;
    let value = parse_number(field(columns.value), "value")?;
    let features = columns
        .features
        .iter()
        .map(|(i, name)| parse_number(field(*i), name))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((
        id.to_string(),
        Row {
            timestamp,
            value,
            features,
        },
    ))
}

fn build_dataset(id: &str, rows: Vec<Row>, feature_names: &[&str], holdout: usize) -> Result<SeriesDataset, DataError> {
    let mut timestamps = Vec::with_capacity(rows.len());
    let mut values = Vec::with_capacity(rows.len());
    let mut columns = vec![Vec::with_capacity(rows.len()); feature_names.len()];

    for row in rows {
        timestamps.push(row.timestamp);
        values.push(row.value);
        for (column, v) in columns.iter_mut().zip(row.features) {
            column.push(v);
        }
    }

    let mut dataset = SeriesDataset::with_holdout(id, timestamps, values, holdout)?;
    for (name, column) in feature_names.iter().zip(columns) {
        dataset = dataset.with_feature(*name, column)?;
    }
    Ok(dataset)
}

/// Parse a timestamp string into DateTime<Utc>
pub fn parse_timestamp(timestamp_str: &str) -> Result<DateTime<Utc>, DataError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp_str) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Date-only values land at midnight
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"] {
        if let Some(naive_dt) = NaiveDate::parse_from_str(timestamp_str, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive_dt, Utc));
        }
    }

    let formats = [
        "%Y-%m-%d %H:%M:%S",  // 2023-01-01 10:30:00
        "%Y/%m/%d %H:%M:%S",  // 2023/01/01 10:30:00
        "%m/%d/%Y %H:%M:%S",  // 01/01/2023 10:30:00
        "%Y-%m-%dT%H:%M:%S",  // 2023-01-01T10:30:00
    ];
    for format in &formats {
        if let Ok(naive_dt) = NaiveDateTime::parse_from_str(timestamp_str, format) {
            return Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive_dt, Utc));
        }
    }

    // Unix seconds
    if let Ok(seconds) = timestamp_str.parse::<i64>() {
        if let Some(dt) = DateTime::from_timestamp(seconds, 0) {
            return Ok(dt);
        }
    }

    Err(DataError::ParseError {
        message: format!("Could not parse timestamp: {}", timestamp_str),
    })
}

fn parse_number(value_str: &str, field_name: &str) -> Result<f64, DataError> {
    if value_str.is_empty() {
        return Err(DataError::ParseError {
            message: format!("Empty value for field: {}", field_name),
        });
    }
    match value_str.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(_) => Err(DataError::ParseError {
            message: format!("Non-finite {} value '{}'", field_name, value_str),
        }),
        Err(e) => Err(DataError::ParseError {
            message: format!("Could not parse {} value '{}': {}", field_name, value_str, e),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;
    use tc_types::TcError;
    use tempfile::NamedTempFile;

    #[test]
    fn test_csv_file_loading() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "series_id,date,value").unwrap();
        writeln!(temp_file, "sku-b,2024-01-02,5").unwrap();
        writeln!(temp_file, "sku-a,2024-01-01,1").unwrap();
        writeln!(temp_file, "sku-b,2024-01-01,4").unwrap();
        writeln!(temp_file, "sku-a,2024-01-03,3").unwrap();
        writeln!(temp_file, "sku-a,2024-01-02,2").unwrap();
        writeln!(temp_file, "sku-b,2024-01-03,6").unwrap();
        temp_file.flush().unwrap();

        let datasets = CsvSeriesLoader::new(1).load_csv_file(temp_file.path()).unwrap();
        assert_eq!(datasets.len(), 2);

        // first appearance order, each series sorted by time
        assert_eq!(datasets[0].id(), "sku-b");
        assert_eq!(datasets[0].values(), &[4.0, 5.0, 6.0]);
        assert_eq!(datasets[1].id(), "sku-a");
        assert_eq!(datasets[1].values(), &[1.0, 2.0, 3.0]);
        assert_eq!(datasets[1].split(), 2);
        assert_eq!(datasets[1].holdout().values, &[3.0]);
        assert_eq!(
            datasets[1].timestamps()[0],
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_feature_columns_follow_header_order() {
        let data = "price,series_id,timestamp,promo,value\n\
                    9.5,a,2024-01-01,0,10\n\
                    9.0,a,2024-01-02,1,12\n";
        let datasets = CsvSeriesLoader::new(0).load_reader(data.as_bytes()).unwrap();
        assert_eq!(datasets[0].feature_names(), vec!["price", "promo"]);
        assert_eq!(datasets[0].features()[1].values, vec![0.0, 1.0]);
        assert_eq!(datasets[0].values(), &[10.0, 12.0]);
    }

    #[test]
    fn test_invalid_records_are_skipped() {
        let data = "series_id,timestamp,value\n\
                    a,2024-01-01,1\n\
                    a,not-a-date,2\n\
                    a,2024-01-03,abc\n\
                    a,2024-01-04,NaN\n\
                    ,2024-01-05,1\n\
                    a,2024-01-06,6\n";
        let datasets = CsvSeriesLoader::new(1).load_reader(data.as_bytes()).unwrap();
        assert_eq!(datasets.len(), 1);
        assert_eq!(datasets[0].values(), &[1.0, 6.0]);
    }

    #[test]
    fn test_series_with_duplicate_timestamps_is_dropped() {
        let data = "series_id,timestamp,value\n\
                    dup,2024-01-01,1\n\
                    dup,2024-01-01,2\n\
                    ok,2024-01-01,3\n";
        let datasets = CsvSeriesLoader::new(0).load_reader(data.as_bytes()).unwrap();
        assert_eq!(datasets.len(), 1);
        assert_eq!(datasets[0].id(), "ok");
    }

    #[test]
    fn test_missing_value_column_is_an_error() {
        let data = "series_id,timestamp,amount\na,2024-01-01,1\n";
        let err = CsvSeriesLoader::new(0).load_reader(data.as_bytes()).unwrap_err();
        assert!(matches!(err, TcError::Data(DataError::ParseError { .. })));
    }

    #[test]
    fn test_missing_file() {
        let err = CsvSeriesLoader::new(0).load_csv_file("/nonexistent/series.csv").unwrap_err();
        assert!(err.to_string().contains("Failed to open CSV file"));
    }

    #[test]
    fn test_semicolon_delimiter() {
        let data = "id;ds;y\nx;2024-03-01;7\n";
        let datasets = CsvSeriesLoader::new(0)
            .with_delimiter(b';')
            .load_reader(data.as_bytes())
            .unwrap();
        assert_eq!(datasets[0].id(), "x");
        assert_eq!(datasets[0].values(), &[7.0]);
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2023, 1, 1, 10, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2023-01-01T10:30:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2023-01-01 10:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp("01/01/2023 10:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp("1672569000").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2023/01/01").unwrap(),
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
        );
        assert!(parse_timestamp("yesterday").is_err());
    }
}
