use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;
use std::io::Cursor;
use tracing::{info, instrument, warn};

use crate::core::sanitize::{dedupe_column_names, ensure_identifier, table_name_from_file};
use crate::error::LoadError;
use crate::infra::storage::Retriever;
use crate::models::file::FileRef;
use crate::models::table::{Cell, Column, ColumnType, Table, TableSchema, DATETIME_FORMAT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Delimited,
    Spreadsheet,
}

impl FileFormat {
    /// 按扩展名分派，大小写不敏感
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let (_, ext) = file_name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(FileFormat::Delimited),
            "xls" | "xlsx" => Some(FileFormat::Spreadsheet),
            _ => None,
        }
    }
}

/// 一个文件产出一张表；多工作表只取第一张
#[instrument(skip_all, fields(file = %file.file_name))]
pub fn load_table(
    file: &FileRef,
    retriever: &dyn Retriever,
) -> Result<BTreeMap<String, Table>, LoadError> {
    let format =
        FileFormat::from_file_name(&file.file_name).ok_or_else(|| LoadError::UnsupportedFormat {
            file: file.file_name.clone(),
        })?;

    let bytes = retriever
        .retrieve(&file.full_path)
        .map_err(|source| LoadError::Retrieval {
            file: file.file_name.clone(),
            source,
        })?;

    let parse_err = |message: String| LoadError::Parse {
        file: file.file_name.clone(),
        message,
    };
    let (headers, raw_rows) = match format {
        FileFormat::Delimited => read_delimited(&bytes).map_err(parse_err)?,
        FileFormat::Spreadsheet => read_spreadsheet(bytes).map_err(parse_err)?,
    };

    let name = ensure_identifier(table_name_from_file(&file.file_name), "table");
    let table = build_table(name.clone(), headers, raw_rows);
    info!(
        "文件 {} 已加载为表 {} ({} 列, {} 行)",
        file.file_name,
        name,
        table.columns().len(),
        table.rows.len()
    );

    let mut tables = BTreeMap::new();
    tables.insert(name, table);
    Ok(tables)
}

/// 多文件加载：单个文件失败不影响其余文件
pub fn load_tables(
    files: &[FileRef],
    retriever: &dyn Retriever,
) -> (BTreeMap<String, Table>, Vec<LoadError>) {
    let mut tables = BTreeMap::new();
    let mut failures = Vec::new();
    for file in files {
        match load_table(file, retriever) {
            Ok(loaded) => tables.extend(loaded),
            Err(e) => {
                warn!("跳过文件 {}: {}", file.file_name, e);
                failures.push(e);
            }
        }
    }
    (tables, failures)
}

type RawTable = (Vec<String>, Vec<Vec<Cell>>);

fn read_delimited(bytes: &[u8]) -> Result<RawTable, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| e.to_string())?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() {
        return Err("缺少表头".to_string());
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| e.to_string())?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        Cell::Null
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok((headers, rows))
}

fn read_spreadsheet(bytes: Vec<u8>) -> Result<RawTable, String> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| "工作簿中没有工作表".to_string())?
        .map_err(|e| e.to_string())?;

    let mut rows_iter = range.rows();
    let header_row = rows_iter.next().ok_or_else(|| "缺少表头".to_string())?;
    let headers: Vec<String> = header_row
        .iter()
        .map(|c| match c {
            Data::Empty => String::new(),
            other => other.to_string(),
        })
        .collect();

    let rows = rows_iter
        .map(|row| row.iter().map(spreadsheet_cell).collect())
        .collect();
    Ok((headers, rows))
}

fn spreadsheet_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Null,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) if s.trim().is_empty() => Cell::Null,
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTime(_) | Data::DateTimeIso(_) => match data.as_datetime() {
            Some(dt) => temporal_cell(dt),
            None => Cell::Text(data.to_string()),
        },
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

fn build_table(name: String, headers: Vec<String>, raw_rows: Vec<Vec<Cell>>) -> Table {
    let width = headers.len();
    let names = dedupe_column_names(&headers);

    // 按列推断类型后再统一转换
    let mut columns: Vec<Vec<Cell>> = vec![Vec::with_capacity(raw_rows.len()); width];
    for mut row in raw_rows {
        row.resize(width, Cell::Null);
        for (i, cell) in row.into_iter().enumerate() {
            columns[i].push(cell);
        }
    }

    let types: Vec<ColumnType> = columns.iter().map(|c| infer_column_type(c)).collect();
    let row_count = columns.first().map_or(0, Vec::len);
    let mut rows = vec![Vec::with_capacity(width); row_count];
    for (col_idx, cells) in columns.into_iter().enumerate() {
        for (row_idx, cell) in cells.into_iter().enumerate() {
            rows[row_idx].push(coerce(cell, types[col_idx]));
        }
    }

    Table {
        schema: TableSchema {
            name,
            columns: names
                .into_iter()
                .zip(types)
                .map(|(name, column_type)| Column { name, column_type })
                .collect(),
        },
        rows,
    }
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

const DATETIME_INPUT_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// 纯日期或带时间的日期；时间为零点时退化为纯日期
fn parse_temporal(s: &str) -> Option<Cell> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Cell::Date(d));
    }
    DATETIME_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(temporal_cell)
}

fn temporal_cell(dt: NaiveDateTime) -> Cell {
    if dt.time() == NaiveTime::MIN {
        Cell::Date(dt.date())
    } else {
        Cell::DateTime(dt)
    }
}

/// 所有非空值都能解释为同一类型才取该类型，否则退化为字符串；全空列为字符串
pub fn infer_column_type(cells: &[Cell]) -> ColumnType {
    let mut values = cells.iter().filter(|c| !c.is_null()).peekable();
    if values.peek().is_none() {
        return ColumnType::String;
    }
    let fits = |ty: ColumnType| {
        cells.iter().filter(|c| !c.is_null()).all(|c| match (ty, c) {
            (ColumnType::Number, Cell::Number(_)) => true,
            (ColumnType::Number, Cell::Text(s)) => parse_number(s).is_some(),
            (ColumnType::Boolean, Cell::Bool(_)) => true,
            (ColumnType::Boolean, Cell::Text(s)) => parse_bool(s).is_some(),
            (ColumnType::Date, Cell::Date(_) | Cell::DateTime(_)) => true,
            (ColumnType::Date, Cell::Text(s)) => parse_temporal(s).is_some(),
            _ => false,
        })
    };
    [ColumnType::Number, ColumnType::Boolean, ColumnType::Date]
        .into_iter()
        .find(|ty| fits(*ty))
        .unwrap_or(ColumnType::String)
}

fn coerce(cell: Cell, ty: ColumnType) -> Cell {
    match (ty, cell) {
        (_, Cell::Null) => Cell::Null,
        (ColumnType::Number, Cell::Text(s)) => parse_number(&s).map_or(Cell::Text(s), Cell::Number),
        (ColumnType::Boolean, Cell::Text(s)) => parse_bool(&s).map_or(Cell::Text(s), Cell::Bool),
        (ColumnType::Date, Cell::Text(s)) => parse_temporal(&s).unwrap_or(Cell::Text(s)),
        (ColumnType::String, Cell::Number(n)) => Cell::Text(format_number(n)),
        (ColumnType::String, Cell::Bool(b)) => Cell::Text(b.to_string()),
        (ColumnType::String, Cell::Date(d)) => Cell::Text(d.to_string()),
        (ColumnType::String, Cell::DateTime(dt)) => {
            Cell::Text(dt.format(DATETIME_FORMAT).to_string())
        }
        (_, other) => other,
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
