use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};

use crate::error::{OverlayError, Result};

/// 複数ヘッダ行を持つ生の表データ
///
/// セルは文字列のまま保持し、数値への変換はアクセス時に行う。
/// 列は位置（0始まり）で参照する。
#[derive(Debug, Clone)]
pub struct RawTable {
    headers: Vec<StringRecord>,
    rows: Vec<StringRecord>,
    width: usize,
}

impl RawTable {
    /// CSV を読み込む
    ///
    /// - skip_rows: 先頭のメタデータ行数（空行は数えない）
    /// - header_rows: ヘッダとして保持する行数
    pub fn from_reader<R: Read>(reader: R, skip_rows: usize, header_rows: usize) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut headers = Vec::with_capacity(header_rows);
        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            if i < skip_rows {
                continue;
            }
            if headers.len() < header_rows {
                headers.push(record);
            } else {
                rows.push(record);
            }
        }

        Self::from_records(headers, rows)
    }

    pub fn from_path<P: AsRef<Path>>(path: P, skip_rows: usize, header_rows: usize) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let table = Self::from_reader(file, skip_rows, header_rows)?;
        log::info!(
            "Loaded {} ({} header rows, {} data rows, {} columns)",
            path.as_ref().display(),
            table.headers.len(),
            table.rows.len(),
            table.width
        );
        Ok(table)
    }

    /// ヘッダ行の列数はすべて一致していなければならない
    pub fn from_records(headers: Vec<StringRecord>, rows: Vec<StringRecord>) -> Result<Self> {
        let width = match headers.first() {
            Some(first) => first.len(),
            None => rows.iter().map(|r| r.len()).max().unwrap_or(0),
        };

        for (row, header) in headers.iter().enumerate() {
            if header.len() != width {
                return Err(OverlayError::HeaderMismatch {
                    row,
                    expected: width,
                    actual: header.len(),
                });
            }
        }

        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() > width) {
            return Err(OverlayError::Table(format!(
                "data row {} has {} columns, header has {}",
                i,
                row.len(),
                width
            )));
        }

        Ok(Self { headers, rows, width })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_header_rows(&self) -> usize {
        self.headers.len()
    }

    pub fn header(&self, row: usize) -> Option<&StringRecord> {
        self.headers.get(row)
    }

    /// ヘッダ行を列ごとの文字列として取得
    pub fn header_strings(&self, row: usize) -> Option<Vec<String>> {
        self.headers
            .get(row)
            .map(|r| r.iter().map(|s| s.trim().to_string()).collect())
    }

    /// データセル。行が足りない場合は None、列が短い行は空文字列扱い
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        let record = self.rows.get(row)?;
        if col >= self.width {
            return None;
        }
        Some(record.get(col).unwrap_or(""))
    }

    /// 数値として取得。空・非数値は NaN
    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.cell(row, col).map_or(f64::NAN, parse_cell)
    }

    pub fn column(&self, col: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |r| r.get(col).unwrap_or(""))
    }
}

pub fn parse_cell(cell: &str) -> f64 {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}
