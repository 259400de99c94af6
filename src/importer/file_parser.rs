// ==========================================
// 印刷成本估算系统 - 载荷解析器
// ==========================================
// 阶段 0: 原始载荷 → 松散类型的行（RawRow）
// 支持: JSON 对象数组 / 带表头的 CSV
// JSON 规则: 数组中的非对象元素保留为无效行，由流水线按行报告
// CSV 规则: 以 "===" 开头的行是分节注释，解析前剔除
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

/// 一行原始数据（列名 → 松散类型值）
pub type RawRow = Map<String, Value>;

/// 解析后的一行
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedRow {
    Record(RawRow),
    Invalid(String), // 结构无效（原因）
}

impl ParsedRow {
    pub fn record(&self) -> Option<&RawRow> {
        match self {
            ParsedRow::Record(row) => Some(row),
            ParsedRow::Invalid(_) => None,
        }
    }
}

/// 分节注释前缀
pub const SECTION_MARKER: &str = "===";

// ==========================================
// ImportFormat - 载荷格式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportFormat {
    Json,
    Csv,
}

impl ImportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportFormat::Json => "JSON",
            ImportFormat::Csv => "CSV",
        }
    }

    pub fn parse(s: &str) -> ImportResult<Self> {
        match s.trim().to_uppercase().as_str() {
            "JSON" => Ok(ImportFormat::Json),
            "CSV" => Ok(ImportFormat::Csv),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }

    /// 根据文件扩展名推断格式
    pub fn from_path<P: AsRef<Path>>(path: P) -> ImportResult<Self> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        Self::parse(&ext)
    }
}

impl fmt::Display for ImportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// PayloadParser - 载荷解析器
// ==========================================
pub struct PayloadParser;

impl PayloadParser {
    /// 解析载荷为原始行
    ///
    /// 整体结构无法解析时返回错误（调用方不得修改任何状态）
    pub fn parse(&self, payload: &str, format: ImportFormat) -> ImportResult<Vec<ParsedRow>> {
        let payload = payload.trim_start_matches('\u{feff}');
        match format {
            ImportFormat::Json => self.parse_json(payload),
            ImportFormat::Csv => self.parse_csv(payload),
        }
    }

    fn parse_json(&self, payload: &str) -> ImportResult<Vec<ParsedRow>> {
        let value: Value = serde_json::from_str(payload)?;
        let items = match value {
            Value::Array(items) => items,
            // 单个对象按一行处理
            Value::Object(obj) => return Ok(vec![ParsedRow::Record(obj)]),
            other => {
                return Err(ImportError::InvalidPayload(format!(
                    "期望 JSON 数组，实际为 {}",
                    json_kind(&other)
                )))
            }
        };

        Ok(items
            .into_iter()
            .map(|item| match item {
                Value::Object(obj) => ParsedRow::Record(obj),
                other => ParsedRow::Invalid(format!("元素不是对象: {}", json_kind(&other))),
            })
            .collect())
    }

    fn parse_csv(&self, payload: &str) -> ImportResult<Vec<ParsedRow>> {
        // 剔除分节注释行
        let filtered: String = payload
            .lines()
            .filter(|line| !line.trim_start().starts_with(SECTION_MARKER))
            .collect::<Vec<_>>()
            .join("\n");

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(filtered.as_bytes());

        // 读取表头
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut records = Vec::new();
        for result in reader.records() {
            let record = result?;
            let mut row_map = RawRow::new();

            for (col_idx, value) in record.iter().enumerate() {
                let Some(header) = headers.get(col_idx) else {
                    continue;
                };
                let trimmed = value.trim();
                if header.is_empty() || trimmed.is_empty() {
                    continue;
                }
                row_map.insert(header.clone(), Value::String(trimmed.to_string()));
            }

            // 跳过完全空白的行
            if row_map.is_empty() {
                continue;
            }

            records.push(ParsedRow::Record(row_map));
        }

        Ok(records)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
