// ==========================================
// 印刷成本估算系统 - 数据清洗器
// ==========================================
// 职责: TRIM / NULL 标准化 / 松散类型强制转换
// 规则: 字符串 "true"/"yes"/"1" → true，其余字符串 → false
// 规则: 数值型字符串 → 数值，否则返回 None（由调用方回退默认值）
// ==========================================

use chrono::NaiveDate;
use serde_json::Value;

/// 视为 true 的字符串（小写比较）
const TRUTHY: [&str; 6] = ["true", "yes", "1", "y", "on", "是"];

pub struct DataCleaner;

impl DataCleaner {
    pub fn clean_text(&self, value: &str, uppercase: bool) -> String {
        let trimmed = value.trim();
        if uppercase {
            trimmed.to_uppercase()
        } else {
            trimmed.to_string()
        }
    }

    pub fn normalize_null(&self, value: Option<String>) -> Option<String> {
        value.and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    /// 任意标量 → 文本（null 返回 None）
    pub fn to_text(&self, value: &Value) -> Option<String> {
        match value {
            Value::Null => None,
            Value::String(s) => self.normalize_null(Some(s.clone())),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Array(_) | Value::Object(_) => Some(value.to_string()),
        }
    }

    /// 布尔强制转换
    pub fn coerce_bool(&self, value: &Value) -> Option<bool> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_f64().map(|v| v != 0.0),
            Value::String(s) => {
                let lower = s.trim().to_lowercase();
                Some(TRUTHY.contains(&lower.as_str()))
            }
            _ => None,
        }
    }

    /// 数值强制转换（容忍千分位、货币符号、百分号）
    pub fn coerce_number(&self, value: &Value) -> Option<f64> {
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => {
                let cleaned: String = s
                    .trim()
                    .trim_start_matches(['$', '¥', '€', '£'])
                    .trim_end_matches('%')
                    .chars()
                    .filter(|c| *c != ',' && !c.is_whitespace())
                    .collect();
                if cleaned.is_empty() {
                    None
                } else {
                    cleaned.parse::<f64>().ok()
                }
            }
            _ => None,
        };
        parsed.filter(|v| v.is_finite())
    }

    /// 标签拆分（逗号/分号/竖线），去重保序
    pub fn split_tags(&self, value: &Value) -> Vec<String> {
        let raw: Vec<String> = match value {
            Value::Array(items) => items.iter().filter_map(|v| self.to_text(v)).collect(),
            Value::String(s) => s
                .split([',', ';', '|'])
                .map(|t| t.trim().to_string())
                .collect(),
            _ => vec![],
        };

        let mut tags: Vec<String> = Vec::new();
        for tag in raw {
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags
    }

    /// 日期解析（YYYY-MM-DD / YYYYMMDD / YYYY/MM/DD）
    pub fn parse_date(&self, value: &str) -> Option<NaiveDate> {
        let value = value.trim();
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(value, "%Y%m%d"))
            .or_else(|_| NaiveDate::parse_from_str(value, "%Y/%m/%d"))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_text_basic() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.clean_text("  hello  ", false), "hello");
        assert_eq!(cleaner.clean_text("  hello  ", true), "HELLO");
    }

    #[test]
    fn test_normalize_null() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.normalize_null(Some("   ".to_string())), None);
        assert_eq!(cleaner.normalize_null(Some(" a ".to_string())), Some("a".to_string()));
    }

    #[test]
    fn test_coerce_bool() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.coerce_bool(&json!("true")), Some(true));
        assert_eq!(cleaner.coerce_bool(&json!("YES")), Some(true));
        assert_eq!(cleaner.coerce_bool(&json!("1")), Some(true));
        assert_eq!(cleaner.coerce_bool(&json!("nope")), Some(false));
        assert_eq!(cleaner.coerce_bool(&json!(0)), Some(false));
        assert_eq!(cleaner.coerce_bool(&json!(null)), None);
    }

    #[test]
    fn test_coerce_number() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.coerce_number(&json!("1,250.5")), Some(1250.5));
        assert_eq!(cleaner.coerce_number(&json!("$120")), Some(120.0));
        assert_eq!(cleaner.coerce_number(&json!("95%")), Some(95.0));
        assert_eq!(cleaner.coerce_number(&json!(42)), Some(42.0));
        assert_eq!(cleaner.coerce_number(&json!("fast")), None);
        assert_eq!(cleaner.coerce_number(&json!(true)), None);
    }

    #[test]
    fn test_split_tags() {
        let cleaner = DataCleaner;
        assert_eq!(
            cleaner.split_tags(&json!("offset; b2 ,offset|night")),
            vec!["offset", "b2", "night"]
        );
        assert_eq!(cleaner.split_tags(&json!(["a", "", "b"])), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_date() {
        let cleaner = DataCleaner;
        let expected = NaiveDate::from_ymd_opt(2021, 3, 15);
        assert_eq!(cleaner.parse_date("2021-03-15"), expected);
        assert_eq!(cleaner.parse_date("20210315"), expected);
        assert_eq!(cleaner.parse_date("15.03.2021"), None);
    }
}
