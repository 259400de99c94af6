// ==========================================
// 印刷成本估算系统 - 字段映射器
// ==========================================
// 职责: 源列名 → 设备字段路径映射 + 按字段类型强制转换
// 索引: 由默认设备的 JSON 结构生成（叶子字段名在各分组中唯一）
// 规则: 未提供或无法识别的值保留默认值
// 规则: 组合尺寸 "WxH" 按维度拆分，仅覆盖缺失或非正的显式宽/高
// ==========================================

use crate::domain::machine::{Machine, QuantityBreak, SheetSize};
use crate::domain::types::{ColorMode, MachineStatus, MachineType, PricingStrategy};
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::RawRow;
use crate::importer::machine_importer::ImportRowIssue;
use serde_json::{Map, Number, Value};
use std::collections::{HashMap, HashSet};

/// 不接受导入的分组（审计与派生字段由引擎生成）
const PROTECTED_GROUPS: [&str; 2] = ["audit", "computed"];

/// 组合尺寸列（标准化后）
const SHEET_SIZE_COLUMNS: [&str; 3] = ["maxsheet", "maxsheetsize", "sheetsize"];

/// 列名别名（标准化后）→ 叶子字段（标准化后）
const COLUMN_ALIASES: [(&str, &str); 12] = [
    ("code", "machinecode"),
    ("type", "machinetype"),
    ("serial", "serialnumber"),
    ("year", "yearofmanufacture"),
    ("speed", "ratedspeed"),
    ("makeready", "setuptimebase"),
    ("ctp", "platecosteach"),
    ("hourly", "hourlyrate"),
    ("uptime", "uptimepct"),
    ("efficiency", "efficiencypct"),
    ("strategy", "pricingstrategy"),
    ("machineid", "id"),
];

/// 列名标准化: 小写 + 仅保留字母数字
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

// ==========================================
// FieldKind - 字段强制转换类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Integer,
    Float,
    Text,
    Tags,
    Date,
    MachineType,
    MachineStatus,
    ColorMode,
    PricingStrategy,
    QuantityBreaks,
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub group: String, // 分组键，如 "rates"
    pub key: String,   // 叶子键，如 "hourlyRate"
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn path(&self) -> String {
        format!("{}.{}", self.group, self.key)
    }
}

/// 单行映射结果
#[derive(Debug)]
pub struct MappedRow {
    pub document: Value,              // 已叠加到默认设备上的 JSON
    pub warnings: Vec<ImportRowIssue>,
    pub explicit_id: Option<String>,  // 源数据给出的设备ID
    pub explicit_status: Option<MachineStatus>, // 源数据明确给出的状态
}

// ==========================================
// FieldMapper - 字段映射器
// ==========================================
pub struct FieldMapper {
    index: HashMap<String, FieldSpec>,
    groups: HashSet<String>,
    cleaner: DataCleaner,
}

impl FieldMapper {
    /// 从默认设备结构构建字段索引
    pub fn new() -> ImportResult<Self> {
        let template = serde_json::to_value(Machine::with_id(String::new(), ""))
            .map_err(|e| ImportError::InternalError(format!("默认设备序列化失败: {}", e)))?;
        let Value::Object(root) = template else {
            return Err(ImportError::InternalError("默认设备不是 JSON 对象".to_string()));
        };

        let mut index = HashMap::new();
        let mut groups = HashSet::new();
        for (group, fields) in &root {
            if PROTECTED_GROUPS.contains(&group.as_str()) {
                continue;
            }
            let Value::Object(fields) = fields else {
                continue;
            };
            groups.insert(normalize_header(group));
            for (key, default) in fields {
                let spec = FieldSpec {
                    group: group.clone(),
                    key: key.clone(),
                    kind: Self::infer_kind(key, default),
                };
                index.insert(normalize_header(key), spec);
            }
        }

        Ok(Self {
            index,
            groups,
            cleaner: DataCleaner,
        })
    }

    fn infer_kind(key: &str, default: &Value) -> FieldKind {
        match key {
            "machineType" => return FieldKind::MachineType,
            "status" => return FieldKind::MachineStatus,
            "colorMode" => return FieldKind::ColorMode,
            "pricingStrategy" => return FieldKind::PricingStrategy,
            "tags" => return FieldKind::Tags,
            "quantityBreaks" => return FieldKind::QuantityBreaks,
            _ => {}
        }
        match default {
            Value::Bool(_) => FieldKind::Bool,
            Value::Number(n) if n.is_u64() => FieldKind::Integer,
            Value::Number(_) => FieldKind::Float,
            // 可空字段均为日期（购置日期、上次保养日期）
            Value::Null => FieldKind::Date,
            _ => FieldKind::Text,
        }
    }

    /// 查找列对应的字段
    pub fn resolve(&self, header: &str) -> Option<&FieldSpec> {
        let normalized = normalize_header(header);
        let target = COLUMN_ALIASES
            .iter()
            .find(|(alias, _)| *alias == normalized)
            .map(|(_, field)| field.to_string())
            .unwrap_or(normalized);
        self.index.get(&target)
    }

    /// 映射一行: 在 base（默认设备 JSON）上叠加源值
    pub fn map_row(&self, row: &RawRow, row_number: usize, mut base: Value) -> MappedRow {
        let mut warnings = Vec::new();
        let mut explicit: HashMap<String, f64> = HashMap::new();
        let mut explicit_id = None;
        let mut explicit_status = None;
        let mut composite_size: Option<(String, String)> = None;

        for (header, value) in self.flatten(row) {
            if value.is_null() {
                continue;
            }

            let normalized = normalize_header(&header);
            if SHEET_SIZE_COLUMNS.contains(&normalized.as_str()) {
                if let Some(text) = self.cleaner.to_text(&value) {
                    composite_size = Some((header.clone(), text));
                }
                continue;
            }

            let Some(spec) = self.resolve(&header) else {
                tracing::debug!(row = row_number, column = %header, "未识别的列，已忽略");
                continue;
            };

            let Some(coerced) = self.coerce(spec, &value) else {
                if spec.kind != FieldKind::Text {
                    warnings.push(ImportRowIssue::new(
                        row_number,
                        &spec.path(),
                        format!("值 {} 无法识别，已使用默认值", value),
                    ));
                }
                continue;
            };

            if spec.key == "id" {
                if let Value::String(id) = &coerced {
                    explicit_id = Some(id.clone());
                }
                continue;
            }
            if spec.kind == FieldKind::MachineStatus {
                explicit_status = coerced.as_str().and_then(MachineStatus::parse);
            }
            if let Some(v) = coerced.as_f64() {
                explicit.insert(spec.key.clone(), v);
            }
            set_field(&mut base, &spec.group, &spec.key, coerced);
        }

        // 组合尺寸拆分
        if let Some((column, text)) = composite_size {
            let width_ok = explicit.get("maxSheetWidthMm").is_some_and(|w| *w > 0.0);
            let height_ok = explicit.get("maxSheetHeightMm").is_some_and(|h| *h > 0.0);
            match SheetSize::parse(&text) {
                Some(size) => {
                    if !width_ok {
                        set_number(&mut base, "physical", "maxSheetWidthMm", size.width_mm);
                    }
                    if !height_ok {
                        set_number(&mut base, "physical", "maxSheetHeightMm", size.height_mm);
                    }
                }
                None => warnings.push(ImportRowIssue::new(
                    row_number,
                    &column,
                    format!("尺寸 \"{}\" 无法解析（期望 WxH）", text),
                )),
            }
        }

        MappedRow {
            document: base,
            warnings,
            explicit_id,
            explicit_status,
        }
    }

    /// 展开嵌套分组（完整 JSON 记录）为扁平列
    fn flatten(&self, row: &RawRow) -> Vec<(String, Value)> {
        let mut entries = Vec::new();
        for (key, value) in row {
            let normalized = normalize_header(key);
            if PROTECTED_GROUPS.contains(&normalized.as_str()) {
                continue;
            }
            match value {
                Value::Object(fields) if self.groups.contains(&normalized) => {
                    entries.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                _ => entries.push((key.clone(), value.clone())),
            }
        }
        entries
    }

    fn coerce(&self, spec: &FieldSpec, value: &Value) -> Option<Value> {
        let cleaner = &self.cleaner;
        match spec.kind {
            FieldKind::Bool => cleaner.coerce_bool(value).map(Value::Bool),
            FieldKind::Integer => cleaner
                .coerce_number(value)
                .filter(|v| *v >= 0.0)
                .map(|v| Value::from(v.round().min(u32::MAX as f64) as u64)),
            FieldKind::Float => cleaner
                .coerce_number(value)
                .and_then(Number::from_f64)
                .map(Value::Number),
            FieldKind::Text => cleaner.to_text(value).map(Value::String),
            FieldKind::Tags => Some(Value::from(cleaner.split_tags(value))),
            FieldKind::Date => cleaner
                .to_text(value)
                .and_then(|t| cleaner.parse_date(&t))
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
            FieldKind::MachineType => cleaner
                .to_text(value)
                .and_then(|t| MachineType::parse(&t))
                .map(|t| Value::String(t.as_str().to_string())),
            FieldKind::MachineStatus => cleaner
                .to_text(value)
                .and_then(|t| MachineStatus::parse(&t))
                .map(|s| Value::String(s.as_str().to_string())),
            FieldKind::ColorMode => cleaner
                .to_text(value)
                .and_then(|t| ColorMode::parse(&t))
                .map(|c| Value::String(c.as_str().to_string())),
            FieldKind::PricingStrategy => cleaner
                .to_text(value)
                .and_then(|t| PricingStrategy::parse(&t))
                .map(|p| Value::String(p.as_str().to_string())),
            FieldKind::QuantityBreaks => {
                let candidate = match value {
                    Value::String(s) => serde_json::from_str::<Value>(s).ok()?,
                    other => other.clone(),
                };
                serde_json::from_value::<Vec<QuantityBreak>>(candidate.clone())
                    .ok()
                    .map(|_| candidate)
            }
        }
    }
}

fn set_field(doc: &mut Value, group: &str, key: &str, value: Value) {
    if let Some(Value::Object(fields)) = doc.get_mut(group) {
        fields.insert(key.to_string(), value);
    } else if let Value::Object(root) = doc {
        let mut fields = Map::new();
        fields.insert(key.to_string(), value);
        root.insert(group.to_string(), Value::Object(fields));
    }
}

fn set_number(doc: &mut Value, group: &str, key: &str, value: f64) {
    if let Some(n) = Number::from_f64(value) {
        set_field(doc, group, key, Value::Number(n));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapper() -> FieldMapper {
        FieldMapper::new().unwrap()
    }

    fn base() -> Value {
        serde_json::to_value(Machine::with_id("m-1".to_string(), "tester")).unwrap()
    }

    fn row(value: Value) -> RawRow {
        match value {
            Value::Object(obj) => obj,
            _ => panic!("row must be an object"),
        }
    }

    #[test]
    fn test_resolve_aliases_and_case() {
        let m = mapper();
        assert_eq!(m.resolve("Hourly").unwrap().path(), "rates.hourlyRate");
        assert_eq!(m.resolve("hourly_rate").unwrap().path(), "rates.hourlyRate");
        assert_eq!(m.resolve("Uptime%").unwrap().path(), "performance.uptimePct");
        assert_eq!(m.resolve("MakeReady").unwrap().path(), "setup.setupTimeBase");
        assert_eq!(m.resolve("CTP").unwrap().path(), "rates.plateCostEach");
        assert!(m.resolve("changeLog").is_none());
        assert!(m.resolve("totalHourlyCost").is_none());
    }

    #[test]
    fn test_map_row_coerces_types() {
        let m = mapper();
        let mapped = m.map_row(
            &row(json!({
                "Name": "Heidelberg XL 106",
                "Hourly": "145.5",
                "perfecting": "yes",
                "Year": "2019",
                "Type": "offset press",
                "tags": "b1, night shift"
            })),
            1,
            base(),
        );
        let machine: Machine = serde_json::from_value(mapped.document).unwrap();
        assert_eq!(machine.identity.name, "Heidelberg XL 106");
        assert_eq!(machine.rates.hourly_rate, 145.5);
        assert!(machine.capabilities.perfecting);
        assert_eq!(machine.identity.year_of_manufacture, 2019);
        assert_eq!(machine.identity.machine_type, MachineType::OffsetPress);
        assert_eq!(machine.identity.tags, vec!["b1", "night shift"]);
        assert!(mapped.warnings.is_empty());
    }

    #[test]
    fn test_unparseable_number_falls_back_with_warning() {
        let m = mapper();
        let default_rate = Machine::new("t").rates.hourly_rate;
        let mapped = m.map_row(&row(json!({"hourlyRate": "expensive"})), 3, base());
        let machine: Machine = serde_json::from_value(mapped.document).unwrap();
        assert_eq!(machine.rates.hourly_rate, default_rate);
        assert_eq!(mapped.warnings.len(), 1);
        assert_eq!(mapped.warnings[0].row, 3);
        assert_eq!(mapped.warnings[0].field, "rates.hourlyRate");
    }

    #[test]
    fn test_composite_sheet_size_only_when_explicit_missing() {
        let m = mapper();

        let mapped = m.map_row(&row(json!({"MaxSheet": "530x750"})), 1, base());
        let machine: Machine = serde_json::from_value(mapped.document).unwrap();
        assert_eq!(machine.physical.max_sheet_width_mm, 530.0);
        assert_eq!(machine.physical.max_sheet_height_mm, 750.0);

        let mapped = m.map_row(
            &row(json!({"MaxSheet": "530x750", "maxSheetWidthMm": 700, "maxSheetHeightMm": 1000})),
            1,
            base(),
        );
        let machine: Machine = serde_json::from_value(mapped.document).unwrap();
        assert_eq!(machine.physical.max_sheet_width_mm, 700.0);

        let mapped = m.map_row(
            &row(json!({"MaxSheet": "530x750", "maxSheetWidthMm": 0})),
            1,
            base(),
        );
        let machine: Machine = serde_json::from_value(mapped.document).unwrap();
        assert_eq!(machine.physical.max_sheet_width_mm, 530.0);
        assert_eq!(machine.physical.max_sheet_height_mm, 750.0);
    }

    #[test]
    fn test_composite_sheet_size_fills_only_missing_dimension() {
        let m = mapper();
        let mapped = m.map_row(
            &row(json!({"maxSheetWidthMm": "500", "MaxSheet": "720x1020"})),
            1,
            base(),
        );
        let machine: Machine = serde_json::from_value(mapped.document).unwrap();
        assert_eq!(machine.physical.max_sheet_width_mm, 500.0);
        assert_eq!(machine.physical.max_sheet_height_mm, 1020.0);

        let mapped = m.map_row(
            &row(json!({"maxSheetHeightMm": 640, "MaxSheet": "720x1020"})),
            1,
            base(),
        );
        let machine: Machine = serde_json::from_value(mapped.document).unwrap();
        assert_eq!(machine.physical.max_sheet_width_mm, 720.0);
        assert_eq!(machine.physical.max_sheet_height_mm, 640.0);
    }

    #[test]
    fn test_explicit_status_is_reported() {
        let m = mapper();
        let mapped = m.map_row(&row(json!({"Status": "active"})), 1, base());
        assert_eq!(mapped.explicit_status, Some(MachineStatus::Active));

        let mapped = m.map_row(&row(json!({"name": "No status"})), 1, base());
        assert_eq!(mapped.explicit_status, None);
    }

    #[test]
    fn test_nested_groups_flattened_and_protected_ignored() {
        let m = mapper();
        let mapped = m.map_row(
            &row(json!({
                "identity": {"id": "ext-9", "name": "Nested"},
                "rates": {"hourlyRate": 88},
                "computed": {"totalHourlyCost": 99999}
            })),
            1,
            base(),
        );
        assert_eq!(mapped.explicit_id.as_deref(), Some("ext-9"));
        let machine: Machine = serde_json::from_value(mapped.document).unwrap();
        assert_eq!(machine.identity.name, "Nested");
        assert_eq!(machine.rates.hourly_rate, 88.0);
        assert_eq!(machine.computed.total_hourly_cost, 0.0);
    }
}
