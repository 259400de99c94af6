// ==========================================
// 印刷成本估算系统 - 设备导入/对账流水线
// ==========================================
// 流程: 解析 → 字段映射与强制转换 → 默认值补全 → 组合字段拆分
//       → IMPORT 变更日志（共享批次ID） → 重算 → 校验 → 按策略合并
// 行级: CRITICAL 行拒绝并记录；WARNING/ERROR 行接受并记录
// 批级: 在工作副本上一次性合并，由注册表整体替换（一次快照、一次持久化）
// ==========================================

use crate::domain::change_log::ChangeLogEntry;
use crate::domain::machine::Machine;
use crate::domain::types::MachineStatus;
use crate::engine::recalc::RecalcEngine;
use crate::engine::validator::{MachineValidator, Severity};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::FieldMapper;
use crate::importer::file_parser::{ImportFormat, ParsedRow, PayloadParser, RawRow};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

// ==========================================
// MergeStrategy - 合并策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeStrategy {
    Merge,   // 按ID更新或插入
    Replace, // 先清空现有注册表
    Append,  // ID冲突时生成新ID，仍冲突则跳过
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::Merge => "MERGE",
            MergeStrategy::Replace => "REPLACE",
            MergeStrategy::Append => "APPEND",
        }
    }

    pub fn parse(s: &str) -> ImportResult<Self> {
        match s.trim().to_uppercase().as_str() {
            "MERGE" => Ok(MergeStrategy::Merge),
            "REPLACE" => Ok(MergeStrategy::Replace),
            "APPEND" => Ok(MergeStrategy::Append),
            other => Err(ImportError::UnsupportedStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// ImportRowIssue - 行级问题
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRowIssue {
    pub row: usize,       // 数据行号（从 1 开始，不含表头）
    pub field: String,
    pub message: String,
}

impl ImportRowIssue {
    pub fn new(row: usize, field: &str, message: impl Into<String>) -> Self {
        Self {
            row,
            field: field.to_string(),
            message: message.into(),
        }
    }
}

// ==========================================
// ImportReport - 导入结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub success: bool,
    pub total_records: usize,
    pub imported: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<ImportRowIssue>,
    pub warnings: Vec<ImportRowIssue>,
    pub batch_id: String,
}

impl ImportReport {
    fn new(batch_id: &str) -> Self {
        Self {
            success: true,
            total_records: 0,
            imported: 0,
            updated: 0,
            skipped: 0,
            errors: vec![],
            warnings: vec![],
            batch_id: batch_id.to_string(),
        }
    }

    /// 摘要文本（CLI / 日志用）
    pub fn summary_text(&self) -> String {
        format!(
            "批次 {}: 共 {} 行, 新增 {}, 更新 {}, 跳过 {}, 错误 {}, 警告 {}",
            self.batch_id,
            self.total_records,
            self.imported,
            self.updated,
            self.skipped,
            self.errors.len(),
            self.warnings.len()
        )
    }
}

/// 导入结果: 合并后的工作副本 + 报告
#[derive(Debug)]
pub struct ImportOutcome {
    pub machines: HashMap<String, Machine>,
    pub machine_order: Vec<String>,
    pub report: ImportReport,
}

/// 通过校验的候选行
#[derive(Debug)]
struct Candidate {
    row: usize,
    machine: Machine,
    explicit_status: Option<MachineStatus>,
}

// ==========================================
// MachineImporter - 导入流水线
// ==========================================
pub struct MachineImporter {
    parser: PayloadParser,
    mapper: FieldMapper,
    recalc: RecalcEngine,
    validator: MachineValidator,
    actor: String,
}

impl MachineImporter {
    pub fn new(actor: &str) -> ImportResult<Self> {
        Ok(Self {
            parser: PayloadParser,
            mapper: FieldMapper::new()?,
            recalc: RecalcEngine::new(),
            validator: MachineValidator::new(),
            actor: actor.to_string(),
        })
    }

    /// 执行导入（纯函数: 不修改 existing，返回新的工作副本）
    ///
    /// 载荷整体无法解析时返回 Err，调用方状态保持不变
    #[tracing::instrument(skip(self, payload, existing, existing_order), fields(batch_id = tracing::field::Empty))]
    pub fn run(
        &self,
        payload: &str,
        format: ImportFormat,
        strategy: MergeStrategy,
        existing: &HashMap<String, Machine>,
        existing_order: &[String],
    ) -> ImportResult<ImportOutcome> {
        let rows = self.parser.parse(payload, format)?;

        let batch_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("batch_id", batch_id.as_str());

        let mut report = ImportReport::new(&batch_id);
        report.total_records = rows.len();

        let candidates = self.normalize_rows(&rows, &batch_id, &mut report);

        let (mut machines, mut machine_order) = match strategy {
            MergeStrategy::Replace => (HashMap::new(), Vec::new()),
            MergeStrategy::Merge | MergeStrategy::Append => {
                (existing.clone(), existing_order.to_vec())
            }
        };

        for candidate in candidates {
            self.apply_candidate(
                candidate,
                strategy,
                &mut machines,
                &mut machine_order,
                &mut report,
            );
        }

        report.success = report.errors.is_empty();
        tracing::info!(
            format = %format,
            strategy = %strategy,
            total = report.total_records,
            imported = report.imported,
            updated = report.updated,
            skipped = report.skipped,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "导入完成"
        );

        Ok(ImportOutcome {
            machines,
            machine_order,
            report,
        })
    }

    /// 行规范化: 映射 → 补全 → 日志 → 重算 → 校验
    fn normalize_rows(
        &self,
        rows: &[ParsedRow],
        batch_id: &str,
        report: &mut ImportReport,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::with_capacity(rows.len());

        for (idx, parsed) in rows.iter().enumerate() {
            let row = idx + 1;
            let result = match parsed {
                ParsedRow::Record(raw) => self.normalize_row(raw, row, batch_id, report),
                ParsedRow::Invalid(reason) => Err(ImportRowIssue::new(row, "row", reason.as_str())),
            };
            match result {
                Ok(candidate) => candidates.push(candidate),
                Err(issue) => {
                    tracing::debug!(row = row, field = %issue.field, "行被拒绝: {}", issue.message);
                    report.errors.push(issue);
                }
            }
        }

        candidates
    }

    fn normalize_row(
        &self,
        raw: &RawRow,
        row: usize,
        batch_id: &str,
        report: &mut ImportReport,
    ) -> Result<Candidate, ImportRowIssue> {
        let defaults = Machine::new(&self.actor);
        let base = serde_json::to_value(&defaults)
            .map_err(|e| ImportRowIssue::new(row, "row", format!("默认值生成失败: {}", e)))?;

        let mapped = self.mapper.map_row(raw, row, base);
        report.warnings.extend(mapped.warnings);

        let mut machine: Machine = serde_json::from_value(mapped.document)
            .map_err(|e| ImportRowIssue::new(row, "row", format!("记录结构无效: {}", e)))?;

        if let Some(id) = mapped.explicit_id.filter(|id| !id.trim().is_empty()) {
            machine.identity.id = id.trim().to_string();
        }

        // ARCHIVED 状态与归档标记保持一致
        if machine.identity.status == MachineStatus::Archived {
            machine.audit.is_archived = true;
            machine.audit.archived_at = Some(Utc::now());
            machine.audit.archived_by = Some(self.actor.clone());
        }

        machine.append_log(ChangeLogEntry::import(&self.actor, batch_id));
        self.recalc.recalculate_in_place(&mut machine);

        let validation = self.validator.validate(&machine);
        if !validation.is_valid {
            let critical = validation.critical_issues();
            let field = critical
                .first()
                .map(|i| i.field.clone())
                .unwrap_or_else(|| "row".to_string());
            let message = critical
                .iter()
                .map(|i| format!("[{}] {}", i.code, i.message))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ImportRowIssue::new(row, &field, message));
        }

        // ERROR / WARNING 不阻断，记入警告
        for issue in validation
            .errors
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .chain(validation.warnings.iter())
        {
            report.warnings.push(ImportRowIssue::new(
                row,
                &issue.field,
                format!("[{}] {}", issue.code, issue.message),
            ));
        }

        Ok(Candidate {
            row,
            machine,
            explicit_status: mapped.explicit_status,
        })
    }

    fn apply_candidate(
        &self,
        candidate: Candidate,
        strategy: MergeStrategy,
        machines: &mut HashMap<String, Machine>,
        machine_order: &mut Vec<String>,
        report: &mut ImportReport,
    ) {
        let Candidate {
            row,
            mut machine,
            explicit_status,
        } = candidate;
        let id = machine.id().to_string();

        if strategy == MergeStrategy::Append && machines.contains_key(&id) {
            let new_id = append_id(&id);
            if machines.contains_key(&new_id) {
                report.skipped += 1;
                report.warnings.push(ImportRowIssue::new(
                    row,
                    "identity.id",
                    format!("ID {} 冲突且重新分配后仍冲突，已跳过", id),
                ));
                return;
            }
            machine.identity.id = new_id.clone();
            machine_order.push(new_id.clone());
            machines.insert(new_id, machine);
            report.imported += 1;
            return;
        }

        match machines.get(&id) {
            Some(existing) => {
                merge_audit(&mut machine, existing, explicit_status);
                machines.insert(id, machine);
                report.updated += 1;
            }
            None => {
                machine_order.push(id.clone());
                machines.insert(id, machine);
                report.imported += 1;
            }
        }
    }
}

/// APPEND 冲突时的新ID: {id}-{timestamp}-{rand}
fn append_id(id: &str) -> String {
    let rand = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", id, Utc::now().timestamp_millis(), &rand[..8])
}

/// MERGE: 保留既有创建信息与变更日志，版本号递增
///
/// 既有记录已归档时保持 ARCHIVED 及归档标记，除非该行明确给出非 ARCHIVED 状态（视为恢复）
fn merge_audit(incoming: &mut Machine, existing: &Machine, explicit_status: Option<MachineStatus>) {
    let mut change_log = existing.audit.change_log.clone();
    change_log.append(&mut incoming.audit.change_log);

    incoming.audit.created_at = existing.audit.created_at;
    incoming.audit.created_by = existing.audit.created_by.clone();
    incoming.audit.version = existing.audit.version + 1;
    incoming.audit.change_log = change_log;

    let unarchived = explicit_status.is_some_and(|s| s != MachineStatus::Archived);
    if existing.audit.is_archived && !unarchived {
        incoming.identity.status = MachineStatus::Archived;
        incoming.audit.is_archived = true;
        incoming.audit.archived_at = existing.audit.archived_at;
        incoming.audit.archived_by = existing.audit.archived_by.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::change_log::ChangeAction;

    fn importer() -> MachineImporter {
        MachineImporter::new("importer").unwrap()
    }

    fn existing_fleet() -> (HashMap<String, Machine>, Vec<String>) {
        let recalc = RecalcEngine::new();
        let mut machines = HashMap::new();
        let mut order = Vec::new();
        for id in ["m-1", "m-2"] {
            let mut m = Machine::with_id(id.to_string(), "seed");
            m.identity.name = format!("Seed {}", id);
            recalc.recalculate_in_place(&mut m);
            order.push(id.to_string());
            machines.insert(id.to_string(), m);
        }
        (machines, order)
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!(MergeStrategy::parse("merge").unwrap(), MergeStrategy::Merge);
        assert_eq!(MergeStrategy::parse(" Replace ").unwrap(), MergeStrategy::Replace);
        assert!(MergeStrategy::parse("upsert").is_err());
    }

    #[test]
    fn test_replace_rejects_critical_rows() {
        let (machines, order) = existing_fleet();
        let payload = r#"[
            {"id": "a", "name": "A", "hourlyRate": 120},
            {"id": "b", "name": "B", "hourlyRate": -1},
            {"id": "c", "name": "C", "ratedSpeed": 0}
        ]"#;
        let outcome = importer()
            .run(payload, ImportFormat::Json, MergeStrategy::Replace, &machines, &order)
            .unwrap();

        assert_eq!(outcome.machines.len(), 1);
        assert_eq!(outcome.machine_order, vec!["a".to_string()]);
        assert_eq!(outcome.report.total_records, 3);
        assert_eq!(outcome.report.imported, 1);
        assert_eq!(outcome.report.errors.len(), 2);
        assert_eq!(outcome.report.errors[0].row, 2);
        assert_eq!(outcome.report.errors[0].field, "rates.hourlyRate");
        assert!(!outcome.report.success);
    }

    #[test]
    fn test_merge_preserves_created_audit_and_appends_log() {
        let (machines, order) = existing_fleet();
        let created_at = machines["m-1"].audit.created_at;
        let payload = r#"[{"id": "m-1", "name": "Renamed", "hourlyRate": "130"}, {"id": "m-3"}]"#;

        let outcome = importer()
            .run(payload, ImportFormat::Json, MergeStrategy::Merge, &machines, &order)
            .unwrap();

        assert_eq!(outcome.report.updated, 1);
        assert_eq!(outcome.report.imported, 1);
        assert_eq!(outcome.machine_order, vec!["m-1", "m-2", "m-3"]);

        let merged = &outcome.machines["m-1"];
        assert_eq!(merged.identity.name, "Renamed");
        assert_eq!(merged.rates.hourly_rate, 130.0);
        assert_eq!(merged.audit.created_at, created_at);
        assert_eq!(merged.audit.created_by, "seed");
        assert_eq!(merged.audit.version, 2);
        let last = merged.audit.change_log.last().unwrap();
        assert_eq!(last.action, ChangeAction::Import);
        assert_eq!(last.batch_id.as_deref(), Some(outcome.report.batch_id.as_str()));

        // 原注册表不受影响
        assert_eq!(machines["m-1"].identity.name, "Seed m-1");
    }

    #[test]
    fn test_append_reassigns_colliding_ids() {
        let (machines, order) = existing_fleet();
        let payload = "id,name\nm-1,Clash\nm-9,Fresh\n";
        let outcome = importer()
            .run(payload, ImportFormat::Csv, MergeStrategy::Append, &machines, &order)
            .unwrap();

        assert_eq!(outcome.report.imported, 2);
        assert_eq!(outcome.report.updated, 0);
        assert_eq!(outcome.machines.len(), 4);
        let reassigned = &outcome.machine_order[2];
        assert!(reassigned.starts_with("m-1-"));
        assert_eq!(outcome.machines[reassigned].identity.name, "Clash");
        assert_eq!(outcome.machines["m-1"].identity.name, "Seed m-1");
    }

    #[test]
    fn test_warning_rows_accepted_and_reported() {
        let payload = "name,hourlyRate,effectiveSpeed,ratedSpeed\nZero,0,9000,10000\nFast,100,12000,10000\n";
        let outcome = importer()
            .run(payload, ImportFormat::Csv, MergeStrategy::Merge, &HashMap::new(), &[])
            .unwrap();

        assert_eq!(outcome.report.imported, 2);
        assert!(outcome.report.success);
        assert!(outcome.report.warnings.iter().any(|w| w.row == 1 && w.message.contains("ZERO_HOURLY_RATE")));
        assert!(outcome.report.warnings.iter().any(|w| w.row == 2 && w.message.contains("SPEED_EXCEEDS_RATED")));
    }

    #[test]
    fn test_rows_without_id_get_fresh_ids_and_computed_fields() {
        let payload = r#"[{"name": "No Id"}]"#;
        let outcome = importer()
            .run(payload, ImportFormat::Json, MergeStrategy::Merge, &HashMap::new(), &[])
            .unwrap();
        let id = &outcome.machine_order[0];
        let machine = &outcome.machines[id];
        assert!(!id.is_empty());
        assert!(RecalcEngine::new().is_consistent(machine));
        assert!(machine.computed.total_hourly_cost > 0.0);
    }

    #[test]
    fn test_non_object_json_elements_become_row_errors() {
        let payload = r#"[{"name": "A"}, "oops", {"name": "B"}]"#;
        let outcome = importer()
            .run(payload, ImportFormat::Json, MergeStrategy::Replace, &HashMap::new(), &[])
            .unwrap();

        assert_eq!(outcome.report.total_records, 3);
        assert_eq!(outcome.report.imported, 2);
        assert_eq!(outcome.report.errors.len(), 1);
        assert_eq!(outcome.report.errors[0].row, 2);
        assert_eq!(outcome.report.errors[0].field, "row");
        assert!(!outcome.report.success);
    }

    #[test]
    fn test_merge_into_archived_record() {
        let (mut machines, order) = existing_fleet();
        let archived_at = Utc::now();
        {
            let m = machines.get_mut("m-2").unwrap();
            m.identity.status = MachineStatus::Archived;
            m.audit.is_archived = true;
            m.audit.archived_at = Some(archived_at);
            m.audit.archived_by = Some("seed".to_string());
        }

        let outcome = importer()
            .run(r#"[{"id": "m-2", "name": "Still archived"}]"#, ImportFormat::Json, MergeStrategy::Merge, &machines, &order)
            .unwrap();
        let merged = &outcome.machines["m-2"];
        assert_eq!(merged.identity.status, MachineStatus::Archived);
        assert!(merged.audit.is_archived);
        assert_eq!(merged.audit.archived_at, Some(archived_at));

        let outcome = importer()
            .run(r#"[{"id": "m-2", "status": "ACTIVE"}]"#, ImportFormat::Json, MergeStrategy::Merge, &machines, &order)
            .unwrap();
        let merged = &outcome.machines["m-2"];
        assert_eq!(merged.identity.status, MachineStatus::Active);
        assert!(!merged.audit.is_archived);
        assert!(merged.audit.archived_at.is_none());
    }

    #[test]
    fn test_archived_status_row_sets_archive_flags() {
        let outcome = importer()
            .run("name,status
Old,ARCHIVED
", ImportFormat::Csv, MergeStrategy::Replace, &HashMap::new(), &[])
            .unwrap();
        let machine = &outcome.machines[&outcome.machine_order[0]];
        assert!(machine.audit.is_archived);
        assert_eq!(machine.audit.archived_by.as_deref(), Some("importer"));
    }

    #[test]
    fn test_unparseable_payload_is_an_error() {
        let result = importer().run("not json", ImportFormat::Json, MergeStrategy::Merge, &HashMap::new(), &[]);
        assert!(matches!(result, Err(ImportError::JsonParseError(_))));
    }
}
