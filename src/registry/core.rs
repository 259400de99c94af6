// ==========================================
// 印刷成本估算系统 - 设备注册表（变更路径）
// ==========================================
// 状态: machines 映射 + machine_order 显示顺序 + 二级索引
// 流程: 构建新记录 → 重算 → 校验 → 快照 → 替换 → 重建索引 → 标脏 → 持久化
// 红线: 单记录变更全有或全无（校验失败时注册表保持不变）
// 红线: 派生字段只由重算器写入；审计字段只由注册表写入
// 持久化: 尽力而为，失败仅记录日志，不回滚内存状态
// ==========================================

use crate::config::EngineConfig;
use crate::domain::change_log::{ChangeAction, ChangeLogEntry};
use crate::domain::machine::{AuditInfo, Machine};
use crate::domain::types::MachineStatus;
use crate::engine::cost::CostCalculator;
use crate::engine::recalc::RecalcEngine;
use crate::engine::validator::MachineValidator;
use crate::importer::exporter::MachineExporter;
use crate::importer::file_parser::ImportFormat;
use crate::importer::machine_importer::{ImportReport, MachineImporter, MergeStrategy};
use crate::registry::error::{RegistryError, RegistryResult};
use crate::registry::history::{HistoryManager, RegistrySnapshot};
use crate::registry::indices::RegistryIndices;
use crate::repository::machine_store_repo::{MachineStore, PersistedRegistry};
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::instrument;

/// 永久删除确认口令
pub const PURGE_CONFIRMATION_TOKEN: &str = "PURGE-MACHINE";

/// 复制设备默认名称后缀
pub const COPY_SUFFIX: &str = " (Copy)";

// ==========================================
// MachineRegistry - 设备注册表
// ==========================================
pub struct MachineRegistry {
    pub(crate) machines: HashMap<String, Machine>,
    pub(crate) machine_order: Vec<String>,
    pub(crate) indices: RegistryIndices,
    history: HistoryManager,
    recalc: RecalcEngine,
    validator: MachineValidator,
    pub(crate) calculator: CostCalculator,
    config: EngineConfig,
    actor: String,
    store: Option<Box<dyn MachineStore>>,
    dirty: bool,
}

impl MachineRegistry {
    /// 创建空注册表（不持久化）
    pub fn new(config: EngineConfig) -> Self {
        Self {
            machines: HashMap::new(),
            machine_order: Vec::new(),
            indices: RegistryIndices::default(),
            history: HistoryManager::new(config.history_depth),
            recalc: RecalcEngine::new(),
            validator: MachineValidator::new(),
            calculator: CostCalculator::new(config.heavy_stock_gsm, config.light_stock_gsm),
            actor: config.default_actor.clone(),
            config,
            store: None,
            dirty: false,
        }
    }

    /// 创建空注册表，变更后写入 store
    pub fn with_store(config: EngineConfig, store: Box<dyn MachineStore>) -> Self {
        let mut registry = Self::new(config);
        registry.store = Some(store);
        registry
    }

    /// 从 store 加载注册表
    ///
    /// 加载时重算所有设备的派生字段，并修复显示顺序与映射不一致的情况
    #[instrument(skip(store, config))]
    pub fn load(store: Box<dyn MachineStore>, config: EngineConfig) -> RegistryResult<Self> {
        let persisted = store.load()?;
        let mut registry = Self::with_store(config, store);

        let Some(persisted) = persisted else {
            tracing::info!("未找到已保存的注册表，使用空注册表");
            return Ok(registry);
        };

        let schema_version = persisted.schema_version;
        let mut machines: HashMap<String, Machine> = HashMap::new();
        for (id, mut machine) in persisted.machines {
            machine.identity.id = id.clone();
            registry.recalc.recalculate_in_place(&mut machine);
            machines.insert(id, machine);
        }

        let mut order: Vec<String> = Vec::with_capacity(machines.len());
        for id in persisted.machine_order {
            if machines.contains_key(&id) && !order.contains(&id) {
                order.push(id);
            }
        }
        let mut orphans: Vec<String> = machines
            .keys()
            .filter(|id| !order.contains(id))
            .cloned()
            .collect();
        if !orphans.is_empty() {
            tracing::warn!(count = orphans.len(), "显示顺序缺少部分设备，已追加到末尾");
            orphans.sort();
            order.extend(orphans);
        }

        registry.machines = machines;
        registry.machine_order = order;
        registry.rebuild_indices();

        tracing::info!(
            schema_version = schema_version,
            machines = registry.machines.len(),
            "注册表加载完成"
        );
        Ok(registry)
    }

    // ==========================================
    // 基础访问
    // ==========================================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// 设置当前操作人（写入审计字段）
    pub fn set_actor(&mut self, actor: &str) {
        self.actor = actor.to_string();
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    /// 是否有未成功写入存储的变更
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn machine_order(&self) -> &[String] {
        &self.machine_order
    }

    pub fn indices(&self) -> &RegistryIndices {
        &self.indices
    }

    /// 当前状态快照（深拷贝）
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            machines: self.machines.clone(),
            machine_order: self.machine_order.clone(),
        }
    }

    // ==========================================
    // 单记录变更
    // ==========================================

    /// 新增设备: 默认值 + 编辑闭包 → CREATE 日志 → 重算 → 校验
    #[instrument(skip(self, edit), fields(machine_id = tracing::field::Empty))]
    pub fn add<F>(&mut self, edit: F) -> RegistryResult<Machine>
    where
        F: FnOnce(&mut Machine),
    {
        let mut machine = Machine::new(&self.actor);
        let id = machine.id().to_string();
        tracing::Span::current().record("machine_id", id.as_str());

        edit(&mut machine);
        machine.identity.id = id.clone();
        machine.audit = AuditInfo::new(&self.actor);
        machine.append_log(ChangeLogEntry::action(ChangeAction::Create, &self.actor));

        let machine = self.prepare(machine)?;

        let before = self.snapshot();
        self.machines.insert(id.clone(), machine.clone());
        self.machine_order.push(id);
        self.commit(Some(before));

        tracing::info!(name = %machine.identity.name, "设备已新增");
        Ok(machine)
    }

    /// 更新设备: 编辑闭包 → 逐字段 UPDATE 日志 → 重算 → 校验
    ///
    /// 没有任何字段变化时不产生快照，直接返回当前记录
    #[instrument(skip(self, edit))]
    pub fn update<F>(&mut self, machine_id: &str, edit: F) -> RegistryResult<Machine>
    where
        F: FnOnce(&mut Machine),
    {
        let existing = self.require(machine_id)?.clone();

        let mut candidate = existing.clone();
        edit(&mut candidate);
        // 不可变字段与审计字段只由注册表维护
        candidate.identity.id = existing.identity.id.clone();
        candidate.audit = existing.audit.clone();

        let changes = diff_fields(&existing, &candidate);
        if changes.is_empty() {
            tracing::debug!("无字段变化");
            return Ok(existing);
        }

        for (field, old_value, new_value) in &changes {
            candidate.append_log(ChangeLogEntry::field_change(
                &self.actor,
                field,
                old_value.clone(),
                new_value.clone(),
            ));
        }
        self.touch(&mut candidate);

        let candidate = self.prepare(candidate)?;
        let before = self.snapshot();
        self.machines.insert(machine_id.to_string(), candidate.clone());
        self.commit(Some(before));

        tracing::info!(changed_fields = changes.len(), "设备已更新");
        Ok(candidate)
    }

    /// 软删除（归档），不移除记录
    #[instrument(skip(self))]
    pub fn delete(&mut self, machine_id: &str) -> RegistryResult<Machine> {
        let existing = self.require(machine_id)?;
        if existing.audit.is_archived {
            return Ok(existing.clone());
        }

        let archived = self.archive_copy(existing);
        let before = self.snapshot();
        self.machines.insert(machine_id.to_string(), archived.clone());
        self.commit(Some(before));

        tracing::info!("设备已归档");
        Ok(archived)
    }

    /// 永久删除（需确认口令，不可撤销）
    ///
    /// 不产生快照，并从所有保留的撤销/重做快照中移除该设备
    #[instrument(skip(self, confirmation))]
    pub fn permanently_delete(
        &mut self,
        machine_id: &str,
        confirmation: &str,
    ) -> RegistryResult<Machine> {
        if confirmation != PURGE_CONFIRMATION_TOKEN {
            return Err(RegistryError::Confirmation {
                id: machine_id.to_string(),
            });
        }
        let removed = self
            .machines
            .remove(machine_id)
            .ok_or_else(|| RegistryError::NotFound {
                id: machine_id.to_string(),
            })?;
        self.machine_order.retain(|id| id != machine_id);
        self.history.purge_machine(machine_id);
        self.commit(None);

        tracing::warn!(actor = %self.actor, "设备已永久删除");
        Ok(removed)
    }

    /// 复制设备: 新ID，清空审计轨迹，名称追加 " (Copy)"（可覆盖）
    #[instrument(skip(self))]
    pub fn duplicate(
        &mut self,
        machine_id: &str,
        name_override: Option<&str>,
    ) -> RegistryResult<Machine> {
        let source = self.require(machine_id)?.clone();
        let name = match name_override.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => format!("{}{}", source.identity.name, COPY_SUFFIX),
        };

        let mut copy = Machine::new(&self.actor);
        let id = copy.id().to_string();
        copy.identity = source.identity.clone();
        copy.identity.id = id.clone();
        copy.identity.name = name;
        if copy.identity.status == MachineStatus::Archived {
            copy.identity.status = MachineStatus::Active;
        }
        copy.physical = source.physical.clone();
        copy.color = source.color.clone();
        copy.speed = source.speed.clone();
        copy.setup = source.setup.clone();
        copy.rates = source.rates.clone();
        copy.labor = source.labor.clone();
        copy.facility = source.facility.clone();
        copy.consumables = source.consumables.clone();
        copy.depreciation = source.depreciation.clone();
        copy.maintenance = source.maintenance.clone();
        copy.energy = source.energy.clone();
        copy.pricing = source.pricing.clone();
        copy.capabilities = source.capabilities.clone();
        copy.performance = source.performance.clone();

        let copy = self.prepare(copy)?;
        let before = self.snapshot();
        self.machines.insert(id.clone(), copy.clone());
        self.machine_order.push(id.clone());
        self.commit(Some(before));

        tracing::info!(new_id = %id, "设备已复制");
        Ok(copy)
    }

    /// 恢复已归档设备，状态重置为 ACTIVE
    #[instrument(skip(self))]
    pub fn restore(&mut self, machine_id: &str) -> RegistryResult<Machine> {
        let existing = self.require(machine_id)?;
        if !existing.audit.is_archived {
            return Ok(existing.clone());
        }

        let mut machine = existing.clone();
        machine.audit.is_archived = false;
        machine.audit.archived_at = None;
        machine.audit.archived_by = None;
        machine.identity.status = MachineStatus::Active;
        machine.append_log(ChangeLogEntry::action(ChangeAction::Restore, &self.actor));
        self.touch(&mut machine);

        let before = self.snapshot();
        self.machines.insert(machine_id.to_string(), machine.clone());
        self.commit(Some(before));

        tracing::info!("设备已恢复");
        Ok(machine)
    }

    // ==========================================
    // 批量变更（一次快照）
    // ==========================================

    /// 批量更新: 任一记录不存在或校验失败则整体不生效
    #[instrument(skip(self, ids, edit), fields(count = ids.len()))]
    pub fn bulk_update<F>(&mut self, ids: &[String], edit: F) -> RegistryResult<Vec<Machine>>
    where
        F: Fn(&mut Machine),
    {
        let mut staged: Vec<Machine> = Vec::with_capacity(ids.len());

        for id in ids {
            let existing = self.require(id)?;
            let mut candidate = existing.clone();
            edit(&mut candidate);
            candidate.identity.id = existing.identity.id.clone();
            candidate.audit = existing.audit.clone();

            let changes = diff_fields(existing, &candidate);
            if changes.is_empty() {
                continue;
            }
            for (field, old_value, new_value) in changes {
                candidate.append_log(ChangeLogEntry::field_change(
                    &self.actor,
                    &field,
                    old_value,
                    new_value,
                ));
            }
            self.touch(&mut candidate);
            staged.push(self.prepare(candidate)?);
        }

        if staged.is_empty() {
            return Ok(staged);
        }

        let before = self.snapshot();
        for machine in &staged {
            self.machines.insert(machine.id().to_string(), machine.clone());
        }
        self.commit(Some(before));

        tracing::info!(updated = staged.len(), "批量更新完成");
        Ok(staged)
    }

    /// 批量归档: 任一ID不存在则整体不生效；返回实际归档数
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub fn bulk_delete(&mut self, ids: &[String]) -> RegistryResult<usize> {
        let mut staged: Vec<Machine> = Vec::new();
        for id in ids {
            let existing = self.require(id)?;
            let already_staged = staged.iter().any(|m| m.id() == id.as_str());
            if !existing.audit.is_archived && !already_staged {
                staged.push(self.archive_copy(existing));
            }
        }

        if staged.is_empty() {
            return Ok(0);
        }

        let before = self.snapshot();
        let archived = staged.len();
        for machine in staged {
            self.machines.insert(machine.id().to_string(), machine);
        }
        self.commit(Some(before));

        tracing::info!(archived = archived, "批量归档完成");
        Ok(archived)
    }

    /// 导入: 在工作副本上对账后整体替换（一次快照、一次持久化）
    ///
    /// 载荷无法解析时返回错误，注册表保持不变
    #[instrument(skip(self, payload))]
    pub fn import(
        &mut self,
        payload: &str,
        format: ImportFormat,
        strategy: MergeStrategy,
    ) -> RegistryResult<ImportReport> {
        let importer = MachineImporter::new(&self.actor)?;
        let outcome = importer.run(
            payload,
            format,
            strategy,
            &self.machines,
            &self.machine_order,
        )?;

        let before = self.snapshot();
        self.machines = outcome.machines;
        self.machine_order = outcome.machine_order;
        self.commit(Some(before));

        Ok(outcome.report)
    }

    // ==========================================
    // 导出
    // ==========================================

    pub fn export_json(&self) -> RegistryResult<String> {
        Ok(MachineExporter.export_json(self.ordered())?)
    }

    pub fn export_csv(&self) -> RegistryResult<String> {
        Ok(MachineExporter.export_csv(self.ordered())?)
    }

    // ==========================================
    // 撤销 / 重做
    // ==========================================

    pub fn undo(&mut self) -> RegistryResult<()> {
        let current = self.snapshot();
        let previous = self
            .history
            .undo(current)
            .ok_or(RegistryError::NothingToUndo)?;
        self.restore_snapshot(previous);
        tracing::info!(undo_depth = self.history.undo_depth(), "已撤销");
        Ok(())
    }

    pub fn redo(&mut self) -> RegistryResult<()> {
        let current = self.snapshot();
        let next = self
            .history
            .redo(current)
            .ok_or(RegistryError::NothingToRedo)?;
        self.restore_snapshot(next);
        tracing::info!(redo_depth = self.history.redo_depth(), "已重做");
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_depth(&self) -> usize {
        self.history.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.history.redo_depth()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    // ==========================================
    // 持久化
    // ==========================================

    /// 显式写入存储（错误向上传递）
    pub fn flush(&mut self) -> RegistryResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        store.save(&self.persisted())?;
        self.dirty = false;
        Ok(())
    }

    /// 尽力写入: 失败仅记录日志
    fn persist(&mut self) {
        if self.store.is_none() {
            return;
        }
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "注册表持久化失败，内存状态保留");
        }
    }

    fn persisted(&self) -> PersistedRegistry {
        let machines = self
            .machine_order
            .iter()
            .filter_map(|id| self.machines.get(id).map(|m| (id.clone(), m.clone())))
            .collect();
        PersistedRegistry::new(machines, self.machine_order.clone())
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    pub(crate) fn require(&self, machine_id: &str) -> RegistryResult<&Machine> {
        self.machines
            .get(machine_id)
            .ok_or_else(|| RegistryError::NotFound {
                id: machine_id.to_string(),
            })
    }

    /// 按显示顺序遍历
    pub(crate) fn ordered(&self) -> impl Iterator<Item = &Machine> + '_ {
        self.machine_order
            .iter()
            .filter_map(|id| self.machines.get(id))
    }

    /// 重算 + 校验（CRITICAL 阻断）
    fn prepare(&self, mut machine: Machine) -> RegistryResult<Machine> {
        self.recalc.recalculate_in_place(&mut machine);
        let validation = self.validator.validate(&machine);
        if !validation.is_valid {
            tracing::warn!(
                machine_id = %machine.identity.id,
                issues = validation.errors.len(),
                "设备校验失败，变更被拒绝"
            );
            return Err(RegistryError::Validation {
                machine_id: machine.identity.id.clone(),
                issues: validation.critical_issues().into_iter().cloned().collect(),
            });
        }
        for issue in validation.errors.iter().chain(validation.warnings.iter()) {
            tracing::debug!(code = %issue.code, field = %issue.field, "非阻断校验问题");
        }
        Ok(machine)
    }

    fn touch(&self, machine: &mut Machine) {
        machine.audit.updated_at = Utc::now();
        machine.audit.updated_by = self.actor.clone();
        machine.audit.version += 1;
    }

    fn archive_copy(&self, existing: &Machine) -> Machine {
        let mut machine = existing.clone();
        machine.audit.is_archived = true;
        machine.audit.archived_at = Some(Utc::now());
        machine.audit.archived_by = Some(self.actor.clone());
        machine.identity.status = MachineStatus::Archived;
        machine.append_log(ChangeLogEntry::action(ChangeAction::Archive, &self.actor));
        self.touch(&mut machine);
        machine
    }

    fn restore_snapshot(&mut self, snapshot: RegistrySnapshot) {
        self.machines = snapshot.machines;
        self.machine_order = snapshot.machine_order;
        self.commit(None);
    }

    /// 变更收尾: 记录快照 → 重建索引 → 标脏 → 持久化
    pub(crate) fn commit(&mut self, before: Option<RegistrySnapshot>) {
        if let Some(before) = before {
            self.history.record(before);
        }
        self.rebuild_indices();
        self.dirty = true;
        self.persist();
    }

    fn rebuild_indices(&mut self) {
        self.indices = RegistryIndices::rebuild(&self.machines, &self.machine_order);
    }
}

// ==========================================
// 字段差异（审计用）
// ==========================================

/// 比较两条记录的基础字段，返回 (字段路径, 旧值, 新值)
///
/// 审计与派生分组不参与比较；数组字段整体比较
fn diff_fields(old: &Machine, new: &Machine) -> Vec<(String, Option<String>, Option<String>)> {
    let old_leaves = leaf_values(old);
    let new_leaves = leaf_values(new);

    let mut changes = Vec::new();
    for (path, new_value) in &new_leaves {
        let old_value = old_leaves.get(path);
        if old_value != Some(new_value) {
            changes.push((
                path.clone(),
                old_value.and_then(stringify),
                stringify(new_value),
            ));
        }
    }
    changes
}

fn leaf_values(machine: &Machine) -> BTreeMap<String, Value> {
    let mut leaves = BTreeMap::new();
    let Ok(Value::Object(root)) = serde_json::to_value(machine) else {
        return leaves;
    };
    for (group, fields) in root {
        if group == "audit" || group == "computed" {
            continue;
        }
        match fields {
            Value::Object(fields) => {
                for (key, value) in fields {
                    leaves.insert(format!("{}.{}", group, key), value);
                }
            }
            other => {
                leaves.insert(group, other);
            }
        }
    }
    leaves
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
