// ==========================================
// 印刷成本估算系统 - 注册表查询与成本包装
// ==========================================
// 查询: 按ID / 类型 / 状态 / 标签 / 在用 / 全文检索 / 结构化过滤
// 排序: 显示顺序原地稳定排序
// 成本: 按ID取设备后委托 CostCalculator
// ==========================================

use crate::domain::machine::{Machine, SheetSize};
use crate::domain::types::{MachineStatus, MachineType};
use crate::engine::cost::{JobMachiningCost, JobParameters, RunningCostBreakdown, SetupCostBreakdown};
use crate::engine::pricing::{apply_quantity_break, quote_price};
use crate::registry::core::MachineRegistry;
use crate::registry::error::RegistryResult;
use crate::registry::indices::tag_key;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ==========================================
// MachineFilter - 结构化过滤条件
// ==========================================
// 空集合 / None 表示不限制
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MachineFilter {
    pub types: Vec<MachineType>,
    pub statuses: Vec<MachineStatus>,
    pub tags: Vec<String>,               // 命中任一标签即可
    pub min_sheet_width_mm: Option<f64>, // 按最大纸张宽度比较
    pub max_sheet_width_mm: Option<f64>,
    pub has_coating: Option<bool>,
    pub perfecting: Option<bool>,
    pub text: Option<String>,
}

impl MachineFilter {
    pub fn matches(&self, machine: &Machine) -> bool {
        let identity = &machine.identity;

        if !self.types.is_empty() && !self.types.contains(&identity.machine_type) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&identity.status) {
            return false;
        }
        if !self.tags.is_empty() {
            let wanted: Vec<String> = self.tags.iter().map(|t| tag_key(t)).collect();
            if !identity.tags.iter().any(|t| wanted.contains(&tag_key(t))) {
                return false;
            }
        }

        let width = machine.physical.max_sheet_width_mm;
        if self.min_sheet_width_mm.is_some_and(|min| width < min) {
            return false;
        }
        if self.max_sheet_width_mm.is_some_and(|max| width > max) {
            return false;
        }

        if self.has_coating.is_some_and(|want| machine.has_coating() != want) {
            return false;
        }
        if self
            .perfecting
            .is_some_and(|want| machine.capabilities.perfecting != want)
        {
            return false;
        }

        match self.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text_matches(machine, &text.to_lowercase()),
            _ => true,
        }
    }
}

/// 全文检索: 名称 / 昵称 / 制造商 / 型号 / 标签，不区分大小写
fn text_matches(machine: &Machine, needle_lower: &str) -> bool {
    let identity = &machine.identity;
    [
        &identity.name,
        &identity.nickname,
        &identity.manufacturer,
        &identity.model,
    ]
    .into_iter()
    .chain(identity.tags.iter())
    .any(|field| field.to_lowercase().contains(needle_lower))
}

// ==========================================
// SortField - 排序字段
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortField {
    Name,
    MachineCode,
    Manufacturer,
    MachineType,
    Status,
    YearOfManufacture,
    RatedSpeed,
    HourlyRate,
    TotalHourlyCost,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    fn compare(&self, a: &Machine, b: &Machine) -> Ordering {
        match self {
            SortField::Name => a.identity.name.to_lowercase().cmp(&b.identity.name.to_lowercase()),
            SortField::MachineCode => a.identity.machine_code.cmp(&b.identity.machine_code),
            SortField::Manufacturer => a
                .identity
                .manufacturer
                .to_lowercase()
                .cmp(&b.identity.manufacturer.to_lowercase()),
            SortField::MachineType => a.identity.machine_type.cmp(&b.identity.machine_type),
            SortField::Status => a.identity.status.cmp(&b.identity.status),
            SortField::YearOfManufacture => a
                .identity
                .year_of_manufacture
                .cmp(&b.identity.year_of_manufacture),
            SortField::RatedSpeed => a.speed.rated_speed.total_cmp(&b.speed.rated_speed),
            SortField::HourlyRate => a.rates.hourly_rate.total_cmp(&b.rates.hourly_rate),
            SortField::TotalHourlyCost => a
                .computed
                .total_hourly_cost
                .total_cmp(&b.computed.total_hourly_cost),
            SortField::CreatedAt => a.audit.created_at.cmp(&b.audit.created_at),
            SortField::UpdatedAt => a.audit.updated_at.cmp(&b.audit.updated_at),
        }
    }
}

// ==========================================
// 查询
// ==========================================
impl MachineRegistry {
    pub fn get(&self, machine_id: &str) -> Option<&Machine> {
        self.machines.get(machine_id)
    }

    /// 全部设备（显示顺序）
    pub fn all(&self) -> Vec<&Machine> {
        self.ordered().collect()
    }

    pub fn by_type(&self, machine_type: MachineType) -> Vec<&Machine> {
        self.resolve_ids(self.indices.ids_by_type(machine_type))
    }

    pub fn by_status(&self, status: MachineStatus) -> Vec<&Machine> {
        self.resolve_ids(self.indices.ids_by_status(status))
    }

    pub fn by_tag(&self, tag: &str) -> Vec<&Machine> {
        self.resolve_ids(self.indices.ids_by_tag(tag))
    }

    /// 在用设备（ACTIVE 且未归档）
    pub fn active(&self) -> Vec<&Machine> {
        self.ordered().filter(|m| m.is_active()).collect()
    }

    /// 全文检索（空查询返回全部）
    pub fn search(&self, query: &str) -> Vec<&Machine> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.all();
        }
        self.ordered()
            .filter(|m| text_matches(m, &needle))
            .collect()
    }

    pub fn filter(&self, filter: &MachineFilter) -> Vec<&Machine> {
        self.ordered().filter(|m| filter.matches(m)).collect()
    }

    /// 按字段原地稳定排序显示顺序
    ///
    /// 排序只改变展示，不进入撤销历史
    pub fn sort_by(&mut self, field: SortField, ascending: bool) {
        let machines = &self.machines;
        self.machine_order.sort_by(|a, b| {
            let ordering = match (machines.get(a), machines.get(b)) {
                (Some(ma), Some(mb)) => field.compare(ma, mb),
                _ => Ordering::Equal,
            };
            if ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });
        self.commit(None);
    }

    fn resolve_ids(&self, ids: &[String]) -> Vec<&Machine> {
        ids.iter().filter_map(|id| self.machines.get(id)).collect()
    }

    // ==========================================
    // 成本包装
    // ==========================================

    pub fn fully_loaded_hourly_cost(&self, machine_id: &str) -> RegistryResult<f64> {
        let machine = self.require(machine_id)?;
        Ok(self.calculator.fully_loaded_hourly_cost(machine))
    }

    pub fn setup_cost(
        &self,
        machine_id: &str,
        colors: u32,
        pantone_colors: u32,
        has_coating: bool,
    ) -> RegistryResult<SetupCostBreakdown> {
        let machine = self.require(machine_id)?;
        Ok(self
            .calculator
            .setup_cost(machine, colors, pantone_colors, has_coating))
    }

    pub fn running_cost_per_sheet(
        &self,
        machine_id: &str,
        sheet: SheetSize,
        colors: u32,
        substrate_gsm: f64,
    ) -> RegistryResult<RunningCostBreakdown> {
        let machine = self.require(machine_id)?;
        Ok(self
            .calculator
            .running_cost_per_sheet(machine, sheet, colors, substrate_gsm))
    }

    pub fn job_machining_cost(
        &self,
        machine_id: &str,
        job: &JobParameters,
    ) -> RegistryResult<JobMachiningCost> {
        let machine = self.require(machine_id)?;
        Ok(self.calculator.job_machining_cost(machine, job))
    }

    /// 作业报价: 简化加工成本 → 定价策略 → 数量阶梯
    pub fn quote_job(&self, machine_id: &str, job: &JobParameters) -> RegistryResult<f64> {
        let machine = self.require(machine_id)?;
        let cost = self.calculator.job_machining_cost(machine, job);
        let price = quote_price(machine, cost.charged_cost);
        Ok(apply_quantity_break(machine, job.quantity, price))
    }
}
