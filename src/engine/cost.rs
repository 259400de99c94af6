// ==========================================
// 印刷成本估算系统 - 成本计算器
// ==========================================
// 职责: 设备 + 作业参数 → 开机/运行/小时成本
// 红线: 只读设备，不写入注册表
// 说明: 提供两条估算路径
//   1) 精细路径: setup_cost / running_cost_per_sheet（逐项分量求和）
//   2) 简化路径: job_machining_cost（按色数/色组比例缩放基础开机时间）
// ==========================================

use crate::domain::machine::{Machine, SheetSize};
use crate::engine::recalc::{finite_or_zero, safe_div};
use serde::{Deserialize, Serialize};

/// 厚纸阈值（gsm，大于此值降速）
pub const DEFAULT_HEAVY_STOCK_GSM: f64 = 300.0;

/// 薄纸阈值（gsm，小于此值降速）
pub const DEFAULT_LIGHT_STOCK_GSM: f64 = 60.0;

// ==========================================
// SetupCostBreakdown - 开机成本明细
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupCostBreakdown {
    pub time_mins: f64,
    pub waste_sheets: f64,
    pub labor_cost: f64,
    pub machine_cost: f64,
    pub plate_cost: f64,
    pub fixed_cost: f64,
    pub total_cost: f64,
}

// ==========================================
// RunningCostBreakdown - 单张运行成本明细
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningCostBreakdown {
    pub adjusted_speed: f64,        // 降速后速度（张/小时）
    pub time_per_sheet_hours: f64,
    pub labor_cost: f64,
    pub machine_cost: f64,
    pub energy_cost: f64,
    pub consumables_cost: f64,
    pub impression_cost: f64,       // 橡皮布 + 墨辊 单次印刷损耗
    pub ink_cost: f64,
    pub total_per_sheet: f64,
}

// ==========================================
// JobParameters - 简化路径的作业参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobParameters {
    pub quantity: u64,   // 成品张数
    pub colors: u32,
    pub duplex: bool,
}

// ==========================================
// JobMachiningCost - 简化路径结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMachiningCost {
    pub setup_time_mins: f64,
    pub impressions: u64,
    pub run_time_hours: f64,
    pub hourly_cost: f64,
    pub setup_cost: f64,
    pub run_cost: f64,
    pub total_cost: f64,
    pub charged_cost: f64,   // 应用最低收费后
}

// ==========================================
// CostCalculator - 成本计算器
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct CostCalculator {
    heavy_stock_gsm: f64,
    light_stock_gsm: f64,
}

impl Default for CostCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_HEAVY_STOCK_GSM, DEFAULT_LIGHT_STOCK_GSM)
    }
}

impl CostCalculator {
    pub fn new(heavy_stock_gsm: f64, light_stock_gsm: f64) -> Self {
        Self {
            heavy_stock_gsm,
            light_stock_gsm,
        }
    }

    /// 全口径小时成本 = 机台费率 + 人工 + 租金 + 折旧 + 能耗 + 耗材
    pub fn fully_loaded_hourly_cost(&self, machine: &Machine) -> f64 {
        let c = &machine.computed;
        finite_or_zero(
            machine.rates.hourly_rate
                + c.total_labor_cost_per_hour
                + c.hourly_rent_allocation
                + c.hourly_depreciation
                + c.energy_cost_per_hour
                + c.consumables_cost_per_hour_aggregate,
        )
    }

    /// 开机成本（精细路径）
    pub fn setup_cost(
        &self,
        machine: &Machine,
        colors: u32,
        pantone_colors: u32,
        has_coating: bool,
    ) -> SetupCostBreakdown {
        let s = &machine.setup;
        let colors = f64::from(colors);
        let pantone = f64::from(pantone_colors);

        let time_mins = s.setup_time_base
            + s.setup_time_per_color * colors
            + s.plate_change_time * colors * s.plates_per_color_per_job
            + s.color_matching_time * pantone
            + s.register_setup_time
            + s.paper_load_time
            + s.delivery_setup_time;

        let waste_sheets = s.setup_waste_base
            + s.setup_waste_per_color * colors
            + s.setup_waste_per_pantone * pantone
            + if has_coating { s.coating_setup_waste } else { 0.0 };

        let hours = time_mins / 60.0;
        let labor_cost = hours * machine.computed.total_labor_cost_per_hour;
        let machine_cost = hours * machine.rates.hourly_rate;
        let plate_cost = colors * machine.rates.plate_cost_each * s.plates_per_color_per_job;
        let fixed_cost = machine.rates.fixed_setup_cost;

        SetupCostBreakdown {
            time_mins: finite_or_zero(time_mins),
            waste_sheets: finite_or_zero(waste_sheets),
            labor_cost: finite_or_zero(labor_cost),
            machine_cost: finite_or_zero(machine_cost),
            plate_cost: finite_or_zero(plate_cost),
            fixed_cost: finite_or_zero(fixed_cost),
            total_cost: finite_or_zero(labor_cost + machine_cost + plate_cost + fixed_cost),
        }
    }

    /// 纸张克重对应的降速百分比
    pub fn stock_speed_penalty_pct(&self, machine: &Machine, substrate_gsm: f64) -> f64 {
        if substrate_gsm > self.heavy_stock_gsm {
            machine.speed.heavy_stock_penalty_pct
        } else if substrate_gsm < self.light_stock_gsm {
            machine.speed.light_stock_penalty_pct
        } else {
            0.0
        }
    }

    /// 单张运行成本（精细路径）
    pub fn running_cost_per_sheet(
        &self,
        machine: &Machine,
        sheet: SheetSize,
        colors: u32,
        substrate_gsm: f64,
    ) -> RunningCostBreakdown {
        let c = &machine.computed;
        let penalty = self.stock_speed_penalty_pct(machine, substrate_gsm);
        let adjusted_speed =
            finite_or_zero(machine.speed.effective_speed * (1.0 - penalty / 100.0)).max(0.0);
        let time_per_sheet_hours = safe_div(1.0, adjusted_speed);

        let labor_cost = time_per_sheet_hours * c.total_labor_cost_per_hour;
        let machine_cost = time_per_sheet_hours * machine.rates.hourly_rate;
        let energy_cost = time_per_sheet_hours * c.energy_cost_per_hour;
        let consumables_cost = time_per_sheet_hours * c.consumables_cost_per_hour_aggregate;
        let impression_cost = c.blanket_cost_per_impression + c.roller_cost_per_impression;
        let ink_cost = sheet.area_sqm()
            * machine.consumables.ink_coverage_grams_per_sqm
            * c.ink_cost_per_gram
            * f64::from(colors);

        let total_per_sheet = labor_cost
            + machine_cost
            + energy_cost
            + consumables_cost
            + impression_cost
            + ink_cost;

        RunningCostBreakdown {
            adjusted_speed,
            time_per_sheet_hours,
            labor_cost: finite_or_zero(labor_cost),
            machine_cost: finite_or_zero(machine_cost),
            energy_cost: finite_or_zero(energy_cost),
            consumables_cost: finite_or_zero(consumables_cost),
            impression_cost: finite_or_zero(impression_cost),
            ink_cost: finite_or_zero(ink_cost),
            total_per_sheet: finite_or_zero(total_per_sheet),
        }
    }

    /// 作业加工成本（简化路径）
    ///
    /// - 开机时间 = 基础开机时间 × (色数 / 每次过机最大色数)；色组数为 0 时按每色一次过机
    /// - 非双面机的双面作业印次翻倍
    /// - 结果不低于最低收费
    pub fn job_machining_cost(&self, machine: &Machine, job: &JobParameters) -> JobMachiningCost {
        let colors = f64::from(job.colors);
        let pass_ratio = if machine.color.max_colors_per_pass == 0 {
            colors
        } else {
            colors / f64::from(machine.color.max_colors_per_pass)
        };
        let setup_time_mins = finite_or_zero(machine.setup.setup_time_base * pass_ratio);

        let multiplier = if job.duplex && !machine.capabilities.perfecting { 2 } else { 1 };
        let impressions = job.quantity.saturating_mul(multiplier);
        let run_time_hours = safe_div(impressions as f64, machine.speed.effective_speed);

        let hourly_cost = self.fully_loaded_hourly_cost(machine);
        let setup_cost = finite_or_zero(setup_time_mins / 60.0 * hourly_cost);
        let run_cost = finite_or_zero(run_time_hours * hourly_cost);
        let total_cost = setup_cost + run_cost;
        let charged_cost = total_cost.max(machine.rates.minimum_job_charge);

        JobMachiningCost {
            setup_time_mins,
            impressions,
            run_time_hours,
            hourly_cost,
            setup_cost,
            run_cost,
            total_cost,
            charged_cost,
        }
    }
}
