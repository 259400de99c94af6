// ==========================================
// 印刷成本估算系统 - 派生字段重算器
// ==========================================
// 职责: 基础字段 → 派生字段（纯函数）
// 红线: 幂等；不 panic；所有除法分母为 0 时结果为 0（不产生 NaN/Infinity）
// 输入: Machine（基础字段）
// 输出: Machine（基础字段 + computed）
// ==========================================

use crate::domain::machine::{ComputedFields, Machine};

/// 喷粉估算基准速度（张/小时）
pub const POWDER_BASELINE_SPEED: f64 = 10_000.0;

/// 洗车布摊销的假定清洗间隔（小时）
pub const WASH_INTERVAL_HOURS: f64 = 4.0;

/// 每年月数
const MONTHS_PER_YEAR: f64 = 12.0;

// ==========================================
// RecalcEngine - 派生字段重算器
// ==========================================
#[derive(Debug, Default, Clone, Copy)]
pub struct RecalcEngine;

impl RecalcEngine {
    pub fn new() -> Self {
        Self
    }

    /// 重算并返回新设备（原值不变）
    pub fn recalculate(&self, machine: &Machine) -> Machine {
        let mut next = machine.clone();
        next.computed = self.compute(machine);
        next
    }

    /// 就地重算
    pub fn recalculate_in_place(&self, machine: &mut Machine) {
        machine.computed = self.compute(machine);
    }

    /// 一致性判定: recalculate(m).computed == m.computed
    pub fn is_consistent(&self, machine: &Machine) -> bool {
        self.compute(machine) == machine.computed
    }

    /// 计算全部派生字段（只读取基础字段，不读取 computed）
    pub fn compute(&self, machine: &Machine) -> ComputedFields {
        let labor = &machine.labor;
        let facility = &machine.facility;
        let consumables = &machine.consumables;
        let depreciation = &machine.depreciation;
        let energy = &machine.energy;
        let effective_speed = finite_or_zero(machine.speed.effective_speed);

        // ===== 人工 =====
        let total_labor_cost_per_hour = labor.operators_required * labor.operator_rate
            + labor.helpers_required * labor.helper_rate
            + (labor.supervisor_allocation_pct / 100.0) * labor.supervisor_rate;

        // ===== 租金级联 =====
        let monthly_rent = facility.space_sqft * facility.rent_per_sqft;
        let daily_rent_allocation = safe_div(monthly_rent, facility.operating_days_per_month);
        let hourly_rent_allocation =
            safe_div(daily_rent_allocation, facility.operating_hours_per_day);

        // ===== 耗材单价 =====
        let ink_cost_per_gram = consumables.ink_cost_per_kg / 1000.0;
        let blanket_cost_per_impression = safe_div(
            consumables.blanket_cost,
            consumables.blanket_lifespan_impressions,
        );
        let roller_cost_per_impression = safe_div(
            consumables.roller_cost,
            consumables.roller_lifespan_impressions,
        );
        let maintenance_kit_cost_per_impression = safe_div(
            consumables.maintenance_kit_cost,
            consumables.maintenance_kit_lifespan_impressions,
        );

        // ===== 耗材小时成本汇总 =====
        let impression_wear =
            effective_speed * (blanket_cost_per_impression + roller_cost_per_impression);
        let fountain = consumables.fountain_solution_liters_per_hour
            * (consumables.fountain_solution_cost_per_liter
                + consumables.fountain_additive_cost_per_liter);
        let powder =
            consumables.powder_cost_per_hour * (effective_speed / POWDER_BASELINE_SPEED);
        let wash_cloths = (consumables.wash_cloths_per_wash * consumables.wash_cloth_cost)
            / WASH_INTERVAL_HOURS;
        let consumables_cost_per_hour_aggregate = impression_wear
            + fountain
            + consumables.fusion_oil_cost_per_hour
            + powder
            + wash_cloths;

        // ===== 折旧（直线法） =====
        let annual_depreciation = safe_div(
            depreciation.purchase_price - depreciation.salvage_value,
            depreciation.useful_life_years,
        );
        let monthly_depreciation = annual_depreciation / MONTHS_PER_YEAR;
        let annual_hours = facility.operating_days_per_month
            * facility.operating_hours_per_day
            * MONTHS_PER_YEAR;
        let hourly_depreciation = safe_div(annual_depreciation, annual_hours);

        // ===== 能耗 =====
        let total_kw = energy.main_power_kw
            + energy.hvac_power_kw
            + energy.air_compressor_kw
            + energy.uv_lamp_kw
            + energy.ir_dryer_kw;
        let energy_cost_per_hour = total_kw * energy.electricity_rate_per_kwh;

        // ===== 总小时成本 =====
        let total_hourly_cost = total_labor_cost_per_hour
            + hourly_rent_allocation
            + hourly_depreciation
            + energy_cost_per_hour
            + facility.environmental_tax_per_hour
            + consumables_cost_per_hour_aggregate;

        ComputedFields {
            total_labor_cost_per_hour: finite_or_zero(total_labor_cost_per_hour),
            monthly_rent: finite_or_zero(monthly_rent),
            daily_rent_allocation: finite_or_zero(daily_rent_allocation),
            hourly_rent_allocation: finite_or_zero(hourly_rent_allocation),
            ink_cost_per_gram: finite_or_zero(ink_cost_per_gram),
            blanket_cost_per_impression: finite_or_zero(blanket_cost_per_impression),
            roller_cost_per_impression: finite_or_zero(roller_cost_per_impression),
            maintenance_kit_cost_per_impression: finite_or_zero(
                maintenance_kit_cost_per_impression,
            ),
            consumables_cost_per_hour_aggregate: finite_or_zero(
                consumables_cost_per_hour_aggregate,
            ),
            annual_depreciation: finite_or_zero(annual_depreciation),
            monthly_depreciation: finite_or_zero(monthly_depreciation),
            hourly_depreciation: finite_or_zero(hourly_depreciation),
            energy_cost_per_hour: finite_or_zero(energy_cost_per_hour),
            total_hourly_cost: finite_or_zero(total_hourly_cost),
        }
    }
}

/// 安全除法: 分母为 0 或结果非有限值时返回 0
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    finite_or_zero(numerator / denominator)
}

/// 非有限值（NaN / ±Infinity）归零
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_labor_formula() {
        let mut m = Machine::new("t");
        m.labor.operators_required = 2.0;
        m.labor.operator_rate = 30.0;
        m.labor.helpers_required = 1.0;
        m.labor.helper_rate = 20.0;
        m.labor.supervisor_allocation_pct = 50.0;
        m.labor.supervisor_rate = 40.0;

        let c = RecalcEngine::new().compute(&m);
        assert!(approx(c.total_labor_cost_per_hour, 60.0 + 20.0 + 20.0));
    }

    #[test]
    fn test_rent_cascade() {
        let mut m = Machine::new("t");
        m.facility.space_sqft = 1000.0;
        m.facility.rent_per_sqft = 2.2;
        m.facility.operating_days_per_month = 22.0;
        m.facility.operating_hours_per_day = 10.0;

        let c = RecalcEngine::new().compute(&m);
        assert!(approx(c.monthly_rent, 2200.0));
        assert!(approx(c.daily_rent_allocation, 100.0));
        assert!(approx(c.hourly_rent_allocation, 10.0));
    }

    #[test]
    fn test_zero_denominators_yield_zero() {
        let mut m = Machine::new("t");
        m.facility.operating_days_per_month = 0.0;
        m.facility.operating_hours_per_day = 0.0;
        m.depreciation.useful_life_years = 0.0;
        m.consumables.blanket_lifespan_impressions = 0.0;
        m.consumables.roller_lifespan_impressions = 0.0;
        m.consumables.maintenance_kit_lifespan_impressions = 0.0;

        let c = RecalcEngine::new().compute(&m);
        assert_eq!(c.daily_rent_allocation, 0.0);
        assert_eq!(c.hourly_rent_allocation, 0.0);
        assert_eq!(c.annual_depreciation, 0.0);
        assert_eq!(c.hourly_depreciation, 0.0);
        assert_eq!(c.blanket_cost_per_impression, 0.0);
        assert_eq!(c.roller_cost_per_impression, 0.0);
        assert_eq!(c.maintenance_kit_cost_per_impression, 0.0);
        assert!(c.total_hourly_cost.is_finite());
    }

    #[test]
    fn test_depreciation_cascade() {
        let mut m = Machine::new("t");
        m.depreciation.purchase_price = 130_000.0;
        m.depreciation.salvage_value = 10_000.0;
        m.depreciation.useful_life_years = 10.0;
        m.facility.operating_days_per_month = 20.0;
        m.facility.operating_hours_per_day = 5.0;

        let c = RecalcEngine::new().compute(&m);
        assert!(approx(c.annual_depreciation, 12_000.0));
        assert!(approx(c.monthly_depreciation, 1_000.0));
        assert!(approx(c.hourly_depreciation, 12_000.0 / 1200.0));
    }

    #[test]
    fn test_consumables_aggregate() {
        let mut m = Machine::new("t");
        m.speed.effective_speed = 10_000.0;
        m.consumables.blanket_cost = 100.0;
        m.consumables.blanket_lifespan_impressions = 1_000_000.0;
        m.consumables.roller_cost = 100.0;
        m.consumables.roller_lifespan_impressions = 1_000_000.0;
        m.consumables.fountain_solution_liters_per_hour = 1.0;
        m.consumables.fountain_solution_cost_per_liter = 2.0;
        m.consumables.fountain_additive_cost_per_liter = 3.0;
        m.consumables.fusion_oil_cost_per_hour = 0.5;
        m.consumables.powder_cost_per_hour = 1.0;
        m.consumables.wash_cloths_per_wash = 8.0;
        m.consumables.wash_cloth_cost = 0.5;

        let c = RecalcEngine::new().compute(&m);
        // 2.0 + 5.0 + 0.5 + 1.0 + 1.0
        assert!(approx(c.consumables_cost_per_hour_aggregate, 9.5));
    }

    #[test]
    fn test_energy_and_total() {
        let mut m = Machine::new("t");
        m.energy.main_power_kw = 10.0;
        m.energy.hvac_power_kw = 2.0;
        m.energy.air_compressor_kw = 3.0;
        m.energy.uv_lamp_kw = 4.0;
        m.energy.ir_dryer_kw = 1.0;
        m.energy.electricity_rate_per_kwh = 0.2;

        let c = RecalcEngine::new().compute(&m);
        assert!(approx(c.energy_cost_per_hour, 4.0));

        let expected_total = c.total_labor_cost_per_hour
            + c.hourly_rent_allocation
            + c.hourly_depreciation
            + c.energy_cost_per_hour
            + m.facility.environmental_tax_per_hour
            + c.consumables_cost_per_hour_aggregate;
        assert!(approx(c.total_hourly_cost, expected_total));
    }

    #[test]
    fn test_idempotent() {
        let engine = RecalcEngine::new();
        let once = engine.recalculate(&Machine::new("t"));
        let twice = engine.recalculate(&once);
        assert_eq!(once, twice);
        assert!(engine.is_consistent(&once));
    }

    #[test]
    fn test_nan_inputs_do_not_propagate() {
        let mut m = Machine::new("t");
        m.speed.effective_speed = f64::NAN;
        m.rates.hourly_rate = 100.0;
        let c = RecalcEngine::new().compute(&m);
        assert!(c.consumables_cost_per_hour_aggregate.is_finite());
        assert!(c.total_hourly_cost.is_finite());
    }
}
