// ==========================================
// 印刷成本估算系统 - 报价规则
// ==========================================
// 职责: 定价策略（加成/目标毛利）+ 数量阶梯折扣 + 最低收费
// ==========================================

use crate::domain::machine::{Machine, QuantityBreak};
use crate::domain::types::PricingStrategy;
use crate::engine::recalc::finite_or_zero;

/// 查找数量命中的折扣阶梯（按列表顺序取第一个命中项）
pub fn find_quantity_break(machine: &Machine, qty: u64) -> Option<&QuantityBreak> {
    machine
        .pricing
        .quantity_breaks
        .iter()
        .find(|b| b.contains(qty))
}

/// 应用数量阶梯: 一口价优先，否则按折扣；未命中则原价
pub fn apply_quantity_break(machine: &Machine, qty: u64, base_price: f64) -> f64 {
    match find_quantity_break(machine, qty) {
        Some(QuantityBreak {
            fixed_price: Some(price),
            ..
        }) => *price,
        Some(b) => finite_or_zero(base_price * (1.0 - b.discount_percent / 100.0)),
        None => base_price,
    }
}

/// 成本 → 报价（按设备定价策略），不低于最低收费
pub fn quote_price(machine: &Machine, cost: f64) -> f64 {
    let pricing = &machine.pricing;
    let price = match pricing.pricing_strategy {
        PricingStrategy::CostPlus => cost * (1.0 + pricing.markup_pct / 100.0),
        PricingStrategy::TargetMargin => {
            let keep = 1.0 - pricing.target_margin_pct / 100.0;
            // 毛利率 >= 100% 无意义，退化为成本价
            if keep <= 0.0 {
                cost
            } else {
                cost / keep
            }
        }
    };
    finite_or_zero(price).max(machine.rates.minimum_job_charge)
}
