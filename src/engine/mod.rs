// ==========================================
// 印刷成本估算系统 - 引擎层
// ==========================================
// 职责: 派生字段重算、校验、成本计算、报价（全部为纯函数）
// 红线: 引擎不做持久化，不持有注册表状态
// ==========================================

pub mod cost;
pub mod pricing;
pub mod recalc;
pub mod validator;

// 重导出核心引擎
pub use cost::{
    CostCalculator, JobMachiningCost, JobParameters, RunningCostBreakdown, SetupCostBreakdown,
};
pub use pricing::{apply_quantity_break, find_quantity_break, quote_price};
pub use recalc::RecalcEngine;
pub use validator::{MachineValidator, Severity, ValidationIssue, ValidationResult};
