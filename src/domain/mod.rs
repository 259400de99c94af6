// ==========================================
// 印刷成本估算系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、值对象、类型
// 红线: 不含持久化逻辑,不含引擎逻辑
// ==========================================

pub mod change_log;
pub mod machine;
pub mod types;

// 重导出核心类型
pub use change_log::{ChangeAction, ChangeLogEntry};
pub use machine::{
    AuditInfo, Capabilities, ColorConfig, ComputedFields, ConsumablesCost, DepreciationInfo,
    EnergyProfile, FacilityCost, IdentityInfo, LaborCost, Machine, MachineRates,
    MaintenanceInfo, PerformanceStats, PhysicalSpec, PricingConfig, QuantityBreak, SetupProfile,
    SheetSize, SpeedProfile,
};
pub use types::{ColorMode, MachineStatus, MachineType, PricingStrategy};
