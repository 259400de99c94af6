// ==========================================
// 印刷成本估算系统 - 核心库
// ==========================================
// 范围: 设备登记（财务工具）与成本计算引擎
// 技术栈: Rust + SQLite（单快照持久化）
// 红线: 派生字段永不偏离其来源字段
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 引擎层 - 重算 / 校验 / 成本 / 报价
pub mod engine;

// 注册表层 - 变更、查询、撤销重做
pub mod registry;

// 导入/导出层 - 外部数据
pub mod importer;

// 数据仓储层 - 快照存储
pub mod repository;

// 配置层 - 引擎配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{ColorMode, MachineStatus, MachineType, PricingStrategy};

// 领域实体
pub use domain::{ChangeAction, ChangeLogEntry, Machine, QuantityBreak, SheetSize};

// 引擎
pub use engine::{
    CostCalculator, JobMachiningCost, JobParameters, MachineValidator, RecalcEngine,
    RunningCostBreakdown, SetupCostBreakdown, Severity, ValidationIssue, ValidationResult,
};

// 注册表
pub use registry::{
    MachineFilter, MachineRegistry, RegistryError, RegistryResult, SortField,
    PURGE_CONFIRMATION_TOKEN,
};

// 导入/导出
pub use importer::{ImportError, ImportFormat, ImportReport, ImportRowIssue, MergeStrategy};

// 存储与配置
pub use config::{ConfigManager, EngineConfig};
pub use repository::{MachineStore, PersistedRegistry, SqliteMachineStore};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "印刷成本估算系统";
