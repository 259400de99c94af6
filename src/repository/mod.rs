// ==========================================
// 印刷成本估算系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 注册表快照的读写，屏蔽数据库细节
// 约束: 所有查询使用参数化
// ==========================================

pub mod error;
pub mod machine_store_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use machine_store_repo::{
    MachineStore, PersistedRegistry, SqliteMachineStore, CURRENT_SCHEMA_VERSION,
    DEFAULT_STORAGE_KEY,
};
