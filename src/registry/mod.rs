// ==========================================
// 印刷成本估算系统 - 设备注册表层
// ==========================================
// 职责: 设备的唯一可信存储，所有变更经由重算 + 校验路径
// 组成: 变更路径（core）/ 查询与成本包装（queries）
//       撤销重做（history）/ 二级索引（indices）
// 红线: 注册表是由应用根持有的显式实例，不使用全局状态
// ==========================================

pub mod core;
pub mod error;
pub mod history;
pub mod indices;
pub mod queries;

// 重导出核心类型
pub use self::core::{MachineRegistry, COPY_SUFFIX, PURGE_CONFIRMATION_TOKEN};
pub use error::{RegistryError, RegistryResult};
pub use history::{HistoryManager, RegistrySnapshot, DEFAULT_HISTORY_DEPTH};
pub use indices::RegistryIndices;
pub use queries::{MachineFilter, SortField};
