// ==========================================
// 印刷成本估算系统 - 导入/导出层
// ==========================================
// 职责: 外部载荷（JSON / CSV）→ 已校验的设备候选，按策略对账
// 红线: 导入与注册表写入走同一重算 + 校验路径
// ==========================================

// 模块声明
pub mod data_cleaner;
pub mod error;
pub mod exporter;
pub mod field_mapper;
pub mod file_parser;
pub mod machine_importer;

// 重导出核心类型
pub use data_cleaner::DataCleaner;
pub use error::{ImportError, ImportResult};
pub use exporter::{MachineExporter, CSV_COLUMNS};
pub use field_mapper::{FieldMapper, FieldSpec};
pub use file_parser::{ImportFormat, ParsedRow, PayloadParser, RawRow};
pub use machine_importer::{
    ImportOutcome, ImportReport, ImportRowIssue, MachineImporter, MergeStrategy,
};
