// ==========================================
// 印刷成本估算系统 - 导入模块错误类型
// ==========================================
// 范围: 整个载荷级别的失败（无法解析、格式不支持）
// 行级问题不走错误通道，收集进 ImportReport
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 载荷错误 =====
    #[error("导入格式不支持: {0}（仅支持 JSON / CSV）")]
    UnsupportedFormat(String),

    #[error("合并策略不支持: {0}（仅支持 MERGE / REPLACE / APPEND）")]
    UnsupportedStrategy(String),

    #[error("JSON 解析失败: {0}")]
    JsonParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("载荷结构无效: {0}")]
    InvalidPayload(String),

    // ===== 导出错误 =====
    #[error("导出失败: {0}")]
    ExportError(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::JsonParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
