// ==========================================
// 印刷成本估算系统 - 注册表错误类型
// ==========================================
// 职责: 单记录变更的失败原因（抛出即保证注册表未改变）
// 行级导入问题不在此处，收集于 ImportReport
// ==========================================

use crate::engine::validator::ValidationIssue;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 注册表错误类型
#[derive(Error, Debug)]
pub enum RegistryError {
    // ==========================================
    // 校验错误（CRITICAL 阻断）
    // ==========================================
    #[error("设备校验失败 (machine_id={machine_id}): {}", summarize(.issues))]
    Validation {
        machine_id: String,
        issues: Vec<ValidationIssue>,
    },

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("设备不存在: id={id}")]
    NotFound { id: String },

    #[error("确认口令错误，拒绝永久删除: id={id}")]
    Confirmation { id: String },

    #[error("无可撤销的操作")]
    NothingToUndo,

    #[error("无可重做的操作")]
    NothingToRedo,

    // ==========================================
    // 下层错误
    // ==========================================
    #[error("导入失败: {0}")]
    Import(#[from] ImportError),

    #[error("存储失败: {0}")]
    Repository(#[from] RepositoryError),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("[{}] {}", i.code, i.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result 类型别名
pub type RegistryResult<T> = Result<T, RegistryError>;
