// ==========================================
// 印刷成本估算系统 - 变更日志领域模型
// ==========================================
// 红线: 只追加，不修改，不删除
// 用途: 审计追踪（随设备记录一起持久化）
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// ChangeAction - 变更动作
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeAction {
    Create,    // 新建
    Update,    // 字段修改
    Duplicate, // 复制
    Archive,   // 归档（软删除）
    Restore,   // 恢复
    Import,    // 批量导入
}

impl ChangeAction {
    /// 转换为字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Create => "CREATE",
            ChangeAction::Update => "UPDATE",
            ChangeAction::Duplicate => "DUPLICATE",
            ChangeAction::Archive => "ARCHIVE",
            ChangeAction::Restore => "RESTORE",
            ChangeAction::Import => "IMPORT",
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CREATE" => Some(ChangeAction::Create),
            "UPDATE" => Some(ChangeAction::Update),
            "DUPLICATE" => Some(ChangeAction::Duplicate),
            "ARCHIVE" => Some(ChangeAction::Archive),
            "RESTORE" => Some(ChangeAction::Restore),
            "IMPORT" => Some(ChangeAction::Import),
            _ => None,
        }
    }
}

// ==========================================
// ChangeLogEntry - 单条变更记录
// ==========================================
// 字段一经创建不可变（无 setter，仅构造器）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLogEntry {
    pub timestamp: DateTime<Utc>,       // 变更时间
    pub user_id: String,                // 操作人
    pub action: ChangeAction,           // 变更动作
    pub field_changed: Option<String>,  // 变更字段路径（如 cost.hourlyRate）
    pub old_value: Option<String>,      // 旧值（字符串化）
    pub new_value: Option<String>,      // 新值（字符串化）
    pub batch_id: Option<String>,       // 批次ID（导入时共享）
}

impl ChangeLogEntry {
    /// 创建无字段信息的动作记录（CREATE / ARCHIVE / RESTORE 等）
    pub fn action(action: ChangeAction, user_id: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            user_id: user_id.to_string(),
            action,
            field_changed: None,
            old_value: None,
            new_value: None,
            batch_id: None,
        }
    }

    /// 创建字段级变更记录
    pub fn field_change(
        user_id: &str,
        field: &str,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            user_id: user_id.to_string(),
            action: ChangeAction::Update,
            field_changed: Some(field.to_string()),
            old_value,
            new_value,
            batch_id: None,
        }
    }

    /// 创建导入记录（共享批次ID）
    pub fn import(user_id: &str, batch_id: &str) -> Self {
        Self {
            batch_id: Some(batch_id.to_string()),
            ..Self::action(ChangeAction::Import, user_id)
        }
    }

    /// 设置字段（构造期使用，返回新实例）
    pub fn with_field(mut self, field: &str, old_value: Option<String>, new_value: Option<String>) -> Self {
        self.field_changed = Some(field.to_string());
        self.old_value = old_value;
        self.new_value = new_value;
        self
    }

    /// 生成简短摘要文本
    pub fn summary_text(&self) -> String {
        match &self.field_changed {
            Some(field) => format!(
                "{} {}: {} → {}",
                self.action.as_str(),
                field,
                self.old_value.as_deref().unwrap_or("-"),
                self.new_value.as_deref().unwrap_or("-")
            ),
            None => self.action.as_str().to_string(),
        }
    }
}
