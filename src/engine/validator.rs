// ==========================================
// 印刷成本估算系统 - 设备校验器
// ==========================================
// 职责: 对已重算的设备做无状态校验
// 级别: CRITICAL（阻断写入）/ ERROR（仅提示）/ WARNING（建议）
// 红线: is_valid 只看 CRITICAL；ERROR 不阻断持久化
// ==========================================

use crate::domain::machine::Machine;
use serde::{Deserialize, Serialize};

// ===== 校验码 =====
pub mod codes {
    pub const NEGATIVE_HOURLY_RATE: &str = "NEGATIVE_HOURLY_RATE";
    pub const INVALID_RATED_SPEED: &str = "INVALID_RATED_SPEED";
    pub const SPEED_EXCEEDS_RATED: &str = "SPEED_EXCEEDS_RATED";
    pub const NEGATIVE_MINIMUM_CHARGE: &str = "NEGATIVE_MINIMUM_CHARGE";
    pub const ZERO_HOURLY_RATE: &str = "ZERO_HOURLY_RATE";
}

/// 机台费率为 0 时的建议值
pub const SUGGESTED_HOURLY_RATE: f64 = 100.0;

// ==========================================
// Severity - 问题级别
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

// ==========================================
// ValidationIssue - 单条问题
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub field: String,             // 字段路径
    pub code: String,              // 校验码
    pub message: String,           // 描述
    pub severity: Severity,
    pub suggestion: Option<f64>,   // 建议值
}

impl ValidationIssue {
    fn new(field: &str, code: &str, message: String, severity: Severity) -> Self {
        Self {
            field: field.to_string(),
            code: code.to_string(),
            message,
            severity,
            suggestion: None,
        }
    }
}

// ==========================================
// ValidationResult - 校验结果
// ==========================================
// errors: CRITICAL + ERROR
// warnings: WARNING
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        let (warnings, errors): (Vec<_>, Vec<_>) = issues
            .into_iter()
            .partition(|i| i.severity == Severity::Warning);
        let is_valid = !errors.iter().any(|i| i.severity == Severity::Critical);
        Self {
            is_valid,
            errors,
            warnings,
        }
    }

    /// 阻断级问题
    pub fn critical_issues(&self) -> Vec<&ValidationIssue> {
        self.errors
            .iter()
            .filter(|i| i.severity == Severity::Critical)
            .collect()
    }

    /// 是否存在 ERROR 及以上问题
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// 是否包含指定校验码
    pub fn has_code(&self, code: &str) -> bool {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .any(|i| i.code == code)
    }
}

// ==========================================
// MachineValidator - 设备校验器
// ==========================================
#[derive(Debug, Default, Clone, Copy)]
pub struct MachineValidator;

impl MachineValidator {
    pub fn new() -> Self {
        Self
    }

    /// 校验设备（调用方应先重算）
    pub fn validate(&self, machine: &Machine) -> ValidationResult {
        let mut issues = Vec::new();
        let rates = &machine.rates;
        let speed = &machine.speed;

        // 机台费率
        if rates.hourly_rate < 0.0 {
            issues.push(ValidationIssue::new(
                "rates.hourlyRate",
                codes::NEGATIVE_HOURLY_RATE,
                format!("机台小时费率不能为负数: {}", rates.hourly_rate),
                Severity::Critical,
            ));
        } else if rates.hourly_rate == 0.0 {
            let mut issue = ValidationIssue::new(
                "rates.hourlyRate",
                codes::ZERO_HOURLY_RATE,
                format!("机台小时费率为 0，建议设置为 {}", SUGGESTED_HOURLY_RATE),
                Severity::Warning,
            );
            issue.suggestion = Some(SUGGESTED_HOURLY_RATE);
            issues.push(issue);
        }

        // 速度
        if speed.rated_speed.is_nan() || speed.rated_speed <= 0.0 {
            issues.push(ValidationIssue::new(
                "speed.ratedSpeed",
                codes::INVALID_RATED_SPEED,
                format!("额定速度必须大于 0: {}", speed.rated_speed),
                Severity::Critical,
            ));
        } else if speed.effective_speed > speed.rated_speed {
            issues.push(ValidationIssue::new(
                "speed.effectiveSpeed",
                codes::SPEED_EXCEEDS_RATED,
                format!(
                    "实际速度 ({}) 超过额定速度 ({})",
                    speed.effective_speed, speed.rated_speed
                ),
                Severity::Error,
            ));
        }

        // 最低收费
        if rates.minimum_job_charge < 0.0 {
            issues.push(ValidationIssue::new(
                "rates.minimumJobCharge",
                codes::NEGATIVE_MINIMUM_CHARGE,
                format!("最低收费不能为负数: {}", rates.minimum_job_charge),
                Severity::Critical,
            ));
        }

        ValidationResult::from_issues(issues)
    }
}
