// ==========================================
// 印刷成本估算系统 - 领域类型定义
// ==========================================
// 职责: 设备类型、状态、色彩模式、定价策略等枚举
// 存储: 统一以 SCREAMING_SNAKE_CASE 字符串序列化
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 设备类型 (Machine Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineType {
    OffsetPress,    // 胶印机
    DigitalPress,   // 数码印刷机
    WideFormat,     // 大幅面喷绘
    Flexo,          // 柔印机
    ScreenPress,    // 丝印机
    Cutter,         // 切纸机
    Folder,         // 折页机
    Binder,         // 装订机
    Laminator,      // 覆膜机
    DieCutter,      // 模切机
    Other,          // 其他
}

impl MachineType {
    pub const ALL: [MachineType; 11] = [
        MachineType::OffsetPress,
        MachineType::DigitalPress,
        MachineType::WideFormat,
        MachineType::Flexo,
        MachineType::ScreenPress,
        MachineType::Cutter,
        MachineType::Folder,
        MachineType::Binder,
        MachineType::Laminator,
        MachineType::DieCutter,
        MachineType::Other,
    ];

    /// 转换为字符串 (用于导出/持久化)
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineType::OffsetPress => "OFFSET_PRESS",
            MachineType::DigitalPress => "DIGITAL_PRESS",
            MachineType::WideFormat => "WIDE_FORMAT",
            MachineType::Flexo => "FLEXO",
            MachineType::ScreenPress => "SCREEN_PRESS",
            MachineType::Cutter => "CUTTER",
            MachineType::Folder => "FOLDER",
            MachineType::Binder => "BINDER",
            MachineType::Laminator => "LAMINATOR",
            MachineType::DieCutter => "DIE_CUTTER",
            MachineType::Other => "OTHER",
        }
    }

    /// 从字符串解析（宽松: 忽略大小写，空格/横线视为下划线）
    pub fn parse(s: &str) -> Option<Self> {
        let key = normalize_enum_key(s);
        Self::ALL.iter().copied().find(|t| t.as_str() == key)
    }
}

impl fmt::Display for MachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 设备状态 (Machine Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineStatus {
    Active,      // 在用
    Idle,        // 闲置
    Maintenance, // 维保中
    Offline,     // 停机
    Archived,    // 已归档（软删除）
}

impl MachineStatus {
    pub const ALL: [MachineStatus; 5] = [
        MachineStatus::Active,
        MachineStatus::Idle,
        MachineStatus::Maintenance,
        MachineStatus::Offline,
        MachineStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MachineStatus::Active => "ACTIVE",
            MachineStatus::Idle => "IDLE",
            MachineStatus::Maintenance => "MAINTENANCE",
            MachineStatus::Offline => "OFFLINE",
            MachineStatus::Archived => "ARCHIVED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let key = normalize_enum_key(s);
        Self::ALL.iter().copied().find(|t| t.as_str() == key)
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 色彩模式 (Color Mode)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColorMode {
    Cmyk,          // 四色
    CmykPlusSpot,  // 四色 + 专色
    SpotOnly,      // 仅专色
    Monochrome,    // 单色
}

impl ColorMode {
    pub const ALL: [ColorMode; 4] = [
        ColorMode::Cmyk,
        ColorMode::CmykPlusSpot,
        ColorMode::SpotOnly,
        ColorMode::Monochrome,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorMode::Cmyk => "CMYK",
            ColorMode::CmykPlusSpot => "CMYK_PLUS_SPOT",
            ColorMode::SpotOnly => "SPOT_ONLY",
            ColorMode::Monochrome => "MONOCHROME",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let key = normalize_enum_key(s);
        Self::ALL.iter().copied().find(|t| t.as_str() == key)
    }
}

// ==========================================
// 定价策略 (Pricing Strategy)
// ==========================================
// COST_PLUS: 成本 × (1 + markup%)
// TARGET_MARGIN: 成本 / (1 - margin%)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingStrategy {
    CostPlus,
    TargetMargin,
}

impl PricingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingStrategy::CostPlus => "COST_PLUS",
            PricingStrategy::TargetMargin => "TARGET_MARGIN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match normalize_enum_key(s).as_str() {
            "COST_PLUS" | "MARKUP" => Some(PricingStrategy::CostPlus),
            "TARGET_MARGIN" | "MARGIN" => Some(PricingStrategy::TargetMargin),
            _ => None,
        }
    }
}

/// 枚举键标准化: TRIM + UPPER + 空格/横线 → 下划线
pub fn normalize_enum_key(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}
