// ==========================================
// 印刷成本估算系统 - 设备领域模型
// ==========================================
// 职责: 设备（财务工具）聚合根 + 分组属性 + 默认值工厂
// 红线: 派生字段（computed）只允许由重算器写入
// 红线: 每个基础字段都有财务安全的默认值，新建设备零编辑即可估价
// ==========================================

use crate::domain::change_log::ChangeLogEntry;
use crate::domain::types::{ColorMode, MachineStatus, MachineType, PricingStrategy};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// Machine - 设备聚合根
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub identity: IdentityInfo,         // 标识
    #[serde(default)]
    pub physical: PhysicalSpec,         // 物理规格
    #[serde(default)]
    pub color: ColorConfig,             // 色组配置
    #[serde(default)]
    pub speed: SpeedProfile,            // 速度
    #[serde(default)]
    pub setup: SetupProfile,            // 开机准备（时间 + 损耗）
    #[serde(default)]
    pub rates: MachineRates,            // 机台费率
    #[serde(default)]
    pub labor: LaborCost,               // 人工
    #[serde(default)]
    pub facility: FacilityCost,         // 场地
    #[serde(default)]
    pub consumables: ConsumablesCost,   // 耗材
    #[serde(default)]
    pub depreciation: DepreciationInfo, // 折旧
    #[serde(default)]
    pub maintenance: MaintenanceInfo,   // 维保
    #[serde(default)]
    pub energy: EnergyProfile,          // 能耗
    #[serde(default)]
    pub pricing: PricingConfig,         // 定价
    #[serde(default)]
    pub capabilities: Capabilities,     // 能力标志
    #[serde(default)]
    pub performance: PerformanceStats,  // 稼动指标
    pub audit: AuditInfo,               // 审计
    #[serde(default)]
    pub computed: ComputedFields,       // 派生字段（只读）
}

// ==========================================
// IdentityInfo - 标识
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityInfo {
    pub id: String,                   // 设备ID（创建后不可变）
    pub name: String,                 // 名称
    pub nickname: String,             // 昵称
    pub machine_code: String,         // 设备编码
    pub manufacturer: String,         // 制造商
    pub model: String,                // 型号
    pub serial_number: String,        // 序列号
    pub year_of_manufacture: u32,     // 出厂年份
    pub machine_type: MachineType,    // 设备类型
    pub status: MachineStatus,        // 状态
    pub tags: Vec<String>,            // 标签
    pub notes: String,                // 备注
}

impl Default for IdentityInfo {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: "新设备".to_string(),
            nickname: String::new(),
            machine_code: String::new(),
            manufacturer: String::new(),
            model: String::new(),
            serial_number: String::new(),
            year_of_manufacture: 2020,
            machine_type: MachineType::OffsetPress,
            status: MachineStatus::Active,
            tags: vec![],
            notes: String::new(),
        }
    }
}

// ==========================================
// PhysicalSpec - 物理规格（单位: mm / gsm）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhysicalSpec {
    pub min_sheet_width_mm: f64,
    pub max_sheet_width_mm: f64,
    pub min_sheet_height_mm: f64,
    pub max_sheet_height_mm: f64,
    pub min_substrate_thickness_mm: f64,
    pub max_substrate_thickness_mm: f64,
    pub min_substrate_gsm: f64,
    pub max_substrate_gsm: f64,
    pub gripper_margin_mm: f64,  // 叼口
    pub side_margin_mm: f64,
    pub tail_margin_mm: f64,
    pub printable_width_mm: f64,
    pub printable_height_mm: f64,
}

impl Default for PhysicalSpec {
    fn default() -> Self {
        Self {
            min_sheet_width_mm: 210.0,
            max_sheet_width_mm: 720.0,
            min_sheet_height_mm: 297.0,
            max_sheet_height_mm: 1020.0,
            min_substrate_thickness_mm: 0.04,
            max_substrate_thickness_mm: 0.6,
            min_substrate_gsm: 60.0,
            max_substrate_gsm: 400.0,
            gripper_margin_mm: 10.0,
            side_margin_mm: 5.0,
            tail_margin_mm: 5.0,
            printable_width_mm: 710.0,
            printable_height_mm: 1000.0,
        }
    }
}

// ==========================================
// ColorConfig - 色组配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColorConfig {
    pub color_mode: ColorMode,
    pub max_colors_per_pass: u32,
    pub front_colors: u32,
    pub back_colors: u32,
    pub coating_units: u32,       // 上光单元
    pub varnish_units: u32,       // 光油单元
    pub supports_pantone: bool,
    pub max_pantone_colors: u32,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            color_mode: ColorMode::Cmyk,
            max_colors_per_pass: 4,
            front_colors: 4,
            back_colors: 0,
            coating_units: 1,
            varnish_units: 0,
            supports_pantone: true,
            max_pantone_colors: 2,
        }
    }
}

// ==========================================
// SpeedProfile - 速度（单位: 张/小时 SPH）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeedProfile {
    pub rated_speed: f64,               // 额定速度
    pub effective_speed: f64,           // 实际速度（不得超过额定）
    pub heavy_stock_penalty_pct: f64,   // 厚纸降速 %
    pub light_stock_penalty_pct: f64,   // 薄纸降速 %
    pub coating_speed_penalty_pct: f64, // 上光降速 %
    pub duplex_speed_factor: f64,       // 双面速度系数
    pub ramp_up_sheets: u32,            // 提速阶段张数
    pub ramp_up_speed_pct: f64,         // 提速阶段平均速度 %
}

impl Default for SpeedProfile {
    fn default() -> Self {
        Self {
            rated_speed: 15000.0,
            effective_speed: 12000.0,
            heavy_stock_penalty_pct: 15.0,
            light_stock_penalty_pct: 10.0,
            coating_speed_penalty_pct: 10.0,
            duplex_speed_factor: 0.5,
            ramp_up_sheets: 200,
            ramp_up_speed_pct: 60.0,
        }
    }
}

// ==========================================
// SetupProfile - 开机准备（时间单位: 分钟，损耗单位: 张）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetupProfile {
    // ===== 时间分量 =====
    pub setup_time_base: f64,
    pub setup_time_per_color: f64,
    pub plate_change_time: f64,
    pub plates_per_color_per_job: f64,
    pub color_matching_time: f64,  // 专色调色（每个专色）
    pub register_setup_time: f64,
    pub paper_load_time: f64,
    pub delivery_setup_time: f64,
    pub blanket_wash_time: f64,
    pub roller_wash_time: f64,
    pub ink_washup_time: f64,
    pub coating_setup_time: f64,
    pub feeder_adjust_time: f64,

    // ===== 损耗分量 =====
    pub setup_waste_base: f64,
    pub setup_waste_per_color: f64,
    pub setup_waste_per_pantone: f64,
    pub coating_setup_waste: f64,
    pub registration_waste: f64,
    pub feeder_adjust_waste: f64,
    pub running_waste_pct: f64,
}

impl Default for SetupProfile {
    fn default() -> Self {
        Self {
            setup_time_base: 15.0,
            setup_time_per_color: 5.0,
            plate_change_time: 3.0,
            plates_per_color_per_job: 1.0,
            color_matching_time: 10.0,
            register_setup_time: 5.0,
            paper_load_time: 5.0,
            delivery_setup_time: 3.0,
            blanket_wash_time: 8.0,
            roller_wash_time: 12.0,
            ink_washup_time: 10.0,
            coating_setup_time: 10.0,
            feeder_adjust_time: 4.0,
            setup_waste_base: 100.0,
            setup_waste_per_color: 25.0,
            setup_waste_per_pantone: 50.0,
            coating_setup_waste: 50.0,
            registration_waste: 30.0,
            feeder_adjust_waste: 20.0,
            running_waste_pct: 2.0,
        }
    }
}

// ==========================================
// MachineRates - 机台费率
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MachineRates {
    pub hourly_rate: f64,         // 机台小时费率
    pub minimum_job_charge: f64,  // 最低收费
    pub plate_cost_each: f64,     // CTP 单版费用
    pub fixed_setup_cost: f64,    // 固定开机费
}

impl Default for MachineRates {
    fn default() -> Self {
        Self {
            hourly_rate: 100.0,
            minimum_job_charge: 50.0,
            plate_cost_each: 15.0,
            fixed_setup_cost: 25.0,
        }
    }
}

// ==========================================
// LaborCost - 人工
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LaborCost {
    pub operators_required: f64,
    pub operator_rate: f64,
    pub helpers_required: f64,
    pub helper_rate: f64,
    pub supervisor_allocation_pct: f64,
    pub supervisor_rate: f64,
    pub overtime_multiplier: f64,
    pub shifts_per_day: u32,
}

impl Default for LaborCost {
    fn default() -> Self {
        Self {
            operators_required: 1.0,
            operator_rate: 25.0,
            helpers_required: 1.0,
            helper_rate: 15.0,
            supervisor_allocation_pct: 10.0,
            supervisor_rate: 35.0,
            overtime_multiplier: 1.5,
            shifts_per_day: 1,
        }
    }
}

// ==========================================
// FacilityCost - 场地（租金级联分摊）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FacilityCost {
    pub space_sqft: f64,
    pub rent_per_sqft: f64,               // 月租金 / 平方英尺
    pub operating_days_per_month: f64,
    pub operating_hours_per_day: f64,
    pub environmental_tax_per_hour: f64,
}

impl Default for FacilityCost {
    fn default() -> Self {
        Self {
            space_sqft: 400.0,
            rent_per_sqft: 1.5,
            operating_days_per_month: 22.0,
            operating_hours_per_day: 8.0,
            environmental_tax_per_hour: 0.5,
        }
    }
}

// ==========================================
// ConsumablesCost - 耗材
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsumablesCost {
    pub ink_cost_per_kg: f64,
    pub ink_coverage_grams_per_sqm: f64,
    pub blanket_cost: f64,
    pub blanket_lifespan_impressions: f64,
    pub roller_cost: f64,
    pub roller_lifespan_impressions: f64,
    pub maintenance_kit_cost: f64,
    pub maintenance_kit_lifespan_impressions: f64,
    pub fountain_solution_liters_per_hour: f64,
    pub fountain_solution_cost_per_liter: f64,
    pub fountain_additive_cost_per_liter: f64,
    pub fusion_oil_cost_per_hour: f64,
    pub powder_cost_per_hour: f64,  // 喷粉（按 10000 张/小时 基准）
    pub wash_cloths_per_wash: f64,
    pub wash_cloth_cost: f64,
}

impl Default for ConsumablesCost {
    fn default() -> Self {
        Self {
            ink_cost_per_kg: 20.0,
            ink_coverage_grams_per_sqm: 1.5,
            blanket_cost: 250.0,
            blanket_lifespan_impressions: 1_000_000.0,
            roller_cost: 400.0,
            roller_lifespan_impressions: 5_000_000.0,
            maintenance_kit_cost: 1200.0,
            maintenance_kit_lifespan_impressions: 10_000_000.0,
            fountain_solution_liters_per_hour: 0.5,
            fountain_solution_cost_per_liter: 2.0,
            fountain_additive_cost_per_liter: 4.0,
            fusion_oil_cost_per_hour: 0.2,
            powder_cost_per_hour: 0.8,
            wash_cloths_per_wash: 4.0,
            wash_cloth_cost: 0.5,
        }
    }
}

// ==========================================
// DepreciationInfo - 折旧（直线法）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DepreciationInfo {
    pub purchase_price: f64,
    pub salvage_value: f64,
    pub useful_life_years: f64,
    pub purchase_date: Option<NaiveDate>,
}

impl Default for DepreciationInfo {
    fn default() -> Self {
        Self {
            purchase_price: 250_000.0,
            salvage_value: 25_000.0,
            useful_life_years: 10.0,
            purchase_date: None,
        }
    }
}

// ==========================================
// MaintenanceInfo - 维保
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaintenanceInfo {
    pub annual_maintenance_cost: f64,
    pub service_contract_cost: f64,
    pub service_interval_hours: f64,
    pub last_service_date: Option<NaiveDate>,
}

impl Default for MaintenanceInfo {
    fn default() -> Self {
        Self {
            annual_maintenance_cost: 5_000.0,
            service_contract_cost: 2_000.0,
            service_interval_hours: 500.0,
            last_service_date: None,
        }
    }
}

// ==========================================
// EnergyProfile - 能耗（kW / 每度电价）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnergyProfile {
    pub main_power_kw: f64,
    pub hvac_power_kw: f64,
    pub air_compressor_kw: f64,
    pub uv_lamp_kw: f64,
    pub ir_dryer_kw: f64,
    pub electricity_rate_per_kwh: f64,
}

impl Default for EnergyProfile {
    fn default() -> Self {
        Self {
            main_power_kw: 30.0,
            hvac_power_kw: 5.0,
            air_compressor_kw: 3.0,
            uv_lamp_kw: 0.0,
            ir_dryer_kw: 0.0,
            electricity_rate_per_kwh: 0.15,
        }
    }
}

// ==========================================
// QuantityBreak - 数量折扣阶梯（值对象）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityBreak {
    pub from_qty: u64,
    pub to_qty: Option<u64>,        // None = 无上限
    pub discount_percent: f64,
    pub fixed_price: Option<f64>,   // 一口价（优先于折扣）
}

impl QuantityBreak {
    pub fn new(from_qty: u64, to_qty: Option<u64>, discount_percent: f64) -> Self {
        Self {
            from_qty,
            to_qty,
            discount_percent,
            fixed_price: None,
        }
    }

    /// 判断数量是否落在该阶梯内（闭区间）
    pub fn contains(&self, qty: u64) -> bool {
        qty >= self.from_qty && self.to_qty.map_or(true, |to| qty <= to)
    }
}

// ==========================================
// PricingConfig - 定价
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PricingConfig {
    pub pricing_strategy: PricingStrategy,
    pub markup_pct: f64,
    pub target_margin_pct: f64,
    pub quantity_breaks: Vec<QuantityBreak>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            pricing_strategy: PricingStrategy::CostPlus,
            markup_pct: 30.0,
            target_margin_pct: 25.0,
            quantity_breaks: vec![
                QuantityBreak::new(1, Some(999), 0.0),
                QuantityBreak::new(1000, Some(4999), 5.0),
                QuantityBreak::new(5000, None, 10.0),
            ],
        }
    }
}

// ==========================================
// Capabilities - 能力标志
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Capabilities {
    pub perfecting: bool,        // 单次过机双面
    pub collating: bool,
    pub stapling: bool,
    pub folding: bool,
    pub auto_feed: bool,
    pub color_management: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            perfecting: false,
            collating: false,
            stapling: false,
            folding: false,
            auto_feed: true,
            color_management: true,
        }
    }
}

// ==========================================
// PerformanceStats - 稼动指标
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceStats {
    pub uptime_pct: f64,
    pub efficiency_pct: f64,
}

impl Default for PerformanceStats {
    fn default() -> Self {
        Self {
            uptime_pct: 90.0,
            efficiency_pct: 85.0,
        }
    }
}

// ==========================================
// AuditInfo - 审计与版本
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditInfo {
    pub created_at: DateTime<Utc>,      // 创建时间（不可变）
    pub created_by: String,             // 创建人（不可变）
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
    pub version: u32,                   // 版本号（每次写入 +1）
    #[serde(default)]
    pub change_log: Vec<ChangeLogEntry>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived_by: Option<String>,
}

impl AuditInfo {
    pub fn new(actor: &str) -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            created_by: actor.to_string(),
            updated_at: now,
            updated_by: actor.to_string(),
            version: 1,
            change_log: vec![],
            is_archived: false,
            archived_at: None,
            archived_by: None,
        }
    }
}

// ==========================================
// ComputedFields - 派生字段
// ==========================================
// 红线: 调用方不得直接写入，仅由 engine::recalc 生成
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComputedFields {
    pub total_labor_cost_per_hour: f64,
    pub monthly_rent: f64,
    pub daily_rent_allocation: f64,
    pub hourly_rent_allocation: f64,
    pub ink_cost_per_gram: f64,
    pub blanket_cost_per_impression: f64,
    pub roller_cost_per_impression: f64,
    pub maintenance_kit_cost_per_impression: f64,
    pub consumables_cost_per_hour_aggregate: f64,
    pub annual_depreciation: f64,
    pub monthly_depreciation: f64,
    pub hourly_depreciation: f64,
    pub energy_cost_per_hour: f64,
    pub total_hourly_cost: f64,
}

// ==========================================
// SheetSize - 纸张尺寸（mm）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSize {
    pub width_mm: f64,
    pub height_mm: f64,
}

impl SheetSize {
    pub fn new(width_mm: f64, height_mm: f64) -> Self {
        Self { width_mm, height_mm }
    }

    /// 面积（平方米）
    pub fn area_sqm(&self) -> f64 {
        self.width_mm * self.height_mm / 1_000_000.0
    }

    /// 解析组合尺寸字符串，如 "720x1020" / "720 X 1020" / "720×1020"
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase().replace('×', "x");
        let (w, h) = normalized.split_once('x')?;
        let width_mm = w.trim().parse::<f64>().ok()?;
        let height_mm = h.trim().parse::<f64>().ok()?;
        Some(Self::new(width_mm, height_mm))
    }

    /// 格式化为 "WxH"
    pub fn to_compact_string(&self) -> String {
        format!("{}x{}", self.width_mm, self.height_mm)
    }
}

// ==========================================
// Machine 辅助方法
// ==========================================
impl Machine {
    /// 默认值工厂: 生成新ID，所有字段取财务安全默认值
    ///
    /// 注意: 派生字段此时为 0，需经重算器处理后才一致
    pub fn new(actor: &str) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), actor)
    }

    /// 使用指定ID构建默认设备
    pub fn with_id(id: String, actor: &str) -> Self {
        Self {
            identity: IdentityInfo {
                id,
                ..IdentityInfo::default()
            },
            physical: PhysicalSpec::default(),
            color: ColorConfig::default(),
            speed: SpeedProfile::default(),
            setup: SetupProfile::default(),
            rates: MachineRates::default(),
            labor: LaborCost::default(),
            facility: FacilityCost::default(),
            consumables: ConsumablesCost::default(),
            depreciation: DepreciationInfo::default(),
            maintenance: MaintenanceInfo::default(),
            energy: EnergyProfile::default(),
            pricing: PricingConfig::default(),
            capabilities: Capabilities::default(),
            performance: PerformanceStats::default(),
            audit: AuditInfo::new(actor),
            computed: ComputedFields::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.identity.id
    }

    /// 在用判定: 状态 ACTIVE 且未归档
    pub fn is_active(&self) -> bool {
        self.identity.status == MachineStatus::Active && !self.audit.is_archived
    }

    /// 最大纸张尺寸
    pub fn max_sheet_size(&self) -> SheetSize {
        SheetSize::new(self.physical.max_sheet_width_mm, self.physical.max_sheet_height_mm)
    }

    /// 是否有上光能力
    pub fn has_coating(&self) -> bool {
        self.color.coating_units > 0 || self.color.varnish_units > 0
    }

    /// 追加变更日志（只追加）
    pub fn append_log(&mut self, entry: ChangeLogEntry) {
        self.audit.change_log.push(entry);
    }
}
