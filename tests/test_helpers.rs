// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的注册表构建、临时数据库、样例载荷
// ==========================================
#![allow(dead_code)]

use print_cost_engine::config::EngineConfig;
use print_cost_engine::db::{open_in_memory_connection, open_sqlite_connection};
use print_cost_engine::domain::{Machine, MachineType};
use print_cost_engine::registry::MachineRegistry;
use print_cost_engine::repository::{
    MachineStore, PersistedRegistry, RepositoryError, RepositoryResult, SqliteMachineStore,
    DEFAULT_STORAGE_KEY,
};
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();
    Ok((temp_file, db_path))
}

/// 打开测试连接（共享）
pub fn open_test_connection(db_path: &str) -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(
        open_sqlite_connection(db_path).expect("打开数据库失败"),
    ))
}

/// 内存数据库上的快照存储
pub fn in_memory_store() -> SqliteMachineStore {
    let conn = open_in_memory_connection().expect("打开内存数据库失败");
    SqliteMachineStore::from_connection(Arc::new(Mutex::new(conn)), DEFAULT_STORAGE_KEY)
        .expect("创建快照存储失败")
}

/// 空注册表（不持久化）
pub fn empty_registry() -> MachineRegistry {
    print_cost_engine::logging::init_test();
    MachineRegistry::new(EngineConfig::default())
}

/// 添加一台胶印机
pub fn add_offset_press(registry: &mut MachineRegistry, name: &str, hourly_rate: f64) -> String {
    registry
        .add(|m| {
            m.identity.name = name.to_string();
            m.identity.machine_type = MachineType::OffsetPress;
            m.identity.manufacturer = "Heidelberg".to_string();
            m.rates.hourly_rate = hourly_rate;
        })
        .expect("添加设备失败")
        .identity
        .id
}

/// 带三台设备的注册表
pub fn seeded_registry() -> (MachineRegistry, Vec<String>) {
    let mut registry = empty_registry();
    let ids = vec![
        add_offset_press(&mut registry, "SM 74", 120.0),
        add_offset_press(&mut registry, "XL 106", 180.0),
        registry
            .add(|m| {
                m.identity.name = "Polar 115".to_string();
                m.identity.machine_type = MachineType::Cutter;
                m.identity.tags = vec!["finishing".to_string()];
            })
            .expect("添加设备失败")
            .identity
            .id,
    ];
    (registry, ids)
}

/// 开机时间场景: 基础 15 分钟 + 每色 5 分钟，其余时间项为 0
pub fn setup_scenario_machine() -> Machine {
    let mut m = Machine::new("tester");
    m.setup.setup_time_base = 15.0;
    m.setup.setup_time_per_color = 5.0;
    m.setup.plate_change_time = 0.0;
    m.setup.color_matching_time = 0.0;
    m.setup.register_setup_time = 0.0;
    m.setup.paper_load_time = 0.0;
    m.setup.delivery_setup_time = 0.0;
    m
}

/// 始终写入失败的存储（验证持久化失败不回滚）
pub struct FailingStore;

impl MachineStore for FailingStore {
    fn save(&self, _snapshot: &PersistedRegistry) -> RepositoryResult<()> {
        Err(RepositoryError::DatabaseQueryError("disk full".to_string()))
    }

    fn load(&self) -> RepositoryResult<Option<PersistedRegistry>> {
        Ok(None)
    }
}
