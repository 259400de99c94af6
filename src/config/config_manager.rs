// ==========================================
// 印刷成本估算系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 规则: 缺失或格式错误的配置项回退默认值（记录告警，不报错）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::engine::cost::{DEFAULT_HEAVY_STOCK_GSM, DEFAULT_LIGHT_STOCK_GSM};
use crate::registry::history::DEFAULT_HISTORY_DEPTH;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::machine_store_repo::DEFAULT_STORAGE_KEY;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// 默认操作人
pub const DEFAULT_ACTOR: &str = "system";

// ==========================================
// EngineConfig - 引擎配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub history_depth: usize,     // 撤销栈深度
    pub storage_key: String,      // 快照存储键
    pub default_actor: String,    // 未指定操作人时使用
    pub heavy_stock_gsm: f64,     // 厚纸降速阈值
    pub light_stock_gsm: f64,     // 薄纸降速阈值
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_depth: DEFAULT_HISTORY_DEPTH,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            default_actor: DEFAULT_ACTOR.to_string(),
            heavy_stock_gsm: DEFAULT_HEAVY_STOCK_GSM,
            light_stock_gsm: DEFAULT_LIGHT_STOCK_GSM,
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接创建 ConfigManager（与快照存储共用连接）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let manager = Self { conn };
        manager.ensure_table()?;
        Ok(manager)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_table(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS config_kv (
              scope_id TEXT NOT NULL,
              key TEXT NOT NULL,
              value TEXT NOT NULL,
              PRIMARY KEY (scope_id, key)
            );
            "#,
        )?;
        Ok(())
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置的快照
    pub fn get_config_snapshot(&self) -> RepositoryResult<HashMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }
        Ok(config_map)
    }

    /// 加载引擎配置（覆写项叠加到默认值之上）
    pub fn load_engine_config(&self) -> RepositoryResult<EngineConfig> {
        let defaults = EngineConfig::default();
        Ok(EngineConfig {
            history_depth: self
                .parse_or_default(config_keys::HISTORY_DEPTH, defaults.history_depth)?
                .max(1),
            storage_key: self
                .get_global_config_value(config_keys::STORAGE_KEY)?
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.storage_key),
            default_actor: self
                .get_global_config_value(config_keys::DEFAULT_ACTOR)?
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.default_actor),
            heavy_stock_gsm: self
                .parse_or_default(config_keys::HEAVY_STOCK_GSM, defaults.heavy_stock_gsm)?,
            light_stock_gsm: self
                .parse_or_default(config_keys::LIGHT_STOCK_GSM, defaults.light_stock_gsm)?,
        })
    }

    fn parse_or_default<T>(&self, key: &str, default: T) -> RepositoryResult<T>
    where
        T: FromStr + Copy + std::fmt::Display,
    {
        match self.get_global_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    tracing::warn!(key = key, value = %raw, default = %default, "配置值格式错误，使用默认值");
                    Ok(default)
                }
            },
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 撤销/重做
    pub const HISTORY_DEPTH: &str = "history_depth";

    // 持久化
    pub const STORAGE_KEY: &str = "storage_key";

    // 审计
    pub const DEFAULT_ACTOR: &str = "default_actor";

    // 纸张降速阈值
    pub const HEAVY_STOCK_GSM: &str = "heavy_stock_gsm";
    pub const LIGHT_STOCK_GSM: &str = "light_stock_gsm";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_connection;

    fn manager() -> ConfigManager {
        let conn = open_in_memory_connection().unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_empty() {
        let config = manager().load_engine_config().unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.history_depth, 50);
    }

    #[test]
    fn test_overrides_applied() {
        let m = manager();
        m.set_global_config_value(config_keys::HISTORY_DEPTH, "10").unwrap();
        m.set_global_config_value(config_keys::HEAVY_STOCK_GSM, "280.5").unwrap();
        m.set_global_config_value(config_keys::DEFAULT_ACTOR, "planner").unwrap();

        let config = m.load_engine_config().unwrap();
        assert_eq!(config.history_depth, 10);
        assert_eq!(config.heavy_stock_gsm, 280.5);
        assert_eq!(config.default_actor, "planner");
        assert_eq!(config.light_stock_gsm, DEFAULT_LIGHT_STOCK_GSM);
    }

    #[test]
    fn test_malformed_value_falls_back() {
        let m = manager();
        m.set_global_config_value(config_keys::HISTORY_DEPTH, "lots").unwrap();
        assert_eq!(m.load_engine_config().unwrap().history_depth, DEFAULT_HISTORY_DEPTH);
    }

    #[test]
    fn test_snapshot_lists_values() {
        let m = manager();
        m.set_global_config_value("a", "1").unwrap();
        m.set_global_config_value("a", "2").unwrap();
        let snapshot = m.get_config_snapshot().unwrap();
        assert_eq!(snapshot.get("a").map(String::as_str), Some("2"));
    }
}
