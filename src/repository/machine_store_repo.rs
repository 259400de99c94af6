// ==========================================
// 印刷成本估算系统 - 设备注册表快照存储
// ==========================================
// 职责: 将整个注册表序列化为单个 JSON 快照，存于 kv_store 表的固定键下
// 格式: {schemaVersion, machines: [[id, Machine], ...], machineOrder: [id, ...]}
// 说明: 非事务化持久存储；写入失败由调用方记录日志，不回滚内存状态
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::machine::Machine;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// 当前快照格式版本
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// 默认快照键
pub const DEFAULT_STORAGE_KEY: &str = "print-cost-machine-registry";

// ==========================================
// PersistedRegistry - 持久化快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRegistry {
    #[serde(default)]
    pub schema_version: u32,                 // 旧快照无此字段时视为 0
    pub machines: Vec<(String, Machine)>,
    pub machine_order: Vec<String>,
}

impl PersistedRegistry {
    pub fn new(machines: Vec<(String, Machine)>, machine_order: Vec<String>) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            machines,
            machine_order,
        }
    }
}

// ==========================================
// MachineStore - 快照存储接口
// ==========================================
pub trait MachineStore: Send {
    /// 覆盖写入快照
    fn save(&self, snapshot: &PersistedRegistry) -> RepositoryResult<()>;

    /// 读取快照（不存在返回 None）
    fn load(&self) -> RepositoryResult<Option<PersistedRegistry>>;
}

// ==========================================
// SqliteMachineStore - SQLite 实现
// ==========================================
pub struct SqliteMachineStore {
    conn: Arc<Mutex<Connection>>,
    storage_key: String,
}

impl SqliteMachineStore {
    pub fn new(db_path: &str, storage_key: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)), storage_key)
    }

    pub fn from_connection(
        conn: Arc<Mutex<Connection>>,
        storage_key: &str,
    ) -> RepositoryResult<Self> {
        let store = Self {
            conn,
            storage_key: storage_key.to_string(),
        };
        store.ensure_table()?;
        Ok(store)
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 确保表存在
    fn ensure_table(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL,
              updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;
        Ok(())
    }

    /// 删除快照（用于重置）
    pub fn clear(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM kv_store WHERE key = ?1", params![self.storage_key])?;
        Ok(())
    }
}

impl MachineStore for SqliteMachineStore {
    fn save(&self, snapshot: &PersistedRegistry) -> RepositoryResult<()> {
        let json = serde_json::to_string(snapshot)?;
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![self.storage_key, json, now],
        )?;
        Ok(())
    }

    fn load(&self) -> RepositoryResult<Option<PersistedRegistry>> {
        let conn = self.get_conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![self.storage_key],
                |row| row.get(0),
            )
            .optional()?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        let snapshot: PersistedRegistry = serde_json::from_str(&raw)?;
        if snapshot.schema_version > CURRENT_SCHEMA_VERSION {
            return Err(RepositoryError::UnsupportedSchemaVersion {
                found: snapshot.schema_version,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }
        Ok(Some(snapshot))
    }
}
