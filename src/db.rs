// ==========================================
// 印刷成本估算系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少偶发 busy 错误
// - 统一默认数据库路径的解析
// ==========================================

use rusqlite::Connection;
use std::path::PathBuf;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "PRINT_COST_ENGINE_DB_PATH";

/// 默认数据库文件名
pub const DEFAULT_DB_FILE: &str = "print_cost_engine.db";

/// 配置 SQLite 连接的统一 PRAGMA
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开内存数据库（测试 / 临时会话）
pub fn open_in_memory_connection() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from(".").join(DEFAULT_DB_FILE);

    if let Some(data_dir) = dirs::data_dir() {
        let app_dir = data_dir.join("print-cost-engine");
        if std::fs::create_dir_all(&app_dir).is_ok() {
            path = app_dir.join(DEFAULT_DB_FILE);
        } else {
            tracing::warn!(dir = %app_dir.display(), "无法创建数据目录，回退到当前目录");
        }
    }

    path.to_string_lossy().to_string()
}
