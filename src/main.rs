// ==========================================
// 印刷成本估算系统 - 命令行入口
// ==========================================
// 用法:
//   print-cost-engine import <file> [merge|replace|append]
//   print-cost-engine export <json|csv>
//   print-cost-engine list
//   print-cost-engine cost <machine_id> [quantity] [colors] [duplex]
//
// 数据库路径: PRINT_COST_ENGINE_DB_PATH > 用户数据目录 > 当前目录
// ==========================================

use anyhow::{bail, Context};
use print_cost_engine::config::ConfigManager;
use print_cost_engine::db::{get_default_db_path, open_sqlite_connection};
use print_cost_engine::engine::JobParameters;
use print_cost_engine::importer::{ImportFormat, MergeStrategy};
use print_cost_engine::repository::SqliteMachineStore;
use print_cost_engine::{logging, MachineRegistry, SheetSize};
use std::sync::{Arc, Mutex};

const USAGE: &str = "用法: print-cost-engine <import <file> [merge|replace|append] | export <json|csv> | list | cost <machine_id> [quantity] [colors] [duplex]>";

/// 运行成本示例使用的纸张克重
const SAMPLE_GSM: f64 = 150.0;

fn main() -> anyhow::Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!(USAGE);
    };

    let db_path = get_default_db_path();
    tracing::info!(db_path = %db_path, version = print_cost_engine::VERSION, "启动");

    let mut registry = open_registry(&db_path)?;

    match command.as_str() {
        "import" => {
            let file = args.get(1).context(USAGE)?;
            let strategy = match args.get(2) {
                Some(s) => MergeStrategy::parse(s)?,
                None => MergeStrategy::Merge,
            };
            let format = ImportFormat::from_path(file)?;
            let payload =
                std::fs::read_to_string(file).with_context(|| format!("读取文件失败: {}", file))?;

            let report = registry.import(&payload, format, strategy)?;
            registry.flush()?;

            println!("{}", report.summary_text());
            for issue in &report.errors {
                println!("  错误 行{} [{}] {}", issue.row, issue.field, issue.message);
            }
            for issue in &report.warnings {
                println!("  警告 行{} [{}] {}", issue.row, issue.field, issue.message);
            }
        }
        "export" => {
            let output = match args.get(1).map(|s| ImportFormat::parse(s)).transpose()? {
                Some(ImportFormat::Csv) => registry.export_csv()?,
                Some(ImportFormat::Json) | None => registry.export_json()?,
            };
            println!("{}", output);
        }
        "list" => {
            for m in registry.all() {
                println!(
                    "{}\t{}\t{}\t{}\t{:.2}",
                    m.identity.id,
                    m.identity.name,
                    m.identity.machine_type,
                    m.identity.status,
                    m.computed.total_hourly_cost
                );
            }
        }
        "cost" => {
            let id = args.get(1).context(USAGE)?;
            let quantity: u64 = parse_arg(&args, 2, 1000)?;
            let colors: u32 = parse_arg(&args, 3, 4)?;
            let duplex = args
                .get(4)
                .is_some_and(|s| matches!(s.to_lowercase().as_str(), "duplex" | "true" | "yes" | "1"));

            let machine = registry
                .get(id)
                .with_context(|| format!("设备不存在: {}", id))?;
            let sheet: SheetSize = machine.max_sheet_size();

            let hourly = registry.fully_loaded_hourly_cost(id)?;
            let setup = registry.setup_cost(id, colors, 0, false)?;
            let running = registry.running_cost_per_sheet(id, sheet, colors, SAMPLE_GSM)?;
            let job = JobParameters {
                quantity,
                colors,
                duplex,
            };
            let machining = registry.job_machining_cost(id, &job)?;
            let quote = registry.quote_job(id, &job)?;

            println!("满负荷小时成本: {:.2}", hourly);
            println!(
                "开机准备: {:.0} 分钟, 损耗 {:.0} 张, 成本 {:.2}",
                setup.time_mins, setup.waste_sheets, setup.total_cost
            );
            println!(
                "单张运行成本 ({}, {}g): {:.4}",
                sheet.to_compact_string(),
                SAMPLE_GSM,
                running.total_per_sheet
            );
            println!(
                "简化加工成本 (数量 {}, {} 色, 双面 {}): {:.2}",
                quantity, colors, duplex, machining.charged_cost
            );
            println!("报价: {:.2}", quote);
        }
        other => bail!("未知命令: {}\n{}", other, USAGE),
    }

    Ok(())
}

fn open_registry(db_path: &str) -> anyhow::Result<MachineRegistry> {
    let conn = Arc::new(Mutex::new(
        open_sqlite_connection(db_path).with_context(|| format!("无法打开数据库: {}", db_path))?,
    ));
    let config = ConfigManager::from_connection(conn.clone())?.load_engine_config()?;
    let store = SqliteMachineStore::from_connection(conn, &config.storage_key)?;
    Ok(MachineRegistry::load(Box::new(store), config)?)
}

fn parse_arg<T: std::str::FromStr>(args: &[String], idx: usize, default: T) -> anyhow::Result<T> {
    match args.get(idx) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("参数无效: {}\n{}", raw, USAGE)),
    }
}
