// ==========================================
// 印刷成本估算系统 - 设备导出器
// ==========================================
// JSON: 完整记录数组
// CSV: 固定列 + 首行 "=== ... ===" 分节注释（重新导入时自动跳过）
// ==========================================

use crate::domain::machine::Machine;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::SECTION_MARKER;
use chrono::Utc;

/// CSV 固定列
pub const CSV_COLUMNS: [&str; 15] = [
    "Name",
    "Code",
    "Type",
    "Manufacturer",
    "Model",
    "Serial",
    "Year",
    "MaxSheet",
    "Speed",
    "MakeReady",
    "CTP",
    "Hourly",
    "Status",
    "Uptime%",
    "Efficiency%",
];

pub struct MachineExporter;

impl MachineExporter {
    /// 导出为 JSON 数组（完整记录）
    pub fn export_json<'a, I>(&self, machines: I) -> ImportResult<String>
    where
        I: IntoIterator<Item = &'a Machine>,
    {
        let records: Vec<&Machine> = machines.into_iter().collect();
        serde_json::to_string_pretty(&records).map_err(|e| ImportError::ExportError(e.to_string()))
    }

    /// 导出为 CSV（固定列）
    pub fn export_csv<'a, I>(&self, machines: I) -> ImportResult<String>
    where
        I: IntoIterator<Item = &'a Machine>,
    {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(CSV_COLUMNS)?;

        for m in machines {
            writer.write_record([
                m.identity.name.clone(),
                m.identity.machine_code.clone(),
                m.identity.machine_type.as_str().to_string(),
                m.identity.manufacturer.clone(),
                m.identity.model.clone(),
                m.identity.serial_number.clone(),
                m.identity.year_of_manufacture.to_string(),
                m.max_sheet_size().to_compact_string(),
                m.speed.rated_speed.to_string(),
                m.setup.setup_time_base.to_string(),
                m.rates.plate_cost_each.to_string(),
                m.rates.hourly_rate.to_string(),
                m.identity.status.as_str().to_string(),
                m.performance.uptime_pct.to_string(),
                m.performance.efficiency_pct.to_string(),
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| ImportError::ExportError(e.to_string()))?;
        let body = String::from_utf8(bytes).map_err(|e| ImportError::ExportError(e.to_string()))?;

        Ok(format!(
            "{} Machine Registry Export {} {}\n{}",
            SECTION_MARKER,
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            SECTION_MARKER,
            body
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_csv_header_and_quoting() {
        let mut m = Machine::new("t");
        m.identity.name = "Speedmaster, \"XL\"".to_string();
        let csv = MachineExporter.export_csv([&m]).unwrap();

        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("==="));
        assert_eq!(lines.next().unwrap(), CSV_COLUMNS.join(","));
        assert!(lines.next().unwrap().starts_with("\"Speedmaster, \"\"XL\"\"\""));
    }

    #[test]
    fn test_export_json_full_records() {
        let m = Machine::new("t");
        let json = MachineExporter.export_json([&m]).unwrap();
        let parsed: Vec<Machine> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, vec![m]);
    }
}
