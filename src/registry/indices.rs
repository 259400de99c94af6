// ==========================================
// 印刷成本估算系统 - 注册表二级索引
// ==========================================
// 索引: 类型 / 状态 / 标签 → 设备ID（按显示顺序）
// 规则: 每批变更后全量重建（设备规模为数十到数百台）
// 标签键统一小写
// ==========================================

use crate::domain::machine::Machine;
use crate::domain::types::{MachineStatus, MachineType};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryIndices {
    pub by_type: HashMap<MachineType, Vec<String>>,
    pub by_status: HashMap<MachineStatus, Vec<String>>,
    pub by_tag: HashMap<String, Vec<String>>,
}

impl RegistryIndices {
    /// 全量重建
    pub fn rebuild(machines: &HashMap<String, Machine>, machine_order: &[String]) -> Self {
        let mut indices = Self::default();

        for id in machine_order {
            let Some(machine) = machines.get(id) else {
                continue;
            };
            indices
                .by_type
                .entry(machine.identity.machine_type)
                .or_default()
                .push(id.clone());
            indices
                .by_status
                .entry(machine.identity.status)
                .or_default()
                .push(id.clone());
            for tag in &machine.identity.tags {
                let ids = indices.by_tag.entry(tag_key(tag)).or_default();
                if !ids.contains(id) {
                    ids.push(id.clone());
                }
            }
        }

        indices
    }

    pub fn ids_by_type(&self, machine_type: MachineType) -> &[String] {
        self.by_type.get(&machine_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn ids_by_status(&self, status: MachineStatus) -> &[String] {
        self.by_status.get(&status).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn ids_by_tag(&self, tag: &str) -> &[String] {
        self.by_tag.get(&tag_key(tag)).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// 标签索引键
pub fn tag_key(tag: &str) -> String {
    tag.trim().to_lowercase()
}
