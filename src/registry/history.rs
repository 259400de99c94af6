// ==========================================
// 印刷成本估算系统 - 撤销/重做历史
// ==========================================
// 粒度: 一次逻辑操作一个完整快照（批量操作同样只占一个）
// 规则: 撤销栈有界，溢出时丢弃最旧快照；新快照清空重做栈
// ==========================================

use crate::domain::machine::Machine;
use std::collections::{HashMap, VecDeque};

/// 默认历史深度
pub const DEFAULT_HISTORY_DEPTH: usize = 50;

// ==========================================
// RegistrySnapshot - 注册表状态快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegistrySnapshot {
    pub machines: HashMap<String, Machine>,
    pub machine_order: Vec<String>,
}

impl RegistrySnapshot {
    /// 从快照中彻底移除设备（永久删除使用）
    fn purge(&mut self, id: &str) {
        self.machines.remove(id);
        self.machine_order.retain(|x| x != id);
    }
}

// ==========================================
// HistoryManager - 历史管理器
// ==========================================
#[derive(Debug)]
pub struct HistoryManager {
    undo_stack: VecDeque<RegistrySnapshot>,
    redo_stack: Vec<RegistrySnapshot>,
    max_depth: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl HistoryManager {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_depth: max_depth.max(1),
        }
    }

    /// 记录变更前状态
    pub fn record(&mut self, snapshot: RegistrySnapshot) {
        self.undo_stack.push_back(snapshot);
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
        self.redo_stack.clear();
    }

    /// 撤销: 当前状态入重做栈，返回待恢复的快照
    pub fn undo(&mut self, current: RegistrySnapshot) -> Option<RegistrySnapshot> {
        let previous = self.undo_stack.pop_back()?;
        self.redo_stack.push(current);
        Some(previous)
    }

    /// 重做: 当前状态入撤销栈，返回待恢复的快照
    pub fn redo(&mut self, current: RegistrySnapshot) -> Option<RegistrySnapshot> {
        let next = self.redo_stack.pop()?;
        self.undo_stack.push_back(current);
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
        Some(next)
    }

    /// 从所有保留快照中移除设备，保证永久删除不可经撤销/重做恢复
    pub fn purge_machine(&mut self, id: &str) {
        for snapshot in self.undo_stack.iter_mut().chain(self.redo_stack.iter_mut()) {
            snapshot.purge(id);
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
