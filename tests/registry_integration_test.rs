// ==========================================
// 设备注册表集成测试
// ==========================================
// 覆盖: 校验闸门、撤销/重做、复制隔离、持久化重载、
//       永久删除、持久化失败、批量操作
// ==========================================

mod test_helpers;

use print_cost_engine::config::EngineConfig;
use print_cost_engine::domain::{ChangeAction, MachineStatus, MachineType};
use print_cost_engine::registry::{
    MachineFilter, MachineRegistry, RegistryError, RegistryIndices, SortField,
    PURGE_CONFIRMATION_TOKEN,
};
use print_cost_engine::repository::{MachineStore, SqliteMachineStore, DEFAULT_STORAGE_KEY};
use test_helpers::*;

// ==========================================
// 校验闸门
// ==========================================

#[test]
fn test_negative_rate_update_is_rejected_without_side_effects() {
    let (mut registry, ids) = seeded_registry();
    let undo_before = registry.undo_depth();
    let before = registry.get(&ids[0]).unwrap().clone();

    let result = registry.update(&ids[0], |m| m.rates.hourly_rate = -1.0);

    match result {
        Err(RegistryError::Validation { machine_id, issues }) => {
            assert_eq!(machine_id, ids[0]);
            assert!(issues.iter().any(|i| i.code == "NEGATIVE_HOURLY_RATE"));
        }
        other => panic!("期望校验错误，实际: {:?}", other.map(|m| m.identity.id)),
    }

    assert_eq!(registry.get(&ids[0]).unwrap(), &before);
    assert_eq!(registry.get(&ids[0]).unwrap().rates.hourly_rate, 120.0);
    assert_eq!(registry.undo_depth(), undo_before);
}

#[test]
fn test_add_with_invalid_speed_leaves_registry_empty() {
    let mut registry = empty_registry();
    let result = registry.add(|m| {
        m.speed.rated_speed = 0.0;
        m.speed.effective_speed = 0.0;
    });

    assert!(result.is_err());
    assert!(registry.is_empty());
    assert!(!registry.can_undo());
}

#[test]
fn test_speed_above_rated_is_accepted() {
    let mut registry = empty_registry();
    let machine = registry
        .add(|m| {
            m.speed.rated_speed = 10_000.0;
            m.speed.effective_speed = 11_000.0;
        })
        .expect("ERROR 级问题不应阻断");
    assert_eq!(machine.speed.effective_speed, 11_000.0);
}

// ==========================================
// 撤销 / 重做
// ==========================================

#[test]
fn test_undo_redo_round_trip_restores_state_and_indices() {
    let mut registry = empty_registry();
    let mut states = vec![registry.snapshot()];

    let a = add_offset_press(&mut registry, "A", 100.0);
    states.push(registry.snapshot());
    let b = add_offset_press(&mut registry, "B", 110.0);
    states.push(registry.snapshot());
    registry
        .update(&a, |m| m.identity.tags = vec!["Night Shift".to_string()])
        .unwrap();
    states.push(registry.snapshot());
    registry.delete(&b).unwrap();
    states.push(registry.snapshot());

    let steps = states.len() - 1;
    assert_eq!(registry.undo_depth(), steps);

    for expected in states.iter().rev().skip(1) {
        registry.undo().unwrap();
        assert_eq!(&registry.snapshot(), expected);
        assert_eq!(
            registry.indices(),
            &RegistryIndices::rebuild(&expected.machines, &expected.machine_order)
        );
    }
    assert!(registry.is_empty());
    assert!(matches!(registry.undo(), Err(RegistryError::NothingToUndo)));

    for expected in states.iter().skip(1) {
        registry.redo().unwrap();
        assert_eq!(&registry.snapshot(), expected);
    }
    assert!(matches!(registry.redo(), Err(RegistryError::NothingToRedo)));
    assert_eq!(registry.indices().ids_by_tag("night shift"), &[a.clone()]);
    assert_eq!(registry.indices().ids_by_status(MachineStatus::Archived), &[b]);
}

#[test]
fn test_new_mutation_clears_redo() {
    let (mut registry, ids) = seeded_registry();
    registry.undo().unwrap();
    assert!(registry.can_redo());

    registry
        .update(&ids[0], |m| m.identity.nickname = "小海".to_string())
        .unwrap();
    assert!(!registry.can_redo());
}

#[test]
fn test_history_depth_is_bounded() {
    let config = EngineConfig {
        history_depth: 3,
        ..EngineConfig::default()
    };
    let mut registry = MachineRegistry::new(config);
    for i in 0..6 {
        add_offset_press(&mut registry, &format!("P{}", i), 100.0);
    }

    assert_eq!(registry.undo_depth(), 3);
    for _ in 0..3 {
        registry.undo().unwrap();
    }
    assert_eq!(registry.len(), 3);
    assert!(!registry.can_undo());
}

#[test]
fn test_update_without_changes_takes_no_snapshot() {
    let (mut registry, ids) = seeded_registry();
    let depth = registry.undo_depth();
    let version = registry.get(&ids[0]).unwrap().audit.version;

    registry.update(&ids[0], |m| m.rates.hourly_rate = 120.0).unwrap();

    assert_eq!(registry.undo_depth(), depth);
    assert_eq!(registry.get(&ids[0]).unwrap().audit.version, version);
}

#[test]
fn test_update_logs_each_changed_field() {
    let (mut registry, ids) = seeded_registry();
    let updated = registry
        .update(&ids[1], |m| {
            m.rates.hourly_rate = 200.0;
            m.identity.model = "XL 106-8P".to_string();
        })
        .unwrap();

    let updates: Vec<_> = updated
        .audit
        .change_log
        .iter()
        .filter(|e| e.action == ChangeAction::Update)
        .collect();
    assert_eq!(updates.len(), 2);
    let fields: Vec<_> = updates.iter().filter_map(|e| e.field_changed.as_deref()).collect();
    assert!(fields.contains(&"identity.model"));
    assert!(fields.contains(&"rates.hourlyRate"));
    assert_eq!(updated.audit.version, 2);
}

// ==========================================
// 复制
// ==========================================

#[test]
fn test_duplicate_is_isolated_from_source() {
    let (mut registry, ids) = seeded_registry();
    let source = registry.get(&ids[1]).unwrap().clone();

    let copy = registry.duplicate(&ids[1], None).unwrap();

    assert_ne!(copy.identity.id, source.identity.id);
    assert_eq!(copy.identity.name, "XL 106 (Copy)");
    assert!(copy.audit.change_log.is_empty());
    assert_eq!(copy.audit.version, 1);
    assert_eq!(copy.rates, source.rates);
    assert_eq!(copy.computed, source.computed);
    assert_eq!(registry.len(), 4);
    assert_eq!(registry.machine_order().last(), Some(&copy.identity.id));

    registry
        .update(&copy.identity.id, |m| m.rates.hourly_rate = 999.0)
        .unwrap();
    assert_eq!(registry.get(&ids[1]).unwrap().rates.hourly_rate, 180.0);
}

#[test]
fn test_duplicate_with_name_override() {
    let (mut registry, ids) = seeded_registry();
    let copy = registry.duplicate(&ids[0], Some("SM 74 二号机")).unwrap();
    assert_eq!(copy.identity.name, "SM 74 二号机");
}

// ==========================================
// 删除 / 恢复
// ==========================================

#[test]
fn test_soft_delete_and_restore() {
    let (mut registry, ids) = seeded_registry();

    let archived = registry.delete(&ids[2]).unwrap();
    assert!(archived.audit.is_archived);
    assert_eq!(archived.identity.status, MachineStatus::Archived);
    assert_eq!(registry.len(), 3);
    assert_eq!(registry.active().len(), 2);

    let restored = registry.restore(&ids[2]).unwrap();
    assert!(!restored.audit.is_archived);
    assert!(restored.audit.archived_at.is_none());
    assert_eq!(restored.identity.status, MachineStatus::Active);
    assert_eq!(
        restored.audit.change_log.last().map(|e| e.action),
        Some(ChangeAction::Restore)
    );
}

#[test]
fn test_restore_active_machine_is_noop() {
    let (mut registry, ids) = seeded_registry();
    let before = registry.get(&ids[0]).unwrap().clone();
    let depth = registry.undo_depth();

    let restored = registry.restore(&ids[0]).unwrap();

    assert_eq!(restored, before);
    assert_eq!(registry.get(&ids[0]).unwrap(), &before);
    assert_eq!(registry.undo_depth(), depth);
}

#[test]
fn test_permanent_delete_requires_token() {
    let (mut registry, ids) = seeded_registry();
    let result = registry.permanently_delete(&ids[0], "yes");
    assert!(matches!(result, Err(RegistryError::Confirmation { .. })));
    assert_eq!(registry.len(), 3);
}

#[test]
fn test_permanent_delete_cannot_be_undone() {
    let (mut registry, ids) = seeded_registry();
    registry
        .update(&ids[0], |m| m.rates.hourly_rate = 130.0)
        .unwrap();
    let depth = registry.undo_depth();

    registry
        .permanently_delete(&ids[0], PURGE_CONFIRMATION_TOKEN)
        .unwrap();
    assert_eq!(registry.undo_depth(), depth);

    while registry.can_undo() {
        registry.undo().unwrap();
        assert!(registry.get(&ids[0]).is_none());
        assert!(!registry.machine_order().contains(&ids[0]));
    }
    while registry.can_redo() {
        registry.redo().unwrap();
        assert!(registry.get(&ids[0]).is_none());
    }
}

#[test]
fn test_unknown_id_is_not_found() {
    let (mut registry, _) = seeded_registry();
    assert!(matches!(
        registry.delete("missing"),
        Err(RegistryError::NotFound { .. })
    ));
    assert!(matches!(
        registry.update("missing", |m| m.rates.hourly_rate = 1.0),
        Err(RegistryError::NotFound { .. })
    ));
}

// ==========================================
// 批量操作
// ==========================================

#[test]
fn test_bulk_update_takes_single_snapshot() {
    let (mut registry, ids) = seeded_registry();
    let depth = registry.undo_depth();

    let updated = registry
        .bulk_update(&ids[..2], |m| m.rates.minimum_job_charge = 75.0)
        .unwrap();

    assert_eq!(updated.len(), 2);
    assert_eq!(registry.undo_depth(), depth + 1);

    registry.undo().unwrap();
    for id in &ids[..2] {
        assert_eq!(registry.get(id).unwrap().rates.minimum_job_charge, 50.0);
    }
}

#[test]
fn test_bulk_update_is_all_or_nothing() {
    let (mut registry, ids) = seeded_registry();
    let before = registry.snapshot();

    let mut targets = ids.clone();
    targets.push("missing".to_string());
    assert!(registry
        .bulk_update(&targets, |m| m.rates.hourly_rate = 10.0)
        .is_err());
    assert_eq!(registry.snapshot(), before);

    assert!(registry
        .bulk_update(&ids, |m| m.rates.hourly_rate = -5.0)
        .is_err());
    assert_eq!(registry.snapshot(), before);
}

#[test]
fn test_bulk_delete_counts_newly_archived() {
    let (mut registry, ids) = seeded_registry();
    registry.delete(&ids[0]).unwrap();
    let depth = registry.undo_depth();

    let archived = registry.bulk_delete(&ids).unwrap();

    assert_eq!(archived, 2);
    assert_eq!(registry.undo_depth(), depth + 1);
    assert!(registry.active().is_empty());
}

// ==========================================
// 查询与排序
// ==========================================

#[test]
fn test_queries_follow_display_order() {
    let (mut registry, ids) = seeded_registry();

    let presses: Vec<_> = registry
        .by_type(MachineType::OffsetPress)
        .iter()
        .map(|m| m.identity.id.clone())
        .collect();
    assert_eq!(presses, ids[..2].to_vec());
    assert_eq!(registry.by_tag("FINISHING").len(), 1);
    assert_eq!(registry.search("heidel").len(), 2);

    let filter = MachineFilter {
        types: vec![MachineType::OffsetPress],
        text: Some("xl".to_string()),
        ..MachineFilter::default()
    };
    let found = registry.filter(&filter);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].identity.id, ids[1]);

    let depth = registry.undo_depth();
    registry.sort_by(SortField::HourlyRate, false);
    assert_eq!(registry.machine_order()[0], ids[1]);
    assert_eq!(registry.undo_depth(), depth);
}

// ==========================================
// 持久化
// ==========================================

#[test]
fn test_reload_from_sqlite_store() {
    let (_temp, db_path) = create_test_db().expect("创建临时数据库失败");
    let ids = {
        let store = SqliteMachineStore::new(&db_path, DEFAULT_STORAGE_KEY).unwrap();
        let mut registry = MachineRegistry::with_store(EngineConfig::default(), Box::new(store));
        let a = add_offset_press(&mut registry, "SM 74", 120.0);
        let b = add_offset_press(&mut registry, "XL 106", 180.0);
        registry.update(&a, |m| m.rates.hourly_rate = 125.0).unwrap();
        assert!(!registry.is_dirty());
        vec![a, b]
    };

    let store = SqliteMachineStore::new(&db_path, DEFAULT_STORAGE_KEY).unwrap();
    let registry = MachineRegistry::load(Box::new(store), EngineConfig::default()).unwrap();

    assert_eq!(registry.machine_order(), ids.as_slice());
    let a = registry.get(&ids[0]).unwrap();
    assert_eq!(a.rates.hourly_rate, 125.0);
    assert_eq!(a.audit.version, 2);
    assert!(a.computed.total_hourly_cost > 0.0);
    assert_eq!(registry.indices().ids_by_type(MachineType::OffsetPress).len(), 2);
    // 历史不持久化
    assert!(!registry.can_undo());
}

#[test]
fn test_load_from_empty_store() {
    let registry =
        MachineRegistry::load(Box::new(in_memory_store()), EngineConfig::default()).unwrap();
    assert!(registry.is_empty());
}

#[test]
fn test_failing_store_keeps_in_memory_state() {
    let mut registry = MachineRegistry::with_store(EngineConfig::default(), Box::new(FailingStore));

    let id = add_offset_press(&mut registry, "SM 52", 90.0);

    assert!(registry.get(&id).is_some());
    assert!(registry.is_dirty());
    assert!(matches!(
        registry.flush(),
        Err(RegistryError::Repository(_))
    ));
    assert!(registry.is_dirty());
}

#[test]
fn test_flush_clears_dirty_flag() {
    let store = in_memory_store();
    let mut registry = MachineRegistry::with_store(EngineConfig::default(), Box::new(store));
    add_offset_press(&mut registry, "SM 52", 90.0);
    registry.flush().unwrap();
    assert!(!registry.is_dirty());
}

#[test]
fn test_store_round_trips_snapshot() {
    let store = in_memory_store();
    assert!(store.load().unwrap().is_none());

    let (registry, ids) = seeded_registry();
    let snapshot = registry.snapshot();
    let machines = ids
        .iter()
        .map(|id| (id.clone(), snapshot.machines[id].clone()))
        .collect();
    store
        .save(&print_cost_engine::repository::PersistedRegistry::new(
            machines,
            ids.clone(),
        ))
        .unwrap();

    let loaded = store.load().unwrap().expect("应读到快照");
    assert_eq!(loaded.machine_order, ids);
    assert_eq!(loaded.machines.len(), 3);
}
