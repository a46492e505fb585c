//! In-process configuration store backed by a JSON snapshot file.
//!
//! All entities live in id-keyed `BTreeMap`s, so every listing is naturally
//! in ascending-id order — the ordering the scheduler's determinism
//! guarantees lean on. `open` accepts `mem:` (ephemeral) or a snapshot path;
//! a missing file starts empty and is created on the first `flush`, while a
//! corrupt file is fatal at init.

use super::{ConfigStore, DataQuery, DuplicateTarget, QueryEntity};
use crate::coerce;
use crate::error::StoreError;
use crate::model::{
    Alarm, AlarmSeverity, Device, Event, EventSeverity, Fault, FbdProgram, Log, Point, PointGroup,
    Register, RegisterStatus, ScriptBinding, ScriptProgram,
};
use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

// ───────────────────────────────────────────────────────────────
// Snapshot wire format
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    devices: Vec<Device>,
    #[serde(default)]
    registers: Vec<Register>,
    #[serde(default)]
    point_groups: Vec<PointGroup>,
    #[serde(default)]
    points: Vec<Point>,
    #[serde(default)]
    fbd_programs: Vec<FbdProgram>,
    #[serde(default)]
    script_programs: Vec<ScriptProgram>,
    #[serde(default)]
    script_bindings: Vec<ScriptBinding>,
    #[serde(default)]
    alarms: Vec<Alarm>,
    #[serde(default)]
    events: Vec<Event>,
    #[serde(default)]
    logs: Vec<Log>,
    #[serde(default)]
    faults: Vec<Fault>,
}

// ───────────────────────────────────────────────────────────────
// MemStore
// ───────────────────────────────────────────────────────────────

/// The in-memory store. Cheap to construct empty for tests.
#[derive(Default)]
pub struct MemStore {
    path: Option<PathBuf>,
    devices: BTreeMap<i64, Device>,
    registers: BTreeMap<i64, Register>,
    groups: BTreeMap<i64, PointGroup>,
    points: BTreeMap<i64, Point>,
    fbd_programs: BTreeMap<i64, FbdProgram>,
    script_programs: BTreeMap<i64, ScriptProgram>,
    script_bindings: BTreeMap<i64, ScriptBinding>,
    alarms: BTreeMap<i64, Alarm>,
    events: BTreeMap<i64, Event>,
    logs: BTreeMap<i64, Log>,
    faults: BTreeMap<i64, Fault>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store from a DSN: `mem:` for ephemeral, otherwise a snapshot
    /// file path (an optional `file:` prefix is stripped).
    pub fn open(dsn: &str) -> Result<Self, StoreError> {
        let dsn = dsn.trim();
        if dsn.is_empty() {
            return Err(StoreError::BadDsn(dsn.to_string()));
        }
        if dsn == "mem:" || dsn == "mem://" {
            return Ok(Self::new());
        }
        let path = PathBuf::from(
            dsn.strip_prefix("file://")
                .or_else(|| dsn.strip_prefix("file:"))
                .unwrap_or(dsn),
        );
        let mut store = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| StoreError::Snapshot(e.to_string()))?;
            let snap: Snapshot =
                serde_json::from_str(&text).map_err(|e| StoreError::Corrupted(e.to_string()))?;
            let store = Self::from_snapshot(snap);
            info!(
                "store: loaded snapshot from {} ({} points, {} programs)",
                path.display(),
                store.points.len(),
                store.fbd_programs.len() + store.script_programs.len()
            );
            store
        } else {
            info!("store: no snapshot at {}, starting empty", path.display());
            Self::new()
        };
        store.path = Some(path);
        Ok(store)
    }

    fn from_snapshot(snap: Snapshot) -> Self {
        let mut s = Self::new();
        s.devices = snap.devices.into_iter().map(|e| (e.id, e)).collect();
        s.registers = snap.registers.into_iter().map(|e| (e.id, e)).collect();
        s.groups = snap.point_groups.into_iter().map(|e| (e.id, e)).collect();
        s.points = snap.points.into_iter().map(|e| (e.id, e)).collect();
        s.fbd_programs = snap.fbd_programs.into_iter().map(|e| (e.id, e)).collect();
        s.script_programs = snap.script_programs.into_iter().map(|e| (e.id, e)).collect();
        s.script_bindings = snap.script_bindings.into_iter().map(|e| (e.id, e)).collect();
        s.alarms = snap.alarms.into_iter().map(|e| (e.id, e)).collect();
        s.events = snap.events.into_iter().map(|e| (e.id, e)).collect();
        s.logs = snap.logs.into_iter().map(|e| (e.id, e)).collect();
        s.faults = snap.faults.into_iter().map(|e| (e.id, e)).collect();
        s
    }

    fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            devices: self.devices.values().cloned().collect(),
            registers: self.registers.values().cloned().collect(),
            point_groups: self.groups.values().cloned().collect(),
            points: self.points.values().cloned().collect(),
            fbd_programs: self.fbd_programs.values().cloned().collect(),
            script_programs: self.script_programs.values().cloned().collect(),
            script_bindings: self.script_bindings.values().cloned().collect(),
            alarms: self.alarms.values().cloned().collect(),
            events: self.events.values().cloned().collect(),
            logs: self.logs.values().cloned().collect(),
            faults: self.faults.values().cloned().collect(),
        }
    }

    // ── Entity insertion (control plane / tests) ──────────────

    pub fn upsert_device(&mut self, device: Device) {
        self.devices.insert(device.id, device);
    }

    pub fn upsert_register(&mut self, register: Register) {
        self.registers.insert(register.id, register);
    }

    pub fn upsert_group(&mut self, group: PointGroup) {
        self.groups.insert(group.id, group);
    }

    pub fn upsert_point(&mut self, point: Point) {
        self.points.insert(point.id, point);
    }

    pub fn upsert_fbd_program(&mut self, program: FbdProgram) {
        self.fbd_programs.insert(program.id, program);
    }

    pub fn upsert_script_program(&mut self, program: ScriptProgram) {
        self.script_programs.insert(program.id, program);
    }

    pub fn upsert_script_binding(&mut self, binding: ScriptBinding) {
        self.script_bindings.insert(binding.id, binding);
    }

    // ── Internals ─────────────────────────────────────────────

    fn next_id<T>(map: &BTreeMap<i64, T>) -> i64 {
        map.keys().next_back().copied().unwrap_or(0) + 1
    }

    /// Append a counter suffix until `base` collides with nothing in `taken`.
    fn unique_name(taken: &[String], base: &str) -> String {
        if !taken.iter().any(|n| n == base) {
            return base.to_string();
        }
        let mut n = 2usize;
        loop {
            let candidate = format!("{base} ({n})");
            if !taken.iter().any(|x| *x == candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn rows_as_json(&self, entity: QueryEntity) -> Vec<Value> {
        fn rows<T: Serialize>(map: &BTreeMap<i64, T>) -> Vec<Value> {
            map.values()
                .filter_map(|e| serde_json::to_value(e).ok())
                .collect()
        }
        match entity {
            QueryEntity::Devices => rows(&self.devices),
            QueryEntity::Registers => rows(&self.registers),
            QueryEntity::Points => rows(&self.points),
            QueryEntity::Alarms => rows(&self.alarms),
            QueryEntity::Events => rows(&self.events),
            QueryEntity::Logs => rows(&self.logs),
            QueryEntity::Faults => rows(&self.faults),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// ConfigStore impl
// ───────────────────────────────────────────────────────────────

impl ConfigStore for MemStore {
    fn devices(&self) -> Vec<Device> {
        self.devices.values().cloned().collect()
    }

    fn registers(&self) -> Vec<Register> {
        self.registers.values().cloned().collect()
    }

    fn register(&self, id: i64) -> Option<Register> {
        self.registers.get(&id).cloned()
    }

    fn point_groups(&self) -> Vec<PointGroup> {
        let mut groups: Vec<_> = self.groups.values().cloned().collect();
        groups.sort_by_key(|g| g.order_key);
        groups
    }

    fn points(&self) -> Vec<Point> {
        self.points.values().cloned().collect()
    }

    fn point(&self, id: i64) -> Option<Point> {
        self.points.get(&id).cloned()
    }

    fn points_in_group(&self, group_id: i64) -> Vec<Point> {
        self.points
            .values()
            .filter(|p| p.group_id == Some(group_id))
            .cloned()
            .collect()
    }

    fn registers_of_device(&self, device_id: i64) -> Vec<Register> {
        self.registers
            .values()
            .filter(|r| r.device_id == device_id)
            .cloned()
            .collect()
    }

    fn active_points(&self) -> Vec<Point> {
        self.points.values().filter(|p| p.is_active).cloned().collect()
    }

    fn fbd_programs(&self) -> Vec<FbdProgram> {
        self.fbd_programs.values().cloned().collect()
    }

    fn fbd_program(&self, id: i64) -> Option<FbdProgram> {
        self.fbd_programs.get(&id).cloned()
    }

    fn active_fbd_programs(&self) -> Vec<FbdProgram> {
        self.fbd_programs.values().filter(|p| p.is_active).cloned().collect()
    }

    fn script_programs(&self) -> Vec<ScriptProgram> {
        self.script_programs.values().cloned().collect()
    }

    fn script_program(&self, id: i64) -> Option<ScriptProgram> {
        self.script_programs.get(&id).cloned()
    }

    fn active_script_programs(&self) -> Vec<ScriptProgram> {
        self.script_programs.values().filter(|p| p.is_active).cloned().collect()
    }

    fn script_bindings(&self, script_id: i64) -> Vec<ScriptBinding> {
        self.script_bindings
            .values()
            .filter(|b| b.script_id == script_id)
            .cloned()
            .collect()
    }

    // ── Runtime writes ────────────────────────────────────────

    fn bulk_update_read_values(&mut self, updates: &[(i64, String)]) -> Result<(), StoreError> {
        let now = Utc::now();
        for (id, value) in updates {
            if let Some(point) = self.points.get_mut(id) {
                point.read_value = Some(value.clone());
                point.last_updated = Some(now);
            }
        }
        Ok(())
    }

    fn set_point_write_value(&mut self, point_id: i64, value: &str) -> Result<(), StoreError> {
        let point = self
            .points
            .get_mut(&point_id)
            .ok_or(StoreError::NotFound("point", point_id))?;
        point.write_value = Some(value.to_string());
        point.last_updated = Some(Utc::now());
        Ok(())
    }

    fn update_fbd_runtime(
        &mut self,
        program_id: i64,
        values: Map<String, Value>,
        state: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let program = self
            .fbd_programs
            .get_mut(&program_id)
            .ok_or(StoreError::NotFound("fbd program", program_id))?;
        program.runtime_values = values;
        program.runtime_state = state;
        program.updated_at = Some(Utc::now());
        Ok(())
    }

    fn update_script_execution(
        &mut self,
        script_id: i64,
        status: &str,
        log: &str,
    ) -> Result<(), StoreError> {
        let script = self
            .script_programs
            .get_mut(&script_id)
            .ok_or(StoreError::NotFound("script program", script_id))?;
        script.last_execution_status = Some(status.to_string());
        script.last_execution_log = Some(log.to_string());
        script.last_execution_time = Some(Utc::now());
        Ok(())
    }

    fn update_script_log(&mut self, script_id: i64, log: &str) -> Result<(), StoreError> {
        let script = self
            .script_programs
            .get_mut(&script_id)
            .ok_or(StoreError::NotFound("script program", script_id))?;
        script.last_execution_log = Some(log.to_string());
        Ok(())
    }

    // ── History ───────────────────────────────────────────────

    fn raise_alarm(
        &mut self,
        point_id: Option<i64>,
        name: &str,
        description: &str,
        severity: AlarmSeverity,
    ) -> bool {
        let duplicate = self
            .alarms
            .values()
            .any(|a| a.is_active && a.point_id == point_id && a.name == name);
        if duplicate {
            return false;
        }
        let id = Self::next_id(&self.alarms);
        debug!("alarm raised: {name} (point {point_id:?})");
        self.alarms.insert(
            id,
            Alarm {
                id,
                point_id,
                name: name.to_string(),
                description: description.to_string(),
                severity,
                start_time: Utc::now(),
                end_time: None,
                is_active: true,
                is_acknowledged: false,
                acknowledged_by: None,
                acknowledged_time: None,
                is_cleared: false,
                cleared_by: None,
                cleared_time: None,
            },
        );
        true
    }

    fn close_alarms_with_prefix(&mut self, point_id: i64, prefix: &str) {
        let now = Utc::now();
        for alarm in self.alarms.values_mut() {
            if alarm.is_active && alarm.point_id == Some(point_id) && alarm.name.starts_with(prefix)
            {
                alarm.is_active = false;
                alarm.is_cleared = true;
                alarm.cleared_by = Some("engine".to_string());
                alarm.cleared_time = Some(now);
                alarm.end_time = Some(now);
                debug!("alarm auto-cleared: {} (point {point_id})", alarm.name);
            }
        }
    }

    fn acknowledge_alarm(&mut self, alarm_id: i64, actor: &str) -> Result<(), StoreError> {
        let alarm = self
            .alarms
            .get_mut(&alarm_id)
            .ok_or(StoreError::NotFound("alarm", alarm_id))?;
        alarm.is_acknowledged = true;
        alarm.acknowledged_by = Some(actor.to_string());
        alarm.acknowledged_time = Some(Utc::now());
        Ok(())
    }

    fn clear_alarm(&mut self, alarm_id: i64, actor: &str) -> Result<(), StoreError> {
        let alarm = self
            .alarms
            .get_mut(&alarm_id)
            .ok_or(StoreError::NotFound("alarm", alarm_id))?;
        let now = Utc::now();
        alarm.is_active = false;
        alarm.is_cleared = true;
        alarm.cleared_by = Some(actor.to_string());
        alarm.cleared_time = Some(now);
        alarm.end_time = Some(now);
        Ok(())
    }

    fn append_event(
        &mut self,
        point_id: Option<i64>,
        event_type: &str,
        description: &str,
        severity: EventSeverity,
    ) {
        let id = Self::next_id(&self.events);
        self.events.insert(
            id,
            Event {
                id,
                point_id,
                event_type: event_type.to_string(),
                description: description.to_string(),
                severity,
                timestamp: Utc::now(),
            },
        );
    }

    fn append_log(&mut self, point_id: Option<i64>, source: &str, value: &str, message: &str) {
        let id = Self::next_id(&self.logs);
        self.logs.insert(
            id,
            Log {
                id,
                point_id,
                source: source.to_string(),
                value: value.to_string(),
                message: message.to_string(),
                timestamp: Utc::now(),
            },
        );
    }

    fn append_fault(&mut self, device_id: i64, point_id: Option<i64>, description: &str) -> i64 {
        let id = Self::next_id(&self.faults);
        self.faults.insert(
            id,
            Fault {
                id,
                device_id,
                point_id,
                description: description.to_string(),
                is_resolved: false,
                resolved_at: None,
                timestamp: Utc::now(),
            },
        );
        id
    }

    fn resolve_fault(&mut self, fault_id: i64) -> Result<(), StoreError> {
        let fault = self
            .faults
            .get_mut(&fault_id)
            .ok_or(StoreError::NotFound("fault", fault_id))?;
        fault.is_resolved = true;
        fault.resolved_at = Some(Utc::now());
        Ok(())
    }

    fn alarms(&self) -> Vec<Alarm> {
        self.alarms.values().cloned().collect()
    }

    fn events(&self) -> Vec<Event> {
        self.events.values().cloned().collect()
    }

    fn logs(&self) -> Vec<Log> {
        self.logs.values().cloned().collect()
    }

    fn faults(&self) -> Vec<Fault> {
        self.faults.values().cloned().collect()
    }

    // ── Aggregates ────────────────────────────────────────────

    fn data_query(&self, query: &DataQuery) -> f64 {
        match query {
            DataQuery::Count(entity) => self.rows_as_json(*entity).len() as f64,
            DataQuery::Sum { entity, field } => self
                .rows_as_json(*entity)
                .iter()
                .map(|row| row.get(field).map_or(0.0, coerce::json_f64))
                .sum(),
            DataQuery::FilteredCount { entity, field, equals } => self
                .rows_as_json(*entity)
                .iter()
                .filter(|row| row.get(field) == Some(equals))
                .count() as f64,
        }
    }

    // ── Field-driver contract ─────────────────────────────────

    fn set_register_value(&mut self, register_id: i64, value: &str) -> Result<(), StoreError> {
        let register = self
            .registers
            .get_mut(&register_id)
            .ok_or(StoreError::NotFound("register", register_id))?;
        register.current_value = Some(value.to_string());
        register.last_updated = Some(Utc::now());
        Ok(())
    }

    fn set_register_status(
        &mut self,
        register_id: i64,
        status: RegisterStatus,
        message: Option<&str>,
    ) -> Result<(), StoreError> {
        let register = self
            .registers
            .get_mut(&register_id)
            .ok_or(StoreError::NotFound("register", register_id))?;
        register.error_status = status;
        register.error_message = message.map(str::to_string);
        register.last_updated = Some(Utc::now());
        Ok(())
    }

    // ── Administration ────────────────────────────────────────

    fn duplicate(
        &mut self,
        target: DuplicateTarget,
        count: usize,
        include_children: bool,
        names: &[String],
    ) -> Result<Vec<i64>, StoreError> {
        let mut created = Vec::with_capacity(count);
        for i in 0..count {
            let requested = names.get(i).cloned();
            match target {
                DuplicateTarget::Device(id) => {
                    let source = self
                        .devices
                        .get(&id)
                        .cloned()
                        .ok_or(StoreError::NotFound("device", id))?;
                    let taken: Vec<String> =
                        self.devices.values().map(|d| d.name.clone()).collect();
                    let base =
                        requested.unwrap_or_else(|| format!("{} (Copy {})", source.name, i + 1));
                    let new_id = Self::next_id(&self.devices);
                    let mut clone = source.clone();
                    clone.id = new_id;
                    clone.name = Self::unique_name(&taken, &base);
                    self.devices.insert(new_id, clone);
                    if include_children {
                        let children: Vec<Register> = self
                            .registers
                            .values()
                            .filter(|r| r.device_id == id)
                            .cloned()
                            .collect();
                        for mut register in children {
                            register.id = Self::next_id(&self.registers);
                            register.device_id = new_id;
                            self.registers.insert(register.id, register);
                        }
                    }
                    created.push(new_id);
                }
                DuplicateTarget::PointGroup(id) => {
                    let source = self
                        .groups
                        .get(&id)
                        .cloned()
                        .ok_or(StoreError::NotFound("point group", id))?;
                    let taken: Vec<String> = self.groups.values().map(|g| g.name.clone()).collect();
                    let base =
                        requested.unwrap_or_else(|| format!("{} (Copy {})", source.name, i + 1));
                    let new_id = Self::next_id(&self.groups);
                    let order_key = self.groups.values().map(|g| g.order_key).max().unwrap_or(0) + 1;
                    self.groups.insert(
                        new_id,
                        PointGroup {
                            id: new_id,
                            name: Self::unique_name(&taken, &base),
                            order_key,
                        },
                    );
                    if include_children {
                        let children: Vec<Point> = self
                            .points
                            .values()
                            .filter(|p| p.group_id == Some(id))
                            .cloned()
                            .collect();
                        for mut point in children {
                            point.id = Self::next_id(&self.points);
                            point.group_id = Some(new_id);
                            self.points.insert(point.id, point);
                        }
                    }
                    created.push(new_id);
                }
                DuplicateTarget::FbdProgram(id) => {
                    let source = self
                        .fbd_programs
                        .get(&id)
                        .cloned()
                        .ok_or(StoreError::NotFound("fbd program", id))?;
                    let taken: Vec<String> =
                        self.fbd_programs.values().map(|p| p.name.clone()).collect();
                    let base =
                        requested.unwrap_or_else(|| format!("{} (Copy {})", source.name, i + 1));
                    let new_id = Self::next_id(&self.fbd_programs);
                    let mut clone = source.clone();
                    clone.id = new_id;
                    clone.name = Self::unique_name(&taken, &base);
                    clone.runtime_values = Map::new();
                    clone.runtime_state = Map::new();
                    self.fbd_programs.insert(new_id, clone);
                    created.push(new_id);
                }
                DuplicateTarget::ScriptProgram(id) => {
                    let source = self
                        .script_programs
                        .get(&id)
                        .cloned()
                        .ok_or(StoreError::NotFound("script program", id))?;
                    let taken: Vec<String> =
                        self.script_programs.values().map(|p| p.name.clone()).collect();
                    let base =
                        requested.unwrap_or_else(|| format!("{} (Copy {})", source.name, i + 1));
                    let new_id = Self::next_id(&self.script_programs);
                    let mut clone = source.clone();
                    clone.id = new_id;
                    clone.name = Self::unique_name(&taken, &base);
                    clone.last_execution_status = None;
                    clone.last_execution_time = None;
                    clone.last_execution_log = None;
                    self.script_programs.insert(new_id, clone);
                    if include_children {
                        let children: Vec<ScriptBinding> = self
                            .script_bindings
                            .values()
                            .filter(|b| b.script_id == id)
                            .cloned()
                            .collect();
                        for mut binding in children {
                            binding.id = Self::next_id(&self.script_bindings);
                            binding.script_id = new_id;
                            self.script_bindings.insert(binding.id, binding);
                        }
                    }
                    created.push(new_id);
                }
            }
        }
        Ok(created)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let text = serde_json::to_string_pretty(&self.to_snapshot())
            .map_err(|e| StoreError::Snapshot(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| StoreError::Snapshot(e.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
