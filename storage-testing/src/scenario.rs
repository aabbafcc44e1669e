// SPDX-License-Identifier: GPL-3.0-only

//! TOML scenarios: one disk, its current partitions and the operations to queue
//!
//! ```toml
//! name = "grow-home"
//!
//! [device]
//! node = "/dev/sda"
//! total_sectors = 2048000
//! table = "msdos"
//!
//! [[partitions]]
//! number = 1
//! fs = "Ext4"
//! first_sector = 2048
//! last_sector = 206847
//!
//! [[operations]]
//! kind = "resize"
//! number = 1
//! first_sector = 2048
//! last_sector = 411647
//! ```
//!
//! File system types and flags use the model's variant names. Image paths are
//! relative to the scenario file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use storage_ops::{
    BackupOperation, CheckOperation, CopyOperation, CreateFileSystemOperation,
    CreatePartitionTableOperation, DeleteOperation, NewOperation, OperationStack, PendingOperation,
    PushOutcome, ResizeOperation, RestoreOperation, SetFileSystemLabelOperation,
    SetPartFlagsOperation, ShredAction,
};
use storage_types::{
    Device, DeviceSet, FileSystem, FileSystemType, NodeRef, Partition, PartitionFlag,
    PartitionFlags, PartitionRef, PartitionRole, PartitionRoles, PartitionTable, TableType,
};
use tracing::info;

use crate::errors::{Result, TestingError};
use crate::fixtures::{numbered_partition, region_at};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub device: DeviceSpec,
    #[serde(default)]
    pub partitions: Vec<PartitionSpec>,
    #[serde(default)]
    pub operations: Vec<OperationSpec>,
    /// Directory relative image paths resolve against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSpec {
    pub node: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_sector_size")]
    pub sector_size: u64,
    pub total_sectors: u64,
    /// Table type name (msdos, gpt, ...); no table when absent
    pub table: Option<String>,
}

fn default_model() -> String {
    "Scenario Disk".to_string()
}

fn default_sector_size() -> u64 {
    512
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSpec {
    #[default]
    Primary,
    Extended,
    Logical,
}

impl RoleSpec {
    fn roles(self) -> PartitionRoles {
        match self {
            Self::Primary => PartitionRole::Primary.into(),
            Self::Extended => PartitionRole::Extended.into(),
            Self::Logical => PartitionRole::Logical.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionSpec {
    pub number: u32,
    #[serde(default)]
    pub role: RoleSpec,
    pub fs: FileSystemType,
    pub first_sector: u64,
    pub last_sector: u64,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub flags: Vec<PartitionFlag>,
    pub mount_point: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationSpec {
    New {
        first_sector: u64,
        last_sector: u64,
        fs: FileSystemType,
        #[serde(default)]
        label: String,
    },
    Delete {
        number: u32,
        #[serde(default)]
        shred: ShredAction,
    },
    Resize {
        number: u32,
        first_sector: u64,
        last_sector: u64,
    },
    /// Paste partition `source` at `sector`, into free space or over a partition
    Copy { source: u32, sector: u64 },
    Restore { file: PathBuf, sector: u64 },
    Backup { number: u32, file: PathBuf },
    Check { number: u32 },
    CreateFileSystem { number: u32, fs: FileSystemType },
    SetLabel { number: u32, label: String },
    SetFlags { number: u32, flags: Vec<PartitionFlag> },
    CreatePartitionTable { table: String },
}

/// Where scenario files live unless `STORAGE_TESTING_SCENARIOS` says otherwise
pub fn scenarios_root() -> PathBuf {
    if let Ok(value) = std::env::var("STORAGE_TESTING_SCENARIOS") {
        return PathBuf::from(value);
    }
    Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios")
}

pub fn scenario_path_for_name(name: &str) -> PathBuf {
    scenarios_root().join(format!("{name}.toml"))
}

/// Load a scenario by file path, or by name from [`scenarios_root`]
pub fn load(path_or_name: &str) -> Result<Scenario> {
    let path = Path::new(path_or_name);
    if path.exists() {
        load_path(path)
    } else {
        load_path(&scenario_path_for_name(path_or_name))
    }
}

pub fn load_path(path: &Path) -> Result<Scenario> {
    if !path.exists() {
        return Err(TestingError::ScenarioNotFound {
            path: path.to_path_buf(),
        });
    }
    let raw = fs::read_to_string(path).map_err(|error| TestingError::ScenarioInvalid {
        name: path.display().to_string(),
        reason: error.to_string(),
    })?;
    let mut scenario = from_toml_str(&raw)?;
    scenario.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(scenario)
}

pub fn from_toml_str(raw: &str) -> Result<Scenario> {
    let scenario: Scenario = toml::from_str(raw).map_err(|error| TestingError::ScenarioInvalid {
        name: "<unparsed>".to_string(),
        reason: error.to_string(),
    })?;
    validate(&scenario)?;
    Ok(scenario)
}

fn invalid(scenario: &Scenario, reason: impl Into<String>) -> TestingError {
    TestingError::ScenarioInvalid {
        name: scenario.name.clone(),
        reason: reason.into(),
    }
}

pub fn validate(scenario: &Scenario) -> Result<()> {
    if scenario.name.is_empty() {
        return Err(TestingError::ScenarioInvalid {
            name: "<unknown>".to_string(),
            reason: "name must not be empty".to_string(),
        });
    }

    let device = &scenario.device;
    if device.total_sectors == 0 {
        return Err(invalid(scenario, "total_sectors must not be zero"));
    }
    if device.sector_size < 512 || !device.sector_size.is_power_of_two() {
        return Err(invalid(scenario, "sector_size must be a power of two of at least 512"));
    }
    if let Some(table) = &device.table
        && TableType::from_name(table) == TableType::Unknown
    {
        return Err(invalid(scenario, format!("unknown partition table type '{table}'")));
    }
    if device.table.is_none() && !scenario.partitions.is_empty() {
        return Err(invalid(scenario, "partitions need a partition table"));
    }

    let mut numbers = Vec::new();
    for p in &scenario.partitions {
        if p.first_sector > p.last_sector || p.last_sector >= device.total_sectors {
            return Err(invalid(
                scenario,
                format!("partition {} does not fit on the device", p.number),
            ));
        }
        if numbers.contains(&p.number) {
            return Err(invalid(scenario, format!("partition number {} is used twice", p.number)));
        }
        numbers.push(p.number);
    }

    let extended = scenario
        .partitions
        .iter()
        .filter(|p| p.role == RoleSpec::Extended)
        .count();
    if extended > 1 {
        return Err(invalid(scenario, "at most one extended partition is allowed"));
    }
    if extended == 0 && scenario.partitions.iter().any(|p| p.role == RoleSpec::Logical) {
        return Err(invalid(scenario, "logical partitions need an extended partition"));
    }
    Ok(())
}

impl Scenario {
    /// The device as the engine would have scanned it
    pub fn devices(&self) -> Result<DeviceSet> {
        let spec = &self.device;
        let mut device = Device::disk(&spec.model, &spec.node, spec.sector_size, spec.total_sectors);

        if let Some(table_name) = &spec.table {
            let mut table = PartitionTable::with_defaults(
                TableType::from_name(table_name),
                &device.geometry(),
            );
            let mut ordered: Vec<&PartitionSpec> = self.partitions.iter().collect();
            ordered.sort_by_key(|p| (p.role == RoleSpec::Logical, p.number));

            let mut extended = None;
            for p in ordered {
                let parent = match (p.role, extended) {
                    (RoleSpec::Logical, Some(id)) => NodeRef::Partition(id),
                    _ => NodeRef::Root,
                };
                let id = table.insert(self.partition(p, parent))?;
                if p.role == RoleSpec::Extended {
                    extended = Some(id);
                }
            }
            device = device.with_partition_table(table);
            device.update_unallocated();
        }

        let mut devices = DeviceSet::new();
        devices.insert(device);
        Ok(devices)
    }

    fn partition(&self, p: &PartitionSpec, parent: NodeRef) -> Partition {
        let fs_type = if p.role == RoleSpec::Extended {
            FileSystemType::Extended
        } else {
            p.fs
        };
        let fs = FileSystem::new(fs_type, p.first_sector, p.last_sector, self.device.sector_size)
            .with_label(&p.label);
        let active: PartitionFlags = p.flags.iter().copied().collect();
        let partition = Partition::new(
            &self.device.node,
            parent,
            p.role.roles(),
            fs,
            p.first_sector,
            p.last_sector,
        )
        .with_number(p.number)
        .with_flags(PartitionFlags::all(), active);
        match &p.mount_point {
            Some(mount_point) => partition.with_mount_point(mount_point),
            None => partition,
        }
    }

    /// Build each operation against the stack's current preview and push it
    pub fn queue(&self, stack: &OperationStack) -> Result<Vec<PushOutcome>> {
        let mut outcomes = Vec::with_capacity(self.operations.len());
        for (index, spec) in self.operations.iter().enumerate() {
            let devices = stack.preview_devices();
            let operation = self.build(&devices, index, spec)?;
            let description = operation.description();
            let outcome = stack.push(operation)?;
            info!(scenario = %self.name, index, operation = %description, ?outcome, "queued");
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    fn numbered(&self, devices: &DeviceSet, index: usize, number: u32) -> Result<PartitionRef> {
        numbered_partition(devices, &self.device.node, number)
            .map(Partition::reference)
            .ok_or_else(|| TestingError::UnknownPartition {
                name: self.name.clone(),
                index,
                number,
            })
    }

    fn region(&self, devices: &DeviceSet, sector: u64, roles: PartitionRoles) -> Result<Partition> {
        region_at(devices, &self.device.node, sector, roles)
            .ok_or_else(|| invalid(self, format!("nothing usable at sector {sector}")))
    }

    fn build(&self, devices: &DeviceSet, index: usize, spec: &OperationSpec) -> Result<PendingOperation> {
        let node = &self.device.node;
        let operation: PendingOperation = match spec {
            OperationSpec::New {
                first_sector,
                last_sector,
                fs,
                label,
            } => {
                let free = self.region(devices, *first_sector, PartitionRole::Unallocated.into())?;
                if *last_sector > free.last_sector {
                    return Err(invalid(
                        self,
                        format!("new partition at {first_sector} runs past the free region"),
                    ));
                }
                let mut partition = NewOperation::create_new(&free, *fs);
                partition.set_geometry(*first_sector, *last_sector);
                partition.file_system.first_sector = *first_sector;
                partition.file_system.last_sector = *last_sector;
                partition.file_system.label = label.clone();
                NewOperation::new(partition).into()
            }
            OperationSpec::Delete { number, shred } => {
                let target = self.numbered(devices, index, *number)?;
                DeleteOperation::new(devices, &target, *shred)?.into()
            }
            OperationSpec::Resize {
                number,
                first_sector,
                last_sector,
            } => {
                let target = self.numbered(devices, index, *number)?;
                ResizeOperation::new(devices, &target, *first_sector, *last_sector)?.into()
            }
            OperationSpec::Copy { source, sector } => {
                let source = self.numbered(devices, index, *source)?;
                let source_partition = devices.partition(&source)?;
                let target = self.region(
                    devices,
                    *sector,
                    PartitionRole::Primary | PartitionRole::Logical | PartitionRole::Unallocated,
                )?;
                let copied = CopyOperation::create_copy(&target, source_partition);
                CopyOperation::new(devices, copied, &source)?.into()
            }
            OperationSpec::Restore { file, sector } => {
                let file = self.base_dir.join(file);
                let target = self.region(
                    devices,
                    *sector,
                    PartitionRole::Primary | PartitionRole::Logical | PartitionRole::Unallocated,
                )?;
                let device = devices.device(node)?;
                let partition = RestoreOperation::create_restore_partition(
                    device,
                    target.parent(),
                    *sector,
                    &file,
                )?;
                RestoreOperation::new(devices, partition, &file)?.into()
            }
            OperationSpec::Backup { number, file } => {
                let target = self.numbered(devices, index, *number)?;
                BackupOperation::new(devices, &target, self.base_dir.join(file))?.into()
            }
            OperationSpec::Check { number } => {
                let target = self.numbered(devices, index, *number)?;
                CheckOperation::new(devices, &target)?.into()
            }
            OperationSpec::CreateFileSystem { number, fs } => {
                let target = self.numbered(devices, index, *number)?;
                CreateFileSystemOperation::new(devices, &target, *fs)?.into()
            }
            OperationSpec::SetLabel { number, label } => {
                let target = self.numbered(devices, index, *number)?;
                SetFileSystemLabelOperation::new(devices, &target, label.as_str())?.into()
            }
            OperationSpec::SetFlags { number, flags } => {
                let target = self.numbered(devices, index, *number)?;
                let flags: PartitionFlags = flags.iter().copied().collect();
                SetPartFlagsOperation::new(devices, &target, flags)?.into()
            }
            OperationSpec::CreatePartitionTable { table } => {
                let table_type = TableType::from_name(table);
                if table_type == TableType::Unknown {
                    return Err(invalid(self, format!("unknown partition table type '{table}'")));
                }
                CreatePartitionTableOperation::new(devices, node, table_type)?.into()
            }
        };
        Ok(operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROW: &str = r#"
name = "grow"

[device]
node = "/dev/sda"
total_sectors = 2048000
table = "msdos"

[[partitions]]
number = 1
fs = "Ext4"
first_sector = 2048
last_sector = 206847
flags = ["Boot"]

[[partitions]]
number = 2
role = "extended"
fs = "Extended"
first_sector = 206848
last_sector = 821247

[[partitions]]
number = 5
role = "logical"
fs = "Xfs"
first_sector = 208896
last_sector = 413695

[[operations]]
kind = "resize"
number = 1
first_sector = 2048
last_sector = 204799

[[operations]]
kind = "set_label"
number = 5
label = "scratch"
"#;

    #[test]
    fn scenarios_build_the_described_layout() {
        let scenario = from_toml_str(GROW).unwrap();
        let devices = scenario.devices().unwrap();
        let sda5 = numbered_partition(&devices, "/dev/sda", 5).unwrap();
        assert!(sda5.is_logical());
        assert!(matches!(sda5.parent(), NodeRef::Partition(_)));
        let sda1 = numbered_partition(&devices, "/dev/sda", 1).unwrap();
        assert!(sda1.active_flags.contains(PartitionFlag::Boot));
    }

    #[test]
    fn operations_are_queued_in_order() {
        let scenario = from_toml_str(GROW).unwrap();
        let stack = OperationStack::new(storage_ops::EngineConfig::default());
        for device in scenario.devices().unwrap().iter() {
            stack.add_device(device.clone());
        }
        let outcomes = scenario.queue(&stack).unwrap();
        assert_eq!(outcomes, vec![PushOutcome::Appended, PushOutcome::Appended]);
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn unknown_partition_numbers_are_reported() {
        let raw = GROW.replace("number = 5\nlabel", "number = 7\nlabel");
        let scenario = from_toml_str(&raw).unwrap();
        let stack = OperationStack::new(storage_ops::EngineConfig::default());
        for device in scenario.devices().unwrap().iter() {
            stack.add_device(device.clone());
        }
        let err = scenario.queue(&stack).unwrap_err();
        assert!(matches!(err, TestingError::UnknownPartition { number: 7, index: 1, .. }));
    }

    #[test]
    fn invalid_scenarios_are_rejected() {
        let raw = GROW.replace("role = \"extended\"", "role = \"primary\"");
        assert!(matches!(
            from_toml_str(&raw),
            Err(TestingError::ScenarioInvalid { .. })
        ));
        assert!(matches!(
            load("no-such-scenario"),
            Err(TestingError::ScenarioNotFound { .. })
        ));
    }
}
