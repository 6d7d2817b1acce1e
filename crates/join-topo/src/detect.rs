use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::TopoError;
use crate::{CpuTopology, LogicalCpu, NumaNode, PhysicalCore};

const CPU_ROOT: &str = "/sys/devices/system/cpu";

pub(crate) fn detect() -> Result<CpuTopology, TopoError> {
    let entries = fs::read_dir(CPU_ROOT).map_err(|source| TopoError::Io {
        path: CPU_ROOT.to_string(),
        source,
    })?;

    let mut cpu_ids = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(rest) = name.strip_prefix("cpu") {
            if let Ok(id) = rest.parse::<u32>() {
                cpu_ids.push(id);
            }
        }
    }
    cpu_ids.sort_unstable();
    if cpu_ids.is_empty() {
        return Err(TopoError::NoCpusFound);
    }

    let mut logical = Vec::with_capacity(cpu_ids.len());
    for id in cpu_ids {
        let cpu_path = format!("{CPU_ROOT}/cpu{id}");
        let core = read_int(&format!("{cpu_path}/topology/core_id")).unwrap_or(id);
        let socket = read_int(&format!("{cpu_path}/topology/physical_package_id")).unwrap_or(0);
        let numa = find_numa(Path::new(&cpu_path)).unwrap_or(0);
        logical.push(LogicalCpu { id, core, socket, numa });
    }

    // Group logical CPUs into physical cores by (socket, core), ordering
    // threads within a core by id so `primary_thread()` is SMT-stable.
    let mut by_core: BTreeMap<(u32, u32), Vec<LogicalCpu>> = BTreeMap::new();
    for cpu in logical {
        by_core.entry((cpu.socket, cpu.core)).or_default().push(cpu);
    }

    let mut cores = Vec::with_capacity(by_core.len());
    for ((socket, core_id), mut threads) in by_core {
        threads.sort_by_key(|t| t.id);
        let numa = threads[0].numa;
        cores.push(PhysicalCore {
            id: core_id,
            socket,
            numa,
            threads,
        });
    }
    cores.sort_by_key(|c| c.primary_thread().unwrap_or(u32::MAX));

    let mut by_numa: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for core in &cores {
        by_numa.entry(core.numa).or_default().push(core.id);
    }
    let nodes = by_numa
        .into_iter()
        .map(|(id, mut cores)| {
            cores.sort_unstable();
            NumaNode { id, cores }
        })
        .collect();

    Ok(CpuTopology { cores, nodes })
}

fn read_int(path: &str) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Scans a `cpuN` sysfs directory for a `nodeM` entry (either a plain
/// directory or, on most kernels, a symlink into `/sys/devices/system/node/`)
/// and returns `M`. Falls back to node 0 if none is found (NUMA-less
/// machines don't expose any `node*` entries at all).
fn find_numa(cpu_path: &Path) -> Option<u32> {
    let entries = fs::read_dir(cpu_path).ok()?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(rest) = name.strip_prefix("node") {
            if let Ok(id) = rest.parse::<u32>() {
                return Some(id);
            }
        }
    }
    None
}
