//! CPU topology discovery: logical CPUs grouped into physical cores and NUMA
//! nodes, read once from `/sys/devices/system/cpu/` and cached for the life
//! of the process.
//!
//! ```no_run
//! let topo = join_topo::CpuTopology::instance();
//! for core in topo.cores() {
//!     println!("core {} primary thread {:?}", core.id, core.primary_thread());
//! }
//! ```

mod detect;
mod error;

pub use error::TopoError;

/// A single hardware thread (`cpuN` in sysfs terms).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalCpu {
    pub id: u32,
    pub core: u32,
    pub socket: u32,
    pub numa: u32,
}

/// A physical core: one or more hardware threads (SMT siblings) sharing a
/// `(socket, core)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalCore {
    pub id: u32,
    pub socket: u32,
    pub numa: u32,
    pub threads: Vec<LogicalCpu>,
}

impl PhysicalCore {
    /// The lowest-numbered hardware thread on this core, or `None` if the
    /// core somehow has no threads (never true for a core built by
    /// [`CpuTopology::detect`]).
    #[must_use]
    pub fn primary_thread(&self) -> Option<u32> {
        self.threads.iter().map(|t| t.id).min()
    }
}

/// A NUMA node and the physical core ids that belong to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumaNode {
    pub id: u32,
    pub cores: Vec<u32>,
}

/// The detected topology of the host machine: immutable once built.
#[derive(Debug)]
pub struct CpuTopology {
    cores: Vec<PhysicalCore>,
    nodes: Vec<NumaNode>,
}

static INSTANCE: std::sync::OnceLock<CpuTopology> = std::sync::OnceLock::new();

impl CpuTopology {
    /// Returns the process-wide topology singleton, detecting it on first
    /// call. Detection failures fall back to a single-core, single-node
    /// topology rather than panicking, since a worker-count hint is never
    /// worth crashing a process over.
    pub fn instance() -> &'static CpuTopology {
        INSTANCE.get_or_init(|| match detect::detect() {
            Ok(topo) => {
                tracing::debug!(cores = topo.cores.len(), nodes = topo.nodes.len(), "cpu topology detected");
                topo
            }
            Err(err) => {
                tracing::warn!(%err, "cpu topology detection failed, falling back to a single core");
                CpuTopology::fallback()
            }
        })
    }

    fn fallback() -> Self {
        let cpu = LogicalCpu { id: 0, core: 0, socket: 0, numa: 0 };
        let core = PhysicalCore { id: 0, socket: 0, numa: 0, threads: vec![cpu] };
        Self {
            cores: vec![core],
            nodes: vec![NumaNode { id: 0, cores: vec![0] }],
        }
    }

    #[must_use]
    pub fn cores(&self) -> &[PhysicalCore] {
        &self.cores
    }

    #[must_use]
    pub fn nodes(&self) -> &[NumaNode] {
        &self.nodes
    }

    /// Renders the detected topology via `tracing::debug!`. Only compiled
    /// into test and debug builds, mirroring the source's `DEBUG`-gated
    /// `dump()`.
    #[cfg(any(test, debug_assertions))]
    pub fn dump(&self) {
        for core in &self.cores {
            tracing::debug!(
                core = core.id,
                socket = core.socket,
                numa = core.numa,
                threads = ?core.threads.iter().map(|t| t.id).collect::<Vec<_>>(),
                "physical core"
            );
        }
        for node in &self.nodes {
            tracing::debug!(node = node.id, cores = ?node.cores, "numa node");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_topology_has_one_core_and_node() {
        let topo = CpuTopology::fallback();
        assert_eq!(topo.cores().len(), 1);
        assert_eq!(topo.nodes().len(), 1);
        assert_eq!(topo.cores()[0].primary_thread(), Some(0));
    }

    #[test]
    fn instance_is_stable_across_calls() {
        let a = CpuTopology::instance() as *const CpuTopology;
        let b = CpuTopology::instance() as *const CpuTopology;
        assert_eq!(a, b);
    }
}
