use thiserror::Error;

/// Failure detecting the host's CPU topology from sysfs.
#[derive(Debug, Error)]
pub enum TopoError {
    #[error("no online CPUs found under /sys/devices/system/cpu")]
    NoCpusFound,
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
