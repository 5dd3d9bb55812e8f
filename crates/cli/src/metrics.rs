//! Prometheus registry and text-file export.

use once_cell::sync::Lazy;
use prometheus::{Encoder, Registry, TextEncoder};
use std::path::Path;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

fn register_metrics(registry: &Registry) {
    for metric in dossier_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Writes the exposition next to `path` and renames it into place, so a
/// node-exporter textfile collector never reads a half-written file.
pub fn write_textfile(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    std::fs::write(&staging, encode_metrics())?;
    std::fs::rename(&staging, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_core::metrics::RUNS_TOTAL;
    use tempfile::TempDir;

    #[test]
    fn test_textfile_contains_core_metrics() {
        RUNS_TOTAL.with_label_values(&["finished"]).inc();

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("metrics/dossier.prom");
        write_textfile(&path).unwrap();

        let output = std::fs::read_to_string(&path).unwrap();
        assert!(output.contains("dossier_runs_total"));
        assert!(output.contains("# TYPE"));
        assert!(!temp.path().join("metrics/dossier.prom.tmp").exists());
    }
}
