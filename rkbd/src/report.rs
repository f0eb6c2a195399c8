use std::collections::BTreeMap;

use comfy_table::Table;
use comfy_table::presets::UTF8_FULL;
use serde::Serialize;

use crate::worker::Worker;
use crate::worker::gc::GcPolicy;
use crate::worker::platform::format_platform;

#[derive(Debug, Serialize)]
pub struct WorkerView<'a> {
    pub id: &'a str,
    pub snapshotter: &'static str,
    pub platforms: Vec<String>,
    pub labels: &'a BTreeMap<String, String>,
    pub gc_policy: &'a GcPolicy,
}

impl<'a> WorkerView<'a> {
    pub fn new(worker: &'a dyn Worker) -> Self {
        Self {
            id: worker.id(),
            snapshotter: worker.snapshotter().name(),
            platforms: worker.platforms().iter().map(format_platform).collect(),
            labels: worker.labels(),
            gc_policy: worker.gc_policy(),
        }
    }
}

pub fn render_table(workers: &[Box<dyn Worker>]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "SNAPSHOTTER", "PLATFORMS", "GC", "LABELS"]);
    for worker in workers {
        let view = WorkerView::new(worker.as_ref());
        let gc = if view.gc_policy.enabled {
            let keep = view
                .gc_policy
                .rules
                .iter()
                .map(|rule| rule.keep_bytes)
                .max()
                .unwrap_or_default();
            format!("keep {} MB", keep / 1_000_000)
        } else {
            "disabled".to_string()
        };
        let labels = view
            .labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("\n");
        table.add_row(vec![
            view.id.to_string(),
            view.snapshotter.to_string(),
            view.platforms.join(","),
            gc,
            labels,
        ]);
    }
    table.to_string()
}

pub fn render_json(workers: &[Box<dyn Worker>]) -> serde_json::Result<String> {
    let views = workers
        .iter()
        .map(|worker| WorkerView::new(worker.as_ref()))
        .collect::<Vec<_>>();
    serde_json::to_string_pretty(&views)
}
