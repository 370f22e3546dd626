//! Plain-text rendering for `pdfmesh services` and `pdfmesh health`.

use pdfmesh_client::OrchestratorHealth;
use pdfmesh_common::ServiceDescriptor;
use std::fmt::Write;

const HEADERS: [&str; 5] = ["SERVICE ID", "OPERATION", "ADDRESS", "STATUS", "VERSION"];

/// Renders services as an aligned table, one row per service.
pub fn services_table(services: &[ServiceDescriptor]) -> String {
    if services.is_empty() {
        return "No services registered\n".to_string();
    }

    let rows: Vec<[String; 5]> = services
        .iter()
        .map(|s| {
            [
                s.service_id.clone(),
                s.operation_type.to_string(),
                s.address(),
                s.status.to_string(),
                s.version.clone(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &HEADERS.map(String::from), &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String; 5], widths: &[usize; 5]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = width))
        .collect::<Vec<_>>()
        .join("  ");
    let _ = writeln!(out, "{}", line.trim_end());
}

pub fn health_summary(health: &OrchestratorHealth) -> String {
    format!(
        "status: {}\nservices: {} total, {} healthy, {} unhealthy\n",
        health.status, health.services.total, health.services.healthy, health.services.unhealthy
    )
}
