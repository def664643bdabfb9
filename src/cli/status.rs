use super::ui::{self, StyleType};
use crate::core::quota::{QuotaStatus, QuotaTracker};
use anyhow::Result;
use chrono::Local;
use comfy_table::{Cell, Table};

/// Prints the usage of every provider.
pub async fn run(tracker: &dyn QuotaTracker) -> Result<()> {
    let report = tracker.report().await;
    println!("{}", ui::style_text("Provider quotas", StyleType::Title));
    println!("{}", build_table(&report));
    Ok(())
}

fn build_table(report: &[QuotaStatus]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Provider"),
        ui::header_cell("Used"),
        ui::header_cell("Quota"),
        ui::header_cell("Remaining"),
        ui::header_cell("Reset"),
        ui::header_cell("Window Start"),
    ]);

    for status in report {
        table.add_row(vec![
            Cell::new(&status.name),
            ui::count_cell(status.used_count),
            ui::count_cell(status.quota_ceiling),
            ui::remaining_cell(status.remaining, status.state),
            Cell::new(status.reset_period),
            // Monthly windows start at local midnight.
            Cell::new(
                status
                    .last_reset
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M"),
            ),
        ]);
    }
    table
}
