use fynanpro_db::inspect::TableInfo;
use fynanpro_db::{MigrationState, MigrationStatus, RunReport};

pub fn print_report(report: &RunReport) {
    if report.is_noop() {
        println!(
            "Database is up to date ({} migrations already applied).",
            report.skipped.len()
        );
        return;
    }
    println!("Applied {} migrations:", report.applied.len());
    for name in &report.applied {
        println!("  + {name}");
    }
    if !report.skipped.is_empty() {
        println!("{} were already applied.", report.skipped.len());
    }
}

pub fn print_status(statuses: &[MigrationStatus]) {
    let name_w = statuses.iter().map(|s| s.name.len()).max().unwrap_or(0);

    for status in statuses {
        let state = match status.state {
            MigrationState::Applied => "applied",
            MigrationState::Pending => "pending",
            MigrationState::Unregistered => "unregistered",
        };
        let when = status
            .applied_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        println!("{:<name_w$}  {:<12}  {when}", status.name, state);
    }

    let pending = statuses
        .iter()
        .filter(|s| s.state == MigrationState::Pending)
        .count();
    println!();
    println!("{pending} pending");
}

pub fn print_tables(tables: &[TableInfo]) {
    for table in tables {
        let rows = if table.rows == 1 { "row" } else { "rows" };
        println!("{} ({} {rows})", table.name, table.rows);

        let name_w = table.columns.iter().map(|c| c.name.len()).max().unwrap_or(0);
        let type_w = table
            .columns
            .iter()
            .map(|c| c.decl_type.len())
            .max()
            .unwrap_or(0);
        for column in &table.columns {
            let mut flags = Vec::new();
            if column.primary_key {
                flags.push("primary key".to_string());
            }
            if column.not_null {
                flags.push("not null".to_string());
            }
            if let Some(default) = &column.default {
                flags.push(format!("default {default}"));
            }
            println!(
                "  {:<name_w$}  {:<type_w$}  {}",
                column.name,
                column.decl_type,
                flags.join(", ")
            );
        }
        println!();
    }
}
