// Summary tables and CSV export for simulation results

use crate::models::{CacheRow, PoolRow, ResilienceRow};
use serde::Serialize;
use std::path::Path;

/// Print the cache replay table
pub fn print_cache_summary(rows: &[CacheRow]) {
    println!("\nCache Replay Summary");
    println!("====================");
    println!(
        "{:>7} {:>9} {:>7} {:>10} {:>8} {:>10} {:>10} {:>10} {:>12}",
        "Threads", "Capacity", "Shards", "Lookups", "HitRate", "Evictions", "Expired", "Time(ms)",
        "Ops/sec"
    );
    println!("{}", "-".repeat(91));
    for row in rows {
        println!(
            "{:>7} {:>9} {:>7} {:>10} {:>7.2}% {:>10} {:>10} {:>10} {:>12.0}",
            row.threads,
            row.capacity,
            row.shards,
            row.lookups,
            row.hit_rate * 100.0,
            row.evictions,
            row.expirations,
            row.duration_ms,
            row.ops_per_sec
        );
    }
}

/// Print the pool throughput table
pub fn print_pool_summary(rows: &[PoolRow]) {
    println!("\nPool Throughput Summary");
    println!("=======================");
    println!(
        "{:<9} {:>9} {:>9} {:>10} {:>7} {:>9} {:>5} {:>9} {:>12}",
        "Pool", "Submitted", "Rejected", "Completed", "Failed", "Panicked", "Peak", "Time(ms)",
        "Tasks/sec"
    );
    println!("{}", "-".repeat(87));
    for row in rows {
        println!(
            "{:<9} {:>9} {:>9} {:>10} {:>7} {:>9} {:>5} {:>9} {:>12.0}",
            row.pool,
            row.submitted,
            row.rejected,
            row.completed,
            row.failed,
            row.panicked,
            row.peak_workers,
            row.duration_ms,
            row.tasks_per_sec
        );
    }
}

/// Print the resilience run summary
pub fn print_resilience_summary(row: &ResilienceRow) {
    println!("\nResilience Summary");
    println!("==================");
    println!("Calls attempted:   {}", row.calls);
    println!("Allowed:           {}", row.allowed);
    println!("Throttled:         {}", row.throttled);
    println!("Rejected (open):   {}", row.open);
    println!("Failed:            {}", row.failed);
    println!("Succeeded:         {}", row.succeeded);
    println!("Final state:       {}", row.final_state);
    println!("Time:              {} ms", row.duration_ms);
}

/// Write `rows` to `path` as CSV with a header row
pub fn export_csv<T: Serialize>(rows: &[T], path: &Path) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    println!("\nResults exported to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_export_csv_writes_header_and_rows() {
        let path = std::env::temp_dir().join(format!("cmdhint_sim_{}.csv", std::process::id()));
        let rows = vec![
            ResilienceRow {
                calls: 10,
                allowed: 8,
                throttled: 2,
                final_state: "closed".to_string(),
                ..ResilienceRow::default()
            },
            ResilienceRow {
                calls: 5,
                final_state: "open".to_string(),
                ..ResilienceRow::default()
            },
        ];
        export_csv(&rows, &path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let _ = fs::remove_file(&path);
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("calls,allowed,throttled,open,failed,succeeded,final_state"));
        assert!(lines[1].starts_with("10,8,2,"));
        assert!(lines[2].ends_with(",open,0"));
    }
}
