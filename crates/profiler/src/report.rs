//! Turns one aggregated [`Snapshot`] into table and CSV rows.
//!
//! Column order is buffer manager, worker, CPU ratios, run labels (CSV
//! only), workload, RDMA. Slots hidden at the active level are skipped in
//! every output; their values were still swept.

use counters::{BmCounter, Level, RdmaCounter, Snapshot, WorkerCounter, GIB};

use crate::config::RunLabels;
use crate::csv::CsvRecord;
use crate::format::{human_readable, precision};
use crate::workload::WorkloadInfo;

const CONSUMED_PAGES_VOLUME: &str = "pages (GB)";

/// Hardware readings divided by the tick's transaction count, with their
/// table and CSV names and whether the table scales them.
const PER_TX: [(&str, &str, &str, bool); 4] = [
    ("instructions", "inst/tx", "instructions/tx", true),
    ("L1-misses", "L1-M/tx", "L1-misses/tx", false),
    ("cycles", "cycl/tx", "cycles/tx", true),
    ("LLC-misses", "LLC-M/tx", "LLC-misses/tx", false),
];

const CPUS: &str = "CPU";
const CPUS_CSV: &str = "CPUs";

/// Header and values of one console table block.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub header: Vec<String>,
    pub row: Vec<String>,
}

impl TableRow {
    fn push(&mut self, name: impl Into<String>, value: String) {
        self.header.push(name.into());
        self.row.push(value);
    }
}

/// Latency per transaction, `None` for a tick without transactions
fn latency_per_tx(snapshot: &Snapshot) -> Option<f64> {
    let tx = snapshot.worker[WorkerCounter::TxP];
    (tx > 0).then(|| snapshot.worker[WorkerCounter::Latency] as f64 / tx as f64)
}

fn per_tx(snapshot: &Snapshot, reading: &str) -> Option<f64> {
    let tx = snapshot.worker[WorkerCounter::TxP];
    (tx > 0).then(|| snapshot.cpu.get(reading) / tx as f64)
}

fn pages_to_gb(pages: u64, page_size: u64) -> f64 {
    pages as f64 * page_size as f64 / GIB
}

pub fn table_row(
    snapshot: &Snapshot,
    level: Level,
    page_size: u64,
    workload: &mut dyn WorkloadInfo,
) -> TableRow {
    let mut table = TableRow::default();

    for (counter, value) in snapshot.buffer_manager.iter() {
        if !counter.level().is_visible_at(level) {
            continue;
        }
        if counter == BmCounter::ConsumedPages {
            table.push(CONSUMED_PAGES_VOLUME, precision(pages_to_gb(value, page_size)));
        } else {
            table.push(counter.name(), value.to_string());
        }
    }

    for (counter, value) in snapshot.worker.iter() {
        if !counter.level().is_visible_at(level) {
            continue;
        }
        match counter {
            WorkerCounter::TxP => table.push(counter.name(), human_readable(value as f64)),
            WorkerCounter::Latency => {
                if let Some(latency) = latency_per_tx(snapshot) {
                    table.push(counter.name(), precision(latency));
                }
            }
            _ => table.push(counter.name(), value.to_string()),
        }
    }

    for (reading, name, _, scaled) in PER_TX {
        if let Some(ratio) = per_tx(snapshot, reading) {
            let value = if scaled {
                human_readable(ratio)
            } else {
                precision(ratio)
            };
            table.push(name, value);
        }
    }
    table.push(CPUS, precision(snapshot.cpu.get(CPUS)));

    table.header.extend(workload.header());
    table.row.extend(workload.row());

    for (counter, value) in snapshot.rdma.iter() {
        if counter.level().is_visible_at(level) {
            table.push(counter.name(), precision(value));
        }
    }

    table
}

pub fn csv_header(level: Level, labels: &RunLabels, workload: &dyn WorkloadInfo) -> CsvRecord {
    let mut record = CsvRecord::new();

    for counter in BmCounter::ALL {
        if counter.level().is_visible_at(level) {
            record.push(counter.name());
        }
    }
    for counter in WorkerCounter::ALL {
        if counter.level().is_visible_at(level) {
            record.push(counter.name());
        }
    }
    for (_, _, name, _) in PER_TX {
        record.push(name);
    }
    record.push(CPUS_CSV);
    for (name, _) in labels.iter() {
        record.push(name);
    }
    workload.csv_header(&mut record);
    for counter in RdmaCounter::ALL {
        if counter.level().is_visible_at(level) {
            record.push(counter.name());
        }
    }

    record
}

/// Values in the order of [`csv_header`]. Ratios over a tick without
/// transactions are left empty.
pub fn csv_row(
    snapshot: &Snapshot,
    level: Level,
    labels: &RunLabels,
    workload: &mut dyn WorkloadInfo,
) -> CsvRecord {
    let mut record = CsvRecord::new();

    for (counter, value) in snapshot.buffer_manager.iter() {
        if counter.level().is_visible_at(level) {
            record.push(value);
        }
    }
    for (counter, value) in snapshot.worker.iter() {
        if !counter.level().is_visible_at(level) {
            continue;
        }
        if counter == WorkerCounter::Latency {
            match latency_per_tx(snapshot) {
                Some(latency) => record.push(latency),
                None => record.push_empty(),
            }
        } else {
            record.push(value);
        }
    }
    for (reading, _, _, _) in PER_TX {
        match per_tx(snapshot, reading) {
            Some(ratio) => record.push(ratio),
            None => record.push_empty(),
        }
    }
    record.push(snapshot.cpu.get(CPUS));
    for (_, value) in labels.iter() {
        record.push(value);
    }
    workload.csv_row(&mut record);
    for (counter, value) in snapshot.rdma.iter() {
        if counter.level().is_visible_at(level) {
            record.push(value);
        }
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::NoWorkload;
    use rstest::rstest;

    fn busy_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.worker[WorkerCounter::TxP] = 20_000;
        snapshot.worker[WorkerCounter::Latency] = 50_000;
        snapshot.worker[WorkerCounter::BtreeTraversals] = 9;
        snapshot.buffer_manager[BmCounter::FreePages] = 100;
        snapshot.buffer_manager[BmCounter::DramPoolSize] = 400;
        snapshot.buffer_manager[BmCounter::PercUtilized] = 75;
        snapshot.buffer_manager[BmCounter::ConsumedPages] = 262_144;
        snapshot.cpu.add("instructions", 400_000_000.0);
        snapshot.cpu.add("L1-misses", 30_000.0);
        snapshot.cpu.add("cycles", 600_000_000.0);
        snapshot.cpu.add("LLC-misses", 1_000.0);
        snapshot.cpu.add("CPU", 3.5);
        snapshot.rdma[RdmaCounter::SentGb] = 1.25;
        snapshot
    }

    fn cell<'a>(table: &'a TableRow, name: &str) -> Option<&'a str> {
        table
            .header
            .iter()
            .position(|h| h == name)
            .map(|i| table.row[i].as_str())
    }

    #[test]
    fn test_table_values() {
        let table = table_row(&busy_snapshot(), Level::Release, 4096, &mut NoWorkload);

        assert_eq!(table.header.len(), table.row.len());
        assert_eq!(cell(&table, "tx/sec"), Some("20.00K"));
        assert_eq!(cell(&table, "latency"), Some("2.50"));
        assert_eq!(cell(&table, "perc. pages used"), Some("75"));
        // 262144 pages of 4 KiB
        assert_eq!(cell(&table, "pages (GB)"), Some("1.00"));
        assert_eq!(cell(&table, "inst/tx"), Some("20.00K"));
        assert_eq!(cell(&table, "L1-M/tx"), Some("1.50"));
        assert_eq!(cell(&table, "cycl/tx"), Some("30.00K"));
        assert_eq!(cell(&table, "LLC-M/tx"), Some("0.05"));
        assert_eq!(cell(&table, "CPU"), Some("3.50"));
        assert_eq!(cell(&table, "sent (GB)"), Some("1.25"));
    }

    #[test]
    fn test_table_column_order() {
        let table = table_row(&busy_snapshot(), Level::Release, 4096, &mut NoWorkload);
        let position = |name: &str| table.header.iter().position(|h| h == name).unwrap();

        assert!(position("global epoch") < position("tx/sec"));
        assert!(position("tx/sec") < position("inst/tx"));
        assert!(position("CPU") < position("sent (GB)"));
    }

    #[rstest]
    #[case(Level::Release, false)]
    #[case(Level::Csv, true)]
    #[case(Level::Trace, true)]
    fn test_visibility_filter(#[case] level: Level, #[case] csv_slots_shown: bool) {
        let snapshot = busy_snapshot();
        let labels = RunLabels::new();
        let table = table_row(&snapshot, level, 4096, &mut NoWorkload);
        let header = csv_header(level, &labels, &NoWorkload);
        let row = csv_row(&snapshot, level, &labels, &mut NoWorkload);

        for name in ["free pages", "btree (t)", "pp_rounds"] {
            assert_eq!(table.header.iter().any(|h| h == name), csv_slots_shown);
            assert_eq!(header.fields().iter().any(|h| h == name), csv_slots_shown);
        }
        assert!(table.header.iter().any(|h| h == "tx/sec"));
        assert_eq!(header.len(), row.len());
    }

    #[test]
    fn test_zero_transactions_omit_ratios() {
        let mut snapshot = busy_snapshot();
        snapshot.worker[WorkerCounter::TxP] = 0;
        let labels = RunLabels::new();

        let table = table_row(&snapshot, Level::Release, 4096, &mut NoWorkload);
        for name in ["latency", "inst/tx", "L1-M/tx", "cycl/tx", "LLC-M/tx"] {
            assert_eq!(cell(&table, name), None, "{} should be omitted", name);
        }
        assert_eq!(cell(&table, "tx/sec"), Some("0.00"));
        assert_eq!(cell(&table, "CPU"), Some("3.50"));

        let header = csv_header(Level::Release, &labels, &NoWorkload);
        let row = csv_row(&snapshot, Level::Release, &labels, &mut NoWorkload);
        assert_eq!(header.len(), row.len());
        for name in ["latency", "instructions/tx", "cycles/tx"] {
            let i = header.fields().iter().position(|h| h == name).unwrap();
            assert_eq!(row.fields()[i], "");
        }
    }

    #[test]
    fn test_csv_carries_labels_and_raw_values() {
        let snapshot = busy_snapshot();
        let labels = RunLabels::new().with("Workers", 4).with("Tag", "run-a");

        let header = csv_header(Level::Csv, &labels, &NoWorkload);
        let row = csv_row(&snapshot, Level::Csv, &labels, &mut NoWorkload);
        let value = |name: &str| {
            let i = header.fields().iter().position(|h| h == name).unwrap();
            row.fields()[i].clone()
        };

        assert_eq!(header.fields()[0], "free pages");
        assert_eq!(value("consumed pages"), "262144");
        assert_eq!(value("tx/sec"), "20000");
        assert_eq!(value("latency"), "2.5");
        assert_eq!(value("CPUs"), "3.5");
        assert_eq!(value("Workers"), "4");
        assert_eq!(value("Tag"), "run-a");
        assert_eq!(header.fields().last().map(String::as_str), Some("received (GB)"));
    }
}
