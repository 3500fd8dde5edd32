use crate::csv::CsvRecord;

/// Extra columns supplied by whatever workload is being profiled.
///
/// The loop asks for the table header and row every tick; CSV fragments are
/// requested once for the header and then once per written row. Fragments
/// must have matching lengths.
pub trait WorkloadInfo: Send {
    fn header(&self) -> Vec<String>;

    fn row(&mut self) -> Vec<String>;

    fn csv_header(&self, record: &mut CsvRecord);

    fn csv_row(&mut self, record: &mut CsvRecord);
}

/// Contributes no columns
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWorkload;

impl WorkloadInfo for NoWorkload {
    fn header(&self) -> Vec<String> {
        Vec::new()
    }

    fn row(&mut self) -> Vec<String> {
        Vec::new()
    }

    fn csv_header(&self, _record: &mut CsvRecord) {}

    fn csv_row(&mut self, _record: &mut CsvRecord) {}
}
