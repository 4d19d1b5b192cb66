use crate::protocol::wire::QueryStats;

/// The result of executing a statement without reading its rows.
///
/// The counters are the final progress the server reported for the
/// statement. For an `INSERT` the number of rows written is the number of
/// rows inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExecuteResult {
    write_rows: u64,
    write_bytes: u64,
    result_rows: u64,
    running_time_ms: f64,
}

impl ExecuteResult {
    pub(crate) fn new(stats: &QueryStats) -> Self {
        Self {
            write_rows: stats.write_progress.rows,
            write_bytes: stats.write_progress.bytes,
            result_rows: stats.result_progress.rows,
            running_time_ms: stats.running_time_ms,
        }
    }

    /// Rows written by the statement.
    pub fn rows_affected(&self) -> u64 {
        self.write_rows
    }

    /// Bytes written by the statement.
    pub fn bytes_written(&self) -> u64 {
        self.write_bytes
    }

    /// Rows the statement returned, which were discarded.
    pub fn rows_returned(&self) -> u64 {
        self.result_rows
    }

    /// Server-side execution time in milliseconds.
    pub fn running_time_ms(&self) -> f64 {
        self.running_time_ms
    }
}

/// The outcome of a bulk load, as accounted by the server.
///
/// `write_bytes` is the size the server measured for the upload, which
/// includes field delimiters, quoting and line endings and so differs from
/// the summed length of the input fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadProgress {
    /// Rows written, one per input row.
    pub write_rows: u64,
    /// Bytes written.
    pub write_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::wire::Progress;

    #[test]
    fn execute_result_from_stats() {
        let stats = QueryStats {
            running_time_ms: 12.5,
            write_progress: Progress { rows: 3, bytes: 96 },
            ..Default::default()
        };

        let result = ExecuteResult::new(&stats);
        assert_eq!(3, result.rows_affected());
        assert_eq!(96, result.bytes_written());
        assert_eq!(0, result.rows_returned());
    }
}
