//! Position output stream: one JSON array of `[sample_tick, [record, …]]`
//! elements, closed with a terminating `]`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use argus_core::ArgusResult;
use argus_types::{Position, PositionRecord};

/// Incremental writer for the position JSON array.
///
/// Elements are serialized as they arrive, one per recorder tick, strictly
/// in tick order (the recorder serializes on a single thread). `finish`
/// closes the array; dropping an unfinished log closes it too.
pub struct PositionLog<W: Write> {
    out: W,
    elements: u64,
    finished: bool,
}

impl PositionLog<BufWriter<File>> {
    /// Create a log file and emit the array opener.
    pub fn create(path: &Path) -> ArgusResult<Self> {
        let file = File::create(path)?;
        Self::over(BufWriter::new(file))
    }
}

impl<W: Write> PositionLog<W> {
    /// Start a log over any writer (in-memory buffers in tests).
    pub fn over(mut out: W) -> ArgusResult<Self> {
        out.write_all(b"[")?;
        Ok(Self {
            out,
            elements: 0,
            finished: false,
        })
    }

    /// Append one tick: `[sample_tick, [pos_record, …]]`. `labeled` pairs
    /// each position with the source label it was read from.
    pub fn write_tick(&mut self, sample_tick: u64, labeled: &[(String, Position)]) -> ArgusResult<()> {
        if self.finished {
            return Err(argus_core::ArgusError::not_bound(
                "position log already finished",
            ));
        }
        let records: Vec<PositionRecord> = labeled
            .iter()
            .map(|(label, position)| position.to_record(label))
            .collect();
        if self.elements > 0 {
            self.out.write_all(b",")?;
        }
        serde_json::to_writer(&mut self.out, &(sample_tick, records))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        self.elements += 1;
        Ok(())
    }

    /// Number of elements written so far.
    pub fn elements(&self) -> u64 {
        self.elements
    }

    /// Close the array and flush.
    pub fn finish(&mut self) -> ArgusResult<()> {
        if !self.finished {
            self.out.write_all(b"]")?;
            self.out.flush()?;
            self.finished = true;
        }
        Ok(())
    }
}

impl<W: Write> Drop for PositionLog<W> {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::error!("failed to close position log: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_log_is_an_empty_array() {
        let mut buf = Vec::new();
        {
            let mut log = PositionLog::over(&mut buf).unwrap();
            log.finish().unwrap();
        }
        assert_eq!(buf, b"[]");
    }

    #[test]
    fn ticks_serialize_in_order_with_labels() {
        let mut buf = Vec::new();
        {
            let mut log = PositionLog::over(&mut buf).unwrap();
            for tick in 0..3u64 {
                let mut p = Position::at(tick, tick as f64, 2.0 * tick as f64);
                p.set_region("centre");
                log.write_tick(tick, &[("animal".to_string(), p)]).unwrap();
            }
            assert_eq!(log.elements(), 3);
        }

        let parsed: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        let ticks = parsed.as_array().unwrap();
        assert_eq!(ticks.len(), 3);
        for (i, element) in ticks.iter().enumerate() {
            assert_eq!(element[0], i as u64);
            let records = element[1].as_array().unwrap();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0]["label"], "animal");
            assert_eq!(records[0]["region"], "centre");
            assert_eq!(records[0]["x"], i as f64);
        }
    }

    #[test]
    fn drop_closes_the_array() {
        let mut buf = Vec::new();
        {
            let mut log = PositionLog::over(&mut buf).unwrap();
            log.write_tick(0, &[("a".to_string(), Position::invalid(0))])
                .unwrap();
            // no finish(): Drop must close
        }
        let parsed: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 1);
    }
}
