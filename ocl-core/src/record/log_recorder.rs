use super::{Record, RecordValue, Recorder};
use log::info;

/// A recorder writing scalar and string values of records to the log.
///
/// Keys are printed in alphabetical order so that lines of consecutive
/// records line up.
#[derive(Default)]
pub struct LogRecorder {}

impl Recorder for LogRecorder {
    fn write(&mut self, record: Record) {
        let mut items = record
            .iter()
            .filter_map(|(k, v)| match v {
                RecordValue::Scalar(v) => Some(format!("{}: {:.4}", k, v)),
                RecordValue::String(s) => Some(format!("{}: {}", k, s)),
                _ => None,
            })
            .collect::<Vec<_>>();
        items.sort();

        if !items.is_empty() {
            info!("{}", items.join(", "));
        }
    }
}
