//! Fetch progress reporting
//!
//! Backends report integer percent, never decreasing within one fetch and
//! never repeating a value, so a slow observer is not flooded.

use std::io::{self, Read, Write};

/// Size of the buffer used for streaming copies
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// One progress notification for a single fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchProgress {
    /// Total size is unknown
    Indeterminate,
    /// Percent complete, 0..=100
    Percent(u8),
}

/// Receiver of fetch progress
pub trait ProgressSink {
    fn on_progress(&mut self, progress: FetchProgress);
}

impl<F: FnMut(FetchProgress)> ProgressSink for F {
    fn on_progress(&mut self, progress: FetchProgress) {
        self(progress);
    }
}

/// Sink that drops every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&mut self, _progress: FetchProgress) {}
}

/// Turns cumulative byte counts into deduplicated percent notifications
#[derive(Debug)]
pub struct PercentTracker {
    total: Option<u64>,
    done: u64,
    last: Option<u8>,
}

impl PercentTracker {
    /// `total` of `None` or zero means the size is unknown
    pub fn new(total: Option<u64>) -> Self {
        Self {
            total: total.filter(|t| *t > 0),
            done: 0,
            last: None,
        }
    }

    /// Whether percentages can be computed
    pub fn is_determinate(&self) -> bool {
        self.total.is_some()
    }

    /// First notification of a fetch
    pub fn start(&mut self) -> FetchProgress {
        match self.total {
            Some(_) => {
                self.last = Some(0);
                FetchProgress::Percent(0)
            }
            None => FetchProgress::Indeterminate,
        }
    }

    /// Record `bytes` more transferred; returns a notification only when the percent advanced
    pub fn advance(&mut self, bytes: u64) -> Option<FetchProgress> {
        self.done = self.done.saturating_add(bytes);
        let total = self.total?;
        // Never report 100 before the fetch is finished
        let percent = (self.done.saturating_mul(100) / total).min(99);
        let percent = u8::try_from(percent).unwrap_or(99);
        self.bump(percent)
    }

    /// Final notification; `None` if 100 was already reported
    pub fn finish(&mut self) -> Option<FetchProgress> {
        self.bump(100)
    }

    /// Bytes recorded so far
    pub fn transferred(&self) -> u64 {
        self.done
    }

    fn bump(&mut self, percent: u8) -> Option<FetchProgress> {
        if self.last.is_some_and(|last| percent <= last) {
            return None;
        }
        self.last = Some(percent);
        Some(FetchProgress::Percent(percent))
    }
}

/// Stream `reader` into `writer`, reporting progress against `total` bytes
///
/// Reports 100 once the reader is exhausted, even if the size was unknown.
pub fn copy_with_progress<R, W>(
    reader: &mut R,
    writer: &mut W,
    total: Option<u64>,
    sink: &mut dyn ProgressSink,
) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut tracker = PercentTracker::new(total);
    sink.on_progress(tracker.start());

    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..n])?;
        if let Some(progress) = tracker.advance(n as u64) {
            sink.on_progress(progress);
        }
    }
    writer.flush()?;

    if let Some(progress) = tracker.finish() {
        sink.on_progress(progress);
    }
    Ok(tracker.transferred())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn percents(events: &[FetchProgress]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                FetchProgress::Percent(p) => Some(*p),
                FetchProgress::Indeterminate => None,
            })
            .collect()
    }

    #[test]
    fn test_tracker_suppresses_repeats() {
        let mut tracker = PercentTracker::new(Some(1000));
        assert_eq!(tracker.start(), FetchProgress::Percent(0));
        assert_eq!(tracker.advance(5), None);
        assert_eq!(tracker.advance(5), Some(FetchProgress::Percent(1)));
        assert_eq!(tracker.advance(1), None);
        assert_eq!(tracker.advance(989), Some(FetchProgress::Percent(99)));
        assert_eq!(tracker.finish(), Some(FetchProgress::Percent(100)));
        assert_eq!(tracker.finish(), None);
    }

    #[test]
    fn test_tracker_unknown_size() {
        let mut tracker = PercentTracker::new(Some(0));
        assert!(!tracker.is_determinate());
        assert_eq!(tracker.start(), FetchProgress::Indeterminate);
        assert_eq!(tracker.advance(4096), None);
        assert_eq!(tracker.finish(), Some(FetchProgress::Percent(100)));
    }

    #[test]
    fn test_tracker_overrun_does_not_exceed_99() {
        let mut tracker = PercentTracker::new(Some(10));
        tracker.start();
        assert_eq!(tracker.advance(50), Some(FetchProgress::Percent(99)));
        assert_eq!(tracker.advance(50), None);
    }

    #[test]
    fn test_copy_reports_monotonic_percent_ending_at_100() {
        let data = vec![7u8; 300 * 1024];
        let mut out = Vec::new();
        let mut events = Vec::new();
        let copied = copy_with_progress(
            &mut data.as_slice(),
            &mut out,
            Some(data.len() as u64),
            &mut |p| events.push(p),
        )
        .unwrap();

        assert_eq!(copied, data.len() as u64);
        assert_eq!(out, data);
        let seen = percents(&events);
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_copy_unknown_length_is_indeterminate_then_done() {
        let data = b"hello".to_vec();
        let mut out = Vec::new();
        let mut events = Vec::new();
        copy_with_progress(&mut data.as_slice(), &mut out, None, &mut |p| events.push(p)).unwrap();
        assert_eq!(
            events,
            vec![FetchProgress::Indeterminate, FetchProgress::Percent(100)]
        );
    }
}
