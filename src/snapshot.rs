//! Lock free hand-off of intermediate tracker signals to a lower priority thread.
//!
//! The tracker runs in the sensor callback and must never block. Every
//! `publish_interval` frames it copies its internal state into a
//! [TrackerSnapshot] and pushes it into a single producer, single consumer ring
//! buffer. When the ring is full the snapshot is dropped. A viewer thread calls
//! [SnapshotReader::latest] at its own pace.
//!
//! # Examples
//!
//! ```
//! use microtouch::snapshot::snapshot_channel;
//! use microtouch::{TouchTracker, TrackerConfig, OUTPUT_COLUMNS};
//!
//! let config = TrackerConfig::default();
//! let mut tracker = TouchTracker::new(config).unwrap();
//! let mut state = tracker.new_state();
//! let mut output = vec![0.0; config.max_touches * OUTPUT_COLUMNS];
//! tracker.bind_output(output.len()).unwrap();
//!
//! let (publisher, mut reader) = snapshot_channel(4, 1);
//! tracker.set_publisher(Some(publisher));
//!
//! let frame = vec![0.0; config.width * config.height];
//! tracker.process(&mut state, &frame, &mut output);
//! assert_eq!(reader.latest().unwrap().frame, 0);
//! ```

use rtrb::{Consumer, Producer, RingBuffer};

use crate::config::{MAX_PEAKS, MAX_SENSOR_COLUMNS, MAX_SENSOR_ROWS, MAX_TOUCHES};
use crate::detect::{KeyState, PeakList, PingList, MAX_KEY_STATES};
use crate::track::Touch;

/// A copy of the tracker's intermediate signals for one frame.
#[derive(Clone, Copy, Debug)]
pub struct TrackerSnapshot {
    /// Index of the frame this snapshot was taken after.
    pub frame: u64,
    /// Filtered touches, one per slot.
    pub touches: [Touch; MAX_TOUCHES],
    /// Unfiltered slot touches after matching.
    pub raw_touches: [Touch; MAX_TOUCHES],
    /// Number of valid entries in `touches` and `raw_touches`.
    pub touch_count: usize,
    /// Peaks found in the smoothed field, in sensor coordinates.
    pub peaks: PeakList,
    /// Bit `x` of row `y` is set if the smoothed field at (`x`, `y`) is above
    /// the on threshold.
    pub threshold_bitmap: [u64; MAX_SENSOR_ROWS],
    /// Span detector row pings. Empty for other detectors.
    pub row_pings: PingList,
    /// Span detector column pings. Empty for other detectors.
    pub column_pings: PingList,
    /// Span detector key states. Only the first `key_state_count` are valid.
    pub key_states: [KeyState; MAX_KEY_STATES],
    pub key_state_count: usize,
    /// Candidates dropped for lack of a free slot since the tracker state was created.
    pub dropped: u32,
}

impl TrackerSnapshot {
    pub fn new() -> Self {
        TrackerSnapshot {
            frame: 0,
            touches: [Touch::default(); MAX_TOUCHES],
            raw_touches: [Touch::default(); MAX_TOUCHES],
            touch_count: 0,
            peaks: PeakList::new(MAX_PEAKS),
            threshold_bitmap: [0; MAX_SENSOR_ROWS],
            row_pings: PingList::new(),
            column_pings: PingList::new(),
            key_states: [KeyState::default(); MAX_KEY_STATES],
            key_state_count: 0,
            dropped: 0,
        }
    }

    pub fn touches(&self) -> &[Touch] {
        &self.touches[..self.touch_count]
    }

    pub fn key_states(&self) -> &[KeyState] {
        &self.key_states[..self.key_state_count]
    }

    /// True if bit (`x`, `y`) of the threshold bitmap is set.
    pub fn is_above_threshold(&self, x: usize, y: usize) -> bool {
        y < MAX_SENSOR_ROWS && x < MAX_SENSOR_COLUMNS && self.threshold_bitmap[y] & (1u64 << x) != 0
    }
}

impl Default for TrackerSnapshot {
    fn default() -> Self {
        TrackerSnapshot::new()
    }
}

/// Creates a snapshot channel holding up to `capacity` snapshots. The publisher
/// offers a snapshot every `publish_interval` frames.
pub fn snapshot_channel(capacity: usize, publish_interval: u32) -> (SnapshotPublisher, SnapshotReader) {
    if publish_interval == 0 {
        panic!("Publish interval must be at least 1")
    }
    let (producer, consumer) = RingBuffer::new(capacity);
    (
        SnapshotPublisher {
            producer,
            publish_interval,
            countdown: 0,
            dropped: 0,
        },
        SnapshotReader {
            consumer,
            latest: None,
        },
    )
}

/// The tracker side of a snapshot channel.
pub struct SnapshotPublisher {
    producer: Producer<TrackerSnapshot>,
    publish_interval: u32,
    countdown: u32,
    dropped: u64,
}

impl SnapshotPublisher {
    /// Counts a frame. Returns true if a snapshot should be published for it.
    pub fn tick(&mut self) -> bool {
        if self.countdown == 0 {
            self.countdown = self.publish_interval - 1;
            true
        } else {
            self.countdown -= 1;
            false
        }
    }

    /// Pushes a snapshot without blocking. Returns false if the ring was full
    /// and the snapshot was dropped.
    pub fn publish(&mut self, snapshot: TrackerSnapshot) -> bool {
        match self.producer.push(snapshot) {
            Ok(()) => true,
            Err(_) => {
                self.dropped += 1;
                false
            }
        }
    }

    /// Snapshots dropped because the reader fell behind.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// The viewer side of a snapshot channel.
pub struct SnapshotReader {
    consumer: Consumer<TrackerSnapshot>,
    latest: Option<TrackerSnapshot>,
}

impl SnapshotReader {
    /// Drains all pending snapshots and returns the most recent one received so far.
    pub fn latest(&mut self) -> Option<&TrackerSnapshot> {
        while let Ok(snapshot) = self.consumer.pop() {
            self.latest = Some(snapshot);
        }
        self.latest.as_ref()
    }

    /// Pops the oldest pending snapshot.
    pub fn pop(&mut self) -> Option<TrackerSnapshot> {
        let snapshot = self.consumer.pop().ok()?;
        self.latest = Some(snapshot);
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(frame: u64) -> TrackerSnapshot {
        let mut snapshot = TrackerSnapshot::new();
        snapshot.frame = frame;
        snapshot
    }

    #[test]
    fn test_interval() {
        let (mut publisher, _reader) = snapshot_channel(2, 3);
        let ticks: [bool; 7] = core::array::from_fn(|_| publisher.tick());
        assert_eq!(ticks, [true, false, false, true, false, false, true]);
    }

    #[test]
    fn test_drops_when_full() {
        let (mut publisher, mut reader) = snapshot_channel(2, 1);
        assert!(publisher.publish(snapshot(0)));
        assert!(publisher.publish(snapshot(1)));
        assert!(!publisher.publish(snapshot(2)));
        assert_eq!(publisher.dropped(), 1);

        assert_eq!(reader.pop().map(|s| s.frame), Some(0));
        assert_eq!(reader.latest().map(|s| s.frame), Some(1));
        // The latest snapshot is kept once the ring is empty
        assert_eq!(reader.latest().map(|s| s.frame), Some(1));
        assert!(reader.pop().is_none());
    }

    #[test]
    fn test_bitmap() {
        let mut snapshot = TrackerSnapshot::new();
        snapshot.threshold_bitmap[2] = 1 << 5;
        assert!(snapshot.is_above_threshold(5, 2));
        assert!(!snapshot.is_above_threshold(5, 3));
        assert!(!snapshot.is_above_threshold(64, 2));
    }
}
