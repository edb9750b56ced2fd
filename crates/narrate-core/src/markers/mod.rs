//! Segment markers: document segments laid over one PCM stream
//!
//! A narration stream is the concatenation of the audio of several document
//! segments (tree nodes). `SegmentMarkerIndex` records their byte lengths in
//! order and answers offset/segment queries. An index is immutable once
//! built; a changed document produces a new index which is swapped in through
//! [`PublishedMarkers`].

mod published;

pub use published::PublishedMarkers;

use thiserror::Error;

/// Opaque handle of a document segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(pub u64);

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One segment's share of the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentMarker {
    pub id: SegmentId,
    /// Text drawn over the segment when labels are enabled
    pub label: String,
    pub local_byte_length: u64,
}

impl SegmentMarker {
    pub fn new(id: SegmentId, label: impl Into<String>, local_byte_length: u64) -> Self {
        Self {
            id,
            label: label.into(),
            local_byte_length,
        }
    }
}

/// Errors from building or querying a marker index
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkerError {
    /// An index must contain at least one marker
    #[error("Segment marker index is empty")]
    Empty,

    /// No marker covers the offset (only reachable on an empty index)
    #[error("No segment found at byte offset {offset}")]
    NotFound { offset: u64 },

    /// The segment is not part of this stream
    #[error("Segment {0} is not shown in this waveform")]
    UnknownSegment(SegmentId),

    /// Marker lengths do not add up to the stream length
    #[error("Segment lengths sum to {actual} bytes but the stream has {expected}")]
    LengthMismatch { expected: u64, actual: u64 },
}

/// Result type for marker operations
pub type MarkerResult<T> = Result<T, MarkerError>;

/// Segment matched by a byte offset lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentMatch {
    pub id: SegmentId,
    pub index: usize,
    /// First byte of the segment
    pub left: u64,
    /// One past the last byte of the segment
    pub right: u64,
}

impl SegmentMatch {
    pub fn len(&self) -> u64 {
        self.right - self.left
    }

    pub fn is_empty(&self) -> bool {
        self.right == self.left
    }
}

/// Outcome of a step-back / step-forward navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepResult {
    /// Byte offset to move the playhead to
    pub target: u64,
    /// True when there was no further segment in that direction
    pub at_edge: bool,
}

/// Ordered, immutable list of segment markers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentMarkerIndex {
    markers: Vec<SegmentMarker>,
    /// Cumulative right boundary of each marker
    boundaries: Vec<u64>,
}

impl SegmentMarkerIndex {
    /// Build an index from markers in stream order
    pub fn new(markers: Vec<SegmentMarker>) -> MarkerResult<Self> {
        if markers.is_empty() {
            return Err(MarkerError::Empty);
        }
        let mut total = 0u64;
        let boundaries = markers
            .iter()
            .map(|marker| {
                total += marker.local_byte_length;
                total
            })
            .collect();
        Ok(Self {
            markers,
            boundaries,
        })
    }

    /// Index for an unsegmented stream: one marker covering everything
    pub fn single(id: SegmentId, label: impl Into<String>, data_length: u64) -> Self {
        Self {
            markers: vec![SegmentMarker::new(id, label, data_length)],
            boundaries: vec![data_length],
        }
    }

    /// Build an index and check it against the stream it describes
    pub fn for_stream(markers: Vec<SegmentMarker>, data_length: u64) -> MarkerResult<Self> {
        let index = Self::new(markers)?;
        index.validate_length(data_length)?;
        Ok(index)
    }

    pub fn validate_length(&self, data_length: u64) -> MarkerResult<()> {
        let actual = self.total_length();
        if actual != data_length {
            return Err(MarkerError::LengthMismatch {
                expected: data_length,
                actual,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Always false for an index built through the constructors
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn markers(&self) -> &[SegmentMarker] {
        &self.markers
    }

    /// Cumulative right boundaries in stream order
    pub fn boundaries(&self) -> &[u64] {
        &self.boundaries
    }

    pub fn total_length(&self) -> u64 {
        self.boundaries.last().copied().unwrap_or(0)
    }

    fn left_of(&self, index: usize) -> u64 {
        if index == 0 {
            0
        } else {
            self.boundaries[index - 1]
        }
    }

    fn match_at(&self, index: usize) -> SegmentMatch {
        SegmentMatch {
            id: self.markers[index].id,
            index,
            left: self.left_of(index),
            right: self.boundaries[index],
        }
    }

    /// Segment containing `byte_offset`
    ///
    /// A marker matches when the offset lies strictly before its right
    /// boundary, so an offset on a boundary belongs to the segment that starts
    /// there. The last marker absorbs every offset at or past the end.
    pub fn find_segment(&self, byte_offset: u64) -> MarkerResult<SegmentMatch> {
        if self.markers.is_empty() {
            return Err(MarkerError::NotFound {
                offset: byte_offset,
            });
        }
        let index = self
            .boundaries
            .partition_point(|&right| right <= byte_offset)
            .min(self.markers.len() - 1);
        Ok(self.match_at(index))
    }

    /// Position of a segment within the index
    pub fn position_of(&self, id: SegmentId) -> MarkerResult<usize> {
        self.markers
            .iter()
            .position(|marker| marker.id == id)
            .ok_or(MarkerError::UnknownSegment(id))
    }

    /// Byte range `[left, right)` of a segment
    pub fn range_of(&self, id: SegmentId) -> MarkerResult<SegmentMatch> {
        self.position_of(id).map(|index| self.match_at(index))
    }

    /// Whether the segment is shown in this waveform
    pub fn contains(&self, id: SegmentId) -> bool {
        self.markers.iter().any(|marker| marker.id == id)
    }

    /// Move to the start of the previous segment
    ///
    /// On the first segment the target is its own start and `at_edge` is set.
    pub fn step_back(&self, byte_offset: u64) -> MarkerResult<StepResult> {
        let current = self.find_segment(byte_offset)?;
        if current.index == 0 {
            return Ok(StepResult {
                target: current.left,
                at_edge: true,
            });
        }
        Ok(StepResult {
            target: self.left_of(current.index - 1),
            at_edge: false,
        })
    }

    /// Move to the start of the next segment
    ///
    /// On the last segment the offset is kept and `at_edge` is set.
    pub fn step_forward(&self, byte_offset: u64) -> MarkerResult<StepResult> {
        let current = self.find_segment(byte_offset)?;
        if current.index + 1 >= self.markers.len() {
            return Ok(StepResult {
                target: byte_offset,
                at_edge: true,
            });
        }
        Ok(StepResult {
            target: current.right,
            at_edge: false,
        })
    }
}
