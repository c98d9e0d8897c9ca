use std::collections::VecDeque;

use crate::canvas::PixelBuffer;
use crate::error::{EditorError, Result};
use crate::ops::filters::FilterState;

/// Default number of snapshots kept.
pub const DEFAULT_MAX_HISTORY: usize = 20;

// ============================================================================
// HISTORY SNAPSHOT — one committed editor state
// ============================================================================

/// An immutable, PNG-encoded copy of the base image plus the filter state
/// that was live when it was committed. Restoring it and rendering gives
/// back exactly what was on screen.
#[derive(Clone, Debug)]
pub struct HistorySnapshot {
    description: String,
    width: u32,
    height: u32,
    encoded: Vec<u8>,
    state: FilterState,
}

impl HistorySnapshot {
    pub fn capture(description: impl Into<String>, base: &PixelBuffer, state: &FilterState) -> Result<Self> {
        let (width, height) = base.dimensions();
        let encoded = if base.is_empty() { Vec::new() } else { encode_rgba(base)? };
        Ok(Self {
            description: description.into(),
            width,
            height,
            encoded,
            state: *state,
        })
    }

    /// Decode back into an owned buffer and the saved filter state.
    pub fn restore(&self) -> Result<(PixelBuffer, FilterState)> {
        let base = if self.encoded.is_empty() {
            PixelBuffer::new(self.width, self.height)
        } else {
            decode_rgba(&self.encoded)?
        };
        if base.dimensions() != (self.width, self.height) {
            return Err(EditorError::Snapshot(format!(
                "decoded {}x{}, expected {}x{}",
                base.width(),
                base.height(),
                self.width,
                self.height
            )));
        }
        Ok((base, self.state))
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn memory_size(&self) -> usize {
        self.encoded.len() + self.description.len()
    }
}

fn encode_rgba(buf: &PixelBuffer) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut encoder = png::Encoder::new(&mut out, buf.width(), buf.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Fast);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(buf.as_raw())?;
    writer.finish()?;
    Ok(out)
}

fn decode_rgba(bytes: &[u8]) -> Result<PixelBuffer> {
    let decoder = png::Decoder::new(bytes);
    let mut reader = decoder.read_info()?;
    let mut data = vec![0u8; reader.output_buffer_size()];
    let info = reader.next_frame(&mut data)?;
    if info.color_type != png::ColorType::Rgba || info.bit_depth != png::BitDepth::Eight {
        return Err(EditorError::Snapshot(format!(
            "unexpected snapshot format {:?}/{:?}",
            info.color_type, info.bit_depth
        )));
    }
    data.truncate(info.buffer_size());
    PixelBuffer::from_raw(info.width, info.height, data)
}

// ============================================================================
// HISTORY STACK — bounded, branch-discarding undo/redo
// ============================================================================

/// Linear history with a cursor at the current snapshot.
///
/// Pushing while the cursor is behind the newest entry drops the redo
/// branch. Once `max_history_size` is exceeded the oldest snapshot is
/// evicted and the cursor shifts with it.
#[derive(Debug)]
pub struct HistoryStack {
    entries: VecDeque<HistorySnapshot>,
    cursor: usize,
    max_history_size: usize,
    /// Running encoded size across all entries.
    total_memory: usize,
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl HistoryStack {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: 0,
            max_history_size: max_history_size.max(1),
            total_memory: 0,
        }
    }

    pub fn push(&mut self, snapshot: HistorySnapshot) {
        // Drop the redo branch.
        if !self.entries.is_empty() {
            for dropped in self.entries.drain(self.cursor + 1..) {
                self.total_memory = self.total_memory.saturating_sub(dropped.memory_size());
            }
        }

        self.total_memory += snapshot.memory_size();
        self.entries.push_back(snapshot);
        self.cursor = self.entries.len() - 1;

        self.prune();
    }

    /// Step back one snapshot. `None` when already at the oldest.
    pub fn undo(&mut self) -> Option<&HistorySnapshot> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor)
    }

    /// Step forward one snapshot. `None` when already at the newest.
    pub fn redo(&mut self) -> Option<&HistorySnapshot> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor)
    }

    pub fn current(&self) -> Option<&HistorySnapshot> {
        self.entries.get(self.cursor)
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty() && self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.entries.is_empty() && self.cursor + 1 < self.entries.len()
    }

    /// Index of the current snapshot, `None` while empty.
    pub fn cursor(&self) -> Option<usize> {
        (!self.entries.is_empty()).then_some(self.cursor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_history_size(&self) -> usize {
        self.max_history_size
    }

    pub fn undo_description(&self) -> Option<&str> {
        if self.can_undo() { self.current().map(|s| s.description()) } else { None }
    }

    pub fn redo_description(&self) -> Option<&str> {
        if self.can_redo() { self.entries.get(self.cursor + 1).map(|s| s.description()) } else { None }
    }

    /// Descriptions up to and including the current snapshot (most recent first).
    pub fn undo_history(&self) -> Vec<String> {
        self.entries
            .iter()
            .take(self.cursor + 1)
            .rev()
            .map(|s| s.description().to_string())
            .collect()
    }

    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    fn prune(&mut self) {
        while self.entries.len() > self.max_history_size {
            if let Some(removed) = self.entries.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
                self.cursor = self.cursor.saturating_sub(1);
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
        self.total_memory = 0;
    }
}
