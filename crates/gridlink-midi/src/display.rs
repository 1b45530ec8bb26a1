//! Segmented character display buffer
//!
//! The surface has a 4 × 68 character display. Each line can be addressed
//! as a whole, as 4 equal segments of 17 characters, or as 8 fields of
//! alternating 8/9 characters. Segment and field boundaries don't line up;
//! both are just views over the same character buffer.
//!
//! ```text
//! |    segment 0    |    segment 1    |    segment 2    |    segment 3    |
//! |field 0|field 1  |field 2|field 3  |field 4|field 5  |field 6|field 7  |
//! ```
//!
//! Writes only touch the buffer. [`DisplayBuffer::flush`] sends each line
//! whose content differs from what was last sent, so unchanged lines never
//! generate traffic.

use crate::output::MidiSink;

pub const LINE_COUNT: usize = 4;
pub const LINE_WIDTH: usize = 68;
pub const SEGMENT_COUNT: usize = 4;
pub const SEGMENT_WIDTH: usize = LINE_WIDTH / SEGMENT_COUNT;
pub const FIELD_COUNT: usize = 8;
pub const FIELD_WIDTHS: [usize; FIELD_COUNT] = [8, 9, 8, 9, 8, 9, 8, 9];

/// Vendor SysEx prefix for display writes
const DISPLAY_SYSEX_HEADER: [u8; 4] = [0xF0, 0x47, 0x7F, 0x15];
/// Address of line 0; lines follow consecutively
const LINE_ADDRESS_BASE: u8 = 0x18;

/// Text alignment within a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

fn display_char(c: char) -> u8 {
    if (' '..='~').contains(&c) {
        c as u8
    } else {
        b'?'
    }
}

/// Fit text into exactly `width` characters
///
/// Longer text is truncated. Centering puts an odd leftover space on the right.
pub fn align_text(text: &str, width: usize, align: Align) -> Vec<u8> {
    let chars: Vec<u8> = text.chars().take(width).map(display_char).collect();
    let pad = width - chars.len();
    let left = match align {
        Align::Left => 0,
        Align::Right => pad,
        Align::Center => pad / 2,
    };

    let mut out = vec![b' '; width];
    out[left..left + chars.len()].copy_from_slice(&chars);
    out
}

/// Start column of a field
pub fn field_offset(field: usize) -> usize {
    FIELD_WIDTHS.iter().take(field).sum()
}

/// Four-line display with per-line change tracking
#[derive(Debug, Clone)]
pub struct DisplayBuffer {
    lines: [[u8; LINE_WIDTH]; LINE_COUNT],
    sent: [Option<[u8; LINE_WIDTH]>; LINE_COUNT],
}

impl Default for DisplayBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayBuffer {
    pub fn new() -> Self {
        Self {
            lines: [[b' '; LINE_WIDTH]; LINE_COUNT],
            sent: [None; LINE_COUNT],
        }
    }

    fn write_region(&mut self, line: usize, start: usize, width: usize, text: &str, align: Align) {
        if line >= LINE_COUNT || start + width > LINE_WIDTH {
            log::trace!("Display: region out of range (line {}, col {})", line, start);
            return;
        }
        let rendered = align_text(text, width, align);
        self.lines[line][start..start + width].copy_from_slice(&rendered);
    }

    /// Replace a whole line (left aligned)
    pub fn set_line(&mut self, line: usize, text: &str) {
        self.write_region(line, 0, LINE_WIDTH, text, Align::Left);
    }

    /// Write one of the 4 segments of a line
    pub fn set_segment(&mut self, line: usize, segment: usize, text: &str, align: Align) {
        if segment >= SEGMENT_COUNT {
            return;
        }
        self.write_region(line, segment * SEGMENT_WIDTH, SEGMENT_WIDTH, text, align);
    }

    /// Write all 4 segments of a line
    pub fn set_segments<S: AsRef<str>>(&mut self, line: usize, texts: &[S; SEGMENT_COUNT], align: Align) {
        for (segment, text) in texts.iter().enumerate() {
            self.set_segment(line, segment, text.as_ref(), align);
        }
    }

    /// Write one of the 8 fields of a line
    pub fn set_field(&mut self, line: usize, field: usize, text: &str, align: Align) {
        if field >= FIELD_COUNT {
            return;
        }
        self.write_region(line, field_offset(field), FIELD_WIDTHS[field], text, align);
    }

    /// Write all 8 fields of a line
    pub fn set_fields<S: AsRef<str>>(&mut self, line: usize, texts: &[S; FIELD_COUNT], align: Align) {
        for (field, text) in texts.iter().enumerate() {
            self.set_field(line, field, text.as_ref(), align);
        }
    }

    /// Blank every line
    pub fn clear(&mut self) {
        self.lines = [[b' '; LINE_WIDTH]; LINE_COUNT];
    }

    /// Current content of a line
    pub fn line_text(&self, line: usize) -> Option<String> {
        self.lines
            .get(line)
            .map(|bytes| bytes.iter().map(|b| *b as char).collect())
    }

    /// Current content of a segment
    pub fn segment_text(&self, line: usize, segment: usize) -> Option<String> {
        if segment >= SEGMENT_COUNT {
            return None;
        }
        let start = segment * SEGMENT_WIDTH;
        self.region_text(line, start, SEGMENT_WIDTH)
    }

    /// Current content of a field
    pub fn field_text(&self, line: usize, field: usize) -> Option<String> {
        if field >= FIELD_COUNT {
            return None;
        }
        self.region_text(line, field_offset(field), FIELD_WIDTHS[field])
    }

    fn region_text(&self, line: usize, start: usize, width: usize) -> Option<String> {
        self.lines
            .get(line)
            .map(|bytes| bytes[start..start + width].iter().map(|b| *b as char).collect())
    }

    /// Lines whose content differs from what was last sent
    pub fn dirty_lines(&self) -> Vec<usize> {
        (0..LINE_COUNT)
            .filter(|line| self.sent[*line] != Some(self.lines[*line]))
            .collect()
    }

    /// Send every changed line to the surface
    ///
    /// A line that fails to send stays dirty and is retried on the next flush.
    /// Returns the number of lines sent.
    pub fn flush(&mut self, sink: &mut dyn MidiSink) -> usize {
        let mut flushed = 0;
        for line in self.dirty_lines() {
            let message = line_sysex(line, &self.lines[line]);
            match sink.send_bytes(&message) {
                Ok(()) => {
                    log::trace!("[HW OUT] Display line {}: {:?}", line, self.line_text(line));
                    self.sent[line] = Some(self.lines[line]);
                    flushed += 1;
                }
                Err(e) => log::warn!("Display: Failed to send line {}: {}", line, e),
            }
        }
        flushed
    }

    /// Forget what was sent so the next flush rewrites every line
    pub fn invalidate(&mut self) {
        self.sent = [None; LINE_COUNT];
    }
}

/// Build the display write message for one line
///
/// Format: `F0 47 7F 15 [addr] 00 [len] 00 [68 chars] F7` where `len`
/// counts the offset byte plus the characters.
pub fn line_sysex(line: usize, chars: &[u8; LINE_WIDTH]) -> Vec<u8> {
    let mut message = Vec::with_capacity(DISPLAY_SYSEX_HEADER.len() + 5 + LINE_WIDTH);
    message.extend_from_slice(&DISPLAY_SYSEX_HEADER);
    message.push(LINE_ADDRESS_BASE + line as u8);
    message.push(0x00);
    message.push((LINE_WIDTH + 1) as u8);
    message.push(0x00);
    message.extend_from_slice(chars);
    message.push(0xF7);
    message
}
