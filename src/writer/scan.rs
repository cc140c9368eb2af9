//! Zero-run scanner
//!
//! Splits a buffer into the spans that must be stored, eliding zero runs
//! of at least `min_hole` bytes.

use std::ops::Range;

/// Length of the zero run starting at the beginning of `buf`
pub fn zero_run_len(buf: &[u8]) -> usize {
    buf.iter().position(|&b| b != 0).unwrap_or(buf.len())
}

/// True when every byte is zero
pub fn is_zero(buf: &[u8]) -> bool {
    zero_run_len(buf) == buf.len()
}

/// Iterator over the data spans of a buffer
#[derive(Debug)]
pub struct DataSpans<'a> {
    buf: &'a [u8],
    pos: usize,
    min_hole: usize,
}

impl<'a> DataSpans<'a> {
    pub fn new(buf: &'a [u8], min_hole: u64) -> Self {
        Self {
            buf,
            pos: 0,
            min_hole: usize::try_from(min_hole).unwrap_or(usize::MAX).max(1),
        }
    }
}

impl<'a> Iterator for DataSpans<'a> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Range<usize>> {
        let len = self.buf.len();

        // Skip a hole at the current position
        let run = zero_run_len(&self.buf[self.pos..]);
        if run >= self.min_hole {
            self.pos += run;
        }
        if self.pos >= len {
            return None;
        }

        let start = self.pos;
        let mut end = start;
        loop {
            end += self.buf[end..]
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(len - end);
            if end >= len {
                break;
            }

            let run = zero_run_len(&self.buf[end..]);
            if run >= self.min_hole {
                break;
            }
            // Short run: stays inside this span
            end += run;
            if end >= len {
                break;
            }
        }

        self.pos = end;
        Some(start..end)
    }
}
