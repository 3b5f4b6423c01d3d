use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("index {requested} is out of range for size {size}")]
pub struct OutOfRange {
    pub requested: usize,
    pub size: usize,
}

/// Wraparound cursor over the closed interval `[0, size - 1]`.
///
/// `end` holds the last valid position, not a past-the-end bound: a kiosk
/// cycling forever must never fault at the edges, so `next`/`previous` wrap
/// instead of erroring. An index is constructed fresh whenever the active
/// category or its note count changes; it is never resized in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircularIndex {
    size: usize,
    current: usize,
    end: usize,
}

impl CircularIndex {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            current: 0,
            end: size.saturating_sub(1),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// Advance the cursor, wrapping past the last position. With zero or one
    /// notes this is a no-op returning 0.
    pub fn next(&mut self) -> usize {
        if self.end == 0 {
            return 0;
        }
        if self.current == self.end {
            self.current = 0;
        } else {
            self.current += 1;
        }
        self.current
    }

    /// Step the cursor back, wrapping before the first position. With zero or
    /// one notes this is a no-op returning 0.
    pub fn previous(&mut self) -> usize {
        if self.end == 0 {
            return 0;
        }
        if self.current == 0 {
            self.current = self.end;
        } else {
            self.current -= 1;
        }
        self.current
    }

    /// Jump to an absolute position. Out-of-range positions are rejected, not
    /// clamped: a bad `n` here is a caller bug and must fail loudly. Negative
    /// positions are unrepresentable by the parameter type.
    pub fn set_current(&mut self, n: usize) -> Result<(), OutOfRange> {
        if n >= self.size {
            return Err(OutOfRange {
                requested: n,
                size: self.size,
            });
        }
        self.current = n;
        Ok(())
    }
}
