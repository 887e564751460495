use crate::frame::FrameScore;

/// Running totals over the frames of a stream.
#[derive(Debug, Clone, Default)]
pub struct StreamSummary {
    total: FrameScore,
    frames: usize,
    worst: Option<(usize, FrameScore)>,
}

impl StreamSummary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, score: FrameScore) {
        self.total.y += score.y;
        self.total.u += score.u;
        self.total.v += score.v;

        let is_worse = self.worst.map_or(true, |(_, worst)| {
            rank(score.combined()) < rank(worst.combined())
        });
        if is_worse {
            self.worst = Some((self.frames, score));
        }
        self.frames += 1;
    }

    #[must_use]
    pub const fn frames(&self) -> usize {
        self.frames
    }

    /// Arithmetic mean of each plane over all frames, `None` before the first
    /// frame.
    #[must_use]
    pub fn mean(&self) -> Option<FrameScore> {
        if self.frames == 0 {
            return None;
        }

        let n = self.frames as f64;
        Some(FrameScore {
            y: self.total.y / n,
            u: self.total.u / n,
            v: self.total.v / n,
        })
    }

    /// Index and score of the frame with the lowest combined score. The first
    /// NaN frame, if any, counts as the lowest.
    #[must_use]
    pub const fn worst(&self) -> Option<(usize, FrameScore)> {
        self.worst
    }
}

/// Orders undefined scores below every real one.
fn rank(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

impl Extend<FrameScore> for StreamSummary {
    fn extend<I: IntoIterator<Item = FrameScore>>(&mut self, iter: I) {
        for score in iter {
            self.push(score);
        }
    }
}
