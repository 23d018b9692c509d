// SPDX-License-Identifier: CEPL-1.0
use crate::error::{RenderError, RenderResult};

// STRICT PER-FRAME ORDER:
// Idle -> ImageAcquired -> Recorded -> Submitted -> Presented -> DeviceIdle -> Idle
// Only one frame is ever in flight; the next acquire may not start before DeviceIdle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    ImageAcquired,
    Recorded,
    Submitted,
    Presented,
    DeviceIdle,
}

impl FramePhase {
    pub fn next(self) -> Self {
        match self {
            FramePhase::Idle => FramePhase::ImageAcquired,
            FramePhase::ImageAcquired => FramePhase::Recorded,
            FramePhase::Recorded => FramePhase::Submitted,
            FramePhase::Submitted => FramePhase::Presented,
            FramePhase::Presented => FramePhase::DeviceIdle,
            FramePhase::DeviceIdle => FramePhase::Idle,
        }
    }
}

#[derive(Debug)]
pub struct FrameTracker {
    phase: FramePhase,
    completed: u64,
}

impl Default for FrameTracker {
    fn default() -> Self {
        Self {
            phase: FramePhase::Idle,
            completed: 0,
        }
    }
}

impl FrameTracker {
    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn advance(&mut self, to: FramePhase) -> RenderResult<()> {
        if self.phase.next() != to {
            return Err(RenderError::FrameOrder {
                from: self.phase,
                to,
            });
        }
        if to == FramePhase::Idle {
            self.completed += 1;
        }
        self.phase = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CYCLE: [FramePhase; 6] = [
        FramePhase::ImageAcquired,
        FramePhase::Recorded,
        FramePhase::Submitted,
        FramePhase::Presented,
        FramePhase::DeviceIdle,
        FramePhase::Idle,
    ];

    #[test]
    fn full_cycles_count_frames() {
        let mut t = FrameTracker::default();
        for _ in 0..3 {
            for phase in CYCLE {
                t.advance(phase).unwrap();
            }
        }
        assert_eq!(t.completed(), 3);
        assert_eq!(t.phase(), FramePhase::Idle);
    }

    #[test]
    fn present_before_submit_is_rejected() {
        let mut t = FrameTracker::default();
        t.advance(FramePhase::ImageAcquired).unwrap();
        t.advance(FramePhase::Recorded).unwrap();
        let err = t.advance(FramePhase::Presented).unwrap_err();
        assert!(matches!(
            err,
            RenderError::FrameOrder {
                from: FramePhase::Recorded,
                to: FramePhase::Presented
            }
        ));
        assert_eq!(t.phase(), FramePhase::Recorded);
    }

    #[test]
    fn second_acquire_needs_idle_device() {
        let mut t = FrameTracker::default();
        for phase in &CYCLE[..4] {
            t.advance(*phase).unwrap();
        }
        // presented but not drained yet
        assert!(t.advance(FramePhase::ImageAcquired).is_err());
        assert_eq!(t.completed(), 0);
    }

    #[test]
    fn double_submit_is_rejected() {
        let mut t = FrameTracker::default();
        for phase in &CYCLE[..3] {
            t.advance(*phase).unwrap();
        }
        assert!(t.advance(FramePhase::Submitted).is_err());
    }
}
