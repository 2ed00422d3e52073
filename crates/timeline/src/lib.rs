//! Frame pacing and parameter animation for the chromaglass renderer.
//!
//! Everything in this crate is pure bookkeeping over `Instant`/`Duration`:
//! the renderer's event loop calls [`FrameClock::tick`] once per presented
//! frame, samples the [`AnimationPlan`] to fill the shader uniform block, and
//! polls [`ResizeSettle`] to decide when a window resize has come to rest.
//! No GPU or windowing types appear here so the whole surface is unit-testable.

use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    #[error("oscillator {field} must be finite, got {value}")]
    NonFinite { field: &'static str, value: f32 },
    #[error("oscillator rate must be positive, got {0}")]
    NonPositiveRate(f32),
    #[error("oscillator depth must be non-negative, got {0}")]
    NegativeDepth(f32),
}

/// Base waveform evaluated by an [`Oscillator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Cosine,
}

/// Bounded periodic animation of a single scalar parameter.
///
/// Samples follow `base + depth * wave(rate * t_ms)` where `t_ms` is elapsed
/// time in milliseconds and `rate` is in radians per millisecond. With
/// `rectify` set, negative wave lobes are clamped to zero so the output never
/// dips below `base`. Either way the output stays inside [`Oscillator::bounds`]
/// for every timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Oscillator {
    base: f32,
    depth: f32,
    rate: f32,
    waveform: Waveform,
    rectify: bool,
}

impl Oscillator {
    pub fn new(
        base: f32,
        depth: f32,
        rate: f32,
        waveform: Waveform,
        rectify: bool,
    ) -> Result<Self, TimelineError> {
        for (field, value) in [("base", base), ("depth", depth), ("rate", rate)] {
            if !value.is_finite() {
                return Err(TimelineError::NonFinite { field, value });
            }
        }
        if rate <= 0.0 {
            return Err(TimelineError::NonPositiveRate(rate));
        }
        if depth < 0.0 {
            return Err(TimelineError::NegativeDepth(depth));
        }
        Ok(Self {
            base,
            depth,
            rate,
            waveform,
            rectify,
        })
    }

    pub fn sine(base: f32, depth: f32, rate: f32) -> Result<Self, TimelineError> {
        Self::new(base, depth, rate, Waveform::Sine, false)
    }

    pub fn rectified_cosine(base: f32, depth: f32, rate: f32) -> Result<Self, TimelineError> {
        Self::new(base, depth, rate, Waveform::Cosine, true)
    }

    /// Evaluates the oscillator at `millis` of elapsed time.
    ///
    /// The phase is accumulated in f64 so long-running sessions do not lose
    /// precision before the final trigonometric evaluation.
    pub fn sample(&self, millis: f64) -> f32 {
        let phase = self.rate as f64 * millis;
        let wave = match self.waveform {
            Waveform::Sine => phase.sin(),
            Waveform::Cosine => phase.cos(),
        } as f32;
        let wave = if self.rectify { wave.max(0.0) } else { wave };
        self.base + self.depth * wave
    }

    /// Closed interval containing every possible sample.
    pub fn bounds(&self) -> (f32, f32) {
        if self.rectify {
            (self.base, self.base + self.depth)
        } else {
            (self.base - self.depth, self.base + self.depth)
        }
    }
}

/// The pair of oscillators feeding the distortion shader each frame.
#[derive(Debug, Clone, Copy)]
pub struct AnimationPlan {
    pub frequency: Oscillator,
    pub amplitude: Oscillator,
}

/// Per-frame scalar uniforms derived from elapsed time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSample {
    /// Elapsed time in seconds, as handed to the shader.
    pub time: f32,
    pub frequency: f32,
    pub amplitude: f32,
}

impl AnimationPlan {
    /// The animation shipped by default: frequency swings over [8, 12] and
    /// amplitude pulses over [0.05, 0.08].
    pub fn standard() -> Self {
        Self {
            frequency: Oscillator::sine(10.0, 2.0, 0.0007).expect("default frequency oscillator"),
            amplitude: Oscillator::rectified_cosine(0.05, 0.03, 0.001)
                .expect("default amplitude oscillator"),
        }
    }

    /// Derives the uniform values for a frame `elapsed` into the animation.
    pub fn sample(&self, elapsed: Duration) -> FrameSample {
        let millis = elapsed.as_secs_f64() * 1000.0;
        FrameSample {
            time: elapsed.as_secs_f32(),
            frequency: self.frequency.sample(millis),
            amplitude: self.amplitude.sample(millis),
        }
    }
}

/// Timing information for one rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTiming {
    pub elapsed: Duration,
    pub delta: Duration,
    pub frame_index: u32,
}

/// Monotonic per-frame clock.
///
/// The epoch is captured lazily on the first tick so window creation and GPU
/// initialisation time never count against the animation.
#[derive(Debug, Default)]
pub struct FrameClock {
    start: Option<Instant>,
    last: Option<Instant>,
    frame_count: u32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self, now: Instant) -> FrameTiming {
        let start = *self.start.get_or_insert(now);
        let last = self.last.replace(now).unwrap_or(now);
        let timing = FrameTiming {
            elapsed: now.saturating_duration_since(start),
            delta: now.saturating_duration_since(last),
            frame_index: self.frame_count,
        };
        self.frame_count = self.frame_count.saturating_add(1);
        timing
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }
}

/// Single-slot debounce for window resize events.
///
/// Every [`note`](Self::note) replaces the pending entry and pushes the
/// deadline out to `now + settle`, so a drag-resize produces exactly one
/// committed measurement once the event stream goes quiet.
#[derive(Debug)]
pub struct ResizeSettle {
    settle: Duration,
    pending: Option<PendingResize>,
}

#[derive(Debug, Clone, Copy)]
struct PendingResize {
    size: (u32, u32),
    deadline: Instant,
}

impl ResizeSettle {
    pub fn new(settle: Duration) -> Self {
        Self {
            settle,
            pending: None,
        }
    }

    /// Records a resize to `size` observed at `now`, re-arming the deadline.
    pub fn note(&mut self, size: (u32, u32), now: Instant) {
        self.pending = Some(PendingResize {
            size,
            deadline: now + self.settle,
        });
    }

    /// Deadline of the pending measurement, if any; lets the caller pick a
    /// wake-up time instead of busy-polling.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|pending| pending.deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Hands out the settled size once its quiet period has elapsed.
    pub fn take_if_due(&mut self, now: Instant) -> Option<(u32, u32)> {
        match self.pending {
            Some(pending) if now >= pending.deadline => {
                self.pending = None;
                Some(pending.size)
            }
            _ => None,
        }
    }
}
