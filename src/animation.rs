//! Custom characters and the animations cycling through them.
//!
//! The controller has eight CGRAM slots. An animation pins a list of glyphs to a slot
//! and [`frame_index`] picks the glyph to show from the wall clock alone, so every slot
//! animated at the same rate stays in phase no matter how irregularly it is updated.

use core::time::Duration;

use heapless::Vec;

/// One glyph, 8 rows of 5 pixels each (low bits).
pub type Glyph = [u8; 8];

/// Number of CGRAM slots.
pub const SLOTS: usize = 8;

/// Most frames a single animation can hold.
pub const MAX_ANIMATION_FRAMES: usize = 16;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Converts raw bitmap data into a glyph, `None` unless it is exactly 8 bytes.
pub fn glyph(bitmap: &[u8]) -> Option<Glyph> {
    bitmap.try_into().ok()
}

/// Frame to show at `now` for an animation of `frames` frames at `frame_rate` fps.
///
/// Computes `round(now * frame_rate) mod frames`, rounding halves up, in integer
/// nanoseconds. `None` without frames.
pub fn frame_index(now: Duration, frame_rate: u32, frames: usize) -> Option<usize> {
    let ticks = (now.as_nanos() * u128::from(frame_rate) + NANOS_PER_SEC / 2) / NANOS_PER_SEC;
    ticks.checked_rem(frames as u128).map(|index| index as usize)
}

/// Animation pinned to one CGRAM slot.
#[derive(Debug, Clone)]
pub struct Animation {
    frames: Vec<Glyph, MAX_ANIMATION_FRAMES>,
    frame_rate: u32,
    /// Frame currently in CGRAM, if the slot was last written by the animation.
    shown: Option<usize>,
}

impl Animation {
    /// Validates every frame before anything is stored.
    pub fn new<F>(frames: F, frame_rate: u32) -> Option<Self>
    where
        F: IntoIterator,
        F::Item: AsRef<[u8]>,
    {
        let mut glyphs = Vec::new();
        for frame in frames {
            let frame = glyph(frame.as_ref())?;
            glyphs.push(frame).ok()?;
        }
        if glyphs.is_empty() {
            return None;
        }
        Some(Self {
            frames: glyphs,
            frame_rate,
            shown: None,
        })
    }

    pub fn frames(&self) -> &[Glyph] {
        &self.frames
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Glyph to show at `now` together with its index.
    pub fn frame_at(&self, now: Duration) -> (usize, &Glyph) {
        // never empty, see `Animation::new`
        let index = frame_index(now, self.frame_rate, self.frames.len()).unwrap_or(0);
        (index, &self.frames[index])
    }
}

/// The animation slots of one display.
#[derive(Debug, Clone, Default)]
pub(crate) struct Animations {
    slots: [Option<Animation>; SLOTS],
}

impl Animations {
    pub fn new() -> Self {
        Self {
            slots: Default::default(),
        }
    }

    pub fn get(&self, slot: usize) -> Option<&Animation> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Stores `animation`, replacing whatever ran in `slot`. The first frame counts as
    /// shown since it is written when the animation is created.
    pub fn insert(&mut self, slot: usize, mut animation: Animation) {
        animation.shown = Some(0);
        self.slots[slot] = Some(animation);
    }

    /// Called when a slot is overwritten directly, so the next update rewrites it.
    pub fn forget_shown(&mut self, slot: usize) {
        if let Some(animation) = self.slots.get_mut(slot).and_then(Option::as_mut) {
            animation.shown = None;
        }
    }

    /// Next glyph to program, if slot `slot` shows a stale frame at `now`.
    pub fn pending(&self, slot: usize, now: Duration) -> Option<(usize, Glyph)> {
        let animation = self.get(slot)?;
        let (index, frame) = animation.frame_at(now);
        if animation.shown == Some(index) {
            None
        } else {
            Some((index, *frame))
        }
    }

    pub fn mark_shown(&mut self, slot: usize, index: usize) {
        if let Some(animation) = self.slots.get_mut(slot).and_then(Option::as_mut) {
            animation.shown = Some(index);
        }
    }
}
