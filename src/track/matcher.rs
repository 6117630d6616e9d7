use micromath::F32Ext;

use crate::config::MAX_TOUCHES;
use crate::track::Touch;

/// Life cycle of a touch slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// Holds no position. Can be claimed by any new touch.
    Exiled,
    /// Released, but keeps its last position so a touch returning nearby
    /// continues in the same slot.
    Inactive { idle_frames: u32 },
    /// Assigned to a touch, or still gated on after its candidate disappeared.
    Active,
}

/// A persistent touch slot. Positions are in key coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Slot {
    pub state: SlotState,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Slot {
    pub fn is_exiled(&self) -> bool {
        self.state == SlotState::Exiled
    }
}

impl Default for Slot {
    fn default() -> Self {
        Slot {
            state: SlotState::Exiled,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }
}

/// The candidate given to a slot in one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Assignment {
    pub candidate: Option<usize>,
    /// The slot was not active before this frame. Its position filter should
    /// start from the candidate position.
    pub is_new: bool,
}

/// Assigns candidate touches to persistent slots.
///
/// Candidates and non-exiled slots that are each other's nearest neighbor
/// within the match distance are paired first. The distance combines position
/// and pressure: `|dx| + |dy| + pressure_weight * |dz|`. Remaining candidates
/// are placed in order of decreasing pressure: into the slot with their own
/// index if it is free, otherwise into the closest free inactive slot,
/// otherwise into the first free exiled slot. Candidates that find no free slot
/// are dropped.
///
/// With a rotation cursor, new touches instead take the first free slot at or
/// after the cursor, wrapping around, and the cursor moves past that slot. Only
/// active slots are continued, so every new touch moves on to the next slot.
pub struct TouchMatcher {
    match_distance: f32,
    pressure_weight: f32,
    relink_frames: u32,
}

impl TouchMatcher {
    pub fn new(match_distance: f32, pressure_weight: f32, relink_frames: u32) -> Self {
        TouchMatcher {
            match_distance,
            pressure_weight,
            relink_frames,
        }
    }

    pub fn distance(&self, slot: &Slot, candidate: &Touch) -> f32 {
        (candidate.x - slot.x).abs()
            + (candidate.y - slot.y).abs()
            + self.pressure_weight * (candidate.z - slot.z).abs()
    }

    /// Fills `assignments` (one per slot) and returns the number of dropped candidates.
    /// Candidates with zero pressure are ignored. `rotate` is the rotation cursor,
    /// if new touches are allocated round robin.
    pub fn assign(
        &self,
        slots: &[Slot],
        candidates: &[Touch],
        assignments: &mut [Assignment],
        mut rotate: Option<&mut usize>,
    ) -> usize {
        debug_assert!(slots.len() <= MAX_TOUCHES);
        debug_assert_eq!(slots.len(), assignments.len());
        for assignment in assignments.iter_mut() {
            *assignment = Assignment::default();
        }
        let rotating = rotate.is_some();
        let linkable = |slot: &Slot| {
            if rotating {
                slot.state == SlotState::Active
            } else {
                !slot.is_exiled()
            }
        };

        let mut nearest_candidate = [None; MAX_TOUCHES];
        for (i, slot) in slots.iter().enumerate() {
            if !linkable(slot) {
                continue;
            }
            nearest_candidate[i] = argmin(
                candidates.iter().enumerate().filter(|(_, c)| c.z > 0.0),
                |c| self.distance(slot, c),
            );
        }

        let mut matched = [false; MAX_TOUCHES];
        for (j, candidate) in candidates.iter().enumerate() {
            if candidate.z <= 0.0 {
                continue;
            }
            let nearest_slot = argmin(
                slots.iter().enumerate().filter(|(_, s)| linkable(s)),
                |s| self.distance(s, candidate),
            );
            if let Some(i) = nearest_slot {
                if nearest_candidate[i] == Some(j) && self.distance(&slots[i], candidate) <= self.match_distance {
                    assignments[i] = Assignment {
                        candidate: Some(j),
                        is_new: slots[i].state != SlotState::Active,
                    };
                    matched[j] = true;
                }
            }
        }

        let mut dropped = 0;
        for (j, candidate) in candidates.iter().enumerate() {
            if candidate.z <= 0.0 || matched[j] {
                continue;
            }
            let is_free = |i: usize| assignments[i].candidate.is_none() && slots[i].state != SlotState::Active;
            let slot = match rotate.as_deref_mut() {
                Some(next) => {
                    let n = slots.len();
                    let found = (0..n).map(|k| (*next + k) % n).find(|i| is_free(*i));
                    if let Some(i) = found {
                        *next = (i + 1) % n;
                    }
                    found
                }
                None if j < slots.len() && is_free(j) => Some(j),
                None => argmin(
                    slots
                        .iter()
                        .enumerate()
                        .filter(|(i, s)| is_free(*i) && !s.is_exiled()),
                    |s| (candidate.x - s.x).abs() + (candidate.y - s.y).abs(),
                )
                .or_else(|| (0..slots.len()).find(|i| is_free(*i))),
            };
            match slot {
                Some(i) => {
                    assignments[i] = Assignment {
                        candidate: Some(j),
                        is_new: true,
                    }
                }
                None => {
                    log::debug!("No free slot for touch at ({}, {})", candidate.x, candidate.y);
                    dropped += 1;
                }
            }
        }
        dropped
    }

    /// Moves a slot to its state after a frame. `gated` tells whether the
    /// slot's pressure filter is still above the off threshold.
    pub fn advance(&self, index: usize, slot: &mut Slot, candidate: Option<&Touch>, gated: bool) {
        match candidate {
            Some(candidate) => {
                slot.x = candidate.x;
                slot.y = candidate.y;
                slot.z = candidate.z;
                slot.state = SlotState::Active;
            }
            None => {
                slot.z = 0.0;
                slot.state = match slot.state {
                    SlotState::Active if gated => SlotState::Active,
                    SlotState::Active => SlotState::Inactive { idle_frames: 0 },
                    SlotState::Inactive { idle_frames } if idle_frames + 1 >= self.relink_frames => {
                        log::debug!("Slot {} exiled", index);
                        SlotState::Exiled
                    }
                    SlotState::Inactive { idle_frames } => SlotState::Inactive {
                        idle_frames: idle_frames + 1,
                    },
                    SlotState::Exiled => SlotState::Exiled,
                };
            }
        }
    }
}

/// Index of the item with the smallest key. The first index wins ties.
fn argmin<'a, T: 'a, I, F>(items: I, key: F) -> Option<usize>
where
    I: Iterator<Item = (usize, &'a T)>,
    F: Fn(&T) -> f32,
{
    let mut best: Option<(usize, f32)> = None;
    for (i, item) in items {
        let d = key(item);
        match best {
            Some((_, best_d)) if best_d <= d => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(i, _)| i)
}
