//! Grouping-keyed frame storage for one kind.
//!
//! Frames partition by (call kind, callee port, callee, call position,
//! interval context); frames sharing a key join. Artificial-source frames
//! additionally compare callee ports by prefix: a deeper port is covered by a
//! prefix port, and prefix-comparable frames merge into the shorter port's
//! bucket.

use sift_core::types::collections::BTreeMap;
use sift_core::types::MethodId;

use crate::access_path::PortRef;
use crate::interval::ClassIntervalContext;
use crate::position::Position;

use super::frame::{CallKind, Frame};

/// The grouping key of a frame.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrameKey {
    pub call_kind: CallKind,
    pub callee_port: PortRef,
    pub callee: Option<MethodId>,
    pub call_position: Option<Position>,
    pub interval: ClassIntervalContext,
}

impl FrameKey {
    pub fn of(frame: &Frame) -> FrameKey {
        FrameKey {
            call_kind: frame.call_kind(),
            callee_port: frame.callee_port().clone(),
            callee: frame.callee().copied(),
            call_position: frame.call_position().cloned(),
            interval: *frame.interval(),
        }
    }

    /// Whether this key equals `other` in every dimension except the port,
    /// where it holds a (non-strict) prefix of `other`'s port.
    fn covers_port_of(&self, other: &FrameKey) -> bool {
        self.call_kind == other.call_kind
            && self.callee == other.callee
            && self.call_position == other.call_position
            && self.interval == other.interval
            && self.callee_port.is_prefix_of(&other.callee_port)
    }
}

/// All frames of one kind, keyed by their grouping key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindFrames {
    frames: BTreeMap<FrameKey, Frame>,
}

impl KindFrames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Frame> {
        self.frames.values_mut()
    }

    pub fn into_frames(self) -> impl Iterator<Item = Frame> {
        self.frames.into_values()
    }

    /// Add a frame, joining with the bucket sharing its key.
    ///
    /// For artificial sources (`artificial` true), a frame whose port is
    /// prefix-comparable with an existing bucket merges into the shorter
    /// port's bucket instead of opening a new one.
    pub fn add(&mut self, frame: Frame, artificial: bool) {
        let key = FrameKey::of(&frame);

        if artificial {
            // Merge into an existing covering bucket.
            if let Some((covering, _)) = self
                .frames
                .iter()
                .find(|(existing, _)| existing.covers_port_of(&key))
            {
                let covering = covering.clone();
                self.frames
                    .get_mut(&covering)
                    .expect("key came from the map")
                    .join_with(&frame);
                return;
            }
            // The new frame's port may cover existing buckets; fold them in.
            let covered: Vec<FrameKey> = self
                .frames
                .keys()
                .filter(|existing| key.covers_port_of(existing))
                .cloned()
                .collect();
            let mut frame = frame;
            for existing in covered {
                let removed = self.frames.remove(&existing).expect("key came from the map");
                frame.join_with(&removed);
            }
            self.frames.insert(key, frame);
            return;
        }

        match self.frames.get_mut(&key) {
            Some(existing) => existing.join_with(&frame),
            None => {
                self.frames.insert(key, frame);
            }
        }
    }

    pub fn leq(&self, other: &KindFrames, artificial: bool) -> bool {
        self.frames.iter().all(|(key, frame)| {
            if artificial {
                other
                    .frames
                    .iter()
                    .any(|(other_key, other_frame)| {
                        other_key.covers_port_of(key) && frame.leq(other_frame)
                    })
            } else {
                other
                    .frames
                    .get(key)
                    .map(|other_frame| frame.leq(other_frame))
                    .unwrap_or(false)
            }
        })
    }

    pub fn join_with(&mut self, other: &KindFrames, artificial: bool) {
        for frame in other.iter() {
            self.add(frame.clone(), artificial);
        }
    }

    /// Remove frames covered by `other`.
    pub fn difference_with(&mut self, other: &KindFrames, artificial: bool) {
        self.frames.retain(|key, frame| {
            let covered = if artificial {
                other
                    .frames
                    .iter()
                    .any(|(other_key, other_frame)| {
                        other_key.covers_port_of(key) && frame.leq(other_frame)
                    })
            } else {
                other
                    .frames
                    .get(key)
                    .map(|other_frame| frame.leq(other_frame))
                    .unwrap_or(false)
            };
            !covered
        });
    }

    /// Keep only frames satisfying the predicate.
    pub fn retain(&mut self, mut keep: impl FnMut(&Frame) -> bool) {
        self.frames.retain(|_, frame| keep(frame));
    }
}
