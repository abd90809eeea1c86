//! Pending track queue
//!
//! A plain FIFO. The currently playing track is held by the engine and is
//! never a member of the queue.

use crate::types::Track;
use std::collections::VecDeque;

#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: VecDeque<Track>,
}

impl Queue {
    /// Create new empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a track to the back
    pub fn push(&mut self, track: Track) {
        self.tracks.push_back(track);
    }

    /// Take the next track to play
    pub fn pop(&mut self) -> Option<Track> {
        self.tracks.pop_front()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Pending tracks in play order
    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }
}
