//! Chapter navigation
//!
//! Pure arithmetic over an ordered chapter list. A track without chapters
//! behaves as a single implicit chapter starting at 0.

use crate::types::Chapter;

/// Window after a chapter start in which "previous" goes to the prior chapter
/// instead of restarting the current one
pub const SKIP_BACK_GRACE_SECS: f64 = 3.0;

/// Where a "next chapter" request lands
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChapterTarget {
    /// Seek within the current track
    Seek(f64),

    /// Current chapter is the last one; advance the queue
    NextTrack,
}

/// Index of the chapter containing `elapsed`
///
/// Returns 0 at the very start of a track, for chapterless tracks, and when
/// `elapsed` falls before the first chapter.
pub fn locate_chapter(chapters: &[Chapter], elapsed: f64) -> usize {
    if elapsed <= 0.0 || chapters.is_empty() {
        return 0;
    }
    chapters
        .partition_point(|c| c.start_time <= elapsed)
        .saturating_sub(1)
}

/// Target for skipping forward from chapter `current`
pub fn next_chapter(chapters: &[Chapter], current: usize) -> ChapterTarget {
    match chapters.get(current + 1) {
        Some(next) => ChapterTarget::Seek(next.start_time),
        None => ChapterTarget::NextTrack,
    }
}

/// Seek target for skipping back from chapter `current`
///
/// Within [`SKIP_BACK_GRACE_SECS`] of the chapter start this is the previous
/// chapter's start (chapter 0 restarts itself). Past the window it restarts
/// the current chapter.
pub fn previous_chapter(chapters: &[Chapter], current: usize, elapsed: f64) -> f64 {
    let Some(chapter) = chapters.get(current) else {
        return 0.0;
    };

    if elapsed - chapter.start_time < SKIP_BACK_GRACE_SECS {
        current
            .checked_sub(1)
            .and_then(|index| chapters.get(index))
            .map_or(chapter.start_time, |previous| previous.start_time)
    } else {
        chapter.start_time
    }
}
