//! Playlist sequencing
//!
//! Walks a fixed track list in order, or in a shuffled order that is
//! reshuffled every time the traversal wraps around.

use marquee_core::Track;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform values in `[0, 1)` for shuffling
pub trait RandomSource: Send {
    fn next_unit(&mut self) -> f64;
}

/// Entropy-seeded production source
pub struct StdRandom(StdRng);

impl StdRandom {
    /// Deterministic source, for reproducible runs
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl Default for StdRandom {
    fn default() -> Self {
        Self(StdRng::from_entropy())
    }
}

impl RandomSource for StdRandom {
    fn next_unit(&mut self) -> f64 {
        self.0.gen::<f64>()
    }
}

/// Replays a fixed list of values, cycling when it runs out
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    values: Vec<f64>,
    next: usize,
}

impl ScriptedRandom {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, next: 0 }
    }
}

impl RandomSource for ScriptedRandom {
    fn next_unit(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let value = self.values[self.next % self.values.len()];
        self.next += 1;
        value
    }
}

/// Fisher-Yates permutation of `0..n`
///
/// For `i` from `n - 1` down to 1, swaps `i` with `j = floor(r * (i + 1))`.
/// Out-of-range draws are clamped into `0..=i`.
pub fn shuffled_order(n: usize, random: &mut dyn RandomSource) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        let r = random.next_unit();
        let r = if r.is_finite() { r.max(0.0) } else { 0.0 };
        let j = ((r * (i + 1) as f64).floor() as usize).min(i);
        order.swap(i, j);
    }
    order
}

/// Playlist state: tracks, traversal order and position
pub struct PlaylistSequencer {
    tracks: Vec<Track>,
    order: Vec<usize>,
    current_index: usize,
    shuffled: bool,
    random: Box<dyn RandomSource>,
}

impl PlaylistSequencer {
    pub fn new(tracks: Vec<Track>, shuffle: bool) -> Self {
        Self::with_random(tracks, shuffle, Box::new(StdRandom::default()))
    }

    pub fn with_random(tracks: Vec<Track>, shuffle: bool, random: Box<dyn RandomSource>) -> Self {
        let mut sequencer = Self {
            tracks: Vec::new(),
            order: Vec::new(),
            current_index: 0,
            shuffled: false,
            random,
        };
        sequencer.update(tracks, shuffle);
        sequencer
    }

    /// Replace the track list and shuffle flag; restarts from the top
    pub fn update(&mut self, tracks: Vec<Track>, shuffle: bool) {
        self.tracks = tracks;
        self.shuffled = shuffle;
        self.rebuild_order();
        self.current_index = 0;
    }

    /// Track at the current position
    pub fn current(&self) -> Option<&Track> {
        self.track_at(self.current_index)
    }

    /// Track one step ahead, without moving
    ///
    /// In shuffle mode a wrap will reshuffle, so the peeked track is only
    /// a guess at the last position.
    pub fn peek(&self) -> Option<&Track> {
        if self.order.is_empty() {
            return None;
        }
        self.track_at((self.current_index + 1) % self.order.len())
    }

    /// Advance one step and return the new current track
    ///
    /// Wrapping around in shuffle mode draws a fresh permutation first.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&Track> {
        if self.order.is_empty() {
            return None;
        }
        self.current_index = (self.current_index + 1) % self.order.len();
        if self.current_index == 0 && self.shuffled {
            self.rebuild_order();
        }
        self.current()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffled
    }

    /// Current traversal order (indices into `tracks`)
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    fn track_at(&self, position: usize) -> Option<&Track> {
        self.order.get(position).and_then(|&i| self.tracks.get(i))
    }

    fn rebuild_order(&mut self) {
        let n = self.tracks.len();
        self.order = if self.shuffled {
            shuffled_order(n, self.random.as_mut())
        } else {
            (0..n).collect()
        };
    }
}

impl std::fmt::Debug for PlaylistSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistSequencer")
            .field("tracks", &self.tracks.len())
            .field("order", &self.order)
            .field("current_index", &self.current_index)
            .field("shuffled", &self.shuffled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc() -> Vec<Track> {
        vec![
            Track::new("A", "/a.mp3"),
            Track::new("B", "/b.mp3"),
            Track::new("C", "/c.mp3"),
        ]
    }

    fn names(sequencer: &PlaylistSequencer) -> Vec<String> {
        sequencer
            .order()
            .iter()
            .map(|&i| sequencer.tracks()[i].name.clone())
            .collect()
    }

    #[test]
    fn sequential_traversal_wraps() {
        let mut sequencer = PlaylistSequencer::new(abc(), false);
        assert_eq!(sequencer.current().unwrap().name, "A");
        assert_eq!(sequencer.peek().unwrap().name, "B");
        assert_eq!(sequencer.next().unwrap().name, "B");
        assert_eq!(sequencer.next().unwrap().name, "C");
        assert_eq!(sequencer.peek().unwrap().name, "A");
        assert_eq!(sequencer.next().unwrap().name, "A");
    }

    #[test]
    fn peek_does_not_move() {
        let sequencer = PlaylistSequencer::new(abc(), false);
        sequencer.peek();
        sequencer.peek();
        assert_eq!(sequencer.current_index(), 0);
    }

    #[test]
    fn scripted_shuffle_is_exact() {
        let random = ScriptedRandom::new(vec![0.5, 0.3]);
        let sequencer = PlaylistSequencer::with_random(abc(), true, Box::new(random));
        assert_eq!(sequencer.order(), &[2, 0, 1]);
        assert_eq!(names(&sequencer), vec!["C", "A", "B"]);
        assert_eq!(sequencer.current().unwrap().name, "C");
    }

    #[test]
    fn shuffle_wrap_draws_new_order() {
        // First permutation uses [0.5, 0.3], the reshuffle uses [0.0, 0.0]
        let random = ScriptedRandom::new(vec![0.5, 0.3, 0.0, 0.0]);
        let mut sequencer = PlaylistSequencer::with_random(abc(), true, Box::new(random));
        assert_eq!(sequencer.order(), &[2, 0, 1]);

        sequencer.next();
        sequencer.next();
        sequencer.next();
        // i=2: swap(2,0) -> [2,1,0]; i=1: swap(1,0) -> [1,2,0]
        assert_eq!(sequencer.order(), &[1, 2, 0]);
        assert_eq!(sequencer.current_index(), 0);
    }

    #[test]
    fn empty_playlist() {
        let mut sequencer = PlaylistSequencer::new(Vec::new(), true);
        assert!(sequencer.is_empty());
        assert!(sequencer.current().is_none());
        assert!(sequencer.peek().is_none());
        assert!(sequencer.next().is_none());
    }

    #[test]
    fn update_resets_position() {
        let mut sequencer = PlaylistSequencer::new(abc(), false);
        sequencer.next();
        sequencer.update(vec![Track::new("Z", "/z.mp3")], false);
        assert_eq!(sequencer.current_index(), 0);
        assert_eq!(sequencer.current().unwrap().name, "Z");
        assert_eq!(sequencer.next().unwrap().name, "Z");
    }

    #[test]
    fn out_of_range_draws_are_clamped() {
        let mut random = ScriptedRandom::new(vec![1.0, f64::NAN, -3.0]);
        let order = shuffled_order(4, &mut random);
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3]);
    }
}
