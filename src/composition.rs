/*
 * @file composition.rs
 *
 * Lazy enumerator of the compositions of k into s positive parts, in an
 * order whose successor differs by relocating exactly one unit.  The
 * t-value engine leans on this: each transition maps to a single
 * replace_row call on the progressive reducer.
 */

/** A transition between successive compositions: one unit moves from
 * the top of `from.0` (which held `from.1` units) to the top of `to.0`
 * (which now holds `to.1` units).  Parts and units are 1-based.
 */
pub type UnitMove = ((usize, usize), (usize, usize));

/** Enumerates compositions of k into s positive parts.
 *
 * The enumeration starts at (k-s+1, 1, ..., 1) and visits each of the
 * C(k-1, s-1) compositions exactly once.  Parts sweep boustrophedon:
 * each level either drains its leading part one unit at a time into the
 * tail, or grows it back, and the donated unit always lands on the
 * tail's unique bump so that the tail enumeration can restart from a
 * valid corner.
 */
pub struct CompositionMaker {
    parts: Vec<usize>,
    /** Per-level sweep direction: true when the leading part is growing. */
    ascending: Vec<bool>,
    last_move: UnitMove,
}

impl CompositionMaker {
    /** Start at the composition (k-s+1, 1, ..., 1). */
    pub fn new(k: usize, s: usize) -> Self {
        assert!(s >= 1 && k >= s, "need k >= s >= 1 positive parts");
        let mut parts = vec![1; s];
        parts[0] = k - s + 1;
        CompositionMaker {
            parts,
            ascending: vec![false; s],
            last_move: ((0, 0), (0, 0)),
        }
    }

    /** The current composition. */
    pub fn current(&self) -> &[usize] {
        &self.parts
    }

    /** Step to the next composition; false once exhausted. */
    pub fn advance(&mut self) -> bool {
        match self.advance_level(0) {
            Some(mv) => {
                self.last_move = mv;
                true
            }
            None => false,
        }
    }

    /** The single-unit move between the previous and current
     * composition.  Only valid after a successful `advance`.
     */
    pub fn delta(&self) -> UnitMove {
        self.last_move
    }

    /** Advance the enumeration of parts level.. ; None once that
     * sub-enumeration is exhausted.
     */
    fn advance_level(&mut self, level: usize) -> Option<UnitMove> {
        let s = self.parts.len();
        if level + 1 >= s {
            return None;
        }
        if let Some(mv) = self.advance_level(level + 1) {
            return Some(mv);
        }
        // The tail is exhausted and rests on its final bump; move the
        // leading part one step and restart the tail from there.
        let mv = if !self.ascending[level] {
            if self.parts[level] == 1 {
                return None;
            }
            let j = self.bump_position(level + 1);
            self.parts[level] -= 1;
            self.parts[j] += 1;
            ((level + 1, self.parts[level] + 1), (j + 1, self.parts[j]))
        } else {
            let tail_sum: usize = self.parts[level + 1..].iter().sum();
            let max_lead = self.parts[level] + tail_sum - (s - level - 1);
            if self.parts[level] == max_lead {
                return None;
            }
            let j = self.bump_position(level + 1);
            debug_assert!(self.parts[j] >= 2);
            self.parts[j] -= 1;
            self.parts[level] += 1;
            ((j + 1, self.parts[j] + 1), (level + 1, self.parts[level]))
        };
        self.reinit_tail(level + 1);
        Some(mv)
    }

    /** Index of the first maximal part in levels `from..` (the tail's
     * bump; the first part when the tail is flat).
     */
    fn bump_position(&self, from: usize) -> usize {
        let mut best = from;
        for j in from + 1..self.parts.len() {
            if self.parts[j] > self.parts[best] {
                best = j;
            }
        }
        best
    }

    /** Reset sweep directions for a tail that sits on a bump: a level
     * holding its maximum drains (descending); a level at 1 with units
     * further out grows (ascending).
     */
    fn reinit_tail(&mut self, from: usize) {
        let s = self.parts.len();
        for level in from..s {
            let tail_sum: usize = self.parts[level..].iter().sum();
            let max_lead = tail_sum - (s - level - 1);
            self.ascending[level] = self.parts[level] != max_lead;
        }
    }
}

/** Binomial coefficient, as u128 to keep counts exact in tests. */
pub fn binomial(n: usize, k: usize) -> u128 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = acc * (n - i) as u128 / (i + 1) as u128;
    }
    acc
}
