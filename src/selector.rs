//! Round candidate sampling
//!
//! Uniform sampling without replacement from the part of the pool that has
//! not been shown yet in the session.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;

use crate::catalog::{Candidate, CandidateId};
use crate::constants::SONGS_PER_ROUND;
use crate::error::SessionError;

/// Picks each round's candidates
pub struct RoundSelector {
    rng: StdRng,
    round_size: usize,
}

impl RoundSelector {
    /// Selector seeded from OS entropy
    pub fn new(round_size: usize) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            round_size,
        }
    }

    /// Deterministic selector for a fixed seed
    pub fn seeded(round_size: usize, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            round_size,
        }
    }

    pub fn round_size(&self) -> usize {
        self.round_size
    }

    /// Shuffle the not-yet-excluded part of `pool` and take the first
    /// `round_size` entries, never the same id twice.
    ///
    /// Returns fewer entries only when fewer remain eligible.
    pub fn select_round(
        &mut self,
        excluded: &HashSet<CandidateId>,
        pool: &[Candidate],
    ) -> Vec<Candidate> {
        let mut seen: HashSet<&CandidateId> = HashSet::new();
        let mut available: Vec<&Candidate> = pool
            .iter()
            .filter(|candidate| !excluded.contains(&candidate.id))
            // A repeated id counts once
            .filter(|candidate| seen.insert(&candidate.id))
            .collect();

        // Fisher-Yates
        available.shuffle(&mut self.rng);

        available
            .into_iter()
            .take(self.round_size)
            .cloned()
            .collect()
    }

    /// Like [`select_round`](Self::select_round) but a short result is an error
    pub fn build_round(
        &mut self,
        excluded: &HashSet<CandidateId>,
        pool: &[Candidate],
    ) -> Result<Vec<Candidate>, SessionError> {
        let candidates = self.select_round(excluded, pool);
        if candidates.len() < self.round_size {
            return Err(SessionError::InsufficientCandidates {
                needed: self.round_size,
                available: candidates.len(),
            });
        }
        Ok(candidates)
    }
}

impl Default for RoundSelector {
    fn default() -> Self {
        Self::new(SONGS_PER_ROUND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pool(size: usize) -> Vec<Candidate> {
        (0..size)
            .map(|i| Candidate::new(format!("song-{i}"), format!("Title {i}"), "Artist", 2000))
            .collect()
    }

    fn ids(candidates: &[Candidate]) -> HashSet<CandidateId> {
        candidates.iter().map(|c| c.id.clone()).collect()
    }

    #[test]
    fn test_four_hundred_pool_gives_five_unique() {
        let pool = pool(400);
        let mut selector = RoundSelector::seeded(5, 7);

        let round = selector.select_round(&HashSet::new(), &pool);
        assert_eq!(round.len(), 5);
        assert_eq!(ids(&round).len(), 5);
    }

    #[test]
    fn test_repeated_pool_ids_never_share_a_round() {
        let mut pool = pool(5);
        pool.push(Candidate::new("song-0", "Again", "Artist", 2001));

        for seed in 0..200 {
            let mut selector = RoundSelector::seeded(5, seed);
            let round = selector.build_round(&HashSet::new(), &pool).unwrap();
            assert_eq!(ids(&round).len(), 5, "seed {seed}");
        }

        let mut selector = RoundSelector::seeded(5, 3);
        let short = pool[..4].iter().cloned().chain([pool[5].clone()]).collect::<Vec<_>>();
        assert_eq!(
            selector.build_round(&HashSet::new(), &short),
            Err(SessionError::InsufficientCandidates {
                needed: 5,
                available: 4
            })
        );
    }

    #[test]
    fn test_seed_is_deterministic() {
        let pool = pool(50);
        let a = RoundSelector::seeded(5, 42).select_round(&HashSet::new(), &pool);
        let b = RoundSelector::seeded(5, 42).select_round(&HashSet::new(), &pool);
        assert_eq!(a, b);
    }

    #[test]
    fn test_short_pool_is_insufficient() {
        let pool = pool(8);
        let excluded: HashSet<CandidateId> = pool[..5].iter().map(|c| c.id.clone()).collect();
        let mut selector = RoundSelector::seeded(5, 1);

        assert_eq!(selector.select_round(&excluded, &pool).len(), 3);
        assert_eq!(
            selector.build_round(&excluded, &pool),
            Err(SessionError::InsufficientCandidates {
                needed: 5,
                available: 3
            })
        );
    }

    #[test]
    fn test_exact_fit_takes_everything_left() {
        let pool = pool(10);
        let excluded: HashSet<CandidateId> = pool[..5].iter().map(|c| c.id.clone()).collect();
        let round = RoundSelector::seeded(5, 3)
            .build_round(&excluded, &pool)
            .unwrap();
        assert_eq!(ids(&round), ids(&pool[5..]));
    }

    #[test]
    fn test_every_candidate_reachable_in_first_slot() {
        let pool = pool(6);
        let mut selector = RoundSelector::seeded(5, 99);
        let mut firsts = HashSet::new();
        for _ in 0..500 {
            firsts.insert(selector.select_round(&HashSet::new(), &pool)[0].id.clone());
        }
        assert_eq!(firsts.len(), 6);
    }

    proptest! {
        #[test]
        fn prop_round_is_distinct_and_disjoint(
            size in 5usize..120,
            excluded_mask in proptest::collection::vec(any::<bool>(), 120),
            seed in any::<u64>(),
        ) {
            let pool = pool(size);
            let excluded: HashSet<CandidateId> = pool
                .iter()
                .zip(excluded_mask.iter())
                .filter(|(_, &skip)| skip)
                .map(|(c, _)| c.id.clone())
                .collect();
            let eligible = size - excluded.len();

            let round = RoundSelector::seeded(5, seed).select_round(&excluded, &pool);

            prop_assert_eq!(round.len(), eligible.min(5));
            prop_assert_eq!(ids(&round).len(), round.len());
            prop_assert!(round.iter().all(|c| !excluded.contains(&c.id)));
        }

        #[test]
        fn prop_chained_rounds_never_repeat(seed in any::<u64>()) {
            let pool = pool(100);
            let mut selector = RoundSelector::seeded(5, seed);
            let mut excluded = HashSet::new();
            for _ in 0..20 {
                let round = selector.build_round(&excluded, &pool).unwrap();
                for candidate in round {
                    prop_assert!(excluded.insert(candidate.id));
                }
            }
            prop_assert_eq!(excluded.len(), 100);
        }
    }
}
