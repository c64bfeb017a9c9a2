// Synthetic query streams for the cache simulation

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Parameters for a synthetic query stream
#[derive(Debug, Clone, Copy)]
pub struct QueryMix {
    /// Number of distinct queries
    pub unique_queries: u32,
    /// Percentage of traffic that goes to popular queries (0-100)
    pub popular_traffic: u8,
    /// Percentage of distinct queries that are popular (0-100)
    pub popular_queries: u8,
}

impl Default for QueryMix {
    fn default() -> Self {
        Self {
            unique_queries: 10_000,
            popular_traffic: 80,
            popular_queries: 20,
        }
    }
}

impl QueryMix {
    fn popular_count(&self) -> u32 {
        let count = self.unique_queries as u64 * self.popular_queries.min(100) as u64 / 100;
        (count as u32).clamp(1, self.unique_queries.max(1))
    }
}

/// Produces query ids with a popular/regular split.
///
/// Popular ids are drawn with a skew toward low ranks, so a handful of
/// commands (`git status`, `ls`) dominate the way they do in a real shell
/// history. Regular ids are uniform over the long tail.
#[derive(Debug)]
pub struct QueryGenerator {
    mix: QueryMix,
    popular: u32,
    rng: StdRng,
}

impl QueryGenerator {
    /// Create a generator seeded for reproducible runs
    pub fn new(mix: QueryMix, seed: u64) -> Self {
        Self {
            popular: mix.popular_count(),
            mix,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Next query id in `0..unique_queries`
    pub fn next_id(&mut self) -> u32 {
        let popular_probability = self.mix.popular_traffic.min(100) as f64 / 100.0;
        let regular = self.mix.unique_queries.saturating_sub(self.popular);

        if regular == 0 || self.rng.gen_bool(popular_probability) {
            // Squaring a uniform sample skews it toward rank 0.
            let u: f64 = self.rng.gen();
            ((u * u * self.popular as f64) as u32).min(self.popular - 1)
        } else {
            self.popular + self.rng.gen_range(0..regular)
        }
    }

    /// Next query rendered as a shell-like prefix
    pub fn next_query(&mut self) -> String {
        let id = self.next_id();
        format!("{} {}", COMMANDS[id as usize % COMMANDS.len()], id)
    }

    /// Number of popular query ids
    pub fn popular(&self) -> u32 {
        self.popular
    }
}

const COMMANDS: [&str; 8] = ["git", "cargo", "docker", "kubectl", "npm", "make", "ls", "ssh"];
