use rand::Rng;
use std::collections::HashSet;

/// Curated secret-word pool with category tags.
const BUILTIN_WORDS: &[(&str, &str)] = &[
    ("pizza", "food"),
    ("sushi", "food"),
    ("croissant", "food"),
    ("pancake", "food"),
    ("dumpling", "food"),
    ("avocado", "food"),
    ("espresso", "food"),
    ("penguin", "animal"),
    ("octopus", "animal"),
    ("giraffe", "animal"),
    ("hedgehog", "animal"),
    ("flamingo", "animal"),
    ("chameleon", "animal"),
    ("guitar", "music"),
    ("saxophone", "music"),
    ("violin", "music"),
    ("karaoke", "music"),
    ("orchestra", "music"),
    ("lighthouse", "place"),
    ("library", "place"),
    ("aquarium", "place"),
    ("rooftop", "place"),
    ("campsite", "place"),
    ("subway", "place"),
    ("umbrella", "object"),
    ("telescope", "object"),
    ("skateboard", "object"),
    ("hammock", "object"),
    ("typewriter", "object"),
    ("compass", "object"),
    ("snowstorm", "weather"),
    ("rainbow", "weather"),
    ("heatwave", "weather"),
    ("astronaut", "job"),
    ("firefighter", "job"),
    ("magician", "job"),
    ("lifeguard", "job"),
    ("beekeeper", "job"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct WordEntry {
    pub word: String,
    pub category: String,
}

/// Static pool of secret words. Selection never blocks a round start: if
/// the exclusion set covers the whole pool, the exclusion is dropped.
#[derive(Debug, Clone)]
pub struct WordBank {
    entries: Vec<WordEntry>,
}

impl Default for WordBank {
    fn default() -> Self {
        Self {
            entries: BUILTIN_WORDS
                .iter()
                .map(|(w, c)| WordEntry {
                    word: (*w).to_string(),
                    category: (*c).to_string(),
                })
                .collect(),
        }
    }
}

impl WordBank {
    /// Build a bank from explicit (word, category) pairs. Used by tests.
    pub fn with_entries(pairs: &[(&str, &str)]) -> Self {
        Self {
            entries: pairs
                .iter()
                .map(|(w, c)| WordEntry {
                    word: (*w).to_string(),
                    category: (*c).to_string(),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pick a word not in `exclude`, falling open to the whole pool when
    /// the exclusion exhausts it.
    pub fn pick<R: Rng>(&self, exclude: &HashSet<String>, rng: &mut R) -> WordEntry {
        let candidates: Vec<&WordEntry> = self
            .entries
            .iter()
            .filter(|e| !exclude.contains(&e.word))
            .collect();

        let pool: Vec<&WordEntry> = if candidates.is_empty() {
            // Exclusion set exhausted the pool; clear it and proceed.
            self.entries.iter().collect()
        } else {
            candidates
        };

        pool[rng.random_range(0..pool.len())].clone()
    }
}
