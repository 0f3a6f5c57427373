// Member name assignment
//
// Names are the registry key and the tree value, so they must be unique and
// reproducible. Callers pick a strategy and inject it wherever members are
// created.

use crate::rp_interface::MemberName;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;

const WORDS: [&str; 48] = [
    "amber", "birch", "cobalt", "comfy", "dune", "ember", "fable", "fern", "frost", "gale",
    "harbor", "hazel", "indigo", "ivory", "jade", "juniper", "kelp", "lark", "linen", "maple",
    "meadow", "moss", "nice", "nimbus", "oak", "onyx", "opal", "pebble", "pine", "quartz",
    "quill", "raven", "reed", "rust", "sable", "sage", "slate", "spruce", "thistle", "tide",
    "umber", "value", "velvet", "willow", "wren", "yarrow", "zephyr", "zinc",
];

pub trait NameGenerator {
    fn next_name(&mut self) -> MemberName;
}

/// `node-1`, `node-2`, ...
#[derive(Debug, Clone)]
pub struct SequentialNames {
    prefix: String,
    next: usize,
}

impl SequentialNames {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl Default for SequentialNames {
    fn default() -> Self {
        Self::new("node")
    }
}

impl NameGenerator for SequentialNames {
    fn next_name(&mut self) -> MemberName {
        let name = format!("{}-{}", self.prefix, self.next);
        self.next += 1;
        name
    }
}

/// Random words from a fixed list, seeded for reproducibility. Once the list
/// is exhausted (or a word repeats) a numeric suffix keeps names unique.
pub struct WordNames {
    rng: StdRng,
    issued: HashSet<MemberName>,
}

impl WordNames {
    pub fn new(seed: [u8; 32]) -> Self {
        Self {
            rng: StdRng::from_seed(seed),
            issued: HashSet::new(),
        }
    }
}

impl NameGenerator for WordNames {
    fn next_name(&mut self) -> MemberName {
        let word = WORDS.choose(&mut self.rng).copied().unwrap_or("node");
        let mut name = word.to_string();
        let mut suffix = 2;
        while self.issued.contains(&name) {
            name = format!("{}-{}", word, suffix);
            suffix += 1;
        }
        self.issued.insert(name.clone());
        name
    }
}

/// Stable name derived from caller-supplied identity bytes (e.g. the names of
/// the columns a member owns). Same identity, same name, on every run.
pub fn derive_name(identity: &[u8]) -> MemberName {
    let hash = blake3::hash(identity);
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash.as_bytes()[..8]);
    let value = u64::from_le_bytes(head);

    let word = WORDS[(value % WORDS.len() as u64) as usize];
    format!("{}-{:03}", word, (value >> 32) % 1000)
}
