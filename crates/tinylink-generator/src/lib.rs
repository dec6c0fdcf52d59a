pub mod checked;
pub mod seq;

pub use checked::{CodeGenerator, CodeGeneratorSettings};
pub use seq::SeqGenerator;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tinylink_core::shortcode::{ALPHABET, CODE_LENGTH};
use tinylink_core::ShortCode;

/// Trait for generating short codes.
///
/// Implementations are pure generators that don't interact with storage;
/// [`CodeGenerator`] adds the availability check against a repository.
pub trait Generator: Send + Sync + 'static {
    type Output: Into<ShortCode>;
    /// Draws a candidate short code.
    ///
    /// Candidates are not guaranteed to be unused.
    fn generate(&self) -> Self::Output;
}

enum Source {
    Thread,
    Seeded(Mutex<StdRng>),
}

/// Draws uniformly random codes from `[A-Za-z0-9]`.
pub struct RandomGenerator {
    source: Source,
}

impl RandomGenerator {
    /// Creates a generator backed by the thread-local RNG.
    pub fn new() -> Self {
        Self {
            source: Source::Thread,
        }
    }

    /// Creates a generator with a fixed seed, producing a reproducible sequence.
    pub fn seeded(seed: u64) -> Self {
        Self {
            source: Source::Seeded(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    fn draw<R: Rng + ?Sized>(rng: &mut R) -> ShortCode {
        let code: String = (0..CODE_LENGTH)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect();
        ShortCode::new_unchecked(code)
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RandomGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match self.source {
            Source::Thread => "thread",
            Source::Seeded(_) => "seeded",
        };
        f.debug_struct("RandomGenerator")
            .field("source", &source)
            .finish()
    }
}

impl Generator for RandomGenerator {
    type Output = ShortCode;

    fn generate(&self) -> Self::Output {
        match &self.source {
            Source::Thread => Self::draw(&mut rand::rng()),
            Source::Seeded(rng) => Self::draw(&mut *rng.lock()),
        }
    }
}
