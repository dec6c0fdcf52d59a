use crate::Generator;
use tinylink_core::{ReadRepository, Result, ShortCode, StorageError};
use tracing::{trace, warn};
use typed_builder::TypedBuilder;

/// Limits applied while looking for an unused code.
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct CodeGeneratorSettings {
    /// Candidates drawn before giving up on finding a free code.
    #[builder(default = 64)]
    pub max_attempts: usize,
    /// Consecutive availability probe failures tolerated before the last
    /// failure is returned.
    #[builder(default = 3)]
    pub max_probe_failures: usize,
}

impl Default for CodeGeneratorSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Draws candidate codes and checks them against a repository.
///
/// A failed probe is never taken to mean the code is free. The candidate is
/// discarded and a new one drawn, until `max_probe_failures` probes in a row
/// have failed.
#[derive(Debug)]
pub struct CodeGenerator<G> {
    generator: G,
    settings: CodeGeneratorSettings,
}

impl<G: Generator> CodeGenerator<G> {
    pub fn new(generator: G, settings: CodeGeneratorSettings) -> Self {
        Self {
            generator,
            settings,
        }
    }

    pub fn settings(&self) -> &CodeGeneratorSettings {
        &self.settings
    }

    /// Draws a candidate without checking the repository.
    pub fn draw(&self) -> ShortCode {
        self.generator.generate().into()
    }

    /// Returns a code that `repository` reports as unused.
    ///
    /// The check and the later insert are not atomic: callers must still
    /// handle a code conflict on insert.
    pub async fn next_available<R>(&self, repository: &R) -> Result<ShortCode>
    where
        R: ReadRepository + ?Sized,
    {
        let mut probe_failures = 0;

        for _ in 0..self.settings.max_attempts {
            let candidate = self.draw();

            match repository.exists(&candidate).await {
                Ok(false) => return Ok(candidate),
                Ok(true) => {
                    trace!(code = %candidate, "candidate code already taken");
                    probe_failures = 0;
                }
                Err(err) => {
                    probe_failures += 1;
                    warn!(
                        code = %candidate,
                        error = %err,
                        probe_failures,
                        "availability probe failed"
                    );
                    if probe_failures >= self.settings.max_probe_failures {
                        return Err(match err {
                            StorageError::Timeout(message) => StorageError::Timeout(message),
                            other => StorageError::Unavailable(other.to_string()),
                        });
                    }
                }
            }
        }

        Err(StorageError::CodeExhausted {
            attempts: self.settings.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SeqGenerator;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tinylink_core::{ErrorKind, OwnerId, ShortLink};

    /// Reports a fixed set of codes as taken and fails the first
    /// `failures` probes.
    struct Probe {
        taken: HashSet<String>,
        failures: AtomicUsize,
    }

    impl Probe {
        fn new(taken: &[&str], failures: usize) -> Self {
            Self {
                taken: taken.iter().map(|s| s.to_string()).collect(),
                failures: AtomicUsize::new(failures),
            }
        }
    }

    #[async_trait]
    impl ReadRepository for Probe {
        async fn get(&self, _code: &ShortCode) -> Result<Option<ShortLink>> {
            Ok(None)
        }

        async fn exists(&self, code: &ShortCode) -> Result<bool> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(StorageError::Unavailable("connection refused".into()));
            }
            Ok(self.taken.contains(code.as_str()))
        }

        async fn list_by_owner(&self, _owner_id: OwnerId) -> Result<Vec<ShortLink>> {
            Ok(Vec::new())
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    fn seq(prefix: &str) -> SeqGenerator {
        SeqGenerator::with_prefix(prefix).unwrap()
    }

    #[tokio::test]
    async fn returns_first_free_candidate() {
        let generator = CodeGenerator::new(seq("wh"), CodeGeneratorSettings::default());
        let probe = Probe::new(&["wh000000", "wh000001"], 0);

        let code = generator.next_available(&probe).await.unwrap();
        assert_eq!(code.as_str(), "wh000002");
    }

    #[tokio::test]
    async fn transient_probe_failure_is_retried_with_new_candidate() {
        let generator = CodeGenerator::new(seq("wh"), CodeGeneratorSettings::default());
        let probe = Probe::new(&[], 2);

        let code = generator.next_available(&probe).await.unwrap();
        // The two candidates drawn while probing failed are discarded.
        assert_eq!(code.as_str(), "wh000002");
    }

    #[tokio::test]
    async fn persistent_probe_failure_surfaces() {
        let generator = CodeGenerator::new(seq("wh"), CodeGeneratorSettings::default());
        let probe = Probe::new(&[], usize::MAX);

        let err = generator.next_available(&probe).await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    }

    #[tokio::test]
    async fn saturated_generator_gives_up() {
        let settings = CodeGeneratorSettings::builder().max_attempts(5).build();
        // Width of 1 digit wraps after ten codes; all of them are taken.
        let generator = CodeGenerator::new(seq("abcdefg"), settings);
        let taken: Vec<String> = (0..10).map(|i| format!("abcdefg{i}")).collect();
        let taken: Vec<&str> = taken.iter().map(String::as_str).collect();
        let probe = Probe::new(&taken, 0);

        let err = generator.next_available(&probe).await.unwrap_err();
        assert!(matches!(err, StorageError::CodeExhausted { attempts: 5 }));
    }
}
