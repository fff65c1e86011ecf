use std::sync::Arc;

use rand::rngs::StdRng;
use rand::Rng;

use crate::generate::builtin::{normalize_formatter_name, Args, FormatterRegistry};
use crate::generate::locale::Locale;
use crate::generate::provider::{provided_name, ProviderContext, ValueProvider};
use crate::generate::unique::UniqueTracker;
use crate::generate::value::Value;
use crate::generate::FormatterError;

/// Probability that an `optional` call produces a value rather than NULL.
pub const DEFAULT_OPTIONAL_WEIGHT: f64 = 0.5;

/// How a formatter call is wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Modifier {
    #[default]
    None,
    /// Never return a value this generator already returned for the method.
    Unique,
    /// Return NULL instead of calling the formatter some of the time.
    Optional,
}

/// A locale-bound value generator with its own RNG, attached providers and
/// uniqueness memory.
pub struct Generator {
    rng: StdRng,
    builtins: Arc<FormatterRegistry>,
    providers: Vec<Box<dyn ValueProvider>>,
    unique: UniqueTracker,
    optional_weight: f64,
}

impl Generator {
    pub fn new(builtins: Arc<FormatterRegistry>, rng: StdRng) -> Self {
        Self {
            rng,
            builtins,
            providers: Vec::new(),
            unique: UniqueTracker::new(),
            optional_weight: DEFAULT_OPTIONAL_WEIGHT,
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.unique.max_retries = max_retries;
        self
    }

    pub fn locale(&self) -> Locale {
        self.builtins.locale()
    }

    /// Attach a provider. The most recently added provider is consulted
    /// first, and all providers take precedence over the built-ins.
    pub fn add_provider(&mut self, provider: Box<dyn ValueProvider>) {
        self.providers.insert(0, provider);
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn has_formatter(&self, name: &str) -> bool {
        self.providers
            .iter()
            .any(|p| provided_name(p.as_ref(), name).is_some())
            || self.builtins.contains(name)
    }

    /// Distinct values emitted so far by `unique` calls to `name`.
    pub fn unique_count(&self, name: &str) -> usize {
        self.unique.count(&normalize_formatter_name(name))
    }

    /// Invoke formatter `name` with positional `args` under `modifier`.
    pub fn call(
        &mut self,
        name: &str,
        args: &[Value],
        modifier: Modifier,
    ) -> Result<Value, FormatterError> {
        match modifier {
            Modifier::None => self.invoke(name, args),
            Modifier::Optional => {
                if self.rng.random_bool(self.optional_weight) {
                    self.invoke(name, args)
                } else {
                    Ok(Value::Null)
                }
            }
            Modifier::Unique => {
                let key = normalize_formatter_name(name);
                for _ in 0..self.unique.max_retries {
                    let value = self.invoke(name, args)?;
                    if self.unique.try_insert(&key, &value) {
                        return Ok(value);
                    }
                }
                Err(FormatterError::UniqueExhausted {
                    formatter: name.to_string(),
                    max_retries: self.unique.max_retries,
                })
            }
        }
    }

    fn invoke(&mut self, name: &str, args: &[Value]) -> Result<Value, FormatterError> {
        for provider in self.providers.iter_mut() {
            if let Some(method) = provided_name(provider.as_ref(), name) {
                let mut ctx = ProviderContext {
                    rng: &mut self.rng,
                    builtins: &self.builtins,
                };
                return provider.format(method, &Args::new(name, args), &mut ctx);
            }
        }
        self.builtins.call(name, &mut self.rng, args)
    }
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("locale", &self.locale())
            .field("providers", &self.provider_names())
            .field("unique", &self.unique)
            .finish()
    }
}
