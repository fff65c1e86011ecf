use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::SeedableRng;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::ColumnSpec;
use crate::error::Result;
use crate::generate::builtin::FormatterRegistry;
use crate::generate::generator::Generator;
use crate::generate::locale::Locale;
use crate::generate::provider::ProviderRegistry;

/// Shared handle to a cached generator. Callers lock it for the duration of
/// one formatter call; uniqueness state lives inside.
pub type GeneratorHandle = Arc<Mutex<Generator>>;

/// Run-wide memo of generators keyed by column specification.
///
/// Two columns with identical specs (formatter, arguments, provider and
/// modifiers) share one generator, which is what makes `unique` hold for
/// the whole run. Entries are never evicted; the key space is bounded by
/// the number of distinct column specs in the configuration.
pub struct GeneratorCache {
    locale: Locale,
    seed: Option<u64>,
    providers: Arc<ProviderRegistry>,
    builtins: Option<Arc<FormatterRegistry>>,
    entries: HashMap<String, GeneratorHandle>,
}

impl GeneratorCache {
    pub fn new(locale: Locale, seed: Option<u64>, providers: Arc<ProviderRegistry>) -> Self {
        Self {
            locale,
            seed,
            providers,
            builtins: None,
            entries: HashMap::new(),
        }
    }

    /// Return the generator for `spec`, building it on first use.
    ///
    /// Fails only when the spec names a provider that is not registered or
    /// does not satisfy the provider contract.
    pub fn get(&mut self, spec: &ColumnSpec) -> Result<GeneratorHandle> {
        let key = cache_key(spec);
        if let Some(handle) = self.entries.get(&key) {
            return Ok(Arc::clone(handle));
        }

        let locale = self.locale;
        let builtins = Arc::clone(
            self.builtins
                .get_or_insert_with(|| Arc::new(FormatterRegistry::new(locale))),
        );
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ key_bits(&key)),
            None => StdRng::from_os_rng(),
        };

        let mut generator = Generator::new(builtins, rng);
        if let Some(provider_id) = spec.provider.as_deref() {
            generator.add_provider(self.providers.instantiate(provider_id, locale)?);
        }
        debug!(
            "Built generator {} (locale {}, providers {:?})",
            &key[..12],
            locale,
            generator.provider_names()
        );

        let handle = Arc::new(Mutex::new(generator));
        self.entries.insert(key, Arc::clone(&handle));
        Ok(handle)
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Stable key for a column spec plus provider identity: the SHA-256 of the
/// spec's JSON form.
pub fn cache_key(spec: &ColumnSpec) -> String {
    let body = serde_json::to_string(spec).unwrap_or_else(|_| format!("{:?}", spec));
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    hasher.update(b"|");
    hasher.update(spec.provider.as_deref().unwrap_or("").as_bytes());
    format!("{:x}", hasher.finalize())
}

/// First 64 bits of a hex cache key, used to derive per-generator seeds.
fn key_bits(key: &str) -> u64 {
    key.get(..16)
        .and_then(|prefix| u64::from_str_radix(prefix, 16).ok())
        .unwrap_or(0)
}
