//! # Value Providers
//!
//! A provider is a named extension attached to a [`Generator`] that adds its
//! own formatter names on top of the built-ins. Providers are looked up by
//! identifier in a [`ProviderRegistry`]; every constructor's product is
//! checked against the provider contract when it is registered, so a broken
//! provider is rejected before any row is touched.
//!
//! ```toml
//! [groups.sales.sales_order.columns.increment_id]
//! formatter = "orderIncrementId"
//! provider = "magento"
//! ```
//!
//! [`Generator`]: crate::generate::generator::Generator

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::Rng;

use crate::error::{AnonKitError, Result};
use crate::generate::builtin::{fill_pattern, normalize_formatter_name, Args, FormatterRegistry};
use crate::generate::locale::Locale;
use crate::generate::value::Value;
use crate::generate::FormatterError;

/// The capability every provider implements.
pub trait ValueProvider: Send {
    /// Identifier the provider is registered under.
    fn name(&self) -> &str;

    /// Formatter names this provider answers to (canonical spelling).
    fn formatters(&self) -> &[&'static str];

    /// Produce a value for `method`, which is always one of
    /// [`formatters`](Self::formatters).
    fn format(
        &mut self,
        method: &str,
        args: &Args<'_>,
        ctx: &mut ProviderContext<'_>,
    ) -> std::result::Result<Value, FormatterError>;
}

/// The generator state a provider may draw on while formatting.
pub struct ProviderContext<'a> {
    pub rng: &'a mut StdRng,
    pub builtins: &'a FormatterRegistry,
}

impl ProviderContext<'_> {
    /// Call a built-in formatter with the generator's RNG.
    pub fn builtin(&mut self, name: &str, args: &[Value]) -> std::result::Result<Value, FormatterError> {
        self.builtins.call(name, self.rng, args)
    }
}

/// The canonical name under which `provider` answers to `requested`, if any.
pub fn provided_name(provider: &dyn ValueProvider, requested: &str) -> Option<&'static str> {
    if let Some(exact) = provider.formatters().iter().find(|f| **f == requested) {
        return Some(exact);
    }
    let wanted = normalize_formatter_name(requested);
    provider
        .formatters()
        .iter()
        .copied()
        .find(|f| normalize_formatter_name(f) == wanted)
}

pub type ProviderConstructor = Arc<dyn Fn(Locale) -> Box<dyn ValueProvider> + Send + Sync>;

/// Provider identifier → constructor.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    constructors: IndexMap<String, ProviderConstructor>,
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry with the providers shipped in this crate.
    pub fn with_defaults() -> Result<Self> {
        let mut registry = Self::empty();
        registry.register("magento", |_locale| Box::new(MagentoProvider::new()))?;
        Ok(registry)
    }

    /// Register `constructor` under `id` after checking that what it builds
    /// satisfies the provider contract.
    pub fn register<F>(&mut self, id: impl Into<String>, constructor: F) -> Result<()>
    where
        F: Fn(Locale) -> Box<dyn ValueProvider> + Send + Sync + 'static,
    {
        let id = id.into();
        let instance = constructor(Locale::default());
        check_contract(&id, instance.as_ref())?;
        self.constructors.insert(id, Arc::new(constructor));
        Ok(())
    }

    /// Build a fresh provider instance for one generator.
    pub fn instantiate(&self, id: &str, locale: Locale) -> Result<Box<dyn ValueProvider>> {
        let constructor = self
            .constructors
            .get(id)
            .ok_or_else(|| AnonKitError::UnknownProvider {
                provider: id.to_string(),
                available: if self.constructors.is_empty() {
                    "(none)".to_string()
                } else {
                    self.ids().join(", ")
                },
            })?;
        let provider = constructor(locale);
        check_contract(id, provider.as_ref())?;
        Ok(provider)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.constructors.contains_key(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.constructors.keys().map(|k| k.as_str()).collect()
    }

    /// Formatter names of every registered provider, keyed by provider id.
    pub fn formatters(&self) -> Vec<(&str, Vec<&'static str>)> {
        self.constructors
            .iter()
            .map(|(id, ctor)| (id.as_str(), ctor(Locale::default()).formatters().to_vec()))
            .collect()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.ids())
            .finish()
    }
}

fn check_contract(id: &str, provider: &dyn ValueProvider) -> Result<()> {
    let violation = |message: String| AnonKitError::ProviderContract {
        provider: id.to_string(),
        message,
    };

    if id.trim().is_empty() {
        return Err(violation("provider identifier is empty".to_string()));
    }
    if provider.name() != id {
        return Err(violation(format!(
            "constructor built a provider named '{}'",
            provider.name()
        )));
    }
    if provider.formatters().is_empty() {
        return Err(violation("provider exposes no formatters".to_string()));
    }
    let mut seen = HashSet::new();
    for name in provider.formatters() {
        if name.trim().is_empty() {
            return Err(violation("provider exposes an empty formatter name".to_string()));
        }
        if !seen.insert(normalize_formatter_name(name)) {
            return Err(violation(format!("formatter '{}' is declared twice", name)));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Built-in provider: Magento store data
// ---------------------------------------------------------------------------

const CUSTOMER_GROUPS: &[&str] = &["NOT LOGGED IN", "General", "Wholesale", "Retailer"];
const SIZES: &[&str] = &["XS", "S", "M", "L", "XL"];
const COLORS: &[&str] = &["Black", "Blue", "Gray", "Green", "Orange", "Purple", "Red", "White", "Yellow"];

/// Store-oriented formatters for Magento-style schemas.
#[derive(Debug)]
pub struct MagentoProvider {
    next_increment: u64,
}

impl MagentoProvider {
    pub fn new() -> Self {
        Self { next_increment: 1 }
    }
}

impl Default for MagentoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueProvider for MagentoProvider {
    fn name(&self) -> &str {
        "magento"
    }

    fn formatters(&self) -> &[&'static str] {
        &["sku", "orderIncrementId", "customerGroup", "gender", "street", "taxvat"]
    }

    fn format(
        &mut self,
        method: &str,
        args: &Args<'_>,
        ctx: &mut ProviderContext<'_>,
    ) -> std::result::Result<Value, FormatterError> {
        match method {
            "sku" => {
                let base = fill_pattern("??##", ctx.rng).to_uppercase();
                let size = SIZES[ctx.rng.random_range(0..SIZES.len())];
                let color = COLORS[ctx.rng.random_range(0..COLORS.len())];
                Ok(Value::owned(format!("{}-{}-{}", base, size, color)))
            }
            // Sequential per generator, so values never repeat within a run.
            "orderIncrementId" => {
                let prefix = args.str_or(0, "")?;
                let width = args.count_or(1, 9)?;
                let id = self.next_increment;
                self.next_increment += 1;
                Ok(Value::owned(format!("{}{:0width$}", prefix, id, width = width)))
            }
            "customerGroup" => Ok(Value::borrowed(
                CUSTOMER_GROUPS[ctx.rng.random_range(0..CUSTOMER_GROUPS.len())],
            )),
            // 1 = male, 2 = female, 3 = not specified
            "gender" => Ok(Value::Int(ctx.rng.random_range(1..=3))),
            // Magento keeps multi-line streets in one column, newline separated.
            "street" => {
                let lines = args.count_or(0, 2)?;
                if lines == 0 {
                    return Err(args.invalid("a street needs at least one line"));
                }
                let mut parts = Vec::with_capacity(lines);
                parts.push(ctx.builtin("streetAddress", &[])?.to_string());
                for _ in 1..lines {
                    parts.push(ctx.builtin("secondaryAddress", &[])?.to_string());
                }
                Ok(Value::owned(parts.join("\n")))
            }
            "taxvat" => Ok(Value::owned(fill_pattern("#########", ctx.rng))),
            other => Err(FormatterError::UnknownFormatter(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    struct Nameless;

    impl ValueProvider for Nameless {
        fn name(&self) -> &str {
            "other"
        }
        fn formatters(&self) -> &[&'static str] {
            &["thing"]
        }
        fn format(
            &mut self,
            _method: &str,
            _args: &Args<'_>,
            _ctx: &mut ProviderContext<'_>,
        ) -> std::result::Result<Value, FormatterError> {
            Ok(Value::Null)
        }
    }

    struct NoFormatters;

    impl ValueProvider for NoFormatters {
        fn name(&self) -> &str {
            "empty"
        }
        fn formatters(&self) -> &[&'static str] {
            &[]
        }
        fn format(
            &mut self,
            _method: &str,
            _args: &Args<'_>,
            _ctx: &mut ProviderContext<'_>,
        ) -> std::result::Result<Value, FormatterError> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn test_defaults_include_magento() {
        let registry = ProviderRegistry::with_defaults().unwrap();
        assert_eq!(registry.ids(), vec!["magento"]);
        assert!(registry.instantiate("magento", Locale::EnUs).is_ok());
    }

    #[test]
    fn test_register_rejects_mismatched_name() {
        let mut registry = ProviderRegistry::empty();
        let err = registry
            .register("mine", |_| Box::new(Nameless))
            .unwrap_err();
        assert!(matches!(err, AnonKitError::ProviderContract { .. }));
        assert!(!registry.contains("mine"));
    }

    #[test]
    fn test_register_rejects_provider_without_formatters() {
        let mut registry = ProviderRegistry::empty();
        let err = registry
            .register("empty", |_| Box::new(NoFormatters))
            .unwrap_err();
        assert!(err.to_string().contains("no formatters"));
    }

    #[test]
    fn test_unknown_provider_lists_registered() {
        let registry = ProviderRegistry::with_defaults().unwrap();
        match registry.instantiate("acme", Locale::EnUs) {
            Err(AnonKitError::UnknownProvider { provider, available }) => {
                assert_eq!(provider, "acme");
                assert_eq!(available, "magento");
            }
            other => panic!("expected UnknownProvider, got {:?}", other.map(|p| p.name().to_string())),
        }
    }

    #[test]
    fn test_provided_name_is_forgiving() {
        let provider = MagentoProvider::new();
        assert_eq!(provided_name(&provider, "order_increment_id"), Some("orderIncrementId"));
        assert_eq!(provided_name(&provider, "firstName"), None);
    }

    #[test]
    fn test_magento_formatters() {
        let builtins = FormatterRegistry::new(Locale::EnUs);
        let mut rng = StdRng::seed_from_u64(1);
        let mut provider = MagentoProvider::new();
        let mut ctx = ProviderContext {
            rng: &mut rng,
            builtins: &builtins,
        };

        let first = provider
            .format("orderIncrementId", &Args::new("orderIncrementId", &[]), &mut ctx)
            .unwrap();
        let second = provider
            .format("orderIncrementId", &Args::new("orderIncrementId", &[]), &mut ctx)
            .unwrap();
        assert_eq!(first, Value::from("000000001"));
        assert_eq!(second, Value::from("000000002"));

        let street = provider
            .format("street", &Args::new("street", &[Value::Int(3)]), &mut ctx)
            .unwrap();
        assert_eq!(street.as_str().unwrap().lines().count(), 3);

        let group = provider
            .format("customerGroup", &Args::new("customerGroup", &[]), &mut ctx)
            .unwrap();
        assert!(CUSTOMER_GROUPS.contains(&group.as_str().unwrap()));
    }

    #[test]
    fn test_magento_rejects_oversized_counts() {
        let builtins = FormatterRegistry::new(Locale::EnUs);
        let mut rng = StdRng::seed_from_u64(1);
        let mut provider = MagentoProvider::new();
        let mut ctx = ProviderContext {
            rng: &mut rng,
            builtins: &builtins,
        };

        let huge = [Value::from(""), Value::Int(i64::MAX)];
        let err = provider
            .format("orderIncrementId", &Args::new("orderIncrementId", &huge), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, FormatterError::InvalidArguments { .. }));

        let err = provider
            .format("street", &Args::new("street", &[Value::Int(i64::MAX)]), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, FormatterError::InvalidArguments { .. }));
    }
}
