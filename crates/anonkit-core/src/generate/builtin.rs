//! # Built-in Formatters
//!
//! The name → handler registry behind every `formatter = "..."` entry in the
//! configuration. Handlers are built once per locale when the first
//! generator is constructed and shared by every generator afterwards.
//!
//! Names follow the camelCase convention familiar from Faker-style configs
//! (`firstName`, `safeEmail`, `numberBetween`). Lookups are forgiving about
//! case, underscores and dashes, so `first_name` and `FIRSTNAME` resolve to
//! the same handler.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::format::{Item, StrftimeItems};
use chrono::{Duration as ChronoDuration, Months, NaiveDate, NaiveDateTime, Utc};
use fake::faker::address::raw as address;
use fake::faker::company::raw as company;
use fake::faker::creditcard::raw as creditcard;
use fake::faker::internet::raw as internet;
use fake::faker::lorem::raw as lorem;
use fake::faker::name::raw as name;
use fake::faker::phone_number::raw as phone;
use fake::locales::{Data, EN, FR_FR, JA_JP, PT_BR, ZH_CN, ZH_TW};
use fake::{Dummy, Fake};
use rand::distr::Uniform;
use rand::rngs::StdRng;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::generate::locale::Locale;
use crate::generate::value::Value;
use crate::generate::FormatterError;

/// A formatter implementation: draws from the generator's RNG and the
/// positional arguments declared in the configuration.
pub type FormatterFn =
    Arc<dyn Fn(&mut StdRng, &Args<'_>) -> Result<Value, FormatterError> + Send + Sync>;

/// Upper bound for count arguments (words, lines, padding width, ...).
pub const MAX_COUNT: usize = 10_000;

/// Positional formatter arguments with typed accessors.
///
/// A missing argument and an explicit `NULL` both fall back to the default;
/// an argument of the wrong type is an [`FormatterError::InvalidArguments`].
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    formatter: &'a str,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    pub fn new(formatter: &'a str, values: &'a [Value]) -> Self {
        Self { formatter, values }
    }

    pub fn formatter(&self) -> &'a str {
        self.formatter
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    pub fn get(&self, idx: usize) -> Option<&'a Value> {
        self.values.get(idx).filter(|v| !v.is_null())
    }

    pub fn invalid(&self, message: impl Into<String>) -> FormatterError {
        FormatterError::InvalidArguments {
            formatter: self.formatter.to_string(),
            message: message.into(),
        }
    }

    pub fn opt_int(&self, idx: usize) -> Result<Option<i64>, FormatterError> {
        match self.get(idx) {
            None => Ok(None),
            Some(v) => v
                .as_int()
                .map(Some)
                .ok_or_else(|| self.invalid(format!("argument {} must be an integer, got {}", idx + 1, v))),
        }
    }

    pub fn int_or(&self, idx: usize, default: i64) -> Result<i64, FormatterError> {
        Ok(self.opt_int(idx)?.unwrap_or(default))
    }

    pub fn opt_float(&self, idx: usize) -> Result<Option<f64>, FormatterError> {
        match self.get(idx) {
            None => Ok(None),
            Some(v) => v
                .as_float()
                .map(Some)
                .ok_or_else(|| self.invalid(format!("argument {} must be a number, got {}", idx + 1, v))),
        }
    }

    pub fn opt_str(&self, idx: usize) -> Result<Option<&'a str>, FormatterError> {
        match self.get(idx) {
            None => Ok(None),
            Some(v) => v
                .as_str()
                .map(Some)
                .ok_or_else(|| self.invalid(format!("argument {} must be a string, got {}", idx + 1, v))),
        }
    }

    pub fn str_or(&self, idx: usize, default: &'a str) -> Result<&'a str, FormatterError> {
        Ok(self.opt_str(idx)?.unwrap_or(default))
    }

    pub fn bool_or(&self, idx: usize, default: bool) -> Result<bool, FormatterError> {
        match self.get(idx) {
            None => Ok(default),
            Some(v) => v
                .as_bool()
                .ok_or_else(|| self.invalid(format!("argument {} must be a boolean, got {}", idx + 1, v))),
        }
    }

    /// Count argument, e.g. number of words or digits, in `0..=MAX_COUNT`.
    pub fn count_or(&self, idx: usize, default: usize) -> Result<usize, FormatterError> {
        let n = self.int_or(idx, default as i64)?;
        let n = usize::try_from(n)
            .map_err(|_| self.invalid(format!("argument {} must not be negative", idx + 1)))?;
        if n > MAX_COUNT {
            return Err(self.invalid(format!("argument {} must be at most {}, got {}", idx + 1, MAX_COUNT, n)));
        }
        Ok(n)
    }
}

/// The registry of built-in formatters for one locale.
pub struct FormatterRegistry {
    locale: Locale,
    handlers: HashMap<&'static str, FormatterFn>,
    /// Normalized name → canonical name.
    lookup: HashMap<String, &'static str>,
}

impl FormatterRegistry {
    pub fn new(locale: Locale) -> Self {
        let mut registry = Self {
            locale,
            handlers: HashMap::new(),
            lookup: HashMap::new(),
        };
        match locale {
            Locale::EnUs | Locale::EnGb => register_localized(&mut registry, EN),
            Locale::FrFr => register_localized(&mut registry, FR_FR),
            Locale::PtBr => register_localized(&mut registry, PT_BR),
            Locale::JaJp => register_localized(&mut registry, JA_JP),
            Locale::ZhCn => register_localized(&mut registry, ZH_CN),
            Locale::ZhTw => register_localized(&mut registry, ZH_TW),
        }
        register_common(&mut registry);
        registry
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    fn insert(&mut self, name: &'static str, handler: FormatterFn) {
        self.lookup.insert(normalize_formatter_name(name), name);
        self.handlers.insert(name, handler);
    }

    /// Find a handler by exact or normalized name.
    pub fn resolve(&self, name: &str) -> Option<&FormatterFn> {
        self.handlers.get(name).or_else(|| {
            self.lookup
                .get(&normalize_formatter_name(name))
                .and_then(|canonical| self.handlers.get(canonical))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Invoke `name` with positional `args`.
    pub fn call(&self, name: &str, rng: &mut StdRng, args: &[Value]) -> Result<Value, FormatterError> {
        let handler = self
            .resolve(name)
            .ok_or_else(|| FormatterError::UnknownFormatter(name.to_string()))?;
        handler(rng, &Args::new(name, args))
    }

    /// Canonical formatter names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for FormatterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatterRegistry")
            .field("locale", &self.locale)
            .field("formatters", &self.handlers.len())
            .finish()
    }
}

/// Lowercase and strip `_`/`-` so `first_name`, `firstName` and
/// `FIRST-NAME` compare equal.
pub fn normalize_formatter_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn handler<F>(f: F) -> FormatterFn
where
    F: Fn(&mut StdRng, &Args<'_>) -> Result<Value, FormatterError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a `fake` faker that produces a `String`.
fn fake_string<F>(faker: F) -> FormatterFn
where
    F: Send + Sync + 'static,
    String: Dummy<F>,
{
    handler(move |rng, _args| {
        let s: String = faker.fake_with_rng(rng);
        Ok(Value::owned(s))
    })
}

/// Wrap a `fake` faker that produces an `f64`.
fn fake_float<F>(faker: F) -> FormatterFn
where
    F: Send + Sync + 'static,
    f64: Dummy<F>,
{
    handler(move |rng, _args| {
        let f: f64 = faker.fake_with_rng(rng);
        Ok(Value::Float(f))
    })
}

// ---------------------------------------------------------------------------
// Locale-dependent formatters (backed by the `fake` crate)
// ---------------------------------------------------------------------------

fn register_localized<L>(r: &mut FormatterRegistry, l: L)
where
    L: Data + fake::faker::impls::address::CityNameGenFn + Copy + Send + Sync + 'static,
{
    // === Person ===
    r.insert("firstName", fake_string(name::FirstName(l)));
    r.insert("lastName", fake_string(name::LastName(l)));
    r.insert("name", fake_string(name::Name(l)));
    r.insert("title", fake_string(name::Title(l)));
    r.insert("suffix", fake_string(name::Suffix(l)));

    // === Internet ===
    r.insert("email", fake_string(internet::SafeEmail(l)));
    r.insert("safeEmail", fake_string(internet::SafeEmail(l)));
    r.insert("freeEmail", fake_string(internet::FreeEmail(l)));
    r.insert("freeEmailDomain", fake_string(internet::FreeEmailProvider(l)));
    r.insert("tld", fake_string(internet::DomainSuffix(l)));
    r.insert("userName", fake_string(internet::Username(l)));
    r.insert("ipv4", fake_string(internet::IPv4(l)));
    r.insert("ipv6", fake_string(internet::IPv6(l)));
    r.insert("macAddress", fake_string(internet::MACAddress(l)));
    r.insert("userAgent", fake_string(internet::UserAgent(l)));
    r.insert(
        "password",
        handler(move |rng, args| {
            let min = args.count_or(0, 8)?;
            let max = args.count_or(1, 20)?;
            if min == 0 || min > max {
                return Err(args.invalid(format!("length range {}..{} is empty", min, max)));
            }
            let s: String = internet::Password(l, min..max + 1).fake_with_rng(rng);
            Ok(Value::owned(s))
        }),
    );
    r.insert(
        "domainName",
        handler(move |rng, _args| {
            let word: String = lorem::Word(l).fake_with_rng(rng);
            let suffix: String = internet::DomainSuffix(l).fake_with_rng(rng);
            Ok(Value::owned(format!("{}.{}", slugify(&word), suffix)))
        }),
    );
    r.insert(
        "url",
        handler(move |rng, _args| {
            let word: String = lorem::Word(l).fake_with_rng(rng);
            let suffix: String = internet::DomainSuffix(l).fake_with_rng(rng);
            let path: Vec<String> = lorem::Words(l, 1..3).fake_with_rng(rng);
            Ok(Value::owned(format!(
                "https://www.{}.{}/{}",
                slugify(&word),
                suffix,
                slugify(&path.join("-"))
            )))
        }),
    );
    r.insert(
        "slug",
        handler(move |rng, args| {
            let n = args.count_or(0, 3)?.max(1);
            let words: Vec<String> = lorem::Words(l, n..n + 1).fake_with_rng(rng);
            Ok(Value::owned(slugify(&words.join("-"))))
        }),
    );

    // === Address ===
    r.insert("city", fake_string(address::CityName(l)));
    r.insert("streetName", fake_string(address::StreetName(l)));
    r.insert("buildingNumber", fake_string(address::BuildingNumber(l)));
    r.insert("secondaryAddress", fake_string(address::SecondaryAddress(l)));
    r.insert("postcode", fake_string(address::PostCode(l)));
    r.insert("zipCode", fake_string(address::ZipCode(l)));
    r.insert("state", fake_string(address::StateName(l)));
    r.insert("stateAbbr", fake_string(address::StateAbbr(l)));
    r.insert("country", fake_string(address::CountryName(l)));
    r.insert("countryCode", fake_string(address::CountryCode(l)));
    r.insert("latitude", fake_float(address::Latitude(l)));
    r.insert("longitude", fake_float(address::Longitude(l)));
    r.insert(
        "streetAddress",
        handler(move |rng, _args| {
            let number: String = address::BuildingNumber(l).fake_with_rng(rng);
            let street: String = address::StreetName(l).fake_with_rng(rng);
            Ok(Value::owned(format!("{} {}", number, street)))
        }),
    );
    r.insert(
        "address",
        handler(move |rng, _args| {
            let number: String = address::BuildingNumber(l).fake_with_rng(rng);
            let street: String = address::StreetName(l).fake_with_rng(rng);
            let city: String = address::CityName(l).fake_with_rng(rng);
            let state: String = address::StateAbbr(l).fake_with_rng(rng);
            let post: String = address::PostCode(l).fake_with_rng(rng);
            Ok(Value::owned(format!(
                "{} {}\n{}, {} {}",
                number, street, city, state, post
            )))
        }),
    );

    // === Company ===
    r.insert("company", fake_string(company::CompanyName(l)));
    r.insert("companySuffix", fake_string(company::CompanySuffix(l)));
    r.insert("jobTitle", fake_string(company::Profession(l)));
    r.insert("industry", fake_string(company::Industry(l)));
    r.insert("catchPhrase", fake_string(company::CatchPhrase(l)));
    r.insert("buzzword", fake_string(company::Buzzword(l)));
    r.insert("bs", fake_string(company::Bs(l)));

    // === Phone / payment ===
    r.insert("phoneNumber", fake_string(phone::PhoneNumber(l)));
    r.insert("cellNumber", fake_string(phone::CellNumber(l)));
    r.insert("creditCardNumber", fake_string(creditcard::CreditCardNumber(l)));

    // === Text ===
    r.insert("word", fake_string(lorem::Word(l)));
    r.insert(
        "words",
        handler(move |rng, args| {
            let n = args.count_or(0, 3)?;
            if n == 0 {
                return Ok(Value::borrowed(""));
            }
            let words: Vec<String> = lorem::Words(l, n..n + 1).fake_with_rng(rng);
            Ok(Value::owned(words.join(" ")))
        }),
    );
    r.insert(
        "sentence",
        handler(move |rng, args| {
            let n = args.count_or(0, 6)?;
            if n == 0 {
                return Ok(Value::borrowed(""));
            }
            let variable = args.bool_or(1, true)?;
            let upper = if variable { n + n * 2 / 5 + 1 } else { n + 1 };
            let s: String = lorem::Sentence(l, n..upper).fake_with_rng(rng);
            Ok(Value::owned(s))
        }),
    );
    r.insert(
        "paragraph",
        handler(move |rng, args| {
            let n = args.count_or(0, 3)?;
            if n == 0 {
                return Ok(Value::borrowed(""));
            }
            let s: String = lorem::Paragraph(l, n..n + 1).fake_with_rng(rng);
            Ok(Value::owned(s))
        }),
    );
    r.insert(
        "text",
        handler(move |rng, args| {
            let max = args.count_or(0, 200)?;
            if max < 5 {
                return Err(args.invalid("text() can only generate text of at least 5 characters"));
            }
            let mut text = String::new();
            while text.chars().count() < max {
                let sentence: String = lorem::Sentence(l, 4..10).fake_with_rng(rng);
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(&sentence);
            }
            Ok(Value::owned(truncate_text(&text, max)))
        }),
    );
}

// ---------------------------------------------------------------------------
// Locale-independent formatters
// ---------------------------------------------------------------------------

fn register_common(r: &mut FormatterRegistry) {
    // === Numbers ===
    r.insert(
        "numberBetween",
        handler(|rng, args| {
            let a = args.int_or(0, 0)?;
            let b = args.int_or(1, i32::MAX as i64)?;
            let (min, max) = if a <= b { (a, b) } else { (b, a) };
            Ok(Value::Int(rng.random_range(min..=max)))
        }),
    );
    r.insert(
        "randomNumber",
        handler(|rng, args| {
            let digits = match args.opt_int(0)? {
                Some(d) if !(0..=18).contains(&d) => {
                    return Err(args.invalid("number of digits must be between 0 and 18"));
                }
                Some(d) => d as u32,
                None => rng.random_range(1..=9),
            };
            if digits == 0 {
                return Ok(Value::Int(0));
            }
            let strict = args.bool_or(1, false)?;
            let max = 10_i64.pow(digits) - 1;
            let min = if strict { 10_i64.pow(digits - 1) } else { 0 };
            Ok(Value::Int(rng.random_range(min..=max)))
        }),
    );
    r.insert("randomDigit", handler(|rng, _| Ok(Value::Int(rng.random_range(0..10)))));
    r.insert(
        "randomDigitNotNull",
        handler(|rng, _| Ok(Value::Int(rng.random_range(1..10)))),
    );
    r.insert(
        "randomFloat",
        handler(|rng, args| {
            let decimals = args.opt_int(0)?.unwrap_or(2);
            if !(0..=10).contains(&decimals) {
                return Err(args.invalid("decimals must be between 0 and 10"));
            }
            let a = args.opt_float(1)?.unwrap_or(0.0);
            let b = args.opt_float(2)?.unwrap_or(a + 1000.0);
            if !a.is_finite() || !b.is_finite() {
                return Err(args.invalid("bounds must be finite numbers"));
            }
            let (min, max) = if a <= b { (a, b) } else { (b, a) };
            let raw: f64 = if min == max {
                min
            } else {
                let range = Uniform::new(min, max)
                    .map_err(|e| args.invalid(format!("cannot sample between {} and {}: {}", min, max, e)))?;
                rng.sample(range)
            };
            let factor = 10_f64.powi(decimals as i32);
            Ok(Value::Float((raw * factor).round() / factor))
        }),
    );
    r.insert(
        "boolean",
        handler(|rng, args| {
            let chance = args.int_or(0, 50)?;
            if !(0..=100).contains(&chance) {
                return Err(args.invalid("chance of getting true must be between 0 and 100"));
            }
            Ok(Value::Bool(rng.random_range(1..=100) <= chance))
        }),
    );
    r.insert(
        "randomElement",
        handler(|rng, args| {
            let pool: &[Value] = match args.values() {
                [Value::List(items)] => items,
                other => other,
            };
            if pool.is_empty() {
                return Ok(Value::Null);
            }
            Ok(pool[rng.random_range(0..pool.len())].clone())
        }),
    );
    r.insert(
        "randomLetter",
        handler(|rng, _| {
            let c = (b'a' + rng.random_range(0..26u8)) as char;
            Ok(Value::owned(c.to_string()))
        }),
    );

    // === Patterns ===
    r.insert(
        "numerify",
        handler(|rng, args| Ok(Value::owned(fill_pattern(args.str_or(0, "###")?, rng)))),
    );
    r.insert(
        "lexify",
        handler(|rng, args| Ok(Value::owned(fill_pattern(args.str_or(0, "????")?, rng)))),
    );
    r.insert(
        "bothify",
        handler(|rng, args| Ok(Value::owned(fill_pattern(args.str_or(0, "## ??")?, rng)))),
    );

    // === Identifiers ===
    r.insert(
        "uuid",
        handler(|rng, _| {
            let bytes: [u8; 16] = rng.random();
            Ok(Value::Uuid(uuid::Builder::from_random_bytes(bytes).into_uuid()))
        }),
    );
    r.insert(
        "sha256",
        handler(|rng, _| {
            let bytes: [u8; 32] = rng.random();
            let digest = Sha256::digest(bytes);
            Ok(Value::owned(format!("{:x}", digest)))
        }),
    );
    // md5 and sha1 only need the right shape: 32 and 40 hex characters.
    r.insert("md5", handler(|rng, _| Ok(Value::owned(hex_digest(rng, 32)))));
    r.insert("sha1", handler(|rng, _| Ok(Value::owned(hex_digest(rng, 40)))));
    r.insert("ean13", handler(|rng, _| Ok(Value::owned(ean(rng, 13)))));
    r.insert("ean8", handler(|rng, _| Ok(Value::owned(ean(rng, 8)))));

    // === Dates ===
    r.insert(
        "dateTimeBetween",
        handler(|rng, args| {
            let now = Utc::now().naive_utc();
            let start = moment_arg(args, 0, "-30 years", now)?;
            let end = moment_arg(args, 1, "now", now)?;
            Ok(Value::Timestamp(datetime_between(rng, start, end)))
        }),
    );
    r.insert(
        "dateTime",
        handler(|rng, args| {
            let now = Utc::now().naive_utc();
            let max = moment_arg(args, 0, "now", now)?;
            Ok(Value::Timestamp(datetime_between(rng, epoch(), max)))
        }),
    );
    r.insert(
        "date",
        handler(|rng, args| {
            let now = Utc::now().naive_utc();
            let max = moment_arg(args, 1, "now", now)?;
            let dt = datetime_between(rng, epoch(), max);
            match args.opt_str(0)? {
                Some(fmt) => Ok(Value::owned(format_datetime(args, &dt, fmt)?)),
                None => Ok(Value::Date(dt.date())),
            }
        }),
    );
    r.insert(
        "time",
        handler(|rng, args| {
            let now = Utc::now().naive_utc();
            let dt = datetime_between(rng, epoch(), now);
            match args.opt_str(0)? {
                Some(fmt) => Ok(Value::owned(format_datetime(args, &dt, fmt)?)),
                None => Ok(Value::Time(dt.time())),
            }
        }),
    );
    r.insert(
        "unixTime",
        handler(|rng, args| {
            let now = Utc::now().naive_utc();
            let max = moment_arg(args, 0, "now", now)?;
            Ok(Value::Int(datetime_between(rng, epoch(), max).and_utc().timestamp()))
        }),
    );
    r.insert(
        "year",
        handler(|rng, args| {
            let now = Utc::now().naive_utc();
            let max = moment_arg(args, 0, "now", now)?;
            Ok(Value::Int(
                datetime_between(rng, epoch(), max).format("%Y").to_string().parse().unwrap_or(1970),
            ))
        }),
    );
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Replace `#` with a digit, `?` with a lowercase letter and `*` with either.
pub(crate) fn fill_pattern(pattern: &str, rng: &mut StdRng) -> String {
    pattern
        .chars()
        .map(|c| match c {
            '#' => (b'0' + rng.random_range(0..10u8)) as char,
            '?' => (b'a' + rng.random_range(0..26u8)) as char,
            '*' => {
                if rng.random_bool(0.5) {
                    (b'0' + rng.random_range(0..10u8)) as char
                } else {
                    (b'a' + rng.random_range(0..26u8)) as char
                }
            }
            other => other,
        })
        .collect()
}

/// EAN barcode with a valid check digit.
fn ean(rng: &mut StdRng, length: usize) -> String {
    let digits: Vec<u32> = (0..length - 1).map(|_| rng.random_range(0..10)).collect();
    // Weights run 3,1,3,... from the rightmost payload digit.
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { d * 3 } else { *d })
        .sum();
    let check = (10 - sum % 10) % 10;
    let mut out: String = digits.iter().map(|d| char::from(b'0' + *d as u8)).collect();
    out.push(char::from(b'0' + check as u8));
    out
}

/// `len` lowercase hex characters from a random SHA-256 digest.
fn hex_digest(rng: &mut StdRng, len: usize) -> String {
    let bytes: [u8; 32] = rng.random();
    let mut hex = format!("{:x}", Sha256::digest(bytes));
    hex.truncate(len);
    hex
}

fn slugify(text: &str) -> String {
    text.chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c.to_lowercase().next().unwrap_or(c))
            } else if c == ' ' || c == '-' {
                Some('-')
            } else {
                None
            }
        })
        .collect()
}

/// Cut `text` to at most `max` characters at a word boundary and end it
/// with a period.
fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max - 1).collect();
    let cut = head.rfind(' ').map(|i| &head[..i]).unwrap_or(&head);
    let mut out = cut.trim_end_matches(|c: char| !c.is_alphanumeric()).to_string();
    out.push('.');
    out
}

fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

fn datetime_between(rng: &mut StdRng, a: NaiveDateTime, b: NaiveDateTime) -> NaiveDateTime {
    let (start, end) = if a <= b { (a, b) } else { (b, a) };
    let (s, e) = (start.and_utc().timestamp(), end.and_utc().timestamp());
    let secs = if s == e { s } else { rng.random_range(s..=e) };
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.naive_utc())
        .unwrap_or(start)
}

fn moment_arg(
    args: &Args<'_>,
    idx: usize,
    default: &str,
    now: NaiveDateTime,
) -> Result<NaiveDateTime, FormatterError> {
    let text = args.str_or(idx, default)?;
    parse_moment(text, now)
        .ok_or_else(|| args.invalid(format!("cannot interpret '{}' as a date", text)))
}

/// Parse `now`, `today`, an ISO date or datetime, or a relative offset such
/// as `-30 years` / `+2 weeks`.
pub(crate) fn parse_moment(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let text = text.trim();
    match text.to_lowercase().as_str() {
        "now" => return Some(now),
        "today" => return now.date().and_hms_opt(0, 0, 0),
        _ => {}
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }

    let mut parts = text.split_whitespace();
    let amount: i64 = parts.next()?.trim_start_matches('+').parse().ok()?;
    let unit = parts.next()?.to_lowercase();
    if parts.next().is_some() {
        return None;
    }
    let unit = unit.trim_end_matches('s');
    match unit {
        "year" | "month" => {
            let months = amount.unsigned_abs().checked_mul(if unit == "year" { 12 } else { 1 })?;
            let months = Months::new(u32::try_from(months).ok()?);
            if amount < 0 {
                now.checked_sub_months(months)
            } else {
                now.checked_add_months(months)
            }
        }
        "week" => now.checked_add_signed(ChronoDuration::try_weeks(amount)?),
        "day" => now.checked_add_signed(ChronoDuration::try_days(amount)?),
        "hour" => now.checked_add_signed(ChronoDuration::try_hours(amount)?),
        "minute" => now.checked_add_signed(ChronoDuration::try_minutes(amount)?),
        _ => None,
    }
}

/// Format with a strftime pattern, rejecting malformed patterns instead of
/// panicking inside chrono's `Display`.
fn format_datetime(args: &Args<'_>, dt: &NaiveDateTime, fmt: &str) -> Result<String, FormatterError> {
    if StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
        return Err(args.invalid(format!("'{}' is not a valid date format", fmt)));
    }
    Ok(dt.format_with_items(StrftimeItems::new(fmt)).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_lookup_is_case_and_separator_insensitive() {
        let registry = FormatterRegistry::new(Locale::EnUs);
        assert!(registry.contains("firstName"));
        assert!(registry.contains("first_name"));
        assert!(registry.contains("FIRST-NAME"));
        assert!(!registry.contains("doesNotExist"));
    }

    #[test]
    fn test_every_locale_builds_the_same_names() {
        let en = FormatterRegistry::new(Locale::EnUs).names();
        for locale in Locale::ALL {
            assert_eq!(FormatterRegistry::new(locale).names(), en, "{}", locale);
        }
    }

    #[test]
    fn test_every_formatter_runs_without_arguments() {
        let registry = FormatterRegistry::new(Locale::EnUs);
        let mut rng = rng();
        for name in registry.names() {
            let result = registry.call(name, &mut rng, &[]);
            assert!(result.is_ok(), "{} failed: {:?}", name, result);
        }
    }

    #[test]
    fn test_unknown_formatter() {
        let registry = FormatterRegistry::new(Locale::EnUs);
        let err = registry.call("nope", &mut rng(), &[]).unwrap_err();
        assert_eq!(err, FormatterError::UnknownFormatter("nope".to_string()));
    }

    #[test]
    fn test_number_between_respects_bounds_and_swaps() {
        let registry = FormatterRegistry::new(Locale::EnUs);
        let mut rng = rng();
        for _ in 0..200 {
            let v = registry
                .call("numberBetween", &mut rng, &[Value::Int(10), Value::Int(5)])
                .unwrap();
            let n = v.as_int().unwrap();
            assert!((5..=10).contains(&n));
        }
    }

    #[test]
    fn test_number_between_rejects_non_numeric() {
        let registry = FormatterRegistry::new(Locale::EnUs);
        let err = registry
            .call("numberBetween", &mut rng(), &[Value::from("low")])
            .unwrap_err();
        assert!(matches!(err, FormatterError::InvalidArguments { .. }));
    }

    #[test]
    fn test_random_float_rejects_unsamplable_bounds() {
        let registry = FormatterRegistry::new(Locale::EnUs);
        let cases: [&[Value]; 4] = [
            &[Value::Int(2), Value::Float(f64::NAN)],
            &[Value::Int(2), Value::from("0"), Value::from("inf")],
            &[Value::Int(2), Value::Float(f64::NEG_INFINITY), Value::Float(0.0)],
            &[Value::Int(2), Value::Float(-1e308), Value::Float(1e308)],
        ];
        for args in cases {
            let err = registry.call("randomFloat", &mut rng(), args).unwrap_err();
            assert!(matches!(err, FormatterError::InvalidArguments { .. }), "{:?}", args);
        }
        let ok = registry
            .call("randomFloat", &mut rng(), &[Value::Int(1), Value::Float(-5.0), Value::Float(5.0)])
            .unwrap();
        let f = ok.as_float().unwrap();
        assert!((-5.0..=5.0).contains(&f));
    }

    #[test]
    fn test_count_arguments_are_capped() {
        let registry = FormatterRegistry::new(Locale::EnUs);
        for name in ["words", "sentence", "paragraph", "text", "password"] {
            let err = registry
                .call(name, &mut rng(), &[Value::Int(i64::MAX)])
                .unwrap_err();
            assert!(matches!(err, FormatterError::InvalidArguments { .. }), "{}", name);
        }
        let words = registry
            .call("words", &mut rng(), &[Value::Int(MAX_COUNT as i64)])
            .unwrap();
        assert!(!words.is_null());
    }

    #[test]
    fn test_random_number_strict_digit_count() {
        let registry = FormatterRegistry::new(Locale::EnUs);
        let mut rng = rng();
        for _ in 0..100 {
            let n = registry
                .call("randomNumber", &mut rng, &[Value::Int(4), Value::Bool(true)])
                .unwrap()
                .as_int()
                .unwrap();
            assert!((1000..=9999).contains(&n));
        }
    }

    #[test]
    fn test_random_element_from_list_or_varargs() {
        let registry = FormatterRegistry::new(Locale::EnUs);
        let mut rng = rng();
        let list = Value::List(vec![Value::from("a"), Value::from("b")]);
        let v = registry.call("randomElement", &mut rng, &[list]).unwrap();
        assert!(v == Value::from("a") || v == Value::from("b"));

        let v = registry
            .call("randomElement", &mut rng, &[Value::Int(1), Value::Int(2)])
            .unwrap();
        assert!(v == Value::Int(1) || v == Value::Int(2));

        assert_eq!(registry.call("randomElement", &mut rng, &[]).unwrap(), Value::Null);
    }

    #[test]
    fn test_text_respects_max_length() {
        let registry = FormatterRegistry::new(Locale::EnUs);
        let mut rng = rng();
        for max in [5, 20, 200] {
            let v = registry.call("text", &mut rng, &[Value::Int(max)]).unwrap();
            assert!(v.as_str().unwrap().chars().count() <= max as usize);
        }
        assert!(registry.call("text", &mut rng, &[Value::Int(3)]).is_err());
    }

    #[test]
    fn test_date_with_bad_format_is_invalid() {
        let registry = FormatterRegistry::new(Locale::EnUs);
        let err = registry
            .call("date", &mut rng(), &[Value::from("%Q")])
            .unwrap_err();
        assert!(matches!(err, FormatterError::InvalidArguments { .. }));
    }

    #[test]
    fn test_fill_pattern() {
        let s = fill_pattern("AB-###-??", &mut rng());
        assert_eq!(s.len(), 9);
        assert!(s.starts_with("AB-"));
        assert!(s[3..6].chars().all(|c| c.is_ascii_digit()));
        assert!(s[7..].chars().all(|c| c.is_ascii_lowercase()));
    }

    #[test]
    fn test_ean13_check_digit() {
        let code = ean(&mut rng(), 13);
        let digits: Vec<u32> = code.chars().map(|c| c.to_digit(10).unwrap()).collect();
        let sum: u32 = digits
            .iter()
            .enumerate()
            .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
            .sum();
        assert_eq!(sum % 10, 0);
    }

    #[test]
    fn test_digest_lengths() {
        let reg = FormatterRegistry::new(Locale::EnUs);
        for (name, len) in [("md5", 32), ("sha1", 40), ("sha256", 64)] {
            let v = reg.call(name, &mut rng(), &[]).unwrap();
            let s = v.as_str().unwrap();
            assert_eq!(s.len(), len, "{}", name);
            assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_parse_moment() {
        let now = fixed_now();
        assert_eq!(parse_moment("now", now), Some(now));
        assert_eq!(
            parse_moment("-30 years", now).unwrap().date(),
            NaiveDate::from_ymd_opt(1995, 6, 15).unwrap()
        );
        assert_eq!(
            parse_moment("+2 days", now).unwrap().date(),
            NaiveDate::from_ymd_opt(2025, 6, 17).unwrap()
        );
        assert_eq!(
            parse_moment("2020-02-29", now).unwrap().date(),
            NaiveDate::from_ymd_opt(2020, 2, 29).unwrap()
        );
        assert!(parse_moment("next tuesday", now).is_none());
    }

    #[test]
    fn test_date_time_between_stays_in_range() {
        let registry = FormatterRegistry::new(Locale::EnUs);
        let mut rng = rng();
        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let end = NaiveDate::from_ymd_opt(2000, 12, 31).unwrap().and_hms_opt(0, 0, 0).unwrap();
        for _ in 0..50 {
            let v = registry
                .call(
                    "dateTimeBetween",
                    &mut rng,
                    &[Value::from("2000-01-01"), Value::from("2000-12-31")],
                )
                .unwrap();
            match v {
                Value::Timestamp(ts) => assert!(ts >= start && ts <= end),
                other => panic!("expected timestamp, got {:?}", other),
            }
        }
    }
}
