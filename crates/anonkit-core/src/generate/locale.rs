use std::fmt;
use std::str::FromStr;

use crate::error::AnonKitError;

/// Locales the built-in formatters can produce data for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Locale {
    #[default]
    EnUs,
    EnGb,
    FrFr,
    PtBr,
    JaJp,
    ZhCn,
    ZhTw,
}

impl Locale {
    pub const ALL: [Locale; 7] = [
        Locale::EnUs,
        Locale::EnGb,
        Locale::FrFr,
        Locale::PtBr,
        Locale::JaJp,
        Locale::ZhCn,
        Locale::ZhTw,
    ];

    /// The `ll_CC` code used in configuration files.
    pub fn code(&self) -> &'static str {
        match self {
            Locale::EnUs => "en_US",
            Locale::EnGb => "en_GB",
            Locale::FrFr => "fr_FR",
            Locale::PtBr => "pt_BR",
            Locale::JaJp => "ja_JP",
            Locale::ZhCn => "zh_CN",
            Locale::ZhTw => "zh_TW",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Locale {
    type Err = AnonKitError;

    /// Accepts `en_US`, `en-US`, `EN_us` and the bare language `en`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_").to_lowercase();
        if wanted == "en" {
            return Ok(Locale::EnUs);
        }
        Locale::ALL
            .iter()
            .copied()
            .find(|l| l.code().to_lowercase() == wanted)
            .ok_or_else(|| {
                let supported: Vec<&str> = Locale::ALL.iter().map(|l| l.code()).collect();
                AnonKitError::config(format!(
                    "Unsupported locale '{}'. Supported: {}",
                    s,
                    supported.join(", ")
                ))
            })
    }
}
