use anyhow::Result;
use comfy_table::{Cell, Table as ComfyTable};

use anonkit_core::generate::builtin::FormatterRegistry;
use anonkit_core::generate::locale::Locale;
use anonkit_core::generate::provider::ProviderRegistry;

use crate::args::FormattersArgs;

/// Print every formatter name usable in a configuration.
pub fn run(args: &FormattersArgs) -> Result<()> {
    let locale: Locale = args.locale.parse()?;
    let builtins = FormatterRegistry::new(locale);
    let providers = ProviderRegistry::with_defaults()?;

    let mut table = ComfyTable::new();
    table.set_header(vec!["Formatter", "Source"]);
    for name in builtins.names() {
        table.add_row(vec![Cell::new(name), Cell::new("built-in")]);
    }
    for (provider, names) in providers.formatters() {
        for name in names {
            table.add_row(vec![Cell::new(name), Cell::new(format!("provider = \"{}\"", provider))]);
        }
    }

    println!("Formatters for locale {}:", locale);
    println!("{table}");
    Ok(())
}
