//! Symbol codes known to the relay and their display names.
//!
//! The upstream feed publishes many instruments; only the ones listed in
//! [`Symbol`] are normalized and broadcast. The declaration order doubles as the
//! order in which tickers are emitted to consumers.

use std::io::BufRead;
use strum::{EnumMessage, IntoEnumIterator};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::RelayError;

/// Trait providing file parsing for symbols.
pub trait SymbolParser {
    /// Parses symbols from a buffered reader.
    ///
    /// Each non-empty line is parsed as a single `Symbol` code using `FromStr`.
    /// Lines starting with `#` are ignored. Returns an error if any line cannot be parsed.
    fn parse_from_file<R: BufRead>(reader: R) -> Result<Vec<Symbol>, RelayError>;
}

impl SymbolParser for Symbol {
    fn parse_from_file<R: BufRead>(reader: R) -> Result<Vec<Self>, RelayError> {
        let mut symbols = Vec::new();

        for line_result in reader.lines() {
            let line = line_result.map_err(RelayError::Io)?;
            let trimmed_line = line.trim();
            if trimmed_line.is_empty() || trimmed_line.starts_with('#') {
                continue;
            }

            match trimmed_line.parse::<Self>() {
                Ok(symbol) => symbols.push(symbol),
                Err(e) => {
                    return Err(RelayError::ParseSymbolsFile(format!(
                        "{}: {}",
                        trimmed_line, e
                    )));
                }
            }
        }
        Ok(symbols)
    }
}

/// Instruments relayed downstream, keyed by their upstream code.
#[derive(
    Debug,
    Clone,
    Copy,
    Display,
    EnumString,
    EnumIter,
    strum_macros::EnumMessage,
    IntoStaticStr,
    Hash,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
)]
#[strum(ascii_case_insensitive)]
#[allow(missing_docs)]
pub enum Symbol {
    #[strum(serialize = "ALTIN", message = "Has Altın")]
    HasAltin,
    #[strum(serialize = "ONS", message = "Altın Ons")]
    AltinOns,
    #[strum(serialize = "GUMUSTRY", message = "Gram Gümüş")]
    GramGumus,
    #[strum(serialize = "XAGUSD", message = "Gümüş Ons")]
    GumusOns,
    #[strum(serialize = "AYAR14", message = "14 Ayar Altın")]
    Ayar14,
    #[strum(serialize = "AYAR22", message = "22 Ayar Altın")]
    Ayar22,
    #[strum(serialize = "KULCEALTIN", message = "Gram Altın")]
    GramAltin,
    #[strum(serialize = "CEYREK_YENI", message = "Çeyrek Altın")]
    Ceyrek,
    #[strum(serialize = "YARIM_YENI", message = "Yarım Altın")]
    Yarim,
    #[strum(serialize = "TAM_YENI", message = "Tam Altın")]
    Tam,
    #[strum(serialize = "ATA_YENI", message = "Ata Altın")]
    Ata,
    #[strum(serialize = "ATA5_YENI", message = "Ata 5'li")]
    Ata5,
    #[strum(serialize = "GREMESE_YENI", message = "Gremse Altın")]
    Gremse,
}

impl Symbol {
    /// Look up a symbol by its exact upstream code. Unknown codes yield `None`.
    ///
    /// Unlike `FromStr`, which is case-insensitive for user input, upstream
    /// codes must match exactly.
    pub fn from_code(code: &str) -> Option<Symbol> {
        Symbol::iter().find(|symbol| symbol.code() == code)
    }

    /// Upstream code, e.g. `ONS`.
    pub fn code(self) -> &'static str {
        self.into()
    }

    /// Human-readable name shown to consumers, e.g. `Altın Ons`.
    pub fn display_name(self) -> &'static str {
        self.get_message().unwrap_or_else(|| self.code())
    }

    /// All known symbols in display order.
    pub fn all() -> impl Iterator<Item = Symbol> {
        Symbol::iter()
    }
}
