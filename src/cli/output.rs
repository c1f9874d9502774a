//! Output helpers shared by all subcommands.
//!
//! Global flags are passed down as `FOLIO_*` environment variables so any
//! module can check them without threading a context through every call.

use serde::Serialize;

/// Whether `--json` was given.
pub fn is_json() -> bool {
    std::env::var("FOLIO_JSON").is_ok()
}

/// Whether `--quiet` was given.
pub fn is_quiet() -> bool {
    std::env::var("FOLIO_QUIET").is_ok()
}

/// Whether color output is disabled, via `--no-color` or the conventional
/// `NO_COLOR` variable.
pub fn no_color() -> bool {
    std::env::var("FOLIO_NO_COLOR").is_ok() || std::env::var("NO_COLOR").is_ok()
}

/// Print a machine-readable JSON document to stdout.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("  Error: could not serialize output: {e}"),
    }
}

/// ANSI styling that degrades to plain text when color is off.
pub struct Styled {
    color: bool,
}

impl Styled {
    pub fn new() -> Self {
        Self { color: !no_color() }
    }

    pub fn ok_sym(&self) -> String {
        self.paint("\u{2713}", "32")
    }

    pub fn warn_sym(&self) -> String {
        self.paint("!", "33")
    }

    pub fn err_sym(&self) -> String {
        self.paint("\u{2717}", "31")
    }

    pub fn bold(&self, text: &str) -> String {
        self.paint(text, "1")
    }

    pub fn dim(&self, text: &str) -> String {
        self.paint(text, "2")
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if self.color {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }
}

impl Default for Styled {
    fn default() -> Self {
        Self::new()
    }
}
