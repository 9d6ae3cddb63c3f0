//! Platform-specific naming conventions stage E renders against: symbol
//! mangling, local label prefixes, and the PLT suffix for calls to
//! externally-defined functions.

use crate::config::Platform;

/// How an external symbol is referenced from generated code.
pub fn global_symbol(platform: Platform, name: &str) -> String {
    match platform {
        Platform::MacOs => format!("_{name}"),
        Platform::Linux => name.to_string(),
    }
}

/// The suffix appended to `call` targets that aren't defined in this file,
/// needed on Linux so the linker routes through the procedure linkage table.
pub fn call_suffix(platform: Platform, defined_locally: bool) -> &'static str {
    match platform {
        Platform::Linux if !defined_locally => "@PLT",
        _ => "",
    }
}

/// Compiler-internal labels (jump targets, rodata constants) use a prefix
/// the assembler strips from the symbol table, keeping them out of
/// debugger backtraces and out of the way of user-level names.
pub fn local_label(platform: Platform, name: &str) -> String {
    match platform {
        Platform::Linux => format!(".L{name}"),
        Platform::MacOs => format!("L{name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macos_symbols_get_an_underscore_prefix() {
        assert_eq!(global_symbol(Platform::MacOs, "main"), "_main");
        assert_eq!(global_symbol(Platform::Linux, "main"), "main");
    }

    #[test]
    fn only_linux_externs_get_the_plt_suffix() {
        assert_eq!(call_suffix(Platform::Linux, false), "@PLT");
        assert_eq!(call_suffix(Platform::Linux, true), "");
        assert_eq!(call_suffix(Platform::MacOs, false), "");
    }
}
