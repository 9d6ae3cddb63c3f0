//! Compiler configuration: target platform and the stage to stop after.
//!
//! Grounded on the builder-style `CompilerConfig` the teacher's driver uses
//! to carry CLI-derived knobs into the core API, so the same struct works
//! whether it's built from `Default` (the library entry point) or from
//! parsed `clap` arguments (the `minicc` binary).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// System V ABI: ELF object format, `@PLT` call suffixes, `.L`-prefixed
    /// local labels.
    Linux,
    /// Mach-O object format: `_`-prefixed external symbols, `L`-prefixed
    /// locals, no `@PLT` suffix.
    MacOs,
}

impl Platform {
    /// The platform this binary was built for; used as the CLI default.
    pub fn host() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }
}

/// How far through the pipeline to run before stopping, matching the
/// driver's `--lex`/`--parse`/... stop-after flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    Lex,
    Parse,
    Validate,
    Tacky,
    #[default]
    Codegen,
}

#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub platform: Platform,
    pub stop_after: Stage,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            platform: Platform::host(),
            stop_after: Stage::default(),
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_stop_after(mut self, stage: Stage) -> Self {
        self.stop_after = stage;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_runs_the_full_pipeline() {
        assert_eq!(CompilerConfig::default().stop_after, Stage::Codegen);
    }

    #[test]
    fn builder_methods_chain() {
        let config = CompilerConfig::new()
            .with_platform(Platform::MacOs)
            .with_stop_after(Stage::Tacky);
        assert_eq!(config.platform, Platform::MacOs);
        assert_eq!(config.stop_after, Stage::Tacky);
    }
}
