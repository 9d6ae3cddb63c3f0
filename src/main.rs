//! `minicc` - the command-line driver around the `minic` library: invokes
//! the external preprocessor, runs the compiler core, and optionally shells
//! out to the assembler/linker.

use clap::Parser as ClapParser;
use minic::{CompileError, CompilerConfig, Platform, Stage};
use std::path::{Path, PathBuf};
use std::process::{self, Command};
use tracing::{debug, error};

#[derive(ClapParser)]
#[command(name = "minicc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ahead-of-time compiler for a C subset, emitting x86-64 assembly")]
struct Cli {
    /// Source file to compile
    input: PathBuf,

    /// Stop after lexing
    #[arg(long)]
    lex: bool,
    /// Stop after parsing
    #[arg(long)]
    parse: bool,
    /// Stop after semantic analysis
    #[arg(long)]
    validate: bool,
    /// Stop after IR generation
    #[arg(long)]
    tacky: bool,
    /// Stop after code generation (the default end point short of assembling)
    #[arg(long)]
    codegen: bool,

    /// Stop after emitting the .s file; do not assemble or link
    #[arg(short = 'S')]
    stop_at_asm: bool,
    /// Assemble to a .o file; do not link
    #[arg(short = 'c')]
    assemble_only: bool,
    /// Forwarded verbatim to the linker
    #[arg(short = 'l', value_name = "name")]
    libs: Vec<String>,

    /// Output path override (default: input stem)
    #[arg(short = 'o')]
    output: Option<PathBuf>,

    /// Logging verbosity (also honors RUST_LOG)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level.clone())),
        )
        .with_writer(std::io::stderr)
        .init();

    let stop_after = if cli.lex {
        Stage::Lex
    } else if cli.parse {
        Stage::Parse
    } else if cli.validate {
        Stage::Validate
    } else if cli.tacky {
        Stage::Tacky
    } else {
        Stage::Codegen
    };

    let config = CompilerConfig::new().with_platform(Platform::host()).with_stop_after(stop_after);

    if let Err(e) = run(&cli, &config) {
        error!(error = %e, "compilation failed");
        eprintln!("{e}");
        process::exit(1);
    }
}

fn run(cli: &Cli, config: &CompilerConfig) -> Result<(), CompileError> {
    let stem = cli.input.file_stem().unwrap_or_default();
    let preprocessed_path = cli.input.with_file_name(format!("{}.i", stem.to_string_lossy()));
    let asm_path = cli
        .output
        .clone()
        .filter(|_| cli.stop_at_asm)
        .unwrap_or_else(|| cli.input.with_extension("s"));

    debug!(input = %cli.input.display(), "preprocessing");
    let status = Command::new("gcc")
        .args(["-E", "-P"])
        .arg(&cli.input)
        .arg("-o")
        .arg(&preprocessed_path)
        .status()?;
    if !status.success() {
        return Err(CompileError::Internal("preprocessor failed".into()));
    }

    let source = std::fs::read_to_string(&preprocessed_path)?;
    let _ = std::fs::remove_file(&preprocessed_path);

    debug!("running core pipeline");
    let asm = minic::compile_with_config(&source, config)?;
    if config.stop_after != Stage::Codegen {
        return Ok(());
    }

    std::fs::write(&asm_path, asm)?;
    debug!(path = %asm_path.display(), "wrote assembly");
    if cli.stop_at_asm {
        return Ok(());
    }

    let output = cli.output.clone().unwrap_or_else(|| PathBuf::from(stem));
    if cli.assemble_only {
        assemble(&asm_path, &output.with_extension("o"), config.platform)?;
    } else {
        let object = asm_path.with_extension("o");
        assemble(&asm_path, &object, config.platform)?;
        link(&object, &output, &cli.libs, config.platform)?;
        let _ = std::fs::remove_file(&object);
    }
    let _ = std::fs::remove_file(&asm_path);
    Ok(())
}

fn assemble(asm_path: &Path, object_path: &Path, platform: Platform) -> Result<(), CompileError> {
    debug!(path = %asm_path.display(), "assembling");
    let mut cmd = macos_arch_wrapper(platform, "as");
    let status = cmd.arg(asm_path).arg("-o").arg(object_path).status()?;
    if !status.success() {
        return Err(CompileError::Internal("assembler failed".into()));
    }
    Ok(())
}

fn link(object_path: &Path, output_path: &Path, libs: &[String], platform: Platform) -> Result<(), CompileError> {
    debug!(path = %output_path.display(), "linking");
    let mut cmd = macos_arch_wrapper(platform, "gcc");
    cmd.arg(object_path).arg("-o").arg(output_path);
    for lib in libs {
        cmd.arg(format!("-l{lib}"));
    }
    let status = cmd.status()?;
    if !status.success() {
        return Err(CompileError::Internal("linker failed".into()));
    }
    Ok(())
}

fn macos_arch_wrapper(platform: Platform, program: &str) -> Command {
    if platform == Platform::MacOs {
        let mut cmd = Command::new("arch");
        cmd.args(["-x86_64", program]);
        cmd
    } else {
        Command::new(program)
    }
}
