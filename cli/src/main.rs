use clap::{ArgAction, Parser};
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use plist_config_compiler::fragments::DEFAULT_INCLUDE;
use plist_config_compiler::{
    generate, Artifact, ConfigGenError, FragmentVars, Fragments, GenerateOptions, OutFlags, Prefix, TraceFlags,
};
use tempfile::NamedTempFile;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "plist2config")]
#[command(
    about = "Generate OpenCore .c and .h config definition files from a template plist file",
    long_about = None,
    disable_help_flag = true
)]
struct Cli {
    /// Input template `.plist` file
    infile: PathBuf,

    /// Show this help message and exit
    #[arg(short = '?', long = "help", action = ArgAction::Help)]
    help: Option<bool>,

    /// Output `.c` file
    #[arg(short = 'c', value_name = "c_file")]
    c: Option<PathBuf>,

    /// Output `.h` file
    #[arg(short = 'h', value_name = "h_file")]
    h: Option<PathBuf>,

    /// Stdout trace flags, hex (`0x..`) or decimal:
    /// 0x01 echo, 0x02 keys, 0x04 types, 0x08 debug, 0x10 context, 0x20 original
    #[arg(short = 'f', value_name = "flags", default_value = "0x01", value_parser = parse_trace_flags)]
    flags: TraceFlags,

    /// Initial output flags: 1 plist echo, 2 .c, 4 .h
    #[arg(short = 'o', value_name = "out_flags", default_value = "7", value_parser = parse_out_flags)]
    out: OutFlags,

    /// Directory holding the .c/.h intro and outro fragments
    /// (default: `fragments` next to the executable)
    #[arg(long, value_name = "fragdir")]
    fragments: Option<PathBuf>,

    /// Include line substituted into intro.c
    #[arg(long, value_name = "include", default_value = DEFAULT_INCLUDE)]
    include: String,

    /// Prefix for non-default applications
    #[arg(long, value_name = "prefix", default_value = Prefix::DEFAULT)]
    prefix: String,

    /// Write the resolved schema tree as JSON
    #[arg(long, value_name = "ir_file")]
    ir: Option<PathBuf>,
}

fn parse_trace_flags(text: &str) -> Result<TraceFlags, String> {
    TraceFlags::parse(text).ok_or_else(|| format!("invalid flags value \"{}\"", text))
}

fn parse_out_flags(text: &str) -> Result<OutFlags, String> {
    match TraceFlags::parse(text) {
        Some(TraceFlags(value)) if value <= OutFlags::ALL.0 => Ok(OutFlags(value)),
        _ => Err(format!("invalid out_flags value \"{}\", expected 0..=7", text)),
    }
}

fn init_tracing(flags: TraceFlags) {
    let filter = if flags.contains(TraceFlags::DEBUG) {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn fragments_dir(cli: &Cli) -> Result<PathBuf, ConfigGenError> {
    if let Some(dir) = &cli.fragments {
        return Ok(dir.clone());
    }
    let exe = env::current_exe()?;
    Ok(exe.parent().map(Path::to_path_buf).unwrap_or_default().join("fragments"))
}

/// Writes `contents` to a temporary file in the directory of `path`.
fn stage(path: &Path, contents: &str) -> Result<NamedTempFile, ConfigGenError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    Ok(file)
}

/// Stages every output before renaming any of them into place.
fn write_outputs(outputs: Vec<(&PathBuf, String)>) -> Result<(), ConfigGenError> {
    let mut staged = Vec::with_capacity(outputs.len());
    for (path, contents) in outputs {
        staged.push((path, stage(path, &contents)?));
    }
    for (path, file) in staged {
        debug!(path = %path.display(), "writing");
        file.persist(path).map_err(|e| e.error)?;
    }
    Ok(())
}

/// Runs the generator and writes the requested files. Returns the console
/// text for stdout; nothing is written unless the whole run succeeds.
fn run(cli: &Cli) -> Result<String, ConfigGenError> {
    let prefix = Prefix::new(&cli.prefix);
    debug!(prefix = %prefix.camel, upper = %prefix.upper, "prefix");

    let vars = FragmentVars {
        program:  env::args().next().map(|arg0| basename(Path::new(&arg0))).unwrap_or_default(),
        template: basename(&cli.infile),
        include:  cli.include.clone(),
        prefix:   prefix.clone(),
    };

    let header = match &cli.h {
        Some(path) => Some((path, Fragments::load(&fragments_dir(cli)?, Artifact::Header, &vars)?)),
        None => None,
    };
    let source = match &cli.c {
        Some(path) => Some((path, Fragments::load(&fragments_dir(cli)?, Artifact::Source, &vars)?)),
        None => None,
    };

    debug!(infile = %cli.infile.display(), "reading template");
    let text = fs::read_to_string(&cli.infile)?;

    let options = GenerateOptions {
        trace: cli.flags,
        out: cli.out,
        prefix,
    };
    let generated = generate(&text, &options)?;

    let mut outputs = Vec::new();
    if let Some((path, fragments)) = header {
        outputs.push((path, fragments.render(&generated.streams, cli.out)));
    }
    if let Some((path, fragments)) = source {
        outputs.push((path, fragments.render(&generated.streams, cli.out)));
    }
    if let Some(path) = &cli.ir {
        outputs.push((path, serde_json::to_string_pretty(&generated.root)? + "\n"));
    }
    write_outputs(outputs)?;

    Ok(generated.console)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.flags);

    match run(&cli) {
        Ok(console) => {
            print!("{}", console);
            ExitCode::SUCCESS
        }
        Err(e) => {
            let label = if e.is_internal() { "INTERNAL_ERROR" } else { "ERROR" };
            eprintln!("{}: {}", label, e);
            ExitCode::from(1)
        }
    }
}
