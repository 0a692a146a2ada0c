use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::errors::VxfsError;
use crate::modules::recover::{RecoverOptions, RecoverRules, RecoveryReport, run};

// logging
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "vxfs-recover",
    about = "Recover file names and layout from VxWorks firmware images",
    version
)]
pub struct Cli {
    /// global log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// firmware image to recover
    pub firmware: Option<PathBuf>,

    /// skip the web asset cross-reference and rank blobs statistically
    #[arg(long)]
    pub fuzzy_mode: bool,

    /// rules file (yaml or json); built-in defaults otherwise
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// directory that receives the extraction root
    #[arg(long, default_value = ".")]
    pub workdir: PathBuf,

    /// kill the extraction tool after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// write a JSON run report here
    #[arg(long)]
    pub report: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write the default rules to a yaml/json file for editing
    RulesTemplate { out: PathBuf },
}

fn print_summary(report: &RecoveryReport) {
    let rec = &report.reconstruction;
    println!(
        "[+] table in {} (anchor 0x{:X}, {:?}, {} entries)",
        report.candidate.path.display(),
        report.anchor,
        report.format,
        report.entries
    );
    println!("[+] filesystem base 0x{:X}", report.base_offset);
    println!(
        "[+] {} files restored under {}",
        rec.copied.len(),
        rec.result_root.display()
    );
    if !rec.missing.is_empty() {
        println!("[-] {} table entries had no carved blob:", rec.missing.len());
        for m in &rec.missing {
            println!("    {} (0x{:X})", m.name, m.absolute_offset);
        }
    }
    for f in &rec.failed {
        println!("[-] {} not restored: {}", f.name, f.error);
    }
    match &report.symbol_table {
        Some(p) => println!("[+] symbol table: {}", p.display()),
        None => println!("[-] no symbol table found"),
    }
    if let Some(p) = &report.main_program {
        println!("[+] main program: {}", p.display());
    }
}

pub fn run_from_args<I, T>(args: I) -> Result<(), VxfsError>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return Ok(());
        }
        Err(e) => return Err(VxfsError::InvalidArguments(e.to_string())),
    };

    // initialize tracing according to log_level (ok if already initialized in tests)
    let env_filter = EnvFilter::try_new(&cli.log_level)
        .map_err(|e| VxfsError::InvalidArguments(format!("bad --log-level: {}", e)))?;
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
    info!("Starting vxfs-recover, log_level={}", cli.log_level);

    if let Some(Commands::RulesTemplate { out }) = &cli.cmd {
        RecoverRules::write_template(out)?;
        println!("[+] rules template written to {}", out.display());
        return Ok(());
    }

    let firmware = cli.firmware.clone().ok_or_else(|| VxfsError::MissingArgument {
        arg: "<FIRMWARE>".to_string(),
    })?;
    let rules = match &cli.rules {
        Some(path) => RecoverRules::load(path)?,
        None => RecoverRules::default(),
    };
    let opts = RecoverOptions {
        firmware,
        workdir: cli.workdir.clone(),
        fuzzy_mode: cli.fuzzy_mode,
        timeout_secs: cli.timeout_secs,
        report_path: cli.report.clone(),
    };

    let report = run(&opts, &rules)?;
    print_summary(&report);
    Ok(())
}

/// Run using environment args
pub fn run_cli() -> Result<(), VxfsError> {
    run_from_args(std::env::args())
}
