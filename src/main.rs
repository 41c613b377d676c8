//! Demand Pager - Main Entry Point
//!
//! Usage: demand-pager [OPTIONS] <POLICY> <FRAMES> <INPUT>
//!
//! Runs every operation of the input file against a region paged with the
//! chosen replacement policy, and writes one line per fault to
//! `<output dir>/result-<policy>-<frames>-<input name>`.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::{debug, info};

use demand_pager::constants::{host_page_size, DEFAULT_REGION_PAGES};
use demand_pager::io::{output_path, read_operations, write_results};
use demand_pager::mmu::{Memory, Mmu};
use demand_pager::region::{Policy, RegionConfig};
use demand_pager::stats::StatsLog;
use demand_pager::{Error, FaultKind};

/// Command-line configuration
#[derive(Debug, Parser)]
#[command(name = "demand-pager", version, about = "User-space demand paging simulator")]
struct Config {
    /// Replacement policy: 1 or fifo, 2 or third/clock
    policy: Policy,

    /// Number of physical frames
    frames: usize,

    /// Operation file: one `<read|write> <page> <word offset> <value>` per line
    input: PathBuf,

    /// Directory the result file is written to
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Pages in the region
    #[arg(long, default_value_t = DEFAULT_REGION_PAGES)]
    pages: usize,

    /// Page size in bytes (defaults to the host page size)
    #[arg(long)]
    page_size: Option<usize>,

    /// Page real memory through mprotect and SIGSEGV
    #[arg(long)]
    native: bool,

    /// Print per-fault and summary information
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let config = Config::parse();

    let level = if config.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    // Run the pager and handle any errors
    if let Err(e) = run(&config) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(config: &Config) -> Result<(), Error> {
    if config.frames == 0 {
        return Err(Error::InvalidFrameCount(config.frames));
    }

    let ops = read_operations(&config.input)?;
    debug!("{} operations from {}", ops.len(), config.input.display());

    let (log, page_size) = if config.native {
        run_native(config, &ops)?
    } else {
        let page_size = config.page_size.unwrap_or_else(host_page_size);
        let size = config.pages.checked_mul(page_size).ok_or_else(|| {
            Error::InvalidRegion(format!(
                "{} pages of {} bytes overflow the address space",
                config.pages, page_size
            ))
        })?;
        let region = RegionConfig::new(config.policy, 0, size, config.frames, page_size)?;
        let mut mmu = Mmu::new(region)?;
        mmu.run(&ops)?;
        (mmu.into_log(), page_size)
    };

    if config.verbose {
        print_summary(&log);
    }

    let path = output_path(&config.output_dir, config.policy, config.frames, &config.input);
    write_results(&path, &log, page_size, config.frames)?;
    info!("Output file: {}", path.display());

    Ok(())
}

#[cfg(all(feature = "native", target_os = "linux", target_arch = "x86_64"))]
fn run_native(
    config: &Config,
    ops: &[demand_pager::io::Operation],
) -> Result<(StatsLog, usize), Error> {
    use demand_pager::native::NativeRegion;

    if config.page_size.is_some() {
        return Err(Error::InvalidRegion(
            "--page-size cannot be used with --native".to_string(),
        ));
    }
    let mut region = NativeRegion::new(config.policy, config.frames, config.pages)?;
    region.run(ops)?;

    // The log lives with the region; copy it out before the mapping goes away.
    Ok((region.log().clone(), region.page_size()))
}

#[cfg(not(all(feature = "native", target_os = "linux", target_arch = "x86_64")))]
fn run_native(
    _config: &Config,
    _ops: &[demand_pager::io::Operation],
) -> Result<(StatsLog, usize), Error> {
    Err(Error::InvalidRegion(
        "native paging needs Linux x86-64 and the `native` feature".to_string(),
    ))
}

fn print_summary(log: &StatsLog) {
    let summary = log.summary();
    eprintln!();
    eprintln!("=== Summary ===");
    eprintln!("Faults:     {}", summary.faults);
    for kind in FaultKind::ALL {
        eprintln!("  {:<18} {}", kind.to_string(), summary.count(kind));
    }
    eprintln!("Evictions:  {}", summary.evictions);
    eprintln!("Writebacks: {}", summary.writebacks);
    eprintln!();
}
