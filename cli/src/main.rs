use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use core_sim::{
    sim::{SimConfig, Simulator},
    trace,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Block size in bytes, shared by both levels
    blocksize: u32,
    /// L1 size in bytes
    l1_size: u32,
    /// L1 associativity
    l1_assoc: u32,
    /// L2 size in bytes (0 together with L2_ASSOC = 0 disables L2)
    l2_size: u32,
    /// L2 associativity
    l2_assoc: u32,
    /// Number of stream buffers (0 disables prefetching)
    pref_n: u32,
    /// Blocks per stream buffer
    pref_m: u32,
    /// File path to input trace
    trace_file: PathBuf,
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    } else {
        env_logger::init();
    }

    let input = fs::read_to_string(&args.trace_file)
        .with_context(|| format!("cannot read trace file {}", args.trace_file.display()))?;
    let records = trace::parse_trace(&input)?;
    log::info!("parsed {} trace records", records.len());

    let cfg = SimConfig {
        blocksize: args.blocksize,
        l1_size: args.l1_size,
        l1_assoc: args.l1_assoc,
        l2_size: args.l2_size,
        l2_assoc: args.l2_assoc,
        pref_n: args.pref_n,
        pref_m: args.pref_m,
    };
    let mut sim = Simulator::new(&cfg)?;
    sim.run(records);

    print!("{}", sim.l1().contents());
    if let Some(l2) = sim.l2() {
        print!("{}", l2.contents());
    }
    if let Some(buffers) = sim.last_level().stream_contents() {
        print!("{buffers}");
    }
    print!("{}", sim.measurements());
    Ok(())
}
