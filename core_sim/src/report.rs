//! Read-only views over the hierarchy, printed after the whole trace
//! has been processed. The formats match the reference simulator output
//! character for character.

use std::fmt;

use crate::{
    cache::{AccessCounters, CacheLevel},
    stream::StreamBufferPool,
};

fn ratio(n: u64, d: u64) -> f64 {
    if d == 0 {
        0.0
    } else {
        (n as f64 / d as f64).max(0.0)
    }
}

/// Tag-array snapshot of one level: per set, the valid ways in MRU-to-
/// LRU order, dirty lines flagged `D`.
pub struct CacheContents<'a> {
    level: &'a CacheLevel,
}

impl<'a> CacheContents<'a> {
    pub fn new(level: &'a CacheLevel) -> Self {
        Self { level }
    }
}

impl fmt::Display for CacheContents<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "===== {} contents =====", self.level.name())?;
        for index in 0..self.level.geometry().num_sets() {
            write!(f, "set {index:6}:    ")?;
            for way in self.level.set_contents(index) {
                let dirty = if way.dirty { 'D' } else { ' ' };
                write!(f, "{:x} {}   ", way.tag, dirty)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Valid stream buffers in MRU-to-LRU order, each as its blocks in
/// logical order from the head.
pub struct StreamContents<'a> {
    pool: &'a StreamBufferPool,
}

impl<'a> StreamContents<'a> {
    pub fn new(pool: &'a StreamBufferPool) -> Self {
        Self { pool }
    }
}

impl fmt::Display for StreamContents<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "===== Stream Buffer(s) contents =====")?;
        for buf in self.pool.valid_buffers() {
            for block in buf.logical_blocks() {
                write!(f, " {block} ")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// The a-q measurement block.
#[derive(Clone, Copy, Debug, Default)]
pub struct Measurements {
    pub l1_reads: u64,
    pub l1_read_misses: u64,
    pub l1_writes: u64,
    pub l1_write_misses: u64,
    pub l1_miss_rate: f64,
    pub l1_writebacks: u64,
    pub l1_prefetches: u64,
    pub l2_demand_reads: u64,
    pub l2_demand_read_misses: u64,
    /// Always zero: prefetching is modeled only at the last level, so
    /// no prefetch reads arrive at L2 from above.
    pub l2_prefetch_reads: u64,
    pub l2_prefetch_read_misses: u64,
    pub l2_writes: u64,
    pub l2_write_misses: u64,
    pub l2_miss_rate: f64,
    pub l2_writebacks: u64,
    pub l2_prefetches: u64,
    pub memory_traffic: u64,
}

impl Measurements {
    pub fn gather(l1: &CacheLevel, l2: Option<&CacheLevel>) -> Self {
        let l1c = *l1.counters();
        let (l2_demand_reads, l2c) = match l2 {
            Some(l2) => (l1c.demand_fetches, *l2.counters()),
            None => (0, AccessCounters::default()),
        };
        let last = l2.unwrap_or(l1);
        Self {
            l1_reads: l1c.reads,
            l1_read_misses: l1c.read_misses,
            l1_writes: l1c.writes,
            l1_write_misses: l1c.write_misses,
            l1_miss_rate: ratio(l1c.demand_misses(), l1c.accesses()),
            l1_writebacks: l1c.writebacks,
            l1_prefetches: l1c.prefetches,
            l2_demand_reads,
            l2_demand_read_misses: l2c.read_misses,
            l2_prefetch_reads: 0,
            l2_prefetch_read_misses: 0,
            l2_writes: l2c.writes,
            l2_write_misses: l2c.write_misses,
            l2_miss_rate: ratio(l2c.read_misses, l2_demand_reads),
            l2_writebacks: l2c.writebacks,
            l2_prefetches: l2c.prefetches,
            memory_traffic: last.counters().memory_traffic(),
        }
    }
}

impl fmt::Display for Measurements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "===== Measurements =====")?;
        writeln!(f, "{:<31}{}", "a. L1 reads:", self.l1_reads)?;
        writeln!(f, "{:<31}{}", "b. L1 read misses:", self.l1_read_misses)?;
        writeln!(f, "{:<31}{}", "c. L1 writes:", self.l1_writes)?;
        writeln!(f, "{:<31}{}", "d. L1 write misses:", self.l1_write_misses)?;
        writeln!(f, "{:<31}{:.4}", "e. L1 miss rate:", self.l1_miss_rate)?;
        writeln!(f, "{:<31}{}", "f. L1 writebacks:", self.l1_writebacks)?;
        writeln!(f, "{:<31}{}", "g. L1 prefetches:", self.l1_prefetches)?;
        writeln!(f, "{:<31}{}", "h. L2 reads (demand):", self.l2_demand_reads)?;
        writeln!(
            f,
            "{:<31}{}",
            "i. L2 read misses (demand):", self.l2_demand_read_misses
        )?;
        writeln!(f, "{:<31}{}", "j. L2 reads (prefetch):", self.l2_prefetch_reads)?;
        writeln!(
            f,
            "{:<31}{}",
            "k. L2 read misses (prefetch):", self.l2_prefetch_read_misses
        )?;
        writeln!(f, "{:<31}{}", "l. L2 writes:", self.l2_writes)?;
        writeln!(f, "{:<31}{}", "m. L2 write misses:", self.l2_write_misses)?;
        writeln!(f, "{:<31}{:.4}", "n. L2 miss rate:", self.l2_miss_rate)?;
        writeln!(f, "{:<31}{}", "o. L2 writebacks:", self.l2_writebacks)?;
        writeln!(f, "{:<31}{}", "p. L2 prefetches:", self.l2_prefetches)?;
        writeln!(f, "{:<31}{}", "q. memory traffic:", self.memory_traffic)
    }
}
