use crate::{
    cache::CacheLevel,
    common::Lookup,
    geometry::{ConfigError, Geometry},
    report::Measurements,
    stream::StreamBufferPool,
    trace::TraceRecord,
};

/// The eight knobs of the driver interface. An L2 exists unless both
/// `l2_size` and `l2_assoc` are zero; `pref_n == 0` disables
/// prefetching.
#[derive(Clone, Copy, Debug)]
pub struct SimConfig {
    pub blocksize: u32,
    pub l1_size: u32,
    pub l1_assoc: u32,
    pub l2_size: u32,
    pub l2_assoc: u32,
    pub pref_n: u32,
    pub pref_m: u32,
}

impl SimConfig {
    fn has_l2(&self) -> bool {
        self.l2_size != 0 || self.l2_assoc != 0
    }
}

/// Owns the whole hierarchy and feeds it trace records. The stream-
/// buffer prefetcher sits on the last configured level only.
pub struct Simulator {
    l1: CacheLevel,
}

impl Simulator {
    pub fn new(cfg: &SimConfig) -> Result<Self, ConfigError> {
        let pool = match cfg.pref_n {
            0 => None,
            _ if cfg.pref_m == 0 => return Err(ConfigError::ZeroStreamDepth),
            n => Some(StreamBufferPool::new(n, cfg.pref_m)),
        };
        let (l1_pool, lower) = if cfg.has_l2() {
            let geometry = Geometry::new(cfg.blocksize, cfg.l2_size, cfg.l2_assoc)?;
            let l2 = CacheLevel::new("L2", geometry, pool, None);
            (None, Some(Box::new(l2)))
        } else {
            (pool, None)
        };
        let geometry = Geometry::new(cfg.blocksize, cfg.l1_size, cfg.l1_assoc)?;
        Ok(Self {
            l1: CacheLevel::new("L1", geometry, l1_pool, lower),
        })
    }

    pub fn access(&mut self, rec: TraceRecord) -> Lookup {
        let outcome = self.l1.access(rec.addr, rec.kind);
        log::trace!("{} {}: {outcome:?}", rec.kind, rec.addr);
        outcome
    }

    pub fn run(&mut self, records: impl IntoIterator<Item = TraceRecord>) {
        let mut count = 0usize;
        for rec in records {
            self.access(rec);
            count += 1;
        }
        log::info!("processed {count} trace records");
    }

    pub fn l1(&self) -> &CacheLevel {
        &self.l1
    }

    pub fn l2(&self) -> Option<&CacheLevel> {
        self.l1.lower()
    }

    pub fn last_level(&self) -> &CacheLevel {
        self.l2().unwrap_or(&self.l1)
    }

    pub fn measurements(&self) -> Measurements {
        Measurements::gather(&self.l1, self.l2())
    }
}
