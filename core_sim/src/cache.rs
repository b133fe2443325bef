use crate::{
    common::{AccessKind, Addr, BlockAddr, Lookup},
    geometry::Geometry,
    report::{CacheContents, StreamContents},
    stream::StreamBufferPool,
    tag_array::{TagArray, Way},
};

/// Per-level event counts. All monotonically non-decreasing.
#[derive(Clone, Copy, Default, Debug)]
pub struct AccessCounters {
    pub reads: u64,
    pub writes: u64,
    pub read_misses: u64,
    pub write_misses: u64,
    pub writebacks: u64,
    pub prefetches: u64,
    /// Demand fills from below this level, whether "below" is the next
    /// cache or memory. Misses served by a stream buffer do not count.
    pub demand_fetches: u64,
}

impl AccessCounters {
    pub fn accesses(&self) -> u64 {
        self.reads + self.writes
    }
    pub fn demand_misses(&self) -> u64 {
        self.read_misses + self.write_misses
    }
    /// Block transfers between this level and memory when this is the
    /// last level of the hierarchy.
    pub fn memory_traffic(&self) -> u64 {
        self.demand_misses() + self.writebacks + self.prefetches
    }
}

/// One cache level. Owns its tag array, its stream buffers, and the
/// level below it, if any; an absent lower level means misses are
/// served by memory.
pub struct CacheLevel {
    name: &'static str,
    geometry: Geometry,
    tags: TagArray,
    pool: Option<StreamBufferPool>,
    lower: Option<Box<CacheLevel>>,
    counters: AccessCounters,
}

impl CacheLevel {
    pub fn new(
        name: &'static str,
        geometry: Geometry,
        pool: Option<StreamBufferPool>,
        lower: Option<Box<CacheLevel>>,
    ) -> Self {
        Self {
            name,
            geometry,
            tags: TagArray::new(geometry.num_sets(), geometry.assoc()),
            pool,
            lower,
            counters: AccessCounters::default(),
        }
    }

    /// Resolve one reference against this level. Hits and misses both
    /// return only after every induced lower-level access (writeback,
    /// demand, prefetch) has returned.
    pub fn access(&mut self, addr: Addr, kind: AccessKind) -> Lookup {
        let parts = self.geometry.split(addr);
        match kind {
            AccessKind::Read => self.counters.reads += 1,
            AccessKind::Write => self.counters.writes += 1,
        }

        // The probe consumes the matched slot even when the block turns
        // out to live in the cache as well; the stream keeps running.
        let stream_hit = self.pool.as_mut().and_then(|p| p.probe(parts.block));

        if let Some(way) = self.tags.lookup(parts.index, parts.tag) {
            if kind.is_write() {
                self.tags.mark_dirty(parts.index, way);
            }
            self.tags.touch(parts.index, way);
            if stream_hit.is_some() {
                self.refill_stream(stream_hit, parts.block);
            }
            return Lookup::Hit;
        }

        let victim = self.tags.victim(parts.index);
        let evicted = self.tags.way(parts.index, victim);
        if evicted.valid && evicted.dirty {
            let victim_addr = self.geometry.rebuild(evicted.tag, parts.index);
            log::trace!("{}: writeback of {victim_addr}", self.name);
            if let Some(lower) = self.lower.as_deref_mut() {
                lower.access(victim_addr, AccessKind::Write);
            }
            self.counters.writebacks += 1;
            self.tags.clear_dirty(parts.index, victim);
        }

        if stream_hit.is_some() {
            // The block comes out of the stream buffer: no demand below
            // and no miss charged.
            self.refill_stream(stream_hit, parts.block);
        } else {
            if let Some(lower) = self.lower.as_deref_mut() {
                lower.access(addr, AccessKind::Read);
            }
            self.counters.demand_fetches += 1;
            if self.pool.is_some() {
                log::trace!("{}: new stream after block {}", self.name, parts.block);
                self.refill_stream(None, parts.block);
            }
            match kind {
                AccessKind::Read => self.counters.read_misses += 1,
                AccessKind::Write => self.counters.write_misses += 1,
            }
        }

        self.tags.install(parts.index, victim, parts.tag, kind.is_write());
        Lookup::Miss
    }

    /// Continue the stream in buffer `target`, or start a new stream
    /// from the LRU buffer when `target` is `None`. Each fetched block
    /// is counted and, when a lower level exists, read from it.
    fn refill_stream(&mut self, target: Option<usize>, block: BlockAddr) {
        let offset_bits = self.geometry.offset_bits();
        let Some(pool) = self.pool.as_mut() else {
            return;
        };
        let counters = &mut self.counters;
        let mut lower = self.lower.as_deref_mut();
        let mut fetch = |b: BlockAddr| {
            counters.prefetches += 1;
            if let Some(lower) = lower.as_deref_mut() {
                lower.access(b.byte_addr(offset_bits), AccessKind::Read);
            }
        };
        match target {
            Some(id) => pool.advance(id, block, &mut fetch),
            None => pool.start_stream(block, &mut fetch),
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }
    pub fn counters(&self) -> &AccessCounters {
        &self.counters
    }
    pub fn lower(&self) -> Option<&CacheLevel> {
        self.lower.as_deref()
    }
    pub fn is_last_level(&self) -> bool {
        self.lower.is_none()
    }
    pub fn stream_buffers(&self) -> Option<&StreamBufferPool> {
        self.pool.as_ref()
    }

    /// Valid ways of one set in MRU-to-LRU order.
    pub fn set_contents(&self, index: u32) -> Vec<Way> {
        self.tags.mru_order(index)
    }

    pub fn contents(&self) -> CacheContents<'_> {
        CacheContents::new(self)
    }

    pub fn stream_contents(&self) -> Option<StreamContents<'_>> {
        self.pool.as_ref().map(StreamContents::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(
        blocksize: u32,
        size: u32,
        assoc: u32,
        pref: Option<(u32, u32)>,
        lower: Option<CacheLevel>,
    ) -> CacheLevel {
        let geometry = Geometry::new(blocksize, size, assoc).unwrap();
        let pool = pref.map(|(n, m)| StreamBufferPool::new(n, m));
        CacheLevel::new("L1", geometry, pool, lower.map(Box::new))
    }

    fn read(c: &mut CacheLevel, addr: u32) -> Lookup {
        c.access(Addr::new(addr), AccessKind::Read)
    }

    fn write(c: &mut CacheLevel, addr: u32) -> Lookup {
        c.access(Addr::new(addr), AccessKind::Write)
    }

    #[test]
    fn test_cold_read_then_hit() {
        let mut c = level(16, 64, 1, None, None);
        assert_eq!(read(&mut c, 0x0), Lookup::Miss);
        assert_eq!(read(&mut c, 0x0), Lookup::Hit);
        let s = c.counters();
        assert_eq!(s.reads, 2);
        assert_eq!(s.read_misses, 1);
        assert_eq!(s.writebacks, 0);
        let set0 = c.set_contents(0);
        assert_eq!(set0.len(), 1);
        assert_eq!(set0[0].tag, 0);
        assert!(!set0[0].dirty);
    }

    #[test]
    fn test_conflict_eviction_writes_back() {
        let mut c = level(16, 64, 1, None, None);
        // 0x100 and 0x200 collide in set 0 of a 4-set direct-mapped cache
        assert_eq!(write(&mut c, 0x100), Lookup::Miss);
        assert_eq!(read(&mut c, 0x200), Lookup::Miss);
        let s = c.counters();
        assert_eq!(s.writes, 1);
        assert_eq!(s.write_misses, 1);
        assert_eq!(s.read_misses, 1);
        assert_eq!(s.writebacks, 1);
        let set0 = c.set_contents(0);
        assert_eq!(set0.len(), 1);
        assert_eq!(set0[0].tag, 0x200 >> 6);
        assert!(!set0[0].dirty);
    }

    #[test]
    fn test_sequential_run_rides_stream() {
        let mut c = level(16, 64, 1, Some((1, 4)), None);
        assert_eq!(read(&mut c, 0x00), Lookup::Miss);
        let s = c.counters();
        assert_eq!(s.read_misses, 1);
        assert_eq!(s.prefetches, 4);
        assert_eq!(s.demand_fetches, 1);
        // blocks 1..=3 all miss the cache but ride the stream buffer,
        // each pulling exactly one fresh block into it
        for (addr, expect_pref) in [(0x10u32, 5), (0x20, 6), (0x30, 7)] {
            assert_eq!(read(&mut c, addr), Lookup::Miss);
            assert_eq!(c.counters().prefetches, expect_pref);
        }
        let s = c.counters();
        assert_eq!(s.reads, 4);
        assert_eq!(s.read_misses, 1);
        assert_eq!(s.demand_fetches, 1);
    }

    #[test]
    fn test_stream_probe_treats_writes_like_reads() {
        let mut c = level(16, 64, 1, Some((1, 4)), None);
        read(&mut c, 0x00);
        assert_eq!(write(&mut c, 0x10), Lookup::Miss);
        let s = c.counters();
        // the write miss rode the stream buffer, so it is not charged
        assert_eq!(s.write_misses, 0);
        assert_eq!(s.prefetches, 5);
    }

    #[test]
    fn test_dirty_eviction_lands_in_lower_block() {
        let l2 = level(16, 256, 2, None, None);
        let mut l1 = level(16, 64, 1, None, Some(l2));
        write(&mut l1, 0xdeadbeef);
        // same L1 set, different tag, displaces the dirty line
        read(&mut l1, 0xdeadbfef);
        assert_eq!(l1.counters().writebacks, 1);
        let l2 = l1.lower().unwrap().counters();
        // the writeback arrived as a write and hit the block the demand
        // read had already installed, proving the offset bits were zero
        assert_eq!(l2.writes, 1);
        assert_eq!(l2.write_misses, 0);
        assert_eq!(l2.reads, 2);
        assert_eq!(l2.read_misses, 2);
    }

    #[test]
    fn test_writeback_counted_without_lower_level() {
        let mut c = level(16, 64, 1, None, None);
        write(&mut c, 0x100);
        write(&mut c, 0x200);
        write(&mut c, 0x300);
        assert_eq!(c.counters().writebacks, 2);
    }

    #[test]
    fn test_prefetch_disabled_stays_silent() {
        let mut c = level(16, 64, 1, None, None);
        for addr in [0x0u32, 0x10, 0x20, 0x30, 0x40] {
            read(&mut c, addr);
        }
        assert_eq!(c.counters().prefetches, 0);
        assert!(c.stream_buffers().is_none());
    }

    #[test]
    fn test_interleaved_streams_keep_their_buffers() {
        let mut c = level(16, 1024, 4, Some((2, 4)), None);
        read(&mut c, 0); // block 0: new stream {1..4}
        read(&mut c, 100 << 4); // block 100: new stream {101..104}
        read(&mut c, 1 << 4); // block 1: rides the first stream
        read(&mut c, 101 << 4); // block 101: rides the second
        let pool = c.stream_buffers().unwrap();
        let runs: Vec<Vec<u32>> = pool
            .valid_buffers()
            .map(|b| b.logical_blocks().map(|x| x.inner()).collect())
            .collect();
        assert_eq!(runs, vec![vec![102, 103, 104, 105], vec![2, 3, 4, 5]]);
        // an unrelated miss overwrites the LRU buffer, the 1-series one
        read(&mut c, 200 << 4);
        let pool = c.stream_buffers().unwrap();
        let runs: Vec<Vec<u32>> = pool
            .valid_buffers()
            .map(|b| b.logical_blocks().map(|x| x.inner()).collect())
            .collect();
        assert_eq!(runs, vec![vec![201, 202, 203, 204], vec![102, 103, 104, 105]]);
    }

    #[test]
    fn test_counters_stay_conservative() {
        let mut c = level(16, 128, 2, None, None);
        let mut prev = *c.counters();
        for step in 0u32..200 {
            let addr = (step * 97) % 0x800;
            if step % 3 == 0 {
                write(&mut c, addr);
            } else {
                read(&mut c, addr);
            }
            let s = *c.counters();
            assert!(s.reads >= prev.reads && s.writes >= prev.writes);
            assert!(s.read_misses >= prev.read_misses);
            assert!(s.write_misses >= prev.write_misses);
            assert!(s.writebacks >= prev.writebacks);
            assert!(s.read_misses <= s.reads);
            assert!(s.write_misses <= s.writes);
            assert!(s.writebacks <= s.demand_misses());
            prev = s;
        }
    }
}
