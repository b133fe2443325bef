//! Stream buffers: small FIFOs of consecutive block addresses fetched
//! ahead of a detected sequential run.

use std::collections::VecDeque;

use crate::common::BlockAddr;

/// When valid, `blocks[(head + i) % depth]` holds `base + i` for some
/// base block, so reading from `head` yields an ascending unit-stride
/// run.
pub struct StreamBuffer {
    valid: bool,
    head: usize,
    blocks: Vec<BlockAddr>,
}

impl StreamBuffer {
    fn new(depth: usize) -> Self {
        Self {
            valid: false,
            head: 0,
            blocks: vec![BlockAddr::new(0); depth],
        }
    }

    /// Blocks in logical order, starting at `head` and wrapping.
    pub fn logical_blocks(&self) -> impl Iterator<Item = BlockAddr> + '_ {
        let depth = self.blocks.len();
        (0..depth).map(move |i| self.blocks[(self.head + i) % depth])
    }
}

/// Fixed pool of stream buffers, front = MRU, back = LRU. Buffers move
/// to the front whenever they are refilled.
///
/// Refills report each fetched block through the `fetch` sink; the
/// owning cache level counts prefetches and forwards the reads below.
pub struct StreamBufferPool {
    buffers: VecDeque<StreamBuffer>,
    depth: usize,
}

impl StreamBufferPool {
    pub fn new(count: u32, depth: u32) -> Self {
        let depth = depth as usize;
        Self {
            buffers: (0..count).map(|_| StreamBuffer::new(depth)).collect(),
            depth,
        }
    }

    /// Scan MRU-to-LRU for `block`. The first match consumes through the
    /// matched slot (head moves past it) and returns the buffer id valid
    /// until the next pool mutation.
    pub fn probe(&mut self, block: BlockAddr) -> Option<usize> {
        let depth = self.depth;
        for (id, buf) in self.buffers.iter_mut().enumerate() {
            if !buf.valid {
                continue;
            }
            if let Some(slot) = buf.blocks.iter().position(|&b| b == block) {
                buf.head = (slot + 1) % depth;
                return Some(id);
            }
        }
        None
    }

    /// Start a new stream in the LRU buffer: overwrite every slot with
    /// the blocks after `block` and promote the buffer to MRU. Every
    /// slot write is reported to `fetch` in ascending block order.
    pub fn start_stream(&mut self, block: BlockAddr, fetch: &mut impl FnMut(BlockAddr)) {
        let id = self.buffers.len() - 1;
        let buf = &mut self.buffers[id];
        for (i, slot) in buf.blocks.iter_mut().enumerate() {
            let b = block.disp(1 + i as u32);
            *slot = b;
            fetch(b);
        }
        buf.head = 0;
        buf.valid = true;
        self.promote(id);
    }

    /// Continue the stream in buffer `id` after a probe hit on `block`:
    /// rewrite only the slots that went stale when the head advanced,
    /// reporting each in ascending block order, then promote to MRU.
    pub fn advance(&mut self, id: usize, block: BlockAddr, fetch: &mut impl FnMut(BlockAddr)) {
        let depth = self.depth;
        let buf = &mut self.buffers[id];
        for i in 0..depth {
            let pos = (buf.head + i) % depth;
            let expected = block.disp(1 + i as u32);
            if buf.blocks[pos] != expected {
                buf.blocks[pos] = expected;
                fetch(expected);
            }
        }
        buf.valid = true;
        self.promote(id);
    }

    fn promote(&mut self, id: usize) {
        if let Some(buf) = self.buffers.remove(id) {
            self.buffers.push_front(buf);
        }
    }

    /// Valid buffers in MRU-to-LRU order.
    pub fn valid_buffers(&self) -> impl Iterator<Item = &StreamBuffer> {
        self.buffers.iter().filter(|b| b.valid)
    }
}
