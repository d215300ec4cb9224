//! Fixed-slot packet buffer arena.
//!
//! A [`PacketPool`] carves a caller-provided memory region into `slot_count`
//! slots of `slot_size` payload bytes, each preceded by a small header. The
//! region is borrowed for the lifetime of the pool and can be taken back with
//! [`PacketPool::into_region`] once every buffer has been returned.
//!
//! # Usage
//!
//! ```ignore
//! use packet_pool::PacketPool;
//!
//! static mut REGION: [u8; PacketPool::required_region(1536, 20)] = [0; _];
//!
//! let pool = PacketPool::create("net-pool", 1536, 20, region)?;
//! let mut pkt = pool.allocate()?;
//! pkt.payload_mut()[..4].copy_from_slice(b"ping");
//! pkt.set_len(4)?;
//! // slot returns to the pool when `pkt` drops
//! ```

#![no_std]

use core::marker::PhantomData;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

use spin::Mutex;

/// Size of the per-slot header that precedes every payload.
pub const SLOT_HEADER_SIZE: usize = 16;

/// Upper bound on slots per pool (size of the free map).
pub const MAX_SLOTS: usize = 256;

const SLOT_MAGIC: u32 = 0x504B_5430;
const FLAG_IN_USE: u16 = 0x0001;
const MAP_WORDS: usize = MAX_SLOTS / 64;

// ============================================================================
// Error types
// ============================================================================

/// Packet pool errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("slot size must be non-zero")]
    ZeroSlotSize,
    #[error("slot count must be non-zero")]
    ZeroSlots,
    #[error("slot count {requested} exceeds the {max} slot limit")]
    TooManySlots { requested: usize, max: usize },
    #[error("region of {actual} bytes is smaller than the {required} bytes required")]
    RegionTooSmall { required: usize, actual: usize },
    #[error("no free packets")]
    OutOfPackets,
    #[error("length {len} exceeds slot capacity {capacity}")]
    LengthOverflow { len: usize, capacity: usize },
}

/// Result type for pool operations.
pub type Result<T> = core::result::Result<T, PoolError>;

// ============================================================================
// Slot header
// ============================================================================

/// On-region slot header, little-endian.
///
/// ```text
/// 0      4       6       8       12      16
/// | magic | index | flags |  len  | rsvd  |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlotHeader {
    magic: u32,
    index: u16,
    flags: u16,
    len: u32,
}

impl SlotHeader {
    fn write(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.magic.to_le_bytes());
        out[4..6].copy_from_slice(&self.index.to_le_bytes());
        out[6..8].copy_from_slice(&self.flags.to_le_bytes());
        out[8..12].copy_from_slice(&self.len.to_le_bytes());
        out[12..16].fill(0);
    }

    fn read(raw: &[u8]) -> Self {
        Self {
            magic: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            index: u16::from_le_bytes([raw[4], raw[5]]),
            flags: u16::from_le_bytes([raw[6], raw[7]]),
            len: u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]),
        }
    }
}

// ============================================================================
// Free map
// ============================================================================

struct FreeMap {
    used: [u64; MAP_WORDS],
    count: usize,
}

impl FreeMap {
    const fn new(count: usize) -> Self {
        Self { used: [0; MAP_WORDS], count }
    }

    fn claim(&mut self) -> Option<usize> {
        for (word_idx, word) in self.used.iter_mut().enumerate() {
            if *word == u64::MAX {
                continue;
            }
            let bit = (!*word).trailing_zeros() as usize;
            let idx = word_idx * 64 + bit;
            if idx >= self.count {
                return None;
            }
            *word |= 1 << bit;
            return Some(idx);
        }
        None
    }

    fn release(&mut self, idx: usize) -> bool {
        let (word, bit) = (idx / 64, idx % 64);
        let was_used = self.used[word] & (1 << bit) != 0;
        self.used[word] &= !(1 << bit);
        was_used
    }

    fn in_use(&self) -> usize {
        self.used.iter().map(|w| w.count_ones() as usize).sum()
    }
}

// ============================================================================
// PacketPool
// ============================================================================

/// Snapshot of pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub total: usize,
    pub free: usize,
    pub allocations: usize,
    pub empty_requests: usize,
}

/// A fixed-slot packet arena over a borrowed region.
pub struct PacketPool<'r> {
    name: &'static str,
    base: NonNull<u8>,
    region_len: usize,
    slot_size: usize,
    slot_count: usize,
    free: Mutex<FreeMap>,
    allocations: AtomicUsize,
    empty_requests: AtomicUsize,
    _region: PhantomData<&'r mut [u8]>,
}

// SAFETY: the region is exclusively borrowed for 'r, and each slot is handed
// to at most one PacketBuf at a time under the free-map lock.
unsafe impl Send for PacketPool<'_> {}
unsafe impl Sync for PacketPool<'_> {}

impl<'r> PacketPool<'r> {
    /// Bytes of backing region needed for the given geometry.
    ///
    /// Saturates at `usize::MAX` for geometries no region can hold.
    pub const fn required_region(slot_size: usize, slot_count: usize) -> usize {
        slot_size.saturating_add(SLOT_HEADER_SIZE).saturating_mul(slot_count)
    }

    /// Validate a pool geometry against a region length.
    pub fn check_layout(slot_size: usize, slot_count: usize, region_len: usize) -> Result<()> {
        if slot_size == 0 {
            return Err(PoolError::ZeroSlotSize);
        }
        if slot_count == 0 {
            return Err(PoolError::ZeroSlots);
        }
        if slot_count > MAX_SLOTS {
            return Err(PoolError::TooManySlots { requested: slot_count, max: MAX_SLOTS });
        }
        let required = slot_size
            .checked_add(SLOT_HEADER_SIZE)
            .and_then(|stride| stride.checked_mul(slot_count))
            .ok_or(PoolError::RegionTooSmall { required: usize::MAX, actual: region_len })?;
        if region_len < required {
            return Err(PoolError::RegionTooSmall { required, actual: region_len });
        }
        Ok(())
    }

    /// Carve `region` into `slot_count` packets of `slot_size` bytes.
    pub fn create(
        name: &'static str,
        slot_size: usize,
        slot_count: usize,
        region: &'r mut [u8],
    ) -> Result<Self> {
        Self::check_layout(slot_size, slot_count, region.len())?;

        region.fill(0);
        let region_len = region.len();
        let base = NonNull::from(region).cast::<u8>();

        log::debug!(
            "[POOL] {}: {} x {} bytes ({} byte region)",
            name,
            slot_count,
            slot_size,
            region_len
        );

        Ok(Self {
            name,
            base,
            region_len,
            slot_size,
            slot_count,
            free: Mutex::new(FreeMap::new(slot_count)),
            allocations: AtomicUsize::new(0),
            empty_requests: AtomicUsize::new(0),
            _region: PhantomData,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    #[inline]
    fn stride(&self) -> usize {
        SLOT_HEADER_SIZE + self.slot_size
    }

    /// Claim a free slot.
    pub fn allocate(&self) -> Result<PacketBuf<'_>> {
        let index = match self.free.lock().claim() {
            Some(idx) => idx,
            None => {
                self.empty_requests.fetch_add(1, Ordering::Relaxed);
                return Err(PoolError::OutOfPackets);
            }
        };
        self.allocations.fetch_add(1, Ordering::Relaxed);

        let mut buf = PacketBuf { pool: self, index, len: 0 };
        SlotHeader { magic: SLOT_MAGIC, index: index as u16, flags: FLAG_IN_USE, len: 0 }
            .write(buf.header_mut());
        Ok(buf)
    }

    fn release(&self, index: usize) {
        if !self.free.lock().release(index) {
            log::warn!("[POOL] {}: slot {} released twice", self.name, index);
        }
    }

    pub fn stats(&self) -> PoolStats {
        let in_use = self.free.lock().in_use();
        PoolStats {
            total: self.slot_count,
            free: self.slot_count - in_use,
            allocations: self.allocations.load(Ordering::Relaxed),
            empty_requests: self.empty_requests.load(Ordering::Relaxed),
        }
    }

    /// Dismantle the pool and hand the backing region back.
    pub fn into_region(self) -> &'r mut [u8] {
        // SAFETY: base/region_len came from a `&'r mut [u8]`, and consuming
        // self proves no PacketBuf borrows remain.
        unsafe { core::slice::from_raw_parts_mut(self.base.as_ptr(), self.region_len) }
    }

    /// # Safety
    ///
    /// `index` must be claimed by the caller, which must hold the only
    /// reference to that slot.
    #[allow(clippy::mut_from_ref)]
    unsafe fn slot_mut(&self, index: usize) -> &mut [u8] {
        let ptr = self.base.as_ptr().add(index * self.stride());
        core::slice::from_raw_parts_mut(ptr, self.stride())
    }
}

impl core::fmt::Debug for PacketPool<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PacketPool")
            .field("name", &self.name)
            .field("slot_size", &self.slot_size)
            .field("slot_count", &self.slot_count)
            .finish()
    }
}

// ============================================================================
// PacketBuf
// ============================================================================

/// A claimed packet slot. Returned to its pool on drop.
pub struct PacketBuf<'p> {
    pool: &'p PacketPool<'p>,
    index: usize,
    len: usize,
}

impl PacketBuf<'_> {
    fn header_mut(&mut self) -> &mut [u8] {
        // SAFETY: self owns slot `index` until drop.
        unsafe { &mut self.pool.slot_mut(self.index)[..SLOT_HEADER_SIZE] }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.pool.slot_size
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn set_len(&mut self, len: usize) -> Result<()> {
        if len > self.capacity() {
            return Err(PoolError::LengthOverflow { len, capacity: self.capacity() });
        }
        self.len = len;
        let index = self.index as u16;
        SlotHeader { magic: SLOT_MAGIC, index, flags: FLAG_IN_USE, len: len as u32 }
            .write(self.header_mut());
        Ok(())
    }

    /// Valid bytes.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: self owns slot `index` until drop.
        let slot = unsafe { self.pool.slot_mut(self.index) };
        &slot[SLOT_HEADER_SIZE..SLOT_HEADER_SIZE + self.len]
    }

    /// The whole payload area, regardless of `len`.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        // SAFETY: self owns slot `index` until drop.
        unsafe { &mut self.pool.slot_mut(self.index)[SLOT_HEADER_SIZE..] }
    }
}

impl Drop for PacketBuf<'_> {
    fn drop(&mut self) {
        let index = self.index;
        let header = SlotHeader::read(self.header_mut());
        if header.magic != SLOT_MAGIC || header.index as usize != index {
            log::warn!("[POOL] {}: slot {} header corrupted", self.pool.name, index);
        }
        SlotHeader { magic: SLOT_MAGIC, index: index as u16, flags: 0, len: 0 }
            .write(self.header_mut());
        self.pool.release(index);
    }
}

impl core::fmt::Debug for PacketBuf<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PacketBuf")
            .field("index", &self.index)
            .field("len", &self.len)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_region() {
        assert_eq!(PacketPool::required_region(1536, 20), (1536 + 16) * 20);
        assert_eq!(PacketPool::required_region(usize::MAX - 4, 2), usize::MAX);
    }

    #[test]
    fn test_huge_slot_size_is_rejected() {
        assert_eq!(
            PacketPool::check_layout(usize::MAX - 4, 2, 4096),
            Err(PoolError::RegionTooSmall { required: usize::MAX, actual: 4096 })
        );
        assert_eq!(
            PacketPool::check_layout(usize::MAX / 2, 3, 4096),
            Err(PoolError::RegionTooSmall { required: usize::MAX, actual: 4096 })
        );
    }

    #[test]
    fn test_check_layout() {
        assert_eq!(PacketPool::check_layout(0, 4, 1024), Err(PoolError::ZeroSlotSize));
        assert_eq!(PacketPool::check_layout(64, 0, 1024), Err(PoolError::ZeroSlots));
        assert_eq!(
            PacketPool::check_layout(64, 4, 100),
            Err(PoolError::RegionTooSmall { required: 320, actual: 100 })
        );
        assert!(matches!(
            PacketPool::check_layout(8, MAX_SLOTS + 1, 1 << 20),
            Err(PoolError::TooManySlots { .. })
        ));
        assert!(PacketPool::check_layout(64, 4, 320).is_ok());
    }

    #[test]
    fn test_exhaustion_and_reuse() {
        let mut region = [0u8; 4 * (32 + SLOT_HEADER_SIZE)];
        let pool = PacketPool::create("t", 32, 4, &mut region).unwrap();

        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();
        let c = pool.allocate().unwrap();
        let d = pool.allocate().unwrap();
        assert_eq!(pool.allocate().unwrap_err(), PoolError::OutOfPackets);
        assert_eq!(pool.stats().free, 0);
        assert_eq!(pool.stats().empty_requests, 1);

        let freed = b.index();
        drop(b);
        let e = pool.allocate().unwrap();
        assert_eq!(e.index(), freed);

        drop((a, c, d, e));
        assert_eq!(pool.stats().free, 4);
        assert_eq!(pool.stats().allocations, 5);
    }

    #[test]
    fn test_slots_are_disjoint() {
        let mut region = [0u8; 2 * (8 + SLOT_HEADER_SIZE)];
        let pool = PacketPool::create("t", 8, 2, &mut region).unwrap();

        let mut a = pool.allocate().unwrap();
        let mut b = pool.allocate().unwrap();
        a.payload_mut().fill(0xAA);
        b.payload_mut().fill(0xBB);
        a.set_len(8).unwrap();
        b.set_len(3).unwrap();

        assert!(a.as_slice().iter().all(|&x| x == 0xAA));
        assert_eq!(b.as_slice(), &[0xBB; 3]);
    }

    #[test]
    fn test_set_len_overflow() {
        let mut region = [0u8; 8 + SLOT_HEADER_SIZE];
        let pool = PacketPool::create("t", 8, 1, &mut region).unwrap();
        let mut pkt = pool.allocate().unwrap();
        assert_eq!(pkt.set_len(9), Err(PoolError::LengthOverflow { len: 9, capacity: 8 }));
        assert!(pkt.is_empty());
    }

    #[test]
    fn test_header_layout() {
        let mut region = [0u8; 2 * (8 + SLOT_HEADER_SIZE)];
        let pool = PacketPool::create("t", 8, 2, &mut region).unwrap();
        let a = pool.allocate().unwrap();
        let mut b = pool.allocate().unwrap();
        b.set_len(5).unwrap();
        core::mem::forget(a);
        core::mem::forget(b);

        let region = pool.into_region();
        let hdr = SlotHeader::read(&region[24..40]);
        assert_eq!(hdr.magic, SLOT_MAGIC);
        assert_eq!(hdr.index, 1);
        assert_eq!(hdr.flags, FLAG_IN_USE);
        assert_eq!(hdr.len, 5);
    }

    #[test]
    fn test_into_region_returns_whole_region() {
        let mut region = [0u8; 100];
        let pool = PacketPool::create("t", 16, 2, &mut region).unwrap();
        {
            let mut pkt = pool.allocate().unwrap();
            pkt.payload_mut()[0] = 7;
        }
        let back = pool.into_region();
        assert_eq!(back.len(), 100);
        assert_eq!(back[SLOT_HEADER_SIZE], 7);
    }
}
