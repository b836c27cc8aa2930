//! Buffer descriptors and the placement-safe allocation front end.
//!
//! Every buffer a driver hands to hardware goes through [`SafeDma`]. A
//! request whose natural storage satisfies the device profile is used
//! directly; one that does not is transparently re-routed through a bounce
//! slot, with the original location kept for the CPU side. The sync
//! operations move data between the two locations at the correct points
//! and fold in the cache maintenance call, so a caller can never perform
//! one without the other.

use crate::bounce::BounceArena;
use crate::cache::CacheOps;
use crate::placement::ConstraintProfile;
use crate::source::{DmaChunk, DmaSource};
use crate::{DmaError, Result};
use core::ptr::NonNull;

/// Transfer direction, fixed when the buffer is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// CPU writes, device reads (transmit).
    ToDevice,
    /// Device writes, CPU reads (receive).
    FromDevice,
    /// Either side may write (shared pools).
    Bidirectional,
}

/// Storage backing a descriptor, needed to release it correctly.
#[derive(Debug)]
enum Backing {
    /// Chunk owned by this descriptor, obtained from the source.
    Direct(DmaChunk),
    /// Caller-owned memory wrapped in place; nothing to release.
    Mapped,
}

/// One DMA-visible buffer.
///
/// `origin` is the CPU-side location, `dma` the device-side one. They are
/// the same unless the buffer is bounced, in which case `dma` points into
/// the bounce arena and sync calls copy between the two.
#[derive(Debug)]
pub struct BufferDescriptor {
    origin: NonNull<u8>,
    dma: NonNull<u8>,
    bus: u64,
    len: usize,
    direction: Direction,
    backing: Backing,
    bounce_slot: Option<u16>,
}

impl BufferDescriptor {
    /// Device-visible bus address.
    pub fn bus_addr(&self) -> u64 {
        self.bus
    }

    /// Buffer length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether the transfer is routed through a bounce slot.
    pub fn bounced(&self) -> bool {
        self.bounce_slot.is_some()
    }

    /// CPU-side view of the buffer.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: origin points at `len` valid bytes for this
        // descriptor's lifetime.
        unsafe { core::slice::from_raw_parts(self.origin.as_ptr(), self.len) }
    }

    /// Mutable CPU-side view of the buffer.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above; &mut self guarantees exclusivity.
        unsafe { core::slice::from_raw_parts_mut(self.origin.as_ptr(), self.len) }
    }

    /// Device-side view; distinct from `as_slice` only when bounced.
    ///
    /// Exposed so tests can emulate device writes into the DMA location.
    pub fn dma_slice_mut(&mut self) -> &mut [u8] {
        // SAFETY: dma points at `len` valid bytes (arena slot capacity is
        // checked at allocation).
        unsafe { core::slice::from_raw_parts_mut(self.dma.as_ptr(), self.len) }
    }
}

// SAFETY: the descriptor exclusively owns both of its locations; access
// is serialized by whoever owns the descriptor.
unsafe impl Send for BufferDescriptor {}

/// Placement-safe allocator for one device.
pub struct SafeDma<S: DmaSource> {
    source: S,
    arena: BounceArena,
    profile: ConstraintProfile,
    cache: CacheOps,
    bounces_in_use: usize,
}

impl<S: DmaSource> SafeDma<S> {
    /// Alignment used for bounce slots and ring memory.
    pub const SLOT_ALIGN: usize = 16;

    /// Set up the front end: reserves and validates the bounce arena.
    ///
    /// `bounce_slots` slots of `bounce_slot_size` bytes are carved from a
    /// single source allocation. Fails with `Exhausted` if the source
    /// cannot provide the region, or `BadRegion` if no placement-safe
    /// region is available.
    pub fn new(
        mut source: S,
        profile: ConstraintProfile,
        cache: CacheOps,
        bounce_slots: usize,
        bounce_slot_size: usize,
    ) -> Result<Self> {
        let region_len = crate::align_up(bounce_slot_size, Self::SLOT_ALIGN) * bounce_slots;
        let region = source
            .alloc(region_len, Self::SLOT_ALIGN)
            .ok_or(DmaError::Exhausted)?;
        let arena = match BounceArena::carve(
            region,
            bounce_slot_size,
            bounce_slots,
            Self::SLOT_ALIGN,
            &profile,
        ) {
            Ok(arena) => arena,
            Err(e) => {
                source.free(region);
                return Err(e);
            }
        };
        Ok(Self {
            source,
            arena,
            profile,
            cache,
            bounces_in_use: 0,
        })
    }

    pub fn profile(&self) -> &ConstraintProfile {
        &self.profile
    }

    pub fn cache(&self) -> &CacheOps {
        &self.cache
    }

    /// Number of allocations currently routed through bounce slots.
    pub fn bounces_in_use(&self) -> usize {
        self.bounces_in_use
    }

    /// Allocate a fresh buffer that the device can safely address.
    ///
    /// Size is validated, never truncated: zero is rejected as an invalid
    /// parameter and anything above the profile's segment limit is
    /// rejected outright. When the source's chunk violates placement, the
    /// chunk is kept as the CPU-side location and a bounce slot becomes
    /// the device-side one.
    pub fn allocate(
        &mut self,
        size: usize,
        align: usize,
        direction: Direction,
    ) -> Result<BufferDescriptor> {
        if size == 0 {
            return Err(DmaError::InvalidSize);
        }
        if size > self.profile.max_segment {
            return Err(DmaError::SegmentTooLarge);
        }

        let chunk = self.source.alloc(size, align).ok_or(DmaError::Exhausted)?;
        if self.profile.placement_ok(chunk.bus, size, align) {
            return Ok(BufferDescriptor {
                origin: chunk.cpu,
                dma: chunk.cpu,
                bus: chunk.bus,
                len: size,
                direction,
                backing: Backing::Direct(chunk),
                bounce_slot: None,
            });
        }

        // Placement violated: keep the chunk for the CPU side, give the
        // device a validated slot instead.
        if size > self.arena.slot_size() {
            self.source.free(chunk);
            return Err(DmaError::SegmentTooLarge);
        }
        match self.arena.alloc() {
            Some((dma, bus, slot)) => {
                self.bounces_in_use += 1;
                Ok(BufferDescriptor {
                    origin: chunk.cpu,
                    dma,
                    bus,
                    len: size,
                    direction,
                    backing: Backing::Direct(chunk),
                    bounce_slot: Some(slot),
                })
            }
            None => {
                self.source.free(chunk);
                Err(DmaError::Exhausted)
            }
        }
    }

    /// Wrap caller-owned memory for a single transfer.
    ///
    /// # Safety
    /// `origin` must point at `len` valid bytes that outlive the returned
    /// descriptor.
    pub unsafe fn map(
        &mut self,
        origin: NonNull<u8>,
        len: usize,
        direction: Direction,
    ) -> Result<BufferDescriptor> {
        if len == 0 {
            return Err(DmaError::InvalidSize);
        }
        if len > self.profile.max_segment {
            return Err(DmaError::SegmentTooLarge);
        }

        let bus = self.source.bus_addr(origin.as_ptr());
        if self.profile.placement_ok(bus, len, 1) {
            return Ok(BufferDescriptor {
                origin,
                dma: origin,
                bus,
                len,
                direction,
                backing: Backing::Mapped,
                bounce_slot: None,
            });
        }

        if len > self.arena.slot_size() {
            return Err(DmaError::SegmentTooLarge);
        }
        let (dma, bus, slot) = self.arena.alloc().ok_or(DmaError::Exhausted)?;
        self.bounces_in_use += 1;
        Ok(BufferDescriptor {
            origin,
            dma,
            bus,
            len,
            direction,
            backing: Backing::Mapped,
            bounce_slot: Some(slot),
        })
    }

    /// Release a descriptor's backing storage.
    pub fn release(&mut self, desc: BufferDescriptor) {
        if let Some(slot) = desc.bounce_slot {
            self.arena.free(slot);
            self.bounces_in_use -= 1;
        }
        if let Backing::Direct(chunk) = desc.backing {
            self.source.free(chunk);
        }
    }

    /// Hand the buffer to the device.
    ///
    /// For a bounced buffer going to the device this copies origin into
    /// the bounce slot; for a direct buffer it performs only the cache
    /// call, never a copy.
    pub fn sync_for_device(&self, desc: &mut BufferDescriptor) {
        if desc.bounced() && desc.direction != Direction::FromDevice {
            // SAFETY: both locations hold at least `len` bytes and cannot
            // overlap (arena memory vs. origin memory).
            unsafe {
                core::ptr::copy_nonoverlapping(
                    desc.origin.as_ptr(),
                    desc.dma.as_ptr(),
                    desc.len,
                );
            }
        }
        self.cache.prepare_for_device(desc.dma.as_ptr(), desc.len);
    }

    /// Take the buffer back from the device.
    ///
    /// Invalidates first so the copy (for bounced receive buffers) reads
    /// what the device wrote rather than a stale cached line.
    pub fn sync_for_cpu(&self, desc: &mut BufferDescriptor) {
        self.cache.complete_from_device(desc.dma.as_ptr(), desc.len);
        if desc.bounced() && desc.direction != Direction::ToDevice {
            // SAFETY: as in sync_for_device.
            unsafe {
                core::ptr::copy_nonoverlapping(
                    desc.dma.as_ptr(),
                    desc.origin.as_ptr(),
                    desc.len,
                );
            }
        }
    }
}
