//! Interrupt-coalescing policy state.
//!
//! The transmit side asks for a completion interrupt on roughly one post
//! in `tx_irq_interval` instead of every post; the receive side batches
//! buffer replenishment so one doorbell covers many descriptors. The
//! thresholds were tuned on real hardware and are carried as
//! configuration, not constants - their optimality for arbitrary ring
//! sizes is unverified.

/// Tunables for both coalescing policies.
#[derive(Debug, Clone, Copy)]
pub struct CoalesceConfig {
    /// Request a TX completion interrupt every this many posts
    /// (power of two).
    pub tx_irq_interval: u32,
    /// Force an interrupt when fewer than this many TX slots remain.
    pub tx_near_full_margin: usize,
    /// Refill RX only once at least this many slots are free.
    pub rx_refill_threshold: usize,
    /// Frames at or below this length are copied instead of handing the
    /// ring buffer upward.
    pub copy_break: usize,
}

impl Default for CoalesceConfig {
    fn default() -> Self {
        Self {
            tx_irq_interval: 8,
            tx_near_full_margin: 2,
            rx_refill_threshold: 8,
            copy_break: 200,
        }
    }
}

/// Lazy transmit-interrupt decision state.
///
/// Pure function of two counters; the only side effect of a positive
/// decision is one flag bit in the descriptor being posted.
#[derive(Debug)]
pub struct TxIrqPolicy {
    interval: u32,
    near_full_margin: usize,
    since_last: u32,
    in_flight: usize,
}

impl TxIrqPolicy {
    pub fn new(cfg: &CoalesceConfig) -> Self {
        assert!(
            cfg.tx_irq_interval.is_power_of_two(),
            "interrupt interval must be a power of two"
        );
        Self {
            interval: cfg.tx_irq_interval,
            near_full_margin: cfg.tx_near_full_margin,
            since_last: 0,
            in_flight: 0,
        }
    }

    /// Decide for the descriptor being posted; returns true when it must
    /// carry the interrupt-request flag.
    pub fn on_post(&mut self, ring_size: usize) -> bool {
        let request = if self.in_flight == 0 {
            // An empty queue must always get an interrupt, otherwise a
            // fully drained queue has nothing pending to trigger reclaim.
            self.since_last = 0;
            true
        } else {
            self.since_last += 1;
            if self.since_last == self.interval {
                self.since_last = 0;
                true
            } else {
                // Descriptor exhaustion would stall transmit with no
                // interrupt on the horizon; force one near the edge.
                self.in_flight >= ring_size - self.near_full_margin
            }
        };
        self.in_flight += 1;
        request
    }

    /// Account completed descriptors.
    pub fn on_reclaim(&mut self, count: usize) {
        debug_assert!(count <= self.in_flight);
        self.in_flight -= count;
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn reset(&mut self) {
        self.since_last = 0;
        self.in_flight = 0;
    }
}
