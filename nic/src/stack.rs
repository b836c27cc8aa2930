//! smoltcp integration layer.
//!
//! Thin adapter exposing a [`Nic`] to smoltcp's `phy::Device` trait so
//! the driver plugs into a full TCP/IP stack unchanged. The adapter owns
//! the device and a small queue of frames drained from worker context;
//! pooled frames are copied at this boundary and their ring buffers
//! recycled immediately, which keeps the token types trivially owned.

use crate::driver::facade::Nic;
use crate::driver::traits::{NicDriver, RxFrame};
use crate::regs::RegisterBank;
use crate::types::MAX_FRAME_LEN;
use alloc::collections::VecDeque;
use alloc::vec;
use alloc::vec::Vec;
use dma_guard::DmaSource;
use smoltcp::phy::{Device, DeviceCapabilities, Medium};
use smoltcp::time::Instant;

/// Frames drained from the device per poll.
const POLL_BUDGET: usize = 16;

/// Adapter bridging a [`Nic`] to smoltcp.
pub struct DeviceAdapter<B: RegisterBank, S: DmaSource> {
    nic: Nic<B, S>,
    pending: VecDeque<Vec<u8>>,
}

impl<B: RegisterBank, S: DmaSource> DeviceAdapter<B, S> {
    pub fn new(nic: Nic<B, S>) -> Self {
        Self {
            nic,
            pending: VecDeque::new(),
        }
    }

    pub fn nic(&mut self) -> &mut Nic<B, S> {
        &mut self.nic
    }

    fn drain_device(&mut self) {
        let mut sink: Vec<RxFrame> = Vec::new();
        self.nic.service(POLL_BUDGET, &mut sink);
        for frame in sink {
            self.pending.push_back(frame.data().to_vec());
            self.nic.recycle(frame);
        }
    }
}

pub struct AdapterRxToken {
    frame: Vec<u8>,
}

impl smoltcp::phy::RxToken for AdapterRxToken {
    fn consume<R, F>(mut self, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        f(&mut self.frame)
    }
}

pub struct AdapterTxToken<'a, B: RegisterBank, S: DmaSource> {
    nic: &'a mut Nic<B, S>,
}

impl<'a, B: RegisterBank, S: DmaSource> smoltcp::phy::TxToken for AdapterTxToken<'a, B, S> {
    fn consume<R, F>(self, len: usize, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let mut buffer = vec![0u8; len];
        let result = f(&mut buffer);
        // Back-pressure is dropped here; smoltcp retries on its own.
        let _ = self.nic.transmit(&buffer);
        result
    }
}

impl<B: RegisterBank, S: DmaSource> Device for DeviceAdapter<B, S> {
    type RxToken<'a> = AdapterRxToken where Self: 'a;
    type TxToken<'a> = AdapterTxToken<'a, B, S> where Self: 'a;

    fn capabilities(&self) -> DeviceCapabilities {
        let mut caps = DeviceCapabilities::default();
        caps.medium = Medium::Ethernet;
        caps.max_transmission_unit = MAX_FRAME_LEN;
        caps.max_burst_size = Some(1);
        caps
    }

    fn receive(&mut self, _timestamp: Instant) -> Option<(Self::RxToken<'_>, Self::TxToken<'_>)> {
        if self.pending.is_empty() {
            self.drain_device();
        }
        let frame = self.pending.pop_front()?;
        Some((
            AdapterRxToken { frame },
            AdapterTxToken { nic: &mut self.nic },
        ))
    }

    fn transmit(&mut self, _timestamp: Instant) -> Option<Self::TxToken<'_>> {
        Some(AdapterTxToken { nic: &mut self.nic })
    }
}
