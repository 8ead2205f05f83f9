// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-connection descriptor translation table.
//!
//! Client handles index directly into a fixed-size slot array. Slots
//! 0-2 are reserved for the standard streams and never installed, so
//! every minted handle is >= 3. Released slots are reused: `install`
//! takes the lowest free slot, `install_from` the lowest free slot at
//! or above a caller-supplied floor. Only the owning dispatcher ever
//! mutates the table.

use std::os::unix::io::RawFd;
use thiserror::Error;

/// Total slot count, including the three reserved slots.
pub const TABLE_CAPACITY: usize = 1024;

/// Lowest handle the table will mint.
pub const FIRST_HANDLE: i32 = 3;

/// No free slot at or above the requested floor.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("descriptor table full")]
pub struct TableFull;

#[derive(Debug)]
pub struct FdTable {
    slots: Vec<Option<RawFd>>,
}

impl FdTable {
    pub fn new() -> Self {
        Self::with_capacity(TABLE_CAPACITY)
    }

    /// Reduced-capacity table, used by tests to provoke exhaustion.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    /// Map a server descriptor to a fresh client handle.
    pub fn install(&mut self, server_fd: RawFd) -> Result<i32, TableFull> {
        self.install_from(server_fd, FIRST_HANDLE)
    }

    /// Like [`install`](Self::install) but the handle is the lowest
    /// free slot >= max(`min_handle`, 3). Used by the dup-with-floor
    /// control commands.
    pub fn install_from(&mut self, server_fd: RawFd, min_handle: i32) -> Result<i32, TableFull> {
        let floor = min_handle.max(FIRST_HANDLE) as usize;
        for handle in floor..self.slots.len() {
            if self.slots[handle].is_none() {
                self.slots[handle] = Some(server_fd);
                return Ok(handle as i32);
            }
        }
        Err(TableFull)
    }

    /// Constant-time lookup. Out-of-range and free slots are both
    /// invalid.
    pub fn translate(&self, handle: i32) -> Option<RawFd> {
        if handle < 0 {
            return None;
        }
        self.slots.get(handle as usize).copied().flatten()
    }

    /// Mark the slot free. Never closes the kernel descriptor; the
    /// handler decides that.
    pub fn release(&mut self, handle: i32) {
        if handle >= 0 {
            if let Some(slot) = self.slots.get_mut(handle as usize) {
                *slot = None;
            }
        }
    }

    /// Empty the table, returning every live server descriptor for the
    /// teardown path to close.
    pub fn drain_live(&mut self) -> Vec<RawFd> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_start_at_three_and_are_distinct() {
        let mut table = FdTable::new();
        let a = table.install(10).unwrap();
        let b = table.install(11).unwrap();
        let c = table.install(12).unwrap();
        assert_eq!((a, b, c), (3, 4, 5));
    }

    #[test]
    fn translate_succeeds_only_for_live_handles() {
        let mut table = FdTable::new();
        let h = table.install(42).unwrap();
        assert_eq!(table.translate(h), Some(42));

        assert_eq!(table.translate(0), None);
        assert_eq!(table.translate(1), None);
        assert_eq!(table.translate(2), None);
        assert_eq!(table.translate(-1), None);
        assert_eq!(table.translate(h + 1), None);
        assert_eq!(table.translate(999), None);
        assert_eq!(table.translate(i32::MAX), None);

        table.release(h);
        assert_eq!(table.translate(h), None);
    }

    #[test]
    fn released_slots_are_reused_lowest_first() {
        let mut table = FdTable::new();
        let a = table.install(10).unwrap();
        let b = table.install(11).unwrap();
        let _c = table.install(12).unwrap();
        table.release(a);
        table.release(b);
        assert_eq!(table.install(13).unwrap(), a);
        assert_eq!(table.install(14).unwrap(), b);
    }

    #[test]
    fn install_from_honours_the_floor() {
        let mut table = FdTable::new();
        let h = table.install(10).unwrap();
        let dup = table.install_from(20, 10).unwrap();
        assert_eq!(dup, 10);
        assert_ne!(dup, h);
        assert_eq!(table.translate(h), Some(10));
        assert_eq!(table.translate(dup), Some(20));

        // A floor below the reserved range is clamped up.
        let low = table.install_from(30, 0).unwrap();
        assert_eq!(low, 4);
    }

    #[test]
    fn exhaustion_reports_table_full() {
        let mut table = FdTable::with_capacity(6);
        assert_eq!(table.install(1).unwrap(), 3);
        assert_eq!(table.install(2).unwrap(), 4);
        assert_eq!(table.install(3).unwrap(), 5);
        assert_eq!(table.install(4), Err(TableFull));

        // A floor past the end is immediately full.
        assert_eq!(table.install_from(5, 6), Err(TableFull));

        // Freeing a slot makes the table usable again.
        table.release(4);
        assert_eq!(table.install(6).unwrap(), 4);
    }

    #[test]
    fn drain_returns_every_live_descriptor() {
        let mut table = FdTable::new();
        table.install(10).unwrap();
        let h = table.install(11).unwrap();
        table.install(12).unwrap();
        table.release(h);

        let mut live = table.drain_live();
        live.sort_unstable();
        assert_eq!(live, vec![10, 12]);
        assert_eq!(table.live_count(), 0);
    }
}
