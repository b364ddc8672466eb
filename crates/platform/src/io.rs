//! Expansion-port I/O bus.
//!
//! The C64 expansion port decodes two 256-byte I/O pages (`$DE00`/`$DF00`).
//! Cartridges claim sub-windows of those pages at attach/enable time and
//! release them again when disabled, detached, or relocated to a different
//! base address. The bus therefore supports registering and unregistering
//! window-mapped devices at runtime without rebuilding the whole bus.

use bitflags::bitflags;

bitflags! {
    /// Capability flags carried by a claimed window.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WindowFlags: u8 {
        /// Reads are always driven by the device; the bus never has to
        /// float the data lines for addresses inside the window.
        const READ_ALWAYS_VALID = 1 << 0;
    }
}

/// A contiguous window of expansion-port I/O addresses.
///
/// Windows are immutable values: relocating a device replaces its window
/// wholesale rather than editing bounds in place, so a claim is always
/// keyed to exactly one `(start, len)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoWindow {
    pub start: u16,
    pub len: u16,
    pub flags: WindowFlags,
}

impl IoWindow {
    pub const fn new(start: u16, len: u16) -> Self {
        Self {
            start,
            len,
            flags: WindowFlags::empty(),
        }
    }

    pub const fn with_flags(start: u16, len: u16, flags: WindowFlags) -> Self {
        Self { start, len, flags }
    }

    fn end_exclusive(&self) -> u32 {
        u32::from(self.start) + u32::from(self.len)
    }

    /// Last address inside the window (`start + len - 1`).
    pub fn end_inclusive(&self) -> u16 {
        debug_assert!(self.len != 0);
        self.start + (self.len - 1)
    }

    pub fn contains(&self, addr: u16) -> bool {
        let a = u32::from(addr);
        a >= u32::from(self.start) && a < self.end_exclusive()
    }
}

/// A device mapped into the expansion I/O space.
///
/// The bus hands devices the full address; devices mask off their own low
/// bits (register decode is the device's business, not the bus's).
pub trait ExpansionIoDevice {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);

    /// Reset the device back to its power-on state.
    fn reset(&mut self) {}
}

struct ClaimedWindow {
    window: IoWindow,
    dev: Box<dyn ExpansionIoDevice>,
}

/// Registry of claimed expansion I/O windows.
///
/// Windows are kept sorted by start address and may not overlap; cartridges
/// with relocatable base addresses release their old window before claiming
/// the new one.
pub struct ExpansionBus {
    windows: Vec<ClaimedWindow>,
}

impl ExpansionBus {
    pub fn new() -> Self {
        Self {
            windows: Vec::new(),
        }
    }

    /// Claim `window` for `dev`.
    ///
    /// Panics on zero-length or overlapping windows and on windows that
    /// wrap past the top of the address space; all three are wiring bugs,
    /// not runtime conditions.
    pub fn claim(&mut self, window: IoWindow, dev: Box<dyn ExpansionIoDevice>) {
        assert!(window.len != 0, "I/O window length must be non-zero");

        let end_exclusive = window.end_exclusive();
        assert!(
            end_exclusive <= 0x1_0000,
            "I/O window wraps past 0xFFFF: start={:#06x} len={:#x}",
            window.start,
            window.len
        );

        let idx = self
            .windows
            .partition_point(|c| u32::from(c.window.start) < u32::from(window.start));

        if let Some(prev) = self.windows.get(idx.wrapping_sub(1)) {
            assert!(
                u32::from(window.start) >= prev.window.end_exclusive(),
                "overlapping I/O windows: new=[{:#06x}..{:#06x}) prev=[{:#06x}..{:#06x})",
                window.start,
                end_exclusive,
                prev.window.start,
                prev.window.end_exclusive()
            );
        }
        if let Some(next) = self.windows.get(idx) {
            assert!(
                end_exclusive <= u32::from(next.window.start),
                "overlapping I/O windows: new=[{:#06x}..{:#06x}) next=[{:#06x}..{:#06x})",
                window.start,
                end_exclusive,
                next.window.start,
                next.window.end_exclusive()
            );
        }

        self.windows.insert(idx, ClaimedWindow { window, dev });
    }

    /// Release the window exactly matching `(start, len)`, returning the
    /// mapped device (if any).
    pub fn release(&mut self, start: u16, len: u16) -> Option<Box<dyn ExpansionIoDevice>> {
        if len == 0 {
            return None;
        }

        let idx = self.windows.partition_point(|c| c.window.start < start);
        let cand = self.windows.get(idx)?;
        if cand.window.start != start || cand.window.len != len {
            return None;
        }
        Some(self.windows.remove(idx).dev)
    }

    /// True if a window exactly matching `(start, len)` is currently claimed.
    pub fn is_claimed(&self, start: u16, len: u16) -> bool {
        let idx = self.windows.partition_point(|c| c.window.start < start);
        self.windows
            .get(idx)
            .is_some_and(|c| c.window.start == start && c.window.len == len)
    }

    /// Number of currently claimed windows.
    pub fn claimed_windows(&self) -> usize {
        self.windows.len()
    }

    fn find_index(&self, addr: u16) -> Option<usize> {
        let idx = self.windows.partition_point(|c| c.window.start <= addr);
        if idx == 0 {
            return None;
        }
        let cand = idx - 1;
        self.windows
            .get(cand)
            .is_some_and(|c| c.window.contains(addr))
            .then_some(cand)
    }

    /// Read a byte. Unmapped addresses float the data lines high.
    pub fn read(&mut self, addr: u16) -> u8 {
        if let Some(idx) = self.find_index(addr) {
            return self
                .windows
                .get_mut(idx)
                .expect("window index disappeared")
                .dev
                .read(addr);
        }
        0xFF
    }

    /// Write a byte. Unmapped addresses are ignored.
    pub fn write(&mut self, addr: u16, value: u8) {
        if let Some(idx) = self.find_index(addr) {
            self.windows
                .get_mut(idx)
                .expect("window index disappeared")
                .dev
                .write(addr, value);
        }
    }

    pub fn reset(&mut self) {
        for claimed in self.windows.iter_mut() {
            claimed.dev.reset();
        }
    }
}

impl Default for ExpansionBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct SharedState {
        value: u8,
    }

    #[derive(Debug)]
    struct SharedStateWindow {
        state: Rc<RefCell<SharedState>>,
        base: u16,
        len: u16,
    }

    impl ExpansionIoDevice for SharedStateWindow {
        fn read(&mut self, addr: u16) -> u8 {
            let offset = addr.wrapping_sub(self.base);
            debug_assert!(offset < self.len);
            // Include the offset so it's easy to spot stale mappings.
            self.state.borrow().value.wrapping_add(offset as u8)
        }

        fn write(&mut self, addr: u16, value: u8) {
            let offset = addr.wrapping_sub(self.base);
            debug_assert!(offset < self.len);
            self.state.borrow_mut().value = value;
        }
    }

    #[test]
    fn release_allows_clean_remap_without_stale_handlers() {
        let mut bus = ExpansionBus::new();

        const LEN: u16 = 4;
        const BASE1: u16 = 0xDE40;
        const BASE2: u16 = 0xDE48;

        let state = Rc::new(RefCell::new(SharedState::default()));
        bus.claim(
            IoWindow::new(BASE1, LEN),
            Box::new(SharedStateWindow {
                state: state.clone(),
                base: BASE1,
                len: LEN,
            }),
        );

        for off in 0..LEN {
            let addr = BASE1 + off;
            bus.write(addr, 0x40);
            assert_eq!(bus.read(addr), 0x40 + off as u8);
        }

        // Unmap the old window; its addresses must float again.
        assert!(bus.release(BASE1, LEN).is_some());
        for off in 0..LEN {
            let addr = BASE1 + off;
            assert_eq!(bus.read(addr), 0xFF);
            bus.write(addr, 0x00);
        }

        // Remap to a new base and ensure the old addresses stay unmapped.
        bus.claim(
            IoWindow::new(BASE2, LEN),
            Box::new(SharedStateWindow {
                state: state.clone(),
                base: BASE2,
                len: LEN,
            }),
        );

        bus.write(BASE2, 0x80);
        for off in 0..LEN {
            assert_eq!(bus.read(BASE2 + off), 0x80 + off as u8);
            assert_eq!(bus.read(BASE1 + off), 0xFF);
        }
    }

    #[test]
    fn release_requires_exact_window_match() {
        let mut bus = ExpansionBus::new();
        bus.claim(
            IoWindow::new(0xDE40, 4),
            Box::new(SharedStateWindow {
                state: Rc::new(RefCell::new(SharedState::default())),
                base: 0xDE40,
                len: 4,
            }),
        );

        assert!(bus.release(0xDE40, 2).is_none());
        assert!(bus.release(0xDE41, 4).is_none());
        assert!(bus.release(0xDE40, 0).is_none());
        assert!(bus.is_claimed(0xDE40, 4));

        assert!(bus.release(0xDE40, 4).is_some());
        assert!(!bus.is_claimed(0xDE40, 4));
        assert!(bus.release(0xDE40, 4).is_none());
    }

    #[derive(Debug)]
    struct Noop;

    impl ExpansionIoDevice for Noop {
        fn read(&mut self, _addr: u16) -> u8 {
            0
        }

        fn write(&mut self, _addr: u16, _value: u8) {}
    }

    #[test]
    fn claim_panics_on_overlap_and_wrap() {
        let overlap = std::panic::catch_unwind(|| {
            let mut bus = ExpansionBus::new();
            bus.claim(IoWindow::new(0xDE40, 4), Box::new(Noop));
            bus.claim(IoWindow::new(0xDE42, 4), Box::new(Noop));
        });
        assert!(overlap.is_err());

        let wrap = std::panic::catch_unwind(|| {
            let mut bus = ExpansionBus::new();
            bus.claim(IoWindow::new(0xFFFE, 4), Box::new(Noop));
        });
        assert!(wrap.is_err());

        // Adjacent windows are fine.
        let adjacent = std::panic::catch_unwind(|| {
            let mut bus = ExpansionBus::new();
            bus.claim(IoWindow::new(0xDE40, 4), Box::new(Noop));
            bus.claim(IoWindow::new(0xDE44, 4), Box::new(Noop));
        });
        assert!(adjacent.is_ok());
    }

    #[test]
    fn unmapped_reads_float_high_and_writes_are_ignored() {
        let mut bus = ExpansionBus::new();
        assert_eq!(bus.read(0xDE00), 0xFF);
        bus.write(0xDE00, 0x12);
        assert_eq!(bus.read(0xDE00), 0xFF);
    }

    #[test]
    fn window_bounds_derive_from_start_and_len() {
        let w = IoWindow::new(0xDE48, 4);
        assert_eq!(w.end_inclusive(), 0xDE4B);
        assert!(w.contains(0xDE48));
        assert!(w.contains(0xDE4B));
        assert!(!w.contains(0xDE4C));
        assert!(!w.contains(0xDE47));
    }
}
