//! Shared multi-chip sound mixer.
//!
//! Several expansion-port sound devices can coexist in one session. Each
//! registers a chip once at startup and receives a disjoint block of global
//! channel addresses; the block offset, not the device's local register
//! index, is what keeps concurrent devices from colliding. Channel writes
//! land in the mixer immediately and are reflected in the next rendered
//! frame; there is no buffering between the register file and the mixer.

use std::cell::RefCell;
use std::rc::Rc;

use crate::sink::AudioSink;

/// Static description of a sound chip, supplied at registration time.
#[derive(Debug, Clone, Copy)]
pub struct ChipDescriptor {
    pub name: &'static str,
    /// Number of channel registers the chip exposes.
    pub channels: u16,
}

#[derive(Debug)]
struct ChipSlot {
    name: &'static str,
    offset: u16,
    channels: u16,
    /// Allocated block size (power of two, >= `channels`).
    block: u16,
    enabled: bool,
}

impl ChipSlot {
    fn contains(&self, addr: u16) -> bool {
        addr >= self.offset && addr < self.offset + self.block
    }
}

/// The process-wide mixing core.
///
/// Chip offsets are handed out once and never move; `store`/`read` address
/// channels by global address (`offset | local`). Chips contribute to the
/// rendered output only while their enabled flag is set.
pub struct SoundMixer {
    chips: Vec<ChipSlot>,
    /// Channel value slots, indexed by global channel address.
    data: Vec<u8>,
    next_offset: u16,
}

impl SoundMixer {
    pub fn new() -> Self {
        Self {
            chips: Vec::new(),
            data: Vec::new(),
            next_offset: 0,
        }
    }

    /// Allocate a channel-offset block for `desc`.
    ///
    /// The block is rounded up to a power of two and the offset aligned to
    /// it, so `offset | local` can never carry into a neighbouring block.
    /// The chip starts disabled; its offset is stable for the lifetime of
    /// the mixer.
    pub fn register_chip(&mut self, desc: &ChipDescriptor) -> u16 {
        assert!(desc.channels != 0, "chip must expose at least one channel");

        let block = desc.channels.next_power_of_two();
        let offset = self.next_offset.next_multiple_of(block);
        self.next_offset = offset + block;
        self.data.resize(usize::from(self.next_offset), 0);

        self.chips.push(ChipSlot {
            name: desc.name,
            offset,
            channels: desc.channels,
            block,
            enabled: false,
        });
        offset
    }

    fn chip_mut(&mut self, offset: u16) -> &mut ChipSlot {
        self.chips
            .iter_mut()
            .find(|c| c.offset == offset)
            .expect("unknown chip offset")
    }

    fn chip(&self, offset: u16) -> &ChipSlot {
        self.chips
            .iter()
            .find(|c| c.offset == offset)
            .expect("unknown chip offset")
    }

    /// Flip the per-chip enabled flag (whether the chip's channels
    /// contribute to rendered output).
    pub fn set_chip_enabled(&mut self, offset: u16, enabled: bool) {
        self.chip_mut(offset).enabled = enabled;
    }

    pub fn is_chip_enabled(&self, offset: u16) -> bool {
        self.chip(offset).enabled
    }

    pub fn chip_name(&self, offset: u16) -> &'static str {
        self.chip(offset).name
    }

    /// Store a channel value by global address.
    ///
    /// `context` discriminates device instances in multi-instance setups;
    /// single-instance devices pass 0. The mixer keeps one value space per
    /// session today, so the discriminator is accepted but not consulted.
    pub fn store(&mut self, addr: u16, value: u8, context: usize) {
        let _ = context;
        if let Some(slot) = self.data.get_mut(usize::from(addr)) {
            *slot = value;
        }
    }

    /// Read back a channel value by global address. The mixer is the
    /// authoritative holder of channel state.
    pub fn read(&self, addr: u16, context: usize) -> u8 {
        let _ = context;
        self.data.get(usize::from(addr)).copied().unwrap_or(0)
    }

    /// Current output level of one chip: its channel DAC values centered
    /// around zero and averaged.
    ///
    /// An 8-bit DAC maps `0x00` to full negative, `0x80` to silence and
    /// `0xFF` to (almost) full positive.
    fn chip_level(&self, chip: &ChipSlot) -> i32 {
        let mut acc = 0i32;
        for ch in 0..chip.channels {
            let v = self.read(chip.offset + ch, 0);
            acc += (i32::from(v) - 128) * 256;
        }
        acc / i32::from(chip.channels)
    }

    /// Mix `frames` mono frames of the current chip output levels into
    /// `sink`. DAC chips hold their last written value, so without timing
    /// information every frame in the batch carries the same mix.
    pub fn render(&self, frames: usize, sink: &mut impl AudioSink) {
        let mut acc = 0i32;
        for chip in self.chips.iter().filter(|c| c.enabled) {
            acc += self.chip_level(chip);
        }
        let sample = acc.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;

        let buf = vec![sample; frames];
        sink.push_frames(&buf);
    }
}

impl Default for SoundMixer {
    fn default() -> Self {
        Self::new()
    }
}

/// A device's capability handle onto the shared mixer.
///
/// Created once at chip-registration time and injected into the device, so
/// the device never touches mixer internals and never writes a channel
/// without holding a valid offset. Clones share the same chip block.
#[derive(Clone)]
pub struct SoundChipHandle {
    mixer: Rc<RefCell<SoundMixer>>,
    offset: u16,
    context: usize,
}

impl SoundChipHandle {
    /// Register `desc` with `mixer` and return the device-side handle.
    pub fn register(mixer: &Rc<RefCell<SoundMixer>>, desc: &ChipDescriptor) -> Self {
        let offset = mixer.borrow_mut().register_chip(desc);
        Self {
            mixer: mixer.clone(),
            offset,
            context: 0,
        }
    }

    /// Global offset of this chip's channel block.
    pub fn offset(&self) -> u16 {
        self.offset
    }

    /// Store a local channel value, composing the global address.
    pub fn store(&self, local: u16, value: u8) {
        self.mixer
            .borrow_mut()
            .store(self.offset | local, value, self.context);
    }

    /// Read a local channel back from the mixer.
    pub fn read(&self, local: u16) -> u8 {
        self.mixer.borrow().read(self.offset | local, self.context)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.mixer.borrow_mut().set_chip_enabled(self.offset, enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.mixer.borrow().is_chip_enabled(self.offset)
    }
}
