//! DigiMAX DAC expansion on the IDE64 short bus.
//!
//! The cartridge is an 8-bit 4-channel digital sound output interface.
//! When plugged into the short-bus port it claims 4 registers, one per
//! channel; the base address can be relocated to either `$DE40` or `$DE48`.
//!
//! Whether the registers are actually visible on the bus depends on two
//! independent switches: the IDE64 host cartridge must be attached, and the
//! expansion itself must be enabled in the configuration. The device is
//! mapped iff both hold; everything else is bookkeeping so that flipping
//! either switch (or relocating the window) keeps the bus and the mixer's
//! per-chip enable in sync.

use std::sync::OnceLock;

use breadbin_audio::{ChipDescriptor, SoundChipHandle};
use breadbin_platform::{ExpansionBus, ExpansionIoDevice, IoWindow, WindowFlags};
use thiserror::Error;

pub const DIGIMAX_NAME: &str = "ShortBus DigiMAX";

/// The cartridge whose short bus carries this expansion.
pub const DIGIMAX_OWNER: &str = "IDE64";

/// The register window is 4 consecutive addresses, one per channel.
pub const DIGIMAX_WINDOW_LEN: u16 = 4;
pub const DIGIMAX_ADDR_MASK: u16 = 0x03;

/// Base addresses the hardware can be strapped to.
pub const DIGIMAX_LEGAL_BASES: [u16; 2] = [0xDE40, 0xDE48];
pub const DIGIMAX_DEFAULT_BASE: u16 = 0xDE40;

/// Mixer-facing chip description (4 DAC channels).
pub const DIGIMAX_CHIP: ChipDescriptor = ChipDescriptor {
    name: DIGIMAX_NAME,
    channels: DIGIMAX_WINDOW_LEN,
};

pub fn is_legal_base(addr: u16) -> bool {
    DIGIMAX_LEGAL_BASES.contains(&addr)
}

/// Render the legal base addresses as a `/`-separated list, e.g. for
/// option help text. Keeping this next to [`is_legal_base`] means the
/// documented set and the accepted set come from the same constant.
pub fn legal_base_list() -> String {
    let bases: Vec<String> = DIGIMAX_LEGAL_BASES
        .iter()
        .map(|b| format!("{b:#06x}"))
        .collect();
    bases.join("/")
}

/// Help text for the base-address option. Generated once and cached for
/// the life of the process.
pub fn base_help_text() -> &'static str {
    static BASE_HELP: OnceLock<String> = OnceLock::new();
    BASE_HELP.get_or_init(|| {
        format!(
            "Base address of the DigiMAX register window ({})",
            legal_base_list()
        )
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DigimaxError {
    #[error("invalid DigiMAX base address {0:#06x}")]
    InvalidBase(u16),
}

/// The two gating switches, tracked independently.
///
/// `host` flips when the IDE64 cartridge is attached/detached; `expansion`
/// flips when the user enables/disables the DigiMAX. The register window is
/// on the bus iff both are set. Detaching the host leaves `expansion`
/// untouched, so re-attaching the host alone restores the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Activation {
    pub host: bool,
    pub expansion: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationEvent {
    HostAttach,
    HostDetach,
    ExpansionOn,
    ExpansionOff,
}

/// Bus effect of one activation transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusAction {
    None,
    Claim,
    Release,
}

impl Activation {
    pub fn registered(self) -> bool {
        self.host && self.expansion
    }

    /// Apply one event, returning the successor state and the bus action
    /// it implies. The action is exactly the edge of the `host &&
    /// expansion` conjunction: there is no intermediate state where the
    /// flags and the mapping disagree.
    pub fn step(self, event: ActivationEvent) -> (Activation, BusAction) {
        let next = match event {
            ActivationEvent::HostAttach => Activation { host: true, ..self },
            ActivationEvent::HostDetach => Activation { host: false, ..self },
            ActivationEvent::ExpansionOn => Activation {
                expansion: true,
                ..self
            },
            ActivationEvent::ExpansionOff => Activation {
                expansion: false,
                ..self
            },
        };
        let action = match (self.registered(), next.registered()) {
            (false, true) => BusAction::Claim,
            (true, false) => BusAction::Release,
            _ => BusAction::None,
        };
        (next, action)
    }
}

/// Bus-facing register window: four write/read slots, one per channel.
///
/// The low two address bits select the channel; the bus window mask keeps
/// everything else out, so there is no range check here. Writes go straight
/// through to the mixer and are audible on the next mix; reads report
/// whatever the mixer currently holds for the channel (the mixer, not this
/// window, is authoritative).
#[derive(Clone)]
pub struct DigimaxPorts {
    chip: SoundChipHandle,
}

impl DigimaxPorts {
    pub fn new(chip: SoundChipHandle) -> Self {
        Self { chip }
    }
}

impl ExpansionIoDevice for DigimaxPorts {
    fn read(&mut self, addr: u16) -> u8 {
        self.chip.read(addr & DIGIMAX_ADDR_MASK)
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.chip.store(addr & DIGIMAX_ADDR_MASK, value);
    }
}

/// The DigiMAX expansion proper: activation state machine plus the window
/// it claims.
///
/// Construction takes the mixer handle allocated at chip-registration time
/// (see [`SoundChipHandle::register`]); the channel-offset block behind it
/// is stable for the life of the device. The window is an immutable value
/// replaced wholesale on relocation, so a claim is always keyed to exactly
/// one `(start, len)` pair and "release old, claim new" cannot interleave
/// with a half-updated window.
pub struct ShortbusDigimax {
    chip: SoundChipHandle,
    activation: Activation,
    window: IoWindow,
    claimed: bool,
}

impl ShortbusDigimax {
    pub fn new(chip: SoundChipHandle) -> Self {
        Self {
            chip,
            activation: Activation::default(),
            window: Self::window_at(DIGIMAX_DEFAULT_BASE),
            claimed: false,
        }
    }

    fn window_at(base: u16) -> IoWindow {
        // Reads of a claimed channel register are always driven.
        IoWindow::with_flags(base, DIGIMAX_WINDOW_LEN, WindowFlags::READ_ALWAYS_VALID)
    }

    pub fn name(&self) -> &'static str {
        DIGIMAX_NAME
    }

    pub fn owner(&self) -> &'static str {
        DIGIMAX_OWNER
    }

    pub fn base(&self) -> u16 {
        self.window.start
    }

    pub fn window(&self) -> IoWindow {
        self.window
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// True while the register window is claimed on the bus.
    pub fn is_registered(&self) -> bool {
        self.claimed
    }

    pub fn is_expansion_enabled(&self) -> bool {
        self.activation.expansion
    }

    /// Mixer handle for this device's channel block.
    pub fn chip(&self) -> &SoundChipHandle {
        &self.chip
    }

    /// The IDE64 host interface has been initialized for this session.
    pub fn host_attach(&mut self, bus: &mut ExpansionBus) {
        self.apply(bus, ActivationEvent::HostAttach);
    }

    /// The IDE64 host interface is going away.
    pub fn host_detach(&mut self, bus: &mut ExpansionBus) {
        self.apply(bus, ActivationEvent::HostDetach);
    }

    /// Enable or disable the expansion itself. With the host inactive this
    /// only records the switch; the bus mapping is deferred until the host
    /// attaches.
    pub fn set_expansion_enabled(&mut self, bus: &mut ExpansionBus, enabled: bool) {
        let event = if enabled {
            ActivationEvent::ExpansionOn
        } else {
            ActivationEvent::ExpansionOff
        };
        self.apply(bus, event);
    }

    /// Relocate the register window.
    ///
    /// Setting the current base is a no-op. An address outside
    /// [`DIGIMAX_LEGAL_BASES`] is rejected before anything is touched.
    /// While the window is claimed, relocation releases the old window,
    /// swaps in the new one and reclaims, so at no point are two windows
    /// (or a stale window) on the bus.
    pub fn set_base(&mut self, bus: &mut ExpansionBus, addr: u16) -> Result<(), DigimaxError> {
        if addr == self.window.start {
            return Ok(());
        }
        if !is_legal_base(addr) {
            return Err(DigimaxError::InvalidBase(addr));
        }

        let was_claimed = self.claimed;
        if was_claimed {
            self.release_window(bus);
        }
        self.window = Self::window_at(addr);
        if was_claimed {
            self.claim_window(bus);
        }
        Ok(())
    }

    fn apply(&mut self, bus: &mut ExpansionBus, event: ActivationEvent) {
        let (next, action) = self.activation.step(event);
        self.activation = next;
        match action {
            BusAction::None => {}
            BusAction::Claim => self.claim_window(bus),
            BusAction::Release => self.release_window(bus),
        }
    }

    /// Claim the window and mark the mixer chip audible. The two always
    /// flip together.
    fn claim_window(&mut self, bus: &mut ExpansionBus) {
        debug_assert!(!self.claimed, "DigiMAX window claimed twice");
        bus.claim(self.window, Box::new(DigimaxPorts::new(self.chip.clone())));
        self.chip.set_enabled(true);
        self.claimed = true;
    }

    fn release_window(&mut self, bus: &mut ExpansionBus) {
        debug_assert!(self.claimed, "DigiMAX window released while unclaimed");
        let released = bus.release(self.window.start, self.window.len);
        debug_assert!(released.is_some(), "DigiMAX window missing from bus");
        self.chip.set_enabled(false);
        self.claimed = false;
    }
}
