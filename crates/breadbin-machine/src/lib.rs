#![forbid(unsafe_code)]

//! Machine wiring for the breadbin expansion-port stack.
//!
//! [`Machine`] owns the expansion I/O bus, the shared sound mixer and the
//! ShortBus DigiMAX device, and exposes the device's two configuration
//! resources. Devices and buses are shared behind `Rc<RefCell<...>>` so the
//! resource setter hooks can reach them; everything runs on one emulation
//! thread, so the interior mutability never observes concurrent borrows.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use breadbin_audio::{AudioSink, SoundChipHandle, SoundMixer};
use breadbin_config::{ResourceError, ResourceValue, Resources};
use breadbin_devices::shortbus::digimax::{DIGIMAX_CHIP, DIGIMAX_DEFAULT_BASE};
use breadbin_devices::ShortbusDigimax;
use breadbin_platform::ExpansionBus;
use serde::{Deserialize, Serialize};

/// Expansion enabled switch (boolean).
pub const RES_SBDIGIMAX: &str = "SBDIGIMAX";
/// Register window base address (integer).
pub const RES_SBDIGIMAX_BASE: &str = "SBDIGIMAXbase";

/// Snapshot of the configuration resources, for embedders that persist
/// settings between sessions. Where the snapshot lives is the embedder's
/// business; applying it goes through the same validating resource path as
/// interactive changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfig {
    pub sbdigimax: bool,
    pub sbdigimax_base: u16,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            sbdigimax: false,
            sbdigimax_base: DIGIMAX_DEFAULT_BASE,
        }
    }
}

pub struct Machine {
    bus: Rc<RefCell<ExpansionBus>>,
    mixer: Rc<RefCell<SoundMixer>>,
    digimax: Rc<RefCell<ShortbusDigimax>>,
    resources: Resources,
}

impl Machine {
    pub fn new() -> Self {
        let bus = Rc::new(RefCell::new(ExpansionBus::new()));
        let mixer = Rc::new(RefCell::new(SoundMixer::new()));

        // Chip registration happens exactly once, before any window can be
        // claimed; the offset behind the handle is stable from here on.
        let chip = SoundChipHandle::register(&mixer, &DIGIMAX_CHIP);
        let digimax = Rc::new(RefCell::new(ShortbusDigimax::new(chip)));

        let mut resources = Resources::new();
        resources.register_bool(RES_SBDIGIMAX, false, {
            let bus = bus.clone();
            let digimax = digimax.clone();
            Box::new(move |value| {
                let enabled = value.as_bool().expect("type-checked by the registry");
                digimax
                    .borrow_mut()
                    .set_expansion_enabled(&mut bus.borrow_mut(), enabled);
                Ok(())
            })
        });
        resources.register_int(RES_SBDIGIMAX_BASE, i32::from(DIGIMAX_DEFAULT_BASE), {
            let bus = bus.clone();
            let digimax = digimax.clone();
            Box::new(move |value| {
                let raw = value.as_int().expect("type-checked by the registry");
                let addr = u16::try_from(raw)
                    .map_err(|_| format!("invalid DigiMAX base address {raw:#x}"))?;
                digimax
                    .borrow_mut()
                    .set_base(&mut bus.borrow_mut(), addr)
                    .map_err(|e| e.to_string())
            })
        });

        Self {
            bus,
            mixer,
            digimax,
            resources,
        }
    }

    /// Attach the IDE64 host cartridge. Idempotent: attaching an attached
    /// host is a no-op at the bus level.
    pub fn attach_ide64(&mut self) {
        self.digimax
            .borrow_mut()
            .host_attach(&mut self.bus.borrow_mut());
    }

    /// Detach the IDE64 host cartridge. The DigiMAX enable switch is left
    /// as the user set it, so re-attaching restores the previous mapping.
    pub fn detach_ide64(&mut self) {
        self.digimax
            .borrow_mut()
            .host_detach(&mut self.bus.borrow_mut());
    }

    pub fn is_ide64_attached(&self) -> bool {
        self.digimax.borrow().activation().host
    }

    /// Dispatch a CPU read on the expansion I/O pages.
    pub fn bus_read(&mut self, addr: u16) -> u8 {
        self.bus.borrow_mut().read(addr)
    }

    /// Dispatch a CPU write on the expansion I/O pages.
    pub fn bus_write(&mut self, addr: u16, value: u8) {
        self.bus.borrow_mut().write(addr, value);
    }

    /// Assign a configuration resource (validate-before-mutate; a rejected
    /// assignment leaves device and registry untouched).
    pub fn set_resource(&mut self, name: &str, value: ResourceValue) -> Result<(), ResourceError> {
        self.resources.set(name, value)
    }

    pub fn get_resource(&self, name: &str) -> Option<ResourceValue> {
        self.resources.get(name)
    }

    /// Shared view of the DigiMAX device state.
    pub fn digimax(&self) -> Ref<'_, ShortbusDigimax> {
        self.digimax.borrow()
    }

    /// Mix `frames` mono frames into `sink`.
    pub fn render_audio_into(&self, frames: usize, sink: &mut impl AudioSink) {
        self.mixer.borrow().render(frames, sink);
    }

    pub fn render_audio(&self, frames: usize) -> Vec<i16> {
        let mut out = Vec::with_capacity(frames);
        self.render_audio_into(frames, &mut out);
        out
    }

    /// Capture the current resource values.
    pub fn config(&self) -> MachineConfig {
        MachineConfig {
            sbdigimax: self
                .resources
                .get_bool(RES_SBDIGIMAX)
                .expect("resource registered at construction"),
            sbdigimax_base: self
                .resources
                .get_int(RES_SBDIGIMAX_BASE)
                .expect("resource registered at construction") as u16,
        }
    }

    /// Apply a captured configuration through the validating resource path.
    pub fn apply_config(&mut self, config: &MachineConfig) -> Result<(), ResourceError> {
        self.resources
            .set_int(RES_SBDIGIMAX_BASE, i32::from(config.sbdigimax_base))?;
        self.resources.set_bool(RES_SBDIGIMAX, config.sbdigimax)?;
        Ok(())
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}
