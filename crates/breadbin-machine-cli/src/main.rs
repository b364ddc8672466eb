use anyhow::Context;
use clap::Parser;

use breadbin_config::ResourceValue;
use breadbin_devices::shortbus::digimax::{base_help_text, is_legal_base, legal_base_list};
use breadbin_machine::{Machine, RES_SBDIGIMAX, RES_SBDIGIMAX_BASE};

#[derive(Parser, Debug)]
#[command(
    name = "breadbin-digimax",
    about = "Configure and exercise the ShortBus DigiMAX DAC expansion."
)]
struct Args {
    /// Enable the ShortBus DigiMAX expansion
    #[arg(long, action = clap::ArgAction::SetTrue)]
    sbdigimax: bool,

    /// Disable the ShortBus DigiMAX expansion
    #[arg(long, action = clap::ArgAction::SetTrue, conflicts_with = "sbdigimax")]
    no_sbdigimax: bool,

    // Help text comes from the same legal-base constant the validator
    // uses, so the two cannot drift apart.
    #[arg(long, value_name = "ADDR", value_parser = parse_base, help = base_help_text())]
    sbdigimax_base: Option<u16>,

    /// Leave the IDE64 host cartridge detached
    #[arg(long, action = clap::ArgAction::SetTrue)]
    no_ide64: bool,

    /// Mix this many mono frames after writing the channel test pattern
    #[arg(long, value_name = "FRAMES")]
    render: Option<usize>,
}

/// Accept `0x`/`$`-prefixed hex or plain decimal, then check the legal set.
fn parse_base(s: &str) -> Result<u16, String> {
    let addr = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16)
    } else if let Some(hex) = s.strip_prefix('$') {
        u16::from_str_radix(hex, 16)
    } else {
        s.parse::<u16>()
    }
    .map_err(|e| format!("not an address: {e}"))?;

    if is_legal_base(addr) {
        Ok(addr)
    } else {
        Err(format!(
            "invalid base {addr:#06x} (valid: {})",
            legal_base_list()
        ))
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    run(args)
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut machine = Machine::new();

    // Base first, then the enable switch, so the window comes up at its
    // final address.
    if let Some(base) = args.sbdigimax_base {
        machine
            .set_resource(RES_SBDIGIMAX_BASE, ResourceValue::Int(i32::from(base)))
            .context("set SBDIGIMAXbase")?;
    }
    if args.sbdigimax {
        machine
            .set_resource(RES_SBDIGIMAX, ResourceValue::Bool(true))
            .context("set SBDIGIMAX")?;
    }
    if args.no_sbdigimax {
        machine
            .set_resource(RES_SBDIGIMAX, ResourceValue::Bool(false))
            .context("set SBDIGIMAX")?;
    }
    if !args.no_ide64 {
        machine.attach_ide64();
    }

    // Write an ascending ramp to the four channel registers; if the window
    // is not mapped the writes fall on the floor, which is the point.
    let window = machine.digimax().window();
    for ch in 0..window.len {
        machine.bus_write(window.start + ch, 0x80 + (ch as u8) * 0x10);
    }

    let dev = machine.digimax();
    eprintln!("device:     {} (on the {} short bus)", dev.name(), dev.owner());
    eprintln!(
        "window:     {:#06x}..={:#06x}",
        dev.base(),
        dev.window().end_inclusive()
    );
    eprintln!("ide64 host: {}", on_off(dev.activation().host));
    eprintln!("expansion:  {}", on_off(dev.is_expansion_enabled()));
    eprintln!("mapped:     {}", yes_no(dev.is_registered()));
    eprintln!("audible:    {}", yes_no(dev.chip().is_enabled()));
    drop(dev);

    if let Some(frames) = args.render {
        let mixed = machine.render_audio(frames);
        println!(
            "{}",
            mixed
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        );
    }

    Ok(())
}

fn on_off(v: bool) -> &'static str {
    if v {
        "on"
    } else {
        "off"
    }
}

fn yes_no(v: bool) -> &'static str {
    if v {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_parser_accepts_the_legal_set_in_several_spellings() {
        assert_eq!(parse_base("0xde40"), Ok(0xDE40));
        assert_eq!(parse_base("0xDE48"), Ok(0xDE48));
        assert_eq!(parse_base("$de48"), Ok(0xDE48));
        assert_eq!(parse_base("56896"), Ok(0xDE40));
    }

    #[test]
    fn base_parser_rejects_everything_else() {
        assert!(parse_base("0xde50").is_err());
        assert!(parse_base("0").is_err());
        assert!(parse_base("garbage").is_err());
    }

    #[test]
    fn enable_and_disable_flags_conflict() {
        assert!(Args::try_parse_from(["breadbin-digimax", "--sbdigimax", "--no-sbdigimax"]).is_err());
    }

    #[test]
    fn illegal_base_is_rejected_at_parse_time() {
        assert!(Args::try_parse_from(["breadbin-digimax", "--sbdigimax-base", "0xde50"]).is_err());
        let args =
            Args::try_parse_from(["breadbin-digimax", "--sbdigimax-base", "0xde48"]).unwrap();
        assert_eq!(args.sbdigimax_base, Some(0xDE48));
    }
}
