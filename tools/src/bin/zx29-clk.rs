// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand, ValueEnum};
use probe_rs::Permissions;
use zx29_clk::{
    ClockDescriptor, ClockError, ClockHandle, ClockKind, Domain, ProbeMemory, RateError,
};

/// Inspect and control the ZX297520V3 clock tree through a debug probe
#[derive(Parser)]
#[command(version, about, long_about)]
struct Cli {
    /// The clock controller
    #[arg(ignore_case = true)]
    domain: DomainArg,

    /// Register base of the clock controller (use 0x for hex)
    ///
    /// Required for controllers that don't have a well-known base.
    #[arg(long, value_parser = parse_address)]
    base: Option<u64>,

    /// The target's chip name, as known by probe-rs
    #[arg(long)]
    chip: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List all clocks of the controller, then exit.
    List,
    /// Print clock rates and mux selections
    ///
    /// If empty, print all clocks. Names are case insensitive.
    Rates { clocks: Vec<String> },
    /// Ungate a clock
    Enable { clock: String },
    /// Gate a clock
    Disable { clock: String },
    /// Select the parent of a mux
    SetParent { clock: String, parent: String },
}

#[derive(Clone, ValueEnum)]
enum DomainArg {
    Top,
    Matrix,
    MatrixV2,
}

impl DomainArg {
    fn key(&self) -> &'static str {
        match self {
            Self::Top => "sanechips,zx297520v3-topcrm-clk",
            Self::Matrix => "sanechips,zx297520v3-matrix-clk",
            Self::MatrixV2 => "sanechips,zx297520v3-matrix-clk-v2",
        }
    }
}

fn parse_address(arg: &str) -> Result<u64, std::num::ParseIntError> {
    match arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => arg.parse(),
    }
}

fn lookup(domain: &Domain, name: &str) -> &'static ClockDescriptor {
    domain.lookup_name(name).unwrap_or_else(|| {
        Cli::command()
            .error(
                ErrorKind::InvalidValue,
                format!("Clock named '{name}' isn't known to this clock controller."),
            )
            .exit()
    })
}

fn rate_to_str(rate: Result<u64, RateError>) -> String {
    match rate {
        Ok(rate) => rate.to_string(),
        Err(RateError::Gated(_)) => String::from("(gate)"),
        Err(_) => String::from("???"),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("zx29_clk=info"))
        .init();

    let cli = Cli::parse();

    let handle = match cli.base {
        Some(base) => zx29_clk::bind(cli.domain.key(), Some(base)),
        None => ClockHandle::bind_default(cli.domain.key()),
    }
    .unwrap_or_else(|err| {
        log::warn!("cannot bind clock domain: {err}");
        Cli::command()
            .error(ErrorKind::MissingRequiredArgument, format!("{err}. Try --base."))
            .exit()
    });
    let domain = handle.domain();
    log::debug!(
        "bound clock domain '{}' at {:#010x}",
        domain.key(),
        handle.base()
    );

    if let Command::List = cli.command {
        for desc in domain.descriptors() {
            println!("{:<16} {}", desc.name(), desc.kind_name());
        }
        return;
    }

    let Some(chip) = cli.chip.as_deref() else {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "--chip is required to talk to the target.",
            )
            .exit()
    };

    let mut session = match probe_rs::Session::auto_attach(chip, Permissions::default()) {
        Ok(session) => session,
        Err(err) => Cli::command()
            .error(
                ErrorKind::Io,
                format!("{err} {err:?}\nIs your target connected to your debugger?"),
            )
            .exit(),
    };

    let mut core = match session.core(0) {
        Ok(core) => core,
        Err(err) => Cli::command()
            .error(ErrorKind::Io, format!("Cannot access core 0: {err}"))
            .exit(),
    };
    let mut bank = ProbeMemory::new(&mut core);

    if let Err(err) = run(&cli.command, &handle, &mut bank) {
        log::error!("{err}");
        std::process::exit(1);
    }
}

fn run(
    command: &Command,
    handle: &ClockHandle,
    bank: &mut ProbeMemory,
) -> Result<(), ClockError> {
    let domain = handle.domain();

    match command {
        Command::List => {}
        Command::Rates { clocks } => {
            let descs: Vec<_> = if clocks.is_empty() {
                domain.descriptors().collect()
            } else {
                clocks.iter().map(|name| lookup(domain, name)).collect()
            };

            println!(
                "{:>16} | {:>5} | {:>16} | {:>12}",
                "Name", "Kind", "Parent", "Rate (Hz)"
            );
            let line: String = "-".repeat(16 + 5 + 16 + 12 + (3 * 3));
            println!("{line}");

            for desc in descs {
                let parent = match desc.kind() {
                    ClockKind::Mux { .. } => match handle.parent(desc.id(), bank)? {
                        Some(parent) => domain
                            .find(parent)
                            .map(ClockDescriptor::name)
                            .unwrap_or("???"),
                        None => "(reserved)",
                    },
                    _ => "",
                };
                println!(
                    "{:>16} | {:>5} | {:>16} | {:>12}",
                    desc.name(),
                    desc.kind_name(),
                    parent,
                    rate_to_str(handle.rate(desc.id(), bank))
                );
            }
        }
        Command::Enable { clock } => {
            let desc = lookup(domain, clock);
            handle.enable(desc.id(), bank)?;
            log::info!("enabled {}", desc.name());
        }
        Command::Disable { clock } => {
            let desc = lookup(domain, clock);
            handle.disable(desc.id(), bank)?;
            log::info!("disabled {}", desc.name());
        }
        Command::SetParent { clock, parent } => {
            let desc = lookup(domain, clock);
            let parent = lookup(domain, parent);
            handle.set_parent(desc.id(), parent.id(), bank)?;
            log::info!(
                "{} now runs from {} at {} Hz",
                desc.name(),
                parent.name(),
                handle.get_rate(desc.id(), bank)
            );
        }
    }

    Ok(())
}
