//! Command-line switches derived from collector descriptors.

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::collector::{Descriptor, Enablement};

/// Flag prefix of the per-collector switches.
pub const COLLECTOR_FLAG_PREFIX: &str = "collector.";

/// One `--collector.<name>` / `--no-collector.<name>` switch pair per collector.
///
/// The enabling flag is documented in `--help` with the collector's help text
/// and default state; the disabling flag is hidden. When both are given the
/// last one wins.
#[derive(Debug, Clone)]
pub struct CollectorSwitches {
    descriptors: Vec<Descriptor>,
}

impl CollectorSwitches {
    pub fn new(descriptors: Vec<Descriptor>) -> Self {
        Self { descriptors }
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    /// Add the switches for every descriptor to `command`.
    pub fn augment(&self, command: Command) -> Command {
        self.descriptors.iter().fold(command, |command, descriptor| {
            let enable = enable_id(&descriptor.name);
            let disable = disable_id(&descriptor.name);

            command
                .arg(
                    Arg::new(enable.clone())
                        .long(flag_name(&descriptor.name))
                        .action(ArgAction::SetTrue)
                        .help(help_text(descriptor))
                        .overrides_with(disable.clone()),
                )
                .arg(
                    Arg::new(disable.clone())
                        .long(format!("no-{}", flag_name(&descriptor.name)))
                        .action(ArgAction::SetTrue)
                        .hide(true)
                        .overrides_with(enable),
                )
        })
    }

    /// Resolve the enable/disable state of every collector from parsed input.
    pub fn resolve(&self, matches: &ArgMatches) -> Enablement {
        let mut enablement = Enablement::defaults(&self.descriptors);

        for descriptor in &self.descriptors {
            if given(matches, &enable_id(&descriptor.name)) {
                enablement.set(descriptor.name.clone(), true);
            } else if given(matches, &disable_id(&descriptor.name)) {
                enablement.set(descriptor.name.clone(), false);
            }
        }

        enablement
    }
}

/// Long flag name for a collector, e.g. `collector.bgp`.
pub fn flag_name(name: &str) -> String {
    format!("{}{}", COLLECTOR_FLAG_PREFIX, name)
}

/// Help text for a collector switch, e.g. "Collect BGP metrics (default: enabled)."
pub fn help_text(descriptor: &Descriptor) -> String {
    format!("{} (default: {}).", descriptor.help, descriptor.default_state())
}

fn enable_id(name: &str) -> String {
    format!("collector_{}", name)
}

fn disable_id(name: &str) -> String {
    format!("no_collector_{}", name)
}

fn given(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine) && matches.get_flag(id)
}
