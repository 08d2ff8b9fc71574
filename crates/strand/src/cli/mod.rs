//! CNI entry point: environment parsing and command dispatch.

use std::io::{Read, Write};

use clap::{Parser, ValueEnum};
use strand_common::{AddressPlan, ContainerId, NetConf};
use strand_network::{SetupRequest, TeardownRequest, attach, detach, parse_cidr, verify};

use crate::cni::{PluginError, VersionInfo, read_conf, result_version, write_json};

/// Strand - point-to-point veth CNI plugin
///
/// Invoked by a container runtime with the `CNI_*` environment set and the
/// network configuration on stdin.
#[derive(Parser, Debug)]
#[command(name = "strand")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Operation to perform
    #[arg(long, env = "CNI_COMMAND", value_enum)]
    pub command: Option<CniCommand>,

    /// Container ID
    #[arg(long, env = "CNI_CONTAINERID", default_value = "")]
    pub container_id: String,

    /// Path of the container network namespace
    #[arg(long, env = "CNI_NETNS", default_value = "")]
    pub netns: String,

    /// Interface name to create inside the container
    #[arg(long, env = "CNI_IFNAME", default_value = "")]
    pub ifname: String,

    /// Extra plugin arguments (logged only)
    #[arg(long, env = "CNI_ARGS", default_value = "")]
    pub args: String,

    /// Plugin search path (logged only)
    #[arg(long, env = "CNI_PATH", default_value = "")]
    pub path: String,

    /// Enable debug logging
    #[arg(long, env = "STRAND_DEBUG")]
    pub debug: bool,
}

/// CNI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CniCommand {
    /// Attach the container
    #[value(name = "ADD")]
    Add,
    /// Detach the container
    #[value(name = "DEL")]
    Del,
    /// Verify an attachment
    #[value(name = "CHECK")]
    Check,
    /// Report supported versions
    #[value(name = "VERSION")]
    Version,
}

impl Cli {
    /// Run the requested command, reading config from `input` and writing
    /// the result to `out`.
    pub fn execute<R: Read, W: Write>(self, input: R, out: &mut W) -> Result<(), PluginError> {
        let command = self.command.ok_or(PluginError::MissingEnv("CNI_COMMAND"))?;

        tracing::debug!(
            ?command,
            container_id = %self.container_id,
            netns = %self.netns,
            ifname = %self.ifname,
            args = %self.args,
            path = %self.path,
            "Plugin invoked"
        );

        match command {
            CniCommand::Version => write_json(out, &VersionInfo::default()),

            CniCommand::Add => {
                let conf = read_conf(input)?;
                let version = result_version(&conf)?;
                let result = attach(self.setup_request(&conf)?)?;
                write_json(out, &result.with_version(version))
            }

            CniCommand::Del => {
                read_conf(input)?;
                let req = TeardownRequest::new(
                    self.validated_id()?,
                    &self.netns,
                    require(&self.ifname, "CNI_IFNAME")?,
                );
                detach(req)?;
                Ok(())
            }

            CniCommand::Check => {
                let conf = read_conf(input)?;
                result_version(&conf)?;
                verify(self.setup_request(&conf)?)?;
                Ok(())
            }
        }
    }

    fn validated_id(&self) -> Result<ContainerId, PluginError> {
        Ok(ContainerId::new(require(&self.container_id, "CNI_CONTAINERID")?)?)
    }

    fn setup_request(&self, conf: &NetConf) -> Result<SetupRequest, PluginError> {
        Ok(SetupRequest::new(
            self.validated_id()?,
            require(&self.netns, "CNI_NETNS")?,
            require(&self.ifname, "CNI_IFNAME")?,
        )
        .with_mtu(conf.mtu())
        .with_plan(address_plan(conf)?))
    }
}

/// The fixed plan, with any addresses the configuration names swapped in.
fn address_plan(conf: &NetConf) -> Result<AddressPlan, PluginError> {
    let mut plan = AddressPlan::FIXED;
    if let Some(host) = &conf.host_address {
        plan.host = parse_cidr(host)?;
    }
    if let Some(container) = &conf.container_address {
        plan.container = parse_cidr(container)?;
    }
    Ok(plan)
}

fn require<'a>(value: &'a str, var: &'static str) -> Result<&'a str, PluginError> {
    if value.is_empty() {
        Err(PluginError::MissingEnv(var))
    } else {
        Ok(value)
    }
}
