//! Network namespace configurator.
//!
//! With no network driver the child shares the host's network namespace
//! and nothing is configured. Otherwise the sequence is: remount sysfs,
//! bring up loopback, let the driver create a device, address it and route
//! through it, then reconcile `/etc/resolv.conf` and `/etc/hosts`.

use std::path::Path;

use nestling_common::constants::{ETC_DIR, IP_BINARY, LOOPBACK_DEVICE};
use nestling_common::error::{ChildError, Result};
use nestling_common::types::{HandshakeMessage, NetworkConfig};

use crate::driver::NetworkDriver;
use crate::exec::{self, ExecError, argv};
use crate::filesystem::etc::{self, DnsStrategy};
use crate::filesystem::sysfs::{self, SysfsStatus};

/// Result of network setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkSetup {
    /// No driver: the host network namespace is shared.
    HostNetwork,
    /// A device was configured inside the namespace.
    Configured {
        /// Device created by the driver.
        device: String,
        /// Sysfs instance mounted before configuration.
        sysfs: SysfsStatus,
        /// How resolver files were installed.
        dns: DnsStrategy,
    },
}

/// Side effects performed on the namespace while configuring it.
pub trait Namespace {
    /// Mounts a sysfs reflecting the current network namespace.
    ///
    /// # Errors
    ///
    /// Returns [`ChildError::NamespaceSetup`] if the remount cannot complete.
    fn remount_sysfs(&self) -> Result<SysfsStatus>;

    /// Runs configuration commands in order.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] for the first command that fails.
    fn run(&self, commands: &[Vec<String>]) -> std::result::Result<(), ExecError>;

    /// Hostname written into `/etc/hosts`.
    ///
    /// # Errors
    ///
    /// Returns [`ChildError::NamespaceSetup`] if it cannot be read.
    fn hostname(&self) -> Result<String>;

    /// Installs resolver files with `strategy`.
    ///
    /// # Errors
    ///
    /// Returns [`ChildError::Io`] or [`ChildError::NamespaceSetup`].
    fn reconcile_dns(
        &self,
        strategy: DnsStrategy,
        state_dir: &Path,
        dns: &[String],
        hostname: &str,
    ) -> Result<()>;
}

/// The child's own namespaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveNamespace;

impl Namespace for LiveNamespace {
    fn remount_sysfs(&self) -> Result<SysfsStatus> {
        sysfs::remount_sysfs()
    }

    fn run(&self, commands: &[Vec<String>]) -> std::result::Result<(), ExecError> {
        exec::run_all(commands)
    }

    fn hostname(&self) -> Result<String> {
        nix::unistd::gethostname()
            .map(|name| name.to_string_lossy().into_owned())
            .map_err(|e| ChildError::namespace_setup("reading hostname", e))
    }

    fn reconcile_dns(
        &self,
        strategy: DnsStrategy,
        state_dir: &Path,
        dns: &[String],
        hostname: &str,
    ) -> Result<()> {
        etc::reconcile(strategy, Path::new(ETC_DIR), state_dir, dns, hostname)
    }
}

/// Configures the network namespace for `msg`.
///
/// `etc_copied` selects the DNS strategy.
///
/// # Errors
///
/// - [`ChildError::Config`] if the network configuration is invalid, `ip`
///   is missing, or loopback cannot be brought up.
/// - [`ChildError::NamespaceSetup`] if the sysfs remount or device
///   configuration fails.
/// - [`ChildError::Driver`] if the driver cannot create its device.
pub fn setup_network(
    msg: &HandshakeMessage,
    etc_copied: bool,
    driver: Option<&dyn NetworkDriver>,
) -> Result<NetworkSetup> {
    let Some(driver) = driver else {
        tracing::debug!("no network driver, sharing the host network");
        return Ok(NetworkSetup::HostNetwork);
    };
    msg.network.validate()?;
    let _ = which::which(IP_BINARY).map_err(|e| ChildError::Config {
        message: format!("{IP_BINARY} not found in PATH"),
        source: Some(Box::new(e)),
    })?;
    configure(&LiveNamespace, msg, etc_copied, driver)
}

/// Runs the configured-network sequence against `ns`.
///
/// # Errors
///
/// Same classes as [`setup_network`], minus its up-front validation.
pub fn configure(
    ns: &dyn Namespace,
    msg: &HandshakeMessage,
    etc_copied: bool,
    driver: &dyn NetworkDriver,
) -> Result<NetworkSetup> {
    let net = &msg.network;
    let sysfs = ns.remount_sysfs()?;

    ns.run(&[argv([IP_BINARY, "link", "set", LOOPBACK_DEVICE, "up"])])
        .map_err(|e| ChildError::Config {
            message: "activating loopback".into(),
            source: Some(Box::new(e)),
        })?;

    let device = driver
        .configure_tap(net)
        .map_err(|e| ChildError::driver("network", e))?;
    ns.run(&device_commands(&device, net))
        .map_err(|e| ChildError::namespace_setup(format!("activating {device}"), e))?;
    tracing::info!(
        device = %device,
        cidr = %net.cidr(),
        gateway = %net.gateway,
        mtu = net.mtu,
        "network device configured"
    );

    let dns = DnsStrategy::for_copy_up(etc_copied);
    ns.reconcile_dns(dns, &msg.state_dir, &net.dns, &ns.hostname()?)?;

    Ok(NetworkSetup::Configured {
        device,
        sysfs,
        dns,
    })
}

/// Commands that bring `device` up and route through it.
pub fn device_commands(device: &str, net: &NetworkConfig) -> Vec<Vec<String>> {
    let mtu = net.mtu.to_string();
    let cidr = net.cidr();
    vec![
        argv([IP_BINARY, "link", "set", device, "up"]),
        argv([IP_BINARY, "link", "set", "dev", device, "mtu", mtu.as_str()]),
        argv([IP_BINARY, "addr", "add", cidr.as_str(), "dev", device]),
        argv([IP_BINARY, "route", "add", "default", "via", net.gateway.as_str(), "dev", device]),
    ]
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use nestling_common::error::{BoxError, CommandFailure};

    use super::*;

    #[derive(Default)]
    struct RecordingDriver {
        called: AtomicBool,
    }

    impl NetworkDriver for RecordingDriver {
        fn configure_tap(&self, _config: &NetworkConfig) -> std::result::Result<String, BoxError> {
            self.called.store(true, Ordering::SeqCst);
            Ok("tap0".into())
        }
    }

    struct FailingDriver;

    impl NetworkDriver for FailingDriver {
        fn configure_tap(&self, _config: &NetworkConfig) -> std::result::Result<String, BoxError> {
            Err("no /dev/net/tun".into())
        }
    }

    /// Records every side effect and fails the first command starting
    /// with `fail_on`.
    #[derive(Default)]
    struct FakeNamespace {
        events: Mutex<Vec<String>>,
        fail_on: Option<Vec<String>>,
    }

    impl FakeNamespace {
        fn failing(prefix: &[&str]) -> Self {
            Self {
                fail_on: Some(prefix.iter().map(ToString::to_string).collect()),
                ..Self::default()
            }
        }

        fn record(&self, event: impl Into<String>) {
            self.events.lock().unwrap().push(event.into());
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Namespace for FakeNamespace {
        fn remount_sysfs(&self) -> Result<SysfsStatus> {
            self.record("sysfs");
            Ok(SysfsStatus::ReadOnly)
        }

        fn run(&self, commands: &[Vec<String>]) -> std::result::Result<(), ExecError> {
            for command in commands {
                self.record(command.join(" "));
                if self.fail_on.as_ref().is_some_and(|p| command.starts_with(p)) {
                    return Err(ExecError {
                        command: format!("{command:?}"),
                        reason: CommandFailure::Spawn(std::io::ErrorKind::NotFound.into()),
                    });
                }
            }
            Ok(())
        }

        fn hostname(&self) -> Result<String> {
            Ok("sandbox".into())
        }

        fn reconcile_dns(
            &self,
            strategy: DnsStrategy,
            _state_dir: &Path,
            dns: &[String],
            hostname: &str,
        ) -> Result<()> {
            self.record(format!("dns {strategy:?} {} {hostname}", dns.join(",")));
            Ok(())
        }
    }

    fn net() -> NetworkConfig {
        NetworkConfig {
            ip: "10.0.2.100".into(),
            netmask: 24,
            gateway: "10.0.2.2".into(),
            mtu: 1500,
            dns: vec!["10.0.2.3".into()],
            ..NetworkConfig::default()
        }
    }

    fn configured_msg() -> HandshakeMessage {
        HandshakeMessage {
            stage: 1,
            state_dir: "/run/nestling".into(),
            network: net(),
            ..HandshakeMessage::default()
        }
    }

    #[test]
    fn host_network_ignores_message() {
        let msg = HandshakeMessage {
            stage: 1,
            network: NetworkConfig {
                ip: "not an address".into(),
                ..NetworkConfig::default()
            },
            ..HandshakeMessage::default()
        };
        assert_eq!(setup_network(&msg, false, None).unwrap(), NetworkSetup::HostNetwork);
        assert_eq!(setup_network(&msg, true, None).unwrap(), NetworkSetup::HostNetwork);
    }

    #[test]
    fn invalid_config_fails_before_driver_runs() {
        let driver = RecordingDriver::default();
        let msg = HandshakeMessage {
            network: NetworkConfig {
                mtu: 0,
                ..net()
            },
            ..configured_msg()
        };
        let err = setup_network(&msg, false, Some(&driver)).unwrap_err();
        assert!(matches!(err, ChildError::Config { .. }));
        assert!(!driver.called.load(Ordering::SeqCst));
    }

    #[test]
    fn configured_sequence_runs_in_order() {
        let ns = FakeNamespace::default();
        let driver = RecordingDriver::default();
        let setup = configure(&ns, &configured_msg(), false, &driver).unwrap();

        assert_eq!(
            setup,
            NetworkSetup::Configured {
                device: "tap0".into(),
                sysfs: SysfsStatus::ReadOnly,
                dns: DnsStrategy::BindMount,
            }
        );
        assert_eq!(
            ns.events(),
            [
                "sysfs",
                "ip link set lo up",
                "ip link set tap0 up",
                "ip link set dev tap0 mtu 1500",
                "ip addr add 10.0.2.100/24 dev tap0",
                "ip route add default via 10.0.2.2 dev tap0",
                "dns BindMount 10.0.2.3 sandbox",
            ]
        );
    }

    #[test]
    fn copied_up_etc_is_written_in_place() {
        let ns = FakeNamespace::default();
        let driver = RecordingDriver::default();
        let setup = configure(&ns, &configured_msg(), true, &driver).unwrap();
        assert!(matches!(
            setup,
            NetworkSetup::Configured {
                dns: DnsStrategy::WriteInPlace,
                ..
            }
        ));
        assert_eq!(ns.events().last().unwrap(), "dns WriteInPlace 10.0.2.3 sandbox");
    }

    #[test]
    fn loopback_failure_is_config_error() {
        let ns = FakeNamespace::failing(&["ip", "link", "set", "lo"]);
        let driver = RecordingDriver::default();
        let err = configure(&ns, &configured_msg(), false, &driver).unwrap_err();
        assert!(matches!(err, ChildError::Config { .. }));
        assert!(!driver.called.load(Ordering::SeqCst));
    }

    #[test]
    fn driver_failure_is_network_driver_error() {
        let ns = FakeNamespace::default();
        let err = configure(&ns, &configured_msg(), false, &FailingDriver).unwrap_err();
        assert!(matches!(err, ChildError::Driver { driver: "network", .. }));
        assert_eq!(ns.events(), ["sysfs", "ip link set lo up"]);
    }

    #[test]
    fn device_failure_is_namespace_setup_error() {
        let ns = FakeNamespace::failing(&["ip", "addr"]);
        let driver = RecordingDriver::default();
        let err = configure(&ns, &configured_msg(), false, &driver).unwrap_err();
        assert!(matches!(err, ChildError::NamespaceSetup { .. }));
        assert!(err.to_string().contains("activating tap0"));
        assert!(!ns.events().iter().any(|e| e.starts_with("dns")));
    }

    #[test]
    fn device_commands_follow_configuration() {
        let cmds = device_commands("tap0", &net());
        assert_eq!(
            cmds,
            vec![
                argv(["ip", "link", "set", "tap0", "up"]),
                argv(["ip", "link", "set", "dev", "tap0", "mtu", "1500"]),
                argv(["ip", "addr", "add", "10.0.2.100/24", "dev", "tap0"]),
                argv(["ip", "route", "add", "default", "via", "10.0.2.2", "dev", "tap0"]),
            ]
        );
    }
}
