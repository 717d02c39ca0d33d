//! Well-known paths, device names, and defaults.

/// Environment variable carrying the handshake descriptor when none is
/// configured explicitly.
pub const DEFAULT_PIPE_ENV_KEY: &str = "_NESTLING_PIPEFD";

/// Path used to re-execute the running binary.
pub const SELF_EXE: &str = "/proc/self/exe";

/// Mount point of sysfs.
pub const SYSFS_PATH: &str = "/sys";

/// Cgroup hierarchy mount point under sysfs.
pub const CGROUP_PATH: &str = "/sys/fs/cgroup";

/// Directory that hosts staging directories for remounts and copy-up.
pub const TMP_DIR: &str = "/tmp";

/// Prefix of the staging directory holding the cgroup bind during the
/// sysfs remount.
pub const SYSFS_STAGING_PREFIX: &str = "nlsys";

/// Prefix of the tmpfs staging directories created by copy-up.
pub const COPY_UP_STAGING_PREFIX: &str = "nlcopy";

/// Directory whose copy-up status selects the DNS strategy.
pub const ETC_DIR: &str = "/etc";

/// Resolver configuration file name.
pub const RESOLV_CONF: &str = "resolv.conf";

/// Static host table file name.
pub const HOSTS: &str = "hosts";

/// Loopback device brought up in every configured network namespace.
pub const LOOPBACK_DEVICE: &str = "lo";

/// Device name used by the TAP network driver.
pub const DEFAULT_TAP_DEVICE: &str = "tap0";

/// Binary used for link, address, and route configuration.
pub const IP_BINARY: &str = "ip";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "nestling-child";
