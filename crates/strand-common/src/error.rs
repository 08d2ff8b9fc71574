//! Common error types for the Strand attachment core.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`StrandError`].
pub type StrandResult<T> = Result<T, StrandError>;

/// Errors raised while attaching or detaching a container.
///
/// Every variant names the object it failed on so the plugin layer can report
/// it verbatim.
#[derive(Error, Diagnostic, Debug)]
pub enum StrandError {
    /// The OS entropy source could not produce a link name.
    #[error("Failed to generate random veth name: {reason}")]
    #[diagnostic(code(strand::naming::entropy))]
    Entropy {
        /// Underlying RNG failure.
        reason: String,
    },

    /// Every generated host-side name was already taken.
    #[error("Failed to find a unique veth name after {attempts} attempts")]
    #[diagnostic(code(strand::veth::name_exhaustion))]
    NameExhaustion {
        /// Number of attempts made.
        attempts: usize,
    },

    /// The container-side interface name is already in use.
    #[error("Container veth name provided ({name}) already exists")]
    #[diagnostic(
        code(strand::veth::duplicate),
        help("Pick another interface name or remove the existing link first")
    )]
    DuplicateInterface {
        /// The clashing container-side name.
        name: String,
    },

    /// The kernel refused to create the veth pair.
    #[error("Failed to make veth pair {name}: {reason}")]
    #[diagnostic(code(strand::veth::create))]
    LinkCreation {
        /// Container-side name of the pair.
        name: String,
        /// Kernel error.
        reason: String,
    },

    /// A CIDR string could not be parsed.
    #[error("Failed to parse addr {input}: {reason}")]
    #[diagnostic(
        code(strand::addr::parse),
        help("Use IPv4 CIDR notation such as 10.200.1.1/24")
    )]
    AddressParse {
        /// The rejected input.
        input: String,
        /// Parser error.
        reason: String,
    },

    /// The kernel refused to attach an address.
    #[error("Failed to set {address} on {name}: {reason}")]
    #[diagnostic(code(strand::addr::assign))]
    AddressAssign {
        /// Link name.
        name: String,
        /// The address being assigned.
        address: String,
        /// Kernel error.
        reason: String,
    },

    /// The kernel refused to change the administrative state of a link.
    #[error("Failed to set {name} up: {reason}")]
    #[diagnostic(code(strand::link::state))]
    LinkState {
        /// Link name.
        name: String,
        /// Kernel error.
        reason: String,
    },

    /// The kernel refused to move a link into another namespace.
    #[error("Failed to move {name} to {target}: {reason}")]
    #[diagnostic(
        code(strand::link::migrate),
        help("Moving links between namespaces requires CAP_NET_ADMIN in both")
    )]
    Migration {
        /// Link name.
        name: String,
        /// Description of the target namespace.
        target: String,
        /// Kernel error.
        reason: String,
    },

    /// A link lookup failed for a reason other than absence.
    #[error("Failed to lookup {name}: {reason}")]
    #[diagnostic(code(strand::link::lookup))]
    LinkLookup {
        /// Link name.
        name: String,
        /// Kernel error.
        reason: String,
    },

    /// No link with this name exists in the current namespace.
    #[error("Link not found: {name}")]
    #[diagnostic(code(strand::link::not_found))]
    LinkNotFound {
        /// Link name.
        name: String,
    },

    /// A link that should carry an address has none.
    #[error("Failed to get IP addresses for {name}: no IPv4 address assigned")]
    #[diagnostic(code(strand::addr::missing))]
    NoAddress {
        /// Link name.
        name: String,
    },

    /// The kernel refused to delete a link.
    #[error("Failed to delete {name}: {reason}")]
    #[diagnostic(code(strand::link::delete))]
    LinkDelete {
        /// Link name.
        name: String,
        /// Kernel error.
        reason: String,
    },

    /// A namespace file could not be opened.
    #[error("Failed to open netns {path}: {reason}")]
    #[diagnostic(code(strand::netns::open))]
    NamespaceOpen {
        /// Namespace path.
        path: String,
        /// OS error.
        reason: String,
    },

    /// `setns` into a namespace failed.
    #[error("Failed to enter netns {path}: {reason}")]
    #[diagnostic(
        code(strand::netns::enter),
        help("Try running with elevated privileges (sudo)")
    )]
    NamespaceEnter {
        /// Namespace path.
        path: String,
        /// OS error.
        reason: String,
    },

    /// The worker thread could not be switched back to its original namespace.
    #[error("Failed to restore the original network namespace")]
    #[diagnostic(code(strand::netns::restore))]
    NamespaceRestore,

    /// Opening a netlink connection failed.
    #[error("Netlink error: {reason}")]
    #[diagnostic(code(strand::netlink))]
    Netlink {
        /// Socket error.
        reason: String,
    },

    /// An attached interface is not in the expected state.
    #[error("Check failed for {name}: {reason}")]
    #[diagnostic(code(strand::check))]
    CheckFailed {
        /// Link name.
        name: String,
        /// What did not match.
        reason: String,
    },

    /// Invalid container ID format.
    #[error("Invalid container ID: {id}")]
    #[diagnostic(
        code(strand::container::invalid_id),
        help("Container IDs must start with an alphanumeric character and contain only alphanumerics, '_', '.' and '-'")
    )]
    InvalidContainerId {
        /// The invalid container ID.
        id: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(strand::config))]
    Config {
        /// The error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(strand::io))]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    #[diagnostic(code(strand::serialization))]
    Serialization(String),

    /// Internal error (should not happen).
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(strand::internal),
        help("This is a bug, please report it at https://github.com/strand-cni/strand/issues")
    )]
    Internal {
        /// The error message.
        message: String,
    },
}

impl StrandError {
    /// Whether retrying the whole call later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Entropy { .. } | Self::NameExhaustion { .. })
    }
}

impl From<serde_json::Error> for StrandError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StrandError::DuplicateInterface {
            name: "eth0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Container veth name provided (eth0) already exists"
        );
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: StrandError = io_err.into();
        assert!(matches!(err, StrandError::Io(_)));
    }

    #[test]
    fn transient_errors() {
        assert!(StrandError::NameExhaustion { attempts: 10 }.is_transient());
        assert!(
            !StrandError::LinkNotFound {
                name: "eth0".to_string()
            }
            .is_transient()
        );
    }
}
