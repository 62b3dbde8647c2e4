//! Link control capability and its rtnetlink implementation.
//!
//! # Responsibilities
//! - Bring links administratively down/up
//! - Rename links and change their MTU
//! - Enumerate live interfaces with their hardware address and MTU
//! - Best-effort kernel module loading
//!
//! Each call either fully applies or fully fails; callers compose them with a
//! [`Reverter`](crate::resilience::revert::Reverter) when several must succeed
//! together.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use futures_util::TryStreamExt;
use rtnetlink::packet_route::link::{LinkAttribute, LinkMessage};
use rtnetlink::LinkUnspec;

/// Error type for link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// No tokio runtime to drive the netlink connection.
    #[error("netlink link control needs a tokio runtime")]
    NoRuntime,
    /// The netlink socket could not be opened.
    #[error("unable to create netlink socket: {0}")]
    Connect(#[source] io::Error),
    /// The kernel rejected or failed a request.
    #[error("netlink request failed ({operation}): {source}")]
    Netlink {
        operation: String,
        #[source]
        source: rtnetlink::Error,
    },
    /// No link carries the name.
    #[error("no such interface: {0}")]
    NotFound(String),
    /// The helper binary could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    /// The helper ran but reported failure.
    #[error("{command} failed ({status}): {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },
}

/// The operating system's view of one interface at reconciliation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveInterface {
    pub name: String,
    /// Lower-case colon-separated hardware address; `None` when the link has
    /// no (or an all-zero) address.
    pub mac: Option<String>,
    pub mtu: u32,
}

/// Capability interface over the host's network links.
pub trait LinkControl {
    fn set_down(&self, name: &str) -> Result<(), LinkError>;

    fn set_up(&self, name: &str) -> Result<(), LinkError>;

    fn set_name(&self, name: &str, new_name: &str) -> Result<(), LinkError>;

    fn set_mtu(&self, name: &str, mtu: u32) -> Result<(), LinkError>;

    /// Snapshot of every interface currently present.
    fn interfaces(&self) -> Result<Vec<LiveInterface>, LinkError>;

    /// Load a kernel module. Callers treat failure as non-fatal.
    fn load_module(&self, _module: &str) -> Result<(), LinkError> {
        Ok(())
    }
}

impl<T: LinkControl + ?Sized> LinkControl for &T {
    fn set_down(&self, name: &str) -> Result<(), LinkError> {
        (**self).set_down(name)
    }

    fn set_up(&self, name: &str) -> Result<(), LinkError> {
        (**self).set_up(name)
    }

    fn set_name(&self, name: &str, new_name: &str) -> Result<(), LinkError> {
        (**self).set_name(name, new_name)
    }

    fn set_mtu(&self, name: &str, mtu: u32) -> Result<(), LinkError> {
        (**self).set_mtu(name, mtu)
    }

    fn interfaces(&self) -> Result<Vec<LiveInterface>, LinkError> {
        (**self).interfaces()
    }

    fn load_module(&self, module: &str) -> Result<(), LinkError> {
        (**self).load_module(module)
    }
}

/// One property change applied to a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkChange<'a> {
    Down,
    Up,
    Name(&'a str),
    Mtu(u32),
}

impl fmt::Display for LinkChange<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkChange::Down => write!(f, "set down"),
            LinkChange::Up => write!(f, "set up"),
            LinkChange::Name(name) => write!(f, "rename to {name}"),
            LinkChange::Mtu(mtu) => write!(f, "set mtu {mtu}"),
        }
    }
}

/// RTM_SETLINK message applying `change` to the link with `index`.
fn link_change_message(index: u32, change: LinkChange<'_>) -> LinkMessage {
    let builder = LinkUnspec::new_with_index(index);
    match change {
        LinkChange::Down => builder.down(),
        LinkChange::Up => builder.up(),
        LinkChange::Name(name) => builder.name(name.to_string()),
        LinkChange::Mtu(mtu) => builder.mtu(mtu),
    }
    .build()
}

/// Link control over rtnetlink, with `modprobe` for kernel modules.
///
/// The trait is synchronous; requests are driven to completion on the tokio
/// runtime the connection was opened on. Call it from blocking threads
/// (`spawn_blocking`), never from inside an async task.
#[derive(Clone)]
pub struct IpLink {
    handle: rtnetlink::Handle,
    runtime: tokio::runtime::Handle,
    modprobe_binary: PathBuf,
}

impl IpLink {
    /// Open a netlink connection on the current tokio runtime.
    pub fn connect() -> Result<Self, LinkError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| LinkError::NoRuntime)?;
        let (connection, handle, _) = rtnetlink::new_connection().map_err(LinkError::Connect)?;
        runtime.spawn(connection);

        Ok(Self {
            handle,
            runtime,
            modprobe_binary: PathBuf::from("modprobe"),
        })
    }

    async fn index_of(&self, name: &str) -> Result<u32, LinkError> {
        let mut links = self.handle.link().get().match_name(name.to_string()).execute();
        match links.try_next().await {
            Ok(Some(link)) => Ok(link.header.index),
            Ok(None) => Err(LinkError::NotFound(name.to_string())),
            Err(source) => Err(LinkError::Netlink {
                operation: format!("get {name}"),
                source,
            }),
        }
    }

    fn apply(&self, name: &str, change: LinkChange<'_>) -> Result<(), LinkError> {
        self.runtime.block_on(async {
            let index = self.index_of(name).await?;
            self.handle
                .link()
                .set(link_change_message(index, change))
                .execute()
                .await
                .map_err(|source| LinkError::Netlink {
                    operation: format!("{change} on {name}"),
                    source,
                })
        })
    }
}

impl fmt::Debug for IpLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IpLink")
            .field("modprobe_binary", &self.modprobe_binary)
            .finish_non_exhaustive()
    }
}

impl LinkControl for IpLink {
    fn set_down(&self, name: &str) -> Result<(), LinkError> {
        self.apply(name, LinkChange::Down)
    }

    fn set_up(&self, name: &str) -> Result<(), LinkError> {
        self.apply(name, LinkChange::Up)
    }

    fn set_name(&self, name: &str, new_name: &str) -> Result<(), LinkError> {
        self.apply(name, LinkChange::Name(new_name))
    }

    fn set_mtu(&self, name: &str, mtu: u32) -> Result<(), LinkError> {
        self.apply(name, LinkChange::Mtu(mtu))
    }

    fn interfaces(&self) -> Result<Vec<LiveInterface>, LinkError> {
        self.runtime.block_on(async {
            let mut links = self.handle.link().get().execute();
            let mut interfaces = Vec::new();
            while let Some(link) = links.try_next().await.map_err(|source| LinkError::Netlink {
                operation: "list links".to_string(),
                source,
            })? {
                if let Some(iface) = live_interface(&link) {
                    interfaces.push(iface);
                }
            }

            interfaces.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(interfaces)
        })
    }

    fn load_module(&self, module: &str) -> Result<(), LinkError> {
        run(&self.modprobe_binary, &[module])
    }
}

/// Read name, hardware address and MTU from a link message.
///
/// Links missing a name or MTU attribute are skipped.
fn live_interface(link: &LinkMessage) -> Option<LiveInterface> {
    let mut name = None;
    let mut mac = None;
    let mut mtu = None;

    for attr in &link.attributes {
        match attr {
            LinkAttribute::IfName(n) => name = Some(n.clone()),
            LinkAttribute::Address(addr) => mac = format_hw_addr(addr),
            LinkAttribute::Mtu(m) => mtu = Some(*m),
            _ => {}
        }
    }

    match (name, mtu) {
        (Some(name), Some(mtu)) => Some(LiveInterface { name, mac, mtu }),
        (name, _) => {
            tracing::debug!(index = link.header.index, interface = ?name, "Skipping link without name or MTU");
            None
        }
    }
}

fn format_hw_addr(bytes: &[u8]) -> Option<String> {
    let joined = bytes.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(":");
    normalize_hw_addr(&joined)
}

fn run(program: &Path, args: &[&str]) -> Result<(), LinkError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| LinkError::Spawn {
            program: program.display().to_string(),
            source,
        })?;

    if output.status.success() {
        return Ok(());
    }

    Err(LinkError::Command {
        command: format!("{} {}", program.display(), args.join(" ")),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Lower-case and trim a hardware address; all-zero and empty become `None`.
pub fn normalize_hw_addr(raw: &str) -> Option<String> {
    let addr = raw.trim().to_ascii_lowercase();
    if addr.is_empty() || addr.chars().all(|c| c == '0' || c == ':') {
        return None;
    }
    Some(addr)
}
