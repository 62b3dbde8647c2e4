//! Converge live interfaces to their declared name and MTU.
//!
//! # Per-interface transaction
//! ```text
//! set_down(name)                     undo: set_up(<current name>)
//!   → set_name(name, target)         undo: set_name(target, name)
//!   → set_mtu(current, target)       undo: set_mtu(current, original)
//!   → set_up(current)
//!   → commit
//! ```
//!
//! Every mutation happens inside one administratively-down window. Any failed
//! step unwinds the steps before it, so an interface ends either exactly as
//! found or fully at its target and up.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::nic::config::{list_nic_config_files, parse_nic_configs, NicConfig};
use crate::nic::link::{LinkControl, LinkError, LiveInterface};
use crate::resilience::revert::Reverter;

/// Kernel module loaded before each pass so virtio NICs are present.
pub const DEFAULT_KERNEL_MODULES: &[&str] = &["virtio_net"];

/// Reconciles interfaces against a configuration directory.
///
/// Passes are not safe to run concurrently against the same host; callers
/// serialize calls to [`reconcile_interfaces`](Self::reconcile_interfaces).
#[derive(Debug)]
pub struct NicReconciler<L> {
    config_dir: PathBuf,
    link: L,
    kernel_modules: Vec<String>,
}

impl<L: LinkControl> NicReconciler<L> {
    pub fn new(config_dir: impl Into<PathBuf>, link: L) -> Self {
        Self {
            config_dir: config_dir.into(),
            link,
            kernel_modules: DEFAULT_KERNEL_MODULES.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Replace the list of modules loaded before each pass.
    pub fn with_kernel_modules(mut self, modules: Vec<String>) -> Self {
        self.kernel_modules = modules;
        self
    }

    /// Run one reconciliation pass.
    ///
    /// Nothing is returned: every abort or skip is reported through logging.
    /// A failing interface is rolled back and the pass moves on to the next.
    pub fn reconcile_interfaces(&self) {
        let paths = match list_nic_config_files(&self.config_dir) {
            Ok(Some(paths)) => paths,
            Ok(None) => return,
            Err(e) => {
                tracing::error!(error = %e, "Aborting network interface reconciliation");
                return;
            }
        };

        // Loaded before any file is parsed so a bad file cannot skip it.
        for module in &self.kernel_modules {
            if let Err(e) = self.link.load_module(module) {
                tracing::debug!(module = %module, error = %e, "Kernel module not loaded");
            }
        }

        let configs = match parse_nic_configs(&paths) {
            Ok(configs) => configs,
            Err(e) => {
                tracing::error!(error = %e, "Aborting network interface reconciliation");
                return;
            }
        };

        let interfaces = match self.link.interfaces() {
            Ok(interfaces) => interfaces,
            Err(e) => {
                tracing::error!(error = %e, "Unable to read network interfaces");
                return;
            }
        };

        let mut changed = 0usize;
        let mut failed = 0usize;
        for iface in &interfaces {
            let Some(config) = lookup(&configs, iface) else {
                continue;
            };

            match self.reconcile_interface(iface, config) {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(e) => {
                    failed += 1;
                    tracing::error!(interface = %iface.name, error = %e, "Unable to reconfigure network interface");
                }
            }
        }

        tracing::info!(
            declared = configs.len(),
            interfaces = interfaces.len(),
            changed,
            failed,
            "Network interface reconciliation finished"
        );
    }

    /// Apply `config` to one interface.
    ///
    /// Returns `Ok(false)` without touching the link when nothing differs.
    /// On error the interface has been restored to its state on entry, as far
    /// as the undo steps themselves succeeded.
    pub fn reconcile_interface(&self, iface: &LiveInterface, config: &NicConfig) -> Result<bool, LinkError> {
        let new_name = config.rename_to(&iface.name);
        let new_mtu = config.mtu_to(iface.mtu);
        if new_name.is_none() && new_mtu.is_none() {
            return Ok(false);
        }

        let link = &self.link;
        // Name the link currently carries; undo steps read it when they run.
        let current_cell = RefCell::new(iface.name.clone());
        let current = &current_cell;
        let mut reverter = Reverter::new();

        link.set_down(&iface.name)?;
        reverter.add(move || {
            let name = current.borrow().clone();
            if let Err(e) = link.set_up(&name) {
                tracing::warn!(interface = %name, error = %e, "Failed to bring interface back up");
            }
        });

        if let Some(target) = new_name {
            link.set_name(&iface.name, target)?;
            *current.borrow_mut() = target.to_string();
            reverter.add(move || match link.set_name(target, &iface.name) {
                Ok(()) => *current.borrow_mut() = iface.name.clone(),
                Err(e) => {
                    tracing::warn!(interface = %target, original = %iface.name, error = %e, "Failed to restore interface name");
                }
            });
        }

        if let Some(mtu) = new_mtu {
            let name = current.borrow().clone();
            link.set_mtu(&name, mtu)?;
            reverter.add(move || {
                let name = current.borrow().clone();
                if let Err(e) = link.set_mtu(&name, iface.mtu) {
                    tracing::warn!(interface = %name, mtu = iface.mtu, error = %e, "Failed to restore interface MTU");
                }
            });
        }

        let name = current.borrow().clone();
        link.set_up(&name)?;

        reverter.success();
        tracing::info!(
            interface = %iface.name,
            name = %name,
            mtu = new_mtu.unwrap_or(iface.mtu),
            "Reconfigured network interface"
        );
        Ok(true)
    }
}

fn lookup<'c>(configs: &'c HashMap<String, NicConfig>, iface: &LiveInterface) -> Option<&'c NicConfig> {
    configs.get(iface.mac.as_deref()?)
}
