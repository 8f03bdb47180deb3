//! Router: maps an abstract target to the wire-level command.
//!
//! Pure dispatch over the target kind; holds references to the two protocol
//! backends and no other state.  Time profiles and the controller know
//! nothing about wire formats, and the protocols know nothing about
//! scheduling: adding a new target kind touches only this file.
//!
//! Failure policy: ordinary hardware failures (a write error, an id that
//! fails validation) become `Ok(false)` plus an error event; the campaign
//! counts them and carries on.  A target the campaign was never provisioned
//! for is a [`DispatchError`], which the controller treats as fatal.

use std::sync::Arc;

use semfi_core::Target;
use thiserror::Error;
use tracing::error;

use crate::infrastructure::reg::RegisterInjector;
use crate::infrastructure::sem::SemSession;

/// Contract violations in dispatch.  Always fatal: a well-formed campaign
/// provisions a backend for every kind its pool contains before starting.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no SEM backend provisioned for configuration target {address}")]
    MissingSemBackend { address: String },
}

/// Stateless dispatcher from [`Target`] to the matching protocol backend.
pub struct Router {
    sem: Option<Arc<SemSession>>,
    reg: Arc<dyn RegisterInjector>,
}

impl Router {
    /// Builds a router over the provisioned backends.  `sem` may be absent
    /// for register-only campaigns.
    pub fn new(sem: Option<Arc<SemSession>>, reg: Arc<dyn RegisterInjector>) -> Self {
        Self { sem, reg }
    }

    /// Routes one target to its backend.
    ///
    /// Returns `Ok(true)` when the injection command was enqueued to the
    /// wire, `Ok(false)` for ordinary failures (logged here), and
    /// [`DispatchError`] for contract violations.
    pub async fn dispatch(&self, target: &Target) -> Result<bool, DispatchError> {
        match target {
            Target::Config(t) => {
                let Some(sem) = &self.sem else {
                    return Err(DispatchError::MissingSemBackend {
                        address: t.config_address.clone(),
                    });
                };
                match sem.inject(&t.config_address).await {
                    Ok(_enqueued) => Ok(true),
                    Err(e) => {
                        error!(
                            address = %t.config_address,
                            module = %t.module_name,
                            error = %e,
                            "SEM injection failed"
                        );
                        Ok(false)
                    }
                }
            }
            Target::Reg(t) => match self.reg.inject_register(t.reg_id).await {
                Ok(_enqueued) => Ok(true),
                Err(e) => {
                    error!(
                        reg_id = t.reg_id,
                        module = %t.module_name,
                        error = %e,
                        "register injection failed"
                    );
                    Ok(false)
                }
            },
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
