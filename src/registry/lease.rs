//! Process-wide exclusivity of connection credentials.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::backend::Credential;
use crate::error::BridgeError;

/// Live leases: credential fingerprint -> backend holding it.
static LEASES: Mutex<BTreeMap<u64, String>> = Mutex::new(BTreeMap::new());

/// Exclusive claim on a credential for the life of one facade.
///
/// Released when dropped.
#[derive(Debug)]
pub struct CredentialLease {
    fingerprint: u64,
    backend: String,
}

impl CredentialLease {
    /// Claim `credential` for `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::CredentialInUse`] while another live facade
    /// holds the same credential.
    pub(crate) fn acquire(credential: &Credential, backend: &str) -> Result<Self, BridgeError> {
        let fingerprint = credential.fingerprint();
        let mut leases = LEASES.lock();
        if let Some(holder) = leases.get(&fingerprint) {
            return Err(BridgeError::CredentialInUse {
                backend: holder.clone(),
            });
        }
        leases.insert(fingerprint, backend.to_owned());
        debug!(backend, "credential lease acquired");
        Ok(Self {
            fingerprint,
            backend: backend.to_owned(),
        })
    }

    /// Backend holding the lease.
    pub fn backend(&self) -> &str {
        &self.backend
    }
}

impl Drop for CredentialLease {
    fn drop(&mut self) {
        LEASES.lock().remove(&self.fingerprint);
        debug!(backend = %self.backend, "credential lease released");
    }
}
