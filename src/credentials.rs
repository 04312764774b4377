//! Amount and weight credential issuance and verification.
//!
//! A credential is an opaque token certifying a numeric value owed to its
//! holder, in one of two independent dimensions: satoshi amount or
//! transaction vsize. Credentials authorize output registration without
//! naming the input that funded them; presentation, not identity, is
//! what the verifier checks.
//!
//! The scheme here is a keyed-MAC stand-in kept behind the same contract
//! a blind/keyed-verification construction would satisfy: fixed group
//! size, exact-sum verification, and atomic double-spend rejection. The
//! issuer key never leaves the coordinator.

use crate::error::ProtocolError;
use crate::types::RoundId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Every issuance and every presentation carries exactly this many
/// credentials; zero-valued fillers pad the group.
pub const CREDENTIAL_NUMBER: usize = 2;

/// Which book a credential draws on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialKind {
    /// Satoshi value.
    Amount,
    /// Transaction virtual size.
    Vsize,
}

impl CredentialKind {
    fn tag_byte(&self) -> u8 {
        match self {
            CredentialKind::Amount => 0,
            CredentialKind::Vsize => 1,
        }
    }
}

/// An unlinkable value token. The serial is random per credential; the
/// tag binds serial, kind, and value to one round's issuer key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub serial: [u8; 32],
    pub kind: CredentialKind,
    pub value: u64,
    pub tag: [u8; 32],
}

/// Per-round credential issuer and verifier.
///
/// Owns the issuer key and the spent-serial registry. Verification and
/// spending happen in one call under the round's lock, so two concurrent
/// presentations of the same serial can never both succeed.
pub struct CredentialIssuer {
    key: [u8; 32],
    round_id: RoundId,
    spent: HashSet<[u8; 32]>,
}

impl CredentialIssuer {
    pub fn new(round_id: RoundId) -> Self {
        Self { key: rand::random(), round_id, spent: HashSet::new() }
    }

    fn tag(&self, kind: CredentialKind, serial: &[u8; 32], value: u64) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(serial);
        hasher.update(&[kind.tag_byte()]);
        hasher.update(&value.to_le_bytes());
        hasher.update(&self.round_id);
        *hasher.finalize().as_bytes()
    }

    /// Issue a group of `CREDENTIAL_NUMBER` credentials summing to `value`:
    /// one carries the full value, the rest are zero-valued fillers.
    pub fn issue(&self, kind: CredentialKind, value: u64) -> Vec<Credential> {
        (0..CREDENTIAL_NUMBER)
            .map(|i| {
                let serial: [u8; 32] = rand::random();
                let value = if i == 0 { value } else { 0 };
                Credential { serial, kind, value, tag: self.tag(kind, &serial, value) }
            })
            .collect()
    }

    /// Check a presented group without spending it.
    ///
    /// The group must have exactly `CREDENTIAL_NUMBER` members of the
    /// right kind, every tag must check out, no serial may have been
    /// presented before (here or within the group itself), and the values
    /// must sum to `required` exactly.
    pub fn verify(
        &self,
        kind: CredentialKind,
        presented: &[Credential],
        required: u64,
    ) -> Result<(), ProtocolError> {
        if presented.len() != CREDENTIAL_NUMBER {
            return Err(ProtocolError::WrongCredentialCount { got: presented.len() });
        }
        let mut group = HashSet::new();
        for cred in presented {
            if cred.kind != kind || cred.tag != self.tag(kind, &cred.serial, cred.value) {
                return Err(ProtocolError::InvalidCredential);
            }
            if self.spent.contains(&cred.serial) || !group.insert(cred.serial) {
                return Err(ProtocolError::CredentialAlreadySpent);
            }
        }
        let presented_total: u64 = presented.iter().map(|c| c.value).sum();
        if presented_total != required {
            return Err(ProtocolError::CredentialValueMismatch {
                presented: presented_total,
                required,
            });
        }
        Ok(())
    }

    /// Whether a serial has already been presented and spent.
    pub fn is_spent(&self, serial: &[u8; 32]) -> bool {
        self.spent.contains(serial)
    }

    /// Mark a verified group spent. Callers verify every group in a
    /// registration first, then consume them all, so a rejection never
    /// burns a serial.
    pub fn consume(&mut self, presented: &[Credential]) {
        for cred in presented {
            self.spent.insert(cred.serial);
        }
    }

    /// Verify and spend in one call.
    pub fn verify_and_consume(
        &mut self,
        kind: CredentialKind,
        presented: &[Credential],
        required: u64,
    ) -> Result<(), ProtocolError> {
        self.verify(kind, presented, required)?;
        self.consume(presented);
        Ok(())
    }
}
