//! Multi-Round Signing Protocol
//!
//! A `SignerSession` is opened once per pipeline run from a fresh account
//! query and owns that run's view of the signer's sequence. Each envelope
//! reserves its sequence by the number of the signer's transactions that
//! execute before it in the same block, so signing order and execution
//! order can differ without the caller doing sequence arithmetic.

use super::client::ChainClient;
use super::envelope::{SignedTransaction, SignerSlot, UnsignedEnvelope};
use super::keys::SigningParty;
use crate::error::{ArbError, ArbResult};
use std::collections::BTreeSet;
use tracing::debug;

pub struct SignerSession<'a> {
    party: &'a SigningParty,
    address: String,
    account_number: u64,
    base_sequence: u64,
    reserved: BTreeSet<u64>,
}

impl<'a> SignerSession<'a> {
    /// Point-in-time account lookup. A missing account is fatal for the run.
    pub async fn open(
        chain: &dyn ChainClient,
        party: &'a SigningParty,
        bech32_prefix: &str,
    ) -> ArbResult<SignerSession<'a>> {
        let address = party.key.address(bech32_prefix)?;
        let account = chain.account(&address).await?;
        debug!(
            "Signer {} account_number={} sequence={}",
            address, account.account_number, account.sequence
        );
        Ok(Self::with_account(
            party,
            address,
            account.account_number,
            account.sequence,
        ))
    }

    pub fn with_account(
        party: &'a SigningParty,
        address: String,
        account_number: u64,
        base_sequence: u64,
    ) -> Self {
        Self {
            party,
            address,
            account_number,
            base_sequence,
            reserved: BTreeSet::new(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn account_number(&self) -> u64 {
        self.account_number
    }

    /// Committed sequence as of the account query
    pub fn base_sequence(&self) -> u64 {
        self.base_sequence
    }

    /// Reserve the sequence for a tx preceded in the block by
    /// `preceding_in_block` other txs from this signer. Each position can be
    /// taken once per session.
    pub fn reserve_sequence(&mut self, preceding_in_block: u64) -> ArbResult<u64> {
        let sequence = self.free_sequence(preceding_in_block)?;
        self.reserved.insert(sequence);
        Ok(sequence)
    }

    /// The sequence for `preceding_in_block`, without taking it
    fn free_sequence(&self, preceding_in_block: u64) -> ArbResult<u64> {
        let sequence = self
            .base_sequence
            .checked_add(preceding_in_block)
            .ok_or_else(|| ArbError::Signing("sequence overflow".to_string()))?;
        if self.reserved.contains(&sequence) {
            return Err(ArbError::Signing(format!(
                "sequence {} already used in this session",
                sequence
            )));
        }
        Ok(sequence)
    }

    pub fn is_reserved(&self, sequence: u64) -> bool {
        self.reserved.contains(&sequence)
    }

    /// Sign as the only signer of `envelope`
    pub fn sign(
        &mut self,
        envelope: UnsignedEnvelope,
        preceding_in_block: u64,
        chain_id: &str,
    ) -> ArbResult<SignedTransaction> {
        sign_multi(envelope, &mut [(self, preceding_in_block)], chain_id)
    }
}

/// Sign an envelope that needs several accounts' signatures, one
/// `(session, preceding_in_block)` per signer in signer-info order.
pub fn sign_multi(
    envelope: UnsignedEnvelope,
    signers: &mut [(&mut SignerSession<'_>, u64)],
    chain_id: &str,
) -> ArbResult<SignedTransaction> {
    // pass 1: pick sequences and fix the layout
    let mut slots = Vec::with_capacity(signers.len());
    for (session, preceding) in signers.iter() {
        slots.push(SignerSlot {
            public_key: session.party.key.public_key_any(),
            sequence: session.free_sequence(*preceding)?,
        });
    }
    let sequences: Vec<u64> = slots.iter().map(|slot| slot.sequence).collect();
    let finalized = envelope.finalize(slots)?;

    // pass 2: sign the finalized bytes
    let signatures = signers
        .iter()
        .map(|(session, _)| {
            let sign_bytes = finalized.sign_bytes(chain_id, session.account_number);
            session.party.signature_over(&sign_bytes)
        })
        .collect::<ArbResult<Vec<_>>>()?;
    let signed = finalized.attach_signatures(signatures)?;

    // sequences are only taken once the tx is fully signed
    for ((session, _), sequence) in signers.iter_mut().zip(sequences) {
        session.reserved.insert(sequence);
    }
    Ok(signed)
}
