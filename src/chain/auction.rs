//! Auction Bundle Submitter
//!
//! Signs the swap, wraps its bytes as the single bundled tx of a top-of-block
//! auction bid, signs the bid and broadcasts it. The bid executes first in
//! the block and the swap right after it, so the swap takes the signer's
//! next sequence even though it is signed first.
//!
//! The bid amount is a fixed setting, not derived from expected profit.

use super::client::ChainClient;
use super::envelope::{bid_message, swap_message, EnvelopeParams, UnsignedEnvelope};
use super::keys::SigningParty;
use super::proto::Coin;
use super::signing::SignerSession;
use crate::config::BotConfig;
use crate::error::{with_timeout, ArbResult};
use crate::types::QuotedRoute;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Block positions within the bundle
const BID_POSITION: u64 = 0;
const SWAP_POSITION: u64 = 1;

#[derive(Debug, Clone)]
pub struct BundleSettings {
    pub chain_id: String,
    pub bech32_prefix: String,
    pub envelope: EnvelopeParams,
    pub bid_denom: String,
    pub bid_amount: u128,
    pub call_timeout: Duration,
    /// false: sign everything, broadcast nothing
    pub live: bool,
}

impl BundleSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            chain_id: config.chain_id.clone(),
            bech32_prefix: config.bech32_prefix.clone(),
            envelope: EnvelopeParams::from_config(config),
            bid_denom: config.bid_denom.clone(),
            bid_amount: config.bid_amount,
            call_timeout: config.call_timeout(),
            live: config.live_mode,
        }
    }
}

/// The swap to bundle: a route plus the exact input it must consume
#[derive(Debug, Clone)]
pub struct SwapOrder {
    pub route: QuotedRoute,
    pub token_in_denom: String,
    pub amount_in: u128,
    pub min_out: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleReceipt {
    pub bid_hash: String,
    pub swap_hash: String,
    pub bid_sequence: u64,
    pub swap_sequence: u64,
    pub timeout_height: u64,
    /// false in dry-run mode
    pub broadcast: bool,
}

pub struct BundleSubmitter {
    chain: Arc<dyn ChainClient>,
    party: Arc<SigningParty>,
    settings: BundleSettings,
}

impl BundleSubmitter {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        party: Arc<SigningParty>,
        settings: BundleSettings,
    ) -> Self {
        Self {
            chain,
            party,
            settings,
        }
    }

    pub fn is_live(&self) -> bool {
        self.settings.live
    }

    /// Build, sign and broadcast the bundle. A sequence mismatch at broadcast
    /// is retried once with a freshly queried sequence and new signatures.
    pub async fn submit(&self, order: &SwapOrder) -> ArbResult<BundleReceipt> {
        match self.attempt(order).await {
            Err(e) if e.is_sequence_mismatch() => {
                warn!("Bundle rejected on sequence ({}), re-signing once", e);
                self.attempt(order).await
            }
            other => other,
        }
    }

    async fn attempt(&self, order: &SwapOrder) -> ArbResult<BundleReceipt> {
        let timeout = self.settings.call_timeout;
        let mut session = with_timeout(
            "account query",
            timeout,
            SignerSession::open(self.chain.as_ref(), &self.party, &self.settings.bech32_prefix),
        )
        .await?;
        let height = with_timeout("latest block", timeout, self.chain.latest_height()).await?;

        let swap_msg = swap_message(
            session.address(),
            &order.route,
            &order.token_in_denom,
            order.amount_in,
            order.min_out,
        )?;
        let swap_env = UnsignedEnvelope::new(vec![swap_msg], &self.settings.envelope, height);
        let timeout_height = swap_env.timeout_height;
        let swap_tx = session.sign(swap_env, SWAP_POSITION, &self.settings.chain_id)?;

        // the bid payload is the signed swap itself
        let bid = Coin::new(self.settings.bid_amount, &self.settings.bid_denom);
        let bid_msg = bid_message(session.address(), bid, vec![swap_tx.to_bytes()]);
        let bid_env = UnsignedEnvelope::new(vec![bid_msg], &self.settings.envelope, height);
        let bid_tx = session.sign(bid_env, BID_POSITION, &self.settings.chain_id)?;

        let mut receipt = BundleReceipt {
            bid_hash: bid_tx.hash(),
            swap_hash: swap_tx.hash(),
            bid_sequence: bid_tx.sequences()[0],
            swap_sequence: swap_tx.sequences()[0],
            timeout_height,
            broadcast: false,
        };
        debug!(
            "Bundle signed: bid seq {} / swap seq {}, timeout height {}",
            receipt.bid_sequence, receipt.swap_sequence, timeout_height
        );

        if !self.settings.live {
            info!(
                "🧪 DRY RUN: bundle signed, not broadcast (bid {}, swap {})",
                receipt.bid_hash, receipt.swap_hash
            );
            return Ok(receipt);
        }

        let accepted = with_timeout("broadcast", timeout, self.chain.broadcast(&bid_tx.to_bytes())).await?;
        if accepted != receipt.bid_hash {
            warn!("Node reported bid hash {} (local {})", accepted, receipt.bid_hash);
            receipt.bid_hash = accepted;
        }
        receipt.broadcast = true;
        info!(
            "📤 Bundle accepted into mempool: bid {} carrying swap {}",
            receipt.bid_hash, receipt.swap_hash
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::proto::{AuthInfo, MsgAuctionBid, TxBody, TxRaw, AUCTION_BID_TYPE_URL};
    use crate::error::ArbError;
    use crate::testing::{MockChain, KEY_HEX};
    use crate::types::{PoolHop, SplitRoute};
    use prost::Message;
    use sha2::{Digest, Sha256};

    fn settings(live: bool) -> BundleSettings {
        BundleSettings {
            chain_id: "osmosis-1".to_string(),
            bech32_prefix: "osmo".to_string(),
            envelope: EnvelopeParams {
                fee_denom: "uosmo".to_string(),
                fee_amount: 7000,
                gas_limit: 1_700_000,
                timeout_horizon: 1,
                selected_authenticators: vec![],
            },
            bid_denom: "uosmo".to_string(),
            bid_amount: 100,
            call_timeout: Duration::from_secs(1),
            live,
        }
    }

    fn order(amount_in: u128) -> SwapOrder {
        SwapOrder {
            route: QuotedRoute {
                token_in_denom: "ubtc".to_string(),
                token_out_denom: "uusdt".to_string(),
                amount_in,
                amount_out: 1_000_000,
                splits: vec![SplitRoute {
                    hops: vec![PoolHop {
                        pool_id: 1400,
                        token_out_denom: "uusdt".to_string(),
                    }],
                    amount_in,
                }],
            },
            token_in_denom: "ubtc".to_string(),
            amount_in,
            min_out: 990_000,
        }
    }

    fn submitter(chain: Arc<MockChain>, live: bool) -> BundleSubmitter {
        let party = Arc::new(SigningParty::from_hex(KEY_HEX, &[]).unwrap());
        BundleSubmitter::new(chain, party, settings(live))
    }

    fn sequence_of(tx_bytes: &[u8]) -> u64 {
        let raw = TxRaw::decode(tx_bytes).unwrap();
        AuthInfo::decode(raw.auth_info_bytes.as_slice())
            .unwrap()
            .signer_infos[0]
            .sequence
    }

    fn bundled_swap(bid_bytes: &[u8]) -> Vec<u8> {
        let raw = TxRaw::decode(bid_bytes).unwrap();
        let body = TxBody::decode(raw.body_bytes.as_slice()).unwrap();
        assert_eq!(body.messages[0].type_url, AUCTION_BID_TYPE_URL);
        let bid = MsgAuctionBid::decode(body.messages[0].value.as_slice()).unwrap();
        assert_eq!(bid.bid.unwrap().amount, "100");
        assert_eq!(bid.transactions.len(), 1);
        bid.transactions[0].clone()
    }

    #[tokio::test]
    async fn test_bundle_wraps_signed_swap() {
        let chain = Arc::new(MockChain::new(40));
        let receipt = submitter(chain.clone(), true)
            .submit(&order(1_000))
            .await
            .unwrap();

        assert!(receipt.broadcast);
        assert_eq!(receipt.bid_sequence, 40);
        assert_eq!(receipt.swap_sequence, 41);
        assert_eq!(receipt.timeout_height, 1_001);

        let sent = chain.broadcasts.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sequence_of(&sent[0]), 40);
        let swap = bundled_swap(&sent[0]);
        assert_eq!(sequence_of(&swap), 41);
        assert_eq!(hex::encode_upper(Sha256::digest(&swap)), receipt.swap_hash);
    }

    #[tokio::test]
    async fn test_dry_run_signs_without_broadcast() {
        let chain = Arc::new(MockChain::new(3));
        let receipt = submitter(chain.clone(), false)
            .submit(&order(1_000))
            .await
            .unwrap();
        assert!(!receipt.broadcast);
        assert_eq!(receipt.swap_sequence, 4);
        assert_eq!(chain.broadcast_count(), 0);
    }

    #[tokio::test]
    async fn test_sequence_mismatch_retried_once_with_fresh_sequence() {
        let chain = Arc::new(MockChain::new(10));
        chain.sequences.lock().unwrap().push_back(12);
        chain.reject_next(32, "account sequence mismatch, expected 12, got 10");

        let receipt = submitter(chain.clone(), true)
            .submit(&order(1_000))
            .await
            .unwrap();
        assert_eq!(receipt.bid_sequence, 12);
        assert_eq!(receipt.swap_sequence, 13);

        let sent = chain.broadcasts.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sequence_of(&sent[0]), 10);
        assert_eq!(sequence_of(&sent[1]), 12);
        assert_ne!(sent[0], sent[1]);
    }

    #[tokio::test]
    async fn test_second_mismatch_is_surfaced() {
        let chain = Arc::new(MockChain::new(10));
        chain.reject_next(32, "account sequence mismatch");
        chain.reject_next(32, "account sequence mismatch");
        let err = submitter(chain.clone(), true)
            .submit(&order(1_000))
            .await
            .unwrap_err();
        assert!(err.is_sequence_mismatch());
        assert_eq!(chain.broadcast_count(), 2);
    }

    #[tokio::test]
    async fn test_other_rejection_not_retried() {
        let chain = Arc::new(MockChain::new(10));
        chain.reject_next(13, "insufficient fee");
        let err = submitter(chain.clone(), true)
            .submit(&order(1_000))
            .await
            .unwrap_err();
        assert!(matches!(err, ArbError::BroadcastRejected { code: 13, .. }));
        assert_eq!(chain.broadcast_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_route_never_signed() {
        let chain = Arc::new(MockChain::new(10));
        let mut stale = order(1_000);
        stale.amount_in = 2_000;
        let err = submitter(chain.clone(), true)
            .submit(&stale)
            .await
            .unwrap_err();
        assert!(matches!(err, ArbError::StaleRoute { .. }));
        assert_eq!(chain.broadcast_count(), 0);
    }
}
