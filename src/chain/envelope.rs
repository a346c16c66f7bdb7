//! Transaction Envelope Builder
//!
//! Envelopes go through two explicit phases:
//! 1. `UnsignedEnvelope::finalize` fixes the binary layout: body bytes and
//!    auth-info bytes with one signer slot (public key, sign mode, sequence)
//!    per signer. Nothing about the envelope can change after this.
//! 2. `FinalizedEnvelope::attach_signatures` fills the slots with signatures
//!    computed over `sign_bytes` and yields an immutable `SignedTransaction`.

use super::proto::{
    to_any, AuthInfo, Coin, Fee, ModeInfo, ModeInfoSingle, MsgAuctionBid,
    MsgSplitRouteSwapExactAmountIn, SignDoc, SignerInfo, SwapAmountInRoute,
    SwapAmountInSplitRoute, TxBody, TxExtension, TxRaw, AUCTION_BID_TYPE_URL, SIGN_MODE_DIRECT,
    SWAP_MSG_TYPE_URL, TX_EXTENSION_TYPE_URL,
};
use super::router::check_route;
use crate::config::BotConfig;
use crate::error::{ArbError, ArbResult};
use crate::types::QuotedRoute;
use prost::Message;
use prost_types::Any;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

pub const MAX_MEMO_LEN: usize = 100;

/// Fee, gas and timeout settings shared by every envelope the bot builds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeParams {
    pub fee_denom: String,
    pub fee_amount: u128,
    pub gas_limit: u64,
    /// Blocks past the latest height before the tx expires; 0 disables the timeout
    pub timeout_horizon: u64,
    pub selected_authenticators: Vec<u64>,
}

impl EnvelopeParams {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            fee_denom: config.fee_denom.clone(),
            fee_amount: config.fee_amount,
            gas_limit: config.gas_limit,
            timeout_horizon: config.timeout_height_horizon,
            selected_authenticators: config.selected_authenticators.clone(),
        }
    }
}

/// Random alphanumeric memo, 0..=100 characters
pub fn random_memo() -> String {
    let mut rng = rand::thread_rng();
    let len = rng.gen_range(0..=MAX_MEMO_LEN);
    (&mut rng)
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Minimum output after allowing `max_slippage_bps` below the quote; never zero
pub fn min_out_floor(quoted_out: u128, max_slippage_bps: u32) -> u128 {
    let keep = 10_000u128.saturating_sub(max_slippage_bps as u128);
    (quoted_out.saturating_mul(keep) / 10_000).max(1)
}

/// Split-route exact-amount-in swap for `amount_in` of `token_in_denom`.
///
/// The route must have been quoted for exactly this token and amount;
/// anything else is a `StaleRoute` and nothing gets signed.
pub fn swap_message(
    sender: &str,
    route: &QuotedRoute,
    token_in_denom: &str,
    amount_in: u128,
    min_out: u128,
) -> ArbResult<Any> {
    check_route(route, token_in_denom, amount_in)?;
    let msg = MsgSplitRouteSwapExactAmountIn {
        sender: sender.to_string(),
        routes: route
            .splits
            .iter()
            .map(|split| SwapAmountInSplitRoute {
                pools: split
                    .hops
                    .iter()
                    .map(|hop| SwapAmountInRoute {
                        pool_id: hop.pool_id,
                        token_out_denom: hop.token_out_denom.clone(),
                    })
                    .collect(),
                token_in_amount: split.amount_in.to_string(),
            })
            .collect(),
        token_in_denom: token_in_denom.to_string(),
        token_out_min_amount: min_out.to_string(),
    };
    Ok(to_any(SWAP_MSG_TYPE_URL, &msg))
}

/// Auction bid carrying already-signed transactions in execution order
pub fn bid_message(bidder: &str, bid: Coin, transactions: Vec<Vec<u8>>) -> Any {
    to_any(
        AUCTION_BID_TYPE_URL,
        &MsgAuctionBid {
            bidder: bidder.to_string(),
            bid: Some(bid),
            transactions,
        },
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedEnvelope {
    pub messages: Vec<Any>,
    pub fee: Vec<Coin>,
    pub gas_limit: u64,
    pub memo: String,
    pub timeout_height: u64,
    pub selected_authenticators: Vec<u64>,
}

/// One signer's slot in the auth info
#[derive(Debug, Clone, PartialEq)]
pub struct SignerSlot {
    pub public_key: Any,
    pub sequence: u64,
}

impl UnsignedEnvelope {
    /// Envelope with a random memo and a timeout relative to `latest_height`
    pub fn new(messages: Vec<Any>, params: &EnvelopeParams, latest_height: u64) -> Self {
        let timeout_height = if params.timeout_horizon == 0 {
            0
        } else {
            latest_height + params.timeout_horizon
        };
        Self {
            messages,
            fee: vec![Coin::new(params.fee_amount, &params.fee_denom)],
            gas_limit: params.gas_limit,
            memo: random_memo(),
            timeout_height,
            selected_authenticators: params.selected_authenticators.clone(),
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    fn body(&self) -> TxBody {
        let non_critical_extension_options = if self.selected_authenticators.is_empty() {
            vec![]
        } else {
            vec![to_any(
                TX_EXTENSION_TYPE_URL,
                &TxExtension {
                    selected_authenticators: self.selected_authenticators.clone(),
                },
            )]
        };
        TxBody {
            messages: self.messages.clone(),
            memo: self.memo.clone(),
            timeout_height: self.timeout_height,
            extension_options: vec![],
            non_critical_extension_options,
        }
    }

    /// Fix the layout with one slot per signer (signature bytes still empty).
    pub fn finalize(self, signers: Vec<SignerSlot>) -> ArbResult<FinalizedEnvelope> {
        if self.messages.is_empty() {
            return Err(ArbError::Signing("envelope has no messages".to_string()));
        }
        if signers.is_empty() {
            return Err(ArbError::Signing("envelope has no signers".to_string()));
        }
        if self.memo.len() > MAX_MEMO_LEN {
            return Err(ArbError::Signing(format!(
                "memo of {} bytes exceeds {}",
                self.memo.len(),
                MAX_MEMO_LEN
            )));
        }

        let auth_info = AuthInfo {
            signer_infos: signers
                .iter()
                .map(|slot| SignerInfo {
                    public_key: Some(slot.public_key.clone()),
                    mode_info: Some(ModeInfo {
                        single: Some(ModeInfoSingle {
                            mode: SIGN_MODE_DIRECT,
                        }),
                    }),
                    sequence: slot.sequence,
                })
                .collect(),
            fee: Some(Fee {
                amount: self.fee.clone(),
                gas_limit: self.gas_limit,
                payer: String::new(),
                granter: String::new(),
            }),
        };

        Ok(FinalizedEnvelope {
            body_bytes: self.body().encode_to_vec(),
            auth_info_bytes: auth_info.encode_to_vec(),
            signers,
        })
    }
}

/// Envelope with its final byte layout, waiting for signatures
#[derive(Debug, Clone)]
pub struct FinalizedEnvelope {
    body_bytes: Vec<u8>,
    auth_info_bytes: Vec<u8>,
    signers: Vec<SignerSlot>,
}

impl FinalizedEnvelope {
    pub fn signers(&self) -> &[SignerSlot] {
        &self.signers
    }

    /// SIGN_MODE_DIRECT sign bytes for a signer with `account_number`
    pub fn sign_bytes(&self, chain_id: &str, account_number: u64) -> Vec<u8> {
        SignDoc {
            body_bytes: self.body_bytes.clone(),
            auth_info_bytes: self.auth_info_bytes.clone(),
            chain_id: chain_id.to_string(),
            account_number,
        }
        .encode_to_vec()
    }

    /// One signature per signer slot, in slot order.
    pub fn attach_signatures(self, signatures: Vec<Vec<u8>>) -> ArbResult<SignedTransaction> {
        if signatures.len() != self.signers.len() {
            return Err(ArbError::Signing(format!(
                "{} signatures for {} signer slots",
                signatures.len(),
                self.signers.len()
            )));
        }
        if signatures.iter().any(Vec::is_empty) {
            return Err(ArbError::Signing("empty signature".to_string()));
        }
        Ok(SignedTransaction {
            sequences: self.signers.iter().map(|s| s.sequence).collect(),
            raw: TxRaw {
                body_bytes: self.body_bytes,
                auth_info_bytes: self.auth_info_bytes,
                signatures,
            },
        })
    }
}

/// Fully signed transaction; any change needs a new envelope.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    raw: TxRaw,
    sequences: Vec<u64>,
}

impl SignedTransaction {
    pub fn to_bytes(&self) -> Vec<u8> {
        self.raw.encode_to_vec()
    }

    /// Uppercase hex SHA-256 of the tx bytes, as the chain indexes it
    pub fn hash(&self) -> String {
        hex::encode_upper(Sha256::digest(self.to_bytes()))
    }

    /// Sequence each signer consumed, in signer order
    pub fn sequences(&self) -> &[u64] {
        &self.sequences
    }

    pub fn raw(&self) -> &TxRaw {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PoolHop, SplitRoute};

    fn params() -> EnvelopeParams {
        EnvelopeParams {
            fee_denom: "uosmo".to_string(),
            fee_amount: 7000,
            gas_limit: 1_700_000,
            timeout_horizon: 1,
            selected_authenticators: vec![],
        }
    }

    fn route(amount_in: u128) -> QuotedRoute {
        QuotedRoute {
            token_in_denom: "ubtc".to_string(),
            token_out_denom: "uusdt".to_string(),
            amount_in,
            amount_out: 1_016_666,
            splits: vec![
                SplitRoute {
                    hops: vec![PoolHop {
                        pool_id: 1400,
                        token_out_denom: "uusdt".to_string(),
                    }],
                    amount_in: amount_in / 2,
                },
                SplitRoute {
                    hops: vec![
                        PoolHop {
                            pool_id: 712,
                            token_out_denom: "uosmo".to_string(),
                        },
                        PoolHop {
                            pool_id: 1464,
                            token_out_denom: "uusdt".to_string(),
                        },
                    ],
                    amount_in: amount_in - amount_in / 2,
                },
            ],
        }
    }

    fn slot(sequence: u64) -> SignerSlot {
        SignerSlot {
            public_key: Any {
                type_url: "/cosmos.crypto.secp256k1.PubKey".to_string(),
                value: vec![0x0a, 33],
            },
            sequence,
        }
    }

    #[test]
    fn test_random_memo_bounds() {
        for _ in 0..200 {
            let memo = random_memo();
            assert!(memo.len() <= MAX_MEMO_LEN);
            assert!(memo.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_min_out_floor() {
        assert_eq!(min_out_floor(1_000_000, 100), 990_000);
        assert_eq!(min_out_floor(1_000_000, 0), 1_000_000);
        assert_eq!(min_out_floor(10, 9_999), 1);
        assert_eq!(min_out_floor(0, 100), 1);
    }

    #[test]
    fn test_swap_message_encodes_route() {
        let any = swap_message("osmo1sender", &route(1_666_666), "ubtc", 1_666_666, 990).unwrap();
        assert_eq!(any.type_url, SWAP_MSG_TYPE_URL);
        let msg = MsgSplitRouteSwapExactAmountIn::decode(any.value.as_slice()).unwrap();
        assert_eq!(msg.routes.len(), 2);
        assert_eq!(msg.routes[0].token_in_amount, "833333");
        assert_eq!(msg.routes[1].token_in_amount, "833333");
        assert_eq!(msg.routes[1].pools[1].pool_id, 1464);
        assert_eq!(msg.token_in_denom, "ubtc");
        assert_eq!(msg.token_out_min_amount, "990");
    }

    #[test]
    fn test_swap_message_rejects_reused_route() {
        let quoted_for_a = route(1_666_666);
        let err = swap_message("osmo1sender", &quoted_for_a, "ubtc", 2_000_000, 1).unwrap_err();
        assert!(matches!(err, ArbError::StaleRoute { .. }));

        // same amount, opposite direction
        let err = swap_message("osmo1sender", &quoted_for_a, "uusdt", 1_666_666, 1).unwrap_err();
        assert!(matches!(err, ArbError::StaleRoute { .. }));
    }

    #[test]
    fn test_timeout_relative_to_height() {
        let env = UnsignedEnvelope::new(vec![], &params(), 18_000_000);
        assert_eq!(env.timeout_height, 18_000_001);
        assert_eq!(env.fee, vec![Coin::new(7000, "uosmo")]);

        let mut no_timeout = params();
        no_timeout.timeout_horizon = 0;
        assert_eq!(UnsignedEnvelope::new(vec![], &no_timeout, 5).timeout_height, 0);
    }

    #[test]
    fn test_finalize_fixes_layout_before_signing() {
        let msg = swap_message("osmo1sender", &route(100), "ubtc", 100, 1).unwrap();
        let env = UnsignedEnvelope::new(vec![msg], &params(), 10).with_memo("abc");
        let finalized = env.finalize(vec![slot(7)]).unwrap();

        let auth = AuthInfo::decode(finalized.auth_info_bytes.as_slice()).unwrap();
        assert_eq!(auth.signer_infos.len(), 1);
        assert_eq!(auth.signer_infos[0].sequence, 7);
        assert_eq!(
            auth.signer_infos[0].mode_info.as_ref().unwrap().single,
            Some(ModeInfoSingle {
                mode: SIGN_MODE_DIRECT
            })
        );
        assert_eq!(auth.fee.unwrap().gas_limit, 1_700_000);

        let body = TxBody::decode(finalized.body_bytes.as_slice()).unwrap();
        assert_eq!(body.memo, "abc");
        assert_eq!(body.timeout_height, 11);
        assert!(body.non_critical_extension_options.is_empty());

        // sign bytes differ per chain and per account number
        assert_ne!(
            finalized.sign_bytes("osmosis-1", 1),
            finalized.sign_bytes("osmo-test-5", 1)
        );
        assert_ne!(
            finalized.sign_bytes("osmosis-1", 1),
            finalized.sign_bytes("osmosis-1", 2)
        );
    }

    #[test]
    fn test_selected_authenticators_are_non_critical() {
        let mut p = params();
        p.selected_authenticators = vec![3];
        let msg = swap_message("osmo1sender", &route(100), "ubtc", 100, 1).unwrap();
        let finalized = UnsignedEnvelope::new(vec![msg], &p, 10)
            .finalize(vec![slot(0)])
            .unwrap();
        let body = TxBody::decode(finalized.body_bytes.as_slice()).unwrap();
        assert!(body.extension_options.is_empty());
        assert_eq!(body.non_critical_extension_options.len(), 1);
        let ext = TxExtension::decode(body.non_critical_extension_options[0].value.as_slice())
            .unwrap();
        assert_eq!(ext.selected_authenticators, vec![3]);
    }

    #[test]
    fn test_attach_signatures_checks_slots() {
        let msg = swap_message("osmo1sender", &route(100), "ubtc", 100, 1).unwrap();
        let finalized = UnsignedEnvelope::new(vec![msg], &params(), 10)
            .finalize(vec![slot(4)])
            .unwrap();

        assert!(finalized.clone().attach_signatures(vec![]).is_err());
        assert!(finalized.clone().attach_signatures(vec![vec![]]).is_err());

        let signed = finalized.attach_signatures(vec![vec![1u8; 64]]).unwrap();
        assert_eq!(signed.sequences(), &[4]);
        let raw = TxRaw::decode(signed.to_bytes().as_slice()).unwrap();
        assert_eq!(raw.signatures, vec![vec![1u8; 64]]);

        let hash = signed.hash();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash.to_uppercase());
    }

    #[test]
    fn test_empty_envelope_cannot_finalize() {
        let env = UnsignedEnvelope::new(vec![], &params(), 10);
        assert!(env.clone().finalize(vec![slot(0)]).is_err());
        let msg = bid_message("osmo1bidder", Coin::new(100, "uosmo"), vec![vec![1, 2, 3]]);
        let env = UnsignedEnvelope::new(vec![msg], &params(), 10);
        assert!(env.finalize(vec![]).is_err());
    }
}
