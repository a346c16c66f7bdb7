//! Protobuf wire types
//!
//! The subset of the Cosmos SDK tx envelope the signer needs, plus the two
//! chain messages the bot sends: the split-route exact-amount-in swap and
//! the top-of-block auction bid. Field tags follow the upstream .proto files.

use prost::Message;
use prost_types::Any;

pub const SWAP_MSG_TYPE_URL: &str = "/osmosis.poolmanager.v1beta1.MsgSplitRouteSwapExactAmountIn";
pub const AUCTION_BID_TYPE_URL: &str = "/sdk.auction.v1.MsgAuctionBid";
pub const TX_EXTENSION_TYPE_URL: &str = "/osmosis.smartaccount.v1beta1.TxExtension";
pub const SECP256K1_PUBKEY_TYPE_URL: &str = "/cosmos.crypto.secp256k1.PubKey";

/// `SIGN_MODE_DIRECT`
pub const SIGN_MODE_DIRECT: i32 = 1;

// ── cosmos.base.v1beta1 ──

#[derive(Clone, PartialEq, Message)]
pub struct Coin {
    #[prost(string, tag = "1")]
    pub denom: String,
    #[prost(string, tag = "2")]
    pub amount: String,
}

impl Coin {
    pub fn new(amount: u128, denom: &str) -> Self {
        Self {
            denom: denom.to_string(),
            amount: amount.to_string(),
        }
    }
}

// ── cosmos.crypto.secp256k1 ──

#[derive(Clone, PartialEq, Message)]
pub struct Secp256k1PubKey {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
}

// ── cosmos.tx.v1beta1 ──

#[derive(Clone, PartialEq, Message)]
pub struct TxBody {
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<Any>,
    #[prost(string, tag = "2")]
    pub memo: String,
    #[prost(uint64, tag = "3")]
    pub timeout_height: u64,
    #[prost(message, repeated, tag = "1023")]
    pub extension_options: Vec<Any>,
    #[prost(message, repeated, tag = "2047")]
    pub non_critical_extension_options: Vec<Any>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ModeInfoSingle {
    #[prost(int32, tag = "1")]
    pub mode: i32,
}

/// Only the `single` arm of the upstream oneof is used
#[derive(Clone, PartialEq, Message)]
pub struct ModeInfo {
    #[prost(message, optional, tag = "1")]
    pub single: Option<ModeInfoSingle>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SignerInfo {
    #[prost(message, optional, tag = "1")]
    pub public_key: Option<Any>,
    #[prost(message, optional, tag = "2")]
    pub mode_info: Option<ModeInfo>,
    #[prost(uint64, tag = "3")]
    pub sequence: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct Fee {
    #[prost(message, repeated, tag = "1")]
    pub amount: Vec<Coin>,
    #[prost(uint64, tag = "2")]
    pub gas_limit: u64,
    #[prost(string, tag = "3")]
    pub payer: String,
    #[prost(string, tag = "4")]
    pub granter: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct AuthInfo {
    #[prost(message, repeated, tag = "1")]
    pub signer_infos: Vec<SignerInfo>,
    #[prost(message, optional, tag = "2")]
    pub fee: Option<Fee>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SignDoc {
    #[prost(bytes = "vec", tag = "1")]
    pub body_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub auth_info_bytes: Vec<u8>,
    #[prost(string, tag = "3")]
    pub chain_id: String,
    #[prost(uint64, tag = "4")]
    pub account_number: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct TxRaw {
    #[prost(bytes = "vec", tag = "1")]
    pub body_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub auth_info_bytes: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub signatures: Vec<Vec<u8>>,
}

// ── osmosis.poolmanager.v1beta1 ──

#[derive(Clone, PartialEq, Message)]
pub struct SwapAmountInRoute {
    #[prost(uint64, tag = "1")]
    pub pool_id: u64,
    #[prost(string, tag = "2")]
    pub token_out_denom: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct SwapAmountInSplitRoute {
    #[prost(message, repeated, tag = "1")]
    pub pools: Vec<SwapAmountInRoute>,
    #[prost(string, tag = "2")]
    pub token_in_amount: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct MsgSplitRouteSwapExactAmountIn {
    #[prost(string, tag = "1")]
    pub sender: String,
    #[prost(message, repeated, tag = "2")]
    pub routes: Vec<SwapAmountInSplitRoute>,
    #[prost(string, tag = "3")]
    pub token_in_denom: String,
    #[prost(string, tag = "4")]
    pub token_out_min_amount: String,
}

// ── sdk.auction.v1 ──

#[derive(Clone, PartialEq, Message)]
pub struct MsgAuctionBid {
    #[prost(string, tag = "1")]
    pub bidder: String,
    #[prost(message, optional, tag = "2")]
    pub bid: Option<Coin>,
    /// Pre-signed tx bytes, executed in this order right after the bid
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub transactions: Vec<Vec<u8>>,
}

// ── osmosis.smartaccount.v1beta1 ──

#[derive(Clone, PartialEq, Message)]
pub struct TxExtension {
    #[prost(uint64, repeated, tag = "1")]
    pub selected_authenticators: Vec<u64>,
}

/// Wrap a message into `google.protobuf.Any`
pub fn to_any<M: Message>(type_url: &str, msg: &M) -> Any {
    Any {
        type_url: type_url.to_string(),
        value: msg.encode_to_vec(),
    }
}
