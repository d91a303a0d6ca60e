//! Result normalizer: provider-native shapes to canonical records.
//!
//! Fields a provider does not report stay `None`; nothing is filled with
//! zero or "now" to look complete.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// Executed without error.
    Success,
    /// Executed with an error.
    Failed,
}

/// Canonical transaction record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTransaction {
    /// Transaction signature.
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<u64>,
    /// Unix seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Amount in the smallest unit (lamports for native transfers).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_mint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_decimals: Option<u8>,
    /// Fee in lamports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TxStatus>,
}

/// Canonical token transfer / token holding record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTransfer {
    /// Unset for holdings listed from token accounts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_mint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_decimals: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<u64>,
}

/// One holder of a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenHolder {
    /// Wallet owning the token account.
    pub owner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_account: Option<String>,
    pub amount_raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
}

/// Canonical token contract metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractInfo {
    /// Mint address.
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    /// Supply in the smallest unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supply_raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint_authority: Option<String>,
    /// Supply in whole tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_supply: Option<String>,
    /// Largest holders, when the provider reports them.
    #[serde(default)]
    pub holders: Vec<TokenHolder>,
    /// Native balance of the mint account, in lamports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance_lamports: Option<u64>,
}

/// Shift an integer amount string right by `decimals` places.
///
/// Trailing fractional zeros and a trailing point are trimmed, so
/// `("101000000000", 9)` gives `"101"`. Returns `None` if `raw` is not a
/// non-negative integer.
#[must_use]
pub fn format_units(raw: &str, decimals: u8) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits = raw.trim_start_matches('0');
    let decimals = usize::from(decimals);

    let padded = format!("{digits:0>width$}", width = decimals + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');

    if frac_part.is_empty() {
        Some(int_part.to_string())
    } else {
        Some(format!("{int_part}.{frac_part}"))
    }
}

/// A JSON value some providers send as a number and others as a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum Numeric {
    Int(u64),
    Float(f64),
    Text(String),
}

impl Numeric {
    pub(crate) fn to_text(&self) -> String {
        match self {
            Self::Int(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    pub(crate) fn as_u8(&self) -> Option<u8> {
        match self {
            Self::Int(n) => u8::try_from(*n).ok(),
            Self::Float(_) => None,
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// SolScan
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SolscanTransaction {
    #[serde(alias = "tx_hash")]
    pub(crate) tx_hash: String,
    #[serde(default, alias = "block_time")]
    pub(crate) block_time: Option<i64>,
    #[serde(default)]
    pub(crate) slot: Option<u64>,
    #[serde(default)]
    pub(crate) fee: Option<u64>,
    #[serde(default)]
    pub(crate) status: Option<String>,
    #[serde(default)]
    pub(crate) lamport: Option<u64>,
    #[serde(default)]
    pub(crate) src: Option<String>,
    #[serde(default)]
    pub(crate) dst: Option<String>,
    #[serde(default)]
    pub(crate) signer: Vec<String>,
}

impl From<SolscanTransaction> for NormalizedTransaction {
    fn from(tx: SolscanTransaction) -> Self {
        let status = tx.status.as_deref().map(|s| {
            if s.eq_ignore_ascii_case("success") {
                TxStatus::Success
            } else {
                TxStatus::Failed
            }
        });
        let from = non_empty(tx.src).or_else(|| tx.signer.into_iter().next());
        Self {
            signature: tx.tx_hash,
            slot: tx.slot,
            block_time: tx.block_time,
            from,
            to: non_empty(tx.dst),
            amount_raw: tx.lamport.filter(|l| *l > 0).map(|l| l.to_string()),
            fee: tx.fee,
            status,
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SolscanTokenAmount {
    pub(crate) amount: Numeric,
    #[serde(default)]
    pub(crate) decimals: Option<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SolscanTokenAccount {
    #[serde(default, alias = "token_address")]
    pub(crate) token_address: Option<String>,
    #[serde(default)]
    pub(crate) token_name: Option<String>,
    #[serde(default)]
    pub(crate) token_symbol: Option<String>,
    #[serde(default)]
    pub(crate) token_decimal: Option<Numeric>,
    #[serde(default)]
    pub(crate) token_amount: Option<SolscanTokenAmount>,
    #[serde(default)]
    pub(crate) amount: Option<Numeric>,
    #[serde(default)]
    pub(crate) owner: Option<String>,
    #[serde(default)]
    pub(crate) update_time: Option<i64>,
}

impl SolscanTokenAccount {
    pub(crate) fn normalize(self, address: &str) -> NormalizedTransfer {
        let decimals = self
            .token_amount
            .as_ref()
            .and_then(|a| a.decimals)
            .or_else(|| self.token_decimal.as_ref().and_then(Numeric::as_u8));
        let amount_raw = self
            .token_amount
            .as_ref()
            .map(|a| a.amount.to_text())
            .or_else(|| self.amount.as_ref().map(Numeric::to_text));
        NormalizedTransfer {
            block_time: self.update_time,
            from: non_empty(self.owner),
            to: Some(address.to_string()),
            amount_raw,
            token_mint: non_empty(self.token_address),
            token_name: non_empty(self.token_name),
            token_symbol: non_empty(self.token_symbol),
            token_decimals: decimals,
            ..NormalizedTransfer::default()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SolscanTokenMeta {
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) symbol: Option<String>,
    #[serde(default)]
    pub(crate) decimals: Option<Numeric>,
    #[serde(default)]
    pub(crate) supply: Option<Numeric>,
    #[serde(default, alias = "mint_authority")]
    pub(crate) mint_authority: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SolscanHolder {
    #[serde(default)]
    pub(crate) address: Option<String>,
    pub(crate) owner: String,
    pub(crate) amount: Numeric,
    #[serde(default)]
    pub(crate) rank: Option<u32>,
}

impl From<SolscanHolder> for TokenHolder {
    fn from(holder: SolscanHolder) -> Self {
        Self {
            owner: holder.owner,
            token_account: non_empty(holder.address),
            amount_raw: holder.amount.to_text(),
            rank: holder.rank,
        }
    }
}

/// Holders arrive either as a bare list or as `{ items, total }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SolscanHolderPage {
    List(Vec<SolscanHolder>),
    Page { items: Vec<SolscanHolder> },
}

impl SolscanHolderPage {
    pub(crate) fn into_holders(self) -> Vec<TokenHolder> {
        let items = match self {
            Self::List(items) | Self::Page { items } => items,
        };
        items.into_iter().map(TokenHolder::from).collect()
    }
}

pub(crate) fn solscan_contract(
    address: &str,
    meta: SolscanTokenMeta,
    holders: Vec<TokenHolder>,
) -> ContractInfo {
    let decimals = meta.decimals.as_ref().and_then(Numeric::as_u8);
    let supply_raw = meta.supply.as_ref().map(Numeric::to_text);
    let total_supply = supply_raw
        .as_deref()
        .zip(decimals)
        .and_then(|(raw, d)| format_units(raw, d));
    ContractInfo {
        address: address.to_string(),
        name: non_empty(meta.name),
        symbol: non_empty(meta.symbol),
        decimals,
        supply_raw,
        mint_authority: non_empty(meta.mint_authority),
        total_supply,
        holders,
        balance_lamports: None,
    }
}

// ---------------------------------------------------------------------------
// Solana JSON-RPC
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RpcSignatureInfo {
    pub(crate) signature: String,
    #[serde(default)]
    pub(crate) slot: Option<u64>,
    #[serde(default)]
    pub(crate) block_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RpcAccountKey {
    Plain(String),
    Parsed { pubkey: String },
}

impl RpcAccountKey {
    pub(crate) fn as_str(&self) -> &str {
        match self {
            Self::Plain(key) | Self::Parsed { pubkey: key } => key,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RpcInstruction {
    #[serde(default)]
    pub(crate) program_id_index: Option<usize>,
    #[serde(default)]
    pub(crate) accounts: Vec<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcInnerInstructions {
    #[serde(default)]
    pub(crate) instructions: Vec<RpcInstruction>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RpcMeta {
    #[serde(default)]
    pub(crate) err: Option<Value>,
    #[serde(default)]
    pub(crate) fee: Option<u64>,
    #[serde(default)]
    pub(crate) pre_balances: Vec<u64>,
    #[serde(default)]
    pub(crate) post_balances: Vec<u64>,
    #[serde(default)]
    pub(crate) pre_token_balances: Vec<Value>,
    #[serde(default)]
    pub(crate) post_token_balances: Vec<Value>,
    #[serde(default)]
    pub(crate) inner_instructions: Vec<RpcInnerInstructions>,
    #[serde(default)]
    pub(crate) log_messages: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RpcMessage {
    #[serde(default)]
    pub(crate) account_keys: Vec<RpcAccountKey>,
    #[serde(default)]
    pub(crate) instructions: Vec<RpcInstruction>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcTransactionBody {
    pub(crate) message: RpcMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RpcTransaction {
    #[serde(default)]
    pub(crate) slot: Option<u64>,
    #[serde(default)]
    pub(crate) block_time: Option<i64>,
    #[serde(default)]
    pub(crate) meta: Option<RpcMeta>,
    pub(crate) transaction: RpcTransactionBody,
}

impl RpcTransaction {
    fn key(&self, index: usize) -> Option<String> {
        self.transaction
            .message
            .account_keys
            .get(index)
            .map(|k| k.as_str().to_string())
    }

    /// First account key, which is the fee payer and first signer.
    pub(crate) fn fee_payer(&self) -> Option<String> {
        self.key(0)
    }
}

/// How an RPC adapter derives sender, receiver and amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferRule {
    /// Fee payer as sender; second account of the first instruction with more
    /// than one account as receiver (inner instructions first).
    FeePayer,
    /// Largest lamport decrease as sender and amount, largest increase as
    /// receiver. Skipped for token transactions.
    LargestDelta,
}

pub(crate) fn rpc_transaction(
    signature: String,
    tx: &RpcTransaction,
    rule: TransferRule,
) -> NormalizedTransaction {
    let meta = tx.meta.as_ref();
    let status = meta.map(|m| {
        if m.err.as_ref().map_or(true, Value::is_null) {
            TxStatus::Success
        } else {
            TxStatus::Failed
        }
    });

    let (from, to, amount_raw) = match (rule, meta) {
        (TransferRule::FeePayer, Some(meta)) => fee_payer_transfer(tx, meta),
        (TransferRule::LargestDelta, Some(meta)) => largest_delta_transfer(tx, meta),
        (_, None) => (None, None, None),
    };

    NormalizedTransaction {
        signature,
        slot: tx.slot,
        block_time: tx.block_time,
        from,
        to,
        amount_raw,
        fee: meta.and_then(|m| m.fee),
        status,
        ..NormalizedTransaction::default()
    }
}

type Transfer = (Option<String>, Option<String>, Option<String>);

fn fee_payer_transfer(tx: &RpcTransaction, meta: &RpcMeta) -> Transfer {
    let keys = &tx.transaction.message.account_keys;
    if keys.is_empty() || meta.pre_balances.is_empty() || meta.post_balances.is_empty() {
        return (None, None, None);
    }

    let receiver_of = |inst: &RpcInstruction| {
        inst.accounts.get(1).and_then(|&index| tx.key(index))
    };

    let inner = meta
        .inner_instructions
        .iter()
        .flat_map(|group| group.instructions.iter())
        .filter(|inst| inst.program_id_index.is_some_and(|p| p > 0))
        .find_map(receiver_of);
    let to = inner.or_else(|| {
        tx.transaction
            .message
            .instructions
            .iter()
            .find_map(receiver_of)
    });

    (tx.fee_payer(), to, None)
}

fn largest_delta_transfer(tx: &RpcTransaction, meta: &RpcMeta) -> Transfer {
    if !meta.pre_token_balances.is_empty() || !meta.post_token_balances.is_empty() {
        return (None, None, None);
    }

    let mut max_decrease: i128 = 0;
    let mut max_increase: i128 = 0;
    let mut sender = None;
    let mut receiver = None;
    for (index, (pre, post)) in meta
        .pre_balances
        .iter()
        .zip(meta.post_balances.iter())
        .enumerate()
    {
        let diff = i128::from(*pre) - i128::from(*post);
        if diff > max_decrease {
            max_decrease = diff;
            sender = Some(index);
        } else if -diff > max_increase {
            max_increase = -diff;
            receiver = Some(index);
        }
    }

    let amount = (max_decrease > 0).then(|| max_decrease.to_string());
    (
        sender.and_then(|i| tx.key(i)),
        receiver.and_then(|i| tx.key(i)),
        amount,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RpcUiTokenAmount {
    pub(crate) amount: String,
    pub(crate) decimals: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RpcTokenAccountInfo {
    pub(crate) mint: String,
    pub(crate) token_amount: RpcUiTokenAmount,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcParsed<T> {
    pub(crate) parsed: RpcParsedInner<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcParsedInner<T> {
    #[serde(rename = "type", default)]
    pub(crate) kind: Option<String>,
    pub(crate) info: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcAccount<T> {
    pub(crate) data: RpcParsed<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcKeyedAccount<T> {
    pub(crate) account: RpcAccount<T>,
}

pub(crate) fn rpc_token_account(
    owner: &str,
    account: RpcKeyedAccount<RpcTokenAccountInfo>,
) -> NormalizedTransfer {
    let info = account.account.data.parsed.info;
    NormalizedTransfer {
        to: Some(owner.to_string()),
        amount_raw: Some(info.token_amount.amount),
        token_mint: Some(info.mint),
        token_decimals: Some(info.token_amount.decimals),
        ..NormalizedTransfer::default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RpcMintInfo {
    #[serde(default)]
    pub(crate) mint_authority: Option<String>,
    pub(crate) decimals: u8,
    pub(crate) supply: String,
}

pub(crate) fn rpc_contract(address: &str, mint: RpcMintInfo) -> ContractInfo {
    let total_supply = format_units(&mint.supply, mint.decimals);
    ContractInfo {
        address: address.to_string(),
        decimals: Some(mint.decimals),
        mint_authority: non_empty(mint.mint_authority),
        supply_raw: Some(mint.supply),
        total_supply,
        ..ContractInfo::default()
    }
}

// ---------------------------------------------------------------------------
// Shyft
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct ShyftTokenInfo {
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) symbol: Option<String>,
    #[serde(default)]
    pub(crate) decimals: Option<u8>,
    #[serde(default)]
    pub(crate) current_supply: Option<Numeric>,
    #[serde(default)]
    pub(crate) mint_authority: Option<String>,
}

pub(crate) fn shyft_contract(address: &str, info: ShyftTokenInfo) -> ContractInfo {
    ContractInfo {
        address: address.to_string(),
        name: non_empty(info.name),
        symbol: non_empty(info.symbol),
        decimals: info.decimals,
        mint_authority: non_empty(info.mint_authority),
        total_supply: info.current_supply.as_ref().map(Numeric::to_text),
        ..ContractInfo::default()
    }
}
