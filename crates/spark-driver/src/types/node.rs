//! Node information, balances and history.

use serde::{Deserialize, Serialize};

use super::invoice::InvoiceRecord;
use super::payment::PaymentRecord;

/// Maximum number of entries kept in a wallet summary history.
pub const TRANSACTION_HISTORY_LIMIT: usize = 15;

/// `getinfo` response.
#[derive(Debug, Deserialize)]
pub(crate) struct RawInfo {
    pub id: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub blockheight: u64,
    #[serde(default)]
    pub address: Vec<RawAddress>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAddress {
    pub address: String,
    pub port: u16,
}

/// Public information about the wallet's node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Node public key.
    pub id: String,
    pub alias: String,
    pub color: String,
    pub blockheight: u64,
    /// First advertised address as `host:port`.
    pub address: Option<String>,
}

impl From<RawInfo> for NodeInfo {
    fn from(raw: RawInfo) -> Self {
        let address = raw
            .address
            .first()
            .map(|a| format!("{}:{}", a.address, a.port));
        Self {
            id: raw.id,
            alias: raw.alias,
            color: raw.color,
            blockheight: raw.blockheight,
            address,
        }
    }
}

/// `listfunds` response.
#[derive(Debug, Deserialize)]
pub(crate) struct RawFunds {
    #[serde(default)]
    pub channels: Vec<RawChannel>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawChannel {
    #[serde(default)]
    pub channel_sat: u64,
}

/// Channel funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Funds {
    /// Sum of our side of every channel, in satoshi.
    pub channel_sat: u64,
    pub channel_count: usize,
}

impl From<RawFunds> for Funds {
    fn from(raw: RawFunds) -> Self {
        Self {
            channel_sat: raw.channels.iter().map(|c| c.channel_sat).sum(),
            channel_count: raw.channels.len(),
        }
    }
}

/// A history entry. Positive amounts are received, negative are sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unix timestamp.
    pub date: u64,
    /// Millisatoshi.
    pub amount: i64,
    pub description: String,
    /// Routing fees in millisatoshi (outgoing only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fees: Option<u64>,
}

/// Overview used by the wallet's home screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSummary {
    pub info: NodeInfo,
    /// Satoshi.
    pub balance: u64,
    pub transactions: Vec<Transaction>,
}

impl WalletSummary {
    /// Build a summary from the individual listings.
    pub fn build(
        info: NodeInfo,
        funds: Funds,
        invoices: &[InvoiceRecord],
        payments: &[PaymentRecord],
    ) -> Self {
        Self {
            info,
            balance: funds.channel_sat,
            transactions: merge_history(invoices, payments),
        }
    }
}

/// Merge paid invoices and complete payments, newest first.
fn merge_history(invoices: &[InvoiceRecord], payments: &[PaymentRecord]) -> Vec<Transaction> {
    let received: Vec<Transaction> = invoices
        .iter()
        .filter(|inv| inv.is_paid())
        .map(|inv| Transaction {
            date: inv.paid_at.or(inv.expires_at).unwrap_or_default(),
            amount: inv.msatoshi.unwrap_or_default() as i64,
            description: inv.description.clone().unwrap_or_default(),
            fees: None,
        })
        .collect();

    let sent: Vec<Transaction> = payments
        .iter()
        .filter(|pay| pay.is_complete())
        .map(|pay| Transaction {
            date: pay.created_at,
            amount: -(pay.msatoshi as i64),
            description: pay
                .description
                .clone()
                .or_else(|| pay.payment_preimage.clone())
                .unwrap_or_default(),
            fees: Some(pay.msatoshi_sent.saturating_sub(pay.msatoshi)),
        })
        .collect();

    let mut history: Vec<Transaction> = last_n(received, TRANSACTION_HISTORY_LIMIT)
        .into_iter()
        .chain(last_n(sent, TRANSACTION_HISTORY_LIMIT))
        .collect();
    history.sort_by(|a, b| b.date.cmp(&a.date));
    history.truncate(TRANSACTION_HISTORY_LIMIT);
    history
}

fn last_n<T>(mut items: Vec<T>, n: usize) -> Vec<T> {
    if items.len() > n {
        items.drain(..items.len() - n);
    }
    items
}
