//! Invoice creation, decoding and listing.

use serde::{Deserialize, Serialize, Serializer};

/// Expiry attached to every invoice we create.
pub const INVOICE_EXPIRY_SECONDS: u64 = 3600;

/// Prefix of generated invoice labels.
pub const LABEL_PREFIX: &str = "kwh.";

/// Amount of a new invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceAmount {
    /// Payer chooses the amount.
    Any,
    /// Fixed amount in millisatoshi.
    Msat(u64),
}

impl InvoiceAmount {
    pub fn msat(&self) -> Option<u64> {
        match self {
            InvoiceAmount::Any => None,
            InvoiceAmount::Msat(msat) => Some(*msat),
        }
    }
}

impl From<Option<u64>> for InvoiceAmount {
    fn from(msat: Option<u64>) -> Self {
        msat.map_or(InvoiceAmount::Any, InvoiceAmount::Msat)
    }
}

// The backend takes either a number or the literal "any".
impl Serialize for InvoiceAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            InvoiceAmount::Any => serializer.serialize_str("any"),
            InvoiceAmount::Msat(msat) => serializer.serialize_u64(*msat),
        }
    }
}

/// Parameters for creating an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRequest {
    pub amount: InvoiceAmount,
    pub description: String,
    /// Backend label. Generated when `None`.
    pub label: Option<String>,
}

impl InvoiceRequest {
    /// Create a request for a fixed amount in millisatoshi.
    pub fn new(msatoshi: u64, description: impl Into<String>) -> Self {
        Self {
            amount: InvoiceAmount::Msat(msatoshi),
            description: description.into(),
            label: None,
        }
    }

    /// Create a request that lets the payer choose the amount.
    pub fn any_amount(description: impl Into<String>) -> Self {
        Self {
            amount: InvoiceAmount::Any,
            description: description.into(),
            label: None,
        }
    }

    /// Use an explicit label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// `invoice` response.
#[derive(Debug, Deserialize)]
pub(crate) struct RawCreatedInvoice {
    pub bolt11: String,
    pub payment_hash: String,
    #[serde(default)]
    pub expires_at: Option<u64>,
}

/// A freshly created invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedInvoice {
    /// Payment request string.
    pub bolt11: String,
    pub description: String,
    /// Millisatoshi, `None` for any-amount invoices.
    pub msatoshi: Option<u64>,
    pub hash: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

/// `decodepay` response.
#[derive(Debug, Deserialize)]
pub(crate) struct RawDecodedInvoice {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub msatoshi: Option<u64>,
    pub payee: String,
    pub payment_hash: String,
    pub created_at: u64,
    pub expiry: u64,
}

/// Canonical view of a decoded payment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedInvoice {
    pub description: Option<String>,
    /// Millisatoshi, `None` when the payer chooses.
    pub msatoshi: Option<u64>,
    /// Payee node id.
    pub nodeid: String,
    pub hash: String,
    /// Creation unix timestamp.
    pub creation: u64,
    /// Seconds after creation.
    pub expiry: u64,
}

impl From<RawDecodedInvoice> for DecodedInvoice {
    fn from(raw: RawDecodedInvoice) -> Self {
        Self {
            description: raw.description,
            msatoshi: raw.msatoshi,
            nodeid: raw.payee,
            hash: raw.payment_hash,
            creation: raw.created_at,
            expiry: raw.expiry,
        }
    }
}

/// `listinvoices` response.
#[derive(Debug, Deserialize)]
pub(crate) struct RawInvoiceList {
    #[serde(default)]
    pub invoices: Vec<InvoiceRecord>,
}

/// An invoice as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    #[serde(default)]
    pub label: String,
    pub status: String,
    #[serde(default)]
    pub paid_at: Option<u64>,
    #[serde(default)]
    pub expires_at: Option<u64>,
    #[serde(default)]
    pub msatoshi: Option<u64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub bolt11: Option<String>,
    #[serde(default)]
    pub payment_hash: Option<String>,
}

impl InvoiceRecord {
    pub fn is_paid(&self) -> bool {
        self.status == "paid"
    }
}
