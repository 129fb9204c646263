//! Payment records.
//!
//! A transaction is written once when a payment outcome is known and only
//! changes afterwards through the narrow transitions in
//! [`crate::factory`]: tip adjust, settle, void.
//!
//! ```text
//! status:  new ──settle──► settled
//!           │
//!           └──void──► voided ──settle──► voided-settled
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Cash,
    Custom,
    CreditSale,
    CreditVoid,
    CreditRefund,
    CreditForce,
    BatchClose,
}

impl TransactionType {
    /// Pays a check (cash, custom tender, card sale).
    pub fn has_check(&self) -> bool {
        matches!(
            self,
            TransactionType::Cash | TransactionType::Custom | TransactionType::CreditSale
        )
    }

    /// Accepts a tip.
    pub fn has_tip(&self) -> bool {
        self.has_check()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Cash => "cash",
            TransactionType::Custom => "custom",
            TransactionType::CreditSale => "credit_sale",
            TransactionType::CreditVoid => "credit_void",
            TransactionType::CreditRefund => "credit_refund",
            TransactionType::CreditForce => "credit_force",
            TransactionType::BatchClose => "batch_close",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum TransactionStatus {
    #[default]
    #[serde(rename = "new")]
    New,
    #[serde(rename = "settled")]
    Settled,
    #[serde(rename = "voided")]
    Voided,
    #[serde(rename = "voided-settled")]
    VoidedSettled,
}

impl TransactionStatus {
    pub fn is_voided(&self) -> bool {
        matches!(self, TransactionStatus::Voided | TransactionStatus::VoidedSettled)
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, TransactionStatus::Settled | TransactionStatus::VoidedSettled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::New => "new",
            TransactionStatus::Settled => "settled",
            TransactionStatus::Voided => "voided",
            TransactionStatus::VoidedSettled => "voided-settled",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Processor Inputs
// =============================================================================

/// Response fields a card processor returns, stored verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct ProcessorResponse {
    pub avs_response: String,
    /// Masked account number, last four digits.
    pub card_num: String,
    pub card_type: String,
    pub cv_response: String,
    pub host_code: String,
    pub host_response: String,
    pub message: String,
    pub ref_num: String,
    pub result_code: String,
    pub result_txt: String,
    pub timestamp: String,
    pub ext_data: String,
    pub raw_response: String,
    pub auth_code: String,
}

/// Outcome of a card sale, refund, void or force.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub response: ProcessorResponse,
    pub requested_amount: Money,
    pub approved_amount: Money,
    pub remaining_balance: Money,
    pub extra_balance: Money,
}

/// Outcome of closing a card batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub host_code: String,
    pub host_response: String,
    pub auth_code: String,
    pub message: String,
    pub ext_data: String,
    pub result_code: String,
    pub result_txt: String,
    pub batch_num: String,
    pub total_count: u32,
    pub total_amount: Money,
}

/// Card reader a payment went through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDevice {
    pub id: String,
    pub name: String,
}

/// A store-defined tender ("Gift card") or sub-type ("Visa", "Amex").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentType {
    pub id: String,
    pub name: String,
}

// =============================================================================
// Transaction
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Transaction {
    pub id: String,
    pub store_id: String,
    #[serde(default)]
    pub merchant_id: String,
    pub trans_type: TransactionType,
    #[serde(default)]
    pub status: TransactionStatus,

    // Linkage
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub order_num: u32,
    #[serde(default)]
    pub bill: Option<String>,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub area_name: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub table_name: String,

    // Tender
    #[serde(default)]
    pub payment_device: Option<String>,
    #[serde(default)]
    pub payment_device_name: String,
    #[serde(default)]
    pub custom_trans_type: Option<String>,
    #[serde(default)]
    pub custom_trans_type_name: String,
    #[serde(default)]
    pub sub_payment_type: Option<String>,
    #[serde(default)]
    pub sub_payment_type_name: String,

    // Shift stamps
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub shift: String,
    #[serde(default)]
    pub shift_index: u32,
    #[serde(default)]
    pub trans_num: u64,

    // Amounts
    #[serde(default)]
    pub requested_amount: Money,
    #[serde(default)]
    pub approved_amount: Money,
    #[serde(default)]
    pub remaining_balance: Money,
    #[serde(default)]
    pub extra_balance: Money,
    #[serde(default)]
    pub tip_amount: Money,
    #[serde(default)]
    pub adjusted_by: Option<String>,
    #[ts(as = "Option<String>")]
    #[serde(default)]
    pub adjusted_at: Option<DateTime<Utc>>,

    // Voiding
    #[serde(default)]
    pub voided_by: Option<String>,
    #[ts(as = "Option<String>")]
    #[serde(default)]
    pub voided_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub voided_reason: String,

    /// Card processor fields, empty for cash and custom tenders.
    #[serde(flatten)]
    pub processor: ProcessorResponse,

    // Settlement
    #[serde(default)]
    pub batch_num: String,
    #[serde(default)]
    pub total_count: u32,
    #[serde(default)]
    pub total_amount: Money,
    #[serde(default)]
    pub settled_by: Option<String>,
    #[ts(as = "Option<String>")]
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
    /// The batch-close transaction that settled this one.
    #[serde(default)]
    pub settling_trans: Option<String>,
    /// For a batch close: the transactions it settled.
    #[serde(default)]
    pub settled_trans: Vec<String>,
}

impl Transaction {
    pub fn is_voided(&self) -> bool {
        self.status.is_voided()
    }

    pub fn can_void(&self) -> bool {
        self.status == TransactionStatus::New
    }

    pub fn can_adjust(&self) -> bool {
        self.status == TransactionStatus::New && self.trans_type.has_tip()
    }

    pub fn has_bill(&self) -> bool {
        self.order.is_some() && self.bill.is_some()
    }

    /// Approved amount, negative for refunds.
    pub fn approved_amount_by_status(&self) -> Money {
        if self.trans_type == TransactionType::CreditRefund {
            -self.approved_amount
        } else {
            self.approved_amount
        }
    }

    /// What this transaction contributes to shift totals.
    pub fn calculated_amount_by_status(&self) -> Money {
        if self.trans_type == TransactionType::CreditRefund {
            -self.approved_amount
        } else if self.is_voided() {
            Money::ZERO
        } else {
            self.approved_amount
        }
    }

    pub fn total_with_tip_amount(&self) -> Money {
        self.approved_amount_by_status() + self.tip_amount
    }

    pub fn display_card_type(&self) -> String {
        let card_type = self.processor.card_type.to_uppercase();
        if card_type == "MASTERCARD" {
            "MASTER".to_string()
        } else {
            card_type
        }
    }

    /// Tender label for receipts: `CASH`, `CREDIT - VISA`, `GIFT CARD`...
    pub fn display_trans_type(&self) -> String {
        let mut name = match self.trans_type {
            TransactionType::Cash => "CASH".to_string(),
            TransactionType::Custom => self.custom_trans_type_name.clone(),
            TransactionType::CreditSale => "CREDIT".to_string(),
            TransactionType::CreditVoid => "VOID".to_string(),
            TransactionType::CreditRefund => "REFUND".to_string(),
            TransactionType::CreditForce => "FORCE".to_string(),
            TransactionType::BatchClose => "CLOSE".to_string(),
        };
        if self.sub_payment_type.is_some() {
            name.push_str(" - ");
            name.push_str(&self.sub_payment_type_name);
        }
        name.to_uppercase()
    }

    /// `VISA **** 4242` for card sales, the tender label otherwise.
    pub fn paid_info(&self) -> String {
        if self.trans_type == TransactionType::CreditSale {
            format!("{} **** {}", self.display_card_type(), self.processor.card_num).to_uppercase()
        } else {
            self.display_trans_type()
        }
    }
}
