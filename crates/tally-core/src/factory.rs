//! # Transaction Factory
//!
//! Builds [`Transaction`] records from payment outcomes and applies the
//! three transitions a recorded payment still allows.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Factory              trans_type      linked to order/bill   status     │
//! │  ──────────────────   ─────────────   ────────────────────   ───────    │
//! │  cash                 cash            yes                    new        │
//! │  custom               custom          yes                    new        │
//! │  card_sale            credit_sale     yes                    new        │
//! │  card_void            credit_void     via original trans     new        │
//! │  card_refund          credit_refund   no                     new        │
//! │  card_force           credit_force    no                     new        │
//! │  batch_close          batch_close     no                     settled    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every factory stamps store, merchant, shift, transaction number and the
//! acting employee from the [`SessionContext`].

use chrono::Utc;

use crate::context::{EmployeeRef, SessionContext};
use crate::error::{CoreError, CoreResult};
use crate::ids::new_id;
use crate::model::{
    BatchResult, Bill, Order, PaymentDevice, PaymentResult, PaymentType, ProcessorResponse,
    Transaction, TransactionStatus, TransactionType,
};
use crate::money::Money;
use crate::validation::validate_reason;

// =============================================================================
// Factories
// =============================================================================

impl Transaction {
    fn stamped(ctx: &SessionContext, trans_type: TransactionType) -> Self {
        Self {
            id: new_id(),
            store_id: ctx.store.id.clone(),
            merchant_id: ctx.store.merchant_id.clone(),
            trans_type,
            status: TransactionStatus::New,
            order: None,
            order_num: 0,
            bill: None,
            area: String::new(),
            area_name: String::new(),
            table: String::new(),
            table_name: String::new(),
            payment_device: None,
            payment_device_name: String::new(),
            custom_trans_type: None,
            custom_trans_type_name: String::new(),
            sub_payment_type: None,
            sub_payment_type_name: String::new(),
            created_by: ctx.employee.id.clone(),
            created_at: Utc::now(),
            shift: ctx.shift.id.clone(),
            shift_index: ctx.shift.index,
            trans_num: ctx.shift.trans_num,
            requested_amount: Money::ZERO,
            approved_amount: Money::ZERO,
            remaining_balance: Money::ZERO,
            extra_balance: Money::ZERO,
            tip_amount: Money::ZERO,
            adjusted_by: None,
            adjusted_at: None,
            voided_by: None,
            voided_at: None,
            voided_reason: String::new(),
            processor: ProcessorResponse::default(),
            batch_num: String::new(),
            total_count: 0,
            total_amount: Money::ZERO,
            settled_by: None,
            settled_at: None,
            settling_trans: None,
            settled_trans: Vec::new(),
        }
    }

    fn link(&mut self, order: &Order, bill: &Bill) {
        self.order = Some(order.id.clone());
        self.order_num = order.order_no;
        self.area = order.area.clone();
        self.area_name = order.area_name.clone();
        self.table = order.table.clone();
        self.table_name = order.table_name.clone();
        self.bill = Some(bill.id.clone());
    }

    fn use_device(&mut self, device: &PaymentDevice) {
        self.payment_device = Some(device.id.clone());
        self.payment_device_name = device.name.clone();
    }

    fn apply_result(&mut self, result: &PaymentResult) {
        self.processor = result.response.clone();
        self.requested_amount = result.requested_amount;
        self.approved_amount = result.approved_amount;
        self.remaining_balance = result.remaining_balance;
        self.extra_balance = result.extra_balance;
    }

    fn apply_batch(&mut self, result: &BatchResult) {
        self.processor.host_code = result.host_code.clone();
        self.processor.host_response = result.host_response.clone();
        self.processor.auth_code = result.auth_code.clone();
        self.processor.message = result.message.clone();
        self.processor.ext_data = result.ext_data.clone();
        self.processor.result_code = result.result_code.clone();
        self.processor.result_txt = result.result_txt.clone();
        self.batch_num = result.batch_num.clone();
        self.total_count = result.total_count;
        self.total_amount = result.total_amount;
    }

    /// Cash tendered for a bill. Carries the bill's tip.
    pub fn cash(
        ctx: &SessionContext,
        order: &Order,
        bill: &Bill,
        amount: Money,
        sub_payment_type: Option<&PaymentType>,
    ) -> Self {
        let mut trans = Self::stamped(ctx, TransactionType::Cash);
        trans.link(order, bill);
        trans.set_sub_payment_type(sub_payment_type);
        trans.requested_amount = amount;
        trans.approved_amount = amount;
        trans.tip_amount = bill.tip;
        trans
    }

    /// A store-defined tender (gift card, house account...).
    pub fn custom(
        ctx: &SessionContext,
        order: &Order,
        bill: &Bill,
        amount: Money,
        payment_type: &PaymentType,
        sub_payment_type: Option<&PaymentType>,
    ) -> Self {
        let mut trans = Self::stamped(ctx, TransactionType::Custom);
        trans.link(order, bill);
        trans.set_sub_payment_type(sub_payment_type);
        trans.custom_trans_type = Some(payment_type.id.clone());
        trans.custom_trans_type_name = payment_type.name.clone();
        trans.requested_amount = amount;
        trans.approved_amount = amount;
        trans.tip_amount = bill.tip;
        trans
    }

    /// An approved card sale for a bill.
    pub fn card_sale(
        ctx: &SessionContext,
        device: &PaymentDevice,
        order: &Order,
        bill: &Bill,
        result: &PaymentResult,
        sub_payment_type: Option<&PaymentType>,
    ) -> Self {
        let mut trans = Self::stamped(ctx, TransactionType::CreditSale);
        trans.link(order, bill);
        trans.set_sub_payment_type(sub_payment_type);
        trans.use_device(device);
        trans.apply_result(result);
        trans
    }

    /// The processor-side reversal of `original`, linked to the same check.
    pub fn card_void(
        ctx: &SessionContext,
        device: &PaymentDevice,
        original: &Transaction,
        result: &PaymentResult,
    ) -> Self {
        let mut trans = Self::stamped(ctx, TransactionType::CreditVoid);
        trans.order = original.order.clone();
        trans.order_num = original.order_num;
        trans.bill = original.bill.clone();
        trans.area = original.area.clone();
        trans.area_name = original.area_name.clone();
        trans.table = original.table.clone();
        trans.table_name = original.table_name.clone();
        trans.use_device(device);
        trans.apply_result(result);
        trans
    }

    /// A standalone card refund.
    pub fn card_refund(
        ctx: &SessionContext,
        device: &PaymentDevice,
        result: &PaymentResult,
    ) -> Self {
        let mut trans = Self::stamped(ctx, TransactionType::CreditRefund);
        trans.use_device(device);
        trans.apply_result(result);
        trans
    }

    /// A voice-authorized sale keyed in after the fact.
    pub fn card_force(
        ctx: &SessionContext,
        device: &PaymentDevice,
        result: &PaymentResult,
    ) -> Self {
        let mut trans = Self::stamped(ctx, TransactionType::CreditForce);
        trans.use_device(device);
        trans.apply_result(result);
        trans
    }

    /// Closes a batch. Settled from the moment it exists.
    pub fn batch_close(
        ctx: &SessionContext,
        device: Option<&PaymentDevice>,
        result: Option<&BatchResult>,
        settled: &[Transaction],
    ) -> Self {
        let mut trans = Self::stamped(ctx, TransactionType::BatchClose);
        trans.status = TransactionStatus::Settled;
        if let Some(device) = device {
            trans.use_device(device);
        }
        trans.settled_by = Some(ctx.employee.id.clone());
        trans.settled_at = Some(Utc::now());
        trans.settled_trans = settled.iter().map(|t| t.id.clone()).collect();
        if let Some(result) = result {
            trans.apply_batch(result);
        }
        trans
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Replaces the tip. Only on `new` cash/custom/card-sale records.
    pub fn adjust_tip(&mut self, amount: Money, employee: &EmployeeRef) -> CoreResult<()> {
        if !self.can_adjust() {
            return Err(CoreError::TransactionNotAdjustable {
                trans_id: self.id.clone(),
            });
        }
        self.tip_amount = amount;
        self.adjusted_by = Some(employee.id.clone());
        self.adjusted_at = Some(Utc::now());
        Ok(())
    }

    /// Marks this record as included in batch `by`.
    pub fn settle(&mut self, by: &Transaction, employee: &EmployeeRef) -> CoreResult<()> {
        if self.status.is_settled() {
            return Err(CoreError::TransactionAlreadySettled(self.id.clone()));
        }
        self.status = if self.status == TransactionStatus::Voided {
            TransactionStatus::VoidedSettled
        } else {
            TransactionStatus::Settled
        };
        self.settled_by = Some(employee.id.clone());
        self.settled_at = Some(Utc::now());
        self.settling_trans = Some(by.id.clone());
        Ok(())
    }

    /// Voids a `new` record. The reason is mandatory.
    pub fn void(&mut self, reason: &str, employee: &EmployeeRef) -> CoreResult<()> {
        validate_reason("void reason", reason)?;
        if !self.can_void() {
            return Err(CoreError::TransactionNotVoidable {
                trans_id: self.id.clone(),
                status: self.status.to_string(),
            });
        }
        self.status = TransactionStatus::Voided;
        self.voided_reason = reason.trim().to_string();
        self.voided_by = Some(employee.id.clone());
        self.voided_at = Some(Utc::now());
        Ok(())
    }

    pub fn set_sub_payment_type(&mut self, sub_payment_type: Option<&PaymentType>) {
        match sub_payment_type {
            Some(sub) => {
                self.sub_payment_type = Some(sub.id.clone());
                self.sub_payment_type_name = sub.name.clone();
            }
            None => {
                self.sub_payment_type = None;
                self.sub_payment_type_name = String::new();
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
