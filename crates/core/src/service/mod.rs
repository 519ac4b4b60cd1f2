//! Ledger service: every ledger operation as one retried unit of work.
//!
//! Each mutating operation loads the ledgers of the scopes it touches into a
//! [`LedgerWorkspace`], runs the matching engine, and commits the resulting
//! changeset. A version conflict on any scope replays the whole attempt up
//! to [`LedgerSettings::max_conflict_retries`] times.

mod types;


pub use types::{
    CreditApplicationStatus, CreditReceiptResult, DebitReceiptResult, ExpenseResult,
    GuardianPayment, IncomePayment, NewCredit, NewDebit, NewExpense,
};

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use clubledger_shared::LedgerSettings;
use clubledger_shared::types::{
    Amount, OrganizationId, PageRequest, PageResponse, PayerId, ReceiptId, TransactionId, UserId,
};

use crate::allocation::settle_debits_with_credit;
use crate::credit::{CreditApplication, CreditApplicator};
use crate::directory::{
    GuardianDirectory, OrganizationDirectory, OrganizationSettings, PayerDirectory, PayerProfile,
};
use crate::distribution::{
    GuardianDistribution, GuardianPaymentDistributor, GuardianPaymentRequest, PaymentDistribution,
    PaymentDistributor, PaymentRequest,
};
use crate::ledger::{
    BalanceSnapshot, LedgerEngine, LedgerError, LedgerScope, LedgerStore, LedgerTransaction,
    LedgerWorkspace, PayeePayment, PayerBalance, TransactionKind,
};
use crate::receipt::{Allocation, Receipt, ReceiptKind};
use crate::workflow::{DeletionSummary, RestoreSummary, TransactionLedger, TransactionState};

/// Entry point for every ledger operation.
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    payers: Arc<dyn PayerDirectory>,
    guardians: Arc<dyn GuardianDirectory>,
    organizations: Arc<dyn OrganizationDirectory>,
    settings: LedgerSettings,
}

impl LedgerService {
    /// Creates a service over a store and its directories.
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        payers: Arc<dyn PayerDirectory>,
        guardians: Arc<dyn GuardianDirectory>,
        organizations: Arc<dyn OrganizationDirectory>,
        settings: LedgerSettings,
    ) -> Self {
        Self {
            store,
            payers,
            guardians,
            organizations,
            settings,
        }
    }

    /// Settings the service runs with.
    #[must_use]
    pub fn settings(&self) -> LedgerSettings {
        self.settings
    }

    // ========================================================================
    // Receipts
    // ========================================================================

    /// Issues a debit (invoice) to a payer.
    ///
    /// The debit is committed on its own. Unconsumed credit is then applied to
    /// it in a separate unit of work; a failure there is logged and reported
    /// in the result without undoing the debit.
    pub async fn create_debit_receipt(
        &self,
        request: NewDebit,
    ) -> Result<DebitReceiptResult, LedgerError> {
        let amount = Amount::positive(request.amount.minor())?;
        self.require_payer(request.organization_id, request.payer_id)
            .await?;
        self.ensure_key_unused(request.organization_id, request.idempotency_key.as_deref())
            .await?;
        let scope = LedgerScope::new(request.payer_id, request.organization_id);

        let request = &request;
        let (transaction, receipt) = self
            .with_retries("create_debit_receipt", || async move {
                let mut ws = self.load_workspace(scope.organization_id, [scope]).await?;
                let mut txn = LedgerTransaction::new(
                    TransactionKind::Invoice,
                    scope.organization_id,
                    amount,
                    ws.now(),
                )
                .with_payer(scope.payer_id)
                .with_handling(None, request.handled_by)
                .with_description(request.description.clone())
                .with_idempotency_key(request.idempotency_key.clone());

                let debit = Receipt::debit(scope, amount, txn.id, ws.now())
                    .with_academy(request.academy_id)
                    .with_product(request.product.clone())
                    .with_description(request.description.clone());
                txn.own_receipt(ws.add_receipt(debit.clone())?);
                ws.record_transaction(txn.clone());

                self.store.commit(ws.into_changeset()?).await?;
                Ok((txn, debit))
            })
            .await?;

        info!(
            transaction_id = %transaction.id,
            receipt_id = %receipt.id,
            payer_id = %scope.payer_id,
            amount = %amount,
            "Debit receipt created"
        );

        let credit_application = self
            .auto_apply_credit(scope, receipt.id, request.handled_by)
            .await;
        Ok(DebitReceiptResult {
            transaction,
            receipt,
            credit_application,
        })
    }

    /// Records a credit for a payer.
    ///
    /// Without a parent a new `income` transaction owns the credit. With a
    /// parent, the credit joins that active income transaction and its amount
    /// grows accordingly. With a sibling debit, `min(amount, debit remainder)`
    /// is applied to it right away.
    pub async fn create_credit_receipt(
        &self,
        request: NewCredit,
    ) -> Result<CreditReceiptResult, LedgerError> {
        let amount = Amount::positive(request.amount.minor())?;
        self.require_payer(request.organization_id, request.payer_id)
            .await?;
        if request.parent_transaction_id.is_none() {
            self.ensure_key_unused(request.organization_id, request.idempotency_key.as_deref())
                .await?;
        }
        let scope = LedgerScope::new(request.payer_id, request.organization_id);

        let request = &request;
        let result = self
            .with_retries("create_credit_receipt", || async move {
                let parent = match request.parent_transaction_id {
                    Some(parent_id) => Some(self.income_parent(scope.organization_id, parent_id).await?),
                    None => None,
                };

                let mut scopes = vec![scope];
                if let Some(owner) = parent.as_ref().and_then(|p| p.payer_id) {
                    scopes.push(LedgerScope::new(owner, scope.organization_id));
                }
                let mut ws = self.load_workspace(scope.organization_id, scopes).await?;
                let now = ws.now();

                let mut txn = match parent {
                    Some(mut parent) => {
                        parent.amount = parent
                            .amount
                            .checked_add(amount)
                            .filter(|a| *a <= Amount::MAX)
                            .ok_or(LedgerError::AmountOverflow)?;
                        if !parent.payee_payments.is_empty() {
                            parent.payee_payments.push(PayeePayment {
                                payee_id: scope.payer_id,
                                amount,
                            });
                        }
                        parent.updated_at = now;
                        parent
                    }
                    None => LedgerTransaction::new(
                        TransactionKind::Income,
                        scope.organization_id,
                        amount,
                        now,
                    )
                    .with_payer(scope.payer_id)
                    .with_handling(request.method, request.handled_by)
                    .with_description(request.description.clone())
                    .with_idempotency_key(request.idempotency_key.clone()),
                };

                let credit = Receipt::credit(scope, amount, txn.id, now)
                    .with_academy(request.academy_id)
                    .with_description(request.description.clone());
                let credit_id = ws.add_receipt(credit)?;
                txn.own_receipt(credit_id);

                let applied = match request.sibling_debit_id {
                    Some(debit_id) => {
                        self.apply_to_sibling(&mut ws, scope, credit_id, debit_id, amount, &mut txn)?
                    }
                    None => Amount::ZERO,
                };

                if request.parent_transaction_id.is_some() {
                    ws.update_transaction(txn.clone());
                } else {
                    ws.record_transaction(txn.clone());
                }
                let receipt = ws
                    .receipt(credit_id)
                    .cloned()
                    .ok_or_else(|| LedgerError::Internal(format!("credit {credit_id} vanished")))?;

                self.store.commit(ws.into_changeset()?).await?;
                Ok(CreditReceiptResult {
                    transaction: txn,
                    receipt,
                    applied_to_debit: applied,
                })
            })
            .await?;

        info!(
            transaction_id = %result.transaction.id,
            receipt_id = %result.receipt.id,
            payer_id = %scope.payer_id,
            amount = %amount,
            applied = %result.applied_to_debit,
            "Credit receipt created"
        );
        Ok(result)
    }

    /// Computes a payer's balance from live receipts and allocations.
    pub async fn compute_outstanding_balance(
        &self,
        organization_id: OrganizationId,
        payer_id: PayerId,
    ) -> Result<BalanceSnapshot, LedgerError> {
        self.require_payer(organization_id, payer_id).await?;
        let scope = LedgerScope::new(payer_id, organization_id);
        let ledger = self.store.load_ledger(scope).await?;
        Ok(LedgerEngine::compute(scope, &ledger.receipts, &ledger.allocations))
    }

    /// Lists a payer's receipts, oldest first.
    pub async fn list_receipts(
        &self,
        organization_id: OrganizationId,
        payer_id: PayerId,
        include_deleted: bool,
    ) -> Result<Vec<Receipt>, LedgerError> {
        self.require_payer(organization_id, payer_id).await?;
        self.store
            .list_receipts(LedgerScope::new(payer_id, organization_id), include_deleted)
            .await
    }

    // ========================================================================
    // Payments
    // ========================================================================

    /// Records a payment by a payer into their own ledger.
    pub async fn create_income_transaction(
        &self,
        payment: IncomePayment,
    ) -> Result<PaymentDistribution, LedgerError> {
        self.create_multi_payee_payment_transaction(PaymentRequest {
            organization_id: payment.organization_id,
            payer_id: payment.payer_id,
            payee_payments: vec![PayeePayment {
                payee_id: payment.payer_id,
                amount: payment.amount,
            }],
            academy_id: payment.academy_id,
            method: payment.method,
            handled_by: payment.handled_by,
            description: payment.description,
            idempotency_key: payment.idempotency_key,
        })
        .await
    }

    /// Records one payment split explicitly across several payees.
    pub async fn create_multi_payee_payment_transaction(
        &self,
        request: PaymentRequest,
    ) -> Result<PaymentDistribution, LedgerError> {
        let org = request.organization_id;
        let (payments, _) = PaymentDistributor::normalize(&request.payee_payments)?;
        self.require_payer(org, request.payer_id).await?;
        for payment in &payments {
            self.require_payer(org, payment.payee_id).await?;
        }
        self.ensure_key_unused(org, request.idempotency_key.as_deref())
            .await?;
        let scopes: Vec<LedgerScope> = payments
            .iter()
            .map(|p| LedgerScope::new(p.payee_id, org))
            .collect();

        let request = &request;
        let scopes = &scopes;
        let distribution = self
            .with_retries("create_multi_payee_payment_transaction", || async move {
                let mut ws = self.load_workspace(org, scopes.iter().copied()).await?;
                let distribution = PaymentDistributor::distribute(&mut ws, request.clone())?;
                self.store.commit(ws.into_changeset()?).await?;
                Ok(distribution)
            })
            .await?;

        info!(
            transaction_id = %distribution.transaction_id,
            payer_id = %request.payer_id,
            payees = distribution.settlements.len(),
            amount = %distribution.total_amount,
            excess = %distribution.excess_amount,
            "Payment recorded"
        );
        Ok(distribution)
    }

    /// Records a guardian lump payment distributed across linked payees,
    /// largest outstanding balance first.
    pub async fn create_guardian_payment_transaction(
        &self,
        payment: GuardianPayment,
    ) -> Result<GuardianDistribution, LedgerError> {
        let org = payment.organization_id;
        Amount::positive(payment.amount.minor())?;
        self.require_payer(org, payment.guardian_id).await?;
        self.ensure_key_unused(org, payment.idempotency_key.as_deref())
            .await?;

        let payees = self.guardians.linked_payees(org, payment.guardian_id).await?;
        let mut scopes = vec![LedgerScope::new(payment.guardian_id, org)];
        scopes.extend(payees.iter().map(|p| LedgerScope::new(*p, org)));

        let request = GuardianPaymentRequest {
            organization_id: org,
            guardian_id: payment.guardian_id,
            payees,
            amount: payment.amount,
            academy_id: payment.academy_id,
            method: payment.method,
            handled_by: payment.handled_by,
            description: payment.description,
            idempotency_key: payment.idempotency_key,
        };

        let request = &request;
        let scopes = &scopes;
        let distribution = self
            .with_retries("create_guardian_payment_transaction", || async move {
                let mut ws = self.load_workspace(org, scopes.iter().copied()).await?;
                let distribution = GuardianPaymentDistributor::distribute(&mut ws, request.clone())?;
                self.store.commit(ws.into_changeset()?).await?;
                Ok(distribution)
            })
            .await?;

        info!(
            transaction_id = %distribution.transaction_id,
            guardian_id = %request.guardian_id,
            amount = %distribution.total_amount,
            distributed = %distribution.distributed_amount,
            excess = %distribution.excess_amount,
            players_fully_paid = distribution.players_fully_paid,
            "Guardian payment recorded"
        );
        Ok(distribution)
    }

    /// Records money paid out by the organization.
    ///
    /// When `charged_to` is set, the payer is invoiced the same amount and
    /// unconsumed credit is applied to that debit as for any other debit.
    pub async fn create_expense_transaction(
        &self,
        request: NewExpense,
    ) -> Result<ExpenseResult, LedgerError> {
        let org = request.organization_id;
        let amount = Amount::positive(request.amount.minor())?;
        if let Some(payer_id) = request.charged_to {
            self.require_payer(org, payer_id).await?;
        }
        self.ensure_key_unused(org, request.idempotency_key.as_deref())
            .await?;
        let scope = request.charged_to.map(|p| LedgerScope::new(p, org));

        let request = &request;
        let (transaction, charge_receipt) = self
            .with_retries("create_expense_transaction", || async move {
                let mut ws = self.load_workspace(org, scope).await?;
                let mut txn = LedgerTransaction::new(TransactionKind::Expense, org, amount, ws.now())
                    .with_handling(request.method, request.handled_by)
                    .with_description(request.description.clone())
                    .with_idempotency_key(request.idempotency_key.clone());

                let charge = match scope {
                    Some(scope) => {
                        txn = txn.with_payer(scope.payer_id);
                        let debit = Receipt::debit(scope, amount, txn.id, ws.now())
                            .with_academy(request.academy_id)
                            .with_description(request.description.clone());
                        txn.own_receipt(ws.add_receipt(debit.clone())?);
                        Some(debit)
                    }
                    None => None,
                };
                ws.record_transaction(txn.clone());

                self.store.commit(ws.into_changeset()?).await?;
                Ok((txn, charge))
            })
            .await?;

        info!(
            transaction_id = %transaction.id,
            amount = %amount,
            charged = charge_receipt.is_some(),
            "Expense recorded"
        );

        let credit_application = match (scope, &charge_receipt) {
            (Some(scope), Some(debit)) => {
                self.auto_apply_credit(scope, debit.id, request.handled_by)
                    .await
            }
            _ => CreditApplicationStatus::NothingToApply,
        };
        Ok(ExpenseResult {
            transaction,
            charge_receipt,
            credit_application,
        })
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Gets a transaction of an organization.
    pub async fn get_transaction(
        &self,
        organization_id: OrganizationId,
        transaction_id: TransactionId,
    ) -> Result<LedgerTransaction, LedgerError> {
        self.store
            .find_transaction(organization_id, transaction_id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(transaction_id))
    }

    /// Lists transactions of an organization, newest first.
    pub async fn list_transactions(
        &self,
        organization_id: OrganizationId,
        page: PageRequest,
    ) -> Result<PageResponse<LedgerTransaction>, LedgerError> {
        let (data, total) = self.store.list_transactions(organization_id, page).await?;
        Ok(PageResponse::new(data, page, total))
    }

    /// Soft-deletes a transaction, removing its effect from every balance.
    pub async fn soft_delete_transaction(
        &self,
        organization_id: OrganizationId,
        transaction_id: TransactionId,
        actor: UserId,
    ) -> Result<DeletionSummary, LedgerError> {
        let summary = self
            .with_retries("soft_delete_transaction", || async move {
                let txn = self.get_transaction(organization_id, transaction_id).await?;
                TransactionLedger::validate_transition(&txn, TransactionState::Deleted)?;

                let recorded = self
                    .store
                    .find_receipts(organization_id, &txn.receipt_ids)
                    .await?;
                let scanned = self
                    .store
                    .find_receipts_by_transaction(organization_id, txn.id)
                    .await?;
                let owned = TransactionLedger::resolve_owned_receipts(&txn, recorded, scanned)?;
                let created: Vec<Allocation> = self
                    .store
                    .find_allocations(organization_id, &txn.allocation_ids)
                    .await?;

                let scopes = TransactionLedger::affected_scopes(&owned, &created);
                let mut ws = self.load_workspace(organization_id, scopes).await?;
                let owned_ids: Vec<ReceiptId> = owned.iter().map(|r| r.id).collect();
                let (_, summary) = TransactionLedger::soft_delete(&mut ws, txn, &owned_ids, actor)?;

                self.store.commit(ws.into_changeset()?).await?;
                Ok(summary)
            })
            .await?;

        info!(
            transaction_id = %transaction_id,
            actor = %actor,
            receipts = summary.receipts_deleted,
            allocations = summary.allocations_removed,
            "Transaction soft-deleted"
        );
        Ok(summary)
    }

    /// Restores a soft-deleted transaction from its backup.
    pub async fn restore_transaction(
        &self,
        organization_id: OrganizationId,
        transaction_id: TransactionId,
        actor: UserId,
    ) -> Result<RestoreSummary, LedgerError> {
        let summary = self
            .with_retries("restore_transaction", || async move {
                let txn = self.get_transaction(organization_id, transaction_id).await?;
                TransactionLedger::validate_transition(&txn, TransactionState::Active)?;
                let backup = txn
                    .deletion_backup
                    .as_ref()
                    .ok_or(LedgerError::MissingDeletionBackup(txn.id))?;

                let scopes = TransactionLedger::affected_scopes(&backup.receipts, &backup.allocations);
                let owners: BTreeSet<TransactionId> = backup
                    .allocations
                    .iter()
                    .map(|a| a.transaction_id)
                    .filter(|id| *id != txn.id)
                    .collect();
                let mut retired = BTreeSet::new();
                for owner in owners {
                    let deleted = self
                        .store
                        .find_transaction(organization_id, owner)
                        .await?
                        .is_some_and(|t| t.is_deleted);
                    if deleted {
                        retired.insert(owner);
                    }
                }

                let mut ws = self.load_workspace(organization_id, scopes).await?;
                let (_, summary) = TransactionLedger::restore(&mut ws, txn, &retired)?;

                self.store.commit(ws.into_changeset()?).await?;
                Ok(summary)
            })
            .await?;

        info!(
            transaction_id = %transaction_id,
            actor = %actor,
            receipts = summary.receipts_restored,
            allocations = summary.allocations_restored,
            left_removed = summary.allocations_left_removed,
            "Transaction restored"
        );
        Ok(summary)
    }

    // ========================================================================
    // Balance cache
    // ========================================================================

    /// Returns the cached balance row of a payer, if one was ever written.
    pub async fn get_cached_balance(
        &self,
        organization_id: OrganizationId,
        payer_id: PayerId,
    ) -> Result<Option<PayerBalance>, LedgerError> {
        self.require_payer(organization_id, payer_id).await?;
        self.store
            .find_balance(LedgerScope::new(payer_id, organization_id))
            .await
    }

    /// Recomputes a payer's cached balance from live data.
    pub async fn refresh_balance_cache(
        &self,
        organization_id: OrganizationId,
        payer_id: PayerId,
    ) -> Result<PayerBalance, LedgerError> {
        self.require_payer(organization_id, payer_id).await?;
        let scope = LedgerScope::new(payer_id, organization_id);

        let balance = self
            .with_retries("refresh_balance_cache", || async move {
                let ws = self.load_workspace(organization_id, [scope]).await?;
                let changes = ws.into_changeset()?;
                let balance = changes
                    .balances
                    .iter()
                    .find(|w| w.balance.scope() == scope)
                    .map(|w| w.balance.clone())
                    .ok_or_else(|| LedgerError::Internal(format!("no balance row for {scope}")))?;
                self.store.commit(changes).await?;
                Ok(balance)
            })
            .await?;

        info!(
            payer_id = %payer_id,
            net_balance = %balance.net_balance,
            version = balance.version,
            "Balance cache refreshed"
        );
        Ok(balance)
    }

    // ========================================================================
    // Directories
    // ========================================================================

    /// Settings of an organization.
    pub async fn organization_settings(
        &self,
        organization_id: OrganizationId,
    ) -> Result<OrganizationSettings, LedgerError> {
        self.organizations
            .settings(organization_id)
            .await?
            .ok_or(LedgerError::OrganizationNotFound(organization_id))
    }

    /// Payees linked to a guardian.
    pub async fn linked_payees(
        &self,
        organization_id: OrganizationId,
        guardian_id: PayerId,
    ) -> Result<Vec<PayerId>, LedgerError> {
        self.require_payer(organization_id, guardian_id).await?;
        self.guardians.linked_payees(organization_id, guardian_id).await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn require_payer(
        &self,
        organization_id: OrganizationId,
        payer_id: PayerId,
    ) -> Result<PayerProfile, LedgerError> {
        self.payers
            .find_payer(organization_id, payer_id)
            .await?
            .ok_or(LedgerError::PayerNotFound(payer_id))
    }

    async fn ensure_key_unused(
        &self,
        organization_id: OrganizationId,
        key: Option<&str>,
    ) -> Result<(), LedgerError> {
        let Some(key) = key else {
            return Ok(());
        };
        match self.store.find_by_idempotency_key(organization_id, key).await? {
            Some(existing) => Err(LedgerError::DuplicateRequest {
                key: key.to_string(),
                existing: existing.id,
            }),
            None => Ok(()),
        }
    }

    /// An active income transaction that can take another credit.
    async fn income_parent(
        &self,
        organization_id: OrganizationId,
        parent_id: TransactionId,
    ) -> Result<LedgerTransaction, LedgerError> {
        let parent = self.get_transaction(organization_id, parent_id).await?;
        if parent.kind != TransactionKind::Income || parent.is_deleted {
            return Err(LedgerError::ParentNotIncome(parent_id));
        }
        let receipts = self
            .store
            .find_receipts(organization_id, &parent.receipt_ids)
            .await?;
        if receipts.iter().any(|r| r.bookkeeping) {
            return Err(LedgerError::ParentNotIncome(parent_id));
        }
        Ok(parent)
    }

    fn apply_to_sibling(
        &self,
        ws: &mut LedgerWorkspace,
        scope: LedgerScope,
        credit_id: ReceiptId,
        debit_id: ReceiptId,
        amount: Amount,
        txn: &mut LedgerTransaction,
    ) -> Result<Amount, LedgerError> {
        let debit = ws
            .ledger(scope)?
            .receipt(debit_id)
            .ok_or(LedgerError::ReceiptScopeMismatch(debit_id))?;
        if debit.kind != ReceiptKind::Debit || !debit.is_open_debit() {
            return Err(LedgerError::NotADebit(debit_id));
        }
        let to_apply = amount.min(ws.balance(scope)?.remaining_on(debit_id));
        if !to_apply.is_positive() {
            return Ok(Amount::ZERO);
        }
        let allocation = Allocation::new(scope, debit_id, credit_id, to_apply, txn.id, ws.now());
        txn.own_allocation(ws.add_allocation(allocation)?);
        Ok(to_apply)
    }

    async fn load_workspace(
        &self,
        organization_id: OrganizationId,
        scopes: impl IntoIterator<Item = LedgerScope>,
    ) -> Result<LedgerWorkspace, LedgerError> {
        let mut ws = LedgerWorkspace::new(organization_id, Utc::now());
        for scope in scopes {
            if ws.contains(scope) {
                continue;
            }
            ws.insert_ledger(self.store.load_ledger(scope).await?)?;
        }
        Ok(ws)
    }

    async fn auto_apply_credit(
        &self,
        scope: LedgerScope,
        debit_id: ReceiptId,
        handled_by: Option<UserId>,
    ) -> CreditApplicationStatus {
        if !self.settings.auto_apply_credit {
            return CreditApplicationStatus::Disabled;
        }
        match self.apply_credit(scope, debit_id, handled_by).await {
            Ok(Some(application)) => {
                info!(
                    transaction_id = %application.transaction_id,
                    debit_id = %debit_id,
                    applied = %application.applied,
                    "Credit applied to debit"
                );
                CreditApplicationStatus::Applied(application)
            }
            Ok(None) => CreditApplicationStatus::NothingToApply,
            Err(e) => {
                warn!(
                    error = %e,
                    debit_id = %debit_id,
                    payer_id = %scope.payer_id,
                    "Automatic credit application failed"
                );
                CreditApplicationStatus::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    async fn apply_credit(
        &self,
        scope: LedgerScope,
        debit_id: ReceiptId,
        handled_by: Option<UserId>,
    ) -> Result<Option<CreditApplication>, LedgerError> {
        self.with_retries("apply_credit", || async move {
            let mut ws = self.load_workspace(scope.organization_id, [scope]).await?;
            let Some(application) = CreditApplicator::apply(&mut ws, scope, debit_id, handled_by)?
            else {
                return Ok(None);
            };
            self.store.commit(ws.into_changeset()?).await?;
            Ok(Some(application))
        })
        .await
    }

    /// Runs `attempt` until it succeeds, fails with a non-retryable error, or
    /// the conflict budget is spent.
    async fn with_retries<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt: F,
    ) -> Result<T, LedgerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(e) if e.is_retryable() && retries < self.settings.max_conflict_retries => {
                    retries += 1;
                    warn!(operation, retry = retries, error = %e, "Ledger conflict, retrying");
                }
                result => return result,
            }
        }
    }
}
