//! In-memory ledger store and directories.
//!
//! Used by tests and local tooling. Commits are atomic under a single write
//! lock and enforce the same version and idempotency rules as the Postgres
//! store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use clubledger_shared::types::{
    AllocationId, Currency, OrganizationId, PageRequest, PayerId, ReceiptId, TransactionId,
};

use crate::directory::{
    GuardianDirectory, OrganizationDirectory, OrganizationSettings, PayerDirectory, PayerProfile,
};
use crate::ledger::{
    BalanceRepository, LedgerChangeSet, LedgerError, LedgerScope, LedgerStore, LedgerTransaction,
    PayerBalance, PayerLedger, ReceiptRepository, TransactionRepository,
};
use crate::receipt::{Allocation, Receipt};

#[derive(Debug, Default)]
struct MemoryState {
    receipts: BTreeMap<ReceiptId, Receipt>,
    allocations: BTreeMap<AllocationId, Allocation>,
    transactions: BTreeMap<TransactionId, LedgerTransaction>,
    balances: HashMap<LedgerScope, PayerBalance>,
    idempotency: HashMap<(OrganizationId, String), TransactionId>,
}

impl MemoryState {
    fn version(&self, scope: LedgerScope) -> i64 {
        self.balances.get(&scope).map_or(0, |b| b.version)
    }

    fn check(&self, changes: &LedgerChangeSet) -> Result<(), LedgerError> {
        for write in &changes.balances {
            if self.version(write.balance.scope()) != write.expected_version {
                return Err(LedgerError::ConcurrentModification {
                    payer_id: write.balance.payer_id,
                    organization_id: write.balance.organization_id,
                });
            }
        }
        for (txn, key) in changes.idempotency_keys() {
            if let Some(existing) = self.idempotency.get(&(txn.organization_id, key.to_string())) {
                return Err(LedgerError::DuplicateRequest {
                    key: key.to_string(),
                    existing: *existing,
                });
            }
        }
        Ok(())
    }

    fn apply(&mut self, changes: LedgerChangeSet) {
        for txn in changes.new_transactions {
            if let Some(key) = &txn.idempotency_key {
                self.idempotency
                    .insert((txn.organization_id, key.clone()), txn.id);
            }
            self.transactions.insert(txn.id, txn);
        }
        for txn in changes.updated_transactions {
            self.transactions.insert(txn.id, txn);
        }
        for receipt in changes.new_receipts.into_iter().chain(changes.updated_receipts) {
            self.receipts.insert(receipt.id, receipt);
        }
        for allocation in changes
            .new_allocations
            .into_iter()
            .chain(changes.updated_allocations)
        {
            self.allocations.insert(allocation.id, allocation);
        }
        for write in changes.balances {
            self.balances.insert(write.balance.scope(), write.balance);
        }
    }
}

/// Ledger store kept entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<MemoryState>,
}

impl InMemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReceiptRepository for InMemoryLedgerStore {
    async fn load_ledger(&self, scope: LedgerScope) -> Result<PayerLedger, LedgerError> {
        let state = self.state.read().await;
        let mut receipts: Vec<Receipt> = state
            .receipts
            .values()
            .filter(|r| r.scope() == scope)
            .cloned()
            .collect();
        receipts.sort_by_key(|r| (r.created_at, r.id));
        Ok(PayerLedger {
            scope,
            version: state.version(scope),
            receipts,
            allocations: state
                .allocations
                .values()
                .filter(|a| a.scope() == scope)
                .cloned()
                .collect(),
        })
    }

    async fn find_receipts(
        &self,
        organization_id: OrganizationId,
        ids: &[ReceiptId],
    ) -> Result<Vec<Receipt>, LedgerError> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.receipts.get(id))
            .filter(|r| r.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn find_receipts_by_transaction(
        &self,
        organization_id: OrganizationId,
        transaction_id: TransactionId,
    ) -> Result<Vec<Receipt>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .receipts
            .values()
            .filter(|r| r.organization_id == organization_id && r.transaction_id == transaction_id)
            .cloned()
            .collect())
    }

    async fn list_receipts(
        &self,
        scope: LedgerScope,
        include_deleted: bool,
    ) -> Result<Vec<Receipt>, LedgerError> {
        let mut receipts: Vec<Receipt> = self
            .load_ledger(scope)
            .await?
            .receipts
            .into_iter()
            .filter(|r| include_deleted || r.is_active())
            .collect();
        receipts.sort_by_key(|r| (r.created_at, r.id));
        Ok(receipts)
    }

    async fn find_allocations(
        &self,
        organization_id: OrganizationId,
        ids: &[AllocationId],
    ) -> Result<Vec<Allocation>, LedgerError> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.allocations.get(id))
            .filter(|a| a.organization_id == organization_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TransactionRepository for InMemoryLedgerStore {
    async fn find_transaction(
        &self,
        organization_id: OrganizationId,
        id: TransactionId,
    ) -> Result<Option<LedgerTransaction>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .get(&id)
            .filter(|t| t.organization_id == organization_id)
            .cloned())
    }

    async fn find_by_idempotency_key(
        &self,
        organization_id: OrganizationId,
        key: &str,
    ) -> Result<Option<LedgerTransaction>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .idempotency
            .get(&(organization_id, key.to_string()))
            .and_then(|id| state.transactions.get(id))
            .cloned())
    }

    async fn list_transactions(
        &self,
        organization_id: OrganizationId,
        page: PageRequest,
    ) -> Result<(Vec<LedgerTransaction>, u64), LedgerError> {
        let state = self.state.read().await;
        let mut matching: Vec<&LedgerTransaction> = state
            .transactions
            .values()
            .filter(|t| t.organization_id == organization_id)
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit()).unwrap_or(usize::MAX);
        let data = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok((data, total))
    }
}

#[async_trait]
impl BalanceRepository for InMemoryLedgerStore {
    async fn find_balance(&self, scope: LedgerScope) -> Result<Option<PayerBalance>, LedgerError> {
        Ok(self.state.read().await.balances.get(&scope).cloned())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn commit(&self, changes: LedgerChangeSet) -> Result<(), LedgerError> {
        let mut state = self.state.write().await;
        state.check(&changes)?;
        state.apply(changes);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct DirectoryState {
    payers: HashMap<(OrganizationId, PayerId), PayerProfile>,
    guardians: HashMap<(OrganizationId, PayerId), Vec<PayerId>>,
    organizations: HashMap<OrganizationId, OrganizationSettings>,
}

/// Payer, guardian and organization directory kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    state: RwLock<DirectoryState>,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an organization.
    #[must_use]
    pub fn with_organization(mut self, organization_id: OrganizationId, currency: Currency) -> Self {
        self.state.get_mut().organizations.insert(
            organization_id,
            OrganizationSettings {
                organization_id,
                currency,
                locale: "en".to_string(),
            },
        );
        self
    }

    /// Registers a payer.
    #[must_use]
    pub fn with_payer(mut self, organization_id: OrganizationId, payer_id: PayerId, name: &str) -> Self {
        self.state
            .get_mut()
            .payers
            .insert((organization_id, payer_id), profile(organization_id, payer_id, name));
        self
    }

    /// Links a payee to a guardian.
    #[must_use]
    pub fn with_guardian_link(
        mut self,
        organization_id: OrganizationId,
        guardian_id: PayerId,
        payee_id: PayerId,
    ) -> Self {
        self.state
            .get_mut()
            .guardians
            .entry((organization_id, guardian_id))
            .or_default()
            .push(payee_id);
        self
    }

    /// Registers a payer on a directory that is already shared.
    pub async fn add_payer(&self, organization_id: OrganizationId, payer_id: PayerId, name: &str) {
        self.state
            .write()
            .await
            .payers
            .insert((organization_id, payer_id), profile(organization_id, payer_id, name));
    }
}

fn profile(organization_id: OrganizationId, payer_id: PayerId, name: &str) -> PayerProfile {
    PayerProfile {
        id: payer_id,
        organization_id,
        display_name: name.to_string(),
        email: None,
    }
}

#[async_trait]
impl PayerDirectory for InMemoryDirectory {
    async fn find_payer(
        &self,
        organization_id: OrganizationId,
        payer_id: PayerId,
    ) -> Result<Option<PayerProfile>, LedgerError> {
        Ok(self
            .state
            .read()
            .await
            .payers
            .get(&(organization_id, payer_id))
            .cloned())
    }
}

#[async_trait]
impl GuardianDirectory for InMemoryDirectory {
    async fn linked_payees(
        &self,
        organization_id: OrganizationId,
        guardian_id: PayerId,
    ) -> Result<Vec<PayerId>, LedgerError> {
        Ok(self
            .state
            .read()
            .await
            .guardians
            .get(&(organization_id, guardian_id))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl OrganizationDirectory for InMemoryDirectory {
    async fn settings(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Option<OrganizationSettings>, LedgerError> {
        Ok(self
            .state
            .read()
            .await
            .organizations
            .get(&organization_id)
            .cloned())
    }
}
