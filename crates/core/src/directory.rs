//! Read-only directories the ledger consults but never writes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use clubledger_shared::types::{Currency, OrganizationId, PayerId};

use crate::ledger::LedgerError;

/// Display information about a payer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayerProfile {
    /// The payer.
    pub id: PayerId,
    /// Organization the payer belongs to.
    pub organization_id: OrganizationId,
    /// Name shown on receipts.
    pub display_name: String,
    /// Contact email.
    pub email: Option<String>,
}

/// Per-organization settings relevant to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationSettings {
    /// The organization.
    pub organization_id: OrganizationId,
    /// Currency every amount of the organization is denominated in.
    pub currency: Currency,
    /// Locale used for rendering.
    pub locale: String,
}

/// Resolves payers.
#[async_trait]
pub trait PayerDirectory: Send + Sync {
    /// Finds a payer of an organization.
    async fn find_payer(
        &self,
        organization_id: OrganizationId,
        payer_id: PayerId,
    ) -> Result<Option<PayerProfile>, LedgerError>;
}

/// Resolves guardian to payee links.
#[async_trait]
pub trait GuardianDirectory: Send + Sync {
    /// Payees linked to a guardian in an organization.
    async fn linked_payees(
        &self,
        organization_id: OrganizationId,
        guardian_id: PayerId,
    ) -> Result<Vec<PayerId>, LedgerError>;
}

/// Resolves organization settings.
#[async_trait]
pub trait OrganizationDirectory: Send + Sync {
    /// Settings of an organization.
    async fn settings(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Option<OrganizationSettings>, LedgerError>;
}
