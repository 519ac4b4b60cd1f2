//! Postgres-backed payer, guardian and organization directories.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};

use clubledger_core::directory::{
    GuardianDirectory, OrganizationDirectory, OrganizationSettings, PayerDirectory, PayerProfile,
};
use clubledger_core::ledger::LedgerError;
use clubledger_shared::types::{OrganizationId, PayerId};

use crate::entities::{guardian_links, organization_settings, payers};
use crate::mapping::{db_error, payer_from_model, settings_from_model};

/// Directory lookups for the ledger service.
#[derive(Debug, Clone)]
pub struct PgDirectory {
    db: DatabaseConnection,
}

impl PgDirectory {
    /// Creates a new directory.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts or renames a payer.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn upsert_payer(&self, profile: &PayerProfile) -> Result<(), LedgerError> {
        let row = payers::ActiveModel {
            id: Set(profile.id.into_inner()),
            organization_id: Set(profile.organization_id.into_inner()),
            display_name: Set(profile.display_name.clone()),
            email: Set(profile.email.clone()),
            created_at: Set(Utc::now().into()),
        };
        payers::Entity::insert(row)
            .on_conflict(
                OnConflict::column(payers::Column::Id)
                    .update_columns([payers::Column::DisplayName, payers::Column::Email])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    /// Links a payee to a guardian. Linking twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or either payer is unknown.
    pub async fn link_guardian(
        &self,
        organization_id: OrganizationId,
        guardian_id: PayerId,
        payee_id: PayerId,
    ) -> Result<(), LedgerError> {
        let row = guardian_links::ActiveModel {
            guardian_id: Set(guardian_id.into_inner()),
            payee_id: Set(payee_id.into_inner()),
            organization_id: Set(organization_id.into_inner()),
            created_at: Set(Utc::now().into()),
        };
        guardian_links::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([guardian_links::Column::GuardianId, guardian_links::Column::PayeeId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    /// Inserts or replaces the settings of an organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn upsert_settings(&self, settings: &OrganizationSettings) -> Result<(), LedgerError> {
        let row = organization_settings::ActiveModel {
            organization_id: Set(settings.organization_id.into_inner()),
            currency: Set(settings.currency.to_string()),
            locale: Set(settings.locale.clone()),
            updated_at: Set(Utc::now().into()),
        };
        organization_settings::Entity::insert(row)
            .on_conflict(
                OnConflict::column(organization_settings::Column::OrganizationId)
                    .update_columns([
                        organization_settings::Column::Currency,
                        organization_settings::Column::Locale,
                        organization_settings::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(db_error)?;
        Ok(())
    }
}

#[async_trait]
impl PayerDirectory for PgDirectory {
    async fn find_payer(
        &self,
        organization_id: OrganizationId,
        payer_id: PayerId,
    ) -> Result<Option<PayerProfile>, LedgerError> {
        Ok(payers::Entity::find_by_id(payer_id.into_inner())
            .filter(payers::Column::OrganizationId.eq(organization_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_error)?
            .map(payer_from_model))
    }
}

#[async_trait]
impl GuardianDirectory for PgDirectory {
    async fn linked_payees(
        &self,
        organization_id: OrganizationId,
        guardian_id: PayerId,
    ) -> Result<Vec<PayerId>, LedgerError> {
        Ok(guardian_links::Entity::find()
            .filter(guardian_links::Column::OrganizationId.eq(organization_id.into_inner()))
            .filter(guardian_links::Column::GuardianId.eq(guardian_id.into_inner()))
            .order_by_asc(guardian_links::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(|link| link.payee_id.into())
            .collect())
    }
}

#[async_trait]
impl OrganizationDirectory for PgDirectory {
    async fn settings(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Option<OrganizationSettings>, LedgerError> {
        organization_settings::Entity::find_by_id(organization_id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_error)?
            .map(settings_from_model)
            .transpose()
    }
}
