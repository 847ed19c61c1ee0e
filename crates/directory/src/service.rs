//! The tenant directory service.
//!
//! Thin layer over [`LifecycleEngine`]: checks that every required request
//! field is present, case-folds names into their canonical form, delegates,
//! and maps storage errors onto [`DirectoryError`]. There is no local
//! recovery and no retry.

use std::sync::Arc;

use tenantry_persistence::core::{PartitionBackend, PartitionCatalog, TopologySnapshot};
use tenantry_persistence::error::{StorageError, ValidationError};
use tenantry_persistence::lifecycle::{LifecycleEngine, StructuralReceipt};
use tenantry_persistence::tenant::TenantName;
use tracing::{debug, info};

use crate::error::{DirectoryError, DirectoryResult};
use crate::requests::{
    OrganizationRequest, RenameOrganizationRequest, RenameSubunitRequest, ReparentRequest,
    SubunitRequest,
};
use crate::responses::{SubunitListing, TenantResponse};

/// Directory of organizations and sub-units over one backend.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use tenantry_directory::requests::{OrganizationRequest, SubunitRequest};
/// use tenantry_directory::TenantDirectory;
/// use tenantry_persistence::backends::memory::MemoryBackend;
///
/// # tokio_test::block_on(async {
/// let directory = TenantDirectory::new(Arc::new(MemoryBackend::new()));
///
/// let created = directory
///     .create_organization(&OrganizationRequest {
///         organization: "Acme".to_string(),
///     })
///     .await
///     .unwrap();
/// assert_eq!(created.organization, "acme");
///
/// directory
///     .create_subunit(&SubunitRequest {
///         organization: "acme".to_string(),
///         subunit: "north".to_string(),
///     })
///     .await
///     .unwrap();
/// assert_eq!(directory.list_organizations().await.unwrap(), vec!["acme"]);
/// # });
/// ```
pub struct TenantDirectory<B: PartitionBackend> {
    engine: LifecycleEngine<B>,
}

impl<B: PartitionBackend> Clone for TenantDirectory<B> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<B: PartitionBackend> TenantDirectory<B> {
    /// Creates a directory over a shared backend.
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            engine: LifecycleEngine::new(backend),
        }
    }

    /// Returns the lifecycle engine.
    pub fn engine(&self) -> &LifecycleEngine<B> {
        &self.engine
    }

    /// Returns the backend.
    pub fn backend(&self) -> &Arc<B> {
        self.engine.backend()
    }

    /// Creates the tenant schema and root table if they are missing.
    pub async fn initialize(&self) -> DirectoryResult<()> {
        self.backend()
            .initialize()
            .await
            .map_err(|e| DirectoryError::from(StorageError::from(e)))
    }

    /// Checks that the backend is reachable.
    pub async fn health_check(&self) -> DirectoryResult<()> {
        self.backend()
            .health_check()
            .await
            .map_err(|e| DirectoryError::from(StorageError::from(e)))
    }

    /// Lists every organization by display name.
    pub async fn list_organizations(&self) -> DirectoryResult<Vec<String>> {
        let layout = self.backend().layout();
        let roots = self.backend().list_roots().await?;
        Ok(roots
            .iter()
            .map(|qualified| layout.display_name(qualified))
            .collect())
    }

    /// Lists the sub-units of an organization, grouped by organization.
    ///
    /// An organization without sub-units is reported as not found, as is any
    /// name that is not an organization (including the root table).
    pub async fn list_subunits(
        &self,
        request: &OrganizationRequest,
    ) -> DirectoryResult<Vec<SubunitListing>> {
        let organization = required("organization", &request.organization)?;
        let layout = self.backend().layout();

        let qualified = layout.qualify(organization.as_str());
        if !self.backend().list_roots().await?.contains(&qualified) {
            return Err(DirectoryError::NotFound {
                message: format!("organization {} does not exist", organization),
            });
        }

        let mut listings: Vec<SubunitListing> = Vec::new();
        for edge in self.backend().list_children(&organization).await? {
            let parent = layout.display_name(&edge.parent);
            let child = layout.display_name(&edge.child);
            match listings
                .iter_mut()
                .find(|listing| listing.organization == parent)
            {
                Some(listing) => listing.subunits.push(child),
                None => listings.push(SubunitListing {
                    organization: parent,
                    subunits: vec![child],
                }),
            }
        }

        if listings.is_empty() {
            return Err(DirectoryError::NotFound {
                message: format!("no sub-units found for organization {}", organization),
            });
        }
        Ok(listings)
    }

    /// Returns every organization with its sub-units.
    pub async fn topology(&self) -> DirectoryResult<TopologySnapshot> {
        let backend = self.backend();
        Ok(TopologySnapshot::load(backend.as_ref(), backend.layout()).await?)
    }

    /// Creates an organization.
    pub async fn create_organization(
        &self,
        request: &OrganizationRequest,
    ) -> DirectoryResult<TenantResponse> {
        let organization = required("organization", &request.organization)?;
        let receipt = self.engine.create_organization(&organization).await?;
        committed(&receipt);
        Ok(TenantResponse::organization(organization.into_inner()))
    }

    /// Creates a sub-unit under an existing organization.
    pub async fn create_subunit(&self, request: &SubunitRequest) -> DirectoryResult<TenantResponse> {
        let organization = required("organization", &request.organization)?;
        let subunit = required("subunit", &request.subunit)?;
        let receipt = self.engine.create_subunit(&organization, &subunit).await?;
        committed(&receipt);
        Ok(TenantResponse::subunit(
            organization.into_inner(),
            subunit.into_inner(),
        ))
    }

    /// Deletes an organization with all of its sub-units and members.
    pub async fn delete_organization(
        &self,
        request: &OrganizationRequest,
    ) -> DirectoryResult<TenantResponse> {
        let organization = required("organization", &request.organization)?;
        let receipt = self.engine.delete_organization(&organization).await?;
        committed(&receipt);
        Ok(TenantResponse::organization(organization.into_inner()))
    }

    /// Deletes a sub-unit with all of its members.
    pub async fn delete_subunit(&self, request: &SubunitRequest) -> DirectoryResult<TenantResponse> {
        let organization = required("organization", &request.organization)?;
        let subunit = required("subunit", &request.subunit)?;
        let receipt = self.engine.delete_subunit(&organization, &subunit).await?;
        committed(&receipt);
        Ok(TenantResponse::subunit(
            organization.into_inner(),
            subunit.into_inner(),
        ))
    }

    /// Renames an organization. Returns the new name.
    pub async fn rename_organization(
        &self,
        request: &RenameOrganizationRequest,
    ) -> DirectoryResult<TenantResponse> {
        let old = required("old_organization", &request.old_organization)?;
        let new = required("new_organization", &request.new_organization)?;
        let receipt = self.engine.rename_organization(&old, &new).await?;
        committed(&receipt);
        Ok(TenantResponse::organization(new.into_inner()))
    }

    /// Renames a sub-unit. Returns the organization and the new sub-unit name.
    pub async fn rename_subunit(
        &self,
        request: &RenameSubunitRequest,
    ) -> DirectoryResult<TenantResponse> {
        let organization = required("organization", &request.organization)?;
        let old = required("old_subunit", &request.old_subunit)?;
        let new = required("new_subunit", &request.new_subunit)?;
        let receipt = self
            .engine
            .rename_subunit(&organization, &old, &new)
            .await?;
        committed(&receipt);
        Ok(TenantResponse::subunit(
            organization.into_inner(),
            new.into_inner(),
        ))
    }

    /// Turns a sub-unit into a standalone organization.
    ///
    /// Every field including `label` is required.
    pub async fn reparent_subunit_to_organization(
        &self,
        request: &ReparentRequest,
    ) -> DirectoryResult<TenantResponse> {
        let organization = required("organization", &request.organization)?;
        let subunit = required("subunit", &request.subunit)?;
        let new_organization = required("new_organization", &request.new_organization)?;
        let new_subunit = required("new_subunit", &request.new_subunit)?;
        let label = required("label", &request.label)?;

        let receipt = self
            .engine
            .reparent_subunit_as_organization(
                &organization,
                &subunit,
                &new_organization,
                &new_subunit,
                &label,
            )
            .await?;
        committed(&receipt);
        Ok(TenantResponse::subunit(
            new_organization.into_inner(),
            new_subunit.into_inner(),
        ))
    }

    /// Moves a sub-unit's members under a new organization and sub-unit,
    /// keeping the source organization.
    pub async fn reparent_organization_to_subunit(
        &self,
        request: &ReparentRequest,
    ) -> DirectoryResult<TenantResponse> {
        let organization = required("organization", &request.organization)?;
        let subunit = required("subunit", &request.subunit)?;
        let new_organization = required("new_organization", &request.new_organization)?;
        let new_subunit = required("new_subunit", &request.new_subunit)?;

        let receipt = self
            .engine
            .reparent_organization_under_subunit(
                &organization,
                &subunit,
                &new_organization,
                &new_subunit,
            )
            .await?;
        committed(&receipt);
        Ok(TenantResponse::subunit(
            new_organization.into_inner(),
            new_subunit.into_inner(),
        ))
    }
}

/// Checks a required field and folds it into a tenant name.
fn required(field: &str, value: &str) -> DirectoryResult<TenantName> {
    if value.trim().is_empty() {
        return Err(StorageError::from(ValidationError::MissingRequiredField {
            field: field.to_string(),
        })
        .into());
    }
    Ok(TenantName::parse(value)?)
}

fn committed(receipt: &StructuralReceipt) {
    info!(
        operation = %receipt.operation,
        steps = receipt.steps.len(),
        rows_copied = receipt.rows_copied(),
        "directory operation committed"
    );
    for report in &receipt.steps {
        debug!(
            step = report.step,
            label = %report.label,
            rows = report.rows_affected,
            "applied step"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantry_persistence::error::ErrorKind;

    #[test]
    fn test_required_rejects_blank() {
        let err = required("organization", "  ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(err.message().contains("organization"));
    }

    #[test]
    fn test_required_folds_case() {
        assert_eq!(required("organization", " Acme ").unwrap().as_str(), "acme");
    }

    #[test]
    fn test_required_rejects_bad_grammar() {
        let err = required("subunit", "north-east").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }
}
