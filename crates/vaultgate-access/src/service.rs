//! # OAuth Service Registry
//!
//! Services register once and receive a [`ServiceCapability`]. Client ids
//! are not unique, so lookups by client id return every match.

use std::collections::BTreeSet;
use std::sync::Arc;

use vaultgate_core::{AccessKind, Address, ServiceId, ValidationError};
use vaultgate_ledger::{load, Authority, Guard, Ledger, LedgerRecord, Transaction};

use crate::error::{wrong_target, AccessError};
use crate::records::{OAuthService, ServiceCapability};

/// Maximum length of a client id or redirect URL.
pub const MAX_SERVICE_FIELD_LEN: usize = 2048;

/// Inputs for registering a service.
#[derive(Debug, Clone)]
pub struct NewService {
    /// OAuth client id.
    pub client_id: String,
    /// Redirect URL after authorization.
    pub redirect_url: String,
    /// Requested access kinds; empty means unrestricted.
    pub resource_kinds: BTreeSet<AccessKind>,
}

/// Changes to a registered service. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ServiceUpdate {
    /// New redirect URL.
    pub redirect_url: Option<String>,
    /// New requested kinds.
    pub resource_kinds: Option<BTreeSet<AccessKind>>,
}

/// Service registration over the ledger.
#[derive(Clone)]
pub struct ServiceRegistry {
    ledger: Arc<dyn Ledger>,
}

impl ServiceRegistry {
    /// Create a registry over `ledger`.
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Register a service operated by `operator`. The operator's address is
    /// the one placed on allow-lists when grants are issued to it.
    pub async fn register_service(
        &self,
        operator: &Address,
        new_service: NewService,
    ) -> Result<(OAuthService, ServiceCapability), AccessError> {
        let service = OAuthService {
            id: ServiceId::new(),
            client_id: validate_field("client_id", &new_service.client_id)?,
            owner: operator.clone(),
            redirect_url: validate_redirect(&new_service.redirect_url)?,
            resource_kinds: new_service.resource_kinds,
            created_at: self.ledger.now().await?,
        };
        let cap = ServiceCapability::mint(service.id);

        let mut tx = Transaction::new(operator.clone());
        tx.create(&cap, Guard::Holder(operator.clone()))?;
        tx.create(&service, Guard::Capability(cap.id.object_id()))?;
        self.ledger.execute(tx).await?;

        tracing::info!(service = %service.id, client_id = %service.client_id, "service registered");
        Ok((service, cap))
    }

    /// Change a service's redirect URL or requested kinds.
    pub async fn update_service(
        &self,
        caller: &Address,
        cap: &ServiceCapability,
        service_id: ServiceId,
        update: ServiceUpdate,
    ) -> Result<(), AccessError> {
        if !cap.governs(&service_id) {
            return Err(wrong_target("service", cap.id, service_id));
        }
        let redirect_url = update.redirect_url.as_deref().map(validate_redirect).transpose()?;
        let resource_kinds = update.resource_kinds;

        let mut tx = Transaction::new(caller.clone());
        tx.update::<OAuthService, _>(service_id, Authority::Capability(cap.id.object_id()), move |svc| {
            if let Some(url) = redirect_url {
                svc.redirect_url = url;
            }
            if let Some(kinds) = resource_kinds {
                svc.resource_kinds = kinds;
            }
            Ok(())
        });
        self.ledger.execute(tx).await?;
        tracing::info!(service = %service_id, "service updated");
        Ok(())
    }

    /// Delete a service and burn its capability. Issued grants survive
    /// until they expire or are revoked.
    pub async fn delete_service(
        &self,
        caller: &Address,
        cap: &ServiceCapability,
        service_id: ServiceId,
    ) -> Result<(), AccessError> {
        if !cap.governs(&service_id) {
            return Err(wrong_target("service", cap.id, service_id));
        }
        let mut tx = Transaction::new(caller.clone());
        tx.delete::<OAuthService>(service_id, Authority::Capability(cap.id.object_id()));
        tx.delete::<ServiceCapability>(cap.id, Authority::Sender);
        self.ledger.execute(tx).await?;
        tracing::info!(service = %service_id, "service deleted");
        Ok(())
    }

    /// Read a service.
    pub async fn get_service(&self, service_id: ServiceId) -> Result<OAuthService, AccessError> {
        Ok(load(self.ledger.as_ref(), service_id).await?)
    }

    /// Every service registered under `client_id`.
    pub async fn find_services_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Vec<OAuthService>, AccessError> {
        let mut found = Vec::new();
        for object in self.ledger.objects_of_kind(OAuthService::KIND).await? {
            let service: OAuthService = object.decode()?;
            if service.client_id == client_id {
                found.push(service);
            }
        }
        found.sort_by_key(|s| s.created_at);
        Ok(found)
    }
}

fn validate_field(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::EmptyField { field });
    }
    if value.len() > MAX_SERVICE_FIELD_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_SERVICE_FIELD_LEN,
        });
    }
    Ok(value.to_string())
}

fn validate_redirect(value: &str) -> Result<String, ValidationError> {
    let value = validate_field("redirect_url", value)?;
    if !(value.starts_with("https://") || value.starts_with("http://")) {
        return Err(ValidationError::Malformed {
            field: "redirect_url",
            reason: "must be an http(s) URL".into(),
        });
    }
    Ok(value)
}
