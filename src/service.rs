//! Service layer API called by request handlers
use std::sync::Arc;

use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::consent::ConsentAccessContext;
use crate::error::EngineError;
use crate::lifecycle::SubmissionStatus;
use crate::port::{Deadline, RecordPort, SledPort};
use crate::redact::{self, Redact};
use crate::resources::{Account, Beneficiary, CallbackUrl, Transaction};
use crate::store::{ResourceStore, SubmissionStore, VersionedRecord};
use crate::submission::{Submission, SubmissionKind, SubmissionRequest, SubmitOutcome};
use crate::utils;
use crate::version::{ApiVersion, VersionRegistry};

pub const ACCOUNTS: &str = "accounts";
pub const BENEFICIARIES: &str = "beneficiaries";
pub const TRANSACTIONS: &str = "transactions";
pub const CALLBACK_URLS: &str = "callback-urls";

pub struct SubmissionService {
    config: EngineConfig,
    registry: Arc<VersionRegistry>,
    submissions: SubmissionStore,
    resources: ResourceStore,
}

impl SubmissionService {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self::with_parts(
            Arc::new(SledPort::new(instance)),
            Arc::new(SystemClock),
            EngineConfig::default(),
        )
    }

    /// Open the sled database named by the config.
    pub fn open(config: EngineConfig) -> anyhow::Result<Self> {
        let db = sled::open(&config.db_path)?;
        info!(path = %config.db_path.display(), "opened submission store");
        Ok(Self::with_parts(
            Arc::new(SledPort::new(Arc::new(db))),
            Arc::new(SystemClock),
            config,
        ))
    }

    pub fn with_parts(
        port: Arc<dyn RecordPort>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let registry = Arc::new(VersionRegistry::default());
        Self {
            submissions: SubmissionStore::new(
                port.clone(),
                clock.clone(),
                registry.clone(),
                config.idempotency_window,
            ),
            resources: ResourceStore::new(port, clock, registry.clone()),
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &VersionRegistry {
        &self.registry
    }

    fn deadline(&self) -> Deadline {
        Deadline::after(self.config.store_timeout)
    }

    fn authorise(&self, ctx: &ConsentAccessContext, account_id: &str) -> Result<(), EngineError> {
        if ctx.authorises(account_id) {
            return Ok(());
        }
        warn!(consent_id = ctx.consent_id(), account_id, "account outside consent");
        Err(EngineError::NotAuthorised {
            resource_id: account_id.to_string(),
        })
    }

    // Submissions

    pub fn submit(
        &self,
        ctx: &ConsentAccessContext,
        api_version: &str,
        request: &SubmissionRequest,
    ) -> Result<SubmitOutcome, EngineError> {
        let version = self.registry.parse(api_version)?;
        self.submissions
            .submit(ctx, version, request, &self.deadline())
    }

    pub fn get_submission(
        &self,
        ctx: &ConsentAccessContext,
        api_version: &str,
        id: &str,
    ) -> Result<Submission, EngineError> {
        let version = self.registry.parse(api_version)?;
        self.submissions
            .read(ctx.api_client_id(), id, version, &self.deadline())
    }

    pub fn list_submissions(
        &self,
        ctx: &ConsentAccessContext,
        api_version: &str,
        kind: SubmissionKind,
    ) -> Result<Vec<Submission>, EngineError> {
        let version = self.registry.parse(api_version)?;
        let submissions =
            self.submissions
                .list_for_owner(ctx.api_client_id(), kind, &self.deadline())?;
        Ok(submissions
            .into_iter()
            .filter(|s| self.registry.is_access_allowed(&version, &s.origin_version))
            .collect())
    }

    /// Called by the settlement back office, not by API clients.
    pub fn transition(
        &self,
        owner_scope: &str,
        id: &str,
        next: SubmissionStatus,
        reason: Option<String>,
    ) -> Result<Submission, EngineError> {
        self.submissions
            .transition(owner_scope, id, next, reason, &self.deadline())
    }

    // Account information

    /// Seed an account-information resource as the account servicer would.
    pub fn store_resource<T>(
        &self,
        collection: &str,
        id: &str,
        version: ApiVersion,
        body: T,
    ) -> Result<VersionedRecord<T>, EngineError>
    where
        T: minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()>,
    {
        self.resources
            .create(collection, id, version, body, &self.deadline())
    }

    fn read_redacted<T>(
        &self,
        ctx: &ConsentAccessContext,
        api_version: &str,
        collection: &str,
        account_id: &str,
    ) -> Result<T, EngineError>
    where
        T: Redact + minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()>,
    {
        let version = self.registry.parse(api_version)?;
        self.authorise(ctx, account_id)?;
        let body: T = self
            .resources
            .read(collection, account_id, version, &self.deadline())?;
        redact::redact(body, ctx.granted_permissions())
    }

    pub fn read_account(
        &self,
        ctx: &ConsentAccessContext,
        api_version: &str,
        account_id: &str,
    ) -> Result<Account, EngineError> {
        self.read_redacted(ctx, api_version, ACCOUNTS, account_id)
    }

    pub fn read_beneficiaries(
        &self,
        ctx: &ConsentAccessContext,
        api_version: &str,
        account_id: &str,
    ) -> Result<Vec<Beneficiary>, EngineError> {
        let version = self.registry.parse(api_version)?;
        self.authorise(ctx, account_id)?;
        let beneficiaries: Vec<Beneficiary> =
            self.resources
                .read(BENEFICIARIES, account_id, version, &self.deadline())?;
        redact::redact_all(beneficiaries, ctx.granted_permissions())
    }

    pub fn read_transactions(
        &self,
        ctx: &ConsentAccessContext,
        api_version: &str,
        account_id: &str,
    ) -> Result<Vec<Transaction>, EngineError> {
        let version = self.registry.parse(api_version)?;
        self.authorise(ctx, account_id)?;
        let transactions: Vec<Transaction> =
            self.resources
                .read(TRANSACTIONS, account_id, version, &self.deadline())?;
        redact::redact_all(transactions, ctx.granted_permissions())
    }

    // Callback URLs

    fn callback_key(api_client_id: &str, callback_url_id: &str) -> String {
        format!(
            "{}/{}",
            utils::key_segment(api_client_id),
            utils::key_segment(callback_url_id)
        )
    }

    pub fn register_callback(
        &self,
        api_client_id: &str,
        api_version: &str,
        url: &str,
    ) -> Result<CallbackUrl, EngineError> {
        let version = self.registry.parse(api_version)?;
        let callback_url_id =
            utils::new_uuid_to_bech32("cb").map_err(|e| EngineError::Identifier(e.to_string()))?;
        let callback = CallbackUrl {
            callback_url_id: callback_url_id.clone(),
            url: url.to_string(),
        };
        let record = self.resources.create(
            CALLBACK_URLS,
            &Self::callback_key(api_client_id, &callback_url_id),
            version,
            callback,
            &self.deadline(),
        )?;
        Ok(record.body)
    }

    pub fn read_callback(
        &self,
        api_client_id: &str,
        api_version: &str,
        callback_url_id: &str,
    ) -> Result<CallbackUrl, EngineError> {
        let version = self.registry.parse(api_version)?;
        self.resources.read(
            CALLBACK_URLS,
            &Self::callback_key(api_client_id, callback_url_id),
            version,
            &self.deadline(),
        )
    }

    pub fn update_callback(
        &self,
        api_client_id: &str,
        api_version: &str,
        callback_url_id: &str,
        url: &str,
    ) -> Result<VersionedRecord<CallbackUrl>, EngineError> {
        let version = self.registry.parse(api_version)?;
        self.resources.update(
            CALLBACK_URLS,
            &Self::callback_key(api_client_id, callback_url_id),
            version,
            |callback: CallbackUrl| CallbackUrl {
                url: url.to_string(),
                ..callback
            },
            &self.deadline(),
        )
    }

    pub fn delete_callback(
        &self,
        api_client_id: &str,
        api_version: &str,
        callback_url_id: &str,
    ) -> Result<(), EngineError> {
        let version = self.registry.parse(api_version)?;
        self.resources.delete::<CallbackUrl>(
            CALLBACK_URLS,
            &Self::callback_key(api_client_id, callback_url_id),
            version,
            &self.deadline(),
        )
    }
}
