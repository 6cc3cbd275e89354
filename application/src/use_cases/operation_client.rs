//! Operation client use case
//!
//! Builds the [`OperationContext`] and selection policy for each operation
//! kind and starts the conversation through the mediator. The client returns
//! as soon as the identify request is out; progress is reported to the
//! caller's event sink.
//!
//! | Operation | Default selection |
//! |-----------|-------------------|
//! | put file | all contributors |
//! | get file | fastest, or the named contributor |
//! | delete / replace file | the named contributor, or all |
//! | file ids / checksums / audit trails | all, or the named subset |

use crate::config::{ClientSettings, ConversationConfig};
use crate::engine::{Conversation, ConversationMediator, MediatorError, OperationContext};
use crate::ports::checksum::{ChecksumError, ChecksumProvider};
use crate::ports::event_sink::EventSink;
use crate::ports::message_bus::MessageSender;
use bitrelay_domain::{
    ChecksumAlgorithm, ChecksumData, ChecksumSpec, ContributorId, CorrelationId, OperationKind,
    OperationRequest, SelectionPolicy,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Operation {0} requires a file id")]
    MissingFileId(OperationKind),

    #[error("Contributor '{0}' is not part of collection '{1}'")]
    UnknownContributor(ContributorId, String),

    #[error("No contributors to address")]
    NoContributors,

    #[error("Invalid file address: {0}")]
    InvalidAddress(String),

    #[error("Checksum error: {0}")]
    Checksum(#[from] ChecksumError),

    #[error(transparent)]
    Mediator(#[from] MediatorError),
}

/// Input for storing a file.
#[derive(Debug, Clone)]
pub struct PutFileInput {
    pub file_id: String,
    /// Where contributors download the content from.
    pub file_address: String,
    pub file_size: u64,
    pub checksum_for_validation: Option<ChecksumData>,
    pub checksum_request: Option<ChecksumSpec>,
}

impl PutFileInput {
    pub fn new(file_id: impl Into<String>, file_address: impl Into<String>, file_size: u64) -> Self {
        Self {
            file_id: file_id.into(),
            file_address: file_address.into(),
            file_size,
            checksum_for_validation: None,
            checksum_request: None,
        }
    }

    pub fn with_checksum_for_validation(mut self, checksum: ChecksumData) -> Self {
        self.checksum_for_validation = Some(checksum);
        self
    }

    pub fn with_checksum_request(mut self, spec: ChecksumSpec) -> Self {
        self.checksum_request = Some(spec);
        self
    }
}

/// Input for deleting a file.
#[derive(Debug, Clone)]
pub struct DeleteFileInput {
    pub file_id: String,
    /// Delete at this contributor only; all contributors when `None`.
    pub contributor: Option<ContributorId>,
    pub checksum_for_validation: Option<ChecksumData>,
    pub checksum_request: Option<ChecksumSpec>,
}

impl DeleteFileInput {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            contributor: None,
            checksum_for_validation: None,
            checksum_request: None,
        }
    }

    pub fn at(mut self, contributor: ContributorId) -> Self {
        self.contributor = Some(contributor);
        self
    }

    pub fn with_checksum_for_validation(mut self, checksum: ChecksumData) -> Self {
        self.checksum_for_validation = Some(checksum);
        self
    }

    pub fn with_checksum_request(mut self, spec: ChecksumSpec) -> Self {
        self.checksum_request = Some(spec);
        self
    }
}

/// Input for replacing a file.
#[derive(Debug, Clone)]
pub struct ReplaceFileInput {
    pub file_id: String,
    /// Replace at this contributor only; all contributors when `None`.
    pub contributor: Option<ContributorId>,
    pub checksum_for_existing_file: ChecksumData,
    pub new_file_address: String,
    pub new_file_size: u64,
    pub checksum_for_new_file: Option<ChecksumData>,
    pub checksum_request: Option<ChecksumSpec>,
}

impl ReplaceFileInput {
    pub fn new(
        file_id: impl Into<String>,
        checksum_for_existing_file: ChecksumData,
        new_file_address: impl Into<String>,
        new_file_size: u64,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            contributor: None,
            checksum_for_existing_file,
            new_file_address: new_file_address.into(),
            new_file_size,
            checksum_for_new_file: None,
            checksum_request: None,
        }
    }

    pub fn at(mut self, contributor: ContributorId) -> Self {
        self.contributor = Some(contributor);
        self
    }

    pub fn with_checksum_for_new_file(mut self, checksum: ChecksumData) -> Self {
        self.checksum_for_new_file = Some(checksum);
        self
    }

    pub fn with_checksum_request(mut self, spec: ChecksumSpec) -> Self {
        self.checksum_request = Some(spec);
        self
    }
}

/// Scope of the listing operations (file ids, checksums, audit trails).
#[derive(Debug, Clone, Default)]
pub struct QueryScope {
    /// Restrict the answer to one file.
    pub file_id: Option<String>,
    /// Ask only these contributors; the whole collection when empty.
    pub contributors: Vec<ContributorId>,
}

impl QueryScope {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_file(mut self, file_id: impl Into<String>) -> Self {
        self.file_id = Some(file_id.into());
        self
    }

    pub fn at(mut self, contributors: Vec<ContributorId>) -> Self {
        self.contributors = contributors;
        self
    }
}

/// Starts operations against one collection.
pub struct OperationClient {
    settings: ClientSettings,
    config: ConversationConfig,
    mediator: Arc<ConversationMediator>,
    sender: Arc<dyn MessageSender>,
    checksums: Arc<dyn ChecksumProvider>,
}

impl OperationClient {
    pub fn new(
        settings: ClientSettings,
        config: ConversationConfig,
        mediator: Arc<ConversationMediator>,
        sender: Arc<dyn MessageSender>,
        checksums: Arc<dyn ChecksumProvider>,
    ) -> Self {
        Self {
            settings,
            config,
            mediator,
            sender,
            checksums,
        }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn mediator(&self) -> &Arc<ConversationMediator> {
        &self.mediator
    }

    // ==================== Modifying Operations ====================

    pub fn put_file(
        &self,
        input: PutFileInput,
        sink: Arc<dyn EventSink>,
    ) -> Result<Arc<Conversation>, ClientError> {
        let file_id = require_file_id(OperationKind::PutFile, input.file_id)?;
        require_address(&input.file_address)?;
        info!(
            "Putting file '{}' ({} bytes) from '{}'",
            file_id, input.file_size, input.file_address
        );
        let request = OperationRequest::PutFile {
            file_address: input.file_address,
            file_size: input.file_size,
            checksum_for_validation: input.checksum_for_validation,
            checksum_request: input.checksum_request,
        };
        self.start(request, Some(file_id), &[], SelectionPolicy::All, sink)
    }

    /// Stores `content`, computing its size and validation checksum.
    pub fn put_file_from_bytes(
        &self,
        file_id: impl Into<String>,
        file_address: impl Into<String>,
        content: &[u8],
        algorithm: ChecksumAlgorithm,
        sink: Arc<dyn EventSink>,
    ) -> Result<Arc<Conversation>, ClientError> {
        let checksum = self.checksums.checksum(algorithm, content)?;
        let input = PutFileInput::new(file_id, file_address, content.len() as u64)
            .with_checksum_for_validation(checksum)
            .with_checksum_request(ChecksumSpec::new(algorithm));
        self.put_file(input, sink)
    }

    pub fn delete_file(
        &self,
        input: DeleteFileInput,
        sink: Arc<dyn EventSink>,
    ) -> Result<Arc<Conversation>, ClientError> {
        let file_id = require_file_id(OperationKind::DeleteFile, input.file_id)?;
        let policy = self.target(input.contributor)?;
        info!("Deleting file '{}' ({} selection)", file_id, policy_name(&policy));
        let request = OperationRequest::DeleteFile {
            checksum_for_validation: input.checksum_for_validation,
            checksum_request: input.checksum_request,
        };
        self.start(request, Some(file_id), &[], policy, sink)
    }

    pub fn replace_file(
        &self,
        input: ReplaceFileInput,
        sink: Arc<dyn EventSink>,
    ) -> Result<Arc<Conversation>, ClientError> {
        let file_id = require_file_id(OperationKind::ReplaceFile, input.file_id)?;
        require_address(&input.new_file_address)?;
        let policy = self.target(input.contributor)?;
        info!(
            "Replacing file '{}' with '{}' ({} selection)",
            file_id,
            input.new_file_address,
            policy_name(&policy)
        );
        let request = OperationRequest::ReplaceFile {
            checksum_for_existing_file: Some(input.checksum_for_existing_file),
            new_file_address: input.new_file_address,
            new_file_size: input.new_file_size,
            checksum_for_new_file: input.checksum_for_new_file,
            checksum_request: input.checksum_request,
        };
        self.start(request, Some(file_id), &[], policy, sink)
    }

    /// Replaces a file with `content`, computing the new file's size and
    /// validation checksum with the algorithm of the existing checksum.
    pub fn replace_file_from_bytes(
        &self,
        file_id: impl Into<String>,
        contributor: Option<ContributorId>,
        checksum_for_existing_file: ChecksumData,
        new_file_address: impl Into<String>,
        content: &[u8],
        sink: Arc<dyn EventSink>,
    ) -> Result<Arc<Conversation>, ClientError> {
        let algorithm = checksum_for_existing_file.algorithm;
        let checksum = self.checksums.checksum(algorithm, content)?;
        let mut input = ReplaceFileInput::new(
            file_id,
            checksum_for_existing_file,
            new_file_address,
            content.len() as u64,
        )
        .with_checksum_for_new_file(checksum)
        .with_checksum_request(ChecksumSpec::new(algorithm));
        input.contributor = contributor;
        self.replace_file(input, sink)
    }

    // ==================== Retrieving Operations ====================

    /// Fetches a file, uploading it to `upload_address`.
    ///
    /// Without a named contributor the fastest one is chosen.
    pub fn get_file(
        &self,
        file_id: impl Into<String>,
        upload_address: impl Into<String>,
        contributor: Option<ContributorId>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Arc<Conversation>, ClientError> {
        let file_id = require_file_id(OperationKind::GetFile, file_id.into())?;
        let upload_address = upload_address.into();
        require_address(&upload_address)?;
        let policy = match contributor {
            Some(target) => {
                self.check_member(&target)?;
                SelectionPolicy::Specific(target)
            }
            None => SelectionPolicy::Fastest,
        };
        info!("Getting file '{}' ({} selection)", file_id, policy_name(&policy));
        let request = OperationRequest::GetFile {
            file_address: upload_address,
        };
        self.start(request, Some(file_id), &[], policy, sink)
    }

    pub fn get_file_ids(
        &self,
        scope: QueryScope,
        sink: Arc<dyn EventSink>,
    ) -> Result<Arc<Conversation>, ClientError> {
        self.query(OperationRequest::GetFileIds, scope, sink)
    }

    pub fn get_checksums(
        &self,
        checksum_spec: ChecksumSpec,
        scope: QueryScope,
        sink: Arc<dyn EventSink>,
    ) -> Result<Arc<Conversation>, ClientError> {
        self.query(OperationRequest::GetChecksums { checksum_spec }, scope, sink)
    }

    pub fn get_audit_trails(
        &self,
        min_sequence_number: Option<u64>,
        scope: QueryScope,
        sink: Arc<dyn EventSink>,
    ) -> Result<Arc<Conversation>, ClientError> {
        self.query(
            OperationRequest::GetAuditTrails {
                min_sequence_number,
            },
            scope,
            sink,
        )
    }

    /// Aborts a running operation with a `Failed` event.
    pub fn cancel(&self, correlation_id: &CorrelationId) -> bool {
        self.mediator
            .cancel(correlation_id, "Operation cancelled by the client")
    }

    // ==================== Helpers ====================

    fn query(
        &self,
        request: OperationRequest,
        scope: QueryScope,
        sink: Arc<dyn EventSink>,
    ) -> Result<Arc<Conversation>, ClientError> {
        for contributor in &scope.contributors {
            self.check_member(contributor)?;
        }
        info!("{} from {} contributor(s)", request.kind().action_name(), {
            if scope.contributors.is_empty() {
                self.settings.contributors.len()
            } else {
                scope.contributors.len()
            }
        });
        self.start(
            request,
            scope.file_id,
            &scope.contributors,
            SelectionPolicy::All,
            sink,
        )
    }

    /// Selection policy for an optional single target. The identify request
    /// still goes to the whole collection; the selector picks the target.
    fn target(&self, contributor: Option<ContributorId>) -> Result<SelectionPolicy, ClientError> {
        match contributor {
            Some(target) => {
                self.check_member(&target)?;
                Ok(SelectionPolicy::Specific(target))
            }
            None => Ok(SelectionPolicy::All),
        }
    }

    fn check_member(&self, contributor: &ContributorId) -> Result<(), ClientError> {
        if self.settings.contributors.contains(contributor) {
            Ok(())
        } else {
            Err(ClientError::UnknownContributor(
                contributor.clone(),
                self.settings.collection_id.clone(),
            ))
        }
    }

    /// Builds the context and starts the conversation. An empty `addressed`
    /// list means the whole collection.
    fn start(
        &self,
        request: OperationRequest,
        file_id: Option<String>,
        addressed: &[ContributorId],
        policy: SelectionPolicy,
        sink: Arc<dyn EventSink>,
    ) -> Result<Arc<Conversation>, ClientError> {
        let mut context = OperationContext::new(
            &self.settings,
            request,
            file_id,
            self.config.clone(),
            Arc::clone(&self.sender),
            sink,
        );
        if !addressed.is_empty() {
            context = context.with_contributors(addressed.to_vec());
        }
        if context.contributors.is_empty() {
            return Err(ClientError::NoContributors);
        }

        let selector = policy.build(&context.contributors);
        let conversation = self.mediator.start_conversation(context, selector)?;
        Ok(conversation)
    }
}

fn require_file_id(kind: OperationKind, file_id: String) -> Result<String, ClientError> {
    let trimmed = file_id.trim();
    if trimmed.is_empty() {
        return Err(ClientError::MissingFileId(kind));
    }
    Ok(trimmed.to_string())
}

fn require_address(address: &str) -> Result<(), ClientError> {
    if address.trim().is_empty() {
        return Err(ClientError::InvalidAddress("address is empty".to_string()));
    }
    Ok(())
}

fn policy_name(policy: &SelectionPolicy) -> &'static str {
    match policy {
        SelectionPolicy::All => "all",
        SelectionPolicy::Specific(_) => "specific",
        SelectionPolicy::Fastest => "fastest",
    }
}
