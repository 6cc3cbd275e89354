//! Reference contributor answering the protocol from an in-memory store.
//!
//! A [`SimulatedContributor`] listens on two destinations: the collection
//! broadcast, where identify requests arrive, and its own queue, which it
//! advertises as reply-to address in every identify reply and where the
//! operation requests arrive.
//!
//! ```text
//!  client ──IdentifyRequest──▶ <collection>-topic ──▶ contributor
//!  client ◀──IdentifyResponse (reply_to = <id>-queue)─┘
//!  client ──OperationRequest──▶ <id>-queue ──▶ contributor
//!  client ◀──ProgressResponse, FinalResponse──────────┘
//! ```
//!
//! Behaviour can be switched per contributor to exercise the client's
//! failure paths: refusing or ignoring identification, failing or ignoring
//! operations, and delaying replies.

use super::exchange::InMemoryFileExchange;
use crate::checksum::Sha2ChecksumProvider;
use bitrelay_application::{MessageBus, MessageListener, MessageSender};
use bitrelay_domain::{
    AuditTrailEvent, ChecksumData, ChecksumSpec, ContributorId, FileChecksum, Message,
    MessageBody, OperationKind, OperationRequest, OperationResult, PROTOCOL_VERSION,
    ResponseCode, ResponseInfo,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, trace, warn};

/// How a contributor answers identify requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentifyBehaviour {
    /// Answer positively when able to perform the operation.
    #[default]
    Answer,
    /// Always answer negatively.
    Refuse,
    /// Never answer.
    Silent,
}

/// How a contributor handles operation requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationBehaviour {
    #[default]
    Perform,
    /// Answer with a final reply carrying this code.
    Fail(ResponseCode),
    /// Never answer.
    Silent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributorBehaviour {
    pub identify: IdentifyBehaviour,
    pub operation: OperationBehaviour,
    /// Delivery estimate advertised in identify replies.
    pub time_to_deliver: Option<Duration>,
    /// Delay before every reply is sent.
    pub reply_delay: Duration,
    /// Send an accepted-progress reply before the final reply.
    pub send_progress: bool,
}

impl Default for ContributorBehaviour {
    fn default() -> Self {
        Self {
            identify: IdentifyBehaviour::default(),
            operation: OperationBehaviour::default(),
            time_to_deliver: None,
            reply_delay: Duration::ZERO,
            send_progress: true,
        }
    }
}

impl ContributorBehaviour {
    pub fn with_identify(mut self, identify: IdentifyBehaviour) -> Self {
        self.identify = identify;
        self
    }

    pub fn with_operation(mut self, operation: OperationBehaviour) -> Self {
        self.operation = operation;
        self
    }

    pub fn with_time_to_deliver(mut self, time_to_deliver: Duration) -> Self {
        self.time_to_deliver = Some(time_to_deliver);
        self
    }

    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }

    pub fn with_progress(mut self, send_progress: bool) -> Self {
        self.send_progress = send_progress;
        self
    }
}

#[derive(Debug, Default)]
struct FileStore {
    files: BTreeMap<String, Vec<u8>>,
    audit: Vec<AuditTrailEvent>,
    next_sequence: u64,
}

impl FileStore {
    fn audit(&mut self, file_id: Option<&str>, actor: &str, action: &str) {
        self.next_sequence += 1;
        self.audit.push(AuditTrailEvent {
            sequence_number: self.next_sequence,
            file_id: file_id.map(str::to_string),
            actor: actor.to_string(),
            action: action.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn get(&self, file_id: &str) -> Result<&Vec<u8>, ResponseInfo> {
        self.files.get(file_id).ok_or_else(|| {
            ResponseInfo::new(ResponseCode::FileNotFound)
                .with_text(format!("File '{}' is not present", file_id))
        })
    }

    /// File ids the request covers: the filtered file, or every file.
    fn scope(&self, file_filter: Option<&str>) -> Result<Vec<String>, ResponseInfo> {
        match file_filter {
            Some(file_id) => {
                self.get(file_id)?;
                Ok(vec![file_id.to_string()])
            }
            None => Ok(self.files.keys().cloned().collect()),
        }
    }
}

fn checksum_of(spec: &ChecksumSpec, content: &[u8]) -> ChecksumData {
    ChecksumData::new(
        spec.algorithm,
        Sha2ChecksumProvider::digest(spec.algorithm, content),
    )
    .calculated_now()
}

fn verify(expected: &ChecksumData, content: &[u8], code: ResponseCode) -> Result<(), ResponseInfo> {
    let actual = checksum_of(&ChecksumSpec::new(expected.algorithm), content);
    if actual.matches(expected) {
        Ok(())
    } else {
        Err(ResponseInfo::new(code).with_text(format!(
            "Expected {} checksum {}, calculated {}",
            expected.algorithm, expected.value, actual.value
        )))
    }
}

pub struct SimulatedContributor {
    id: ContributorId,
    collection_id: String,
    destination: String,
    sender: Arc<dyn MessageSender>,
    exchange: Arc<InMemoryFileExchange>,
    behaviour: RwLock<ContributorBehaviour>,
    store: Mutex<FileStore>,
    received: Mutex<Vec<Message>>,
    runtime: Handle,
}

impl SimulatedContributor {
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(
        id: ContributorId,
        collection_id: impl Into<String>,
        sender: Arc<dyn MessageSender>,
        exchange: Arc<InMemoryFileExchange>,
    ) -> Arc<Self> {
        let destination = format!("{}-queue", id);
        Arc::new(Self {
            id,
            collection_id: collection_id.into(),
            destination,
            sender,
            exchange,
            behaviour: RwLock::new(ContributorBehaviour::default()),
            store: Mutex::new(FileStore::default()),
            received: Mutex::new(Vec::new()),
            runtime: Handle::current(),
        })
    }

    /// Subscribe to the collection broadcast and the contributor's own queue.
    pub fn attach(self: &Arc<Self>, bus: &dyn MessageBus, collection_destination: &str) {
        let listener: Arc<dyn MessageListener> = self.clone();
        bus.add_listener(collection_destination, Arc::clone(&listener));
        bus.add_listener(&self.destination, listener);
        debug!(
            "Contributor {} listening on '{}' and '{}'",
            self.id, collection_destination, self.destination
        );
    }

    pub fn detach(self: &Arc<Self>, bus: &dyn MessageBus, collection_destination: &str) {
        let listener: Arc<dyn MessageListener> = self.clone();
        bus.remove_listener(collection_destination, &listener);
        bus.remove_listener(&self.destination, &listener);
    }

    pub fn id(&self) -> &ContributorId {
        &self.id
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn behaviour(&self) -> ContributorBehaviour {
        self.behaviour
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_behaviour(&self, behaviour: ContributorBehaviour) {
        *self.behaviour.write().unwrap_or_else(|e| e.into_inner()) = behaviour;
    }

    // ==================== Store Access ====================

    /// Seed a file without going through the protocol.
    pub fn store_file(&self, file_id: impl Into<String>, content: impl Into<Vec<u8>>) {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store.files.insert(file_id.into(), content.into());
    }

    pub fn has_file(&self, file_id: &str) -> bool {
        let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store.files.contains_key(file_id)
    }

    pub fn file(&self, file_id: &str) -> Option<Vec<u8>> {
        let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store.files.get(file_id).cloned()
    }

    pub fn file_ids(&self) -> Vec<String> {
        let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store.files.keys().cloned().collect()
    }

    /// Every message delivered to this contributor, in arrival order.
    pub fn received(&self) -> Vec<Message> {
        self.received
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of operation requests addressed to this contributor.
    pub fn operation_requests(&self) -> usize {
        self.received()
            .iter()
            .filter(|m| matches!(m.body, MessageBody::OperationRequest { .. }))
            .count()
    }

    // ==================== Protocol Handling ====================

    fn handle_identify(
        &self,
        message: &Message,
        operation: OperationKind,
        file_id: Option<&str>,
    ) {
        let behaviour = self.behaviour();
        let response_info = match behaviour.identify {
            IdentifyBehaviour::Silent => {
                trace!("[{}] {} ignores identify request", message.correlation_id.short(), self.id);
                return;
            }
            IdentifyBehaviour::Refuse => {
                ResponseInfo::negative_identification("Identification refused")
            }
            IdentifyBehaviour::Answer => self.identification(operation, file_id),
        };

        let body = MessageBody::IdentifyResponse {
            operation,
            contributor_id: self.id.clone(),
            response_info: Some(response_info),
            time_to_deliver_ms: behaviour
                .time_to_deliver
                .map(|d| d.as_millis() as u64),
        };
        let reply = self.reply(message, body);
        self.dispatch(vec![reply], behaviour.reply_delay);
    }

    /// Whether this contributor can take part in `operation`.
    fn identification(&self, operation: OperationKind, file_id: Option<&str>) -> ResponseInfo {
        let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let present = file_id.is_some_and(|id| store.files.contains_key(id));
        match operation {
            OperationKind::PutFile if present => {
                ResponseInfo::negative_identification("File already exists")
            }
            OperationKind::GetFile | OperationKind::DeleteFile | OperationKind::ReplaceFile
                if !present =>
            {
                ResponseInfo::negative_identification("File not found")
            }
            _ => ResponseInfo::positive_identification(),
        }
    }

    fn handle_operation(
        &self,
        message: &Message,
        file_id: Option<&str>,
        request: &OperationRequest,
    ) {
        let behaviour = self.behaviour();
        let operation = request.kind();
        let short = message.correlation_id.short();

        let (response_info, result) = match behaviour.operation {
            OperationBehaviour::Silent => {
                trace!("[{}] {} ignores {} request", short, self.id, operation);
                return;
            }
            OperationBehaviour::Fail(code) => (
                ResponseInfo::new(code).with_text("Simulated failure"),
                None,
            ),
            OperationBehaviour::Perform => match self.perform(&message.from, file_id, request) {
                Ok(result) => {
                    info!("[{}] {} performed {}", short, self.id, operation);
                    (ResponseInfo::completed(), result)
                }
                Err(info) => {
                    warn!("[{}] {} could not perform {}: {}", short, self.id, operation, info.describe());
                    (info, None)
                }
            },
        };

        let mut replies = Vec::with_capacity(2);
        if behaviour.send_progress {
            replies.push(self.reply(
                message,
                MessageBody::ProgressResponse {
                    operation,
                    contributor_id: self.id.clone(),
                    response_info: Some(
                        ResponseInfo::new(ResponseCode::OperationAcceptedProgress)
                            .with_text(format!("{} accepted", operation.action_name())),
                    ),
                },
            ));
        }
        replies.push(self.reply(
            message,
            MessageBody::FinalResponse {
                operation,
                contributor_id: self.id.clone(),
                response_info: Some(response_info),
                result,
            },
        ));
        self.dispatch(replies, behaviour.reply_delay);
    }

    /// Executes one operation against the store.
    fn perform(
        &self,
        actor: &str,
        file_id: Option<&str>,
        request: &OperationRequest,
    ) -> Result<Option<OperationResult>, ResponseInfo> {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let required = || {
            file_id.ok_or_else(|| {
                ResponseInfo::new(ResponseCode::RequestNotUnderstood).with_text("No file id given")
            })
        };

        match request {
            OperationRequest::PutFile {
                file_address,
                file_size,
                checksum_for_validation,
                checksum_request,
            } => {
                let file_id = required()?;
                if store.files.contains_key(file_id) {
                    return Err(ResponseInfo::new(ResponseCode::DuplicateFileFailure)
                        .with_text("File is already stored"));
                }
                let content = self.download(file_address, Some(*file_size))?;
                if let Some(expected) = checksum_for_validation {
                    verify(expected, &content, ResponseCode::NewFileChecksumFailure)?;
                }
                let checksum = checksum_request.as_ref().map(|spec| checksum_of(spec, &content));
                store.files.insert(file_id.to_string(), content);
                store.audit(Some(file_id), actor, "PUT_FILE");
                Ok(Some(OperationResult::PutFile { checksum }))
            }
            OperationRequest::GetFile { file_address } => {
                let file_id = required()?;
                let content = store.get(file_id)?.clone();
                if !InMemoryFileExchange::is_exchange_address(file_address) {
                    return Err(transfer_failure(file_address));
                }
                self.exchange.upload(file_address, content);
                store.audit(Some(file_id), actor, "GET_FILE");
                Ok(Some(OperationResult::GetFile {
                    file_address: file_address.clone(),
                }))
            }
            OperationRequest::DeleteFile {
                checksum_for_validation,
                checksum_request,
            } => {
                let file_id = required()?;
                let content = store.get(file_id)?;
                if let Some(expected) = checksum_for_validation {
                    verify(expected, content, ResponseCode::ExistingFileChecksumFailure)?;
                }
                let checksum = checksum_request.as_ref().map(|spec| checksum_of(spec, content));
                store.files.remove(file_id);
                store.audit(Some(file_id), actor, "DELETE_FILE");
                Ok(Some(OperationResult::DeleteFile { checksum }))
            }
            OperationRequest::ReplaceFile {
                checksum_for_existing_file,
                new_file_address,
                new_file_size,
                checksum_for_new_file,
                checksum_request,
            } => {
                let file_id = required()?;
                let existing = store.get(file_id)?;
                if let Some(expected) = checksum_for_existing_file {
                    verify(expected, existing, ResponseCode::ExistingFileChecksumFailure)?;
                }
                let content = self.download(new_file_address, Some(*new_file_size))?;
                if let Some(expected) = checksum_for_new_file {
                    verify(expected, &content, ResponseCode::NewFileChecksumFailure)?;
                }
                let checksum = checksum_request.as_ref().map(|spec| checksum_of(spec, &content));
                store.files.insert(file_id.to_string(), content);
                store.audit(Some(file_id), actor, "REPLACE_FILE");
                Ok(Some(OperationResult::ReplaceFile { checksum }))
            }
            OperationRequest::GetFileIds => {
                let file_ids = store.scope(file_id)?;
                Ok(Some(OperationResult::GetFileIds { file_ids }))
            }
            OperationRequest::GetChecksums { checksum_spec } => {
                let checksums = store
                    .scope(file_id)?
                    .into_iter()
                    .filter_map(|id| {
                        let content = store.files.get(&id)?;
                        Some(FileChecksum {
                            checksum: checksum_of(checksum_spec, content),
                            file_id: id,
                        })
                    })
                    .collect();
                Ok(Some(OperationResult::GetChecksums { checksums }))
            }
            OperationRequest::GetAuditTrails {
                min_sequence_number,
            } => {
                let min = min_sequence_number.unwrap_or(0);
                let events = store
                    .audit
                    .iter()
                    .filter(|e| e.sequence_number >= min)
                    .filter(|e| file_id.is_none() || e.file_id.as_deref() == file_id)
                    .cloned()
                    .collect();
                Ok(Some(OperationResult::GetAuditTrails { events }))
            }
        }
    }

    fn download(&self, address: &str, expected_size: Option<u64>) -> Result<Vec<u8>, ResponseInfo> {
        let content = self
            .exchange
            .download(address)
            .ok_or_else(|| transfer_failure(address))?;
        if let Some(size) = expected_size
            && size != content.len() as u64
        {
            return Err(ResponseInfo::new(ResponseCode::FileTransferFailure).with_text(format!(
                "Expected {} bytes at '{}', found {}",
                size,
                address,
                content.len()
            )));
        }
        Ok(content)
    }

    /// Reply to `message`, advertising the contributor's own queue.
    fn reply(&self, message: &Message, body: MessageBody) -> Message {
        let mut reply = message.reply(self.id.as_str(), body);
        reply.reply_to = self.destination.clone();
        reply.collection_id = self.collection_id.clone();
        reply
    }

    fn dispatch(&self, messages: Vec<Message>, delay: Duration) {
        if delay.is_zero() {
            for message in messages {
                self.sender.send(message);
            }
            return;
        }
        let sender = Arc::clone(&self.sender);
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            for message in messages {
                sender.send(message);
            }
        });
    }
}

fn transfer_failure(address: &str) -> ResponseInfo {
    ResponseInfo::new(ResponseCode::FileTransferFailure)
        .with_text(format!("Nothing to transfer at '{}'", address))
}

impl MessageListener for SimulatedContributor {
    fn on_message(&self, message: Message) {
        if message.collection_id != self.collection_id {
            debug!(
                "[{}] {} ignores message for collection '{}'",
                message.correlation_id.short(),
                self.id,
                message.collection_id
            );
            return;
        }
        self.received
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());

        match &message.body {
            MessageBody::IdentifyRequest {
                operation,
                file_id,
                min_version,
                ..
            } => {
                if *min_version > PROTOCOL_VERSION {
                    warn!(
                        "[{}] {} cannot speak protocol version {}",
                        message.correlation_id.short(),
                        self.id,
                        min_version
                    );
                    return;
                }
                self.handle_identify(&message, *operation, file_id.as_deref());
            }
            MessageBody::OperationRequest {
                contributor_id,
                file_id,
                request,
                ..
            } if *contributor_id == self.id => {
                self.handle_operation(&message, file_id.as_deref(), request);
            }
            other => trace!(
                "[{}] {} ignores {}",
                message.correlation_id.short(),
                self.id,
                other.type_name()
            ),
        }
    }
}

impl std::fmt::Debug for SimulatedContributor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedContributor")
            .field("id", &self.id)
            .field("collection_id", &self.collection_id)
            .field("destination", &self.destination)
            .finish()
    }
}
