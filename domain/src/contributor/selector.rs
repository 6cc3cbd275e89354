//! Component selection policies for the identification phase.
//!
//! A selector consumes identify replies, decides which contributors take
//! part in the execution phase and reports when identification is finished.
//!
//! # Policies
//!
//! | Policy | Selects |
//! |--------|---------|
//! | [`AllContributorsSelector`] | every positively identifying contributor |
//! | [`SpecificContributorSelector`] | one named contributor, if it identifies positively |
//! | [`FastestContributorSelector`] | the positive contributor with the smallest delivery estimate |

use super::selected::SelectedContributor;
use super::tracker::ResponseTracker;
use crate::core::error::ConversationError;
use crate::core::ids::ContributorId;
use crate::message::{Message, MessageBody, ResponseCode, ResponseInfo};
use serde::{Deserialize, Serialize};

/// One identify reply, as seen by a selector.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifyReply {
    pub contributor_id: ContributorId,
    pub response_info: Option<ResponseInfo>,
    pub time_to_deliver_ms: Option<u64>,
    /// Where the contributor wants its execution request.
    pub reply_to: String,
}

impl IdentifyReply {
    pub fn new(contributor_id: ContributorId, reply_to: impl Into<String>) -> Self {
        Self {
            contributor_id,
            response_info: None,
            time_to_deliver_ms: None,
            reply_to: reply_to.into(),
        }
    }

    pub fn positive(contributor_id: ContributorId, reply_to: impl Into<String>) -> Self {
        Self::new(contributor_id, reply_to).with_info(ResponseInfo::positive_identification())
    }

    pub fn negative(contributor_id: ContributorId, reply_to: impl Into<String>) -> Self {
        Self::new(contributor_id, reply_to)
            .with_info(ResponseInfo::negative_identification("not available"))
    }

    pub fn with_info(mut self, info: ResponseInfo) -> Self {
        self.response_info = Some(info);
        self
    }

    pub fn with_time_to_deliver(mut self, millis: u64) -> Self {
        self.time_to_deliver_ms = Some(millis);
        self
    }

    /// Extracts the reply from an `IdentifyResponse` message.
    pub fn from_message(message: &Message) -> Option<Self> {
        match &message.body {
            MessageBody::IdentifyResponse {
                contributor_id,
                response_info,
                time_to_deliver_ms,
                ..
            } => Some(Self {
                contributor_id: contributor_id.clone(),
                response_info: response_info.clone(),
                time_to_deliver_ms: *time_to_deliver_ms,
                reply_to: message.reply_to.clone(),
            }),
            _ => None,
        }
    }

    /// Validates the response code of an identify reply.
    ///
    /// Returns whether the identification is positive. Negative
    /// identifications and failure codes both count as a negative answer;
    /// progress and completion codes have no meaning here.
    fn identification(&self) -> Result<bool, ConversationError> {
        let code = self
            .response_info
            .as_ref()
            .map(|info| info.response_code)
            .ok_or_else(|| ConversationError::missing_response_code(self.contributor_id.clone()))?;
        match code {
            ResponseCode::IdentificationPositive => Ok(true),
            other if other.is_progress() || other.is_success() => Err(
                ConversationError::unexpected_code(self.contributor_id.clone(), other),
            ),
            _ => Ok(false),
        }
    }

    fn selection(&self) -> SelectedContributor {
        SelectedContributor::new(self.contributor_id.clone(), self.reply_to.clone())
    }
}

/// Decides which contributors the execution phase targets.
pub trait ComponentSelector: Send + std::fmt::Debug {
    /// Consumes one identify reply.
    ///
    /// Reply-level errors only invalidate this reply; the phase continues.
    fn process_reply(&mut self, reply: &IdentifyReply) -> Result<(), ConversationError>;

    /// Whether every contributor the selector waits for has answered.
    ///
    /// Finishing with nobody selected is reported as
    /// [`ConversationError::NoSuitableContributor`].
    fn is_finished(&self) -> Result<bool, ConversationError>;

    /// Contributors selected so far, in selection order.
    fn selected(&self) -> &[SelectedContributor];

    /// Contributors still expected to answer.
    fn outstanding(&self) -> Vec<ContributorId>;

    /// Contributors the identify request was addressed to.
    fn candidates(&self) -> &[ContributorId];

    fn name(&self) -> &'static str;

    fn has_selection(&self) -> bool {
        !self.selected().is_empty()
    }

    fn selected_ids(&self) -> Vec<ContributorId> {
        self.selected()
            .iter()
            .map(|s| s.contributor_id.clone())
            .collect()
    }
}

fn finished(
    tracker: &ResponseTracker,
    selected: &[SelectedContributor],
    candidates: &[ContributorId],
) -> Result<bool, ConversationError> {
    if !tracker.all_responded() {
        return Ok(false);
    }
    if selected.is_empty() {
        return Err(ConversationError::NoSuitableContributor {
            candidates: candidates.to_vec(),
        });
    }
    Ok(true)
}

/// Selects every contributor that identifies positively.
#[derive(Debug, Clone)]
pub struct AllContributorsSelector {
    tracker: ResponseTracker,
    selected: Vec<SelectedContributor>,
}

impl AllContributorsSelector {
    pub fn new(expected: impl IntoIterator<Item = ContributorId>) -> Self {
        Self {
            tracker: ResponseTracker::new(expected),
            selected: Vec::new(),
        }
    }
}

impl ComponentSelector for AllContributorsSelector {
    fn process_reply(&mut self, reply: &IdentifyReply) -> Result<(), ConversationError> {
        let positive = reply.identification()?;
        self.tracker.record(&reply.contributor_id)?;
        if positive {
            self.selected.push(reply.selection());
        }
        Ok(())
    }

    fn is_finished(&self) -> Result<bool, ConversationError> {
        finished(&self.tracker, &self.selected, self.tracker.expected())
    }

    fn selected(&self) -> &[SelectedContributor] {
        &self.selected
    }

    fn outstanding(&self) -> Vec<ContributorId> {
        self.tracker.outstanding()
    }

    fn candidates(&self) -> &[ContributorId] {
        self.tracker.expected()
    }

    fn name(&self) -> &'static str {
        "all"
    }
}

/// Selects a single named contributor, ignoring positive answers from the
/// other addressed contributors.
#[derive(Debug, Clone)]
pub struct SpecificContributorSelector {
    target: ContributorId,
    addressed: Vec<ContributorId>,
    tracker: ResponseTracker,
    selected: Vec<SelectedContributor>,
}

impl SpecificContributorSelector {
    /// `addressed` is the full set the identify request went to; only
    /// `target` is waited for.
    pub fn new(target: ContributorId, addressed: impl IntoIterator<Item = ContributorId>) -> Self {
        let mut addressed: Vec<ContributorId> = addressed.into_iter().collect();
        if !addressed.contains(&target) {
            addressed.push(target.clone());
        }
        Self {
            tracker: ResponseTracker::new([target.clone()]),
            target,
            addressed,
            selected: Vec::new(),
        }
    }

    pub fn target(&self) -> &ContributorId {
        &self.target
    }
}

impl ComponentSelector for SpecificContributorSelector {
    fn process_reply(&mut self, reply: &IdentifyReply) -> Result<(), ConversationError> {
        if reply.contributor_id != self.target {
            if self.addressed.contains(&reply.contributor_id) {
                return Ok(());
            }
            return Err(ConversationError::unsolicited(reply.contributor_id.clone()));
        }
        let positive = reply.identification()?;
        self.tracker.record(&reply.contributor_id)?;
        if positive {
            self.selected.push(reply.selection());
        }
        Ok(())
    }

    fn is_finished(&self) -> Result<bool, ConversationError> {
        finished(&self.tracker, &self.selected, self.tracker.expected())
    }

    fn selected(&self) -> &[SelectedContributor] {
        &self.selected
    }

    fn outstanding(&self) -> Vec<ContributorId> {
        self.tracker.outstanding()
    }

    fn candidates(&self) -> &[ContributorId] {
        &self.addressed
    }

    fn name(&self) -> &'static str {
        "specific"
    }
}

/// Selects the positive contributor with the smallest delivery estimate.
///
/// Replies without an estimate rank after every reply with one; ties keep the
/// earlier reply.
#[derive(Debug, Clone)]
pub struct FastestContributorSelector {
    tracker: ResponseTracker,
    best: Vec<SelectedContributor>,
    best_time: Option<u64>,
}

impl FastestContributorSelector {
    pub fn new(expected: impl IntoIterator<Item = ContributorId>) -> Self {
        Self {
            tracker: ResponseTracker::new(expected),
            best: Vec::new(),
            best_time: None,
        }
    }

    fn beats_current(&self, time: Option<u64>) -> bool {
        if self.best.is_empty() {
            return true;
        }
        match (time, self.best_time) {
            (Some(candidate), Some(current)) => candidate < current,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

impl ComponentSelector for FastestContributorSelector {
    fn process_reply(&mut self, reply: &IdentifyReply) -> Result<(), ConversationError> {
        let positive = reply.identification()?;
        self.tracker.record(&reply.contributor_id)?;
        if positive && self.beats_current(reply.time_to_deliver_ms) {
            self.best = vec![reply.selection()];
            self.best_time = reply.time_to_deliver_ms;
        }
        Ok(())
    }

    fn is_finished(&self) -> Result<bool, ConversationError> {
        finished(&self.tracker, &self.best, self.tracker.expected())
    }

    fn selected(&self) -> &[SelectedContributor] {
        &self.best
    }

    fn outstanding(&self) -> Vec<ContributorId> {
        self.tracker.outstanding()
    }

    fn candidates(&self) -> &[ContributorId] {
        self.tracker.expected()
    }

    fn name(&self) -> &'static str {
        "fastest"
    }
}

/// Selection policy chosen by the caller when starting an operation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    #[default]
    All,
    Specific(ContributorId),
    Fastest,
}

impl SelectionPolicy {
    /// Builds a selector for the contributors an identify request is sent to.
    pub fn build(&self, addressed: &[ContributorId]) -> Box<dyn ComponentSelector> {
        let addressed = addressed.iter().cloned();
        match self {
            SelectionPolicy::All => Box::new(AllContributorsSelector::new(addressed)),
            SelectionPolicy::Specific(target) => {
                Box::new(SpecificContributorSelector::new(target.clone(), addressed))
            }
            SelectionPolicy::Fastest => Box::new(FastestContributorSelector::new(addressed)),
        }
    }
}
