//! Common test utilities and fixtures
#![allow(dead_code)]

use async_trait::async_trait;
use inbox_triage::client::MailboxClient;
use inbox_triage::error::{Result, TriageError};
use inbox_triage::models::{LabelInfo, Message, MessagePage};
use inbox_triage::reconciler::ReconcileSettings;
use mockall::mock;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Create a test message
pub fn create_test_message(id: &str, sender: &str, subject: &str) -> Message {
    Message::new(id, sender, subject)
}

/// Create a test LabelInfo
pub fn create_test_label_info(id: &str, name: &str) -> LabelInfo {
    LabelInfo {
        id: id.to_string(),
        name: name.to_string(),
    }
}

/// Default settings with folder creation enabled
pub fn test_settings() -> ReconcileSettings {
    ReconcileSettings::default()
}

pub fn dry_run_settings() -> ReconcileSettings {
    ReconcileSettings {
        create_missing_labels: false,
        ..ReconcileSettings::default()
    }
}

// Mock implementation of MailboxClient for testing
mock! {
    pub Mailbox {}

    #[async_trait::async_trait]
    impl MailboxClient for Mailbox {
        async fn list_messages(
            &self,
            label_id: &str,
            page_size: u32,
            page_token: Option<String>,
        ) -> Result<MessagePage>;
        async fn get_message_metadata(&self, id: &str) -> Result<Message>;
        async fn list_labels(&self) -> Result<Vec<LabelInfo>>;
        async fn create_label(&self, name: &str) -> Result<LabelInfo>;
        async fn modify_labels(
            &self,
            message_id: &str,
            add_label_ids: &[String],
            remove_label_ids: &[String],
        ) -> Result<()>;
    }
}

#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    sender: String,
    subject: String,
    label_ids: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct MailboxState {
    labels: Vec<LabelInfo>,
    messages: Vec<StoredMessage>,
    created: Vec<String>,
    modify_calls: usize,
    fail_modify_after: Option<usize>,
    metadata_delays: HashMap<String, Duration>,
}

/// Mailbox kept in memory with Gmail's label semantics
///
/// Page tokens are offsets into the filtered message list. Adding a label a
/// message already has, or removing one it lacks, is a no-op.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMailbox {
    state: Arc<Mutex<MailboxState>>,
}

impl InMemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(self, id: &str, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .labels
            .push(create_test_label_info(id, name));
        self
    }

    pub fn with_message(self, id: &str, sender: &str, subject: &str, label_ids: &[&str]) -> Self {
        self.state.lock().unwrap().messages.push(StoredMessage {
            id: id.to_string(),
            sender: sender.to_string(),
            subject: subject.to_string(),
            label_ids: label_ids.iter().map(|l| l.to_string()).collect(),
        });
        self
    }

    /// Fail every modify call after the first `n` succeed
    pub fn fail_modify_after(self, n: usize) -> Self {
        self.state.lock().unwrap().fail_modify_after = Some(n);
        self
    }

    /// Delay the metadata fetch of one message
    pub fn delay_metadata(self, id: &str, delay: Duration) -> Self {
        self.state
            .lock()
            .unwrap()
            .metadata_delays
            .insert(id.to_string(), delay);
        self
    }

    pub fn label_id(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .labels
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.id.clone())
    }

    pub fn labels_of(&self, message_id: &str) -> BTreeSet<String> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .map(|m| m.label_ids.clone())
            .unwrap_or_default()
    }

    /// Ids of messages carrying a label, in mailbox order
    pub fn messages_in(&self, label_id: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| m.label_ids.contains(label_id))
            .map(|m| m.id.clone())
            .collect()
    }

    /// Every message with its labels
    pub fn snapshot(&self) -> Vec<(String, BTreeSet<String>)> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .map(|m| (m.id.clone(), m.label_ids.clone()))
            .collect()
    }

    /// Names of labels created through the client, in creation order
    pub fn created_labels(&self) -> Vec<String> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn modify_calls(&self) -> usize {
        self.state.lock().unwrap().modify_calls
    }
}

#[async_trait]
impl MailboxClient for InMemoryMailbox {
    async fn list_messages(
        &self,
        label_id: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> Result<MessagePage> {
        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| TriageError::BadRequest(format!("Invalid page token {}", token)))?,
            None => 0,
        };

        let all = self.messages_in(label_id);
        let end = (offset + page_size as usize).min(all.len());
        let ids = all.get(offset..end).unwrap_or_default().to_vec();
        let next_page_token = (end < all.len()).then(|| end.to_string());

        Ok(MessagePage {
            ids,
            next_page_token,
        })
    }

    async fn get_message_metadata(&self, id: &str) -> Result<Message> {
        let delay = self.state.lock().unwrap().metadata_delays.get(id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock().unwrap();
        state
            .messages
            .iter()
            .find(|m| m.id == id)
            .map(|m| Message::new(m.id.clone(), m.sender.clone(), m.subject.clone()))
            .ok_or_else(|| TriageError::NotFound(format!("Message {}", id)))
    }

    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        Ok(self.state.lock().unwrap().labels.clone())
    }

    async fn create_label(&self, name: &str) -> Result<LabelInfo> {
        let mut state = self.state.lock().unwrap();
        if state.labels.iter().any(|l| l.name == name) {
            return Err(TriageError::BadRequest(format!(
                "Label name exists or conflicts: {}",
                name
            )));
        }

        let label = create_test_label_info(&format!("Label_{}", state.labels.len() + 1), name);
        state.labels.push(label.clone());
        state.created.push(name.to_string());
        Ok(label)
    }

    async fn modify_labels(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();

        if let Some(limit) = state.fail_modify_after {
            if state.modify_calls >= limit {
                return Err(TriageError::ServerError {
                    status: 503,
                    message: "Backend Error".to_string(),
                });
            }
        }
        state.modify_calls += 1;

        let message = state
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| TriageError::NotFound(format!("Message {}", message_id)))?;

        for label in add_label_ids {
            message.label_ids.insert(label.clone());
        }
        for label in remove_label_ids {
            message.label_ids.remove(label);
        }
        Ok(())
    }
}
