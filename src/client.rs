//! Gmail API client behind the `MailboxClient` trait

use async_trait::async_trait;
use google_gmail1::api::{Label, Message as GmailMessage, ModifyMessageRequest};
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::GmailHub;
use crate::error::{Result, TriageError};
use crate::models::{LabelInfo, Message, MessagePage};

/// Scope every call is made with; matches the scope requested at consent time
const MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// Largest page the Gmail list endpoint will return
pub const MAX_PAGE_SIZE: u32 = 500;

/// Mailbox operations the reconciler needs. Implemented by the Gmail client
/// and by test doubles.
#[async_trait]
pub trait MailboxClient: Send + Sync {
    /// List one page of message ids carrying `label_id`
    async fn list_messages(
        &self,
        label_id: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> Result<MessagePage>;

    /// Fetch the From and Subject headers of a message
    async fn get_message_metadata(&self, id: &str) -> Result<Message>;

    /// List all labels in the account
    async fn list_labels(&self) -> Result<Vec<LabelInfo>>;

    /// Create a label; fails if the name is already taken
    async fn create_label(&self, name: &str) -> Result<LabelInfo>;

    /// Add and remove labels on a single message
    async fn modify_labels(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()>;
}

/// Gmail client used by the binary
///
/// Every call is made once. A slow call is cut off after `request_timeout`
/// and reported as a network error.
pub struct ProductionGmailClient {
    hub: GmailHub,
    request_timeout: Duration,
}

impl ProductionGmailClient {
    pub fn new(hub: GmailHub) -> Self {
        Self::with_timeout(hub, Duration::from_secs(30))
    }

    pub fn with_timeout(hub: GmailHub, request_timeout: Duration) -> Self {
        Self {
            hub,
            request_timeout,
        }
    }

    /// Account address the hub is authorized for
    pub async fn account_email(&self) -> Result<String> {
        let (_, profile) = self
            .hub
            .users()
            .get_profile("me")
            .add_scope(MODIFY_SCOPE)
            .doit()
            .await?;
        Ok(profile.email_address.unwrap_or_default())
    }

    async fn with_timeout_guard<T, Fut>(&self, operation_name: &str, call: Fut) -> Result<T>
    where
        Fut: std::future::Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Gmail API {} call timed out after {:?}",
                    operation_name, self.request_timeout
                );
                Err(TriageError::NetworkError(format!(
                    "{} timed out after {:?}",
                    operation_name, self.request_timeout
                )))
            }
        }
    }
}

/// Pull id, From and Subject out of a metadata-format message
fn parse_message_metadata(msg: GmailMessage) -> Result<Message> {
    let id = msg
        .id
        .ok_or_else(|| TriageError::InvalidMessageFormat("Missing message ID".to_string()))?;

    let headers = msg
        .payload
        .and_then(|p| p.headers)
        .ok_or_else(|| {
            TriageError::InvalidMessageFormat(format!("Message {} has no headers", id))
        })?;

    let mut sender = None;
    let mut subject = None;

    for header in headers {
        if let (Some(name), Some(value)) = (header.name, header.value) {
            if sender.is_none() && name.eq_ignore_ascii_case("from") {
                sender = Some(value);
            } else if subject.is_none() && name.eq_ignore_ascii_case("subject") {
                subject = Some(value);
            }
        }
    }

    Ok(Message {
        id,
        sender: sender.unwrap_or_default(),
        subject: subject.unwrap_or_default(),
    })
}

#[async_trait]
impl MailboxClient for ProductionGmailClient {
    async fn list_messages(
        &self,
        label_id: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> Result<MessagePage> {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);

        self.with_timeout_guard("messages.list", async {
            let mut call = self
                .hub
                .users()
                .messages_list("me")
                .add_label_ids(label_id)
                .max_results(page_size);

            if let Some(token) = page_token.as_deref() {
                call = call.page_token(token);
            }

            let (_, response) = call.add_scope(MODIFY_SCOPE).doit().await?;

            let ids = response
                .messages
                .unwrap_or_default()
                .into_iter()
                .filter_map(|m| m.id)
                .collect::<Vec<_>>();

            debug!("Listed {} message ids under {}", ids.len(), label_id);
            Ok(MessagePage {
                ids,
                next_page_token: response.next_page_token,
            })
        })
        .await
    }

    async fn get_message_metadata(&self, id: &str) -> Result<Message> {
        self.with_timeout_guard("messages.get", async {
            let (_, msg) = self
                .hub
                .users()
                .messages_get("me", id)
                .format("metadata")
                .add_metadata_headers("From")
                .add_metadata_headers("Subject")
                .add_scope(MODIFY_SCOPE)
                .doit()
                .await?;

            parse_message_metadata(msg)
        })
        .await
    }

    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        self.with_timeout_guard("labels.list", async {
            let (_, response) = self
                .hub
                .users()
                .labels_list("me")
                .add_scope(MODIFY_SCOPE)
                .doit()
                .await?;

            let labels: Vec<LabelInfo> = response
                .labels
                .unwrap_or_default()
                .into_iter()
                .filter_map(|label| match (label.id, label.name) {
                    (Some(id), Some(name)) => Some(LabelInfo { id, name }),
                    _ => None,
                })
                .collect();

            debug!("Fetched {} labels", labels.len());
            Ok(labels)
        })
        .await
    }

    async fn create_label(&self, name: &str) -> Result<LabelInfo> {
        self.with_timeout_guard("labels.create", async {
            let label = Label {
                name: Some(name.to_string()),
                message_list_visibility: Some("show".to_string()),
                label_list_visibility: Some("labelShow".to_string()),
                ..Default::default()
            };

            let (_, created) = self
                .hub
                .users()
                .labels_create(label, "me")
                .add_scope(MODIFY_SCOPE)
                .doit()
                .await?;

            let id = created.id.ok_or_else(|| {
                TriageError::LabelError(format!("Created label '{}' has no ID", name))
            })?;

            Ok(LabelInfo {
                id,
                name: created.name.unwrap_or_else(|| name.to_string()),
            })
        })
        .await
    }

    async fn modify_labels(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()> {
        let request = ModifyMessageRequest {
            add_label_ids: (!add_label_ids.is_empty()).then(|| add_label_ids.to_vec()),
            remove_label_ids: (!remove_label_ids.is_empty()).then(|| remove_label_ids.to_vec()),
        };

        self.with_timeout_guard("messages.modify", async {
            self.hub
                .users()
                .messages_modify(request, "me", message_id)
                .add_scope(MODIFY_SCOPE)
                .doit()
                .await?;
            Ok(())
        })
        .await
    }
}
