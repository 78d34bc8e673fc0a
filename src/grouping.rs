//! Category buckets built from classified messages, plus preview and stats views

use crate::classifier::RuleSet;
use crate::models::{EmailCategory, LabelNaming, Message};

/// Messages bucketed by category
///
/// Buckets appear in the order their category was first seen; messages keep
/// the order they were fetched in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grouping {
    buckets: Vec<(EmailCategory, Vec<Message>)>,
    retained: usize,
}

impl Grouping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify every message and bucket it
    ///
    /// Messages classified as `current` (the category of the folder they are
    /// already in) are counted as retained and left out.
    pub fn build(
        messages: impl IntoIterator<Item = Message>,
        rules: RuleSet,
        current: Option<EmailCategory>,
    ) -> Self {
        let mut grouping = Self::new();

        for message in messages {
            let category = rules.classify(&message.sender, &message.subject);
            if Some(category) == current {
                grouping.retained += 1;
                continue;
            }
            grouping.insert(category, message);
        }

        grouping
    }

    pub fn insert(&mut self, category: EmailCategory, message: Message) {
        match self.buckets.iter_mut().find(|(c, _)| *c == category) {
            Some((_, messages)) => messages.push(message),
            None => self.buckets.push((category, vec![message])),
        }
    }

    pub fn get(&self, category: EmailCategory) -> Option<&[Message]> {
        self.buckets
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, messages)| messages.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (EmailCategory, &[Message])> {
        self.buckets
            .iter()
            .map(|(category, messages)| (*category, messages.as_slice()))
    }

    pub fn categories(&self) -> Vec<EmailCategory> {
        self.buckets.iter().map(|(c, _)| *c).collect()
    }

    /// Messages that will be moved
    pub fn message_count(&self) -> usize {
        self.buckets.iter().map(|(_, m)| m.len()).sum()
    }

    /// Messages left where they are
    pub fn retained(&self) -> usize {
        self.retained
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Category counts, largest first; ties keep first-seen order
    pub fn counts_by_size(&self) -> Vec<(EmailCategory, usize)> {
        let mut counts: Vec<_> = self.iter().map(|(c, m)| (c, m.len())).collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
    }

    /// Preview rows for the dry-run display
    pub fn preview(&self, naming: LabelNaming, samples: usize, width: usize) -> Vec<PreviewEntry> {
        self.iter()
            .map(|(category, messages)| PreviewEntry {
                category,
                label_name: category.label_name(naming).to_string(),
                count: messages.len(),
                sample_subjects: messages
                    .iter()
                    .take(samples)
                    .map(|m| truncate_chars(&m.subject, width))
                    .collect(),
                remaining: messages.len().saturating_sub(samples),
            })
            .collect()
    }
}

/// One category in the dry-run preview
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewEntry {
    pub category: EmailCategory,
    pub label_name: String,
    pub count: usize,
    pub sample_subjects: Vec<String>,
    /// Messages not shown in `sample_subjects`
    pub remaining: usize,
}

/// Cut a string to at most `max_chars` characters
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Messages actually moved per category, in the order they were applied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    moved: Vec<(EmailCategory, usize)>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, category: EmailCategory) {
        match self.moved.iter_mut().find(|(c, _)| *c == category) {
            Some((_, count)) => *count += 1,
            None => self.moved.push((category, 1)),
        }
    }

    pub fn get(&self, category: EmailCategory) -> usize {
        self.moved
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EmailCategory, usize)> + '_ {
        self.moved.iter().copied()
    }

    pub fn total(&self) -> usize {
        self.moved.iter().map(|(_, n)| n).sum()
    }
}
