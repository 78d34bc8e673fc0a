use serde::{Deserialize, Serialize};
use std::fmt;

/// Gmail system label id for the inbox
pub const INBOX_LABEL_ID: &str = "INBOX";

/// Header projection of a mailbox message: the only fields triage looks at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    /// Raw `From` header, e.g. `"GitHub" <noreply@github.com>`
    pub sender: String,
    /// Raw `Subject` header
    pub subject: String,
}

impl Message {
    pub fn new(id: impl Into<String>, sender: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sender: sender.into(),
            subject: subject.into(),
        }
    }
}

/// Label (folder) as reported by the mailbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelInfo {
    pub id: String,
    pub name: String,
}

/// One page of message ids returned by a label listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    pub ids: Vec<String>,
    pub next_page_token: Option<String>,
}

/// Triage categories, declared in rule evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EmailCategory {
    Recruiting,
    TechGitHub,
    Notifications,
    Finance,
    Shopping,
    Calendar,
    Meetings,
    MeetingNotes,
    EducationWebinars,
    TechServicesHosting,
    EntertainmentMedia,
    Other,
}

impl EmailCategory {
    pub const ALL: [EmailCategory; 12] = [
        EmailCategory::Recruiting,
        EmailCategory::TechGitHub,
        EmailCategory::Notifications,
        EmailCategory::Finance,
        EmailCategory::Shopping,
        EmailCategory::Calendar,
        EmailCategory::Meetings,
        EmailCategory::MeetingNotes,
        EmailCategory::EducationWebinars,
        EmailCategory::TechServicesHosting,
        EmailCategory::EntertainmentMedia,
        EmailCategory::Other,
    ];

    /// Catch-all category assigned when no rule matches
    pub const CATCH_ALL: EmailCategory = EmailCategory::Other;

    pub fn name(&self) -> &'static str {
        match self {
            EmailCategory::Recruiting => "Recruiting",
            EmailCategory::TechGitHub => "Tech/GitHub",
            EmailCategory::Notifications => "Notifications",
            EmailCategory::Finance => "Finance",
            EmailCategory::Shopping => "Shopping",
            EmailCategory::Calendar => "Calendar",
            EmailCategory::Meetings => "Meetings",
            EmailCategory::MeetingNotes => "Meeting-Notes",
            EmailCategory::EducationWebinars => "Education/Webinars",
            EmailCategory::TechServicesHosting => "Tech-Services/Hosting",
            EmailCategory::EntertainmentMedia => "Entertainment/Media",
            EmailCategory::Other => "Other",
        }
    }

    /// Folder names already used by the existing mailbox
    fn polish_label(&self) -> &'static str {
        match self {
            EmailCategory::Recruiting => "Rekrutacja/LinkedIn",
            EmailCategory::TechGitHub => "Tech/GitHub",
            EmailCategory::Notifications => "Powiadomienia",
            EmailCategory::Finance => "Finanse",
            EmailCategory::Shopping => "Zakupy",
            EmailCategory::Calendar => "Kalendarz",
            EmailCategory::Meetings => "Spotkania",
            EmailCategory::MeetingNotes => "Gemini/Meet Notes",
            EmailCategory::EducationWebinars => "Edukacja/Webinary",
            EmailCategory::TechServicesHosting => "Tech Services/Hosting",
            EmailCategory::EntertainmentMedia => "Rozrywka/Media",
            EmailCategory::Other => "Inne",
        }
    }

    /// Mailbox label name for this category under the given naming scheme
    pub fn label_name(&self, naming: LabelNaming) -> &'static str {
        match naming {
            LabelNaming::Pl => self.polish_label(),
            LabelNaming::En => self.name(),
        }
    }
}

impl fmt::Display for EmailCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which set of folder names categories map to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelNaming {
    #[default]
    Pl,
    En,
}
