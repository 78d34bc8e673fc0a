//! Keyword rules that map a message's sender and subject to a category
//!
//! Rules are evaluated top to bottom and the first hit wins. Keyword lists are
//! kept exactly as the existing mailbox folders were built with, including the
//! Polish terms.

use crate::models::EmailCategory;
use once_cell::sync::Lazy;

/// Which header a matcher looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Sender,
    Subject,
    Either,
}

/// Substring test against one field
#[derive(Debug, Clone)]
pub struct Matcher {
    pub field: Field,
    pub keywords: &'static [&'static str],
}

impl Matcher {
    const fn new(field: Field, keywords: &'static [&'static str]) -> Self {
        Self { field, keywords }
    }

    /// Inputs must already be lower-cased
    fn is_match(&self, sender: &str, subject: &str) -> bool {
        self.keywords.iter().any(|keyword| match self.field {
            Field::Sender => sender.contains(keyword),
            Field::Subject => subject.contains(keyword),
            Field::Either => sender.contains(keyword) || subject.contains(keyword),
        })
    }
}

/// A category plus the matchers that select it; any matcher hitting is enough
#[derive(Debug, Clone)]
pub struct Rule {
    pub category: EmailCategory,
    pub matchers: Vec<Matcher>,
}

impl Rule {
    fn new(category: EmailCategory, matchers: Vec<Matcher>) -> Self {
        Self { category, matchers }
    }

    pub fn is_match(&self, sender: &str, subject: &str) -> bool {
        self.matchers.iter().any(|m| m.is_match(sender, subject))
    }
}

const RECRUITING: &[&str] = &["linkedin", "recruiters", "jobvite", "talent", "recruitment"];
const TECH_GITHUB: &[&str] = &["github", "gitlab", "dependabot", "pull request", "pr #"];
const NOTIFICATIONS: &[&str] = &["noreply", "no-reply", "notification", "newsletter"];
const FINANCE: &[&str] = &["invoice", "payment", "faktura", "płatność", "rachunek"];
const SHOPPING: &[&str] = &["amazon", "allegro", "zamówienie", "order", "dostawa"];
const CALENDAR_SENDER: &[&str] = &["calendar"];
const CALENDAR_SUBJECT: &[&str] = &["invitation"];
const MEETINGS: &[&str] = &["fireflies", "zoom", "meet", "teams"];
const MEETING_NOTES_SENDER: &[&str] = &["gemini-notes@google.com", "meet-notes"];
const MEETING_NOTES_SUBJECT: &[&str] = &["notatki:", "notes:", "meeting notes", "transkrypcja"];
const EDUCATION: &[&str] = &[
    "streamyard",
    "webinar",
    "vibecoding",
    "campusai",
    "campus ai",
    "kurs",
    "szkolenie",
    "workshop",
    "masterclass",
    "ai skills today",
    "bolt.new",
    "stackblitz",
    "coursera",
    "udemy",
];
const HOSTING: &[&str] = &[
    "hostinger",
    "domain",
    "hosting",
    "server",
    "ssl",
    "dns",
    "konserwacja",
    "maintenance",
    "uptime",
    "cloudflare",
    "vercel",
];
const MEDIA: &[&str] = &[
    "bookbeat",
    "instagram",
    "spotify",
    "youtube",
    "netflix",
    "audioteka",
    "empik",
    "audiobook",
    "podcast",
];

/// Rules 8-11: shared tail of both rule sets
fn specific_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            EmailCategory::MeetingNotes,
            vec![
                Matcher::new(Field::Sender, MEETING_NOTES_SENDER),
                Matcher::new(Field::Subject, MEETING_NOTES_SUBJECT),
            ],
        ),
        Rule::new(
            EmailCategory::EducationWebinars,
            vec![Matcher::new(Field::Either, EDUCATION)],
        ),
        Rule::new(
            EmailCategory::TechServicesHosting,
            vec![Matcher::new(Field::Either, HOSTING)],
        ),
        Rule::new(
            EmailCategory::EntertainmentMedia,
            vec![Matcher::new(Field::Either, MEDIA)],
        ),
    ]
}

static FULL_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    let mut rules = vec![
        Rule::new(
            EmailCategory::Recruiting,
            vec![Matcher::new(Field::Either, RECRUITING)],
        ),
        Rule::new(
            EmailCategory::TechGitHub,
            vec![Matcher::new(Field::Either, TECH_GITHUB)],
        ),
        Rule::new(
            EmailCategory::Notifications,
            vec![Matcher::new(Field::Sender, NOTIFICATIONS)],
        ),
        Rule::new(
            EmailCategory::Finance,
            vec![Matcher::new(Field::Either, FINANCE)],
        ),
        Rule::new(
            EmailCategory::Shopping,
            vec![Matcher::new(Field::Either, SHOPPING)],
        ),
        Rule::new(
            EmailCategory::Calendar,
            vec![
                Matcher::new(Field::Sender, CALENDAR_SENDER),
                Matcher::new(Field::Subject, CALENDAR_SUBJECT),
            ],
        ),
        Rule::new(
            EmailCategory::Meetings,
            vec![Matcher::new(Field::Sender, MEETINGS)],
        ),
    ];
    rules.extend(specific_rules());
    rules
});

static RECLASSIFY_RULES: Lazy<Vec<Rule>> = Lazy::new(specific_rules);

/// Which ordered rule list to evaluate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSet {
    /// All eleven rules, used when sorting the inbox
    Full,
    /// Only the specific rules, used to re-sort the catch-all folder
    Reclassify,
}

impl RuleSet {
    pub fn rules(&self) -> &'static [Rule] {
        match self {
            RuleSet::Full => &FULL_RULES,
            RuleSet::Reclassify => &RECLASSIFY_RULES,
        }
    }

    /// First matching rule's category, or the catch-all
    pub fn classify(&self, sender: &str, subject: &str) -> EmailCategory {
        let sender = sender.to_lowercase();
        let subject = subject.to_lowercase();

        self.rules()
            .iter()
            .find(|rule| rule.is_match(&sender, &subject))
            .map(|rule| rule.category)
            .unwrap_or(EmailCategory::CATCH_ALL)
    }
}

/// Classify with the full rule set
pub fn classify(sender: &str, subject: &str) -> EmailCategory {
    RuleSet::Full.classify(sender, subject)
}
