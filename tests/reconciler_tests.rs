//! End-to-end passes against an in-memory mailbox and mocked clients

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{
    create_test_label_info, create_test_message, dry_run_settings, test_settings, InMemoryMailbox,
    MockMailbox,
};
use inbox_triage::cli::{execute_pass, ProgressReporter, RunOutcome};
use inbox_triage::client::MailboxClient;
use inbox_triage::config::Config;
use inbox_triage::error::TriageError;
use inbox_triage::models::{EmailCategory, MessagePage};
use inbox_triage::reconciler::{
    Confirmation, ConfirmedPlan, LabelStatus, Pass, Plan, PlanOutcome, ProgressCallback,
    ReconcileSettings, Reconciler,
};

fn inbox_fixture() -> InMemoryMailbox {
    InMemoryMailbox::new()
        .with_label("L_fin", "Finanse")
        .with_message("m1", "billing@acme.com", "Faktura 12/2024", &["INBOX", "UNREAD"])
        .with_message("m2", "orders@allegro.pl", "Twoje zamówienie", &["INBOX"])
        .with_message("m3", "jane@example.com", "lunch?", &["INBOX"])
        .with_message("m4", "alerts@bank.com", "Płatność przyjęta", &["INBOX"])
}

fn catch_all_fixture() -> InMemoryMailbox {
    InMemoryMailbox::new()
        .with_label("L_inne", "Inne")
        .with_message("r1", "events@streamyard.com", "Live webinar today", &["L_inne"])
        .with_message("r2", "jobs@linkedin.com", "New role", &["L_inne"])
        .with_message("r3", "jane@example.com", "hello", &["L_inne"])
        .with_message("r4", "billing@hostinger.com", "Domain renewal", &["L_inne"])
}

fn reconciler_for(mailbox: &InMemoryMailbox, settings: ReconcileSettings) -> Reconciler {
    Reconciler::new(Box::new(mailbox.clone()), settings)
}

async fn ready_plan(reconciler: &Reconciler, pass: Pass) -> Plan {
    match reconciler.plan(pass, None).await.unwrap() {
        PlanOutcome::Ready(plan) => plan,
        other => panic!("expected a plan, got {:?}", other),
    }
}

fn confirmed(plan: Plan) -> ConfirmedPlan {
    match plan.confirm("TAK", "TAK").unwrap() {
        Confirmation::Confirmed(confirmed) => confirmed,
        Confirmation::Cancelled => panic!("TAK should confirm"),
    }
}

fn ids(messages: &[inbox_triage::Message]) -> Vec<&str> {
    messages.iter().map(|m| m.id.as_str()).collect()
}

#[tokio::test]
async fn test_triage_moves_inbox_into_category_folders() {
    let mailbox = inbox_fixture();
    let reconciler = reconciler_for(&mailbox, test_settings());

    let plan = ready_plan(&reconciler, Pass::Triage).await;
    assert_eq!(plan.scanned, 4);
    assert_eq!(
        plan.grouping.categories(),
        vec![
            EmailCategory::Finance,
            EmailCategory::Shopping,
            EmailCategory::Other
        ]
    );
    assert_eq!(
        ids(plan.grouping.get(EmailCategory::Finance).unwrap()),
        vec!["m1", "m4"]
    );

    // Existing folder reused, the others created before confirmation
    let finance = plan.label_for(EmailCategory::Finance).unwrap();
    assert_eq!(finance.status, LabelStatus::Existing);
    assert_eq!(finance.id.as_deref(), Some("L_fin"));
    assert_eq!(mailbox.created_labels(), vec!["Zakupy", "Inne"]);
    assert_eq!(mailbox.modify_calls(), 0);

    let stats = reconciler.apply(confirmed(plan)).await.unwrap();
    assert_eq!(stats.get(EmailCategory::Finance), 2);
    assert_eq!(stats.get(EmailCategory::Shopping), 1);
    assert_eq!(stats.get(EmailCategory::Other), 1);
    assert_eq!(stats.total(), 4);

    assert!(mailbox.messages_in("INBOX").is_empty());
    assert_eq!(mailbox.messages_in("L_fin"), vec!["m1", "m4"]);
    let zakupy = mailbox.label_id("Zakupy").unwrap();
    assert_eq!(mailbox.messages_in(&zakupy), vec!["m2"]);
    // Unrelated labels are left alone
    assert!(mailbox.labels_of("m1").contains("UNREAD"));
}

#[tokio::test]
async fn test_apply_twice_leaves_mailbox_unchanged() {
    let mailbox = inbox_fixture();
    let reconciler = reconciler_for(&mailbox, test_settings());

    let plan = confirmed(ready_plan(&reconciler, Pass::Triage).await);

    reconciler.apply(plan.clone()).await.unwrap();
    let after_first = mailbox.snapshot();

    reconciler.apply(plan).await.unwrap();
    assert_eq!(mailbox.snapshot(), after_first);
}

#[tokio::test]
async fn test_rerun_after_triage_finds_empty_inbox() {
    let mailbox = inbox_fixture();
    let reconciler = reconciler_for(&mailbox, test_settings());

    let plan = confirmed(ready_plan(&reconciler, Pass::Triage).await);
    reconciler.apply(plan).await.unwrap();

    match reconciler.plan(Pass::Triage, None).await.unwrap() {
        PlanOutcome::Empty { source } => assert_eq!(source.id, "INBOX"),
        other => panic!("expected empty inbox, got {:?}", other),
    }
    // No folder is created twice
    assert_eq!(mailbox.created_labels(), vec!["Zakupy", "Inne"]);
}

#[tokio::test]
async fn test_grouping_accounts_for_every_scanned_message() {
    for (mailbox, pass) in [
        (inbox_fixture(), Pass::Triage),
        (catch_all_fixture(), Pass::Reclassify),
    ] {
        let reconciler = reconciler_for(&mailbox, dry_run_settings());
        let plan = ready_plan(&reconciler, pass).await;

        assert_eq!(
            plan.grouping.message_count() + plan.grouping.retained(),
            plan.scanned
        );
    }
}

#[tokio::test]
async fn test_reclassify_moves_only_newly_matched_messages() {
    let mailbox = catch_all_fixture();
    let reconciler = reconciler_for(&mailbox, test_settings());

    let plan = ready_plan(&reconciler, Pass::Reclassify).await;
    assert_eq!(plan.source.id, "L_inne");
    assert_eq!(plan.scanned, 4);
    assert_eq!(plan.grouping.retained(), 2);
    assert_eq!(
        plan.grouping.categories(),
        vec![
            EmailCategory::EducationWebinars,
            EmailCategory::TechServicesHosting
        ]
    );
    assert!(plan.grouping.get(EmailCategory::Other).is_none());

    let stats = reconciler.apply(confirmed(plan)).await.unwrap();
    assert_eq!(stats.total(), 2);

    // Recruiting mail is not re-sorted out of the catch-all folder
    assert_eq!(mailbox.messages_in("L_inne"), vec!["r2", "r3"]);
    let webinars = mailbox.label_id("Edukacja/Webinary").unwrap();
    assert_eq!(mailbox.messages_in(&webinars), vec!["r1"]);
    let hosting = mailbox.label_id("Tech Services/Hosting").unwrap();
    assert_eq!(mailbox.messages_in(&hosting), vec!["r4"]);
}

#[tokio::test]
async fn test_reclassify_without_catch_all_folder() {
    let mut client = MockMailbox::new();
    client
        .expect_list_labels()
        .times(1)
        .returning(|| Ok(vec![create_test_label_info("L1", "Finanse")]));
    client.expect_list_messages().times(0);
    client.expect_create_label().times(0);
    client.expect_modify_labels().times(0);

    let reconciler = Reconciler::new(Box::new(client), test_settings());
    match reconciler.plan(Pass::Reclassify, None).await.unwrap() {
        PlanOutcome::SourceMissing { label_name } => assert_eq!(label_name, "Inne"),
        other => panic!("expected missing source, got {:?}", other),
    }
}

#[tokio::test]
async fn test_reclassify_looks_up_english_catch_all_name() {
    let mailbox = InMemoryMailbox::new()
        .with_label("L_inne", "Inne")
        .with_label("L_other", "Other")
        .with_message("r1", "events@streamyard.com", "webinar", &["L_other"]);
    let settings = ReconcileSettings {
        naming: inbox_triage::LabelNaming::En,
        ..test_settings()
    };
    let reconciler = reconciler_for(&mailbox, settings);

    let plan = ready_plan(&reconciler, Pass::Reclassify).await;
    assert_eq!(plan.source.id, "L_other");
    assert_eq!(
        plan.label_for(EmailCategory::EducationWebinars)
            .unwrap()
            .name,
        "Education/Webinars"
    );
}

#[tokio::test]
async fn test_reclassify_with_only_catch_all_mail_has_nothing_to_move() {
    let mailbox = InMemoryMailbox::new()
        .with_label("L_inne", "Inne")
        .with_message("r1", "jane@example.com", "hello", &["L_inne"]);
    let reconciler = reconciler_for(&mailbox, test_settings());

    match reconciler.plan(Pass::Reclassify, None).await.unwrap() {
        PlanOutcome::NothingToMove { scanned, .. } => assert_eq!(scanned, 1),
        other => panic!("expected nothing to move, got {:?}", other),
    }
    assert!(mailbox.created_labels().is_empty());
}

#[tokio::test]
async fn test_empty_inbox_ends_before_enrichment() {
    let mut client = MockMailbox::new();
    client.expect_list_labels().returning(|| Ok(vec![]));
    client.expect_list_messages().times(1).returning(|_, _, _| {
        Ok(MessagePage {
            ids: vec![],
            next_page_token: None,
        })
    });
    client.expect_get_message_metadata().times(0);
    client.expect_create_label().times(0);

    let reconciler = Reconciler::new(Box::new(client), test_settings());
    assert!(matches!(
        reconciler.plan(Pass::Triage, None).await.unwrap(),
        PlanOutcome::Empty { .. }
    ));
}

#[tokio::test]
async fn test_default_settings_fetch_exactly_one_page() {
    let mut client = MockMailbox::new();
    client.expect_list_labels().returning(|| Ok(vec![]));
    client
        .expect_list_messages()
        .withf(|label_id, page_size, page_token| {
            label_id == "INBOX" && *page_size == 500 && page_token.is_none()
        })
        .times(1)
        .returning(|_, _, _| {
            Ok(MessagePage {
                ids: vec!["a".to_string(), "b".to_string()],
                next_page_token: Some("more".to_string()),
            })
        });
    client
        .expect_get_message_metadata()
        .times(2)
        .returning(|id| Ok(create_test_message(id, "jane@example.com", "hi")));
    client
        .expect_create_label()
        .times(1)
        .returning(|name| Ok(create_test_label_info("L_new", name)));

    let reconciler = Reconciler::new(Box::new(client), test_settings());
    let plan = ready_plan(&reconciler, Pass::Triage).await;
    assert_eq!(plan.scanned, 2);
}

#[tokio::test]
async fn test_max_pages_controls_pagination() {
    let mailbox = (0..5).fold(InMemoryMailbox::new(), |mailbox, i| {
        mailbox.with_message(&format!("m{}", i), "jane@example.com", "hi", &["INBOX"])
    });

    for (max_pages, expected) in [(1, 2), (2, 4), (0, 5)] {
        let settings = ReconcileSettings {
            page_size: 2,
            max_pages,
            ..dry_run_settings()
        };
        let reconciler = reconciler_for(&mailbox, settings);

        let ids = reconciler.fetch_message_ids("INBOX").await.unwrap();
        assert_eq!(ids.len(), expected, "max_pages = {}", max_pages);
    }
}

#[tokio::test]
async fn test_concurrent_enrichment_keeps_fetch_order() {
    let mailbox = InMemoryMailbox::new()
        .with_message("slow", "billing@acme.com", "invoice 1", &["INBOX"])
        .with_message("fast", "billing@acme.com", "invoice 2", &["INBOX"])
        .with_message("last", "billing@acme.com", "invoice 3", &["INBOX"])
        .delay_metadata("slow", Duration::from_millis(50));
    let settings = ReconcileSettings {
        max_concurrent_requests: 3,
        ..dry_run_settings()
    };
    let reconciler = reconciler_for(&mailbox, settings);

    let messages = reconciler
        .enrich(
            vec!["slow".to_string(), "fast".to_string(), "last".to_string()],
            None,
        )
        .await
        .unwrap();
    assert_eq!(ids(&messages), vec!["slow", "fast", "last"]);
}

#[tokio::test]
async fn test_enrichment_reports_progress() {
    let mailbox = inbox_fixture();
    let reconciler = reconciler_for(&mailbox, dry_run_settings());

    let calls = Arc::new(AtomicUsize::new(0));
    let last = Arc::new(AtomicUsize::new(0));
    let progress: ProgressCallback = {
        let calls = Arc::clone(&calls);
        let last = Arc::clone(&last);
        Arc::new(move |done, total| {
            assert_eq!(total, 4);
            calls.fetch_add(1, Ordering::SeqCst);
            last.store(done, Ordering::SeqCst);
        })
    };

    reconciler.plan(Pass::Triage, Some(progress)).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(last.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_metadata_failure_aborts_before_any_mutation() {
    let mut client = MockMailbox::new();
    client.expect_list_labels().returning(|| Ok(vec![]));
    client.expect_list_messages().returning(|_, _, _| {
        Ok(MessagePage {
            ids: vec!["a".to_string(), "b".to_string()],
            next_page_token: None,
        })
    });
    client
        .expect_get_message_metadata()
        .returning(|_| Err(TriageError::RateLimitExceeded { retry_after: 5 }));
    client.expect_create_label().times(0);
    client.expect_modify_labels().times(0);

    let reconciler = Reconciler::new(Box::new(client), test_settings());
    assert!(matches!(
        reconciler.plan(Pass::Triage, None).await,
        Err(TriageError::RateLimitExceeded { retry_after: 5 })
    ));
}

#[tokio::test]
async fn test_partial_failure_keeps_earlier_moves() {
    let mailbox = inbox_fixture().fail_modify_after(2);
    let reconciler = reconciler_for(&mailbox, test_settings());

    let plan = confirmed(ready_plan(&reconciler, Pass::Triage).await);
    let result = reconciler.apply(plan).await;
    assert!(matches!(result, Err(TriageError::ServerError { status: 503, .. })));

    // Finance (m1, m4) went first and stays moved; the rest never left
    assert_eq!(mailbox.messages_in("L_fin"), vec!["m1", "m4"]);
    assert_eq!(mailbox.messages_in("INBOX"), vec!["m2", "m3"]);
}

#[tokio::test]
async fn test_dry_run_creates_no_folders_and_cannot_be_applied() {
    let mailbox = inbox_fixture();
    let reconciler = reconciler_for(&mailbox, dry_run_settings());

    let plan = ready_plan(&reconciler, Pass::Triage).await;
    assert!(mailbox.created_labels().is_empty());

    let pending: Vec<_> = plan
        .labels_with_status(LabelStatus::Pending)
        .into_iter()
        .map(|l| l.name.as_str())
        .collect();
    assert_eq!(pending, vec!["Zakupy", "Inne"]);

    let preview = plan.preview(5, 60);
    assert_eq!(preview.len(), 3);
    assert_eq!(preview[0].label_name, "Finanse");
    assert_eq!(preview[0].count, 2);

    assert!(matches!(
        plan.confirm("TAK", "TAK"),
        Err(TriageError::LabelError(_))
    ));
    assert_eq!(mailbox.modify_calls(), 0);
}

#[tokio::test]
async fn test_label_creation_failure_is_label_error() {
    let mut client = MockMailbox::new();
    client.expect_list_labels().returning(|| Ok(vec![]));
    client.expect_list_messages().returning(|_, _, _| {
        Ok(MessagePage {
            ids: vec!["a".to_string()],
            next_page_token: None,
        })
    });
    client
        .expect_get_message_metadata()
        .returning(|id| Ok(create_test_message(id, "orders@allegro.pl", "order")));
    client
        .expect_create_label()
        .withf(|name| name == "Zakupy")
        .times(1)
        .returning(|_| Err(TriageError::Forbidden("insufficient scope".to_string())));
    client.expect_modify_labels().times(0);

    let reconciler = Reconciler::new(Box::new(client), test_settings());
    match reconciler.plan(Pass::Triage, None).await {
        Err(TriageError::LabelError(msg)) => assert!(msg.contains("Zakupy")),
        other => panic!("expected label error, got {:?}", other.map(|_| ())),
    }
}

fn gated_mock() -> MockMailbox {
    let mut client = MockMailbox::new();
    client
        .expect_list_labels()
        .returning(|| Ok(vec![create_test_label_info("L_fin", "Finanse")]));
    client.expect_list_messages().returning(|_, _, _| {
        Ok(MessagePage {
            ids: vec!["a".to_string()],
            next_page_token: None,
        })
    });
    client
        .expect_get_message_metadata()
        .returning(|id| Ok(create_test_message(id, "billing@acme.com", "invoice")));
    client.expect_modify_labels().times(0);
    client
}

#[tokio::test]
async fn test_confirmation_gate_rejects_anything_but_exact_word() {
    let config = Config::default();
    let reporter = ProgressReporter::new();

    for answer in [
        "tak", "Tak", "T A K", "yes", "", "TAKK", "nie\n", " TAK", "TAK ", "\tTAK", " TAK \n",
    ] {
        let reconciler = Reconciler::new(Box::new(gated_mock()), test_settings());
        let answer = answer.to_string();

        let report = execute_pass(&reconciler, &config, Pass::Triage, &reporter, |_, word| {
            assert_eq!(word, "TAK");
            Ok(answer)
        })
        .await
        .unwrap();

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(report.moved.total(), 0);
    }
}

#[tokio::test]
async fn test_confirmed_pass_reports_moves() {
    let mailbox = inbox_fixture();
    let reconciler = reconciler_for(&mailbox, test_settings());
    let config = Config::default();

    let report = execute_pass(
        &reconciler,
        &config,
        Pass::Triage,
        &ProgressReporter::new(),
        |_, _| Ok("TAK\n".to_string()),
    )
    .await
    .unwrap();

    assert_eq!(report.outcome, RunOutcome::Applied);
    assert_eq!(report.source, "INBOX");
    assert_eq!(report.scanned, 4);
    assert_eq!(report.moved.total(), 4);
    assert_eq!(report.labels_created, vec!["Zakupy", "Inne"]);
    assert!(mailbox.messages_in("INBOX").is_empty());

    // The closing tally names the same folders as the preview
    let summary = report.summary_lines();
    assert!(summary.iter().any(|l| l == "  ✓ Finanse: 2 messages moved"));
    assert!(summary.iter().any(|l| l == "  ✓ Zakupy: 1 messages moved"));
}

#[tokio::test]
async fn test_padded_confirmation_word_moves_nothing() {
    for answer in [" TAK", "TAK ", " TAK\n"] {
        let mailbox = inbox_fixture();
        let reconciler = reconciler_for(&mailbox, test_settings());

        let report = execute_pass(
            &reconciler,
            &Config::default(),
            Pass::Triage,
            &ProgressReporter::new(),
            |_, _| Ok(answer.to_string()),
        )
        .await
        .unwrap();

        assert_eq!(report.outcome, RunOutcome::Cancelled, "{:?}", answer);
        assert_eq!(mailbox.modify_calls(), 0);
        assert_eq!(mailbox.messages_in("INBOX").len(), 4);
    }
}

#[tokio::test]
async fn test_in_memory_mailbox_pagination() {
    let mailbox = InMemoryMailbox::new()
        .with_message("a", "", "", &["INBOX"])
        .with_message("b", "", "", &["INBOX"])
        .with_message("c", "", "", &["INBOX"]);

    let first = mailbox.list_messages("INBOX", 2, None).await.unwrap();
    assert_eq!(first.ids, vec!["a", "b"]);
    assert_eq!(first.next_page_token.as_deref(), Some("2"));

    let second = mailbox
        .list_messages("INBOX", 2, first.next_page_token)
        .await
        .unwrap();
    assert_eq!(second.ids, vec!["c"]);
    assert!(second.next_page_token.is_none());
}

#[tokio::test]
async fn test_in_memory_mailbox_rejects_duplicate_labels() {
    let mailbox = InMemoryMailbox::new().with_label("L1", "Finanse");
    assert!(mailbox.create_label("Finanse").await.is_err());
    assert!(mailbox.create_label("Zakupy").await.is_ok());
    assert_eq!(mailbox.created_labels(), vec!["Zakupy"]);
}

#[tokio::test]
async fn test_dry_run_pass_never_prompts() {
    let reconciler = Reconciler::new(Box::new(gated_mock()), dry_run_settings());

    let report = execute_pass(
        &reconciler,
        &Config::default(),
        Pass::Triage,
        &ProgressReporter::new(),
        |_, _| panic!("dry run must not ask for confirmation"),
    )
    .await
    .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.outcome, RunOutcome::Previewed);
    assert_eq!(report.scanned, 1);
}
