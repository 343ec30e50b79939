mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use chatrelay::{
    DirectoryEntry, DispatchLoop, DispatchOutcome, MessageHandle, OutgoingContent, QueueMode,
    RelayError, ResolutionError,
};
use common::{friend, room, stranger, Harness, MockClient};

fn dispatcher(harness: &Harness) -> DispatchLoop {
    DispatchLoop::new(Arc::clone(&harness.ctx), Duration::from_secs(3))
}

#[tokio::test]
async fn test_remark_queue_message_is_sent_and_logged() {
    let dad = friend("u-dad", "Dad", Some("dad"));
    let harness = Harness::new(MockClient::new().with_alias("dad", vec![dad.clone()]));
    harness.queue.add_member("remark_list", "dad");
    harness.queue.push_back("dad", "hello");

    let processed = dispatcher(&harness).tick().await;

    assert_eq!(processed, 1);
    assert_eq!(
        harness.client.sent(),
        vec![(dad, OutgoingContent::Text("hello".to_string()))]
    );
    assert_eq!(harness.ctx.recall_window.len("u-dad"), 1);
    assert_eq!(harness.queue.pending("dad"), 0);

    let log = harness.rolling_log();
    assert_eq!(log.lines().count(), 1);
    assert!(log.trim_end().ends_with(" | from(me), to(dad): hello"), "{}", log);
    assert_eq!(harness.audit_log(), log);

    let echo = harness.ctx.echo_cache.get("sent-1").unwrap();
    assert_eq!(echo.to, "dad");
    assert_eq!(echo.text, "hello");
}

#[tokio::test]
async fn test_queue_is_drained_in_order_within_one_tick() {
    let dad = friend("u-dad", "Dad", Some("dad"));
    let harness = Harness::new(MockClient::new().with_alias("dad", vec![dad]));
    harness.queue.add_member("remark_list", "dad");
    harness.queue.push_back("dad", "one");
    harness.queue.push_back("dad", "two");
    harness.queue.push_back("dad", "three");

    assert_eq!(dispatcher(&harness).tick().await, 3);

    let texts: Vec<_> = harness
        .client
        .sent()
        .into_iter()
        .map(|(_, content)| content)
        .collect();
    assert_eq!(
        texts,
        vec![
            OutgoingContent::Text("one".to_string()),
            OutgoingContent::Text("two".to_string()),
            OutgoingContent::Text("three".to_string()),
        ]
    );
    assert_eq!(harness.client.directory_queries(), 1);
}

#[tokio::test]
async fn test_ad_hoc_individual_resolved_by_alias() {
    let bob = friend("u-bob", "Robert", Some("Bob"));
    let harness = Harness::new(MockClient::new().with_alias("Bob", vec![bob.clone()]));
    harness.queue.push_back("other", "#Bob#hi there");

    let processed = dispatcher(&harness).tick().await;

    assert_eq!(processed, 1);
    assert_eq!(
        harness.client.sent(),
        vec![(bob, OutgoingContent::Text("hi there".to_string()))]
    );
    assert!(harness
        .rolling_log()
        .contains("from(me), to(Bob): hi there"));
}

#[tokio::test]
async fn test_ad_hoc_group_message() {
    let team = room("g-team", "Team");
    let harness = Harness::new(MockClient::new().with_group("Team", team.clone(), "Team"));
    harness.queue.push_back("group", "#Team#standup in 5");

    dispatcher(&harness).tick().await;

    assert_eq!(
        harness.client.sent(),
        vec![(team, OutgoingContent::Text("standup in 5".to_string()))]
    );
    assert_eq!(harness.ctx.recall_window.len("g-team"), 1);
}

#[tokio::test]
async fn test_revoke_recalls_most_recent_send_only() {
    let dad = friend("u-dad", "Dad", Some("dad"));
    let harness = Harness::new(MockClient::new().with_alias("dad", vec![dad]));
    harness.queue.add_member("remark_list", "dad");
    harness.queue.push_back("dad", "first");
    harness.queue.push_back("dad", "second");
    harness.queue.push_back("dad", "revoke");

    dispatcher(&harness).tick().await;

    assert_eq!(harness.client.sent().len(), 2);
    assert_eq!(harness.client.recalled(), vec![MessageHandle::new("sent-2")]);
    assert_eq!(harness.ctx.recall_window.len("u-dad"), 1);
}

#[tokio::test]
async fn test_revoke_with_nothing_recent_is_a_no_op() {
    let dad = friend("u-dad", "Dad", Some("dad"));
    let harness = Harness::new(MockClient::new().with_alias("dad", vec![dad]));
    let dispatch = dispatcher(&harness);

    let outcome = dispatch
        .process("dad", QueueMode::Normal, "recall")
        .await
        .unwrap();

    assert_eq!(
        outcome,
        DispatchOutcome::NothingToRevoke {
            label: "dad".to_string()
        }
    );
    assert!(harness.client.recalled().is_empty());
    assert!(harness.client.sent().is_empty());
}

#[tokio::test]
async fn test_revoke_outside_window_is_a_no_op() {
    let dad = friend("u-dad", "Dad", Some("dad"));
    let harness = Harness::new(MockClient::new().with_alias("dad", vec![dad]));
    let dispatch = dispatcher(&harness);

    dispatch
        .process("dad", QueueMode::Normal, "hello")
        .await
        .unwrap();
    harness.clock.advance(Duration::from_secs(121));
    let outcome = dispatch
        .process("dad", QueueMode::Normal, "revoke")
        .await
        .unwrap();

    assert!(matches!(outcome, DispatchOutcome::NothingToRevoke { .. }));
    assert!(harness.client.recalled().is_empty());
}

#[tokio::test]
async fn test_ambiguous_ad_hoc_label_drops_message() {
    let harness = Harness::new(MockClient::new().with_name(
        "Zoe",
        vec![friend("u-z1", "Zoe", None), friend("u-z2", "Zoe", None)],
    ));
    let dispatch = dispatcher(&harness);

    let err = dispatch
        .process("other", QueueMode::Other, "#Zoe#hi")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RelayError::Resolution(ResolutionError::Ambiguous { matches: 2, .. })
    ));
    assert!(harness.client.sent().is_empty());
    assert_eq!(harness.rolling_log(), "");
}

#[tokio::test]
async fn test_unknown_remark_drops_message_and_continues() {
    let dad = friend("u-dad", "Dad", Some("dad"));
    let harness = Harness::new(MockClient::new().with_alias("dad", vec![dad]));
    harness.queue.add_member("remark_list", "ghost");
    harness.queue.add_member("remark_list", "dad");
    harness.queue.push_back("ghost", "anyone there?");
    harness.queue.push_back("dad", "hello");

    let processed = dispatcher(&harness).tick().await;

    assert_eq!(processed, 2);
    assert_eq!(harness.client.sent().len(), 1);
    assert_eq!(harness.queue.pending("ghost"), 0);
}

#[tokio::test]
async fn test_malformed_ad_hoc_body_is_dropped() {
    let harness = Harness::new(MockClient::new());
    harness.queue.push_back("other", "no delimiters here");
    harness.queue.push_back("group", "#Team");

    let processed = dispatcher(&harness).tick().await;

    assert_eq!(processed, 2);
    assert!(harness.client.sent().is_empty());
    assert_eq!(harness.client.directory_queries(), 0);
    assert_eq!(harness.client.group_queries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_transport_failure_records_nothing() {
    let dad = friend("u-dad", "Dad", Some("dad"));
    let harness = Harness::new(MockClient::new().with_alias("dad", vec![dad]));
    harness.client.fail_sends.store(true, Ordering::SeqCst);

    let err = dispatcher(&harness)
        .process("dad", QueueMode::Normal, "hello")
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::Transport(_)));
    assert_eq!(harness.ctx.recall_window.len("u-dad"), 0);
    assert!(harness.ctx.echo_cache.is_empty());
    assert_eq!(harness.rolling_log(), "");
}

#[tokio::test]
async fn test_send_to_non_friend_still_goes_out() {
    let someone = stranger("u-x", "Xavier");
    let harness = Harness::new(MockClient::new().with_alias("xav", vec![someone.clone()]));
    harness.queue.add_member("remark_list", "xav");
    harness.queue.push_back("xav", "hi");

    dispatcher(&harness).tick().await;
    common::settle().await;

    assert_eq!(
        harness.client.sent(),
        vec![(someone, OutgoingContent::Text("hi".to_string()))]
    );
    assert_eq!(harness.client.syncs(), 1);
}

#[tokio::test]
async fn test_send_file_command() {
    let dad = friend("u-dad", "Dad", Some("dad"));
    let harness = Harness::new(MockClient::new().with_alias("dad", vec![dad.clone()]));

    dispatcher(&harness)
        .process("dad", QueueMode::Normal, "sz /tmp/report.pdf")
        .await
        .unwrap();

    assert_eq!(
        harness.client.sent(),
        vec![(dad, OutgoingContent::File("/tmp/report.pdf".into()))]
    );
    assert!(harness
        .rolling_log()
        .contains("from(me), to(dad): sz /tmp/report.pdf"));
}

#[tokio::test]
async fn test_contact_search_is_delivered_to_self() {
    let dad = friend("u-dad", "Dad", Some("dad"));
    let client = MockClient::new()
        .with_alias("dad", vec![dad])
        .with_directory(vec![
            friend("u1", "Wu Lei", Some("lei")),
            friend("u2", "Sally", Some("sal")),
            friend("u3", "Carol", None),
        ]);
    let harness = Harness::new(client);
    harness.ctx.dump_directory().await;

    let outcome = dispatcher(&harness)
        .process("dad", QueueMode::Normal, "contact al")
        .await
        .unwrap();

    assert_eq!(
        outcome,
        DispatchOutcome::SearchDelivered {
            query: "al".to_string(),
            matches: 1,
        }
    );
    let sent = harness.client.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(&sent[0].0, harness.client.me());
    let OutgoingContent::Text(payload) = &sent[0].1 else {
        panic!("expected a text payload");
    };
    let entries: Vec<DirectoryEntry> = serde_json::from_str(payload).unwrap();
    assert_eq!(entries, vec![DirectoryEntry::new("Sally", "sal")]);
    assert_eq!(harness.rolling_log(), "");
}

#[tokio::test]
async fn test_reserved_keys_drained_without_registration() {
    let bob = friend("u-bob", "Bob", None);
    let harness = Harness::new(MockClient::new().with_name("Bob", vec![bob]));
    harness.queue.push_back("other", "#Bob#ping");

    assert_eq!(dispatcher(&harness).tick().await, 1);
    assert_eq!(harness.client.sent().len(), 1);
}
