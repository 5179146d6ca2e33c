use privd_core::{AdminError, EngineConfig, PolicyError};
use privd_policy::{
    AdminCaller, PolicyBatch, PolicyKey, PolicyKeyFilter, PolicyOperation, PolicyRecord,
    PolicyResult, PrivilegeService, Query, Verdict, ROOT_BUCKET,
};

fn service() -> PrivilegeService {
    PrivilegeService::initialize(EngineConfig::default()).unwrap()
}

fn upsert(
    bucket: &str,
    client: &str,
    user: &str,
    privilege: &str,
    result: PolicyResult,
) -> PolicyOperation {
    PolicyOperation::Upsert {
        bucket: bucket.to_string(),
        record: PolicyRecord::new(PolicyKey::parse(client, user, privilege).unwrap(), result),
    }
}

fn set_bucket(bucket: &str, default: PolicyResult) -> PolicyOperation {
    PolicyOperation::SetBucket {
        bucket: bucket.to_string(),
        default,
    }
}

fn apply(service: &PrivilegeService, operations: Vec<PolicyOperation>) {
    service
        .set_policies(&AdminCaller::Trusted, &PolicyBatch::new(operations))
        .unwrap();
}

fn verdict(service: &PrivilegeService, client: &str, user: &str, privilege: &str) -> Verdict {
    service
        .check(&Query::new(client, "session", user, privilege))
        .unwrap()
        .verdict
}

#[test]
fn cyclic_chain_fails_with_chain_too_deep() {
    let service = service();
    apply(
        &service,
        vec![
            set_bucket("a", PolicyResult::deny()),
            set_bucket("b", PolicyResult::deny()),
            upsert(ROOT_BUCKET, "*", "*", "*", PolicyResult::bucket("a")),
            upsert("a", "*", "*", "*", PolicyResult::bucket("b")),
            upsert("b", "*", "*", "*", PolicyResult::bucket("a")),
        ],
    );

    let err = service
        .check(&Query::new("app", "s", "alice", "read"))
        .unwrap_err();
    assert!(matches!(err, PolicyError::ChainTooDeep { limit: 16, .. }));
    assert_eq!(err.code(), -4);
}

#[test]
fn exact_client_outranks_wildcard() {
    let service = service();
    apply(
        &service,
        vec![
            upsert(ROOT_BUCKET, "*", "*", "read", PolicyResult::deny()),
            upsert(ROOT_BUCKET, "app1", "*", "read", PolicyResult::allow()),
        ],
    );

    assert_eq!(verdict(&service, "app1", "alice", "read"), Verdict::Allow);
    assert_eq!(verdict(&service, "app2", "alice", "read"), Verdict::Deny);
}

#[test]
fn empty_bucket_falls_back_to_default() {
    let service = service();
    apply(
        &service,
        vec![
            set_bucket("empty", PolicyResult::deny()),
            upsert(ROOT_BUCKET, "*", "*", "*", PolicyResult::bucket("empty")),
        ],
    );

    assert_eq!(verdict(&service, "app", "alice", "read"), Verdict::Deny);
}

#[test]
fn chained_bucket_decides() {
    let service = service();
    apply(
        &service,
        vec![
            set_bucket("A", PolicyResult::deny()),
            set_bucket("B", PolicyResult::allow()),
            upsert(ROOT_BUCKET, "*", "*", "*", PolicyResult::bucket("A")),
            upsert("A", "*", "*", "*", PolicyResult::bucket("B")),
        ],
    );

    assert_eq!(verdict(&service, "app", "alice", "read"), Verdict::Allow);
}

#[test]
fn failed_batch_leaves_store_untouched() {
    let service = service();
    apply(&service, vec![set_bucket("apps", PolicyResult::deny())]);
    let before = service.snapshot();

    let batch = PolicyBatch::new(vec![
        upsert("apps", "app", "*", "*", PolicyResult::allow()),
        upsert("apps", "app", "*", "*", PolicyResult::bucket("missing")),
    ]);
    let err = service
        .set_policies(&AdminCaller::Trusted, &batch)
        .unwrap_err();

    assert!(matches!(err, AdminError::Policy(PolicyError::InvalidResult(_))));
    assert_eq!(err.code(), -2);
    assert_eq!(*service.snapshot(), *before);
}

#[test]
fn cached_decision_never_outlives_mutation() {
    let service = service();
    apply(
        &service,
        vec![
            set_bucket("X", PolicyResult::deny()),
            upsert(ROOT_BUCKET, "*", "*", "*", PolicyResult::bucket("X")),
        ],
    );

    assert_eq!(verdict(&service, "app", "alice", "read"), Verdict::Deny);
    assert_eq!(verdict(&service, "app", "alice", "read"), Verdict::Deny);
    assert_eq!(service.stats().cache.hits, 1);

    apply(&service, vec![set_bucket("X", PolicyResult::allow())]);
    assert_eq!(verdict(&service, "app", "alice", "read"), Verdict::Allow);
}

#[test]
fn unrelated_cache_entries_survive_scoped_invalidation() {
    let service = service();
    apply(
        &service,
        vec![
            set_bucket("X", PolicyResult::deny()),
            set_bucket("Y", PolicyResult::allow()),
            upsert(ROOT_BUCKET, "x", "*", "*", PolicyResult::bucket("X")),
            upsert(ROOT_BUCKET, "y", "*", "*", PolicyResult::bucket("Y")),
        ],
    );
    verdict(&service, "x", "alice", "read");
    verdict(&service, "y", "alice", "read");

    apply(&service, vec![set_bucket("X", PolicyResult::allow())]);
    assert_eq!(service.queries().cache().len(), 1);

    assert_eq!(verdict(&service, "y", "alice", "read"), Verdict::Allow);
    assert_eq!(service.stats().cache.hits, 1);
    assert_eq!(verdict(&service, "x", "alice", "read"), Verdict::Allow);
}

#[test]
fn insert_then_remove_round_trip() {
    let service = service();
    apply(
        &service,
        vec![upsert(ROOT_BUCKET, "app", "alice", "camera", PolicyResult::allow())],
    );
    assert_eq!(verdict(&service, "app", "alice", "camera"), Verdict::Allow);

    apply(
        &service,
        vec![PolicyOperation::Remove {
            bucket: ROOT_BUCKET.to_string(),
            key: PolicyKey::parse("app", "alice", "camera").unwrap(),
        }],
    );
    assert_eq!(verdict(&service, "app", "alice", "camera"), Verdict::Deny);
}

#[test]
fn removing_bucket_removes_links() {
    let service = service();
    apply(
        &service,
        vec![
            set_bucket("apps", PolicyResult::allow()),
            upsert(ROOT_BUCKET, "*", "*", "*", PolicyResult::bucket("apps")),
        ],
    );
    assert_eq!(verdict(&service, "app", "alice", "read"), Verdict::Allow);

    apply(
        &service,
        vec![PolicyOperation::RemoveBucket {
            bucket: "apps".to_string(),
        }],
    );
    assert_eq!(verdict(&service, "app", "alice", "read"), Verdict::Deny);
    assert!(service
        .list_policies(&AdminCaller::Trusted, ROOT_BUCKET, &PolicyKeyFilter::any())
        .unwrap()
        .is_empty());
}

#[test]
fn erase_recursively_through_links() {
    let service = service();
    apply(
        &service,
        vec![
            set_bucket("apps", PolicyResult::deny()),
            upsert(ROOT_BUCKET, "*", "*", "*", PolicyResult::bucket("apps")),
            upsert(ROOT_BUCKET, "browser", "*", "net", PolicyResult::allow()),
            upsert("apps", "browser", "*", "camera", PolicyResult::allow()),
            upsert("apps", "mail", "*", "net", PolicyResult::allow()),
        ],
    );

    apply(
        &service,
        vec![PolicyOperation::Erase {
            bucket: ROOT_BUCKET.to_string(),
            recursive: true,
            filter: PolicyKeyFilter::parse("browser", "#", "#").unwrap(),
        }],
    );

    assert_eq!(verdict(&service, "browser", "alice", "net"), Verdict::Deny);
    assert_eq!(verdict(&service, "browser", "alice", "camera"), Verdict::Deny);
    assert_eq!(verdict(&service, "mail", "alice", "net"), Verdict::Allow);
}

#[test]
fn ask_carries_metadata_and_is_not_cached() {
    let service = service();
    apply(
        &service,
        vec![upsert(
            ROOT_BUCKET,
            "app",
            "*",
            "location",
            PolicyResult::ask(Some("prompt-user".to_string())),
        )],
    );

    let decision = service
        .check(&Query::new("app", "s", "alice", "location"))
        .unwrap();
    assert_eq!(decision.verdict, Verdict::Ask);
    assert_eq!(decision.verdict.code(), 4);
    assert_eq!(decision.extra.as_deref(), Some("prompt-user"));
    assert!(service.queries().cache().is_empty());
}

#[test]
fn malformed_operations_are_validation_errors() {
    let service = service();

    let err = service
        .set_policies(
            &AdminCaller::Trusted,
            &PolicyBatch::new(vec![set_bucket("bad name", PolicyResult::deny())]),
        )
        .unwrap_err();
    assert_eq!(err.code(), -5);

    let err = service
        .set_policies(
            &AdminCaller::Trusted,
            &PolicyBatch::new(vec![PolicyOperation::RemoveBucket {
                bucket: ROOT_BUCKET.to_string(),
            }]),
        )
        .unwrap_err();
    assert!(matches!(err, AdminError::Validation(_)));

    let err = service
        .set_policies(
            &AdminCaller::Trusted,
            &PolicyBatch::new(vec![PolicyOperation::RemoveBucket {
                bucket: "ghost".to_string(),
            }]),
        )
        .unwrap_err();
    assert_eq!(err.code(), -1);
}

#[test]
fn batch_file_drives_the_service() {
    let service = service();
    let batch = PolicyBatch::from_toml_str(
        r#"
[[operations]]
op = "set_bucket"
bucket = "apps"
result = "ALLOW"
result_extra = "granted by apps"

[[operations]]
op = "upsert"
bucket = ""
client = "app*"
user = "*"
privilege = "*"
result = "BUCKET"
result_extra = "apps"
"#,
    )
    .unwrap();
    service.set_policies(&AdminCaller::Trusted, &batch).unwrap();

    let decision = service
        .check(&Query::new("app-store", "s", "alice", "net"))
        .unwrap();
    assert_eq!(decision.verdict, Verdict::Allow);
    assert_eq!(decision.extra.as_deref(), Some("granted by apps"));
    assert_eq!(verdict(&service, "other", "alice", "net"), Verdict::Deny);
}
