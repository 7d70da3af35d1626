use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use devhub_sync::approval::Plan;
use devhub_sync::config::ClientOptions;
use devhub_sync::error::Error;
use devhub_sync::model::{
    ConnectionDescriptor, DbKind, OriginTable, SubscriptionTier, User, UserStatus,
};
use devhub_sync::DevHub;

fn test_hub(dir: &TempDir) -> DevHub {
    let options = ClientOptions::default().with_storage_path(dir.path().join("connections.json"));
    DevHub::with_options(options)
}

fn descriptor(server_uri: &str) -> ConnectionDescriptor {
    ConnectionDescriptor::new("Acme", "Acme SaaS", DbKind::Supabase)
        .with_api_url(server_uri)
        .with_api_key("sk_test_key")
}

fn pending_registration(desc: &ConnectionDescriptor, remote_id: &str, name: &str, email: &str) -> User {
    User {
        id: format!("REG-{}", remote_id),
        remote_id: remote_id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        phone: None,
        source_app_id: desc.id.clone(),
        source_app_name: desc.name.clone(),
        origin: OriginTable::Registrations,
        status: UserStatus::Pending,
        tier: SubscriptionTier::Free,
        subscription_end: None,
        registered_at: None,
        last_active: None,
        reason: None,
    }
}

fn active_user(desc: &ConnectionDescriptor, remote_id: &str, name: &str, email: &str) -> User {
    User {
        id: format!("USR-{}", remote_id),
        remote_id: remote_id.to_string(),
        origin: OriginTable::Users,
        status: UserStatus::Active,
        ..pending_registration(desc, remote_id, name, email)
    }
}

fn seed(hub: &DevHub, users: Vec<User>) {
    let generation = hub.store().begin_cycle();
    hub.store().apply(generation, users);
}

#[tokio::test]
async fn approve_moves_the_row_and_projects_locally() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .and(header("apikey", "sk_test_key"))
        .and(header("Authorization", "Bearer sk_test_key"))
        .and(header("Prefer", "return=minimal"))
        .and(body_partial_json(json!({"email": "ann@x.com", "role": "member"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/registrations"))
        .and(query_param("id", "eq.7"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let hub = test_hub(&dir);
    let desc = descriptor(&server.uri());
    seed(&hub, vec![pending_registration(&desc, "7", "Ann", "ann@x.com")]);
    hub.registry().add(desc).unwrap();

    hub.approvals().approve("REG-7").await.unwrap();

    let users = hub.store().snapshot();
    assert_eq!(users.len(), 1);
    let ann = &users[0];
    assert_eq!(ann.email, "ann@x.com");
    assert_eq!(ann.status, UserStatus::Active);
    assert_eq!(ann.origin, OriginTable::Users);
    assert!(ann.id.starts_with("USR-"));
    assert!(ann.subscription_end.is_some());
}

#[tokio::test]
async fn failed_insert_leaves_the_registration_untouched() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(500).set_body_string("insert failed"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let hub = test_hub(&dir);
    let desc = descriptor(&server.uri());
    seed(&hub, vec![pending_registration(&desc, "7", "Ann", "ann@x.com")]);
    hub.registry().add(desc).unwrap();

    let err = hub.approvals().approve("REG-7").await.unwrap_err();
    assert!(matches!(err, Error::RemoteRejected { .. }));

    // The delete step must never have been attempted.
    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.method.to_string() != "DELETE"));

    let users = hub.store().snapshot();
    assert_eq!(users[0].status, UserStatus::Pending);
    assert_eq!(users[0].origin, OriginTable::Registrations);
}

#[tokio::test]
async fn failed_delete_after_insert_is_a_partial_mutation() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/registrations"))
        .respond_with(ResponseTemplate::new(500).set_body_string("delete failed"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let hub = test_hub(&dir);
    let desc = descriptor(&server.uri());
    seed(&hub, vec![pending_registration(&desc, "7", "Ann", "ann@x.com")]);
    hub.registry().add(desc).unwrap();

    let err = hub.approvals().approve("REG-7").await.unwrap_err();
    assert!(matches!(err, Error::PartialMutation(_)));
}

#[tokio::test]
async fn reject_patches_the_status_column_in_place() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/registrations"))
        .and(query_param("id", "eq.7"))
        .and(body_partial_json(json!({"status": "rejected"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let hub = test_hub(&dir);
    let desc = descriptor(&server.uri());
    seed(&hub, vec![pending_registration(&desc, "7", "Ann", "ann@x.com")]);
    hub.registry().add(desc).unwrap();

    hub.approvals().reject("REG-7").await.unwrap();

    let users = hub.store().snapshot();
    assert_eq!(users[0].status, UserStatus::Suspended);
    assert_eq!(users[0].origin, OriginTable::Registrations);
}

#[tokio::test]
async fn extend_subscription_matches_on_email() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .and(query_param("email", "eq.budi@x.com"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let hub = test_hub(&dir);
    let desc = descriptor(&server.uri());
    seed(&hub, vec![active_user(&desc, "u-1", "Budi", "budi@x.com")]);
    hub.registry().add(desc).unwrap();

    hub.approvals()
        .extend_subscription("USR-u-1", Plan::Monthly)
        .await
        .unwrap();

    let users = hub.store().snapshot();
    assert_eq!(users[0].status, UserStatus::Active);
    assert!(users[0].subscription_end.is_some());
}

#[tokio::test]
async fn extend_rejects_registration_origin_users() {
    let dir = TempDir::new().unwrap();
    let hub = test_hub(&dir);
    let desc = descriptor("http://unused.test");
    seed(&hub, vec![pending_registration(&desc, "7", "Ann", "ann@x.com")]);
    hub.registry().add(desc).unwrap();

    let err = hub
        .approvals()
        .extend_subscription("REG-7", Plan::Weekly)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConfigInvalid(_)));
}

#[tokio::test]
async fn bulk_approve_continues_past_a_failing_insert() {
    let server = MockServer::start().await;

    // The middle registration's insert is rejected; the others succeed.
    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .and(body_partial_json(json!({"email": "bad@x.com"})))
        .respond_with(ResponseTemplate::new(500).set_body_string("duplicate"))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/registrations"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let hub = test_hub(&dir);
    let desc = descriptor(&server.uri());
    seed(
        &hub,
        vec![
            pending_registration(&desc, "1", "Ann", "ann@x.com"),
            pending_registration(&desc, "2", "Bad", "bad@x.com"),
            pending_registration(&desc, "3", "Carol", "carol@x.com"),
        ],
    );
    hub.registry().add(desc).unwrap();

    let outcomes = hub.approvals().approve_all_pending().await;
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes.iter().filter(|o| o.result.is_ok()).count(), 2);
    assert!(outcomes
        .iter()
        .find(|o| o.email == "bad@x.com")
        .unwrap()
        .result
        .is_err());

    let users = hub.store().snapshot();
    let still_pending: Vec<_> = users
        .iter()
        .filter(|u| u.status == UserStatus::Pending)
        .collect();
    assert_eq!(still_pending.len(), 1);
    assert_eq!(still_pending[0].email, "bad@x.com");
    assert_eq!(
        users.iter().filter(|u| u.status == UserStatus::Active).count(),
        2
    );
}
