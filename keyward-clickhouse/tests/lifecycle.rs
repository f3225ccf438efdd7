//! Lifecycle tests against a recording fake connector.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use keyward_clickhouse::LifecycleState;
use keyward_core::{
    ChangeExpiration, ChangePassword, CredentialRequest, CredentialResponse, Database,
    DatabaseError, DeleteUserRequest, NewUserRequest, Statements, UpdateUserRequest,
    UsernameMetadata, dispatch,
};
use keyward_template::validate_username;
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{Event, basic_config, config, database, init_request};

fn new_user(statements: &[&str]) -> NewUserRequest {
    NewUserRequest {
        username_config: UsernameMetadata {
            display_name: "token".into(),
            role_name: "reader".into(),
        },
        statements: Statements::new(statements.iter().copied()),
        rollback_statements: Statements::default(),
        password: "Secr3t;pw".into(),
        expiration: Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap(),
    }
}

#[tokio::test]
async fn test_initialize_builds_target_from_fields() {
    let (db, recorder) = database();
    let resp = db.initialize(init_request(basic_config())).await.unwrap();

    assert_eq!(resp.config, basic_config());
    assert_eq!(db.state().await, LifecycleState::Initialized);
    // Opening is deferred until a connection is needed.
    assert_eq!(recorder.opens(), 0);
}

#[tokio::test]
async fn test_initialize_requires_host_and_port() {
    let (db, _) = database();

    let err = db
        .initialize(init_request(config(json!({ "port": 9000 }))))
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Config(ref m) if m.contains("host")));

    let err = db
        .initialize(init_request(config(json!({ "host": "ch" }))))
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Config(ref m) if m.contains("port")));
    assert_eq!(db.state().await, LifecycleState::Uninitialized);
}

#[tokio::test]
async fn test_initialize_substitutes_url_credentials() {
    let (db, recorder) = database();
    db.initialize(init_request(config(json!({
        "connection_url": "clickhouse://{{username}}:{{password}}@ch:9004/default",
        "username": "admin",
        "password": "p@ss word",
        "max_open_connections": "2",
    }))))
    .await
    .unwrap();

    db.new_user(new_user(&["SELECT 1"])).await.unwrap();

    let target = recorder.last_target().unwrap();
    assert_eq!(target.host(), "ch");
    assert_eq!(target.port(), 9004);
    assert_eq!(target.username(), "admin");
    assert_eq!(target.password(), "p@ss word");

    let limits = recorder.last_limits().unwrap();
    assert_eq!(limits.max_open, 2);
    assert_eq!(limits.max_idle, 2);
    assert_eq!(limits.max_lifetime, None);
}

#[tokio::test]
async fn test_initialize_malformed_url() {
    let (db, _) = database();
    let err = db
        .initialize(init_request(config(json!({ "connection_url": "::nope::" }))))
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Config(_)));
}

#[tokio::test]
async fn test_initialize_verify_probes_connection() {
    let (db, recorder) = database();
    let mut req = init_request(basic_config());
    req.verify_connection = true;

    db.initialize(req).await.unwrap();
    assert_eq!(recorder.events(), vec![Event::Open(1), Event::Ping(1)]);
}

#[tokio::test]
async fn test_initialize_verify_failure_is_connectivity() {
    let (db, recorder) = database();
    recorder.fail_pings(true);
    let mut req = init_request(basic_config());
    req.verify_connection = true;

    let err = db.initialize(req).await.unwrap_err();
    assert!(matches!(err, DatabaseError::Connectivity(_)));
    assert_eq!(db.state().await, LifecycleState::Uninitialized);

    let err = db.new_user(new_user(&["SELECT 1"])).await.unwrap_err();
    assert_eq!(err, DatabaseError::NotInitialized);
}

#[tokio::test]
async fn test_initialize_open_failure_is_connectivity() {
    let (db, recorder) = database();
    recorder.fail_opens(true);
    let mut req = init_request(basic_config());
    req.verify_connection = true;

    let err = db.initialize(req).await.unwrap_err();
    assert!(matches!(err, DatabaseError::Connectivity(ref m) if m.contains("connection refused")));
}

#[tokio::test]
async fn test_initialize_invalid_username_template() {
    let (db, _) = database();
    let mut cfg = basic_config();
    cfg.insert("username_template".into(), json!("{{ shout .RoleName }}"));

    let err = db.initialize(init_request(cfg)).await.unwrap_err();
    assert!(matches!(err, DatabaseError::UsernameTemplate(ref m) if m.contains("shout")));
}

#[tokio::test]
async fn test_new_user_requires_statements() {
    let (db, recorder) = database();
    // Checked before anything else, even on an uninitialized instance.
    let err = db.new_user(new_user(&[])).await.unwrap_err();
    assert_eq!(err, DatabaseError::NoCreationStatements);
    assert!(recorder.events().is_empty());
}

#[tokio::test]
async fn test_new_user_before_initialize() {
    let (db, _) = database();
    let err = db.new_user(new_user(&["SELECT 1"])).await.unwrap_err();
    assert_eq!(err, DatabaseError::NotInitialized);
}

#[tokio::test]
async fn test_new_user_executes_substituted_fragments_in_order() {
    let (db, recorder) = database();
    db.initialize(init_request(basic_config())).await.unwrap();

    let resp = db
        .new_user(new_user(&[
            "CREATE USER '{{name}}' IDENTIFIED BY '{{password}}' VALID UNTIL '{{expiration}}';",
            "GRANT reader TO '{{username}}'",
        ]))
        .await
        .unwrap();

    assert!(
        validate_username(&resp.username, r"^v-token-reader-[a-zA-Z0-9]{15}-[0-9]$"),
        "unexpected username {}",
        resp.username
    );

    assert_eq!(
        recorder.executed(),
        vec![
            format!(
                "CREATE USER '{}' IDENTIFIED BY 'Secr3t;pw' VALID UNTIL '2030-01-02 03:04:05'",
                resp.username
            ),
            format!("GRANT reader TO '{}'", resp.username),
        ]
    );
}

#[tokio::test]
async fn test_new_user_custom_template_and_max_length() {
    let (db, recorder) = database();
    let mut cfg = basic_config();
    cfg.insert(
        "username_template".into(),
        json!("{{ .RoleName | uppercase }}_{{ .DisplayName }}_{{ random 10 }}"),
    );
    cfg.insert("username_max_length".into(), json!(14));
    db.initialize(init_request(cfg)).await.unwrap();

    let resp = db.new_user(new_user(&["CREATE USER '{{name}}'"])).await.unwrap();
    assert_eq!(resp.username.len(), 14);
    assert!(resp.username.starts_with("READER_token_"));
    assert_eq!(
        recorder.executed(),
        vec![format!("CREATE USER '{}'", resp.username)]
    );
}

#[tokio::test]
async fn test_new_user_failure_names_fragment_and_keeps_earlier_work() {
    let (db, recorder) = database();
    db.initialize(init_request(basic_config())).await.unwrap();
    recorder.fail_on("GRANT", "role reader does not exist");

    let err = db
        .new_user(new_user(&[
            "CREATE USER '{{name}}'; GRANT reader TO '{{name}}'; SET ROLE reader",
        ]))
        .await
        .unwrap_err();

    match err {
        DatabaseError::Execution { statement, message } => {
            assert!(statement.starts_with("GRANT reader TO 'v-token-reader-"));
            assert_eq!(message, "role reader does not exist");
        }
        other => panic!("expected execution error, got {other:?}"),
    }

    // The CREATE ran and is not undone; the SET ROLE never ran.
    let executed = recorder.executed();
    assert_eq!(executed.len(), 1);
    assert!(executed[0].starts_with("CREATE USER"));
}

#[tokio::test]
async fn test_new_user_markers_in_display_name_stay_literal() {
    let (db, recorder) = database();
    let mut cfg = basic_config();
    cfg.insert("username_template".into(), json!("v-{{ .DisplayName }}"));
    db.initialize(init_request(cfg)).await.unwrap();

    let mut req = new_user(&["CREATE USER '{{name}}' IDENTIFIED BY '{{password}}'"]);
    req.username_config.display_name = "{{password}}".into();
    let resp = db.new_user(req).await.unwrap();

    assert_eq!(resp.username, "v-{{password}}");
    assert_eq!(
        recorder.executed(),
        vec!["CREATE USER 'v-{{password}}' IDENTIFIED BY 'Secr3t;pw'".to_string()]
    );
}

#[tokio::test]
async fn test_cancelled_call_keeps_completed_fragments_and_releases_lock() {
    let (db, recorder) = database();
    db.initialize(init_request(basic_config())).await.unwrap();
    recorder.set_delay(Duration::from_millis(100));

    let cancelled = tokio::time::timeout(
        Duration::from_millis(150),
        db.new_user(new_user(&["A 1; A 2; A 3"])),
    )
    .await;
    assert!(cancelled.is_err());

    assert_eq!(recorder.executed(), vec!["A 1".to_string()]);
    assert!(!recorder
        .events()
        .iter()
        .any(|e| matches!(e, Event::Start(_, s) if s == "A 3")));

    recorder.set_delay(Duration::ZERO);
    recorder.clear();
    db.new_user(new_user(&["SELECT 1"])).await.unwrap();
    assert_eq!(recorder.opens(), 0);
    assert_eq!(recorder.executed(), vec!["SELECT 1".to_string()]);
    assert_eq!(db.state().await, LifecycleState::Initialized);
}

#[tokio::test]
async fn test_update_user_requires_changes() {
    let (db, _) = database();
    db.initialize(init_request(basic_config())).await.unwrap();

    let err = db
        .update_user(UpdateUserRequest {
            username: "u".into(),
            password: None,
            expiration: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err, DatabaseError::NoChanges);
}

#[tokio::test]
async fn test_update_user_password_uses_default_statement() {
    let (db, recorder) = database();
    db.initialize(init_request(basic_config())).await.unwrap();

    db.update_user(UpdateUserRequest {
        username: "v-user".into(),
        password: Some(ChangePassword {
            new_password: "n3w".into(),
            statements: Statements::default(),
        }),
        expiration: None,
    })
    .await
    .unwrap();

    assert_eq!(
        recorder.executed(),
        vec!["ALTER USER IF EXISTS 'v-user' IDENTIFIED BY 'n3w'".to_string()]
    );
}

#[tokio::test]
async fn test_update_user_expiration() {
    let (db, recorder) = database();
    db.initialize(init_request(basic_config())).await.unwrap();
    let expiration = Utc.with_ymd_and_hms(2031, 6, 7, 8, 9, 10).unwrap();

    // Without renewal statements nothing runs.
    db.update_user(UpdateUserRequest {
        username: "v-user".into(),
        password: None,
        expiration: Some(ChangeExpiration {
            new_expiration: expiration,
            statements: Statements::default(),
        }),
    })
    .await
    .unwrap();
    assert!(recorder.executed().is_empty());

    db.update_user(UpdateUserRequest {
        username: "v-user".into(),
        password: None,
        expiration: Some(ChangeExpiration {
            new_expiration: expiration,
            statements: Statements::new(["ALTER USER '{{name}}' VALID UNTIL '{{expiration}}'"]),
        }),
    })
    .await
    .unwrap();
    assert_eq!(
        recorder.executed(),
        vec!["ALTER USER 'v-user' VALID UNTIL '2031-06-07 08:09:10'".to_string()]
    );
}

#[tokio::test]
async fn test_update_user_password_then_expiration() {
    let (db, recorder) = database();
    db.initialize(init_request(basic_config())).await.unwrap();

    db.update_user(UpdateUserRequest {
        username: "v-user".into(),
        password: Some(ChangePassword {
            new_password: "pw".into(),
            statements: Statements::new(["ALTER USER '{{name}}' IDENTIFIED BY '{{password}}'"]),
        }),
        expiration: Some(ChangeExpiration {
            new_expiration: Utc.with_ymd_and_hms(2031, 1, 1, 0, 0, 0).unwrap(),
            statements: Statements::new(["ALTER USER '{{name}}' VALID UNTIL '{{expiration}}'"]),
        }),
    })
    .await
    .unwrap();

    assert_eq!(
        recorder.executed(),
        vec![
            "ALTER USER 'v-user' IDENTIFIED BY 'pw'".to_string(),
            "ALTER USER 'v-user' VALID UNTIL '2031-01-01 00:00:00'".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_delete_user_default_statement() {
    let (db, recorder) = database();
    db.initialize(init_request(basic_config())).await.unwrap();

    db.delete_user(DeleteUserRequest {
        username: "v-user".into(),
        statements: Statements::default(),
    })
    .await
    .unwrap();

    assert_eq!(
        recorder.executed(),
        vec!["DROP USER IF EXISTS 'v-user'".to_string()]
    );
}

#[tokio::test]
async fn test_delete_user_failure_is_revocation() {
    let (db, recorder) = database();
    db.initialize(init_request(basic_config())).await.unwrap();
    recorder.fail_on("DROP", "access denied");

    let err = db
        .delete_user(DeleteUserRequest {
            username: "v-user".into(),
            statements: Statements::new(["REVOKE ALL ON *.* FROM '{{name}}'; DROP USER '{{name}}'"]),
        })
        .await
        .unwrap_err();

    match err {
        DatabaseError::Revocation { username, source } => {
            assert_eq!(username, "v-user");
            assert!(source.is_execution());
        }
        other => panic!("expected revocation error, got {other:?}"),
    }
    assert_eq!(
        recorder.executed(),
        vec!["REVOKE ALL ON *.* FROM 'v-user'".to_string()]
    );
}

#[tokio::test]
async fn test_connection_reused_then_replaced_when_stale() {
    let (db, recorder) = database();
    db.initialize(init_request(basic_config())).await.unwrap();

    db.new_user(new_user(&["SELECT 1"])).await.unwrap();
    db.new_user(new_user(&["SELECT 2"])).await.unwrap();
    assert_eq!(recorder.opens(), 1);

    recorder.go_stale();
    recorder.clear();
    db.new_user(new_user(&["SELECT 3"])).await.unwrap();

    assert_eq!(
        recorder.events(),
        vec![
            Event::Ping(1),
            Event::Close(1),
            Event::Open(2),
            Event::Start(2, "SELECT 3".into()),
            Event::End(2, "SELECT 3".into()),
        ]
    );
}

#[tokio::test]
async fn test_close_is_idempotent_and_terminal() {
    let (db, recorder) = database();
    db.initialize(init_request(basic_config())).await.unwrap();
    db.new_user(new_user(&["SELECT 1"])).await.unwrap();

    db.close().await.unwrap();
    db.close().await.unwrap();
    assert_eq!(
        recorder
            .events()
            .iter()
            .filter(|e| matches!(e, Event::Close(_)))
            .count(),
        1
    );
    assert_eq!(db.state().await, LifecycleState::Closed);

    let err = db.new_user(new_user(&["SELECT 1"])).await.unwrap_err();
    assert_eq!(err, DatabaseError::Closed);
    let err = db.initialize(init_request(basic_config())).await.unwrap_err();
    assert_eq!(err, DatabaseError::Closed);
}

#[tokio::test]
async fn test_reinitialize_releases_previous_connection() {
    let (db, recorder) = database();
    db.initialize(init_request(basic_config())).await.unwrap();
    db.new_user(new_user(&["SELECT 1"])).await.unwrap();

    db.initialize(init_request(basic_config())).await.unwrap();
    assert!(recorder.events().contains(&Event::Close(1)));

    db.new_user(new_user(&["SELECT 2"])).await.unwrap();
    assert_eq!(recorder.opens(), 2);
}

#[tokio::test]
async fn test_sanitized_errors_scrub_admin_password() {
    let (db, recorder) = database();
    let db = db.sanitized();
    db.initialize(init_request(basic_config())).await.unwrap();
    recorder.fail_on("CREATE", "login as admin:hunter2-admin rejected");

    let err = db
        .new_user(new_user(&["CREATE USER '{{name}}'"]))
        .await
        .unwrap_err();
    let text = err.to_string();
    assert!(!text.contains("hunter2-admin"));
    assert!(text.contains("[password]"));
}

#[tokio::test]
async fn test_secret_values_cover_url_password() {
    let (db, _) = database();
    db.initialize(init_request(config(json!({
        "connection_url": "clickhouse://admin:embedded-pw@ch:9004",
    }))))
    .await
    .unwrap();

    let secrets = db.secret_values();
    assert!(secrets.iter().any(|(secret, _)| secret == "embedded-pw"));
}

#[tokio::test]
async fn test_dispatch_routes_requests() {
    let (db, recorder) = database();
    db.initialize(init_request(basic_config())).await.unwrap();

    let resp = dispatch(
        &db,
        CredentialRequest::DeleteUser(DeleteUserRequest {
            username: "v-old".into(),
            statements: Statements::default(),
        }),
    )
    .await
    .unwrap();

    assert!(matches!(resp, CredentialResponse::DeleteUser(_)));
    assert_eq!(
        recorder.executed(),
        vec!["DROP USER IF EXISTS 'v-old'".to_string()]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_never_interleave() {
    let (db, recorder) = database();
    db.initialize(init_request(basic_config())).await.unwrap();
    recorder.set_delay(Duration::from_millis(2));
    recorder.clear();

    let db = Arc::new(db);
    let mut handles = Vec::new();
    for _ in 0..8 {
        let db = Arc::clone(&db);
        handles.push(tokio::spawn(async move {
            db.new_user(new_user(&[
                "CREATE USER '{{name}}'",
                "GRANT reader TO '{{name}}'; GRANT writer TO '{{name}}'",
            ]))
            .await
        }));
    }

    let mut usernames = Vec::new();
    for handle in handles {
        usernames.push(handle.await.unwrap().unwrap().username);
    }
    usernames.sort();
    usernames.dedup();
    assert_eq!(usernames.len(), 8);

    // Every start is immediately followed by its own end.
    let executions: Vec<Event> = recorder
        .events()
        .into_iter()
        .filter(|e| matches!(e, Event::Start(..) | Event::End(..)))
        .collect();
    assert_eq!(executions.len(), 8 * 3 * 2);
    for pair in executions.chunks(2) {
        match pair {
            [Event::Start(_, a), Event::End(_, b)] => assert_eq!(a, b),
            other => panic!("interleaved execution: {other:?}"),
        }
    }

    // Each call's three fragments run back to back.
    let ends: Vec<String> = recorder.executed();
    for call in ends.chunks(3) {
        let user = call[0]
            .trim_start_matches("CREATE USER '")
            .trim_end_matches('\'');
        assert_eq!(call[1], format!("GRANT reader TO '{user}'"));
        assert_eq!(call[2], format!("GRANT writer TO '{user}'"));
    }
}
