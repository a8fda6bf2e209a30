//! HTTP API tests.
//!
//! Each test drives the router in-process against a fresh database in its own
//! temp directory.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use cheis::auth::gate::NOT_OWNER;
use cheis::auth::{hash_password, rotate_signup_key};
use cheis::config::ServerConfig;
use cheis::server::validation::normalize_email;
use cheis::store::query::{citation, edit};
use cheis::store::{Record, Store, StoreExt};
use cheis::types::{Citation, Data, Edit, NewUser, Role};

use common::{PASSWORD, TestApp};

fn citation_form(doi: &str) -> serde_json::Value {
    json!({
        "authors": "Smith, J.; Jones, K.",
        "year": 2001,
        "journal": "GCA",
        "doi": doi,
    })
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let reply = app.get("/health", None).await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn test_anonymous_is_sent_to_search() {
    let app = TestApp::new();

    let reply = app.get("/dm/add_citation", None).await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location.as_deref(), Some("/search"));
    assert_eq!(reply.notices(), vec!["You must be logged in to view this page"]);
}

#[tokio::test]
async fn test_unverified_and_deactivated_messages() {
    let app = TestApp::new();
    let unverified = app.user("Una", Role::Unverified);
    let deactivated = app.user("Dee", Role::Deactivated);

    let reply = app.get("/dm/add_citation", Some(&app.token(&unverified))).await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(
        reply.notices(),
        vec![
            "This account has not yet been verified by a moderator",
            "You are not authorised to view this page",
        ]
    );

    let reply = app.get("/dm/add_citation", Some(&app.token(&deactivated))).await;
    assert_eq!(
        reply.notices(),
        vec![
            "This account has been deactivated",
            "You are not authorised to view this page",
        ]
    );
}

#[tokio::test]
async fn test_invalid_token_is_anonymous() {
    let app = TestApp::new();

    let reply = app
        .get("/dm/add_citation", Some("cheis_abcdefgh_abcdefghijklmnopqrstuvwx"))
        .await;
    assert_eq!(reply.notices(), vec!["You must be logged in to view this page"]);

    // Public pages still work with a bad token.
    let reply = app.get("/search", Some("garbage")).await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn test_moderator_pages_require_moderator() {
    let app = TestApp::new();
    let verified = app.user("Vera", Role::Verified);
    let moderator = app.user("Mo", Role::Moderator);

    let reply = app.get("/admin/all_edits", Some(&app.token(&verified))).await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.notices(), vec!["You are not authorised to view this page"]);

    let reply = app.get("/admin/all_edits", Some(&app.token(&moderator))).await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = app.get("/admin/change_role", Some(&app.token(&moderator))).await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_login_and_logout() {
    let app = TestApp::new();
    app.user("Alice", Role::Verified);

    let reply = app
        .post(
            "/user/login",
            None,
            json!({"email": "alice@test.com", "password": "wrong"}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.field("password"), vec!["Invalid password"]);

    let reply = app
        .post(
            "/user/login",
            None,
            json!({"email": "nobody@test.com", "password": PASSWORD}),
        )
        .await;
    assert_eq!(reply.field("email"), vec!["No account exists with this email"]);

    let reply = app
        .post(
            "/user/login",
            None,
            json!({"email": "alice@test.com", "password": PASSWORD}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.notices(), vec!["Welcome Alice"]);
    let token = reply.body["data"]["token"].as_str().unwrap().to_string();

    let reply = app.get("/dm/add_citation", Some(&token)).await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = app.post("/user/logout", Some(&token), json!({})).await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.notices(), vec!["You have been logged out"]);

    let reply = app.get("/dm/add_citation", Some(&token)).await;
    assert_eq!(reply.notices(), vec!["You must be logged in to view this page"]);
}

#[tokio::test]
async fn test_login_ignores_email_case() {
    let app = TestApp::new();
    app.store
        .create_user(
            &NewUser {
                name: "Admin".to_string(),
                email: normalize_email("Admin@Lab.org"),
                password_hash: hash_password(PASSWORD).unwrap(),
            },
            Role::Admin,
        )
        .unwrap();

    for email in ["Admin@Lab.org", " admin@lab.org", "ADMIN@LAB.ORG"] {
        let reply = app
            .post(
                "/user/login",
                None,
                json!({"email": email, "password": PASSWORD}),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "{email}");
        assert_eq!(reply.notices(), vec!["Welcome Admin"]);
    }
}

#[tokio::test]
async fn test_signup_is_invite_only() {
    let app = TestApp::new();
    let key = rotate_signup_key(app.store.as_ref()).unwrap();
    let form = json!({
        "name": "Newbie",
        "email": "newbie@test.com",
        "password": "pw",
        "password2": "pw",
    });

    let reply = app.post("/user/signup", None, form.clone()).await;
    assert_eq!(reply.location.as_deref(), Some("/user/login"));
    assert_eq!(
        reply.notices(),
        vec!["Sign ups are invite only. Contact an administrator to sign up."]
    );

    let reply = app
        .post("/user/signup?signup_key=wrong", None, form.clone())
        .await;
    assert_eq!(
        reply.notices(),
        vec!["Invalid signup link. Contact an administrator."]
    );

    let reply = app
        .post(&format!("/user/signup?signup_key={key}"), None, form)
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location.as_deref(), Some("/search"));
    assert_eq!(reply.notices(), vec!["You have successfully signed up"]);
    assert_eq!(reply.body["data"]["user"]["role"], "verified");
}

#[tokio::test]
async fn test_rotated_key_gives_unverified_with_open_signup() {
    let app = TestApp::with_config(ServerConfig {
        open_signup: true,
        ..ServerConfig::default()
    });
    let old_key = rotate_signup_key(app.store.as_ref()).unwrap();
    rotate_signup_key(app.store.as_ref()).unwrap();

    let reply = app
        .post(
            &format!("/user/signup?signup_key={old_key}"),
            None,
            json!({
                "name": "Late",
                "email": "late@test.com",
                "password": "pw",
                "password2": "pw",
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.body["data"]["user"]["role"], "unverified");
    assert_eq!(
        reply.notices(),
        vec![
            "Your account has to be verified by an administrator before you can upload data",
            "You have successfully signed up",
        ]
    );
}

#[tokio::test]
async fn test_signup_validation() {
    let app = TestApp::with_config(ServerConfig {
        open_signup: true,
        ..ServerConfig::default()
    });
    app.user("Taken", Role::Verified);

    let reply = app
        .post(
            "/user/signup",
            None,
            json!({
                "name": "Someone",
                "email": "someone@test.com",
                "password": "a",
                "password2": "b",
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.field("password"), vec!["Passwords do not match"]);

    for email in ["taken@test.com", "Taken@Test.com"] {
        let reply = app
            .post(
                "/user/signup",
                None,
                json!({
                    "name": "Someone",
                    "email": email,
                    "password": "a",
                    "password2": "a",
                }),
            )
            .await;
        assert_eq!(
            reply.field("email"),
            vec!["A user account with this email already exists"]
        );
    }

    let reply = app
        .post(
            "/user/signup",
            None,
            json!({
                "name": "Mixed",
                "email": "Mixed.Case@Test.com",
                "password": "a",
                "password2": "a",
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.body["data"]["user"]["email"], "mixed.case@test.com");
}

#[tokio::test]
async fn test_add_citation_normalizes_doi() {
    let app = TestApp::new();
    let alice = app.user("Alice", Role::Verified);
    let token = app.token(&alice);

    let reply = app
        .post(
            "/dm/add_citation",
            Some(&token),
            citation_form("https://doi.org/10.1016/j.gca.2001.01.001"),
        )
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.notices(), vec!["Citation added"]);
    assert_eq!(reply.body["data"]["doi"], "10.1016/j.gca.2001.01.001");
    let id = reply.body["data"]["id"].as_i64().unwrap();
    assert_eq!(reply.location, Some(format!("/dm/add_data/{id}")));

    let reply = app
        .post(
            "/dm/add_citation",
            Some(&token),
            citation_form("10.1016/j.gca.2001.01.001"),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        reply.field("doi"),
        vec!["A citation with this DOI already exists"]
    );
}

#[tokio::test]
async fn test_add_citation_rejects_invalid_fields() {
    let app = TestApp::new();
    let alice = app.user("Alice", Role::Verified);
    let token = app.token(&alice);

    let reply = app
        .post(
            "/dm/add_citation",
            Some(&token),
            json!({
                "authors": "",
                "year": 1700,
                "journal": "GCA",
                "doi": "not a doi",
                "ads": "https://example.com/abs",
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.field("doi"), vec!["Invalid DOI"]);
    assert_eq!(reply.field("ads"), vec!["Invalid ADS"]);
    assert_eq!(reply.field("year"), vec!["Number must be between 1850 and 2050."]);
    assert_eq!(reply.field("authors").len(), 1);

    let reply = app
        .post(
            "/dm/add_citation",
            Some(&token),
            json!({
                "authors": "Smith, J.",
                "year": 2001,
                "journal": "GCA",
                "doi": "https://example.org/paper",
                "nodoi": true,
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.body["data"]["doi"], "https://example.org/paper");
}

#[tokio::test]
async fn test_add_data_splits_elements() {
    let app = TestApp::new();
    let alice = app.user("Alice", Role::Verified);
    let token = app.token(&alice);
    let citation_id = app.citation(&alice, "10.1/a");

    let reply = app
        .post(
            &format!("/dm/add_data/{citation_id}"),
            Some(&token),
            json!({"sample_type": "Sediment", "element": "cd, RU"}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.notices(), vec!["Data added"]);
    assert_eq!(reply.body["data"]["ids"].as_array().unwrap().len(), 2);

    let reply = app
        .post(
            "/dm/add_data",
            Some(&token),
            json!({"citation": 999, "sample_type": "Sediment", "element": "Cd"}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.field("citation"), vec!["Invalid citation id"]);

    let reply = app
        .post(
            "/dm/add_data",
            Some(&token),
            json!({"citation": citation_id, "sample_type": "Sediment", "element": "Cdx"}),
        )
        .await;
    assert_eq!(reply.field("element"), vec!["Invalid element symbol (\"Cdx\")"]);

    let reply = app.get("/dm/add_data/999", Some(&token)).await;
    assert_eq!(reply.location.as_deref(), Some("/dm/edit"));
    assert_eq!(reply.notices(), vec!["Invalid citation id"]);
}

#[tokio::test]
async fn test_search_compresses_rows() {
    let app = TestApp::new();
    let alice = app.user("Alice", Role::Verified);
    let citation_id = app.citation(&alice, "10.1/a");
    app.data(&alice, citation_id, "Sediment", "Cd");
    app.data(&alice, citation_id, "Sediment", "Ru");
    app.data(&alice, citation_id, "Sediment", "Cd");

    let reply = app.post("/search", None, json!({"element": ["Cd"]})).await;
    assert_eq!(reply.status, StatusCode::OK);
    let rows = reply.body["data"]["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["element"], "Cd, Ru");
    assert_eq!(rows[0]["sample_type"], "Sediment");
    assert_eq!(rows[0]["link"]["doi"], "https://doi.org/10.1/a");

    let reply = app
        .post("/search?compress=false", None, json!({"element": ["Cd"]}))
        .await;
    assert_eq!(reply.body["data"]["rows"].as_array().unwrap().len(), 2);

    let reply = app.get("/search", None).await;
    assert_eq!(reply.body["data"]["rows"].as_array().unwrap().len(), 0);
    assert_eq!(reply.body["data"]["choices"]["element"], json!(["Cd", "Ru"]));
}

#[tokio::test]
async fn test_edit_requires_ownership() {
    let app = TestApp::new();
    let alice = app.user("Alice", Role::Verified);
    let bob = app.user("Bob", Role::Verified);
    let moderator = app.user("Mo", Role::Moderator);
    let citation_id = app.citation(&alice, "10.1/a");
    let uri = format!("/dm/edit_citation/{citation_id}");

    let reply = app
        .post(&uri, Some(&app.token(&bob)), json!({"journal": "EPSL"}))
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location.as_deref(), Some("/search"));
    assert_eq!(
        reply.notices(),
        vec!["You are not authorised to edit data created by someone else"]
    );

    let reply = app
        .post(&uri, Some(&app.token(&moderator)), json!({"journal": "EPSL"}))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.notices(), vec!["Entry was updated"]);
    assert_eq!(reply.body["data"]["changes"][0]["column"], "journal");
    assert_eq!(reply.body["data"]["changes"][0]["old_value"], "GCA");

    let reply = app
        .post(&uri, Some(&app.token(&alice)), json!({"journal": "EPSL"}))
        .await;
    assert_eq!(reply.notices(), vec!["No changes were made to the entry"]);

    let edits: Vec<Edit> = app
        .store
        .get_all(
            &Edit::query()
                .eq(edit::TABLE, "Citation".to_string())
                .eq(edit::ITEM_ID, citation_id),
        )
        .unwrap();
    assert_eq!(edits.len(), 2);
    assert_eq!(edits[1].user_id, moderator.id);
}

#[tokio::test]
async fn test_delete_requires_ownership() {
    let app = TestApp::new();
    let alice = app.user("Alice", Role::Verified);
    let bob = app.user("Bob", Role::Verified);
    let moderator = app.user("Mo", Role::Moderator);
    let citation_id = app.citation(&alice, "10.1/a");
    let data_id = app.data(&alice, citation_id, "Sediment", "Cd");
    app.data(&alice, citation_id, "Sediment", "Ru");

    let counts = |app: &TestApp| {
        let citations: Vec<Citation> = app.store.get_all(&Citation::query()).unwrap();
        let data: Vec<Data> = app.store.get_all(&Data::query()).unwrap();
        let edits: Vec<Edit> = app.store.get_all(&Edit::query()).unwrap();
        (citations.len(), data.len(), edits.len())
    };
    let before = counts(&app);

    let bob_token = app.token(&bob);
    for uri in [
        format!("/dm/delete_data/{data_id}"),
        format!("/dm/delete_citation/{citation_id}"),
    ] {
        let reply = app.get(&uri, Some(&bob_token)).await;
        assert_eq!(reply.status, StatusCode::SEE_OTHER);
        assert_eq!(reply.location.as_deref(), Some("/search"));
        assert_eq!(reply.notices(), vec![NOT_OWNER]);

        let reply = app.post(&uri, Some(&bob_token), json!({"yes": true})).await;
        assert_eq!(reply.status, StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(reply.location.as_deref(), Some("/search"));
        assert_eq!(reply.notices(), vec![NOT_OWNER]);
    }
    assert_eq!(counts(&app), before);

    let mo_token = app.token(&moderator);
    let reply = app
        .post(
            &format!("/dm/delete_data/{data_id}"),
            Some(&mo_token),
            json!({"yes": true}),
        )
        .await;
    assert_eq!(reply.notices(), vec!["Data deleted"]);
    assert_eq!(counts(&app), (1, 1, before.2 + 1));

    let reply = app
        .post(
            &format!("/dm/delete_citation/{citation_id}"),
            Some(&mo_token),
            json!({"yes": true}),
        )
        .await;
    assert_eq!(reply.notices(), vec!["Citation deleted"]);
    assert_eq!(counts(&app), (0, 0, before.2 + 3));

    let deletions: Vec<Edit> = app
        .store
        .get_all(&Edit::query().eq(edit::USER_ID, moderator.id))
        .unwrap();
    assert_eq!(deletions.len(), 3);
}

#[tokio::test]
async fn test_edit_lookup() {
    let app = TestApp::new();
    let alice = app.user("Alice", Role::Verified);
    let token = app.token(&alice);
    let citation_id = app.citation(&alice, "10.1/a");

    let reply = app
        .post("/dm/edit", Some(&token), json!({"table": "Citation", "id": citation_id}))
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location, Some(format!("/dm/edit_citation/{citation_id}")));

    let reply = app
        .post("/dm/edit", Some(&token), json!({"table": "Data", "id": 42}))
        .await;
    assert_eq!(reply.location.as_deref(), Some("/dm/edit"));
    assert_eq!(reply.notices(), vec!["Invalid data id"]);

    let reply = app
        .post("/dm/edit", Some(&token), json!({"table": "User", "id": alice.id}))
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.field("table"), vec!["Not a valid choice"]);
}

#[tokio::test]
async fn test_delete_citation_cascades() {
    let app = TestApp::new();
    let alice = app.user("Alice", Role::Verified);
    let token = app.token(&alice);
    let citation_id = app.citation(&alice, "10.1/a");
    app.data(&alice, citation_id, "Sediment", "Cd");
    app.data(&alice, citation_id, "Sediment", "Ru");
    let uri = format!("/dm/delete_citation/{citation_id}");

    let reply = app.get(&uri, Some(&token)).await;
    assert_eq!(reply.body["data"]["data_count"], 2);

    let reply = app.post(&uri, Some(&token), json!({})).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);

    let reply = app.post(&uri, Some(&token), json!({"no": true})).await;
    assert_eq!(reply.notices(), vec!["Citation was not deleted"]);

    let reply = app.post(&uri, Some(&token), json!({"yes": true})).await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location.as_deref(), Some("/dm/edit"));
    assert_eq!(reply.notices(), vec!["Citation deleted"]);
    assert_eq!(reply.body["data"]["data"].as_array().unwrap().len(), 2);
    assert_eq!(reply.body["data"]["edits"], 3);

    let remaining: Option<Citation> = app
        .store
        .get_one_or_none(&Citation::query().eq(citation::ID, citation_id))
        .unwrap();
    assert!(remaining.is_none());

    let reply = app.get(&uri, Some(&token)).await;
    assert_eq!(reply.notices(), vec!["Invalid citation id"]);
}

#[tokio::test]
async fn test_edit_and_delete_data() {
    let app = TestApp::new();
    let alice = app.user("Alice", Role::Verified);
    let token = app.token(&alice);
    let citation_id = app.citation(&alice, "10.1/a");
    let data_id = app.data(&alice, citation_id, "Sediment", "Cd");

    let reply = app
        .post(
            &format!("/dm/edit_data/{data_id}"),
            Some(&token),
            json!({"element": "ru"}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["changes"][0]["new_value"], "Ru");

    let reply = app.get(&format!("/dm/edit_data/{data_id}"), Some(&token)).await;
    assert_eq!(reply.body["data"]["data"]["element"], "Ru");
    assert_eq!(reply.body["data"]["history"]["rows"].as_array().unwrap().len(), 2);

    let reply = app
        .post(
            &format!("/dm/delete_data/{data_id}"),
            Some(&token),
            json!({"yes": true}),
        )
        .await;
    assert_eq!(reply.notices(), vec!["Data deleted"]);
    assert_eq!(reply.body["data"]["edits"], 1);
}

#[tokio::test]
async fn test_change_role() {
    let app = TestApp::new();
    let admin = app.user("Admin", Role::Admin);
    let target = app.user("Una", Role::Unverified);
    let token = app.token(&admin);

    let reply = app.get("/admin/change_role", Some(&token)).await;
    assert_eq!(reply.status, StatusCode::OK);
    let labels: Vec<&str> = reply.body["data"]["users"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|u| u["label"].as_str())
        .collect();
    assert!(labels.contains(&"unverified | Una | una@test.com"));

    let reply = app
        .post(
            "/admin/change_role",
            Some(&token),
            json!({"user": target.id, "role": "verified"}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.notices(), vec!["User role changed"]);

    let reply = app
        .post(
            "/admin/change_role",
            Some(&token),
            json!({"user": 999, "role": "verified"}),
        )
        .await;
    assert_eq!(reply.field("user"), vec!["User not found"]);

    // The target can now add citations.
    let reply = app.get("/dm/add_citation", Some(&app.token(&target))).await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn test_signup_link_rotation() {
    let app = TestApp::new();
    let admin = app.user("Admin", Role::Admin);
    let moderator = app.user("Mo", Role::Moderator);
    let old_key = rotate_signup_key(app.store.as_ref()).unwrap();

    let reply = app.get("/admin/signup_link", Some(&app.token(&moderator))).await;
    assert_eq!(
        reply.body["data"]["link"],
        format!("/user/signup?signup_key={old_key}")
    );

    let reply = app
        .post("/admin/signup_link/update", Some(&app.token(&moderator)), json!({}))
        .await;
    assert_eq!(reply.notices(), vec!["You are not authorised to view this page"]);

    let reply = app
        .post("/admin/signup_link/update", Some(&app.token(&admin)), json!({}))
        .await;
    assert_eq!(reply.location.as_deref(), Some("/admin/signup_link"));
    assert_eq!(reply.notices(), vec!["Signup key updated"]);
    let link = reply.body["data"]["link"].as_str().unwrap();
    assert!(!link.ends_with(&old_key));
}
