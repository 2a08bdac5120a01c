//! # Integration Tests
//!
//! These tests spin the full router up on an ephemeral port over the
//! in-memory store and drive it with a real HTTP client, the same way a
//! browser client would. No external infrastructure is required.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use uuid::Uuid;

    use boostex::config::{AppConfig, StoreKind};
    use boostex::store::{ExchangeStore, MemoryStore};
    use boostex::{create_app, AppState};

    struct TestServer {
        base_url: String,
        store: Arc<MemoryStore>,
        client: reqwest::Client,
    }

    fn test_config() -> AppConfig {
        AppConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            database_url: String::new(),
            store_kind: StoreKind::Memory,
            session_ttl: chrono::Duration::hours(24),
            ad_reward_points: 2,
            // Short enough that the cooldown-expiry test stays fast.
            ad_cooldown: chrono::Duration::milliseconds(400),
        }
    }

    async fn spawn_server() -> TestServer {
        let store = Arc::new(MemoryStore::new());
        let state = AppState {
            store: store.clone(),
            config: Arc::new(test_config()),
        };
        let app = create_app(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        TestServer {
            base_url: format!("http://{}", addr),
            store,
            client: reqwest::Client::new(),
        }
    }

    impl TestServer {
        fn url(&self, path: &str) -> String {
            format!("{}{}", self.base_url, path)
        }
    }

    /// Register an account and sign in; returns (user id, bearer token).
    async fn register_and_login(srv: &TestServer, email: &str) -> (Uuid, String) {
        let res = srv
            .client
            .post(srv.url("/auth/register"))
            .json(&json!({ "email": email, "password": "hunter22" }))
            .send()
            .await
            .expect("send register");
        assert_eq!(res.status(), 201, "register should succeed");
        let body: serde_json::Value = res.json().await.expect("parse register");
        let user_id: Uuid = body["data"]["id"]
            .as_str()
            .expect("profile id")
            .parse()
            .expect("uuid");

        let res = srv
            .client
            .post(srv.url("/auth/login"))
            .json(&json!({ "email": email, "password": "hunter22" }))
            .send()
            .await
            .expect("send login");
        assert_eq!(res.status(), 200, "login should succeed");
        let body: serde_json::Value = res.json().await.expect("parse login");
        let token = body["data"]["token"].as_str().expect("token").to_string();

        (user_id, token)
    }

    /// Register, sign in, and credit the account through the store helper.
    async fn funded_user(srv: &TestServer, email: &str, points: i64) -> (Uuid, String) {
        let (id, token) = register_and_login(srv, email).await;
        srv.store.credit_points(id, points).await;
        (id, token)
    }

    async fn create_task(
        srv: &TestServer,
        token: &str,
        platform: &str,
        action: &str,
        url: &str,
        quantity: i64,
    ) -> serde_json::Value {
        let res = srv
            .client
            .post(srv.url("/tasks"))
            .bearer_auth(token)
            .json(&json!({
                "platform": platform,
                "action_type": action,
                "url": url,
                "target_quantity": quantity
            }))
            .send()
            .await
            .expect("send create task");
        assert_eq!(res.status(), 201, "task creation should succeed");
        res.json().await.expect("parse create task")
    }

    async fn claim_task(srv: &TestServer, token: &str, task_id: &str) -> serde_json::Value {
        srv.client
            .post(srv.url("/rpc/claim_task_reward"))
            .bearer_auth(token)
            .json(&json!({ "task_id": task_id }))
            .send()
            .await
            .expect("send claim")
            .json()
            .await
            .expect("parse claim")
    }

    async fn profile_points(srv: &TestServer, token: &str) -> i64 {
        let body: serde_json::Value = srv
            .client
            .get(srv.url("/profile"))
            .bearer_auth(token)
            .send()
            .await
            .expect("send profile")
            .json()
            .await
            .expect("parse profile");
        body["data"]["points"].as_i64().expect("points")
    }

    // ------------------------------------------------------------------
    // Accounts and sessions
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_register_login_and_profile() {
        let srv = spawn_server().await;
        let (user_id, token) = register_and_login(&srv, "alice@example.com").await;

        let body: serde_json::Value = srv
            .client
            .get(srv.url("/profile"))
            .bearer_auth(&token)
            .send()
            .await
            .expect("send profile")
            .json()
            .await
            .expect("parse profile");

        assert_eq!(body["data"]["id"].as_str().unwrap(), user_id.to_string());
        assert_eq!(body["data"]["email"].as_str().unwrap(), "alice@example.com");
        assert_eq!(body["data"]["points"].as_i64().unwrap(), 0);
        assert_eq!(body["data"]["role"].as_str().unwrap(), "user");
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let srv = spawn_server().await;

        let res = srv
            .client
            .post(srv.url("/auth/register"))
            .json(&json!({ "email": "not-an-email", "password": "hunter22" }))
            .send()
            .await
            .expect("send");
        assert_eq!(res.status(), 422, "bad email should be rejected");

        let res = srv
            .client
            .post(srv.url("/auth/register"))
            .json(&json!({ "email": "ok@example.com", "password": "short" }))
            .send()
            .await
            .expect("send");
        assert_eq!(res.status(), 422, "short password should be rejected");
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let srv = spawn_server().await;
        register_and_login(&srv, "dup@example.com").await;

        let res = srv
            .client
            .post(srv.url("/auth/register"))
            .json(&json!({ "email": "dup@example.com", "password": "hunter22" }))
            .send()
            .await
            .expect("send");
        assert_eq!(res.status(), 409, "duplicate email should conflict");
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password() {
        let srv = spawn_server().await;
        register_and_login(&srv, "bob@example.com").await;

        let res = srv
            .client
            .post(srv.url("/auth/login"))
            .json(&json!({ "email": "bob@example.com", "password": "wrong-password" }))
            .send()
            .await
            .expect("send");
        assert_eq!(res.status(), 401);
    }

    #[tokio::test]
    async fn test_protected_routes_require_a_session() {
        let srv = spawn_server().await;

        let res = srv
            .client
            .get(srv.url("/profile"))
            .send()
            .await
            .expect("send");
        assert_eq!(res.status(), 401, "no token should be rejected");

        let res = srv
            .client
            .get(srv.url("/profile"))
            .bearer_auth("deadbeef")
            .send()
            .await
            .expect("send");
        assert_eq!(res.status(), 401, "unknown token should be rejected");
    }

    #[tokio::test]
    async fn test_session_endpoint_and_logout() {
        let srv = spawn_server().await;

        // Anonymous callers get a 200 with a null session, never an error.
        let body: serde_json::Value = srv
            .client
            .get(srv.url("/auth/session"))
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("parse");
        assert!(body["data"].is_null());

        let (user_id, token) = register_and_login(&srv, "carol@example.com").await;
        let body: serde_json::Value = srv
            .client
            .get(srv.url("/auth/session"))
            .bearer_auth(&token)
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("parse");
        assert_eq!(
            body["data"]["user_id"].as_str().unwrap(),
            user_id.to_string()
        );

        let res = srv
            .client
            .post(srv.url("/auth/logout"))
            .bearer_auth(&token)
            .send()
            .await
            .expect("send");
        assert_eq!(res.status(), 200);

        // The revoked token no longer opens anything.
        let body: serde_json::Value = srv
            .client
            .get(srv.url("/auth/session"))
            .bearer_auth(&token)
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("parse");
        assert!(body["data"].is_null());

        let res = srv
            .client
            .get(srv.url("/profile"))
            .bearer_auth(&token)
            .send()
            .await
            .expect("send");
        assert_eq!(res.status(), 401);
    }

    #[tokio::test]
    async fn test_social_account_linking_drops_blanks() {
        let srv = spawn_server().await;
        let (_, token) = register_and_login(&srv, "linker@example.com").await;

        let body: serde_json::Value = srv
            .client
            .put(srv.url("/profile/social-accounts"))
            .bearer_auth(&token)
            .json(&json!({ "accounts": { "youtube": "mychannel", "tiktok": "   " } }))
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("parse");

        let accounts = body["data"]["social_accounts"]
            .as_object()
            .expect("accounts object");
        assert_eq!(accounts.len(), 1, "blank handles are dropped");
        assert_eq!(accounts["youtube"].as_str().unwrap(), "mychannel");
    }

    // ------------------------------------------------------------------
    // Task creation
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_task_derives_rates_from_catalog() {
        let srv = spawn_server().await;
        let (_, token) = funded_user(&srv, "owner@example.com", 100).await;

        let body = create_task(
            &srv,
            &token,
            "youtube",
            "subscribe",
            "https://youtube.com/@somechannel",
            10,
        )
        .await;

        assert_eq!(body["data"]["cost_per_action"].as_i64().unwrap(), 5);
        assert_eq!(body["data"]["reward_per_action"].as_i64().unwrap(), 3);
        assert_eq!(body["data"]["status"].as_str().unwrap(), "active");
        assert_eq!(body["data"]["current_quantity"].as_i64().unwrap(), 0);
        assert_eq!(body["data"]["target_quantity"].as_i64().unwrap(), 10);
    }

    #[tokio::test]
    async fn test_create_task_requires_full_funding_up_front() {
        let srv = spawn_server().await;
        // 49 points cannot fund 10 subscriptions at 5 points each.
        let (_, token) = funded_user(&srv, "poor@example.com", 49).await;

        let res = srv
            .client
            .post(srv.url("/tasks"))
            .bearer_auth(&token)
            .json(&json!({
                "platform": "youtube",
                "action_type": "subscribe",
                "url": "https://youtube.com/@somechannel",
                "target_quantity": 10
            }))
            .send()
            .await
            .expect("send");
        assert_eq!(res.status(), 422, "underfunded creation is rejected");

        // Rejected before any insert: the owner has no tasks.
        let body: serde_json::Value = srv
            .client
            .get(srv.url("/tasks/mine"))
            .bearer_auth(&token)
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("parse");
        assert_eq!(body["data"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_create_task_rejects_unsupported_actions() {
        let srv = spawn_server().await;
        let (_, token) = funded_user(&srv, "owner2@example.com", 100).await;

        for (platform, action) in [
            ("telegram", "subscribe"),
            ("youtube", "join"),
            ("instagram", "view_30"),
            ("youtube", "share"),
        ] {
            let res = srv
                .client
                .post(srv.url("/tasks"))
                .bearer_auth(&token)
                .json(&json!({
                    "platform": platform,
                    "action_type": action,
                    "url": "https://example.com/x",
                    "target_quantity": 1
                }))
                .send()
                .await
                .expect("send");
            assert_eq!(
                res.status(),
                422,
                "{} should not support {}",
                platform,
                action
            );
        }
    }

    #[tokio::test]
    async fn test_create_telegram_task_needs_channel_link() {
        let srv = spawn_server().await;
        let (_, token) = funded_user(&srv, "tg@example.com", 100).await;

        let res = srv
            .client
            .post(srv.url("/tasks"))
            .bearer_auth(&token)
            .json(&json!({
                "platform": "telegram",
                "action_type": "join",
                "url": "https://example.com/not-telegram",
                "target_quantity": 1
            }))
            .send()
            .await
            .expect("send");
        assert_eq!(res.status(), 422);

        let body = create_task(&srv, &token, "telegram", "join", "https://t.me/mychan", 1).await;
        assert_eq!(body["data"]["platform"].as_str().unwrap(), "telegram");
    }

    #[tokio::test]
    async fn test_create_task_quantity_must_be_positive() {
        let srv = spawn_server().await;
        let (_, token) = funded_user(&srv, "qty@example.com", 100).await;

        let res = srv
            .client
            .post(srv.url("/tasks"))
            .bearer_auth(&token)
            .json(&json!({
                "platform": "youtube",
                "action_type": "like",
                "url": "https://youtube.com/watch?v=abc",
                "target_quantity": 0
            }))
            .send()
            .await
            .expect("send");
        assert_eq!(res.status(), 422);
    }

    // ------------------------------------------------------------------
    // Availability feed
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_available_feed_excludes_own_and_executed() {
        let srv = spawn_server().await;
        let (_, owner) = funded_user(&srv, "feed-owner@example.com", 100).await;
        let (_, executor) = register_and_login(&srv, "feed-exec@example.com").await;

        let yt = create_task(
            &srv,
            &owner,
            "youtube",
            "subscribe",
            "https://youtube.com/@chan",
            2,
        )
        .await;
        create_task(&srv, &owner, "telegram", "join", "https://t.me/chan", 2).await;

        // The owner never sees their own tasks in the feed.
        let body: serde_json::Value = srv
            .client
            .get(srv.url("/tasks/available"))
            .bearer_auth(&owner)
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("parse");
        assert_eq!(body["data"].as_array().unwrap().len(), 0);

        // The executor sees both, newest first.
        let body: serde_json::Value = srv
            .client
            .get(srv.url("/tasks/available"))
            .bearer_auth(&executor)
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("parse");
        let feed = body["data"].as_array().unwrap();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0]["platform"].as_str().unwrap(), "telegram");

        // The platform filter narrows the feed.
        let body: serde_json::Value = srv
            .client
            .get(srv.url("/tasks/available?platform=youtube"))
            .bearer_auth(&executor)
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("parse");
        let feed = body["data"].as_array().unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0]["platform"].as_str().unwrap(), "youtube");

        // Executed tasks drop out of the feed for that member.
        let yt_id = yt["data"]["id"].as_str().unwrap();
        let outcome = claim_task(&srv, &executor, yt_id).await;
        assert_eq!(outcome["success"].as_bool(), Some(true));

        let body: serde_json::Value = srv
            .client
            .get(srv.url("/tasks/available"))
            .bearer_auth(&executor)
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("parse");
        let feed = body["data"].as_array().unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0]["platform"].as_str().unwrap(), "telegram");
    }

    // ------------------------------------------------------------------
    // Task-reward claims
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_claim_credits_executor_and_debits_owner() {
        let srv = spawn_server().await;
        let (_, owner) = funded_user(&srv, "ledger-owner@example.com", 100).await;
        let (_, exec_a) = register_and_login(&srv, "ledger-a@example.com").await;
        let (_, exec_b) = register_and_login(&srv, "ledger-b@example.com").await;

        let task = create_task(
            &srv,
            &owner,
            "youtube",
            "subscribe",
            "https://youtube.com/@chan",
            2,
        )
        .await;
        let task_id = task["data"]["id"].as_str().unwrap();

        let outcome = claim_task(&srv, &exec_a, task_id).await;
        assert_eq!(outcome["success"].as_bool(), Some(true));
        assert_eq!(outcome["points"].as_i64(), Some(3));
        assert_eq!(profile_points(&srv, &exec_a).await, 3);
        assert_eq!(profile_points(&srv, &owner).await, 95);

        // Second slot finishes the task.
        let outcome = claim_task(&srv, &exec_b, task_id).await;
        assert_eq!(outcome["success"].as_bool(), Some(true));
        assert_eq!(profile_points(&srv, &owner).await, 90);

        let body: serde_json::Value = srv
            .client
            .get(srv.url("/tasks/mine"))
            .bearer_auth(&owner)
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("parse");
        let mine = body["data"].as_array().unwrap();
        assert_eq!(mine[0]["current_quantity"].as_i64().unwrap(), 2);
        assert_eq!(mine[0]["status"].as_str().unwrap(), "finished");

        // A third claim finds the task no longer active.
        let (_, exec_c) = register_and_login(&srv, "ledger-c@example.com").await;
        let outcome = claim_task(&srv, &exec_c, task_id).await;
        assert_eq!(outcome["success"].as_bool(), Some(false));
    }

    #[tokio::test]
    async fn test_claim_rejections_move_no_points() {
        let srv = spawn_server().await;
        let (_, owner) = funded_user(&srv, "rej-owner@example.com", 100).await;
        let (_, executor) = register_and_login(&srv, "rej-exec@example.com").await;

        let task = create_task(
            &srv,
            &owner,
            "youtube",
            "like",
            "https://youtube.com/watch?v=abc",
            5,
        )
        .await;
        let task_id = task["data"]["id"].as_str().unwrap().to_string();

        // Unknown task.
        let outcome = claim_task(&srv, &executor, &Uuid::new_v4().to_string()).await;
        assert_eq!(outcome["success"].as_bool(), Some(false));

        // Own task.
        let outcome = claim_task(&srv, &owner, &task_id).await;
        assert_eq!(outcome["success"].as_bool(), Some(false));

        // Replay after a grant.
        let outcome = claim_task(&srv, &executor, &task_id).await;
        assert_eq!(outcome["success"].as_bool(), Some(true));
        let outcome = claim_task(&srv, &executor, &task_id).await;
        assert_eq!(outcome["success"].as_bool(), Some(false));

        // Paused task.
        let res = srv
            .client
            .patch(srv.url(&format!("/tasks/{}/status", task_id)))
            .bearer_auth(&owner)
            .json(&json!({ "status": "paused" }))
            .send()
            .await
            .expect("send");
        assert_eq!(res.status(), 200);
        let (_, other) = register_and_login(&srv, "rej-other@example.com").await;
        let outcome = claim_task(&srv, &other, &task_id).await;
        assert_eq!(outcome["success"].as_bool(), Some(false));

        // One grant happened in all of that; balances reflect exactly it.
        assert_eq!(profile_points(&srv, &executor).await, 1);
        assert_eq!(profile_points(&srv, &owner).await, 98);
        assert_eq!(profile_points(&srv, &other).await, 0);
    }

    #[tokio::test]
    async fn test_insolvent_owner_blocks_claims_without_negative_balance() {
        let srv = spawn_server().await;
        // 15 points funds each creation check, but not all twenty points
        // of commitments; the ledger refuses the unfundable claim.
        let (owner_id, owner) = funded_user(&srv, "insolvent@example.com", 15).await;
        let (_, exec_a) = register_and_login(&srv, "ins-a@example.com").await;
        let (_, exec_b) = register_and_login(&srv, "ins-b@example.com").await;

        let task_a = create_task(
            &srv,
            &owner,
            "youtube",
            "subscribe",
            "https://youtube.com/@one",
            2,
        )
        .await;
        let task_b = create_task(
            &srv,
            &owner,
            "youtube",
            "subscribe",
            "https://youtube.com/@two",
            2,
        )
        .await;
        let a_id = task_a["data"]["id"].as_str().unwrap();
        let b_id = task_b["data"]["id"].as_str().unwrap();

        assert_eq!(claim_task(&srv, &exec_a, a_id).await["success"], json!(true));
        assert_eq!(claim_task(&srv, &exec_b, a_id).await["success"], json!(true));
        assert_eq!(claim_task(&srv, &exec_a, b_id).await["success"], json!(true));
        assert_eq!(profile_points(&srv, &owner).await, 0);

        // The fourth claim would need 5 more points the owner does not have.
        let outcome = claim_task(&srv, &exec_b, b_id).await;
        assert_eq!(outcome["success"].as_bool(), Some(false));
        assert!(outcome["message"]
            .as_str()
            .unwrap()
            .contains("cannot fund"));

        // Balance never went negative and the task remains claimable for
        // when the owner earns again.
        let profile = srv.store.profile(owner_id).await.unwrap().unwrap();
        assert_eq!(profile.points, 0);
        let task = srv
            .store
            .task(b_id.parse().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.current_quantity, 1);
    }

    #[tokio::test]
    async fn test_last_slot_race_has_exactly_one_winner() {
        let srv = spawn_server().await;
        let (_, owner) = funded_user(&srv, "race-owner@example.com", 100).await;

        let task = create_task(
            &srv,
            &owner,
            "youtube",
            "subscribe",
            "https://youtube.com/@chan",
            1,
        )
        .await;
        let task_id = task["data"]["id"].as_str().unwrap().to_string();

        let mut tokens = Vec::new();
        for i in 0..5 {
            let (_, token) =
                register_and_login(&srv, &format!("racer-{}@example.com", i)).await;
            tokens.push(token);
        }

        let mut handles = Vec::new();
        for token in &tokens {
            let client = srv.client.clone();
            let url = srv.url("/rpc/claim_task_reward");
            let token = token.clone();
            let task_id = task_id.clone();
            handles.push(tokio::spawn(async move {
                client
                    .post(url)
                    .bearer_auth(token)
                    .json(&json!({ "task_id": task_id }))
                    .send()
                    .await
                    .expect("send claim")
                    .json::<serde_json::Value>()
                    .await
                    .expect("parse claim")
            }));
        }

        let mut winners = 0;
        for handle in handles {
            let outcome = handle.await.expect("join");
            if outcome["success"].as_bool() == Some(true) {
                winners += 1;
            }
        }
        assert_eq!(winners, 1, "exactly one claim wins the last slot");

        // Total credit across all executors is bounded by the task budget.
        let mut credited = 0;
        for token in &tokens {
            credited += profile_points(&srv, token).await;
        }
        assert_eq!(credited, 3);
        assert_eq!(profile_points(&srv, &owner).await, 95);
    }

    // ------------------------------------------------------------------
    // Status toggling and deletion
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_owner_toggle_rules() {
        let srv = spawn_server().await;
        let (_, owner) = funded_user(&srv, "toggle-owner@example.com", 100).await;
        let (_, stranger) = register_and_login(&srv, "toggle-stranger@example.com").await;

        let task = create_task(
            &srv,
            &owner,
            "youtube",
            "subscribe",
            "https://youtube.com/@chan",
            5,
        )
        .await;
        let task_id = task["data"]["id"].as_str().unwrap();

        // Strangers cannot touch it.
        let res = srv
            .client
            .patch(srv.url(&format!("/tasks/{}/status", task_id)))
            .bearer_auth(&stranger)
            .json(&json!({ "status": "paused" }))
            .send()
            .await
            .expect("send");
        assert_eq!(res.status(), 403);

        // The owner can pause and reactivate.
        let res = srv
            .client
            .patch(srv.url(&format!("/tasks/{}/status", task_id)))
            .bearer_auth(&owner)
            .json(&json!({ "status": "paused" }))
            .send()
            .await
            .expect("send");
        assert_eq!(res.status(), 200);
        let body: serde_json::Value = res.json().await.expect("parse");
        assert_eq!(body["data"]["status"].as_str().unwrap(), "paused");

        // Paused tasks leave the feed.
        let body: serde_json::Value = srv
            .client
            .get(srv.url("/tasks/available"))
            .bearer_auth(&stranger)
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("parse");
        assert_eq!(body["data"].as_array().unwrap().len(), 0);

        // Stopped is not a state owners can request.
        let res = srv
            .client
            .patch(srv.url(&format!("/tasks/{}/status", task_id)))
            .bearer_auth(&owner)
            .json(&json!({ "status": "stopped" }))
            .send()
            .await
            .expect("send");
        assert_eq!(res.status(), 422);

        let res = srv
            .client
            .patch(srv.url(&format!("/tasks/{}/status", task_id)))
            .bearer_auth(&owner)
            .json(&json!({ "status": "active" }))
            .send()
            .await
            .expect("send");
        assert_eq!(res.status(), 200);
    }

    #[tokio::test]
    async fn test_delete_task_ownership() {
        let srv = spawn_server().await;
        let (_, owner) = funded_user(&srv, "del-owner@example.com", 100).await;
        let (_, stranger) = register_and_login(&srv, "del-stranger@example.com").await;

        let task = create_task(
            &srv,
            &owner,
            "youtube",
            "subscribe",
            "https://youtube.com/@chan",
            1,
        )
        .await;
        let task_id = task["data"]["id"].as_str().unwrap();

        let res = srv
            .client
            .delete(srv.url(&format!("/tasks/{}", task_id)))
            .bearer_auth(&stranger)
            .send()
            .await
            .expect("send");
        assert_eq!(res.status(), 403);

        let res = srv
            .client
            .delete(srv.url(&format!("/tasks/{}", task_id)))
            .bearer_auth(&owner)
            .send()
            .await
            .expect("send");
        assert_eq!(res.status(), 200);

        let body: serde_json::Value = srv
            .client
            .get(srv.url("/tasks/mine"))
            .bearer_auth(&owner)
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("parse");
        assert_eq!(body["data"].as_array().unwrap().len(), 0);

        let res = srv
            .client
            .delete(srv.url(&format!("/tasks/{}", task_id)))
            .bearer_auth(&owner)
            .send()
            .await
            .expect("send");
        assert_eq!(res.status(), 404, "second delete finds nothing");
    }

    // ------------------------------------------------------------------
    // Ad-reward claims
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_ad_claims_respect_the_cooldown_window() {
        let srv = spawn_server().await;
        let (_, token) = register_and_login(&srv, "watcher@example.com").await;

        let outcome: serde_json::Value = srv
            .client
            .post(srv.url("/rpc/claim_ad_reward"))
            .bearer_auth(&token)
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("parse");
        assert_eq!(outcome["success"].as_bool(), Some(true));
        assert_eq!(outcome["points"].as_i64(), Some(2));

        // Inside the window: refused, nothing credited.
        let outcome: serde_json::Value = srv
            .client
            .post(srv.url("/rpc/claim_ad_reward"))
            .bearer_auth(&token)
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("parse");
        assert_eq!(outcome["success"].as_bool(), Some(false));
        assert_eq!(profile_points(&srv, &token).await, 2);

        // After the window: granted again.
        tokio::time::sleep(Duration::from_millis(450)).await;
        let outcome: serde_json::Value = srv
            .client
            .post(srv.url("/rpc/claim_ad_reward"))
            .bearer_auth(&token)
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("parse");
        assert_eq!(outcome["success"].as_bool(), Some(true));
        assert_eq!(profile_points(&srv, &token).await, 4);
    }

    // ------------------------------------------------------------------
    // Moderation
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_admin_routes_are_forbidden_for_members() {
        let srv = spawn_server().await;
        let (_, token) = register_and_login(&srv, "pleb@example.com").await;

        for path in ["/admin/overview", "/admin/users", "/admin/tasks"] {
            let res = srv
                .client
                .get(srv.url(path))
                .bearer_auth(&token)
                .send()
                .await
                .expect("send");
            assert_eq!(res.status(), 403, "{} should be admin-only", path);
        }
    }

    #[tokio::test]
    async fn test_admin_overview_and_moderation() {
        let srv = spawn_server().await;
        let (admin_id, admin) = register_and_login(&srv, "admin@example.com").await;
        srv.store.promote_to_admin(admin_id).await;
        let (_, owner) = funded_user(&srv, "mod-owner@example.com", 100).await;
        let (_, viewer) = register_and_login(&srv, "mod-viewer@example.com").await;

        let task = create_task(
            &srv,
            &owner,
            "youtube",
            "subscribe",
            "https://youtube.com/@chan",
            5,
        )
        .await;
        let task_id = task["data"]["id"].as_str().unwrap();

        let body: serde_json::Value = srv
            .client
            .get(srv.url("/admin/overview"))
            .bearer_auth(&admin)
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("parse");
        assert_eq!(body["data"]["users"].as_i64().unwrap(), 3);
        assert_eq!(body["data"]["tasks"].as_i64().unwrap(), 1);
        assert_eq!(body["data"]["active_tasks"].as_i64().unwrap(), 1);

        let body: serde_json::Value = srv
            .client
            .get(srv.url("/admin/users?limit=2"))
            .bearer_auth(&admin)
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("parse");
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        // Force-stop: terminal for the owner, gone from the feed.
        let body: serde_json::Value = srv
            .client
            .post(srv.url(&format!("/admin/tasks/{}/stop", task_id)))
            .bearer_auth(&admin)
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("parse");
        assert_eq!(body["data"]["status"].as_str().unwrap(), "stopped");

        let body: serde_json::Value = srv
            .client
            .get(srv.url("/tasks/available"))
            .bearer_auth(&viewer)
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("parse");
        assert_eq!(body["data"].as_array().unwrap().len(), 0);

        let res = srv
            .client
            .patch(srv.url(&format!("/tasks/{}/status", task_id)))
            .bearer_auth(&owner)
            .json(&json!({ "status": "active" }))
            .send()
            .await
            .expect("send");
        assert_eq!(res.status(), 422, "stopped tasks cannot be reactivated");

        let res = srv
            .client
            .delete(srv.url(&format!("/admin/tasks/{}", task_id)))
            .bearer_auth(&admin)
            .send()
            .await
            .expect("send");
        assert_eq!(res.status(), 200);

        let body: serde_json::Value = srv
            .client
            .get(srv.url("/admin/overview"))
            .bearer_auth(&admin)
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("parse");
        assert_eq!(body["data"]["tasks"].as_i64().unwrap(), 0);
    }
}
