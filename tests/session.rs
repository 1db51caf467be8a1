#[cfg(test)]
mod tests {
    use doover::api::{ApiAuth, ApiError, ApiResult, Credentials, RemoteTag, Reply, TaskApi};
    use doover::db::db::Db;
    use doover::db::tags::{TagRecord, Tags};
    use doover::db::users::Users;
    use doover::libs::config::EmptyTagPolicy;
    use doover::libs::secret::Cipher;
    use doover::libs::session::{Precondition, Session, SessionController, SessionError, SessionState};
    use doover::libs::task::{PendingTask, Priority};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use test_context::{test_context, AsyncTestContext};

    const USER_ID: &str = "user-1";
    const API_TOKEN: &str = "token-abc";

    /// In-process stand-in for Habitica with configurable statuses.
    struct ScriptedApi {
        login_status: u16,
        token_status: u16,
        task_status: Mutex<u16>,
        tags_status: u16,
        remote_tags: Mutex<Option<Vec<RemoteTag>>>,
        calls: Mutex<Vec<String>>,
        seen_tokens: Mutex<Vec<String>>,
    }

    impl ScriptedApi {
        fn new() -> Self {
            Self {
                login_status: 200,
                token_status: 200,
                task_status: Mutex::new(0),
                tags_status: 200,
                remote_tags: Mutex::new(Some(Vec::new())),
                calls: Mutex::new(Vec::new()),
                seen_tokens: Mutex::new(Vec::new()),
            }
        }

        fn rejecting_login(status: u16) -> Self {
            Self {
                login_status: status,
                token_status: status,
                ..Self::new()
            }
        }

        fn with_tags_status(status: u16) -> Self {
            Self {
                tags_status: status,
                ..Self::new()
            }
        }

        fn set_remote_tags(&self, tags: Option<Vec<RemoteTag>>) {
            *self.remote_tags.lock().unwrap() = tags;
        }

        fn set_task_status(&self, status: u16) {
            *self.task_status.lock().unwrap() = status;
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn seen_tokens(&self) -> Vec<String> {
            self.seen_tokens.lock().unwrap().clone()
        }

        fn note(&self, call: &str, auth: Option<&ApiAuth>) {
            self.calls.lock().unwrap().push(call.to_string());
            if let Some(auth) = auth {
                self.seen_tokens.lock().unwrap().push(auth.api_token.clone());
            }
        }

        fn answer<T>(status: u16, expected: u16, data: T) -> ApiResult<T> {
            if status == expected {
                Ok(Reply { status, data })
            } else {
                Err(ApiError::Rejected(status))
            }
        }
    }

    impl TaskApi for ScriptedApi {
        async fn authenticate_with_password(&self, username: &str, _password: &str) -> ApiResult<Credentials> {
            self.note("login", None);
            Self::answer(
                self.login_status,
                200,
                Credentials {
                    user_id: USER_ID.to_string(),
                    username: username.to_string(),
                    api_token: API_TOKEN.to_string(),
                },
            )
        }

        async fn authenticate_with_token(&self, auth: &ApiAuth) -> ApiResult<String> {
            self.note("user", Some(auth));
            Self::answer(self.token_status, 200, "Profile Name".to_string())
        }

        async fn create_task(&self, auth: &ApiAuth, _task: &PendingTask) -> ApiResult<String> {
            self.note("create_task", Some(auth));
            let status = match *self.task_status.lock().unwrap() {
                0 => 201,
                status => status,
            };
            Self::answer(status, 201, "task-42".to_string())
        }

        async fn edit_task(&self, auth: &ApiAuth, task: &PendingTask) -> ApiResult<String> {
            self.note("edit_task", Some(auth));
            let status = match *self.task_status.lock().unwrap() {
                0 => 200,
                status => status,
            };
            Self::answer(status, 200, task.task_id.clone())
        }

        async fn list_tags(&self, auth: &ApiAuth) -> ApiResult<Vec<RemoteTag>> {
            self.note("tags", Some(auth));
            if self.tags_status != 200 {
                return Err(ApiError::Rejected(self.tags_status));
            }
            match self.remote_tags.lock().unwrap().clone() {
                Some(tags) => Ok(Reply { status: 200, data: tags }),
                None => Err(ApiError::EmptyResponse(200)),
            }
        }
    }

    struct SessionTestContext {
        _temp_dir: TempDir,
        db_path: PathBuf,
        cipher: Cipher,
    }

    impl AsyncTestContext for SessionTestContext {
        async fn setup() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            let db_path = temp_dir.path().join("doover.db");
            SessionTestContext {
                _temp_dir: temp_dir,
                db_path,
                cipher: Cipher::from_parts(b"0123456789abcdef0123456789abcdef", b"fedcba9876543210").unwrap(),
            }
        }
    }

    impl SessionTestContext {
        fn controller(&self, api: ScriptedApi, session: Session) -> SessionController<ScriptedApi> {
            SessionController::new(api, self.cipher.clone(), self.users(), self.tags(), session)
        }

        async fn logged_in(&self, api: ScriptedApi) -> SessionController<ScriptedApi> {
            let mut controller = self.controller(api, Session::new("kirska"));
            controller.login("secret").await.unwrap();
            controller
        }

        fn users(&self) -> Users {
            Users::with_db(Db::open(&self.db_path).unwrap())
        }

        fn tags(&self) -> Tags {
            Tags::with_db(Db::open(&self.db_path).unwrap())
        }

        fn seed_tags(&self, owner: &str, ids: &[&str]) {
            let mut tags = self.tags();
            for id in ids {
                tags.upsert(&TagRecord::new(id, owner, &format!("old {}", id))).unwrap();
            }
        }

        fn local_tag_ids(&self) -> Vec<String> {
            self.tags().ids_for_owner(USER_ID).unwrap()
        }
    }

    fn remote(tags: &[(&str, &str)]) -> Vec<RemoteTag> {
        tags.iter().map(|(id, name)| RemoteTag::new(id, name)).collect()
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_password_login_persists_user(ctx: &mut SessionTestContext) {
        let controller = ctx.logged_in(ScriptedApi::new()).await;

        let session = controller.session();
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(session.user_id(), USER_ID);
        assert_eq!(session.last_http_status(), Some(200));

        let stored = ctx.users().get(USER_ID).unwrap().unwrap();
        assert_eq!(stored.username, "kirska");
        assert_ne!(stored.encrypted_api_token, API_TOKEN.as_bytes());
        assert_eq!(ctx.cipher.decrypt_token(&stored.encrypted_api_token).unwrap(), API_TOKEN);
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_failed_login_stays_anonymous(ctx: &mut SessionTestContext) {
        let mut controller = ctx.controller(ScriptedApi::rejecting_login(401), Session::new("kirska"));

        let result = controller.login("wrong").await;

        assert!(matches!(result, Err(SessionError::RemoteRejected(401))));
        assert!(!controller.session().is_logged_in());
        assert_eq!(controller.session().last_http_status(), Some(401));
        assert!(ctx.users().list().unwrap().is_empty());
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_password_then_token_login_keeps_one_user(ctx: &mut SessionTestContext) {
        let controller = ctx.logged_in(ScriptedApi::new()).await;
        let session = controller.into_session();

        let restored = Session::restore(session.user_id(), session.encrypted_api_token().to_vec());
        let mut controller = ctx.controller(ScriptedApi::new(), restored);
        controller.login_with_api_key().await.unwrap();

        assert!(controller.session().is_logged_in());
        assert_eq!(controller.session().username(), "Profile Name");
        assert_eq!(controller.api().seen_tokens(), vec![API_TOKEN.to_string()]);

        let users = ctx.users().list().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user_id, USER_ID);
        assert_eq!(users[0].username, "Profile Name");
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_token_login_requires_credentials(ctx: &mut SessionTestContext) {
        let mut controller = ctx.controller(ScriptedApi::new(), Session::new("kirska"));

        let result = controller.login_with_api_key().await;

        assert!(matches!(
            result,
            Err(SessionError::PreconditionViolation(Precondition::MissingCredentials))
        ));
        assert!(controller.api().calls().is_empty());
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_token_login_with_foreign_key_material_fails(ctx: &mut SessionTestContext) {
        let other = Cipher::from_parts(b"ffffffffffffffffffffffffffffffff", b"0000000000000000").unwrap();
        let encrypted = other.encrypt_token(API_TOKEN).unwrap();
        let mut controller = ctx.controller(ScriptedApi::new(), Session::restore(USER_ID, encrypted));

        let result = controller.login_with_api_key().await;

        assert!(matches!(result, Err(SessionError::Decryption(_))));
        assert!(!controller.session().is_logged_in());
        assert!(controller.api().calls().is_empty());
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_rejected_token_login_stays_anonymous(ctx: &mut SessionTestContext) {
        let encrypted = ctx.cipher.encrypt_token(API_TOKEN).unwrap();
        let mut controller = ctx.controller(ScriptedApi::rejecting_login(401), Session::restore(USER_ID, encrypted));

        let result = controller.login_with_api_key().await;

        assert!(matches!(result, Err(SessionError::RemoteRejected(401))));
        assert!(!controller.session().is_logged_in());
        assert!(ctx.users().list().unwrap().is_empty());
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_resume_stored_user(ctx: &mut SessionTestContext) {
        drop(ctx.logged_in(ScriptedApi::new()).await);

        let mut controller = ctx.controller(ScriptedApi::new(), Session::default());
        controller.resume(USER_ID).await.unwrap();

        assert!(controller.session().is_logged_in());
        assert_eq!(controller.api().calls(), vec!["user".to_string()]);
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_resume_unknown_user(ctx: &mut SessionTestContext) {
        let mut controller = ctx.controller(ScriptedApi::new(), Session::default());

        let result = controller.resume("nobody").await;

        assert!(matches!(
            result,
            Err(SessionError::PreconditionViolation(Precondition::UnknownUser(ref id))) if id == "nobody"
        ));
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_actions_require_login(ctx: &mut SessionTestContext) {
        let mut controller = ctx.controller(ScriptedApi::new(), Session::new("kirska"));
        let mut task = PendingTask::new("Sweep", "", 0, Priority::Easy);

        let created = controller.create_task(&mut task).await;
        let synced = controller.sync_tags().await;

        assert!(matches!(
            created,
            Err(SessionError::PreconditionViolation(Precondition::NotLoggedIn))
        ));
        assert!(matches!(
            synced,
            Err(SessionError::PreconditionViolation(Precondition::NotLoggedIn))
        ));
        assert!(controller.api().calls().is_empty());
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_create_task_assigns_remote_id(ctx: &mut SessionTestContext) {
        let mut controller = ctx.logged_in(ScriptedApi::new()).await;
        let mut task = PendingTask::new("Renew passport", "bring photos", 14, Priority::Hard).with_tags(["t1"]);

        let task_id = controller.create_task(&mut task).await.unwrap();

        assert_eq!(task_id, "task-42");
        assert_eq!(task.task_id, "task-42");
        assert_eq!(controller.session().last_http_status(), Some(201));
        assert_eq!(controller.api().seen_tokens(), vec![API_TOKEN.to_string()]);
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_rejected_create_keeps_task_unassigned(ctx: &mut SessionTestContext) {
        let mut controller = ctx.logged_in(ScriptedApi::new()).await;
        controller.api().set_task_status(400);
        let mut task = PendingTask::new("", "", 0, Priority::Easy);

        let result = controller.create_task(&mut task).await;

        assert!(matches!(result, Err(SessionError::RemoteRejected(400))));
        assert!(!task.is_created());
        assert_eq!(controller.session().last_http_status(), Some(400));
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_edit_without_task_id_makes_no_call(ctx: &mut SessionTestContext) {
        let mut controller = ctx.logged_in(ScriptedApi::new()).await;
        let mut task = PendingTask::new("Never created", "", 2, Priority::Medium);

        let result = controller.edit_task(&mut task).await;

        assert!(matches!(
            result,
            Err(SessionError::PreconditionViolation(Precondition::MissingTaskId))
        ));
        assert_eq!(controller.api().calls(), vec!["login".to_string()]);
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_edit_created_task(ctx: &mut SessionTestContext) {
        let mut controller = ctx.logged_in(ScriptedApi::new()).await;
        let mut task = PendingTask::new("Clean garage", "", 0, Priority::Easy);
        controller.create_task(&mut task).await.unwrap();

        task.days_until_due = 3;
        let task_id = controller.edit_task(&mut task).await.unwrap();

        assert_eq!(task_id, "task-42");
        assert_eq!(controller.session().last_http_status(), Some(200));

        controller.api().set_task_status(404);
        let result = controller.edit_task(&mut task).await;
        assert!(matches!(result, Err(SessionError::RemoteRejected(404))));
        assert_eq!(controller.session().last_http_status(), Some(404));
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_sync_replaces_stale_tags(ctx: &mut SessionTestContext) {
        let mut controller = ctx.logged_in(ScriptedApi::new()).await;
        ctx.seed_tags(USER_ID, &["2", "3"]);
        controller.api().set_remote_tags(Some(remote(&[("1", "home"), ("2", "work")])));

        let fetched = controller.sync_tags().await.unwrap();

        assert_eq!(fetched.len(), 2);
        assert_eq!(ctx.local_tag_ids(), vec!["1".to_string(), "2".to_string()]);
        assert_eq!(ctx.tags().get("2").unwrap().unwrap().text, "work");
        assert!(ctx.tags().get("3").unwrap().is_none());
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_sync_is_a_full_snapshot_diff(ctx: &mut SessionTestContext) {
        let mut controller = ctx.logged_in(ScriptedApi::new()).await;
        ctx.seed_tags(USER_ID, &["A", "B", "C"]);
        controller.api().set_remote_tags(Some(remote(&[("B", "b"), ("C", "c"), ("D", "d")])));

        controller.sync_tags().await.unwrap();

        assert_eq!(ctx.local_tag_ids(), vec!["B".to_string(), "C".to_string(), "D".to_string()]);
        assert_eq!(ctx.tags().get("B").unwrap().unwrap().text, "b");
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_sync_twice_is_stable(ctx: &mut SessionTestContext) {
        let mut controller = ctx.logged_in(ScriptedApi::new()).await;
        controller.api().set_remote_tags(Some(remote(&[("1", "home"), ("2", "work")])));

        controller.sync_tags().await.unwrap();
        let first = ctx.tags().list_for_owner(USER_ID).unwrap();
        controller.sync_tags().await.unwrap();
        let second = ctx.tags().list_for_owner(USER_ID).unwrap();

        assert_eq!(first, second);
        assert_eq!(second.len(), 2);
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_sync_leaves_other_owners_alone(ctx: &mut SessionTestContext) {
        let mut controller = ctx.logged_in(ScriptedApi::new()).await;
        let mut other = ctx.controller(
            ScriptedApi::new(),
            Session::restore("user-2", ctx.cipher.encrypt_token("other").unwrap()),
        );
        other.login_with_api_key().await.unwrap();
        ctx.seed_tags("user-2", &["x"]);
        controller.api().set_remote_tags(Some(remote(&[("1", "home")])));

        controller.sync_tags().await.unwrap();

        assert_eq!(ctx.tags().ids_for_owner("user-2").unwrap(), vec!["x".to_string()]);
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_interrupted_sync_converges_on_rerun(ctx: &mut SessionTestContext) {
        let mut controller = ctx.logged_in(ScriptedApi::new()).await;
        ctx.seed_tags(USER_ID, &["A", "B", "C"]);
        controller.api().set_remote_tags(Some(remote(&[("B", "b"), ("D", "d"), ("C", "c")])));
        let db = Db::open(&ctx.db_path).unwrap();
        db.conn
            .execute_batch(
                "CREATE TRIGGER refuse_d BEFORE INSERT ON tags WHEN NEW.tag_id = 'D'
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();

        let result = controller.sync_tags().await;

        assert!(matches!(result, Err(SessionError::Store(_))));
        assert_eq!(ctx.tags().get("B").unwrap().unwrap().text, "b");
        assert_eq!(ctx.local_tag_ids(), vec!["A", "B", "C"]);

        db.conn.execute_batch("DROP TRIGGER refuse_d;").unwrap();
        controller.sync_tags().await.unwrap();

        assert_eq!(ctx.local_tag_ids(), vec!["B", "C", "D"]);
        assert_eq!(ctx.tags().get("D").unwrap().unwrap().text, "d");
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_sync_tolerates_tags_removed_concurrently(ctx: &mut SessionTestContext) {
        let mut controller = ctx.logged_in(ScriptedApi::new()).await;
        ctx.seed_tags(USER_ID, &["A", "B"]);
        controller.api().set_remote_tags(Some(remote(&[("B", "b")])));
        Db::open(&ctx.db_path)
            .unwrap()
            .conn
            .execute_batch(
                "CREATE TRIGGER drop_a AFTER UPDATE ON tags WHEN NEW.tag_id = 'B'
                 BEGIN DELETE FROM tags WHERE tag_id = 'A'; END;",
            )
            .unwrap();

        controller.sync_tags().await.unwrap();

        assert_eq!(ctx.local_tag_ids(), vec!["B"]);
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_failed_sync_does_not_touch_store(ctx: &mut SessionTestContext) {
        let mut controller = ctx.logged_in(ScriptedApi::with_tags_status(500)).await;
        ctx.seed_tags(USER_ID, &["2", "3"]);

        let result = controller.sync_tags().await;

        assert!(matches!(result, Err(SessionError::RemoteRejected(500))));
        assert_eq!(controller.session().last_http_status(), Some(500));
        assert_eq!(ctx.local_tag_ids(), vec!["2".to_string(), "3".to_string()]);
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_sync_without_data_is_empty_response(ctx: &mut SessionTestContext) {
        let mut controller = ctx.logged_in(ScriptedApi::new()).await;
        ctx.seed_tags(USER_ID, &["2"]);
        controller.api().set_remote_tags(None);

        let result = controller.sync_tags().await;

        assert!(matches!(result, Err(SessionError::EmptyResponse)));
        assert_eq!(controller.session().last_http_status(), Some(200));
        assert_eq!(ctx.local_tag_ids(), vec!["2".to_string()]);
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_empty_tag_list_is_rejected_by_default(ctx: &mut SessionTestContext) {
        let mut controller = ctx.logged_in(ScriptedApi::new()).await;
        ctx.seed_tags(USER_ID, &["2", "3"]);
        controller.api().set_remote_tags(Some(Vec::new()));

        let result = controller.sync_tags().await;

        assert!(matches!(result, Err(SessionError::EmptyResponse)));
        assert_eq!(ctx.local_tag_ids(), vec!["2".to_string(), "3".to_string()]);
    }

    #[test_context(SessionTestContext)]
    #[tokio::test]
    async fn test_empty_tag_list_wipes_when_configured(ctx: &mut SessionTestContext) {
        let mut controller = ctx
            .logged_in(ScriptedApi::new())
            .await
            .with_empty_tag_policy(EmptyTagPolicy::Wipe);
        ctx.seed_tags(USER_ID, &["2", "3"]);
        controller.api().set_remote_tags(Some(Vec::new()));

        let fetched = controller.sync_tags().await.unwrap();

        assert!(fetched.is_empty());
        assert!(ctx.local_tag_ids().is_empty());
    }
}
