use std::sync::Arc;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

use crate::error::{AppError, AppResult};
use crate::todos::dto::CreateTodoRequest;
use crate::todos::repo::TodoRepo;
use crate::todos::repo_types::{NewTodo, Todo, TodoPatch, TodoStatus};
use crate::users::repo::UserRepo;

fn todo_not_found() -> AppError {
    AppError::NotFound("Todo not found".into())
}

fn parse_remind_at(raw: Option<&str>) -> AppResult<Option<OffsetDateTime>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => OffsetDateTime::parse(s, &Rfc3339)
            .map(Some)
            .map_err(|_| AppError::Validation("remindAt must be an RFC 3339 timestamp".into())),
    }
}

/// Business rules for the todo lifecycle.
///
/// `PENDING -> DONE` by completion, `PENDING -> REMINDER_DUE` by the
/// reminder sweep. All writes go through the [`TodoRepo`] contract.
#[derive(Clone)]
pub struct TodoService {
    todos: Arc<dyn TodoRepo>,
    users: Arc<dyn UserRepo>,
}

impl TodoService {
    pub fn new(todos: Arc<dyn TodoRepo>, users: Arc<dyn UserRepo>) -> Self {
        Self { todos, users }
    }

    #[instrument(skip(self, req), fields(user_id = %req.user_id))]
    pub async fn create_todo(&self, req: CreateTodoRequest) -> AppResult<Todo> {
        let title = req.title.trim();
        if title.is_empty() {
            warn!("empty title");
            return Err(AppError::Validation("Title is required".into()));
        }
        let remind_at = parse_remind_at(req.remind_at.as_deref())?;

        if self.users.find_by_id(&req.user_id).await?.is_none() {
            warn!("owner does not exist");
            return Err(AppError::NotFound("User not found".into()));
        }

        let todo = self
            .todos
            .create(NewTodo {
                user_id: req.user_id,
                title: title.to_string(),
                description: req.description,
                status: TodoStatus::Pending,
                remind_at,
            })
            .await?;
        info!(todo_id = %todo.id, "todo created");
        Ok(todo)
    }

    /// Mark a todo done. Completing an already-done todo is a no-op.
    #[instrument(skip(self))]
    pub async fn complete_todo(&self, id: &str) -> AppResult<Todo> {
        let updated = self
            .todos
            .update_unless_status(id, TodoStatus::Done, TodoPatch::status(TodoStatus::Done))
            .await?;
        if let Some(todo) = updated {
            info!(todo_id = %id, "todo completed");
            return Ok(todo);
        }

        // nothing written: either already done or gone
        let todo = self.todos.find_by_id(id).await?.ok_or_else(todo_not_found)?;
        debug!(status = ?todo.status, "already done");
        Ok(todo)
    }

    /// No owner existence check: an unknown user simply has no todos.
    pub async fn get_todos_by_user(&self, user_id: &str) -> AppResult<Vec<Todo>> {
        Ok(self.todos.find_by_user_id(user_id).await?)
    }

    pub async fn get_todo(&self, id: &str) -> AppResult<Todo> {
        self.todos.find_by_id(id).await?.ok_or_else(todo_not_found)
    }

    /// Raw field patch with no lifecycle rules applied.
    #[instrument(skip(self, patch))]
    pub async fn update_todo(&self, id: &str, patch: TodoPatch) -> AppResult<Todo> {
        let todo = self.todos.update(id, patch).await?.ok_or_else(todo_not_found)?;
        info!(todo_id = %id, status = ?todo.status, "todo patched");
        Ok(todo)
    }

    #[instrument(skip(self))]
    pub async fn delete_todo(&self, id: &str) -> AppResult<()> {
        self.todos.delete(id).await?.ok_or_else(todo_not_found)?;
        info!(todo_id = %id, "todo deleted");
        Ok(())
    }

    /// Flag every pending todo whose reminder is at or before `as_of`.
    /// Returns how many todos were flagged.
    #[instrument(skip(self))]
    pub async fn process_reminders(&self, as_of: OffsetDateTime) -> AppResult<usize> {
        let due = self.todos.find_due_reminders(as_of).await?;
        if due.is_empty() {
            debug!("no reminders due");
            return Ok(0);
        }
        self.mark_reminders_due(due, as_of).await
    }

    /// Transition the given todos to `REMINDER_DUE`.
    ///
    /// Candidates may come from any source, so each one is re-checked here
    /// and again by the store: only todos still pending with an elapsed
    /// reminder are touched.
    pub async fn mark_reminders_due(
        &self,
        candidates: Vec<Todo>,
        as_of: OffsetDateTime,
    ) -> AppResult<usize> {
        let mut flagged = 0;
        for todo in candidates {
            if !todo.is_reminder_due(as_of) {
                debug!(todo_id = %todo.id, status = ?todo.status, "skipping, not due");
                continue;
            }
            let res = self
                .todos
                .update_if_status(
                    &todo.id,
                    TodoStatus::Pending,
                    TodoPatch::status(TodoStatus::ReminderDue),
                )
                .await?;
            match res {
                Some(_) => {
                    info!(todo_id = %todo.id, user_id = %todo.user_id, "reminder due");
                    flagged += 1;
                }
                None => debug!(todo_id = %todo.id, "changed or deleted before flagging"),
            }
        }
        Ok(flagged)
    }
}

#[cfg(test)]
mod todo_service_tests {
    use super::*;
    use crate::todos::repo::InMemoryTodoRepo;
    use crate::users::repo::InMemoryUserRepo;
    use time::Duration;

    struct Fixture {
        svc: TodoService,
        todos: Arc<InMemoryTodoRepo>,
        user_id: String,
    }

    async fn fixture() -> Fixture {
        let users = Arc::new(InMemoryUserRepo::new());
        let todos = Arc::new(InMemoryTodoRepo::new());
        let user = users.create("ann@example.com", "Ann").await.unwrap();
        Fixture {
            svc: TodoService::new(todos.clone(), users),
            todos,
            user_id: user.id,
        }
    }

    fn request(user_id: &str, title: &str, remind_at: Option<OffsetDateTime>) -> CreateTodoRequest {
        CreateTodoRequest {
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            remind_at: remind_at.map(|t| t.format(&Rfc3339).unwrap()),
        }
    }

    #[tokio::test]
    async fn create_starts_pending_with_equal_timestamps() {
        let f = fixture().await;
        let todo = f
            .svc
            .create_todo(CreateTodoRequest {
                description: Some("semi-skimmed".into()),
                ..request(&f.user_id, "  Buy milk  ", None)
            })
            .await
            .unwrap();

        assert_eq!(todo.title, "Buy milk");
        assert_eq!(todo.status, TodoStatus::Pending);
        assert_eq!(todo.user_id, f.user_id);
        assert_eq!(todo.description.as_deref(), Some("semi-skimmed"));
        assert_eq!(todo.created_at, todo.updated_at);
        assert!(todo.remind_at.is_none());
    }

    #[tokio::test]
    async fn create_rejects_blank_title() {
        let f = fixture().await;
        let err = f
            .svc
            .create_todo(request(&f.user_id, "   ", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(f.todos.len().await, 0);
    }

    #[tokio::test]
    async fn create_parses_remind_at() {
        let f = fixture().await;
        let mut req = request(&f.user_id, "call mum", None);
        req.remind_at = Some("2030-01-02T03:04:05+01:00".into());
        let todo = f.svc.create_todo(req).await.unwrap();
        assert_eq!(
            todo.remind_at,
            Some(time::macros::datetime!(2030-01-02 02:04:05 UTC))
        );

        let mut blank = request(&f.user_id, "no reminder", None);
        blank.remind_at = Some("  ".into());
        assert!(f.svc.create_todo(blank).await.unwrap().remind_at.is_none());

        let mut bad = request(&f.user_id, "garbage", None);
        bad.remind_at = Some("tomorrow-ish".into());
        assert!(matches!(
            f.svc.create_todo(bad).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn create_for_unknown_user_creates_nothing() {
        let f = fixture().await;
        let err = f
            .svc
            .create_todo(request("user-404", "orphan", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(f.todos.len().await, 0);
        assert!(f.svc.get_todos_by_user("user-404").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn complete_bumps_updated_at_then_is_idempotent() {
        let f = fixture().await;
        let todo = f.svc.create_todo(request(&f.user_id, "a", None)).await.unwrap();

        let done = f.svc.complete_todo(&todo.id).await.unwrap();
        assert_eq!(done.status, TodoStatus::Done);
        assert!(done.updated_at > todo.updated_at);
        assert_eq!(done.created_at, todo.created_at);

        let again = f.svc.complete_todo(&todo.id).await.unwrap();
        assert_eq!(again, done);
        assert_eq!(f.svc.get_todo(&todo.id).await.unwrap(), done);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_completions_write_once() {
        let f = fixture().await;
        for _ in 0..50 {
            let todo = f.svc.create_todo(request(&f.user_id, "race", None)).await.unwrap();
            let (a, b) = (f.svc.clone(), f.svc.clone());
            let (id_a, id_b) = (todo.id.clone(), todo.id.clone());
            let first = tokio::spawn(async move { a.complete_todo(&id_a).await.unwrap() });
            let second = tokio::spawn(async move { b.complete_todo(&id_b).await.unwrap() });
            let (first, second) = (first.await.unwrap(), second.await.unwrap());

            assert_eq!(first, second);
            assert_eq!(f.svc.get_todo(&todo.id).await.unwrap(), first);
        }
    }

    #[tokio::test]
    async fn complete_unknown_is_not_found() {
        let f = fixture().await;
        assert!(matches!(
            f.svc.complete_todo("todo-404").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn sweep_flags_exactly_the_due_pending_set() {
        let f = fixture().await;
        let now = OffsetDateTime::now_utc();
        let past = Some(now - Duration::minutes(10));

        let due_a = f.svc.create_todo(request(&f.user_id, "due a", past)).await.unwrap();
        let due_b = f
            .svc
            .create_todo(request(&f.user_id, "due b", Some(now)))
            .await
            .unwrap();
        let future = f
            .svc
            .create_todo(request(&f.user_id, "future", Some(now + Duration::hours(1))))
            .await
            .unwrap();
        let none = f.svc.create_todo(request(&f.user_id, "none", None)).await.unwrap();
        let done = f.svc.create_todo(request(&f.user_id, "done", past)).await.unwrap();
        let done = f.svc.complete_todo(&done.id).await.unwrap();

        let flagged = f.svc.process_reminders(now).await.unwrap();
        assert_eq!(flagged, 2);

        for id in [&due_a.id, &due_b.id] {
            assert_eq!(f.svc.get_todo(id).await.unwrap().status, TodoStatus::ReminderDue);
        }
        assert_eq!(f.svc.get_todo(&future.id).await.unwrap(), future);
        assert_eq!(f.svc.get_todo(&none.id).await.unwrap(), none);
        assert_eq!(f.svc.get_todo(&done.id).await.unwrap(), done);

        // already flagged todos are not picked up again
        assert_eq!(f.svc.process_reminders(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn overdue_todo_becomes_reminder_due() {
        let f = fixture().await;
        let one_second_ago = OffsetDateTime::now_utc() - Duration::seconds(1);
        let todo = f
            .svc
            .create_todo(request(&f.user_id, "stretch", Some(one_second_ago)))
            .await
            .unwrap();
        assert_eq!(todo.status, TodoStatus::Pending);

        f.svc.process_reminders(OffsetDateTime::now_utc()).await.unwrap();

        let fetched = f.svc.get_todo(&todo.id).await.unwrap();
        assert_eq!(fetched.status, TodoStatus::ReminderDue);
        assert!(fetched.updated_at > todo.updated_at);
    }

    #[tokio::test]
    async fn todo_without_reminder_is_untouched_by_sweep() {
        let f = fixture().await;
        let todo = f.svc.create_todo(request(&f.user_id, "someday", None)).await.unwrap();

        assert_eq!(f.svc.process_reminders(OffsetDateTime::now_utc()).await.unwrap(), 0);
        assert_eq!(f.svc.get_todo(&todo.id).await.unwrap(), todo);
    }

    #[tokio::test]
    async fn mark_reminders_due_skips_non_pending_candidates() {
        let f = fixture().await;
        let now = OffsetDateTime::now_utc();
        let past = Some(now - Duration::minutes(1));

        let pending = f.svc.create_todo(request(&f.user_id, "p", past)).await.unwrap();
        let done = f.svc.create_todo(request(&f.user_id, "d", past)).await.unwrap();
        let done = f.svc.complete_todo(&done.id).await.unwrap();
        let not_yet = f
            .svc
            .create_todo(request(&f.user_id, "later", Some(now + Duration::minutes(1))))
            .await
            .unwrap();

        let flagged = f
            .svc
            .mark_reminders_due(vec![pending.clone(), done.clone(), not_yet.clone()], now)
            .await
            .unwrap();
        assert_eq!(flagged, 1);
        assert_eq!(f.svc.get_todo(&done.id).await.unwrap(), done);
        assert_eq!(f.svc.get_todo(&not_yet.id).await.unwrap(), not_yet);
    }

    #[tokio::test]
    async fn stale_pending_snapshot_does_not_overwrite_done() {
        let f = fixture().await;
        let now = OffsetDateTime::now_utc();
        let todo = f
            .svc
            .create_todo(request(&f.user_id, "race", Some(now - Duration::minutes(1))))
            .await
            .unwrap();

        // snapshot taken while pending, completed before the sweep writes
        let snapshot = f.todos.find_due_reminders(now).await.unwrap();
        let done = f.svc.complete_todo(&todo.id).await.unwrap();

        assert_eq!(f.svc.mark_reminders_due(snapshot, now).await.unwrap(), 0);
        assert_eq!(f.svc.get_todo(&todo.id).await.unwrap(), done);
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_ids() {
        let f = fixture().await;
        let todo = f.svc.create_todo(request(&f.user_id, "a", None)).await.unwrap();

        let patched = f
            .svc
            .update_todo(
                &todo.id,
                TodoPatch {
                    title: Some("renamed".into()),
                    ..TodoPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(patched.title, "renamed");
        assert_eq!(patched.user_id, todo.user_id);
        assert!(patched.updated_at > todo.updated_at);

        f.svc.delete_todo(&todo.id).await.unwrap();
        assert!(matches!(f.svc.get_todo(&todo.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(f.svc.delete_todo(&todo.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            f.svc.update_todo(&todo.id, TodoPatch::default()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(f.svc.complete_todo(&todo.id).await, Err(AppError::NotFound(_))));
    }
}
