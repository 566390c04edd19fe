//! Database layer: migrations, queries, and transactional fund allocation.

use std::str::FromStr;
use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{FromRow, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::errors::{AppError, Result};
use crate::investment::{invest, Allocation, Investable};
use crate::models::{CharityProject, Donation, DonationCreate, ProjectCreate, ProjectUpdate, User};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    // Make sure the file is created if it doesn't exist yet.
    let options = SqliteConnectOptions::from_str(&url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

/// Write transactions queue behind each other for at most this long.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Start a transaction that takes the write lock up front.
///
/// A deferred transaction that reads first and writes later cannot wait for
/// the lock; SQLite fails it with `SQLITE_BUSY` instead.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

// ─────────────────────────────────────────────────────────
// Allocation
// ─────────────────────────────────────────────────────────

/// A table whose rows take part in fund allocation.
pub trait FundingRow: Investable + for<'r> FromRow<'r, SqliteRow> + Send + Unpin {
    const TABLE: &'static str;

    fn id(&self) -> i64;
}

impl FundingRow for CharityProject {
    const TABLE: &'static str = "charity_project";

    fn id(&self) -> i64 {
        self.id
    }
}

impl FundingRow for Donation {
    const TABLE: &'static str = "donation";

    fn id(&self) -> i64 {
        self.id
    }
}

/// All rows of `T` that still accept funds, oldest first.
pub async fn open_entries<T: FundingRow>(conn: &mut SqliteConnection) -> Result<Vec<T>> {
    let sql = format!(
        "SELECT * FROM {} WHERE fully_invested = 0 ORDER BY id ASC",
        T::TABLE
    );
    let rows = sqlx::query_as::<_, T>(&sql).fetch_all(&mut *conn).await?;
    Ok(rows)
}

/// Write back the investment columns of a single row.
async fn save_investment_state<T: FundingRow>(conn: &mut SqliteConnection, entry: &T) -> Result<()> {
    let sql = format!(
        "UPDATE {} SET invested_amount = ?1, fully_invested = ?2, close_date = ?3 WHERE id = ?4",
        T::TABLE
    );
    sqlx::query(&sql)
        .bind(entry.invested_amount())
        .bind(entry.fully_invested())
        .bind(entry.close_date())
        .bind(entry.id())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Match `target` against the open rows of `C` and persist every change.
///
/// Must run inside the transaction that created or updated `target`.
pub async fn allocate<T, C>(
    conn: &mut SqliteConnection,
    target: &mut T,
    now: NaiveDateTime,
) -> Result<Allocation>
where
    T: FundingRow,
    C: FundingRow,
{
    if target.fully_invested() {
        return Ok(Allocation {
            target_closed: true,
            ..Allocation::default()
        });
    }

    let mut counters = open_entries::<C>(conn).await?;
    let allocation = invest(target, &mut counters, now);

    for &index in &allocation.touched {
        save_investment_state(conn, &counters[index]).await?;
    }
    save_investment_state(conn, target).await?;

    debug!(
        "Allocated {} from {} #{} across {} {} row(s), {} closed",
        allocation.transferred,
        T::TABLE,
        target.id(),
        allocation.touched.len(),
        C::TABLE,
        allocation.closed.len()
    );
    Ok(allocation)
}

// ─────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────

/// Register a regular user with a freshly generated token.
pub async fn create_user(pool: &SqlitePool, email: &str) -> Result<User> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, token, is_superuser, created_at)
        VALUES (?1, lower(hex(randomblob(32))), 0, ?2)
        RETURNING *
        "#,
    )
    .bind(email)
    .bind(now())
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Validation(format!("User `{email}` is already registered"))
        } else {
            e.into()
        }
    })
}

/// Create or promote the configured superuser.
pub async fn ensure_superuser(pool: &SqlitePool, email: &str, token: &str) -> Result<User> {
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, token, is_superuser, created_at)
        VALUES (?1, ?2, 1, ?3)
        ON CONFLICT (email) DO UPDATE SET token = excluded.token, is_superuser = 1
        RETURNING *
        "#,
    )
    .bind(email)
    .bind(token)
    .bind(now())
    .fetch_one(pool)
    .await?;
    Ok(user)
}

pub async fn user_by_token(pool: &SqlitePool, token: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE token = ?1")
        .bind(token)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

// ─────────────────────────────────────────────────────────
// Charity projects
// ─────────────────────────────────────────────────────────

pub async fn list_projects(pool: &SqlitePool, skip: i64, limit: i64) -> Result<Vec<CharityProject>> {
    let rows = sqlx::query_as::<_, CharityProject>(
        "SELECT * FROM charity_project ORDER BY id ASC LIMIT ?1 OFFSET ?2",
    )
    .bind(limit)
    .bind(skip)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_project(conn: &mut SqliteConnection, id: i64) -> Result<Option<CharityProject>> {
    let row = sqlx::query_as::<_, CharityProject>("SELECT * FROM charity_project WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row)
}

async fn project_id_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM charity_project WHERE name = ?1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|(id,)| id))
}

/// Reject edits to closed projects and reductions below the invested amount.
pub fn ensure_can_update(project: &CharityProject, update: &ProjectUpdate) -> Result<()> {
    if project.fully_invested {
        return Err(AppError::ProjectClosed);
    }
    if let Some(full_amount) = update.full_amount() {
        if full_amount < project.invested_amount {
            return Err(AppError::AmountBelowInvested);
        }
    }
    Ok(())
}

/// Only projects that never received money may be deleted.
pub fn ensure_can_delete(project: &CharityProject) -> Result<()> {
    if project.invested_amount > 0 {
        return Err(AppError::ProjectFunded);
    }
    Ok(())
}

/// Insert a project and fund it from open donations.
pub async fn create_project(pool: &SqlitePool, data: &ProjectCreate) -> Result<CharityProject> {
    let mut tx = begin_write(pool).await?;

    if project_id_by_name(&mut tx, &data.name).await?.is_some() {
        return Err(AppError::DuplicateName);
    }

    let created = now();
    let mut project = sqlx::query_as::<_, CharityProject>(
        r#"
        INSERT INTO charity_project
            (name, description, full_amount, invested_amount, fully_invested, create_date)
        VALUES (?1, ?2, ?3, 0, 0, ?4)
        RETURNING *
        "#,
    )
    .bind(&data.name)
    .bind(&data.description)
    .bind(data.full_amount)
    .bind(created)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::DuplicateName
        } else {
            e.into()
        }
    })?;

    allocate::<_, Donation>(&mut tx, &mut project, created).await?;
    tx.commit().await?;

    info!(
        "Created project #{} `{}` ({} of {} invested)",
        project.id, project.name, project.invested_amount, project.full_amount
    );
    Ok(project)
}

/// Apply a partial update, then fund any newly opened need from open donations.
pub async fn update_project(
    pool: &SqlitePool,
    id: i64,
    update: &ProjectUpdate,
) -> Result<CharityProject> {
    let mut tx = begin_write(pool).await?;

    let mut project = get_project(&mut tx, id)
        .await?
        .ok_or(AppError::NotFound("Charity project"))?;
    ensure_can_update(&project, update)?;

    if let Some(name) = update.name() {
        if let Some(other) = project_id_by_name(&mut tx, name).await? {
            if other != id {
                return Err(AppError::DuplicateName);
            }
        }
        project.name = name.to_string();
    }
    if let Some(description) = update.description() {
        project.description = description.to_string();
    }
    if let Some(full_amount) = update.full_amount() {
        project.full_amount = full_amount;
    }

    let updated = now();
    if project.remaining() == 0 {
        project.close(updated);
    }

    sqlx::query(
        r#"
        UPDATE charity_project
        SET    name = ?1, description = ?2, full_amount = ?3,
               fully_invested = ?4, close_date = ?5
        WHERE  id = ?6
        "#,
    )
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.full_amount)
    .bind(project.fully_invested)
    .bind(project.close_date)
    .bind(project.id)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::DuplicateName
        } else {
            e.into()
        }
    })?;

    allocate::<_, Donation>(&mut tx, &mut project, updated).await?;
    tx.commit().await?;

    info!("Updated project #{}", project.id);
    Ok(project)
}

pub async fn delete_project(pool: &SqlitePool, id: i64) -> Result<CharityProject> {
    let mut tx = begin_write(pool).await?;

    let project = get_project(&mut tx, id)
        .await?
        .ok_or(AppError::NotFound("Charity project"))?;
    ensure_can_delete(&project)?;

    sqlx::query("DELETE FROM charity_project WHERE id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("Deleted project #{id} `{}`", project.name);
    Ok(project)
}

/// Closed projects, fastest to reach full funding first.
pub async fn closed_projects_by_completion_rate(pool: &SqlitePool) -> Result<Vec<CharityProject>> {
    let rows = sqlx::query_as::<_, CharityProject>(
        r#"
        SELECT *
        FROM   charity_project
        WHERE  fully_invested = 1
        ORDER  BY julianday(close_date) - julianday(create_date) ASC, id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// ─────────────────────────────────────────────────────────
// Donations
// ─────────────────────────────────────────────────────────

pub async fn list_donations(pool: &SqlitePool, skip: i64, limit: i64) -> Result<Vec<Donation>> {
    let rows = sqlx::query_as::<_, Donation>(
        "SELECT * FROM donation ORDER BY id ASC LIMIT ?1 OFFSET ?2",
    )
    .bind(limit)
    .bind(skip)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn donations_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<Donation>> {
    let rows = sqlx::query_as::<_, Donation>(
        "SELECT * FROM donation WHERE user_id = ?1 ORDER BY id ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Insert a donation and spread it over open projects.
pub async fn create_donation(
    pool: &SqlitePool,
    user_id: i64,
    data: &DonationCreate,
) -> Result<Donation> {
    let mut tx = begin_write(pool).await?;

    let created = now();
    let mut donation = sqlx::query_as::<_, Donation>(
        r#"
        INSERT INTO donation
            (user_id, comment, full_amount, invested_amount, fully_invested, create_date)
        VALUES (?1, ?2, ?3, 0, 0, ?4)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&data.comment)
    .bind(data.full_amount)
    .bind(created)
    .fetch_one(&mut *tx)
    .await?;

    allocate::<_, CharityProject>(&mut tx, &mut donation, created).await?;
    tx.commit().await?;

    info!(
        "User #{user_id} donated {} (donation #{}, {} invested)",
        donation.full_amount, donation.id, donation.invested_amount
    );
    Ok(donation)
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::invariants::{assert_all_entry_invariants, assert_conservation};

    /// Single-connection in-memory database with migrations applied.
    pub(crate) async fn test_pool() -> SqlitePool {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn new_project(name: &str, full_amount: i64) -> ProjectCreate {
        ProjectCreate {
            name: name.to_string(),
            description: format!("{name} description"),
            full_amount,
        }
    }

    fn new_donation(full_amount: i64) -> DonationCreate {
        DonationCreate {
            full_amount,
            comment: None,
        }
    }

    async fn all_projects(pool: &SqlitePool) -> Vec<CharityProject> {
        list_projects(pool, 0, 100).await.unwrap()
    }

    async fn all_donations(pool: &SqlitePool) -> Vec<Donation> {
        list_donations(pool, 0, 100).await.unwrap()
    }

    async fn assert_books_balance(pool: &SqlitePool) {
        let projects = all_projects(pool).await;
        let donations = all_donations(pool).await;
        for p in &projects {
            assert_all_entry_invariants(p);
        }
        for d in &donations {
            assert_all_entry_invariants(d);
        }
        assert_conservation(
            projects.iter().map(|p| p.invested_amount).sum(),
            donations.iter().map(|d| d.invested_amount).sum(),
        );
    }

    #[tokio::test]
    async fn donation_without_projects_stays_open() {
        let pool = test_pool().await;
        let user = create_user(&pool, "donor@example.com").await.unwrap();

        let donation = create_donation(&pool, user.id, &new_donation(500)).await.unwrap();

        assert_eq!(donation.invested_amount, 0);
        assert!(!donation.fully_invested);
        assert!(donation.close_date.is_none());
    }

    #[tokio::test]
    async fn new_project_absorbs_open_donations_oldest_first() {
        let pool = test_pool().await;
        let user = create_user(&pool, "donor@example.com").await.unwrap();
        for amount in [100, 200, 300] {
            create_donation(&pool, user.id, &new_donation(amount)).await.unwrap();
        }

        let project = create_project(&pool, &new_project("Shelter", 250)).await.unwrap();

        assert!(project.fully_invested);
        assert_eq!(project.invested_amount, 250);
        assert!(project.close_date.is_some());

        let donations = all_donations(&pool).await;
        assert_eq!(
            donations
                .iter()
                .map(|d| (d.invested_amount, d.fully_invested))
                .collect::<Vec<_>>(),
            vec![(100, true), (150, false), (0, false)]
        );
        assert_eq!(donations[0].close_date, project.close_date);
        assert_books_balance(&pool).await;
    }

    #[tokio::test]
    async fn new_donation_funds_open_projects() {
        let pool = test_pool().await;
        let user = create_user(&pool, "donor@example.com").await.unwrap();
        create_project(&pool, &new_project("Food", 100)).await.unwrap();
        create_project(&pool, &new_project("Vet", 300)).await.unwrap();

        let donation = create_donation(&pool, user.id, &new_donation(250)).await.unwrap();

        assert!(donation.fully_invested);
        let projects = all_projects(&pool).await;
        assert!(projects[0].fully_invested);
        assert_eq!(projects[1].invested_amount, 150);
        assert!(!projects[1].fully_invested);
        assert_books_balance(&pool).await;
    }

    #[tokio::test]
    async fn duplicate_project_name_is_rejected() {
        let pool = test_pool().await;
        create_project(&pool, &new_project("Food", 100)).await.unwrap();

        let err = create_project(&pool, &new_project("Food", 50)).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateName));
        assert_eq!(all_projects(&pool).await.len(), 1);
    }

    #[tokio::test]
    async fn raised_full_amount_is_filled_by_later_donations() {
        let pool = test_pool().await;
        let user = create_user(&pool, "donor@example.com").await.unwrap();
        let project = create_project(&pool, &new_project("Food", 100)).await.unwrap();
        create_donation(&pool, user.id, &new_donation(60)).await.unwrap();

        let update = ProjectUpdate {
            full_amount: Some(Some(200)),
            ..ProjectUpdate::default()
        };
        let project = update_project(&pool, project.id, &update).await.unwrap();
        assert_eq!(project.full_amount, 200);
        assert_eq!(project.invested_amount, 60);
        assert!(!project.fully_invested);

        let donation = create_donation(&pool, user.id, &new_donation(200)).await.unwrap();
        assert_eq!(donation.invested_amount, 140);
        assert!(!donation.fully_invested);

        let projects = all_projects(&pool).await;
        assert!(projects[0].fully_invested);
        assert_eq!(projects[0].invested_amount, 200);
        assert_books_balance(&pool).await;
    }

    #[tokio::test]
    async fn lowering_full_amount_to_invested_closes_project() {
        let pool = test_pool().await;
        let user = create_user(&pool, "donor@example.com").await.unwrap();
        let project = create_project(&pool, &new_project("Food", 100)).await.unwrap();
        create_donation(&pool, user.id, &new_donation(40)).await.unwrap();

        let update = ProjectUpdate {
            full_amount: Some(Some(40)),
            ..ProjectUpdate::default()
        };
        let project = update_project(&pool, project.id, &update).await.unwrap();

        assert!(project.fully_invested);
        assert!(project.close_date.is_some());
        assert_books_balance(&pool).await;
    }

    #[tokio::test]
    async fn update_rules_are_enforced() {
        let pool = test_pool().await;
        let user = create_user(&pool, "donor@example.com").await.unwrap();
        let food = create_project(&pool, &new_project("Food", 100)).await.unwrap();
        let vet = create_project(&pool, &new_project("Vet", 100)).await.unwrap();
        create_donation(&pool, user.id, &new_donation(150)).await.unwrap();

        let below = ProjectUpdate {
            full_amount: Some(Some(10)),
            ..ProjectUpdate::default()
        };
        assert!(matches!(
            update_project(&pool, vet.id, &below).await,
            Err(AppError::AmountBelowInvested)
        ));

        let rename = ProjectUpdate {
            name: Some(Some("Vet".to_string())),
            ..ProjectUpdate::default()
        };
        assert!(matches!(
            update_project(&pool, food.id, &rename).await,
            Err(AppError::ProjectClosed)
        ));

        // Keeping its own name is not a collision.
        let same = update_project(&pool, vet.id, &rename).await.unwrap();
        assert_eq!(same.name, "Vet");

        assert!(matches!(
            update_project(&pool, 999, &rename).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn renaming_to_taken_name_is_rejected() {
        let pool = test_pool().await;
        create_project(&pool, &new_project("Food", 100)).await.unwrap();
        let vet = create_project(&pool, &new_project("Vet", 100)).await.unwrap();

        let rename = ProjectUpdate {
            name: Some(Some("Food".to_string())),
            ..ProjectUpdate::default()
        };
        assert!(matches!(
            update_project(&pool, vet.id, &rename).await,
            Err(AppError::DuplicateName)
        ));
    }

    #[tokio::test]
    async fn only_unfunded_projects_can_be_deleted() {
        let pool = test_pool().await;
        let user = create_user(&pool, "donor@example.com").await.unwrap();
        let funded = create_project(&pool, &new_project("Food", 100)).await.unwrap();
        create_donation(&pool, user.id, &new_donation(10)).await.unwrap();
        let empty = create_project(&pool, &new_project("Vet", 100)).await.unwrap();

        assert!(matches!(
            delete_project(&pool, funded.id).await,
            Err(AppError::ProjectFunded)
        ));

        let deleted = delete_project(&pool, empty.id).await.unwrap();
        assert_eq!(deleted.name, "Vet");
        assert_eq!(all_projects(&pool).await.len(), 1);

        assert!(matches!(
            delete_project(&pool, empty.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn closed_projects_are_ordered_by_funding_time() {
        let pool = test_pool().await;
        for (name, created, closed) in [
            ("Slow", "2024-01-01 00:00:00", "2024-01-10 00:00:00"),
            ("Fast", "2024-01-05 00:00:00", "2024-01-05 06:00:00"),
            ("Medium", "2024-01-02 00:00:00", "2024-01-04 00:00:00"),
        ] {
            sqlx::query(
                r#"
                INSERT INTO charity_project
                    (name, description, full_amount, invested_amount, fully_invested,
                     create_date, close_date)
                VALUES (?1, 'd', 10, 10, 1, ?2, ?3)
                "#,
            )
            .bind(name)
            .bind(created)
            .bind(closed)
            .execute(&pool)
            .await
            .unwrap();
        }
        create_project(&pool, &new_project("Open", 10)).await.unwrap();

        let names: Vec<String> = closed_projects_by_completion_rate(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Fast", "Medium", "Slow"]);
    }

    #[tokio::test]
    async fn donations_are_scoped_to_their_owner() {
        let pool = test_pool().await;
        let alice = create_user(&pool, "alice@example.com").await.unwrap();
        let bob = create_user(&pool, "bob@example.com").await.unwrap();
        create_donation(&pool, alice.id, &new_donation(10)).await.unwrap();
        create_donation(&pool, bob.id, &new_donation(20)).await.unwrap();
        create_donation(&pool, alice.id, &new_donation(30)).await.unwrap();

        let mine = donations_for_user(&pool, alice.id).await.unwrap();
        assert_eq!(
            mine.iter().map(|d| d.full_amount).collect::<Vec<_>>(),
            vec![10, 30]
        );
        assert_eq!(list_donations(&pool, 1, 1).await.unwrap()[0].full_amount, 20);
    }

    #[tokio::test]
    async fn users_get_distinct_tokens() {
        let pool = test_pool().await;
        let a = create_user(&pool, "a@example.com").await.unwrap();
        let b = create_user(&pool, "b@example.com").await.unwrap();

        assert_eq!(a.token.len(), 64);
        assert_ne!(a.token, b.token);
        assert!(!a.is_superuser);
        assert_eq!(user_by_token(&pool, &b.token).await.unwrap(), Some(b.clone()));
        assert!(matches!(
            create_user(&pool, "a@example.com").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn superuser_seed_is_idempotent() {
        let pool = test_pool().await;
        let first = ensure_superuser(&pool, "root@example.com", "t1").await.unwrap();
        let second = ensure_superuser(&pool, "root@example.com", "t2").await.unwrap();

        assert_eq!(first.id, second.id);
        assert!(second.is_superuser);
        assert!(user_by_token(&pool, "t1").await.unwrap().is_none());
        assert!(user_by_token(&pool, "t2").await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_writes_on_a_file_database_all_succeed() {
        let path = std::env::temp_dir().join(format!(
            "charity_fund_concurrency_{}_{}.db",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let pool = init_pool(path.to_str().unwrap(), 5).await.unwrap();
        let user_id = create_user(&pool, "donor@example.com").await.unwrap().id;

        let mut handles = Vec::new();
        for i in 0..20 {
            let project_pool = pool.clone();
            handles.push(tokio::spawn(async move {
                create_project(&project_pool, &new_project(&format!("Project {i}"), 49))
                    .await
                    .map(|_| ())
            }));
            let donation_pool = pool.clone();
            handles.push(tokio::spawn(async move {
                create_donation(&donation_pool, user_id, &new_donation(49)).await.map(|_| ())
            }));
        }

        let mut failures = Vec::new();
        for handle in handles {
            if let Err(e) = handle.await.unwrap() {
                failures.push(e.to_string());
            }
        }
        assert!(failures.is_empty(), "failed writes: {failures:?}");

        assert_eq!(all_projects(&pool).await.len(), 20);
        assert_eq!(all_donations(&pool).await.len(), 20);
        assert_books_balance(&pool).await;
        assert!(all_projects(&pool).await.iter().all(|p| p.fully_invested));

        pool.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }
}
