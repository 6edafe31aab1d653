//! Postgres primary store.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{info, warn};

use crate::config::PrimaryConfig;
use crate::core::audit::LOGS_TABLE_DDL;
use crate::core::{
    AuditEvent, DateRoster, DayChange, DefaultAssignment, EmployeeRecord, PendingEmployee,
    PrimaryStore, QueueEntry, ScheduleError, SeatKey, WeeklyRequest, WorkDay,
};
use crate::util::serde::EmployeeId;

/// Primary store on a Postgres connection pool. Every statement is bounded
/// by the configured command timeout.
#[derive(Clone)]
pub struct PostgresPrimary {
    pool: PgPool,
    command_timeout: Duration,
}

impl PostgresPrimary {
    /// Connect using the pool settings from configuration.
    pub async fn connect(cfg: &PrimaryConfig) -> Result<Self, ScheduleError> {
        let url = cfg
            .database_url
            .as_deref()
            .ok_or_else(|| ScheduleError::primary("database_url is not set"))?;
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .min_connections(cfg.min_connections)
            .acquire_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .connect(url)
            .await
            .map_err(ScheduleError::primary)?;
        info!(max_connections = cfg.max_connections, "connected to primary store");
        Ok(Self::from_pool(pool, Duration::from_secs(cfg.command_timeout_secs)))
    }

    /// Wrap an existing pool.
    pub const fn from_pool(pool: PgPool, command_timeout: Duration) -> Self {
        Self {
            pool,
            command_timeout,
        }
    }

    /// Schema statements, in order.
    pub fn migrations() -> &'static [&'static str] {
        &[
            r"
CREATE TABLE IF NOT EXISTS employees (
    id BIGINT PRIMARY KEY,
    manual_name TEXT NOT NULL,
    display_name TEXT NOT NULL DEFAULT '',
    username TEXT,
    approved BOOLEAN NOT NULL DEFAULT FALSE
);
CREATE INDEX IF NOT EXISTS idx_employees_username ON employees (LOWER(username));
",
            r"
CREATE TABLE IF NOT EXISTS admins (
    id BIGINT PRIMARY KEY
);
",
            r"
CREATE TABLE IF NOT EXISTS pending_employees (
    username TEXT PRIMARY KEY,
    manual_name TEXT NOT NULL
);
",
            r"
CREATE TABLE IF NOT EXISTS default_schedule (
    day_name TEXT PRIMARY KEY,
    seat_map_json TEXT NOT NULL
);
",
            r"
CREATE TABLE IF NOT EXISTS schedules (
    date DATE PRIMARY KEY,
    day_name TEXT NOT NULL,
    employees TEXT NOT NULL DEFAULT ''
);
",
            r"
CREATE TABLE IF NOT EXISTS requests (
    week_start DATE NOT NULL,
    employee_id BIGINT NOT NULL,
    days_requested TEXT NOT NULL DEFAULT '',
    days_skipped TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (week_start, employee_id)
);
",
            r"
CREATE TABLE IF NOT EXISTS queue (
    id BIGSERIAL PRIMARY KEY,
    date DATE NOT NULL,
    employee_id BIGINT NOT NULL,
    employee_name TEXT NOT NULL,
    UNIQUE (date, employee_id)
);
CREATE INDEX IF NOT EXISTS idx_queue_date ON queue (date, id);
",
            LOGS_TABLE_DDL,
        ]
    }

    /// Apply [`PostgresPrimary::migrations`].
    pub async fn run_migrations(&self) -> Result<(), ScheduleError> {
        for statement in Self::migrations() {
            self.timed(sqlx::raw_sql(statement).execute(&self.pool)).await?;
        }
        info!(statements = Self::migrations().len(), "primary schema migrated");
        Ok(())
    }

    async fn timed<T, F>(&self, fut: F) -> Result<T, ScheduleError>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(result) => result.map_err(ScheduleError::primary),
            Err(_) => Err(ScheduleError::primary(format!(
                "statement timed out after {}s",
                self.command_timeout.as_secs()
            ))),
        }
    }
}

fn decode<T>(table: &str, parsed: Result<T, ScheduleError>) -> Option<T> {
    match parsed {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(table, error = %err, "malformed row skipped");
            None
        }
    }
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, ScheduleError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| ScheduleError::malformed(name, e))
}

fn employee_from_row(r: &PgRow) -> Result<EmployeeRecord, ScheduleError> {
    Ok(EmployeeRecord {
        id: column(r, "id")?,
        manual_name: column(r, "manual_name")?,
        display_name: column(r, "display_name")?,
        username: column::<Option<String>>(r, "username")?.filter(|u| !u.is_empty()),
        approved: column(r, "approved")?,
    })
}

fn pending_from_row(r: &PgRow) -> Result<PendingEmployee, ScheduleError> {
    Ok(PendingEmployee {
        username: column(r, "username")?,
        manual_name: column(r, "manual_name")?,
    })
}

fn seat_map_from_row(r: &PgRow) -> Result<(WorkDay, BTreeMap<SeatKey, String>), ScheduleError> {
    let day: WorkDay = column::<String>(r, "day_name")?.parse()?;
    let json: String = column(r, "seat_map_json")?;
    let seats = serde_json::from_str(&json).map_err(|e| ScheduleError::malformed("seat map", e))?;
    Ok((day, seats))
}

fn queue_entry_from_row(r: &PgRow) -> Result<QueueEntry, ScheduleError> {
    Ok(QueueEntry {
        employee_id: column(r, "employee_id")?,
        employee_name: column(r, "employee_name")?,
    })
}

fn request_from_row(r: &PgRow, week_start: NaiveDate) -> Result<WeeklyRequest, ScheduleError> {
    let requested = WeeklyRequest::parse_days(&column::<String>(r, "days_requested")?)?;
    let skipped = WeeklyRequest::parse_days(&column::<String>(r, "days_skipped")?)?;
    Ok(WeeklyRequest::new(
        week_start,
        column(r, "employee_id")?,
        requested,
        skipped,
    ))
}

#[async_trait]
impl PrimaryStore for PostgresPrimary {
    async fn load_admins(&self) -> Result<Vec<EmployeeId>, ScheduleError> {
        let rows = self
            .timed(sqlx::query("SELECT id FROM admins ORDER BY id").fetch_all(&self.pool))
            .await?;
        Ok(rows
            .iter()
            .filter_map(|r| decode("admins", column::<i64>(r, "id")))
            .collect())
    }

    async fn add_admin(&self, id: EmployeeId) -> Result<(), ScheduleError> {
        self.timed(
            sqlx::query("INSERT INTO admins (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
                .bind(id)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn remove_admin(&self, id: EmployeeId) -> Result<(), ScheduleError> {
        self.timed(
            sqlx::query("DELETE FROM admins WHERE id = $1")
                .bind(id)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn load_employees(&self) -> Result<Vec<EmployeeRecord>, ScheduleError> {
        let rows = self
            .timed(
                sqlx::query(
                    "SELECT id, manual_name, display_name, username, approved FROM employees ORDER BY id",
                )
                .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows
            .iter()
            .filter_map(|r| decode("employees", employee_from_row(r)))
            .collect())
    }

    async fn save_employee(&self, record: &EmployeeRecord) -> Result<(), ScheduleError> {
        self.timed(
            sqlx::query(
                r"
                INSERT INTO employees (id, manual_name, display_name, username, approved)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO UPDATE SET
                    manual_name = EXCLUDED.manual_name,
                    display_name = EXCLUDED.display_name,
                    username = EXCLUDED.username,
                    approved = EXCLUDED.approved
                ",
            )
            .bind(record.id)
            .bind(&record.manual_name)
            .bind(&record.display_name)
            .bind(record.username.as_deref())
            .bind(record.approved)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn load_pending(&self) -> Result<Vec<PendingEmployee>, ScheduleError> {
        let rows = self
            .timed(
                sqlx::query("SELECT username, manual_name FROM pending_employees ORDER BY username")
                    .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows
            .iter()
            .filter_map(|r| decode("pending_employees", pending_from_row(r)))
            .collect())
    }

    async fn save_pending(&self, pending: &PendingEmployee) -> Result<(), ScheduleError> {
        self.timed(
            sqlx::query(
                r"
                INSERT INTO pending_employees (username, manual_name) VALUES ($1, $2)
                ON CONFLICT (username) DO UPDATE SET manual_name = EXCLUDED.manual_name
                ",
            )
            .bind(&pending.username)
            .bind(&pending.manual_name)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn remove_pending(&self, username: &str) -> Result<(), ScheduleError> {
        self.timed(
            sqlx::query("DELETE FROM pending_employees WHERE username = $1")
                .bind(username)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn load_default(&self) -> Result<Option<DefaultAssignment>, ScheduleError> {
        let rows = self
            .timed(
                sqlx::query("SELECT day_name, seat_map_json FROM default_schedule")
                    .fetch_all(&self.pool),
            )
            .await?;
        let mut assignment = DefaultAssignment::default();
        let mut any = false;
        for r in &rows {
            if let Some((day, seats)) = decode("default_schedule", seat_map_from_row(r)) {
                assignment.insert_day(day, seats);
                any = true;
            }
        }
        Ok(any.then_some(assignment))
    }

    async fn save_default(&self, assignment: &DefaultAssignment) -> Result<(), ScheduleError> {
        let mut tx = self.timed(self.pool.begin()).await?;
        self.timed(sqlx::query("DELETE FROM default_schedule").execute(&mut *tx))
            .await?;
        for (day, seats) in assignment.days() {
            let json = serde_json::to_string(seats).map_err(|e| ScheduleError::malformed("seat map", e))?;
            self.timed(
                sqlx::query("INSERT INTO default_schedule (day_name, seat_map_json) VALUES ($1, $2)")
                    .bind(day.as_str())
                    .bind(json)
                    .execute(&mut *tx),
            )
            .await?;
        }
        self.timed(tx.commit()).await
    }

    async fn load_roster(&self, date: NaiveDate) -> Result<Option<DateRoster>, ScheduleError> {
        let row = self
            .timed(
                sqlx::query("SELECT employees FROM schedules WHERE date = $1")
                    .bind(date)
                    .fetch_optional(&self.pool),
            )
            .await?;
        Ok(row.and_then(|r| {
            let parsed = column::<String>(&r, "employees")
                .and_then(|csv| DateRoster::new(date, DateRoster::parse_csv(&csv)));
            decode("schedules", parsed)
        }))
    }

    async fn load_queue(&self, date: NaiveDate) -> Result<Vec<QueueEntry>, ScheduleError> {
        let rows = self
            .timed(
                sqlx::query("SELECT employee_id, employee_name FROM queue WHERE date = $1 ORDER BY id")
                    .bind(date)
                    .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows
            .iter()
            .filter_map(|r| decode("queue", queue_entry_from_row(r)))
            .collect())
    }

    async fn save_day(&self, change: &DayChange) -> Result<(), ScheduleError> {
        let mut tx = self.timed(self.pool.begin()).await?;
        if let Some(roster) = &change.roster {
            self.timed(
                sqlx::query(
                    r"
                    INSERT INTO schedules (date, day_name, employees) VALUES ($1, $2, $3)
                    ON CONFLICT (date) DO UPDATE SET
                        day_name = EXCLUDED.day_name,
                        employees = EXCLUDED.employees
                    ",
                )
                .bind(roster.date)
                .bind(roster.day.as_str())
                .bind(roster.to_csv())
                .execute(&mut *tx),
            )
            .await?;
        }
        if let Some(queue) = &change.queue {
            self.timed(
                sqlx::query("DELETE FROM queue WHERE date = $1")
                    .bind(change.date)
                    .execute(&mut *tx),
            )
            .await?;
            for entry in queue {
                self.timed(
                    sqlx::query("INSERT INTO queue (date, employee_id, employee_name) VALUES ($1, $2, $3)")
                        .bind(change.date)
                        .bind(entry.employee_id)
                        .bind(&entry.employee_name)
                        .execute(&mut *tx),
                )
                .await?;
            }
        }
        self.timed(tx.commit()).await
    }

    async fn load_requests(&self, week_start: NaiveDate) -> Result<Vec<WeeklyRequest>, ScheduleError> {
        let rows = self
            .timed(
                sqlx::query(
                    "SELECT employee_id, days_requested, days_skipped FROM requests WHERE week_start = $1 ORDER BY employee_id",
                )
                .bind(week_start)
                .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows
            .iter()
            .filter_map(|r| decode("requests", request_from_row(r, week_start)))
            .collect())
    }

    async fn save_request(&self, request: &WeeklyRequest) -> Result<(), ScheduleError> {
        self.timed(
            sqlx::query(
                r"
                INSERT INTO requests (week_start, employee_id, days_requested, days_skipped)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (week_start, employee_id) DO UPDATE SET
                    days_requested = EXCLUDED.days_requested,
                    days_skipped = EXCLUDED.days_skipped
                ",
            )
            .bind(request.week_start)
            .bind(request.employee_id)
            .bind(WeeklyRequest::days_csv(&request.days_requested))
            .bind(WeeklyRequest::days_csv(&request.days_skipped))
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn clear_requests(&self, week_start: NaiveDate) -> Result<(), ScheduleError> {
        self.timed(
            sqlx::query("DELETE FROM requests WHERE week_start = $1")
                .bind(week_start)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn append_log(&self, event: &AuditEvent) -> Result<(), ScheduleError> {
        self.timed(
            sqlx::query(
                r"
                INSERT INTO logs (event_id, action, event_date, employee_id, payload)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (event_id) DO NOTHING
                ",
            )
            .bind(&event.event_id)
            .bind(event.action.as_str())
            .bind(event.date)
            .bind(event.employee_id)
            .bind(event.payload.as_deref())
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}
