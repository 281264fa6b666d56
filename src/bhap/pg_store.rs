//! PostgreSQL-backed BHAP store
//!
//! Id allocation runs inside a serializable transaction holding a table lock.
//! Edits and status changes are conditional updates on the stored status, and
//! a vote is inserted while holding a share lock on its BHAP row, so every
//! invariant holds across concurrent requests and server instances.

use crate::bhap::error::BhapError;
use crate::bhap::models::{Bhap, NewBhap, NewUser, Status, User, Vote, VoteValue};
use crate::bhap::store::{next_id, BhapStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::error::SqlState;
use tokio_postgres::{IsolationLevel, Row};
use tracing::{debug, info};

const BHAP_COLUMNS: &str = "id, title, content, author_id, status, created_date, last_modified";
const VOTE_COLUMNS: &str = "bhap_id, voter_id, value, cast_at";
const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, created_at";

pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create tables if they don't exist
    pub async fn ensure_schema(&self) -> Result<(), BhapError> {
        let client = self.pool.get().await?;

        client
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS users (
                    id BIGSERIAL PRIMARY KEY,
                    email VARCHAR(255) UNIQUE NOT NULL,
                    password_hash VARCHAR(255) NOT NULL,
                    first_name VARCHAR(255) NOT NULL,
                    last_name VARCHAR(255) NOT NULL,
                    role VARCHAR(20) NOT NULL DEFAULT 'member',
                    created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
                );

                CREATE TABLE IF NOT EXISTS bhaps (
                    id BIGINT PRIMARY KEY,
                    title TEXT NOT NULL,
                    content TEXT NOT NULL,
                    author_id BIGINT NOT NULL REFERENCES users(id),
                    status VARCHAR(20) NOT NULL,
                    created_date TIMESTAMPTZ NOT NULL,
                    last_modified TIMESTAMPTZ NOT NULL
                );

                CREATE TABLE IF NOT EXISTS votes (
                    bhap_id BIGINT NOT NULL REFERENCES bhaps(id),
                    voter_id BIGINT NOT NULL REFERENCES users(id),
                    value VARCHAR(20) NOT NULL,
                    cast_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    PRIMARY KEY (bhap_id, voter_id)
                );",
            )
            .await?;

        info!("✅ BHAP tables initialized");
        Ok(())
    }
}

fn bhap_from_row(row: &Row) -> Result<Bhap, BhapError> {
    let status: String = row.get("status");
    Ok(Bhap {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        author_id: row.get("author_id"),
        status: status.parse()?,
        created_date: row.get("created_date"),
        last_modified: row.get("last_modified"),
    })
}

// The value column is passed through untouched; decoding happens at tally time
fn vote_from_row(row: &Row) -> Vote {
    Vote {
        bhap_id: row.get("bhap_id"),
        voter_id: row.get("voter_id"),
        value: row.get("value"),
        cast_at: row.get("cast_at"),
    }
}

fn user_from_row(row: &Row) -> Result<User, BhapError> {
    let role: String = row.get("role");
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        role: role.parse()?,
        created_at: row.get("created_at"),
    })
}

/// Collisions with a concurrent allocation surface as `AllocationConflict`
fn allocation_error(e: tokio_postgres::Error) -> BhapError {
    match e.code() {
        Some(code) if *code == SqlState::UNIQUE_VIOLATION || *code == SqlState::T_R_SERIALIZATION_FAILURE => {
            BhapError::AllocationConflict
        }
        _ => BhapError::from(e),
    }
}

#[async_trait]
impl BhapStore for PgStore {
    async fn get_bhap(&self, id: i64) -> Result<Bhap, BhapError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM bhaps WHERE id = $1", BHAP_COLUMNS),
                &[&id],
            )
            .await?
            .ok_or(BhapError::NotFound(id))?;
        bhap_from_row(&row)
    }

    async fn list_bhaps(&self) -> Result<Vec<Bhap>, BhapError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(&format!("SELECT {} FROM bhaps ORDER BY id", BHAP_COLUMNS), &[])
            .await?;
        rows.iter().map(bhap_from_row).collect()
    }

    async fn create_bhap(&self, new: NewBhap) -> Result<Bhap, BhapError> {
        let mut client = self.pool.get().await?;
        let tx = client
            .build_transaction()
            .isolation_level(IsolationLevel::Serializable)
            .start()
            .await
            .map_err(allocation_error)?;

        tx.batch_execute("LOCK TABLE bhaps IN SHARE ROW EXCLUSIVE MODE")
            .await
            .map_err(allocation_error)?;

        let max: Option<i64> = tx
            .query_one("SELECT MAX(id) FROM bhaps", &[])
            .await
            .map_err(allocation_error)?
            .get(0);

        let bhap = new.into_bhap(next_id(max), Utc::now());
        tx.execute(
            "INSERT INTO bhaps (id, title, content, author_id, status, created_date, last_modified)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            &[
                &bhap.id,
                &bhap.title,
                &bhap.content,
                &bhap.author_id,
                &bhap.status.as_str(),
                &bhap.created_date,
                &bhap.last_modified,
            ],
        )
        .await
        .map_err(allocation_error)?;

        tx.commit().await.map_err(allocation_error)?;
        debug!("Allocated BHAP {}", bhap.id);
        Ok(bhap)
    }

    async fn update_draft(
        &self,
        id: i64,
        title: String,
        content: String,
        modified_at: DateTime<Utc>,
    ) -> Result<Bhap, BhapError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "UPDATE bhaps SET title = $2, content = $3, last_modified = $4
                     WHERE id = $1 AND status = $5
                     RETURNING {}",
                    BHAP_COLUMNS
                ),
                &[&id, &title, &content, &modified_at, &Status::Draft.as_str()],
            )
            .await?;

        match row {
            Some(row) => bhap_from_row(&row),
            None => Err(BhapError::NotEditable(self.get_bhap(id).await?.status)),
        }
    }

    async fn set_status(
        &self,
        id: i64,
        from: Status,
        to: Status,
        modified_at: DateTime<Utc>,
    ) -> Result<Bhap, BhapError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "UPDATE bhaps SET status = $3, last_modified = $4
                     WHERE id = $1 AND status = $2
                     RETURNING {}",
                    BHAP_COLUMNS
                ),
                &[&id, &from.as_str(), &to.as_str(), &modified_at],
            )
            .await?;

        match row {
            Some(row) => bhap_from_row(&row),
            None => {
                let current = self.get_bhap(id).await?.status;
                Err(BhapError::IllegalTransition { from: current, to })
            }
        }
    }

    async fn list_votes(&self, bhap_id: i64) -> Result<Vec<Vote>, BhapError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                &format!("SELECT {} FROM votes WHERE bhap_id = $1 ORDER BY voter_id", VOTE_COLUMNS),
                &[&bhap_id],
            )
            .await?;
        Ok(rows.iter().map(vote_from_row).collect())
    }

    async fn get_vote(&self, bhap_id: i64, user_id: i64) -> Result<Option<Vote>, BhapError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM votes WHERE bhap_id = $1 AND voter_id = $2", VOTE_COLUMNS),
                &[&bhap_id, &user_id],
            )
            .await?;
        Ok(row.as_ref().map(vote_from_row))
    }

    async fn create_vote(
        &self,
        bhap_id: i64,
        user_id: i64,
        value: VoteValue,
    ) -> Result<Vote, BhapError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        // The share lock holds off status changes until this transaction ends
        let status: String = tx
            .query_opt("SELECT status FROM bhaps WHERE id = $1 FOR SHARE", &[&bhap_id])
            .await?
            .ok_or(BhapError::NotFound(bhap_id))?
            .get(0);
        let status: Status = status.parse()?;
        if status != Status::Discussion {
            return Err(BhapError::VotingClosed(status));
        }

        let row = tx
            .query_opt(
                &format!(
                    "INSERT INTO votes (bhap_id, voter_id, value, cast_at) VALUES ($1, $2, $3, $4)
                     ON CONFLICT (bhap_id, voter_id) DO NOTHING
                     RETURNING {}",
                    VOTE_COLUMNS
                ),
                &[&bhap_id, &user_id, &value.as_str(), &Utc::now()],
            )
            .await?;
        tx.commit().await?;

        row.as_ref()
            .map(vote_from_row)
            .ok_or(BhapError::DuplicateVote { bhap_id, voter_id: user_id })
    }

    async fn count_users(&self) -> Result<usize, BhapError> {
        let client = self.pool.get().await?;
        let count: i64 = client.query_one("SELECT COUNT(*) FROM users", &[]).await?.get(0);
        Ok(count as usize)
    }

    async fn create_user(&self, new: NewUser) -> Result<User, BhapError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO users (email, password_hash, first_name, last_name, role, created_at)
                     VALUES ($1, $2, $3, $4, $5, $6)
                     RETURNING {}",
                    USER_COLUMNS
                ),
                &[
                    &new.email,
                    &new.password_hash,
                    &new.first_name,
                    &new.last_name,
                    &new.role.as_str(),
                    &Utc::now(),
                ],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    BhapError::EmailTaken(new.email.clone())
                } else {
                    BhapError::from(e)
                }
            })?;
        user_from_row(&row)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, BhapError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS), &[&id])
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, BhapError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS), &[&email])
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }
}
