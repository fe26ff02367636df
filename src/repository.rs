use crate::models::{
    CreateStoreRequest, DashboardStats, NewUser, OwnedStoreSummary, PublicUser, Rating,
    RatingSummary, RatingWithStore, RatingWithUser, Role, Store, StoreFilter, StoreOwnerOverview,
    StoreWithRating, User, UserFilter,
};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Row, query_builder::QueryBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// StorageError
///
/// Failure taxonomy of the persistence layer. Constraint violations that map
/// to client mistakes get their own variants so handlers can answer 4xx;
/// everything else splits into "the database is unreachable" (503 upstream)
/// and "the query itself failed" (500 upstream).
#[derive(Debug, Error)]
pub enum StorageError {
    /// A unique-email constraint fired (users.email or stores.email).
    #[error("email already in use")]
    DuplicateEmail,
    /// A CHECK constraint fired; the only reachable one guards the 1-5
    /// rating range.
    #[error("value out of range")]
    OutOfRange,
    /// A sort key or order failed the allow-list.
    #[error("invalid sort key")]
    InvalidSort,
    /// The database could not be reached (pool exhausted or closed,
    /// connection I/O failure).
    #[error("database unavailable")]
    Unavailable(#[source] sqlx::Error),
    /// Any other query failure.
    #[error("query failed")]
    Query(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            return match db_err.kind() {
                sqlx::error::ErrorKind::UniqueViolation => StorageError::DuplicateEmail,
                sqlx::error::ErrorKind::CheckViolation => StorageError::OutOfRange,
                _ => StorageError::Query(err),
            };
        }
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_) => StorageError::Unavailable(err),
            other => StorageError::Query(other),
        }
    }
}

/// Schema statements applied at startup, in dependency order. All of them are
/// idempotent (IF NOT EXISTS) and run inside one transaction, so a crash
/// during setup leaves no partial schema behind.
const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        address TEXT,
        role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('admin', 'user', 'owner')),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_users_email ON users (email)",
    "CREATE INDEX IF NOT EXISTS idx_users_name ON users (name)",
    r#"
    CREATE TABLE IF NOT EXISTS stores (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        address TEXT NOT NULL,
        owner_user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_stores_name ON stores (name)",
    "CREATE INDEX IF NOT EXISTS idx_stores_owner ON stores (owner_user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS ratings (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        store_id UUID NOT NULL REFERENCES stores(id) ON DELETE CASCADE,
        rating SMALLINT NOT NULL CHECK (rating BETWEEN 1 AND 5),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (user_id, store_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_ratings_user ON ratings (user_id)",
    "CREATE INDEX IF NOT EXISTS idx_ratings_store ON ratings (store_id)",
];

/// init_schema
///
/// Creates the users, stores, and ratings tables plus their indexes if they
/// do not exist yet. Called once at startup before the server binds; a schema
/// failure is fatal there.
pub async fn init_schema(pool: &PgPool) -> Result<(), StorageError> {
    let mut tx = pool.begin().await?;
    for statement in SCHEMA_STATEMENTS {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(())
}

// Allow-listed sort keys per listing, mapped to the column expression that is
// interpolated. A key not in the table is rejected before any SQL is built,
// which is the whole injection defense for ORDER BY.
const STORE_SORT_COLUMNS: &[(&str, &str)] = &[
    ("name", "name"),
    ("email", "email"),
    ("address", "address"),
    ("created_at", "created_at"),
];

const STORE_RATING_SORT_COLUMNS: &[(&str, &str)] = &[
    ("name", "s.name"),
    ("email", "s.email"),
    ("address", "s.address"),
    ("created_at", "s.created_at"),
    ("average_rating", "average_rating"),
    ("total_ratings", "total_ratings"),
];

/// resolve_sort
///
/// Maps a caller-supplied sort key and order onto a known column expression
/// and ASC/DESC keyword. Returns None when no sort was requested, and
/// `InvalidSort` for anything outside the allow-list. Only values returned
/// from here may be pushed into a query as raw SQL.
fn resolve_sort(
    sort_by: Option<&str>,
    sort_order: Option<&str>,
    columns: &[(&'static str, &'static str)],
) -> Result<Option<(&'static str, &'static str)>, StorageError> {
    let direction = match sort_order {
        None => "ASC",
        Some(order) if order.eq_ignore_ascii_case("asc") => "ASC",
        Some(order) if order.eq_ignore_ascii_case("desc") => "DESC",
        Some(_) => return Err(StorageError::InvalidSort),
    };

    match sort_by {
        None => Ok(None),
        Some(key) => columns
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, column)| Some((*column, direction)))
            .ok_or(StorageError::InvalidSort),
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// One row of the store-owners overview query: an owner joined with at most
/// one of their stores and that store's rating aggregate. Owners without any
/// store appear once with the store columns null.
#[derive(Debug, FromRow)]
struct OwnerStoreRow {
    owner_id: Uuid,
    owner_name: String,
    owner_email: String,
    owner_address: Option<String>,
    store_id: Option<Uuid>,
    store_name: Option<String>,
    store_address: Option<String>,
    average_rating: f64,
    total_ratings: i64,
}

/// group_owner_rows
///
/// Folds the flat owner/store rows into one overview per owner, keyed by the
/// owner's id so two owners sharing a display name can never merge or split.
/// First-seen order (the query's name ordering) is preserved. The overall
/// average is weighted by each store's rating count, so it equals the plain
/// average over all ratings of that owner's stores.
fn group_owner_rows(rows: Vec<OwnerStoreRow>) -> Vec<StoreOwnerOverview> {
    let mut overviews: Vec<StoreOwnerOverview> = Vec::new();
    let mut positions: HashMap<Uuid, usize> = HashMap::new();

    for row in rows {
        let position = *positions.entry(row.owner_id).or_insert_with(|| {
            overviews.push(StoreOwnerOverview {
                id: row.owner_id,
                name: row.owner_name.clone(),
                email: row.owner_email.clone(),
                address: row.owner_address.clone(),
                role: Role::Owner,
                stores: Vec::new(),
                // Accumulates the weighted sum until normalized below.
                overall_average_rating: 0.0,
                total_ratings: 0,
            });
            overviews.len() - 1
        });
        let overview = &mut overviews[position];

        if let (Some(id), Some(name), Some(address)) =
            (row.store_id, row.store_name, row.store_address)
        {
            overview.overall_average_rating += row.average_rating * row.total_ratings as f64;
            overview.total_ratings += row.total_ratings;
            overview.stores.push(OwnedStoreSummary {
                id,
                name,
                address,
                average_rating: round1(row.average_rating),
                total_ratings: row.total_ratings,
            });
        }
    }

    for overview in &mut overviews {
        if overview.total_ratings > 0 {
            overview.overall_average_rating =
                round1(overview.overall_average_rating / overview.total_ratings as f64);
        } else {
            overview.overall_average_rating = 0.0;
        }
    }

    overviews
}

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations. This is the
/// core of the Repository Abstraction pattern, allowing the handlers to
/// interact with the data layer without knowing the specific implementation
/// (Postgres, Mock, etc.).
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable and usable across Axum's
/// asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    // Inserts a pre-validated, pre-hashed user. Duplicate email surfaces as
    // StorageError::DuplicateEmail.
    async fn create_user(&self, user: NewUser) -> Result<User, StorageError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;
    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError>;
    // Filtered listing. Never selects the password hash column.
    async fn get_all_users(&self, filter: UserFilter) -> Result<Vec<PublicUser>, StorageError>;
    // Typed role listing; there is deliberately no unfiltered variant.
    async fn get_users_by_role(&self, role: Role) -> Result<Vec<PublicUser>, StorageError>;
    // The three mutations below return false when no row matched the email.
    async fn update_user_role(&self, email: &str, new_role: Role) -> Result<bool, StorageError>;
    async fn update_user_password(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<bool, StorageError>;
    async fn delete_user(&self, email: &str) -> Result<bool, StorageError>;

    // --- Stores ---
    async fn create_store(
        &self,
        req: CreateStoreRequest,
        owner_user_id: Uuid,
    ) -> Result<Store, StorageError>;
    async fn get_store(&self, id: Uuid) -> Result<Option<Store>, StorageError>;
    async fn get_store_by_email(&self, email: &str) -> Result<Option<Store>, StorageError>;
    async fn get_all_stores(&self, filter: StoreFilter) -> Result<Vec<Store>, StorageError>;
    // Listing enriched with AVG/COUNT aggregates; supports the extended sort
    // keys average_rating and total_ratings.
    async fn get_stores_with_ratings(
        &self,
        filter: StoreFilter,
    ) -> Result<Vec<StoreWithRating>, StorageError>;
    async fn get_store_owners(&self) -> Result<Vec<StoreOwnerOverview>, StorageError>;

    // --- Ratings ---
    // Insert-or-replace against the (user_id, store_id) uniqueness
    // constraint. The bool is true when a new row was created.
    async fn upsert_rating(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        value: i16,
    ) -> Result<(Rating, bool), StorageError>;
    // Targeted update of an existing rating; false when no row matched.
    async fn update_rating(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        value: i16,
    ) -> Result<bool, StorageError>;
    async fn get_rating(&self, id: Uuid) -> Result<Option<Rating>, StorageError>;
    // The value a given user has submitted for a given store, if any.
    async fn get_user_store_rating(
        &self,
        user_id: Uuid,
        store_id: Uuid,
    ) -> Result<Option<i16>, StorageError>;
    async fn get_store_ratings(
        &self,
        store_id: Uuid,
    ) -> Result<Vec<RatingWithUser>, StorageError>;
    async fn get_user_ratings(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<RatingWithStore>, StorageError>;
    // All ratings across every store owned by the given user.
    async fn get_owner_ratings(
        &self,
        owner_user_id: Uuid,
    ) -> Result<Vec<RatingWithUser>, StorageError>;
    async fn get_owner_rating_summary(
        &self,
        owner_user_id: Uuid,
    ) -> Result<RatingSummary, StorageError>;

    // --- Dashboard ---
    async fn get_dashboard_stats(&self) -> Result<DashboardStats, StorageError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the
/// PostgreSQL database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// create_user
    ///
    /// Inserts a user row with a fresh UUID. The email uniqueness constraint
    /// is the final arbiter of duplicates; handlers pre-check to produce a
    /// friendlier message, this catches the race.
    async fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash, address, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, email, password_hash, address, role, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.address)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// get_user_by_email
    ///
    /// Full row including the password hash; this is the signin lookup.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, address, role, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// get_user_by_id
    ///
    /// Identity lookup used on every authenticated request to confirm the
    /// token's subject still exists and to read the current role.
    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, address, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// get_all_users
    ///
    /// Implements flexible filtering using QueryBuilder for safe
    /// parameterization. Name and email are case-insensitive substring
    /// matches, role is exact; conditions combine with AND. The projection
    /// deliberately omits password_hash.
    async fn get_all_users(&self, filter: UserFilter) -> Result<Vec<PublicUser>, StorageError> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT id, name, email, address, role FROM users");
        let mut has_where = false;

        if let Some(name) = &filter.name {
            builder.push(if has_where { " AND " } else { " WHERE " });
            builder.push("name ILIKE ");
            builder.push_bind(format!("%{name}%"));
            has_where = true;
        }
        if let Some(email) = &filter.email {
            builder.push(if has_where { " AND " } else { " WHERE " });
            builder.push("email ILIKE ");
            builder.push_bind(format!("%{email}%"));
            has_where = true;
        }
        if let Some(role) = filter.role {
            builder.push(if has_where { " AND " } else { " WHERE " });
            builder.push("role = ");
            builder.push_bind(role);
        }

        builder.push(" ORDER BY created_at DESC");

        let users = builder
            .build_query_as::<PublicUser>()
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// get_users_by_role
    ///
    /// Exact-role listing with the same password-free projection as
    /// get_all_users. Callers pick the role; there is no way to ask for
    /// everyone at once.
    async fn get_users_by_role(&self, role: Role) -> Result<Vec<PublicUser>, StorageError> {
        let users = sqlx::query_as::<_, PublicUser>(
            "SELECT id, name, email, address, role FROM users WHERE role = $1 ORDER BY created_at DESC",
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// update_user_role
    ///
    /// Targets the user by email, the admin-facing identifier. Returns false
    /// when no user carries that email.
    async fn update_user_role(&self, email: &str, new_role: Role) -> Result<bool, StorageError> {
        let result = sqlx::query("UPDATE users SET role = $1 WHERE email = $2")
            .bind(new_role)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// update_user_password
    ///
    /// Stores a new bcrypt hash. The caller has already verified the current
    /// password and validated the new one.
    async fn update_user_password(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE email = $2")
            .bind(password_hash)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// delete_user
    ///
    /// Removes the user; their ratings and any stores they own go with them
    /// via ON DELETE CASCADE.
    async fn delete_user(&self, email: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM users WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// create_store
    ///
    /// Inserts a store bound to its resolved owner. The handler has already
    /// verified the owner exists and holds the owner role.
    async fn create_store(
        &self,
        req: CreateStoreRequest,
        owner_user_id: Uuid,
    ) -> Result<Store, StorageError> {
        let store = sqlx::query_as::<_, Store>(
            r#"
            INSERT INTO stores (id, name, email, address, owner_user_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, email, address, owner_user_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&req.name)
        .bind(&req.email)
        .bind(&req.address)
        .bind(owner_user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(store)
    }

    /// get_store
    ///
    /// Simple retrieval by ID, used by the detail endpoint and as the
    /// existence check before a rating is accepted.
    async fn get_store(&self, id: Uuid) -> Result<Option<Store>, StorageError> {
        let store = sqlx::query_as::<_, Store>(
            "SELECT id, name, email, address, owner_user_id, created_at FROM stores WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(store)
    }

    /// get_store_by_email
    ///
    /// Lookup against the stores unique-email constraint, used to answer a
    /// duplicate registration before the insert is attempted.
    async fn get_store_by_email(&self, email: &str) -> Result<Option<Store>, StorageError> {
        let store = sqlx::query_as::<_, Store>(
            "SELECT id, name, email, address, owner_user_id, created_at FROM stores WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(store)
    }

    /// get_all_stores
    ///
    /// Plain store listing with the same filter composition as the user
    /// listing, plus allow-listed sorting.
    async fn get_all_stores(&self, filter: StoreFilter) -> Result<Vec<Store>, StorageError> {
        let sort = resolve_sort(
            filter.sort_by.as_deref(),
            filter.sort_order.as_deref(),
            STORE_SORT_COLUMNS,
        )?;

        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT id, name, email, address, owner_user_id, created_at FROM stores");
        let mut has_where = false;

        if let Some(name) = &filter.name {
            builder.push(if has_where { " AND " } else { " WHERE " });
            builder.push("name ILIKE ");
            builder.push_bind(format!("%{name}%"));
            has_where = true;
        }
        if let Some(address) = &filter.address {
            builder.push(if has_where { " AND " } else { " WHERE " });
            builder.push("address ILIKE ");
            builder.push_bind(format!("%{address}%"));
        }

        if let Some((column, direction)) = sort {
            builder.push(" ORDER BY ");
            builder.push(column);
            builder.push(" ");
            builder.push(direction);
        }

        let stores = builder
            .build_query_as::<Store>()
            .fetch_all(&self.pool)
            .await?;
        Ok(stores)
    }

    /// get_stores_with_ratings
    ///
    /// The browsing listing: every store joined with its rating aggregate.
    /// COALESCE pins average_rating to 0 for unrated stores, and the NUMERIC
    /// average is cast to double precision so it decodes as f64.
    async fn get_stores_with_ratings(
        &self,
        filter: StoreFilter,
    ) -> Result<Vec<StoreWithRating>, StorageError> {
        let sort = resolve_sort(
            filter.sort_by.as_deref(),
            filter.sort_order.as_deref(),
            STORE_RATING_SORT_COLUMNS,
        )?;

        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            r#"
            SELECT s.id, s.name, s.email, s.address, s.owner_user_id, s.created_at,
                   COALESCE(AVG(r.rating), 0)::DOUBLE PRECISION AS average_rating,
                   COUNT(r.id) AS total_ratings
            FROM stores s
            LEFT JOIN ratings r ON s.id = r.store_id
            "#,
        );
        let mut has_where = false;

        if let Some(name) = &filter.name {
            builder.push(if has_where { " AND " } else { " WHERE " });
            builder.push("s.name ILIKE ");
            builder.push_bind(format!("%{name}%"));
            has_where = true;
        }
        if let Some(address) = &filter.address {
            builder.push(if has_where { " AND " } else { " WHERE " });
            builder.push("s.address ILIKE ");
            builder.push_bind(format!("%{address}%"));
        }

        builder.push(" GROUP BY s.id");

        if let Some((column, direction)) = sort {
            builder.push(" ORDER BY ");
            builder.push(column);
            builder.push(" ");
            builder.push(direction);
        }

        let stores = builder
            .build_query_as::<StoreWithRating>()
            .fetch_all(&self.pool)
            .await?;
        Ok(stores)
    }

    /// get_store_owners
    ///
    /// One query for the whole overview: owner-role users left-joined with
    /// their stores and each store's aggregate, then folded into one entry
    /// per owner. Owners without stores still appear, with an empty list.
    async fn get_store_owners(&self) -> Result<Vec<StoreOwnerOverview>, StorageError> {
        let rows = sqlx::query_as::<_, OwnerStoreRow>(
            r#"
            SELECT u.id AS owner_id, u.name AS owner_name, u.email AS owner_email,
                   u.address AS owner_address,
                   s.id AS store_id, s.name AS store_name, s.address AS store_address,
                   COALESCE(AVG(r.rating), 0)::DOUBLE PRECISION AS average_rating,
                   COUNT(r.id) AS total_ratings
            FROM users u
            LEFT JOIN stores s ON s.owner_user_id = u.id
            LEFT JOIN ratings r ON r.store_id = s.id
            WHERE u.role = 'owner'
            GROUP BY u.id, s.id
            ORDER BY u.name ASC, u.id, s.name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(group_owner_rows(rows))
    }

    /// upsert_rating
    ///
    /// Insert-or-replace against the one-rating-per-(user, store) constraint.
    /// `xmax = 0` distinguishes a fresh insert from a conflict update, which
    /// is what decides 201 vs 200 at the HTTP layer. created_at keeps its
    /// original value on replace.
    async fn upsert_rating(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        value: i16,
    ) -> Result<(Rating, bool), StorageError> {
        let row = sqlx::query(
            r#"
            INSERT INTO ratings (id, user_id, store_id, rating)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, store_id) DO UPDATE SET rating = EXCLUDED.rating
            RETURNING id, user_id, store_id, rating, created_at, (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(store_id)
        .bind(value)
        .fetch_one(&self.pool)
        .await?;

        let inserted: bool = row.try_get("inserted")?;
        let rating = Rating::from_row(&row)?;
        Ok((rating, inserted))
    }

    /// update_rating
    ///
    /// Rewrites the value of an existing (user, store) rating. Returns false
    /// when no such rating exists anymore.
    async fn update_rating(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        value: i16,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query("UPDATE ratings SET rating = $1 WHERE user_id = $2 AND store_id = $3")
            .bind(value)
            .bind(user_id)
            .bind(store_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// get_rating
    ///
    /// Retrieval by rating ID, used for the ownership check before a targeted
    /// update.
    async fn get_rating(&self, id: Uuid) -> Result<Option<Rating>, StorageError> {
        let rating = sqlx::query_as::<_, Rating>(
            "SELECT id, user_id, store_id, rating, created_at FROM ratings WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rating)
    }

    /// get_user_store_rating
    ///
    /// The single value a user has on record for a store. At most one row can
    /// exist thanks to the (user_id, store_id) uniqueness constraint.
    async fn get_user_store_rating(
        &self,
        user_id: Uuid,
        store_id: Uuid,
    ) -> Result<Option<i16>, StorageError> {
        let value = sqlx::query_scalar::<_, i16>(
            "SELECT rating FROM ratings WHERE user_id = $1 AND store_id = $2",
        )
        .bind(user_id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }

    /// get_store_ratings
    ///
    /// All ratings for one store, newest first, enriched with the submitter's
    /// name and email.
    async fn get_store_ratings(
        &self,
        store_id: Uuid,
    ) -> Result<Vec<RatingWithUser>, StorageError> {
        let ratings = sqlx::query_as::<_, RatingWithUser>(
            r#"
            SELECT r.id, r.user_id, r.store_id, r.rating, r.created_at,
                   u.name AS user_name, u.email AS user_email, s.name AS store_name
            FROM ratings r
            JOIN users u ON r.user_id = u.id
            JOIN stores s ON r.store_id = s.id
            WHERE r.store_id = $1
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ratings)
    }

    /// get_user_ratings
    ///
    /// One user's rating history, newest first, enriched with store names.
    async fn get_user_ratings(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<RatingWithStore>, StorageError> {
        let ratings = sqlx::query_as::<_, RatingWithStore>(
            r#"
            SELECT r.id, r.user_id, r.store_id, r.rating, r.created_at,
                   s.name AS store_name
            FROM ratings r
            JOIN stores s ON r.store_id = s.id
            WHERE r.user_id = $1
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ratings)
    }

    /// get_owner_ratings
    ///
    /// Every rating across every store the given user owns, newest first.
    async fn get_owner_ratings(
        &self,
        owner_user_id: Uuid,
    ) -> Result<Vec<RatingWithUser>, StorageError> {
        let ratings = sqlx::query_as::<_, RatingWithUser>(
            r#"
            SELECT r.id, r.user_id, r.store_id, r.rating, r.created_at,
                   u.name AS user_name, u.email AS user_email, s.name AS store_name
            FROM ratings r
            JOIN users u ON r.user_id = u.id
            JOIN stores s ON r.store_id = s.id
            WHERE s.owner_user_id = $1
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(owner_user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ratings)
    }

    /// get_owner_rating_summary
    ///
    /// Single aggregate row over all ratings of the owner's stores. With no
    /// ratings the row still exists: count 0, null average and extremes.
    async fn get_owner_rating_summary(
        &self,
        owner_user_id: Uuid,
    ) -> Result<RatingSummary, StorageError> {
        let summary = sqlx::query_as::<_, RatingSummary>(
            r#"
            SELECT AVG(r.rating)::DOUBLE PRECISION AS average_rating,
                   COUNT(r.id) AS total_ratings,
                   MIN(r.rating) AS lowest_rating,
                   MAX(r.rating) AS highest_rating
            FROM ratings r
            JOIN stores s ON r.store_id = s.id
            WHERE s.owner_user_id = $1
            "#,
        )
        .bind(owner_user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(summary)
    }

    /// get_dashboard_stats
    ///
    /// Compiles all counters for the administrative dashboard. The average is
    /// coalesced to 0 in SQL so an empty ratings table never yields null.
    async fn get_dashboard_stats(&self) -> Result<DashboardStats, StorageError> {
        let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let total_stores: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stores")
            .fetch_one(&self.pool)
            .await?;
        let total_ratings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ratings")
            .fetch_one(&self.pool)
            .await?;
        let average_rating: f64 =
            sqlx::query_scalar("SELECT COALESCE(AVG(rating), 0)::DOUBLE PRECISION FROM ratings")
                .fetch_one(&self.pool)
                .await?;

        Ok(DashboardStats {
            total_users,
            total_stores,
            total_ratings,
            average_rating,
        })
    }
}
