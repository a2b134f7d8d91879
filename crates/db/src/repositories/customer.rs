use intake_core::config::DatabaseConfig;
use intake_core::domain::customer::{CustomerId, CustomerProfile, CustomerRecord};
use sqlx::{sqlite::SqliteRow, Row};
use tracing::debug;

use super::{CustomerRepository, CustomerStore, RepositoryError, StoreOpener};
use crate::{connect_with_settings, migrations, DbPool};

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl CustomerRepository for SqlCustomerRepository {
    async fn upsert(&self, record: &CustomerRecord) -> Result<(), RepositoryError> {
        let profile = &record.profile;
        sqlx::query(
            "INSERT INTO customers (
                customer_id,
                first_name,
                last_name,
                company,
                city,
                country,
                phone_1,
                phone_2,
                email,
                subscription_date,
                website
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(customer_id) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                company = excluded.company,
                city = excluded.city,
                country = excluded.country,
                phone_1 = excluded.phone_1,
                phone_2 = excluded.phone_2,
                email = excluded.email,
                subscription_date = excluded.subscription_date,
                website = excluded.website",
        )
        .bind(record.id.0)
        .bind(profile.first_name.as_deref())
        .bind(profile.last_name.as_deref())
        .bind(profile.company.as_deref())
        .bind(profile.city.as_deref())
        .bind(profile.country.as_deref())
        .bind(profile.phone_1.as_deref())
        .bind(profile.phone_2.as_deref())
        .bind(profile.email.as_deref())
        .bind(profile.subscription_date.as_deref())
        .bind(profile.website.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: CustomerId) -> Result<Option<CustomerRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                customer_id,
                first_name,
                last_name,
                company,
                city,
                country,
                phone_1,
                phone_2,
                email,
                subscription_date,
                website
             FROM customers
             WHERE customer_id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(customer_from_row).transpose()
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM customers").fetch_one(&self.pool).await?;
        Ok(count)
    }
}

#[async_trait::async_trait]
impl CustomerStore for SqlCustomerRepository {
    async fn close(&self) {
        self.pool.close().await;
    }
}

fn customer_from_row(row: SqliteRow) -> Result<CustomerRecord, RepositoryError> {
    let text = |column: &str| -> Result<Option<String>, RepositoryError> {
        row.try_get::<Option<String>, _>(column)
            .map_err(|error| RepositoryError::Decode(format!("column `{column}`: {error}")))
    };

    Ok(CustomerRecord {
        id: CustomerId(row.try_get::<i64, _>("customer_id")?),
        profile: CustomerProfile {
            first_name: text("first_name")?,
            last_name: text("last_name")?,
            company: text("company")?,
            city: text("city")?,
            country: text("country")?,
            phone_1: text("phone_1")?,
            phone_2: text("phone_2")?,
            email: text("email")?,
            subscription_date: text("subscription_date")?,
            website: text("website")?,
        },
    })
}

/// Opens the SQLite customer store for one invocation.
#[derive(Clone, Debug)]
pub struct SqliteStoreOpener {
    database_url: String,
    max_connections: u32,
    timeout_secs: u64,
}

impl SqliteStoreOpener {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            database_url: config.url.clone(),
            max_connections: config.max_connections,
            timeout_secs: config.timeout_secs,
        }
    }
}

#[async_trait::async_trait]
impl StoreOpener for SqliteStoreOpener {
    type Store = SqlCustomerRepository;

    async fn open(&self) -> Result<Self::Store, RepositoryError> {
        let pool =
            connect_with_settings(&self.database_url, self.max_connections, self.timeout_secs)
                .await?;
        debug!(event_name = "store.connected", "customer store connection opened");

        if let Err(error) = migrations::run_pending(&pool).await {
            pool.close().await;
            return Err(error.into());
        }

        Ok(SqlCustomerRepository::new(pool))
    }
}

#[cfg(test)]
mod tests {
    use intake_core::config::DatabaseConfig;
    use intake_core::domain::customer::{CustomerId, CustomerProfile, CustomerRecord};
    use tempfile::TempDir;

    use super::{SqlCustomerRepository, SqliteStoreOpener};
    use crate::migrations;
    use crate::repositories::{CustomerRepository, CustomerStore, StoreOpener};
    use crate::{connect_with_settings, DbPool};

    #[tokio::test]
    async fn upsert_inserts_new_identifier() {
        let pool = setup_pool().await;
        let repo = SqlCustomerRepository::new(pool.clone());
        let record = customer(1, "Ada", "Lovelace", Some("Analytical Engines"));

        repo.upsert(&record).await.expect("upsert");

        let found = repo.find_by_id(CustomerId(1)).await.expect("find customer");
        assert_eq!(found, Some(record));
        assert_eq!(repo.count().await.expect("count"), 1);

        pool.close().await;
    }

    #[tokio::test]
    async fn upsert_overwrites_every_non_identifier_column() {
        let pool = setup_pool().await;
        let repo = SqlCustomerRepository::new(pool.clone());

        repo.upsert(&customer(1, "Ada", "Lovelace", Some("Analytical Engines")))
            .await
            .expect("first upsert");
        let replacement = customer(1, "Alan", "Turing", None);
        repo.upsert(&replacement).await.expect("second upsert");

        let found = repo.find_by_id(CustomerId(1)).await.expect("find customer");
        assert_eq!(found, Some(replacement), "latest values win, including cleared columns");
        assert_eq!(repo.count().await.expect("count"), 1);

        pool.close().await;
    }

    #[tokio::test]
    async fn distinct_identifiers_produce_one_row_each() {
        let pool = setup_pool().await;
        let repo = SqlCustomerRepository::new(pool.clone());

        for id in 1..=5 {
            repo.upsert(&customer(id, "Row", "Writer", None)).await.expect("upsert");
        }

        assert_eq!(repo.count().await.expect("count"), 5);
        assert_eq!(repo.find_by_id(CustomerId(6)).await.expect("find customer"), None);

        pool.close().await;
    }

    #[tokio::test]
    async fn opener_creates_schema_in_a_fresh_database_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("customer_data.db");
        let opener = SqliteStoreOpener::new(&DatabaseConfig {
            url: format!("sqlite://{}?mode=rwc", path.display()),
            max_connections: 1,
            timeout_secs: 5,
        });

        let store = opener.open().await.expect("open store");
        store.upsert(&customer(1, "Ada", "Lovelace", None)).await.expect("upsert");
        store.close().await;

        let reopened = opener.open().await.expect("reopen store");
        assert_eq!(reopened.count().await.expect("count"), 1, "rows persist across opens");
        reopened.close().await;
        assert!(reopened.pool().is_closed());
    }

    #[tokio::test]
    async fn upsert_after_close_fails() {
        let pool = setup_pool().await;
        let repo = SqlCustomerRepository::new(pool);
        repo.close().await;

        let result = repo.upsert(&customer(1, "Ada", "Lovelace", None)).await;
        assert!(result.is_err());
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn customer(id: i64, first: &str, last: &str, company: Option<&str>) -> CustomerRecord {
        CustomerRecord {
            id: CustomerId(id),
            profile: CustomerProfile {
                first_name: Some(first.to_string()),
                last_name: Some(last.to_string()),
                company: company.map(str::to_string),
                city: Some("London".to_string()),
                country: Some("United Kingdom".to_string()),
                phone_1: None,
                phone_2: None,
                email: Some(format!("{}@example.com", first.to_lowercase())),
                subscription_date: Some("2024-01-15".to_string()),
                website: None,
            },
        }
    }
}
