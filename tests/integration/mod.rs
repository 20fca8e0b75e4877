use deadpool_postgres::{Config, Pool, Runtime};
use std::env;
use tokio_postgres_rustls::MakeRustlsConnect;

pub mod job_tests;
pub mod ledger_tests;
pub mod mock_bot;
pub mod payment_tests;
pub mod test_utils;

/// test database configuration and setup
pub struct TestDatabase {
    pub pool: Pool,
    pub db_name: String,
    admin_url: String,
}

fn tls() -> MakeRustlsConnect {
    // install default crypto provider if not already installed
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    MakeRustlsConnect::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(rustls::RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect(),
            })
            .with_no_client_auth(),
    )
}

fn pool_for(url: &str) -> Result<Pool, Box<dyn std::error::Error + Send + Sync>> {
    let mut cfg = Config::new();
    cfg.url = Some(url.to_string());
    cfg.manager = Some(deadpool_postgres::ManagerConfig {
        recycling_method: deadpool_postgres::RecyclingMethod::Fast,
    });
    Ok(cfg.create_pool(Some(Runtime::Tokio1), tls())?)
}

impl TestDatabase {
    /// creates a throwaway database next to the one in TEST_DATABASE_URL
    pub async fn new(admin_url: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        // generate unique database name for this test
        let db_name = format!("test_db_{}", fastrand::u64(..));

        let admin_pool = pool_for(admin_url)?;
        let admin_client = admin_pool.get().await?;
        admin_client
            .execute(&format!("CREATE DATABASE \"{}\"", db_name), &[])
            .await?;
        drop(admin_client);

        // connect to the new test database by replacing only the database name
        let mut test_url = url::Url::parse(admin_url)?;
        test_url.set_path(&format!("/{}", db_name));
        let pool = pool_for(test_url.as_str())?;

        // test connection
        let _client = pool.get().await?;

        Ok(Self {
            pool,
            db_name,
            admin_url: admin_url.to_string(),
        })
    }

    /// runs migrations on the test database
    pub async fn setup_schema(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        subtitle_bot::migrations::MigrationManager::run_migrations(&self.pool).await?;
        Ok(())
    }

    /// a migrated database per test, or None when TEST_DATABASE_URL is unset
    pub async fn create_fresh() -> Option<Self> {
        let Ok(admin_url) = env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set, skipping database test");
            return None;
        };
        let db = Self::new(&admin_url)
            .await
            .expect("Failed to create test database");
        db.setup_schema().await.expect("Failed to run migrations");
        Some(db)
    }

    /// drops the test database
    pub async fn cleanup(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // close all connections first
        self.pool.close();

        let admin_pool = pool_for(&self.admin_url)?;
        let admin_client = admin_pool.get().await?;

        // force disconnect all connections to the test database
        admin_client
            .execute(
                &format!(
                    "SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE datname = '{}' AND pid <> pg_backend_pid()",
                    self.db_name
                ),
                &[],
            )
            .await?;

        admin_client
            .execute(&format!("DROP DATABASE IF EXISTS \"{}\"", self.db_name), &[])
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_setup() {
        let Some(db) = TestDatabase::create_fresh().await else {
            return;
        };

        let client = db.pool.get().await.expect("Failed to get database client");
        let tables = client
            .query(
                "SELECT table_name FROM information_schema.tables WHERE table_schema = 'public'",
                &[],
            )
            .await
            .expect("Failed to check schema");

        let table_names: Vec<String> = tables.iter().map(|row| row.get(0)).collect();
        for table in ["users", "transactions", "invoices", "receipts", "file_translations"] {
            assert!(table_names.contains(&table.to_string()), "missing table {}", table);
        }

        // running migrations twice is a no-op
        db.setup_schema().await.expect("Second migration run failed");

        db.cleanup().await.expect("Failed to cleanup test database");
    }
}
