use deadpool_postgres::Pool;
use log::info;
use tokio_postgres::Transaction;

use crate::error::PersistenceError;

pub struct MigrationManager;

impl MigrationManager {
    pub async fn run_migrations(pool: &Pool) -> Result<(), PersistenceError> {
        info!("Running database migrations...");
        let mut client = pool.get().await?;

        // check if migrations table exists and create if not
        let needs_init = client
            .query_opt(
                "SELECT 1 FROM pg_tables WHERE schemaname = 'public' AND tablename = 'schema_migrations'",
                &[],
            )
            .await?
            .is_none();

        if needs_init {
            let transaction = client.transaction().await?;
            Self::initial_setup(&transaction).await?;
            transaction.commit().await?;
            info!("Initial database setup completed");
        }

        let current_version = Self::get_current_version(&client).await?;
        if current_version < Self::latest_version() {
            let transaction = client.transaction().await?;
            Self::run_pending_migrations(&transaction, current_version).await?;
            transaction.commit().await?;
            info!("Database migrations completed");
        } else {
            info!("Database schema is up to date");
        }

        Ok(())
    }

    async fn initial_setup(transaction: &Transaction<'_>) -> Result<(), PersistenceError> {
        let migration_sql = r#"
            -- Migration tracking table
            CREATE TABLE schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            );

            -- Users table; balance is derived from transactions, never stored
            CREATE TABLE users (
                id SERIAL PRIMARY KEY,
                telegram_user_id BIGINT NOT NULL UNIQUE,
                username VARCHAR(255),
                first_name VARCHAR(255),
                last_name VARCHAR(255),
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            );

            -- Append-only ledger
            CREATE TABLE transactions (
                id SERIAL PRIMARY KEY,
                from_user_id INTEGER REFERENCES users(id),
                to_user_id INTEGER REFERENCES users(id),
                amount NUMERIC(20, 4) NOT NULL CHECK (amount > 0),
                description TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                CHECK ((from_user_id IS NULL) <> (to_user_id IS NULL))
            );

            -- Earned credit (welcome bonus, admin grants)
            CREATE TABLE invoices (
                id SERIAL PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                amount NUMERIC(20, 4) NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            );

            -- External payments
            CREATE TABLE receipts (
                id SERIAL PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                number UUID NOT NULL UNIQUE,
                amount NUMERIC(20, 4) NOT NULL CHECK (amount > 0),
                tracker_id VARCHAR(255) UNIQUE,
                bank VARCHAR(50) NOT NULL,
                method VARCHAR(50) NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'init' CHECK (status IN ('init', 'pending', 'failed', 'success')),
                extra_data JSONB NOT NULL DEFAULT '{}'::jsonb,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            );

            CREATE TABLE invoice_transactions (
                invoice_id INTEGER NOT NULL REFERENCES invoices(id),
                transaction_id INTEGER NOT NULL UNIQUE REFERENCES transactions(id),
                PRIMARY KEY (invoice_id, transaction_id)
            );

            CREATE TABLE receipt_transactions (
                receipt_id INTEGER NOT NULL REFERENCES receipts(id),
                transaction_id INTEGER NOT NULL UNIQUE REFERENCES transactions(id),
                PRIMARY KEY (receipt_id, transaction_id)
            );

            CREATE INDEX idx_users_telegram_id ON users(telegram_user_id);
            CREATE INDEX idx_transactions_from_user ON transactions(from_user_id);
            CREATE INDEX idx_transactions_to_user ON transactions(to_user_id);
            CREATE INDEX idx_transactions_created ON transactions(created_at);
            CREATE INDEX idx_receipts_user_id ON receipts(user_id);

            -- Record initial migration
            INSERT INTO schema_migrations (version) VALUES (1);
        "#;

        transaction.batch_execute(migration_sql).await?;
        Ok(())
    }

    async fn get_current_version(
        client: &deadpool_postgres::Object,
    ) -> Result<i32, PersistenceError> {
        let row = client
            .query_one("SELECT MAX(version) FROM schema_migrations", &[])
            .await?;
        Ok(row.get::<_, Option<i32>>(0).unwrap_or(0))
    }

    fn latest_version() -> i32 {
        3 // increment this when adding new migrations
    }

    async fn run_pending_migrations(
        transaction: &Transaction<'_>,
        current_version: i32,
    ) -> Result<(), PersistenceError> {
        for version in (current_version + 1)..=Self::latest_version() {
            match version {
                2 => {
                    // per-file translation lifecycle
                    let migration_sql = r#"
                        CREATE TABLE file_translations (
                            id SERIAL PRIMARY KEY,
                            user_id INTEGER NOT NULL REFERENCES users(id),
                            input_file_ref TEXT NOT NULL,
                            input_file_unique_ref TEXT NOT NULL,
                            file_name TEXT,
                            output_file_ref TEXT,
                            status VARCHAR(20) NOT NULL DEFAULT 'init'
                                CHECK (status IN ('init', 'processing', 'completed', 'failed', 'cancelled')),
                            total_lines INTEGER NOT NULL,
                            price_unit NUMERIC(20, 4) NOT NULL,
                            total_cost NUMERIC(20, 4),
                            billed_lines INTEGER,
                            api_cost NUMERIC(20, 4),
                            total_tokens BIGINT,
                            partial BOOLEAN NOT NULL DEFAULT FALSE,
                            charge_transaction_id INTEGER UNIQUE REFERENCES transactions(id),
                            failure_reason TEXT,
                            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
                        );

                        -- at most one active translation per uploaded file
                        CREATE UNIQUE INDEX idx_file_translations_active
                            ON file_translations(user_id, input_file_unique_ref)
                            WHERE status IN ('init', 'processing');
                        CREATE INDEX idx_file_translations_user_id ON file_translations(user_id);
                        CREATE INDEX idx_file_translations_status ON file_translations(status);
                    "#;
                    transaction.batch_execute(migration_sql).await?;
                }
                3 => {
                    // remember the language telegram reports for each user
                    let migration_sql = r#"
                        ALTER TABLE users ADD COLUMN language VARCHAR(10);
                    "#;
                    transaction.batch_execute(migration_sql).await?;
                }
                _ => {}
            }

            transaction
                .execute(
                    "INSERT INTO schema_migrations (version) VALUES ($1)",
                    &[&version],
                )
                .await?;
            info!("Applied migration version {}", version);
        }

        Ok(())
    }
}
