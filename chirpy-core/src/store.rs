//! DeltaStore — table engine built on delta-rs
//!
//! Creates the Chirpy tables on first open and offers the handful of
//! operations the repository needs: ACID appends, single-commit updates,
//! predicate deletes and DataFusion `WHERE` queries. All operations return `Result<T, AuthError>`.
//!
//! # Example
//!
//! ```rust,no_run
//! use chirpy_core::store::DeltaStore;
//!
//! #[tokio::main]
//! async fn main() -> chirpy_core::Result<()> {
//!     let store = DeltaStore::new("/data/chirpy").await?;
//!
//!     let users = store.query("users", "email = 'a@b.com'").await?;
//!     let version = store.version("users").await?;
//!
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use deltalake::arrow::array::RecordBatch;
use deltalake::datafusion::catalog::TableProvider;
use deltalake::datafusion::prelude::SessionContext;
use deltalake::kernel::StructField;
use deltalake::protocol::SaveMode;
use deltalake::writer::{DeltaWriter, RecordBatchWriter};
use deltalake::{DeltaTable, open_table};
use tracing::{debug, info};
use url::Url;

use crate::error::{AuthError, Result};
use crate::schema;

/// Metrics returned by delete operations
#[derive(Debug, Clone)]
pub struct DeleteMetrics {
    pub num_deleted_rows: usize,
    pub new_version: i64,
}

/// Metrics returned by update operations
#[derive(Debug, Clone)]
pub struct UpdateMetrics {
    pub num_updated_rows: usize,
    pub new_version: i64,
}

/// Delta Lake tables under one base directory
///
/// Thread-safe: can be shared across tokio tasks via `Arc<DeltaStore>`.
pub struct DeltaStore {
    base_path: PathBuf,
}

impl DeltaStore {
    /// Open the store and create any missing table
    ///
    /// ```text
    /// {base_path}/
    /// ├── users/
    /// ├── refresh_tokens/
    /// └── chirps/
    /// ```
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            base_path: base_path.as_ref().to_path_buf(),
        };
        for table_def in schema::all_tables() {
            store
                .ensure_table(table_def.name, table_def.delta_fields, table_def.partition_columns)
                .await?;
        }
        info!(path = %store.base_path.display(), "Delta store initialized");
        Ok(store)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn table_url(&self, name: &str) -> Result<Url> {
        let path = self.base_path.join(name);
        let path = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()?.join(path)
        };
        Url::from_directory_path(&path)
            .map_err(|_| AuthError::Config(format!("Invalid table path: {}", path.display())))
    }

    /// Create a Delta table if it doesn't exist
    pub async fn ensure_table(
        &self,
        name: &str,
        fields: Vec<StructField>,
        partition_columns: Vec<String>,
    ) -> Result<()> {
        let url = self.table_url(name)?;

        match open_table(url.clone()).await {
            Ok(table) => {
                debug!(table = name, version = ?table.version(), "Table already exists");
                Ok(())
            }
            Err(_) => {
                std::fs::create_dir_all(self.base_path.join(name))?;

                let table = DeltaTable::try_from_url(url).await?;
                let mut builder = table
                    .create()
                    .with_table_name(name)
                    .with_save_mode(SaveMode::Ignore)
                    .with_columns(fields);

                if !partition_columns.is_empty() {
                    builder = builder.with_partition_columns(partition_columns);
                }

                builder.await?;
                info!(table = name, "Created Delta table");
                Ok(())
            }
        }
    }

    // ─── Write Operations ───

    /// Append records in one commit. Returns the new table version.
    pub async fn append(&self, table_name: &str, batch: RecordBatch) -> Result<i64> {
        let url = self.table_url(table_name)?;
        let mut table = open_table(url).await?;

        let mut writer = RecordBatchWriter::for_table(&table)?;
        writer.write(batch).await?;
        let version = writer.flush_and_commit(&mut table).await?;

        debug!(table = table_name, version, "Appended records");
        Ok(version as i64)
    }

    /// Delete rows matching a SQL predicate
    pub async fn delete(&self, table_name: &str, predicate: &str) -> Result<DeleteMetrics> {
        let url = self.table_url(table_name)?;
        let table = open_table(url).await?;

        let (result_table, metrics) = table.delete().with_predicate(predicate).await?;
        let version = result_table.version().unwrap_or(-1);

        debug!(
            table = table_name,
            deleted = metrics.num_deleted_rows,
            version,
            "Deleted records"
        );

        Ok(DeleteMetrics {
            num_deleted_rows: metrics.num_deleted_rows,
            new_version: version,
        })
    }

    /// Rewrite columns of the rows matching a SQL predicate in one commit.
    /// Each assignment is a column name and a SQL expression.
    ///
    /// ```rust,no_run
    /// # use chirpy_core::store::DeltaStore;
    /// # async fn example(store: &DeltaStore) -> chirpy_core::Result<()> {
    /// store
    ///     .update("users", "email = 'a@b.com'", &[("is_chirpy_red", "true".to_string())])
    ///     .await?;
    /// # Ok(()) }
    /// ```
    pub async fn update(
        &self,
        table_name: &str,
        predicate: &str,
        assignments: &[(&str, String)],
    ) -> Result<UpdateMetrics> {
        let url = self.table_url(table_name)?;
        let table = open_table(url).await?;

        let mut builder = table.update().with_predicate(predicate);
        for (column, expression) in assignments {
            builder = builder.with_update(*column, expression.as_str());
        }
        let (result_table, metrics) = builder.await?;
        let version = result_table.version().unwrap_or(-1);

        debug!(
            table = table_name,
            updated = metrics.num_updated_rows,
            version,
            "Updated records"
        );

        Ok(UpdateMetrics {
            num_updated_rows: metrics.num_updated_rows,
            new_version: version,
        })
    }

    /// Delete every row of a table
    pub async fn truncate(&self, table_name: &str) -> Result<DeleteMetrics> {
        let url = self.table_url(table_name)?;
        let table = open_table(url).await?;

        let (result_table, metrics) = table.delete().await?;
        let version = result_table.version().unwrap_or(-1);

        info!(table = table_name, deleted = metrics.num_deleted_rows, "Truncated table");
        Ok(DeleteMetrics {
            num_deleted_rows: metrics.num_deleted_rows,
            new_version: version,
        })
    }

    // ─── Read Operations ───

    /// Read all rows from a table (current version)
    pub async fn scan(&self, table_name: &str) -> Result<Vec<RecordBatch>> {
        self.run_sql(table_name, "SELECT * FROM t").await
    }

    /// Query a table with a SQL WHERE clause
    ///
    /// ```rust,no_run
    /// # use chirpy_core::store::DeltaStore;
    /// # async fn example(store: &DeltaStore) -> chirpy_core::Result<()> {
    /// let live = store.query("refresh_tokens", "revoked_at IS NULL").await?;
    /// # Ok(()) }
    /// ```
    pub async fn query(&self, table_name: &str, sql_where: &str) -> Result<Vec<RecordBatch>> {
        let batches = self
            .run_sql(table_name, &format!("SELECT * FROM t WHERE {sql_where}"))
            .await?;
        debug!(table = table_name, predicate = sql_where, "Query executed");
        Ok(batches)
    }

    /// Current version of a table
    pub async fn version(&self, table_name: &str) -> Result<i64> {
        let url = self.table_url(table_name)?;
        let table = open_table(url).await?;
        Ok(table.version().unwrap_or(0))
    }

    async fn run_sql(&self, table_name: &str, sql: &str) -> Result<Vec<RecordBatch>> {
        let url = self.table_url(table_name)?;
        let table = open_table(url).await?;
        let provider: Arc<dyn TableProvider> = Arc::new(table);

        let ctx = SessionContext::new();
        ctx.register_table("t", provider)?;
        let batches = ctx.sql(sql).await?.collect().await?;
        Ok(batches)
    }
}
