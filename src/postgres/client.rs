use async_trait::async_trait;
use bytes::BytesMut;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod};
use serde::Deserialize;
use postgres_types::{to_sql_checked, IsNull, ToSql, Type};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio_postgres::NoTls;
use tracing::{debug, error, info};

use super::errors::PostgresError;
use crate::common::constants::MAX_BIND_PARAMETERS;
use crate::storage::{Database, Row, SqlValue, StorageError};

/// PostgreSQL configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_connections: usize,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "profiles".to_string(),
            username: "postgres".to_string(),
            password: "password".to_string(),
            max_connections: 16,
        }
    }
}

/// [`Database`] backed by a deadpool-managed PostgreSQL connection pool.
///
/// Every call checks out its own connection, so concurrent ingestion workers
/// never share a session.
pub struct PgDatabase {
    pool: Pool,
}

impl PgDatabase {
    pub async fn connect(config: &PostgresConfig) -> Result<Self, PostgresError> {
        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "Initializing PostgreSQL connection pool..."
        );

        let mut cfg = Config::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.dbname = Some(config.database.clone());
        cfg.user = Some(config.username.clone());
        cfg.password = Some(config.password.clone());
        cfg.ssl_mode = Some(deadpool_postgres::SslMode::Disable);
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(deadpool_postgres::PoolConfig {
            max_size: config.max_connections,
            timeouts: deadpool_postgres::Timeouts::default(),
        });

        let pool = cfg
            .create_pool(None, NoTls)
            .map_err(|e| PostgresError::Config(format!("Failed to create connection pool: {}", e)))?;

        let client = pool.get().await?;
        let row = client.query_one("SELECT 1 as test", &[]).await?;
        let test: i32 = row.get("test");
        if test != 1 {
            return Err(PostgresError::Config("Connection test failed".to_string()));
        }

        info!("✅ PostgreSQL connection test successful");
        Ok(Self { pool })
    }
}

/// Multi-row `INSERT` with numbered placeholders for `rows` rows.
pub(crate) fn insert_statement(table: &str, columns: &[&str], rows: usize) -> String {
    let mut sql = format!("INSERT INTO {} ({}) VALUES ", table, columns.join(", "));
    let mut param = 1;
    for row in 0..rows {
        if row > 0 {
            sql.push_str(", ");
        }
        sql.push('(');
        for col in 0..columns.len() {
            if col > 0 {
                sql.push_str(", ");
            }
            sql.push('$');
            sql.push_str(&param.to_string());
            param += 1;
        }
        sql.push(')');
    }
    sql
}

#[async_trait]
impl Database for PgDatabase {
    async fn execute(&self, sql: &str) -> Result<u64, StorageError> {
        let client = self.pool.get().await.map_err(PostgresError::from)?;
        let affected = client.execute(sql, &[]).await.map_err(PostgresError::from)?;
        Ok(affected)
    }

    async fn insert_batch(
        &self,
        table: &'static str,
        columns: &'static [&'static str],
        rows: Vec<Vec<SqlValue>>,
    ) -> Result<u64, StorageError> {
        if rows.is_empty() || columns.is_empty() {
            return Ok(0);
        }

        let mut client = self.pool.get().await.map_err(PostgresError::from)?;
        let transaction = client.transaction().await.map_err(PostgresError::from)?;

        let rows_per_statement = (MAX_BIND_PARAMETERS / columns.len()).max(1);
        let mut inserted = 0;
        for chunk in rows.chunks(rows_per_statement) {
            let sql = insert_statement(table, columns, chunk.len());
            let params: Vec<&(dyn ToSql + Sync)> = chunk
                .iter()
                .flat_map(|row| row.iter().map(|value| value as &(dyn ToSql + Sync)))
                .collect();
            inserted += transaction
                .execute(sql.as_str(), &params)
                .await
                .map_err(PostgresError::from)?;
        }

        transaction.commit().await.map_err(PostgresError::from)?;
        debug!(table, rows = inserted, "Batch inserted");
        Ok(inserted)
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>, StorageError> {
        let client = self.pool.get().await.map_err(PostgresError::from)?;
        let rows = client.query(sql, &[]).await.map_err(PostgresError::from)?;
        rows.iter()
            .map(|row| {
                (0..row.len())
                    .map(|idx| convert_value(row, idx))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Row::new)
            })
            .collect::<Result<Vec<_>, PostgresError>>()
            .map_err(StorageError::from)
    }

    async fn checkpoint(&self) -> Result<(), StorageError> {
        let client = self.pool.get().await.map_err(PostgresError::from)?;
        if let Err(e) = client.batch_execute("CHECKPOINT").await {
            error!("Checkpoint failed: {}", e);
            return Err(PostgresError::from(e).into());
        }
        debug!("Write-ahead log checkpointed");
        Ok(())
    }
}

fn convert_value(row: &tokio_postgres::Row, idx: usize) -> Result<SqlValue, PostgresError> {
    let ty = row.columns()[idx].type_();
    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?.map(SqlValue::Bool)
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?.map(|v| SqlValue::Int(v as i64))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?.map(|v| SqlValue::Int(v as i64))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::Int)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?.map(|v| SqlValue::Float(v as f64))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::Float)
    } else if *ty == Type::NUMERIC {
        match row.try_get::<_, Option<Decimal>>(idx)? {
            Some(value) => Some(numeric_value(value, idx)?),
            None => None,
        }
    } else if [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME].contains(ty) {
        row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Text)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        row.try_get::<_, Option<serde_json::Value>>(idx)?.map(SqlValue::Json)
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)?
            .map(SqlValue::Timestamp)
    } else {
        return Err(PostgresError::Conversion(format!(
            "unsupported column type '{}' at index {}",
            ty, idx
        )));
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

/// NUMERIC results are integral sums; anything else is a conversion error.
fn numeric_value(value: Decimal, idx: usize) -> Result<SqlValue, PostgresError> {
    if !value.fract().is_zero() {
        return Err(PostgresError::Conversion(format!(
            "non-integral NUMERIC {} at index {}",
            value, idx
        )));
    }
    value.to_i64().map(SqlValue::Int).ok_or_else(|| {
        PostgresError::Conversion(format!("NUMERIC {} at index {} does not fit into BIGINT", value, idx))
    })
}

impl ToSql for SqlValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(v) => v.to_sql_checked(ty, out),
            SqlValue::Int(v) if *ty == Type::INT2 => (*v as i16).to_sql_checked(ty, out),
            SqlValue::Int(v) if *ty == Type::INT4 => (*v as i32).to_sql_checked(ty, out),
            SqlValue::Int(v) => v.to_sql_checked(ty, out),
            SqlValue::Float(v) => v.to_sql_checked(ty, out),
            SqlValue::Text(v) => v.to_sql_checked(ty, out),
            SqlValue::Json(v) if *ty == Type::JSON || *ty == Type::JSONB => v.to_sql_checked(ty, out),
            SqlValue::Json(v) => v.to_string().to_sql_checked(ty, out),
            SqlValue::Timestamp(v) => v.to_sql_checked(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_config_default() {
        let config = PostgresConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.database, "profiles");
    }

    #[test]
    fn test_insert_statement_numbers_placeholders_across_rows() {
        let sql = insert_statement("threads", &["profile_id", "thread_id"], 2);
        assert_eq!(sql, "INSERT INTO threads (profile_id, thread_id) VALUES ($1, $2), ($3, $4)");
    }

    fn numeric_wire(digits: &[u16], weight: i16, sign: u16, scale: u16) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(digits.len() as u16).to_be_bytes());
        raw.extend_from_slice(&weight.to_be_bytes());
        raw.extend_from_slice(&sign.to_be_bytes());
        raw.extend_from_slice(&scale.to_be_bytes());
        for digit in digits {
            raw.extend_from_slice(&digit.to_be_bytes());
        }
        raw
    }

    #[test]
    fn test_large_numeric_sum_keeps_every_digit() {
        use postgres_types::FromSql;

        let raw = numeric_wire(&[1, 2345, 6789, 123, 4567], 4, 0, 0);
        let decimal = Decimal::from_sql(&Type::NUMERIC, &raw).unwrap();
        let value = numeric_value(decimal, 0).unwrap();
        assert_eq!(value, SqlValue::Int(12_345_678_901_234_567));
        assert_eq!(value.as_i64(), Some(12_345_678_901_234_567));
    }

    #[test]
    fn test_numeric_conversion_errors() {
        let fraction = Decimal::new(-15, 1);
        assert!(matches!(numeric_value(fraction, 2), Err(PostgresError::Conversion(_))));

        let too_large = Decimal::from(i64::MAX) + Decimal::ONE;
        assert!(matches!(numeric_value(too_large, 2), Err(PostgresError::Conversion(_))));

        assert_eq!(numeric_value(Decimal::new(120, 1), 0).unwrap(), SqlValue::Int(12));
    }

    #[test]
    fn test_sql_value_binds_null() {
        let mut out = BytesMut::new();
        let result = SqlValue::Null.to_sql(&Type::INT8, &mut out).unwrap();
        assert!(matches!(result, IsNull::Yes));
        assert!(out.is_empty());
    }

    #[test]
    fn test_sql_value_rejects_mismatched_type() {
        let mut out = BytesMut::new();
        assert!(SqlValue::Text("x".to_string()).to_sql(&Type::INT8, &mut out).is_err());
        assert!(SqlValue::Int(7).to_sql(&Type::INT8, &mut out).is_ok());
        assert_eq!(out.len(), 8);
    }
}
