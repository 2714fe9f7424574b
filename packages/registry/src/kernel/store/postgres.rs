//! Postgres-backed store.
//!
//! Concurrency failures come back from Postgres as SQLSTATE codes on the
//! commit or on individual statements; `classify` maps them to typed
//! [`StoreError`] variants so the retry controller never inspects backend
//! codes itself. 40001 is a serialization failure, 40P01 a deadlock, and the
//! 23xxx class an integrity violation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};

use crate::common::{Id, ImportOperationId, LocationId, SettlementId, StewardId};
use crate::domains::imports::models::{ImportOperation, ImportStatus};
use crate::domains::locations::models::{Location, LocationInput};
use crate::domains::settlements::models::{NewSettlement, Settlement};
use crate::domains::stewards::models::{Steward, StewardInput};
use crate::kernel::store::{IsolationLevel, Store, StoreError, StoreTx};

const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";
const SQLSTATE_DEADLOCK_DETECTED: &str = "40P01";

fn classify(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db) = e {
        match db.code().as_deref() {
            Some(SQLSTATE_SERIALIZATION_FAILURE) => return StoreError::Serialization,
            Some(SQLSTATE_DEADLOCK_DETECTED) => return StoreError::Deadlock,
            Some(code) if code.starts_with("23") => {
                return StoreError::Integrity(db.message().to_string())
            }
            _ => {}
        }
    }
    StoreError::Backend(e.into())
}

/// Postgres [`Store`] implementation over a connection pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self, isolation: IsolationLevel) -> Result<Box<dyn StoreTx>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        if isolation == IsolationLevel::Serializable {
            sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
                .execute(&mut *tx)
                .await
                .map_err(classify)?;
        }
        Ok(Box::new(PostgresTx { tx }))
    }
}

struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

const SETTLEMENT_COLUMNS: &str = "id, name, area, population, capital, \
     meters_above_sea_level, telephone_code, climate, government, \
     creation_date, establishment_date, location_id, steward_id";

#[async_trait]
impl StoreTx for PostgresTx {
    async fn insert_settlement(&mut self, new: NewSettlement) -> Result<Settlement, StoreError> {
        let id: SettlementId = Id::new();
        let query = format!(
            "INSERT INTO settlement ({SETTLEMENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {SETTLEMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Settlement>(&query)
            .bind(id)
            .bind(&new.name)
            .bind(new.area)
            .bind(new.population)
            .bind(new.capital)
            .bind(new.meters_above_sea_level)
            .bind(new.telephone_code)
            .bind(new.climate)
            .bind(new.government)
            .bind(Utc::now().date_naive())
            .bind(new.establishment_date)
            .bind(new.location_id)
            .bind(new.steward_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(classify)
    }

    async fn update_settlement(&mut self, settlement: &Settlement) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE settlement SET name = $2, area = $3, population = $4, capital = $5, \
             meters_above_sea_level = $6, telephone_code = $7, climate = $8, government = $9, \
             establishment_date = $10, location_id = $11, steward_id = $12 \
             WHERE id = $1",
        )
        .bind(settlement.id)
        .bind(&settlement.name)
        .bind(settlement.area)
        .bind(settlement.population)
        .bind(settlement.capital)
        .bind(settlement.meters_above_sea_level)
        .bind(settlement.telephone_code)
        .bind(settlement.climate)
        .bind(settlement.government)
        .bind(settlement.establishment_date)
        .bind(settlement.location_id)
        .bind(settlement.steward_id)
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn delete_settlement(&mut self, id: SettlementId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM settlement WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_settlement(
        &mut self,
        id: SettlementId,
    ) -> Result<Option<Settlement>, StoreError> {
        let query = format!("SELECT {SETTLEMENT_COLUMNS} FROM settlement WHERE id = $1");
        sqlx::query_as::<_, Settlement>(&query)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(classify)
    }

    async fn all_settlements(&mut self) -> Result<Vec<Settlement>, StoreError> {
        let query = format!("SELECT {SETTLEMENT_COLUMNS} FROM settlement");
        sqlx::query_as::<_, Settlement>(&query)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(classify)
    }

    async fn settlement_name_taken(
        &mut self,
        name: &str,
        exclude: Option<SettlementId>,
    ) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM settlement WHERE LOWER(name) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(name)
        .bind(exclude)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(classify)
    }

    async fn count_settlements_by_location(
        &mut self,
        location_id: LocationId,
    ) -> Result<u64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM settlement WHERE location_id = $1",
        )
        .bind(location_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(count as u64)
    }

    async fn count_settlements_by_steward(
        &mut self,
        steward_id: StewardId,
    ) -> Result<u64, StoreError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM settlement WHERE steward_id = $1")
                .bind(steward_id)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(classify)?;
        Ok(count as u64)
    }

    async fn settlement_ids_by_location(
        &mut self,
        location_id: LocationId,
    ) -> Result<Vec<SettlementId>, StoreError> {
        sqlx::query_scalar::<_, SettlementId>(
            "SELECT id FROM settlement WHERE location_id = $1",
        )
        .bind(location_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(classify)
    }

    async fn settlement_ids_by_steward(
        &mut self,
        steward_id: StewardId,
    ) -> Result<Vec<SettlementId>, StoreError> {
        sqlx::query_scalar::<_, SettlementId>("SELECT id FROM settlement WHERE steward_id = $1")
            .bind(steward_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(classify)
    }

    async fn insert_location(&mut self, input: &LocationInput) -> Result<Location, StoreError> {
        let id: LocationId = Id::new();
        sqlx::query_as::<_, Location>(
            "INSERT INTO location (id, x, y) VALUES ($1, $2, $3) RETURNING id, x, y",
        )
        .bind(id)
        .bind(input.x)
        .bind(input.y)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(classify)
    }

    async fn update_location(&mut self, location: &Location) -> Result<(), StoreError> {
        sqlx::query("UPDATE location SET x = $2, y = $3 WHERE id = $1")
            .bind(location.id)
            .bind(location.x)
            .bind(location.y)
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_location(&mut self, id: LocationId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM location WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_location(&mut self, id: LocationId) -> Result<Option<Location>, StoreError> {
        sqlx::query_as::<_, Location>("SELECT id, x, y FROM location WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(classify)
    }

    async fn all_locations(&mut self) -> Result<Vec<Location>, StoreError> {
        sqlx::query_as::<_, Location>("SELECT id, x, y FROM location")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(classify)
    }

    async fn location_at(
        &mut self,
        x: f32,
        y: f32,
        exclude: Option<LocationId>,
    ) -> Result<Option<LocationId>, StoreError> {
        sqlx::query_scalar::<_, LocationId>(
            "SELECT id FROM location WHERE x = $1 AND y = $2 AND ($3::uuid IS NULL OR id <> $3) LIMIT 1",
        )
        .bind(x)
        .bind(y)
        .bind(exclude)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)
    }

    async fn insert_steward(&mut self, input: &StewardInput) -> Result<Steward, StoreError> {
        let id: StewardId = Id::new();
        sqlx::query_as::<_, Steward>(
            "INSERT INTO steward (id, height) VALUES ($1, $2) RETURNING id, height",
        )
        .bind(id)
        .bind(input.height)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(classify)
    }

    async fn update_steward(&mut self, steward: &Steward) -> Result<(), StoreError> {
        sqlx::query("UPDATE steward SET height = $2 WHERE id = $1")
            .bind(steward.id)
            .bind(steward.height)
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_steward(&mut self, id: StewardId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM steward WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_steward(&mut self, id: StewardId) -> Result<Option<Steward>, StoreError> {
        sqlx::query_as::<_, Steward>("SELECT id, height FROM steward WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(classify)
    }

    async fn all_stewards(&mut self) -> Result<Vec<Steward>, StoreError> {
        sqlx::query_as::<_, Steward>("SELECT id, height FROM steward")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(classify)
    }

    async fn insert_import(&mut self) -> Result<ImportOperation, StoreError> {
        let id: ImportOperationId = Id::new();
        sqlx::query_as::<_, ImportOperation>(
            "INSERT INTO import_operation (id, status, started_at) VALUES ($1, $2, $3) \
             RETURNING id, status, started_at, finished_at, added_count, error_message",
        )
        .bind(id)
        .bind(ImportStatus::InProgress)
        .bind(Utc::now())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(classify)
    }

    async fn update_import(&mut self, op: &ImportOperation) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE import_operation SET status = $2, finished_at = $3, added_count = $4, \
             error_message = $5 WHERE id = $1",
        )
        .bind(op.id)
        .bind(op.status)
        .bind(op.finished_at)
        .bind(op.added_count)
        .bind(op.error_message.as_deref())
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn find_import(
        &mut self,
        id: ImportOperationId,
    ) -> Result<Option<ImportOperation>, StoreError> {
        sqlx::query_as::<_, ImportOperation>(
            "SELECT id, status, started_at, finished_at, added_count, error_message \
             FROM import_operation WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)
    }

    async fn all_imports(&mut self) -> Result<Vec<ImportOperation>, StoreError> {
        sqlx::query_as::<_, ImportOperation>(
            "SELECT id, status, started_at, finished_at, added_count, error_message \
             FROM import_operation",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(classify)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(classify)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(classify)
    }
}
