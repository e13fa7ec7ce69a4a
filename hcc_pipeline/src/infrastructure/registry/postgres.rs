//! # Postgres Document Registry
//!
//! Production `DocumentRegistry` (§4.1). Every method is a single
//! transactional statement against the `documents` table — there are no
//! cross-row transactions, matching the concurrency model the port's doc
//! comment describes.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use hcc_domain::entities::document::{Document, DocumentStatus, Metadata};
use hcc_domain::error::{HccError, Result};
use hcc_domain::repositories::document_registry::ResultsUpdate;
use hcc_domain::repositories::DocumentRegistry;
use hcc_domain::value_objects::{DocumentFilter, DocumentId, Page, Pagination, StorageKind, StorageLocation};

pub struct PostgresDocumentRegistry {
    pool: PgPool,
}

impl PostgresDocumentRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the schema migrations embedded at compile time under
    /// `migrations/`. Safe to call on every startup; `sqlx::migrate!` only
    /// applies what hasn't run yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| HccError::Registry(format!("migration failed: {e}")))
    }
}

fn row_to_document(row: &sqlx::postgres::PgRow) -> Result<Document> {
    let id: Uuid = row.try_get("id").map_err(registry_err)?;
    let storage_kind: String = row.try_get("storage_kind").map_err(registry_err)?;
    let storage_path: String = row.try_get("storage_path").map_err(registry_err)?;
    let status: String = row.try_get("status").map_err(registry_err)?;
    let metadata_json: serde_json::Value = row.try_get("metadata").map_err(registry_err)?;
    let metadata: Metadata = serde_json::from_value(metadata_json).unwrap_or_default();

    Ok(Document {
        id: DocumentId::from_uuid(id),
        filename: row.try_get("filename").map_err(registry_err)?,
        file_size: row.try_get::<i64, _>("file_size").map_err(registry_err)? as u64,
        content_type: row.try_get("content_type").map_err(registry_err)?,
        created_at: row.try_get("created_at").map_err(registry_err)?,
        updated_at: row.try_get("updated_at").map_err(registry_err)?,
        storage: StorageLocation::new(
            storage_kind.parse::<StorageKind>().unwrap_or(StorageKind::Local),
            storage_path,
        ),
        status: DocumentStatus::from_db_str(&status).ok_or_else(|| HccError::Registry(format!("unknown status '{status}'")))?,
        processing_started_at: row.try_get("processing_started_at").map_err(registry_err)?,
        processing_completed_at: row.try_get("processing_completed_at").map_err(registry_err)?,
        total_conditions: row.try_get::<Option<i32>, _>("total_conditions").map_err(registry_err)?.map(|n| n as u32),
        hcc_relevant_conditions: row
            .try_get::<Option<i32>, _>("hcc_relevant_conditions")
            .map_err(registry_err)?
            .map(|n| n as u32),
        compliant_conditions: row
            .try_get::<Option<i32>, _>("compliant_conditions")
            .map_err(registry_err)?
            .map(|n| n as u32),
        extraction_result_path: row.try_get("extraction_result_path").map_err(registry_err)?,
        analysis_result_path: row.try_get("analysis_result_path").map_err(registry_err)?,
        validation_result_path: row.try_get("validation_result_path").map_err(registry_err)?,
        errors: row.try_get("errors").map_err(registry_err)?,
        patient_info: row.try_get("patient_info").map_err(registry_err)?,
        metadata,
        owner_id: row.try_get("owner_id").map_err(registry_err)?,
    })
}

fn registry_err(e: sqlx::Error) -> HccError {
    HccError::Registry(e.to_string())
}

#[async_trait]
impl DocumentRegistry for PostgresDocumentRegistry {
    async fn create(&self, document: Document) -> Result<Document> {
        let metadata_json = serde_json::to_value(&document.metadata).unwrap_or(serde_json::Value::Null);

        let row = sqlx::query(
            r#"
            INSERT INTO documents (
                id, filename, file_size, content_type, created_at, updated_at,
                storage_kind, storage_path, status, owner_id, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(document.id.as_uuid())
        .bind(&document.filename)
        .bind(document.file_size as i64)
        .bind(&document.content_type)
        .bind(document.created_at)
        .bind(document.updated_at)
        .bind(document.storage.kind.as_str())
        .bind(&document.storage.path)
        .bind(document.status.as_db_str())
        .bind(&document.owner_id)
        .bind(metadata_json)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return HccError::Conflict(format!("a document already exists for storage path '{}'", document.storage.path));
                }
            }
            registry_err(e)
        })?;

        row_to_document(&row)
    }

    async fn get(&self, id: DocumentId) -> Result<Document> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(registry_err)?
            .ok_or_else(|| HccError::NotFound(id.as_uuid()))?;
        row_to_document(&row)
    }

    async fn list(&self, filter: DocumentFilter, pagination: Pagination) -> Result<Page<Document>> {
        let status = filter.status.map(|s| s.as_db_str().to_string());

        let rows = sqlx::query(
            r#"
            SELECT * FROM documents
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR owner_id = $2)
            ORDER BY created_at DESC
            OFFSET $3 LIMIT $4
            "#,
        )
        .bind(&status)
        .bind(&filter.owner_id)
        .bind(pagination.skip as i64)
        .bind(pagination.limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(registry_err)?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM documents
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR owner_id = $2)
            "#,
        )
        .bind(&status)
        .bind(&filter.owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(registry_err)?;

        let items = rows.iter().map(row_to_document).collect::<Result<Vec<_>>>()?;

        Ok(Page {
            items,
            total: total as u64,
            skip: pagination.skip,
            limit: pagination.limit,
        })
    }

    async fn count_by_status(&self, status: DocumentStatus, owner_id: Option<&str>) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM documents
            WHERE status = $1 AND ($2::text IS NULL OR owner_id = $2)
            "#,
        )
        .bind(status.as_db_str())
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(registry_err)?;
        Ok(count as u64)
    }

    async fn update_status(&self, id: DocumentId, status: DocumentStatus, errors: Option<String>) -> Result<Document> {
        let current = self.get(id).await?;
        if !current.status.can_transition_to(status) {
            return Err(HccError::InvalidTransition {
                from: current.status.as_db_str().to_string(),
                to: status.as_db_str().to_string(),
            });
        }

        let processing_started_at = if current.status == DocumentStatus::Pending && status != DocumentStatus::Pending {
            Some(current.processing_started_at.unwrap_or_else(chrono::Utc::now))
        } else {
            current.processing_started_at
        };
        let processing_completed_at = if status.is_terminal() {
            Some(chrono::Utc::now())
        } else {
            current.processing_completed_at
        };

        let row = sqlx::query(
            r#"
            UPDATE documents
            SET status = $2,
                errors = COALESCE($3, errors),
                processing_started_at = $4,
                processing_completed_at = $5,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.as_db_str())
        .bind(&errors)
        .bind(processing_started_at)
        .bind(processing_completed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(registry_err)?
        .ok_or_else(|| HccError::NotFound(id.as_uuid()))?;

        row_to_document(&row)
    }

    async fn update_results(&self, id: DocumentId, update: ResultsUpdate) -> Result<Document> {
        let current = self.get(id).await?;
        let mut merged = current.metadata.clone();
        for (k, v) in update.metadata {
            merged.insert(k, v);
        }
        let merged_json = serde_json::to_value(&merged).unwrap_or(serde_json::Value::Null);

        let row = sqlx::query(
            r#"
            UPDATE documents
            SET total_conditions = COALESCE($2, total_conditions),
                hcc_relevant_conditions = COALESCE($3, hcc_relevant_conditions),
                compliant_conditions = COALESCE($4, compliant_conditions),
                extraction_result_path = COALESCE($5, extraction_result_path),
                analysis_result_path = COALESCE($6, analysis_result_path),
                validation_result_path = COALESCE($7, validation_result_path),
                patient_info = COALESCE($8, patient_info),
                metadata = $9,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(update.total_conditions.map(|n| n as i32))
        .bind(update.hcc_relevant_conditions.map(|n| n as i32))
        .bind(update.compliant_conditions.map(|n| n as i32))
        .bind(&update.extraction_result_path)
        .bind(&update.analysis_result_path)
        .bind(&update.validation_result_path)
        .bind(&update.patient_info)
        .bind(merged_json)
        .fetch_optional(&self.pool)
        .await
        .map_err(registry_err)?
        .ok_or_else(|| HccError::NotFound(id.as_uuid()))?;

        row_to_document(&row)
    }

    async fn reprocess(&self, id: DocumentId) -> Result<Document> {
        let row = sqlx::query(
            r#"
            UPDATE documents
            SET status = 'PENDING',
                processing_started_at = NULL,
                processing_completed_at = NULL,
                total_conditions = NULL,
                hcc_relevant_conditions = NULL,
                compliant_conditions = NULL,
                extraction_result_path = NULL,
                analysis_result_path = NULL,
                validation_result_path = NULL,
                errors = NULL,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(registry_err)?
        .ok_or_else(|| HccError::NotFound(id.as_uuid()))?;

        row_to_document(&row)
    }

    async fn delete(&self, id: DocumentId) -> Result<()> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(registry_err)?;
        if result.rows_affected() == 0 {
            return Err(HccError::NotFound(id.as_uuid()));
        }
        Ok(())
    }
}
