//! Upload pipeline: bytes in, signed URL out
//!
//! The orchestrated sequence behind the image upload endpoint:
//!
//! 1. billing gate (subscription standing)
//! 2. project lookup scoped to the caller's organization
//! 3. store bytes under `{org_id}/{project_id}/{uuid}_{filename}`
//! 4. register the image row (percent-encoded key)
//! 5. resolve the target room name (sentinels fall back to "Unknown")
//! 6. get-or-create the room, insert the inference join row
//! 7. mint a signed URL (best effort)
//!
//! Failures after the object write are compensated: the stored object
//! is deleted and the image row soft-deleted, so a failed upload never
//! leaves a live image without an inference.

use bytes::Bytes;
use roomlog_common::{Error, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::db::organizations::{self, SubscriptionStatus};
use crate::db::{images, inferences, projects, rooms};
use crate::storage::ObjectStore;

use super::url_signer::{UrlSigner, SIGNED_URL_TTL_SECS};

/// Fallback room for uploads without a usable room designation
pub const UNKNOWN_ROOM: &str = "Unknown";

/// Sentinel room parameter meaning "let the service decide"
pub const AUTOMATIC_SENTINEL: &str = "automatic";

/// Everything a successful upload produced
#[derive(Debug)]
pub struct UploadOutcome {
    pub image: images::Image,
    pub inference_id: Uuid,
    pub room: rooms::Room,
    pub did_create_room: bool,
    /// None when signing failed; the upload itself still succeeded
    pub signed_url: Option<String>,
}

pub struct UploadPipeline {
    db: SqlitePool,
    storage: Arc<dyn ObjectStore>,
    signer: UrlSigner,
}

impl UploadPipeline {
    pub fn new(db: SqlitePool, storage: Arc<dyn ObjectStore>, signer: UrlSigner) -> Self {
        Self { db, storage, signer }
    }

    /// Run the full pipeline for one uploaded file.
    pub async fn ingest(
        &self,
        auth: &AuthContext,
        project_id: Uuid,
        room_param: Option<&str>,
        filename: &str,
        content_type: Option<&str>,
        data: Bytes,
    ) -> Result<UploadOutcome> {
        // Billing gate runs before any side effect: a past_due org
        // must observe zero storage writes and zero row inserts.
        let status = organizations::subscription_status(&self.db, auth.org_id).await?;
        if status == SubscriptionStatus::PastDue {
            return Err(Error::BillingBlocked(
                "subscription past due; uploads disabled".to_string(),
            ));
        }

        let project = projects::find_for_org(&self.db, auth.org_id, project_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("project: {}", project_id)))?;

        let object_key = format!(
            "{}/{}/{}_{}",
            auth.org_id,
            project.id,
            Uuid::new_v4(),
            sanitize_filename(filename)
        );
        let storage_key = urlencoding::encode(&object_key).into_owned();

        self.storage.put(&object_key, data.clone()).await?;

        let image = match images::insert_image(
            &self.db,
            project.id,
            &storage_key,
            content_type,
            data.len() as i64,
        )
        .await
        {
            Ok(image) => image,
            Err(e) => {
                self.discard_object(&object_key).await;
                return Err(e);
            }
        };

        let room_name = self.resolve_target_room_name(project.id, room_param).await;

        let (room, did_create_room) = match rooms::resolve_room(&self.db, project.id, &room_name).await
        {
            Ok(resolved) => resolved,
            Err(e) => {
                self.compensate(&object_key, image.id).await;
                return Err(e);
            }
        };

        let inference = match inferences::insert_inference(&self.db, image.id, room.id, project.id)
            .await
        {
            Ok(inference) => inference,
            Err(e) => {
                self.compensate(&object_key, image.id).await;
                return Err(e);
            }
        };

        // Best effort: a missing URL is a soft failure, not an abort
        let signed_url = self.signer.sign(&object_key, SIGNED_URL_TTL_SECS);
        if signed_url.is_none() {
            tracing::warn!(image_id = %image.id, "signed URL minting failed");
        }

        tracing::info!(
            image_id = %image.id,
            project_id = %project.id,
            room = %room.name,
            did_create_room,
            bytes = data.len(),
            "image ingested"
        );

        Ok(UploadOutcome {
            image,
            inference_id: inference.id,
            room,
            did_create_room,
            signed_url,
        })
    }

    /// Turn the caller's room designation into a room name.
    ///
    /// Accepts a room id (resolved to its name), a literal name, or the
    /// "automatic" sentinel. Anything unusable falls back to
    /// [`UNKNOWN_ROOM`]; this is the one place errors are swallowed
    /// rather than propagated.
    async fn resolve_target_room_name(&self, project_id: Uuid, room_param: Option<&str>) -> String {
        let Some(param) = room_param.map(str::trim).filter(|p| !p.is_empty()) else {
            return UNKNOWN_ROOM.to_string();
        };
        if param.eq_ignore_ascii_case(AUTOMATIC_SENTINEL) {
            return UNKNOWN_ROOM.to_string();
        }

        if let Ok(room_id) = Uuid::parse_str(param) {
            return match rooms::find_by_id(&self.db, project_id, room_id).await {
                Ok(Some(room)) => room.name,
                Ok(None) => UNKNOWN_ROOM.to_string(),
                Err(e) => {
                    tracing::warn!(error = %e, "room lookup failed; defaulting room name");
                    UNKNOWN_ROOM.to_string()
                }
            };
        }

        param.to_string()
    }

    /// Undo the already-completed steps of a failed pipeline run.
    async fn compensate(&self, object_key: &str, image_id: Uuid) {
        self.discard_object(object_key).await;
        if let Err(e) = images::soft_delete(&self.db, image_id).await {
            tracing::error!(image_id = %image_id, error = %e, "compensation: image soft-delete failed");
        }
        if let Err(e) = inferences::soft_delete_for_image(&self.db, image_id).await {
            tracing::error!(image_id = %image_id, error = %e, "compensation: inference soft-delete failed");
        }
    }

    async fn discard_object(&self, object_key: &str) {
        if let Err(e) = self.storage.delete(object_key).await {
            tracing::error!(key = %object_key, error = %e, "compensation: object delete failed");
        }
    }
}

/// Keep only filesystem- and URL-safe characters in an uploaded
/// filename; strip leading dots so a crafted name cannot hide the file.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    let sanitized = sanitized.trim_start_matches('.');
    if sanitized.is_empty() {
        "upload".to_string()
    } else {
        sanitized.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::organizations::create_organization;
    use crate::db::projects::create_project;
    use crate::storage::LocalStore;
    use tempfile::TempDir;

    struct Fixture {
        pool: SqlitePool,
        pipeline: UploadPipeline,
        auth: AuthContext,
        project_id: Uuid,
        _dir: TempDir,
    }

    async fn setup(status: SubscriptionStatus) -> Fixture {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        roomlog_common::db::init::create_all_tables(&pool).await.unwrap();

        let org = create_organization(&pool, "Acme Restoration", status).await.unwrap();
        let user = crate::db::sessions::create_user(&pool, org.id, "tech@acme.test")
            .await
            .unwrap();
        let project = create_project(&pool, org.id, "Basement Flood").await.unwrap();

        let dir = TempDir::new().unwrap();
        let storage = Arc::new(LocalStore::new(dir.path().to_path_buf()));
        let pipeline = UploadPipeline::new(pool.clone(), storage, UrlSigner::new("test-secret"));

        Fixture {
            pool,
            pipeline,
            auth: AuthContext {
                user_id: user.id,
                org_id: org.id,
            },
            project_id: project.id,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn ingest_creates_image_room_and_inference() {
        let fx = setup(SubscriptionStatus::Active).await;

        let outcome = fx
            .pipeline
            .ingest(
                &fx.auth,
                fx.project_id,
                Some("automatic"),
                "kitchen.jpg",
                Some("image/jpeg"),
                Bytes::from_static(b"jpegdata"),
            )
            .await
            .unwrap();

        assert!(outcome.did_create_room);
        assert_eq!(outcome.room.name, UNKNOWN_ROOM);
        assert!(outcome.signed_url.is_some());

        // Exactly one image and one inference, linked to the room
        let inference = inferences::find_by_image(&fx.pool, outcome.image.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inference.room_id, outcome.room.id);
        assert_eq!(inference.id, outcome.inference_id);
    }

    #[tokio::test]
    async fn explicit_room_id_reuses_room() {
        let fx = setup(SubscriptionStatus::Active).await;

        let first = fx
            .pipeline
            .ingest(
                &fx.auth,
                fx.project_id,
                Some("Kitchen"),
                "a.jpg",
                None,
                Bytes::from_static(b"a"),
            )
            .await
            .unwrap();
        assert!(first.did_create_room);

        let second = fx
            .pipeline
            .ingest(
                &fx.auth,
                fx.project_id,
                Some(&first.room.id.to_string()),
                "b.jpg",
                None,
                Bytes::from_static(b"b"),
            )
            .await
            .unwrap();
        assert!(!second.did_create_room);
        assert_eq!(second.room.id, first.room.id);
    }

    #[tokio::test]
    async fn unknown_room_id_falls_back_to_unknown() {
        let fx = setup(SubscriptionStatus::Active).await;

        let outcome = fx
            .pipeline
            .ingest(
                &fx.auth,
                fx.project_id,
                Some(&Uuid::new_v4().to_string()),
                "a.jpg",
                None,
                Bytes::from_static(b"a"),
            )
            .await
            .unwrap();
        assert_eq!(outcome.room.name, UNKNOWN_ROOM);
    }

    #[tokio::test]
    async fn billing_gate_blocks_with_zero_side_effects() {
        let fx = setup(SubscriptionStatus::PastDue).await;

        let err = fx
            .pipeline
            .ingest(
                &fx.auth,
                fx.project_id,
                None,
                "a.jpg",
                None,
                Bytes::from_static(b"a"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BillingBlocked(_)));

        let images = images::list_for_project(&fx.pool, fx.project_id).await.unwrap();
        assert!(images.is_empty());
        let rooms = rooms::list_for_project(&fx.pool, fx.project_id).await.unwrap();
        assert!(rooms.is_empty());
    }

    #[tokio::test]
    async fn unknown_project_is_not_found() {
        let fx = setup(SubscriptionStatus::Active).await;

        let err = fx
            .pipeline
            .ingest(
                &fx.auth,
                Uuid::new_v4(),
                None,
                "a.jpg",
                None,
                Bytes::from_static(b"a"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn storage_key_is_percent_encoded() {
        let fx = setup(SubscriptionStatus::Active).await;

        let outcome = fx
            .pipeline
            .ingest(
                &fx.auth,
                fx.project_id,
                None,
                "photo.jpg",
                None,
                Bytes::from_static(b"x"),
            )
            .await
            .unwrap();

        // Persisted key is encoded; decoding restores the object key
        assert!(outcome.image.storage_key.contains("%2F"));
        let decoded = urlencoding::decode(&outcome.image.storage_key).unwrap();
        assert!(decoded.starts_with(&format!("{}/{}/", fx.auth.org_id, fx.project_id)));
        assert!(decoded.ends_with("_photo.jpg"));
    }

    #[tokio::test]
    async fn failed_inference_insert_is_compensated() {
        let fx = setup(SubscriptionStatus::Active).await;

        // Force the final pipeline step to fail
        sqlx::query("DROP TABLE inferences").execute(&fx.pool).await.unwrap();

        let err = fx
            .pipeline
            .ingest(
                &fx.auth,
                fx.project_id,
                Some("Kitchen"),
                "a.jpg",
                None,
                Bytes::from_static(b"a"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Database(_)));

        // Image row soft-deleted, stored object removed
        let images = images::list_for_project(&fx.pool, fx.project_id).await.unwrap();
        assert!(images.is_empty());
        assert_eq!(count_files(fx._dir.path()), 0);
    }

    fn count_files(dir: &std::path::Path) -> usize {
        let mut count = 0;
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    count += count_files(&path);
                } else {
                    count += 1;
                }
            }
        }
        count
    }

    #[test]
    fn filename_sanitizing() {
        assert_eq!(sanitize_filename("kitchen.jpg"), "kitchen.jpg");
        assert_eq!(sanitize_filename("my photo (1).jpg"), "myphoto1.jpg");
        assert_eq!(sanitize_filename("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_filename(""), "upload");
    }
}
