//! Inference persistence
//!
//! An inference is the join row tying one image to one room within a
//! project, created once per image at upload time. Historically this
//! fed an ML room-detection feature; today it is the grouping link the
//! move-to-room operation rewrites.

use chrono::{DateTime, Utc};
use roomlog_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::projects::parse_uuid;

#[derive(Debug, Clone)]
pub struct Inference {
    pub id: Uuid,
    pub image_id: Uuid,
    pub room_id: Uuid,
    pub project_id: Uuid,
    pub created_at: DateTime<Utc>,
}

fn inference_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Inference> {
    Ok(Inference {
        id: parse_uuid(row.get("id"))?,
        image_id: parse_uuid(row.get("image_id"))?,
        room_id: parse_uuid(row.get("room_id"))?,
        project_id: parse_uuid(row.get("project_id"))?,
        created_at: row.get("created_at"),
    })
}

/// Insert the image → room join row
pub async fn insert_inference(
    pool: &SqlitePool,
    image_id: Uuid,
    room_id: Uuid,
    project_id: Uuid,
) -> Result<Inference> {
    let id = Uuid::new_v4();
    let row = sqlx::query(
        r#"
        INSERT INTO inferences (id, image_id, room_id, project_id)
        VALUES (?, ?, ?, ?)
        RETURNING id, image_id, room_id, project_id, created_at
        "#,
    )
    .bind(id.to_string())
    .bind(image_id.to_string())
    .bind(room_id.to_string())
    .bind(project_id.to_string())
    .fetch_one(pool)
    .await?;

    inference_from_row(&row)
}

/// The live inference for an image, if the upload pipeline completed
pub async fn find_by_image(pool: &SqlitePool, image_id: Uuid) -> Result<Option<Inference>> {
    let row = sqlx::query(
        r#"
        SELECT id, image_id, room_id, project_id, created_at
        FROM inferences
        WHERE image_id = ? AND is_deleted = 0
        "#,
    )
    .bind(image_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(inference_from_row).transpose()
}

/// Bulk move: repoint the live inferences of the given images at a new
/// room. Returns how many images actually moved.
pub async fn move_images_to_room(
    pool: &SqlitePool,
    project_id: Uuid,
    image_ids: &[Uuid],
    room_id: Uuid,
) -> Result<u64> {
    let mut moved = 0;
    for image_id in image_ids {
        let result = sqlx::query(
            r#"
            UPDATE inferences
            SET room_id = ?
            WHERE image_id = ? AND project_id = ? AND is_deleted = 0
            "#,
        )
        .bind(room_id.to_string())
        .bind(image_id.to_string())
        .bind(project_id.to_string())
        .execute(pool)
        .await?;
        moved += result.rows_affected();
    }
    Ok(moved)
}

/// Number of live images currently grouped under a room
pub async fn count_images_in_room(pool: &SqlitePool, room_id: Uuid) -> Result<i64> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS n
        FROM inferences
        WHERE room_id = ? AND is_deleted = 0
        "#,
    )
    .bind(room_id.to_string())
    .fetch_one(pool)
    .await?;
    Ok(row.get("n"))
}

/// Soft-delete the inference belonging to an image (pairs with image
/// soft-delete and pipeline compensation)
pub async fn soft_delete_for_image(pool: &SqlitePool, image_id: Uuid) -> Result<u64> {
    let result =
        sqlx::query("UPDATE inferences SET is_deleted = 1 WHERE image_id = ? AND is_deleted = 0")
            .bind(image_id.to_string())
            .execute(pool)
            .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::organizations::{create_organization, SubscriptionStatus};
    use crate::db::projects::create_project;
    use crate::db::{images, rooms};

    struct Fixture {
        pool: SqlitePool,
        project_id: Uuid,
    }

    impl Fixture {
        async fn room(&self, name: &str) -> Uuid {
            let (room, _) = rooms::resolve_room(&self.pool, self.project_id, name)
                .await
                .unwrap();
            room.id
        }

        async fn image(&self, key: &str) -> Uuid {
            images::insert_image(&self.pool, self.project_id, key, Some("image/jpeg"), 1)
                .await
                .unwrap()
                .id
        }
    }

    async fn setup() -> Fixture {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        roomlog_common::db::init::create_all_tables(&pool).await.unwrap();

        let org = create_organization(&pool, "Acme", SubscriptionStatus::Active)
            .await
            .unwrap();
        let project = create_project(&pool, org.id, "Flood Job").await.unwrap();

        Fixture {
            pool,
            project_id: project.id,
        }
    }

    #[tokio::test]
    async fn insert_and_find_by_image() {
        let fx = setup().await;
        let image_id = fx.image("a.jpg").await;
        let room_id = fx.room("Kitchen").await;

        let inference = insert_inference(&fx.pool, image_id, room_id, fx.project_id)
            .await
            .unwrap();
        assert_eq!(inference.image_id, image_id);
        assert_eq!(inference.room_id, room_id);

        let found = find_by_image(&fx.pool, image_id).await.unwrap().unwrap();
        assert_eq!(found.id, inference.id);
    }

    #[tokio::test]
    async fn bulk_move_repoints_only_named_images() {
        let fx = setup().await;
        let old_room = fx.room("Unknown").await;
        let new_room = fx.room("Kitchen").await;

        let moved_image = fx.image("a.jpg").await;
        let untouched_image = fx.image("b.jpg").await;
        insert_inference(&fx.pool, moved_image, old_room, fx.project_id).await.unwrap();
        insert_inference(&fx.pool, untouched_image, old_room, fx.project_id).await.unwrap();

        let moved = move_images_to_room(&fx.pool, fx.project_id, &[moved_image], new_room)
            .await
            .unwrap();
        assert_eq!(moved, 1);

        let a = find_by_image(&fx.pool, moved_image).await.unwrap().unwrap();
        assert_eq!(a.room_id, new_room);
        let b = find_by_image(&fx.pool, untouched_image).await.unwrap().unwrap();
        assert_eq!(b.room_id, old_room);
    }

    #[tokio::test]
    async fn room_counts_track_moves_and_deletes() {
        let fx = setup().await;
        let room_a = fx.room("Kitchen").await;
        let room_b = fx.room("Attic").await;

        let first = fx.image("a.jpg").await;
        let second = fx.image("b.jpg").await;
        insert_inference(&fx.pool, first, room_a, fx.project_id).await.unwrap();
        insert_inference(&fx.pool, second, room_a, fx.project_id).await.unwrap();
        assert_eq!(count_images_in_room(&fx.pool, room_a).await.unwrap(), 2);

        move_images_to_room(&fx.pool, fx.project_id, &[first], room_b).await.unwrap();
        assert_eq!(count_images_in_room(&fx.pool, room_a).await.unwrap(), 1);
        assert_eq!(count_images_in_room(&fx.pool, room_b).await.unwrap(), 1);

        soft_delete_for_image(&fx.pool, second).await.unwrap();
        assert_eq!(count_images_in_room(&fx.pool, room_a).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn move_ignores_images_from_other_projects() {
        let fx = setup().await;
        let room = fx.room("Kitchen").await;
        let image_id = fx.image("a.jpg").await;
        insert_inference(&fx.pool, image_id, room, fx.project_id).await.unwrap();

        // A different project id never matches the live inference
        let moved = move_images_to_room(&fx.pool, Uuid::new_v4(), &[image_id], room)
            .await
            .unwrap();
        assert_eq!(moved, 0);

        let untouched = find_by_image(&fx.pool, image_id).await.unwrap().unwrap();
        assert_eq!(untouched.room_id, room);
    }
}
