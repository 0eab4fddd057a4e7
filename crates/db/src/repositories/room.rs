use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::Row;

use horizon_core::domain::room::{Room, RoomId, RoomType};
use horizon_core::domain::stay::StayDates;

use super::{decode_error, RepositoryError, RoomRepository};
use crate::DbPool;

const ROOM_COLUMNS: &str = "r.id, r.room_type, r.number, r.floor, r.price_per_night, r.amenities_json";
const ROOM_ORDER: &str = "ORDER BY CAST(r.number AS INTEGER), r.number";

pub struct SqlRoomRepository {
    pool: DbPool,
}

impl SqlRoomRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn row_to_room(row: &sqlx::sqlite::SqliteRow) -> Result<Room, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let room_type: String = row.try_get("room_type").map_err(decode_error)?;
    let number: String = row.try_get("number").map_err(decode_error)?;
    let floor: i64 = row.try_get("floor").map_err(decode_error)?;
    let price: String = row.try_get("price_per_night").map_err(decode_error)?;
    let amenities_json: String = row.try_get("amenities_json").map_err(decode_error)?;

    Ok(Room {
        id: RoomId(id),
        room_type: RoomType::from_str(&room_type).map_err(decode_error)?,
        number,
        floor: u32::try_from(floor).map_err(decode_error)?,
        price_per_night: Decimal::from_str(&price).map_err(decode_error)?,
        amenities: serde_json::from_str(&amenities_json).map_err(decode_error)?,
    })
}

#[async_trait::async_trait]
impl RoomRepository for SqlRoomRepository {
    async fn list_all(&self) -> Result<Vec<Room>, RepositoryError> {
        let sql = format!("SELECT {ROOM_COLUMNS} FROM rooms r {ROOM_ORDER}");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_room).collect()
    }

    async fn find_by_id(&self, id: &RoomId) -> Result<Option<Room>, RepositoryError> {
        let sql = format!("SELECT {ROOM_COLUMNS} FROM rooms r WHERE r.id = ?");
        let row = sqlx::query(&sql).bind(&id.0).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_room).transpose()
    }

    async fn list_available(
        &self,
        stay: &StayDates,
        room_type: Option<RoomType>,
    ) -> Result<Vec<Room>, RepositoryError> {
        let sql = format!(
            "SELECT {ROOM_COLUMNS} FROM rooms r
             WHERE (?1 IS NULL OR r.room_type = ?1)
               AND NOT EXISTS (
                   SELECT 1 FROM bookings b
                   WHERE b.room_id = r.id
                     AND b.status != 'cancelled'
                     AND b.check_in < ?3
                     AND ?2 < b.check_out
               )
             {ROOM_ORDER}"
        );
        let rows = sqlx::query(&sql)
            .bind(room_type.map(|room_type| room_type.as_str()))
            .bind(stay.check_in_str())
            .bind(stay.check_out_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_room).collect()
    }

    async fn save(&self, room: Room) -> Result<(), RepositoryError> {
        room.validate()?;
        let amenities_json = serde_json::to_string(&room.amenities).map_err(decode_error)?;

        sqlx::query(
            "INSERT INTO rooms (id, room_type, number, floor, price_per_night, amenities_json)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 room_type = excluded.room_type,
                 number = excluded.number,
                 floor = excluded.floor,
                 price_per_night = excluded.price_per_night,
                 amenities_json = excluded.amenities_json",
        )
        .bind(&room.id.0)
        .bind(room.room_type.as_str())
        .bind(&room.number)
        .bind(i64::from(room.floor))
        .bind(room.price_per_night.to_string())
        .bind(amenities_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
