use rust_decimal::Decimal;
use sqlx::Executor;

use horizon_core::domain::room::{Room, RoomId, RoomType};

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// One contiguous run of identical rooms on a floor.
#[derive(Debug, Clone, Copy)]
struct RoomBlock {
    room_type: RoomType,
    count: u32,
    first_number: u32,
    floor: u32,
    price_per_night: i64,
    amenities: &'static [&'static str],
}

const ROOM_BLOCKS: &[RoomBlock] = &[
    RoomBlock {
        room_type: RoomType::Standard,
        count: 10,
        first_number: 201,
        floor: 2,
        price_per_night: 99,
        amenities: &["Wi-Fi", "TV", "Mini Bar"],
    },
    RoomBlock {
        room_type: RoomType::Deluxe,
        count: 8,
        first_number: 301,
        floor: 3,
        price_per_night: 149,
        amenities: &["Wi-Fi", "TV", "Mini Bar", "Balcony", "Bathrobe", "Breakfast"],
    },
    RoomBlock {
        room_type: RoomType::Suite,
        count: 5,
        first_number: 401,
        floor: 4,
        price_per_night: 249,
        amenities: &["Wi-Fi", "TV", "Mini Bar", "Balcony", "Jacuzzi", "Living Room"],
    },
    RoomBlock {
        room_type: RoomType::Penthouse,
        count: 2,
        first_number: 501,
        floor: 5,
        price_per_night: 499,
        amenities: &["Wi-Fi", "TV", "Mini Bar", "Terrace", "Jacuzzi", "Butler Service", "Kitchen"],
    },
];

/// (confirmation code, room id, status)
const SEED_BOOKINGS: &[(&str, &str, &str)] = &[
    ("GH-A7K3", "std-1", "checked-in"),
    ("GH-B9M2", "dlx-1", "confirmed"),
    ("GH-C1P5", "ste-1", "checked-in"),
    ("GH-D4R8", "std-2", "checked-out"),
    ("GH-E6T1", "std-3", "confirmed"),
    ("GH-F2W9", "dlx-2", "confirmed"),
];

const SEED_CALL_LOG_IDS: &[&str] = &["call-seed-001", "call-seed-002", "call-seed-003"];

/// Demo inventory, sample guests and call history for the Grand Horizon.
pub struct HotelSeedDataset;

impl HotelSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/hotel_seed.sql");

    /// The seeded room inventory, for stores that are not backed by SQL.
    pub fn rooms() -> Vec<Room> {
        ROOM_BLOCKS
            .iter()
            .flat_map(|block| {
                (0..block.count).map(move |offset| Room {
                    id: RoomId(format!("{}-{}", block.room_type.id_prefix(), offset + 1)),
                    room_type: block.room_type,
                    number: (block.first_number + offset).to_string(),
                    floor: block.floor,
                    price_per_night: Decimal::new(block.price_per_night, 0),
                    amenities: block.amenities.iter().map(|amenity| amenity.to_string()).collect(),
                })
            })
            .collect()
    }

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            rooms: ROOM_BLOCKS.iter().map(|block| block.count as usize).sum(),
            bookings: SEED_BOOKINGS.len(),
            call_logs: SEED_CALL_LOG_IDS.len(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for block in ROOM_BLOCKS {
            let (count, distinct_prices): (i64, i64) = sqlx::query_as(
                "SELECT COUNT(1), COUNT(DISTINCT price_per_night)
                 FROM rooms WHERE room_type = ?1 AND floor = ?2 AND CAST(price_per_night AS REAL) = ?3",
            )
            .bind(block.room_type.as_str())
            .bind(i64::from(block.floor))
            .bind(block.price_per_night as f64)
            .fetch_one(pool)
            .await?;
            checks.push((
                block.room_type.as_str(),
                count == i64::from(block.count) && distinct_prices == 1,
            ));
        }

        for (code, room_id, status) in SEED_BOOKINGS {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM bookings
                               WHERE confirmation_code = ?1 AND room_id = ?2 AND status = ?3)",
            )
            .bind(*code)
            .bind(*room_id)
            .bind(*status)
            .fetch_one(pool)
            .await?;
            checks.push((*code, present == 1));
        }

        let call_logs: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM call_logs WHERE id IN {}",
            sql_array_from_ids(SEED_CALL_LOG_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("call-logs", call_logs == SEED_CALL_LOG_IDS.len() as i64));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes seeded bookings and call logs; rooms stay because later bookings
    /// may reference them.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let codes: Vec<&str> = SEED_BOOKINGS.iter().map(|(code, _, _)| *code).collect();
        let mut tx = pool.begin().await?;

        sqlx::query(&format!(
            "DELETE FROM bookings WHERE confirmation_code IN {}",
            sql_array_from_ids(&codes)
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!(
            "DELETE FROM call_logs WHERE id IN {}",
            sql_array_from_ids(SEED_CALL_LOG_IDS)
        ))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedResult {
    pub rooms: usize,
    pub bookings: usize,
    pub call_logs: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
