use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::Row;
use tracing::{info, warn};

use horizon_core::domain::booking::{
    Booking, BookingId, BookingStatus, ConfirmationCode, NewBooking,
};
use horizon_core::domain::room::{RoomId, RoomType};
use horizon_core::domain::stay::{StayDates, DATE_FORMAT};

use super::{decode_error, BookingRepository, RepositoryError, MAX_CODE_ATTEMPTS};
use crate::DbPool;

const BOOKING_SELECT: &str = "SELECT b.id, b.room_id, r.room_type, r.number AS room_number,
        r.floor, b.guest_name, b.guest_phone, b.check_in, b.check_out, b.adults,
        b.children, b.total_price, b.status, b.confirmation_code, b.created_at, b.updated_at
     FROM bookings b
     JOIN rooms r ON r.id = b.room_id";

/// Picks the lowest-numbered free room of a type and inserts the booking in a
/// single statement, so the overlap check and the insert cannot interleave with
/// another writer. Totals are summed in integer cents; room prices are whole
/// cents (`Room::validate`).
const ALLOCATE_SQL: &str = "INSERT INTO bookings (id, room_id, guest_name, guest_phone,
        check_in, check_out, adults, children, total_price, status, confirmation_code,
        created_at, updated_at)
     SELECT ?1, r.id, ?2, ?3, ?4, ?5, ?6, ?7,
            printf('%d.%02d',
                   CAST(ROUND(CAST(r.price_per_night AS REAL) * 100) AS INTEGER) * ?8 / 100,
                   CAST(ROUND(CAST(r.price_per_night AS REAL) * 100) AS INTEGER) * ?8 % 100),
            'confirmed', ?9, ?10, ?10
     FROM rooms r
     WHERE r.room_type = ?11
       AND NOT EXISTS (
           SELECT 1 FROM bookings b
           WHERE b.room_id = r.id
             AND b.status != 'cancelled'
             AND b.check_in < ?5
             AND ?4 < b.check_out
       )
     ORDER BY CAST(r.number AS INTEGER), r.number
     LIMIT 1";

pub struct SqlBookingRepository {
    pool: DbPool,
}

impl SqlBookingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)).map_err(decode_error)
}

fn row_to_booking(row: &sqlx::sqlite::SqliteRow) -> Result<Booking, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let room_id: String = row.try_get("room_id").map_err(decode_error)?;
    let room_type: String = row.try_get("room_type").map_err(decode_error)?;
    let room_number: String = row.try_get("room_number").map_err(decode_error)?;
    let floor: i64 = row.try_get("floor").map_err(decode_error)?;
    let guest_name: String = row.try_get("guest_name").map_err(decode_error)?;
    let guest_phone: String = row.try_get("guest_phone").map_err(decode_error)?;
    let check_in: String = row.try_get("check_in").map_err(decode_error)?;
    let check_out: String = row.try_get("check_out").map_err(decode_error)?;
    let adults: i64 = row.try_get("adults").map_err(decode_error)?;
    let children: i64 = row.try_get("children").map_err(decode_error)?;
    let total_price: String = row.try_get("total_price").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let confirmation_code: String = row.try_get("confirmation_code").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    let stay = StayDates::new(
        NaiveDate::parse_from_str(&check_in, DATE_FORMAT).map_err(decode_error)?,
        NaiveDate::parse_from_str(&check_out, DATE_FORMAT).map_err(decode_error)?,
    )
    .map_err(decode_error)?;

    Ok(Booking {
        id: BookingId(id),
        room_id: RoomId(room_id),
        room_type: RoomType::from_str(&room_type).map_err(decode_error)?,
        room_number,
        floor: u32::try_from(floor).map_err(decode_error)?,
        guest_name,
        guest_phone,
        stay,
        adults: u32::try_from(adults).map_err(decode_error)?,
        children: u32::try_from(children).map_err(decode_error)?,
        total_price: Decimal::from_str(&total_price).map_err(decode_error)?,
        status: BookingStatus::from_str(&status).map_err(decode_error)?,
        confirmation_code: ConfirmationCode(confirmation_code),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl BookingRepository for SqlBookingRepository {
    async fn list_recent(&self) -> Result<Vec<Booking>, RepositoryError> {
        let sql = format!("{BOOKING_SELECT} ORDER BY b.created_at DESC, b.id DESC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_booking).collect()
    }

    async fn find_by_id(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        let sql = format!("{BOOKING_SELECT} WHERE b.id = ?");
        let row = sqlx::query(&sql).bind(&id.0).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_booking).transpose()
    }

    async fn find_by_confirmation_code(
        &self,
        code: &ConfirmationCode,
    ) -> Result<Option<Booking>, RepositoryError> {
        let sql = format!("{BOOKING_SELECT} WHERE b.confirmation_code = ?");
        let row = sqlx::query(&sql).bind(&code.0).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_booking).transpose()
    }

    async fn allocate(&self, request: NewBooking) -> Result<Option<Booking>, RepositoryError> {
        request.validate()?;

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let id = BookingId::generate();
            let code = ConfirmationCode::generate(&mut rand::thread_rng());
            let now = Utc::now().to_rfc3339();

            let result = sqlx::query(ALLOCATE_SQL)
                .bind(&id.0)
                .bind(request.guest_name.trim())
                .bind(&request.guest_phone)
                .bind(request.stay.check_in_str())
                .bind(request.stay.check_out_str())
                .bind(i64::from(request.adults))
                .bind(i64::from(request.children))
                .bind(request.stay.nights())
                .bind(&code.0)
                .bind(&now)
                .bind(request.room_type.as_str())
                .execute(&self.pool)
                .await;

            match result {
                Ok(done) if done.rows_affected() == 0 => return Ok(None),
                Ok(_) => {
                    let booking = self.find_by_id(&id).await?.ok_or_else(|| {
                        RepositoryError::Decode(format!("allocated booking `{}` not found", id.0))
                    })?;
                    info!(
                        event_name = "booking.allocated",
                        booking_id = %booking.id.0,
                        room_id = %booking.room_id.0,
                        confirmation_code = %booking.confirmation_code,
                        "booking allocated"
                    );
                    return Ok(Some(booking));
                }
                Err(sqlx::Error::Database(error)) if error.is_unique_violation() => {
                    warn!(
                        event_name = "booking.code_collision",
                        attempt,
                        confirmation_code = %code,
                        "confirmation code collision, retrying"
                    );
                }
                Err(error) => return Err(error.into()),
            }
        }

        Err(RepositoryError::Conflict(format!(
            "no unique confirmation code after {MAX_CODE_ATTEMPTS} attempts"
        )))
    }

    async fn update_status(
        &self,
        id: &BookingId,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE bookings SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(next.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(&id.0)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn save(&self, booking: Booking) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO bookings (id, room_id, guest_name, guest_phone, check_in, check_out,
                                   adults, children, total_price, status, confirmation_code,
                                   created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 room_id = excluded.room_id,
                 guest_name = excluded.guest_name,
                 guest_phone = excluded.guest_phone,
                 check_in = excluded.check_in,
                 check_out = excluded.check_out,
                 adults = excluded.adults,
                 children = excluded.children,
                 total_price = excluded.total_price,
                 status = excluded.status,
                 confirmation_code = excluded.confirmation_code,
                 updated_at = excluded.updated_at",
        )
        .bind(&booking.id.0)
        .bind(&booking.room_id.0)
        .bind(&booking.guest_name)
        .bind(&booking.guest_phone)
        .bind(booking.stay.check_in_str())
        .bind(booking.stay.check_out_str())
        .bind(i64::from(booking.adults))
        .bind(i64::from(booking.children))
        .bind(booking.total_price.to_string())
        .bind(booking.status.as_str())
        .bind(&booking.confirmation_code.0)
        .bind(booking.created_at.to_rfc3339())
        .bind(booking.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use tokio::task::JoinSet;

    use horizon_core::domain::booking::{BookingStatus, ConfirmationCode, NewBooking};
    use horizon_core::domain::room::{Room, RoomId, RoomType};
    use horizon_core::domain::stay::StayDates;

    use super::SqlBookingRepository;
    use crate::repositories::{
        BookingRepository, InMemoryHotelStore, RepositoryError, RoomRepository, SqlRoomRepository,
    };
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        seed_rooms(&pool).await;
        pool
    }

    async fn seed_rooms(pool: &DbPool) {
        let rooms = SqlRoomRepository::new(pool.clone());
        for (id, room_type, number, price) in [
            ("std-1", RoomType::Standard, "201", 99),
            ("std-2", RoomType::Standard, "202", 99),
            ("ph-1", RoomType::Penthouse, "501", 499),
        ] {
            rooms
                .save(Room {
                    id: RoomId(id.to_string()),
                    room_type,
                    number: number.to_string(),
                    floor: number[..1].parse().expect("floor"),
                    price_per_night: Decimal::new(price, 0),
                    amenities: vec!["Wi-Fi".to_string()],
                })
                .await
                .expect("save room");
        }
    }

    fn request(room_type: RoomType, check_in: &str, check_out: &str) -> NewBooking {
        NewBooking {
            room_type,
            guest_name: "Sarah Chen".to_string(),
            guest_phone: "+14155555678".to_string(),
            stay: StayDates::parse(check_in, check_out).expect("stay"),
            adults: 2,
            children: 1,
        }
    }

    #[tokio::test]
    async fn allocate_prices_stay_and_picks_lowest_room_number() {
        let repo = SqlBookingRepository::new(setup().await);

        let booking = repo
            .allocate(request(RoomType::Standard, "2026-02-20", "2026-02-23"))
            .await
            .expect("allocate")
            .expect("room available");

        assert_eq!(booking.room_number, "201");
        assert_eq!(booking.total_price, Decimal::new(297, 0));
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert!(booking.confirmation_code.is_well_formed());
        assert_eq!(booking.guests(), 3);

        let by_code = repo
            .find_by_confirmation_code(&booking.confirmation_code)
            .await
            .expect("find")
            .expect("booking by code");
        assert_eq!(by_code.id, booking.id);
    }

    #[tokio::test]
    async fn cent_prices_total_the_same_in_sql_and_memory() {
        let suite = Room {
            id: RoomId("ste-1".to_string()),
            room_type: RoomType::Suite,
            number: "401".to_string(),
            floor: 4,
            price_per_night: Decimal::new(123457, 2),
            amenities: Vec::new(),
        };
        let pool = setup().await;
        SqlRoomRepository::new(pool.clone()).save(suite.clone()).await.expect("save suite");
        let sql = SqlBookingRepository::new(pool);
        let memory = InMemoryHotelStore::with_rooms(vec![suite]);

        let stay = || request(RoomType::Suite, "2026-02-20", "2026-02-27");
        let from_sql = sql.allocate(stay()).await.expect("allocate").expect("suite");
        let from_memory = memory.allocate(stay()).await.expect("allocate").expect("suite");

        assert_eq!(from_sql.total_price, Decimal::new(864199, 2));
        assert_eq!(from_sql.total_price, from_memory.total_price);
    }

    #[tokio::test]
    async fn fractional_cent_prices_are_rejected() {
        let rooms = SqlRoomRepository::new(setup().await);
        let error = rooms
            .save(Room {
                id: RoomId("ste-9".to_string()),
                room_type: RoomType::Suite,
                number: "409".to_string(),
                floor: 4,
                price_per_night: Decimal::new(10005, 3),
                amenities: Vec::new(),
            })
            .await
            .expect_err("fractional cents");
        assert!(matches!(error, RepositoryError::Domain(_)), "{error}");
    }

    #[tokio::test]
    async fn overlapping_requests_fill_then_exhaust_a_type() {
        let repo = SqlBookingRepository::new(setup().await);

        let first = repo
            .allocate(request(RoomType::Standard, "2026-02-20", "2026-02-23"))
            .await
            .expect("allocate");
        let second = repo
            .allocate(request(RoomType::Standard, "2026-02-21", "2026-02-22"))
            .await
            .expect("allocate");
        let third = repo
            .allocate(request(RoomType::Standard, "2026-02-22", "2026-02-24"))
            .await
            .expect("allocate");

        assert_eq!(first.map(|booking| booking.room_number), Some("201".to_string()));
        assert_eq!(second.map(|booking| booking.room_number), Some("202".to_string()));
        assert!(third.is_none(), "both standard rooms overlap the third stay");
    }

    #[tokio::test]
    async fn adjacent_stays_share_a_room_and_cancellation_frees_it() {
        let pool = setup().await;
        let repo = SqlBookingRepository::new(pool.clone());
        let rooms = SqlRoomRepository::new(pool);

        let first = repo
            .allocate(request(RoomType::Penthouse, "2026-02-16", "2026-02-19"))
            .await
            .expect("allocate")
            .expect("penthouse free");
        let back_to_back = repo
            .allocate(request(RoomType::Penthouse, "2026-02-19", "2026-02-21"))
            .await
            .expect("allocate");
        assert!(back_to_back.is_some(), "check-out day is bookable");

        let overlapping = StayDates::parse("2026-02-17", "2026-02-18").expect("stay");
        assert!(rooms
            .list_available(&overlapping, Some(RoomType::Penthouse))
            .await
            .expect("available")
            .is_empty());

        let cancelled = repo
            .update_status(&first.id, BookingStatus::Confirmed, BookingStatus::Cancelled)
            .await
            .expect("cancel");
        assert!(cancelled);
        assert_eq!(
            rooms
                .list_available(&overlapping, Some(RoomType::Penthouse))
                .await
                .expect("available")
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn update_status_is_compare_and_set() {
        let repo = SqlBookingRepository::new(setup().await);
        let booking = repo
            .allocate(request(RoomType::Standard, "2026-02-20", "2026-02-23"))
            .await
            .expect("allocate")
            .expect("room available");

        assert!(repo
            .update_status(&booking.id, BookingStatus::Confirmed, BookingStatus::CheckedIn)
            .await
            .expect("check in"));
        assert!(!repo
            .update_status(&booking.id, BookingStatus::Confirmed, BookingStatus::Cancelled)
            .await
            .expect("stale expectation"));

        let stored = repo.find_by_id(&booking.id).await.expect("find").expect("exists");
        assert_eq!(stored.status, BookingStatus::CheckedIn);
    }

    #[tokio::test]
    async fn list_recent_returns_newest_first() {
        let repo = SqlBookingRepository::new(setup().await);
        let older = repo
            .allocate(request(RoomType::Standard, "2026-02-20", "2026-02-23"))
            .await
            .expect("allocate")
            .expect("room");
        let mut newer = older.clone();
        newer.id.0 = "bk-newer".to_string();
        newer.room_id = RoomId("std-2".to_string());
        newer.confirmation_code = ConfirmationCode("GH-ZZZZ".to_string());
        newer.created_at = older.created_at + chrono::Duration::minutes(5);
        repo.save(newer).await.expect("save");

        let ids: Vec<String> =
            repo.list_recent().await.expect("list").into_iter().map(|b| b.id.0).collect();
        assert_eq!(ids.first().map(String::as_str), Some("bk-newer"));
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_requests_never_double_book_the_last_room() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}", dir.path().join("alloc.db").display());
        let pool = connect_with_settings(&url, 4, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        seed_rooms(&pool).await;

        let repo = Arc::new(SqlBookingRepository::new(pool));
        let mut tasks = JoinSet::new();
        for _ in 0..8 {
            let repo = Arc::clone(&repo);
            tasks.spawn(async move {
                repo.allocate(request(RoomType::Penthouse, "2026-03-01", "2026-03-03")).await
            });
        }

        let mut granted = 0;
        while let Some(joined) = tasks.join_next().await {
            if joined.expect("task").expect("allocate").is_some() {
                granted += 1;
            }
        }
        assert_eq!(granted, 1);
    }
}
