//! Interview bookings.
//!
//! A small relational side feature served next to the RAG endpoints: a
//! visitor books an interview slot by name, email, date, and time, and the
//! list is read back newest first. Rows live in the `bookings` table of the
//! same SQLite database.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::error::{RagError, RagResult};
use crate::migrate;

const MAX_NAME_CHARS: usize = 120;
const MAX_EMAIL_CHARS: usize = 255;

/// A booking request as submitted.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub name: String,
    pub email: String,
    /// ISO date, `YYYY-MM-DD`.
    pub date: String,
    /// 24-hour time, `HH:MM`.
    pub time: String,
}

/// A stored booking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Booking {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub date: String,
    pub time: String,
    pub created_at: DateTime<Utc>,
}

impl NewBooking {
    /// Trim every field and check it, returning the normalised request.
    pub fn validated(&self) -> RagResult<NewBooking> {
        let booking = NewBooking {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            date: self.date.trim().to_string(),
            time: self.time.trim().to_string(),
        };

        if booking.name.is_empty() || booking.name.chars().count() > MAX_NAME_CHARS {
            return Err(RagError::invalid(format!(
                "name must be between 1 and {} characters",
                MAX_NAME_CHARS
            )));
        }
        if booking.email.chars().count() > MAX_EMAIL_CHARS || !is_plausible_email(&booking.email) {
            return Err(RagError::invalid(format!(
                "email is not a valid address: '{}'",
                booking.email
            )));
        }
        if NaiveDate::parse_from_str(&booking.date, "%Y-%m-%d").is_err() {
            return Err(RagError::invalid("date must be formatted YYYY-MM-DD"));
        }
        if booking.time.len() != 5 || NaiveTime::parse_from_str(&booking.time, "%H:%M").is_err() {
            return Err(RagError::invalid("time must be formatted HH:MM"));
        }
        Ok(booking)
    }
}

/// `local@domain.tld`, one `@`, no whitespace, a dot inside the domain.
fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Bookings table access over the shared pool.
#[derive(Clone)]
pub struct BookingStore {
    pool: SqlitePool,
}

impl BookingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Validate and insert a booking, returning the stored row.
    pub async fn create(&self, request: &NewBooking) -> RagResult<Booking> {
        let booking = request.validated()?;
        // Stored as microseconds; truncate so the returned row matches a re-read.
        let created_at = Utc::now().trunc_subsecs(6);
        self.insert(&booking, created_at)
            .await
            .map_err(RagError::Storage)
    }

    async fn insert(&self, booking: &NewBooking, created_at: DateTime<Utc>) -> Result<Booking> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO bookings (name, email, date, time, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&booking.name)
        .bind(&booking.email)
        .bind(&booking.date)
        .bind(&booking.time)
        .bind(created_at.timestamp_micros())
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(booking_id = id, date = %booking.date, time = %booking.time, "booking created");
        Ok(Booking {
            id,
            name: booking.name.clone(),
            email: booking.email.clone(),
            date: booking.date.clone(),
            time: booking.time.clone(),
            created_at,
        })
    }

    /// Every booking, most recently created first.
    pub async fn list(&self) -> RagResult<Vec<Booking>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, email, date, time, created_at
            FROM bookings
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RagError::Storage(e.into()))?;

        rows.iter()
            .map(|row| {
                let micros: i64 = row.get("created_at");
                let created_at = DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(|| {
                    RagError::Storage(anyhow::anyhow!("invalid booking timestamp: {}", micros))
                })?;
                Ok(Booking {
                    id: row.get("id"),
                    name: row.get("name"),
                    email: row.get("email"),
                    date: row.get("date"),
                    time: row.get("time"),
                    created_at,
                })
            })
            .collect()
    }
}

async fn open_store(config: &Config) -> Result<BookingStore> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    Ok(BookingStore::new(pool))
}

/// `ragd book`.
pub async fn run_book(config: &Config, request: &NewBooking) -> Result<()> {
    let store = open_store(config).await?;
    let booking = store.create(request).await?;

    println!("Booked #{}", booking.id);
    println!("  name:  {}", booking.name);
    println!("  email: {}", booking.email);
    println!("  slot:  {} {}", booking.date, booking.time);
    Ok(())
}

/// `ragd bookings`.
pub async fn run_bookings(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let bookings = store.list().await?;

    if bookings.is_empty() {
        println!("No bookings.");
        return Ok(());
    }
    for b in &bookings {
        println!(
            "#{} {} {} {} <{}>",
            b.id, b.date, b.time, b.name, b.email
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::run_migrations;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> BookingStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        BookingStore::new(pool)
    }

    fn request(name: &str, email: &str, date: &str, time: &str) -> NewBooking {
        NewBooking {
            name: name.to_string(),
            email: email.to_string(),
            date: date.to_string(),
            time: time.to_string(),
        }
    }

    #[test]
    fn test_validation() {
        assert!(request("Ada", "ada@example.com", "2025-11-01", "14:30")
            .validated()
            .is_ok());

        let cases = [
            request("", "ada@example.com", "2025-11-01", "14:30"),
            request(&"x".repeat(121), "ada@example.com", "2025-11-01", "14:30"),
            request("Ada", "ada.example.com", "2025-11-01", "14:30"),
            request("Ada", "ada@localhost", "2025-11-01", "14:30"),
            request("Ada", "a da@example.com", "2025-11-01", "14:30"),
            request("Ada", "ada@example.com", "2025-13-01", "14:30"),
            request("Ada", "ada@example.com", "01/11/2025", "14:30"),
            request("Ada", "ada@example.com", "2025-11-01", "25:00"),
            request("Ada", "ada@example.com", "2025-11-01", "2:30pm"),
        ];
        for case in cases {
            let err = case.validated().unwrap_err();
            assert!(err.is_client_fault(), "{:?} should be rejected", case);
        }
    }

    #[test]
    fn test_validation_trims_fields() {
        let booking = request("  Ada  ", " ada@example.com ", " 2025-11-01", "14:30 ")
            .validated()
            .unwrap();
        assert_eq!(booking.name, "Ada");
        assert_eq!(booking.email, "ada@example.com");
        assert_eq!(booking.date, "2025-11-01");
        assert_eq!(booking.time, "14:30");
    }

    #[tokio::test]
    async fn test_create_then_list_newest_first() {
        let store = store().await;
        assert!(store.list().await.unwrap().is_empty());

        let first = store
            .create(&request("Ada", "ada@example.com", "2025-11-01", "09:00"))
            .await
            .unwrap();
        let second = store
            .create(&request("Grace", "grace@example.com", "2025-11-02", "10:30"))
            .await
            .unwrap();
        assert!(second.id > first.id);

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "Grace");
        assert_eq!(listed[1].name, "Ada");
        assert_eq!(listed[1].id, first.id);
        assert_eq!(listed[1].created_at, first.created_at);
    }

    #[tokio::test]
    async fn test_invalid_booking_not_stored() {
        let store = store().await;
        let err = store
            .create(&request("Ada", "not-an-email", "2025-11-01", "09:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
        assert!(store.list().await.unwrap().is_empty());
    }
}
