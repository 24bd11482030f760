use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Row};
use std::time::Duration;
use uuid::Uuid;

use crate::core::occupancy;
use crate::error::OccupancyError;
use crate::models::{
    AdmitCommand, AssignmentStatus, BedAssignment, DischargeTarget, Eligibility, NewPerson, NewShelter, Person,
    Shelter, ShelterPatch,
};
use crate::services::store::OccupancyStore;

/// Assignment status as stored in the `assignment_status` enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "assignment_status", rename_all = "lowercase")]
pub enum StatusColumn {
    Active,
    Released,
}

impl From<AssignmentStatus> for StatusColumn {
    fn from(value: AssignmentStatus) -> Self {
        match value {
            AssignmentStatus::Active => StatusColumn::Active,
            AssignmentStatus::Released => StatusColumn::Released,
        }
    }
}

impl From<StatusColumn> for AssignmentStatus {
    fn from(value: StatusColumn) -> Self {
        match value {
            StatusColumn::Active => AssignmentStatus::Active,
            StatusColumn::Released => AssignmentStatus::Released,
        }
    }
}

const SHELTER_COLUMNS: &str = "id, title, description, address, phone, website, latitude, longitude, \
     total_beds, open_beds, families, single_women, single_men, domestic_violence, pet_friendly, \
     wheelchair_accessible, age_min, age_max, created_at, updated_at";

const PERSON_COLUMNS: &str = "id, full_name, phone, email, date_of_birth, created_at";

const ASSIGNMENT_COLUMNS: &str =
    "id, shelter_id, person_id, bed_number, notes, status, assigned_at, released_at";

/// PostgreSQL-backed occupancy store
///
/// Every mutation runs in one transaction. Rows are locked in a fixed order
/// (shelter, then person, then assignment) so concurrent admits and
/// discharges serialize without deadlocking.
pub struct PgOccupancyStore {
    pool: PgPool,
}

impl PgOccupancyStore {
    /// Create a new store from a connection string and run migrations
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, OccupancyError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new store from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, OccupancyError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }
}

fn shelter_from_row(row: &PgRow) -> Result<Shelter, sqlx::Error> {
    Ok(Shelter {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        address: row.try_get("address")?,
        phone: row.try_get("phone")?,
        website: row.try_get("website")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        total_beds: row.try_get("total_beds")?,
        open_beds: row.try_get("open_beds")?,
        eligibility: Eligibility {
            families: row.try_get("families")?,
            single_women: row.try_get("single_women")?,
            single_men: row.try_get("single_men")?,
            domestic_violence: row.try_get("domestic_violence")?,
            pet_friendly: row.try_get("pet_friendly")?,
            wheelchair_accessible: row.try_get("wheelchair_accessible")?,
        },
        age_min: row.try_get("age_min")?,
        age_max: row.try_get("age_max")?,
        created_at: Some(row.try_get("created_at")?),
        updated_at: Some(row.try_get("updated_at")?),
    })
}

fn person_from_row(row: &PgRow) -> Result<Person, sqlx::Error> {
    Ok(Person {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        date_of_birth: row.try_get("date_of_birth")?,
        created_at: Some(row.try_get("created_at")?),
    })
}

fn assignment_from_row(row: &PgRow) -> Result<BedAssignment, sqlx::Error> {
    let status: StatusColumn = row.try_get("status")?;
    Ok(BedAssignment {
        id: row.try_get("id")?,
        shelter_id: row.try_get("shelter_id")?,
        person_id: row.try_get("person_id")?,
        bed_number: row.try_get("bed_number")?,
        notes: row.try_get("notes")?,
        status: status.into(),
        assigned_at: row.try_get("assigned_at")?,
        released_at: row.try_get("released_at")?,
    })
}

/// Escape LIKE wildcards in user input
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Row-lock a shelter for the rest of the transaction
async fn lock_shelter(conn: &mut PgConnection, id: Uuid) -> Result<Option<Shelter>, OccupancyError> {
    let query = format!("SELECT {} FROM shelters WHERE id = $1 FOR UPDATE", SHELTER_COLUMNS);
    let row = sqlx::query(&query).bind(id).fetch_optional(&mut *conn).await?;
    Ok(row.as_ref().map(shelter_from_row).transpose()?)
}

async fn active_count(conn: &mut PgConnection, shelter_id: Uuid) -> Result<i64, OccupancyError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM bed_assignments WHERE shelter_id = $1 AND status = 'active'",
    )
    .bind(shelter_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}

async fn active_for_person(
    conn: &mut PgConnection,
    person_id: Uuid,
) -> Result<Option<BedAssignment>, OccupancyError> {
    let query = format!(
        "SELECT {} FROM bed_assignments WHERE person_id = $1 AND status = 'active' LIMIT 1",
        ASSIGNMENT_COLUMNS
    );
    let row = sqlx::query(&query).bind(person_id).fetch_optional(&mut *conn).await?;
    Ok(row.as_ref().map(assignment_from_row).transpose()?)
}

/// Insert or overwrite a shelter row with already-validated values
async fn save_shelter(conn: &mut PgConnection, shelter: &Shelter) -> Result<Shelter, OccupancyError> {
    let query = format!(
        r#"
        INSERT INTO shelters ({cols})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18,
                COALESCE($19, NOW()), COALESCE($20, NOW()))
        ON CONFLICT (id) DO UPDATE SET
            title = EXCLUDED.title,
            description = EXCLUDED.description,
            address = EXCLUDED.address,
            phone = EXCLUDED.phone,
            website = EXCLUDED.website,
            latitude = EXCLUDED.latitude,
            longitude = EXCLUDED.longitude,
            total_beds = EXCLUDED.total_beds,
            open_beds = EXCLUDED.open_beds,
            families = EXCLUDED.families,
            single_women = EXCLUDED.single_women,
            single_men = EXCLUDED.single_men,
            domestic_violence = EXCLUDED.domestic_violence,
            pet_friendly = EXCLUDED.pet_friendly,
            wheelchair_accessible = EXCLUDED.wheelchair_accessible,
            age_min = EXCLUDED.age_min,
            age_max = EXCLUDED.age_max,
            updated_at = EXCLUDED.updated_at
        RETURNING {cols}
        "#,
        cols = SHELTER_COLUMNS
    );

    let row = sqlx::query(&query)
        .bind(shelter.id)
        .bind(&shelter.title)
        .bind(&shelter.description)
        .bind(&shelter.address)
        .bind(&shelter.phone)
        .bind(&shelter.website)
        .bind(shelter.latitude)
        .bind(shelter.longitude)
        .bind(shelter.total_beds)
        .bind(shelter.open_beds)
        .bind(shelter.eligibility.families)
        .bind(shelter.eligibility.single_women)
        .bind(shelter.eligibility.single_men)
        .bind(shelter.eligibility.domestic_violence)
        .bind(shelter.eligibility.pet_friendly)
        .bind(shelter.eligibility.wheelchair_accessible)
        .bind(shelter.age_min)
        .bind(shelter.age_max)
        .bind(shelter.created_at)
        .bind(shelter.updated_at)
        .fetch_one(&mut *conn)
        .await?;

    Ok(shelter_from_row(&row)?)
}

async fn write_open_beds(conn: &mut PgConnection, shelter_id: Uuid, open_beds: i32) -> Result<(), OccupancyError> {
    sqlx::query("UPDATE shelters SET open_beds = $2, updated_at = NOW() WHERE id = $1")
        .bind(shelter_id)
        .bind(open_beds)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[async_trait]
impl OccupancyStore for PgOccupancyStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    /// Health check for the database connection
    async fn health_check(&self) -> Result<bool, OccupancyError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }

    async fn upsert_shelter(&self, id: Uuid, fields: NewShelter) -> Result<Shelter, OccupancyError> {
        let mut tx = self.pool.begin().await?;

        let existing = lock_shelter(&mut tx, id).await?;
        let active = active_count(&mut tx, id).await?;
        let shelter = occupancy::build_shelter(id, &fields, active, existing.as_ref(), Utc::now())?;
        let saved = save_shelter(&mut tx, &shelter).await?;

        tx.commit().await?;
        tracing::debug!("Upserted shelter {} ({} beds)", id, saved.total_beds);
        Ok(saved)
    }

    async fn update_shelter(&self, id: Uuid, patch: ShelterPatch) -> Result<Shelter, OccupancyError> {
        let mut tx = self.pool.begin().await?;

        let current = lock_shelter(&mut tx, id)
            .await?
            .ok_or_else(|| OccupancyError::shelter_not_found(id))?;
        let active = active_count(&mut tx, id).await?;
        let updated = occupancy::apply_patch(&current, &patch, active, Utc::now())?;
        let saved = save_shelter(&mut tx, &updated).await?;

        tx.commit().await?;
        Ok(saved)
    }

    async fn reconcile_shelter(&self, id: Uuid) -> Result<Shelter, OccupancyError> {
        let mut tx = self.pool.begin().await?;

        let current = lock_shelter(&mut tx, id)
            .await?
            .ok_or_else(|| OccupancyError::shelter_not_found(id))?;
        let active = active_count(&mut tx, id).await?;
        let saved = save_shelter(&mut tx, &occupancy::reconcile(&current, active)).await?;

        tx.commit().await?;
        Ok(saved)
    }

    async fn get_shelter(&self, id: Uuid) -> Result<Option<Shelter>, OccupancyError> {
        let query = format!("SELECT {} FROM shelters WHERE id = $1", SHELTER_COLUMNS);
        let row = sqlx::query(&query).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(shelter_from_row).transpose()?)
    }

    async fn list_shelters(&self) -> Result<Vec<Shelter>, OccupancyError> {
        let query = format!("SELECT {} FROM shelters ORDER BY title, id", SHELTER_COLUMNS);
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let shelters: Result<Vec<Shelter>, _> = rows.iter().map(shelter_from_row).collect();
        Ok(shelters?)
    }

    async fn find_or_create_person(&self, person: NewPerson) -> Result<Person, OccupancyError> {
        let person = person.normalized();
        if person.full_name.is_empty() {
            return Err(OccupancyError::Validation("fullName is required".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        // Serialize concurrent find-or-create calls for the same name
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&person.full_name)
            .execute(&mut *tx)
            .await?;

        let lookup = format!(
            r#"
            SELECT {}
            FROM persons
            WHERE full_name = $1
              AND (($2::text IS NULL AND $3::text IS NULL) OR phone = $2 OR email = $3)
            ORDER BY created_at, id
            LIMIT 1
            "#,
            PERSON_COLUMNS
        );
        let existing = sqlx::query(&lookup)
            .bind(&person.full_name)
            .bind(&person.phone)
            .bind(&person.email)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some(row) = existing {
            tx.commit().await?;
            return Ok(person_from_row(&row)?);
        }

        let insert = format!(
            r#"
            INSERT INTO persons (id, full_name, phone, email, date_of_birth, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING {}
            "#,
            PERSON_COLUMNS
        );
        let row = sqlx::query(&insert)
            .bind(Uuid::new_v4())
            .bind(&person.full_name)
            .bind(&person.phone)
            .bind(&person.email)
            .bind(person.date_of_birth)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(person_from_row(&row)?)
    }

    async fn get_person(&self, id: Uuid) -> Result<Option<Person>, OccupancyError> {
        let query = format!("SELECT {} FROM persons WHERE id = $1", PERSON_COLUMNS);
        let row = sqlx::query(&query).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(person_from_row).transpose()?)
    }

    async fn search_persons(&self, query: &str, limit: usize) -> Result<Vec<Person>, OccupancyError> {
        let sql = format!(
            "SELECT {} FROM persons WHERE full_name ILIKE $1 ORDER BY full_name, id LIMIT $2",
            PERSON_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(like_pattern(query.trim()))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        let persons: Result<Vec<Person>, _> = rows.iter().map(person_from_row).collect();
        Ok(persons?)
    }

    async fn find_active_assignment(&self, person_id: Uuid) -> Result<Option<BedAssignment>, OccupancyError> {
        let mut conn = self.pool.acquire().await?;
        active_for_person(&mut conn, person_id).await
    }

    async fn list_active_assignments(&self, shelter_id: Uuid) -> Result<Vec<BedAssignment>, OccupancyError> {
        if self.get_shelter(shelter_id).await?.is_none() {
            return Err(OccupancyError::shelter_not_found(shelter_id));
        }

        let query = format!(
            "SELECT {} FROM bed_assignments WHERE shelter_id = $1 AND status = 'active' ORDER BY assigned_at DESC, id",
            ASSIGNMENT_COLUMNS
        );
        let rows = sqlx::query(&query).bind(shelter_id).fetch_all(&self.pool).await?;

        let assignments: Result<Vec<BedAssignment>, _> = rows.iter().map(assignment_from_row).collect();
        Ok(assignments?)
    }

    async fn list_active_occupants(&self, shelter_id: Uuid) -> Result<Vec<Person>, OccupancyError> {
        if self.get_shelter(shelter_id).await?.is_none() {
            return Err(OccupancyError::shelter_not_found(shelter_id));
        }

        let query = r#"
            SELECT p.id, p.full_name, p.phone, p.email, p.date_of_birth, p.created_at
            FROM bed_assignments ba
            JOIN persons p ON p.id = ba.person_id
            WHERE ba.shelter_id = $1 AND ba.status = 'active'
            ORDER BY ba.assigned_at DESC, ba.id
        "#;
        let rows = sqlx::query(query).bind(shelter_id).fetch_all(&self.pool).await?;

        let persons: Result<Vec<Person>, _> = rows.iter().map(person_from_row).collect();
        Ok(persons?)
    }

    async fn admit(&self, shelter_id: Uuid, command: AdmitCommand) -> Result<BedAssignment, OccupancyError> {
        let mut tx = self.pool.begin().await?;

        let shelter = lock_shelter(&mut tx, shelter_id)
            .await?
            .ok_or_else(|| OccupancyError::shelter_not_found(shelter_id))?;

        let person_locked = sqlx::query("SELECT id FROM persons WHERE id = $1 FOR UPDATE")
            .bind(command.person_id)
            .fetch_optional(&mut *tx)
            .await?;
        if person_locked.is_none() {
            return Err(OccupancyError::person_not_found(command.person_id));
        }

        let existing = active_for_person(&mut tx, command.person_id).await?;
        let active = active_count(&mut tx, shelter_id).await?;
        occupancy::check_admission(&shelter, active, existing.as_ref())?;

        let assignment = occupancy::new_assignment(shelter_id, &command, Utc::now());
        let insert = format!(
            r#"
            INSERT INTO bed_assignments ({cols})
            VALUES ($1, $2, $3, $4, $5, $6, $7, NULL)
            RETURNING {cols}
            "#,
            cols = ASSIGNMENT_COLUMNS
        );
        let row = sqlx::query(&insert)
            .bind(assignment.id)
            .bind(assignment.shelter_id)
            .bind(assignment.person_id)
            .bind(&assignment.bed_number)
            .bind(&assignment.notes)
            .bind(StatusColumn::from(assignment.status))
            .bind(assignment.assigned_at)
            .fetch_one(&mut *tx)
            .await?;

        write_open_beds(&mut tx, shelter_id, occupancy::open_beds_for(shelter.total_beds, active + 1)).await?;

        tx.commit().await?;
        Ok(assignment_from_row(&row)?)
    }

    async fn discharge(&self, shelter_id: Uuid, target: DischargeTarget) -> Result<BedAssignment, OccupancyError> {
        let mut tx = self.pool.begin().await?;

        let shelter = lock_shelter(&mut tx, shelter_id)
            .await?
            .ok_or_else(|| OccupancyError::shelter_not_found(shelter_id))?;

        let row = match &target {
            DischargeTarget::AssignmentId(id) => {
                let query = format!(
                    "SELECT {} FROM bed_assignments WHERE id = $1 AND shelter_id = $2 AND status = 'active' FOR UPDATE",
                    ASSIGNMENT_COLUMNS
                );
                sqlx::query(&query)
                    .bind(id)
                    .bind(shelter_id)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            DischargeTarget::PersonId(person_id) => {
                let query = format!(
                    "SELECT {} FROM bed_assignments WHERE person_id = $1 AND shelter_id = $2 AND status = 'active' FOR UPDATE",
                    ASSIGNMENT_COLUMNS
                );
                sqlx::query(&query)
                    .bind(person_id)
                    .bind(shelter_id)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            DischargeTarget::PersonName(name) => {
                let query = r#"
                    SELECT ba.id, ba.shelter_id, ba.person_id, ba.bed_number, ba.notes,
                           ba.status, ba.assigned_at, ba.released_at
                    FROM bed_assignments ba
                    JOIN persons p ON p.id = ba.person_id
                    WHERE p.full_name = $1 AND ba.shelter_id = $2 AND ba.status = 'active'
                    ORDER BY ba.assigned_at, ba.id
                    LIMIT 1
                    FOR UPDATE OF ba
                "#;
                sqlx::query(query)
                    .bind(name)
                    .bind(shelter_id)
                    .fetch_optional(&mut *tx)
                    .await?
            }
        };

        let current = match row {
            Some(row) => assignment_from_row(&row)?,
            None => {
                return Err(OccupancyError::NotFound(format!(
                    "active assignment at shelter {}",
                    shelter_id
                )))
            }
        };

        let released = occupancy::release(&current, Utc::now())?;
        sqlx::query("UPDATE bed_assignments SET status = $2, released_at = $3 WHERE id = $1")
            .bind(released.id)
            .bind(StatusColumn::from(released.status))
            .bind(released.released_at)
            .execute(&mut *tx)
            .await?;

        let active = active_count(&mut tx, shelter_id).await?;
        write_open_beds(&mut tx, shelter_id, occupancy::open_beds_for(shelter.total_beds, active)).await?;

        tx.commit().await?;
        Ok(released)
    }
}
