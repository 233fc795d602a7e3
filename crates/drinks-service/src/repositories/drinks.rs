//! Drinks repository for database operations.
//!
//! # Security
//!
//! - All queries use parameterized statements (SQL injection safe)
//! - Recipes are stored as JSON text and decoded on read

use crate::errors::ApiError;
use crate::models::{Drink, DrinkChanges, Ingredient, NewDrink};
use sqlx::SqlitePool;
use tracing::instrument;

const CREATE_DRINKS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS drinks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL UNIQUE,
        recipe TEXT NOT NULL
    )
"#;

/// Drink database row.
#[derive(Debug, sqlx::FromRow)]
struct DrinkRow {
    id: i64,
    title: String,
    recipe: String,
}

impl TryFrom<DrinkRow> for Drink {
    type Error = ApiError;

    fn try_from(row: DrinkRow) -> Result<Self, Self::Error> {
        let recipe: Vec<Ingredient> = serde_json::from_str(&row.recipe).map_err(|e| {
            ApiError::Database(format!("drink {} has an unreadable recipe: {}", row.id, e))
        })?;
        Ok(Drink {
            id: row.id,
            title: row.title,
            recipe,
        })
    }
}

fn encode_recipe(recipe: &[Ingredient]) -> Result<String, ApiError> {
    serde_json::to_string(recipe).map_err(|e| {
        tracing::error!(target: "drinks.repository", error = %e, "Failed to encode recipe");
        ApiError::Internal
    })
}

/// Repository for drink operations.
pub struct DrinksRepository;

impl DrinksRepository {
    /// Create the drinks table if it does not exist.
    #[instrument(skip_all)]
    pub async fn init_schema(pool: &SqlitePool) -> Result<(), ApiError> {
        sqlx::query(CREATE_DRINKS_TABLE).execute(pool).await?;
        Ok(())
    }

    /// Drop and recreate the drinks table, seeding a single drink.
    #[instrument(skip_all)]
    pub async fn reset_with_seed(pool: &SqlitePool) -> Result<Drink, ApiError> {
        let mut tx = pool.begin().await?;
        sqlx::query("DROP TABLE IF EXISTS drinks")
            .execute(&mut *tx)
            .await?;
        sqlx::query(CREATE_DRINKS_TABLE).execute(&mut *tx).await?;
        tx.commit().await?;

        let seed = NewDrink {
            title: "water".to_string(),
            recipe: vec![Ingredient {
                name: "water".to_string(),
                color: "blue".to_string(),
                parts: 1,
            }],
        };
        let drink = Self::insert(pool, &seed).await?;

        tracing::info!(target: "drinks.repository", "Drinks table reset and seeded");
        Ok(drink)
    }

    /// List all drinks in id order.
    #[instrument(skip_all)]
    pub async fn list(pool: &SqlitePool) -> Result<Vec<Drink>, ApiError> {
        let rows: Vec<DrinkRow> =
            sqlx::query_as("SELECT id, title, recipe FROM drinks ORDER BY id")
                .fetch_all(pool)
                .await?;

        rows.into_iter().map(Drink::try_from).collect()
    }

    /// Find a drink by id.
    #[instrument(skip_all, fields(drink_id = id))]
    pub async fn find(pool: &SqlitePool, id: i64) -> Result<Option<Drink>, ApiError> {
        let row: Option<DrinkRow> =
            sqlx::query_as("SELECT id, title, recipe FROM drinks WHERE id = ?1")
                .bind(id)
                .fetch_optional(pool)
                .await?;

        row.map(Drink::try_from).transpose()
    }

    /// Insert a drink.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unprocessable` if the title is already taken.
    #[instrument(skip_all)]
    pub async fn insert(pool: &SqlitePool, drink: &NewDrink) -> Result<Drink, ApiError> {
        let row: DrinkRow = sqlx::query_as(
            "INSERT INTO drinks (title, recipe) VALUES (?1, ?2) RETURNING id, title, recipe",
        )
        .bind(&drink.title)
        .bind(encode_recipe(&drink.recipe)?)
        .fetch_one(pool)
        .await?;

        tracing::debug!(target: "drinks.repository", drink_id = row.id, "Drink inserted");
        Drink::try_from(row)
    }

    /// Apply changes to a drink. Absent fields are left unchanged.
    ///
    /// Returns `None` if no drink has this id.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unprocessable` if the new title is already taken.
    #[instrument(skip_all, fields(drink_id = id))]
    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        changes: &DrinkChanges,
    ) -> Result<Option<Drink>, ApiError> {
        let recipe = changes
            .recipe
            .as_deref()
            .map(encode_recipe)
            .transpose()?;

        let row: Option<DrinkRow> = sqlx::query_as(
            r#"
            UPDATE drinks
            SET title = COALESCE(?1, title),
                recipe = COALESCE(?2, recipe)
            WHERE id = ?3
            RETURNING id, title, recipe
            "#,
        )
        .bind(changes.title.as_deref())
        .bind(recipe)
        .bind(id)
        .fetch_optional(pool)
        .await?;

        row.map(Drink::try_from).transpose()
    }

    /// Delete a drink. Returns false if no drink has this id.
    #[instrument(skip_all, fields(drink_id = id))]
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM drinks WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Check database connectivity.
    pub async fn ping(pool: &SqlitePool) -> Result<(), ApiError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }
}
