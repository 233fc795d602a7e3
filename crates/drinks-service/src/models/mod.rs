//! Drinks Service models.
//!
//! A drink is a titled recipe of colored ingredient parts. The public menu
//! shows the short representation (colors and proportions only); the detailed
//! representation adds ingredient names.

use serde::{Deserialize, Serialize};

/// Maximum drink title length in characters.
pub const MAX_TITLE_LENGTH: usize = 80;

/// One ingredient of a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    /// Ingredient name (hidden in the short representation).
    pub name: String,

    /// Display color.
    pub color: String,

    /// Proportion of the drink.
    pub parts: u32,
}

/// Ingredient as shown on the public menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientSummary {
    pub color: String,
    pub parts: u32,
}

/// Drink record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drink {
    /// Unique drink identifier.
    pub id: i64,

    /// Unique title.
    pub title: String,

    /// Recipe ingredients in order.
    pub recipe: Vec<Ingredient>,
}

/// Short representation: recipe without ingredient names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrinkSummary {
    pub id: i64,
    pub title: String,
    pub recipe: Vec<IngredientSummary>,
}

/// Long representation: full recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrinkDetail {
    pub id: i64,
    pub title: String,
    pub recipe: Vec<Ingredient>,
}

impl Drink {
    /// Public menu representation.
    pub fn short(&self) -> DrinkSummary {
        DrinkSummary {
            id: self.id,
            title: self.title.clone(),
            recipe: self
                .recipe
                .iter()
                .map(|i| IngredientSummary {
                    color: i.color.clone(),
                    parts: i.parts,
                })
                .collect(),
        }
    }

    /// Detailed representation.
    pub fn long(&self) -> DrinkDetail {
        DrinkDetail {
            id: self.id,
            title: self.title.clone(),
            recipe: self.recipe.clone(),
        }
    }
}

// ============================================================================
// API Requests
// ============================================================================

/// Recipe payload: a single ingredient object or an array of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RecipeInput {
    One(Ingredient),
    Many(Vec<Ingredient>),
}

impl RecipeInput {
    pub fn into_vec(self) -> Vec<Ingredient> {
        match self {
            RecipeInput::One(ingredient) => vec![ingredient],
            RecipeInput::Many(ingredients) => ingredients,
        }
    }
}

/// Body of `POST /drinks`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDrinkRequest {
    pub title: String,
    pub recipe: RecipeInput,
}

/// Body of `PATCH /drinks/:id`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDrinkRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub recipe: Option<RecipeInput>,
}

/// Validated new drink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDrink {
    pub title: String,
    pub recipe: Vec<Ingredient>,
}

/// Validated changes to a drink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrinkChanges {
    pub title: Option<String>,
    pub recipe: Option<Vec<Ingredient>>,
}

impl DrinkChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.recipe.is_none()
    }
}

/// Validate a drink title.
///
/// # Errors
///
/// Returns a reason when the title is blank or longer than [`MAX_TITLE_LENGTH`].
pub fn validate_title(title: &str) -> Result<String, String> {
    let title = title.trim();
    if title.is_empty() {
        return Err("title must not be empty".to_string());
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(format!("title must be at most {MAX_TITLE_LENGTH} characters"));
    }
    Ok(title.to_string())
}

/// Validate a recipe.
///
/// # Errors
///
/// Returns a reason when the recipe is empty, or an ingredient has a blank
/// name or color, or zero parts.
pub fn validate_recipe(recipe: RecipeInput) -> Result<Vec<Ingredient>, String> {
    let recipe = recipe.into_vec();
    if recipe.is_empty() {
        return Err("recipe must have at least one ingredient".to_string());
    }
    for (i, ingredient) in recipe.iter().enumerate() {
        if ingredient.name.trim().is_empty() {
            return Err(format!("ingredient {i} has no name"));
        }
        if ingredient.color.trim().is_empty() {
            return Err(format!("ingredient {i} has no color"));
        }
        if ingredient.parts == 0 {
            return Err(format!("ingredient {i} must have at least one part"));
        }
    }
    Ok(recipe)
}

impl CreateDrinkRequest {
    /// Validate into a [`NewDrink`].
    ///
    /// # Errors
    ///
    /// See [`validate_title`] and [`validate_recipe`].
    pub fn validate(self) -> Result<NewDrink, String> {
        Ok(NewDrink {
            title: validate_title(&self.title)?,
            recipe: validate_recipe(self.recipe)?,
        })
    }
}

impl UpdateDrinkRequest {
    /// Validate the fields that are present.
    ///
    /// # Errors
    ///
    /// See [`validate_title`] and [`validate_recipe`].
    pub fn validate(self) -> Result<DrinkChanges, String> {
        Ok(DrinkChanges {
            title: self.title.as_deref().map(validate_title).transpose()?,
            recipe: self.recipe.map(validate_recipe).transpose()?,
        })
    }
}

// ============================================================================
// API Responses
// ============================================================================

/// `{"success": true, "drinks": [...]}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrinksResponse<T> {
    pub success: bool,
    pub drinks: Vec<T>,
}

impl<T> DrinksResponse<T> {
    pub fn new(drinks: Vec<T>) -> Self {
        Self {
            success: true,
            drinks,
        }
    }
}

/// `{"success": true, "delete": <id>}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub delete: i64,
}

/// Readiness probe response.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,

    /// Database status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<&'static str>,

    /// Generic error message when not ready.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn water() -> Ingredient {
        Ingredient {
            name: "water".to_string(),
            color: "blue".to_string(),
            parts: 1,
        }
    }

    fn sample_drink() -> Drink {
        Drink {
            id: 7,
            title: "matcha shake".to_string(),
            recipe: vec![
                Ingredient {
                    name: "milk".to_string(),
                    color: "grey".to_string(),
                    parts: 1,
                },
                Ingredient {
                    name: "matcha".to_string(),
                    color: "green".to_string(),
                    parts: 3,
                },
            ],
        }
    }

    #[test]
    fn test_short_hides_ingredient_names() {
        let short = serde_json::to_value(sample_drink().short()).unwrap();

        assert_eq!(
            short,
            json!({
                "id": 7,
                "title": "matcha shake",
                "recipe": [
                    {"color": "grey", "parts": 1},
                    {"color": "green", "parts": 3}
                ]
            })
        );
    }

    #[test]
    fn test_long_includes_full_recipe() {
        let long = serde_json::to_value(sample_drink().long()).unwrap();

        assert_eq!(long["recipe"][1]["name"], "matcha");
        assert_eq!(long["recipe"][1]["parts"], 3);
    }

    #[test]
    fn test_recipe_input_single_object() {
        let input: RecipeInput =
            serde_json::from_value(json!({"name": "water", "color": "blue", "parts": 1})).unwrap();
        assert_eq!(input.into_vec(), vec![water()]);
    }

    #[test]
    fn test_recipe_input_array() {
        let input: RecipeInput = serde_json::from_value(json!([
            {"name": "water", "color": "blue", "parts": 1},
            {"name": "water", "color": "blue", "parts": 1}
        ]))
        .unwrap();
        assert_eq!(input.into_vec().len(), 2);
    }

    #[test]
    fn test_recipe_input_rejects_bad_shapes() {
        assert!(serde_json::from_value::<RecipeInput>(json!("water")).is_err());
        assert!(serde_json::from_value::<RecipeInput>(json!({"name": "water"})).is_err());
        assert!(
            serde_json::from_value::<RecipeInput>(json!([{"name": "w", "color": "b", "parts": -1}]))
                .is_err()
        );
    }

    #[test]
    fn test_create_request_validation() {
        let request: CreateDrinkRequest = serde_json::from_value(json!({
            "title": "  Water  ",
            "recipe": {"name": "water", "color": "blue", "parts": 1}
        }))
        .unwrap();

        let new_drink = request.validate().unwrap();
        assert_eq!(new_drink.title, "Water");
        assert_eq!(new_drink.recipe, vec![water()]);
    }

    #[test]
    fn test_validate_title() {
        assert!(validate_title("").is_err());
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LENGTH)).is_ok());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LENGTH + 1)).is_err());
        // Length is counted in characters, not bytes
        assert!(validate_title(&"é".repeat(MAX_TITLE_LENGTH)).is_ok());
    }

    #[test]
    fn test_validate_recipe() {
        assert!(validate_recipe(RecipeInput::Many(vec![])).is_err());
        assert!(validate_recipe(RecipeInput::One(Ingredient {
            parts: 0,
            ..water()
        }))
        .is_err());
        assert!(validate_recipe(RecipeInput::One(Ingredient {
            name: " ".to_string(),
            ..water()
        }))
        .is_err());
        assert!(validate_recipe(RecipeInput::One(Ingredient {
            color: String::new(),
            ..water()
        }))
        .is_err());
    }

    #[test]
    fn test_update_request_partial() {
        let request: UpdateDrinkRequest =
            serde_json::from_value(json!({"title": "Sparkling Water"})).unwrap();
        let changes = request.validate().unwrap();

        assert_eq!(changes.title.as_deref(), Some("Sparkling Water"));
        assert!(changes.recipe.is_none());
        assert!(!changes.is_empty());

        let empty = UpdateDrinkRequest::default().validate().unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_update_request_rejects_invalid_fields() {
        let request: UpdateDrinkRequest =
            serde_json::from_value(json!({"title": "", "recipe": []})).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_response_shapes() {
        let list = serde_json::to_value(DrinksResponse::new(vec![sample_drink().short()])).unwrap();
        assert_eq!(list["success"], true);
        assert_eq!(list["drinks"][0]["id"], 7);

        let delete = serde_json::to_value(DeleteResponse {
            success: true,
            delete: 7,
        })
        .unwrap();
        assert_eq!(delete, json!({"success": true, "delete": 7}));
    }
}
