//! Inbound payloads and their field-level validation.
//!
//! Validation normalises as it checks: strings are trimmed, blank list
//! entries dropped, blank optional text collapsed to `None`. Every failing
//! field is reported at once so the caller can show them side by side.

use super::content::{ContentKind, ContentPayload, PackagingIdeaFields, RecipeFields};
use serde::{Deserialize, Serialize};
use std::fmt;

const TITLE_MIN_CHARS: usize = 3;
const TITLE_MAX_CHARS: usize = 200;
const DESCRIPTION_MAX_CHARS: usize = 500;
const USERNAME_MIN_CHARS: usize = 3;
const BIO_MAX_CHARS: usize = 500;

/// A single rejected field, safe to show to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", err.field, err.message)?;
        }
        Ok(())
    }
}

/// Submission or edit payload for a content item.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(flatten)]
    pub payload: ContentPayload,
}

/// A draft that passed validation, normalised and ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidDraft {
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub payload: ContentPayload,
}

impl ContentDraft {
    /// Validate against the kind addressed by the request.
    pub fn validate(self, kind: ContentKind) -> Result<ValidDraft, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        if self.payload.kind() != kind {
            errors.push(
                "kind",
                format!("Payload is a {} but the request targets {}", self.payload.kind(), kind),
            );
        }

        let title = self.title.trim().to_string();
        let title_len = title.chars().count();
        if title_len < TITLE_MIN_CHARS {
            errors.push("title", "Title must be at least 3 characters");
        } else if title_len > TITLE_MAX_CHARS {
            errors.push("title", "Title must be at most 200 characters");
        }

        let description = non_blank(self.description);
        if description
            .as_deref()
            .is_some_and(|d| d.chars().count() > DESCRIPTION_MAX_CHARS)
        {
            errors.push("description", "Description must be at most 500 characters");
        }

        let payload = match self.payload {
            ContentPayload::Recipe(fields) => {
                ContentPayload::Recipe(normalize_recipe(fields, &mut errors))
            }
            ContentPayload::PackagingIdea(fields) => {
                ContentPayload::PackagingIdea(normalize_packaging(fields, &mut errors))
            }
        };

        errors.into_result(ValidDraft {
            title,
            description,
            image_url: non_blank(self.image_url),
            payload,
        })
    }
}

fn normalize_recipe(fields: RecipeFields, errors: &mut ValidationErrors) -> RecipeFields {
    let ingredients = clean_list(fields.ingredients);
    if ingredients.is_empty() {
        errors.push("ingredients", "At least one ingredient is required");
    }
    let steps = clean_list(fields.steps);
    if steps.is_empty() {
        errors.push("steps", "At least one step is required");
    }
    if fields.prep_time.is_some_and(|v| v < 0) {
        errors.push("prep_time", "Prep time cannot be negative");
    }
    if fields.cook_time.is_some_and(|v| v < 0) {
        errors.push("cook_time", "Cook time cannot be negative");
    }
    if fields.servings.is_some_and(|v| v < 1) {
        errors.push("servings", "Servings must be at least 1");
    }

    let mut tags: Vec<String> = Vec::new();
    for tag in clean_list(fields.tags) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    RecipeFields {
        ingredients,
        steps,
        prep_time: fields.prep_time,
        cook_time: fields.cook_time,
        servings: fields.servings,
        tags,
    }
}

fn normalize_packaging(
    fields: PackagingIdeaFields,
    errors: &mut ValidationErrors,
) -> PackagingIdeaFields {
    let materials = clean_list(fields.materials);
    if materials.is_empty() {
        errors.push("materials", "At least one material is required");
    }
    let steps = clean_list(fields.steps);
    if steps.is_empty() {
        errors.push("steps", "At least one step is required");
    }
    PackagingIdeaFields { materials, steps }
}

/// `PUT /me/profile` body.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileUpdate {
    pub username: String,
    #[serde(default)]
    pub bio: Option<String>,
}

impl ProfileUpdate {
    pub fn validate(self) -> Result<(String, Option<String>), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let username = self.username.trim().to_string();
        if username.chars().count() < USERNAME_MIN_CHARS {
            errors.push("username", "Username must be at least 3 characters");
        }
        let bio = non_blank(self.bio);
        if bio.as_deref().is_some_and(|b| b.chars().count() > BIO_MAX_CHARS) {
            errors.push("bio", "Bio must be less than 500 characters");
        }
        errors.into_result((username, bio))
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recipe_draft(value: serde_json::Value) -> ContentDraft {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn soup_is_a_valid_recipe() {
        let draft = recipe_draft(json!({
            "kind": "recipe",
            "title": "  Soup ",
            "ingredients": ["water", "  "],
            "steps": ["boil"],
            "tags": ["quick", " quick", "", "warm"]
        }));
        let valid = draft.validate(ContentKind::Recipe).unwrap();
        assert_eq!(valid.title, "Soup");
        assert_eq!(valid.description, None);
        match valid.payload {
            ContentPayload::Recipe(fields) => {
                assert_eq!(fields.ingredients, vec!["water"]);
                assert_eq!(fields.tags, vec!["quick", "warm"]);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn reports_every_failing_field() {
        let draft = recipe_draft(json!({
            "kind": "recipe",
            "title": "ab",
            "description": "x".repeat(501),
            "ingredients": ["   "],
            "steps": [],
            "prep_time": -1,
            "servings": 0
        }));
        let errors = draft.validate(ContentKind::Recipe).unwrap_err();
        for field in ["title", "description", "ingredients", "steps", "prep_time", "servings"] {
            assert!(errors.has(field), "missing error for {field}: {errors}");
        }
        assert!(!errors.has("cook_time"));
    }

    #[test]
    fn title_length_counts_characters() {
        let draft = recipe_draft(json!({
            "kind": "packaging_idea",
            "title": "é".repeat(200),
            "materials": ["jar"],
            "steps": ["rinse"]
        }));
        assert!(draft.validate(ContentKind::PackagingIdea).is_ok());

        let draft = recipe_draft(json!({
            "kind": "packaging_idea",
            "title": "a".repeat(201),
            "materials": ["jar"],
            "steps": ["rinse"]
        }));
        assert!(draft.validate(ContentKind::PackagingIdea).unwrap_err().has("title"));
    }

    #[test]
    fn kind_must_match_route() {
        let draft = recipe_draft(json!({
            "kind": "packaging_idea",
            "title": "Planter",
            "materials": ["tin"],
            "steps": ["punch holes"]
        }));
        let errors = draft.validate(ContentKind::Recipe).unwrap_err();
        assert!(errors.has("kind"));
    }

    #[test]
    fn profile_update_rules() {
        let ok = ProfileUpdate {
            username: " cook ".into(),
            bio: Some("   ".into()),
        }
        .validate()
        .unwrap();
        assert_eq!(ok, ("cook".to_string(), None));

        let errors = ProfileUpdate {
            username: "ab".into(),
            bio: Some("b".repeat(501)),
        }
        .validate()
        .unwrap_err();
        assert!(errors.has("username") && errors.has("bio"));
    }
}
