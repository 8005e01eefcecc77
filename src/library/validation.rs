use super::error::ValidationErrors;
use super::models::{CategoryInput, CollectionInput, MediaItemInput};
use lazy_static::lazy_static;
use regex::Regex;

pub const MAX_NAME_LENGTH: usize = 255;
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;
pub const MAX_RATING: i64 = 10;

lazy_static! {
    static ref SLUG_PATTERN: Regex = Regex::new(r"^[a-z0-9-]+$").expect("Invalid slug pattern");
    static ref COLOR_PATTERN: Regex =
        Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("Invalid color pattern");
}

/// Trims `value` and turns blank strings into `None`.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_PATTERN.is_match(slug)
}

pub fn is_valid_color(color: &str) -> bool {
    COLOR_PATTERN.is_match(color)
}

fn check_length(errors: &mut ValidationErrors, field: &str, value: Option<&str>, max: usize) {
    if let Some(value) = value {
        if value.chars().count() > max {
            errors.add(
                field,
                format!("The {} may not be greater than {} characters.", field, max),
            );
        }
    }
}

/// Format checks for a category payload. Uniqueness is checked against the
/// store by the caller.
pub fn validate_category_input(input: &CategoryInput) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    let name = input.name.trim();
    if name.is_empty() {
        errors.add("name", "The name field is required.");
    }
    check_length(&mut errors, "name", Some(name), MAX_NAME_LENGTH);

    if let Some(slug) = non_blank(input.slug.as_deref()) {
        if !is_valid_slug(&slug) {
            errors.add(
                "slug",
                "The slug may only contain lowercase letters, numbers and hyphens.",
            );
        }
        check_length(&mut errors, "slug", Some(&slug), MAX_NAME_LENGTH);
    }

    check_length(
        &mut errors,
        "description",
        input.description.as_deref(),
        MAX_DESCRIPTION_LENGTH,
    );

    if let Some(color) = non_blank(input.color.as_deref()) {
        if !is_valid_color(&color) {
            errors.add("color", "The color must be a hex color like #1A2B3C.");
        }
    }

    if let Some(sort_order) = input.sort_order {
        if sort_order < 0 {
            errors.add("sort_order", "The sort order must be at least 0.");
        }
    }

    errors
}

pub fn validate_media_item_input(input: &MediaItemInput) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    let title = input.title.trim();
    if title.is_empty() {
        errors.add("title", "The title field is required.");
    }
    check_length(&mut errors, "title", Some(title), MAX_NAME_LENGTH);
    check_length(
        &mut errors,
        "category",
        input.category.as_deref(),
        MAX_NAME_LENGTH,
    );

    if let Some(rating) = input.rating {
        if !(0..=MAX_RATING).contains(&rating) {
            errors.add(
                "rating",
                format!("The rating must be between 0 and {}.", MAX_RATING),
            );
        }
    }
    if let Some(count) = input.count {
        if count < 0 {
            errors.add("count", "The count must be at least 0.");
        }
    }
    if let Some(playtime) = input.playtime_minutes {
        if playtime < 0 {
            errors.add("playtime_minutes", "The playtime must be at least 0.");
        }
    }
    if let Some(next_season) = input.next_season {
        if next_season < 1 {
            errors.add("next_season", "The next season must be at least 1.");
        }
    }
    errors
}

pub fn validate_collection_input(input: &CollectionInput) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    let name = input.name.trim();
    if name.is_empty() {
        errors.add("name", "The name field is required.");
    }
    check_length(&mut errors, "name", Some(name), MAX_NAME_LENGTH);
    check_length(
        &mut errors,
        "description",
        input.description.as_deref(),
        MAX_DESCRIPTION_LENGTH,
    );
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_requires_name() {
        let errors = validate_category_input(&CategoryInput {
            name: "   ".to_string(),
            ..Default::default()
        });
        assert!(errors.has("name"));
    }

    #[test]
    fn category_rejects_bad_slug_and_color() {
        let errors = validate_category_input(&CategoryInput {
            name: "Games".to_string(),
            slug: Some("Bad Slug!".to_string()),
            color: Some("red".to_string()),
            sort_order: Some(-1),
            ..Default::default()
        });
        assert!(errors.has("slug"));
        assert!(errors.has("color"));
        assert!(errors.has("sort_order"));
        assert!(!errors.has("name"));
    }

    #[test]
    fn category_accepts_valid_payload() {
        let errors = validate_category_input(&CategoryInput {
            name: "Board Games".to_string(),
            slug: Some("board-games".to_string()),
            description: Some("Things with dice".to_string()),
            color: Some("#a1B2c3".to_string()),
            is_active: Some(true),
            sort_order: Some(3),
        });
        assert!(errors.is_empty());
    }

    #[test]
    fn category_description_length_is_bounded() {
        let errors = validate_category_input(&CategoryInput {
            name: "Games".to_string(),
            description: Some("x".repeat(MAX_DESCRIPTION_LENGTH + 1)),
            ..Default::default()
        });
        assert!(errors.has("description"));
    }

    #[test]
    fn media_item_ranges() {
        let errors = validate_media_item_input(&MediaItemInput {
            title: "Outer Wilds".to_string(),
            rating: Some(11),
            count: Some(-1),
            next_season: Some(0),
            ..Default::default()
        });
        assert!(errors.has("rating"));
        assert!(errors.has("count"));
        assert!(errors.has("next_season"));
        assert!(!errors.has("title"));

        let errors = validate_media_item_input(&MediaItemInput::default());
        assert!(errors.has("title"));
    }

    #[test]
    fn non_blank_trims() {
        assert_eq!(non_blank(Some("  Games ")), Some("Games".to_string()));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }
}
