//! Decoding of the search API envelope.
//!
//! The body is parsed into a [`serde_json::Value`] first and then walked by
//! hand so that every failure names the exact path of the offending value
//! (`hits[0].recipe.calories`) and the kind of mismatch.

use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::model::Recipe;

/// Decoded `{ "hits": [...], "count": n }` envelope
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeResponse {
    pub recipes: Vec<Recipe>,
    pub count: u64,
}

pub fn decode_response(body: &[u8]) -> Result<RecipeResponse, DecodeError> {
    let root: Value =
        serde_json::from_slice(body).map_err(|e| DecodeError::corrupted(e.to_string()))?;
    let root = as_object(&root, "")?;

    let hits = required(root, "", "hits")?;
    let hits = hits
        .as_array()
        .ok_or_else(|| DecodeError::mismatch("hits", "array", type_name(hits)))?;

    let mut recipes = Vec::with_capacity(hits.len());
    for (index, hit) in hits.iter().enumerate() {
        let hit_path = format!("hits[{}]", index);
        let hit = as_object(hit, &hit_path)?;
        let recipe = required(hit, &hit_path, "recipe")?;
        let recipe_path = format!("{}.recipe", hit_path);
        recipes.push(decode_recipe(as_object(recipe, &recipe_path)?, &recipe_path)?);
    }

    let count = required(root, "", "count")?;
    let count = count
        .as_u64()
        .ok_or_else(|| DecodeError::mismatch("count", "unsigned integer", type_name(count)))?;

    Ok(RecipeResponse { recipes, count })
}

fn decode_recipe(object: &Map<String, Value>, path: &str) -> Result<Recipe, DecodeError> {
    let calories = number_field(object, path, "calories")?;
    if calories < 0.0 {
        return Err(DecodeError::mismatch(
            join(path, "calories"),
            "non-negative number",
            "negative number",
        ));
    }

    let uri = string_field(object, path, "uri")?;
    if uri.trim().is_empty() {
        return Err(DecodeError::mismatch(
            join(path, "uri"),
            "non-empty string",
            "empty string",
        ));
    }

    Ok(Recipe {
        uri,
        label: string_field(object, path, "label")?,
        image: string_field(object, path, "image")?,
        ingredient_lines: string_array_field(object, path, "ingredientLines")?,
        calories,
        url: string_field(object, path, "url")?,
    })
}

fn string_field(object: &Map<String, Value>, path: &str, key: &str) -> Result<String, DecodeError> {
    let value = non_null(object, path, key, "string")?;
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| DecodeError::mismatch(join(path, key), "string", type_name(value)))
}

fn number_field(object: &Map<String, Value>, path: &str, key: &str) -> Result<f64, DecodeError> {
    let value = non_null(object, path, key, "number")?;
    value
        .as_f64()
        .ok_or_else(|| DecodeError::mismatch(join(path, key), "number", type_name(value)))
}

fn string_array_field(
    object: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<Vec<String>, DecodeError> {
    let value = non_null(object, path, key, "array")?;
    let field_path = join(path, key);
    let items = value
        .as_array()
        .ok_or_else(|| DecodeError::mismatch(field_path.clone(), "array", type_name(value)))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                DecodeError::mismatch(format!("{}[{}]", field_path, i), "string", type_name(item))
            })
        })
        .collect()
}

fn required<'a>(
    object: &'a Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<&'a Value, DecodeError> {
    object
        .get(key)
        .ok_or_else(|| DecodeError::missing(join(path, key)))
}

fn non_null<'a>(
    object: &'a Map<String, Value>,
    path: &str,
    key: &str,
    expected: &'static str,
) -> Result<&'a Value, DecodeError> {
    match required(object, path, key)? {
        Value::Null => Err(DecodeError::null(join(path, key), expected)),
        value => Ok(value),
    }
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, DecodeError> {
    value
        .as_object()
        .ok_or_else(|| DecodeError::mismatch(path, "object", type_name(value)))
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
