use serde::{Deserialize, Serialize};

/// A recipe as returned by the search API.
///
/// `uri` is the stable identifier used as primary key in result sets and in
/// the favorites store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub uri: String,
    pub label: String,
    pub image: String,
    pub ingredient_lines: Vec<String>,
    pub calories: f64,
    /// Link to the full instructions; may be empty
    pub url: String,
}

impl Recipe {
    /// Compare by identifier only
    pub fn same_identity(&self, other: &Recipe) -> bool {
        self.uri == other.uri
    }
}

/// One page of search results
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PaginatedRecipes {
    pub recipes: Vec<Recipe>,
    /// Page to request next, `None` once the last page was reached
    pub next_page: Option<u32>,
    /// Total number of matches reported by the API
    pub total_results: u64,
}

impl PaginatedRecipes {
    pub fn has_next_page(&self) -> bool {
        self.next_page.is_some()
    }
}

#[cfg(test)]
pub(crate) fn sample_recipe(uri: &str) -> Recipe {
    Recipe {
        uri: uri.to_string(),
        label: format!("Recipe {}", uri),
        image: format!("https://img.example.com/{}.jpg", uri),
        ingredient_lines: vec!["1 cup rice".to_string(), "2 chicken breasts".to_string()],
        calories: 512.5,
        url: format!("https://example.com/recipes/{}", uri),
    }
}
