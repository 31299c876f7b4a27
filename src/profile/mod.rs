pub mod directory;
pub mod matching;
mod storage;

use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;

pub const DEFAULT_CATEGORIES: [&str; 5] = ["Music", "Movies", "Books", "Food", "Sports"];

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_items")]
    pub items: Vec<String>,
}

impl Category {
    pub fn new(name: impl Into<String>, items: Vec<String>) -> Self {
        Category {
            name: name.into(),
            items,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub username: String,
    #[serde(
        default,
        deserialize_with = "non_empty",
        skip_serializing_if = "Option::is_none"
    )]
    pub display_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "non_empty",
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar: Option<String>,
    #[serde(default, deserialize_with = "lenient_categories")]
    pub categories: Vec<Category>,
}

impl Profile {
    pub fn new(username: impl Into<String>, categories: Vec<Category>) -> Self {
        Profile {
            username: username.into(),
            categories,
            ..Default::default()
        }
    }

    /// Name shown to other users: the display name if set, the username otherwise.
    pub fn title(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }

    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(anyhow::anyhow!("username is required"));
        }
        Ok(())
    }
}

impl Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.title(), self.username)?;
        for category in self.categories.iter() {
            write!(f, "\n{}: {}", category.name, category.items.join(", "))?;
        }
        Ok(())
    }
}

/// Submission of the profile form: one comma-separated text field per default category.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl ProfileForm {
    fn field(&self, category: &str) -> &str {
        self.fields
            .get(category)
            .or_else(|| self.fields.get(&category.to_lowercase()))
            .map(String::as_str)
            .unwrap_or_default()
    }
}

impl From<ProfileForm> for Profile {
    fn from(form: ProfileForm) -> Self {
        let categories = DEFAULT_CATEGORIES
            .iter()
            .map(|name| Category::new(*name, split_items(form.field(name))))
            .collect();
        Profile {
            username: form.username.trim().to_string(),
            display_name: some_if_not_empty(form.display_name),
            avatar: some_if_not_empty(form.avatar),
            categories,
        }
    }
}

fn split_items(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_owned())
        .collect()
}

fn some_if_not_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(some_if_not_empty))
}

fn lenient_categories<'de, D>(deserializer: D) -> Result<Vec<Category>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Category>>::deserialize(deserializer)?.unwrap_or_default())
}

// numbers and booleans are kept as text, anything else is not a preference
fn lenient_items<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    let items = values
        .into_iter()
        .filter_map(|value| match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .collect();
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_malformed_profile() {
        let profile: Profile = serde_json::from_value(json!({
            "username": "ann",
            "displayName": "",
            "categories": [
                { "name": "Music", "items": ["Rock", 42, true, null, ["x"], { "k": 1 }] },
                { "name": "Books", "items": null },
                { "name": "Food" }
            ]
        }))
        .unwrap();

        assert_eq!(profile.display_name, None);
        assert_eq!(profile.title(), "ann");
        assert_eq!(profile.categories[0].items, vec!["Rock", "42", "true"]);
        assert!(profile.categories[1].items.is_empty());
        assert!(profile.categories[2].items.is_empty());
    }

    #[test]
    fn test_deserialize_missing_categories() {
        let profile: Profile = serde_json::from_value(json!({ "username": "bob" })).unwrap();
        assert!(profile.categories.is_empty());

        let profile: Profile =
            serde_json::from_value(json!({ "username": "bob", "categories": null })).unwrap();
        assert!(profile.categories.is_empty());
    }

    #[test]
    fn test_serialize_camel_case() {
        let mut profile = Profile::new("ann", vec![Category::new("Music", vec!["Rock".into()])]);
        profile.display_name = Some("Ann".to_string());

        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["displayName"], "Ann");
        assert!(value.get("avatar").is_none());
        assert_eq!(value["categories"][0]["items"][0], "Rock");
    }

    #[test]
    fn test_form_into_profile() {
        let mut fields = BTreeMap::new();
        fields.insert("Music".to_string(), " Rock, ,Jazz ,".to_string());
        fields.insert("food".to_string(), "Sushi".to_string());
        let form = ProfileForm {
            username: " ann ".to_string(),
            display_name: "Ann".to_string(),
            avatar: " ".to_string(),
            fields,
        };

        let profile = Profile::from(form);
        assert_eq!(profile.username, "ann");
        assert_eq!(profile.display_name.as_deref(), Some("Ann"));
        assert_eq!(profile.avatar, None);

        let names: Vec<&str> = profile.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, DEFAULT_CATEGORIES);
        assert_eq!(profile.categories[0].items, vec!["Rock", "Jazz"]);
        assert!(profile.categories[1].items.is_empty());
        assert_eq!(profile.categories[3].items, vec!["Sushi"]);
    }

    #[test]
    fn test_validate_username() {
        assert!(Profile::new("ann", vec![]).validate().is_ok());
        assert!(Profile::new("  ", vec![]).validate().is_err());
    }
}
