//! Filter selections and the prompt compositor.
//!
//! A selection maps attribute keys (the camelCase names the UI uses) to the
//! chosen value. The compositor turns a base description plus a selection into
//! the text sent to the gateway.

pub mod moderation;
pub mod style;

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Sentinel value the UI uses for "nothing selected".
pub const UNSET: &str = "none";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    None,
    Male,
    Female,
}

impl Gender {
    fn subject_prefix(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Male => Some("male, man"),
            Self::Female => Some("female, woman"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    #[default]
    Image,
    Gif,
    Frames,
}

impl OutputType {
    fn suffix(self) -> Option<&'static str> {
        match self {
            Self::Image => None,
            Self::Gif => Some("animated, smooth motion, realistic movement"),
            Self::Frames => Some("cinematic sequence, storyboard style, multiple perspectives"),
        }
    }
}

/// A known filter attribute: its key, the label used in the prompt, and the
/// gender it is restricted to, if any.
#[derive(Debug, Clone, Copy)]
pub struct FilterSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub only_for: Option<Gender>,
}

const fn filter(key: &'static str, label: &'static str) -> FilterSpec {
    FilterSpec {
        key,
        label,
        only_for: None,
    }
}

const fn gated(key: &'static str, label: &'static str, gender: Gender) -> FilterSpec {
    FilterSpec {
        key,
        label,
        only_for: Some(gender),
    }
}

/// Known filters in the order their clauses are appended.
pub const KNOWN_FILTERS: &[FilterSpec] = &[
    filter("hairColor", "hair color"),
    filter("hairStyle", "hair style"),
    filter("eyeColor", "eye color"),
    filter("bodyType", "body type"),
    filter("height", "height"),
    filter("clothing", "clothing"),
    filter("pose", "pose"),
    filter("background", "background"),
    filter("facialExpression", "facial expression"),
    filter("ethnicity", "ethnicity"),
    filter("age", "age"),
    gated("bustSize", "bust", Gender::Female),
    gated("breastSize", "breast size", Gender::Female),
    gated("buttSize", "butt size", Gender::Female),
    gated("musculature", "musculature", Gender::Male),
    gated("contentType", "content type", Gender::None),
    filter("armPosition", "arm position"),
    filter("viewDistance", "shot"),
    filter("cameraAngle", "camera angle"),
    filter("timeOfDay", "time of day"),
    filter("lighting", "lighting"),
];

pub fn known_filter(key: &str) -> Option<&'static FilterSpec> {
    KNOWN_FILTERS.iter().find(|spec| spec.key == key)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct FilterSelection(BTreeMap<String, String>);

impl FilterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// The selected value for `key`, or `None` when unset or holding the sentinel.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|value| value.trim())
            .filter(|value| is_set(value))
    }

    fn custom_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().filter_map(|(key, value)| {
            let value = value.trim();
            (known_filter(key).is_none() && is_set(value)).then_some((key.as_str(), value))
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FilterSelection {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

fn is_set(value: &str) -> bool {
    !value.is_empty() && !value.eq_ignore_ascii_case(UNSET)
}

fn applies_to(spec: &FilterSpec, gender: Gender) -> bool {
    spec.only_for.is_none_or(|only| only == gender)
}

/// Appends a `"<label>: <value>"` clause for every set filter to `base`.
///
/// Known filters come first in [`KNOWN_FILTERS`] order, skipping those gated
/// to another gender; custom filters follow in key order, labelled by their key.
pub fn compose_prompt(base: &str, gender: Gender, filters: &FilterSelection) -> String {
    let known = KNOWN_FILTERS
        .iter()
        .filter(|spec| applies_to(spec, gender))
        .filter_map(|spec| {
            filters
                .value(spec.key)
                .map(|value| format!("{}: {value}", spec.label))
        });
    let custom = filters
        .custom_entries()
        .map(|(key, value)| format!("{key}: {value}"));
    let clauses: Vec<String> = known.chain(custom).collect();

    if clauses.is_empty() {
        return base.to_string();
    }
    format!("{base}, {}", clauses.join(", "))
}

/// Everything the UI sends to describe one generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PromptRequest {
    pub prompt: String,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub filters: FilterSelection,
    #[serde(default)]
    pub output_type: OutputType,
}

impl PromptRequest {
    /// Base text with surrounding whitespace removed, if there is any.
    pub fn base_text(&self) -> Option<&str> {
        let trimmed = self.prompt.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    /// Subject prefix, composed filters, then the output-type suffix.
    pub fn render(&self) -> String {
        let base = self.prompt.trim();
        let base = match self.gender.subject_prefix() {
            Some(prefix) => format!("{prefix}, {base}"),
            None => base.to_string(),
        };
        let mut rendered = compose_prompt(&base, self.gender, &self.filters);
        if let Some(suffix) = self.output_type.suffix() {
            rendered.push_str(", ");
            rendered.push_str(suffix);
        }
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "portrait of an old wizard casting a spell";

    #[test]
    fn unset_filters_leave_base_unchanged() {
        let filters: FilterSelection = KNOWN_FILTERS
            .iter()
            .map(|spec| (spec.key, UNSET))
            .collect();
        for gender in [Gender::None, Gender::Male, Gender::Female] {
            assert_eq!(compose_prompt(BASE, gender, &filters), BASE);
        }
    }

    #[test]
    fn empty_and_blank_values_count_as_unset() {
        let filters = FilterSelection::new()
            .with("hairColor", "")
            .with("pose", "   ")
            .with("lighting", "NONE");
        assert_eq!(compose_prompt(BASE, Gender::None, &filters), BASE);
    }

    #[test]
    fn single_filter_appends_one_labelled_clause() {
        let filters = FilterSelection::new().with("hairColor", "silver");
        assert_eq!(
            compose_prompt(BASE, Gender::None, &filters),
            format!("{BASE}, hair color: silver")
        );
    }

    #[test]
    fn clauses_follow_table_order() {
        let filters = FilterSelection::new()
            .with("lighting", "golden hour")
            .with("eyeColor", "green")
            .with("hairColor", "red");
        assert_eq!(
            compose_prompt(BASE, Gender::None, &filters),
            format!("{BASE}, hair color: red, eye color: green, lighting: golden hour")
        );
    }

    #[test]
    fn female_only_clauses_require_female() {
        let filters = FilterSelection::new()
            .with("bustSize", "medium")
            .with("breastSize", "small");
        let female = compose_prompt(BASE, Gender::Female, &filters);
        assert!(female.contains("bust: medium"));
        assert!(female.contains("breast size: small"));
        assert_eq!(compose_prompt(BASE, Gender::Male, &filters), BASE);
        assert_eq!(compose_prompt(BASE, Gender::None, &filters), BASE);
    }

    #[test]
    fn musculature_requires_male() {
        let filters = FilterSelection::new().with("musculature", "athletic");
        assert_eq!(
            compose_prompt(BASE, Gender::Male, &filters),
            format!("{BASE}, musculature: athletic")
        );
        assert_eq!(compose_prompt(BASE, Gender::Female, &filters), BASE);
        assert_eq!(compose_prompt(BASE, Gender::None, &filters), BASE);
    }

    #[test]
    fn content_type_only_without_gender() {
        let filters = FilterSelection::new().with("contentType", "landscape");
        assert_eq!(
            compose_prompt(BASE, Gender::None, &filters),
            format!("{BASE}, content type: landscape")
        );
        assert_eq!(compose_prompt(BASE, Gender::Female, &filters), BASE);
    }

    #[test]
    fn custom_filters_follow_known_ones() {
        let filters = FilterSelection::new()
            .with("texture", "velvet")
            .with("hairColor", "black");
        assert_eq!(
            compose_prompt(BASE, Gender::None, &filters),
            format!("{BASE}, hair color: black, texture: velvet")
        );
    }

    #[test]
    fn render_adds_subject_and_output_suffix() {
        let request = PromptRequest {
            prompt: "  dancer on a stage ".to_string(),
            gender: Gender::Female,
            filters: FilterSelection::new().with("pose", "mid-leap"),
            output_type: OutputType::Gif,
        };
        assert_eq!(
            request.render(),
            "female, woman, dancer on a stage, pose: mid-leap, animated, smooth motion, realistic movement"
        );
    }

    #[test]
    fn base_text_rejects_blank_prompts() {
        let request = PromptRequest {
            prompt: " \n\t".to_string(),
            ..Default::default()
        };
        assert!(request.base_text().is_none());
    }

    #[test]
    fn selection_deserializes_from_ui_shape() {
        let json = r#"{"prompt":"x","gender":"male","filters":{"hairColor":"none","pose":"sitting"},"outputType":"frames"}"#;
        let request: PromptRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.gender, Gender::Male);
        assert_eq!(request.output_type, OutputType::Frames);
        assert_eq!(request.filters.value("pose"), Some("sitting"));
        assert_eq!(request.filters.value("hairColor"), None);
    }
}
