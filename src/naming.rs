//! Human-readable display names for segments and intersections.
//!
//! Street names come from the road `name` property, which may be a plain
//! string, a JSON array, or a bracketed list serialized into a string such as
//! `"['Main Street', 'Broadway']"`. Junctions are named after the streets that
//! meet there: an explicit `streets` property on the node wins, otherwise the
//! names are collected from every road whose `from` or `to` endpoint is that node.

use std::collections::{BTreeSet, HashMap};

use log::debug;
use serde_json::Value;

use crate::{JunctionNode, Properties, Road, Segmentation};

pub const NAME_KEY: &str = "name";
pub const FROM_KEY: &str = "from";
pub const TO_KEY: &str = "to";

/// Split a raw street name value into individual names.
///
/// ```
/// use street_segmenter::naming::split_street_names;
///
/// assert_eq!(split_street_names("['Main St', 'Broadway']"), vec!["Main St", "Broadway"]);
/// assert_eq!(split_street_names("Main St"), vec!["Main St"]);
/// assert!(split_street_names("  ").is_empty());
/// ```
pub fn split_street_names(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') && trimmed.ends_with(']') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1]
            .split(',')
            .map(|part| part.trim().trim_matches(|c: char| c == '\'' || c == '"').trim())
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()
    } else if trimmed.is_empty() {
        vec![]
    } else {
        vec![trimmed.to_string()]
    }
}

/// Street names carried by a JSON value: a string (possibly a serialized list)
/// or an array of strings.
pub fn names_from_value(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => split_street_names(s),
        Value::Array(items) => items.iter().flat_map(names_from_value).collect(),
        _ => vec![],
    }
}

/// Street names of a road's properties.
pub fn street_names(properties: &Properties) -> Vec<String> {
    properties.get(NAME_KEY).map(names_from_value).unwrap_or_default()
}

/// Key used to look up a junction from a road endpoint property.
pub fn property_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Street names meeting at each junction, keyed by junction id.
#[derive(Debug, Clone, Default)]
pub struct JunctionNames {
    names: HashMap<String, Vec<String>>,
}

impl JunctionNames {
    pub fn build(roads: &[Road], junctions: &[JunctionNode]) -> Self {
        let mut collected: HashMap<String, BTreeSet<String>> = HashMap::new();

        for road in roads {
            let names = street_names(&road.properties);
            if names.is_empty() {
                continue;
            }
            for key in [FROM_KEY, TO_KEY] {
                if let Some(endpoint) = road.properties.get(key).and_then(property_key) {
                    collected.entry(endpoint).or_default().extend(names.iter().cloned());
                }
            }
        }

        for junction in junctions {
            let (Some(id), Some(explicit)) = (junction.junction_id(), junction.street_names())
            else {
                continue;
            };
            collected.insert(id, explicit.into_iter().collect());
        }

        Self {
            names: collected
                .into_iter()
                .map(|(id, names)| (id, names.into_iter().collect()))
                .collect(),
        }
    }

    /// Sorted, deduplicated street names at a junction; empty when unknown.
    pub fn get(&self, junction_id: &str) -> &[String] {
        self.names.get(junction_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Name an intersection after the streets of its component roads.
///
/// One street gives `"A"`, two give `"A and B"`, more give
/// `"A near B, C and D"`. No names at all give an empty string.
pub fn intersection_display_name(data: &[Properties]) -> String {
    let names: Vec<String> = data
        .iter()
        .flat_map(street_names)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    match names.as_slice() {
        [] => String::new(),
        [only] => only.clone(),
        [a, b] => format!("{} and {}", a, b),
        [first, middle @ .., last] => {
            format!("{} near {} and {}", first, middle.join(", "), last)
        }
    }
}

/// Name a segment after its street and the cross streets at its ends.
///
/// Gives `"X between A and B"` when both ends have other streets,
/// `"X from A"` with only one, and just `"X"` otherwise. Several names on one
/// side are joined with `/`. An unnamed segment gets an empty string.
pub fn segment_display_name(properties: &Properties, junctions: &JunctionNames) -> String {
    let own = street_names(properties);
    if own.is_empty() {
        return String::new();
    }

    let own_set: BTreeSet<&str> = own.iter().map(String::as_str).collect();
    let base = own_set.iter().copied().collect::<Vec<_>>().join("/");

    let ends: Vec<String> = [FROM_KEY, TO_KEY]
        .iter()
        .filter_map(|key| properties.get(*key).and_then(property_key))
        .map(|endpoint| {
            junctions
                .get(&endpoint)
                .iter()
                .filter(|name| !own_set.contains(name.as_str()))
                .cloned()
                .collect::<Vec<_>>()
                .join("/")
        })
        .filter(|side| !side.is_empty())
        .collect();

    match ends.as_slice() {
        [] => base,
        [from] => format!("{} from {}", base, from),
        [a, b, ..] => format!("{} between {} and {}", base, a, b),
    }
}

/// Fill in the display name of every segment and intersection.
pub fn apply_display_names(segmentation: &mut Segmentation, junctions: &JunctionNames) {
    let mut unnamed = 0usize;

    for segment in segmentation.segments.iter_mut() {
        segment.display_name = segment_display_name(&segment.properties, junctions);
        if segment.display_name.is_empty() {
            unnamed += 1;
        }
    }
    for intersection in segmentation.intersections.iter_mut() {
        intersection.display_name = intersection_display_name(&intersection.data);
        if intersection.display_name.is_empty() {
            unnamed += 1;
        }
    }

    debug!(
        "Named {} segments and intersections ({} unnamed)",
        segmentation.segments.len() + segmentation.intersections.len(),
        unnamed
    );
}
