//! Rule-based property category classification
//!
//! Rules are evaluated in table order and the first matching rule wins, so
//! villa cues take precedence over apartment cues, which take precedence over
//! land cues.

use crate::normalize::contains_term;
use serde::{Deserialize, Serialize};

/// Closed set of categories the classifier can assign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyCategory {
    Apartment,
    Villa,
    Land,
    Unknown,
}

impl PropertyCategory {
    /// Marketplace label stored in the property type slot
    pub fn label(&self) -> Option<&'static str> {
        match self {
            PropertyCategory::Apartment => Some("آپارتمان"),
            PropertyCategory::Villa => Some("ویلا"),
            PropertyCategory::Land => Some("زمین"),
            PropertyCategory::Unknown => None,
        }
    }
}

/// One classification rule: any keyword matches unless an exclusion is present
struct CategoryRule {
    category: PropertyCategory,
    keywords: &'static [&'static str],
    excluded_by: &'static [&'static str],
}

const VILLA_KEYWORDS: &[&str] = &["ویلا", "ویلایی", "villa"];

const APARTMENT_KEYWORDS: &[&str] = &[
    "آپارتمان",
    "اپارتمان",
    "برج",
    "مجتمع مسکونی",
    "apartment",
    "flat",
];

/// Villa and apartment cues that rule out a garden reading as land
const BUILT_KEYWORDS: &[&str] = &[
    "ویلا",
    "villa",
    "آپارتمان",
    "اپارتمان",
    "apartment",
    "flat",
];

const RULES: &[CategoryRule] = &[
    CategoryRule {
        category: PropertyCategory::Villa,
        keywords: VILLA_KEYWORDS,
        excluded_by: &[],
    },
    CategoryRule {
        category: PropertyCategory::Apartment,
        keywords: APARTMENT_KEYWORDS,
        excluded_by: &[],
    },
    // "unit" alone hints at an apartment unless villa or land words appear
    CategoryRule {
        category: PropertyCategory::Apartment,
        keywords: &["واحد", "unit"],
        excluded_by: &["ویلا", "villa", "زمین", "land"],
    },
    CategoryRule {
        category: PropertyCategory::Land,
        keywords: &["زمین", "قطعه", "land", "plot"],
        excluded_by: &[],
    },
    CategoryRule {
        category: PropertyCategory::Land,
        keywords: &["باغ", "باغچه", "garden", "orchard"],
        excluded_by: BUILT_KEYWORDS,
    },
];

/// Classifies a listing from its title and description text
///
/// # Example
///
/// ```
/// use listing_harvest::normalize::{classify_property, PropertyCategory};
///
/// let category = classify_property("ویلا و آپارتمان", "");
/// assert_eq!(category, PropertyCategory::Villa);
/// ```
pub fn classify_property(title: &str, description: &str) -> PropertyCategory {
    let text = format!("{}\n{}", title, description).to_lowercase();

    RULES
        .iter()
        .find(|rule| rule.matches(&text))
        .map(|rule| rule.category)
        .unwrap_or_else(|| {
            tracing::debug!(
                "Could not classify property for title '{}'",
                title.chars().take(30).collect::<String>()
            );
            PropertyCategory::Unknown
        })
}

impl CategoryRule {
    fn matches(&self, text: &str) -> bool {
        self.keywords.iter().any(|k| contains_term(text, k))
            && !self.excluded_by.iter().any(|k| contains_term(text, k))
    }
}
