use std::fmt;

use crate::model::IndexEntry;

/// Coarse POI family. Each family has its own icon boxes, offsets, overrides
/// and label style mapping in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    MajorBase,
    MinorBase,
    Event,
    Evergaol,
    FieldBoss,
    NightBoss,
}

impl Group {
    pub const ALL: [Group; 6] = [
        Group::MajorBase,
        Group::MinorBase,
        Group::Event,
        Group::Evergaol,
        Group::FieldBoss,
        Group::NightBoss,
    ];

    /// Section name used for this group throughout `appsettings.json`.
    pub fn config_key(self) -> &'static str {
        match self {
            Group::MajorBase => "MajorBase",
            Group::MinorBase => "MinorBase",
            Group::Event => "Event",
            Group::Evergaol => "Evergaol",
            Group::FieldBoss => "FieldBoss",
            Group::NightBoss => "NightBoss",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_key())
    }
}

/// Result of classifying a POI: its group plus the normalized subtype key
/// (`Camp`, `Great_Church`, `Arena_Boss`, `Scale_Bearing_Merchant`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTag {
    pub group: Group,
    pub subtype: String,
}

#[derive(Debug, Clone, Copy)]
enum Subtype {
    Fixed(&'static str),
    /// Derived from the `Detail` half of `"Type - Detail"`.
    FromDetail,
}

#[derive(Debug)]
struct CategoryRule {
    group: Group,
    subtype: Subtype,
    index_categories: &'static [&'static str],
    prefixes: &'static [&'static str],
}

// Declaration order is match order.
static CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        group: Group::MajorBase,
        subtype: Subtype::Fixed("Camp"),
        index_categories: &["Camp"],
        prefixes: &["Camp -"],
    },
    CategoryRule {
        group: Group::MajorBase,
        subtype: Subtype::Fixed("Fort"),
        index_categories: &["Fort"],
        prefixes: &["Fort -"],
    },
    CategoryRule {
        group: Group::MajorBase,
        subtype: Subtype::Fixed("Great_Church"),
        index_categories: &["Great_Church", "GreatChurch"],
        prefixes: &["Great Church -"],
    },
    CategoryRule {
        group: Group::MajorBase,
        subtype: Subtype::Fixed("Ruins"),
        index_categories: &["Ruins"],
        prefixes: &["Ruins -"],
    },
    CategoryRule {
        group: Group::MinorBase,
        subtype: Subtype::Fixed("Church"),
        index_categories: &["Church"],
        prefixes: &["Church -"],
    },
    CategoryRule {
        group: Group::MinorBase,
        subtype: Subtype::Fixed("Small_Camp"),
        index_categories: &["Small_Camp"],
        prefixes: &["Small Camp -"],
    },
    CategoryRule {
        group: Group::MinorBase,
        subtype: Subtype::Fixed("Sorcerers_Rise"),
        index_categories: &["Sorcerers_Rise"],
        prefixes: &["Sorcerers Rise -"],
    },
    CategoryRule {
        group: Group::MinorBase,
        subtype: Subtype::Fixed("Township"),
        index_categories: &["Township"],
        prefixes: &["Township -"],
    },
    CategoryRule {
        group: Group::Event,
        subtype: Subtype::FromDetail,
        index_categories: &[],
        prefixes: &["Event -"],
    },
    CategoryRule {
        group: Group::Evergaol,
        subtype: Subtype::Fixed("Default"),
        index_categories: &["Evergaol"],
        prefixes: &["Evergaol -"],
    },
    CategoryRule {
        group: Group::FieldBoss,
        subtype: Subtype::Fixed("Arena_Boss"),
        index_categories: &[],
        prefixes: &["Arena Boss -"],
    },
    CategoryRule {
        group: Group::FieldBoss,
        subtype: Subtype::Fixed("Strong_Field_Boss"),
        index_categories: &[],
        prefixes: &["Strong Field Boss -"],
    },
    CategoryRule {
        group: Group::FieldBoss,
        subtype: Subtype::Fixed("Field_Boss"),
        index_categories: &[],
        prefixes: &["Field Boss -"],
    },
    CategoryRule {
        group: Group::FieldBoss,
        subtype: Subtype::Fixed("Castle"),
        index_categories: &[],
        prefixes: &["Castle -"],
    },
    CategoryRule {
        group: Group::NightBoss,
        subtype: Subtype::Fixed("Default"),
        index_categories: &[],
        prefixes: &["Night Boss"],
    },
];

/// Classify a POI by name, preferring the category carried by its index
/// entry and falling back to the name prefix. `None` is a normal outcome.
pub fn classify(name: &str, entry: Option<&IndexEntry>) -> Option<CategoryTag> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    if let Some(category) = entry.and_then(|e| e.category.as_deref()) {
        let normalized = normalize_type(category);
        if !normalized.is_empty() {
            let hit = CATEGORY_RULES.iter().find(|rule| {
                rule.index_categories
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(&normalized))
            });
            if let Some(rule) = hit {
                return Some(tag_for(rule, name));
            }
        }
    }
    classify_by_prefix(name)
}

/// Prefix-only classification, used for names that carry no index category.
pub fn classify_by_prefix(name: &str) -> Option<CategoryTag> {
    let name = name.trim();
    for rule in CATEGORY_RULES {
        if rule.prefixes.iter().any(|p| starts_with_loose(name, p)) {
            let tag = tag_for(rule, name);
            if tag.subtype.is_empty() {
                return None;
            }
            return Some(tag);
        }
    }
    None
}

fn tag_for(rule: &CategoryRule, name: &str) -> CategoryTag {
    let subtype = match rule.subtype {
        Subtype::Fixed(s) => s.to_string(),
        Subtype::FromDetail => normalize_type(split_type_detail(name).map(|(_, d)| d).unwrap_or("")),
    };
    CategoryTag {
        group: rule.group,
        subtype,
    }
}

/// Collapse spaces and hyphens to underscores: `"Great Church"` → `Great_Church`.
pub fn normalize_type(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// Split `"Type - Detail"` on the first `" - "`.
pub fn split_type_detail(name: &str) -> Option<(&str, &str)> {
    let idx = name.find(" - ")?;
    let detail = &name[idx + 3..];
    if detail.is_empty() {
        return None;
    }
    Some((&name[..idx], detail))
}

/// Case-insensitive prefix test that treats `_` and ` ` as the same character,
/// so `"Arena_Boss -"` and `"Arena Boss -"` are one prefix.
fn starts_with_loose(name: &str, prefix: &str) -> bool {
    let mut chars = name.chars();
    for p in prefix.chars() {
        let Some(c) = chars.next() else {
            return false;
        };
        if fold(c) != fold(p) {
            return false;
        }
    }
    true
}

fn fold(c: char) -> char {
    if c == '_' { ' ' } else { c.to_ascii_lowercase() }
}
