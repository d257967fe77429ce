use crate::classify::Group;
use crate::style::STANDARD_STYLE;

pub const NIGHT_BOSS_STYLE: &str = "poiNightBoss";
pub const DAY_PREFIX_STYLE: &str = "poiNightBossDayPrefix";

/// How one POI group is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryDescriptor {
    pub group: Group,
    pub icons: bool,
    /// Default label style; `None` means the group gets no label pass.
    pub label_style: Option<&'static str>,
    /// Names carrying `(Day 1)` / `(Day 2)` get a prefix line above the label.
    pub day_prefix: bool,
}

pub static DESCRIPTORS: [CategoryDescriptor; 6] = [
    CategoryDescriptor {
        group: Group::MajorBase,
        icons: true,
        label_style: Some(STANDARD_STYLE),
        day_prefix: false,
    },
    CategoryDescriptor {
        group: Group::MinorBase,
        icons: true,
        label_style: Some(STANDARD_STYLE),
        day_prefix: false,
    },
    CategoryDescriptor {
        group: Group::Event,
        icons: true,
        label_style: None,
        day_prefix: false,
    },
    CategoryDescriptor {
        group: Group::Evergaol,
        icons: true,
        label_style: Some(STANDARD_STYLE),
        day_prefix: false,
    },
    CategoryDescriptor {
        group: Group::FieldBoss,
        icons: true,
        label_style: Some(STANDARD_STYLE),
        day_prefix: false,
    },
    CategoryDescriptor {
        group: Group::NightBoss,
        icons: true,
        label_style: Some(NIGHT_BOSS_STYLE),
        day_prefix: true,
    },
];

pub fn descriptor(group: Group) -> &'static CategoryDescriptor {
    DESCRIPTORS
        .iter()
        .find(|d| d.group == group)
        .unwrap_or(&DESCRIPTORS[0])
}

/// `"Day 1"` / `"Day 2"` when the raw name carries the marker.
pub fn day_prefix(raw_name: &str) -> Option<&'static str> {
    if raw_name.contains("(Day 1)") {
        Some("Day 1")
    } else if raw_name.contains("(Day 2)") {
        Some("Day 2")
    } else {
        None
    }
}
