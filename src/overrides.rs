use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::MapGenError;
use crate::model::{Poi, PoiSource};

/// Scope name of the terrain label pass in the placement sections.
pub const SHIFTING_EARTH_SCOPE: &str = "Shifting_Earth";

const DEFAULT_KEY: &str = "Default";

/// Override key as written in `ByCoord`. A decimal point in either half
/// makes it a world coordinate; otherwise it is a pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordKey {
    World { x: f64, z: f64 },
    Pixel { px: i32, py: i32 },
}

impl CoordKey {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().trim_end_matches(',');
        let (a, b) = raw.split_once(',')?;
        let (a, b) = (a.trim(), b.trim());
        if b.contains(',') {
            return None;
        }
        if a.contains('.') || b.contains('.') {
            Some(CoordKey::World {
                x: a.parse().ok()?,
                z: b.parse().ok()?,
            })
        } else {
            Some(CoordKey::Pixel {
                px: a.parse().ok()?,
                py: b.parse().ok()?,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Left,
    Right,
    Center,
}

impl Anchor {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Anchor::Left),
            "right" => Some(Anchor::Right),
            "center" | "centre" => Some(Anchor::Center),
            _ => None,
        }
    }

    /// Horizontal center that puts the text edge at `cx` for a block `width` wide.
    pub fn apply(self, cx: i32, width: u32) -> i32 {
        let half = (width / 2) as i32;
        match self {
            Anchor::Left => cx + half,
            Anchor::Right => cx - half,
            Anchor::Center => cx,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoordOverride {
    pub key: CoordKey,
    pub dx: i32,
    pub dy: i32,
    pub anchor: Option<Anchor>,
    pub style: Option<String>,
    /// Only applies when some POI of the pattern sits at this world coordinate.
    pub requires_poi_at: Option<(f64, f64)>,
}

/// Placement settings for one scope (a POI group or the terrain labels).
#[derive(Debug, Clone, PartialEq)]
pub struct ScopePlacement {
    pub offsets: HashMap<String, (i32, i32)>,
    pub overrides: Vec<CoordOverride>,
    pub epsilon_world: f64,
    pub epsilon_px: f64,
    pub reanchors: HashMap<String, (f64, f64)>,
}

impl ScopePlacement {
    fn with_defaults(scope: &str) -> Self {
        let epsilon_world = if scope == SHIFTING_EARTH_SCOPE { 1.0 } else { 0.25 };
        Self {
            offsets: HashMap::new(),
            overrides: Vec::new(),
            epsilon_world,
            epsilon_px: 0.0,
            reanchors: HashMap::new(),
        }
    }

    pub fn offset(&self, subtype: &str) -> (i32, i32) {
        self.offsets
            .get(subtype)
            .or_else(|| self.offsets.get(DEFAULT_KEY))
            .copied()
            .unwrap_or((0, 0))
    }
}

/// `LabelOffsets`, `LabelOverrides` and `LabelReanchors`, keyed by scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacementConfig {
    scopes: HashMap<String, ScopePlacement>,
}

impl PlacementConfig {
    /// Read the three placement sections from the config root. Entries that
    /// cannot be understood are logged and skipped.
    pub fn from_root(root: &Value) -> Self {
        let mut config = Self::default();
        if let Some(Value::Object(sections)) = root.get("LabelOffsets") {
            for (scope, body) in sections {
                let offsets = parse_offsets(scope, body);
                config.scope_mut(scope).offsets = offsets;
            }
        }
        if let Some(Value::Object(sections)) = root.get("LabelOverrides") {
            for (scope, body) in sections {
                let Value::Object(body) = body else {
                    warn_malformed(&format!("LabelOverrides.{scope}"), "expected an object");
                    continue;
                };
                parse_overrides(config.scope_mut(scope), scope, body);
            }
        }
        if let Some(Value::Object(sections)) = root.get("LabelReanchors") {
            for (scope, body) in sections {
                let Value::Object(body) = body else {
                    continue;
                };
                for (subtype, raw) in body {
                    match parse_world_point(raw) {
                        Some(point) => {
                            config.scope_mut(scope).reanchors.insert(subtype.clone(), point);
                        }
                        None => warn_malformed(
                            &format!("LabelReanchors.{scope}.{subtype}"),
                            "expected {x, z}",
                        ),
                    }
                }
            }
        }
        config
    }

    fn scope_mut(&mut self, scope: &str) -> &mut ScopePlacement {
        self.scopes
            .entry(scope.to_string())
            .or_insert_with(|| ScopePlacement::with_defaults(scope))
    }

    pub fn scope(&self, scope: &str) -> Option<&ScopePlacement> {
        self.scopes.get(scope)
    }
}

fn parse_offsets(scope: &str, body: &Value) -> HashMap<String, (i32, i32)> {
    let mut offsets = HashMap::new();
    let Value::Object(map) = body else {
        warn_malformed(&format!("LabelOffsets.{scope}"), "expected an object");
        return offsets;
    };
    // A bare `{dx, dy}` section is the scope default.
    if map.contains_key("dx") || map.contains_key("dy") {
        if let Some(offset) = parse_offset(body) {
            offsets.insert(DEFAULT_KEY.to_string(), offset);
        }
        return offsets;
    }
    for (subtype, raw) in map {
        match parse_offset(raw) {
            Some(offset) => {
                offsets.insert(subtype.clone(), offset);
            }
            None => warn_malformed(
                &format!("LabelOffsets.{scope}.{subtype}"),
                "expected {dx, dy} or [dx, dy]",
            ),
        }
    }
    offsets
}

fn parse_offset(raw: &Value) -> Option<(i32, i32)> {
    match raw {
        Value::Array(items) if items.len() == 2 => Some((as_i32(&items[0])?, as_i32(&items[1])?)),
        Value::Object(map) => Some((
            map.get("dx").and_then(as_i32).unwrap_or(0),
            map.get("dy").and_then(as_i32).unwrap_or(0),
        )),
        _ => None,
    }
}

fn parse_overrides(target: &mut ScopePlacement, scope: &str, body: &Map<String, Value>) {
    let specific_world = body.get("EpsilonWorld").and_then(Value::as_f64);
    let specific_px = body.get("EpsilonPx").and_then(Value::as_f64);
    let shared = body.get("Epsilon").and_then(Value::as_f64);
    if let Some(eps) = specific_world.or(shared) {
        target.epsilon_world = eps.max(0.0);
    }
    if let Some(eps) = specific_px.or(shared) {
        target.epsilon_px = eps.max(0.0);
    }

    let Some(by_coord) = body.get("ByCoord") else {
        return;
    };
    let Value::Object(by_coord) = by_coord else {
        warn_malformed(&format!("LabelOverrides.{scope}.ByCoord"), "expected an object");
        return;
    };
    for (raw_key, raw) in by_coord {
        let entry = format!("LabelOverrides.{scope}.ByCoord[{raw_key}]");
        let Some(key) = CoordKey::parse(raw_key) else {
            warn_malformed(&entry, "key is not an \"a,b\" coordinate pair");
            continue;
        };
        let Value::Object(fields) = raw else {
            warn_malformed(&entry, "expected an object");
            continue;
        };
        let anchor = match get_ci(fields, "anchor").and_then(Value::as_str) {
            Some(text) => {
                let parsed = Anchor::parse(text);
                if parsed.is_none() {
                    warn_malformed(&entry, &format!("unknown anchor '{text}'"));
                }
                parsed
            }
            None => None,
        };
        let requires_poi_at = match get_ci(fields, "requiresPoiAt") {
            Some(raw) => match parse_world_point(raw) {
                Some(point) => Some(point),
                None => {
                    warn_malformed(&entry, "RequiresPoiAt is not a world coordinate");
                    continue;
                }
            },
            None => None,
        };
        target.overrides.push(CoordOverride {
            key,
            dx: fields.get("dx").and_then(as_i32).unwrap_or(0),
            dy: fields.get("dy").and_then(as_i32).unwrap_or(0),
            anchor,
            style: get_ci(fields, "style")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            requires_poi_at,
        });
    }
}

/// `"x,z"` or `{ "x": .., "z": .. }`.
fn parse_world_point(raw: &Value) -> Option<(f64, f64)> {
    match raw {
        Value::String(text) => match CoordKey::parse(text)? {
            CoordKey::World { x, z } => Some((x, z)),
            CoordKey::Pixel { px, py } => Some((px as f64, py as f64)),
        },
        Value::Object(map) => Some((map.get("x")?.as_f64()?, map.get("z")?.as_f64()?)),
        _ => None,
    }
}

fn get_ci<'a>(map: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    map.get(name)
        .or_else(|| map.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v))
}

fn as_i32(value: &Value) -> Option<i32> {
    value
        .as_i64()
        .map(|v| v as i32)
        .or_else(|| value.as_f64().map(|v| v.round() as i32))
}

fn warn_malformed(entry: &str, message: &str) {
    let err = MapGenError::MalformedConfig {
        entry: entry.to_string(),
        message: message.to_string(),
    };
    tracing::warn!(error = %err, "ignoring placement entry");
}

/// Final offset, anchor and style for one label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Placement {
    pub dx: i32,
    pub dy: i32,
    pub anchor: Option<Anchor>,
    pub style: Option<String>,
    pub overridden: bool,
}

pub struct OverrideResolver<'a> {
    config: &'a PlacementConfig,
    pois: &'a [Poi],
}

impl<'a> OverrideResolver<'a> {
    pub fn new(config: &'a PlacementConfig, pois: &'a [Poi]) -> Self {
        Self { config, pois }
    }

    /// Category default offset, replaced wholesale by the first override
    /// matching the world coordinate, or failing that the pixel coordinate.
    pub fn resolve(
        &self,
        scope: &str,
        subtype: &str,
        world: Option<(f64, f64)>,
        pixel: (i32, i32),
    ) -> Placement {
        let Some(placement) = self.config.scope(scope) else {
            return Placement::default();
        };
        let (dx, dy) = placement.offset(subtype);
        let fallback = Placement {
            dx,
            dy,
            ..Placement::default()
        };

        let world_hit = world.and_then(|(x, z)| {
            placement.overrides.iter().find(|o| match o.key {
                CoordKey::World { x: ox, z: oz } => {
                    within(ox, x, placement.epsilon_world)
                        && within(oz, z, placement.epsilon_world)
                        && self.condition_holds(o, placement.epsilon_world)
                }
                CoordKey::Pixel { .. } => false,
            })
        });
        let hit = world_hit.or_else(|| {
            placement.overrides.iter().find(|o| match o.key {
                CoordKey::Pixel { px, py } => {
                    within(px as f64, pixel.0 as f64, placement.epsilon_px)
                        && within(py as f64, pixel.1 as f64, placement.epsilon_px)
                        && self.condition_holds(o, placement.epsilon_world)
                }
                CoordKey::World { .. } => false,
            })
        });

        match hit {
            Some(o) => Placement {
                dx: o.dx,
                dy: o.dy,
                anchor: o.anchor,
                style: o.style.clone(),
                overridden: true,
            },
            None => fallback,
        }
    }

    /// Replacement world coordinate for a scope/subtype pair, if configured.
    pub fn reanchor(&self, scope: &str, subtype: &str) -> Option<(f64, f64)> {
        self.config.scope(scope)?.reanchors.get(subtype).copied()
    }

    fn condition_holds(&self, entry: &CoordOverride, epsilon: f64) -> bool {
        let Some((x, z)) = entry.requires_poi_at else {
            return true;
        };
        self.pois
            .iter()
            .any(|poi| within(poi.x(), x, epsilon) && within(poi.z(), z, epsilon))
    }
}

fn within(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() <= epsilon
}
