//! Discrete device-control intent resolution.
//!
//! Two phases, in fixed order:
//!
//! 1. **Vision fusion** — when the scene analyzer reports a pointing
//!    target or direction, the pointed object picks the device category
//!    and the spoken phrase only supplies the verb polarity. A vision hit
//!    always preempts keyword matching, even when the phrase names a
//!    different device ("turn on tv" while pointing at a lamp resolves to
//!    the lamp).
//! 2. **Keyword fallback** — an ordered category table scanned against
//!    both the raw-lowercased and normalized text. The scan order
//!    (lights, tv, temperature, lock) is deliberate and load-bearing: a
//!    phrase matching several categories resolves to the earliest one.
//!
//! Both tables live here as data so membership and ordering are testable
//! independently of the control flow.

use serde::{Deserialize, Serialize};

use crate::types::VisualContext;

/// Resolved device action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    LightsOn,
    LightsOff,
    LightsBrighten,
    LightsDim,
    TvOn,
    TvOff,
    VolumeUp,
    VolumeDown,
    TemperatureUp,
    TemperatureDown,
    Lock,
    Unlock,
}

/// Controllable device category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceCategory {
    Lights,
    Entertainment,
    Thermostat,
    Locks,
}

/// Which phase produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Vision,
    Keyword,
}

/// A resolved device-control intent, pending execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCandidate {
    pub action: ActionType,
    pub category: DeviceCategory,
    pub room: Option<String>,
    pub source: CandidateSource,
}

/// Pointing cue extracted from a [`VisualContext`].
#[derive(Debug, Clone, Default)]
pub struct PointingCue {
    pub target: Option<String>,
    pub direction: Option<String>,
}

impl From<&VisualContext> for PointingCue {
    fn from(ctx: &VisualContext) -> Self {
        Self {
            target: ctx.pointing_target.clone(),
            direction: ctx.pointing_direction.clone(),
        }
    }
}

/// Which device categories the household actually has configured.
///
/// Categories without devices never produce candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceAvailability {
    pub lights: bool,
    pub thermostat: bool,
    pub entertainment: bool,
    pub locks: bool,
}

impl Default for DeviceAvailability {
    fn default() -> Self {
        Self {
            lights: true,
            thermostat: true,
            entertainment: true,
            locks: true,
        }
    }
}

impl DeviceAvailability {
    /// No categories configured.
    pub fn none() -> Self {
        Self {
            lights: false,
            thermostat: false,
            entertainment: false,
            locks: false,
        }
    }

    /// Only lights configured.
    pub fn lights_only() -> Self {
        Self {
            lights: true,
            ..Self::none()
        }
    }

    fn has(&self, category: DeviceCategory) -> bool {
        match category {
            DeviceCategory::Lights => self.lights,
            DeviceCategory::Entertainment => self.entertainment,
            DeviceCategory::Thermostat => self.thermostat,
            DeviceCategory::Locks => self.locks,
        }
    }
}

// ── Tables ──────────────────────────────────────────────────────────────

/// Pointed-object vocabulary → device category.
const VISION_OBJECTS: &[(&[&str], DeviceCategory)] = &[
    (
        &["lamp", "light", "lights", "bulb", "ceiling light"],
        DeviceCategory::Lights,
    ),
    (
        &["tv", "television", "screen", "speaker", "stereo"],
        DeviceCategory::Entertainment,
    ),
    (
        &["thermostat", "heater", "radiator", "fan", "ac"],
        DeviceCategory::Thermostat,
    ),
    (&["door", "lock", "front door"], DeviceCategory::Locks),
];

/// One row of the keyword-fallback table.
struct CategoryRule {
    category: DeviceCategory,
    /// Words that select this category (token prefix match).
    triggers: &'static [&'static str],
    /// Directional sub-actions, checked in order; first marker hit wins.
    actions: &'static [(ActionType, &'static [&'static str])],
    /// Sub-action when no directional marker is present.
    default_action: ActionType,
}

/// Keyword fallback rules, scanned in this exact order. The earlier
/// category wins when a phrase matches several keyword sets.
const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        category: DeviceCategory::Lights,
        triggers: &["light", "lights", "lamp", "lamps", "bright", "dark", "dim"],
        actions: &[
            (ActionType::LightsOff, &["off", "out", "dark"]),
            (ActionType::LightsDim, &["dim", "dimmer", "soft", "lower"]),
            (ActionType::LightsBrighten, &["bright", "brighter"]),
        ],
        default_action: ActionType::LightsOn,
    },
    CategoryRule {
        category: DeviceCategory::Entertainment,
        triggers: &[
            "tv",
            "television",
            "channel",
            "volume",
            "movie",
            "show",
            "music",
        ],
        actions: &[
            (ActionType::TvOff, &["off", "stop"]),
            (ActionType::VolumeUp, &["volume up", "louder", "loud"]),
            (
                ActionType::VolumeDown,
                &["volume down", "quiet", "quieter", "softer"],
            ),
        ],
        default_action: ActionType::TvOn,
    },
    CategoryRule {
        category: DeviceCategory::Thermostat,
        triggers: &[
            "temperature",
            "thermostat",
            "warm",
            "warmer",
            "cold",
            "colder",
            "heat",
            "cool",
            "cooler",
        ],
        actions: &[(
            ActionType::TemperatureDown,
            &["cold", "colder", "cool", "cooler", "down", "lower"],
        )],
        default_action: ActionType::TemperatureUp,
    },
    CategoryRule {
        category: DeviceCategory::Locks,
        triggers: &["lock", "unlock", "door", "secure"],
        actions: &[(ActionType::Unlock, &["unlock", "open"])],
        default_action: ActionType::Lock,
    },
];

/// Room names recognized for candidate scoping; multi-word names listed
/// first so "living room" wins over a later bare "room" trigger.
const ROOM_NAMES: &[&str] = &[
    "living room",
    "dining room",
    "bedroom",
    "kitchen",
    "bathroom",
    "office",
    "garage",
    "hallway",
];

/// Common short words excluded from prefix matching. Without this,
/// "do" would select the lock category via "door" and "the" would select
/// entertainment via "television".
const PREFIX_STOPWORDS: &[&str] = &[
    "a", "i", "an", "at", "be", "do", "go", "he", "in", "is", "it", "me", "my", "no", "of", "on",
    "or", "so", "to", "up", "we", "and", "are", "but", "can", "did", "for", "had", "has", "her",
    "him", "his", "how", "its", "not", "our", "she", "the", "was", "who", "why", "you",
];

// ── Resolution ──────────────────────────────────────────────────────────

/// Resolve a device-control intent from an action phrase, optionally
/// fused with a pointing cue.
///
/// Returns `None` when neither phase produces a candidate for an
/// available device category.
pub fn resolve_action(
    raw: &str,
    normalized: &str,
    pointing: Option<&PointingCue>,
    availability: DeviceAvailability,
) -> Option<ActionCandidate> {
    let raw_lower = raw.to_lowercase();
    let norm_lower = normalized.to_lowercase();
    let room = extract_room(&raw_lower).or_else(|| extract_room(&norm_lower));

    if let Some(cue) = pointing
        && let Some(candidate) = resolve_from_vision(cue, &norm_lower, availability, room.clone())
    {
        return Some(candidate);
    }

    resolve_from_keywords(&raw_lower, &norm_lower, availability, room)
}

/// Phase 1: the pointed object picks the category, the phrase only
/// supplies the verb polarity.
fn resolve_from_vision(
    cue: &PointingCue,
    phrase: &str,
    availability: DeviceAvailability,
    room: Option<String>,
) -> Option<ActionCandidate> {
    let target = cue.target.as_deref()?.to_lowercase();

    let category = VISION_OBJECTS.iter().find_map(|&(objects, category)| {
        objects
            .iter()
            .any(|obj| target.contains(obj))
            .then_some(category)
    })?;

    if !availability.has(category) {
        return None;
    }

    let action = vision_action(category, phrase);
    Some(ActionCandidate {
        action,
        category,
        room,
        source: CandidateSource::Vision,
    })
}

/// Verb polarity for a vision-selected category: negative markers in the
/// phrase flip to the off/down/unlock action, anything else defaults on.
fn vision_action(category: DeviceCategory, phrase: &str) -> ActionType {
    let negative = ["off", "out", "stop", "down", "close"]
        .iter()
        .any(|m| contains_word(phrase, m));
    match category {
        DeviceCategory::Lights => {
            if negative {
                ActionType::LightsOff
            } else if contains_word(phrase, "dim") {
                ActionType::LightsDim
            } else {
                ActionType::LightsOn
            }
        }
        DeviceCategory::Entertainment => {
            if negative {
                ActionType::TvOff
            } else {
                ActionType::TvOn
            }
        }
        DeviceCategory::Thermostat => {
            if negative || contains_word(phrase, "cool") || contains_word(phrase, "cold") {
                ActionType::TemperatureDown
            } else {
                ActionType::TemperatureUp
            }
        }
        DeviceCategory::Locks => {
            if contains_word(phrase, "unlock") || contains_word(phrase, "open") {
                ActionType::Unlock
            } else {
                ActionType::Lock
            }
        }
    }
}

/// Phase 2: scan the ordered category table against both text forms.
fn resolve_from_keywords(
    raw_lower: &str,
    norm_lower: &str,
    availability: DeviceAvailability,
    room: Option<String>,
) -> Option<ActionCandidate> {
    for rule in CATEGORY_RULES {
        if !availability.has(rule.category) {
            continue;
        }
        let triggered = rule
            .triggers
            .iter()
            .any(|t| text_triggers(raw_lower, t) || text_triggers(norm_lower, t));
        if !triggered {
            continue;
        }

        let action = rule
            .actions
            .iter()
            .find_map(|&(action, markers)| {
                markers
                    .iter()
                    .any(|m| marker_present(raw_lower, m) || marker_present(norm_lower, m))
                    .then_some(action)
            })
            .unwrap_or(rule.default_action);

        return Some(ActionCandidate {
            action,
            category: rule.category,
            room,
            source: CandidateSource::Keyword,
        });
    }
    None
}

/// Whether any token of `text` selects `trigger`. Clipped tokens count:
/// `"li"` selects `"light"`, but stopwords never prefix-match.
fn text_triggers(text: &str, trigger: &str) -> bool {
    text.split_whitespace().any(|tok| {
        let tok = tok.trim_matches(|c: char| !c.is_alphanumeric());
        if tok == trigger {
            return true;
        }
        tok.chars().count() >= 2 && !PREFIX_STOPWORDS.contains(&tok) && trigger.starts_with(tok)
    })
}

/// Whether a directional marker appears in the text. Multi-word markers
/// match by substring, single words by whole token.
fn marker_present(text: &str, marker: &str) -> bool {
    if marker.contains(' ') {
        text.contains(marker)
    } else {
        contains_word(text, marker)
    }
}

fn contains_word(text: &str, word: &str) -> bool {
    text.split_whitespace()
        .any(|tok| tok.trim_matches(|c: char| !c.is_alphanumeric()) == word)
}

fn extract_room(text: &str) -> Option<String> {
    ROOM_NAMES
        .iter()
        .find(|name| text.contains(*name))
        .map(|name| (*name).to_owned())
}
