//! Classification of created objects into a stable naming scheme.
//!
//! One resolution pass walks the created-object list of a confirmed
//! transaction, parses each type string and asks an ordered rule list for a
//! label. The result is the label -> object-id map persisted in deployment
//! reports and read back later as a local address book. Resolution never
//! fails a run: objects outside the grammar are skipped and reported in the
//! unresolved list, objects matching no rule are dropped.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};

use crate::effects::CreatedObject;
use crate::type_tag::TypeTag;

/// Label for the package object itself.
pub const PACKAGE_LABEL: &str = "package";

/// One classification rule. Rules are evaluated in list order against each
/// parsed tag; the first rule that yields a label wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationRule {
    /// The `package` sentinel reported for the package object itself.
    PackageSentinel,
    /// Exact match on a known capability/administrative type, labeled
    /// `module::Name`.
    Capability {
        address: String,
        module: String,
        name: String,
    },
    /// Generic metadata wrapper labeled after its first type argument, e.g.
    /// `Display<item::Item>`. A wrapper without a struct argument yields no
    /// label and falls through.
    MetadataWrapper {
        address: String,
        module: String,
        name: String,
    },
    /// Everything else labels as `module::Name`.
    Fallback,
}

impl ClassificationRule {
    pub fn capability(
        address: impl Into<String>,
        module: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        ClassificationRule::Capability {
            address: address.into(),
            module: module.into(),
            name: name.into(),
        }
    }

    pub fn metadata_wrapper(
        address: impl Into<String>,
        module: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        ClassificationRule::MetadataWrapper {
            address: address.into(),
            module: module.into(),
            name: name.into(),
        }
    }

    fn label(&self, tag: &TypeTag) -> Option<String> {
        match self {
            ClassificationRule::PackageSentinel => match tag {
                TypeTag::Package => Some(PACKAGE_LABEL.to_string()),
                TypeTag::Struct(_) => None,
            },
            ClassificationRule::Capability {
                address,
                module,
                name,
            } => {
                let s = tag.as_struct()?;
                s.is(address, module, name).then(|| s.qualified_name())
            }
            ClassificationRule::MetadataWrapper {
                address,
                module,
                name,
            } => {
                let s = tag.as_struct()?;
                if !s.is(address, module, name) {
                    return None;
                }
                let inner = s.first_generic()?.as_struct()?;
                Some(format!("{}<{}>", s.name, inner.qualified_name()))
            }
            ClassificationRule::Fallback => tag.as_struct().map(|s| s.qualified_name()),
        }
    }
}

/// The stock rule list for package deployments: the package object, the
/// framework publisher and upgrade capabilities, display wrappers, then
/// everything else by `module::Name`.
pub fn default_rules() -> Vec<ClassificationRule> {
    vec![
        ClassificationRule::PackageSentinel,
        ClassificationRule::capability("0x2", "package", "Publisher"),
        ClassificationRule::capability("0x2", "package", "UpgradeCap"),
        ClassificationRule::metadata_wrapper("0x2", "display", "Display"),
        ClassificationRule::Fallback,
    ]
}

/// What happens when two objects in one run classify to the same label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollisionStrategy {
    /// Later object in creation order overwrites the earlier one. Mirrors
    /// the historical script behavior; the ambiguity is accepted, not fixed.
    #[default]
    LastWriteWins,
    /// Colliding labels get a short object-id suffix, e.g.
    /// `package::Publisher (0x6b)`.
    SuffixObjectId,
}

/// Label -> object-id mapping preserving first-seen insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap {
    entries: Vec<(String, String)>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == label)
            .map(|(_, id)| id.as_str())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    /// Insert a label. An existing label keeps its position; its value is
    /// overwritten.
    pub fn insert(&mut self, label: String, object_id: String) {
        match self.entries.iter_mut().find(|(key, _)| *key == label) {
            Some(entry) => entry.1 = object_id,
            None => self.entries.push((label, object_id)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, id)| (key.as_str(), id.as_str()))
    }
}

impl Serialize for LabelMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, id) in &self.entries {
            map.serialize_entry(key, id)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LabelMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LabelMapVisitor;

        impl<'de> Visitor<'de> for LabelMapVisitor {
            type Value = LabelMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of label to object id")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<LabelMap, A::Error> {
                let mut map = LabelMap::new();
                while let Some((key, id)) = access.next_entry::<String, String>()? {
                    map.insert(key, id);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(LabelMapVisitor)
    }
}

/// An object the resolver could not classify because its type string was
/// missing or outside the grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedObject {
    pub object_id: String,
    pub type_string: Option<String>,
    pub reason: String,
}

/// Outcome of one resolution pass.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub labels: LabelMap,
    pub unresolved: Vec<UnresolvedObject>,
}

/// Turns an ordered created-object list into a label map. Deterministic for
/// a given input sequence.
#[derive(Debug, Clone)]
pub struct EffectsResolver {
    rules: Vec<ClassificationRule>,
    collision: CollisionStrategy,
}

impl Default for EffectsResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectsResolver {
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
            collision: CollisionStrategy::default(),
        }
    }

    pub fn with_rules(mut self, rules: Vec<ClassificationRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_collision_strategy(mut self, collision: CollisionStrategy) -> Self {
        self.collision = collision;
        self
    }

    pub fn resolve(&self, created: &[CreatedObject]) -> Resolution {
        let mut resolution = Resolution::default();

        for object in created {
            let Some(type_string) = object.type_string.as_deref() else {
                warn!(object_id = %object.object_id, "created object has no type, skipping");
                resolution.unresolved.push(UnresolvedObject {
                    object_id: object.object_id.clone(),
                    type_string: None,
                    reason: "no type reported".to_string(),
                });
                continue;
            };

            let tag = match TypeTag::parse(type_string) {
                Ok(tag) => tag,
                Err(err) => {
                    warn!(
                        object_id = %object.object_id,
                        "skipping object with unparseable type {type_string:?}: {err}"
                    );
                    resolution.unresolved.push(UnresolvedObject {
                        object_id: object.object_id.clone(),
                        type_string: Some(type_string.to_string()),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            let Some(label) = self.rules.iter().find_map(|rule| rule.label(&tag)) else {
                debug!(object_id = %object.object_id, "no classification rule matched, dropping");
                continue;
            };

            self.insert(&mut resolution.labels, label, &object.object_id);
        }

        resolution
    }

    fn insert(&self, labels: &mut LabelMap, label: String, object_id: &str) {
        match self.collision {
            CollisionStrategy::LastWriteWins => labels.insert(label, object_id.to_string()),
            CollisionStrategy::SuffixObjectId => {
                if labels.contains(&label) {
                    let suffixed = format!("{} ({})", label, short_id(object_id));
                    labels.insert(suffixed, object_id.to_string());
                } else {
                    labels.insert(label, object_id.to_string());
                }
            }
        }
    }
}

/// First four characters of the id string, `0x` included.
fn short_id(object_id: &str) -> &str {
    let end = object_id
        .char_indices()
        .nth(4)
        .map(|(i, _)| i)
        .unwrap_or(object_id.len());
    &object_id[..end]
}
