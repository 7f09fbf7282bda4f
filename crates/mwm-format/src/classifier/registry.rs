use std::fs;
use std::path::Path;

use rustc_hash::{FxBuildHasher, FxHashMap};
use tracing::debug;

use crate::error::{FormatError, Result};
use crate::feature::TypesHolder;
use crate::type_path::PackedType;

use super::config::build_tree;
use super::node::{ClassifNode, NodeId};
use super::visitor::ClassifVisitor;

/// Dense, container-local type number stored on disk instead of a
/// [`PackedType`].
pub type TypeIndex = u32;

/// Top-level node every unresolvable type index decodes to.
pub const STUB_NODE_NAME: &str = "mapswithme";

/// Classification tree plus the `PackedType <-> TypeIndex` bijection.
///
/// Built once, then only read; share it by reference between all decoders.
#[derive(Debug, Clone)]
pub struct ClassifierRegistry {
    nodes: Vec<ClassifNode>,
    index_to_type: Vec<PackedType>,
    type_to_index: FxHashMap<PackedType, TypeIndex>,
    stub: PackedType,
}

impl ClassifierRegistry {
    /// Parses the classification config and the type mapping (one
    /// `|`-joined path per line, line number = type index).
    pub fn load(config: &str, mapping: &str) -> Result<Self> {
        let mut nodes = build_tree(config)?;
        let stub = ensure_stub(&mut nodes)?;

        let mut registry = Self {
            nodes,
            index_to_type: Vec::new(),
            type_to_index: FxHashMap::with_hasher(FxBuildHasher),
            stub,
        };

        for (i, raw) in mapping.lines().enumerate() {
            let line_no = i + 1;
            let path = raw.trim();
            if path.is_empty() {
                return Err(FormatError::malformed(line_no, "empty type mapping entry"));
            }
            let segments: Vec<&str> = path.split('|').collect();
            let t = registry.type_by_path(&segments).ok_or_else(|| {
                FormatError::malformed(line_no, format!("unknown type {path:?}"))
            })?;
            let index = registry.index_to_type.len() as TypeIndex;
            if registry.type_to_index.insert(t, index).is_some() {
                return Err(FormatError::malformed(
                    line_no,
                    format!("type {path:?} mapped twice"),
                ));
            }
            registry.index_to_type.push(t);
        }

        debug!(
            nodes = registry.nodes.len(),
            types = registry.index_to_type.len(),
            "classifier loaded"
        );
        Ok(registry)
    }

    pub fn load_files(config_path: &Path, mapping_path: &Path) -> Result<Self> {
        let config = fs::read_to_string(config_path)?;
        let mapping = fs::read_to_string(mapping_path)?;
        Self::load(&config, &mapping)
    }

    /// Number of mapped types.
    #[inline]
    pub fn len(&self) -> usize {
        self.index_to_type.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index_to_type.is_empty()
    }

    #[inline]
    pub fn stub_type(&self) -> PackedType {
        self.stub
    }

    #[inline]
    pub fn root(&self) -> &ClassifNode {
        &self.nodes[0]
    }

    #[inline]
    pub fn node_by_id(&self, id: NodeId) -> Option<&ClassifNode> {
        self.nodes.get(id as usize)
    }

    fn node_id(&self, t: PackedType) -> Option<NodeId> {
        let mut id: NodeId = 0;
        for sel in t.selectors() {
            id = *self.nodes[id as usize].children.get(sel as usize)?;
        }
        Some(id)
    }

    /// Node at the end of the walk `t` describes.
    pub fn node(&self, t: PackedType) -> Option<&ClassifNode> {
        self.node_id(t).map(|id| &self.nodes[id as usize])
    }

    /// Looks a path of node names up, e.g. `["highway", "primary"]`.
    pub fn type_by_path(&self, path: &[&str]) -> Option<PackedType> {
        let mut id: NodeId = 0;
        for name in path {
            id = *self.nodes[id as usize]
                .children
                .iter()
                .find(|&&c| self.nodes[c as usize].name == *name)?;
        }
        Some(self.nodes[id as usize].packed)
    }

    /// `|`-joined form, as in the type mapping file.
    pub fn type_by_full_name(&self, name: &str) -> Option<PackedType> {
        let path: Vec<&str> = name.split('|').collect();
        self.type_by_path(&path)
    }

    fn join_path(&self, t: PackedType, sep: &str) -> String {
        let mut out = String::new();
        let mut id: NodeId = 0;
        for sel in t.selectors() {
            let Some(&child) = self.nodes[id as usize].children.get(sel as usize) else {
                break;
            };
            if !out.is_empty() {
                out.push_str(sep);
            }
            out.push_str(&self.nodes[child as usize].name);
            id = child;
        }
        out
    }

    /// `highway|primary`. Selectors the tree does not know are dropped.
    pub fn path_by_type(&self, t: PackedType) -> String {
        self.join_path(t, "|")
    }

    /// `highway-primary`.
    pub fn readable_name(&self, t: PackedType) -> String {
        self.join_path(t, "-")
    }

    #[inline]
    pub fn index_for_type(&self, t: PackedType) -> Option<TypeIndex> {
        self.type_to_index.get(&t).copied()
    }

    #[inline]
    pub fn try_type_for_index(&self, index: TypeIndex) -> Option<PackedType> {
        self.index_to_type.get(index as usize).copied()
    }

    /// Falls back to the stub type for indices the mapping does not know
    /// (archives produced by a newer classification).
    #[inline]
    pub fn type_for_index(&self, index: TypeIndex) -> PackedType {
        self.try_type_for_index(index).unwrap_or(self.stub)
    }

    /// Visible at `scale` when the node and all its ancestors are.
    pub fn is_visible(&self, t: PackedType, scale: u8) -> bool {
        let mut id: NodeId = 0;
        for sel in t.selectors() {
            let Some(&child) = self.nodes[id as usize].children.get(sel as usize) else {
                return false;
            };
            if !self.nodes[child as usize].is_visible_at(scale) {
                return false;
            }
            id = child;
        }
        true
    }

    /// Any of the feature's types is visible at `scale`.
    pub fn is_drawable(&self, types: &TypesHolder, scale: u8) -> bool {
        types.iter().any(|t| self.is_visible(t, scale))
    }

    /// Depth-first walk over every node below the root.
    pub fn walk<V: ClassifVisitor>(&self, visitor: &mut V) {
        self.walk_children(0, visitor);
    }

    fn walk_children<V: ClassifVisitor>(&self, id: NodeId, visitor: &mut V) {
        for &child in &self.nodes[id as usize].children {
            let node = &self.nodes[child as usize];
            visitor.visit_node(node);
            if !node.children.is_empty() {
                visitor.enter_children();
                self.walk_children(child, visitor);
                visitor.leave_children();
            }
        }
    }
}

fn ensure_stub(nodes: &mut Vec<ClassifNode>) -> Result<PackedType> {
    if let Some(&id) = nodes[0]
        .children
        .iter()
        .find(|&&c| nodes[c as usize].name == STUB_NODE_NAME)
    {
        return Ok(nodes[id as usize].packed);
    }

    let selector = u8::try_from(nodes[0].children.len()).map_err(|_| {
        FormatError::malformed(0, "no room for the stub type at the top level")
    })?;
    let packed = PackedType::ROOT.push(selector)?;
    let id = nodes.len() as NodeId;
    nodes.push(ClassifNode::new(STUB_NODE_NAME.to_owned(), Some(0), packed));
    nodes[0].children.push(id);
    Ok(packed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = "\
highway | 00000111111111111111
  primary
    bridge
  residential | 00000000000011111111
amenity
  cafe
";
    const MAPPING: &str = "highway\nhighway|primary\nhighway|primary|bridge\nhighway|residential\namenity|cafe\n";

    fn registry() -> ClassifierRegistry {
        ClassifierRegistry::load(CONFIG, MAPPING).unwrap()
    }

    #[test]
    fn resolves_paths_both_ways() {
        let r = registry();
        let t = r.type_by_path(&["highway", "primary", "bridge"]).unwrap();
        assert_eq!(t, PackedType::pack(&[0, 0, 0]).unwrap());
        assert_eq!(r.path_by_type(t), "highway|primary|bridge");
        assert_eq!(r.readable_name(t), "highway-primary-bridge");
        assert_eq!(r.type_by_full_name("amenity|cafe"), r.type_by_path(&["amenity", "cafe"]));
        assert_eq!(r.type_by_path(&["highway", "motorway"]), None);
    }

    #[test]
    fn index_mapping_follows_file_order() {
        let r = registry();
        assert_eq!(r.len(), 5);
        let primary = r.type_by_full_name("highway|primary").unwrap();
        assert_eq!(r.index_for_type(primary), Some(1));
        assert_eq!(r.type_for_index(1), primary);
        assert_eq!(r.index_for_type(r.stub_type()), None);
    }

    #[test]
    fn unknown_index_yields_stub() {
        let r = registry();
        assert_eq!(r.type_for_index(5), r.stub_type());
        assert_eq!(r.type_for_index(u32::MAX), r.stub_type());
        assert_eq!(r.path_by_type(r.stub_type()), STUB_NODE_NAME);
    }

    #[test]
    fn declared_stub_is_reused() {
        let r = ClassifierRegistry::load("mapswithme\nhighway\n", "highway\n").unwrap();
        assert_eq!(r.stub_type(), PackedType::pack(&[0]).unwrap());
        assert_eq!(r.root().children().len(), 2);
    }

    #[test]
    fn visibility_requires_every_ancestor() {
        let r = registry();
        let primary = r.type_by_full_name("highway|primary").unwrap();
        let residential = r.type_by_full_name("highway|residential").unwrap();
        assert!(!r.is_visible(primary, 4));
        assert!(r.is_visible(primary, 5));
        assert!(!r.is_visible(residential, 10));
        assert!(r.is_visible(residential, 12));
        assert!(!r.is_visible(primary, 25));
    }

    #[test]
    fn bad_mappings_are_malformed() {
        for mapping in ["highway|motorway\n", "highway\nhighway\n", "highway\n\namenity\n"] {
            assert!(matches!(
                ClassifierRegistry::load(CONFIG, mapping),
                Err(FormatError::ConfigMalformed { .. })
            ));
        }
    }

    #[test]
    fn loads_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("classificator.txt");
        let mapping = dir.path().join("types.txt");
        std::fs::write(&config, CONFIG).unwrap();
        std::fs::write(&mapping, MAPPING).unwrap();
        let r = ClassifierRegistry::load_files(&config, &mapping).unwrap();
        assert_eq!(r.len(), 5);

        let missing = dir.path().join("nope.txt");
        assert!(matches!(
            ClassifierRegistry::load_files(&missing, &mapping),
            Err(FormatError::Io(_))
        ));
    }
}
