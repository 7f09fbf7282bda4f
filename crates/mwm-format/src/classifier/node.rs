use crate::type_path::PackedType;

/// Arena index of a node inside its registry.
pub type NodeId = u32;

/// Number of display scales a visibility mask covers (0..=19).
pub const SCALES_COUNT: u8 = 20;

/// Visibility mask of a node visible at every scale.
pub const ALL_SCALES_VISIBLE: u32 = (1 << SCALES_COUNT) - 1;

#[derive(Debug, Clone)]
pub struct ClassifNode {
    pub(crate) name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) draw_rules: Vec<String>,
    pub(crate) visibility: u32,
    pub(crate) packed: PackedType,
}

impl ClassifNode {
    pub(crate) fn new(name: String, parent: Option<NodeId>, packed: PackedType) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            draw_rules: Vec::new(),
            visibility: ALL_SCALES_VISIBLE,
            packed,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Opaque drawing-rule keys attached in the config.
    #[inline]
    pub fn draw_rules(&self) -> &[String] {
        &self.draw_rules
    }

    /// Bit `s` set means visible at scale `s`.
    #[inline]
    pub fn visibility(&self) -> u32 {
        self.visibility
    }

    #[inline]
    pub fn is_visible_at(&self, scale: u8) -> bool {
        scale < SCALES_COUNT && self.visibility & (1 << scale) != 0
    }

    /// Packed path of this node.
    #[inline]
    pub fn packed_type(&self) -> PackedType {
        self.packed
    }
}
