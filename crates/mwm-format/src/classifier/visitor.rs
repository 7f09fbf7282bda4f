use super::node::{ClassifNode, ALL_SCALES_VISIBLE, SCALES_COUNT};
use super::registry::ClassifierRegistry;

/// Callbacks of [`ClassifierRegistry::walk`].
pub trait ClassifVisitor {
    fn visit_node(&mut self, node: &ClassifNode);
    fn enter_children(&mut self) {}
    fn leave_children(&mut self) {}
}

struct ConfigWriter {
    out: String,
    depth: usize,
}

impl ClassifVisitor for ConfigWriter {
    fn visit_node(&mut self, node: &ClassifNode) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
        self.out.push_str(node.name());
        if node.visibility() != ALL_SCALES_VISIBLE {
            self.out.push_str(" | ");
            for scale in 0..SCALES_COUNT {
                self.out
                    .push(if node.is_visible_at(scale) { '1' } else { '0' });
            }
        }
        if !node.draw_rules().is_empty() {
            self.out.push_str(" ; ");
            self.out.push_str(&node.draw_rules().join(", "));
        }
        self.out.push('\n');
    }

    fn enter_children(&mut self) {
        self.depth += 1;
    }

    fn leave_children(&mut self) {
        self.depth -= 1;
    }
}

/// Serializes the tree back into the config text it loads from.
pub fn write_config(registry: &ClassifierRegistry) -> String {
    let mut w = ConfigWriter {
        out: String::new(),
        depth: 0,
    };
    registry.walk(&mut w);
    w.out
}

struct VisibilityCollector {
    path: Vec<String>,
    rows: Vec<(String, u32)>,
}

impl ClassifVisitor for VisibilityCollector {
    fn visit_node(&mut self, node: &ClassifNode) {
        // replace the previous sibling at this depth
        if let Some(last) = self.path.last_mut() {
            *last = node.name().to_owned();
        }
        self.rows.push((self.path.join("|"), node.visibility()));
    }

    fn enter_children(&mut self) {
        self.path.push(String::new());
    }

    fn leave_children(&mut self) {
        self.path.pop();
    }
}

/// `(full path, visibility mask)` of every node in walk order.
pub fn visibility_table(registry: &ClassifierRegistry) -> Vec<(String, u32)> {
    let mut v = VisibilityCollector {
        path: vec![String::new()],
        rows: Vec::new(),
    };
    registry.walk(&mut v);
    v.rows
}
