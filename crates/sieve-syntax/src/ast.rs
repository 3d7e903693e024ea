//! Arena AST (§3 "AST"): a single pool freed as a unit, addressed by index
//! rather than by pointer ("model the AST as an arena with indices rather
//! than back-pointers", spec.md §9).

/// Index into the arena. `None` is represented by `Option<NodeId>` rather
/// than a sentinel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone)]
pub struct Argument {
    pub node: NodeId,
}

/// One AST node. Node variants per spec.md §3: `Command`, `Test`,
/// `Identifier`, `String`, `StringList`, `Number`, `Tag`.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A top-level or block-nested command, e.g. `fileinto "Junk";`.
    Command {
        identifier: String,
        arguments: Vec<NodeId>,
        /// Present for `if`/`elsif`/`not`/`anyof`/`allof`: the test(s)
        /// this command's condition is built from.
        tests: Vec<NodeId>,
        /// `Some(children)` when a `{ ... }` block followed; `None` when
        /// the command ended with `;`.
        block: Option<Vec<NodeId>>,
    },
    /// A test used inside a test tree (`header`, `address`, `not`,
    /// `anyof`, `allof`, extension-provided tests, ...).
    Test {
        identifier: String,
        arguments: Vec<NodeId>,
        tests: Vec<NodeId>,
    },
    Identifier(String),
    String(String),
    StringList(Vec<NodeId>),
    Number(u64),
    /// A tag argument, e.g. `:comparator "i;octet"`. `params` holds any
    /// following string/string-list/number arguments the tag consumes
    /// (validated and attached by the tag's `validate` hook, §4.5).
    Tag { name: String, params: Vec<NodeId> },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub line: u32,
}

/// The arena itself: one `Vec<Node>` freed as a whole when the `Ast` is
/// dropped. `parents` is built once after parsing by `build_parents`.
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<Node>,
    pub roots: Vec<NodeId>,
    parents: Vec<Option<NodeId>>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, kind: NodeKind, line: u32) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, line });
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Build the `parent(node)` side table in one pass over the whole
    /// tree. Call after parsing completes.
    pub fn build_parents(&mut self) {
        self.parents = vec![None; self.nodes.len()];
        let roots = self.roots.clone();
        for root in roots {
            self.visit_children(root, None);
        }
    }

    fn visit_children(&mut self, id: NodeId, parent: Option<NodeId>) {
        self.parents[id.0 as usize] = parent;
        let children = self.children_of(id);
        for child in children {
            self.visit_children(child, Some(id));
        }
    }

    fn children_of(&self, id: NodeId) -> Vec<NodeId> {
        match &self.get(id).kind {
            NodeKind::Command {
                arguments,
                tests,
                block,
                ..
            } => {
                let mut v = arguments.clone();
                v.extend(tests.iter().copied());
                if let Some(b) = block {
                    v.extend(b.iter().copied());
                }
                v
            }
            NodeKind::Test {
                arguments, tests, ..
            } => {
                let mut v = arguments.clone();
                v.extend(tests.iter().copied());
                v
            }
            NodeKind::StringList(items) => items.clone(),
            NodeKind::Tag { params, .. } => params.clone(),
            NodeKind::Identifier(_) | NodeKind::String(_) | NodeKind::Number(_) => Vec::new(),
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(id.0 as usize).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_lookup_after_build() {
        let mut ast = Ast::new();
        let s = ast.alloc(NodeKind::String("Junk".into()), 1);
        let cmd = ast.alloc(
            NodeKind::Command {
                identifier: "fileinto".into(),
                arguments: vec![s],
                tests: vec![],
                block: None,
            },
            1,
        );
        ast.roots.push(cmd);
        ast.build_parents();
        assert_eq!(ast.parent(s), Some(cmd));
        assert_eq!(ast.parent(cmd), None);
    }
}
