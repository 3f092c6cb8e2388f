//! Snapshot engine — point-in-time capture and in-place restore of a live graph.
//!
//! A snapshot is an arena of nodes. Every live identity reachable from the
//! root maps to exactly one node, and back edges are node ids, so shared
//! sub-objects stay shared and cycles cost nothing.
//!
//! RULES:
//!   - Capture registers a composite's node id *before* visiting its
//!     children. A cycle resolves to the node still being filled.
//!   - Restore never allocates a new entity. Instance nodes hold the
//!     original live object and their fields are written back onto it.
//!   - Restore registers every newly allocated handle before filling it,
//!     so aliasing and cycles come back exactly as captured.
//!   - A snapshot is immutable once built and may be restored many times.

use crate::{
    classify::{Category, ClassifierTable},
    error::{RewindError, RewindResult},
    live::{CaptureFn, Coroutine, Frame, Key, ObjRef, Seq, SeqKind, Value},
    types::NodeId,
};
use std::{
    any::Any,
    borrow::Cow,
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    fmt,
    rc::Rc,
};

pub enum Node {
    Value(Value),
    Opaque(Value),
    /// A private deep copy, duplicated again on every restore.
    Cloned(Value),
    Container {
        kind:  SeqKind,
        items: Vec<NodeId>,
    },
    Mapping(Vec<(Key, NodeId)>),
    Instance {
        object: ObjRef,
        fields: Vec<(Cow<'static, str>, NodeId)>,
    },
    Suspended {
        type_name: &'static str,
        frame:     Box<dyn Frame>,
    },
    /// Placeholder while a composite's children are being captured.
    Pending,
}

impl Node {
    pub fn category(&self) -> Option<Category> {
        Some(match self {
            Node::Value(_)          => Category::Value,
            Node::Opaque(_)         => Category::Opaque,
            Node::Cloned(_)         => Category::Cloned,
            Node::Container { .. }  => Category::Container,
            Node::Mapping(_)        => Category::Mapping,
            Node::Instance { .. }   => Category::Instance,
            Node::Suspended { .. }  => Category::Suspended,
            Node::Pending           => return None,
        })
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Value(v)  => write!(f, "Value({v:?})"),
            Node::Opaque(v) => write!(f, "Opaque({v:?})"),
            Node::Cloned(v) => write!(f, "Cloned({v:?})"),
            Node::Container { kind, items } => write!(f, "Container({kind:?}, {items:?})"),
            Node::Mapping(entries) => write!(f, "Mapping({entries:?})"),
            Node::Instance { object, fields } => {
                let names: Vec<_> = fields.iter().map(|(n, id)| format!("{n}={id}")).collect();
                write!(f, "Instance({:?}, [{}])", Value::Object(object.clone()), names.join(", "))
            }
            Node::Suspended { type_name, .. } => write!(f, "Suspended({type_name})"),
            Node::Pending => write!(f, "Pending"),
        }
    }
}

pub struct Snapshot {
    nodes: Vec<Node>,
    root:  NodeId,
}

impl Snapshot {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The live object the root node writes back onto, if the root is an instance.
    pub fn root_object(&self) -> Option<&ObjRef> {
        match self.node(self.root) {
            Node::Instance { object, .. } => Some(object),
            _ => None,
        }
    }

    /// Rebuild the captured graph. Instances are written back in place;
    /// containers, mappings, cloned resources and coroutines come back as
    /// fresh handles.
    pub fn restore(&self) -> RewindResult<Value> {
        let mut pass = RestorePass { snapshot: self, done: vec![None; self.nodes.len()] };
        let root = pass.visit(self.root)?;
        log::debug!("restored snapshot of {} nodes", self.nodes.len());
        Ok(root)
    }

    /// Restore onto `live_root`, which must be the object this snapshot was
    /// captured from.
    pub fn restore_into(&self, live_root: &ObjRef) -> RewindResult<()> {
        let belongs = self
            .root_object()
            .is_some_and(|object| Rc::ptr_eq(object, live_root));
        if !belongs {
            return Err(RewindError::IdentityViolation);
        }
        self.restore().map(|_| ())
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("root", &self.root)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

/// Stateless between calls. All working state lives in one pass.
#[derive(Debug, Clone, Default)]
pub struct SnapshotEngine {
    classifier: ClassifierTable,
}

impl SnapshotEngine {
    pub fn new(classifier: ClassifierTable) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &ClassifierTable {
        &self.classifier
    }

    pub fn capture(&self, root: &Value) -> RewindResult<Snapshot> {
        let mut pass = CapturePass {
            table:  &self.classifier,
            nodes:  Vec::new(),
            seen:   HashMap::new(),
            pinned: Vec::new(),
            path:   vec!["root".to_string()],
        };
        let root = pass.visit(root)?;
        log::debug!("captured {} nodes ({} shared identities)", pass.nodes.len(), pass.seen.len());
        Ok(Snapshot { nodes: pass.nodes, root })
    }
}

// ── Capture ─────────────────────────────────────────────────────

struct CapturePass<'a> {
    table:  &'a ClassifierTable,
    nodes:  Vec<Node>,
    /// Live identity → node.
    seen:   HashMap<usize, NodeId>,
    /// Keeps every registered handle alive so no address is reused mid-pass.
    pinned: Vec<Value>,
    /// Breadcrumbs for error reports.
    path:   Vec<String>,
}

impl CapturePass<'_> {
    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Allocate a placeholder and register it under the value's identity.
    fn register(&mut self, identity: usize, value: &Value) -> NodeId {
        let id = self.push(Node::Pending);
        self.seen.insert(identity, id);
        self.pinned.push(value.clone());
        id
    }

    fn unclassifiable(&self, type_name: &str) -> RewindError {
        RewindError::Unclassifiable {
            type_name: type_name.to_string(),
            path:      self.path.join(""),
        }
    }

    fn visit_at(&mut self, segment: String, value: &Value) -> RewindResult<NodeId> {
        self.path.push(segment);
        let result = self.visit(value);
        self.path.pop();
        result
    }

    fn visit(&mut self, value: &Value) -> RewindResult<NodeId> {
        let Some(identity) = value.identity() else {
            return Ok(self.push(Node::Value(value.clone())));
        };
        if let Some(&id) = self.seen.get(&identity) {
            return Ok(id);
        }

        match self.table.classify(value) {
            Category::Value => Ok(self.push(Node::Value(value.clone()))),
            Category::Opaque => {
                let id = self.register(identity, value);
                self.nodes[id] = Node::Opaque(value.clone());
                Ok(id)
            }
            Category::Cloned => {
                let copy = self.duplicate(value)?;
                let id = self.register(identity, value);
                self.nodes[id] = Node::Cloned(copy);
                Ok(id)
            }
            Category::Container => {
                let seq = value.as_seq()?;
                let id = self.register(identity, value);
                let (kind, items) = {
                    let seq = seq.borrow();
                    (seq.kind(), seq.items().to_vec())
                };
                let mut children = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    children.push(self.visit_at(format!("[{i}]"), item)?);
                }
                self.nodes[id] = Node::Container { kind, items: children };
                Ok(id)
            }
            Category::Mapping => {
                let map = value.as_map()?;
                let id = self.register(identity, value);
                let entries: Vec<(Key, Value)> = map
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                let mut children = Vec::with_capacity(entries.len());
                for (key, item) in entries {
                    let child = self.visit_at(format!("[{key:?}]"), &item)?;
                    children.push((key, child));
                }
                self.nodes[id] = Node::Mapping(children);
                Ok(id)
            }
            Category::Suspended => {
                let task = value.as_task()?;
                let id = self.register(identity, value);
                let type_name = task.borrow().type_name();
                self.path.push(format!("<{type_name}>"));
                let frame = {
                    let task = task.borrow();
                    task.suspend(&mut |local: &Value| self.visit(local))
                };
                self.path.pop();
                self.nodes[id] = Node::Suspended { type_name, frame: frame? };
                Ok(id)
            }
            Category::Instance => {
                let object = value.as_object()?;
                let (type_name, fields) = {
                    let entity = object.borrow();
                    (entity.type_name(), entity.fields())
                };
                let Some(fields) = fields else {
                    return Err(self.unclassifiable(type_name));
                };
                let id = self.register(identity, value);
                let mut children = Vec::with_capacity(fields.len());
                for (name, field) in fields {
                    if self.table.is_excluded(type_name, &name) {
                        continue;
                    }
                    let child = self.visit_at(format!(".{name}"), &field)?;
                    children.push((name, child));
                }
                self.nodes[id] = Node::Instance { object, fields: children };
                Ok(id)
            }
        }
    }

    fn duplicate(&self, value: &Value) -> RewindResult<Value> {
        match value {
            Value::Resource(res) => {
                let copy = res.borrow().duplicate();
                Ok(Value::Resource(Rc::new(RefCell::new(copy))))
            }
            Value::Object(obj) => {
                let entity = obj.borrow();
                entity
                    .duplicate()
                    .map(Value::Object)
                    .ok_or_else(|| self.unclassifiable(entity.type_name()))
            }
            other => Err(self.unclassifiable(other.kind_name())),
        }
    }
}

// ── Restore ─────────────────────────────────────────────────────

struct RestorePass<'a> {
    snapshot: &'a Snapshot,
    /// Node → already restored live value.
    done:     Vec<Option<Value>>,
}

impl RestorePass<'_> {
    fn visit(&mut self, id: NodeId) -> RewindResult<Value> {
        if let Some(value) = &self.done[id] {
            return Ok(value.clone());
        }
        let snapshot = self.snapshot;

        match snapshot.node(id) {
            Node::Value(v) | Node::Opaque(v) => {
                self.done[id] = Some(v.clone());
                Ok(v.clone())
            }
            Node::Cloned(v) => {
                let fresh = match v {
                    Value::Resource(res) => Value::Resource(Rc::new(RefCell::new(res.borrow().duplicate()))),
                    Value::Object(obj) => {
                        let entity = obj.borrow();
                        entity.duplicate().map(Value::Object).ok_or_else(|| RewindError::Unclassifiable {
                            type_name: entity.type_name().to_string(),
                            path:      format!("node {id}"),
                        })?
                    }
                    other => other.clone(),
                };
                self.done[id] = Some(fresh.clone());
                Ok(fresh)
            }
            Node::Container { kind, items } => {
                let seq = Rc::new(RefCell::new(Seq::new(*kind)));
                self.done[id] = Some(Value::Seq(seq.clone()));
                for &item in items {
                    let value = self.visit(item)?;
                    seq.borrow_mut().push(value);
                }
                Ok(Value::Seq(seq))
            }
            Node::Mapping(entries) => {
                let map = Rc::new(RefCell::new(BTreeMap::new()));
                self.done[id] = Some(Value::Map(map.clone()));
                for (key, item) in entries {
                    let value = self.visit(*item)?;
                    map.borrow_mut().insert(key.clone(), value);
                }
                Ok(Value::Map(map))
            }
            Node::Instance { object, fields } => {
                self.done[id] = Some(Value::Object(object.clone()));
                for (name, item) in fields {
                    let value = self.visit(*item)?;
                    object.borrow_mut().set_field(name, value)?;
                }
                Ok(Value::Object(object.clone()))
            }
            Node::Suspended { type_name, frame } => {
                let placeholder: Box<dyn Coroutine> = Box::new(Unresumed { type_name: *type_name });
                let task = Rc::new(RefCell::new(placeholder));
                self.done[id] = Some(Value::Task(task.clone()));
                let rebuilt = frame.rebuild(&mut |local: NodeId| self.visit(local))?;
                *task.borrow_mut() = rebuilt;
                Ok(Value::Task(task))
            }
            Node::Pending => Err(RewindError::Other(anyhow::anyhow!(
                "snapshot node {id} was never filled"
            ))),
        }
    }
}

/// Stands in for a coroutine while its closed-over values are restored.
struct Unresumed {
    type_name: &'static str,
}

impl Coroutine for Unresumed {
    fn type_name(&self) -> &'static str { self.type_name }

    fn resume(&mut self) -> Option<Value> { None }

    fn suspend(&self, _capture: &mut CaptureFn<'_>) -> RewindResult<Box<dyn Frame>> {
        Err(RewindError::Other(anyhow::anyhow!(
            "coroutine '{}' captured while it was being restored",
            self.type_name
        )))
    }

    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}
