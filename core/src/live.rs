//! The live object graph.
//!
//! Everything reachable from a simulation root is a [`Value`]. Scalars are
//! immutable and copied freely. Everything else is a reference-counted
//! handle, and the handle's allocation address is its identity.
//!
//! RULE: a type takes part in snapshots only through one of the explicit
//! capability traits below. There is no ambient reflection.
//!   - [`Entity`]    named mutable fields, restored in place
//!   - [`Resource`]  value-like state that is deep-copied (RNGs, cursors, buffers)
//!   - [`Coroutine`] a paused computation written as an explicit state machine

use crate::{
    error::{RewindError, RewindResult},
    types::NodeId,
};
use std::{
    any::Any,
    borrow::Cow,
    cell::{Ref, RefCell, RefMut},
    collections::BTreeMap,
    fmt,
    rc::Rc,
};

pub type ObjRef = Rc<RefCell<dyn Entity>>;
pub type ResourceRef = Rc<RefCell<Box<dyn Resource>>>;
pub type SeqRef = Rc<RefCell<Seq>>;
pub type MapRef = Rc<RefCell<BTreeMap<Key, Value>>>;
pub type TaskRef = Rc<RefCell<Box<dyn Coroutine>>>;

/// One enumerated field: its name and current value.
pub type Field = (Cow<'static, str>, Value);

/// Callback handed to [`Coroutine::suspend`]: captures one closed-over value.
pub type CaptureFn<'a> = dyn FnMut(&Value) -> RewindResult<NodeId> + 'a;

/// Callback handed to [`Frame::rebuild`]: restores one closed-over value.
pub type RestoreFn<'a> = dyn FnMut(NodeId) -> RewindResult<Value> + 'a;

// ── Values ──────────────────────────────────────────────────────

#[derive(Clone)]
pub enum Value {
    Absent,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(Rc<str>),
    /// Type tags and enumerated constants.
    Tag(&'static str),
    Opaque(Rc<dyn Any>),
    Resource(ResourceRef),
    Seq(SeqRef),
    Map(MapRef),
    Task(TaskRef),
    Object(ObjRef),
}

impl Value {
    pub fn text(s: &str) -> Self {
        Value::Text(Rc::from(s))
    }

    pub fn object<T: Entity>(entity: T) -> Self {
        let obj: ObjRef = Rc::new(RefCell::new(entity));
        Value::Object(obj)
    }

    pub fn opaque<T: Any>(handle: T) -> Self {
        Value::Opaque(Rc::new(handle))
    }

    pub fn resource<R: Resource>(resource: R) -> Self {
        let boxed: Box<dyn Resource> = Box::new(resource);
        Value::Resource(Rc::new(RefCell::new(boxed)))
    }

    pub fn task<C: Coroutine>(coroutine: C) -> Self {
        let boxed: Box<dyn Coroutine> = Box::new(coroutine);
        Value::Task(Rc::new(RefCell::new(boxed)))
    }

    pub fn seq(kind: SeqKind, items: Vec<Value>) -> Self {
        Value::Seq(Rc::new(RefCell::new(Seq::from_items(kind, items))))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Self::seq(SeqKind::List, items)
    }

    pub fn map(entries: impl IntoIterator<Item = (Key, Value)>) -> Self {
        Value::Map(Rc::new(RefCell::new(entries.into_iter().collect())))
    }

    /// Short stable name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Absent      => "absent",
            Value::Bool(_)     => "bool",
            Value::Int(_)      => "int",
            Value::Float(_)    => "float",
            Value::Text(_)     => "text",
            Value::Tag(_)      => "tag",
            Value::Opaque(_)   => "opaque",
            Value::Resource(_) => "resource",
            Value::Seq(_)      => "seq",
            Value::Map(_)      => "map",
            Value::Task(_)     => "task",
            Value::Object(_)   => "object",
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Absent
                | Value::Bool(_)
                | Value::Int(_)
                | Value::Float(_)
                | Value::Text(_)
                | Value::Tag(_)
        )
    }

    /// Allocation address of a handle. Scalars have no identity.
    pub fn identity(&self) -> Option<usize> {
        let addr = match self {
            Value::Opaque(rc)   => Rc::as_ptr(rc) as *const () as usize,
            Value::Resource(rc) => Rc::as_ptr(rc) as *const () as usize,
            Value::Seq(rc)      => Rc::as_ptr(rc) as *const () as usize,
            Value::Map(rc)      => Rc::as_ptr(rc) as *const () as usize,
            Value::Task(rc)     => Rc::as_ptr(rc) as *const () as usize,
            Value::Object(rc)   => Rc::as_ptr(rc) as *const () as usize,
            _ => return None,
        };
        Some(addr)
    }

    /// Scalars compare by value, handles by identity.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Absent, Value::Absent)     => true,
            (Value::Bool(a), Value::Bool(b))   => a == b,
            (Value::Int(a), Value::Int(b))     => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b))   => a == b,
            (Value::Tag(a), Value::Tag(b))     => a == b,
            _ => match (self.identity(), other.identity()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    pub fn as_bool(&self) -> RewindResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch("bool", other)),
        }
    }

    pub fn as_int(&self) -> RewindResult<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(mismatch("int", other)),
        }
    }

    pub fn as_float(&self) -> RewindResult<f64> {
        match self {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            other => Err(mismatch("float", other)),
        }
    }

    pub fn as_text(&self) -> RewindResult<Rc<str>> {
        match self {
            Value::Text(s) => Ok(s.clone()),
            other => Err(mismatch("text", other)),
        }
    }

    pub fn as_object(&self) -> RewindResult<ObjRef> {
        match self {
            Value::Object(o) => Ok(o.clone()),
            other => Err(mismatch("object", other)),
        }
    }

    pub fn as_seq(&self) -> RewindResult<SeqRef> {
        match self {
            Value::Seq(s) => Ok(s.clone()),
            other => Err(mismatch("seq", other)),
        }
    }

    pub fn as_map(&self) -> RewindResult<MapRef> {
        match self {
            Value::Map(m) => Ok(m.clone()),
            other => Err(mismatch("map", other)),
        }
    }

    pub fn as_resource(&self) -> RewindResult<ResourceRef> {
        match self {
            Value::Resource(r) => Ok(r.clone()),
            other => Err(mismatch("resource", other)),
        }
    }

    pub fn as_task(&self) -> RewindResult<TaskRef> {
        match self {
            Value::Task(t) => Ok(t.clone()),
            other => Err(mismatch("task", other)),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Absent   => write!(f, "Absent"),
            Value::Bool(b)  => write!(f, "Bool({b})"),
            Value::Int(i)   => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Text(s)  => write!(f, "Text({s:?})"),
            Value::Tag(t)   => write!(f, "Tag({t})"),
            Value::Object(o) => match o.try_borrow() {
                Ok(e) => write!(f, "Object({}@{:#x})", e.type_name(), self.identity().unwrap_or(0)),
                Err(_) => write!(f, "Object(<borrowed>@{:#x})", self.identity().unwrap_or(0)),
            },
            other => write!(f, "{}@{:#x}", other.kind_name(), other.identity().unwrap_or(0)),
        }
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        match key {
            Key::Bool(b) => Value::Bool(b),
            Key::Int(i)  => Value::Int(i),
            Key::Text(s) => Value::Text(Rc::from(s.as_str())),
            Key::Tag(t)  => Value::Tag(t),
        }
    }
}

fn mismatch(expected: &'static str, found: &Value) -> RewindError {
    RewindError::TypeMismatch { expected, found: found.kind_name() }
}

pub fn unknown_field(type_name: &str, field: &str) -> RewindError {
    RewindError::UnknownField {
        type_name: type_name.to_string(),
        field:     field.to_string(),
    }
}

// ── Keys ────────────────────────────────────────────────────────

/// Mapping keys. Immutable and ordered, passed through snapshots unchanged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Bool(bool),
    Int(i64),
    Text(String),
    Tag(&'static str),
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_string())
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

// ── Sequences ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqKind {
    List,
    Tuple,
    Deque,
    /// Items are kept unique under [`Value::same`].
    Set,
}

#[derive(Debug, Clone)]
pub struct Seq {
    kind:  SeqKind,
    items: Vec<Value>,
}

impl Seq {
    pub fn new(kind: SeqKind) -> Self {
        Self { kind, items: Vec::new() }
    }

    pub fn from_items(kind: SeqKind, items: Vec<Value>) -> Self {
        let mut seq = Self::new(kind);
        for item in items {
            seq.push(item);
        }
        seq
    }

    pub fn kind(&self) -> SeqKind {
        self.kind
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.items.iter().any(|v| v.same(value))
    }

    /// Appends `value`. Returns false when a set already holds it.
    pub fn push(&mut self, value: Value) -> bool {
        if self.kind == SeqKind::Set && self.contains(&value) {
            return false;
        }
        self.items.push(value);
        true
    }

    pub fn remove(&mut self, index: usize) -> Value {
        self.items.remove(index)
    }

    pub fn retain(&mut self, keep: impl FnMut(&Value) -> bool) {
        self.items.retain(keep);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

// ── Capabilities ────────────────────────────────────────────────

/// A general object with named mutable fields.
///
/// Snapshots keep a reference to the live object itself and write the
/// captured field values back onto it on restore.
pub trait Entity: Any {
    fn type_name(&self) -> &'static str;

    /// Current values of every mutable field. `None` means the type
    /// exposes no fields and must be classified opaque or cloneable.
    fn fields(&self) -> Option<Vec<Field>>;

    fn set_field(&mut self, name: &str, value: Value) -> RewindResult<()>;

    /// Independent deep copy, for types classified cloneable.
    fn duplicate(&self) -> Option<ObjRef> {
        None
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Value-like state that is safe and cheap to deep-copy.
pub trait Resource: Any {
    fn type_name(&self) -> &'static str;
    fn duplicate(&self) -> Box<dyn Resource>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A paused computation, written as an explicit state machine.
pub trait Coroutine: Any {
    fn type_name(&self) -> &'static str;

    /// Runs to the next suspension point. `None` once finished.
    fn resume(&mut self) -> Option<Value>;

    /// Extracts the resume point and locals. Every live value the
    /// computation closes over goes through `capture`.
    fn suspend(&self, capture: &mut CaptureFn<'_>) -> RewindResult<Box<dyn Frame>>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Captured state of a [`Coroutine`]: resume point, plain locals and the
/// node ids of its closed-over values.
pub trait Frame {
    /// A fresh computation paused exactly where the captured one was.
    fn rebuild(&self, restore: &mut RestoreFn<'_>) -> RewindResult<Box<dyn Coroutine>>;
}

pub fn entity_ref<T: Entity>(obj: &ObjRef) -> RewindResult<Ref<'_, T>> {
    let found = obj.borrow().type_name();
    Ref::filter_map(obj.borrow(), |e| e.as_any().downcast_ref::<T>())
        .map_err(|_| RewindError::TypeMismatch { expected: std::any::type_name::<T>(), found })
}

pub fn entity_mut<T: Entity>(obj: &ObjRef) -> RewindResult<RefMut<'_, T>> {
    let found = obj.borrow().type_name();
    RefMut::filter_map(obj.borrow_mut(), |e| e.as_any_mut().downcast_mut::<T>())
        .map_err(|_| RewindError::TypeMismatch { expected: std::any::type_name::<T>(), found })
}

pub fn resource_ref<T: Resource>(res: &ResourceRef) -> RewindResult<Ref<'_, T>> {
    let found = res.borrow().type_name();
    Ref::filter_map(res.borrow(), |r| r.as_any().downcast_ref::<T>())
        .map_err(|_| RewindError::TypeMismatch { expected: std::any::type_name::<T>(), found })
}

pub fn resource_mut<T: Resource>(res: &ResourceRef) -> RewindResult<RefMut<'_, T>> {
    let found = res.borrow().type_name();
    RefMut::filter_map(res.borrow_mut(), |r| r.as_any_mut().downcast_mut::<T>())
        .map_err(|_| RewindError::TypeMismatch { expected: std::any::type_name::<T>(), found })
}

// ── Stock implementations ───────────────────────────────────────

/// An entity whose fields are a plain ordered name → value table.
#[derive(Debug, Clone)]
pub struct Record {
    type_name: &'static str,
    fields:    BTreeMap<String, Value>,
}

impl Record {
    pub fn new(type_name: &'static str) -> Self {
        Self { type_name, fields: BTreeMap::new() }
    }

    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }
}

impl Entity for Record {
    fn type_name(&self) -> &'static str { self.type_name }

    fn fields(&self) -> Option<Vec<Field>> {
        Some(
            self.fields
                .iter()
                .map(|(k, v)| (Cow::Owned(k.clone()), v.clone()))
                .collect(),
        )
    }

    fn set_field(&mut self, name: &str, value: Value) -> RewindResult<()> {
        self.set(name, value);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}

/// A numeric buffer, duplicated wholesale.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Buffer(pub Vec<f64>);

impl Resource for Buffer {
    fn type_name(&self) -> &'static str { "Buffer" }
    fn duplicate(&self) -> Box<dyn Resource> { Box::new(self.clone()) }
    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}

/// A half-open integer range iterator.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeCursor {
    pub next: i64,
    pub end:  i64,
    pub step: i64,
}

impl RangeCursor {
    pub fn new(start: i64, end: i64, step: i64) -> Self {
        assert!(step != 0, "range step must be non-zero");
        Self { next: start, end, step }
    }
}

impl Iterator for RangeCursor {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let more = if self.step > 0 { self.next < self.end } else { self.next > self.end };
        if !more {
            return None;
        }
        let current = self.next;
        // Past the representable range the iteration is over.
        self.next = self.next.checked_add(self.step).unwrap_or(self.end);
        Some(current)
    }
}

impl Resource for RangeCursor {
    fn type_name(&self) -> &'static str { "RangeCursor" }
    fn duplicate(&self) -> Box<dyn Resource> { Box::new(self.clone()) }
    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}
