//! Subjects implemented by Rust closures over an object heap.

use crate::subject::{Invocation, InvocationResult, Subject};
use evotest_core::{ContextId, FaultKind, InfrastructureFault, Result, TypeDescriptor};
use evotest_ir::{ExecutionContext, ObjectHandle, OperationDescriptor, OperationKind, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Body of a constructor or method.
///
/// Constructors receive the freshly allocated object as receiver; whatever
/// they return on success is replaced by that object.
pub type NativeFn = Arc<dyn Fn(&mut Heap, Option<&Value>, &[Value]) -> Invocation + Send + Sync>;

#[derive(Debug, Clone)]
struct HeapObject {
    ty: TypeDescriptor,
    fields: HashMap<String, Value>,
}

/// Objects and static fields of one subject instance
#[derive(Debug, Clone, Default)]
pub struct Heap {
    objects: Vec<HeapObject>,
    statics: HashMap<String, Value>,
}

impl Heap {
    fn alloc(&mut self, ty: TypeDescriptor, fields: HashMap<String, Value>) -> ObjectHandle {
        self.objects.push(HeapObject {
            ty: ty.clone(),
            fields,
        });
        ObjectHandle {
            id: self.objects.len() as u32,
            ty,
        }
    }

    fn object(&self, handle: &ObjectHandle) -> Option<&HeapObject> {
        let index = (handle.id as usize).checked_sub(1)?;
        self.objects.get(index).filter(|object| object.ty == handle.ty)
    }

    fn object_mut(&mut self, handle: &ObjectHandle) -> Option<&mut HeapObject> {
        let index = (handle.id as usize).checked_sub(1)?;
        self.objects.get_mut(index).filter(|object| object.ty == handle.ty)
    }

    pub fn field(&self, handle: &ObjectHandle, name: &str) -> Option<&Value> {
        self.object(handle)?.fields.get(name)
    }

    /// Returns false if the object does not exist
    pub fn set_field(&mut self, handle: &ObjectHandle, name: &str, value: Value) -> bool {
        match self.object_mut(handle) {
            Some(object) => {
                object.fields.insert(name.to_string(), value);
                true
            }
            None => false,
        }
    }

    /// Field of `this`, for use inside native bodies
    pub fn field_of(&self, this: Option<&Value>, name: &str) -> Option<&Value> {
        match this {
            Some(Value::Object(handle)) => self.field(handle, name),
            _ => None,
        }
    }

    pub fn set_field_of(&mut self, this: Option<&Value>, name: &str, value: Value) -> bool {
        match this {
            Some(Value::Object(handle)) => self.set_field(handle, name, value),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

enum Member {
    Callable(NativeFn),
    Field(Value),
}

struct Entry {
    descriptor: OperationDescriptor,
    member: Member,
    public: bool,
}

/// Immutable operation table shared by every instance of a subject
struct Registry {
    context: ContextId,
    operations: Vec<OperationDescriptor>,
    entries: HashMap<String, Entry>,
    abstract_types: HashSet<TypeDescriptor>,
}

impl Registry {
    fn entry(&self, op: &OperationDescriptor) -> std::result::Result<&Entry, InfrastructureFault> {
        if op.context != self.context {
            return Err(InfrastructureFault::Inaccessible {
                operation: format!("{} (bound to context {})", op.signature(), op.context.0),
            });
        }
        let entry = self
            .entries
            .get(&op.signature())
            .ok_or_else(|| InfrastructureFault::Unsupported {
                operation: op.signature(),
            })?;
        if !entry.public {
            return Err(InfrastructureFault::Inaccessible {
                operation: op.signature(),
            });
        }
        Ok(entry)
    }

    /// Initial instance fields of a new `ty` object
    fn instance_fields(&self, ty: &TypeDescriptor) -> HashMap<String, Value> {
        self.entries
            .values()
            .filter(|e| !e.descriptor.is_static && e.descriptor.owner == *ty)
            .filter_map(|e| match &e.member {
                Member::Field(initial) => Some((e.descriptor.name.clone(), initial.clone())),
                Member::Callable(_) => None,
            })
            .collect()
    }

    fn static_fields(&self) -> HashMap<String, Value> {
        self.entries
            .iter()
            .filter(|(_, e)| e.descriptor.is_static)
            .filter_map(|(signature, e)| match &e.member {
                Member::Field(initial) => Some((signature.clone(), initial.clone())),
                Member::Callable(_) => None,
            })
            .collect()
    }
}

impl ExecutionContext for Registry {
    fn id(&self) -> ContextId {
        self.context
    }

    fn operations(&self) -> &[OperationDescriptor] {
        &self.operations
    }
}

pub struct NativeSubjectBuilder {
    registry: Registry,
}

impl NativeSubjectBuilder {
    /// Objects of `ty` cannot be constructed
    pub fn abstract_class(mut self, ty: TypeDescriptor) -> Self {
        self.registry.abstract_types.insert(ty);
        self
    }

    pub fn operation<F>(self, op: OperationDescriptor, body: F) -> Self
    where
        F: Fn(&mut Heap, Option<&Value>, &[Value]) -> Invocation + Send + Sync + 'static,
    {
        self.add(op, Member::Callable(Arc::new(body)), true)
    }

    /// Registered but not accessible from tests
    pub fn private_operation<F>(self, op: OperationDescriptor, body: F) -> Self
    where
        F: Fn(&mut Heap, Option<&Value>, &[Value]) -> Invocation + Send + Sync + 'static,
    {
        self.add(op, Member::Callable(Arc::new(body)), false)
    }

    pub fn field(self, op: OperationDescriptor, initial: Value) -> Self {
        self.add(op, Member::Field(initial), true)
    }

    fn add(mut self, op: OperationDescriptor, member: Member, public: bool) -> Self {
        let descriptor = op.in_context(self.registry.context);
        if public {
            self.registry.operations.push(descriptor.clone());
        }
        self.registry.entries.insert(
            descriptor.signature(),
            Entry {
                descriptor,
                member,
                public,
            },
        );
        self
    }

    pub fn build(self) -> NativeSubject {
        let registry = Arc::new(self.registry);
        let heap = Heap {
            objects: Vec::new(),
            statics: registry.static_fields(),
        };
        NativeSubject { registry, heap }
    }
}

/// In-process subject
pub struct NativeSubject {
    registry: Arc<Registry>,
    heap: Heap,
}

impl NativeSubject {
    pub fn builder(context: ContextId) -> NativeSubjectBuilder {
        NativeSubjectBuilder {
            registry: Registry {
                context,
                operations: Vec::new(),
                entries: HashMap::new(),
                abstract_types: HashSet::new(),
            },
        }
    }

    /// A fresh instance sharing the operation table
    pub fn fork(&self) -> NativeSubject {
        NativeSubject {
            registry: Arc::clone(&self.registry),
            heap: Heap {
                objects: Vec::new(),
                statics: self.registry.static_fields(),
            },
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }
}

fn bad_arguments(op: &OperationDescriptor, reason: impl Into<String>) -> InfrastructureFault {
    InfrastructureFault::BadArguments {
        operation: op.signature(),
        reason: reason.into(),
    }
}

fn null_pointer(op: &OperationDescriptor) -> Invocation {
    Invocation::raise(
        FaultKind::NullPointer,
        format!("{} on a null receiver", op.qualified_name()),
    )
}

fn check_arguments(op: &OperationDescriptor, args: &[Value]) -> std::result::Result<(), InfrastructureFault> {
    if args.len() != op.params.len() {
        return Err(bad_arguments(
            op,
            format!("expected {} arguments, got {}", op.params.len(), args.len()),
        ));
    }
    for (index, (param, arg)) in op.params.iter().zip(args).enumerate() {
        if !arg.is_instance_of(param) {
            return Err(bad_arguments(
                op,
                format!("argument {} is not a {}", index, param),
            ));
        }
    }
    Ok(())
}

/// The receiver an operation runs on; `Some(Value::Null)` is passed through
fn check_receiver<'v>(
    op: &OperationDescriptor,
    receiver: Option<&'v Value>,
) -> std::result::Result<Option<&'v Value>, InfrastructureFault> {
    if !op.has_receiver() {
        return Ok(None);
    }
    match receiver {
        Some(Value::Null) => Ok(receiver),
        Some(Value::Object(handle)) if handle.ty == op.owner => Ok(receiver),
        Some(other) => Err(bad_arguments(op, format!("receiver {:?} is not a {}", other, op.owner))),
        None => Err(bad_arguments(op, "missing receiver")),
    }
}

impl Subject for NativeSubject {
    fn context(&self) -> &dyn ExecutionContext {
        self.registry.as_ref()
    }

    fn invoke(
        &mut self,
        op: &OperationDescriptor,
        receiver: Option<&Value>,
        args: &[Value],
    ) -> InvocationResult {
        let registry = Arc::clone(&self.registry);
        let entry = registry.entry(op)?;
        let Member::Callable(body) = &entry.member else {
            return Err(InfrastructureFault::Unsupported {
                operation: op.signature(),
            });
        };
        check_arguments(op, args)?;

        if op.kind == OperationKind::Constructor {
            if registry.abstract_types.contains(&op.owner) {
                return Err(InfrastructureFault::Construction {
                    type_name: op.owner.to_string(),
                    reason: "class is abstract".to_string(),
                });
            }
            let handle = self.heap.alloc(op.owner.clone(), registry.instance_fields(&op.owner));
            let this = Value::Object(handle);
            return Ok(match body(&mut self.heap, Some(&this), args) {
                Invocation::Returned(_) => Invocation::Returned(this),
                raised => raised,
            });
        }

        let receiver = check_receiver(op, receiver)?;
        if matches!(receiver, Some(Value::Null)) {
            return Ok(null_pointer(op));
        }
        Ok(body(&mut self.heap, receiver, args))
    }

    fn read_field(&mut self, op: &OperationDescriptor, receiver: Option<&Value>) -> InvocationResult {
        let registry = Arc::clone(&self.registry);
        let entry = registry.entry(op)?;
        if !matches!(entry.member, Member::Field(_)) {
            return Err(InfrastructureFault::Unsupported {
                operation: op.signature(),
            });
        }
        if op.is_static {
            let value = self.heap.statics.get(&op.signature()).cloned();
            return value
                .map(Invocation::Returned)
                .ok_or_else(|| bad_arguments(op, "static field not initialised"));
        }
        match check_receiver(op, receiver)? {
            Some(Value::Object(handle)) => self
                .heap
                .field(handle, &op.name)
                .cloned()
                .map(Invocation::Returned)
                .ok_or_else(|| bad_arguments(op, "receiver has no such field")),
            _ => Ok(null_pointer(op)),
        }
    }

    fn write_field(
        &mut self,
        op: &OperationDescriptor,
        receiver: Option<&Value>,
        value: Value,
    ) -> InvocationResult {
        let registry = Arc::clone(&self.registry);
        let entry = registry.entry(op)?;
        if !matches!(entry.member, Member::Field(_)) {
            return Err(InfrastructureFault::Unsupported {
                operation: op.signature(),
            });
        }
        if !value.is_instance_of(&op.returns) {
            return Err(bad_arguments(op, format!("value is not a {}", op.returns)));
        }
        if op.is_static {
            self.heap.statics.insert(op.signature(), value);
            return Ok(Invocation::Returned(Value::Void));
        }
        match check_receiver(op, receiver)? {
            Some(Value::Object(handle)) => {
                if self.heap.set_field(handle, &op.name, value) {
                    Ok(Invocation::Returned(Value::Void))
                } else {
                    Err(bad_arguments(op, "receiver does not exist"))
                }
            }
            _ => Ok(null_pointer(op)),
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.heap = Heap {
            objects: Vec::new(),
            statics: self.registry.static_fields(),
        };
        Ok(())
    }
}
