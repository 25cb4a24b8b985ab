//! Subjects backed by a WebAssembly module.
//!
//! The module is treated as a single class: every exported function is a
//! static method, every exported global a static field. Traps raised while a
//! function runs are subject faults; anything else going wrong around the
//! call is an infrastructure fault.

use crate::subject::{Invocation, InvocationResult, Subject};
use evotest_core::{
    ContextId, Error, ExecutionConfig, FaultKind, InfrastructureFault, Result, TypeDescriptor,
};
use evotest_ir::{ExecutionContext, OperationCatalog, OperationDescriptor, OperationKind, Value};
use wasmtime::*;

fn wasm_error(what: &str, err: anyhow::Error) -> Error {
    Error::Wasm(format!("{}: {}", what, err))
}

fn descriptor_type(ty: &ValType) -> Option<TypeDescriptor> {
    match ty {
        ValType::I32 => Some(TypeDescriptor::Int),
        ValType::I64 => Some(TypeDescriptor::Long),
        ValType::F32 => Some(TypeDescriptor::Float),
        ValType::F64 => Some(TypeDescriptor::Double),
        _ => None,
    }
}

fn to_val(value: &Value) -> Option<Val> {
    match value {
        Value::Bool(v) => Some(Val::I32(*v as i32)),
        Value::Char(v) => Some(Val::I32(*v as i32)),
        Value::Byte(v) => Some(Val::I32(*v as i32)),
        Value::Short(v) => Some(Val::I32(*v as i32)),
        Value::Int(v) => Some(Val::I32(*v)),
        Value::Long(v) => Some(Val::I64(*v)),
        Value::Float(v) => Some(Val::F32(v.to_bits())),
        Value::Double(v) => Some(Val::F64(v.to_bits())),
        _ => None,
    }
}

fn from_val(val: &Val) -> Option<Value> {
    match val {
        Val::I32(v) => Some(Value::Int(*v)),
        Val::I64(v) => Some(Value::Long(*v)),
        Val::F32(bits) => Some(Value::Float(f32::from_bits(*bits))),
        Val::F64(bits) => Some(Value::Double(f64::from_bits(*bits))),
        _ => None,
    }
}

/// Subject fault kind for a wasm trap
pub fn trap_fault(trap: &Trap) -> FaultKind {
    match trap {
        Trap::IntegerDivisionByZero | Trap::IntegerOverflow => FaultKind::Arithmetic,
        Trap::MemoryOutOfBounds | Trap::TableOutOfBounds => FaultKind::IndexOutOfBounds,
        Trap::StackOverflow => FaultKind::StackOverflow,
        Trap::UnreachableCodeReached => FaultKind::Unreachable,
        Trap::IndirectCallToNull => FaultKind::NullPointer,
        other => FaultKind::Custom(format!("{:?}", other)),
    }
}

/// Operations exposed by the exports of `module`
fn export_catalog(module: &Module, owner: &TypeDescriptor, context: ContextId) -> OperationCatalog {
    let mut catalog = OperationCatalog::new(context);
    for export in module.exports() {
        match export.ty() {
            ExternType::Func(func) => {
                let params: Option<Vec<TypeDescriptor>> = func.params().map(|p| descriptor_type(&p)).collect();
                let mut results = func.results();
                let returns = match (results.next(), results.next()) {
                    (None, _) => Some(TypeDescriptor::Void),
                    (Some(ty), None) => descriptor_type(&ty),
                    (Some(_), Some(_)) => None,
                };
                match (params, returns) {
                    (Some(params), Some(returns)) => catalog.add(OperationDescriptor::static_method(
                        owner.clone(),
                        export.name(),
                        params,
                        returns,
                    )),
                    _ => tracing::debug!(export = export.name(), "skipping function with unsupported signature"),
                }
            }
            ExternType::Global(global) => {
                if let Some(ty) = descriptor_type(global.content()) {
                    catalog.add(OperationDescriptor::field(owner.clone(), export.name(), ty).with_static(true));
                }
            }
            _ => {}
        }
    }
    catalog
}

/// A WebAssembly module under test, instantiated in its own store
pub struct WasmSubject {
    engine: Engine,
    module: Module,
    linker: Linker<()>,
    store: Store<()>,
    instance: Instance,
    catalog: OperationCatalog,
}

impl WasmSubject {
    /// Compile `bytes` (binary or text format) as class `class`
    pub fn new(bytes: &[u8], class: &str, context: ContextId, config: &ExecutionConfig) -> Result<Self> {
        let mut wasm_config = Config::new();
        wasm_config.max_wasm_stack(config.max_wasm_stack);

        let engine = Engine::new(&wasm_config).map_err(|e| wasm_error("Failed to create engine", e))?;
        let module = Module::new(&engine, bytes).map_err(|e| wasm_error("Failed to compile module", e))?;
        let linker = Linker::new(&engine);
        let mut store = Store::new(&engine, ());
        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| wasm_error("Failed to instantiate", e))?;

        let catalog = export_catalog(&module, &TypeDescriptor::object(class), context);
        tracing::debug!(class, operations = catalog.len(), "loaded wasm subject");

        Ok(Self {
            engine,
            module,
            linker,
            store,
            instance,
            catalog,
        })
    }

    /// Bound operation of this module named `name`
    pub fn operation(&self, name: &str) -> Option<&OperationDescriptor> {
        self.catalog.operations().iter().find(|op| op.name == name)
    }

    fn check(&self, op: &OperationDescriptor, kind: OperationKind) -> std::result::Result<(), InfrastructureFault> {
        if op.context != self.catalog.id() {
            return Err(InfrastructureFault::Inaccessible {
                operation: format!("{} (bound to context {})", op.signature(), op.context.0),
            });
        }
        if op.kind == OperationKind::Constructor {
            return Err(InfrastructureFault::Construction {
                type_name: op.owner.to_string(),
                reason: "module classes have no constructors".to_string(),
            });
        }
        let known = self
            .catalog
            .operations()
            .iter()
            .any(|candidate| candidate.kind == kind && candidate.same_signature(op));
        if known {
            Ok(())
        } else {
            Err(InfrastructureFault::Unsupported {
                operation: op.signature(),
            })
        }
    }

    fn global(&mut self, op: &OperationDescriptor) -> std::result::Result<Global, InfrastructureFault> {
        self.instance
            .get_global(&mut self.store, &op.name)
            .ok_or_else(|| InfrastructureFault::Unsupported {
                operation: op.signature(),
            })
    }
}

fn bad_arguments(op: &OperationDescriptor, reason: impl Into<String>) -> InfrastructureFault {
    InfrastructureFault::BadArguments {
        operation: op.signature(),
        reason: reason.into(),
    }
}

impl Subject for WasmSubject {
    fn context(&self) -> &dyn ExecutionContext {
        &self.catalog
    }

    fn invoke(
        &mut self,
        op: &OperationDescriptor,
        _receiver: Option<&Value>,
        args: &[Value],
    ) -> InvocationResult {
        self.check(op, OperationKind::Method)?;
        if args.len() != op.params.len() {
            return Err(bad_arguments(
                op,
                format!("expected {} arguments, got {}", op.params.len(), args.len()),
            ));
        }
        let params = op
            .params
            .iter()
            .zip(args)
            .map(|(param, arg)| match to_val(arg) {
                Some(val) if arg.is_instance_of(param) => Ok(val),
                _ => Err(bad_arguments(op, format!("{:?} is not a {}", arg, param))),
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let func = self
            .instance
            .get_func(&mut self.store, &op.name)
            .ok_or_else(|| InfrastructureFault::Unsupported {
                operation: op.signature(),
            })?;
        let mut results = vec![Val::I32(0); func.ty(&self.store).results().len()];

        match func.call(&mut self.store, &params, &mut results) {
            Ok(()) => match results.first() {
                None => Ok(Invocation::Returned(Value::Void)),
                Some(val) => from_val(val)
                    .map(Invocation::Returned)
                    .ok_or_else(|| bad_arguments(op, "unsupported result type")),
            },
            Err(e) => match e.downcast_ref::<Trap>() {
                Some(trap) => {
                    tracing::trace!(operation = %op, %trap, "wasm trap");
                    Ok(Invocation::raise(trap_fault(trap), trap.to_string()))
                }
                None => Err(bad_arguments(op, e.to_string())),
            },
        }
    }

    fn read_field(&mut self, op: &OperationDescriptor, _receiver: Option<&Value>) -> InvocationResult {
        self.check(op, OperationKind::Field)?;
        let global = self.global(op)?;
        from_val(&global.get(&mut self.store))
            .map(Invocation::Returned)
            .ok_or_else(|| bad_arguments(op, "unsupported global type"))
    }

    fn write_field(
        &mut self,
        op: &OperationDescriptor,
        _receiver: Option<&Value>,
        value: Value,
    ) -> InvocationResult {
        self.check(op, OperationKind::Field)?;
        let global = self.global(op)?;
        if global.ty(&self.store).mutability() == Mutability::Const {
            return Err(InfrastructureFault::Inaccessible {
                operation: op.signature(),
            });
        }
        let val = match to_val(&value) {
            Some(val) if value.is_instance_of(&op.returns) => val,
            _ => return Err(bad_arguments(op, format!("value is not a {}", op.returns))),
        };
        global
            .set(&mut self.store, val)
            .map_err(|e| bad_arguments(op, e.to_string()))?;
        Ok(Invocation::Returned(Value::Void))
    }

    fn reset(&mut self) -> Result<()> {
        let mut store = Store::new(&self.engine, ());
        self.instance = self
            .linker
            .instantiate(&mut store, &self.module)
            .map_err(|e| wasm_error("Failed to instantiate", e))?;
        self.store = store;
        Ok(())
    }
}
