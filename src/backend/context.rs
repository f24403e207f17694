// Mon Aug 03 2026 - Alex

use crate::backend::module::ModuleCode;
use crate::backend::{BackendError, ExecutionBackend, OperationTable};
use std::marker::PhantomData;

/// Per-worker isolated runtime instance. Created on the worker's own
/// thread, entered only from that thread, dropped on that thread when
/// the worker exits. The raw-pointer marker keeps the type `!Send`, so
/// the affinity invariant is compiler-enforced.
pub struct ExecutionContext {
    module_name: String,
    table: Box<dyn OperationTable>,
    invocations: u64,
    _affinity: PhantomData<*const ()>,
}

impl ExecutionContext {
    pub fn create(backend: &dyn ExecutionBackend, module: &ModuleCode) -> Result<Self, BackendError> {
        let table = backend.load(&module.name, &module.source)?;

        Ok(Self {
            module_name: module.name.clone(),
            table,
            invocations: 0,
            _affinity: PhantomData,
        })
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn operations(&self) -> Vec<String> {
        self.table.operations()
    }

    pub fn contains(&self, operation: &str) -> bool {
        self.table.contains(operation)
    }

    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    /// Looks up and runs one named operation. At most one invocation is
    /// ever in flight per context; the `&mut` receiver makes that hold.
    pub fn invoke(&mut self, operation: &str, payload: &[u8]) -> Result<Vec<u8>, BackendError> {
        if !self.table.contains(operation) {
            return Err(BackendError::MissingOperation(operation.to_string()));
        }

        self.invocations += 1;
        self.table.invoke(operation, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NativeBackend;

    fn module(source: &str) -> ModuleCode {
        ModuleCode {
            name: "ops".to_string(),
            source: source.to_string(),
        }
    }

    #[test]
    fn test_create_and_invoke() {
        let backend = NativeBackend::new();
        let mut ctx = ExecutionContext::create(&backend, &module("upper\nreverse")).unwrap();

        assert_eq!(ctx.module_name(), "ops");
        assert!(ctx.contains("upper"));
        assert_eq!(ctx.invoke("upper", b"abc").unwrap(), b"ABC");
        assert_eq!(ctx.invoke("reverse", b"abc").unwrap(), b"cba");
        assert_eq!(ctx.invocations(), 2);
    }

    #[test]
    fn test_create_fails_on_bad_module() {
        let backend = NativeBackend::new();
        assert!(ExecutionContext::create(&backend, &module("no-such-builtin")).is_err());
    }

    #[test]
    fn test_missing_operation() {
        let backend = NativeBackend::new();
        let mut ctx = ExecutionContext::create(&backend, &module("upper")).unwrap();

        let err = ctx.invoke("double", b"x").unwrap_err();
        assert!(matches!(err, BackendError::MissingOperation(_)));
        // a failed lookup is not an invocation
        assert_eq!(ctx.invocations(), 0);
    }

    #[test]
    fn test_contexts_do_not_share_state() {
        let backend = NativeBackend::new();
        let mut a = ExecutionContext::create(&backend, &module("calls")).unwrap();
        let mut b = ExecutionContext::create(&backend, &module("calls")).unwrap();

        a.invoke("calls", b"").unwrap();
        a.invoke("calls", b"").unwrap();
        assert_eq!(b.invoke("calls", b"").unwrap(), b"1");
    }
}
