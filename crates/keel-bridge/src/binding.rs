//! Bind-time resolution of the catalog against the host's exports.
//!
//! The host describes what it offers as [`NativeExports`]. [`BindingTable::bind`]
//! resolves every catalog [`Signature`] to exactly one export, checks the
//! aggregate layouts and the ABI fingerprint, and produces a slot table
//! indexed by [`OpId`]. After that no call ever looks anything up by name.
//!
//! # Call guard
//!
//! [`BindingTable::invoke`] is the only path into native code. In order it:
//!
//! 1. checks argument count and types against the signature (configurable),
//! 2. rejects any null [`Handle`](crate::Handle) argument,
//! 3. calls the native function under `catch_unwind`, so a native panic
//!    becomes [`BridgeError::NativeFault`] instead of unwinding into script
//!    code,
//! 4. checks the returned value against the declared return type.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::abi::{type_list, AbiType, AbiValue};
use crate::catalog::{abi_fingerprint, OpId, Signature};
use crate::config::BridgeConfig;
use crate::layout::{Aggregate, AggregateLayout};
use crate::value::{Quaternion, Vector2, Vector3};
use crate::{panic_message, BridgeError};

/// A native implementation of one catalog operation.
///
/// Receives arguments already checked against the declared signature and
/// must return a value of the declared return type.
pub type NativeFn = Arc<dyn Fn(&[AbiValue]) -> AbiValue + Send + Sync>;

// ---------------------------------------------------------------------------
// BindError
// ---------------------------------------------------------------------------

/// Fatal load-time failures. Any of these means the host and the script side
/// were built against different declarations.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// One or more declared operations have no native implementation.
    #[error("unresolved native binding(s): {}", .missing.join("; "))]
    Unresolved {
        /// Every unresolved signature, in catalog order.
        missing: Vec<String>,
    },

    /// Name and parameters match but the host returns a different type.
    #[error("native '{signature}' is exported with return type {native}")]
    ReturnTypeMismatch { signature: String, native: AbiType },

    /// The host did not declare a layout for an aggregate the catalog uses.
    #[error("host declares no layout for aggregate '{aggregate}'")]
    MissingLayout { aggregate: String },

    /// The host's layout for an aggregate differs from the managed one.
    #[error("layout mismatch for '{aggregate}': managed {managed}, native {native}")]
    LayoutMismatch {
        aggregate: String,
        managed: String,
        native: String,
    },

    /// The host declared a different ABI fingerprint, or none when one is
    /// required.
    #[error("ABI fingerprint mismatch: managed {managed}, native {native}")]
    FingerprintMismatch { managed: String, native: String },

    /// The host registered the same name and parameter list twice.
    #[error("native export '{signature}' registered twice")]
    DuplicateExport { signature: String },
}

// ---------------------------------------------------------------------------
// NativeExports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ExportKey {
    name: String,
    params: Vec<AbiType>,
}

impl ExportKey {
    fn of(signature: &Signature) -> Self {
        Self {
            name: signature.name.to_owned(),
            params: signature.params.to_vec(),
        }
    }
}

#[derive(Clone)]
struct NativeExport {
    ret: AbiType,
    func: NativeFn,
}

/// Everything the host offers to bind against.
#[derive(Clone, Default)]
pub struct NativeExports {
    entries: HashMap<ExportKey, NativeExport>,
    layouts: HashMap<String, AggregateLayout>,
    fingerprint: Option<String>,
}

impl NativeExports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a native function under `name` with the given parameter list
    /// and return type.
    ///
    /// # Errors
    ///
    /// [`BindError::DuplicateExport`] if `name` with the same parameter list
    /// is already registered.
    pub fn export<F>(
        &mut self,
        name: &str,
        params: &[AbiType],
        ret: AbiType,
        func: F,
    ) -> Result<&mut Self, BindError>
    where
        F: Fn(&[AbiValue]) -> AbiValue + Send + Sync + 'static,
    {
        let key = ExportKey {
            name: name.to_owned(),
            params: params.to_vec(),
        };
        if self.entries.contains_key(&key) {
            return Err(BindError::DuplicateExport {
                signature: format!("{name}({})", type_list(params.iter().copied())),
            });
        }
        self.entries.insert(
            key,
            NativeExport {
                ret,
                func: Arc::new(func),
            },
        );
        Ok(self)
    }

    /// Register a native function for exactly the declared signature.
    pub fn export_signature<F>(
        &mut self,
        signature: &Signature,
        func: F,
    ) -> Result<&mut Self, BindError>
    where
        F: Fn(&[AbiValue]) -> AbiValue + Send + Sync + 'static,
    {
        self.export(signature.name, signature.params, signature.ret, func)
    }

    /// Declare the host's layout for a value aggregate.
    pub fn declare_layout(&mut self, layout: AggregateLayout) -> &mut Self {
        self.layouts.insert(layout.name.clone(), layout);
        self
    }

    /// Declare the ABI fingerprint the host was built against.
    pub fn declare_fingerprint(&mut self, fingerprint: impl Into<String>) -> &mut Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// Whether a function is registered for `name` with these parameters.
    pub fn contains(&self, name: &str, params: &[AbiType]) -> bool {
        self.entries.contains_key(&ExportKey {
            name: name.to_owned(),
            params: params.to_vec(),
        })
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for NativeExports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeExports")
            .field("functions", &self.entries.len())
            .field("layouts", &self.layouts.keys().collect::<Vec<_>>())
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// BindingTable
// ---------------------------------------------------------------------------

/// The resolved, immutable mapping from catalog operations to native
/// functions.
pub struct BindingTable {
    /// One slot per [`OpId`], in catalog order.
    slots: Box<[NativeFn]>,
    config: BridgeConfig,
    fingerprint: String,
}

impl BindingTable {
    /// Resolve every catalog operation against `exports`.
    ///
    /// Checks run in this order: fingerprint, operations, aggregate layouts.
    /// Exports outside the catalog are ignored.
    ///
    /// # Errors
    ///
    /// Any [`BindError`]; all of them are fatal for the script runtime.
    pub fn bind(exports: &NativeExports, config: BridgeConfig) -> Result<Self, BindError> {
        let fingerprint = abi_fingerprint();
        match &exports.fingerprint {
            Some(native) if *native != fingerprint => {
                return Err(BindError::FingerprintMismatch {
                    managed: fingerprint,
                    native: native.clone(),
                });
            }
            None if config.require_fingerprint => {
                return Err(BindError::FingerprintMismatch {
                    managed: fingerprint,
                    native: "<undeclared>".to_owned(),
                });
            }
            _ => {}
        }

        let mut slots = Vec::with_capacity(OpId::ALL.len());
        let mut missing = Vec::new();
        for op in OpId::ALL {
            let signature = op.signature();
            match exports.entries.get(&ExportKey::of(signature)) {
                Some(export) if export.ret == signature.ret => {
                    slots.push(Arc::clone(&export.func));
                }
                Some(export) => {
                    return Err(BindError::ReturnTypeMismatch {
                        signature: signature.to_string(),
                        native: export.ret,
                    });
                }
                None => missing.push(signature.to_string()),
            }
        }
        if !missing.is_empty() {
            tracing::error!(count = missing.len(), "native bindings unresolved");
            return Err(BindError::Unresolved { missing });
        }

        check_layout(exports, Vector2::layout())?;
        check_layout(exports, Vector3::layout())?;
        check_layout(exports, Quaternion::layout())?;

        let extra = exports.entries.len() - slots.len();
        if extra > 0 {
            tracing::debug!(extra, "host exports operations outside the catalog");
        }
        tracing::info!(
            operations = slots.len(),
            fingerprint = %fingerprint,
            "binding table built"
        );

        Ok(Self {
            slots: slots.into_boxed_slice(),
            config,
            fingerprint,
        })
    }

    /// Call a bound operation through the boundary guard.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::ArgumentMismatch`] if `args` do not fit the signature.
    /// - [`BridgeError::NullHandle`] if any handle argument is null; the
    ///   native function is not called.
    /// - [`BridgeError::NativeFault`] if the native function panicked.
    /// - [`BridgeError::ReturnMismatch`] if it returned the wrong type.
    pub fn invoke(&self, op: OpId, args: &[AbiValue]) -> Result<AbiValue, BridgeError> {
        let signature = op.signature();

        if self.config.check_arguments {
            check_arguments(signature, args)?;
        }
        if args
            .iter()
            .any(|arg| matches!(arg, AbiValue::Handle(h) if h.is_null()))
        {
            tracing::debug!(op = signature.name, "null handle rejected");
            return Err(BridgeError::NullHandle { op: signature.name });
        }

        let func = &self.slots[op as usize];
        let result = panic::catch_unwind(AssertUnwindSafe(|| func(args))).map_err(|payload| {
            let message = panic_message(payload.as_ref());
            tracing::error!(op = %signature, error = %message, "native function panicked");
            BridgeError::NativeFault {
                op: signature.to_string(),
                message,
            }
        })?;

        if result.abi_type() != signature.ret {
            return Err(BridgeError::ReturnMismatch {
                op: signature.to_string(),
                expected: signature.ret,
                found: result.abi_type(),
            });
        }

        tracing::trace!(op = signature.symbol, "bridge call");
        Ok(result)
    }

    // -- typed call helpers -------------------------------------------------

    pub fn call_void(&self, op: OpId, args: &[AbiValue]) -> Result<(), BridgeError> {
        self.invoke(op, args).map(|_| ())
    }

    pub fn call_bool(&self, op: OpId, args: &[AbiValue]) -> Result<bool, BridgeError> {
        let value = self.invoke(op, args)?;
        value.as_bool().ok_or_else(|| wrong_return(op, AbiType::Bool, &value))
    }

    pub fn call_f32(&self, op: OpId, args: &[AbiValue]) -> Result<f32, BridgeError> {
        let value = self.invoke(op, args)?;
        value.as_f32().ok_or_else(|| wrong_return(op, AbiType::F32, &value))
    }

    pub fn call_str(&self, op: OpId, args: &[AbiValue]) -> Result<String, BridgeError> {
        match self.invoke(op, args)? {
            AbiValue::Str(s) => Ok(s),
            other => Err(wrong_return(op, AbiType::Str, &other)),
        }
    }

    pub fn call_vector2(&self, op: OpId, args: &[AbiValue]) -> Result<Vector2, BridgeError> {
        let value = self.invoke(op, args)?;
        value
            .as_vector2()
            .ok_or_else(|| wrong_return(op, AbiType::Vector2, &value))
    }

    pub fn call_vector3(&self, op: OpId, args: &[AbiValue]) -> Result<Vector3, BridgeError> {
        let value = self.invoke(op, args)?;
        value
            .as_vector3()
            .ok_or_else(|| wrong_return(op, AbiType::Vector3, &value))
    }

    pub fn call_quaternion(&self, op: OpId, args: &[AbiValue]) -> Result<Quaternion, BridgeError> {
        let value = self.invoke(op, args)?;
        value
            .as_quaternion()
            .ok_or_else(|| wrong_return(op, AbiType::Quaternion, &value))
    }

    // -- accessors ----------------------------------------------------------

    /// Number of bound operations (always the catalog size).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The ABI fingerprint this table was bound under.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl fmt::Debug for BindingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingTable")
            .field("operations", &self.slots.len())
            .field("config", &self.config)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

fn check_layout(exports: &NativeExports, managed: AggregateLayout) -> Result<(), BindError> {
    match exports.layouts.get(&managed.name) {
        None => Err(BindError::MissingLayout {
            aggregate: managed.name,
        }),
        Some(native) if *native != managed => Err(BindError::LayoutMismatch {
            aggregate: managed.name.clone(),
            managed: managed.to_string(),
            native: native.to_string(),
        }),
        Some(_) => Ok(()),
    }
}

fn check_arguments(signature: &Signature, args: &[AbiValue]) -> Result<(), BridgeError> {
    let fits = args.len() == signature.params.len()
        && args
            .iter()
            .zip(signature.params)
            .all(|(arg, param)| arg.abi_type() == *param);
    if fits {
        Ok(())
    } else {
        Err(BridgeError::ArgumentMismatch {
            op: signature.to_string(),
            expected: type_list(signature.params.iter().copied()),
            found: type_list(args.iter().map(AbiValue::abi_type)),
        })
    }
}

fn wrong_return(op: OpId, expected: AbiType, found: &AbiValue) -> BridgeError {
    BridgeError::ReturnMismatch {
        op: op.signature().to_string(),
        expected,
        found: found.abi_type(),
    }
}

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

/// Shared, read-only access to a bound [`BindingTable`].
///
/// Built once at load time; every wrapper object and facade call goes
/// through a clone of it.
#[derive(Clone)]
pub struct Bridge(Arc<BindingTable>);

impl Bridge {
    /// Bind with the default [`BridgeConfig`].
    pub fn bind(exports: &NativeExports) -> Result<Self, BindError> {
        Self::bind_with_config(exports, BridgeConfig::default())
    }

    pub fn bind_with_config(
        exports: &NativeExports,
        config: BridgeConfig,
    ) -> Result<Self, BindError> {
        BindingTable::bind(exports, config).map(|table| Bridge(Arc::new(table)))
    }

    pub fn table(&self) -> &BindingTable {
        &self.0
    }
}

impl Deref for Bridge {
    type Target = BindingTable;

    fn deref(&self) -> &BindingTable {
        &self.0
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Bridge").field(&*self.0).finish()
    }
}
