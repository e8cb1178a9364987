//! The `"keel"` host functions a WASM script imports.
//!
//! Every catalog operation is registered under its flat symbol with a
//! lowered signature:
//!
//! | boundary type                        | WASM                           |
//! |--------------------------------------|--------------------------------|
//! | `Handle`                             | `i64`                          |
//! | `Bool`, `I32`, `LogSeverity`, `KeyCode` | `i32`                       |
//! | `F32`                                | `f32`                          |
//! | `Str` parameter                      | `(ptr: i32, len: i32)` UTF-8   |
//! | aggregate parameter                  | `ptr: i32` to packed bytes     |
//! | aggregate return                     | trailing `out_ptr: i32`        |
//! | `Str` return                         | trailing `(ptr, cap)`, returns bytes written |
//!
//! Two extra functions, `self_entity() -> i64` and `self_transform() -> i64`,
//! hand a script the handles of the object it is attached to.
//!
//! Host functions never trap. A bad pointer, an unknown enum ordinal or an
//! error from the bridge is logged at `warn` and the script receives the
//! neutral value of the return type.

use keel_bridge::{
    AbiType, AbiValue, Aggregate, Bridge, Handle, KeyCode, LogSeverity, OpId, Quaternion,
    Signature, Vector2, Vector3,
};
use std::fmt;

use wasmtime::{Caller, Engine, FuncType, Linker, Memory, StoreLimits, Val, ValType};

/// Import namespace for every host function.
pub const IMPORT_MODULE: &str = "keel";

const SELF_ENTITY: &str = "self_entity";
const SELF_TRANSFORM: &str = "self_transform";

// ---------------------------------------------------------------------------
// Store data
// ---------------------------------------------------------------------------

/// Per-instance data held in the Wasmtime store.
pub struct ScriptState {
    pub(crate) bridge: Bridge,
    pub(crate) entity: Handle,
    pub(crate) transform: Handle,
    pub(crate) limits: StoreLimits,
    /// Host functions called since the store was created.
    pub host_calls: u64,
}

impl ScriptState {
    pub(crate) fn new(bridge: Bridge, entity: Handle, transform: Handle, limits: StoreLimits) -> Self {
        Self {
            bridge,
            entity,
            transform,
            limits,
            host_calls: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Lowering
// ---------------------------------------------------------------------------

/// The WASM value types a lowered signature is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WasmType {
    I32,
    I64,
    F32,
}

impl WasmType {
    fn val_type(self) -> ValType {
        match self {
            WasmType::I32 => ValType::I32,
            WasmType::I64 => ValType::I64,
            WasmType::F32 => ValType::F32,
        }
    }

    fn is(self, ty: &ValType) -> bool {
        matches!(
            (self, ty),
            (WasmType::I32, ValType::I32) | (WasmType::I64, ValType::I64) | (WasmType::F32, ValType::F32)
        )
    }
}

impl fmt::Display for WasmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WasmType::I32 => "i32",
            WasmType::I64 => "i64",
            WasmType::F32 => "f32",
        })
    }
}

/// A catalog signature as a WASM function type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoweredSignature {
    pub params: Vec<WasmType>,
    pub results: Vec<WasmType>,
}

impl LoweredSignature {
    /// Whether `ty` has exactly these parameter and result types.
    pub fn matches(&self, ty: &FuncType) -> bool {
        ty.params().len() == self.params.len()
            && ty.results().len() == self.results.len()
            && ty.params().zip(&self.params).all(|(v, w)| w.is(&v))
            && ty.results().zip(&self.results).all(|(v, w)| w.is(&v))
    }
}

impl fmt::Display for LoweredSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_types(f, self.params.iter())?;
        f.write_str(" -> ")?;
        write_types(f, self.results.iter())
    }
}

/// Render a WASM function type the way [`LoweredSignature`] displays.
pub fn describe_func_type(ty: &FuncType) -> String {
    struct Shown<'a>(&'a FuncType);
    impl fmt::Display for Shown<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write_types(f, self.0.params())?;
            f.write_str(" -> ")?;
            write_types(f, self.0.results())
        }
    }
    Shown(ty).to_string()
}

fn write_types<T: fmt::Display>(f: &mut fmt::Formatter<'_>, types: impl Iterator<Item = T>) -> fmt::Result {
    f.write_str("(")?;
    for (i, ty) in types.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{ty}")?;
    }
    f.write_str(")")
}

/// Lower a boundary signature to the WASM function type scripts import.
pub fn lower_signature(sig: &Signature) -> LoweredSignature {
    let mut params = Vec::with_capacity(sig.params.len() + 2);
    for ty in sig.params {
        match ty {
            AbiType::Void => {}
            AbiType::Bool | AbiType::I32 | AbiType::LogSeverity | AbiType::KeyCode => {
                params.push(WasmType::I32)
            }
            AbiType::F32 => params.push(WasmType::F32),
            AbiType::Handle => params.push(WasmType::I64),
            AbiType::Str => params.extend([WasmType::I32, WasmType::I32]),
            AbiType::Vector2 | AbiType::Vector3 | AbiType::Quaternion => {
                params.push(WasmType::I32)
            }
        }
    }

    let results = match sig.ret {
        AbiType::Void => Vec::new(),
        AbiType::Bool | AbiType::I32 | AbiType::LogSeverity | AbiType::KeyCode => {
            vec![WasmType::I32]
        }
        AbiType::F32 => vec![WasmType::F32],
        AbiType::Handle => vec![WasmType::I64],
        AbiType::Vector2 | AbiType::Vector3 | AbiType::Quaternion => {
            params.push(WasmType::I32);
            Vec::new()
        }
        AbiType::Str => {
            params.extend([WasmType::I32, WasmType::I32]);
            vec![WasmType::I32]
        }
    };

    LoweredSignature { params, results }
}

/// Number of trailing lowered parameters that describe where a return value
/// is written rather than an argument.
fn trailing_params(ret: AbiType) -> usize {
    match ret {
        AbiType::Vector2 | AbiType::Vector3 | AbiType::Quaternion => 1,
        AbiType::Str => 2,
        _ => 0,
    }
}

/// The function type a `"keel"` import named `name` must have, or `None`
/// if no host function answers that name.
pub fn expected_import(name: &str) -> Option<LoweredSignature> {
    if name == SELF_ENTITY || name == SELF_TRANSFORM {
        return Some(LoweredSignature {
            params: Vec::new(),
            results: vec![WasmType::I64],
        });
    }
    OpId::from_symbol(name).map(|op| lower_signature(op.signature()))
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Register every catalog operation plus `self_entity`/`self_transform`.
pub fn register_bridge_api(linker: &mut Linker<ScriptState>, engine: &Engine) -> anyhow::Result<()> {
    for &op in OpId::ALL {
        let sig = op.signature();
        let lowered = lower_signature(sig);
        let ty = FuncType::new(
            engine,
            lowered.params.iter().map(|t| t.val_type()),
            lowered.results.iter().map(|t| t.val_type()),
        );
        linker.func_new(IMPORT_MODULE, sig.symbol, ty, move |mut caller, params, results| {
            dispatch(&mut caller, op, params, results);
            Ok(())
        })?;
    }

    linker.func_wrap(IMPORT_MODULE, SELF_ENTITY, |caller: Caller<'_, ScriptState>| -> i64 {
        caller.data().entity.to_raw() as i64
    })?;
    linker.func_wrap(IMPORT_MODULE, SELF_TRANSFORM, |caller: Caller<'_, ScriptState>| -> i64 {
        caller.data().transform.to_raw() as i64
    })?;

    Ok(())
}

fn dispatch(caller: &mut Caller<'_, ScriptState>, op: OpId, params: &[Val], results: &mut [Val]) {
    let sig = op.signature();
    caller.data_mut().host_calls += 1;

    let value = match lift_args(caller, sig, params) {
        Ok(args) => match caller.data().bridge.invoke(op, &args) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(op = %sig.name, error = %e, "bridge call from WASM failed, returning neutral value");
                AbiValue::neutral(sig.ret)
            }
        },
        Err(reason) => {
            tracing::warn!(op = %sig.name, %reason, "malformed arguments from WASM, returning neutral value");
            AbiValue::neutral(sig.ret)
        }
    };

    let trailing = &params[params.len().saturating_sub(trailing_params(sig.ret))..];
    lower_return(caller, sig, value, trailing, results);
}

// ---------------------------------------------------------------------------
// Lifting arguments
// ---------------------------------------------------------------------------

fn lift_args(
    caller: &mut Caller<'_, ScriptState>,
    sig: &Signature,
    params: &[Val],
) -> Result<Vec<AbiValue>, String> {
    let mut cursor = 0usize;
    let mut args = Vec::with_capacity(sig.params.len());

    for ty in sig.params {
        let value = match ty {
            AbiType::Void => continue,
            AbiType::Bool => AbiValue::Bool(next_i32(params, &mut cursor)? != 0),
            AbiType::I32 => AbiValue::I32(next_i32(params, &mut cursor)?),
            AbiType::F32 => AbiValue::F32(next_f32(params, &mut cursor)?),
            AbiType::Handle => {
                AbiValue::Handle(Handle::from_raw(next_i64(params, &mut cursor)? as u64))
            }
            AbiType::LogSeverity => {
                let raw = next_i32(params, &mut cursor)?;
                LogSeverity::from_ordinal(raw as u32)
                    .map(AbiValue::LogSeverity)
                    .ok_or_else(|| format!("unknown LogSeverity ordinal {raw}"))?
            }
            AbiType::KeyCode => {
                let raw = next_i32(params, &mut cursor)?;
                KeyCode::from_ordinal(raw as u32)
                    .map(AbiValue::KeyCode)
                    .ok_or_else(|| format!("unknown KeyCode ordinal {raw}"))?
            }
            AbiType::Str => {
                let ptr = next_i32(params, &mut cursor)?;
                let len = next_i32(params, &mut cursor)?;
                AbiValue::Str(read_string(caller, ptr, len)?)
            }
            AbiType::Vector2 => {
                let ptr = next_i32(params, &mut cursor)?;
                AbiValue::Vector2(read_aggregate::<Vector2>(caller, ptr)?)
            }
            AbiType::Vector3 => {
                let ptr = next_i32(params, &mut cursor)?;
                AbiValue::Vector3(read_aggregate::<Vector3>(caller, ptr)?)
            }
            AbiType::Quaternion => {
                let ptr = next_i32(params, &mut cursor)?;
                AbiValue::Quaternion(read_aggregate::<Quaternion>(caller, ptr)?)
            }
        };
        args.push(value);
    }

    Ok(args)
}

fn next_val<'a>(params: &'a [Val], cursor: &mut usize) -> Result<&'a Val, String> {
    let val = params
        .get(*cursor)
        .ok_or_else(|| format!("missing lowered argument {cursor}"))?;
    *cursor += 1;
    Ok(val)
}

fn next_i32(params: &[Val], cursor: &mut usize) -> Result<i32, String> {
    next_val(params, cursor)?
        .i32()
        .ok_or_else(|| "expected i32".to_owned())
}

fn next_i64(params: &[Val], cursor: &mut usize) -> Result<i64, String> {
    next_val(params, cursor)?
        .i64()
        .ok_or_else(|| "expected i64".to_owned())
}

fn next_f32(params: &[Val], cursor: &mut usize) -> Result<f32, String> {
    next_val(params, cursor)?
        .f32()
        .ok_or_else(|| "expected f32".to_owned())
}

// ---------------------------------------------------------------------------
// Linear memory access
// ---------------------------------------------------------------------------

fn memory(caller: &mut Caller<'_, ScriptState>) -> Result<Memory, String> {
    caller
        .get_export("memory")
        .and_then(|e| e.into_memory())
        .ok_or_else(|| "no exported memory".to_owned())
}

/// Copy `len` bytes out of the script's linear memory.
fn read_bytes(caller: &mut Caller<'_, ScriptState>, ptr: i32, len: usize) -> Result<Vec<u8>, String> {
    let memory = memory(caller)?;
    let data = memory.data(&*caller);
    let start = ptr as u32 as usize;
    let end = start
        .checked_add(len)
        .ok_or_else(|| "pointer overflow".to_owned())?;
    data.get(start..end).map(<[u8]>::to_vec).ok_or_else(|| {
        format!(
            "memory access out of bounds: [{start}..{end}) exceeds {} bytes",
            data.len()
        )
    })
}

fn read_string(caller: &mut Caller<'_, ScriptState>, ptr: i32, len: i32) -> Result<String, String> {
    if len < 0 {
        return Err(format!("negative string length {len}"));
    }
    let bytes = read_bytes(caller, ptr, len as usize)?;
    String::from_utf8(bytes).map_err(|e| format!("invalid UTF-8: {e}"))
}

fn read_aggregate<A: Aggregate>(caller: &mut Caller<'_, ScriptState>, ptr: i32) -> Result<A, String> {
    let bytes = read_bytes(caller, ptr, std::mem::size_of::<A>())?;
    A::read_unaligned(&bytes).ok_or_else(|| "aggregate size mismatch".to_owned())
}

fn write_bytes(caller: &mut Caller<'_, ScriptState>, ptr: i32, bytes: &[u8]) -> Result<(), String> {
    let memory = memory(caller)?;
    memory
        .write(&mut *caller, ptr as u32 as usize, bytes)
        .map_err(|e| format!("memory write failed: {e}"))
}

// ---------------------------------------------------------------------------
// Lowering return values
// ---------------------------------------------------------------------------

fn lower_return(
    caller: &mut Caller<'_, ScriptState>,
    sig: &Signature,
    value: AbiValue,
    trailing: &[Val],
    results: &mut [Val],
) {
    let scalar = match value {
        AbiValue::Void => None,
        AbiValue::Bool(b) => Some(Val::I32(i32::from(b))),
        AbiValue::I32(v) => Some(Val::I32(v)),
        AbiValue::F32(v) => Some(Val::F32(v.to_bits())),
        AbiValue::Handle(h) => Some(Val::I64(h.to_raw() as i64)),
        AbiValue::LogSeverity(s) => Some(Val::I32(s.ordinal() as i32)),
        AbiValue::KeyCode(k) => Some(Val::I32(k.ordinal() as i32)),
        AbiValue::Vector2(v) => {
            write_out(caller, sig, trailing, v.as_bytes());
            None
        }
        AbiValue::Vector3(v) => {
            write_out(caller, sig, trailing, v.as_bytes());
            None
        }
        AbiValue::Quaternion(q) => {
            write_out(caller, sig, trailing, q.as_bytes());
            None
        }
        AbiValue::Str(s) => Some(Val::I32(write_str(caller, sig, trailing, &s))),
    };

    if let (Some(val), Some(slot)) = (scalar, results.first_mut()) {
        *slot = val;
    }
}

fn write_out(caller: &mut Caller<'_, ScriptState>, sig: &Signature, trailing: &[Val], bytes: &[u8]) {
    let Some(out_ptr) = trailing.first().and_then(Val::i32) else {
        return;
    };
    if let Err(reason) = write_bytes(caller, out_ptr, bytes) {
        tracing::warn!(op = %sig.name, %reason, "could not write result into WASM memory");
    }
}

/// Copy as much of `s` as fits in the caller's buffer, never splitting a
/// UTF-8 sequence. Returns the number of bytes written.
fn write_str(caller: &mut Caller<'_, ScriptState>, sig: &Signature, trailing: &[Val], s: &str) -> i32 {
    let (Some(ptr), Some(cap)) = (
        trailing.first().and_then(Val::i32),
        trailing.get(1).and_then(Val::i32),
    ) else {
        return 0;
    };

    let mut len = s.len().min(cap.max(0) as usize);
    while !s.is_char_boundary(len) {
        len -= 1;
    }

    match write_bytes(caller, ptr, &s.as_bytes()[..len]) {
        Ok(()) => len as i32,
        Err(reason) => {
            tracing::warn!(op = %sig.name, %reason, "could not write string into WASM memory");
            0
        }
    }
}
