//! Recording mock host shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use keel_bridge::prelude::*;
use keel_bridge::{abi_fingerprint, NativeFn};

/// Every native call the mock saw: `(symbol, arguments)`.
pub type Calls = Arc<Mutex<Vec<(&'static str, Vec<AbiValue>)>>>;

pub fn new_calls() -> Calls {
    Arc::new(Mutex::new(Vec::new()))
}

/// Symbols of the recorded calls, in order.
pub fn symbols(calls: &Calls) -> Vec<&'static str> {
    calls.lock().unwrap().iter().map(|(s, _)| *s).collect()
}

/// Exports for every catalog operation, each returning the neutral value of
/// its return type, plus both layouts and the current fingerprint.
pub fn recording_exports(calls: &Calls) -> NativeExports {
    exports_with(calls, |_| None)
}

/// Like [`recording_exports`], but `custom` may supply the implementation
/// for any operation. The call is recorded either way.
pub fn exports_with(
    calls: &Calls,
    mut custom: impl FnMut(OpId) -> Option<NativeFn>,
) -> NativeExports {
    let mut exports = NativeExports::new();
    for &op in OpId::ALL {
        let signature = op.signature();
        let calls = Arc::clone(calls);
        let inner = custom(op);
        exports
            .export_signature(signature, move |args| {
                calls.lock().unwrap().push((signature.symbol, args.to_vec()));
                match &inner {
                    Some(f) => f(args),
                    None => AbiValue::neutral(signature.ret),
                }
            })
            .unwrap();
    }
    declare_abi(&mut exports);
    exports
}

pub fn declare_abi(exports: &mut NativeExports) {
    exports
        .declare_layout(Vector2::layout())
        .declare_layout(Vector3::layout())
        .declare_layout(Quaternion::layout())
        .declare_fingerprint(abi_fingerprint());
}

pub fn native(f: impl Fn(&[AbiValue]) -> AbiValue + Send + Sync + 'static) -> Option<NativeFn> {
    Some(Arc::new(f))
}
