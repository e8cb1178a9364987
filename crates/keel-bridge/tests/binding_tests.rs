//! Integration tests for binding, the call guard, wrappers and facades.

mod common;

use common::{declare_abi, exports_with, native, new_calls, recording_exports, symbols};
use keel_bridge::prelude::*;
use keel_bridge::{abi_fingerprint, catalog::CATALOG, AggregateLayout};
use proptest::prelude::*;

fn bound(calls: &common::Calls) -> Bridge {
    Bridge::bind(&recording_exports(calls)).unwrap()
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

#[test]
fn full_exports_bind_every_operation() {
    let calls = new_calls();
    let bridge = bound(&calls);
    assert_eq!(bridge.len(), CATALOG.len());
    assert_eq!(bridge.fingerprint(), abi_fingerprint());
    assert!(symbols(&calls).is_empty(), "binding must not call natives");
}

#[test]
fn binding_twice_yields_equivalent_tables() {
    let calls = new_calls();
    let exports = recording_exports(&calls);
    let a = Bridge::bind(&exports).unwrap();
    let b = Bridge::bind(&exports).unwrap();
    assert_eq!(a.len(), b.len());
    assert_eq!(a.fingerprint(), b.fingerprint());
}

#[test]
fn missing_operation_is_named() {
    let mut exports = NativeExports::new();
    for &op in OpId::ALL {
        if op == OpId::TransformTranslate {
            continue;
        }
        let sig = op.signature();
        exports
            .export_signature(sig, move |_| AbiValue::neutral(sig.ret))
            .unwrap();
    }
    declare_abi(&mut exports);

    match Bridge::bind(&exports) {
        Err(BindError::Unresolved { missing }) => {
            assert_eq!(
                missing,
                vec!["Transform.Translate(Handle, Vector3) -> Void".to_owned()]
            );
        }
        other => panic!("expected Unresolved, got {other:?}"),
    }
}

#[test]
fn overload_with_wrong_parameters_does_not_resolve() {
    let mut exports = NativeExports::new();
    for &op in OpId::ALL {
        let sig = op.signature();
        if op == OpId::DebugLogFloat {
            // Same name, but the host took a double-width integer instead.
            exports
                .export(sig.name, &[AbiType::I32, AbiType::I32], AbiType::Void, |_| {
                    AbiValue::Void
                })
                .unwrap();
            continue;
        }
        exports
            .export_signature(sig, move |_| AbiValue::neutral(sig.ret))
            .unwrap();
    }
    declare_abi(&mut exports);

    let err = Bridge::bind(&exports).unwrap_err();
    assert!(matches!(err, BindError::Unresolved { ref missing } if missing.len() == 1));
    assert!(err.to_string().contains("Debug.Log(F32, LogSeverity) -> Void"));
}

#[test]
fn return_type_mismatch_is_fatal() {
    let mut exports = NativeExports::new();
    for &op in OpId::ALL {
        let sig = op.signature();
        let ret = if op == OpId::WorldLoad {
            AbiType::Void
        } else {
            sig.ret
        };
        exports
            .export(sig.name, sig.params, ret, move |_| AbiValue::neutral(ret))
            .unwrap();
    }
    declare_abi(&mut exports);

    match Bridge::bind(&exports) {
        Err(BindError::ReturnTypeMismatch { signature, native }) => {
            assert_eq!(signature, "World.Load(Str) -> Bool");
            assert_eq!(native, AbiType::Void);
        }
        other => panic!("expected ReturnTypeMismatch, got {other:?}"),
    }
}

#[test]
fn layout_mismatch_is_fatal() {
    let calls = new_calls();
    let mut exports = recording_exports(&calls);
    exports.declare_layout(
        AggregateLayout::new("Vector3", 16, 4)
            .field("x", 0, 4)
            .field("y", 4, 4)
            .field("z", 8, 4),
    );
    let err = Bridge::bind(&exports).unwrap_err();
    assert!(
        matches!(err, BindError::LayoutMismatch { ref aggregate, .. } if aggregate == "Vector3"),
        "got {err:?}"
    );
}

#[test]
fn missing_layout_is_fatal() {
    let mut exports = NativeExports::new();
    for &op in OpId::ALL {
        let sig = op.signature();
        exports
            .export_signature(sig, move |_| AbiValue::neutral(sig.ret))
            .unwrap();
    }
    exports.declare_layout(Vector3::layout());
    let err = Bridge::bind(&exports).unwrap_err();
    assert!(
        matches!(err, BindError::MissingLayout { ref aggregate } if aggregate == "Vector2"),
        "got {err:?}"
    );
}

#[test]
fn quaternion_layout_is_checked_at_bind() {
    let mut exports = NativeExports::new();
    for &op in OpId::ALL {
        let sig = op.signature();
        exports
            .export_signature(sig, move |_| AbiValue::neutral(sig.ret))
            .unwrap();
    }
    exports
        .declare_layout(Vector2::layout())
        .declare_layout(Vector3::layout());
    let err = Bridge::bind(&exports).unwrap_err();
    assert!(
        matches!(err, BindError::MissingLayout { ref aggregate } if aggregate == "Quaternion"),
        "got {err:?}"
    );

    // w first instead of last
    exports.declare_layout(
        AggregateLayout::new("Quaternion", 16, 4)
            .field("w", 0, 4)
            .field("x", 4, 4)
            .field("y", 8, 4)
            .field("z", 12, 4),
    );
    let err = Bridge::bind(&exports).unwrap_err();
    assert!(
        matches!(err, BindError::LayoutMismatch { ref aggregate, .. } if aggregate == "Quaternion"),
        "got {err:?}"
    );
}

#[test]
fn fingerprint_mismatch_is_fatal() {
    let calls = new_calls();
    let mut exports = recording_exports(&calls);
    exports.declare_fingerprint("0000");
    assert!(matches!(
        Bridge::bind(&exports),
        Err(BindError::FingerprintMismatch { .. })
    ));
}

#[test]
fn undeclared_fingerprint_only_fails_when_required() {
    let mut exports = NativeExports::new();
    for &op in OpId::ALL {
        let sig = op.signature();
        exports
            .export_signature(sig, move |_| AbiValue::neutral(sig.ret))
            .unwrap();
    }
    exports
        .declare_layout(Vector2::layout())
        .declare_layout(Vector3::layout())
        .declare_layout(Quaternion::layout());

    assert!(Bridge::bind(&exports).is_ok());

    let strict = BridgeConfig {
        require_fingerprint: true,
        ..Default::default()
    };
    assert!(matches!(
        Bridge::bind_with_config(&exports, strict),
        Err(BindError::FingerprintMismatch { .. })
    ));
}

#[test]
fn duplicate_export_is_rejected() {
    let mut exports = NativeExports::new();
    let sig = OpId::TimeGetDeltaTime.signature();
    exports
        .export_signature(sig, |_| AbiValue::F32(0.0))
        .unwrap();
    let err = exports
        .export_signature(sig, |_| AbiValue::F32(1.0))
        .unwrap_err();
    assert!(matches!(err, BindError::DuplicateExport { .. }));
    assert_eq!(exports.len(), 1);
}

#[test]
fn exports_outside_the_catalog_are_ignored() {
    let calls = new_calls();
    let mut exports = recording_exports(&calls);
    exports
        .export("Physics.Raycast", &[AbiType::Vector3], AbiType::Bool, |_| {
            AbiValue::Bool(true)
        })
        .unwrap();
    let bridge = Bridge::bind(&exports).unwrap();
    assert_eq!(bridge.len(), CATALOG.len());
}

// ---------------------------------------------------------------------------
// Call guard
// ---------------------------------------------------------------------------

#[test]
fn null_handle_never_reaches_native() {
    let calls = new_calls();
    let bridge = bound(&calls);

    let err = bridge
        .invoke(
            OpId::TransformSetPosition,
            &[AbiValue::Handle(Handle::NULL), AbiValue::Vector3(Vector3::ONE)],
        )
        .unwrap_err();
    assert!(matches!(err, BridgeError::NullHandle { op: "Transform.SetPosition" }));
    assert!(symbols(&calls).is_empty());
}

#[test]
fn wrappers_reject_null_at_construction() {
    let calls = new_calls();
    let bridge = bound(&calls);
    assert!(matches!(
        Entity::new(bridge.clone(), Handle::NULL),
        Err(BridgeError::NullHandle { .. })
    ));
    assert!(matches!(
        Transform::new(bridge.clone(), Handle::NULL),
        Err(BridgeError::NullHandle { .. })
    ));
    assert!(ScriptBase::new(bridge, Handle::from_raw(1), Handle::NULL).is_err());
}

#[test]
fn argument_mismatch_is_rejected_before_the_call() {
    let calls = new_calls();
    let bridge = bound(&calls);
    let err = bridge
        .invoke(OpId::WorldLoad, &[AbiValue::I32(3)])
        .unwrap_err();
    match err {
        BridgeError::ArgumentMismatch { expected, found, .. } => {
            assert_eq!(expected, "Str");
            assert_eq!(found, "I32");
        }
        other => panic!("expected ArgumentMismatch, got {other:?}"),
    }
    assert!(symbols(&calls).is_empty());
}

#[test]
fn native_panic_becomes_a_fault() {
    let calls = new_calls();
    let exports = exports_with(&calls, |op| match op {
        OpId::EntityGetName => native(|_| panic!("name table corrupted")),
        _ => None,
    });
    let bridge = Bridge::bind(&exports).unwrap();
    let entity = Entity::new(bridge.clone(), Handle::from_raw(7)).unwrap();

    let err = entity.name().unwrap_err();
    match err {
        BridgeError::NativeFault { op, message } => {
            assert!(op.starts_with("Entity.GetName"));
            assert_eq!(message, "name table corrupted");
        }
        other => panic!("expected NativeFault, got {other:?}"),
    }

    // The bridge stays usable after a fault.
    assert!(!entity.is_active().unwrap());
}

#[test]
fn wrong_native_return_is_reported() {
    let calls = new_calls();
    let exports = exports_with(&calls, |op| match op {
        OpId::TimeGetDeltaTime => native(|_| AbiValue::I32(16)),
        _ => None,
    });
    let bridge = Bridge::bind(&exports).unwrap();
    let err = time::delta_time(&bridge).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::ReturnMismatch {
            expected: AbiType::F32,
            found: AbiType::I32,
            ..
        }
    ));
}

// ---------------------------------------------------------------------------
// Wrappers and facades
// ---------------------------------------------------------------------------

#[test]
fn transform_forwards_handle_and_value() {
    let calls = new_calls();
    let exports = exports_with(&calls, |op| match op {
        OpId::TransformGetPosition => native(|_| AbiValue::Vector3(Vector3::new(1.0, 2.0, 3.0))),
        _ => None,
    });
    let bridge = Bridge::bind(&exports).unwrap();
    let transform = Transform::new(bridge, Handle::from_raw(0x42)).unwrap();

    transform.translate(Vector3::new(0.0, 1.0, 0.0)).unwrap();
    assert_eq!(transform.position().unwrap(), Vector3::new(1.0, 2.0, 3.0));

    let recorded = calls.lock().unwrap();
    assert_eq!(recorded[0].0, "transform_translate");
    assert_eq!(
        recorded[0].1,
        vec![
            AbiValue::Handle(Handle::from_raw(0x42)),
            AbiValue::Vector3(Vector3::new(0.0, 1.0, 0.0))
        ]
    );
    assert_eq!(recorded[1].0, "transform_get_position");
}

#[test]
fn log_info_sends_explicit_default_severity() {
    let calls = new_calls();
    let bridge = bound(&calls);
    debug::log_info(&bridge, "hello").unwrap();

    let recorded = calls.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].0, "debug_log_text");
    assert_eq!(
        recorded[0].1,
        vec![
            AbiValue::Str("hello".to_owned()),
            AbiValue::LogSeverity(LogSeverity::Info)
        ]
    );
}

#[test]
fn log_selects_overload_by_value_type() {
    let calls = new_calls();
    let bridge = bound(&calls);
    debug::log(&bridge, &42, LogSeverity::Warning).unwrap();
    debug::log(&bridge, &1.5f32, LogSeverity::Warning).unwrap();
    debug::log(&bridge, &true, LogSeverity::Warning).unwrap();
    debug::log(&bridge, &Vector3::ONE, LogSeverity::Error).unwrap();
    debug::log(&bridge, &String::from("owned"), LogSeverity::Info).unwrap();

    assert_eq!(
        symbols(&calls),
        vec![
            "debug_log_int",
            "debug_log_float",
            "debug_log_bool",
            "debug_log_vector3",
            "debug_log_text"
        ]
    );
    let recorded = calls.lock().unwrap();
    assert_eq!(recorded[1].1[1], AbiValue::LogSeverity(LogSeverity::Warning));
    assert_eq!(recorded[3].1[1], AbiValue::LogSeverity(LogSeverity::Error));
}

#[test]
fn world_facade_passes_path_and_returns_host_verdict() {
    let calls = new_calls();
    let exports = exports_with(&calls, |op| match op {
        OpId::WorldSave => native(|_| AbiValue::Bool(true)),
        _ => None,
    });
    let bridge = Bridge::bind(&exports).unwrap();

    assert!(!world::load(&bridge, "missing.file").unwrap());
    assert!(world::save(&bridge, "levels/one.json").unwrap());

    let recorded = calls.lock().unwrap();
    assert_eq!(recorded[0].1, vec![AbiValue::Str("missing.file".to_owned())]);
    assert_eq!(recorded[1].1, vec![AbiValue::Str("levels/one.json".to_owned())]);
}

#[test]
fn input_facade_marshals_key_codes() {
    let calls = new_calls();
    let exports = exports_with(&calls, |op| match op {
        OpId::InputGetKeyDown => native(|args| {
            AbiValue::Bool(args[0] == AbiValue::KeyCode(KeyCode::Space))
        }),
        OpId::InputGetMouseDelta => native(|_| AbiValue::Vector2(Vector2::new(3.0, -1.0))),
        _ => None,
    });
    let bridge = Bridge::bind(&exports).unwrap();

    assert!(input::key_down(&bridge, KeyCode::Space).unwrap());
    assert!(!input::key_down(&bridge, KeyCode::Enter).unwrap());
    assert!(!input::key(&bridge, KeyCode::Space).unwrap());
    assert_eq!(input::mouse_delta(&bridge).unwrap(), Vector2::new(3.0, -1.0));
    assert_eq!(input::mouse_position(&bridge).unwrap(), Vector2::ZERO);
}

// ---------------------------------------------------------------------------
// Property tests
// ---------------------------------------------------------------------------

fn arb_value() -> impl Strategy<Value = AbiValue> {
    prop_oneof![
        any::<bool>().prop_map(AbiValue::Bool),
        any::<i32>().prop_map(AbiValue::I32),
        any::<f32>().prop_map(AbiValue::F32),
        ".{0,8}".prop_map(AbiValue::Str),
        (1u64..).prop_map(|raw| AbiValue::Handle(Handle::from_raw(raw))),
        (any::<f32>(), any::<f32>()).prop_map(|(x, y)| AbiValue::Vector2(Vector2::new(x, y))),
    ]
}

proptest! {
    /// Any argument list that does not fit the signature is rejected and
    /// the native function is never entered.
    #[test]
    fn ill_typed_arguments_never_reach_native(
        op_index in 0..CATALOG.len(),
        args in prop::collection::vec(arb_value(), 0..4),
    ) {
        let op = OpId::ALL[op_index];
        let sig = op.signature();
        let fits = args.len() == sig.params.len()
            && args.iter().zip(sig.params).all(|(a, p)| a.abi_type() == *p);
        prop_assume!(!fits);

        let calls = new_calls();
        let bridge = bound(&calls);
        let result = bridge.invoke(op, &args);
        prop_assert!(
            matches!(result, Err(BridgeError::ArgumentMismatch { .. })),
            "expected ArgumentMismatch, got {:?}",
            result
        );
        prop_assert!(symbols(&calls).is_empty());
    }
}
