//! Property-based tests for the token codec

use super::*;
use proptest::prelude::*;
use serde_json::{json, Value};

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_base() -> impl Strategy<Value = Base> {
    (
        "[a-z]{1,8}",
        prop_oneof![
            Just(ControlKind::Button),
            Just(ControlKind::Select),
            Just(ControlKind::Modal),
        ],
        "[a-z_]{1,10}",
    )
        .prop_map(|(namespace, kind, action)| Base::new(namespace, kind, action))
}

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 _:|-]{0,12}".prop_map(Value::from),
        "-?[0-9]{1,6}".prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        proptest::collection::vec("[0-9]{1,5}", 0..4).prop_map(|ids| json!(ids)),
    ]
}

fn arb_state() -> impl Strategy<Value = StepState> {
    proptest::collection::btree_map("[a-z]{1,3}|state", arb_value(), 0..5).prop_map(|entries| {
        entries
            .into_iter()
            .fold(StepState::new(), |state, (k, v)| state.with(k, v))
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_round_trip_when_within_budget(base in arb_base(), state in arb_state()) {
        match encode(&base, &state) {
            Ok(token) => {
                let decoded = decode(&token);
                prop_assert!(decoded.is_ok(), "{token:?} failed to decode: {decoded:?}");
                let decoded = decoded.unwrap();
                prop_assert_eq!(decoded.base, base);
                prop_assert_eq!(decoded.state, state);
            }
            Err(TokenError::TooLong { len }) => prop_assert!(len > TOKEN_BUDGET),
            Err(other) => prop_assert!(false, "unexpected error {other:?}"),
        }
    }

    #[test]
    fn prop_encoded_tokens_never_exceed_budget(base in arb_base(), state in arb_state()) {
        if let Ok(token) = encode(&base, &state) {
            prop_assert!(token.len() <= TOKEN_BUDGET);
        }
    }

    #[test]
    fn prop_oversized_state_is_rejected(base in arb_base(), filler in "[a-z]{100,140}") {
        let state = StepState::new().with("p", filler);
        let is_too_long = matches!(encode(&base, &state), Err(TokenError::TooLong { .. }));
        prop_assert!(is_too_long);
    }

    #[test]
    fn prop_decode_never_panics(raw in "[a-z:|=+/A-Z0-9]{0,120}") {
        let _ = decode(&raw);
    }
}
