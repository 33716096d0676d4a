#[cfg(test)]
mod proptest_coerce {
    use crate::coerce::coerce;
    use crate::error::CoercionError;
    use crate::value::{InputValue, UaValue, VariantType};
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(2000))]

        // Property: every i32 written as text lands on an Int32 node unchanged
        #[test]
        fn i32_text_is_exact(n in any::<i32>()) {
            let result = coerce(&InputValue::Text(n.to_string()), VariantType::Int32);
            prop_assert_eq!(result, Ok(UaValue::Int32(n)));
        }

        // Property: integers outside the Int16 range never narrow
        #[test]
        fn out_of_range_never_narrows(
            n in prop_oneof![i64::MIN..i64::from(i16::MIN), (i64::from(i16::MAX) + 1)..i64::MAX]
        ) {
            let result = coerce(&InputValue::Integer(n), VariantType::Int16);
            let rejected = matches!(result, Err(CoercionError::OutOfRange { .. }));
            prop_assert!(rejected, "expected OutOfRange for {}, got {:?}", n, result);
        }

        // Property: negative integers never reach unsigned nodes
        #[test]
        fn negatives_never_unsigned(n in i64::MIN..0i64) {
            for target in [VariantType::Byte, VariantType::UInt16, VariantType::UInt32, VariantType::UInt64] {
                prop_assert!(coerce(&InputValue::Integer(n), target).is_err());
            }
        }

        // Property: finite floats pass through Double untouched
        #[test]
        fn finite_doubles_pass_through(x in -1.0e300f64..1.0e300) {
            prop_assert_eq!(coerce(&InputValue::Float(x), VariantType::Double), Ok(UaValue::Double(x)));
        }

        // Property: anything can be written to a String node
        #[test]
        fn strings_accept_everything(n in any::<i64>(), b in any::<bool>(), s in ".*") {
            prop_assert_eq!(
                coerce(&InputValue::Integer(n), VariantType::String),
                Ok(UaValue::String(n.to_string()))
            );
            prop_assert_eq!(
                coerce(&InputValue::Bool(b), VariantType::String),
                Ok(UaValue::String(b.to_string()))
            );
            prop_assert_eq!(
                coerce(&InputValue::Text(s.clone()), VariantType::String),
                Ok(UaValue::String(s))
            );
        }

        // Property: an Empty node type rejects every input
        #[test]
        fn empty_target_rejects(n in any::<i64>()) {
            prop_assert!(coerce(&InputValue::Integer(n), VariantType::Empty).is_err());
        }
    }
}
