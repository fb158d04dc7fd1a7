//! Property-based tests for wxbroker-crypto signing
//!
//! These tests use proptest to check the signer over generated field sets.

use std::collections::BTreeMap;

use proptest::prelude::*;
use proptest::sample::Index;
use wxbroker_crypto::{sign, verify, SignType};

fn field_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,11}"
}

/// Values never contain the `&` / `=` separators, so one value change is one
/// canonical string change.
fn field_value() -> impl Strategy<Value = String> {
    "[^&=\\p{C}]{0,24}"
}

fn fields() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map(field_name(), field_value(), 0..10)
}

fn secret() -> impl Strategy<Value = String> {
    "[^\\p{C}]{0,40}"
}

fn sign_type() -> impl Strategy<Value = SignType> {
    prop_oneof![Just(SignType::Md5), Just(SignType::HmacSha256)]
}

proptest! {
    /// A signature always verifies against the fields and secret it was made from
    #[test]
    fn signature_verifies(fields in fields(), secret in secret(), sign_type in sign_type()) {
        let signature = sign(&fields, &secret, sign_type).unwrap();
        prop_assert!(verify(&fields, &signature, &secret, sign_type));
    }

    /// Changing any single signed value breaks an HMAC-SHA256 signature
    #[test]
    fn hmac_detects_single_value_change(
        fields in prop::collection::btree_map(field_name(), field_value(), 1..10),
        secret in secret(),
        index in any::<Index>(),
        replacement in field_value(),
    ) {
        let names: Vec<&String> = fields.keys().collect();
        let name = index.get(&names).to_string();
        prop_assume!(name != "sign");
        prop_assume!(fields[&name] != replacement);

        let signature = sign(&fields, &secret, SignType::HmacSha256).unwrap();
        let mut tampered = fields.clone();
        tampered.insert(name, replacement);
        prop_assert!(!verify(&tampered, &signature, &secret, SignType::HmacSha256));
    }

    /// Field order never affects the signature
    #[test]
    fn signature_ignores_input_order(fields in fields(), secret in secret(), sign_type in sign_type()) {
        let reversed: Vec<(&String, &String)> = fields.iter().rev().collect();
        prop_assert_eq!(
            sign(&fields, &secret, sign_type).unwrap(),
            sign(reversed, &secret, sign_type).unwrap()
        );
    }
}
