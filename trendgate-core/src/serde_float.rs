//! Serde adapter for `f64` values that may be non-finite.
//!
//! JSON has no representation for NaN or infinity. Undefined indicator values
//! (NaN) are written as `null`; infinite sentinels (e.g. profit factor with no
//! losing trades) are written as the strings `"inf"` / `"-inf"`. Reading
//! accepts numbers, `null`, and those strings.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else if value.is_nan() {
        serializer.serialize_none()
    } else if *value > 0.0 {
        serializer.serialize_str("inf")
    } else {
        serializer.serialize_str("-inf")
    }
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    match Option::<Repr>::deserialize(deserializer)? {
        None => Ok(f64::NAN),
        Some(Repr::Number(v)) => Ok(v),
        Some(Repr::Text(text)) => match text.as_str() {
            "inf" | "+inf" | "infinity" => Ok(f64::INFINITY),
            "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
            "nan" | "NaN" => Ok(f64::NAN),
            other => Err(D::Error::custom(format!("invalid float literal '{other}'"))),
        },
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "super")]
        value: f64,
    }

    fn roundtrip(value: f64) -> (String, f64) {
        let json = serde_json::to_string(&Wrapper { value }).unwrap();
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        (json, back.value)
    }

    #[test]
    fn finite_values_stay_numbers() {
        let (json, back) = roundtrip(1.5);
        assert_eq!(json, r#"{"value":1.5}"#);
        assert_eq!(back, 1.5);
    }

    #[test]
    fn infinity_becomes_string() {
        let (json, back) = roundtrip(f64::INFINITY);
        assert_eq!(json, r#"{"value":"inf"}"#);
        assert_eq!(back, f64::INFINITY);
    }

    #[test]
    fn nan_becomes_null() {
        let (json, back) = roundtrip(f64::NAN);
        assert_eq!(json, r#"{"value":null}"#);
        assert!(back.is_nan());
    }

    #[test]
    fn rejects_garbage_text() {
        let err = serde_json::from_str::<Wrapper>(r#"{"value":"lots"}"#);
        assert!(err.is_err());
    }
}
