//! Complex scalars in the persistent format.

use num_complex::Complex64;
use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A complex number encoded as `[re, im]`, or as a bare scalar when the
/// imaginary part is zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YamlComplex(pub Complex64);

impl From<Complex64> for YamlComplex {
    fn from(value: Complex64) -> Self {
        Self(value)
    }
}

impl From<YamlComplex> for Complex64 {
    fn from(value: YamlComplex) -> Self {
        value.0
    }
}

impl Serialize for YamlComplex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.im == 0.0 {
            serializer.serialize_f64(self.0.re)
        } else {
            (self.0.re, self.0.im).serialize(serializer)
        }
    }
}

struct ComplexVisitor;

impl<'de> Visitor<'de> for ComplexVisitor {
    type Value = YamlComplex;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a real scalar or a [re, im] pair")
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
        Ok(YamlComplex(Complex64::new(value, 0.0)))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Ok(YamlComplex(Complex64::new(value as f64, 0.0)))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        Ok(YamlComplex(Complex64::new(value as f64, 0.0)))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let re: f64 = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let im: f64 = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(1, &self))?;
        if seq.next_element::<f64>()?.is_some() {
            return Err(de::Error::invalid_length(3, &self));
        }
        Ok(YamlComplex(Complex64::new(re, im)))
    }
}

impl<'de> Deserialize<'de> for YamlComplex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ComplexVisitor)
    }
}
