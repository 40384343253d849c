//! Serde integration support.

use std::fmt;

use serde::de::{Error, Unexpected, Visitor};
use serde::*;

fn i64_to_u64<'d, V: Visitor<'d>, E: Error>(v: V, n: i64) -> Result<V::Value, E> {
    if n >= 0 {
        v.visit_u64(n as u64)
    } else {
        Err(E::invalid_value(Unexpected::Signed(n), &v))
    }
}

/// Ignore deserialization errors and revert to default.
pub fn ignore_errors<'d, T: Deserialize<'d> + Default, D: Deserializer<'d>>(
    d: D,
) -> Result<T, D::Error> {
    use serde_json::Value;

    let v = Value::deserialize(d)?;
    Ok(T::deserialize(v).ok().unwrap_or_default())
}

/// Deserialize a maybe-string ID into a u64.
pub fn deserialize_id<'d, D: Deserializer<'d>>(d: D) -> Result<u64, D::Error> {
    struct IdVisitor;
    impl<'d> Visitor<'d> for IdVisitor {
        type Value = u64;

        fn expecting(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
            write!(fmt, "a u64 or parseable string")
        }

        fn visit_i64<E: Error>(self, v: i64) -> Result<u64, E> {
            i64_to_u64(self, v)
        }

        fn visit_u64<E: Error>(self, v: u64) -> Result<u64, E> {
            Ok(v)
        }

        fn visit_str<E: Error>(self, v: &str) -> Result<u64, E> {
            v.parse::<u64>()
                .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
        }
    }

    d.deserialize_any(IdVisitor)
}

/// Serialize an ID as a string, the way Discord sends them.
pub fn serialize_id<S: Serializer>(id: &u64, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(id)
}

/// Deserialize a maybe-string discriminator into a u16.
/// Also enforces 0 <= N <= 9999.
pub fn deserialize_discrim<'d, D: Deserializer<'d>>(d: D) -> Result<u16, D::Error> {
    macro_rules! check {
        ($self:ident, $v:ident, $wrong:expr) => {
            if $v <= 9999 {
                Ok($v as u16)
            } else {
                Err(E::invalid_value($wrong, &$self))
            }
        };
    }

    struct DiscrimVisitor;
    impl<'d> Visitor<'d> for DiscrimVisitor {
        type Value = u16;

        fn expecting(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
            write!(fmt, "a u16 in [0, 9999] or parseable string")
        }

        fn visit_i64<E: Error>(self, v: i64) -> Result<Self::Value, E> {
            i64_to_u64(self, v)
        }

        fn visit_u64<E: Error>(self, v: u64) -> Result<Self::Value, E> {
            check!(self, v, Unexpected::Unsigned(v))
        }

        fn visit_str<E: Error>(self, v: &str) -> Result<Self::Value, E> {
            v.parse::<u64>()
                .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
                .and_then(|v| self.visit_u64(v))
        }
    }

    d.deserialize_any(DiscrimVisitor)
}

/// Serialize a discriminator the way Discord sends it: `"0"` or zero-padded `"0042"`.
pub fn serialize_discrim<S: Serializer>(discrim: &u16, s: S) -> Result<S::Ok, S::Error> {
    if *discrim == 0 {
        s.serialize_str("0")
    } else {
        s.collect_str(&format_args!("{:04}", discrim))
    }
}
