//! Scalar field types.
//!
//! Stored numbers are 64-bit; decoding narrows to the declared width and
//! rejects values that do not fit.

use chrono::{DateTime, TimeZone, Utc};
use docmap_codec::{Document, Value};

use crate::codec::EncodeContext;
use crate::error::{CoreError, CoreResult};
use crate::field::FieldType;
use crate::schema::{ScalarKind, Shape};

fn wide_integer(expected: &'static str, value: &Value) -> CoreResult<i64> {
    match value {
        Value::Integer(n) => Ok(*n),
        Value::Float(f) if f.fract() == 0.0 && f.abs() < 9.2e18 => Ok(*f as i64),
        other => Err(CoreError::type_mismatch(expected, other)),
    }
}

macro_rules! integer_field {
    ($($ty:ty => $kind:ident),+ $(,)?) => {$(
        impl FieldType for $ty {
            fn shape() -> Shape {
                Shape::Scalar(ScalarKind::$kind)
            }

            fn to_value(&self, _ctx: &EncodeContext) -> CoreResult<Value> {
                Ok(Value::Integer(i64::from(*self)))
            }

            fn from_value(value: &Value) -> CoreResult<Self> {
                let wide = wide_integer(stringify!($ty), value)?;
                <$ty>::try_from(wide).map_err(|_| CoreError::TypeMismatch {
                    expected: stringify!($ty),
                    found: format!("integer {wide}"),
                })
            }
        }
    )+};
}

integer_field!(i8 => I8, i16 => I16, i32 => I32, i64 => I64);

impl FieldType for f64 {
    fn shape() -> Shape {
        Shape::Scalar(ScalarKind::F64)
    }

    fn to_value(&self, _ctx: &EncodeContext) -> CoreResult<Value> {
        Ok(Value::Float(*self))
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        value
            .as_f64()
            .ok_or_else(|| CoreError::type_mismatch("f64", value))
    }
}

impl FieldType for f32 {
    fn shape() -> Shape {
        Shape::Scalar(ScalarKind::F32)
    }

    fn to_value(&self, _ctx: &EncodeContext) -> CoreResult<Value> {
        Ok(Value::Float(f64::from(*self)))
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        let wide = value
            .as_f64()
            .ok_or_else(|| CoreError::type_mismatch("f32", value))?;
        if wide.is_finite() && wide.abs() > f64::from(f32::MAX) {
            return Err(CoreError::TypeMismatch {
                expected: "f32",
                found: format!("float {wide}"),
            });
        }
        Ok(wide as f32)
    }
}

impl FieldType for bool {
    fn shape() -> Shape {
        Shape::Scalar(ScalarKind::Bool)
    }

    fn to_value(&self, _ctx: &EncodeContext) -> CoreResult<Value> {
        Ok(Value::Bool(*self))
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        value
            .as_bool()
            .ok_or_else(|| CoreError::type_mismatch("bool", value))
    }
}

impl FieldType for char {
    fn shape() -> Shape {
        Shape::Scalar(ScalarKind::Char)
    }

    fn to_value(&self, _ctx: &EncodeContext) -> CoreResult<Value> {
        Ok(Value::Text(self.to_string()))
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        value
            .as_text()
            .and_then(|s| s.chars().next())
            .ok_or_else(|| CoreError::type_mismatch("char", value))
    }
}

impl FieldType for String {
    fn shape() -> Shape {
        Shape::Scalar(ScalarKind::Text)
    }

    fn to_value(&self, _ctx: &EncodeContext) -> CoreResult<Value> {
        Ok(Value::Text(self.clone()))
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        value
            .as_text()
            .map(str::to_string)
            .ok_or_else(|| CoreError::type_mismatch("String", value))
    }
}

impl FieldType for DateTime<Utc> {
    fn shape() -> Shape {
        Shape::Scalar(ScalarKind::DateTime)
    }

    fn to_value(&self, _ctx: &EncodeContext) -> CoreResult<Value> {
        Ok(Value::DateTime(self.timestamp_millis()))
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        let millis = match value {
            Value::DateTime(ms) | Value::Integer(ms) => *ms,
            other => return Err(CoreError::type_mismatch("DateTime<Utc>", other)),
        };
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| CoreError::TypeMismatch {
                expected: "DateTime<Utc>",
                found: format!("out of range millis {millis}"),
            })
    }
}

impl FieldType for Value {
    fn shape() -> Shape {
        Shape::Scalar(ScalarKind::Value)
    }

    fn nullable() -> bool {
        true
    }

    fn to_value(&self, _ctx: &EncodeContext) -> CoreResult<Value> {
        Ok(self.clone())
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        Ok(value.clone())
    }

    fn is_null_value(&self) -> bool {
        self.is_null()
    }
}

impl FieldType for Document {
    fn shape() -> Shape {
        Shape::Scalar(ScalarKind::Document)
    }

    fn to_value(&self, _ctx: &EncodeContext) -> CoreResult<Value> {
        Ok(Value::Document(self.clone()))
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        value
            .as_document()
            .cloned()
            .ok_or_else(|| CoreError::type_mismatch("Document", value))
    }
}
