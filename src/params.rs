use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::backend::{Param, QueryParameters, SchemeOption, Value};
use crate::error::{BoxError, TableSqlError};

/// Resolves a caller-defined type into a plain argument value before coercion.
pub trait Valuer: Send + Sync + fmt::Debug {
    /// # Errors
    ///
    /// Any error is surfaced as [`TableSqlError::ParameterResolutionFailed`].
    fn value(&self) -> Result<ArgValue, BoxError>;
}

/// Runtime value of a caller-supplied argument.
#[derive(Debug, Clone)]
pub enum ArgValue {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Bytes(Vec<u8>),
    Text(String),
    /// 16 raw bytes, bound as a UUID.
    Uuid([u8; 16]),
    /// Already typed; passed through unchanged.
    Typed(Value),
    Valuer(Arc<dyn Valuer>),
    /// Scheme-query option riding in the argument list.
    SchemeOption(SchemeOption),
    Null,
    Timestamp(NaiveDateTime),
    Json(JsonValue),
}

impl ArgValue {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::I8(_) => "i8",
            Self::U8(_) => "u8",
            Self::I16(_) => "i16",
            Self::U16(_) => "u16",
            Self::I32(_) => "i32",
            Self::U32(_) => "u32",
            Self::I64(_) => "i64",
            Self::U64(_) => "u64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Bytes(_) => "bytes",
            Self::Text(_) => "string",
            Self::Uuid(_) => "[u8; 16]",
            Self::Typed(_) => "value",
            Self::Valuer(_) => "valuer",
            Self::SchemeOption(_) => "scheme option",
            Self::Null => "null",
            Self::Timestamp(_) => "timestamp",
            Self::Json(_) => "json",
        }
    }
}

macro_rules! arg_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ArgValue {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

arg_from! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Vec<u8> => Bytes,
    String => Text,
    [u8; 16] => Uuid,
    Value => Typed,
    SchemeOption => SchemeOption,
    NaiveDateTime => Timestamp,
    JsonValue => Json,
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<&[u8]> for ArgValue {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl From<uuid::Uuid> for ArgValue {
    fn from(v: uuid::Uuid) -> Self {
        Self::Uuid(v.into_bytes())
    }
}

impl<T: Into<ArgValue>> From<Option<T>> for ArgValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Caller-supplied argument. Only named arguments are accepted.
#[derive(Debug, Clone)]
pub struct NamedArg {
    pub name: String,
    /// One-based position in the argument list.
    pub ordinal: usize,
    pub value: ArgValue,
}

impl NamedArg {
    pub fn named(name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        Self {
            name: name.into(),
            ordinal: 0,
            value: value.into(),
        }
    }

    /// Unnamed argument; coercion rejects it.
    pub fn positional(ordinal: usize, value: impl Into<ArgValue>) -> Self {
        Self {
            name: String::new(),
            ordinal,
            value: value.into(),
        }
    }
}

fn bind_name(name: &str) -> String {
    if name.starts_with('$') {
        name.to_owned()
    } else {
        format!("${name}")
    }
}

fn to_value(name: &str, value: ArgValue) -> Result<Value, TableSqlError> {
    let value = match value {
        ArgValue::Valuer(valuer) => {
            valuer
                .value()
                .map_err(|source| TableSqlError::ParameterResolutionFailed {
                    name: name.to_owned(),
                    source,
                })?
        }
        other => other,
    };
    Ok(match value {
        ArgValue::Bool(v) => Value::Bool(v),
        ArgValue::I8(v) => Value::Int8(v),
        ArgValue::U8(v) => Value::Uint8(v),
        ArgValue::I16(v) => Value::Int16(v),
        ArgValue::U16(v) => Value::Uint16(v),
        ArgValue::I32(v) => Value::Int32(v),
        ArgValue::U32(v) => Value::Uint32(v),
        ArgValue::I64(v) => Value::Int64(v),
        ArgValue::U64(v) => Value::Uint64(v),
        ArgValue::F32(v) => Value::Float(v),
        ArgValue::F64(v) => Value::Double(v),
        ArgValue::Bytes(v) => Value::Bytes(v),
        ArgValue::Text(v) => Value::Utf8(v),
        ArgValue::Uuid(v) => Value::Uuid(uuid::Uuid::from_bytes(v)),
        ArgValue::Typed(v) => v,
        other => {
            return Err(TableSqlError::UnsupportedParameterType {
                name: name.to_owned(),
                type_name: other.type_name(),
            });
        }
    })
}

/// Coerce one argument into a typed backend parameter.
///
/// # Errors
///
/// - [`TableSqlError::InvalidParameter`] when the argument has no name;
/// - [`TableSqlError::ParameterResolutionFailed`] when a [`Valuer`] fails;
/// - [`TableSqlError::UnsupportedParameterType`] for values with no backend counterpart.
pub fn coerce(arg: &NamedArg) -> Result<Param, TableSqlError> {
    if arg.name.is_empty() {
        return Err(TableSqlError::InvalidParameter {
            ordinal: arg.ordinal,
        });
    }
    Ok(Param {
        name: bind_name(&arg.name),
        value: to_value(&arg.name, arg.value.clone())?,
    })
}

/// Validate and rewrite an argument in place, the way the connection will bind it.
///
/// Scheme options are left as they are; they are consumed by scheme execution instead of
/// being bound.
///
/// # Errors
///
/// Same as [`coerce`].
pub fn check_named_value(arg: &mut NamedArg) -> Result<(), TableSqlError> {
    if arg.name.is_empty() {
        return Err(TableSqlError::InvalidParameter {
            ordinal: arg.ordinal,
        });
    }
    if matches!(arg.value, ArgValue::SchemeOption(_)) {
        return Ok(());
    }
    let value = to_value(&arg.name, arg.value.clone())?;
    arg.name = bind_name(&arg.name);
    arg.value = ArgValue::Typed(value);
    Ok(())
}

/// # Errors
///
/// Fails on the first argument [`coerce`] rejects.
pub fn to_query_parameters(args: &[NamedArg]) -> Result<QueryParameters, TableSqlError> {
    args.iter()
        .map(coerce)
        .collect::<Result<Vec<_>, _>>()
        .map(QueryParameters::new)
}

/// Collect the scheme options carried by a scheme query's arguments.
///
/// # Errors
///
/// Returns [`TableSqlError::InvalidSchemeArgument`] for any argument that is not a
/// [`SchemeOption`].
pub fn to_scheme_options(args: &[NamedArg]) -> Result<Vec<SchemeOption>, TableSqlError> {
    args.iter()
        .map(|arg| match &arg.value {
            ArgValue::SchemeOption(opt) => Ok(opt.clone()),
            _ => Err(TableSqlError::InvalidSchemeArgument {
                name: arg.name.clone(),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[derive(Debug)]
    struct Celsius(f64);

    impl Valuer for Celsius {
        fn value(&self) -> Result<ArgValue, BoxError> {
            Ok(ArgValue::F64(self.0))
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl Valuer for Broken {
        fn value(&self) -> Result<ArgValue, BoxError> {
            Err("sensor offline".into())
        }
    }

    #[derive(Debug)]
    struct Nothing;

    impl Valuer for Nothing {
        fn value(&self) -> Result<ArgValue, BoxError> {
            Ok(ArgValue::Null)
        }
    }

    #[test]
    fn supported_types_get_bind_sigil() {
        let id = uuid::Uuid::new_v4();
        let cases: Vec<(ArgValue, Value)> = vec![
            (true.into(), Value::Bool(true)),
            ((-1_i8).into(), Value::Int8(-1)),
            (2_u8.into(), Value::Uint8(2)),
            ((-3_i16).into(), Value::Int16(-3)),
            (4_u16.into(), Value::Uint16(4)),
            ((-5_i32).into(), Value::Int32(-5)),
            (6_u32.into(), Value::Uint32(6)),
            ((-7_i64).into(), Value::Int64(-7)),
            (8_u64.into(), Value::Uint64(8)),
            (1.5_f32.into(), Value::Float(1.5)),
            (2.5_f64.into(), Value::Double(2.5)),
            (vec![1_u8, 2].into(), Value::Bytes(vec![1, 2])),
            ("hi".into(), Value::Utf8("hi".into())),
            (id.into(), Value::Uuid(id)),
            (Value::null().into(), Value::null()),
        ];
        for (arg, expected) in cases {
            let param = coerce(&NamedArg::named("p", arg)).expect("coerce");
            assert_eq!(param.name, "$p");
            assert_eq!(param.value, expected);
        }
    }

    #[test]
    fn unnamed_argument_is_rejected() {
        let err = coerce(&NamedArg::positional(3, 1_i32)).unwrap_err();
        assert!(matches!(err, TableSqlError::InvalidParameter { ordinal: 3 }));
    }

    #[test]
    fn unsupported_types_are_rejected() {
        let now = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .expect("valid date");
        for arg in [
            ArgValue::Null,
            ArgValue::Timestamp(now),
            ArgValue::Json(serde_json::json!({"a": 1})),
            ArgValue::SchemeOption(SchemeOption::CancelAfter(Duration::from_secs(1))),
            ArgValue::Valuer(Arc::new(Nothing)),
        ] {
            let err = coerce(&NamedArg::named("x", arg)).unwrap_err();
            assert!(
                matches!(err, TableSqlError::UnsupportedParameterType { .. }),
                "{err:?}"
            );
        }
    }

    #[test]
    fn valuer_resolves_before_coercion() {
        let param = coerce(&NamedArg::named("t", ArgValue::Valuer(Arc::new(Celsius(21.5)))))
            .expect("coerce");
        assert_eq!(param.value, Value::Double(21.5));

        let err = coerce(&NamedArg::named("t", ArgValue::Valuer(Arc::new(Broken)))).unwrap_err();
        assert!(matches!(err, TableSqlError::ParameterResolutionFailed { .. }));
    }

    #[test]
    fn check_named_value_rewrites_once() {
        let mut arg = NamedArg::named("id", 1_u64);
        check_named_value(&mut arg).expect("first check");
        check_named_value(&mut arg).expect("second check");
        assert_eq!(arg.name, "$id");
        assert!(matches!(arg.value, ArgValue::Typed(Value::Uint64(1))));

        let mut opt = NamedArg::named(
            "timeout",
            SchemeOption::OperationTimeout(Duration::from_secs(5)),
        );
        check_named_value(&mut opt).expect("scheme option passes");
        assert_eq!(opt.name, "timeout");
    }

    #[test]
    fn scheme_arguments_must_be_options() {
        let ok = to_scheme_options(&[NamedArg::named(
            "t",
            SchemeOption::CancelAfter(Duration::from_millis(10)),
        )])
        .expect("options");
        assert_eq!(ok.len(), 1);

        let err = to_scheme_options(&[NamedArg::named("id", 1_i32)]).unwrap_err();
        assert!(matches!(err, TableSqlError::InvalidSchemeArgument { name } if name == "id"));
    }
}
