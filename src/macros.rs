/// Implements [`FromValue`](crate::FromValue) for a type by matching on the
/// variants it can be read from. Every arm evaluates to a `crate::Result`.
macro_rules! from_value {
    ($( $ty:ty: $($pat:pat => $val:expr),+ );* $(;)?) => {
        $(
            impl $crate::FromValue for $ty {
                fn from_value(value: &$crate::Value) -> $crate::Result<Self> {
                    #[allow(unreachable_patterns)]
                    match value {
                        $( $pat => $val, )+
                        $crate::Value::Null => Err($crate::Error::Conversion(
                            concat!("unexpected NULL for a ", stringify!($ty), " value").into(),
                        )),
                        v => Err($crate::Error::Conversion(
                            format!("cannot interpret {:?} as a {} value", v, stringify!($ty)).into(),
                        )),
                    }
                }
            }
        )*
    };
}

/// Implements [`FromRow`](crate::FromRow) for tuples of the given arity.
macro_rules! from_row_tuple {
    ($( ($($name:ident: $idx:tt),+) );* $(;)?) => {
        $(
            impl<$($name: $crate::FromValue),+> $crate::FromRow for ($($name,)+) {
                fn from_row(row: &$crate::Row) -> $crate::Result<Self> {
                    let expected = [$($idx),+].len();
                    if row.len() != expected {
                        return Err($crate::Error::Conversion(
                            format!("row has {} columns, expected {}", row.len(), expected).into(),
                        ));
                    }

                    Ok(($(row.get::<$name, usize>($idx)?,)+))
                }
            }
        )*
    };
}
