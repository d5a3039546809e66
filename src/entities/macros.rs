//! Macros for reducing boilerplate when defining records

/// Implement [`Record`](crate::core::entity::Record) for a struct with an
/// `id: i64` field.
///
/// Lists the queryable attributes with their kind; attributes under
/// `nullable` accept `== null` / `!= null` filters. Every listed attribute
/// must be a struct field convertible into a `FieldValue`. Attributes not
/// listed (secrets, nested collections) cannot be filtered or sorted on.
///
/// # Example
///
/// ```rust,ignore
/// impl_record!(Track, "track",
///     fields {
///         id: Integer,
///         name: Text,
///         length_m: Integer,
///     }
///     nullable {
///         opened: DateTime,
///     }
/// );
/// ```
#[macro_export]
macro_rules! impl_record {
    (
        $type:ident,
        $resource:expr,
        fields { $( $field:ident : $kind:ident ),* $(,)? }
        $( nullable { $( $nfield:ident : $nkind:ident ),* $(,)? } )?
    ) => {
        impl $crate::core::entity::Record for $type {
            fn resource_name() -> &'static str {
                $resource
            }

            fn fields() -> &'static $crate::core::field::FieldSet {
                static FIELDS: $crate::core::field::FieldSet = $crate::core::field::FieldSet::new(
                    $resource,
                    &[
                        $(
                            $crate::core::field::FieldDescriptor::new(
                                stringify!($field),
                                $crate::core::field::FieldKind::$kind,
                            ),
                        )*
                        $( $(
                            $crate::core::field::FieldDescriptor::nullable(
                                stringify!($nfield),
                                $crate::core::field::FieldKind::$nkind,
                            ),
                        )* )?
                    ],
                );
                &FIELDS
            }

            fn id(&self) -> i64 {
                self.id
            }

            fn set_id(&mut self, id: i64) {
                self.id = id;
            }

            fn field_value(&self, field: &str) -> Option<$crate::core::field::FieldValue> {
                match field {
                    $(
                        stringify!($field) => {
                            Some($crate::core::field::FieldValue::from(self.$field.clone()))
                        }
                    )*
                    $( $(
                        stringify!($nfield) => {
                            Some($crate::core::field::FieldValue::from(self.$nfield.clone()))
                        }
                    )* )?
                    _ => None,
                }
            }
        }
    };
}
