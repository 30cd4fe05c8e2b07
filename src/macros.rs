/// Auto-implement [`From`] for a type.
#[macro_export]
macro_rules! impl_from {
    { for $type:ty ;
        $(
            $from:ty => | $pat:pat | $value:expr
        ),+
        $(,)*
    } => {
        $(
            impl From<$from> for $type {
                fn from(f: $from) -> $type {
                    let $pat = f;
                    $value
                }
            }
        )+
    };
}

/// Implement [`std::fmt::Display`] and [`std::str::FromStr`] for a fieldless
/// enum, mapping each variant to a fixed name.
macro_rules! impl_names {
    { for $type:ident ;
        $(
            $variant:ident => $name:literal
        ),+
        $(,)*
    } => {
        impl $type {
            /// Name of this value, as used in the CLI and in messages.
            pub fn name(self) -> &'static str {
                match self {
                    $($type::$variant => $name,)+
                }
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
                fmt.write_str(self.name())
            }
        }

        impl std::str::FromStr for $type {
            type Err = $crate::utils::ParseNameError;

            fn from_str(v: &str) -> Result<$type, Self::Err> {
                match v {
                    $($name => Ok($type::$variant),)+
                    _ => Err($crate::utils::ParseNameError(v.to_string())),
                }
            }
        }
    };
}
