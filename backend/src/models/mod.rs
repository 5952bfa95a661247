//! Database rows, request payloads and response shapes.

/// Declares a TEXT-backed enum with serde/sqlx support, `as_str` and `FromStr`.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash,
            serde::Serialize, serde::Deserialize, sqlx::Type,
        )]
        #[sqlx(type_name = "TEXT", rename_all = "snake_case")]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.trim().to_ascii_lowercase().as_str() {
                    $($value => Ok($name::$variant),)+
                    other => Err(format!("invalid {} value: {}", stringify!($name), other)),
                }
            }
        }
    };
}

pub mod activity_log;
pub mod contact;
pub mod event;
pub mod form;
pub mod gallery;
pub mod home;
pub mod media;
pub mod page_view;
pub mod pagination;
pub mod project;
pub mod settings;
pub mod subscriber;
pub mod team;
pub mod tip;
pub mod user;
