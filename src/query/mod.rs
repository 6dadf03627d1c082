//! Statement-building support shared by the PostgreSQL store.
//!
//! Table and column names are plain `&'static str` wrapped in [`Ident`] so
//! sea-query can quote them; bound values go through
//! [`value_conversion::with_converted_params`].

pub mod value_conversion;

use sea_query::Iden;

/// A table or column name known at compile time.
#[derive(Debug, Clone, Copy)]
pub struct Ident(pub &'static str);

impl Iden for Ident {
    fn unquoted(&self) -> &str {
        self.0
    }
}

pub use value_conversion::with_converted_params;
