pub mod ddl;
pub mod ident;
pub mod typemap;
