pub mod check;
pub mod extract;
pub mod header;
pub mod info;
pub mod replay;
pub mod validate;
