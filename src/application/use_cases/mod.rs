pub mod authenticate;
pub mod tokens;
