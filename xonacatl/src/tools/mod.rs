pub mod filter;
pub mod serve;
