pub mod analysis;
pub mod company;
pub mod contract;
pub mod dividend;
pub mod notification;
pub mod symbol;
pub mod watchlist;

pub use symbol::Symbol;
