pub mod proxy;
pub mod terminal;
