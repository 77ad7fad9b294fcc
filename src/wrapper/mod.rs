pub mod broker;
pub mod order_book;
pub mod ticks;
