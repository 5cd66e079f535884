// Feed consumption: items, timestamps, time windows, and the paginated
// collector that pulls candidates off a rendered source page.

pub mod collector;
pub mod item;
pub mod time;
pub mod window;

pub use item::Item;
