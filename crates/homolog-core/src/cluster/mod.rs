//! Primary clustering of valid medications by therapeutic class and route.

mod combo;

pub use combo::*;
