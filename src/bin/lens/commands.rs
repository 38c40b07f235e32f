pub mod build_index;
pub mod inspect;
pub mod search;
pub mod serve;
